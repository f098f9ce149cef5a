use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One of the eight sanctions authorities this service consolidates.
/// OFAC_SDN and OFAC_CONS are distinct lists published by the same
/// authority under the same XML schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    OfacSdn,
    OfacCons,
    Uk,
    Un,
    Eu,
    Au,
    Ca,
    Seco,
}

impl Source {
    pub fn list_name(&self) -> &'static str {
        match self {
            Source::OfacSdn => "OFAC_SDN",
            Source::OfacCons => "OFAC_CONS",
            Source::Uk => "UK",
            Source::Un => "UN",
            Source::Eu => "EU",
            Source::Au => "AU",
            Source::Ca => "CA",
            Source::Seco => "SECO",
        }
    }

    pub fn refresh_log_file(&self) -> &'static str {
        match self {
            Source::OfacSdn => "OFAC_SDNlog.txt",
            Source::OfacCons => "OFAC_CONSlog.txt",
            Source::Uk => "UKlog.txt",
            Source::Un => "UNlog.txt",
            Source::Eu => "EUlog.txt",
            Source::Au => "AUlog.txt",
            Source::Ca => "CAlog.txt",
            Source::Seco => "SECOlog.txt",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Source::OfacSdn => "https://sanctionslistservice.ofac.treas.gov/api/PublicationPreview/exports/SDN.XML",
            Source::OfacCons => "https://sanctionslistservice.ofac.treas.gov/api/PublicationPreview/exports/CONSOLIDATED.XML",
            Source::Uk => "https://sanctionslist.fcdo.gov.uk/docs/UK-Sanctions-List.xml",
            Source::Un => "https://scsanctions.un.org/resources/xml/en/consolidated.xml",
            Source::Eu => "https://webgate.ec.europa.eu/fsd/fsf/public/files/xmlFullSanctionsList_1_1/content?token=n009sfr8",
            Source::Au => "https://www.dfat.gov.au/sites/default/files/regulation8_consolidated.xlsx",
            Source::Ca => "https://www.international.gc.ca/world-monde/assets/office_docs/international_relations-relations_internationales/sanctions/sema-lmes.xml",
            Source::Seco => "https://www.sesam.search.admin.ch/sesam-search-web/pages/downloadXmlGesamtliste.xhtml",
        }
    }

    pub fn all() -> [Source; 8] {
        [
            Source::OfacSdn,
            Source::OfacCons,
            Source::Uk,
            Source::Un,
            Source::Eu,
            Source::Au,
            Source::Ca,
            Source::Seco,
        ]
    }
}

/// Free-form output of an adapter's `extract`, ahead of normalisation.
/// Every adapter builds one of these per subject; the only thing the
/// normaliser requires of it is a non-empty `list_id`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: Option<Source>,
    pub list_id: Option<String>,
    pub fields: HashMap<String, String>,
    pub aliases: Vec<String>,
    pub alternative_addresses: Vec<String>,
    pub alternative_cities: Vec<String>,
    pub alternative_states: Vec<String>,
    pub alternative_postal_codes: Vec<String>,
    pub alternative_countries: Vec<String>,
    pub contact_emails: Vec<String>,
    pub contact_phone_numbers: Vec<String>,
    pub contact_fax_numbers: Vec<String>,
    pub contact_websites: Vec<String>,
    pub bic_codes: Vec<String>,
    pub iban_numbers: Vec<String>,
    pub ssn_numbers: Vec<String>,
    pub passport_numbers: Vec<String>,
    pub national_id_numbers: Vec<String>,
    pub tax_id_numbers: Vec<String>,
    pub other_id_numbers: Vec<String>,
}

impl RawRecord {
    pub fn new(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let v = value.into();
        if !v.trim().is_empty() {
            self.fields.insert(key.to_string(), v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    /// First non-empty field among `keys`, matching the source's `first(...)`
    /// multi-alias field lookup convention.
    pub fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k)).map(|s| s.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Individual,
    Entity,
    Vessel,
    Aircraft,
}

/// Canonical, one row in the index. Produced once per `(list_name, list_id)`
/// by the normaliser and replaced wholesale on every refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub list_name: String,
    pub list_id: String,
    pub global_id: String,
    pub classification: Classification,

    pub primary_name: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub other_first_name: Option<String>,
    pub aliases: Vec<String>,

    pub birth_year: Option<i32>,
    pub birth_month: Option<u32>,
    pub birth_day: Option<u32>,
    pub place_of_birth_text: Option<String>,
    pub sex: Option<String>,
    pub nationality: Option<String>,
    pub citizenship_country: Option<String>,
    pub citizenship_country_iso: Option<String>,

    pub primary_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub addresses: Vec<String>,

    pub bics: Vec<String>,
    pub ibans: Vec<String>,
    pub passport_numbers: Vec<String>,
    pub national_id_numbers: Vec<String>,
    pub tax_id_numbers: Vec<String>,
    pub ssn_numbers: Vec<String>,
    pub other_id_numbers: Vec<String>,
    pub email_addresses: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub websites: Vec<String>,

    pub sanctions_program_name: Option<String>,
    pub justification_text: Option<String>,
    pub other_information_text: Option<String>,

    pub publication_date: Option<String>,
    pub enactment_date: Option<String>,
    pub effective_date: Option<String>,
}

impl Entity {
    /// "first is canonical" surface rule (SPEC_FULL.md §11): the single
    /// representative value for fields that are really multisets.
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses.first().map(|s| s.as_str())
    }

    pub fn primary_website(&self) -> Option<&str> {
        self.websites.first().map(|s| s.as_str())
    }

    pub fn primary_bic(&self) -> Option<&str> {
        self.bics.first().map(|s| s.as_str())
    }
}

/// Derived per entity, a pure function of it (invariant I6): rebuilding
/// from the stored entity reproduces these byte-for-byte.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchKeys {
    pub name_ascii: Option<String>,
    pub name_tokens: Option<String>,
    pub name_soundex: Option<String>,
    pub alias_ascii: Vec<String>,
    pub alias_tokens: Vec<String>,
    pub alias_soundex: Vec<String>,
}

const STOPWORDS: &[&str] = &["of", "the", "and"];

/// NFKD strip-combining, lowercase ASCII-only projection of a name.
pub fn to_ascii(s: &str) -> Option<String> {
    use unicode_normalization::UnicodeNormalization;
    let lower: String = s
        .nfkd()
        .filter(|c| !is_combining(*c))
        .collect::<String>()
        .to_lowercase();
    let ascii: String = lower.chars().filter(|c| c.is_ascii()).collect();
    let trimmed = ascii.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_combining(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// Space-joined alphanumeric tokens, diacritics stripped and lowercased.
/// Tokens of length <= 2 are dropped unless the whole name has <= 2 tokens,
/// and the closed stopword list is removed (corporate suffixes are NOT
/// stopworded).
pub fn token_str(s: &str) -> Option<String> {
    let ascii = to_ascii(s)?;
    let raw_tokens: Vec<&str> = ascii
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if raw_tokens.is_empty() {
        return None;
    }
    let keep_short = raw_tokens.len() <= 2;
    let tokens: Vec<&str> = raw_tokens
        .into_iter()
        .filter(|t| (keep_short || t.len() > 2) && !STOPWORDS.contains(t))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Soundex phonetic code: first letter plus up to three digits encoding
/// subsequent consonant groups, zero-padded to four characters.
pub fn soundex(s: &str) -> Option<String> {
    let ascii = to_ascii(s)?;
    let letters: String = ascii
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let mut chars = letters.chars();
    let first = chars.next()?;

    fn code(ch: char) -> &'static str {
        match ch {
            'B' | 'F' | 'P' | 'V' => "1",
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => "2",
            'D' | 'T' => "3",
            'L' => "4",
            'M' | 'N' => "5",
            'R' => "6",
            _ => "",
        }
    }

    let mut digits = String::new();
    let mut prev = code(first);
    for ch in chars {
        let d = code(ch);
        if d != prev {
            digits.push_str(d);
        }
        prev = d;
    }
    let mut result = format!("{first}{digits}000");
    result.truncate(4);
    Some(result)
}

impl MatchKeys {
    /// Rebuild from an entity. This IS the function whose purity invariant
    /// (I6) the tests assert.
    pub fn of(entity: &Entity) -> Self {
        let name = entity
            .primary_name
            .as_deref()
            .or(entity.full_name.as_deref());
        let name_ascii = name.and_then(to_ascii);
        let name_tokens = name.and_then(token_str);
        let name_soundex = name.and_then(soundex);

        let alias_ascii = entity.aliases.iter().filter_map(|a| to_ascii(a)).collect();
        let alias_tokens = entity
            .aliases
            .iter()
            .filter_map(|a| token_str(a))
            .collect();
        let alias_soundex = entity.aliases.iter().filter_map(|a| soundex(a)).collect();

        MatchKeys {
            name_ascii,
            name_tokens,
            name_soundex,
            alias_ascii,
            alias_tokens,
            alias_soundex,
        }
    }
}
