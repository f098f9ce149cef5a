//! C3 — normaliser. Turns one adapter's `RawRecord` into the canonical
//! `Entity` shape every one of the eight sources is funnelled through
//! before indexing (SPEC_FULL.md §4.2), grounded in
//! `original_source/src/database.py::normalize_sanctions_record` — the
//! `first(...)` multi-alias field lookup, `clean_text`, and the
//! vessel/aircraft/individual/entity classification heuristic are all
//! ported from there.

use std::collections::HashSet;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use watchlist_core::{
    clean_text, country_to_iso2, dedupe_ci, strip_primary_name_alias, Classification, Entity,
    RawRecord,
};

/// NFKC + uppercase + strip all whitespace (SPEC_FULL.md §4.2). Applied
/// to identifiers (BIC, IBAN, passport, national ID, ...) rather than
/// `clean_text`, which only collapses whitespace and preserves case.
fn clean_identifier(v: &str) -> Option<String> {
    let folded: String = v.nfkc().collect();
    let stripped: String = folded.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Value-level dedupe per bucket, preserving first occurrence.
fn clean_identifiers(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter_map(|v| clean_identifier(v))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// `None` means the record is dropped: SPEC_FULL.md requires a non-empty
/// `list_id`, and the caller is expected to count and log rejections per
/// source rather than let one bad entry fail the whole refresh.
pub fn normalize(raw: &RawRecord) -> Option<Entity> {
    let source = raw.source?;
    let list_id = raw
        .list_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();
    let list_name = source.list_name().to_string();
    let global_id = format!("{list_name}-{list_id}");

    let full_name = raw.first(&["full_name"]).and_then(|s| clean_text(&s));
    let first_name = raw.first(&["first_name"]).and_then(|s| clean_text(&s));
    let middle_name = raw.first(&["middle_name"]).and_then(|s| clean_text(&s));
    let last_name = raw.first(&["last_name"]).and_then(|s| clean_text(&s));
    let other_first_name = raw.first(&["other_first_name"]).and_then(|s| clean_text(&s));

    let primary_name = full_name.clone().or_else(|| {
        let parts: Vec<&str> = [first_name.as_deref(), middle_name.as_deref(), last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    });

    let aliases: Vec<String> = strip_primary_name_alias(
        dedupe_ci(raw.aliases.iter().filter_map(|a| clean_text(a))),
        primary_name.as_deref(),
    );

    let birth_year = raw.first(&["birth_year"]).and_then(|s| s.parse().ok());
    let birth_month = raw.first(&["birth_month"]).and_then(|s| s.parse().ok());
    let birth_day = raw.first(&["birth_day"]).and_then(|s| s.parse().ok());
    let place_of_birth_text = raw.first(&["place_of_birth_text"]).and_then(|s| clean_text(&s));
    let sex = raw.first(&["sex"]).and_then(|s| clean_text(&s));
    let nationality = raw.first(&["nationality"]).and_then(|s| clean_text(&s));
    let citizenship_country = raw.first(&["citizenship_country"]).and_then(|s| clean_text(&s));
    let citizenship_country_iso = raw
        .first(&["citizenship_country_iso"])
        .or_else(|| citizenship_country.as_deref().and_then(country_to_iso2));

    let primary_address = raw.first(&["primary_address_value"]).and_then(|s| clean_text(&s));
    let city = raw.first(&["address_city"]).and_then(|s| clean_text(&s));
    let state = raw.first(&["address_state"]).and_then(|s| clean_text(&s));
    let postal_code = raw.first(&["address_postal_code"]).and_then(|s| clean_text(&s));
    let country = raw.first(&["address_country"]).and_then(|s| clean_text(&s));
    let country_iso = raw
        .first(&["address_country_iso"])
        .or_else(|| country.as_deref().and_then(country_to_iso2));

    let other_information_text = raw.first(&["other_information_text"]).and_then(|s| clean_text(&s));
    let justification_text = raw.first(&["justification_text"]).and_then(|s| clean_text(&s));

    let classification = raw
        .get("classification")
        .and_then(classification_hint)
        .unwrap_or_else(|| {
            infer_classification(
                raw,
                primary_name.as_deref(),
                other_information_text.as_deref(),
                justification_text.as_deref(),
                sex.is_some(),
                birth_year.is_some() || birth_month.is_some() || birth_day.is_some(),
                nationality.is_some() || citizenship_country.is_some(),
            )
        });

    Some(Entity {
        list_name,
        list_id,
        global_id,
        classification,
        primary_name,
        full_name,
        first_name,
        middle_name,
        last_name,
        other_first_name,
        aliases,
        birth_year,
        birth_month,
        birth_day,
        place_of_birth_text,
        sex,
        nationality,
        citizenship_country,
        citizenship_country_iso,
        primary_address,
        city,
        state,
        postal_code,
        country,
        country_iso,
        addresses: dedupe_ci(raw.alternative_addresses.iter().filter_map(|a| clean_text(a))),
        bics: clean_identifiers(&raw.bic_codes),
        ibans: clean_identifiers(&raw.iban_numbers),
        passport_numbers: clean_identifiers(&raw.passport_numbers),
        national_id_numbers: clean_identifiers(&raw.national_id_numbers),
        tax_id_numbers: clean_identifiers(&raw.tax_id_numbers),
        ssn_numbers: clean_identifiers(&raw.ssn_numbers),
        other_id_numbers: clean_identifiers(&raw.other_id_numbers),
        email_addresses: dedupe_ci(raw.contact_emails.iter().filter_map(|a| clean_text(a))),
        phone_numbers: dedupe_ci(raw.contact_phone_numbers.iter().filter_map(|a| clean_text(a))),
        websites: dedupe_ci(raw.contact_websites.iter().filter_map(|a| clean_text(a))),
        sanctions_program_name: raw.first(&["sanctions_program_name"]).and_then(|s| clean_text(&s)),
        justification_text,
        other_information_text,
        publication_date: raw.first(&["publication_date"]).and_then(|s| clean_text(&s)),
        enactment_date: raw.first(&["enactment_date"]).and_then(|s| clean_text(&s)),
        effective_date: raw.first(&["effective_date"]).and_then(|s| clean_text(&s)),
    })
}

/// Source-provided kind (OFAC `sdnType`, UK `IndividualEntityShip`, UN's
/// INDIVIDUAL/ENTITY element split, SECO's individual/entity/object,
/// Canada's EntityOrShip, the AU spreadsheet's type column), honoured in
/// place of the heuristic below when the adapter set one (SPEC_FULL.md
/// §4.2 "when the source did not say").
fn classification_hint(raw: &str) -> Option<Classification> {
    match raw.trim().to_uppercase().as_str() {
        "INDIVIDUAL" | "PERSON" => Some(Classification::Individual),
        "ENTITY" | "ORGANISATION" | "ORGANIZATION" | "COMPANY" => Some(Classification::Entity),
        "VESSEL" | "SHIP" | "BOAT" => Some(Classification::Vessel),
        "AIRCRAFT" | "PLANE" | "AIRPLANE" => Some(Classification::Aircraft),
        _ => None,
    }
}

/// Vessel/aircraft/individual/entity inference, mirroring
/// `database.py`'s regex-on-name-and-remarks heuristic plus a couple of
/// source-specific hint fields (`vessel_type`, `mmsi`, `aircraft_type`).
fn infer_classification(
    raw: &RawRecord,
    primary_name: Option<&str>,
    other_information_text: Option<&str>,
    justification_text: Option<&str>,
    has_sex: bool,
    has_dob: bool,
    has_nationality: bool,
) -> Classification {
    let haystack = format!(
        "{} {} {}",
        primary_name.unwrap_or_default(),
        other_information_text.unwrap_or_default(),
        justification_text.unwrap_or_default(),
    )
    .to_uppercase();

    let vessel_re = Regex::new(r"\b(IMO|MMSI|MT|MV|TANKER|VESSEL|SHIP)\b").expect("static regex");
    let aircraft_re = Regex::new(r"\b(AIRCRAFT|TAIL|REG)\b").expect("static regex");

    if vessel_re.is_match(&haystack) || raw.get("vessel_type").is_some() || raw.get("mmsi").is_some() {
        Classification::Vessel
    } else if aircraft_re.is_match(&haystack) || raw.get("aircraft_type").is_some() {
        Classification::Aircraft
    } else if has_sex || has_dob || has_nationality {
        Classification::Individual
    } else {
        Classification::Entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_core::Source;

    #[test]
    fn missing_list_id_is_rejected() {
        let raw = RawRecord::new(Source::OfacSdn);
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn individual_inferred_from_birth_year() {
        let mut raw = RawRecord::new(Source::OfacSdn);
        raw.list_id = Some("12345".into());
        raw.set("first_name", "John");
        raw.set("last_name", "Doe");
        raw.set("birth_year", "1970");
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.classification, Classification::Individual);
        assert_eq!(entity.primary_name.as_deref(), Some("John Doe"));
        assert_eq!(entity.global_id, "OFAC_SDN-12345");
    }

    #[test]
    fn vessel_inferred_from_name() {
        let mut raw = RawRecord::new(Source::OfacSdn);
        raw.list_id = Some("9".into());
        raw.set("full_name", "MV GLORY STAR");
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.classification, Classification::Vessel);
    }

    #[test]
    fn identifiers_are_uppercased_and_deduped() {
        let mut raw = RawRecord::new(Source::OfacSdn);
        raw.list_id = Some("2".into());
        raw.set("full_name", "Example Bank");
        raw.bic_codes = vec!["abcdus33".into(), "ABCD US33".into(), "abcdus33".into()];
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.bics, vec!["ABCDUS33".to_string()]);
    }

    #[test]
    fn alias_equal_to_primary_name_is_dropped() {
        let mut raw = RawRecord::new(Source::OfacSdn);
        raw.list_id = Some("3".into());
        raw.set("full_name", "Example Bank");
        raw.aliases = vec!["  EXAMPLE   bank".into(), "Example Bank".into(), "Ebank".into()];
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.aliases, vec!["Ebank".to_string()]);
    }

    #[test]
    fn source_provided_classification_overrides_heuristic() {
        let mut raw = RawRecord::new(Source::Un);
        raw.list_id = Some("4".into());
        raw.set("full_name", "Example Shipping Co");
        raw.set("classification", "Entity");
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.classification, Classification::Entity);
    }

    #[test]
    fn unrecognised_classification_hint_falls_back_to_heuristic() {
        let mut raw = RawRecord::new(Source::Au);
        raw.list_id = Some("5".into());
        raw.set("full_name", "MV Example");
        raw.set("classification", "Organisation/Vessel");
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.classification, Classification::Vessel);
    }

    #[test]
    fn country_resolved_from_free_text() {
        let mut raw = RawRecord::new(Source::Uk);
        raw.list_id = Some("1".into());
        raw.set("full_name", "Example Entity");
        raw.set("address_country", "Russian Federation");
        let entity = normalize(&raw).unwrap();
        assert_eq!(entity.country_iso.as_deref(), Some("RU"));
    }
}
