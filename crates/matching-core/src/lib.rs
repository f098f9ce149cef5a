//! C7 — the scorer. `score(party, record)` computes a multi-signal
//! composite match score between one ISO 20022 party and one candidate
//! watchlist entity (SPEC_FULL.md §4.6). Grounded in the teacher's
//! `MatchingEngine` shape (kept: a struct wrapping the weighted-signal
//! computation; `normalize_name`'s NFD strip-combining approach), but the
//! actual formula is replaced wholesale with the spec's fifteen-signal
//! model — the teacher's three-signal 0.70/0.20/0.10 blend has no
//! correspondence to it.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use watchlist_core::{Entity, MatchedField, Party, RiskLevel, ScoredMatch, ScoringPolicy};

const STOPWORDS: &[&str] = &["of", "the", "and"];

/// NFKD strip-combining, lowercase, split on non-alphanumerics, drop
/// tokens of length <= 2, drop stopwords. Collapses an obvious whole-name
/// duplication (`"A B A B"` -> `"A B"`) and adjacent identical tokens
/// before the length/stopword filters, per spec §4.6.
pub fn tokenize(s: &str) -> Vec<String> {
    let folded: String = s
        .nfd()
        .filter(|c| !is_combining(*c))
        .collect::<String>()
        .to_lowercase();
    let mut raw: Vec<String> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();

    raw = collapse_duplication(raw);
    raw = collapse_adjacent_repeats(raw);

    raw.into_iter()
        .filter(|t| t.chars().count() > 2 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn is_combining(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// If the whole token list splits into two equal halves, keep only the
/// first half.
fn collapse_duplication(tokens: Vec<String>) -> Vec<String> {
    let n = tokens.len();
    if n >= 2 && n % 2 == 0 {
        let (a, b) = tokens.split_at(n / 2);
        if a == b {
            return a.to_vec();
        }
    }
    tokens
}

fn collapse_adjacent_repeats(tokens: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    for t in tokens {
        if out.last() != Some(&t) {
            out.push(t);
        }
    }
    out
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let sa: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let sb: HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    let inter = sa.intersection(&sb).count();
    if inter == 0 {
        return 0.0;
    }
    let union = sa.union(&sb).count();
    inter as f64 / union as f64
}

fn norm_id(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization as _;
    s.nfkc()
        .collect::<String>()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn city_field(city: Option<&str>, state: Option<&str>) -> Vec<String> {
    [city, state]
        .into_iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect()
}

/// C7 contract: `None` only on a hard veto (date-of-birth mismatch).
pub fn score(party: &Party, record: &Entity, policy: &ScoringPolicy) -> Option<ScoredMatch> {
    let mut total = 0.0f64;
    let mut fields: Vec<MatchedField> = Vec::new();

    // --- identifier signals -------------------------------------------------
    if let Some(bic) = party.bic.as_deref().filter(|b| !b.trim().is_empty()) {
        let bic = norm_id(bic);
        if record.bics.iter().any(|b| norm_id(b) == bic) {
            total += 0.90;
            fields.push(MatchedField::new("bic", "exact"));
        }
    }
    if let Some(iban) = party.iban.as_deref().filter(|b| !b.trim().is_empty()) {
        let iban = norm_id(iban);
        if record.ibans.iter().any(|b| norm_id(b) == iban) {
            total += 0.90;
            fields.push(MatchedField::new("iban", "exact"));
        }
    }
    {
        let party_ids: Vec<String> = party
            .other_identifiers
            .iter()
            .chain(party.lei.iter())
            .chain(party.identifier.iter())
            .map(|s| norm_id(s))
            .filter(|s| !s.is_empty())
            .collect();
        let record_ids: HashSet<String> = record
            .passport_numbers
            .iter()
            .chain(record.national_id_numbers.iter())
            .chain(record.tax_id_numbers.iter())
            .chain(record.ssn_numbers.iter())
            .chain(record.other_id_numbers.iter())
            .map(|s| norm_id(s))
            .collect();
        if party_ids.iter().any(|id| record_ids.contains(id)) {
            total += 0.90;
            fields.push(MatchedField::new("id", "exact"));
        }
    }

    // --- date of birth (veto) ------------------------------------------------
    if let (Some(p_dob), Some(r_year)) = (party.date_of_birth.as_deref(), record.birth_year) {
        let p_prefix = p_dob.get(0..10).filter(|p| is_full_date_prefix(p));
        let r_full = full_record_dob(record);
        match (p_prefix, r_full.as_deref()) {
            (Some(pp), Some(rf)) => {
                if pp == rf {
                    total += 0.02;
                    fields.push(MatchedField::new("date_of_birth", "exact"));
                } else {
                    return None;
                }
            }
            _ => {
                if let Some(p_year) = p_dob.get(0..4).and_then(|y| y.parse::<i32>().ok()) {
                    if p_year == r_year {
                        total += 0.01;
                        fields.push(MatchedField::new("date_of_birth", "year"));
                    } else {
                        return None;
                    }
                }
            }
        }
    }

    // --- place of birth --------------------------------------------------
    if let Some(pob) = party.place_of_birth.as_deref().filter(|s| !s.trim().is_empty()) {
        if let Some(rpob) = record.place_of_birth_text.as_deref() {
            let pob_l = pob.to_lowercase();
            let rpob_l = rpob.to_lowercase();
            if let (Some(p_country), Some(r_country)) =
                (party.country_of_residence.as_deref(), record.citizenship_country.as_deref())
            {
                if p_country.eq_ignore_ascii_case(r_country) {
                    total += 0.01;
                    fields.push(MatchedField::new("place_of_birth_country", "exact"));
                }
            }
            if pob_l == rpob_l {
                total += 0.02;
                fields.push(MatchedField::new("place_of_birth_city", "exact"));
            } else if pob_l.contains(&rpob_l) || rpob_l.contains(&pob_l) {
                total += 0.02;
                fields.push(MatchedField::new("place_of_birth_city", "partial"));
            }
        }
    }

    // --- name ---------------------------------------------------------------
    let party_name = party.display_name().unwrap_or_default();
    let party_tokens = tokenize(&party_name);
    let record_name = record
        .primary_name
        .clone()
        .or_else(|| record.full_name.clone())
        .unwrap_or_default();
    let record_tokens = tokenize(&record_name);

    let mut name_contribution = 0.0f64;
    let mut name_label: Option<&'static str> = None;
    if !party_tokens.is_empty() && !record_tokens.is_empty() {
        let j = jaccard(&party_tokens, &record_tokens);
        if j >= 0.95 {
            name_contribution = 0.85;
            name_label = Some("name_exact");
        } else if j >= 0.70 {
            name_contribution = 0.85 * j;
            name_label = Some("name_strong");
        } else if j >= 0.40 {
            name_contribution = 0.85 * j;
            name_label = Some("name_partial");
        }

        let ends_match = party_tokens.first() == record_tokens.first()
            && party_tokens.last() == record_tokens.last();
        let subset = {
            let rset: HashSet<&str> = record_tokens.iter().map(|s| s.as_str()).collect();
            party_tokens.iter().all(|t| rset.contains(t.as_str()))
        };
        if ends_match || subset {
            if name_contribution < 0.55 {
                name_contribution = 0.55;
                if name_label.is_none() {
                    name_label = Some("name_partial");
                }
            }
        }
    }
    if name_contribution > 0.0 {
        total += name_contribution;
        fields.push(MatchedField::new("name", name_label.unwrap_or("name_partial")));
    }

    // --- aliases --------------------------------------------------------
    let party_alias_tokens: Vec<Vec<String>> =
        party.aliases.iter().map(|a| tokenize(a)).filter(|t| !t.is_empty()).collect();
    let record_alias_tokens: Vec<Vec<String>> =
        record.aliases.iter().map(|a| tokenize(a)).filter(|t| !t.is_empty()).collect();
    let mut best_alias_j = 0.0f64;
    for pa in &party_alias_tokens {
        for ra in &record_alias_tokens {
            let j = jaccard(pa, ra);
            if j > best_alias_j {
                best_alias_j = j;
            }
        }
    }
    if best_alias_j >= 0.70 {
        total += 0.40;
        fields.push(MatchedField::new("alias", "strong"));
    } else if best_alias_j >= 0.30 {
        total += 0.25;
        fields.push(MatchedField::new("alias", "partial"));
    } else if best_alias_j > 0.0 {
        total += 0.10;
        fields.push(MatchedField::new("alias", "match"));
    }

    // --- country ----------------------------------------------------------
    if let (Some(pc), Some(rc)) = (party.country.as_deref(), record.country.as_deref()) {
        if pc.eq_ignore_ascii_case(rc) {
            total += 0.03;
            fields.push(MatchedField::new("country", "exact"));
        } else if let (Some(pci), Some(rci)) =
            (party.country_iso.as_deref(), record.country_iso.as_deref())
        {
            if pci.eq_ignore_ascii_case(rci) {
                total += 0.03;
                fields.push(MatchedField::new("country", "iso_match"));
            }
        }
    } else if let (Some(pci), Some(rci)) =
        (party.country_iso.as_deref(), record.country_iso.as_deref())
    {
        if pci.eq_ignore_ascii_case(rci) {
            total += 0.03;
            fields.push(MatchedField::new("country", "iso_match"));
        }
    }

    // --- city / state -------------------------------------------------------
    if let (Some(pcity), Some(rcity)) = (party.city.as_deref(), record.city.as_deref()) {
        if pcity.eq_ignore_ascii_case(rcity) {
            total += 0.04;
            fields.push(MatchedField::new("town", "exact"));
        } else {
            let fields_r = city_field(record.city.as_deref(), record.state.as_deref());
            let pcity_l = pcity.to_lowercase();
            if fields_r.iter().any(|f| f.contains(&pcity_l) || pcity_l.contains(f.as_str())) {
                total += 0.02;
                fields.push(MatchedField::new("town", "partial"));
            }
        }
    }
    if let (Some(pstate), Some(rstate)) = (party.state.as_deref(), record.state.as_deref()) {
        if pstate.eq_ignore_ascii_case(rstate) {
            total += 0.03;
            fields.push(MatchedField::new("state", "exact"));
        } else if pstate.to_lowercase().contains(&rstate.to_lowercase())
            || rstate.to_lowercase().contains(&pstate.to_lowercase())
        {
            total += 0.01;
            fields.push(MatchedField::new("state", "partial"));
        }
    }

    // --- street / address --------------------------------------------------
    if let (Some(pstreet), Some(rstreet)) =
        (party.street.as_deref(), record.primary_address.as_deref())
    {
        if pstreet.eq_ignore_ascii_case(rstreet) {
            total += 0.40;
            fields.push(MatchedField::new("street", "exact"));
        } else {
            let p_tokens = tokenize(pstreet);
            let mut best = 0.0f64;
            for addr in std::iter::once(rstreet).chain(record.addresses.iter().map(|s| s.as_str()))
            {
                let j = jaccard(&p_tokens, &tokenize(addr));
                if j > best {
                    best = j;
                }
            }
            if best > 0.60 {
                total += 0.30 * best;
                fields.push(MatchedField::new("street", "partial"));
            }
        }
    }

    // --- email ---------------------------------------------------------------
    if let Some(pemail) = party.email.as_deref().filter(|e| !e.trim().is_empty()) {
        let pemail_l = pemail.to_lowercase();
        if record
            .email_addresses
            .iter()
            .any(|e| e.to_lowercase() == pemail_l)
        {
            total += 0.90;
            fields.push(MatchedField::new("email", "exact"));
        } else if let Some((p_local, p_domain)) = pemail_l.split_once('@') {
            for remail in &record.email_addresses {
                let remail_l = remail.to_lowercase();
                if let Some((r_local, r_domain)) = remail_l.split_once('@') {
                    if p_domain == r_domain
                        && (p_local == r_local
                            || p_local.contains(r_local)
                            || r_local.contains(p_local))
                        && (p_local.len() as i64 - r_local.len() as i64).abs() <= 2
                    {
                        total += 0.30;
                        fields.push(MatchedField::new("email", "partial"));
                        break;
                    }
                }
            }
        }
    }

    // Null is reserved for the DOB veto above (`return None` earlier in
    // this function) — every non-vetoed pair produces a `Some`, even one
    // with a zero score and no fired signal, per the C7 contract (§4.6).
    let capped = total.min(1.0);
    let final_score = (capped * 100.0).round().clamp(0.0, 100.0) as i32;
    let risk_level: RiskLevel = policy.risk_bands.level_for(capped);

    if capped > 0.0 && fields.is_empty() {
        fields.push(MatchedField::new("name", "name_partial"));
    }

    let mut summary_parts: Vec<&str> = Vec::new();
    if let Some(j) = record.justification_text.as_deref() {
        summary_parts.push(j);
    }
    if let Some(o) = record.other_information_text.as_deref() {
        summary_parts.push(o);
    }

    Some(ScoredMatch {
        party_index: party.party_index,
        party_name,
        role: party.role.clone(),
        sanctions_name: record_name,
        sanctions_aliases: record.aliases.clone(),
        sanctions_list: record.list_name.clone(),
        sanctions_id: record.list_id.clone(),
        risk_level,
        final_score,
        matched_fields: fields,
        match_summary: summary_parts.join(" "),
    })
}

fn is_full_date_prefix(s: &str) -> bool {
    s.len() == 10
        && s.as_bytes()[4] == b'-'
        && s.as_bytes()[7] == b'-'
        && s[0..4].chars().all(|c| c.is_ascii_digit())
        && s[5..7].chars().all(|c| c.is_ascii_digit())
        && s[8..10].chars().all(|c| c.is_ascii_digit())
}

fn full_record_dob(record: &Entity) -> Option<String> {
    match (record.birth_year, record.birth_month, record.birth_day) {
        (Some(y), Some(m), Some(d)) => Some(format!("{y:04}-{m:02}-{d:02}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_core::Classification;

    fn base_entity() -> Entity {
        Entity {
            list_name: "OFAC_SDN".into(),
            list_id: "1".into(),
            global_id: "OFAC_SDN-1".into(),
            classification: Classification::Individual,
            primary_name: Some("Vladimir P. Petrov".into()),
            full_name: None,
            first_name: None,
            middle_name: None,
            last_name: None,
            other_first_name: None,
            aliases: vec![],
            birth_year: None,
            birth_month: None,
            birth_day: None,
            place_of_birth_text: None,
            sex: None,
            nationality: None,
            citizenship_country: None,
            citizenship_country_iso: None,
            primary_address: None,
            city: Some("Moscow".into()),
            state: None,
            postal_code: None,
            country: None,
            country_iso: None,
            addresses: vec![],
            bics: vec![],
            ibans: vec![],
            passport_numbers: vec![],
            national_id_numbers: vec![],
            tax_id_numbers: vec![],
            ssn_numbers: vec![],
            other_id_numbers: vec![],
            email_addresses: vec![],
            phone_numbers: vec![],
            websites: vec![],
            sanctions_program_name: None,
            justification_text: None,
            other_information_text: None,
            publication_date: None,
            enactment_date: None,
            effective_date: None,
        }
    }

    #[test]
    fn tokenize_collapses_duplication() {
        assert_eq!(tokenize("Acme Widgets Acme Widgets"), vec!["acme", "widgets"]);
    }

    #[test]
    fn bic_exact_scores_very_high() {
        let mut record = base_entity();
        record.bics = vec!["BNPAFRPP".into()];
        let mut party = Party::new(0, "Debtor");
        party.bic = Some("BNPAFRPP".into());
        let m = score(&party, &record, &ScoringPolicy::default()).unwrap();
        assert!(m.matched_fields.iter().any(|f| f.field == "bic" && f.strength == "exact"));
        assert!(m.final_score >= 90);
        assert_eq!(m.risk_level, RiskLevel::VeryHighRisk);
    }

    #[test]
    fn strong_name_plus_city_partial() {
        let record = base_entity();
        let mut party = Party::new(0, "Debtor");
        party.name = Some("Vladimir Petrov".into());
        party.city = Some("Moscow".into());
        let m = score(&party, &record, &ScoringPolicy::default()).unwrap();
        assert!(m.final_score >= 70 && m.final_score <= 89);
        assert_eq!(m.risk_level, RiskLevel::HighRisk);
    }

    #[test]
    fn dob_mismatch_vetoes() {
        let mut record = base_entity();
        record.primary_name = Some("John Smith".into());
        record.birth_year = Some(1985);
        record.birth_month = Some(5);
        record.birth_day = Some(1);
        let mut party = Party::new(0, "Debtor");
        party.name = Some("John Smith".into());
        party.date_of_birth = Some("1970-05-01".into());
        assert!(score(&party, &record, &ScoringPolicy::default()).is_none());
    }

    #[test]
    fn dob_match_adds_exact() {
        let mut record = base_entity();
        record.primary_name = Some("John Smith".into());
        record.birth_year = Some(1985);
        record.birth_month = Some(5);
        record.birth_day = Some(1);
        let mut party = Party::new(0, "Debtor");
        party.name = Some("John Smith".into());
        party.date_of_birth = Some("1985-05-01".into());
        let m = score(&party, &record, &ScoringPolicy::default()).unwrap();
        assert!(m
            .matched_fields
            .iter()
            .any(|f| f.field == "date_of_birth" && f.strength == "exact"));
    }

    #[test]
    fn clear_party_scores_zero_not_veto() {
        // Unrelated party/candidate pair: the scorer still returns `Some`
        // (null is reserved for the DOB veto, §4.6) with a zero score and
        // "no risk" level; it's the aggregator (C8), not the scorer, that
        // keeps this out of the surfaced `matches[]` (S1).
        let mut record = base_entity();
        record.primary_name = Some("Acme Global Holdings".into());
        record.list_name = "UK".into();
        let mut party = Party::new(0, "Debtor");
        party.name = Some("ACME Widgets Ltd".into());
        party.country = Some("DE".into());
        let m = score(&party, &record, &ScoringPolicy::default()).unwrap();
        assert_eq!(m.final_score, 0);
        assert_eq!(m.risk_level, RiskLevel::NoRisk);
    }

    #[test]
    fn symmetry_ignores_alias_order() {
        let mut record_a = base_entity();
        record_a.primary_name = Some("Example Corp".into());
        record_a.aliases = vec!["Alpha".into(), "Beta".into()];
        let mut record_b = record_a.clone();
        record_b.aliases = vec!["Beta".into(), "Alpha".into()];

        let mut party = Party::new(0, "Debtor");
        party.name = Some("Example Corp".into());
        party.aliases = vec!["Beta".into(), "Alpha".into()];

        let a = score(&party, &record_a, &ScoringPolicy::default());
        let b = score(&party, &record_b, &ScoringPolicy::default());
        assert_eq!(a.map(|m| m.final_score), b.map(|m| m.final_score));
    }
}
