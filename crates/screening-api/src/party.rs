//! Party normaliser (C6): mirrors C3 for the input side of a screening
//! request, turning one [`iso20022::RawParty`] into the
//! `watchlist_core::Party` shape the scorer treats symmetrically with an
//! indexed `Entity`. Grounded in
//! `original_source/src/returnitems.py::_extract_party_record` (the
//! BIC/LEI/Identifier/Account Id name-fallback order, identifier
//! upper-casing) and SPEC_FULL.md §4.5.

use unicode_normalization::UnicodeNormalization;
use watchlist_core::{clean_text, country_to_iso2, Party};

use crate::iso20022::RawParty;

/// NFKC + uppercase + strip whitespace, same treatment the ingest
/// normaliser gives sanctions-list identifiers (SPEC_FULL.md §4.5 "upper-
/// cased and space-stripped").
fn clean_identifier(v: &str) -> Option<String> {
    let folded: String = v.nfkc().collect();
    let stripped: String = folded.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

pub fn normalize_party(party_index: usize, raw: &RawParty) -> Party {
    let mut party = Party::new(party_index, raw.role);

    party.name = raw.name.as_deref().and_then(clean_text);
    party.aliases = raw.aliases.iter().filter_map(|a| clean_text(a)).collect();

    party.street = raw.street.as_deref().and_then(clean_text);
    party.city = raw.city.as_deref().and_then(clean_text);
    party.state = raw.state.as_deref().and_then(clean_text);
    party.postal_code = raw.postal_code.as_deref().and_then(clean_text);
    party.country = raw.country.as_deref().and_then(clean_text);
    // ISO 20022 postal addresses already carry alpha-2 country codes
    // (PstlAdr/Ctry); run it through C1 anyway so a free-text country
    // name resolves the same way it does on the record side (§4.2).
    party.country_iso = party.country.as_deref().and_then(country_to_iso2);
    party.address_line = raw.address_line.as_deref().and_then(clean_text);

    party.email = raw.email.as_deref().and_then(clean_text);
    party.phone = raw.phone.as_deref().and_then(clean_text);
    // Preserved as-is for equality/year checks; no timezone logic (§4.5).
    party.date_of_birth = raw.date_of_birth.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    party.place_of_birth = raw.place_of_birth.as_deref().and_then(clean_text);
    party.country_of_residence = raw.country_of_residence.as_deref().and_then(clean_text);

    party.iban = raw.iban.as_deref().and_then(clean_identifier);
    party.bic = raw.bic.as_deref().and_then(clean_identifier);
    party.lei = raw.lei.as_deref().and_then(clean_identifier);
    party.any_bic = raw.any_bic.as_deref().and_then(clean_identifier);
    party.identifier = raw.identifier.as_deref().and_then(clean_identifier);
    party.account_id = raw.account_id.as_deref().and_then(clean_identifier);
    party.other_identifiers = raw.other_identifiers.iter().filter_map(|v| clean_identifier(v)).collect();

    // Missing name backfilled from BIC, LEI, Identifier, Account Id, in
    // that order (§11 Open Question resolution).
    if party.name.is_none() {
        party.name = party
            .bic
            .clone()
            .or_else(|| party.lei.clone())
            .or_else(|| party.identifier.clone())
            .or_else(|| party.account_id.clone());
    }

    party
}
