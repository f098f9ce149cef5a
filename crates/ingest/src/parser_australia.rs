//! C2 adapter — DFAT (Australia) consolidated list. The only one of the
//! eight feeds published as a spreadsheet rather than XML; read with
//! `calamine` and mapped through a header-alias table since DFAT has
//! renamed columns across releases. Grounded in
//! `original_source/src/AUload.py::AU_extract`.

use std::io::Cursor;

use anyhow::{Context, Result};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use watchlist_core::{RawRecord, Source};

struct ColumnMap {
    name: Option<usize>,
    classification: Option<usize>,
    aliases: Option<usize>,
    dob: Option<usize>,
    place_of_birth: Option<usize>,
    nationality: Option<usize>,
    citizenship: Option<usize>,
    address: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    postal_code: Option<usize>,
    country: Option<usize>,
    program: Option<usize>,
    reason: Option<usize>,
    publication_date: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
    website: Option<usize>,
    passport: Option<usize>,
    national_id: Option<usize>,
}

const NAME_COLS: &[&str] = &["name", "primary name", "full name"];
const CLASS_COLS: &[&str] = &["type", "entity type", "individual/entity", "individualentityship"];
const ALIAS_COLS: &[&str] = &["aliases", "also known as", "a.k.a.", "aka", "alternative names"];
const DOB_COLS: &[&str] = &["date of birth", "dob", "dates of birth"];
const POB_COLS: &[&str] = &["place of birth", "pob", "birth place", "town of birth", "city of birth", "country of birth"];
const NATIONALITY_COLS: &[&str] = &["nationality", "nationalities"];
const CITIZENSHIP_COLS: &[&str] = &["citizenship", "citizenships"];
const ADDRESS_COLS: &[&str] = &["address", "address line 1"];
const CITY_COLS: &[&str] = &["city", "town"];
const STATE_COLS: &[&str] = &["state/province", "province/state"];
const POSTAL_COLS: &[&str] = &["postcode", "postal code", "zip"];
const COUNTRY_COLS: &[&str] = &["country"];
const PROGRAM_COLS: &[&str] = &["regime", "sanctions regime", "program", "programme", "regime name"];
const REASON_COLS: &[&str] = &["reason", "statement of reasons", "uk statement of reasons", "other information", "remarks"];
const PUB_COLS: &[&str] = &["last updated", "publication date", "updated", "listed date", "date listed", "date designated"];
const EMAIL_COLS: &[&str] = &["email", "email address", "emails"];
const PHONE_COLS: &[&str] = &["phone", "telephone", "phone number", "phone numbers", "telephone number"];
const WEBSITE_COLS: &[&str] = &["website", "web", "url"];
const PASSPORT_COLS: &[&str] = &["passport", "passport number", "passports"];
const NATIONAL_ID_COLS: &[&str] = &["national id", "national identifier", "national identity number", "national id number"];

fn find_col(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h.eq_ignore_ascii_case(c)))
}

pub fn parse_australia_xlsx(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(cursor).context("opening DFAT consolidated list workbook")?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("DFAT workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .context("reading DFAT worksheet")?;

    let mut rows = range.rows();
    let header_row = match rows.next() {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };
    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();

    let map = ColumnMap {
        name: find_col(&headers, NAME_COLS),
        classification: find_col(&headers, CLASS_COLS),
        aliases: find_col(&headers, ALIAS_COLS),
        dob: find_col(&headers, DOB_COLS),
        place_of_birth: find_col(&headers, POB_COLS),
        nationality: find_col(&headers, NATIONALITY_COLS),
        citizenship: find_col(&headers, CITIZENSHIP_COLS),
        address: find_col(&headers, ADDRESS_COLS),
        city: find_col(&headers, CITY_COLS),
        state: find_col(&headers, STATE_COLS),
        postal_code: find_col(&headers, POSTAL_COLS),
        country: find_col(&headers, COUNTRY_COLS),
        program: find_col(&headers, PROGRAM_COLS),
        reason: find_col(&headers, REASON_COLS),
        publication_date: find_col(&headers, PUB_COLS),
        email: find_col(&headers, EMAIL_COLS),
        phone: find_col(&headers, PHONE_COLS),
        website: find_col(&headers, WEBSITE_COLS),
        passport: find_col(&headers, PASSPORT_COLS),
        national_id: find_col(&headers, NATIONAL_ID_COLS),
    };

    let mut out = Vec::new();
    for (row_idx, row) in rows.enumerate() {
        let get = |col: Option<usize>| col.and_then(|i| row.get(i)).map(cell_to_string).filter(|s| !s.trim().is_empty());

        let name = get(map.name);
        if name.is_none() {
            continue;
        }

        let mut r = RawRecord::new(Source::Au);
        r.list_id = Some((row_idx + 1).to_string());
        r.set("full_name", name.unwrap());
        if let Some(v) = get(map.classification) {
            r.set("classification", v);
        }
        if let Some(v) = get(map.dob) {
            if let Some(year) = v.get(0..4).filter(|y| y.chars().all(|c| c.is_ascii_digit())) {
                r.set("birth_year", year.to_string());
            }
        }
        if let Some(v) = get(map.place_of_birth) {
            r.set("place_of_birth_text", v);
        }
        if let Some(v) = get(map.nationality) {
            r.set("nationality", v);
        }
        if let Some(v) = get(map.citizenship) {
            r.set("citizenship_country", v);
        }
        if let Some(v) = get(map.address) {
            r.set("primary_address_value", v);
        }
        if let Some(v) = get(map.city) {
            r.set("address_city", v);
        }
        if let Some(v) = get(map.state) {
            r.set("address_state", v);
        }
        if let Some(v) = get(map.postal_code) {
            r.set("address_postal_code", v);
        }
        if let Some(v) = get(map.country) {
            r.set("address_country", v);
        }
        if let Some(v) = get(map.program) {
            r.set("sanctions_program_name", v);
        }
        if let Some(v) = get(map.reason) {
            r.set("other_information_text", v);
        }
        if let Some(v) = get(map.publication_date) {
            r.set("publication_date", v);
        }
        if let Some(v) = get(map.aliases) {
            r.aliases = watchlist_core::split_aliases(&v);
        }
        if let Some(v) = get(map.email) {
            r.contact_emails.push(v);
        }
        if let Some(v) = get(map.phone) {
            r.contact_phone_numbers.push(v);
        }
        if let Some(v) = get(map.website) {
            r.contact_websites.push(v);
        }
        if let Some(v) = get(map.passport) {
            r.passport_numbers.push(v);
        }
        if let Some(v) = get(map.national_id) {
            r.national_id_numbers.push(v);
        }

        out.push(r);
    }

    tracing::info!(count = out.len(), "parsed DFAT consolidated list rows");
    Ok(out)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_col_is_case_insensitive() {
        let headers = vec!["Name".to_string(), "Aliases".to_string(), "Country".to_string()];
        assert_eq!(find_col(&headers, NAME_COLS), Some(0));
        assert_eq!(find_col(&headers, ALIAS_COLS), Some(1));
        assert_eq!(find_col(&headers, COUNTRY_COLS), Some(2));
    }

    #[test]
    fn alias_cell_splits_on_semicolon_not_embedded_commas() {
        let aliases = watchlist_core::split_aliases("Doe, Jane; Smith, John");
        assert_eq!(aliases, vec!["Doe, Jane".to_string(), "Smith, John".to_string()]);
    }
}
