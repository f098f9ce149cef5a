//! C2 adapter — OFAC SDN and Consolidated lists. Both publications share
//! one XML schema (`sdnEntry` under a namespaced root); this file handles
//! both, selected by the `Source` passed in. Grounded in
//! `original_source/src/OFACload.py::OFAC_extract`.

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use watchlist_core::{RawRecord, Source};

pub fn parse_ofac_xml(xml_data: &[u8], source: Source) -> Result<Vec<RawRecord>> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut builder: Option<Builder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "sdnEntry" {
                    builder = Some(Builder::default());
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "sdnEntry" {
                    if let Some(b) = builder.take() {
                        out.push(b.build(source));
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                if let Some(b) = builder.as_mut() {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        b.on_text(&stack, &text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "OFAC XML parse error, continuing");
            }
            _ => {}
        }
        buf.clear();
    }

    tracing::info!(count = out.len(), source = ?source, "parsed OFAC records");
    Ok(out)
}

fn local_name(raw: &[u8]) -> String {
    let full = String::from_utf8_lossy(raw);
    full.rsplit(':').next().unwrap_or(&full).to_string()
}

#[derive(Default)]
struct Builder {
    list_id: Option<String>,
    sdn_type: Option<String>,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    aliases: Vec<String>,
    alias_parts: Vec<String>,
    countries: Vec<String>,
    nationalities: Vec<String>,
    sex: Option<String>,
    place_of_birth: Option<String>,
    birth_year: Option<String>,
    birth_month: Option<String>,
    birth_day: Option<String>,
    address_country: Option<String>,
    address_city: Option<String>,
    address_state: Option<String>,
    address_postal: Option<String>,
    primary_address: Option<String>,
    programs: Vec<String>,
    remarks: Option<String>,
    emails: Vec<String>,
    websites: Vec<String>,
    phones: Vec<String>,
    faxes: Vec<String>,
    bics: Vec<String>,
    ibans: Vec<String>,
    ssns: Vec<String>,
    passports: Vec<String>,
    national_ids: Vec<String>,
    tax_ids: Vec<String>,
    other_ids: Vec<String>,
    in_aka: bool,
    cur_id_type: Option<String>,
    seen_addresses: bool,
}

impl Builder {
    fn on_text(&mut self, stack: &[String], text: &str) {
        let tag = stack.last().map(|s| s.as_str()).unwrap_or("");
        let parent = if stack.len() >= 2 { stack[stack.len() - 2].as_str() } else { "" };
        match tag {
            "uid" => self.list_id = Some(text.to_string()),
            "sdnType" => self.sdn_type = Some(text.to_string()),
            "firstName" if parent == "sdnEntry" => self.first_name = Some(text.to_string()),
            "middleName" if parent == "sdnEntry" => self.middle_name = Some(text.to_string()),
            "lastName" if parent == "sdnEntry" => self.last_name = Some(text.to_string()),
            "firstName" if parent == "aka" => self.alias_parts.push(text.to_string()),
            "middleName" if parent == "aka" => self.alias_parts.push(text.to_string()),
            "lastName" if parent == "aka" => {
                self.alias_parts.push(text.to_string());
            }
            "nationality" => self.nationalities.push(text.to_string()),
            "citizenship" => self.countries.push(text.to_string()),
            "gender" => self.sex = Some(text.to_string()),
            "placeOfBirth" if self.place_of_birth.is_none() => {
                self.place_of_birth = Some(text.to_string());
            }
            "dateOfBirth" if self.birth_year.is_none() => {
                if text.len() >= 10 && text.as_bytes()[4] == b'-' && text.as_bytes()[7] == b'-' {
                    self.birth_year = Some(text[0..4].to_string());
                    self.birth_month = Some(text[5..7].to_string());
                    self.birth_day = Some(text[8..10].to_string());
                } else if text.len() >= 4 {
                    self.birth_year = Some(text[0..4].to_string());
                }
            }
            "address1" | "address2" if !self.seen_addresses => {
                if self.primary_address.is_none() {
                    self.primary_address = Some(text.to_string());
                }
            }
            "city" if !self.seen_addresses => self.address_city = Some(text.to_string()),
            "stateOrProvince" if !self.seen_addresses => self.address_state = Some(text.to_string()),
            "postalCode" if !self.seen_addresses => self.address_postal = Some(text.to_string()),
            "country" if parent == "address" => {
                if self.address_country.is_none() {
                    self.address_country = Some(text.to_string());
                }
            }
            "program" => self.programs.push(text.to_string()),
            "remarks" => self.remarks = Some(text.to_string()),
            "idType" => self.cur_id_type = Some(text.to_lowercase()),
            "idNumber" => {
                let flat: String = self
                    .cur_id_type
                    .take()
                    .unwrap_or_default()
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != '.' && *c != ':')
                    .collect();
                self.classify_id(&flat, text);
            }
            _ => {}
        }
        if tag == "aka" {
            // end-of-element handling for alias assembly happens on End event in caller;
            // kept here as a no-op branch for clarity of the match.
        }
    }

    fn classify_id(&mut self, flat: &str, value: &str) {
        if flat.contains("email") && value.contains('@') {
            self.emails.push(value.to_string());
        } else if flat.contains("website") || flat.contains("url") {
            self.websites.push(value.to_string());
        } else if flat.contains("telephone") || flat.contains("phone") {
            self.phones.push(value.to_string());
        } else if flat.contains("fax") {
            self.faxes.push(value.to_string());
        } else if flat.contains("swift") || flat.contains("bic") {
            self.bics.push(value.to_string());
        } else if flat.contains("iban") {
            self.ibans.push(value.to_string());
        } else if flat.starts_with("ssn") {
            self.ssns.push(value.to_string());
        } else if flat.contains("passport") {
            self.passports.push(value.to_string());
        } else if flat.contains("nationalid") {
            self.national_ids.push(value.to_string());
        } else if flat.contains("tax") {
            self.tax_ids.push(value.to_string());
        } else {
            self.other_ids.push(value.to_string());
        }
    }

    fn build(mut self, source: Source) -> RawRecord {
        let mut r = RawRecord::new(source);
        if let Some(id) = self.list_id.take() {
            r.list_id = Some(id);
        }
        if !self.alias_parts.is_empty() {
            self.aliases.push(self.alias_parts.join(" "));
        }

        let full_name = {
            let parts: Vec<&str> = [
                self.first_name.as_deref(),
                self.middle_name.as_deref(),
                self.last_name.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        };

        if let Some(v) = full_name {
            r.set("full_name", v);
        }
        if let Some(v) = self.first_name {
            r.set("first_name", v);
        }
        if let Some(v) = self.middle_name {
            r.set("middle_name", v);
        }
        if let Some(v) = self.last_name {
            r.set("last_name", v);
        }
        if let Some(v) = self.sdn_type {
            r.set("classification", v);
        }
        if let Some(v) = self.sex {
            r.set("sex", v);
        }
        if let Some(v) = self.place_of_birth {
            r.set("place_of_birth_text", v);
        }
        if let Some(v) = self.birth_year {
            r.set("birth_year", v);
        }
        if let Some(v) = self.birth_month {
            r.set("birth_month", v);
        }
        if let Some(v) = self.birth_day {
            r.set("birth_day", v);
        }
        if !self.nationalities.is_empty() {
            r.set("nationality", self.nationalities.join("; "));
        }
        if !self.countries.is_empty() {
            r.set("citizenship_country", self.countries.join("; "));
        }
        if let Some(v) = self.address_country {
            r.set("address_country", v);
        }
        if let Some(v) = self.address_city {
            r.set("address_city", v);
        }
        if let Some(v) = self.address_state {
            r.set("address_state", v);
        }
        if let Some(v) = self.address_postal {
            r.set("address_postal_code", v);
        }
        if let Some(v) = self.primary_address {
            r.set("primary_address_value", v);
        }
        if !self.programs.is_empty() {
            r.set("sanctions_program_name", self.programs.join("; "));
        }
        if let Some(v) = self.remarks {
            r.set("justification_text", v);
        }

        r.aliases = self.aliases;
        r.contact_emails = self.emails;
        r.contact_websites = self.websites;
        r.contact_phone_numbers = self.phones;
        r.contact_fax_numbers = self.faxes;
        r.bic_codes = self.bics;
        r.iban_numbers = self.ibans;
        r.ssn_numbers = self.ssns;
        r.passport_numbers = self.passports;
        r.national_id_numbers = self.national_ids;
        r.tax_id_numbers = self.tax_ids;
        r.other_id_numbers = self.other_ids;
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_individual_entry() {
        let xml = br#"<?xml version="1.0"?>
        <sdnList>
            <sdnEntry>
                <uid>12345</uid>
                <sdnType>Individual</sdnType>
                <firstName>John</firstName>
                <lastName>Doe</lastName>
                <dateOfBirth>1970-01-15</dateOfBirth>
                <akaList>
                    <aka><firstName>Johnny</firstName><lastName>D</lastName></aka>
                </akaList>
            </sdnEntry>
        </sdnList>"#;

        let records = parse_ofac_xml(xml, Source::OfacSdn).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.list_id.as_deref(), Some("12345"));
        assert_eq!(r.get("full_name"), Some("John Doe"));
        assert_eq!(r.get("birth_year"), Some("1970"));
        assert_eq!(r.aliases, vec!["Johnny D"]);
    }
}
