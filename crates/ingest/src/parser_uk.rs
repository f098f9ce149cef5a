//! C2 adapter — UK (OFSI) sanctions list. `Designation` elements carry
//! `Names/Name` (primary + aliases distinguished by `NameType`),
//! `Addresses/Address`, and `IndividualDetails/Individual` for
//! birth/gender/place-of-birth. Grounded in
//! `original_source/src/UKload.py::UK_extract`.

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use watchlist_core::{RawRecord, Source};

pub fn parse_uk_xml(xml_data: &[u8]) -> Result<Vec<RawRecord>> {
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
                if name == "Designation" {
                    builder = Some(Builder::default());
                }
                if name == "Name" {
                    if let Some(b) = builder.as_mut() {
                        b.start_name();
                    }
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "Name" {
                    if let Some(b) = builder.as_mut() {
                        b.end_name();
                    }
                }
                if name == "Designation" {
                    if let Some(b) = builder.take() {
                        out.push(b.build());
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                if let Some(b) = builder.as_mut() {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        b.on_text(stack.last().map(|s| s.as_str()).unwrap_or(""), &text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => tracing::warn!(error = %e, "UK XML parse error, continuing"),
            _ => {}
        }
        buf.clear();
    }

    tracing::info!(count = out.len(), "parsed UK records");
    Ok(out)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_string()
}

#[derive(Default)]
struct Builder {
    unique_id: Option<String>,
    regime: Option<String>,
    individual_entity_ship: Option<String>,
    other_information: Option<String>,

    in_name: bool,
    current_name_type: Option<String>,
    current_name_parts: Vec<String>,
    primary_name: Option<String>,
    aliases: Vec<String>,

    address_country: Option<String>,
    address_city: Option<String>,
    address_postal: Option<String>,
    address_line: Option<String>,

    phones: Vec<String>,
    emails: Vec<String>,

    sex: Option<String>,
    dob: Option<String>,
    town_of_birth: Option<String>,
    country_of_birth: Option<String>,
}

impl Builder {
    fn start_name(&mut self) {
        self.in_name = true;
        self.current_name_type = None;
        self.current_name_parts.clear();
    }

    fn end_name(&mut self) {
        self.in_name = false;
        if self.current_name_parts.is_empty() {
            return;
        }
        let joined = self.current_name_parts.join(" ");
        let is_alias = self
            .current_name_type
            .as_deref()
            .map(|t| t.to_lowercase().contains("aka"))
            .unwrap_or(false);
        if is_alias || self.primary_name.is_some() {
            self.aliases.push(joined);
        } else {
            self.primary_name = Some(joined);
        }
    }

    fn on_text(&mut self, tag: &str, text: &str) {
        if self.in_name {
            match tag {
                "NameType" => self.current_name_type = Some(text.to_string()),
                "Name1" | "Name2" | "Name3" | "Name4" | "Name5" | "Name6" => {
                    self.current_name_parts.push(text.to_string())
                }
                _ => {}
            }
            return;
        }
        match tag {
            "UniqueID" => self.unique_id = Some(text.to_string()),
            "RegimeName" => self.regime = Some(text.to_string()),
            "IndividualEntityShip" => self.individual_entity_ship = Some(text.to_string()),
            "OtherInformation" | "UKStatementofReasons" => {
                self.other_information = Some(match self.other_information.take() {
                    Some(existing) => format!("{existing} {text}"),
                    None => text.to_string(),
                });
            }
            "AddressCountry" if self.address_country.is_none() => {
                self.address_country = Some(text.to_string())
            }
            "AddressLine1" if self.address_line.is_none() => {
                self.address_line = Some(text.to_string())
            }
            "AddressPostalCode" if self.address_postal.is_none() => {
                self.address_postal = Some(text.to_string())
            }
            "PhoneNumber" => self.phones.push(text.to_string()),
            "EmailAddress" => self.emails.push(text.to_string()),
            "DOB" if self.dob.is_none() => self.dob = Some(text.to_string()),
            "Gender" if self.sex.is_none() => self.sex = Some(text.to_string()),
            "TownOfBirth" if self.town_of_birth.is_none() => {
                self.town_of_birth = Some(text.to_string())
            }
            "CountryOfBirth" if self.country_of_birth.is_none() => {
                self.country_of_birth = Some(text.to_string())
            }
            _ => {}
        }
    }

    fn build(self) -> RawRecord {
        let mut r = RawRecord::new(Source::Uk);
        r.list_id = self.unique_id;
        if let Some(v) = self.primary_name {
            r.set("full_name", v);
        }
        if let Some(v) = self.regime {
            r.set("sanctions_program_name", v);
        }
        if let Some(v) = self.individual_entity_ship {
            r.set("classification", v);
        }
        if let Some(v) = self.other_information {
            r.set("other_information_text", v);
        }
        if let Some(v) = self.address_country {
            r.set("address_country", v);
        }
        if let Some(v) = self.address_city {
            r.set("address_city", v);
        }
        if let Some(v) = self.address_postal {
            r.set("address_postal_code", v);
        }
        if let Some(v) = self.address_line {
            r.set("primary_address_value", v);
        }
        if let Some(v) = self.sex {
            r.set("sex", v);
        }
        if let Some(v) = self.country_of_birth {
            r.set("citizenship_country", v);
        }
        if let Some(v) = self.town_of_birth {
            r.set("place_of_birth_text", v);
        } else if let Some(c) = r.get("citizenship_country").map(str::to_string) {
            r.set("place_of_birth_text", c);
        }
        if let Some(dob) = self.dob {
            if dob.len() >= 10 && dob.as_bytes()[4] == b'-' && dob.as_bytes()[7] == b'-' {
                r.set("birth_year", dob[0..4].to_string());
                r.set("birth_month", dob[5..7].to_string());
                r.set("birth_day", dob[8..10].to_string());
            } else if dob.len() >= 4 {
                r.set("birth_year", dob[0..4].to_string());
            }
        }
        r.aliases = self.aliases;
        r.contact_phone_numbers = self.phones;
        r.contact_emails = self.emails;
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_individual_with_aliases() {
        let xml = br#"<UK_Sanctions_List>
            <Designation>
                <UniqueID>UK001</UniqueID>
                <RegimeName>Cyber</RegimeName>
                <IndividualEntityShip>Individual</IndividualEntityShip>
                <Names>
                    <Name><NameType>Primary name</NameType><Name1>Alex</Name1><Name6>Tester</Name6></Name>
                    <Name><NameType>AKA</NameType><Name1>A.</Name1><Name6>T.</Name6></Name>
                </Names>
                <IndividualDetails>
                    <Individual>
                        <DOBs><DOB>1990-02-03</DOB></DOBs>
                    </Individual>
                </IndividualDetails>
            </Designation>
        </UK_Sanctions_List>"#;

        let records = parse_uk_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].list_id.as_deref(), Some("UK001"));
        assert_eq!(records[0].get("full_name"), Some("Alex Tester"));
        assert_eq!(records[0].aliases, vec!["A. T."]);
        assert_eq!(records[0].get("birth_year"), Some("1990"));
    }
}
