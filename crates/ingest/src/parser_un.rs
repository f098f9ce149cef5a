//! C2 adapter — UN Security Council consolidated list. Schema is flat
//! `INDIVIDUALS/INDIVIDUAL` and `ENTITIES/ENTITY` elements with simple
//! child tags (no namespace). Grounded in
//! `original_source/src/UNload.py::UN_extract`.

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use watchlist_core::{RawRecord, Source};

pub fn parse_un_xml(xml_data: &[u8]) -> Result<Vec<RawRecord>> {
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
                if name == "INDIVIDUAL" || name == "ENTITY" {
                    builder = Some(Builder::new(name == "INDIVIDUAL"));
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                if (name == "INDIVIDUAL" || name == "ENTITY") && builder.is_some() {
                    out.push(builder.take().unwrap().build());
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
            Err(e) => tracing::warn!(error = %e, "UN XML parse error, continuing"),
            _ => {}
        }
        buf.clear();
    }

    tracing::info!(count = out.len(), "parsed UN records");
    Ok(out)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_string()
}

struct Builder {
    is_individual: bool,
    data_id: Option<String>,
    name_parts: Vec<String>,
    aliases: Vec<String>,
    nationality: Vec<String>,
    citizenship: Vec<String>,
    birth_year: Option<String>,
    birth_month: Option<String>,
    birth_day: Option<String>,
    place_of_birth: Option<String>,
    country: Option<String>,
    comments: Option<String>,
}

impl Builder {
    fn new(is_individual: bool) -> Self {
        Self {
            is_individual,
            data_id: None,
            name_parts: Vec::new(),
            aliases: Vec::new(),
            nationality: Vec::new(),
            citizenship: Vec::new(),
            birth_year: None,
            birth_month: None,
            birth_day: None,
            place_of_birth: None,
            country: None,
            comments: None,
        }
    }

    fn on_text(&mut self, tag: &str, text: &str) {
        match tag {
            "DATAID" => self.data_id = Some(text.to_string()),
            "FIRST_NAME" | "SECOND_NAME" | "THIRD_NAME" | "FOURTH_NAME" => {
                self.name_parts.push(text.to_string());
            }
            "ALIAS_NAME" => self.aliases.push(text.to_string()),
            "NATIONALITY" => self.nationality.push(text.to_string()),
            "CITIZENSHIP" => self.citizenship.push(text.to_string()),
            "YEAR" if self.birth_year.is_none() => self.birth_year = Some(text.to_string()),
            "MONTH" if self.birth_month.is_none() => self.birth_month = Some(text.to_string()),
            "DAY" if self.birth_day.is_none() => self.birth_day = Some(text.to_string()),
            "PLACE_OF_BIRTH" if self.place_of_birth.is_none() => {
                self.place_of_birth = Some(text.to_string())
            }
            "COUNTRY" if self.country.is_none() => self.country = Some(text.to_string()),
            "COMMENTS1" => self.comments = Some(text.to_string()),
            _ => {}
        }
    }

    fn build(self) -> RawRecord {
        let mut r = RawRecord::new(Source::Un);
        r.list_id = self.data_id;
        if !self.name_parts.is_empty() {
            r.set("full_name", self.name_parts.join(" "));
        }
        r.set(
            "classification",
            if self.is_individual { "Individual" } else { "Entity" },
        );
        if !self.nationality.is_empty() {
            r.set("nationality", self.nationality.join("; "));
        }
        if !self.citizenship.is_empty() {
            r.set("citizenship_country", self.citizenship.join("; "));
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
        if let Some(v) = self.place_of_birth {
            r.set("place_of_birth_text", v);
        }
        if let Some(v) = self.country {
            r.set("address_country", v);
        }
        if let Some(v) = self.comments {
            r.set("other_information_text", v);
        }
        r.aliases = self.aliases;
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_individual_entry() {
        let xml = br#"<CONSOLIDATED_LIST>
            <INDIVIDUALS>
                <INDIVIDUAL>
                    <DATAID>101</DATAID>
                    <FIRST_NAME>Jane</FIRST_NAME>
                    <SECOND_NAME>Roe</SECOND_NAME>
                    <NATIONALITY>Syrian Arab Republic</NATIONALITY>
                    <INDIVIDUAL_DATE_OF_BIRTH><YEAR>1980</YEAR></INDIVIDUAL_DATE_OF_BIRTH>
                </INDIVIDUAL>
            </INDIVIDUALS>
        </CONSOLIDATED_LIST>"#;

        let records = parse_un_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].list_id.as_deref(), Some("101"));
        assert_eq!(records[0].get("full_name"), Some("Jane Roe"));
        assert_eq!(records[0].get("birth_year"), Some("1980"));
    }
}
