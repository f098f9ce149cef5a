//! C2 adapter — EU consolidated financial sanctions list. Namespaced
//! `sanctionEntity` elements carrying `euReferenceNumber`/`logicalId`
//! attributes, `nameAlias` children (one per spelling, `wholeName`
//! attribute), and `birthdate`/`citizenship`/`address` children carried
//! as attributes rather than text. Grounded in
//! `original_source/src/EUCFSLload.py::EU_extract`.

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use watchlist_core::{RawRecord, Source};

pub fn parse_eu_xml(xml_data: &[u8]) -> Result<Vec<RawRecord>> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut builder: Option<Builder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "sanctionEntity" {
                    builder = Some(Builder::new(attr(e, "euReferenceNumber").or_else(|| attr(e, "logicalId"))));
                }
                if name == "nameAlias" {
                    if let Some(b) = builder.as_mut() {
                        b.on_name_alias(e);
                    }
                }
                if name == "birthdate" {
                    if let Some(b) = builder.as_mut() {
                        b.on_birthdate(e);
                    }
                }
                if name == "citizenship" {
                    if let Some(b) = builder.as_mut() {
                        b.on_citizenship(e);
                    }
                }
                if name == "address" {
                    if let Some(b) = builder.as_mut() {
                        b.on_address(e);
                    }
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "sanctionEntity" {
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
            Err(e) => tracing::warn!(error = %e, "EU XML parse error, continuing"),
            _ => {}
        }
        buf.clear();
    }

    tracing::info!(count = out.len(), "parsed EU records");
    Ok(out)
}

fn local_name(raw: &[u8]) -> String {
    let full = String::from_utf8_lossy(raw);
    full.rsplit(':').next().unwrap_or(&full).to_string()
}

fn attr(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if local_name(a.key.as_ref()) == key {
            Some(String::from_utf8_lossy(&a.value).trim().to_string()).filter(|s| !s.is_empty())
        } else {
            None
        }
    })
}

struct Builder {
    list_id: Option<String>,
    whole_names: Vec<String>,
    sanctions_set: Option<String>,
    remark: Option<String>,
    birth_year: Option<String>,
    birth_month: Option<String>,
    birth_day: Option<String>,
    citizenship: Vec<String>,
    address_country: Option<String>,
    address_city: Option<String>,
}

impl Builder {
    fn new(list_id: Option<String>) -> Self {
        Self {
            list_id,
            whole_names: Vec::new(),
            sanctions_set: None,
            remark: None,
            birth_year: None,
            birth_month: None,
            birth_day: None,
            citizenship: Vec::new(),
            address_country: None,
            address_city: None,
        }
    }

    fn on_name_alias(&mut self, e: &BytesStart) {
        if let Some(whole) = attr(e, "wholeName") {
            self.whole_names.push(whole);
        }
    }

    fn on_birthdate(&mut self, e: &BytesStart) {
        if let Some(year) = attr(e, "year") {
            self.birth_year = Some(year);
        }
        if let Some(month) = attr(e, "zeroPaddedMonth").or_else(|| attr(e, "month")) {
            self.birth_month = Some(month);
        }
        if let Some(day) = attr(e, "zeroPaddedDay").or_else(|| attr(e, "day")) {
            self.birth_day = Some(day);
        }
    }

    fn on_citizenship(&mut self, e: &BytesStart) {
        if let Some(c) = attr(e, "countryIso2Code").or_else(|| attr(e, "countryDescription")) {
            self.citizenship.push(c);
        }
    }

    fn on_address(&mut self, e: &BytesStart) {
        if self.address_country.is_none() {
            self.address_country = attr(e, "countryDescription").or_else(|| attr(e, "countryIso2Code"));
        }
        if self.address_city.is_none() {
            self.address_city = attr(e, "city");
        }
    }

    fn on_text(&mut self, tag: &str, text: &str) {
        match tag {
            "programme" => self.sanctions_set = Some(text.to_string()),
            "remark" => {
                self.remark = Some(match self.remark.take() {
                    Some(existing) => format!("{existing} {text}"),
                    None => text.to_string(),
                });
            }
            _ => {}
        }
    }

    fn build(mut self) -> RawRecord {
        let mut r = RawRecord::new(Source::Eu);
        r.list_id = self.list_id.take();
        if !self.whole_names.is_empty() {
            r.set("full_name", self.whole_names.remove(0));
            r.aliases = self.whole_names;
        }
        if let Some(v) = self.sanctions_set {
            r.set("sanctions_program_name", v);
        }
        if let Some(v) = self.remark {
            r.set("other_information_text", v);
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
        if !self.citizenship.is_empty() {
            r.set("citizenship_country", self.citizenship.join("; "));
        }
        if let Some(v) = self.address_country {
            r.set("address_country", v);
        }
        if let Some(v) = self.address_city {
            r.set("address_city", v);
        }
        r
    }
}
