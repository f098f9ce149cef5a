//! C2 adapter — SECO (Switzerland) sanctions list. One `target` per
//! listed subject, wrapping an `individual`, `entity`, or `object`
//! element with nested `identity` blocks (`name`, `nationality`,
//! `day-month-year`, `place-of-birth`, `address`,
//! `identification-document`). Place-of-birth and address carry a
//! `place-id` attribute resolved against an out-of-line `<place>` table,
//! and a target's `<sanctions-set-id>` children resolve against an
//! out-of-line `<sanctions-program>` table — both built on a first pass
//! over the document before the `<target>` pass. Grounded in
//! `original_source/src/SECOload.py::SECO_extract`.

use std::collections::HashMap;

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use watchlist_core::{RawRecord, Source};

#[derive(Default, Clone)]
struct PlaceInfo {
    location: Option<String>,
    area: Option<String>,
    country: Option<String>,
    country_iso: Option<String>,
}

#[derive(Default)]
struct Lookups {
    place_by_id: HashMap<String, PlaceInfo>,
    program_name_by_set_id: HashMap<String, String>,
}

/// First pass: `.//place` and `.//sanctions-program` carry no reference
/// back to the targets that use them, so every id they define has to be
/// collected before the second pass over `<target>` can resolve against
/// it (SECO_extract's `place_by_id`/`program_name_by_set_id`).
fn build_lookups(xml_data: &[u8]) -> Lookups {
    let mut lookups = Lookups::default();
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    let mut place: Option<(String, PlaceInfo)> = None;
    let mut program_name: Option<String> = None;
    let mut set_ids: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "place" => {
                        if let Some(ssid) = attr(e, "ssid") {
                            place = Some((ssid, PlaceInfo::default()));
                        }
                    }
                    "country" => {
                        if let Some((_, info)) = place.as_mut() {
                            if let Some(iso) = attr(e, "iso-code") {
                                info.country_iso = Some(iso.to_uppercase());
                            }
                        }
                    }
                    "sanctions-program" => {
                        program_name = None;
                        set_ids.clear();
                    }
                    "sanctions-set" => {
                        if let Some(ssid) = attr(e, "ssid") {
                            set_ids.push(ssid);
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "place" => {
                        if let Some((ssid, info)) = place.take() {
                            lookups.place_by_id.insert(ssid, info);
                        }
                    }
                    "sanctions-program" => {
                        if let Some(nm) = program_name.take() {
                            for ssid in set_ids.drain(..) {
                                lookups.program_name_by_set_id.insert(ssid, nm.clone());
                            }
                        }
                        set_ids.clear();
                    }
                    _ => {}
                }
                stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                let tag = stack.last().map(|s| s.as_str()).unwrap_or("");
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                match tag {
                    "location" if place.is_some() => place.as_mut().unwrap().1.location = Some(text),
                    "area" if place.is_some() => place.as_mut().unwrap().1.area = Some(text),
                    "country" if place.is_some() => place.as_mut().unwrap().1.country = Some(text),
                    "program-name" if program_name.is_none() => program_name = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "SECO lookup-table parse error, continuing");
            }
            _ => {}
        }
        buf.clear();
    }

    lookups
}

pub fn parse_switzerland_xml(xml_data: &[u8]) -> Result<Vec<RawRecord>> {
    let lookups = build_lookups(xml_data);

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
                match name.as_str() {
                    "target" => builder = Some(Builder::new(attr(e, "ssid"))),
                    "individual" => {
                        if let Some(b) = builder.as_mut() {
                            b.kind = Some("Individual".into());
                            b.sex = attr(e, "sex");
                        }
                    }
                    "entity" => {
                        if let Some(b) = builder.as_mut() {
                            b.kind = Some("Entity".into());
                        }
                    }
                    "object" => {
                        if let Some(b) = builder.as_mut() {
                            b.kind = Some("Object".into());
                            b.object_type = attr(e, "type");
                        }
                    }
                    "place-of-birth" => {
                        if let Some(b) = builder.as_mut() {
                            b.place_of_birth_id = attr(e, "place-id");
                        }
                    }
                    "address" => {
                        if let Some(b) = builder.as_mut() {
                            b.address_id = attr(e, "place-id");
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "target" {
                    if let Some(b) = builder.take() {
                        out.push(b.build(&lookups));
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
            Err(e) => tracing::warn!(error = %e, "SECO XML parse error, continuing"),
            _ => {}
        }
        buf.clear();
    }

    tracing::info!(count = out.len(), "parsed SECO records");
    Ok(out)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_string()
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

#[derive(Default)]
struct Builder {
    ssid: Option<String>,
    kind: Option<String>,
    sex: Option<String>,
    object_type: Option<String>,
    name_values: Vec<String>,
    nationality: Vec<String>,
    birth_year: Option<String>,
    birth_month: Option<String>,
    birth_day: Option<String>,
    place_of_birth_id: Option<String>,
    address_id: Option<String>,
    sanctions_set_ids: Vec<String>,
    justification: Option<String>,
    emails: Vec<String>,
    websites: Vec<String>,
}

impl Builder {
    fn new(ssid: Option<String>) -> Self {
        Self { ssid, ..Default::default() }
    }

    fn on_text(&mut self, stack: &[String], text: &str) {
        let tag = stack.last().map(|s| s.as_str()).unwrap_or("");
        match tag {
            "value" if stack.iter().any(|t| t == "name") => {
                self.name_values.push(text.to_string());
            }
            "country" if stack.iter().any(|t| t == "nationality") => {
                self.nationality.push(text.to_string());
            }
            "year" if stack.iter().any(|t| t == "day-month-year") && self.birth_year.is_none() => {
                self.birth_year = Some(text.to_string());
            }
            "month" if stack.iter().any(|t| t == "day-month-year") && self.birth_month.is_none() => {
                self.birth_month = Some(text.to_string());
            }
            "day" if stack.iter().any(|t| t == "day-month-year") && self.birth_day.is_none() => {
                self.birth_day = Some(text.to_string());
            }
            "sanctions-set-id" => {
                self.sanctions_set_ids.push(text.to_string());
            }
            "justification" | "other-information" => {
                if text.contains('@') {
                    self.emails.push(text.to_string());
                } else if text.starts_with("http") || text.starts_with("www.") {
                    self.websites.push(text.to_string());
                } else {
                    self.justification = Some(match self.justification.take() {
                        Some(existing) => format!("{existing} {text}"),
                        None => text.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    fn build(mut self, lookups: &Lookups) -> RawRecord {
        let mut r = RawRecord::new(Source::Seco);
        r.list_id = self.ssid.take();
        if !self.name_values.is_empty() {
            r.set("full_name", self.name_values.remove(0));
            r.aliases = self.name_values;
        }

        let mut classification = self.kind;
        if classification.as_deref() == Some("Object") {
            let hint = self.object_type.unwrap_or_default().to_lowercase();
            classification = Some(if hint.contains("vessel") || hint.contains("ship") || hint.contains("imo") {
                "Vessel".into()
            } else if hint.contains("aircraft") || hint.contains("plane") {
                "Aircraft".into()
            } else {
                "Entity".into()
            });
        }
        if let Some(v) = classification {
            r.set("classification", v);
        }

        if let Some(v) = self.sex {
            r.set("sex", v);
        }
        if !self.nationality.is_empty() {
            r.set("nationality", self.nationality.join("; "));
            r.set("citizenship_country", self.nationality.join("; "));
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

        if let Some(info) = self.place_of_birth_id.as_deref().and_then(|id| lookups.place_by_id.get(id)) {
            let parts: Vec<&str> =
                [info.location.as_deref(), info.area.as_deref(), info.country.as_deref()].into_iter().flatten().collect();
            if !parts.is_empty() {
                r.set("place_of_birth_text", parts.join(", "));
            }
            if let Some(country) = &info.country {
                r.set("address_country", country.clone());
            }
            if let Some(iso) = &info.country_iso {
                r.set("address_country_iso", iso.clone());
            }
        }

        if let Some(info) = self.address_id.as_deref().and_then(|id| lookups.place_by_id.get(id)) {
            if let Some(location) = &info.location {
                r.set("address_city", location.clone());
            }
            if let Some(area) = &info.area {
                r.set("address_state", area.clone());
            }
            if !r.fields.contains_key("address_country") {
                if let Some(country) = &info.country {
                    r.set("address_country", country.clone());
                }
            }
            if !r.fields.contains_key("address_country_iso") {
                if let Some(iso) = &info.country_iso {
                    r.set("address_country_iso", iso.clone());
                }
            }
        }

        let program_names: Vec<String> = self
            .sanctions_set_ids
            .iter()
            .filter_map(|id| lookups.program_name_by_set_id.get(id).cloned())
            .collect();
        if !program_names.is_empty() {
            r.set("sanctions_program_name", program_names.join("; "));
        }

        if let Some(v) = self.justification {
            r.set("justification_text", v);
        }
        r.contact_emails = self.emails;
        r.contact_websites = self.websites;
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_individual_target_with_ssid_attribute() {
        let xml = br#"<sanctions-list>
            <target ssid="501">
                <individual sex="M">
                    <identity>
                        <name><name-part><value>Example</value></name-part><name-part><value>Target</value></name-part></name>
                        <nationality><country>Iran (Islamic Republic of)</country></nationality>
                        <day-month-year><year>1982</year></day-month-year>
                    </identity>
                </individual>
            </target>
        </sanctions-list>"#;

        let records = parse_switzerland_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].list_id.as_deref(), Some("501"));
        assert_eq!(records[0].get("full_name"), Some("Example"));
        assert_eq!(records[0].aliases, vec!["Target"]);
        assert_eq!(records[0].get("birth_year"), Some("1982"));
        assert_eq!(records[0].get("sex"), Some("M"));
        assert_eq!(records[0].get("classification"), Some("Individual"));
    }

    #[test]
    fn target_without_ssid_attribute_has_no_list_id() {
        let xml = br#"<sanctions-list>
            <target>
                <individual>
                    <identity><name><name-part><value>No Id</value></name-part></name></identity>
                </individual>
            </target>
        </sanctions-list>"#;

        let records = parse_switzerland_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].list_id.is_none());
    }

    #[test]
    fn resolves_place_of_birth_and_address_via_place_id_lookup() {
        let xml = br#"<sanctions-list>
            <place ssid="p1">
                <location>Tehran</location>
                <country iso-code="IR">Iran (Islamic Republic of)</country>
            </place>
            <target ssid="502">
                <individual>
                    <identity>
                        <name><name-part><value>Example</value></name-part></name>
                        <place-of-birth place-id="p1"/>
                        <address place-id="p1"/>
                    </identity>
                </individual>
            </target>
        </sanctions-list>"#;

        let records = parse_switzerland_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("place_of_birth_text"), Some("Tehran, Iran (Islamic Republic of)"));
        assert_eq!(records[0].get("address_city"), Some("Tehran"));
        assert_eq!(records[0].get("address_country"), Some("Iran (Islamic Republic of)"));
        assert_eq!(records[0].get("address_country_iso"), Some("IR"));
    }

    #[test]
    fn resolves_sanctions_program_name_via_sanctions_set_id_lookup() {
        let xml = br#"<sanctions-list>
            <sanctions-program ssid="prog1">
                <program-name lang="en">Ordinance on Measures against Iran</program-name>
                <sanctions-set ssid="set1">Iran sanctions set</sanctions-set>
            </sanctions-program>
            <target ssid="503">
                <entity>
                    <identity><name><name-part><value>Example Co</value></name-part></name></identity>
                </entity>
                <sanctions-set-id>set1</sanctions-set-id>
            </target>
        </sanctions-list>"#;

        let records = parse_switzerland_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("sanctions_program_name"), Some("Ordinance on Measures against Iran"));
        assert_eq!(records[0].get("classification"), Some("Entity"));
    }

    #[test]
    fn object_target_infers_vessel_classification_from_type_attribute() {
        let xml = br#"<sanctions-list>
            <target ssid="504">
                <object type="Vessel">
                    <identity><name><name-part><value>MV Example</value></name-part></name></identity>
                </object>
            </target>
        </sanctions-list>"#;

        let records = parse_switzerland_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("classification"), Some("Vessel"));
    }
}
