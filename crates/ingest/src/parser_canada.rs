//! C2 adapter — Global Affairs Canada consolidated list. Flat `record`
//! elements, one row per listed person/entity/ship. Grounded in
//! `original_source/src/CAload.py::CA_extract`.

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use watchlist_core::{RawRecord, Source};

pub fn parse_canada_xml(xml_data: &[u8]) -> Result<Vec<RawRecord>> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    let mut current_tag = String::new();
    let mut builder: Option<Builder> = None;
    let mut counter: u64 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "record" {
                    counter += 1;
                    builder = Some(Builder::new(counter));
                }
                current_tag = name;
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "record" {
                    if let Some(b) = builder.take() {
                        out.push(b.build());
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(ref e)) => {
                if let Some(b) = builder.as_mut() {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        b.on_text(&current_tag, &text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => tracing::warn!(error = %e, "Canada XML parse error, continuing"),
            _ => {}
        }
        buf.clear();
    }

    tracing::info!(count = out.len(), "parsed Canada records");
    Ok(out)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_string()
}

struct Builder {
    item: u64,
    country: Option<String>,
    last_name: Option<String>,
    given_name: Option<String>,
    entity_or_ship: Option<String>,
    dob_or_build: Option<String>,
    schedule: Option<String>,
    item_field: Option<String>,
    aliases: Option<String>,
    title_or_ship: Option<String>,
    ship_imo: Option<String>,
}

impl Builder {
    fn new(fallback_item: u64) -> Self {
        Self {
            item: fallback_item,
            country: None,
            last_name: None,
            given_name: None,
            entity_or_ship: None,
            dob_or_build: None,
            schedule: None,
            item_field: None,
            aliases: None,
            title_or_ship: None,
            ship_imo: None,
        }
    }

    fn on_text(&mut self, tag: &str, text: &str) {
        match tag {
            "Country" => self.country = Some(text.to_string()),
            "LastName" => self.last_name = Some(text.to_string()),
            "GivenName" => self.given_name = Some(text.to_string()),
            "EntityOrShip" => self.entity_or_ship = Some(text.to_string()),
            "DateOfBirthOrShipBuildDate" => self.dob_or_build = Some(text.to_string()),
            "Schedule" => self.schedule = Some(text.to_string()),
            "Item" => self.item_field = Some(text.to_string()),
            "Aliases" => self.aliases = Some(text.to_string()),
            "TitleOrShip" => self.title_or_ship = Some(text.to_string()),
            "ShipIMONumber" => self.ship_imo = Some(text.to_string()),
            _ => {}
        }
    }

    fn build(self) -> RawRecord {
        let mut r = RawRecord::new(Source::Ca);
        let list_id = self.item_field.unwrap_or_else(|| self.item.to_string());
        r.list_id = Some(list_id);

        let name = match (&self.given_name, &self.last_name) {
            (Some(g), Some(l)) => Some(format!("{g} {l}")),
            (Some(g), None) => Some(g.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => self.title_or_ship.clone(),
        };
        if let Some(v) = name {
            r.set("full_name", v);
        }
        let is_ship = self
            .entity_or_ship
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("ship"))
            .unwrap_or(false)
            || self.ship_imo.is_some();
        let is_entity = self
            .entity_or_ship
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("entity"))
            .unwrap_or(false);
        r.set(
            "classification",
            if is_ship {
                "Vessel"
            } else if is_entity {
                "Entity"
            } else {
                "Individual"
            },
        );
        if let Some(v) = self.country {
            r.set("address_country", v);
        }
        if let Some(v) = self.schedule {
            r.set("sanctions_program_name", v);
        }
        if let Some(v) = self.ship_imo {
            r.other_id_numbers.push(format!("IMO: {v}"));
        }
        if let Some(dob) = self.dob_or_build {
            if dob.len() >= 4 {
                if let Some(year) = dob.get(0..4) {
                    if year.chars().all(|c| c.is_ascii_digit()) {
                        r.set("birth_year", year.to_string());
                    }
                }
            }
        }
        if let Some(aliases) = self.aliases {
            r.aliases = watchlist_core::split_aliases(&aliases);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_individual_row() {
        let xml = br#"<consolidated>
            <record>
                <Item>7</Item>
                <Country>Syria</Country>
                <LastName>Example</LastName>
                <GivenName>Sample</GivenName>
                <EntityOrShip></EntityOrShip>
                <DateOfBirthOrShipBuildDate>1975</DateOfBirthOrShipBuildDate>
                <Schedule>Syria</Schedule>
                <Aliases>Alias One; Alias Two</Aliases>
            </record>
        </consolidated>"#;

        let records = parse_canada_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].list_id.as_deref(), Some("7"));
        assert_eq!(records[0].get("full_name"), Some("Sample Example"));
        assert_eq!(records[0].aliases, vec!["Alias One", "Alias Two"]);
    }

    #[test]
    fn alias_cell_splits_on_semicolon_not_embedded_commas() {
        let aliases = watchlist_core::split_aliases("Doe, Jane; Smith, John");
        assert_eq!(aliases, vec!["Doe, Jane".to_string(), "Smith, John".to_string()]);
    }
}
