//! C4 — durable half of the index builder: `entities` and `match_keys`,
//! keyed by `(list_name, list_id)`, plus a `sanctions_meta` table
//! tracking the name-index fingerprint and generation counter
//! (SPEC_FULL.md §4.3). Each refresh drops and recreates both tables
//! wholesale under a new generation.

use std::path::Path;

use anyhow::Result;
use rusqlite::{params, Connection};
use watchlist_core::{Entity, MatchKeys};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    global_id TEXT PRIMARY KEY,
    list_name TEXT NOT NULL,
    list_id TEXT NOT NULL,
    primary_name TEXT,
    country TEXT,
    data TEXT NOT NULL,
    UNIQUE(list_name, list_id)
);

CREATE TABLE IF NOT EXISTS match_keys (
    global_id TEXT PRIMARY KEY REFERENCES entities(global_id) ON DELETE CASCADE,
    name_ascii TEXT,
    name_tokens TEXT,
    name_soundex TEXT,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sanctions_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entities_list ON entities(list_name);
CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(primary_name);
"#;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Drop-and-recreate: wholesale replacement of every entity and its
/// match keys, inside one transaction. Does not touch `sanctions_meta`'s
/// fingerprint — the caller decides whether the name index needs
/// rebuilding (SPEC_FULL.md §4.3 step 3).
pub fn replace_all(conn: &mut Connection, entities: &[Entity]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM match_keys", [])?;
    tx.execute("DELETE FROM entities", [])?;
    for entity in entities {
        let data = serde_json::to_string(entity)?;
        tx.execute(
            "INSERT INTO entities (global_id, list_name, list_id, primary_name, country, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entity.global_id,
                entity.list_name,
                entity.list_id,
                entity.primary_name,
                entity.country,
                data
            ],
        )?;
        let keys = MatchKeys::of(entity);
        let keys_json = serde_json::to_string(&keys)?;
        tx.execute(
            "INSERT INTO match_keys (global_id, name_ascii, name_tokens, name_soundex, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entity.global_id, keys.name_ascii, keys.name_tokens, keys.name_soundex, keys_json],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn load_all(conn: &Connection) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare("SELECT data FROM entities")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        let json = row?;
        out.push(serde_json::from_str(&json)?);
    }
    Ok(out)
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM sanctions_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e.into()) })
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sanctions_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// `(row_count, sum_of_name_lengths)` fingerprint, invariant I7
/// (SPEC_FULL.md §4.3 step 3): the name index is only rebuilt when this
/// changes.
pub fn fingerprint(entities: &[Entity]) -> String {
    let row_count = entities.len();
    let sum_of_name_lengths: usize = entities
        .iter()
        .map(|e| {
            e.primary_name.as_deref().map(str::len).unwrap_or(0)
                + e.aliases.iter().map(|a| a.len()).sum::<usize>()
        })
        .sum();
    format!("{row_count}:{sum_of_name_lengths}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_core::Classification;

    fn sample_entity(list_id: &str, name: &str) -> Entity {
        Entity {
            list_name: "OFAC_SDN".into(),
            list_id: list_id.into(),
            global_id: format!("OFAC_SDN-{list_id}"),
            classification: Classification::Individual,
            primary_name: Some(name.into()),
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
            city: None,
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
    fn replace_all_round_trips_entities() {
        let path = std::env::temp_dir().join(format!("watchlist-test-{}.db", std::process::id()));
        let mut conn = open_db(&path).unwrap();
        init_schema(&conn).unwrap();
        let entities = vec![sample_entity("1", "John Doe"), sample_entity("2", "Jane Roe")];
        replace_all(&mut conn, &entities).unwrap();
        let loaded = load_all(&conn).unwrap();
        assert_eq!(loaded.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = vec![sample_entity("1", "John Doe")];
        let b = vec![sample_entity("1", "John Doe Longer Name")];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn meta_roundtrips() {
        let path = std::env::temp_dir().join(format!("watchlist-test-meta-{}.db", std::process::id()));
        let conn = open_db(&path).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_meta(&conn, "fingerprint").unwrap(), None);
        set_meta(&conn, "fingerprint", "2:10").unwrap();
        assert_eq!(get_meta(&conn, "fingerprint").unwrap(), Some("2:10".to_string()));
        std::fs::remove_file(&path).ok();
    }
}
