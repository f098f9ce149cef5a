//! The in-memory, generation-pinned view over the watchlist: one
//! immutable `Catalog` per successful refresh, swapped in atomically
//! (SPEC_FULL.md §5). Readers hold an `Arc<Catalog>` for the lifetime of
//! one screening and never observe a torn generation; writers hold
//! `refreshing` for the duration of a rebuild and reject concurrent
//! refreshes with `REFRESH_IN_PROGRESS`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use watchlist_core::Entity;

use crate::db;
use crate::indexer::{self, SearchIndex};

pub struct Catalog {
    pub generation: u64,
    pub entities: Vec<Entity>,
    pub index: Option<SearchIndex>,
    pub fingerprint: String,
    pub last_built_epoch: i64,
}

impl Catalog {
    fn empty() -> Self {
        Self { generation: 0, entities: Vec::new(), index: None, fingerprint: String::new(), last_built_epoch: 0 }
    }

    /// Candidate retrieval (C5): index search when a name index is
    /// present, full scan otherwise. Same result shape either way.
    pub fn candidates(&self, queries: &[String], source_filter: Option<&str>, limit: usize, exhaustive: bool) -> Vec<&Entity> {
        let mut tokens: Vec<String> = queries.iter().flat_map(|q| indexer::query_tokens(q)).collect();
        tokens.sort();
        tokens.dedup();
        if tokens.is_empty() {
            return Vec::new();
        }
        let effective_limit = if exhaustive { 65_000 } else { limit };

        if let Some(index) = &self.index {
            match index.search(&tokens, source_filter, effective_limit) {
                Ok(hits) => {
                    let by_key: std::collections::HashMap<(&str, &str), &Entity> = self
                        .entities
                        .iter()
                        .map(|e| ((e.list_name.as_str(), e.list_id.as_str()), e))
                        .collect();
                    return hits
                        .iter()
                        .filter_map(|(list_name, list_id)| by_key.get(&(list_name.as_str(), list_id.as_str())).copied())
                        .collect();
                }
                Err(err) => {
                    tracing::warn!(error = %err, "name index search failed, falling back to full scan");
                }
            }
        }
        indexer::scan_candidates(&self.entities, &tokens, source_filter, effective_limit)
    }
}

pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
    refreshing: AtomicBool,
    generation_counter: AtomicU64,
    db_path: PathBuf,
    index_dir: PathBuf,
}

#[derive(Debug)]
pub enum RefreshError {
    InProgress,
    Other(anyhow::Error),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::InProgress => write!(f, "REFRESH_IN_PROGRESS"),
            RefreshError::Other(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<anyhow::Error> for RefreshError {
    fn from(err: anyhow::Error) -> Self {
        RefreshError::Other(err)
    }
}

impl CatalogHandle {
    pub fn new(db_path: PathBuf, index_dir: PathBuf) -> Self {
        Self {
            current: RwLock::new(Arc::new(Catalog::empty())),
            refreshing: AtomicBool::new(false),
            generation_counter: AtomicU64::new(0),
            db_path,
            index_dir,
        }
    }

    /// Pin the current generation for the duration of one screening.
    pub fn pin(&self) -> Arc<Catalog> {
        self.current.read().expect("catalog lock poisoned").clone()
    }

    pub fn has_been_built(&self) -> bool {
        self.pin().generation > 0
    }

    /// Drop-and-recreate under a new generation (SPEC_FULL.md §4.3).
    /// Readers keep serving the previous generation until this returns.
    pub fn refresh(&self, entities: Vec<Entity>) -> Result<u64, RefreshError> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            return Err(RefreshError::InProgress);
        }
        let result = self.refresh_inner(entities);
        self.refreshing.store(false, Ordering::SeqCst);
        result.map_err(RefreshError::Other)
    }

    fn refresh_inner(&self, entities: Vec<Entity>) -> Result<u64> {
        let mut conn = db::open_db(&self.db_path)?;
        db::init_schema(&conn)?;
        db::replace_all(&mut conn, &entities)?;

        let new_fingerprint = db::fingerprint(&entities);
        let previous = self.pin();
        let reuse_index = previous.index.is_some() && previous.fingerprint == new_fingerprint;

        let index = if reuse_index {
            previous.index.as_ref().map(|_| SearchIndex::open_in_dir(&self.index_dir)).transpose()?
        } else {
            std::fs::remove_dir_all(&self.index_dir).ok();
            let built = SearchIndex::create_in_dir(&self.index_dir)?;
            built.rebuild(&entities)?;
            Some(built)
        };

        let generation = self.generation_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let last_built_epoch = chrono::Utc::now().timestamp();
        db::set_meta(&conn, "fingerprint", &new_fingerprint)?;
        db::set_meta(&conn, "generation", &generation.to_string())?;
        db::set_meta(&conn, "last_built_epoch", &last_built_epoch.to_string())?;

        let catalog = Arc::new(Catalog {
            generation,
            entities,
            index,
            fingerprint: new_fingerprint,
            last_built_epoch,
        });
        *self.current.write().expect("catalog lock poisoned") = catalog;
        tracing::info!(generation, "catalog swapped to new generation");
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_core::Classification;

    fn entity(list_id: &str, name: &str) -> Entity {
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
    fn fresh_handle_reports_unbuilt() {
        let dir = std::env::temp_dir().join(format!("watchlist-catalog-test-{}", std::process::id()));
        let handle = CatalogHandle::new(dir.join("sanctions.db"), dir.join("name_index"));
        assert!(!handle.has_been_built());
    }

    #[test]
    fn refresh_advances_generation_and_candidates_work() {
        let dir = std::env::temp_dir().join(format!("watchlist-catalog-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let handle = CatalogHandle::new(dir.join("sanctions.db"), dir.join("name_index"));
        let gen = handle.refresh(vec![entity("1", "John Smith")]).unwrap();
        assert_eq!(gen, 1);
        assert!(handle.has_been_built());
        let pinned = handle.pin();
        let hits = pinned.candidates(&["John Smith".to_string()], None, 300, false);
        assert_eq!(hits.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn concurrent_refresh_rejected() {
        let dir = std::env::temp_dir().join(format!("watchlist-catalog-test3-{}", std::process::id()));
        let handle = CatalogHandle::new(dir.join("sanctions.db"), dir.join("name_index"));
        handle.refreshing.store(true, Ordering::SeqCst);
        let err = handle.refresh(vec![]).unwrap_err();
        assert!(matches!(err, RefreshError::InProgress));
    }
}
