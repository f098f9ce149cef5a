//! C4 (name index half) and C5 (candidate retrieval). The index is a
//! term→postings map over two virtual columns, `name` and `aliases`,
//! supporting AND-across-tokens / OR-across-fields prefix queries
//! (SPEC_FULL.md §4.3-4.4). `list_name`/`list_id` are stored so a hit
//! maps back to an entity without a second lookup.

use std::path::Path;

use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, RegexQuery};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, TantivyDocument};

use watchlist_core::Entity;

pub struct SearchIndex {
    index: Index,
    list_name: Field,
    list_id: Field,
    name: Field,
    aliases: Field,
}

/// Tokenise on Unicode letters/digits, case-fold, drop anything shorter
/// than 3 characters (SPEC_FULL.md §4.4).
pub fn query_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= 3)
        .collect()
}

fn index_text(entity: &Entity) -> (String, String) {
    let name = entity.primary_name.clone().unwrap_or_default();
    let aliases = entity.aliases.join(" ");
    (name, aliases)
}

impl SearchIndex {
    pub fn create_in_dir(index_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_path)?;
        let mut schema_builder = Schema::builder();
        let list_name = schema_builder.add_text_field("list_name", STRING | STORED);
        let list_id = schema_builder.add_text_field("list_id", STRING | STORED);
        let name = schema_builder.add_text_field("name", TEXT);
        let aliases = schema_builder.add_text_field("aliases", TEXT);
        let schema = schema_builder.build();
        let index =
            Index::create_in_dir(index_path, schema).context("creating name index directory")?;
        Ok(Self { index, list_name, list_id, name, aliases })
    }

    pub fn open_in_dir(index_path: &Path) -> Result<Self> {
        let index = Index::open_in_dir(index_path).context("opening name index directory")?;
        let schema = index.schema();
        Ok(Self {
            list_name: schema.get_field("list_name")?,
            list_id: schema.get_field("list_id")?,
            name: schema.get_field("name")?,
            aliases: schema.get_field("aliases")?,
            index,
        })
    }

    /// Wholesale rebuild: invariant I7 only decides *whether* this runs,
    /// not how — the index itself has no incremental update path.
    pub fn rebuild(&self, entities: &[Entity]) -> Result<usize> {
        let mut writer: IndexWriter = self.index.writer(50_000_000)?;
        writer.delete_all_documents()?;
        for entity in entities {
            let (name, aliases) = index_text(entity);
            writer.add_document(doc!(
                self.list_name => entity.list_name.clone(),
                self.list_id => entity.list_id.clone(),
                self.name => name,
                self.aliases => aliases,
            ))?;
        }
        writer.commit()?;
        tracing::info!(count = entities.len(), "rebuilt name index");
        Ok(entities.len())
    }

    /// AND across `tokens`, OR across {name, aliases}, each token
    /// matched as a prefix. Returns `(list_name, list_id)` pairs,
    /// deduplicated, source-filtered by case-insensitive `list_name`
    /// prefix, capped at `limit`.
    pub fn search(
        &self,
        tokens: &[String],
        source_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, String)>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let reader = self.index.reader()?;
        let searcher = reader.searcher();

        let mut must: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in tokens {
            let pattern = format!("{}.*", regex::escape(token));
            let name_q = RegexQuery::from_pattern(&pattern, self.name)
                .context("building name prefix query")?;
            let alias_q = RegexQuery::from_pattern(&pattern, self.aliases)
                .context("building alias prefix query")?;
            let either: Box<dyn Query> = Box::new(BooleanQuery::new(vec![
                (Occur::Should, Box::new(name_q)),
                (Occur::Should, Box::new(alias_q)),
            ]));
            must.push((Occur::Must, either));
        }
        let query = BooleanQuery::new(must);

        let scan_limit = if source_filter.is_some() { limit.saturating_mul(4).max(limit) } else { limit };
        let top_docs = searcher.search(&query, &TopDocs::with_limit(scan_limit.min(65_000)))?;

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (_score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let list_name = doc.get_first(self.list_name).and_then(|v| v.as_str()).unwrap_or("").to_string();
            let list_id = doc.get_first(self.list_id).and_then(|v| v.as_str()).unwrap_or("").to_string();
            if let Some(filter) = source_filter {
                if !list_name.to_lowercase().starts_with(&filter.to_lowercase()) {
                    continue;
                }
            }
            let key = (list_name.clone(), list_id.clone());
            if seen.insert(key) {
                out.push((list_name, list_id));
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }
}

/// Full-scan substring fallback used when no index is available yet
/// (first run) or not built. Preserves the same result shape and
/// guarantees as `SearchIndex::search`.
pub fn scan_candidates<'a>(
    entities: &'a [Entity],
    tokens: &[String],
    source_filter: Option<&str>,
    limit: usize,
) -> Vec<&'a Entity> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entity in entities {
        if let Some(filter) = source_filter {
            if !entity.list_name.to_lowercase().starts_with(&filter.to_lowercase()) {
                continue;
            }
        }
        let haystack = format!(
            "{} {}",
            entity.primary_name.as_deref().unwrap_or(""),
            entity.aliases.join(" ")
        )
        .to_lowercase();
        let all_match = tokens.iter().all(|t| haystack.contains(t.as_str()));
        if !all_match {
            continue;
        }
        let key = (entity.list_name.clone(), entity.list_id.clone());
        if seen.insert(key) {
            out.push(entity);
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_core::Classification;

    fn entity(list_id: &str, name: &str, aliases: Vec<&str>) -> Entity {
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
            aliases: aliases.into_iter().map(String::from).collect(),
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
    fn query_tokens_drops_short_tokens() {
        let tokens = query_tokens("Al Qa'ida II");
        assert_eq!(tokens, vec!["ida".to_string()]);
    }

    #[test]
    fn scan_candidates_requires_all_tokens() {
        let entities = vec![
            entity("1", "John Smith", vec!["Johnny Smith"]),
            entity("2", "Jane Doe", vec![]),
        ];
        let tokens = query_tokens("john smith");
        let hits = scan_candidates(&entities, &tokens, None, 300);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].list_id, "1");
    }

    #[test]
    fn scan_candidates_dedupes_and_filters_by_source() {
        let entities = vec![entity("1", "John Smith", vec![])];
        let tokens = query_tokens("john smith");
        let hits = scan_candidates(&entities, &tokens, Some("ofac"), 300);
        assert_eq!(hits.len(), 1);
        let none = scan_candidates(&entities, &tokens, Some("un_"), 300);
        assert!(none.is_empty());
    }
}
