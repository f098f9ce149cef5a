//! Screening orchestrator (C10): one call per message. Ensures the
//! catalog has been built at least once, runs every party through
//! candidate retrieval (C5) and scoring (C7), aggregates (C8), and
//! assembles the full response JSON. Grounded in
//! `original_source/src/screening.py::submitresponse` (the `listsUsed`
//! shape, `decision`/`riskSummary`/`engine` field names) and
//! `original_source/src/readLog.py` (reading the last refresh timestamp
//! per source).

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use utoipa::ToSchema;
use watchlist_core::{aggregate, MatchedField, Party, RecommendedAction, RiskLevel, ScoredMatch, ScoringPolicy};

use crate::iso20022::{self, RawParty};
use crate::party::normalize_party;

#[derive(Debug)]
pub enum OrchestratorError {
    /// Malformed or unrecognised input XML — HTTP 400 at the boundary.
    ClientError(String),
    Internal(anyhow::Error),
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::ClientError(msg) => write!(f, "{msg}"),
            OrchestratorError::Internal(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListUsed {
    pub name: &'static str,
    pub publisher: &'static str,
    pub source_url: &'static str,
    pub last_refreshed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub amount: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub recommended_action: RecommendedAction,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub risk_score: i64,
    pub risk_level: RiskLevel,
    pub drivers: Vec<MatchedField>,
    pub time: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchCounts {
    pub total: usize,
    pub by_risk_level: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineSummary {
    pub top_match_score: i32,
    pub top_match_risk_level: RiskLevel,
    pub risk_score: i64,
    pub risk_level: RiskLevel,
    pub response_code: &'static str,
    pub flagged: bool,
    pub match_counts: MatchCounts,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResponse {
    pub lists_used: Vec<ListUsed>,
    pub parties: Vec<Party>,
    pub transaction: TransactionSummary,
    pub decision: Decision,
    pub risk_summary: RiskSummary,
    pub engine: EngineSummary,
    pub matches: Vec<ScoredMatch>,
}

fn list_meta(source: watchlist_core::Source) -> (&'static str, &'static str) {
    use watchlist_core::Source::*;
    match source {
        OfacSdn => ("OFAC SDN", "OFAC (USA)"),
        OfacCons => ("OFAC consolidated", "OFAC (USA)"),
        Uk => ("UK consolidated", "OFSI (UK)"),
        Un => ("UN consolidated", "United Nations"),
        Eu => ("EU consolidated", "European Union"),
        Au => ("AU consolidated", "DFAT (Australia)"),
        Ca => ("CA consolidated", "Global Affairs Canada"),
        Seco => ("SECO consolidated", "SECO (Switzerland)"),
    }
}

fn last_refreshed_at(data_dir: &Path, source: watchlist_core::Source) -> Option<String> {
    let content = std::fs::read_to_string(data_dir.join(source.refresh_log_file())).ok()?;
    content.lines().rev().find(|line| !line.trim().is_empty()).map(str::to_string)
}

fn lists_used(data_dir: &Path) -> Vec<ListUsed> {
    watchlist_core::Source::all()
        .into_iter()
        .map(|source| {
            let (name, publisher) = list_meta(source);
            ListUsed {
                name,
                publisher,
                source_url: source.url(),
                last_refreshed_at: last_refreshed_at(data_dir, source),
            }
        })
        .collect()
}

fn match_counts(matches: &[ScoredMatch]) -> MatchCounts {
    let mut by_risk_level: HashMap<String, usize> = HashMap::new();
    for m in matches {
        *by_risk_level.entry(m.risk_level.as_str().to_string()).or_insert(0) += 1;
    }
    MatchCounts { total: matches.len(), by_risk_level }
}

fn drivers(matches: &[ScoredMatch]) -> Vec<MatchedField> {
    matches.iter().flat_map(|m| m.matched_fields.iter().cloned()).collect()
}

/// Screens one `pacs.008`-shaped XML payload against the current
/// catalog generation, triggering a refresh first if none has ever been
/// built (SPEC_FULL.md §4.9).
pub async fn screen_message(
    xml: &[u8],
    catalog: &ingest::CatalogHandle,
    data_dir: &Path,
    viewer_output_dir: &Path,
    policy: &ScoringPolicy,
) -> Result<ScreeningResponse, OrchestratorError> {
    let parsed = iso20022::parse_pacs008(xml).map_err(|e| OrchestratorError::ClientError(e.to_string()))?;

    if !catalog.has_been_built() {
        tracing::info!("catalog has never been built, triggering a refresh before screening");
        let entities = ingest::fetch_all_sources(data_dir).await.map_err(OrchestratorError::Internal)?;
        catalog
            .refresh(entities)
            .map_err(|e| OrchestratorError::Internal(anyhow::anyhow!(e.to_string())))?;
    }

    let pinned = catalog.pin();

    let parties: Vec<Party> = parsed
        .parties
        .iter()
        .enumerate()
        .map(|(i, raw): (usize, &RawParty)| normalize_party(i, raw))
        .collect();

    // C5 is called once with every party name pooled together, not once
    // per party (SPEC_FULL.md §4.9; `original_source/src/engine.py::
    // screen_xml_bytes` collects one `queries` list before its single
    // `returnDetails2_fts_multi` call). Every party is then scored
    // against the same shared candidate pool.
    let queries: Vec<String> = parties
        .iter()
        .filter_map(|p| p.display_name())
        .filter(|q| !q.trim().is_empty())
        .collect();
    let candidates = pinned.candidates(&queries, None, 300, false);

    let mut scored: Vec<ScoredMatch> = Vec::new();
    for party in &parties {
        for candidate in &candidates {
            if let Some(m) = matching_core::score(party, candidate, policy) {
                scored.push(m);
            }
        }
    }

    let (survivors, all_matches, summary) = aggregate(scored, policy);

    let response = ScreeningResponse {
        lists_used: lists_used(data_dir),
        parties,
        transaction: TransactionSummary { amount: parsed.transaction.amount, currency: parsed.transaction.currency },
        decision: Decision { recommended_action: summary.recommended_action },
        risk_summary: RiskSummary {
            risk_score: summary.risk_score,
            risk_level: summary.risk_level,
            drivers: drivers(&survivors),
            time: chrono::Utc::now().to_rfc3339(),
        },
        engine: EngineSummary {
            top_match_score: summary.top_score,
            top_match_risk_level: summary.top_risk_level,
            risk_score: summary.risk_score,
            risk_level: summary.risk_level,
            response_code: summary.response_code,
            flagged: summary.flagged,
            match_counts: match_counts(&all_matches),
        },
        matches: survivors,
    };

    if let Ok(value) = serde_json::to_value(&response) {
        if let Err(err) = crate::audit::persist_response(viewer_output_dir, &value) {
            tracing::warn!(error = %err, "failed to persist screening response");
        }
    }

    Ok(response)
}
