pub mod aggregate;
pub mod country;
pub mod entity;
pub mod party;
pub mod scoring;

pub use aggregate::{aggregate, ScreeningSummary};
pub use country::country_to_iso2;
pub use entity::{Classification, Entity, MatchKeys, RawRecord, Source};
pub use party::Party;
pub use scoring::{
    MatchedField, RecommendedAction, RiskLevel, ScoredMatch, ScoringPolicy,
};

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn dedupe_preserves_first_occurrence_case_insensitively() {
        let out = dedupe_ci(["Acme".to_string(), "ACME".to_string(), "Other".to_string()]);
        assert_eq!(out, vec!["Acme".to_string(), "Other".to_string()]);
    }

    #[test]
    fn strip_primary_name_alias_removes_case_folded_match() {
        let aliases = vec!["  ACME   Corp".to_string(), "Other Name".to_string()];
        let out = strip_primary_name_alias(aliases, Some("acme corp"));
        assert_eq!(out, vec!["Other Name".to_string()]);
    }

    #[test]
    fn split_aliases_prefers_semicolon_over_embedded_commas() {
        let out = split_aliases("Doe, Jane; Smith, John");
        assert_eq!(out, vec!["Doe, Jane".to_string(), "Smith, John".to_string()]);
    }

    #[test]
    fn split_aliases_falls_back_to_pipe_then_comma() {
        assert_eq!(split_aliases("Alpha | Beta"), vec!["Alpha".to_string(), "Beta".to_string()]);
        assert_eq!(split_aliases("Alpha, Beta"), vec!["Alpha".to_string(), "Beta".to_string()]);
        assert_eq!(split_aliases("Solo Alias"), vec!["Solo Alias".to_string()]);
    }
}

pub const PROJECT_NAME: &str = "sentrywatch";
pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus<'a> {
    pub status: &'a str,
    pub service: &'a str,
    pub version: &'a str,
}

pub fn health_status(service: &'static str) -> HealthStatus<'static> {
    HealthStatus {
        status: "ok",
        service,
        version: PROJECT_VERSION,
    }
}

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// NFKC-normalise, fold non-breaking spaces, collapse whitespace runs, strip.
/// The one text-cleaning routine every adapter and the party normaliser
/// funnel free text through before anything else happens to it.
pub fn clean_text(v: &str) -> Option<String> {
    use unicode_normalization::UnicodeNormalization;
    let folded: String = v.nfkc().collect::<String>().replace('\u{00A0}', " ");
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn fold(s: &str) -> String {
    s.trim().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Ordered set insert: case-folded, whitespace-normalised dedupe,
/// preserving first occurrence (spec's "ordered set" multisets —
/// `aliases`, `addresses`, and the identifier buckets).
pub fn dedupe_ci(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(fold(v)))
        .collect()
}

/// Invariant I2: drop any alias that equals `primary_name` under
/// case-folded, whitespace-normalised comparison.
pub fn strip_primary_name_alias(aliases: Vec<String>, primary_name: Option<&str>) -> Vec<String> {
    match primary_name {
        Some(name) => {
            let folded_name = fold(name);
            aliases.into_iter().filter(|a| fold(a) != folded_name).collect()
        }
        None => aliases,
    }
}

/// Splits one delimited alias cell on `;`, then `|`, then `,` — whichever
/// of those appears first in the string wins, and only that delimiter is
/// used (spec §4.2: "in that order of preference; first delimiter present
/// wins"). A single-cell source value like `"Doe, Jane; Smith, John"`
/// therefore splits into two "Last, First" aliases on `;`, not four
/// fragments from also splitting on the embedded commas.
pub fn split_aliases(v: &str) -> Vec<String> {
    let delimiter = [';', '|', ','].into_iter().find(|d| v.contains(*d));
    let parts: Vec<&str> = match delimiter {
        Some(d) => v.split(d).collect(),
        None => vec![v],
    };
    parts.into_iter().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}
