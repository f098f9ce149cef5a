//! Shared types for the scorer (C7) and aggregator (C8): risk bands, the
//! per-match result shape, and the policy value everything is threaded
//! through (SPEC_FULL.md §9 — no ambient singleton, a plain value passed
//! to constructors).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    NoRisk,
    SlightRisk,
    ModerateRisk,
    HighRisk,
    VeryHighRisk,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::NoRisk => "no risk",
            RiskLevel::SlightRisk => "slight risk",
            RiskLevel::ModerateRisk => "moderate risk",
            RiskLevel::HighRisk => "high risk",
            RiskLevel::VeryHighRisk => "very high risk",
        }
    }

    pub fn response_code(&self) -> &'static str {
        match self {
            RiskLevel::NoRisk => "NONE",
            RiskLevel::SlightRisk => "SLIGHT_RISK",
            RiskLevel::ModerateRisk => "MODERATE_RISK",
            RiskLevel::HighRisk => "HIGH_RISK",
            RiskLevel::VeryHighRisk => "VERY_HIGH_RISK",
        }
    }

    pub fn flagged(&self) -> bool {
        matches!(
            self,
            RiskLevel::ModerateRisk | RiskLevel::HighRisk | RiskLevel::VeryHighRisk
        )
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialises to the lower-case, space-separated form the response JSON
/// and `original_source/src/screening.py::submitresponse` both expect
/// (`"very high risk"`, not `"very_high_risk"`).
impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "no risk" => Ok(RiskLevel::NoRisk),
            "slight risk" => Ok(RiskLevel::SlightRisk),
            "moderate risk" => Ok(RiskLevel::ModerateRisk),
            "high risk" => Ok(RiskLevel::HighRisk),
            "very high risk" => Ok(RiskLevel::VeryHighRisk),
            other => Err(D::Error::custom(format!("unknown risk level: {other}"))),
        }
    }
}

/// Risk-band thresholds (spec §4.6 table). `s` is a capped score in
/// `[0.0, 1.0]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RiskBands {
    pub very_high: f64,
    pub high: f64,
    pub moderate: f64,
    pub slight: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            very_high: 0.90,
            high: 0.70,
            moderate: 0.25,
            slight: 0.10,
        }
    }
}

impl RiskBands {
    pub fn level_for(&self, s: f64) -> RiskLevel {
        if s >= self.very_high {
            RiskLevel::VeryHighRisk
        } else if s >= self.high {
            RiskLevel::HighRisk
        } else if s >= self.moderate {
            RiskLevel::ModerateRisk
        } else if s > self.slight {
            RiskLevel::SlightRisk
        } else {
            RiskLevel::NoRisk
        }
    }
}

/// Recommended action from the aggregator's threshold rule (spec §4.7,
/// grounded in `original_source/src/rules.py::apply_rules`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    Release,
    Review,
    Escalate,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Release => "Release",
            RecommendedAction::Review => "Review",
            RecommendedAction::Escalate => "Escalate",
            RecommendedAction::NotApplicable => "N/A",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One weighted signal that fired during scoring.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedField {
    pub field: String,
    pub strength: String,
}

impl MatchedField {
    pub fn new(field: impl Into<String>, strength: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            strength: strength.into(),
        }
    }
}

/// Contract output of C7's `score(party, record)`: `None` on a hard veto,
/// `Some` otherwise (spec §4.6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMatch {
    pub party_index: usize,
    pub party_name: String,
    pub role: String,
    pub sanctions_name: String,
    pub sanctions_aliases: Vec<String>,
    pub sanctions_list: String,
    pub sanctions_id: String,
    pub risk_level: RiskLevel,
    pub final_score: i32,
    pub matched_fields: Vec<MatchedField>,
    pub match_summary: String,
}

/// Every threshold and weight the scorer and aggregator need, passed in
/// rather than read from globals (SPEC_FULL.md §9/§10.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub risk_bands: RiskBands,
    /// Aggregator's per-list bonus for multiple moderate+ hits on one
    /// party (spec §4.7, default 3 — SPEC_FULL.md §11).
    pub bonus_per_list: i64,
    /// `riskScore` threshold for `Release` (default 25).
    pub release_below: i64,
    /// `riskScore` threshold for `Review` (default 25).
    pub review_from: i64,
    /// `riskScore` threshold for `Escalate`; `None` means never (spec
    /// §4.7 / env var `ESCALATE_FROM`).
    pub escalate_from: Option<i64>,
    /// Surface slight-risk matches in `matches[]` (default false, spec
    /// §11 Open Question resolution / env var `SHOW_SLIGHT_MATCHES`).
    pub show_slight_matches: bool,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            risk_bands: RiskBands::default(),
            bonus_per_list: 3,
            release_below: 25,
            review_from: 25,
            escalate_from: None,
            show_slight_matches: false,
        }
    }
}

impl ScoringPolicy {
    /// Mirrors `original_source/src/rules.py::apply_rules`.
    pub fn recommended_action(&self, risk_score: i64) -> RecommendedAction {
        if let Some(esc) = self.escalate_from {
            if risk_score >= esc {
                return RecommendedAction::Escalate;
            }
        }
        if risk_score >= self.review_from {
            return RecommendedAction::Review;
        }
        if risk_score <= self.release_below {
            return RecommendedAction::Release;
        }
        RecommendedAction::NotApplicable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_band_monotonic() {
        let bands = RiskBands::default();
        let scores = [0.0, 0.05, 0.11, 0.25, 0.70, 0.90, 1.0];
        let mut last = RiskLevel::NoRisk;
        for s in scores {
            let level = bands.level_for(s);
            assert!(level >= last, "risk level regressed at score {s}");
            last = level;
        }
    }

    #[test]
    fn default_rules_match_spec() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.recommended_action(10), RecommendedAction::Release);
        assert_eq!(policy.recommended_action(25), RecommendedAction::Review);
        assert_eq!(policy.recommended_action(63), RecommendedAction::Review);
        assert_eq!(policy.recommended_action(26), RecommendedAction::Review);
    }

    #[test]
    fn escalate_from_takes_priority() {
        let mut policy = ScoringPolicy::default();
        policy.escalate_from = Some(80);
        assert_eq!(policy.recommended_action(90), RecommendedAction::Escalate);
        assert_eq!(policy.recommended_action(50), RecommendedAction::Review);
    }
}
