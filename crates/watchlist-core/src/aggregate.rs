//! Aggregator and decision (C8), grounded in
//! `original_source/src/rules.py::apply_rules` and
//! `original_source/src/screening.py::submitresponse` (riskScore
//! clamping, per-list bonus, response shape assembly).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::scoring::{RecommendedAction, RiskLevel, ScoredMatch, ScoringPolicy};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningSummary {
    pub top_score: i32,
    pub risk_score: i64,
    pub top_risk_level: RiskLevel,
    pub risk_level: RiskLevel,
    pub flagged: bool,
    pub response_code: &'static str,
    pub recommended_action: RecommendedAction,
}

fn normalized_name(s: &str) -> String {
    s.trim().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Takes every `(party, candidate)` score produced by C7 and reduces it
/// to the surfaced match list, the full deduplicated match list (which
/// still includes suppressed slight-risk matches, for `matchCounts` —
/// SPEC_FULL.md §4.7/S5), plus the overall screening summary.
pub fn aggregate(matches: Vec<ScoredMatch>, policy: &ScoringPolicy) -> (Vec<ScoredMatch>, Vec<ScoredMatch>, ScreeningSummary) {
    // Keep only the best match per (sanctionsList, sanctionsId, role, party_index).
    let mut best: HashMap<(String, String, String, usize), ScoredMatch> = HashMap::new();
    for m in matches {
        let key = (m.sanctions_list.clone(), m.sanctions_id.clone(), m.role.clone(), m.party_index);
        best.entry(key)
            .and_modify(|existing| {
                if m.final_score > existing.final_score {
                    *existing = m.clone();
                }
            })
            .or_insert(m);
    }
    let survivors: Vec<ScoredMatch> = best.into_values().collect();

    // riskScore is computed from the step-1 survivors (best per list/id/
    // role/party_index) — SPEC_FULL.md §4.7 derives it per party from
    // those, before the identity collapse below, which applies only to
    // the surfaced match list, not to the risk calculation. Collapsing
    // first would let one party's high-scoring hit on a shared
    // (list, id) shadow another party's independent hit on that same
    // candidate, silently dropping a list from that party's bonus count.
    let top_score = survivors.iter().map(|m| m.final_score).max().unwrap_or(0);

    let mut by_party: HashMap<usize, Vec<&ScoredMatch>> = HashMap::new();
    for m in &survivors {
        by_party.entry(m.party_index).or_default().push(m);
    }

    let mut risk_score: i64 = 0;
    for party_matches in by_party.values() {
        let base = party_matches.iter().map(|m| m.final_score).max().unwrap_or(0) as i64;
        let distinct_lists: HashSet<&str> = party_matches
            .iter()
            .filter(|m| policy.risk_bands.level_for(m.final_score as f64 / 100.0) >= RiskLevel::ModerateRisk)
            .map(|m| m.sanctions_list.as_str())
            .collect();
        let bonus = distinct_lists.len().saturating_sub(1) as i64 * policy.bonus_per_list;
        let party_score = (base + bonus).min(100);
        risk_score = risk_score.max(party_score);
    }

    let top_risk_level = policy.risk_bands.level_for(top_score as f64 / 100.0);
    let risk_level = policy.risk_bands.level_for(risk_score as f64 / 100.0);
    let flagged = risk_level.flagged();
    let response_code = risk_level.response_code();
    let recommended_action = policy.recommended_action(risk_score);

    // Further collapse by (normalised party name, sanctionsList, sanctionsId),
    // keeping the highest score — catches the same person appearing under
    // more than one role/party_index (e.g. both debtor and creditor).
    // This feeds only the surfaced match list and `matchCounts`, not the
    // risk calculation above.
    let mut by_identity: HashMap<(String, String, String), ScoredMatch> = HashMap::new();
    for m in survivors {
        let key = (normalized_name(&m.party_name), m.sanctions_list.clone(), m.sanctions_id.clone());
        by_identity
            .entry(key)
            .and_modify(|existing| {
                if m.final_score > existing.final_score {
                    *existing = m.clone();
                }
            })
            .or_insert(m);
    }
    let mut survivors: Vec<ScoredMatch> = by_identity.into_values().collect();

    let sort_matches = |list: &mut Vec<ScoredMatch>| {
        list.sort_by(|a, b| {
            a.party_index
                .cmp(&b.party_index)
                .then(b.final_score.cmp(&a.final_score))
                .then(a.sanctions_list.cmp(&b.sanctions_list))
                .then(a.sanctions_id.cmp(&b.sanctions_id))
        });
    };

    sort_matches(&mut survivors);
    let all_matches = survivors.clone();

    // "no risk" pairs are C7's zero-signal output for candidates that only
    // reached the scorer via a loose index/token hit (§4.6's contract
    // returns `Some` for these, not `null` — `null` is reserved for the
    // DOB veto) — they never surface in `matches[]`, only in the full
    // `all_matches` list `matchCounts` is built from (S1, S4).
    let mut surfaced = survivors;
    surfaced.retain(|m| m.risk_level != RiskLevel::NoRisk);
    if !policy.show_slight_matches {
        surfaced.retain(|m| m.risk_level != RiskLevel::SlightRisk);
    }

    (
        surfaced,
        all_matches,
        ScreeningSummary {
            top_score,
            risk_score,
            top_risk_level,
            risk_level,
            flagged,
            response_code,
            recommended_action,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(party_index: usize, party_name: &str, list: &str, id: &str, score: i32, risk_level: RiskLevel) -> ScoredMatch {
        ScoredMatch {
            party_index,
            party_name: party_name.to_string(),
            role: "Debtor".to_string(),
            sanctions_name: "Example Name".to_string(),
            sanctions_aliases: vec![],
            sanctions_list: list.to_string(),
            sanctions_id: id.to_string(),
            risk_level,
            final_score: score,
            matched_fields: vec![],
            match_summary: String::new(),
        }
    }

    #[test]
    fn keeps_best_per_list_id_role_party() {
        let policy = ScoringPolicy::default();
        let matches = vec![
            scored(0, "John Doe", "OFAC_SDN", "1", 60, RiskLevel::HighRisk),
            scored(0, "John Doe", "OFAC_SDN", "1", 90, RiskLevel::VeryHighRisk),
        ];
        let (survivors, _, _) = aggregate(matches, &policy);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].final_score, 90);
    }

    #[test]
    fn multi_list_bonus_raises_risk_score() {
        let policy = ScoringPolicy::default();
        let matches = vec![
            scored(0, "John Doe", "OFAC_SDN", "1", 80, RiskLevel::HighRisk),
            scored(0, "John Doe", "UN", "2", 75, RiskLevel::HighRisk),
        ];
        let (_, _, summary) = aggregate(matches, &policy);
        assert_eq!(summary.top_score, 80);
        assert_eq!(summary.risk_score, 83); // 80 + (2 lists - 1) * 3
        assert_eq!(summary.recommended_action, RecommendedAction::Review);
    }

    #[test]
    fn identity_collapse_does_not_steal_another_partys_list_bonus() {
        // Debtor (party 0) "John Doe" hits OFAC_SDN/1 and UN/2, both 80 —
        // two distinct lists at moderate+ risk should earn the bonus
        // (80 + 3 = 83). Creditor (party 1), also "John Doe", independently
        // hits UN/2 at a higher score (81). The identity-collapse pass (by
        // normalised name + list + id, ignoring party_index) must not run
        // before the per-party risk calculation, or it silently reassigns
        // party 0's UN/2 entry to party 1, leaving party 0 with only one
        // list and no bonus.
        let policy = ScoringPolicy::default();
        let matches = vec![
            scored(0, "John Doe", "OFAC_SDN", "1", 80, RiskLevel::HighRisk),
            scored(0, "John Doe", "UN", "2", 80, RiskLevel::HighRisk),
            ScoredMatch { role: "Creditor".to_string(), ..scored(1, "John Doe", "UN", "2", 81, RiskLevel::HighRisk) },
        ];
        let (_, _, summary) = aggregate(matches, &policy);
        assert_eq!(summary.risk_score, 83);
    }

    #[test]
    fn slight_risk_hidden_by_default_but_counted() {
        let policy = ScoringPolicy::default();
        let matches = vec![scored(0, "John Doe", "OFAC_SDN", "1", 15, RiskLevel::SlightRisk)];
        let (survivors, all_matches, summary) = aggregate(matches, &policy);
        assert!(survivors.is_empty());
        assert_eq!(all_matches.len(), 1);
        assert_eq!(summary.risk_score, 15);
        assert_eq!(summary.recommended_action, RecommendedAction::Release);
    }

    #[test]
    fn slight_risk_shown_when_toggle_enabled() {
        let mut policy = ScoringPolicy::default();
        policy.show_slight_matches = true;
        let matches = vec![scored(0, "John Doe", "OFAC_SDN", "1", 15, RiskLevel::SlightRisk)];
        let (survivors, all_matches, _) = aggregate(matches, &policy);
        assert_eq!(survivors.len(), 1);
        assert_eq!(all_matches.len(), 1);
    }

    #[test]
    fn no_risk_matches_are_counted_but_never_surfaced() {
        let policy = ScoringPolicy::default();
        let matches = vec![scored(0, "Acme Widgets Ltd", "UK", "1", 0, RiskLevel::NoRisk)];
        let (survivors, all_matches, summary) = aggregate(matches, &policy);
        assert!(survivors.is_empty());
        assert_eq!(all_matches.len(), 1);
        assert_eq!(summary.risk_score, 0);
        assert_eq!(summary.response_code, "NONE");
    }

    #[test]
    fn identity_dedup_collapses_same_name_across_roles() {
        let policy = ScoringPolicy::default();
        let matches = vec![
            ScoredMatch { role: "Debtor".to_string(), ..scored(0, "John Doe", "OFAC_SDN", "1", 70, RiskLevel::HighRisk) },
            ScoredMatch { role: "Creditor".to_string(), party_index: 1, ..scored(1, "John Doe", "OFAC_SDN", "1", 85, RiskLevel::HighRisk) },
        ];
        let (survivors, _, _) = aggregate(matches, &policy);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].final_score, 85);
    }
}
