//! Response persistence for C10: every screening response is written to
//! a known location as both a single-file snapshot and an append-only
//! history log (SPEC_FULL.md §4.9/§10.5), grounded in
//! `original_source/src/engine.py::_persist_response`.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

pub fn persist_response(output_dir: &Path, response: &Value) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating viewer output dir {}", output_dir.display()))?;

    let body = serde_json::to_vec_pretty(response)?;
    std::fs::write(output_dir.join("latest.json"), &body)
        .context("writing latest.json")?;

    let mut history = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_dir.join("history.jsonl"))
        .context("opening history.jsonl")?;
    writeln!(history, "{}", serde_json::to_string(response)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_latest_and_appends_history() {
        let dir = std::env::temp_dir().join(format!("watchlist-audit-test-{}", std::process::id()));
        let response = json!({"riskScore": 10});
        persist_response(&dir, &response).unwrap();
        persist_response(&dir, &response).unwrap();

        let latest: Value = serde_json::from_slice(&std::fs::read(dir.join("latest.json")).unwrap()).unwrap();
        assert_eq!(latest, response);

        let history = std::fs::read_to_string(dir.join("history.jsonl")).unwrap();
        assert_eq!(history.lines().count(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
