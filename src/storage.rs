// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persisted `CampaignStats` layout (spec §6.5), written the same way
//! the teacher's `storage::persist_report` writes reports:
//! `serde_json::to_string_pretty` + `fs::write`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BugReport {
    pub target_line: u32,
    /// Hex-encoded triggering input (may contain non-UTF8/control bytes).
    pub triggering_input: String,
    pub time_found: f64,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundSnapshot {
    pub round: u32,
    pub time_elapsed: f64,
    pub targets_count: u32,
    pub bugs_found: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CampaignStats {
    pub total_time: f64,
    pub rounds_run: u32,
    pub targets_fuzzed: u32,
    pub unique_bugs: Vec<BugReport>,
    pub history: Vec<RoundSnapshot>,
}

impl CampaignStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bug at `line`, deduped by target line (spec §3's
    /// uniqueness key).
    pub fn record_bug(&mut self, line: u32, triggering_input: &[u8], time_found: f64, output: String) {
        if self.unique_bugs.iter().any(|b| b.target_line == line) {
            return;
        }
        self.unique_bugs.push(BugReport {
            target_line: line,
            triggering_input: hex::encode(triggering_input),
            time_found,
            output,
        });
    }

    pub fn has_bug_at(&self, line: u32) -> bool {
        self.unique_bugs.iter().any(|b| b.target_line == line)
    }
}

pub fn persist(stats: &CampaignStats, path: &Path) -> anyhow::Result<()> {
    let payload = serde_json::to_string_pretty(stats)?;
    fs::write(path, payload)?;
    Ok(())
}
