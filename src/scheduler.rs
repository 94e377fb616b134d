// SPDX-License-Identifier: PMPL-1.0-or-later

//! Campaign scheduler: the round loop that prioritizes alarms by
//! posterior probability, drives the directed fuzzer against the
//! highest-ranked targets, and feeds outcomes back as evidence.
//!
//! Grounded on the teacher's round-based mutation-runner control flow
//! (explicit loop, `Instant`-based elapsed-time checks, a history
//! vector of round snapshots).

use std::path::Path;
use std::time::{Duration, Instant};

use crate::bayesian::{build_network, BayesianNetwork, Evidence, InferenceEngine};
use crate::config::Config;
use crate::errors::CoreError;
use crate::frontend;
use crate::fuzzer::DirectedFuzzer;
use crate::kanren::datalog::{evaluate, load_edb};
use crate::kanren::{DerivationGraph, NodeId};
use crate::storage::CampaignStats;

const EXECUTION_FLOOR: f64 = 0.1;

pub struct CampaignParams {
    pub total_budget: Duration,
    pub alpha: f64,
    pub parallel: bool,
    pub quiet: bool,
}

/// Parse the line number out of an `Alarm(N)` node id.
fn alarm_line(alarm: &str) -> Option<u32> {
    let inner = alarm.strip_prefix("Alarm(")?.strip_suffix(')')?;
    inner.parse().ok()
}

fn qprintln(quiet: bool, msg: impl AsRef<str>) {
    if !quiet {
        println!("{}", msg.as_ref());
    }
}

/// Build the derivation graph and Bayesian network for `source_path`,
/// returning the set of alarms to campaign over. A source file with no
/// discoverable alarms is a setup error (spec §7): there is nothing for
/// the scheduler to do.
pub fn build_campaign(source_path: &Path, config: &Config) -> Result<(DerivationGraph, BayesianNetwork, Vec<NodeId>), CoreError> {
    let edb = frontend::analyze_file(source_path)
        .map_err(|e| CoreError::setup(format!("reading {}: {e}", source_path.display())))?;

    let mut graph = DerivationGraph::new();
    load_edb(&mut graph, &edb);
    evaluate(&mut graph);

    let alarms = graph.alarms();
    if alarms.is_empty() {
        return Err(CoreError::setup(format!(
            "no alarms derived from {} — nothing to fuzz",
            source_path.display()
        )));
    }

    let network = build_network(&graph, config.prior_probability, config.rule_probability);
    Ok((graph, network, alarms))
}

/// Drives the round loop described in spec §4.G to completion,
/// returning the accumulated campaign statistics.
pub fn run_campaign(
    source_path: &Path,
    work_dir: &Path,
    network: &BayesianNetwork,
    alarms: &[NodeId],
    config: &Config,
    params: &CampaignParams,
) -> CampaignStats {
    let engine = InferenceEngine::new(network);
    let mut evidence = Evidence::new();
    let mut stats = CampaignStats::new();

    let t0 = Instant::now();
    let mut round: u32 = 0;
    let beta = config.initial_round_budget_secs;

    while t0.elapsed() < params.total_budget {
        round += 1;
        if round % config.reconstruction_interval == 0 {
            evidence.reset_negative();
            qprintln(params.quiet, format!("round {round}: reconstruction (negative evidence cleared)"));
        }

        let ranked = engine.rank_alarms(alarms, &evidence);
        if ranked.is_empty() {
            break;
        }

        let take = ((params.alpha * ranked.len() as f64).floor() as usize).max(1);
        let targets: Vec<(NodeId, f64)> = ranked.into_iter().take(take).collect();

        let elapsed_secs = t0.elapsed().as_secs_f64();
        let remaining = (params.total_budget.as_secs_f64() - elapsed_secs).max(0.0);
        let mut per_target = beta.min(remaining / targets.len() as f64);
        if per_target < EXECUTION_FLOOR {
            per_target = remaining.max(EXECUTION_FLOOR);
        }
        let per_target_budget = Duration::from_secs_f64(per_target);

        qprintln(
            params.quiet,
            format!("round {round}: fuzzing {} target(s), {:.2}s each", targets.len(), per_target),
        );

        let outcomes: Vec<(NodeId, u32, crate::fuzzer::FuzzingResult)> = if params.parallel {
            fuzz_round_parallel(source_path, work_dir, round, &targets, per_target_budget)
        } else {
            fuzz_round_sequential(source_path, work_dir, round, &targets, per_target_budget)
        };

        for (alarm, line, result) in outcomes {
            stats.targets_fuzzed += 1;
            if result.crashed {
                evidence.set(&alarm, true);
                if !stats.has_bug_at(line) {
                    let observed_at = t0.elapsed().as_secs_f64();
                    stats.record_bug(line, &result.triggering_input, observed_at, result.output.clone());
                }
                qprintln(params.quiet, format!("  {alarm}: crashed (line {line})"));
            } else if !result.reached {
                evidence.set(&alarm, false);
            }
        }

        stats.history.push(crate::storage::RoundSnapshot {
            round,
            time_elapsed: t0.elapsed().as_secs_f64(),
            targets_count: targets.len() as u32,
            bugs_found: stats.unique_bugs.len() as u32,
        });
    }

    stats.total_time = t0.elapsed().as_secs_f64();
    stats.rounds_run = round;
    stats
}

fn fuzz_round_sequential(
    source_path: &Path,
    work_dir: &Path,
    round: u32,
    targets: &[(NodeId, f64)],
    per_target_budget: Duration,
) -> Vec<(NodeId, u32, crate::fuzzer::FuzzingResult)> {
    targets
        .iter()
        .enumerate()
        .filter_map(|(idx, (alarm, _prob))| {
            let line = alarm_line(alarm)?;
            let worker_tag = format!("r{round}_{idx}");
            let mut fuzzer = DirectedFuzzer::new(source_path, work_dir);
            let result = fuzzer.fuzz_target(line, per_target_budget, &worker_tag);
            Some((alarm.clone(), line, result))
        })
        .collect()
}

fn fuzz_round_parallel(
    source_path: &Path,
    work_dir: &Path,
    round: u32,
    targets: &[(NodeId, f64)],
    per_target_budget: Duration,
) -> Vec<(NodeId, u32, crate::fuzzer::FuzzingResult)> {
    use rayon::prelude::*;

    targets
        .par_iter()
        .enumerate()
        .filter_map(|(idx, (alarm, _prob))| {
            let line = alarm_line(alarm)?;
            let worker_tag = format!("r{round}_{idx}");
            let mut fuzzer = DirectedFuzzer::new(source_path, work_dir);
            let result = fuzzer.fuzz_target(line, per_target_budget, &worker_tag);
            Some((alarm.clone(), line, result))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_c(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn alarm_line_parses_numeric_argument() {
        assert_eq!(alarm_line("Alarm(9)"), Some(9));
        assert_eq!(alarm_line("Taint(a)"), None);
    }

    #[test]
    fn build_campaign_fails_setup_with_no_alarms() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_c(dir.path(), "safe.c", "int main() {\n    return 0;\n}\n");
        let config = Config::default();
        let result = build_campaign(&src, &config);
        assert!(result.is_err());
    }

    #[test]
    fn build_campaign_succeeds_with_derivable_alarm() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_c(
            dir.path(),
            "overflow.c",
            "#include <string.h>\nint main(int argc, char **argv) {\n    char buffer[10];\n    strcpy(buffer, argv[1]);\n    return 0;\n}\n",
        );
        let config = Config::default();
        let (_, _, alarms) = build_campaign(&src, &config).unwrap();
        assert!(!alarms.is_empty());
    }

    #[test]
    fn run_campaign_terminates_within_budget_and_records_history() {
        if std::process::Command::new(std::env::var("CC").unwrap_or_else(|_| "cc".into()))
            .arg("--version")
            .output()
            .is_err()
        {
            eprintln!("skipping: no C compiler available");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let src = write_c(
            dir.path(),
            "overflow.c",
            "#include <string.h>\n#include <stdio.h>\nint main(int argc, char **argv) {\n    char buffer[10];\n    strcpy(buffer, argv[1]);\n    printf(\"%s\\n\", buffer);\n    return 0;\n}\n",
        );
        let config = Config::default();
        let (_, network, alarms) = build_campaign(&src, &config).unwrap();
        let params = CampaignParams {
            total_budget: Duration::from_secs(6),
            alpha: 1.0,
            parallel: false,
            quiet: true,
        };
        let stats = run_campaign(&src, dir.path(), &network, &alarms, &config, &params);
        assert!(stats.rounds_run >= 1);
        assert!(!stats.history.is_empty());
        assert!(!stats.unique_bugs.is_empty(), "expected the overflow to be found within budget");
    }
}
