// SPDX-License-Identifier: PMPL-1.0-or-later

//! Optional YAML configuration (spec §6.4), matching the teacher's
//! existing `serde_yaml` dependency and the original prototype's
//! `yaml.safe_load`/`_load_config`. A missing file is not an error —
//! defaults apply. Unknown keys are ignored for forward compatibility.

use std::path::Path;

use serde::Deserialize;

pub const DEFAULT_PRIOR_PROBABILITY: f64 = 0.9;
pub const DEFAULT_RULE_PROBABILITY: f64 = 0.9;
pub const DEFAULT_RECONSTRUCTION_INTERVAL: u32 = 5;
pub const DEFAULT_INITIAL_ROUND_BUDGET_SECS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prior_probability: f64,
    pub rule_probability: f64,
    pub reconstruction_interval: u32,
    pub initial_round_budget_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prior_probability: DEFAULT_PRIOR_PROBABILITY,
            rule_probability: DEFAULT_RULE_PROBABILITY,
            reconstruction_interval: DEFAULT_RECONSTRUCTION_INTERVAL,
            initial_round_budget_secs: DEFAULT_INITIAL_ROUND_BUDGET_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    bayesian_network: Option<RawBayesianNetwork>,
    fuzzing: Option<RawFuzzing>,
}

#[derive(Debug, Deserialize, Default)]
struct RawBayesianNetwork {
    prior_probability: Option<f64>,
    rule_probability: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFuzzing {
    reconstruction_interval: Option<u32>,
    initial_round_budget: Option<f64>,
}

/// Load and apply overrides from `path`. A missing file yields
/// `Config::default()`; only a present-but-unparseable file is an error.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };
    if !path.exists() {
        return Ok(config);
    }
    let text = std::fs::read_to_string(path)?;
    let raw: RawConfig = serde_yaml::from_str(&text)?;

    if let Some(bn) = raw.bayesian_network {
        if let Some(p) = bn.prior_probability {
            config.prior_probability = p;
        }
        if let Some(r) = bn.rule_probability {
            config.rule_probability = r;
        }
    }
    if let Some(f) = raw.fuzzing {
        if let Some(r) = f.reconstruction_interval {
            config.reconstruction_interval = r;
        }
        if let Some(b) = f.initial_round_budget {
            config.initial_round_budget_secs = b;
        }
    }

    Ok(config)
}
