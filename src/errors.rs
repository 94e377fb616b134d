// SPDX-License-Identifier: PMPL-1.0-or-later

//! Typed core error kinds (spec §7). Distinct kinds carry distinct
//! recovery policy: `SetupError` aborts the campaign before the loop,
//! everything else is recovered locally by the scheduler. The CLI
//! boundary (`main.rs`) converts these into `anyhow::Error` via `?`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing source file, parse failure, empty alarm set. Fatal —
    /// the campaign aborts before entering the round loop.
    #[error("setup failed: {0}")]
    Setup(String),

    /// Instrumented compilation failed for one target. Per-target,
    /// non-fatal.
    #[error("compilation failed for {path}: {stderr}")]
    Build { path: PathBuf, stderr: String },

    /// Subprocess spawn failure, timeout, or decoding failure during
    /// execution of an instrumented binary. Per-execution, non-fatal.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A variable-elimination query for a single alarm failed
    /// (disconnected node, inconsistent evidence). Per-alarm,
    /// non-fatal — the affected alarm's probability is reported as 0.0.
    #[error("inference failed for {node}")]
    Inference { node: String },
}

impl CoreError {
    pub fn setup(msg: impl Into<String>) -> Self {
        CoreError::Setup(msg.into())
    }
}
