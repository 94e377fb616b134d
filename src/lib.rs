// SPDX-License-Identifier: PMPL-1.0-or-later

//! bayzzer — Bayesian-guided directed fuzzing for C programs.
//!
//! A lightweight static taint analysis (`kanren`) enumerates alarms; the
//! derivation of each alarm is translated into a discrete Bayesian
//! network (`bayesian`) whose posterior probabilities prioritize a
//! round-based fuzzing campaign (`scheduler`) driving a directed
//! mutational fuzzer (`fuzzer`) against a C source file (`frontend`).

pub mod bayesian;
pub mod config;
pub mod errors;
pub mod frontend;
pub mod fuzzer;
pub mod kanren;
pub mod scheduler;
pub mod storage;
