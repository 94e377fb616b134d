// SPDX-License-Identifier: PMPL-1.0-or-later

//! Directed mutational fuzzer: the "compile-and-run with instrumentation
//! marker" primitive the campaign scheduler drives per target line.

pub mod mutate;
pub mod rng;
pub mod target;

pub use target::{DirectedFuzzer, FuzzingResult};
