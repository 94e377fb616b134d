// SPDX-License-Identifier: PMPL-1.0-or-later

//! Probabilistic model: translates the derivation graph into a discrete
//! Bayesian network and answers posterior-probability queries over it.

pub mod inference;
pub mod network;

pub use inference::{Evidence, InferenceEngine};
pub use network::{build_network, BayesianNetwork};
