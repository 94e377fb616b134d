// SPDX-License-Identifier: PMPL-1.0-or-later

//! Derivation engine: the provenance DAG linking input facts, rule
//! firings, and derived facts, built by a semi-naive Datalog fixpoint.
//!
//! Inspired by miniKanren/Datalog-style relational derivation, adapted
//! here to the fixed R1/R2/R3 taint rules rather than general
//! unification.

pub mod core;
pub mod datalog;

pub use self::core::{DerivationGraph, NodeId, NodeKind};
pub use datalog::EdbFacts;
