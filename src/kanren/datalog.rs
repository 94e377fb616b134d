// SPDX-License-Identifier: PMPL-1.0-or-later

//! Semi-naive Datalog evaluator over the coarse, field-insensitive
//! taint rules:
//!
//! - R1 `Taint(v) :- Input(v)`
//! - R2 `Taint(v2) :- Taint(v1), Flow(v1, v2)`
//! - R3 `Alarm(s) :- Taint(v), Memory(v, s)`
//!
//! Termination is guaranteed because the Herbrand universe is bounded
//! by the finite set of variables and source lines in the EDB, and
//! `DerivationGraph::add_fact`/`add_rule_application` dedup ensures
//! monotone growth.

use crate::kanren::core::DerivationGraph;

/// The extensional database handed over by the C front-end collaborator.
#[derive(Debug, Clone, Default)]
pub struct EdbFacts {
    /// Variables that receive data from a known input function.
    pub input_sources: Vec<String>,
    /// `(src_var, dst_var)` pairs: assignment or argument-to-parameter
    /// bindings.
    pub data_flows: Vec<(String, String)>,
    /// `(var, line)` pairs: array subscripts, pointer derefs, and
    /// memory-sink-function arguments.
    pub memory_operations: Vec<(String, u32)>,
}

/// Assert `Input`, `Flow`, and `Memory` EDB facts into the graph.
pub fn load_edb(graph: &mut DerivationGraph, edb: &EdbFacts) {
    for v in &edb.input_sources {
        graph.add_fact("Input", &[v.as_str()]);
    }
    for (v1, v2) in &edb.data_flows {
        graph.add_fact("Flow", &[v1.as_str(), v2.as_str()]);
    }
    for (v, line) in &edb.memory_operations {
        graph.add_fact("Memory", &[v.as_str(), &line.to_string()]);
    }
}

/// Run the R1/R2/R3 fixpoint. Returns the number of passes where at
/// least one new fact or rule application was derived (0 if the EDB
/// was already saturated).
pub fn evaluate(graph: &mut DerivationGraph) -> usize {
    let mut passes_with_change = 0;
    loop {
        let inputs: Vec<_> = graph.get_facts("Input").into_iter().cloned().collect();
        let taints: Vec<_> = graph.get_facts("Taint").into_iter().cloned().collect();
        let flows: Vec<_> = graph.get_facts("Flow").into_iter().cloned().collect();
        let memories: Vec<_> = graph.get_facts("Memory").into_iter().cloned().collect();

        let mut changed = false;

        // R1: Taint(v) :- Input(v)
        for inp in &inputs {
            let v = arg_of(graph, inp, 0);
            let conclusion = graph.add_fact("Taint", &[v.as_str()]);
            if graph.add_rule_application("R1", std::slice::from_ref(inp), &conclusion) {
                changed = true;
            }
        }

        // R2: Taint(v2) :- Taint(v1), Flow(v1, v2)
        for t in &taints {
            let v1 = arg_of(graph, t, 0);
            for f in &flows {
                let f_v1 = arg_of(graph, f, 0);
                if f_v1 != v1 {
                    continue;
                }
                let v2 = arg_of(graph, f, 1);
                let conclusion = graph.add_fact("Taint", &[v2.as_str()]);
                if graph.add_rule_application("R2", &[t.clone(), f.clone()], &conclusion) {
                    changed = true;
                }
            }
        }

        // R3: Alarm(s) :- Taint(v), Memory(v, s)
        for t in &taints {
            let v = arg_of(graph, t, 0);
            for m in &memories {
                let m_v = arg_of(graph, m, 0);
                if m_v != v {
                    continue;
                }
                let s = arg_of(graph, m, 1);
                let conclusion = graph.add_fact("Alarm", &[s.as_str()]);
                if graph.add_rule_application("R3", &[t.clone(), m.clone()], &conclusion) {
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
        passes_with_change += 1;
    }
    passes_with_change
}

fn arg_of(graph: &DerivationGraph, node: &str, idx: usize) -> String {
    match &graph.node(node).expect("fact node must exist").kind {
        crate::kanren::core::NodeKind::Fact { args, .. } => args[idx].clone(),
        crate::kanren::core::NodeKind::Rule { .. } => {
            unreachable!("arg_of called on a rule node")
        }
    }
}
