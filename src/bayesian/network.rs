// SPDX-License-Identifier: PMPL-1.0-or-later

//! Translation of a derivation DAG into a discrete Bayesian network:
//! noisy-AND CPDs for rule nodes, deterministic-OR CPDs for fact nodes,
//! Bernoulli priors for roots.
//!
//! The derivation graph may contain cycles (mutually recursive rule
//! firings); a Bayesian network cannot, so [`build_network`] removes
//! back edges first, re-enumerating after every removal since breaking
//! one cycle can uncover another that shared an edge with it.

use std::collections::{HashMap, HashSet, VecDeque};

use colored::Colorize;

use crate::kanren::{DerivationGraph, NodeId, NodeKind};

/// A conditional probability table for one node, keyed by the joint
/// configuration of its parents in `parents` order. `prob_true[config]`
/// is `P(node = true | parents = config)`, where `config` is a bitmask
/// with parent `i` at bit `i`. Both noisy-AND and deterministic-OR are
/// symmetric in their parents, so the bit order only needs to be
/// self-consistent, not meaningful on its own.
#[derive(Debug, Clone)]
pub struct Cpd {
    pub parents: Vec<NodeId>,
    pub prob_true: Vec<f64>,
}

impl Cpd {
    /// A root node's Bernoulli prior: zero parents, one column.
    pub fn prior(theta: f64) -> Self {
        Cpd {
            parents: Vec::new(),
            prob_true: vec![theta],
        }
    }

    /// Noisy AND: true with probability `theta` only when every parent
    /// is true, false otherwise. Models a rule firing when all its
    /// premises hold, with `theta` absorbing the rule's own
    /// imprecision/noise.
    pub fn noisy_and(parents: Vec<NodeId>, theta: f64) -> Self {
        let k = parents.len();
        let prob_true = (0..1usize << k)
            .map(|config| {
                let all_true = (0..k).all(|i| (config >> i) & 1 == 1);
                if all_true {
                    theta
                } else {
                    0.0
                }
            })
            .collect();
        Cpd { parents, prob_true }
    }

    /// Deterministic OR: true iff at least one parent is true. Models a
    /// fact that holds whenever any rule application derives it.
    pub fn deterministic_or(parents: Vec<NodeId>) -> Self {
        let k = parents.len();
        let prob_true = (0..1usize << k)
            .map(|config| {
                let any_true = (0..k).any(|i| (config >> i) & 1 == 1);
                if any_true {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        Cpd { parents, prob_true }
    }

    /// Number of columns (`2^k` parent configurations).
    pub fn num_columns(&self) -> usize {
        self.prob_true.len()
    }
}

/// A discrete Bayesian network synthesized from a [`DerivationGraph`].
#[derive(Debug, Clone, Default)]
pub struct BayesianNetwork {
    pub nodes: Vec<NodeId>,
    parents: HashMap<NodeId, Vec<NodeId>>,
    cpds: HashMap<NodeId, Cpd>,
}

impl BayesianNetwork {
    pub fn parents_of(&self, node: &str) -> &[NodeId] {
        self.parents.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn cpd(&self, node: &str) -> Option<&Cpd> {
        self.cpds.get(node)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.cpds.contains_key(node)
    }

    /// Kahn's algorithm over the parent relation: true iff the network
    /// has no cycles left.
    pub fn is_acyclic(&self) -> bool {
        let mut indeg: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.parents_of(n).len()))
            .collect();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for n in &self.nodes {
            for p in self.parents_of(n) {
                children.entry(p.as_str()).or_default().push(n.as_str());
            }
        }
        let mut queue: VecDeque<&str> = indeg
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut visited = 0usize;
        while let Some(n) = queue.pop_front() {
            visited += 1;
            if let Some(cs) = children.get(n) {
                for c in cs {
                    let d = indeg.get_mut(c).unwrap();
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(c);
                    }
                }
            }
        }
        visited == self.nodes.len()
    }
}

/// Build a Bayesian network from `graph`. `theta_prior` is the
/// Bernoulli parameter for root nodes (no derivation); `theta_rule` is
/// the noisy-AND parameter shared by every rule node.
pub fn build_network(graph: &DerivationGraph, theta_prior: f64, theta_rule: f64) -> BayesianNetwork {
    let nodes: Vec<NodeId> = graph.all_nodes().map(|n| n.id.clone()).collect();

    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for n in &nodes {
        adjacency.entry(n.clone()).or_default();
    }
    for (u, v) in graph.edges() {
        adjacency.entry(u).or_default().push(v);
    }
    for succs in adjacency.values_mut() {
        succs.sort();
        succs.dedup();
    }

    if break_cycles(&nodes, &mut adjacency) {
        eprintln!("{}", "warning: derivation graph had cycles; edges were removed to build an acyclic network".yellow());
    }

    let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for n in &nodes {
        parents.entry(n.clone()).or_default();
    }
    for (u, vs) in &adjacency {
        for v in vs {
            parents.entry(v.clone()).or_default().push(u.clone());
        }
    }
    for p in parents.values_mut() {
        p.sort();
        p.dedup();
    }

    let mut cpds = HashMap::new();
    for n in &nodes {
        let node = graph.node(n).expect("node id came from the same graph");
        let node_parents = parents.get(n).cloned().unwrap_or_default();
        let cpd = if node_parents.is_empty() {
            Cpd::prior(theta_prior)
        } else {
            match &node.kind {
                NodeKind::Rule { .. } => Cpd::noisy_and(node_parents, theta_rule),
                NodeKind::Fact { .. } => Cpd::deterministic_or(node_parents),
            }
        };
        cpds.insert(n.clone(), cpd);
    }

    BayesianNetwork { nodes, parents, cpds }
}

/// Remove back edges until `adjacency` is acyclic, re-enumerating after
/// every removal. Each round picks the first cycle found by a
/// deterministic DFS (nodes and successors visited in sorted order),
/// rotates it to start at its lexicographically smallest node, and
/// drops the edge from its last node back to its first. Returns whether
/// any edge was removed, for the `CycleRemovalWarning` (spec §7).
fn break_cycles(nodes: &[NodeId], adjacency: &mut HashMap<NodeId, Vec<NodeId>>) -> bool {
    let mut sorted_nodes = nodes.to_vec();
    sorted_nodes.sort();

    let mut removed_any = false;
    loop {
        match find_cycle(&sorted_nodes, adjacency) {
            None => break,
            Some(cycle) => {
                let canon = canonical_rotation(&cycle);
                let u = canon.last().expect("cycle is non-empty").clone();
                let v = canon.first().expect("cycle is non-empty").clone();
                if let Some(succs) = adjacency.get_mut(&u) {
                    succs.retain(|x| x != &v);
                }
                removed_any = true;
            }
        }
    }
    removed_any
}

fn find_cycle(sorted_nodes: &[NodeId], adjacency: &HashMap<NodeId, Vec<NodeId>>) -> Option<Vec<NodeId>> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    for start in sorted_nodes {
        if visited.contains(start) {
            continue;
        }
        let mut stack: Vec<NodeId> = Vec::new();
        let mut on_stack: HashSet<NodeId> = HashSet::new();
        if let Some(cycle) = dfs_find_cycle(start, adjacency, &mut visited, &mut stack, &mut on_stack) {
            return Some(cycle);
        }
    }
    None
}

fn dfs_find_cycle(
    node: &NodeId,
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    visited: &mut HashSet<NodeId>,
    stack: &mut Vec<NodeId>,
    on_stack: &mut HashSet<NodeId>,
) -> Option<Vec<NodeId>> {
    visited.insert(node.clone());
    stack.push(node.clone());
    on_stack.insert(node.clone());

    if let Some(succs) = adjacency.get(node) {
        for next in succs {
            if on_stack.contains(next) {
                let pos = stack.iter().position(|x| x == next).expect("on_stack implies in stack");
                return Some(stack[pos..].to_vec());
            }
            if !visited.contains(next) {
                if let Some(c) = dfs_find_cycle(next, adjacency, visited, stack, on_stack) {
                    return Some(c);
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
    None
}

fn canonical_rotation(cycle: &[NodeId]) -> Vec<NodeId> {
    let min_idx = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated = cycle[min_idx..].to_vec();
    rotated.extend_from_slice(&cycle[..min_idx]);
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kanren::datalog::{evaluate, load_edb, EdbFacts};

    fn linear_chain_graph() -> DerivationGraph {
        let mut g = DerivationGraph::new();
        load_edb(
            &mut g,
            &EdbFacts {
                input_sources: vec!["a".into()],
                data_flows: vec![("a".into(), "b".into())],
                memory_operations: vec![("b".into(), 9)],
            },
        );
        evaluate(&mut g);
        g
    }

    #[test]
    fn builds_acyclic_network_from_acyclic_graph() {
        let g = linear_chain_graph();
        let net = build_network(&g, 0.9, 0.9);
        assert!(net.is_acyclic());
        assert_eq!(net.nodes.len(), g.all_nodes().count());
    }

    #[test]
    fn root_nodes_get_prior_cpd() {
        let g = linear_chain_graph();
        let net = build_network(&g, 0.9, 0.9);
        let input_cpd = net.cpd("Input(a)").unwrap();
        assert!(input_cpd.parents.is_empty());
        assert_eq!(input_cpd.prob_true, vec![0.9]);
    }

    #[test]
    fn rule_node_gets_noisy_and_cpd() {
        let g = linear_chain_graph();
        let net = build_network(&g, 0.9, 0.9);
        let rule_id = net
            .parents_of("Taint(a)")
            .first()
            .cloned()
            .expect("Taint(a) has one deriving rule");
        let cpd = net.cpd(&rule_id).unwrap();
        assert_eq!(cpd.parents, vec!["Input(a)".to_string()]);
        assert_eq!(cpd.prob_true, vec![0.0, 0.9]);
    }

    #[test]
    fn fact_node_gets_deterministic_or_cpd() {
        let mut g = DerivationGraph::new();
        load_edb(
            &mut g,
            &EdbFacts {
                input_sources: vec!["a".into(), "b".into()],
                data_flows: vec![("a".into(), "c".into()), ("b".into(), "c".into())],
                memory_operations: vec![("c".into(), 5)],
            },
        );
        evaluate(&mut g);
        let net = build_network(&g, 0.9, 0.9);
        let taint_c_cpd = net.cpd("Taint(c)").unwrap();
        assert_eq!(taint_c_cpd.parents.len(), 2);
        // OR of two parents: true unless both are false.
        assert_eq!(taint_c_cpd.prob_true, vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn cpd_columns_form_valid_distributions() {
        let g = linear_chain_graph();
        let net = build_network(&g, 0.9, 0.9);
        for n in &net.nodes {
            let cpd = net.cpd(n).unwrap();
            assert_eq!(cpd.num_columns(), 1 << cpd.parents.len());
            for p in &cpd.prob_true {
                assert!((0.0..=1.0).contains(p));
            }
        }
    }

    #[test]
    fn cycle_in_derivation_graph_is_broken() {
        let mut g = DerivationGraph::new();
        let a = g.add_fact("Fact", &["A"]);
        let b = g.add_fact("Fact", &["B"]);
        g.add_rule_application("R1", std::slice::from_ref(&a), &b);
        g.add_rule_application("R2", &[b], &a);

        let net = build_network(&g, 0.9, 0.9);
        assert!(net.is_acyclic());
    }

    #[test]
    fn cycle_breaking_is_deterministic_across_runs() {
        let mut g = DerivationGraph::new();
        let a = g.add_fact("Fact", &["A"]);
        let b = g.add_fact("Fact", &["B"]);
        let c = g.add_fact("Fact", &["C"]);
        g.add_rule_application("R1", std::slice::from_ref(&a), &b);
        g.add_rule_application("R2", std::slice::from_ref(&b), &c);
        g.add_rule_application("R3", &[c], &a);

        let net1 = build_network(&g, 0.9, 0.9);
        let net2 = build_network(&g, 0.9, 0.9);
        for n in &net1.nodes {
            assert_eq!(net1.parents_of(n), net2.parents_of(n));
        }
    }
}
