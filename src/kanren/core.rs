// SPDX-License-Identifier: PMPL-1.0-or-later

//! Derivation graph: interned facts and rule applications forming the
//! provenance DAG that the Datalog evaluator populates and the
//! Bayesian synthesizer later consumes.
//!
//! A fact's identity is its canonical string form `Predicate(a1, a2, ...)`;
//! inserting an equal fact or re-deriving a rule application with an
//! identical premise set is a no-op, which is what keeps forward
//! chaining monotone.

use std::collections::{HashMap, HashSet};

pub type NodeId = String;

/// What a graph node represents: a ground fact or a single successful
/// firing of a rule from a specific set of premises.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Fact { predicate: String, args: Vec<String> },
    Rule { label: String },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_fact(&self) -> bool {
        matches!(self.kind, NodeKind::Fact { .. })
    }

    pub fn predicate(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Fact { predicate, .. } => Some(predicate),
            NodeKind::Rule { .. } => None,
        }
    }
}

/// Canonicalize a fact identity: `Predicate(a1, a2, ...)`.
pub fn fact_id(predicate: &str, args: &[impl AsRef<str>]) -> NodeId {
    let joined = args
        .iter()
        .map(|a| a.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{predicate}({joined})")
}

/// Canonicalize a rule-application identity from a sorted premise set.
pub fn rule_id(label: &str, premises: &[NodeId], conclusion: &NodeId) -> NodeId {
    let mut sorted = premises.to_vec();
    sorted.sort();
    format!("R_{label}_[{}]->{conclusion}", sorted.join(","))
}

/// A directed graph of Facts and RuleApplications. Every incoming edge
/// to a Rule node originates at a Fact; every outgoing edge from a Rule
/// node terminates at a Fact. May contain cycles (mutually recursive
/// derivations); cycle removal is the Bayesian synthesizer's job, not
/// this layer's.
#[derive(Debug, Default)]
pub struct DerivationGraph {
    nodes: HashMap<NodeId, Node>,
    facts_by_predicate: HashMap<String, HashSet<NodeId>>,
    /// node -> nodes it has an edge to (premise-of / concludes)
    outgoing: HashMap<NodeId, Vec<NodeId>>,
    /// node -> nodes with an edge to it
    incoming: HashMap<NodeId, Vec<NodeId>>,
    rules_applied: usize,
}

impl DerivationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact if absent; returns its canonical id either way.
    pub fn add_fact(&mut self, predicate: &str, args: &[impl AsRef<str>]) -> NodeId {
        let id = fact_id(predicate, args);
        if !self.nodes.contains_key(&id) {
            self.nodes.insert(
                id.clone(),
                Node {
                    id: id.clone(),
                    kind: NodeKind::Fact {
                        predicate: predicate.to_string(),
                        args: args.iter().map(|a| a.as_ref().to_string()).collect(),
                    },
                },
            );
            self.facts_by_predicate
                .entry(predicate.to_string())
                .or_default()
                .insert(id.clone());
        }
        id
    }

    /// Record a rule application `label` firing over `premises` to
    /// derive `conclusion`. `conclusion` must already exist as a fact
    /// (callers derive it via `add_fact` first — a conclusion that
    /// already existed is not re-added, but the application is still
    /// recorded as an additional OR input). Returns `true` if this is
    /// a new derivation, `false` if an identical premise set already
    /// produced this conclusion via this rule.
    pub fn add_rule_application(
        &mut self,
        label: &str,
        premises: &[NodeId],
        conclusion: &NodeId,
    ) -> bool {
        let id = rule_id(label, premises, conclusion);
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                kind: NodeKind::Rule {
                    label: label.to_string(),
                },
            },
        );
        for premise in premises {
            self.outgoing.entry(premise.clone()).or_default().push(id.clone());
            self.incoming.entry(id.clone()).or_default().push(premise.clone());
        }
        self.outgoing.entry(id.clone()).or_default().push(conclusion.clone());
        self.incoming
            .entry(conclusion.clone())
            .or_default()
            .push(id.clone());
        self.rules_applied += 1;
        true
    }

    pub fn get_facts(&self, predicate: &str) -> Vec<&NodeId> {
        self.facts_by_predicate
            .get(predicate)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All facts whose predicate is `Alarm`.
    pub fn alarms(&self) -> Vec<NodeId> {
        self.get_facts("Alarm").into_iter().cloned().collect()
    }

    /// All ancestors of `node` plus `node` itself, in unspecified order.
    pub fn derivation_path(&self, node: &str) -> Vec<NodeId> {
        if !self.nodes.contains_key(node) {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut stack = vec![node.to_string()];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            if let Some(parents) = self.incoming.get(&cur) {
                for p in parents {
                    if !seen.contains(p) {
                        stack.push(p.clone());
                    }
                }
            }
        }
        seen.into_iter().collect()
    }

    pub fn total_facts(&self) -> usize {
        self.nodes.values().filter(|n| n.is_fact()).count()
    }

    pub fn rules_applied(&self) -> usize {
        self.rules_applied
    }

    /// All nodes (facts and rule applications) in the graph.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Direct successors of `node` (premise-of / concludes edges).
    pub fn successors(&self, node: &str) -> &[NodeId] {
        self.outgoing.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Direct predecessors of `node`.
    pub fn predecessors(&self, node: &str) -> &[NodeId] {
        self.incoming.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All edges as (source, target) pairs, for the Bayesian synthesizer.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut out = Vec::new();
        for (src, dsts) in &self.outgoing {
            for dst in dsts {
                out.push((src.clone(), dst.clone()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_inserting_equal_fact_is_noop() {
        let mut g = DerivationGraph::new();
        let a = g.add_fact("Input", &["x"]);
        let b = g.add_fact("Input", &["x"]);
        assert_eq!(a, b);
        assert_eq!(g.total_facts(), 1);
    }

    #[test]
    fn canonical_id_matches_predicate_form() {
        let mut g = DerivationGraph::new();
        let id = g.add_fact("Memory", &["v", "9"]);
        assert_eq!(id, "Memory(v, 9)");
    }

    #[test]
    fn rule_application_dedup_by_premise_set() {
        let mut g = DerivationGraph::new();
        let inp = g.add_fact("Input", &["a"]);
        let taint = g.add_fact("Taint", &["a"]);
        assert!(g.add_rule_application("R1", std::slice::from_ref(&inp), &taint));
        assert!(!g.add_rule_application("R1", &[inp], &taint));
        assert_eq!(g.rules_applied(), 1);
    }

    #[test]
    fn empty_premises_are_valid() {
        let mut g = DerivationGraph::new();
        let fact = g.add_fact("Axiom", &["a"]);
        assert!(g.add_rule_application("R0", &[], &fact));
        assert_eq!(g.predecessors(&fact).len(), 1);
    }

    #[test]
    fn re_adding_existing_conclusion_still_records_application() {
        let mut g = DerivationGraph::new();
        let a = g.add_fact("Input", &["a"]);
        let b = g.add_fact("Input", &["b"]);
        let c = g.add_fact("Taint", &["c"]);
        assert!(g.add_rule_application("RA", &[a], &c));
        assert!(g.add_rule_application("RB", &[b], &c));
        assert_eq!(g.total_facts(), 3);
        assert_eq!(g.predecessors(&c).len(), 2);
    }

    #[test]
    fn derivation_path_includes_ancestors_and_self() {
        let mut g = DerivationGraph::new();
        let inp = g.add_fact("Input", &["a"]);
        let taint = g.add_fact("Taint", &["a"]);
        g.add_rule_application("R1", std::slice::from_ref(&inp), &taint);
        let mem = g.add_fact("Memory", &["a", "9"]);
        let alarm = g.add_fact("Alarm", &["9"]);
        g.add_rule_application("R3", &[taint.clone(), mem.clone()], &alarm);

        let path = g.derivation_path(&alarm);
        assert!(path.contains(&alarm));
        assert!(path.contains(&taint));
        assert!(path.contains(&inp));
        assert!(path.contains(&mem));
    }

    #[test]
    fn alarms_collects_only_alarm_predicate() {
        let mut g = DerivationGraph::new();
        g.add_fact("Input", &["a"]);
        g.add_fact("Alarm", &["9"]);
        g.add_fact("Alarm", &["12"]);
        let mut alarms = g.alarms();
        alarms.sort();
        assert_eq!(alarms, vec!["Alarm(12)".to_string(), "Alarm(9)".to_string()]);
    }

    #[test]
    fn graph_may_contain_cycles() {
        let mut g = DerivationGraph::new();
        let a = g.add_fact("Fact", &["A"]);
        let b = g.add_fact("Fact", &["B"]);
        assert!(g.add_rule_application("R1", std::slice::from_ref(&a), &b));
        assert!(g.add_rule_application("R2", &[b], &a));
        // No panic/assert on cycles: the graph layer permits them.
        assert_eq!(g.rules_applied(), 2);
    }
}
