// SPDX-License-Identifier: PMPL-1.0-or-later

//! Exact inference over a [`BayesianNetwork`] by variable elimination,
//! restricted to the ancestors of the query and evidence variables
//! (barren-node pruning keeps every query small even on large
//! campaigns).

use std::collections::{HashMap, HashSet};

use crate::bayesian::network::{BayesianNetwork, Cpd};
use crate::kanren::NodeId;

/// Evidence pinned onto the network by the campaign scheduler: a
/// partial assignment of boolean values to fact/rule nodes, fed back
/// from fuzzing outcomes.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    values: HashMap<NodeId, bool>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: &str, value: bool) {
        self.values.insert(node.to_string(), value);
    }

    /// Remove evidence for `node`, or all evidence if `node` is `None`.
    pub fn clear(&mut self, node: Option<&str>) {
        match node {
            Some(n) => {
                self.values.remove(n);
            }
            None => self.values.clear(),
        }
    }

    /// Drop every pinned-false entry, keeping pinned-true ones. Used
    /// periodically so that negative fuzzing results don't permanently
    /// suppress an alarm the campaign never directly disproved.
    pub fn reset_negative(&mut self) {
        self.values.retain(|_, v| *v);
    }

    pub fn get(&self, node: &str) -> Option<bool> {
        self.values.get(node).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &bool)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A factor over a fixed set of binary variables, represented as a full
/// table keyed by a per-variable 0/1 assignment vector in `vars` order.
#[derive(Debug, Clone)]
struct Factor {
    vars: Vec<NodeId>,
    table: HashMap<Vec<u8>, f64>,
}

impl Factor {
    fn from_cpd(node: &str, cpd: &Cpd) -> Self {
        let mut vars = cpd.parents.clone();
        vars.push(node.to_string());
        let k = cpd.parents.len();
        let mut table = HashMap::with_capacity(cpd.prob_true.len() * 2);
        for config in 0..1usize << k {
            let parent_bits: Vec<u8> = (0..k).map(|i| ((config >> i) & 1) as u8).collect();
            let p_true = cpd.prob_true[config];
            for node_val in 0u8..2 {
                let mut key = parent_bits.clone();
                key.push(node_val);
                let p = if node_val == 1 { p_true } else { 1.0 - p_true };
                table.insert(key, p);
            }
        }
        Factor { vars, table }
    }

    fn restrict(&self, var: &str, value: bool) -> Factor {
        let Some(pos) = self.vars.iter().position(|v| v == var) else {
            return self.clone();
        };
        let val_u8 = value as u8;
        let mut new_vars = self.vars.clone();
        new_vars.remove(pos);
        let mut new_table = HashMap::new();
        for (key, p) in &self.table {
            if key[pos] == val_u8 {
                let mut nk = key.clone();
                nk.remove(pos);
                new_table.insert(nk, *p);
            }
        }
        Factor {
            vars: new_vars,
            table: new_table,
        }
    }

    fn multiply(&self, other: &Factor) -> Factor {
        let mut union_vars = self.vars.clone();
        for v in &other.vars {
            if !union_vars.contains(v) {
                union_vars.push(v.clone());
            }
        }
        let k = union_vars.len();
        let self_idx: Vec<usize> = self
            .vars
            .iter()
            .map(|v| union_vars.iter().position(|u| u == v).unwrap())
            .collect();
        let other_idx: Vec<usize> = other
            .vars
            .iter()
            .map(|v| union_vars.iter().position(|u| u == v).unwrap())
            .collect();

        let mut table = HashMap::new();
        for config in 0..1usize << k {
            let full_key: Vec<u8> = (0..k).map(|i| ((config >> i) & 1) as u8).collect();
            let self_key: Vec<u8> = self_idx.iter().map(|&i| full_key[i]).collect();
            let other_key: Vec<u8> = other_idx.iter().map(|&i| full_key[i]).collect();
            if let (Some(p1), Some(p2)) = (self.table.get(&self_key), other.table.get(&other_key)) {
                table.insert(full_key, p1 * p2);
            }
        }
        Factor { vars: union_vars, table }
    }

    fn sum_out(&self, var: &str) -> Factor {
        let Some(pos) = self.vars.iter().position(|v| v == var) else {
            return self.clone();
        };
        let mut new_vars = self.vars.clone();
        new_vars.remove(pos);
        let mut new_table: HashMap<Vec<u8>, f64> = HashMap::new();
        for (key, p) in &self.table {
            let mut nk = key.clone();
            nk.remove(pos);
            *new_table.entry(nk).or_insert(0.0) += p;
        }
        Factor {
            vars: new_vars,
            table: new_table,
        }
    }
}

/// Walks up `parents_of` from `start`, collecting `start` and every
/// ancestor into `out`.
fn add_ancestors(network: &BayesianNetwork, start: &str, out: &mut HashSet<NodeId>) {
    if !network.contains(start) {
        return;
    }
    let mut stack = vec![start.to_string()];
    while let Some(n) = stack.pop() {
        if !out.insert(n.clone()) {
            continue;
        }
        for p in network.parents_of(&n) {
            stack.push(p.clone());
        }
    }
}

/// Exact inference engine over one [`BayesianNetwork`].
pub struct InferenceEngine<'a> {
    network: &'a BayesianNetwork,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(network: &'a BayesianNetwork) -> Self {
        Self { network }
    }

    /// `P(alarm = true | evidence)` for each of `alarms`. An alarm
    /// already pinned in `evidence` returns that pinned value verbatim,
    /// without running inference. A query that fails (inconsistent
    /// evidence, or the alarm is absent from the network) reports 0.0
    /// and does not affect the other alarms.
    pub fn compute_alarm_probabilities(&self, alarms: &[NodeId], evidence: &Evidence) -> HashMap<NodeId, f64> {
        let mut out = HashMap::with_capacity(alarms.len());
        for alarm in alarms {
            let p = match evidence.get(alarm) {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => self.query(alarm, evidence).unwrap_or(0.0),
            };
            out.insert(alarm.clone(), p);
        }
        out
    }

    /// `alarms` ranked by descending posterior probability, ties broken
    /// lexicographically by node id for determinism.
    pub fn rank_alarms(&self, alarms: &[NodeId], evidence: &Evidence) -> Vec<(NodeId, f64)> {
        let probs = self.compute_alarm_probabilities(alarms, evidence);
        let mut ranked: Vec<(NodeId, f64)> = probs.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }

    /// Exact marginal `P(var = true | evidence)` by variable
    /// elimination, restricted to the ancestors of `var` and of every
    /// evidence variable present in the network. Returns `None` if
    /// `var` is absent from the network or the evidence is
    /// inconsistent (zero total probability mass).
    fn query(&self, var: &str, evidence: &Evidence) -> Option<f64> {
        if !self.network.contains(var) {
            return None;
        }

        let mut relevant = HashSet::new();
        add_ancestors(self.network, var, &mut relevant);
        for (node, _) in evidence.iter() {
            add_ancestors(self.network, node, &mut relevant);
        }

        let mut factors: Vec<Factor> = relevant
            .iter()
            .map(|n| Factor::from_cpd(n, self.network.cpd(n).expect("relevant node has a cpd")))
            .collect();

        for (node, val) in evidence.iter() {
            if !relevant.contains(node) {
                continue;
            }
            factors = factors.into_iter().map(|f| f.restrict(node, *val)).collect();
        }

        let mut elim_order: Vec<NodeId> = relevant.iter().filter(|n| n.as_str() != var).cloned().collect();
        elim_order.sort();

        for elim_var in &elim_order {
            let (with_var, mut without_var): (Vec<Factor>, Vec<Factor>) =
                factors.into_iter().partition(|f| f.vars.contains(elim_var));
            if with_var.is_empty() {
                factors = without_var;
                continue;
            }
            let mut merged = with_var[0].clone();
            for f in &with_var[1..] {
                merged = merged.multiply(f);
            }
            without_var.push(merged.sum_out(elim_var));
            factors = without_var;
        }

        let mut final_factor = factors.pop()?;
        for f in factors {
            final_factor = final_factor.multiply(&f);
        }

        let pos = final_factor.vars.iter().position(|v| v == var)?;
        let (mut p0, mut p1) = (0.0, 0.0);
        for (key, p) in &final_factor.table {
            if key[pos] == 0 {
                p0 += p;
            } else {
                p1 += p;
            }
        }
        let total = p0 + p1;
        if total <= 0.0 {
            return None;
        }
        Some(p1 / total)
    }
}
