// callgraph.rs — Per-tier call graph.
//
// For each tier, maps a caller to its callees, and each edge to the set of
// distinct argument lists it was called with. Maps are ordered so that the
// JSON and DOT renderings are deterministic.
//
// The argument sets are a diagnostic artifact only; code generation never
// reads them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::ast::Tier;

/// Caller name of managed-tier top-level code.
pub const ROOT: &str = "root";
/// Caller name of anonymous managed-tier function expressions.
pub const ANONYMOUS: &str = "anonymous";

pub type Edges = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallGraph {
    embedded: BTreeMap<String, Edges>,
    managed: BTreeMap<String, Edges>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn tier(&self, tier: Tier) -> &BTreeMap<String, Edges> {
        match tier {
            Tier::Embedded => &self.embedded,
            Tier::Managed => &self.managed,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut BTreeMap<String, Edges> {
        match tier {
            Tier::Embedded => &mut self.embedded,
            Tier::Managed => &mut self.managed,
        }
    }

    /// Register a function node. Idempotent.
    pub fn add_function(&mut self, tier: Tier, name: &str) {
        self.tier_mut(tier).entry(name.to_string()).or_default();
    }

    /// Record a call edge with its rendered argument list.
    pub fn add_call(&mut self, tier: Tier, caller: &str, callee: &str, args: &str) {
        self.tier_mut(tier)
            .entry(caller.to_string())
            .or_default()
            .entry(callee.to_string())
            .or_default()
            .insert(args.to_string());
    }

    pub fn reset(&mut self, tier: Tier) {
        self.tier_mut(tier).clear();
    }

    /// Drop managed edges whose callee is not a known name.
    pub fn prune_managed(&mut self, known: impl Fn(&str) -> bool) {
        let mut dropped = 0usize;
        for callees in self.managed.values_mut() {
            let before = callees.len();
            callees.retain(|callee, _| known(callee));
            dropped += before - callees.len();
        }
        debug!(dropped, "pruned managed call graph");
    }

    pub fn functions(&self, tier: Tier) -> impl Iterator<Item = &str> {
        self.tier(tier).keys().map(String::as_str)
    }

    pub fn callees(&self, tier: Tier, caller: &str) -> Option<&Edges> {
        self.tier(tier).get(caller)
    }

    pub fn has_edge(&self, tier: Tier, caller: &str, callee: &str) -> bool {
        self.callees(tier, caller)
            .is_some_and(|edges| edges.contains_key(callee))
    }

    pub fn edge_count(&self, tier: Tier) -> usize {
        self.tier(tier).values().map(BTreeMap::len).sum()
    }

    /// Pretty-printed JSON for `--emit callgraph`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
