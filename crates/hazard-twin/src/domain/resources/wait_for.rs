//! Wait-For Graph
//!
//! Built from a snapshot of lock holders and waiters: an edge `w -> h`
//! labelled `r` means actor `w` is blocked on resource `r`, which `h` holds.
//! A cycle in this graph is a deadlock.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::domain::sync::LockPrimitive;

/// One "waits for" relation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct WaitEdge {
    /// Blocked actor
    pub waiter: String,
    /// Resource it is blocked on
    pub resource: String,
    /// Actor holding that resource
    pub holder: String,
}

impl fmt::Display for WaitEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} waits on {} held by {}", self.waiter, self.resource, self.holder)
    }
}

/// Directed wait-for graph over actor names
#[derive(Debug, Default, Clone)]
pub struct WaitForGraph {
    edges: BTreeMap<String, BTreeSet<WaitEdge>>,
}

impl WaitForGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the holders and waiters of `locks`
    pub fn from_locks(locks: &[&dyn LockPrimitive]) -> Self {
        let mut graph = Self::new();
        for lock in locks {
            let holders = lock.holders();
            for waiter in lock.waiters() {
                for holder in &holders {
                    graph.add_edge(&waiter, lock.name(), holder);
                }
            }
        }
        graph
    }

    /// Record that `waiter` is blocked on `resource` held by `holder`
    pub fn add_edge(&mut self, waiter: &str, resource: &str, holder: &str) {
        self.edges
            .entry(waiter.to_owned())
            .or_default()
            .insert(WaitEdge {
                waiter: waiter.to_owned(),
                resource: resource.to_owned(),
                holder: holder.to_owned(),
            });
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// First cycle found, as the chain of edges that closes it
    ///
    /// Actors are tried in name order, so the result is deterministic for a
    /// given snapshot.
    pub fn find_cycle(&self) -> Option<Vec<WaitEdge>> {
        for start in self.edges.keys() {
            let mut visited = BTreeSet::new();
            let mut path = Vec::new();
            if self.dfs_cycle(start, start, &mut visited, &mut path) {
                return Some(path);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        current: &str,
        target: &str,
        visited: &mut BTreeSet<String>,
        path: &mut Vec<WaitEdge>,
    ) -> bool {
        if !visited.insert(current.to_owned()) {
            return false;
        }
        let Some(outgoing) = self.edges.get(current) else {
            return false;
        };
        for edge in outgoing {
            path.push(edge.clone());
            if edge.holder == target || self.dfs_cycle(&edge.holder, target, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }
}
