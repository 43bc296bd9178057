//! Scenario tree: node/time topology of the three market stages
//!
//! Decisions are taken in sequence: day-ahead positions first, intraday
//! adjustments once day-ahead uncertainty has resolved, real-time balancing
//! and reserve activation last. The tree records, for every node, which stage
//! it decides in, its probability weight, and its parent one stage earlier.
//!
//! The parent relation must form a forest rooted at day-ahead nodes: every
//! intraday/real-time node has exactly one parent, the parent sits exactly
//! one stage earlier, and day-ahead nodes have none. [`ScenarioTree::build`]
//! checks all of this up front so constraint generation can traverse the
//! structure without re-validating it.

use std::fmt;

use crate::error::{SempError, SempResult};
use crate::registry::{NodeId, Registry};

/// Decision stage of a scenario-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Day-ahead market (spot positions, reserve capacity bids)
    DayAhead,
    /// Intraday adjustment market
    Intraday,
    /// Real-time balancing and reserve activation
    RealTime,
}

impl Stage {
    /// The stage a parent node must sit in, if any.
    fn parent_stage(self) -> Option<Stage> {
        match self {
            Stage::DayAhead => None,
            Stage::Intraday => Some(Stage::DayAhead),
            Stage::RealTime => Some(Stage::Intraday),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::DayAhead => write!(f, "day-ahead"),
            Stage::Intraday => write!(f, "intraday"),
            Stage::RealTime => write!(f, "real-time"),
        }
    }
}

/// Validated scenario tree over the registry's node set.
#[derive(Debug, Clone)]
pub struct ScenarioTree {
    stages: Vec<Stage>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    probabilities: Vec<f64>,
}

impl ScenarioTree {
    /// Validate the node subsets and parent relation loaded into `registry`
    /// and build the tree.
    pub fn build(registry: &Registry) -> SempResult<ScenarioTree> {
        let n_nodes = registry.num_nodes();

        // Every node must carry exactly one stage label.
        let mut stages = Vec::with_capacity(n_nodes);
        for n in registry.nodes() {
            match registry.stage_of(n) {
                Some(stage) => stages.push(stage),
                None => {
                    return Err(SempError::Topology(format!(
                        "node '{}' belongs to no stage subset",
                        registry.node_name(n)
                    )))
                }
            }
        }

        // In-degree <= 1: at most one parent per node.
        let mut parents: Vec<Option<NodeId>> = vec![None; n_nodes];
        for &(child, parent) in registry.parent_links() {
            if parents[child.index()].is_some() {
                return Err(SempError::Topology(format!(
                    "node '{}' has more than one parent",
                    registry.node_name(child)
                )));
            }
            parents[child.index()] = Some(parent);
        }

        // Stage labels must be consistent with tree depth.
        for n in registry.nodes() {
            let stage = stages[n.index()];
            match (stage.parent_stage(), parents[n.index()]) {
                (None, None) => {}
                (None, Some(p)) => {
                    return Err(SempError::Topology(format!(
                        "day-ahead node '{}' has parent '{}', expected none",
                        registry.node_name(n),
                        registry.node_name(p)
                    )))
                }
                (Some(_), None) => {
                    return Err(SempError::Topology(format!(
                        "{stage} node '{}' has no parent",
                        registry.node_name(n)
                    )))
                }
                (Some(expected), Some(p)) => {
                    let actual = stages[p.index()];
                    if actual != expected {
                        return Err(SempError::Topology(format!(
                            "{stage} node '{}' has {actual} parent '{}', expected {expected}",
                            registry.node_name(n),
                            registry.node_name(p)
                        )));
                    }
                }
            }
        }

        let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); n_nodes];
        for n in registry.nodes() {
            if let Some(p) = parents[n.index()] {
                children[p.index()].push(n);
            }
        }

        let probabilities = registry.nodes().map(|n| registry.probability(n)).collect();

        Ok(ScenarioTree { stages, parents, children, probabilities })
    }

    pub fn stage(&self, n: NodeId) -> Stage {
        self.stages[n.index()]
    }

    pub fn parent(&self, n: NodeId) -> Option<NodeId> {
        self.parents[n.index()]
    }

    pub fn children(&self, n: NodeId) -> &[NodeId] {
        &self.children[n.index()]
    }

    pub fn probability(&self, n: NodeId) -> f64 {
        self.probabilities[n.index()]
    }

    pub fn num_nodes(&self) -> usize {
        self.stages.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.stages.len()).map(NodeId::new)
    }

    /// All nodes in one stage, in registry order.
    pub fn stage_nodes(&self, stage: Stage) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes().filter(move |n| self.stages[n.index()] == stage)
    }

    /// `(child, parent)` pairs in child order; the validated counterpart of
    /// the raw parent-link table.
    pub fn parent_pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes()
            .filter_map(move |n| self.parents[n.index()].map(|p| (n, p)))
    }

    /// The day-ahead root reached by following parents from `n`.
    pub fn day_ahead_ancestor(&self, n: NodeId) -> NodeId {
        let mut cur = n;
        while let Some(p) = self.parents[cur.index()] {
            cur = p;
        }
        cur
    }
}
