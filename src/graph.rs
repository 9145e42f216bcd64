//! Production ordering graph.
//!
//! Provides the `OrderGraph` type, which represents declared ordering
//! constraints between produced resources as a directed acyclic graph
//! (DAG). The tick driver uses it to decide which resource produces first
//! within a tick when one production formula reads another's balance.

use crate::error::EngineError;
use crate::id::ResourceId;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A DAG of production ordering constraints.
///
/// Nodes are [`ResourceId`]s; an edge from B to A means "A reads B", so B
/// must produce before A within a tick. Constraints are declared
/// explicitly on each production; the graph never infers them from what a
/// formula happens to touch.
///
/// # Examples
///
/// ```rust
/// use tickmill::graph::OrderGraph;
/// use tickmill::ResourceId;
///
/// let mut graph = OrderGraph::new();
/// let gold = ResourceId::new("gold");
/// let gems = ResourceId::new("gems");
///
/// // Gem production reads the gold balance.
/// graph.add_read(gems, gold.clone());
///
/// let order = graph.production_order().unwrap();
/// assert_eq!(order[0], gold);
/// ```
pub struct OrderGraph {
    graph: DiGraph<ResourceId, ()>,
    node_map: HashMap<ResourceId, NodeIndex>,
}

impl OrderGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Add a resource node if absent, returning its index either way.
    pub fn add_node(&mut self, id: ResourceId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&id) {
            idx
        } else {
            let idx = self.graph.add_node(id.clone());
            self.node_map.insert(id, idx);
            idx
        }
    }

    /// Declare that `reader`'s production formula reads `source`'s balance,
    /// so `source` must produce first. Both nodes are added as needed.
    pub fn add_read(&mut self, reader: ResourceId, source: ResourceId) {
        let reader_idx = self.add_node(reader);
        let source_idx = self.add_node(source);
        self.graph.add_edge(source_idx, reader_idx, ());
    }

    pub fn contains_node(&self, id: &ResourceId) -> bool {
        self.node_map.contains_key(id)
    }

    /// Reject cyclic constraints.
    ///
    /// DFS-based so the error can carry the actual cycle path (toposort
    /// alone only reports one offending node).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tickmill::graph::OrderGraph;
    /// use tickmill::ResourceId;
    ///
    /// let mut graph = OrderGraph::new();
    /// let a = ResourceId::new("a");
    /// let b = ResourceId::new("b");
    ///
    /// graph.add_read(a.clone(), b.clone());
    /// assert!(graph.detect_cycles().is_ok());
    ///
    /// // b reads a as well: a -> b -> a.
    /// graph.add_read(b, a);
    /// assert!(graph.detect_cycles().is_err());
    /// ```
    pub fn detect_cycles(&self) -> Result<(), EngineError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        path: &mut Vec<ResourceId>,
    ) -> Option<EngineError> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(self.graph[node].clone());

        for neighbor in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let entry = self.graph[neighbor].clone();
                // Trim the lead-in so the error shows only the loop itself.
                return if let Some(start) = path.iter().position(|id| id == &entry) {
                    let mut cycle: Vec<ResourceId> = path[start..].to_vec();
                    cycle.push(entry);
                    Some(EngineError::Cycle(cycle))
                } else {
                    Some(EngineError::Cycle(vec![
                        self.graph[node].clone(),
                        entry.clone(),
                        entry,
                    ]))
                };
            }
        }

        rec_stack.remove(&node);
        path.pop();
        None
    }

    /// The within-tick production order: every source precedes its readers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tickmill::graph::OrderGraph;
    /// use tickmill::ResourceId;
    ///
    /// let mut graph = OrderGraph::new();
    /// let gold = ResourceId::new("gold");
    /// let gems = ResourceId::new("gems");
    /// graph.add_read(gems.clone(), gold.clone());
    ///
    /// let order = graph.production_order().unwrap();
    /// let gold_pos = order.iter().position(|r| r == &gold).unwrap();
    /// let gems_pos = order.iter().position(|r| r == &gems).unwrap();
    /// assert!(gold_pos < gems_pos);
    /// ```
    pub fn production_order(&self) -> Result<Vec<ResourceId>, EngineError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            // Unreachable after detect_cycles, but keep the error total.
            Err(cycle) => Err(EngineError::Cycle(vec![self.graph[cycle.node_id()].clone()])),
        }
    }
}

impl Default for OrderGraph {
    fn default() -> Self {
        Self::new()
    }
}
