use std::collections::HashMap;

use stackr_core::error::{Result, StackrError};
use tracing::warn;

use super::node::{Node, NodeId};

/// Owns every node of a workflow and the designated start node.
///
/// Node ids are unique: inserting a node whose id is already present keeps
/// the existing node. Nodes are never removed, so a `NodeId` stays valid for
/// the life of the graph. Every successor handle points into the arena;
/// handles carried in by an inserted node that do not are dropped.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    by_id: HashMap<String, NodeId>,
    start: Option<NodeId>,
}

impl Graph {
    /// Build a graph from an optional start node plus any additional nodes.
    ///
    /// The node set is `{start} ∪ additional`, deduplicated by id with the
    /// first occurrence winning. If an additional node shares the start
    /// node's id, the start node is kept. Successor handles that do not
    /// resolve once every node is inserted are dropped.
    pub fn new(start: Option<Node>, additional: impl IntoIterator<Item = Node>) -> Self {
        let mut graph = Self::default();
        if let Some(node) = start {
            let id = graph.insert(node);
            graph.start = Some(id);
        }
        for node in additional {
            graph.insert(node);
        }
        graph.drop_dangling(0);
        graph
    }

    /// A chain `ids[0] -> ids[1] -> ...` whose first id is the start node.
    pub fn linear(ids: &[&str]) -> Self {
        let mut graph = Self::default();
        let mut prev: Option<NodeId> = None;
        for (i, id) in ids.iter().enumerate() {
            let handle = graph.add_node(Node::new(*id));
            if i == 0 {
                graph.start = Some(handle);
            }
            if let Some(p) = prev {
                graph.nodes[p.0].add_successor(handle);
            }
            prev = Some(handle);
        }
        graph
    }

    /// Insert a node unless one with the same id exists. Returns the handle
    /// of whichever node now owns the id.
    ///
    /// Successor handles on the inserted node that do not resolve in this
    /// graph are dropped; use [`Graph::add_successor`] or [`Graph::link`]
    /// to add edges.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let handle = self.insert(node);
        self.drop_dangling(handle.0);
        handle
    }

    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(existing) = self.by_id.get(node.id()) {
            return *existing;
        }
        let handle = NodeId(self.nodes.len());
        self.by_id.insert(node.id().to_string(), handle);
        self.nodes.push(node);
        handle
    }

    /// Remove out-of-arena successors from nodes at index `from` onward.
    fn drop_dangling(&mut self, from: usize) {
        let len = self.nodes.len();
        for node in self.nodes.iter_mut().skip(from) {
            let dropped = node.retain_successors_below(len);
            if dropped > 0 {
                warn!(node_id = node.id(), dropped, "Dropped successors outside the graph");
            }
        }
    }

    /// Append an edge between two nodes of this graph.
    pub fn add_successor(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if to.0 >= self.nodes.len() {
            return Err(StackrError::UnknownNode(to.to_string()));
        }
        let node = self
            .nodes
            .get_mut(from.0)
            .ok_or_else(|| StackrError::UnknownNode(from.to_string()))?;
        node.add_successor(to);
        Ok(())
    }

    /// Append an edge between two nodes named by id.
    pub fn link(&mut self, from: &str, to: &str) -> Result<()> {
        let from_id = self
            .node_id(from)
            .ok_or_else(|| StackrError::UnknownNode(from.to_string()))?;
        let to_id = self
            .node_id(to)
            .ok_or_else(|| StackrError::UnknownNode(to.to_string()))?;
        self.add_successor(from_id, to_id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_id(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Node> {
        self.node_id(id).and_then(|h| self.get(h))
    }

    pub fn has_start(&self) -> bool {
        self.start.is_some()
    }

    pub fn start_id(&self) -> Option<NodeId> {
        self.start
    }

    pub fn start(&self) -> Option<&Node> {
        self.start.and_then(|h| self.get(h))
    }

    /// Every node, in insertion order.
    pub fn all_nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
