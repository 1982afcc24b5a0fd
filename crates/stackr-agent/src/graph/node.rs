use std::fmt;

/// Handle to a node inside the `Graph` that issued it.
///
/// Handles from one graph are meaningless in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A workflow step.
///
/// Successors are kept in insertion order. Duplicates and self-loops are
/// allowed; only the first successor is ever followed by an `Agent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: String,
    successors: Vec<NodeId>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            successors: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append an outgoing edge. No dedup, no cycle check.
    ///
    /// A handle that does not resolve in the graph this node is later
    /// inserted into is dropped on insertion.
    pub fn add_successor(&mut self, next: NodeId) {
        self.successors.push(next);
    }

    /// Drop successors whose handle is not below `len`. Returns how many
    /// were removed.
    pub(crate) fn retain_successors_below(&mut self, len: usize) -> usize {
        let before = self.successors.len();
        self.successors.retain(|s| s.0 < len);
        before - self.successors.len()
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn has_successors(&self) -> bool {
        !self.successors.is_empty()
    }

    pub fn first_successor(&self) -> Option<NodeId> {
        self.successors.first().copied()
    }
}
