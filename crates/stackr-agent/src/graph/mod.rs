//! Workflow topology and traversal.
//!
//! A `Graph` is an arena of `Node`s addressed by `NodeId`. Each node lists
//! its successors as handles into the same arena, so cycles need no shared
//! ownership. An `Agent` borrows a graph and walks it one step at a time,
//! always following the first outgoing edge.

pub mod agent;
pub mod node;
pub mod topology;

pub use agent::Agent;
pub use node::{Node, NodeId};
pub use topology::Graph;
