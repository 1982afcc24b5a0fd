//! Sequential workflows built on the graph agent.
//!
//! A [`WorkflowRunner`] pairs a `Graph` with one [`NodeHandler`] per node and
//! awaits each handler before stepping the agent. [`bitcoin_news`] is the
//! stock three-step pipeline built on it.

pub mod bitcoin_news;
pub mod runner;

pub use runner::{NodeHandler, RunReport, StepRecord, WorkflowRunner};
