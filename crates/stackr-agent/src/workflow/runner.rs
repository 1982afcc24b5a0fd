use std::collections::HashMap;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use stackr_core::error::{Result, StackrError};

use crate::graph::{Agent, Graph};

/// Work performed when the agent enters a node.
///
/// Handlers read and write the workflow state in place. Any error aborts
/// the run.
pub trait NodeHandler<S: Send>: Send + Sync {
    fn handle<'a>(&'a self, state: &'a mut S) -> BoxFuture<'a, Result<()>>;
}

/// Timing for one executed node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub node_id: String,
    pub elapsed_ms: u64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Executed nodes in order.
    pub steps: Vec<StepRecord>,
    pub total_elapsed_ms: u64,
}

impl RunReport {
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node_id.as_str()).collect()
    }
}

/// Drives an `Agent` over a graph, awaiting each node's handler before
/// advancing. Steps never overlap.
pub struct WorkflowRunner<S: Send> {
    graph: Graph,
    handlers: HashMap<String, Box<dyn NodeHandler<S>>>,
    max_steps: usize,
}

impl<S: Send> WorkflowRunner<S> {
    pub const DEFAULT_MAX_STEPS: usize = 64;

    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            handlers: HashMap::new(),
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }

    /// Cap on agent advances per run. A run that could advance further
    /// fails with `StepLimitExceeded`.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Register the handler for a node id, replacing any previous one.
    pub fn with_handler(
        mut self,
        node_id: impl Into<String>,
        handler: impl NodeHandler<S> + 'static,
    ) -> Self {
        self.handlers.insert(node_id.into(), Box::new(handler));
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Node ids in the graph that have no registered handler.
    pub fn unhandled_nodes(&self) -> Vec<&str> {
        self.graph
            .all_nodes()
            .iter()
            .map(|n| n.id())
            .filter(|id| !self.handlers.contains_key(*id))
            .collect()
    }

    pub async fn run(&self, state: &mut S) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut agent = Agent::new(&self.graph)?;
        let mut steps = Vec::new();
        let mut advances = 0usize;

        info!(run_id = %run_id, nodes = self.graph.len(), "Starting workflow run");

        loop {
            let node_id = agent
                .current_id()
                .ok_or_else(|| StackrError::InvalidGraph("traversal left the graph".to_string()))?;
            let handler = self
                .handlers
                .get(node_id)
                .ok_or_else(|| StackrError::MissingHandler(node_id.to_string()))?;

            debug!(run_id = %run_id, node_id, "Executing workflow node");
            let node_start = Instant::now();
            if let Err(e) = handler.handle(state).await {
                error!(run_id = %run_id, node_id, error = %e, "Workflow node failed");
                return Err(e);
            }
            let elapsed_ms = node_start.elapsed().as_millis() as u64;
            debug!(run_id = %run_id, node_id, elapsed_ms, "Workflow node complete");
            steps.push(StepRecord {
                node_id: node_id.to_string(),
                elapsed_ms,
            });

            if let Err(e) = agent.check_step_limit(advances, self.max_steps) {
                error!(run_id = %run_id, limit = self.max_steps, "Workflow exceeded step limit");
                return Err(e);
            }
            if !agent.step() {
                break;
            }
            advances += 1;
        }

        let total_elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            steps = steps.len(),
            total_elapsed_ms,
            "Workflow run complete"
        );

        Ok(RunReport {
            run_id,
            steps,
            total_elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    /// Appends its label to the shared log.
    struct Append(&'static str);

    impl NodeHandler<Vec<String>> for Append {
        fn handle<'a>(&'a self, state: &'a mut Vec<String>) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                state.push(self.0.to_string());
                Ok(())
            })
        }
    }

    struct Fail;

    impl NodeHandler<Vec<String>> for Fail {
        fn handle<'a>(&'a self, _state: &'a mut Vec<String>) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(StackrError::http(500, "upstream down")) })
        }
    }

    fn abc_runner() -> WorkflowRunner<Vec<String>> {
        WorkflowRunner::new(Graph::linear(&["a", "b", "c"]))
            .with_handler("a", Append("a"))
            .with_handler("b", Append("b"))
            .with_handler("c", Append("c"))
    }

    #[tokio::test]
    async fn test_runs_nodes_in_order() {
        let runner = abc_runner();
        let mut log = Vec::new();
        let report = runner.run(&mut log).await.unwrap();

        assert_eq!(log, vec!["a", "b", "c"]);
        assert_eq!(report.path(), vec!["a", "b", "c"]);
        assert!(Uuid::parse_str(&report.run_id).is_ok());
    }

    #[tokio::test]
    async fn test_handler_error_stops_run() {
        let runner = WorkflowRunner::new(Graph::linear(&["a", "b", "c"]))
            .with_handler("a", Append("a"))
            .with_handler("b", Fail)
            .with_handler("c", Append("c"));
        let mut log = Vec::new();
        let err = runner.run(&mut log).await.unwrap_err();

        assert!(matches!(err, StackrError::Provider { status: Some(500), .. }));
        assert_eq!(log, vec!["a"]);
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let runner = WorkflowRunner::new(Graph::linear(&["a", "b"])).with_handler("a", Append("a"));
        assert_eq!(runner.unhandled_nodes(), vec!["b"]);

        let mut log = Vec::new();
        let err = runner.run(&mut log).await.unwrap_err();
        assert!(matches!(err, StackrError::MissingHandler(ref id) if id == "b"));
        assert_eq!(log, vec!["a"]);
    }

    #[tokio::test]
    async fn test_invalid_graph() {
        let runner: WorkflowRunner<Vec<String>> =
            WorkflowRunner::new(Graph::new(None, vec![Node::new("a")]));
        let mut log = Vec::new();
        let err = runner.run(&mut log).await.unwrap_err();
        assert!(matches!(err, StackrError::InvalidGraph(_)));
    }

    #[tokio::test]
    async fn test_cycle_hits_step_limit() {
        let mut graph = Graph::linear(&["a", "b"]);
        graph.link("b", "a").unwrap();
        let runner = WorkflowRunner::new(graph)
            .with_max_steps(3)
            .with_handler("a", Append("a"))
            .with_handler("b", Append("b"));

        let mut log = Vec::new();
        let err = runner.run(&mut log).await.unwrap_err();
        assert!(matches!(err, StackrError::StepLimitExceeded { limit: 3 }));
        assert_eq!(log, vec!["a", "b", "a", "b"]);
    }

    #[tokio::test]
    async fn test_only_first_branch_runs() {
        let mut graph = Graph::new(
            Some(Node::new("a")),
            vec![Node::new("b"), Node::new("c")],
        );
        graph.link("a", "b").unwrap();
        graph.link("a", "c").unwrap();
        let runner = WorkflowRunner::new(graph)
            .with_handler("a", Append("a"))
            .with_handler("b", Append("b"))
            .with_handler("c", Append("c"));

        let mut log = Vec::new();
        runner.run(&mut log).await.unwrap();
        assert_eq!(log, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_limit_matches_bounded_agent() {
        let graph = Graph::linear(&["a", "b", "c"]);
        let mut agent = Agent::new(&graph).unwrap();
        assert_eq!(agent.run_bounded(2).unwrap(), 2);

        let runner = WorkflowRunner::new(graph.clone())
            .with_max_steps(2)
            .with_handler("a", Append("a"))
            .with_handler("b", Append("b"))
            .with_handler("c", Append("c"));
        let mut log = Vec::new();
        let report = runner.run(&mut log).await.unwrap();
        assert_eq!(report.path(), vec!["a", "b", "c"]);

        let mut short = Agent::new(&graph).unwrap();
        assert!(short.run_bounded(1).is_err());
        let tight = WorkflowRunner::new(graph)
            .with_max_steps(1)
            .with_handler("a", Append("a"))
            .with_handler("b", Append("b"))
            .with_handler("c", Append("c"));
        let err = tight.run(&mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, StackrError::StepLimitExceeded { limit: 1 }));
    }
}
