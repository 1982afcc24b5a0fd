use stackr_core::error::{Result, StackrError};

use super::node::{Node, NodeId};
use super::topology::Graph;

/// A cursor that walks a `Graph` along first-successor edges and records
/// every node it enters.
///
/// History is seeded lazily: a freshly built agent reports zero visits, and
/// the start node is recorded on the first call to [`Agent::step`].
///
/// An agent holds no locks. Run independent agents over the same graph for
/// concurrent traversals.
#[derive(Debug, Clone)]
pub struct Agent<'g> {
    graph: &'g Graph,
    current: Option<NodeId>,
    visited: Vec<NodeId>,
}

impl<'g> Agent<'g> {
    pub fn new(graph: &'g Graph) -> Result<Self> {
        let start = graph
            .start_id()
            .ok_or_else(|| StackrError::InvalidGraph("Graph must have a start node".to_string()))?;
        Ok(Self {
            graph,
            current: Some(start),
            visited: Vec::new(),
        })
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Advance to the current node's first successor.
    ///
    /// Returns `false`, leaving the cursor in place, when there is nowhere to
    /// go. The start node is recorded on the first call either way.
    pub fn step(&mut self) -> bool {
        let Some(node) = self.current() else {
            return false;
        };
        if self.visited.is_empty() {
            self.record_visit(true);
        }
        match node.first_successor() {
            Some(next) => {
                self.current = Some(next);
                self.record_visit(true);
                true
            }
            None => false,
        }
    }

    /// Append the current node to the history.
    ///
    /// With `allow_duplicates = false` the append is skipped when this exact
    /// node handle is already recorded. The comparison is by handle; see
    /// [`Agent::has_visited`] for the id-based lookup.
    pub fn record_visit(&mut self, allow_duplicates: bool) {
        let Some(current) = self.current else {
            return;
        };
        if allow_duplicates || !self.visited.contains(&current) {
            self.visited.push(current);
        }
    }

    /// Step until the agent can no longer advance.
    ///
    /// Does not return if first-successor edges form a cycle. Use
    /// [`Agent::run_bounded`] when the graph is not known to be acyclic.
    pub fn run_all(&mut self) {
        while self.step() {}
    }

    /// Step until the agent can no longer advance, failing once `max_steps`
    /// successful steps have been taken and another is still possible.
    ///
    /// Returns the number of steps taken.
    pub fn run_bounded(&mut self, max_steps: usize) -> Result<usize> {
        let mut steps = 0;
        loop {
            self.check_step_limit(steps, max_steps)?;
            if !self.step() {
                return Ok(steps);
            }
            steps += 1;
        }
    }

    /// Fail when `steps_taken` has reached `max_steps` and another step is
    /// still possible.
    pub(crate) fn check_step_limit(&self, steps_taken: usize, max_steps: usize) -> Result<()> {
        if steps_taken >= max_steps && self.can_advance() {
            return Err(StackrError::StepLimitExceeded { limit: max_steps });
        }
        Ok(())
    }

    /// True when there is no current node or it has no successors.
    pub fn is_completed(&self) -> bool {
        !self.can_advance()
    }

    fn can_advance(&self) -> bool {
        self.current().is_some_and(Node::has_successors)
    }

    pub fn current(&self) -> Option<&'g Node> {
        self.current.and_then(|id| self.graph.get(id))
    }

    pub fn current_id(&self) -> Option<&'g str> {
        self.current().map(Node::id)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Whether any recorded node carries this id.
    pub fn has_visited(&self, id: &str) -> bool {
        self.visited_nodes().any(|n| n.id() == id)
    }

    /// Ids of recorded nodes in visit order, repeats included.
    pub fn visited_path(&self) -> Vec<&'g str> {
        self.visited_nodes().map(Node::id).collect()
    }

    fn visited_nodes(&self) -> impl Iterator<Item = &'g Node> + '_ {
        self.visited.iter().filter_map(|id| self.graph.get(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str]) -> Graph {
        Graph::linear(ids)
    }

    #[test]
    fn test_fresh_agent() {
        let graph = chain(&["A", "B"]);
        let agent = Agent::new(&graph).unwrap();
        assert_eq!(agent.visited_count(), 0);
        assert_eq!(agent.current_id(), Some("A"));
        assert!(!agent.is_completed());
    }

    #[test]
    fn test_missing_start_is_invalid() {
        let graph = Graph::new(None, vec![Node::new("A")]);
        let err = Agent::new(&graph).unwrap_err();
        assert!(matches!(err, StackrError::InvalidGraph(_)));
        assert!(err.to_string().contains("Graph must have a start node"));
    }

    #[test]
    fn test_step_advances_and_seeds_history() {
        let graph = chain(&["A", "B", "C"]);
        let mut agent = Agent::new(&graph).unwrap();

        assert!(agent.step());
        assert_eq!(agent.current_id(), Some("B"));
        assert_eq!(agent.visited_path(), vec!["A", "B"]);

        assert!(agent.step());
        assert_eq!(agent.visited_count(), 3);
    }

    #[test]
    fn test_step_at_end_stays_put() {
        let graph = chain(&["A"]);
        let mut agent = Agent::new(&graph).unwrap();
        assert!(agent.is_completed());

        assert!(!agent.step());
        assert_eq!(agent.current_id(), Some("A"));
        assert_eq!(agent.visited_path(), vec!["A"]);

        assert!(!agent.step());
        assert_eq!(agent.visited_count(), 1);
    }

    #[test]
    fn test_run_all_linear_chain() {
        let graph = chain(&["A", "B", "C"]);
        let mut agent = Agent::new(&graph).unwrap();
        agent.run_all();

        assert_eq!(agent.visited_path(), vec!["A", "B", "C"]);
        assert!(agent.is_completed());
        assert!(agent.has_visited("C"));
        assert!(!agent.has_visited("D"));
    }

    #[test]
    fn test_branch_only_follows_first_edge() {
        let mut graph = Graph::new(
            Some(Node::new("A")),
            vec![Node::new("B"), Node::new("C")],
        );
        graph.link("A", "B").unwrap();
        graph.link("A", "C").unwrap();

        let mut agent = Agent::new(&graph).unwrap();
        agent.run_all();

        assert_eq!(agent.visited_path(), vec!["A", "B"]);
        assert!(!agent.has_visited("C"));
    }

    #[test]
    fn test_record_visit_duplicate_policy() {
        let graph = chain(&["A"]);

        let mut strict = Agent::new(&graph).unwrap();
        strict.record_visit(false);
        strict.record_visit(false);
        assert_eq!(strict.visited_count(), 1);

        let mut lenient = Agent::new(&graph).unwrap();
        lenient.record_visit(true);
        lenient.record_visit(true);
        assert_eq!(lenient.visited_count(), 2);
    }

    #[test]
    fn test_run_bounded_stops_cycles() {
        let mut graph = chain(&["A", "B"]);
        graph.link("B", "A").unwrap();

        let mut agent = Agent::new(&graph).unwrap();
        let err = agent.run_bounded(5).unwrap_err();
        assert!(matches!(err, StackrError::StepLimitExceeded { limit: 5 }));
        assert_eq!(agent.visited_path(), vec!["A", "B", "A", "B", "A", "B"]);
    }

    #[test]
    fn test_run_bounded_exact_fit() {
        let graph = chain(&["A", "B", "C"]);
        let mut agent = Agent::new(&graph).unwrap();
        assert_eq!(agent.run_bounded(2).unwrap(), 2);
        assert_eq!(agent.visited_path(), vec!["A", "B", "C"]);

        let single = chain(&["A"]);
        let mut agent = Agent::new(&single).unwrap();
        assert_eq!(agent.run_bounded(0).unwrap(), 0);
        assert_eq!(agent.visited_count(), 1);
    }

    #[test]
    fn test_agents_share_a_graph() {
        let graph = chain(&["A", "B"]);
        let mut first = Agent::new(&graph).unwrap();
        let second = Agent::new(&graph).unwrap();
        first.run_all();
        assert_eq!(first.current_id(), Some("B"));
        assert_eq!(second.current_id(), Some("A"));
        assert_eq!(second.visited_count(), 0);
    }

    #[test]
    fn test_foreign_handle_never_becomes_current() {
        let other = Graph::linear(&["x", "y", "z", "w"]);
        let mut a = Node::new("A");
        a.add_successor(other.node_id("w").unwrap());
        let graph = Graph::new(Some(a), []);
        let mut agent = Agent::new(&graph).unwrap();

        assert!(!agent.step());
        assert_eq!(agent.current_id(), Some("A"));
        assert!(agent.is_completed());
        assert_eq!(agent.visited_count(), agent.visited_path().len());
        assert_eq!(agent.visited_path(), vec!["A"]);
    }
}
