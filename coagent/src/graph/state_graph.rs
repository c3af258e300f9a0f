//! Graph builder: nodes + explicit edges (from → to) and conditional edges.
//!
//! Add nodes with `add_node`, declare transitions with `add_edge(from, to)`
//! using `START` and `END` for entry/exit, or `add_conditional_edges` to
//! route on state. A node must have either one outgoing edge or conditional
//! edges, not both. `compile()` validates and produces a [`CompiledGraph`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::compile_error::CompilationError;
use super::compiled::{CompiledGraph, NextEntry};
use super::node::Node;
use super::retry::RetryPolicy;
use super::state::{StateSchema, WorkflowState};

/// Sentinel for graph entry: use as `from` in `add_edge(START, first_node)`.
pub const START: &str = "__start__";

/// Sentinel for graph exit: use as `to` in `add_edge(last_node, END)`.
pub const END: &str = "__end__";

/// Routing function for conditional edges: reads the updated state, returns
/// the next key (looked up in the path map when one is provided).
pub type RouterFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

pub(super) struct ConditionalRoute {
    pub(super) router: RouterFn,
    pub(super) path_map: Option<HashMap<String, String>>,
}

impl Clone for ConditionalRoute {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            path_map: self.path_map.clone(),
        }
    }
}

/// Workflow graph under construction: state schema, nodes, transitions.
pub struct WorkflowGraph {
    schema: StateSchema,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: Vec<(String, String)>,
    conditional: HashMap<String, ConditionalRoute>,
    retry_policy: RetryPolicy,
}

impl WorkflowGraph {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            nodes: HashMap::new(),
            edges: Vec::new(),
            conditional: HashMap::new(),
            retry_policy: RetryPolicy::None,
        }
    }

    /// Retry policy applied to transient node failures.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Adds a node; replaces any node with the same id.
    pub fn add_node(&mut self, node: Arc<dyn Node>) -> &mut Self {
        self.nodes.insert(node.id().to_string(), node);
        self
    }

    /// Declares the transition `from → to`. Use `START`/`END` for entry/exit.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Declares conditional transitions from `source`: after the node runs,
    /// `router(state)` picks a key; the next node is `path_map[key]` when a
    /// map is given, otherwise the key itself (or `END`).
    pub fn add_conditional_edges(
        &mut self,
        source: impl Into<String>,
        router: RouterFn,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self {
        self.conditional
            .insert(source.into(), ConditionalRoute { router, path_map });
        self
    }

    /// Validates the declared graph and produces the executable form.
    pub fn compile(self) -> Result<CompiledGraph, CompilationError> {
        for (from, to) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(CompilationError::NodeNotFound(from.clone()));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(CompilationError::NodeNotFound(to.clone()));
            }
        }
        for (source, route) in &self.conditional {
            if !self.nodes.contains_key(source) {
                return Err(CompilationError::NodeNotFound(source.clone()));
            }
            if let Some(path_map) = &route.path_map {
                for target in path_map.values() {
                    if target != END && !self.nodes.contains_key(target) {
                        return Err(CompilationError::InvalidConditionalPathMap(target.clone()));
                    }
                }
            }
        }

        let start_edges: Vec<_> = self
            .edges
            .iter()
            .filter(|(f, _)| f == START)
            .map(|(_, t)| t.clone())
            .collect();
        let initial_node = match start_edges.len() {
            0 => return Err(CompilationError::MissingStart),
            1 => start_edges.into_iter().next().unwrap(),
            _ => {
                return Err(CompilationError::InvalidGraph(
                    "multiple edges from START".into(),
                ))
            }
        };

        let reaches_end = self.edges.iter().any(|(_, t)| t == END)
            || self.conditional.values().any(|r| {
                r.path_map
                    .as_ref()
                    .map_or(true, |m| m.values().any(|v| v == END))
            });
        if !reaches_end {
            return Err(CompilationError::MissingEnd);
        }

        let froms: Vec<_> = self
            .edges
            .iter()
            .filter(|(f, _)| f != START)
            .map(|(f, _)| f.clone())
            .collect();
        let distinct: HashSet<_> = froms.iter().cloned().collect();
        if distinct.len() != froms.len() {
            return Err(CompilationError::InvalidGraph(
                "duplicate outgoing edge (branch without conditional)".into(),
            ));
        }
        for source in self.conditional.keys() {
            if distinct.contains(source) {
                return Err(CompilationError::NodeHasBothEdgeAndConditional(
                    source.clone(),
                ));
            }
        }

        let mut next_map: HashMap<String, NextEntry> = self
            .edges
            .iter()
            .filter(|(f, _)| f != START)
            .map(|(f, t)| (f.clone(), NextEntry::Unconditional(t.clone())))
            .collect();
        for (source, route) in self.conditional {
            next_map.insert(source, NextEntry::Conditional(route));
        }

        Ok(CompiledGraph::new(
            self.schema,
            self.nodes,
            initial_node,
            next_map,
            self.retry_policy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::GatewayError;
    use crate::graph::{Command, NodeContext};

    struct NoopNode(&'static str);

    #[async_trait]
    impl Node for NoopNode {
        fn id(&self) -> &str {
            self.0
        }
        async fn run(
            &self,
            _state: WorkflowState,
            _ctx: &NodeContext,
        ) -> Result<Command, GatewayError> {
            Ok(Command::next())
        }
    }

    fn graph() -> WorkflowGraph {
        WorkflowGraph::new(StateSchema::default())
    }

    /// **Scenario**: Compile fails when an edge references an unknown node.
    #[test]
    fn compile_rejects_unknown_node() {
        let mut g = graph();
        g.add_node(Arc::new(NoopNode("a")));
        g.add_edge(START, "a");
        g.add_edge("a", "ghost");
        match g.compile() {
            Err(CompilationError::NodeNotFound(id)) => assert_eq!(id, "ghost"),
            other => panic!("expected NodeNotFound, got {:?}", other.err()),
        }
    }

    /// **Scenario**: Compile fails without a START edge or without a path to END.
    #[test]
    fn compile_requires_start_and_end() {
        let mut g = graph();
        g.add_node(Arc::new(NoopNode("a")));
        g.add_edge("a", END);
        assert!(matches!(g.compile(), Err(CompilationError::MissingStart)));

        let mut g = graph();
        g.add_node(Arc::new(NoopNode("a")));
        g.add_node(Arc::new(NoopNode("b")));
        g.add_edge(START, "a");
        g.add_edge("a", "b");
        assert!(matches!(g.compile(), Err(CompilationError::MissingEnd)));
    }

    /// **Scenario**: A node may not have both an outgoing edge and conditional edges.
    #[test]
    fn compile_rejects_both_edge_kinds() {
        let mut g = graph();
        g.add_node(Arc::new(NoopNode("a")));
        g.add_node(Arc::new(NoopNode("b")));
        g.add_edge(START, "a");
        g.add_edge("a", "b");
        g.add_edge("b", END);
        g.add_conditional_edges(
            "a",
            Arc::new(|_| "b".to_string()),
            Some([("b".to_string(), "b".to_string())].into_iter().collect()),
        );
        match g.compile() {
            Err(CompilationError::NodeHasBothEdgeAndConditional(id)) => assert_eq!(id, "a"),
            other => panic!("expected NodeHasBothEdgeAndConditional, got {:?}", other.err()),
        }
    }

    /// **Scenario**: Conditional path map targets must exist.
    #[test]
    fn compile_rejects_invalid_path_map_target() {
        let mut g = graph();
        g.add_node(Arc::new(NoopNode("a")));
        g.add_edge(START, "a");
        g.add_conditional_edges(
            "a",
            Arc::new(|_| "x".to_string()),
            Some([("x".to_string(), "ghost".to_string())].into_iter().collect()),
        );
        match g.compile() {
            Err(CompilationError::InvalidConditionalPathMap(id)) => assert_eq!(id, "ghost"),
            other => panic!("expected InvalidConditionalPathMap, got {:?}", other.err()),
        }
    }
}
