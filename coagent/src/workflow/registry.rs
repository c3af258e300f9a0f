//! Workflow registry: named graphs discovered at startup.
//!
//! Names follow `{industry}/{workflow}`. Each entry holds the compiled graph
//! (compilation errors surface at registration, not at request time),
//! capability strings and tags. Resolution is O(1) by name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::graph::{CompilationError, CompiledGraph, WorkflowGraph, WorkflowState};
use crate::workflow::nodes::LogNotifier;

use super::graphs::{hotel_o2c_graph, retail_fulfillment_graph};

/// One registered workflow.
pub struct WorkflowEntry {
    pub name: String,
    pub graph: Arc<CompiledGraph>,
    pub capabilities: Vec<String>,
    pub tags: Vec<String>,
}

/// Name → entry map, immutable after startup.
pub struct WorkflowRegistry {
    by_name: HashMap<String, Arc<WorkflowEntry>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in graphs.
    pub fn with_builtin_graphs() -> Result<Self, CompilationError> {
        let mut registry = Self::new();
        registry.register(
            "hotel/o2c",
            hotel_o2c_graph(),
            vec![
                "check_in".into(),
                "folio".into(),
                "charges".into(),
                "invoice".into(),
            ],
            vec!["order-to-cash".into(), "approval".into()],
        )?;
        registry.register(
            "retail/fulfillment",
            retail_fulfillment_graph(Arc::new(LogNotifier)),
            vec!["reserve_stock".into(), "pack".into(), "dispatch".into()],
            vec!["fulfillment".into(), "retry".into()],
        )?;
        Ok(registry)
    }

    /// Compiles and registers one graph under a name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        graph: WorkflowGraph,
        capabilities: Vec<String>,
        tags: Vec<String>,
    ) -> Result<(), CompilationError> {
        let name = name.into();
        let compiled = graph.compile()?;
        self.by_name.insert(
            name.clone(),
            Arc::new(WorkflowEntry {
                name,
                graph: Arc::new(compiled),
                capabilities,
                tags,
            }),
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<WorkflowEntry>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Entries whose `{industry}/` prefix matches.
    pub fn list_by_industry(&self, industry: &str) -> Vec<Arc<WorkflowEntry>> {
        let prefix = format!("{}/", industry);
        let mut entries: Vec<_> = self
            .by_name
            .values()
            .filter(|e| e.name.starts_with(&prefix))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<Arc<WorkflowEntry>> {
        let mut entries: Vec<_> = self
            .by_name
            .values()
            .filter(|e| e.tags.iter().any(|t| t == tag))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Validates caller input against the graph's schema: required fields
    /// must be present, optional ones fill from defaults.
    pub fn validate_state(
        &self,
        name: &str,
        input: Map<String, Value>,
    ) -> Result<WorkflowState, GatewayError> {
        let entry = self
            .get(name)
            .ok_or_else(|| GatewayError::InvalidInput(format!("unknown workflow '{}'", name)))?;
        entry.graph.schema().init(input)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
