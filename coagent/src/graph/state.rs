//! Schema-typed workflow state.
//!
//! Each graph declares a [`StateSchema`]: named fields with a kind, an
//! optional default, and a reducer. Updates from nodes are shallow-merged;
//! list fields declared with [`Reducer::Append`] accumulate instead of
//! replacing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Declared kind of a state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    List,
    Object,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::List => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::List => "list",
            FieldKind::Object => "object",
        }
    }
}

/// How node updates merge into a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    /// Last writer wins (the default).
    #[default]
    Replace,
    /// List fields only: incoming items are appended to the current list.
    Append,
}

/// One declared state field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
    pub reducer: Reducer,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            reducer: Reducer::Replace,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Declares the append reducer. Only meaningful for `FieldKind::List`.
    pub fn appending(mut self) -> Self {
        self.reducer = Reducer::Append;
        self
    }
}

/// The state schema of one workflow graph.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: Vec<FieldSpec>,
}

impl StateSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Builds the initial state: defaults first, then caller input on top.
    /// Missing required fields and kind mismatches fail with `invalid_input`.
    pub fn init(&self, input: Map<String, Value>) -> Result<WorkflowState, GatewayError> {
        let mut map = Map::new();
        for field in &self.fields {
            if let Some(default) = &field.default {
                map.insert(field.name.clone(), default.clone());
            }
        }
        for (key, value) in input {
            if let Some(field) = self.field(&key) {
                if !field.kind.matches(&value) {
                    return Err(GatewayError::InvalidInput(format!(
                        "field '{}' expects {}, got {}",
                        key,
                        field.kind.name(),
                        value
                    )));
                }
            }
            map.insert(key, value);
        }
        for field in &self.fields {
            if field.required && !map.contains_key(&field.name) {
                return Err(GatewayError::InvalidInput(format!(
                    "missing required field '{}'",
                    field.name
                )));
            }
        }
        Ok(WorkflowState(map))
    }

    /// Merges a node's partial update into the state, honoring reducers.
    /// Declared fields are kind-checked; undeclared keys pass through with
    /// last-writer-wins semantics.
    pub fn apply_update(
        &self,
        state: &mut WorkflowState,
        update: &Map<String, Value>,
    ) -> Result<(), GatewayError> {
        for (key, value) in update {
            match self.field(key) {
                Some(field) if field.reducer == Reducer::Append => {
                    let entry = state
                        .0
                        .entry(key.clone())
                        .or_insert_with(|| Value::Array(vec![]));
                    let Some(list) = entry.as_array_mut() else {
                        return Err(GatewayError::Internal(format!(
                            "append field '{}' holds a non-list value",
                            key
                        )));
                    };
                    match value {
                        Value::Array(items) => list.extend(items.iter().cloned()),
                        other => list.push(other.clone()),
                    }
                }
                Some(field) => {
                    if !field.kind.matches(value) {
                        return Err(GatewayError::Internal(format!(
                            "node update for '{}' expects {}, got {}",
                            key,
                            field.kind.name(),
                            value
                        )));
                    }
                    state.0.insert(key.clone(), value.clone());
                }
                None => {
                    state.0.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

/// Runtime state of one workflow instance: a JSON object honoring a schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState(pub(crate) Map<String, Value>);

impl WorkflowState {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Compact view for status frames: scalars verbatim, lists as counts,
    /// nested objects omitted.
    pub fn summary(&self) -> Value {
        let mut out = Map::new();
        for (key, value) in &self.0 {
            match value {
                Value::Array(items) => {
                    out.insert(format!("{}_count", key), Value::from(items.len()));
                }
                Value::Object(_) => {}
                scalar => {
                    out.insert(key.clone(), scalar.clone());
                }
            }
        }
        Value::Object(out)
    }
}

impl From<Map<String, Value>> for WorkflowState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
