use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Per-node execution context supplied by the calling workflow engine.
///
/// The engine takes the context by value for one node execution and hands it
/// back in [`crate::core::engine::executor::NodeRun`]. Only `set_variable`
/// changes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub node_id: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub node_outputs: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(
        execution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        user_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_id: workflow_id.into(),
            user_id: user_id.into(),
            node_id: node_id.into(),
            ..Default::default()
        }
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_output(mut self, node_id: impl Into<String>, output: Value) -> Self {
        self.node_outputs.insert(node_id.into(), output);
        self
    }

    /// Point the context at the next node without touching variables or outputs.
    pub fn for_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.node_outputs.get(node_id)
    }

    /// Variables as a JSON object, for path lookups and script bindings.
    pub fn variables_value(&self) -> Value {
        Value::Object(self.variables.clone())
    }

    /// Snapshot of all prior node outputs keyed by node id.
    pub fn outputs_value(&self) -> Value {
        Value::Object(
            self.node_outputs
                .iter()
                .map(|(id, output)| (id.clone(), output.clone()))
                .collect(),
        )
    }

    pub(crate) fn assign_variable(&mut self, name: String, value: Value) {
        self.variables.insert(name, value);
    }
}
