#![forbid(unsafe_code)]

//! Structured events for devtools and logging collaborators.
//!
//! Events are delivered synchronously to the runtime's sink (if any) and
//! serialize as `{"type": "...", "data": {...}}` with camelCase fields. The
//! core behaves identically with or without a sink; payloads are only built
//! when one is installed.

use serde::Serialize;

/// A reactive event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ReactiveEvent {
    #[serde(rename = "init")]
    Init(InitData),
    #[serde(rename = "property:tracked")]
    PropertyTracked(TrackedData),
    #[serde(rename = "property:mutated")]
    PropertyMutated(MutatedData),
    #[serde(rename = "computed:evaluated")]
    ComputedEvaluated(ComputedData),
    #[serde(rename = "action:start")]
    ActionStart(ActionStartData),
    #[serde(rename = "action:end")]
    ActionEnd(ActionEndData),
    #[serde(rename = "execution:start")]
    ExecutionStart(ExecutionStartData),
    #[serde(rename = "execution:end")]
    ExecutionEnd(ExecutionEndData),
    #[serde(rename = "instance:method")]
    InstanceMethod(InstanceMethodData),
}

impl ReactiveEvent {
    /// The serialized `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::PropertyTracked(_) => "property:tracked",
            Self::PropertyMutated(_) => "property:mutated",
            Self::ComputedEvaluated(_) => "computed:evaluated",
            Self::ActionStart(_) => "action:start",
            Self::ActionEnd(_) => "action:end",
            Self::ExecutionStart(_) => "execution:start",
            Self::ExecutionEnd(_) => "execution:end",
            Self::InstanceMethod(_) => "instance:method",
        }
    }

    /// Execution the event belongs to, if any.
    #[must_use]
    pub fn execution_id(&self) -> Option<u64> {
        match self {
            Self::PropertyMutated(data) => data.execution_id,
            Self::ActionStart(data) => Some(data.execution_id),
            Self::ActionEnd(data) => Some(data.execution_id),
            Self::ExecutionStart(data) => Some(data.execution_id),
            Self::ExecutionEnd(data) => Some(data.execution_id),
            Self::InstanceMethod(data) => Some(data.execution_id),
            Self::Init(_) | Self::PropertyTracked(_) | Self::ComputedEvaluated(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub label: Option<String>,
    pub delimiter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedData {
    pub path: Vec<String>,
    pub value: serde_json::Value,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutatedData {
    /// Enclosing action, when the write happened inside a class method.
    pub action_id: Option<u64>,
    pub execution_id: Option<u64>,
    pub mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    /// `set`, `delete`, or the array method name.
    pub operation: String,
    pub property_path: String,
    pub delimiter: String,
    pub args: Vec<serde_json::Value>,
    pub has_changed_value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedData {
    pub path: Vec<String>,
    pub value: serde_json::Value,
    pub evaluation_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStartData {
    pub action_id: u64,
    pub execution_id: u64,
    pub name: String,
    pub path: Vec<String>,
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEndData {
    pub action_id: u64,
    pub execution_id: u64,
    /// Milliseconds.
    pub duration: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStartData {
    pub action_id: u64,
    pub execution_id: u64,
    pub parent_execution_id: Option<u64>,
    pub name: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEndData {
    pub action_id: u64,
    pub execution_id: u64,
    /// Milliseconds.
    pub duration: f64,
    /// Always `false`: executions are synchronous.
    pub is_async: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMethodData {
    pub execution_id: u64,
    pub method_name: String,
    pub method_path: Vec<String>,
    pub args: Vec<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Receiver of [`ReactiveEvent`]s.
///
/// Implementations must not write through reactive proxies from inside
/// `on_event`; reads are fine.
pub trait ReactiveObserver {
    fn on_event(&self, event: &ReactiveEvent);
}

/// Render a path for display: segments joined by `delimiter`, or `(root)`.
#[must_use]
pub fn format_path(path: &[String], delimiter: &str) -> String {
    if path.is_empty() {
        "(root)".to_string()
    } else {
        path.join(delimiter)
    }
}

#[cfg(test)]
pub(crate) use self::tests::RecordingObserver;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
