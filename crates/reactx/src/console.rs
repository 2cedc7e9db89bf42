#![forbid(unsafe_code)]

//! Event sinks for the runtime's [`ReactiveEvent`] stream.
//!
//! - [`EventLog`] writes every event to `tracing`, one line per event with
//!   the property or method path rendered with the runtime's delimiter.
//! - [`EventRecorder`] buffers events and exports them as JSONL for offline
//!   inspection by a devtools collaborator.

use std::cell::RefCell;
use std::io::{self, Write};

use reactx_core::{ReactiveEvent, ReactiveObserver, format_path};
use tracing::{debug, info, trace, warn};

/// Logs events through `tracing`.
///
/// Mutations, actions and method calls log at `info` (`warn` when they
/// carry an error). Tracked reads and computed evaluations are only logged
/// in verbose mode, at `debug` and `trace`.
#[derive(Debug, Clone)]
pub struct EventLog {
    verbose: bool,
    delimiter: RefCell<String>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            verbose: false,
            delimiter: RefCell::new(".".to_string()),
        }
    }

    /// Also log tracked reads and computed evaluations.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn path(&self, path: &[String]) -> String {
        format_path(path, &self.delimiter.borrow())
    }
}

impl ReactiveObserver for EventLog {
    fn on_event(&self, event: &ReactiveEvent) {
        match event {
            ReactiveEvent::Init(data) => {
                *self.delimiter.borrow_mut() = data.delimiter.clone();
                info!(label = data.label.as_deref().unwrap_or("-"), "reactive runtime attached");
            }
            ReactiveEvent::PropertyTracked(data) => {
                if self.verbose {
                    trace!(path = %self.path(&data.path), readonly = data.readonly, value = %data.value, "read");
                }
            }
            ReactiveEvent::PropertyMutated(data) => {
                for mutation in &data.mutations {
                    info!(
                        operation = %mutation.operation,
                        path = %mutation.property_path,
                        changed = mutation.has_changed_value,
                        execution_id = data.execution_id,
                        "mutation"
                    );
                }
            }
            ReactiveEvent::ComputedEvaluated(data) => {
                if self.verbose {
                    debug!(
                        path = %self.path(&data.path),
                        value = %data.value,
                        evaluations = data.evaluation_count,
                        "computed"
                    );
                }
            }
            ReactiveEvent::ActionStart(data) => {
                info!(
                    action_id = data.action_id,
                    name = %data.name,
                    path = %self.path(&data.path),
                    "action started"
                );
            }
            ReactiveEvent::ActionEnd(data) => match &data.error {
                Some(error) => warn!(action_id = data.action_id, duration_ms = data.duration, %error, "action failed"),
                None => info!(action_id = data.action_id, duration_ms = data.duration, "action finished"),
            },
            ReactiveEvent::ExecutionStart(data) => {
                debug!(
                    execution_id = data.execution_id,
                    parent = data.parent_execution_id,
                    name = %data.name,
                    "execution started"
                );
            }
            ReactiveEvent::ExecutionEnd(data) => {
                debug!(
                    execution_id = data.execution_id,
                    duration_ms = data.duration,
                    failed = data.error.is_some(),
                    "execution finished"
                );
            }
            ReactiveEvent::InstanceMethod(data) => {
                let method = self.path(&data.method_path);
                match &data.error {
                    Some(error) => warn!(method = %data.method_name, path = %method, %error, "method failed"),
                    None => info!(method = %data.method_name, path = %method, "method called"),
                }
            }
        }
    }
}

/// Buffers events in arrival order.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: RefCell<Vec<ReactiveEvent>>,
}

impl EventRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ReactiveEvent> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Events recorded for one execution.
    #[must_use]
    pub fn execution(&self, execution_id: u64) -> Vec<ReactiveEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.execution_id() == Some(execution_id))
            .cloned()
            .collect()
    }

    /// One JSON object per line, in arrival order.
    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for event in self.events.borrow().iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Stream [`to_jsonl`](Self::to_jsonl) into `writer`.
    pub fn write_jsonl(&self, mut writer: impl Write) -> io::Result<()> {
        for event in self.events.borrow().iter() {
            serde_json::to_writer(&mut writer, event)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}

impl ReactiveObserver for EventRecorder {
    fn on_event(&self, event: &ReactiveEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
