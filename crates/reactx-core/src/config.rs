#![forbid(unsafe_code)]

//! Runtime configuration.

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Optional runtime name, reported in the `init` event and log fields.
    pub label: Option<String>,
    /// Delimiter used when paths are rendered as dotted strings.
    pub path_delimiter: String,
    /// Record dependencies for reads made through readonly views.
    pub track_readonly_reads: bool,
    /// Emit `property:tracked` events for every tracked read.
    pub emit_tracked_events: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            label: None,
            path_delimiter: ".".to_string(),
            track_readonly_reads: true,
            emit_tracked_events: true,
        }
    }
}

impl RuntimeConfig {
    /// Set the runtime name.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the path delimiter.
    #[must_use]
    pub fn with_path_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.path_delimiter = delimiter.into();
        self
    }

    /// Toggle dependency tracking for readonly reads.
    #[must_use]
    pub fn with_readonly_tracking(mut self, enabled: bool) -> Self {
        self.track_readonly_reads = enabled;
        self
    }

    /// Toggle `property:tracked` events.
    #[must_use]
    pub fn with_tracked_events(mut self, enabled: bool) -> Self {
        self.emit_tracked_events = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.label, None);
        assert_eq!(config.path_delimiter, ".");
        assert!(config.track_readonly_reads);
        assert!(config.emit_tracked_events);
    }

    #[test]
    fn builder_overrides() {
        let config = RuntimeConfig::default()
            .with_label("todos")
            .with_path_delimiter("/")
            .with_readonly_tracking(false)
            .with_tracked_events(false);
        assert_eq!(config.label.as_deref(), Some("todos"));
        assert_eq!(config.path_delimiter, "/");
        assert!(!config.track_readonly_reads);
        assert!(!config.emit_tracked_events);
    }
}
