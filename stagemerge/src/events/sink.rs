//! Event sink trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

use super::PipelineEvent;

/// Receives lifecycle events.
///
/// Emission must never fail or block for long; sinks that forward events
/// elsewhere should buffer and drop rather than propagate errors.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: &PipelineEvent);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// A sink that forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();

        // Failures are always worth a warning, whatever the configured level.
        if matches!(event, PipelineEvent::StageFailed { .. }) {
            warn!(event_type, event = ?event, "Event: {}", event_type);
            return;
        }

        if self.level == Level::DEBUG {
            debug!(event_type, event = ?event, "Event: {}", event_type);
        } else {
            info!(event_type, event = ?event, "Event: {}", event_type);
        }
    }
}

/// A sink that keeps every event in memory, for tests and run reports.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the dotted types of all events, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(PipelineEvent::event_type).collect()
    }

    /// Returns events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageName;
    use uuid::Uuid;

    fn started(stage: StageName) -> PipelineEvent {
        PipelineEvent::StageStarted {
            run_id: Uuid::nil(),
            stage,
        }
    }

    #[test]
    fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit(&started(StageName::AddContent));
        LoggingEventSink::default().emit(&started(StageName::Swap));
        LoggingEventSink::debug().emit(&PipelineEvent::JobSubmitted {
            job_id: "j".into(),
        });
    }

    #[test]
    fn test_collecting_sink_filters_by_prefix() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&started(StageName::AddContent));
        sink.emit(&PipelineEvent::JobSubmitted { job_id: "j".into() });
        sink.emit(&started(StageName::Composite));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(
            sink.event_types(),
            vec!["stage.started", "job.submitted", "stage.started"]
        );
    }
}
