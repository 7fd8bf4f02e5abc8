// events.rs — Planning events and notification dispatch.
//
// The service emits an event after each committed change: activity created,
// state changed, alert raised or resolved, goal first fulfilled, and labor
// nudges that could not be applied. Sinks subscribe to these; the built-in
// JournalSink appends them as JSON Lines.
//
// Dispatch is synchronous and happens after the repository write, so a sink
// failure never affects the stored activity. Dashboards are expected to poll
// the read model rather than rely on these for delivery.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityState;
use crate::alerts::{Alert, AlertType, Severity};
use crate::error::PlanningError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PlanningEvent {
    ActivityCreated {
        activity_id: Uuid,
        name: String,
        timestamp: DateTime<Utc>,
    },

    ActivityStateChanged {
        activity_id: Uuid,
        from_state: ActivityState,
        to_state: ActivityState,
        timestamp: DateTime<Utc>,
    },

    AlertRaised {
        activity_id: Uuid,
        alert_id: Uuid,
        alert_type: AlertType,
        severity: Severity,
        timestamp: DateTime<Utc>,
    },

    AlertResolved {
        activity_id: Uuid,
        alert_id: Uuid,
        alert_type: AlertType,
        timestamp: DateTime<Utc>,
    },

    GoalFulfilled {
        activity_id: Uuid,
        goal_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    ActivityDeleted {
        activity_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A labor notification could not be turned into progress.
    LaborSyncSkipped {
        activity_id: Uuid,
        is_create: bool,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl PlanningEvent {
    pub fn event_type(&self) -> &str {
        match self {
            PlanningEvent::ActivityCreated { .. } => "activity_created",
            PlanningEvent::ActivityStateChanged { .. } => "activity_state_changed",
            PlanningEvent::AlertRaised { .. } => "alert_raised",
            PlanningEvent::AlertResolved { .. } => "alert_resolved",
            PlanningEvent::GoalFulfilled { .. } => "goal_fulfilled",
            PlanningEvent::ActivityDeleted { .. } => "activity_deleted",
            PlanningEvent::LaborSyncSkipped { .. } => "labor_sync_skipped",
        }
    }

    /// The activity the event is about.
    pub fn activity_id(&self) -> Uuid {
        match self {
            PlanningEvent::ActivityCreated { activity_id, .. }
            | PlanningEvent::ActivityStateChanged { activity_id, .. }
            | PlanningEvent::AlertRaised { activity_id, .. }
            | PlanningEvent::AlertResolved { activity_id, .. }
            | PlanningEvent::GoalFulfilled { activity_id, .. }
            | PlanningEvent::ActivityDeleted { activity_id, .. }
            | PlanningEvent::LaborSyncSkipped { activity_id, .. } => *activity_id,
        }
    }

    /// Raised or resolved, depending on the alert's flag.
    pub fn for_alert(activity_id: Uuid, alert: &Alert, timestamp: DateTime<Utc>) -> Self {
        if alert.resolved {
            PlanningEvent::AlertResolved {
                activity_id,
                alert_id: alert.id,
                alert_type: alert.alert_type,
                timestamp,
            }
        } else {
            PlanningEvent::AlertRaised {
                activity_id,
                alert_id: alert.id,
                alert_type: alert.alert_type,
                severity: alert.severity,
                timestamp,
            }
        }
    }
}

/// Receives planning events. Errors are logged but don't stop the system.
pub trait NotificationSink: Send + Sync {
    fn send(&self, event: &PlanningEvent) -> Result<(), PlanningError>;
}

/// The project's planning journal, `.farm/events.jsonl` by default.
///
/// One JSON object per committed change, oldest first, never rewritten. It is
/// the audit trail behind `farm activity history` and the feed that external
/// schedulers or dashboards tail. Each event is written with a single append,
/// so the CLI and a labor hook sharing the file never interleave lines.
pub struct JournalSink {
    path: PathBuf,
}

impl JournalSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything journalled about one activity, oldest first. A missing
    /// journal is an empty history; lines that no longer parse are skipped.
    pub fn history(&self, activity_id: Uuid) -> Result<Vec<PlanningEvent>, PlanningError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PlanningError::IoError {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PlanningEvent>(line) {
                Ok(event) if event.activity_id() == activity_id => events.push(event),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    "skipping unreadable journal entry: {}",
                    e
                ),
            }
        }
        Ok(events)
    }
}

impl NotificationSink for JournalSink {
    fn send(&self, event: &PlanningEvent) -> Result<(), PlanningError> {
        let io_error = |source| PlanningError::IoError {
            path: self.path.display().to_string(),
            source,
        };

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PlanningError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(io_error)
    }
}

/// Dispatches events to every registered sink.
///
/// A failing sink is logged and skipped; the others still receive the event.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    /// A dispatcher with no sinks. Dispatching to it is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. Sinks receive events in registration order.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Deliver one event to every sink.
    pub fn dispatch(&self, event: &PlanningEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(
                    event = event.event_type(),
                    activity_id = %event.activity_id(),
                    "notification sink error: {}",
                    e
                );
            }
        }
    }

    /// Deliver a batch in order, as produced by one committed change.
    pub fn dispatch_all(&self, events: &[PlanningEvent]) {
        for event in events {
            self.dispatch(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn created(name: &str) -> PlanningEvent {
        PlanningEvent::ActivityCreated {
            activity_id: Uuid::new_v4(),
            name: name.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn event_json_is_tagged_by_type() {
        let event = created("Sow beans");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"activity_created\""));
        let restored: PlanningEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn journal_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let sink = JournalSink::new(&path);

        sink.send(&created("one")).unwrap();
        sink.send(&created("two")).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn history_filters_by_activity_and_skips_bad_lines() {
        let dir = tempdir().unwrap();
        let sink = JournalSink::new(dir.path().join("events.jsonl"));
        assert!(sink.history(Uuid::new_v4()).unwrap().is_empty());

        let mine = created("mine");
        let id = mine.activity_id();
        sink.send(&mine).unwrap();
        sink.send(&created("someone else's")).unwrap();
        let mut file = OpenOptions::new().append(true).open(sink.path()).unwrap();
        writeln!(file, "{{not json").unwrap();
        sink.send(&PlanningEvent::ActivityDeleted {
            activity_id: id,
            timestamp: Utc::now(),
        })
        .unwrap();

        let history = sink.history(id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], mine);
        assert_eq!(history[1].event_type(), "activity_deleted");
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        struct Broken;
        impl NotificationSink for Broken {
            fn send(&self, _: &PlanningEvent) -> Result<(), PlanningError> {
                Err(PlanningError::unavailable("webhook", "down"))
            }
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(Broken));
        dispatcher.add_sink(Box::new(JournalSink::new(&path)));

        dispatcher.dispatch(&created("still logged"));
        assert!(fs::read_to_string(&path).unwrap().contains("still logged"));
    }

    #[test]
    fn alert_event_follows_resolved_flag() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut alert = Alert::new(AlertType::Delay, Severity::Warning, "t", "m", now);
        assert_eq!(PlanningEvent::for_alert(id, &alert, now).event_type(), "alert_raised");
        alert.resolve(now);
        assert_eq!(PlanningEvent::for_alert(id, &alert, now).event_type(), "alert_resolved");
    }
}
