//! # farm-planning
//!
//! Activity planning and monitoring for farm operations.
//!
//! A [`PlannedActivity`] is a scheduled unit of field work (sowing,
//! irrigation, harvest, ...). The engine tracks it against real execution,
//! derives its state and schedule deviation, keeps its alerts in step with
//! the facts, and summarises the whole set for dashboards.
//!
//! ## Key components
//!
//! - [`ActivityService`] — every create/update/progress/goal operation, each
//!   committed atomically under a per-activity lock
//! - [`ActivityState`] — Pending → InProgress → Completed, with Late and
//!   Cancelled; always derived from progress, schedule and the cancel flag
//! - [`compute_deviation`] — signed days late and the needs-attention flag
//! - [`alerts::evaluate`] — the alert rule table, producing raise/resolve deltas
//! - [`LaborSyncBridge`] — best-effort progress nudges from labor records
//! - [`compute_statistics`] — fleet-wide counts, completion rate, efficiency
//! - [`ActivityRepository`] — persistence seam (in-memory and JSON-file stores)
//! - [`EventDispatcher`] — fans [`PlanningEvent`]s out to notification sinks

pub mod activity;
pub mod alerts;
pub mod clock;
pub mod comparison;
pub mod config;
pub mod deviation;
pub mod error;
pub mod events;
pub mod goal;
pub mod labor;
pub mod lifecycle;
pub mod reference;
pub mod stats;
pub mod store;

pub use activity::{
    ActivityPatch, ActivityState, ActivityType, EntityRef, NewActivity, PlannedActivity, Priority,
    ReviewPeriod,
};
pub use alerts::{Alert, AlertContext, AlertDelta, AlertType, Severity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use comparison::ActivityComparison;
pub use config::{FarmPaths, PlanningConfig};
pub use deviation::{compute_deviation, Deviation};
pub use error::PlanningError;
pub use events::{EventDispatcher, JournalSink, NotificationSink, PlanningEvent};
pub use goal::{Goal, NewGoal};
pub use labor::{LaborSyncBridge, SyncOutcome};
pub use lifecycle::ActivityService;
pub use reference::{
    CropDirectory, CropInfo, PlotDirectory, PlotInfo, ReferenceServices, StaticReferenceData,
    WorkerRoster,
};
pub use stats::{compute_statistics, Stats};
pub use store::{ActivityRepository, InMemoryActivityStore, JsonFileActivityStore};
