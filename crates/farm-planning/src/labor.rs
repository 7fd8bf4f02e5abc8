// labor.rs — Turns labor record notifications into activity progress.
//
// The labor service stores its record first and then notifies us. Whatever
// happens here, the labor record stays: failures are logged, reported as
// `SyncOutcome::Skipped`, and journalled as a LaborSyncSkipped event. There is
// no compensating reconciliation, so a skipped nudge is simply lost.
//
// Progress is a heuristic proxy: +create_step for a new labor record,
// +update_step for an edited one, clamped at 100.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityState;
use crate::config::LaborSyncConfig;
use crate::error::PlanningError;
use crate::events::{EventDispatcher, PlanningEvent};
use crate::lifecycle::ActivityService;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied { progress: u8, state: ActivityState },
    Skipped { reason: String },
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }
}

pub struct LaborSyncBridge {
    service: Arc<ActivityService>,
    config: LaborSyncConfig,
    dispatcher: EventDispatcher,
}

impl LaborSyncBridge {
    pub fn new(service: Arc<ActivityService>) -> Self {
        let config = service.config().labor.clone();
        Self {
            service,
            config,
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Where LaborSyncSkipped events go.
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// React to a labor record being created (`is_create`) or updated.
    /// Never fails.
    pub fn on_labor_recorded(&self, activity_id: Uuid, is_create: bool) -> SyncOutcome {
        let step = if is_create {
            self.config.create_step
        } else {
            self.config.update_step
        };

        let mut attempt = 0;
        let result = loop {
            match self.service.advance_progress(activity_id, step) {
                Err(PlanningError::ConcurrentModification { .. }) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::debug!(%activity_id, attempt, "labor sync conflicted, retrying");
                }
                other => break other,
            }
        };

        match result {
            Ok(activity) => {
                tracing::debug!(
                    %activity_id,
                    is_create,
                    progress = activity.progress_percentage,
                    "labor sync applied"
                );
                SyncOutcome::Applied {
                    progress: activity.progress_percentage,
                    state: activity.state,
                }
            }
            Err(e) => {
                tracing::warn!(%activity_id, is_create, "labor sync skipped: {}", e);
                let reason = e.to_string();
                self.dispatcher.dispatch(&PlanningEvent::LaborSyncSkipped {
                    activity_id,
                    is_create,
                    reason: reason.clone(),
                    timestamp: self.service.now(),
                });
                SyncOutcome::Skipped { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityType, NewActivity};
    use crate::clock::FixedClock;
    use crate::store::InMemoryActivityStore;
    use chrono::{Duration, Utc};

    fn setup() -> (Arc<ActivityService>, LaborSyncBridge) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let service = Arc::new(
            ActivityService::new(Arc::new(InMemoryActivityStore::new())).with_clock(clock),
        );
        let bridge = LaborSyncBridge::new(service.clone());
        (service, bridge)
    }

    fn create(service: &ActivityService) -> Uuid {
        let now = Utc::now();
        service
            .create_activity(NewActivity::new(
                "Clear drainage ditches",
                ActivityType::Maintenance,
                now,
                now + Duration::days(3),
            ))
            .unwrap()
            .id
    }

    #[test]
    fn create_and_update_steps_clamp_at_completion() {
        let (service, bridge) = setup();
        let id = create(&service);
        service.set_progress(id, 85).unwrap();

        let outcome = bridge.on_labor_recorded(id, true);
        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                progress: 95,
                state: ActivityState::InProgress
            }
        );

        let outcome = bridge.on_labor_recorded(id, false);
        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                progress: 100,
                state: ActivityState::Completed
            }
        );
    }

    #[test]
    fn unknown_activity_is_skipped_not_failed() {
        let (service, bridge) = setup();
        for _ in 0..100 {
            let outcome = bridge.on_labor_recorded(Uuid::new_v4(), true);
            assert!(!outcome.is_applied());
        }
        assert_eq!(service.lock_count(), 0);
    }

    #[test]
    fn cancelled_activity_is_skipped() {
        let (service, bridge) = setup();
        let id = create(&service);
        service.cancel_activity(id).unwrap();
        match bridge.on_labor_recorded(id, false) {
            SyncOutcome::Skipped { reason } => assert!(reason.contains("cancelled")),
            other => panic!("expected skip, got {:?}", other),
        }
        assert_eq!(service.get_activity(id).unwrap().progress_percentage, 0);
    }

    #[test]
    fn completed_activity_stays_complete() {
        let (service, bridge) = setup();
        let id = create(&service);
        service.set_progress(id, 100).unwrap();
        let outcome = bridge.on_labor_recorded(id, true);
        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                progress: 100,
                state: ActivityState::Completed
            }
        );
    }
}
