// lifecycle.rs — ActivityService: every change to an activity goes through here.
//
// Each mutation runs the same sequence under the activity's lock:
//
//   1. load the stored record
//   2. apply the change to a copy (validation failures stop here, nothing
//      has been written)
//   3. re-derive: actual start/end, state, deviation, alerts, attention flag
//   4. save with the loaded version (ConcurrentModification if it moved)
//   5. dispatch events for what changed
//
// Locks are per activity, so unrelated activities never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::activity::{
    hours_between, validate_estimate, validate_name, validate_window, ActivityPatch,
    ActivityState, NewActivity, PlannedActivity,
};
use crate::alerts::{self, Alert, AlertContext};
use crate::clock::{Clock, SystemClock};
use crate::comparison::ActivityComparison;
use crate::config::PlanningConfig;
use crate::deviation::compute_deviation;
use crate::error::PlanningError;
use crate::events::{EventDispatcher, PlanningEvent};
use crate::goal::{Goal, NewGoal};
use crate::reference::ReferenceServices;
use crate::stats::{compute_statistics, Stats};
use crate::store::ActivityRepository;

/// Re-derive every computed field of the activity at `now` and reconcile its
/// alerts. Returns the alerts raised or resolved.
pub fn refresh_derived(
    activity: &mut PlannedActivity,
    context: &AlertContext,
    now: DateTime<Utc>,
    config: &PlanningConfig,
) -> Vec<Alert> {
    activity.progress_percentage = activity.progress_percentage.min(100);

    if activity.progress_percentage > 0 && activity.actual_start.is_none() {
        activity.actual_start = Some(now);
    }

    let state = ActivityState::derive(
        activity.cancelled,
        activity.progress_percentage,
        activity.planned_end,
        now,
    );
    if state == ActivityState::Completed && activity.actual_end.is_none() {
        activity.actual_end = Some(now);
        activity.actual_duration_hours = activity.actual_start.map(|start| hours_between(start, now));
    }
    activity.state = state;

    activity.deviation_days = compute_deviation(activity, now, &config.alerts).deviation_days;

    let deltas = alerts::evaluate(activity, context, now, &config.alerts);
    let touched = alerts::apply_deltas(activity, &deltas, now);

    // Attention also depends on the alerts that are now open.
    activity.needs_attention = compute_deviation(activity, now, &config.alerts).needs_attention;

    touched
}

pub struct ActivityService {
    repo: Arc<dyn ActivityRepository>,
    refs: ReferenceServices,
    clock: Arc<dyn Clock>,
    config: PlanningConfig,
    dispatcher: EventDispatcher,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ActivityService {
    /// A service over the given repository with empty reference data, the
    /// system clock, default config and no event sinks.
    pub fn new(repo: Arc<dyn ActivityRepository>) -> Self {
        Self {
            repo,
            refs: ReferenceServices::default(),
            clock: Arc::new(SystemClock),
            config: PlanningConfig::default(),
            dispatcher: EventDispatcher::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve plot, crop and worker names through `refs`.
    pub fn with_reference(mut self, refs: ReferenceServices) -> Self {
        self.refs = refs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: PlanningConfig) -> Self {
        self.config = config;
        self
    }

    /// Deliver committed changes to the dispatcher's sinks.
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    /// The service's notion of the current instant.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate and store a new activity with its initial goals. Its state,
    /// deviation and alerts are derived before the first save.
    pub fn create_activity(&self, request: NewActivity) -> Result<PlannedActivity, PlanningError> {
        let now = self.clock.now();
        let mut activity = PlannedActivity::new(&request, now)?;

        activity.plot = request.plot_id.map(|id| self.refs.plot_ref(id));
        activity.crop = request.crop_id.map(|id| self.refs.crop_ref(id));
        activity.responsible = request.responsible_id.map(|id| self.refs.worker_ref(id));
        activity.created_by = request.created_by.map(|id| self.refs.worker_ref(id));
        activity.assigned_workers = request
            .assigned_workers
            .iter()
            .map(|id| self.refs.worker_ref(*id))
            .collect();

        let context = self.alert_context(&activity);
        let touched = refresh_derived(&mut activity, &context, now, &self.config);

        self.with_lock(activity.id, || self.repo.save(&activity, None))?;

        tracing::info!(
            activity_id = %activity.id,
            activity_type = %activity.activity_type,
            state = %activity.state,
            "activity created"
        );

        let mut events = vec![PlanningEvent::ActivityCreated {
            activity_id: activity.id,
            name: activity.name.clone(),
            timestamp: now,
        }];
        if activity.state != ActivityState::Pending {
            events.push(PlanningEvent::ActivityStateChanged {
                activity_id: activity.id,
                from_state: ActivityState::Pending,
                to_state: activity.state,
                timestamp: now,
            });
        }
        events.extend(touched.iter().map(|a| PlanningEvent::for_alert(activity.id, a, now)));
        self.dispatcher.dispatch_all(&events);

        Ok(activity)
    }

    /// Fetch an activity with its derived fields brought up to date. If time
    /// alone has changed them (e.g. it became late), the change is committed.
    pub fn get_activity(&self, activity_id: Uuid) -> Result<PlannedActivity, PlanningError> {
        match self.mutate(activity_id, |_, _, _| Ok(())) {
            Ok((activity, ())) => Ok(activity),
            Err(PlanningError::ConcurrentModification { .. }) => {
                // Someone outside this process wrote first; show their
                // record, derived at this instant, without writing.
                let mut activity = self
                    .repo
                    .get(activity_id)?
                    .ok_or(PlanningError::ActivityNotFound(activity_id))?;
                let context = self.alert_context(&activity);
                refresh_derived(&mut activity, &context, self.clock.now(), &self.config);
                Ok(activity)
            }
            Err(e) => Err(e),
        }
    }

    /// Read model for dashboards and polling clients: every activity (or
    /// those in `state`), derived at the current instant. Nothing is written.
    pub fn list_activities(
        &self,
        state: Option<ActivityState>,
    ) -> Result<Vec<PlannedActivity>, PlanningError> {
        let now = self.clock.now();
        let mut activities = self.repo.list()?;
        for activity in &mut activities {
            let context = self.alert_context(activity);
            refresh_derived(activity, &context, now, &self.config);
        }
        if let Some(state) = state {
            activities.retain(|a| a.state == state);
        }
        Ok(activities)
    }

    /// Apply a partial edit. Every field is validated before anything is
    /// written; a rejected patch leaves the record untouched.
    pub fn update_activity(
        &self,
        activity_id: Uuid,
        patch: ActivityPatch,
    ) -> Result<PlannedActivity, PlanningError> {
        let refs = self.refs.clone();
        let (activity, ()) = self.mutate(activity_id, move |activity, _, _| {
            if let Some(status) = patch.status {
                match status {
                    ActivityState::Cancelled if !patch.is_status_only() => {
                        return Err(PlanningError::validation(
                            "status",
                            "cancelling cannot be combined with other changes",
                        ))
                    }
                    ActivityState::Cancelled => return apply_cancel(activity),
                    ActivityState::Completed => {}
                    other => {
                        return Err(PlanningError::validation(
                            "status",
                            format!(
                                "'{}' is derived from progress and schedule and cannot be set",
                                other
                            ),
                        ))
                    }
                }
            }
            ensure_mutable(activity)?;

            if let Some(name) = patch.name {
                validate_name(&name)?;
                activity.name = name.trim().to_string();
            }
            if let Some(description) = patch.description {
                activity.description = description;
            }
            if let Some(activity_type) = patch.activity_type {
                activity.activity_type = activity_type;
            }
            if let Some(priority) = patch.priority {
                activity.priority = priority;
            }
            if let Some(start) = patch.planned_start {
                activity.planned_start = start;
            }
            if let Some(end) = patch.planned_end {
                activity.planned_end = end;
            }
            validate_window(activity.planned_start, activity.planned_end)?;
            if let Some(hours) = patch.estimated_duration_hours {
                validate_estimate(hours)?;
                activity.estimated_duration_hours = hours;
            }
            if let Some(period) = patch.review_period {
                activity.review_period = period;
            }
            if let Some(weather) = patch.adverse_weather {
                activity.adverse_weather = weather;
            }

            if let Some(progress) = patch.progress_percentage {
                apply_progress(activity, progress)?;
            }
            if patch.status == Some(ActivityState::Completed) {
                apply_progress(activity, 100)?;
            }

            if let Some(id) = patch.plot_id {
                activity.plot = Some(refs.plot_ref(id));
            }
            if let Some(id) = patch.crop_id {
                activity.crop = Some(refs.crop_ref(id));
            }
            if let Some(id) = patch.responsible_id {
                activity.responsible = Some(refs.worker_ref(id));
            }
            if let Some(workers) = patch.assigned_workers {
                activity.assigned_workers =
                    workers.into_iter().map(|id| refs.worker_ref(id)).collect();
            }
            Ok(())
        })?;
        Ok(activity)
    }

    /// Set progress to `percentage` (clamped to 0..=100). Lowering progress
    /// is rejected.
    pub fn set_progress(
        &self,
        activity_id: Uuid,
        percentage: i32,
    ) -> Result<PlannedActivity, PlanningError> {
        let (activity, ()) = self.mutate(activity_id, |activity, _, _| {
            ensure_mutable(activity)?;
            apply_progress(activity, percentage)
        })?;
        Ok(activity)
    }

    /// Raise progress by `step` points, clamped at 100. The increment is
    /// computed from the stored value while holding the activity's lock.
    pub fn advance_progress(
        &self,
        activity_id: Uuid,
        step: u8,
    ) -> Result<PlannedActivity, PlanningError> {
        let (activity, ()) = self.mutate(activity_id, |activity, _, _| {
            ensure_mutable(activity)?;
            let target = i32::from(activity.progress_percentage) + i32::from(step);
            apply_progress(activity, target)
        })?;
        Ok(activity)
    }

    /// Cancel a pending, in-progress or late activity. Cancelling twice is a
    /// no-op; a completed activity cannot be cancelled.
    pub fn cancel_activity(&self, activity_id: Uuid) -> Result<PlannedActivity, PlanningError> {
        let (activity, ()) = self.mutate(activity_id, |activity, _, _| apply_cancel(activity))?;
        Ok(activity)
    }

    /// Delete an activity together with its goals and alerts.
    pub fn delete_activity(&self, activity_id: Uuid) -> Result<(), PlanningError> {
        if !self.with_lock(activity_id, || self.repo.delete(activity_id))? {
            return Err(PlanningError::ActivityNotFound(activity_id));
        }

        tracing::info!(%activity_id, "activity deleted");
        self.dispatcher.dispatch(&PlanningEvent::ActivityDeleted {
            activity_id,
            timestamp: self.clock.now(),
        });
        Ok(())
    }

    /// Flag one alert as read. Its resolution state is untouched.
    pub fn mark_alert_read(
        &self,
        activity_id: Uuid,
        alert_id: Uuid,
    ) -> Result<PlannedActivity, PlanningError> {
        let (activity, ()) = self.mutate(activity_id, |activity, _, _| {
            let alert = activity
                .alerts
                .iter_mut()
                .find(|a| a.id == alert_id)
                .ok_or(PlanningError::AlertNotFound {
                    activity_id,
                    alert_id,
                })?;
            alert.read = true;
            Ok(())
        })?;
        Ok(activity)
    }

    /// Attach a new measurable goal to a mutable activity.
    pub fn add_goal(&self, activity_id: Uuid, goal: NewGoal) -> Result<Goal, PlanningError> {
        let (_, goal) = self.mutate(activity_id, |activity, _, _| {
            ensure_mutable(activity)?;
            goal.validate()?;
            let goal = Goal::new(goal.description, goal.target_value, goal.unit)?;
            activity.goals.push(goal.clone());
            Ok(goal)
        })?;
        Ok(goal)
    }

    /// Record the measured value for a goal and re-evaluate its activity.
    pub fn record_goal_progress(
        &self,
        goal_id: Uuid,
        current_value: f64,
    ) -> Result<Goal, PlanningError> {
        let owner = self.owner_of(goal_id)?;
        let (_, goal) = self.mutate(owner, |activity, now, events| {
            if activity.cancelled {
                return Err(cancelled_error());
            }
            let goal = activity
                .goal_mut(goal_id)
                .ok_or(PlanningError::GoalNotFound(goal_id))?;
            if goal.record(current_value, now)? {
                events.push(PlanningEvent::GoalFulfilled {
                    activity_id: owner,
                    goal_id,
                    timestamp: now,
                });
            }
            Ok(goal.clone())
        })?;
        Ok(goal)
    }

    /// Detach a goal from its activity.
    pub fn remove_goal(&self, goal_id: Uuid) -> Result<(), PlanningError> {
        let owner = self.owner_of(goal_id)?;
        self.mutate(owner, |activity, _, _| {
            ensure_mutable(activity)?;
            let before = activity.goals.len();
            activity.goals.retain(|g| g.id != goal_id);
            if activity.goals.len() == before {
                return Err(PlanningError::GoalNotFound(goal_id));
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Planned versus actual for one activity, derived at the current instant.
    pub fn get_comparison(&self, activity_id: Uuid) -> Result<ActivityComparison, PlanningError> {
        let activity = self.get_activity(activity_id)?;
        Ok(ActivityComparison::from_activity(&activity))
    }

    /// Aggregate counts and scores over every activity.
    pub fn get_statistics(&self) -> Result<Stats, PlanningError> {
        let activities = self.list_activities(None)?;
        Ok(compute_statistics(&activities, &self.config.stats))
    }

    fn owner_of(&self, goal_id: Uuid) -> Result<Uuid, PlanningError> {
        self.repo
            .find_by_goal(goal_id)?
            .map(|a| a.id)
            .ok_or(PlanningError::GoalNotFound(goal_id))
    }

    fn alert_context(&self, activity: &PlannedActivity) -> AlertContext {
        AlertContext {
            minimum_headcount: if activity.state.is_terminal() {
                None
            } else {
                self.refs.minimum_headcount(activity.activity_type)
            },
        }
    }

    /// Run `f` holding the activity's lock. The table only keeps entries
    /// for activities some caller is working on right now.
    fn with_lock<R>(&self, activity_id: Uuid, f: impl FnOnce() -> R) -> R {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(activity_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        if locks
            .get(&activity_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&activity_id);
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Load, change, re-derive and commit one activity under its lock.
    ///
    /// `change` works on a copy; if it fails nothing is written. If the copy
    /// ends up identical to the stored record, nothing is written either.
    fn mutate<T, F>(&self, activity_id: Uuid, change: F) -> Result<(PlannedActivity, T), PlanningError>
    where
        F: FnOnce(&mut PlannedActivity, DateTime<Utc>, &mut Vec<PlanningEvent>) -> Result<T, PlanningError>,
    {
        self.with_lock(activity_id, || self.commit(activity_id, change))
    }

    fn commit<T, F>(&self, activity_id: Uuid, change: F) -> Result<(PlannedActivity, T), PlanningError>
    where
        F: FnOnce(&mut PlannedActivity, DateTime<Utc>, &mut Vec<PlanningEvent>) -> Result<T, PlanningError>,
    {
        let stored = self
            .repo
            .get(activity_id)?
            .ok_or(PlanningError::ActivityNotFound(activity_id))?;
        let now = self.clock.now();

        let mut next = stored.clone();
        let mut events = Vec::new();
        let output = change(&mut next, now, &mut events)?;

        let context = self.alert_context(&next);
        let touched = refresh_derived(&mut next, &context, now, &self.config);

        if next == stored {
            return Ok((stored, output));
        }

        next.version = stored.version + 1;
        next.updated_at = now;
        self.repo.save(&next, Some(stored.version))?;

        if next.state != stored.state {
            tracing::debug!(
                %activity_id,
                from = %stored.state,
                to = %next.state,
                progress = next.progress_percentage,
                "activity state changed"
            );
            events.push(PlanningEvent::ActivityStateChanged {
                activity_id,
                from_state: stored.state,
                to_state: next.state,
                timestamp: now,
            });
        }
        for alert in &touched {
            tracing::debug!(
                %activity_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                resolved = alert.resolved,
                "alert reconciled"
            );
        }
        events.extend(touched.iter().map(|a| PlanningEvent::for_alert(activity_id, a, now)));
        self.dispatcher.dispatch_all(&events);

        Ok((next, output))
    }
}

fn cancelled_error() -> PlanningError {
    PlanningError::validation("status", "activity is cancelled and can no longer change")
}

fn ensure_mutable(activity: &PlannedActivity) -> Result<(), PlanningError> {
    if activity.cancelled {
        return Err(cancelled_error());
    }
    Ok(())
}

fn apply_progress(activity: &mut PlannedActivity, requested: i32) -> Result<(), PlanningError> {
    let clamped = requested.clamp(0, 100) as u8;
    if clamped < activity.progress_percentage {
        return Err(PlanningError::validation(
            "progress_percentage",
            format!(
                "cannot decrease from {} to {}",
                activity.progress_percentage, clamped
            ),
        ));
    }
    activity.progress_percentage = clamped;
    Ok(())
}

fn apply_cancel(activity: &mut PlannedActivity) -> Result<(), PlanningError> {
    if activity.cancelled {
        return Ok(());
    }
    if activity.state == ActivityState::Completed {
        return Err(PlanningError::validation(
            "status",
            "a completed activity cannot be cancelled",
        ));
    }
    activity.cancelled = true;
    tracing::info!(activity_id = %activity.id, "activity cancelled");
    Ok(())
}
