// activity.rs — PlannedActivity: the unit of scheduled farm work.
//
// An activity carries its plan (window, estimate, team), its execution
// (actual start/end, progress), the values derived from both (state,
// deviation, attention flag), and the goals and alerts it owns. Goals and
// alerts live inside the activity record, so deleting the activity removes
// them with it.
//
// State is never set directly. `ActivityState::derive` computes it from
// (cancelled, progress, planned_end, now) every time the activity changes:
//   cancelled          → Cancelled
//   progress == 100    → Completed
//   planned_end < now  → Late
//   progress > 0       → InProgress
//   otherwise          → Pending

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alerts::{Alert, AlertType};
use crate::error::PlanningError;
use crate::goal::{Goal, NewGoal};

/// Kind of field work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Sowing,
    Irrigation,
    Fumigation,
    Fertilization,
    Harvest,
    Maintenance,
    Pruning,
    PestControl,
    Other,
}

impl ActivityType {
    pub const ALL: [ActivityType; 9] = [
        ActivityType::Sowing,
        ActivityType::Irrigation,
        ActivityType::Fumigation,
        ActivityType::Fertilization,
        ActivityType::Harvest,
        ActivityType::Maintenance,
        ActivityType::Pruning,
        ActivityType::PestControl,
        ActivityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Sowing => "sowing",
            ActivityType::Irrigation => "irrigation",
            ActivityType::Fumigation => "fumigation",
            ActivityType::Fertilization => "fertilization",
            ActivityType::Harvest => "harvest",
            ActivityType::Maintenance => "maintenance",
            ActivityType::Pruning => "pruning",
            ActivityType::PestControl => "pest_control",
            ActivityType::Other => "other",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ActivityType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| PlanningError::validation("activity_type", format!("unknown type '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Priority {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(PlanningError::validation(
                "priority",
                format!("unknown priority '{}'", s),
            )),
        }
    }
}

/// How often planners review the activity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPeriod {
    Day,
    #[default]
    Week,
    Biweekly,
    Month,
}

impl fmt::Display for ReviewPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewPeriod::Day => write!(f, "day"),
            ReviewPeriod::Week => write!(f, "week"),
            ReviewPeriod::Biweekly => write!(f, "biweekly"),
            ReviewPeriod::Month => write!(f, "month"),
        }
    }
}

impl FromStr for ReviewPeriod {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(ReviewPeriod::Day),
            "week" => Ok(ReviewPeriod::Week),
            "biweekly" => Ok(ReviewPeriod::Biweekly),
            "month" => Ok(ReviewPeriod::Month),
            _ => Err(PlanningError::validation(
                "review_period",
                format!("unknown review period '{}'", s),
            )),
        }
    }
}

/// The lifecycle state of a PlannedActivity.
///
/// Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Pending,
    InProgress,
    Completed,
    Late,
    Cancelled,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityState::Pending => write!(f, "pending"),
            ActivityState::InProgress => write!(f, "in_progress"),
            ActivityState::Completed => write!(f, "completed"),
            ActivityState::Late => write!(f, "late"),
            ActivityState::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ActivityState {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(ActivityState::Pending),
            "in_progress" => Ok(ActivityState::InProgress),
            "completed" => Ok(ActivityState::Completed),
            "late" => Ok(ActivityState::Late),
            "cancelled" => Ok(ActivityState::Cancelled),
            _ => Err(PlanningError::validation(
                "status",
                format!("unknown status '{}'", s),
            )),
        }
    }
}

impl ActivityState {
    pub const ALL: [ActivityState; 5] = [
        ActivityState::Pending,
        ActivityState::InProgress,
        ActivityState::Completed,
        ActivityState::Late,
        ActivityState::Cancelled,
    ];

    /// Compute the state from the fields it depends on. Pure: the same
    /// inputs always give the same state, whatever the call history.
    pub fn derive(
        cancelled: bool,
        progress: u8,
        planned_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ActivityState {
        if cancelled {
            ActivityState::Cancelled
        } else if progress >= 100 {
            ActivityState::Completed
        } else if planned_end < now {
            ActivityState::Late
        } else if progress > 0 {
            ActivityState::InProgress
        } else {
            ActivityState::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityState::Completed | ActivityState::Cancelled)
    }
}

/// A weak reference to an entity owned by another service: its id plus the
/// display name cached when the reference was set. The name is blank when
/// the owning service could not be reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
}

impl EntityRef {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn unnamed(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }
}

/// A scheduled unit of farm work, its execution record and derived status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedActivity {
    pub id: Uuid,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub activity_type: ActivityType,

    #[serde(default)]
    pub priority: Priority,

    pub planned_start: DateTime<Utc>,

    pub planned_end: DateTime<Utc>,

    pub estimated_duration_hours: f64,

    #[serde(default)]
    pub review_period: ReviewPeriod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_hours: Option<f64>,

    /// 0..=100, never decreases.
    pub progress_percentage: u8,

    /// Signed days between the reference end and the planned end; positive
    /// means late.
    pub deviation_days: i64,

    pub needs_attention: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<EntityRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<EntityRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<EntityRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<EntityRef>,

    #[serde(default)]
    pub assigned_workers: Vec<EntityRef>,

    /// Caller-reported weather warning for the activity's plot.
    #[serde(default)]
    pub adverse_weather: bool,

    #[serde(default)]
    pub goals: Vec<Goal>,

    /// Every alert ever raised, resolved ones included.
    #[serde(default)]
    pub alerts: Vec<Alert>,

    pub state: ActivityState,

    /// Set only by explicit cancellation.
    #[serde(default)]
    pub cancelled: bool,

    /// Incremented on every committed change; used to detect lost updates.
    #[serde(default)]
    pub version: u64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl PlannedActivity {
    /// Build a new PENDING activity from a validated request. Reference
    /// names are filled in by the caller.
    pub fn new(request: &NewActivity, now: DateTime<Utc>) -> Result<Self, PlanningError> {
        request.validate()?;
        let goals = request
            .goals
            .iter()
            .map(|g| Goal::new(&g.description, g.target_value, &g.unit))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            activity_type: request.activity_type,
            priority: request.priority,
            planned_start: request.planned_start,
            planned_end: request.planned_end,
            estimated_duration_hours: request.estimated_duration_hours,
            review_period: request.review_period,
            actual_start: None,
            actual_end: None,
            actual_duration_hours: None,
            progress_percentage: 0,
            deviation_days: 0,
            needs_attention: false,
            plot: request.plot_id.map(EntityRef::unnamed),
            crop: request.crop_id.map(EntityRef::unnamed),
            responsible: request.responsible_id.map(EntityRef::unnamed),
            created_by: request.created_by.map(EntityRef::unnamed),
            assigned_workers: request
                .assigned_workers
                .iter()
                .copied()
                .map(EntityRef::unnamed)
                .collect(),
            adverse_weather: request.adverse_weather,
            goals,
            alerts: Vec::new(),
            state: ActivityState::Pending,
            cancelled: false,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn goal_mut(&mut self, goal_id: Uuid) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.id == goal_id)
    }

    /// Alerts that have not been resolved yet.
    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.resolved)
    }

    /// The unresolved alert of the given type, if any. There is at most one.
    pub fn active_alert(&self, alert_type: AlertType) -> Option<&Alert> {
        self.active_alerts().find(|a| a.alert_type == alert_type)
    }

    /// Share of the planned window that has elapsed at `now`, in 0.0..=1.0.
    pub fn elapsed_fraction(&self, now: DateTime<Utc>) -> f64 {
        let total = (self.planned_end - self.planned_start).num_seconds();
        if total <= 0 {
            return if now >= self.planned_end { 1.0 } else { 0.0 };
        }
        let elapsed = (now - self.planned_start).num_seconds();
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Hours spent on the work so far: the recorded duration once finished,
    /// otherwise the time since it started. None before it starts.
    pub fn worked_hours(&self, now: DateTime<Utc>) -> Option<f64> {
        if let Some(hours) = self.actual_duration_hours {
            return Some(hours);
        }
        self.actual_start
            .map(|start| hours_between(start, self.actual_end.unwrap_or(now)))
    }
}

pub(crate) fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds().max(0) as f64) / 3600.0
}

/// Request to create a PlannedActivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub activity_type: ActivityType,

    #[serde(default)]
    pub priority: Priority,

    pub planned_start: DateTime<Utc>,

    pub planned_end: DateTime<Utc>,

    #[serde(default)]
    pub estimated_duration_hours: f64,

    #[serde(default)]
    pub review_period: ReviewPeriod,

    #[serde(default)]
    pub plot_id: Option<Uuid>,

    #[serde(default)]
    pub crop_id: Option<Uuid>,

    #[serde(default)]
    pub responsible_id: Option<Uuid>,

    #[serde(default)]
    pub created_by: Option<Uuid>,

    #[serde(default)]
    pub assigned_workers: Vec<Uuid>,

    #[serde(default)]
    pub goals: Vec<NewGoal>,

    #[serde(default)]
    pub adverse_weather: bool,
}

impl NewActivity {
    /// Minimal request; everything else takes its default.
    pub fn new(
        name: impl Into<String>,
        activity_type: ActivityType,
        planned_start: DateTime<Utc>,
        planned_end: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            activity_type,
            priority: Priority::default(),
            planned_start,
            planned_end,
            estimated_duration_hours: 0.0,
            review_period: ReviewPeriod::default(),
            plot_id: None,
            crop_id: None,
            responsible_id: None,
            created_by: None,
            assigned_workers: Vec::new(),
            goals: Vec::new(),
            adverse_weather: false,
        }
    }

    pub fn validate(&self) -> Result<(), PlanningError> {
        validate_name(&self.name)?;
        validate_window(self.planned_start, self.planned_end)?;
        validate_estimate(self.estimated_duration_hours)?;
        for goal in &self.goals {
            goal.validate()?;
        }
        Ok(())
    }
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<ActivityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_period: Option<ReviewPeriod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_workers: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adverse_weather: Option<bool>,
    /// Direct progress edit; subject to the same rules as set_progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<i32>,
    /// Explicit status edit. Only `cancelled` and `completed` are accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActivityState>,
}

impl ActivityPatch {
    /// Whether the patch changes nothing but `status`.
    pub fn is_status_only(&self) -> bool {
        *self
            == ActivityPatch {
                status: self.status,
                ..Default::default()
            }
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), PlanningError> {
    if name.trim().is_empty() {
        return Err(PlanningError::validation("name", "must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_window(
    planned_start: DateTime<Utc>,
    planned_end: DateTime<Utc>,
) -> Result<(), PlanningError> {
    if planned_end < planned_start {
        return Err(PlanningError::validation(
            "planned_end",
            "must not precede planned_start",
        ));
    }
    Ok(())
}

pub(crate) fn validate_estimate(hours: f64) -> Result<(), PlanningError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(PlanningError::validation(
            "estimated_duration_hours",
            "must be a non-negative number",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> NewActivity {
        let start = Utc::now();
        NewActivity::new(
            "Irrigate north field",
            ActivityType::Irrigation,
            start,
            start + Duration::days(4),
        )
    }

    #[test]
    fn new_activity_starts_pending_with_no_execution() {
        let activity = PlannedActivity::new(&request(), Utc::now()).unwrap();
        assert_eq!(activity.state, ActivityState::Pending);
        assert_eq!(activity.progress_percentage, 0);
        assert!(activity.actual_start.is_none());
        assert!(activity.actual_end.is_none());
        assert!(activity.alerts.is_empty());
        assert_eq!(activity.version, 0);
    }

    #[test]
    fn reversed_window_is_rejected() {
        let mut req = request();
        req.planned_end = req.planned_start - Duration::hours(1);
        let err = PlannedActivity::new(&req, Utc::now()).unwrap_err();
        assert!(matches!(err, PlanningError::Validation { ref field, .. } if field == "planned_end"));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut req = request();
        req.name = "   ".into();
        assert!(PlannedActivity::new(&req, Utc::now()).unwrap_err().is_validation());
    }

    #[test]
    fn initial_goals_are_validated() {
        let mut req = request();
        req.goals.push(NewGoal::new("water", 0.0, "m3"));
        let err = PlannedActivity::new(&req, Utc::now()).unwrap_err();
        assert!(matches!(err, PlanningError::Validation { ref field, .. } if field == "target_value"));
    }

    #[test]
    fn derive_follows_rule_precedence() {
        let now = Utc::now();
        let past = now - Duration::days(1);
        let future = now + Duration::days(1);

        assert_eq!(ActivityState::derive(true, 100, past, now), ActivityState::Cancelled);
        assert_eq!(ActivityState::derive(false, 100, past, now), ActivityState::Completed);
        assert_eq!(ActivityState::derive(false, 40, past, now), ActivityState::Late);
        assert_eq!(ActivityState::derive(false, 0, past, now), ActivityState::Late);
        assert_eq!(ActivityState::derive(false, 40, future, now), ActivityState::InProgress);
        assert_eq!(ActivityState::derive(false, 0, future, now), ActivityState::Pending);
    }

    #[test]
    fn planned_end_equal_to_now_is_not_late() {
        let now = Utc::now();
        assert_eq!(ActivityState::derive(false, 0, now, now), ActivityState::Pending);
    }

    #[test]
    fn elapsed_fraction_is_clamped() {
        let activity = PlannedActivity::new(&request(), Utc::now()).unwrap();
        let start = activity.planned_start;
        assert_eq!(activity.elapsed_fraction(start - Duration::days(1)), 0.0);
        assert!((activity.elapsed_fraction(start + Duration::days(1)) - 0.25).abs() < 1e-9);
        assert_eq!(activity.elapsed_fraction(start + Duration::days(10)), 1.0);
    }

    #[test]
    fn enum_names_parse_in_either_case() {
        assert_eq!("PEST_CONTROL".parse::<ActivityType>().unwrap(), ActivityType::PestControl);
        assert_eq!("in_progress".parse::<ActivityState>().unwrap(), ActivityState::InProgress);
        assert_eq!("URGENT".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("weeding".parse::<ActivityType>().is_err());
    }

    #[test]
    fn state_serializes_as_snake_case() {
        let json = serde_json::to_string(&ActivityState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn optional_execution_fields_omitted_from_json() {
        let activity = PlannedActivity::new(&request(), Utc::now()).unwrap();
        let json = serde_json::to_string_pretty(&activity).unwrap();
        assert!(!json.contains("actual_start"));
        let restored: PlannedActivity = serde_json::from_str(&json).unwrap();
        assert!(restored.actual_start.is_none());
        assert_eq!(restored, activity);
    }

    #[test]
    fn status_only_patch_detection() {
        let cancel = ActivityPatch {
            status: Some(ActivityState::Cancelled),
            ..Default::default()
        };
        assert!(cancel.is_status_only());
        assert!(ActivityPatch::default().is_status_only());

        let mixed = ActivityPatch {
            name: Some("Irrigate south field".into()),
            ..cancel
        };
        assert!(!mixed.is_status_only());
    }
}
