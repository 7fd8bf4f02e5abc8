// comparison.rs — Planned-versus-actual read model for reporting and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::{ActivityState, PlannedActivity};
use crate::deviation::Deviation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub estimated_duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActualExecution {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub progress_percentage: u8,
    pub state: ActivityState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalComparison {
    pub goal_id: Uuid,
    pub description: String,
    pub unit: String,
    pub target_value: f64,
    pub current_value: f64,
    pub fulfillment_percentage: u8,
    pub fulfilled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityComparison {
    pub activity_id: Uuid,
    pub name: String,
    pub planned: PlannedWindow,
    pub actual: ActualExecution,
    pub deviation: Deviation,
    pub goals: Vec<GoalComparison>,
}

impl ActivityComparison {
    /// Build from an activity whose derived fields are current.
    pub fn from_activity(activity: &PlannedActivity) -> Self {
        Self {
            activity_id: activity.id,
            name: activity.name.clone(),
            planned: PlannedWindow {
                start: activity.planned_start,
                end: activity.planned_end,
                estimated_duration_hours: activity.estimated_duration_hours,
            },
            actual: ActualExecution {
                start: activity.actual_start,
                end: activity.actual_end,
                duration_hours: activity.actual_duration_hours,
                progress_percentage: activity.progress_percentage,
                state: activity.state,
            },
            deviation: Deviation {
                deviation_days: activity.deviation_days,
                needs_attention: activity.needs_attention,
            },
            goals: activity
                .goals
                .iter()
                .map(|g| GoalComparison {
                    goal_id: g.id,
                    description: g.description.clone(),
                    unit: g.unit.clone(),
                    target_value: g.target_value,
                    current_value: g.current_value,
                    fulfillment_percentage: g.fulfillment_percentage,
                    fulfilled: g.fulfilled,
                })
                .collect(),
        }
    }
}
