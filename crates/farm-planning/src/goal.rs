// goal.rs — Quantifiable targets attached to an activity.
//
// A goal is owned by exactly one PlannedActivity and stored inside it. The
// tracker operations that look goals up by id (add/record/remove) live on
// ActivityService so they run under the owning activity's lock; this module
// holds the goal value type and the fulfillment arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlanningError;

/// A target such as "500 kg harvested".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub description: String,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
    /// `min(100, round(current / target * 100))`.
    pub fulfillment_percentage: u8,
    pub fulfilled: bool,
    /// When the target was first reached. Kept even if the value later
    /// drops below target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(
        description: impl Into<String>,
        target_value: f64,
        unit: impl Into<String>,
    ) -> Result<Self, PlanningError> {
        let description = description.into();
        validate_description(&description)?;
        validate_target(target_value)?;
        Ok(Self {
            id: Uuid::new_v4(),
            description,
            target_value,
            current_value: 0.0,
            unit: unit.into(),
            fulfillment_percentage: 0,
            fulfilled: false,
            fulfilled_at: None,
        })
    }

    /// Record the current measured value.
    ///
    /// Returns true when this call is the first time the target is reached.
    pub fn record(&mut self, current_value: f64, now: DateTime<Utc>) -> Result<bool, PlanningError> {
        if !current_value.is_finite() || current_value < 0.0 {
            return Err(PlanningError::validation(
                "current_value",
                "must be a non-negative number",
            ));
        }
        self.current_value = current_value;
        self.fulfillment_percentage = fulfillment_percentage(current_value, self.target_value);
        self.fulfilled = current_value >= self.target_value;

        let first_time = self.fulfilled && self.fulfilled_at.is_none();
        if first_time {
            self.fulfilled_at = Some(now);
        }
        Ok(first_time)
    }
}

/// `min(100, round(current / target * 100))`, 0 for a non-positive target.
pub fn fulfillment_percentage(current_value: f64, target_value: f64) -> u8 {
    if target_value <= 0.0 || current_value <= 0.0 {
        return 0;
    }
    let percent = (current_value / target_value * 100.0).round();
    percent.min(100.0) as u8
}

/// Goal as submitted with a new activity or via add_goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
    pub description: String,
    pub target_value: f64,
    #[serde(default)]
    pub unit: String,
}

impl NewGoal {
    pub fn new(description: impl Into<String>, target_value: f64, unit: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            target_value,
            unit: unit.into(),
        }
    }

    pub fn validate(&self) -> Result<(), PlanningError> {
        validate_description(&self.description)?;
        validate_target(self.target_value)
    }
}

fn validate_description(description: &str) -> Result<(), PlanningError> {
    if description.trim().is_empty() {
        return Err(PlanningError::validation("description", "must not be empty"));
    }
    Ok(())
}

fn validate_target(target_value: f64) -> Result<(), PlanningError> {
    if !target_value.is_finite() || target_value <= 0.0 {
        return Err(PlanningError::validation(
            "target_value",
            "must be greater than zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn goal(target: f64) -> Goal {
        Goal::new("harvest", target, "kg").unwrap()
    }

    #[test]
    fn reaching_the_target_exactly_fulfills() {
        let mut g = goal(100.0);
        assert!(g.record(100.0, Utc::now()).unwrap());
        assert_eq!(g.fulfillment_percentage, 100);
        assert!(g.fulfilled);
    }

    #[test]
    fn one_unit_below_target_is_not_fulfilled() {
        let mut g = goal(100.0);
        assert!(!g.record(99.0, Utc::now()).unwrap());
        assert_eq!(g.fulfillment_percentage, 99);
        assert!(!g.fulfilled);
        assert!(g.fulfilled_at.is_none());
    }

    #[test]
    fn percentage_is_rounded_and_capped() {
        assert_eq!(fulfillment_percentage(1.0, 3.0), 33);
        assert_eq!(fulfillment_percentage(2.0, 3.0), 67);
        assert_eq!(fulfillment_percentage(120.0, 100.0), 100);
        assert_eq!(fulfillment_percentage(0.0, 100.0), 0);
    }

    #[test]
    fn fulfillment_timestamp_is_set_once() {
        let t0 = Utc::now();
        let mut g = goal(100.0);
        g.record(120.0, t0).unwrap();
        assert_eq!(g.fulfilled_at, Some(t0));

        assert!(!g.record(150.0, t0 + Duration::days(1)).unwrap());
        assert_eq!(g.fulfilled_at, Some(t0));
    }

    #[test]
    fn regression_clears_fulfilled_but_keeps_timestamp() {
        let t0 = Utc::now();
        let mut g = goal(100.0);
        g.record(120.0, t0).unwrap();

        g.record(90.0, t0 + Duration::days(2)).unwrap();
        assert!(!g.fulfilled);
        assert_eq!(g.fulfillment_percentage, 90);
        assert_eq!(g.fulfilled_at, Some(t0));

        // Reaching it again does not move the original timestamp.
        assert!(!g.record(100.0, t0 + Duration::days(3)).unwrap());
        assert_eq!(g.fulfilled_at, Some(t0));
    }

    #[test]
    fn non_positive_target_is_rejected() {
        assert!(Goal::new("x", 0.0, "kg").unwrap_err().is_validation());
        assert!(Goal::new("x", -5.0, "kg").unwrap_err().is_validation());
    }

    #[test]
    fn negative_value_is_rejected_without_change() {
        let mut g = goal(10.0);
        g.record(4.0, Utc::now()).unwrap();
        assert!(g.record(-1.0, Utc::now()).is_err());
        assert_eq!(g.current_value, 4.0);
    }
}
