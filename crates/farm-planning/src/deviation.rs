// deviation.rs — Schedule deviation and the "needs attention" flag.
//
// deviation_days = days of (reference_end - planned_end), where
//   reference_end = actual_end            if the work has finished
//                 = now                   while Late or InProgress
//                 = planned_end           otherwise (pending, on schedule)
// Positive is late, negative is ahead, zero is on time. Any time past
// planned_end counts as a started day late; early finishes count whole days.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityState, PlannedActivity};
use crate::alerts::Severity;
use crate::config::AlertThresholds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deviation {
    pub deviation_days: i64,
    pub needs_attention: bool,
}

pub fn compute_deviation(
    activity: &PlannedActivity,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Deviation {
    let reference_end = match (activity.actual_end, activity.state) {
        (Some(end), _) => end,
        (None, ActivityState::Late | ActivityState::InProgress) => now,
        (None, _) => activity.planned_end,
    };
    let deviation_days = days_late(reference_end - activity.planned_end);

    let needs_attention = activity.state != ActivityState::Cancelled
        && (deviation_days > 0
            || activity
                .active_alerts()
                .any(|a| a.severity >= Severity::Error)
            || progress_lag(activity, now) > thresholds.attention_lag_points);

    Deviation {
        deviation_days,
        needs_attention,
    }
}

/// Whole days in `delta`, rounding a partial day past the deadline up.
fn days_late(delta: Duration) -> i64 {
    let days = delta.num_days();
    if delta > Duration::days(days) {
        days + 1
    } else {
        days
    }
}

/// Percentage points by which progress trails the elapsed share of the
/// planned window. Zero or negative when on pace; zero once finished.
pub fn progress_lag(activity: &PlannedActivity, now: DateTime<Utc>) -> f64 {
    if activity.state.is_terminal() {
        return 0.0;
    }
    activity.elapsed_fraction(now) * 100.0 - f64::from(activity.progress_percentage)
}
