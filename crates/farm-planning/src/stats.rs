// stats.rs — Fleet-wide summary figures, recomputed on demand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityState, PlannedActivity};
use crate::alerts::Severity;
use crate::config::StatsConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub total: usize,
    /// Every state appears, with zero when no activity is in it.
    pub by_state: BTreeMap<ActivityState, usize>,
    /// Activities with at least one unresolved ERROR or CRITICAL alert.
    pub with_serious_alerts: usize,
    pub needs_attention: usize,
    /// completed / total, in 0.0..=1.0. Zero for an empty set.
    pub completion_rate: f64,
    /// Mean per-activity schedule score in 0..=100. Zero for an empty set.
    pub efficiency: f64,
}

impl Stats {
    pub fn count(&self, state: ActivityState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Per-activity schedule score: 100 minus `k` points per day late, kept in
/// 0..=100. Finishing early does not score above 100.
pub fn efficiency_score(deviation_days: i64, config: &StatsConfig) -> f64 {
    (100.0 - deviation_days as f64 * config.efficiency_penalty_per_day).clamp(0.0, 100.0)
}

pub fn compute_statistics(activities: &[PlannedActivity], config: &StatsConfig) -> Stats {
    let mut by_state: BTreeMap<ActivityState, usize> =
        ActivityState::ALL.iter().map(|s| (*s, 0)).collect();
    let mut with_serious_alerts = 0;
    let mut needs_attention = 0;
    let mut score_sum = 0.0;

    for activity in activities {
        *by_state.entry(activity.state).or_insert(0) += 1;
        if activity
            .active_alerts()
            .any(|a| a.severity >= Severity::Error)
        {
            with_serious_alerts += 1;
        }
        if activity.needs_attention {
            needs_attention += 1;
        }
        score_sum += efficiency_score(activity.deviation_days, config);
    }

    let total = activities.len();
    let (completion_rate, efficiency) = if total == 0 {
        (0.0, 0.0)
    } else {
        let completed = by_state.get(&ActivityState::Completed).copied().unwrap_or(0);
        (completed as f64 / total as f64, score_sum / total as f64)
    };

    Stats {
        total,
        by_state,
        with_serious_alerts,
        needs_attention,
        completion_rate,
        efficiency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityType, NewActivity};
    use crate::alerts::{Alert, AlertType};
    use chrono::{Duration, Utc};

    fn activity(state: ActivityState, deviation_days: i64) -> PlannedActivity {
        let now = Utc::now();
        let req = NewActivity::new("Irrigate", ActivityType::Irrigation, now, now + Duration::days(1));
        let mut a = PlannedActivity::new(&req, now).unwrap();
        a.state = state;
        a.deviation_days = deviation_days;
        a
    }

    #[test]
    fn empty_set_has_zero_rates() {
        let stats = compute_statistics(&[], &StatsConfig::default());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.efficiency, 0.0);
        assert_eq!(stats.by_state.len(), ActivityState::ALL.len());
    }

    #[test]
    fn counts_rates_and_efficiency() {
        let mut late = activity(ActivityState::Late, 4);
        late.alerts.push(Alert::new(
            AlertType::OverdueActivity,
            Severity::Error,
            "Activity overdue",
            "late",
            Utc::now(),
        ));
        late.needs_attention = true;

        let set = vec![
            activity(ActivityState::Completed, -2),
            activity(ActivityState::Completed, 0),
            late,
            activity(ActivityState::Pending, 0),
        ];
        let stats = compute_statistics(&set, &StatsConfig::default());

        assert_eq!(stats.total, 4);
        assert_eq!(stats.count(ActivityState::Completed), 2);
        assert_eq!(stats.count(ActivityState::Late), 1);
        assert_eq!(stats.count(ActivityState::Cancelled), 0);
        assert_eq!(stats.with_serious_alerts, 1);
        assert_eq!(stats.needs_attention, 1);
        assert_eq!(stats.completion_rate, 0.5);
        // (100 + 100 + 80 + 100) / 4
        assert_eq!(stats.efficiency, 95.0);
    }

    #[test]
    fn resolved_alerts_are_not_serious() {
        let mut a = activity(ActivityState::InProgress, 0);
        let mut alert = Alert::new(AlertType::TimeDeviation, Severity::Critical, "t", "m", Utc::now());
        alert.resolve(Utc::now());
        a.alerts.push(alert);
        assert_eq!(compute_statistics(&[a], &StatsConfig::default()).with_serious_alerts, 0);
    }

    #[test]
    fn score_is_floored_at_zero() {
        let config = StatsConfig::default();
        assert_eq!(efficiency_score(30, &config), 0.0);
        assert_eq!(efficiency_score(-5, &config), 100.0);
    }
}
