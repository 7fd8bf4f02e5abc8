// alerts.rs — Alert rule evaluation.
//
// `evaluate()` compares what the rule table says should be firing for an
// activity against the unresolved alerts it already carries, and returns the
// deltas needed to reconcile the two. It reads `deviation_days` from the
// activity, so callers refresh deviation first.
//
// Rules (all evaluated on every pass):
//
//   TIME_DEVIATION      deviation_days > 0, not finished
//                       WARNING ≤ 3 days, ERROR > 3, CRITICAL > 10
//   OVERDUE_ACTIVITY    state == Late                         ERROR
//   LOW_PERFORMANCE     progress > 75 and some goal < 50%     WARNING
//   RESOURCE_SHORTAGE   assigned workers < roster minimum     WARNING
//   ADVERSE_WEATHER     weather flag set                      INFO
//   DELAY               still pending past start + grace      WARNING
//   RESOURCE_DEVIATION  hours worked > estimate × tolerance   WARNING
//
// A cancelled activity fires nothing. When a rule holds at a different
// severity than the open alert, the open one is resolved and a new one
// raised, so there is never more than one unresolved alert per type.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::{ActivityState, PlannedActivity};
use crate::config::AlertThresholds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Delay,
    LowPerformance,
    OverdueActivity,
    TimeDeviation,
    ResourceDeviation,
    AdverseWeather,
    ResourceShortage,
}

impl AlertType {
    /// Evaluation order. Deltas come out in this order.
    pub const ALL: [AlertType; 7] = [
        AlertType::TimeDeviation,
        AlertType::OverdueActivity,
        AlertType::LowPerformance,
        AlertType::ResourceShortage,
        AlertType::AdverseWeather,
        AlertType::Delay,
        AlertType::ResourceDeviation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Delay => "delay",
            AlertType::LowPerformance => "low_performance",
            AlertType::OverdueActivity => "overdue_activity",
            AlertType::TimeDeviation => "time_deviation",
            AlertType::ResourceDeviation => "resource_deviation",
            AlertType::AdverseWeather => "adverse_weather",
            AlertType::ResourceShortage => "resource_shortage",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A derived warning about an activity's execution. Never deleted; resolved
/// alerts stay on the activity as history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            generated_at,
            read: false,
            resolved: false,
            resolved_at: None,
        }
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(now);
        }
    }
}

/// One change produced by `evaluate()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "delta", rename_all = "snake_case")]
pub enum AlertDelta {
    Raise {
        alert_type: AlertType,
        severity: Severity,
        title: String,
        message: String,
    },
    Resolve {
        alert_id: Uuid,
        alert_type: AlertType,
    },
}

/// Evaluation inputs that come from outside the activity record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertContext {
    /// Roster minimum headcount for the activity's type. `None` when unknown,
    /// in which case RESOURCE_SHORTAGE is left as it is.
    pub minimum_headcount: Option<usize>,
}

/// What a single rule concluded.
#[derive(Debug, Clone, PartialEq)]
enum Finding {
    Fires {
        severity: Severity,
        title: String,
        message: String,
    },
    Clear,
    Unknown,
}

impl Finding {
    fn fires(severity: Severity, title: &str, message: String) -> Self {
        Finding::Fires {
            severity,
            title: title.to_string(),
            message,
        }
    }

    fn when(condition: bool, fire: impl FnOnce() -> Finding) -> Self {
        if condition {
            fire()
        } else {
            Finding::Clear
        }
    }
}

/// Compute the alert deltas for the activity's current state.
///
/// Evaluating again after applying the returned deltas (with nothing else
/// changed) returns no deltas.
pub fn evaluate(
    activity: &PlannedActivity,
    context: &AlertContext,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Vec<AlertDelta> {
    let mut deltas = Vec::new();

    for alert_type in AlertType::ALL {
        let finding = if activity.state == ActivityState::Cancelled {
            Finding::Clear
        } else {
            check_rule(alert_type, activity, context, now, thresholds)
        };

        let mut open = activity
            .active_alerts()
            .filter(|a| a.alert_type == alert_type);
        let current = open.next();

        // Stray duplicates from an older record are always retired.
        for extra in open {
            deltas.push(AlertDelta::Resolve {
                alert_id: extra.id,
                alert_type,
            });
        }

        match (finding, current) {
            (
                Finding::Fires {
                    severity,
                    title,
                    message,
                },
                existing,
            ) => {
                if let Some(alert) = existing {
                    if alert.severity == severity {
                        continue;
                    }
                    deltas.push(AlertDelta::Resolve {
                        alert_id: alert.id,
                        alert_type,
                    });
                }
                deltas.push(AlertDelta::Raise {
                    alert_type,
                    severity,
                    title,
                    message,
                });
            }
            (Finding::Clear, Some(alert)) => deltas.push(AlertDelta::Resolve {
                alert_id: alert.id,
                alert_type,
            }),
            (Finding::Clear, None) | (Finding::Unknown, _) => {}
        }
    }

    deltas
}

fn check_rule(
    alert_type: AlertType,
    activity: &PlannedActivity,
    context: &AlertContext,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Finding {
    let finished = activity.state.is_terminal();
    let name = &activity.name;

    match alert_type {
        AlertType::TimeDeviation => {
            let days = activity.deviation_days;
            Finding::when(!finished && days > 0, || {
                let severity = if days > thresholds.time_deviation_critical_after_days {
                    Severity::Critical
                } else if days > thresholds.time_deviation_warning_max_days {
                    Severity::Error
                } else {
                    Severity::Warning
                };
                Finding::fires(
                    severity,
                    "Behind schedule",
                    format!("'{}' is {} day(s) behind its planned end", name, days),
                )
            })
        }
        AlertType::OverdueActivity => Finding::when(activity.state == ActivityState::Late, || {
            Finding::fires(
                Severity::Error,
                "Activity overdue",
                format!(
                    "'{}' passed its planned end on {} at {}% progress",
                    name,
                    activity.planned_end.format("%Y-%m-%d"),
                    activity.progress_percentage
                ),
            )
        }),
        AlertType::LowPerformance => {
            let lagging = activity
                .goals
                .iter()
                .filter(|g| g.fulfillment_percentage < thresholds.low_performance_goal_percent)
                .count();
            Finding::when(
                activity.progress_percentage > thresholds.low_performance_progress_percent
                    && lagging > 0,
                || {
                    Finding::fires(
                        Severity::Warning,
                        "Goals lagging progress",
                        format!(
                            "'{}' is {}% done but {} goal(s) are below {}% fulfillment",
                            name,
                            activity.progress_percentage,
                            lagging,
                            thresholds.low_performance_goal_percent
                        ),
                    )
                },
            )
        }
        AlertType::ResourceShortage => {
            if finished {
                return Finding::Clear;
            }
            match context.minimum_headcount {
                None => Finding::Unknown,
                Some(minimum) => {
                    let assigned = activity.assigned_workers.len();
                    Finding::when(assigned < minimum, || {
                        Finding::fires(
                            Severity::Warning,
                            "Short-handed",
                            format!(
                                "'{}' has {} worker(s) assigned; {} activities need at least {}",
                                name, assigned, activity.activity_type, minimum
                            ),
                        )
                    })
                }
            }
        }
        AlertType::AdverseWeather => Finding::when(!finished && activity.adverse_weather, || {
            Finding::fires(
                Severity::Info,
                "Adverse weather",
                format!("Weather conditions may affect '{}'", name),
            )
        }),
        AlertType::Delay => {
            let grace_end = activity.planned_start + Duration::days(thresholds.delay_grace_days);
            Finding::when(
                activity.state == ActivityState::Pending
                    && activity.progress_percentage == 0
                    && now > grace_end,
                || {
                    Finding::fires(
                        Severity::Warning,
                        "Not started",
                        format!(
                            "'{}' was planned to start on {} and has not begun",
                            name,
                            activity.planned_start.format("%Y-%m-%d")
                        ),
                    )
                },
            )
        }
        AlertType::ResourceDeviation => {
            let estimate = activity.estimated_duration_hours;
            let budget = estimate * (1.0 + thresholds.resource_deviation_tolerance);
            match activity.worked_hours(now) {
                Some(worked) if estimate > 0.0 && worked > budget => Finding::fires(
                    Severity::Warning,
                    "Over estimated effort",
                    format!(
                        "'{}' has taken {:.1} h against an estimate of {:.1} h",
                        name, worked, estimate
                    ),
                ),
                _ => Finding::Clear,
            }
        }
    }
}

/// Apply deltas to the activity. Returns the alerts that were raised or
/// resolved, in delta order.
pub fn apply_deltas(
    activity: &mut PlannedActivity,
    deltas: &[AlertDelta],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut touched = Vec::with_capacity(deltas.len());
    for delta in deltas {
        match delta {
            AlertDelta::Raise {
                alert_type,
                severity,
                title,
                message,
            } => {
                let alert = Alert::new(*alert_type, *severity, title, message, now);
                touched.push(alert.clone());
                activity.alerts.push(alert);
            }
            AlertDelta::Resolve { alert_id, .. } => {
                if let Some(alert) = activity
                    .alerts
                    .iter_mut()
                    .find(|a| a.id == *alert_id && !a.resolved)
                {
                    alert.resolve(now);
                    touched.push(alert.clone());
                }
            }
        }
    }
    touched
}
