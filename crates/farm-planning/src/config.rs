//! Planning engine configuration.
//!
//! Loaded from `.farm/planning.toml`. Every field has a default, so a missing
//! file or a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;

/// Top-level configuration from .farm/planning.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanningConfig {
    #[serde(default)]
    pub alerts: AlertThresholds,

    #[serde(default)]
    pub labor: LaborSyncConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// Thresholds used by the deviation calculator and the alert rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertThresholds {
    /// TIME_DEVIATION stays WARNING up to and including this many days late.
    #[serde(default = "default_warning_max_days")]
    pub time_deviation_warning_max_days: i64,

    /// TIME_DEVIATION becomes CRITICAL beyond this many days late.
    #[serde(default = "default_critical_after_days")]
    pub time_deviation_critical_after_days: i64,

    /// LOW_PERFORMANCE fires for goals below this fulfillment percentage...
    #[serde(default = "default_low_goal_percent")]
    pub low_performance_goal_percent: u8,

    /// ...once progress is above this percentage.
    #[serde(default = "default_low_progress_percent")]
    pub low_performance_progress_percent: u8,

    /// Progress may trail the elapsed share of the planned window by this
    /// many points before the activity needs attention.
    #[serde(default = "default_attention_lag_points")]
    pub attention_lag_points: f64,

    /// Days a PENDING activity may sit past its planned start before DELAY.
    #[serde(default = "default_delay_grace_days")]
    pub delay_grace_days: i64,

    /// Hours worked may exceed the estimate by this fraction before
    /// RESOURCE_DEVIATION.
    #[serde(default = "default_resource_tolerance")]
    pub resource_deviation_tolerance: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            time_deviation_warning_max_days: default_warning_max_days(),
            time_deviation_critical_after_days: default_critical_after_days(),
            low_performance_goal_percent: default_low_goal_percent(),
            low_performance_progress_percent: default_low_progress_percent(),
            attention_lag_points: default_attention_lag_points(),
            delay_grace_days: default_delay_grace_days(),
            resource_deviation_tolerance: default_resource_tolerance(),
        }
    }
}

/// Progress steps applied by the labor bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaborSyncConfig {
    #[serde(default = "default_create_step")]
    pub create_step: u8,

    #[serde(default = "default_update_step")]
    pub update_step: u8,

    /// Attempts after a version conflict before the nudge is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LaborSyncConfig {
    fn default() -> Self {
        Self {
            create_step: default_create_step(),
            update_step: default_update_step(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsConfig {
    /// Efficiency points lost per day of deviation.
    #[serde(default = "default_efficiency_penalty")]
    pub efficiency_penalty_per_day: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            efficiency_penalty_per_day: default_efficiency_penalty(),
        }
    }
}

// Serde default functions
fn default_warning_max_days() -> i64 {
    3
}

fn default_critical_after_days() -> i64 {
    10
}

fn default_low_goal_percent() -> u8 {
    50
}

fn default_low_progress_percent() -> u8 {
    75
}

fn default_attention_lag_points() -> f64 {
    20.0
}

fn default_delay_grace_days() -> i64 {
    1
}

fn default_resource_tolerance() -> f64 {
    0.25
}

fn default_create_step() -> u8 {
    10
}

fn default_update_step() -> u8 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_efficiency_penalty() -> f64 {
    5.0
}

impl PlanningConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, PlanningError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanningError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content).map_err(|reason| PlanningError::ConfigError {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Try to load config, returning defaults if the file doesn't exist.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, PlanningError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn parse(content: &str) -> Result<Self, String> {
        let config: PlanningConfig = toml::from_str(content).map_err(|e| e.to_string())?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), String> {
        if self.alerts.time_deviation_critical_after_days
            < self.alerts.time_deviation_warning_max_days
        {
            return Err(
                "alerts.time_deviation_critical_after_days must be >= time_deviation_warning_max_days"
                    .to_string(),
            );
        }
        if self.labor.create_step > 100 || self.labor.update_step > 100 {
            return Err("labor steps must be between 0 and 100".to_string());
        }
        if self.stats.efficiency_penalty_per_day < 0.0 {
            return Err("stats.efficiency_penalty_per_day must not be negative".to_string());
        }
        Ok(())
    }
}

/// On-disk layout for a farm project, rooted at `<project>/.farm/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmPaths {
    pub project_root: PathBuf,

    /// One JSON file per activity.
    pub activities_dir: PathBuf,

    /// Append-only JSONL journal of planning events.
    pub events_log: PathBuf,

    pub planning_config: PathBuf,

    /// Plots, crops and roster used for name resolution.
    pub reference_data: PathBuf,
}

impl FarmPaths {
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let farm_dir = root.join(".farm");
        Self {
            project_root: root,
            activities_dir: farm_dir.join("activities"),
            events_log: farm_dir.join("events.jsonl"),
            planning_config: farm_dir.join("planning.toml"),
            reference_data: farm_dir.join("reference.toml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_constants() {
        let config = PlanningConfig::default();
        assert_eq!(config.labor.create_step, 10);
        assert_eq!(config.labor.update_step, 5);
        assert_eq!(config.alerts.time_deviation_warning_max_days, 3);
        assert_eq!(config.alerts.time_deviation_critical_after_days, 10);
        assert_eq!(config.alerts.attention_lag_points, 20.0);
        assert_eq!(config.stats.efficiency_penalty_per_day, 5.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("planning.toml");
        std::fs::write(&path, "[labor]\ncreate_step = 20\n").unwrap();

        let config = PlanningConfig::load(&path).unwrap();
        assert_eq!(config.labor.create_step, 20);
        assert_eq!(config.labor.update_step, 5);
        assert_eq!(config.alerts, AlertThresholds::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = PlanningConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, PlanningConfig::default());
    }

    #[test]
    fn inconsistent_thresholds_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("planning.toml");
        std::fs::write(
            &path,
            "[alerts]\ntime_deviation_warning_max_days = 5\ntime_deviation_critical_after_days = 2\n",
        )
        .unwrap();

        let err = PlanningConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, PlanningError::ConfigError { .. }));
    }

    #[test]
    fn farm_paths_live_under_dot_farm() {
        let paths = FarmPaths::for_project("/srv/farm");
        assert_eq!(
            paths.activities_dir,
            PathBuf::from("/srv/farm/.farm/activities")
        );
        assert_eq!(paths.events_log, PathBuf::from("/srv/farm/.farm/events.jsonl"));
    }
}
