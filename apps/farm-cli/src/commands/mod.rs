// mod.rs — Shared wiring for the farm subcommands.

pub mod activity;
pub mod goal;
pub mod labor;
pub mod stats;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use farm_planning::{
    ActivityService, EventDispatcher, FarmPaths, JournalSink, JsonFileActivityStore,
    PlanningConfig, ReferenceServices, StaticReferenceData,
};
use serde::Serialize;

/// Everything a subcommand needs, opened from the project's `.farm/` dir.
pub struct Context {
    pub paths: FarmPaths,
    pub service: Arc<ActivityService>,
    pub json: bool,
}

impl Context {
    pub fn open(project_root: &Path, json: bool) -> anyhow::Result<Self> {
        let paths = FarmPaths::for_project(project_root);

        let config = PlanningConfig::load_or_default(&paths.planning_config)
            .with_context(|| format!("loading {}", paths.planning_config.display()))?;
        let reference = StaticReferenceData::load_or_default(&paths.reference_data)
            .with_context(|| format!("loading {}", paths.reference_data.display()))?;
        let store = JsonFileActivityStore::new(&paths.activities_dir)?;

        let service = ActivityService::new(Arc::new(store))
            .with_config(config)
            .with_reference(ReferenceServices::from_single(reference))
            .with_dispatcher(journal(&paths));

        tracing::debug!(root = %paths.project_root.display(), "farm project opened");

        Ok(Self {
            paths,
            service: Arc::new(service),
            json,
        })
    }

    /// Print as pretty JSON when `--json` was given, otherwise run `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

/// A dispatcher that appends to the project's event journal.
pub fn journal(paths: &FarmPaths) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_sink(Box::new(JournalSink::new(&paths.events_log)));
    dispatcher
}

/// Accepts RFC 3339 (`2025-04-01T07:00:00Z`) or a bare date, read as
/// midnight UTC.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| format!("'{}' is neither RFC 3339 nor YYYY-MM-DD", s))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_both_time_forms() {
        let day = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_time("2025-04-01").unwrap(), day);
        assert_eq!(parse_time("2025-04-01T02:00:00+02:00").unwrap(), day);
        assert!(parse_time("April 1st").is_err());
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Cosecha de maíz temprano", 12), "Cosecha d...");
    }
}
