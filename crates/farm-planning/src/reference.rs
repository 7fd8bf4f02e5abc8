// reference.rs — Read-only reference data owned by other services.
//
// The planning engine never writes plots, crops or workers. It asks these
// directories for display names (cached on the activity) and for the roster's
// minimum headcount per activity type (fed to the alert rules). Lookups that
// fail degrade to blank names; they never fail the planning operation.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::{ActivityType, EntityRef};
use crate::error::PlanningError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotInfo {
    pub name: String,
    #[serde(default)]
    pub area_hectares: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropInfo {
    pub name: String,
    #[serde(default)]
    pub crop_type: String,
}

pub trait PlotDirectory: Send + Sync {
    fn plot(&self, plot_id: Uuid) -> Result<Option<PlotInfo>, PlanningError>;
}

pub trait CropDirectory: Send + Sync {
    fn crop(&self, crop_id: Uuid) -> Result<Option<CropInfo>, PlanningError>;
}

pub trait WorkerRoster: Send + Sync {
    fn worker_name(&self, worker_id: Uuid) -> Result<Option<String>, PlanningError>;

    /// Minimum number of assigned workers for this kind of activity, if the
    /// roster defines one.
    fn minimum_headcount(&self, activity_type: ActivityType) -> Result<Option<usize>, PlanningError>;
}

/// Reference data held in memory, typically loaded from
/// `.farm/reference.toml`:
///
/// ```toml
/// [plots.6f1c...]
/// name = "North field"
/// area_hectares = 4.5
///
/// [workers]
/// "0b6e..." = "Ana"
///
/// [minimum_headcount]
/// harvest = 4
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticReferenceData {
    #[serde(default)]
    pub plots: HashMap<Uuid, PlotInfo>,
    #[serde(default)]
    pub crops: HashMap<Uuid, CropInfo>,
    #[serde(default)]
    pub workers: HashMap<Uuid, String>,
    /// Keyed by activity type name (`harvest`, `pest_control`, ...).
    #[serde(default)]
    pub minimum_headcount: HashMap<String, usize>,
}

impl StaticReferenceData {
    pub fn load(path: &Path) -> Result<Self, PlanningError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanningError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| PlanningError::ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Empty data when the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, PlanningError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

impl PlotDirectory for StaticReferenceData {
    fn plot(&self, plot_id: Uuid) -> Result<Option<PlotInfo>, PlanningError> {
        Ok(self.plots.get(&plot_id).cloned())
    }
}

impl CropDirectory for StaticReferenceData {
    fn crop(&self, crop_id: Uuid) -> Result<Option<CropInfo>, PlanningError> {
        Ok(self.crops.get(&crop_id).cloned())
    }
}

impl WorkerRoster for StaticReferenceData {
    fn worker_name(&self, worker_id: Uuid) -> Result<Option<String>, PlanningError> {
        Ok(self.workers.get(&worker_id).cloned())
    }

    fn minimum_headcount(&self, activity_type: ActivityType) -> Result<Option<usize>, PlanningError> {
        Ok(self
            .minimum_headcount
            .iter()
            .find(|(key, _)| key.parse::<ActivityType>().ok() == Some(activity_type))
            .map(|(_, minimum)| *minimum))
    }
}

/// The three collaborators the engine reads from.
#[derive(Clone)]
pub struct ReferenceServices {
    pub plots: std::sync::Arc<dyn PlotDirectory>,
    pub crops: std::sync::Arc<dyn CropDirectory>,
    pub roster: std::sync::Arc<dyn WorkerRoster>,
}

impl ReferenceServices {
    /// Use one value for all three roles.
    pub fn from_single<T>(data: T) -> Self
    where
        T: PlotDirectory + CropDirectory + WorkerRoster + 'static,
    {
        let shared = std::sync::Arc::new(data);
        Self {
            plots: shared.clone(),
            crops: shared.clone(),
            roster: shared,
        }
    }

    pub fn plot_ref(&self, plot_id: Uuid) -> EntityRef {
        let name = degrade("plot directory", plot_id, self.plots.plot(plot_id)).map(|p| p.name);
        EntityRef::new(plot_id, name.unwrap_or_default())
    }

    pub fn crop_ref(&self, crop_id: Uuid) -> EntityRef {
        let name = degrade("crop directory", crop_id, self.crops.crop(crop_id)).map(|c| c.name);
        EntityRef::new(crop_id, name.unwrap_or_default())
    }

    pub fn worker_ref(&self, worker_id: Uuid) -> EntityRef {
        let name = degrade("worker roster", worker_id, self.roster.worker_name(worker_id));
        EntityRef::new(worker_id, name.unwrap_or_default())
    }

    /// `None` when the roster has no minimum or cannot be reached.
    pub fn minimum_headcount(&self, activity_type: ActivityType) -> Option<usize> {
        match self.roster.minimum_headcount(activity_type) {
            Ok(minimum) => minimum,
            Err(e) => {
                tracing::warn!(%activity_type, "roster headcount lookup failed: {}", e);
                None
            }
        }
    }
}

impl Default for ReferenceServices {
    fn default() -> Self {
        Self::from_single(StaticReferenceData::default())
    }
}

fn degrade<T>(service: &str, id: Uuid, result: Result<Option<T>, PlanningError>) -> Option<T> {
    match result {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            tracing::debug!(%id, "{} has no entry", service);
            None
        }
        Err(e) => {
            tracing::warn!(%id, "{} lookup failed, leaving name blank: {}", service, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct DownRoster;

    impl PlotDirectory for DownRoster {
        fn plot(&self, _: Uuid) -> Result<Option<PlotInfo>, PlanningError> {
            Err(PlanningError::unavailable("plots", "connection refused"))
        }
    }

    impl CropDirectory for DownRoster {
        fn crop(&self, _: Uuid) -> Result<Option<CropInfo>, PlanningError> {
            Err(PlanningError::unavailable("crops", "timeout"))
        }
    }

    impl WorkerRoster for DownRoster {
        fn worker_name(&self, _: Uuid) -> Result<Option<String>, PlanningError> {
            Err(PlanningError::unavailable("roster", "timeout"))
        }

        fn minimum_headcount(&self, _: ActivityType) -> Result<Option<usize>, PlanningError> {
            Err(PlanningError::unavailable("roster", "timeout"))
        }
    }

    #[test]
    fn unavailable_services_give_blank_names() {
        let refs = ReferenceServices::from_single(DownRoster);
        let id = Uuid::new_v4();
        assert_eq!(refs.plot_ref(id), EntityRef::unnamed(id));
        assert_eq!(refs.worker_ref(id).name, "");
        assert_eq!(refs.minimum_headcount(ActivityType::Harvest), None);
    }

    #[test]
    fn static_data_loads_from_toml() {
        let plot = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let dir = tempdir().unwrap();
        let path = dir.path().join("reference.toml");
        std::fs::write(
            &path,
            format!(
                "[plots.{plot}]\nname = \"North field\"\narea_hectares = 4.5\n\n\
                 [workers]\n\"{worker}\" = \"Ana\"\n\n\
                 [minimum_headcount]\nharvest = 4\n"
            ),
        )
        .unwrap();

        let data = StaticReferenceData::load(&path).unwrap();
        let refs = ReferenceServices::from_single(data);
        assert_eq!(refs.plot_ref(plot).name, "North field");
        assert_eq!(refs.worker_ref(worker).name, "Ana");
        assert_eq!(refs.minimum_headcount(ActivityType::Harvest), Some(4));
        assert_eq!(refs.minimum_headcount(ActivityType::Sowing), None);
    }

    #[test]
    fn missing_reference_file_is_empty() {
        let dir = tempdir().unwrap();
        let data = StaticReferenceData::load_or_default(&dir.path().join("none.toml")).unwrap();
        assert!(data.plots.is_empty());
    }
}
