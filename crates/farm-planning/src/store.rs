// store.rs — ActivityRepository trait and its two implementations.
//
// The engine persists nothing itself; it is handed an ActivityRepository.
// Goals and alerts are embedded in the activity record, so saving or
// deleting an activity saves or deletes them too.
//
// Every save carries the version the caller loaded. The store rejects the
// write with ConcurrentModification if the stored version has moved on, so
// two writers can never silently clobber each other's changes.
//
// - InMemoryActivityStore: a locked HashMap, for tests and embedding.
// - JsonFileActivityStore: one JSON file per activity,
//   `<store_dir>/<activity_id>.json`, easy to inspect by hand.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use crate::activity::PlannedActivity;
use crate::error::PlanningError;

pub trait ActivityRepository: Send + Sync {
    fn get(&self, activity_id: Uuid) -> Result<Option<PlannedActivity>, PlanningError>;

    /// All activities, ordered by planned start.
    fn list(&self) -> Result<Vec<PlannedActivity>, PlanningError>;

    /// Insert (`expected_version == None`) or replace a stored record whose
    /// version is still `expected_version`.
    fn save(
        &self,
        activity: &PlannedActivity,
        expected_version: Option<u64>,
    ) -> Result<(), PlanningError>;

    /// Remove an activity with its goals and alerts. Returns false if there
    /// was nothing to delete.
    fn delete(&self, activity_id: Uuid) -> Result<bool, PlanningError>;

    /// The activity owning the given goal.
    fn find_by_goal(&self, goal_id: Uuid) -> Result<Option<PlannedActivity>, PlanningError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|a| a.goals.iter().any(|g| g.id == goal_id)))
    }
}

/// Compare the version a writer loaded with what is stored now.
fn check_version(
    activity_id: Uuid,
    expected: Option<u64>,
    stored: Option<u64>,
) -> Result<(), PlanningError> {
    match (expected, stored) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(PlanningError::ActivityNotFound(activity_id)),
        (None, Some(found)) => Err(PlanningError::ConcurrentModification {
            activity_id,
            expected: 0,
            found,
        }),
        (Some(expected), Some(found)) if expected == found => Ok(()),
        (Some(expected), Some(found)) => Err(PlanningError::ConcurrentModification {
            activity_id,
            expected,
            found,
        }),
    }
}

fn sort_for_listing(activities: &mut [PlannedActivity]) {
    activities.sort_by(|a, b| {
        a.planned_start
            .cmp(&b.planned_start)
            .then(a.created_at.cmp(&b.created_at))
    });
}

#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    records: RwLock<HashMap<Uuid, PlannedActivity>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityRepository for InMemoryActivityStore {
    fn get(&self, activity_id: Uuid) -> Result<Option<PlannedActivity>, PlanningError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&activity_id).cloned())
    }

    fn list(&self) -> Result<Vec<PlannedActivity>, PlanningError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<PlannedActivity> = records.values().cloned().collect();
        sort_for_listing(&mut all);
        Ok(all)
    }

    fn save(
        &self,
        activity: &PlannedActivity,
        expected_version: Option<u64>,
    ) -> Result<(), PlanningError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let stored = records.get(&activity.id).map(|a| a.version);
        check_version(activity.id, expected_version, stored)?;
        records.insert(activity.id, activity.clone());
        Ok(())
    }

    fn delete(&self, activity_id: Uuid) -> Result<bool, PlanningError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(&activity_id).is_some())
    }
}

/// File-backed repository: one pretty-printed JSON document per activity.
pub struct JsonFileActivityStore {
    store_dir: PathBuf,
    // Serializes the version check and the write within this process.
    write_lock: Mutex<()>,
}

impl JsonFileActivityStore {
    /// Create a store backed by the given directory, creating it if needed.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, PlanningError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| PlanningError::IoError {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            store_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn activity_file(&self, activity_id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{}.json", activity_id))
    }

    fn read_file(path: &Path) -> Result<PlannedActivity, PlanningError> {
        let json = fs::read_to_string(path).map_err(|source| PlanningError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl ActivityRepository for JsonFileActivityStore {
    fn get(&self, activity_id: Uuid) -> Result<Option<PlannedActivity>, PlanningError> {
        let path = self.activity_file(activity_id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_file(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<PlannedActivity>, PlanningError> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| PlanningError::IoError {
            path: self.store_dir.display().to_string(),
            source,
        })?;

        let mut activities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PlanningError::IoError {
                path: self.store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read_file(&path) {
                    Ok(activity) => activities.push(activity),
                    Err(e) => tracing::warn!("skipping unreadable activity file {}: {}", path.display(), e),
                }
            }
        }

        sort_for_listing(&mut activities);
        Ok(activities)
    }

    fn save(
        &self,
        activity: &PlannedActivity,
        expected_version: Option<u64>,
    ) -> Result<(), PlanningError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let stored = self.get(activity.id)?.map(|a| a.version);
        check_version(activity.id, expected_version, stored)?;

        let path = self.activity_file(activity.id);
        let json = serde_json::to_string_pretty(activity)?;
        fs::write(&path, json).map_err(|source| PlanningError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    fn delete(&self, activity_id: Uuid) -> Result<bool, PlanningError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.activity_file(activity_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| PlanningError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(true)
    }
}
