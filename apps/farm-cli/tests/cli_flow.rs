// cli_flow.rs — Drives the `farm` binary against a temporary project.
//
// Flow:
//   1. farm activity create → JSON record in .farm/activities/
//   2. farm goal add / goal record
//   3. farm labor record (create, then update) → progress nudged
//   4. farm activity progress 100 → completed
//   5. farm stats → one completed activity
//   6. farm activity history → the journalled changes
//   7. farm activity delete

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn farm(project: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_farm"))
        .arg("--project-root")
        .arg(project)
        .arg("--json")
        .args(args)
        .output()
        .unwrap()
}

fn farm_json(project: &Path, args: &[&str]) -> Value {
    let output = farm(project, args);
    assert!(
        output.status.success(),
        "farm {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn plan_track_and_report() {
    let project = TempDir::new().unwrap();
    let root = project.path();

    let created = farm_json(
        root,
        &[
            "activity",
            "create",
            "Harvest maize, plot 4",
            "--type",
            "harvest",
            "--start",
            "2020-01-01",
            "--end",
            "2999-01-01",
            "--hours",
            "40",
        ],
    );
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["state"], "pending");
    assert!(root
        .join(".farm/activities")
        .join(format!("{}.json", id))
        .exists());

    let goal = farm_json(
        root,
        &["goal", "add", &id, "maize harvested", "--target", "500", "--unit", "kg"],
    );
    let goal_id = goal["id"].as_str().unwrap().to_string();
    let goal = farm_json(root, &["goal", "record", &goal_id, "250"]);
    assert_eq!(goal["fulfillment_percentage"], 50);

    let synced = farm_json(root, &["labor", "record", &id]);
    assert_eq!(synced["outcome"], "applied");
    assert_eq!(synced["progress"], 10);
    let synced = farm_json(root, &["labor", "record", &id, "--update"]);
    assert_eq!(synced["progress"], 15);

    let done = farm_json(root, &["activity", "progress", &id, "100"]);
    assert_eq!(done["state"], "completed");

    let stats = farm_json(root, &["stats"]);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_state"]["completed"], 1);
    assert_eq!(stats["completion_rate"], 1.0);

    // Every committed change was journalled.
    let journal = std::fs::read_to_string(root.join(".farm/events.jsonl")).unwrap();
    assert!(journal.contains("\"event_type\":\"activity_created\""));
    assert!(!journal.contains("\"event_type\":\"goal_fulfilled\""));

    let history = farm_json(root, &["activity", "history", &id]);
    let kinds: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.first(), Some(&"activity_created"));
    assert!(kinds.contains(&"activity_state_changed"));

    farm_json(root, &["activity", "delete", &id]);
    let listed = farm_json(root, &["activity", "list"]);
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[test]
fn bad_input_fails_without_writing() {
    let project = TempDir::new().unwrap();
    let root = project.path();

    let output = farm(
        root,
        &[
            "activity", "create", "Backwards", "--type", "sowing", "--start", "2025-05-10",
            "--end", "2025-05-01",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("planned_end"));

    let listed = farm_json(root, &["activity", "list"]);
    assert!(listed.as_array().unwrap().is_empty());
}

#[test]
fn labor_sync_for_unknown_activity_still_succeeds() {
    let project = TempDir::new().unwrap();
    let synced = farm_json(
        project.path(),
        &["labor", "record", "6f1c7a1e-0000-4000-8000-000000000001"],
    );
    assert_eq!(synced["outcome"], "skipped");
}
