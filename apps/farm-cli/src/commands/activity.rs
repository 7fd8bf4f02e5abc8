// activity.rs — Activity subcommands: create, list, show, update, progress,
// cancel, compare, history, ack, delete.

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use farm_planning::{
    ActivityComparison, ActivityPatch, ActivityState, ActivityType, JournalSink, NewActivity,
    PlannedActivity, PlanningEvent, Priority, ReviewPeriod,
};
use uuid::Uuid;

use super::{parse_time, truncate, Context};

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Plan a new activity.
    Create {
        /// Short name (e.g., "Harvest maize, plot 4").
        name: String,
        /// Kind of work (sowing, irrigation, harvest, pest_control, ...).
        #[arg(long = "type")]
        activity_type: ActivityType,
        /// Planned start (RFC 3339 or YYYY-MM-DD).
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,
        /// Planned end (RFC 3339 or YYYY-MM-DD).
        #[arg(long, value_parser = parse_time)]
        end: DateTime<Utc>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Estimated effort in hours.
        #[arg(long, default_value_t = 0.0)]
        hours: f64,
        #[arg(long, default_value = "week")]
        review: ReviewPeriod,
        #[arg(long)]
        plot: Option<Uuid>,
        #[arg(long)]
        crop: Option<Uuid>,
        #[arg(long)]
        responsible: Option<Uuid>,
        /// Assigned worker id; repeat for several.
        #[arg(long = "worker")]
        workers: Vec<Uuid>,
    },
    /// List activities, optionally only those in one state.
    List {
        /// pending, in_progress, completed, late or cancelled.
        #[arg(long)]
        state: Option<ActivityState>,
    },
    /// Show one activity with its goals and alerts.
    Show { id: Uuid },
    /// Change planned fields.
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        hours: Option<f64>,
        /// Flag or clear a weather warning for the activity's plot.
        #[arg(long)]
        adverse_weather: Option<bool>,
        /// Replace the assigned workers; repeat for several.
        #[arg(long = "worker")]
        workers: Option<Vec<Uuid>>,
    },
    /// Set progress (0-100). Progress never goes down.
    Progress { id: Uuid, percent: i32 },
    /// Cancel an activity. A cancelled activity can no longer change.
    Cancel { id: Uuid },
    /// Planned versus actual, for reporting.
    Compare { id: Uuid },
    /// Journalled changes to one activity, oldest first.
    History { id: Uuid },
    /// Mark an alert as read.
    Ack { id: Uuid, alert_id: Uuid },
    /// Delete an activity with its goals and alerts.
    Delete { id: Uuid },
}

pub fn execute(cmd: &ActivityCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        ActivityCommands::Create {
            name,
            activity_type,
            start,
            end,
            description,
            priority,
            hours,
            review,
            plot,
            crop,
            responsible,
            workers,
        } => {
            let mut request = NewActivity::new(name.as_str(), *activity_type, *start, *end);
            request.description = description.clone();
            request.priority = *priority;
            request.estimated_duration_hours = *hours;
            request.review_period = *review;
            request.plot_id = *plot;
            request.crop_id = *crop;
            request.responsible_id = *responsible;
            request.assigned_workers = workers.clone();

            let activity = ctx.service.create_activity(request)?;
            ctx.emit(&activity, |a| {
                println!("Activity planned: {}", a.id);
                print_summary(a);
            })
        }
        ActivityCommands::List { state } => {
            let activities = ctx.service.list_activities(*state)?;
            ctx.emit(&activities, |list| print_table(list))
        }
        ActivityCommands::Show { id } => {
            let activity = ctx
                .service
                .get_activity(*id)
                .with_context(|| format!("activity {}", id))?;
            ctx.emit(&activity, print_detail)
        }
        ActivityCommands::Update {
            id,
            name,
            start,
            end,
            priority,
            hours,
            adverse_weather,
            workers,
        } => {
            let patch = ActivityPatch {
                name: name.clone(),
                planned_start: *start,
                planned_end: *end,
                priority: *priority,
                estimated_duration_hours: *hours,
                adverse_weather: *adverse_weather,
                assigned_workers: workers.clone(),
                ..Default::default()
            };
            let activity = ctx.service.update_activity(*id, patch)?;
            ctx.emit(&activity, print_summary)
        }
        ActivityCommands::Progress { id, percent } => {
            let activity = ctx.service.set_progress(*id, *percent)?;
            ctx.emit(&activity, print_summary)
        }
        ActivityCommands::Cancel { id } => {
            let activity = ctx.service.cancel_activity(*id)?;
            ctx.emit(&activity, |a| println!("Cancelled: {} ({})", a.name, a.id))
        }
        ActivityCommands::Compare { id } => {
            let comparison = ctx.service.get_comparison(*id)?;
            ctx.emit(&comparison, print_comparison)
        }
        ActivityCommands::History { id } => {
            let events = JournalSink::new(&ctx.paths.events_log).history(*id)?;
            ctx.emit(&events, |list| print_history(list))
        }
        ActivityCommands::Ack { id, alert_id } => {
            let activity = ctx.service.mark_alert_read(*id, *alert_id)?;
            ctx.emit(&activity, |a| {
                println!("Alert {} marked read on {}", alert_id, a.name)
            })
        }
        ActivityCommands::Delete { id } => {
            ctx.service.delete_activity(*id)?;
            if ctx.json {
                println!("{}", serde_json::json!({ "deleted": id }));
            } else {
                println!("Deleted activity: {}", id);
            }
            Ok(())
        }
    }
}

fn print_summary(a: &PlannedActivity) {
    println!("  Name:      {}", a.name);
    println!("  State:     {}", a.state);
    println!("  Progress:  {}%", a.progress_percentage);
    println!(
        "  Window:    {} -> {}",
        a.planned_start.format("%Y-%m-%d %H:%M"),
        a.planned_end.format("%Y-%m-%d %H:%M")
    );
    println!("  Deviation: {} day(s)", a.deviation_days);
    if a.needs_attention {
        println!("  ! needs attention");
    }
}

fn print_table(activities: &[PlannedActivity]) {
    if activities.is_empty() {
        println!("No activities found.");
        return;
    }

    println!(
        "{:<38} {:<28} {:<14} {:<12} {:>5} {:>5} {:<3}",
        "ID", "NAME", "TYPE", "STATE", "PROG", "DEV", "!"
    );
    println!("{}", "-".repeat(110));
    for a in activities {
        println!(
            "{:<38} {:<28} {:<14} {:<12} {:>4}% {:>5} {:<3}",
            a.id,
            truncate(&a.name, 26),
            a.activity_type.to_string(),
            a.state.to_string(),
            a.progress_percentage,
            a.deviation_days,
            if a.needs_attention { "!" } else { "" },
        );
    }
    println!("\n{} activit{} total.", activities.len(), if activities.len() == 1 { "y" } else { "ies" });
}

fn print_detail(a: &PlannedActivity) {
    println!("Activity:  {}", a.id);
    println!("Type:      {}", a.activity_type);
    println!("Priority:  {}", a.priority);
    print_summary(a);
    if !a.description.is_empty() {
        println!("  About:     {}", a.description);
    }
    if let Some(start) = a.actual_start {
        println!("  Started:   {}", start.to_rfc3339());
    }
    if let Some(end) = a.actual_end {
        println!("  Finished:  {}", end.to_rfc3339());
    }
    if let Some(plot) = &a.plot {
        println!("  Plot:      {} {}", plot.id, plot.name);
    }
    if let Some(crop) = &a.crop {
        println!("  Crop:      {} {}", crop.id, crop.name);
    }
    if !a.assigned_workers.is_empty() {
        let names: Vec<String> = a
            .assigned_workers
            .iter()
            .map(|w| if w.name.is_empty() { w.id.to_string() } else { w.name.clone() })
            .collect();
        println!("  Workers:   {}", names.join(", "));
    }

    if !a.goals.is_empty() {
        println!("\nGoals:");
        for g in &a.goals {
            println!(
                "  {} {:<30} {}/{} {} ({}%){}",
                g.id,
                truncate(&g.description, 30),
                g.current_value,
                g.target_value,
                g.unit,
                g.fulfillment_percentage,
                if g.fulfilled { " done" } else { "" }
            );
        }
    }

    let open: Vec<_> = a.active_alerts().collect();
    if !open.is_empty() {
        println!("\nOpen alerts:");
        for alert in open {
            println!(
                "  {} [{}] {}: {}{}",
                alert.id,
                alert.severity,
                alert.title,
                alert.message,
                if alert.read { " (read)" } else { "" }
            );
        }
    }
}

fn print_history(events: &[PlanningEvent]) {
    if events.is_empty() {
        println!("No journalled changes.");
        return;
    }
    for event in events {
        let detail = match event {
            PlanningEvent::ActivityCreated { name, .. } => name.clone(),
            PlanningEvent::ActivityStateChanged {
                from_state,
                to_state,
                ..
            } => format!("{} -> {}", from_state, to_state),
            PlanningEvent::AlertRaised {
                alert_type,
                severity,
                ..
            } => format!("{} [{}]", alert_type, severity),
            PlanningEvent::AlertResolved { alert_type, .. } => alert_type.to_string(),
            PlanningEvent::GoalFulfilled { goal_id, .. } => goal_id.to_string(),
            PlanningEvent::ActivityDeleted { .. } => String::new(),
            PlanningEvent::LaborSyncSkipped { reason, .. } => reason.clone(),
        };
        println!("{:<24} {:<22} {}", timestamp_of(event), event.event_type(), detail);
    }
}

fn timestamp_of(event: &PlanningEvent) -> String {
    let t = match event {
        PlanningEvent::ActivityCreated { timestamp, .. }
        | PlanningEvent::ActivityStateChanged { timestamp, .. }
        | PlanningEvent::AlertRaised { timestamp, .. }
        | PlanningEvent::AlertResolved { timestamp, .. }
        | PlanningEvent::GoalFulfilled { timestamp, .. }
        | PlanningEvent::ActivityDeleted { timestamp, .. }
        | PlanningEvent::LaborSyncSkipped { timestamp, .. } => timestamp,
    };
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_comparison(c: &ActivityComparison) {
    println!("{} ({})", c.name, c.activity_id);
    println!(
        "  Planned: {} -> {}, {:.1} h",
        c.planned.start.format("%Y-%m-%d %H:%M"),
        c.planned.end.format("%Y-%m-%d %H:%M"),
        c.planned.estimated_duration_hours
    );
    let fmt = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!(
        "  Actual:  {} -> {}, {}",
        fmt(c.actual.start),
        fmt(c.actual.end),
        c.actual
            .duration_hours
            .map(|h| format!("{:.1} h", h))
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Status:  {} at {}%, {} day(s) deviation",
        c.actual.state, c.actual.progress_percentage, c.deviation.deviation_days
    );
    for g in &c.goals {
        println!(
            "  Goal:    {} {}/{} {} ({}%)",
            g.description, g.current_value, g.target_value, g.unit, g.fulfillment_percentage
        );
    }
}
