// goal.rs — Goal subcommands: add, record, remove.

use clap::Subcommand;
use farm_planning::{Goal, NewGoal};
use uuid::Uuid;

use super::Context;

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Attach a quantifiable target to an activity.
    Add {
        /// Activity ID.
        activity_id: Uuid,
        /// What is measured (e.g., "maize harvested").
        description: String,
        /// Target value; must be positive.
        #[arg(long)]
        target: f64,
        /// Unit of the target (kg, ha, rows, ...).
        #[arg(long, default_value = "")]
        unit: String,
    },
    /// Record the current measured value for a goal.
    Record { goal_id: Uuid, value: f64 },
    /// Remove a goal from its activity.
    Remove { goal_id: Uuid },
}

pub fn execute(cmd: &GoalCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        GoalCommands::Add {
            activity_id,
            description,
            target,
            unit,
        } => {
            let goal = ctx.service.add_goal(
                *activity_id,
                NewGoal::new(description.as_str(), *target, unit.as_str()),
            )?;
            ctx.emit(&goal, |g| {
                println!("Goal added: {}", g.id);
                print_goal(g);
            })
        }
        GoalCommands::Record { goal_id, value } => {
            let goal = ctx.service.record_goal_progress(*goal_id, *value)?;
            ctx.emit(&goal, print_goal)
        }
        GoalCommands::Remove { goal_id } => {
            ctx.service.remove_goal(*goal_id)?;
            if ctx.json {
                println!("{}", serde_json::json!({ "removed": goal_id }));
            } else {
                println!("Removed goal: {}", goal_id);
            }
            Ok(())
        }
    }
}

fn print_goal(g: &Goal) {
    println!("  Goal:     {}", g.description);
    println!(
        "  Value:    {} / {} {} ({}%)",
        g.current_value, g.target_value, g.unit, g.fulfillment_percentage
    );
    if let Some(at) = g.fulfilled_at {
        let status = if g.fulfilled { "reached" } else { "first reached" };
        println!("  {:<9} {}", format!("{}:", status), at.to_rfc3339());
    }
}
