// labor.rs — `farm labor record`: forward a labor notification to the bridge.
//
// The labor record itself lives in the labor service. This command only
// performs the progress nudge that service would trigger, and always exits
// successfully, whether or not the nudge applied.

use clap::Subcommand;
use farm_planning::{LaborSyncBridge, SyncOutcome};
use uuid::Uuid;

use super::{journal, Context};

#[derive(Subcommand)]
pub enum LaborCommands {
    /// Notify that a labor record for the activity was saved.
    Record {
        activity_id: Uuid,
        /// The labor record was edited rather than newly created.
        #[arg(long)]
        update: bool,
    },
}

pub fn execute(cmd: &LaborCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        LaborCommands::Record {
            activity_id,
            update,
        } => {
            let bridge = LaborSyncBridge::new(ctx.service.clone()).with_dispatcher(journal(&ctx.paths));
            let outcome = bridge.on_labor_recorded(*activity_id, !*update);
            ctx.emit(&outcome, |o| match o {
                SyncOutcome::Applied { progress, state } => {
                    println!("Progress synced: {}% ({})", progress, state)
                }
                SyncOutcome::Skipped { reason } => println!("Progress not synced: {}", reason),
            })
        }
    }
}
