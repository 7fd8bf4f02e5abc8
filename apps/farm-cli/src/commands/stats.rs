// stats.rs — `farm stats`: fleet-wide summary.

use farm_planning::{ActivityState, Stats};

use super::Context;

pub fn execute(ctx: &Context) -> anyhow::Result<()> {
    let stats = ctx.service.get_statistics()?;
    ctx.emit(&stats, print_stats)
}

fn print_stats(stats: &Stats) {
    println!("Activities:        {}", stats.total);
    for state in ActivityState::ALL {
        println!("  {:<16} {}", state.to_string(), stats.count(state));
    }
    println!("Serious alerts:    {}", stats.with_serious_alerts);
    println!("Needs attention:   {}", stats.needs_attention);
    println!("Completion rate:   {:.1}%", stats.completion_rate * 100.0);
    println!("Efficiency:        {:.1}", stats.efficiency);
}
