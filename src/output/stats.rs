//! Statistics reporting.

use console::style;

use crate::pipeline::RunStats;
use crate::rate::RateState;

/// Print totals for a single album run.
pub fn print_run_stats(album: &str, stats: &RunStats) {
    println!();
    println!("{}", style(format!("Results for {}:", album)).bold());
    println!("  Candidates:  {}", stats.candidates);
    println!("  Resolved:    {}", stats.resolved);
    if stats.exported > 0 {
        println!("  Exported:    {}", stats.exported);
    } else {
        println!("  Downloaded:  {}", stats.downloaded);
    }
    let skipped = stats.already_done + stats.duplicate_skips + stats.filtered;
    println!("  Skipped:     {} (dedup/filter)", skipped);
    let failed = stats.resolution_failed + stats.download_failed;
    if failed > 0 {
        println!("  Failed:      {}", style(failed).red());
    }
}

/// Print global totals across all input URLs.
pub fn print_global_stats(runs: u64, runs_failed: u64, totals: &RunStats, rate: &RateState) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Totals:").bold());
    println!("  Albums processed: {}", runs);
    if runs_failed > 0 {
        println!("  Albums failed:    {}", style(runs_failed).red());
    }
    println!("  Downloaded: {}", totals.downloaded);
    if totals.exported > 0 {
        println!("  Exported:   {}", totals.exported);
    }
    println!(
        "  Skipped:    {}",
        totals.already_done + totals.duplicate_skips + totals.filtered
    );
    println!(
        "  Failed:     {}",
        totals.resolution_failed + totals.download_failed
    );
    println!(
        "  Final rate state: {:.1}s delay, target concurrency {}",
        rate.delay_seconds, rate.desired_concurrency
    );
    println!("{}", style("═".repeat(50)).dim());
}
