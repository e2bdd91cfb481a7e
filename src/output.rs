use colored::Colorize;

use crate::cli::Format;
use crate::models::SweepReport;

/// Print pruned image references to stdout, one per line or as JSON
pub fn print_pruned(report: &SweepReport, format: Format) -> serde_json::Result<()> {
    match format {
        Format::Text => {
            for image_ref in &report.pruned {
                println!("{}", image_ref);
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

/// Print the run summary to stderr
pub fn print_summary(report: &SweepReport, dry_run: bool, failed: bool) {
    eprintln!("{}", summary_line(report, dry_run, failed));
}

fn summary_line(report: &SweepReport, dry_run: bool, failed: bool) -> String {
    let label = if dry_run {
        "DRY RUN SUMMARY:".yellow().bold()
    } else {
        "SUMMARY:".bold()
    };
    let verb = if dry_run { "Would prune" } else { "Pruned" };
    let status = if failed {
        "stopped on error".red().bold().to_string()
    } else {
        "completed".green().to_string()
    };

    format!(
        "{} {} {} images ({} deleted, {} refused) from {} of {} repositories, {}",
        label,
        verb,
        report.pruned.len().to_string().red().bold(),
        report.deleted,
        report.refused,
        report.tagged_repos,
        report.examined_repos,
        status,
    )
}
