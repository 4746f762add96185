use std::path::PathBuf;

use colored::Colorize;

use crate::cli::{effective_settings, ThresholdArgs};
use crate::error::Result;
use crate::fmt::percent;
use crate::pipeline::{self, RunOptions};

pub struct RunArgs {
    pub input: PathBuf,
    pub contacts: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub no_export: bool,
}

pub fn run(config: Option<&PathBuf>, args: RunArgs, overrides: &ThresholdArgs) -> Result<()> {
    let settings = effective_settings(config, overrides)?;
    let export_dir = if args.no_export {
        None
    } else {
        Some(args.export_dir.unwrap_or_else(|| settings.export_dir()))
    };
    let opts = RunOptions {
        input: args.input,
        contacts: args.contacts,
        db_path: args.db.unwrap_or_else(|| settings.db_path()),
        export_dir,
        tolerance: settings.pct_tolerance,
        thresholds: settings.thresholds(),
    };

    let summary = pipeline::run(&opts)?;

    for (report_id, errors) in &summary.failed_reports {
        println!("{} {report_id}", "Validation failed for".yellow().bold());
        for err in errors {
            println!("  - {err}");
        }
    }

    println!(
        "Loaded {} salary rows from {} reports ({} excluded).",
        summary.records, summary.reports, summary.excluded
    );
    for f in &summary.findings {
        let flag = if f.finding_2_flag {
            "healthcare flagged".red().to_string()
        } else {
            "healthcare ok".green().to_string()
        };
        println!(
            "  {}: {} of {} over threshold, healthcare {} ({flag})",
            f.district_name,
            f.finding_1_count_over_threshold,
            f.finding_1_total_employees,
            percent(f.healthcare_ratio),
        );
    }
    println!("SQLite database: {} (run {})", opts.db_path.display(), summary.run_id);
    if let Some(paths) = &summary.exports {
        println!("Combined export: {}", paths.cost_reports.display());
        println!("Contact export: {}", paths.contacts.display());
        println!("Metrics export: {}", paths.metrics.display());
        println!("Desk review export: {}", paths.findings.display());
    }
    Ok(())
}
