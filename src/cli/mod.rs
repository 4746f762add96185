pub mod config;
pub mod findings;
#[cfg(feature = "pdf")]
pub mod letters;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::desk_review::HealthcarePolicy;
use crate::error::Result;
use crate::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(name = "deskreview", about = "Desk review pipeline for district salary cost reports.")]
pub struct Cli {
    /// Settings file (default: ~/.config/deskreview/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and review normalized cost rows, then store and export the results.
    Run {
        /// Normalized cost rows (CSV)
        #[arg(long)]
        input: PathBuf,
        /// Contact rows (CSV) keyed by report_id
        #[arg(long)]
        contacts: Option<PathBuf>,
        /// SQLite database path (default: <data_dir>/cost_reports.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Directory for CSV exports (default: <data_dir>/exports)
        #[arg(long = "export-dir")]
        export_dir: Option<PathBuf>,
        /// Skip CSV exports
        #[arg(long = "no-export")]
        no_export: bool,
        #[command(flatten)]
        overrides: ThresholdArgs,
    },
    /// Show stored desk review findings.
    Findings {
        /// SQLite database path (default: <data_dir>/cost_reports.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Render a desk review letter and findings PDF for every district.
    #[cfg(feature = "pdf")]
    Letters {
        /// SQLite database path (default: <data_dir>/cost_reports.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Output directory (default: <data_dir>/reports)
        #[arg(long = "output-dir")]
        output_dir: Option<PathBuf>,
    },
    /// Show effective settings.
    Config {
        #[command(flatten)]
        overrides: ThresholdArgs,
        /// Write the effective settings back to the settings file
        #[arg(long)]
        save: bool,
    },
}

/// Per-invocation overrides for the review thresholds.
#[derive(clap::Args, Default)]
pub struct ThresholdArgs {
    /// State-funded portion above which an employee is counted
    #[arg(long = "salary-threshold")]
    pub salary_threshold: Option<f64>,
    /// Healthcare share of total payroll that raises a finding (0-1)
    #[arg(long = "healthcare-threshold")]
    pub healthcare_threshold: Option<f64>,
    /// How the healthcare threshold is applied
    #[arg(long, value_enum)]
    pub policy: Option<HealthcarePolicy>,
    /// Allowed drift of state_pct + federal_pct from 1.0
    #[arg(long)]
    pub tolerance: Option<f64>,
}

impl ThresholdArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(v) = self.salary_threshold {
            settings.salary_threshold = v;
        }
        if let Some(v) = self.healthcare_threshold {
            settings.healthcare_threshold = v;
        }
        if let Some(v) = self.policy {
            settings.healthcare_policy = v;
        }
        if let Some(v) = self.tolerance {
            settings.pct_tolerance = v;
        }
    }
}

/// Settings from file with CLI overrides applied, validated.
pub(crate) fn effective_settings(config: Option<&PathBuf>, overrides: &ThresholdArgs) -> Result<Settings> {
    let mut settings = load_settings(config.map(PathBuf::as_path))?;
    overrides.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}
