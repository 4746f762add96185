use std::path::PathBuf;

use comfy_table::Table;

use crate::cli::{effective_settings, ThresholdArgs};
use crate::error::Result;
use crate::settings::{save_settings, settings_path};

pub fn run(config: Option<&PathBuf>, overrides: &ThresholdArgs, save: bool) -> Result<()> {
    let settings = effective_settings(config, overrides)?;

    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["data_dir".to_string(), settings.data_dir().display().to_string()]);
    table.add_row(vec!["salary_threshold".to_string(), settings.salary_threshold.to_string()]);
    table.add_row(vec!["healthcare_threshold".to_string(), settings.healthcare_threshold.to_string()]);
    table.add_row(vec!["healthcare_policy".to_string(), settings.healthcare_policy.key().to_string()]);
    table.add_row(vec!["pct_tolerance".to_string(), settings.pct_tolerance.to_string()]);
    println!("{table}");

    if save {
        let path = save_settings(&settings, config.map(PathBuf::as_path))?;
        println!("Saved {}", path.display());
    } else {
        let path = config.cloned().unwrap_or_else(settings_path);
        println!("Settings file: {}", path.display());
    }
    Ok(())
}
