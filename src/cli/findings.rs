use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{effective_settings, ThresholdArgs};
use crate::db::get_connection;
use crate::error::{DeskReviewError, Result};
use crate::fmt::percent;
use crate::reports;

pub fn run(config: Option<&PathBuf>, db: Option<PathBuf>) -> Result<()> {
    let settings = effective_settings(config, &ThresholdArgs::default())?;
    let db_path = db.unwrap_or_else(|| settings.db_path());
    if !db_path.exists() {
        return Err(DeskReviewError::Other(format!(
            "No database at {}. Run `deskreview run` first.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    let findings = reports::get_findings(&conn)?;

    let mut table = Table::new();
    table.set_header(vec![
        "District",
        "Year End",
        "Report",
        "Over Threshold",
        "Healthcare",
        "Excluded",
    ]);
    for f in &findings {
        let healthcare = if f.healthcare_flag {
            Cell::new(percent(f.healthcare_ratio).red().bold())
        } else {
            Cell::new(percent(f.healthcare_ratio))
        };
        table.add_row(vec![
            Cell::new(&f.district_name),
            Cell::new(&f.year_end),
            Cell::new(&f.report_id),
            Cell::new(format!("{} of {}", f.over_threshold, f.total_employees)),
            healthcare,
            Cell::new(f.excluded_records),
        ]);
    }
    println!("Desk Review Findings\n{table}");

    let failed = reports::get_failed_records(&conn)?;
    if !failed.is_empty() {
        println!("\n{}", "Excluded records".yellow().bold());
        for (report_id, name, errors) in &failed {
            let name = if name.is_empty() { "(no name)" } else { name.as_str() };
            println!("  {report_id} / {name}: {errors}");
        }
    }

    for district in reports::get_all_districts(&conn)? {
        let texts = reports::get_district_findings(&conn, &district)?;
        if texts.is_empty() {
            continue;
        }
        println!("\n{}", district.bold());
        for text in texts {
            println!("  - {text}");
        }
    }
    Ok(())
}
