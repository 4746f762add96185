use std::path::{Path, PathBuf};

use colored::Colorize;
use regex::Regex;

use crate::cli::{effective_settings, ThresholdArgs};
use crate::db::get_connection;
use crate::error::{DeskReviewError, Result};
use crate::reports::{get_all_districts, get_district_findings, get_district_summary};

fn fragment_pattern() -> Result<Regex> {
    Regex::new(r"[^A-Za-z0-9 _-]").map_err(|e| DeskReviewError::Other(format!("invalid pattern: {e}")))
}

/// Folder/file-safe form of a district name.
pub fn safe_fragment(unsafe_chars: &Regex, text: &str) -> String {
    let cleaned = unsafe_chars.replace_all(text, "_");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "district".to_string()
    } else {
        cleaned.to_string()
    }
}

fn write_pdf(bytes: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    tracing::debug!(path = %path.display(), "wrote pdf");
    Ok(())
}

fn render_district(
    conn: &rusqlite::Connection,
    unsafe_chars: &Regex,
    district: &str,
    out_dir: &Path,
    date: &str,
) -> Result<()> {
    let summary = get_district_summary(conn, district)?;
    let findings = get_district_findings(conn, district)?;

    let fragment = safe_fragment(unsafe_chars, district);
    let dir = out_dir.join(&fragment);
    write_pdf(
        &crate::pdf::render_letter(&summary, date)?,
        &dir.join(format!("desk_review_letter_{fragment}.pdf")),
    )?;
    write_pdf(
        &crate::pdf::render_findings(&summary, &findings)?,
        &dir.join(format!("desk_review_findings_{fragment}.pdf")),
    )?;
    Ok(())
}

pub fn run(config: Option<&PathBuf>, db: Option<PathBuf>, output_dir: Option<PathBuf>) -> Result<()> {
    let settings = effective_settings(config, &ThresholdArgs::default())?;
    let db_path = db.unwrap_or_else(|| settings.db_path());
    if !db_path.exists() {
        return Err(DeskReviewError::Other(format!(
            "No database at {}. Run `deskreview run` first.",
            db_path.display()
        )));
    }
    let out_dir = output_dir.unwrap_or_else(|| settings.data_dir().join("reports"));
    std::fs::create_dir_all(&out_dir)?;

    let conn = get_connection(&db_path)?;
    let districts = get_all_districts(&conn)?;
    let date = chrono::Local::now().format("%B %d, %Y").to_string();
    let unsafe_chars = fragment_pattern()?;

    let mut errors: Vec<(String, String)> = Vec::new();
    for district in &districts {
        if let Err(e) = render_district(&conn, &unsafe_chars, district, &out_dir, &date) {
            tracing::warn!(district = %district, error = %e, "letter generation failed");
            errors.push((district.clone(), e.to_string()));
        }
    }

    let processed = districts.len() - errors.len();
    println!("Processed {processed}/{} districts.", districts.len());
    if errors.is_empty() {
        println!("{}", "All districts processed successfully.".green());
    } else {
        println!("{}", "Errors encountered:".red().bold());
        for (district, message) in &errors {
            println!("- {district}: {message}");
        }
    }
    println!("Reports written to {}", out_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_fragment() {
        let re = fragment_pattern().unwrap();
        assert_eq!(safe_fragment(&re, "North Valley"), "North Valley");
        assert_eq!(safe_fragment(&re, "St. Mary's/ISD"), "St_ Mary_s_ISD");
        assert_eq!(safe_fragment(&re, "   "), "district");
        assert_eq!(safe_fragment(&re, "Lake-View_2"), "Lake-View_2");
    }
}
