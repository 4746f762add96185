use rusqlite::Connection;
#[cfg(feature = "pdf")]
use rusqlite::OptionalExtension;

#[cfg(feature = "pdf")]
use crate::error::DeskReviewError;
use crate::error::Result;

// ---------------------------------------------------------------------------
// District summary
// ---------------------------------------------------------------------------

/// Reimbursement totals for the most recent year of one district.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictSummary {
    pub district_name: String,
    pub position_title: String,
    pub fiscal_year: String,
    pub state_salary_total: f64,
    pub state_fringe_total: f64,
    pub state_reimbursement_total: f64,
    pub federal_salary_total: f64,
    pub federal_fringe_total: f64,
    pub federal_reimbursement_total: f64,
}

#[cfg(feature = "pdf")]
const DEFAULT_POSITION_TITLE: &str = "Program Contact";

#[cfg(feature = "pdf")]
pub fn fiscal_year(year_end: &str) -> String {
    match chrono::NaiveDate::parse_from_str(year_end, "%Y-%m-%d") {
        Ok(date) => date.format("%Y").to_string(),
        Err(_) => year_end.chars().take(4).collect(),
    }
}

pub fn get_all_districts(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT district_name FROM cost_reports ORDER BY district_name")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Only rows that passed validation contribute to the totals; a district whose
/// rows all failed still gets a summary with zero totals.
#[cfg(feature = "pdf")]
pub fn get_district_summary(conn: &Connection, district_name: &str) -> Result<DistrictSummary> {
    let row = conn
        .query_row(
            "SELECT district_name, year_end, \
             COALESCE(SUM(CASE WHEN validation_passed = 1 THEN salary * state_pct END), 0.0), \
             COALESCE(SUM(CASE WHEN validation_passed = 1 THEN (healthcare + retirement) * state_pct END), 0.0), \
             COALESCE(SUM(CASE WHEN validation_passed = 1 THEN salary * federal_pct END), 0.0), \
             COALESCE(SUM(CASE WHEN validation_passed = 1 THEN (healthcare + retirement) * federal_pct END), 0.0) \
             FROM cost_reports WHERE district_name = ?1 \
             GROUP BY district_name, year_end ORDER BY year_end DESC LIMIT 1",
            [district_name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((name, year_end, state_salary, state_fringe, federal_salary, federal_fringe)) = row
    else {
        return Err(DeskReviewError::UnknownDistrict(district_name.to_string()));
    };

    let contact: Option<Option<String>> = conn
        .query_row(
            "SELECT contact_name FROM contact_info WHERE district_name = ?1 \
             ORDER BY year_end DESC LIMIT 1",
            [district_name],
            |row| row.get(0),
        )
        .optional()?;
    let position_title = contact
        .flatten()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_POSITION_TITLE.to_string());

    Ok(DistrictSummary {
        district_name: name,
        position_title,
        fiscal_year: fiscal_year(&year_end),
        state_salary_total: state_salary,
        state_fringe_total: state_fringe,
        state_reimbursement_total: state_salary + state_fringe,
        federal_salary_total: federal_salary,
        federal_fringe_total: federal_fringe,
        federal_reimbursement_total: federal_salary + federal_fringe,
    })
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Active finding texts for a district, newest year first. Finding 1 is only
/// listed when at least one employee is over the threshold.
pub fn get_district_findings(conn: &Connection, district_name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT finding_1_text, finding_1_count_over_threshold, finding_2_text, finding_2_flag \
         FROM desk_review_findings WHERE district_name = ?1 ORDER BY year_end DESC, report_id",
    )?;
    let rows: Vec<(String, i64, Option<String>, bool)> = stmt
        .query_map([district_name], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut findings = Vec::new();
    for (text_1, over, text_2, flag) in rows {
        if over > 0 && !text_1.trim().is_empty() {
            findings.push(text_1.trim().to_string());
        }
        if let Some(text_2) = text_2.filter(|t| flag && !t.trim().is_empty()) {
            findings.push(text_2.trim().to_string());
        }
    }
    Ok(findings)
}

pub struct StoredFinding {
    pub district_name: String,
    pub year_end: String,
    pub report_id: String,
    pub over_threshold: i64,
    pub total_employees: i64,
    pub healthcare_ratio: f64,
    pub healthcare_flag: bool,
    pub excluded_records: i64,
}

pub fn get_findings(conn: &Connection) -> Result<Vec<StoredFinding>> {
    let mut stmt = conn.prepare(
        "SELECT district_name, year_end, report_id, finding_1_count_over_threshold, \
         finding_1_total_employees, healthcare_ratio, finding_2_flag, excluded_records \
         FROM desk_review_findings ORDER BY district_name, year_end",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StoredFinding {
            district_name: row.get(0)?,
            year_end: row.get(1)?,
            report_id: row.get(2)?,
            over_threshold: row.get(3)?,
            total_employees: row.get(4)?,
            healthcare_ratio: row.get(5)?,
            healthcare_flag: row.get(6)?,
            excluded_records: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Records that failed validation, for display next to the findings.
pub fn get_failed_records(conn: &Connection) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT report_id, employee_name, validation_errors FROM cost_reports \
         WHERE validation_passed = 0 ORDER BY report_id, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get::<_, Option<String>>(2)?.unwrap_or_default()))
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db, persist_run, RunRecord};
    use crate::desk_review::{review_report, ReviewThresholds};
    use crate::models::{Cell, Contact, CostRecord, CostReport};
    use crate::validator::{validate_report, ValidatedReport, DEFAULT_PCT_TOLERANCE};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn rec(report_id: &str, name: &str, salary: f64, healthcare: f64, state: f64, federal: f64) -> CostRecord {
        CostRecord {
            report_id: report_id.to_string(),
            employee_name: name.to_string(),
            salary: Cell::Number(salary),
            healthcare: Cell::Number(healthcare),
            retirement: Cell::Number(1000.0),
            state_pct: Cell::Number(state),
            federal_pct: Cell::Number(federal),
        }
    }

    fn seed(conn: &mut Connection) {
        let reports = vec![
            CostReport {
                report_id: "alpha.xlsx".to_string(),
                district_name: "Alpha".to_string(),
                year_end: "2024-06-30".to_string(),
                contact: Some(Contact {
                    name: "Pat Lee".to_string(),
                    email: "pat@alpha.org".to_string(),
                }),
                records: vec![
                    rec("alpha.xlsx", "Ada", 90000.0, 9000.0, 0.8, 0.2),
                    rec("alpha.xlsx", "Bob", 40000.0, 1000.0, 0.5, 0.5),
                    rec("alpha.xlsx", "Bad", 500000.0, 0.0, 0.9, 0.9),
                ],
            },
            CostReport {
                report_id: "beta.xlsx".to_string(),
                district_name: "Beta".to_string(),
                year_end: "2024-06-30".to_string(),
                contact: None,
                records: vec![rec("beta.xlsx", "Cy", 30000.0, 500.0, 1.0, 0.0)],
            },
        ];
        let validated: Vec<ValidatedReport> = reports
            .into_iter()
            .map(|r| validate_report(r, DEFAULT_PCT_TOLERANCE))
            .collect();
        let findings: Vec<_> = validated
            .iter()
            .map(|v| review_report(v, &ReviewThresholds::default()).finding)
            .collect();
        let run = RunRecord {
            started_at: "2025-01-01 09:00:00".to_string(),
            input_file: "rows.csv".to_string(),
            input_checksum: "abc".to_string(),
            thresholds: ReviewThresholds::default(),
        };
        persist_run(conn, &run, &validated, &findings).unwrap();
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_fiscal_year() {
        assert_eq!(fiscal_year("2024-06-30"), "2024");
        assert_eq!(fiscal_year("2023 close"), "2023");
        assert_eq!(fiscal_year(""), "");
    }

    #[test]
    fn test_get_all_districts_sorted() {
        let (_dir, mut conn) = test_db();
        seed(&mut conn);
        assert_eq!(get_all_districts(&conn).unwrap(), vec!["Alpha", "Beta"]);
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_district_summary_ignores_failed_rows() {
        let (_dir, mut conn) = test_db();
        seed(&mut conn);
        let s = get_district_summary(&conn, "Alpha").unwrap();
        assert_eq!(s.position_title, "Pat Lee");
        assert_eq!(s.fiscal_year, "2024");
        // 90,000 * 0.8 + 40,000 * 0.5
        assert!((s.state_salary_total - 92000.0).abs() < 1e-6);
        // (9,000 + 1,000) * 0.8 + (1,000 + 1,000) * 0.5
        assert!((s.state_fringe_total - 9000.0).abs() < 1e-6);
        assert!((s.state_reimbursement_total - 101000.0).abs() < 1e-6);
        // 90,000 * 0.2 + 40,000 * 0.5
        assert!((s.federal_salary_total - 38000.0).abs() < 1e-6);
        assert!((s.federal_reimbursement_total - (38000.0 + 3000.0)).abs() < 1e-6);
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_district_summary_defaults_position_title() {
        let (_dir, mut conn) = test_db();
        seed(&mut conn);
        let s = get_district_summary(&conn, "Beta").unwrap();
        assert_eq!(s.position_title, "Program Contact");
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_district_summary_unknown_district() {
        let (_dir, mut conn) = test_db();
        seed(&mut conn);
        let msg = get_district_summary(&conn, "Gamma").err().unwrap().to_string();
        assert!(msg.contains("Gamma"), "got: {msg}");
    }

    #[test]
    fn test_district_findings_only_active() {
        let (_dir, mut conn) = test_db();
        seed(&mut conn);
        // Ada: 100,000 * 0.8 = 80,000 over; healthcare 10,000 / 142,000 ≈ 7.04%
        let alpha = get_district_findings(&conn, "Alpha").unwrap();
        assert_eq!(alpha.len(), 2);
        assert!(alpha[0].starts_with("For 1 of 2 employees"));
        assert_eq!(alpha[1], "District charged healthcare costs over 7% of total salaries.");
        assert!(get_district_findings(&conn, "Beta").unwrap().is_empty());
    }

    #[test]
    fn test_get_findings_and_failed_records() {
        let (_dir, mut conn) = test_db();
        seed(&mut conn);
        let findings = get_findings(&conn).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].district_name, "Alpha");
        assert_eq!(findings[0].excluded_records, 1);
        assert!(findings[0].healthcare_flag);
        let failed = get_failed_records(&conn).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1, "Bad");
        assert!(failed[0].2.contains("percentages sum to 1.8"));
    }
}
