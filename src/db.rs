use std::path::Path;

use rusqlite::Connection;

use crate::desk_review::{ReportFinding, ReviewThresholds};
use crate::error::Result;
use crate::validator::ValidatedReport;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY,
    started_at TEXT NOT NULL,
    input_file TEXT NOT NULL,
    input_checksum TEXT NOT NULL,
    salary_threshold REAL NOT NULL,
    healthcare_threshold REAL NOT NULL,
    healthcare_policy TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    excluded_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cost_reports (
    id INTEGER PRIMARY KEY,
    district_name TEXT NOT NULL,
    year_end TEXT NOT NULL,
    report_id TEXT NOT NULL,
    employee_name TEXT NOT NULL,
    salary REAL,
    healthcare REAL,
    retirement REAL,
    federal_pct REAL,
    state_pct REAL,
    validation_passed INTEGER NOT NULL,
    validation_errors TEXT
);

CREATE TABLE IF NOT EXISTS contact_info (
    id INTEGER PRIMARY KEY,
    district_name TEXT NOT NULL,
    year_end TEXT NOT NULL,
    report_id TEXT NOT NULL,
    contact_name TEXT,
    contact_email TEXT
);

CREATE TABLE IF NOT EXISTS desk_review_findings (
    id INTEGER PRIMARY KEY,
    district_name TEXT NOT NULL,
    year_end TEXT NOT NULL,
    report_id TEXT NOT NULL,
    finding_1_text TEXT NOT NULL,
    finding_1_count_over_threshold INTEGER NOT NULL,
    finding_1_total_employees INTEGER NOT NULL,
    finding_2_text TEXT,
    finding_2_flag INTEGER NOT NULL,
    healthcare_ratio REAL NOT NULL,
    excluded_records INTEGER NOT NULL,
    salary_threshold REAL NOT NULL,
    healthcare_threshold REAL NOT NULL,
    healthcare_policy TEXT NOT NULL
);

CREATE VIEW IF NOT EXISTS employee_metrics AS
SELECT
    id AS cost_report_id,
    report_id,
    district_name,
    year_end,
    employee_name,
    salary + healthcare + retirement AS total_payroll_cost,
    (salary + healthcare + retirement) * state_pct AS state_portion,
    (salary + healthcare + retirement) * federal_pct AS federal_portion,
    CASE WHEN salary + healthcare + retirement > 0
        THEN healthcare / (salary + healthcare + retirement) ELSE 0 END AS healthcare_pct_of_total,
    CASE WHEN salary + healthcare + retirement > 0
        THEN retirement / (salary + healthcare + retirement) ELSE 0 END AS retirement_pct_of_total
FROM cost_reports
WHERE validation_passed = 1;
";

const DROP_ALL: &str = "
DROP VIEW IF EXISTS employee_metrics;
DROP TABLE IF EXISTS desk_review_findings;
DROP TABLE IF EXISTS contact_info;
DROP TABLE IF EXISTS cost_reports;
DROP TABLE IF EXISTS runs;
";

/// Provenance of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub started_at: String,
    pub input_file: String,
    pub input_checksum: String,
    pub thresholds: ReviewThresholds,
}

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Replace the contents of every table with this run's results. Runs inside
/// one transaction: a failure leaves the previous run intact.
pub fn persist_run(
    conn: &mut Connection,
    run: &RunRecord,
    reports: &[ValidatedReport],
    findings: &[ReportFinding],
) -> Result<i64> {
    let tx = conn.transaction()?;
    tx.execute_batch(DROP_ALL)?;
    tx.execute_batch(SCHEMA)?;

    let record_count: usize = reports.iter().map(|r| r.report.records.len()).sum();
    let excluded_count: usize = reports.iter().map(|r| r.excluded_count()).sum();

    tx.execute(
        "INSERT INTO runs (started_at, input_file, input_checksum, salary_threshold, healthcare_threshold, \
         healthcare_policy, record_count, excluded_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            run.started_at,
            run.input_file,
            run.input_checksum,
            run.thresholds.salary,
            run.thresholds.healthcare_ratio,
            run.thresholds.policy.key(),
            record_count as i64,
            excluded_count as i64,
        ],
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut cost_stmt = tx.prepare(
            "INSERT INTO cost_reports (district_name, year_end, report_id, employee_name, salary, healthcare, \
             retirement, federal_pct, state_pct, validation_passed, validation_errors) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        let mut contact_stmt = tx.prepare(
            "INSERT INTO contact_info (district_name, year_end, report_id, contact_name, contact_email) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for validated in reports {
            let report = &validated.report;
            for (record, result) in validated.records() {
                cost_stmt.execute(rusqlite::params![
                    report.district_name,
                    report.year_end,
                    report.report_id,
                    record.employee_name,
                    record.salary.as_number(),
                    record.healthcare.as_number(),
                    record.retirement.as_number(),
                    record.federal_pct.as_number(),
                    record.state_pct.as_number(),
                    result.passed(),
                    result.joined_errors(),
                ])?;
            }
            if let Some(contact) = &report.contact {
                contact_stmt.execute(rusqlite::params![
                    report.district_name,
                    report.year_end,
                    report.report_id,
                    contact.name,
                    contact.email,
                ])?;
            }
        }

        let mut finding_stmt = tx.prepare(
            "INSERT INTO desk_review_findings (district_name, year_end, report_id, finding_1_text, \
             finding_1_count_over_threshold, finding_1_total_employees, finding_2_text, finding_2_flag, \
             healthcare_ratio, excluded_records, salary_threshold, healthcare_threshold, healthcare_policy) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for f in findings {
            finding_stmt.execute(rusqlite::params![
                f.district_name,
                f.year_end,
                f.report_id,
                f.finding_1_text,
                f.finding_1_count_over_threshold as i64,
                f.finding_1_total_employees as i64,
                f.finding_2_text,
                f.finding_2_flag,
                f.healthcare_ratio,
                f.excluded_records as i64,
                f.salary_threshold,
                f.healthcare_threshold,
                f.healthcare_policy.key(),
            ])?;
        }
    }

    tx.commit()?;
    tracing::debug!(run_id, record_count, excluded_count, "run persisted");
    Ok(run_id)
}
