use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::desk_review::{EmployeeMetrics, ReportFinding};
use crate::error::{DeskReviewError, Result};
use crate::validator::ValidatedReport;

#[derive(Debug, Serialize)]
struct CostRow<'a> {
    district_name: &'a str,
    year_end: &'a str,
    report_id: &'a str,
    employee_name: &'a str,
    salary: Option<f64>,
    healthcare: Option<f64>,
    retirement: Option<f64>,
    federal_pct: Option<f64>,
    state_pct: Option<f64>,
    validation_passed: bool,
    validation_errors: String,
}

#[derive(Debug, Serialize)]
struct ContactRow<'a> {
    district_name: &'a str,
    year_end: &'a str,
    report_id: &'a str,
    contact_name: &'a str,
    contact_email: &'a str,
}

pub struct ExportPaths {
    pub cost_reports: PathBuf,
    pub contacts: PathBuf,
    pub metrics: PathBuf,
    pub findings: PathBuf,
}

const COST_HEADER: &[&str] = &[
    "district_name",
    "year_end",
    "report_id",
    "employee_name",
    "salary",
    "healthcare",
    "retirement",
    "federal_pct",
    "state_pct",
    "validation_passed",
    "validation_errors",
];

const CONTACT_HEADER: &[&str] = &[
    "district_name",
    "year_end",
    "report_id",
    "contact_name",
    "contact_email",
];

const METRICS_HEADER: &[&str] = &[
    "report_id",
    "employee_name",
    "total_payroll_cost",
    "state_portion",
    "federal_portion",
    "healthcare_pct_of_total",
    "retirement_pct_of_total",
];

const FINDINGS_HEADER: &[&str] = &[
    "report_id",
    "district_name",
    "year_end",
    "finding_1_text",
    "finding_1_count_over_threshold",
    "finding_1_total_employees",
    "finding_2_text",
    "finding_2_flag",
    "healthcare_ratio",
    "excluded_records",
    "salary_threshold",
    "healthcare_threshold",
    "healthcare_policy",
];

/// `serialize` only emits the header with the first row, so an empty export
/// gets `header` written explicitly.
fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut written = 0usize;
    for row in rows {
        wtr.serialize(row)?;
        written += 1;
    }
    if written == 0 {
        wtr.write_record(header)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the flat CSV exports into `dir`.
pub fn export_all(
    dir: &Path,
    reports: &[ValidatedReport],
    metrics: &[EmployeeMetrics],
    findings: &[ReportFinding],
) -> Result<ExportPaths> {
    if reports.iter().all(|r| r.report.records.is_empty()) {
        return Err(DeskReviewError::Input(
            "no records were parsed; nothing to export".to_string(),
        ));
    }
    std::fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        cost_reports: dir.join("combined_cost_reports.csv"),
        contacts: dir.join("contact_info.csv"),
        metrics: dir.join("employee_metrics.csv"),
        findings: dir.join("desk_review_findings.csv"),
    };

    let cost_rows = reports.iter().flat_map(|v| {
        let report = &v.report;
        v.records().map(move |(record, result)| CostRow {
            district_name: &report.district_name,
            year_end: &report.year_end,
            report_id: &report.report_id,
            employee_name: &record.employee_name,
            salary: record.salary.as_number(),
            healthcare: record.healthcare.as_number(),
            retirement: record.retirement.as_number(),
            federal_pct: record.federal_pct.as_number(),
            state_pct: record.state_pct.as_number(),
            validation_passed: result.passed(),
            validation_errors: result.joined_errors(),
        })
    });
    write_csv(&paths.cost_reports, COST_HEADER, cost_rows)?;

    let contact_rows = reports.iter().filter_map(|v| {
        let report = &v.report;
        report.contact.as_ref().map(|c| ContactRow {
            district_name: &report.district_name,
            year_end: &report.year_end,
            report_id: &report.report_id,
            contact_name: &c.name,
            contact_email: &c.email,
        })
    });
    write_csv(&paths.contacts, CONTACT_HEADER, contact_rows)?;

    write_csv(&paths.metrics, METRICS_HEADER, metrics)?;
    write_csv(&paths.findings, FINDINGS_HEADER, findings)?;

    tracing::info!(dir = %dir.display(), "exports written");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk_review::{review_report, ReviewThresholds};
    use crate::models::{Cell, Contact, CostRecord, CostReport};
    use crate::validator::{validate_report, DEFAULT_PCT_TOLERANCE};

    fn validated(records: Vec<CostRecord>) -> ValidatedReport {
        validate_report(
            CostReport {
                report_id: "a.xlsx".to_string(),
                district_name: "Alpha".to_string(),
                year_end: "2024-06-30".to_string(),
                contact: None,
                records,
            },
            DEFAULT_PCT_TOLERANCE,
        )
    }

    #[test]
    fn test_export_all_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let v = validated(vec![
            CostRecord {
                report_id: "a.xlsx".to_string(),
                employee_name: "Ada".to_string(),
                salary: Cell::Number(50000.0),
                healthcare: Cell::Number(5000.0),
                retirement: Cell::Number(5000.0),
                state_pct: Cell::Number(0.5),
                federal_pct: Cell::Number(0.5),
            },
            CostRecord {
                report_id: "a.xlsx".to_string(),
                employee_name: "Bob".to_string(),
                salary: Cell::Text("lots".to_string()),
                healthcare: Cell::Number(0.0),
                retirement: Cell::Number(0.0),
                state_pct: Cell::Number(0.5),
                federal_pct: Cell::Number(0.5),
            },
        ]);
        let review = review_report(&v, &ReviewThresholds::default());
        let paths = export_all(dir.path(), &[v], &review.metrics, &[review.finding]).unwrap();

        let combined = std::fs::read_to_string(&paths.cost_reports).unwrap();
        let mut lines = combined.lines();
        assert!(lines.next().unwrap().starts_with("district_name,year_end,report_id,employee_name"));
        assert!(lines.next().unwrap().contains("Ada"));
        let bob = lines.next().unwrap();
        assert!(bob.contains("false"));
        assert!(bob.contains("salary is not numeric"));

        let findings = std::fs::read_to_string(&paths.findings).unwrap();
        assert!(findings.contains("For 0 of 1 employees"));
        assert!(findings.contains("aggregate"));

        let metrics = std::fs::read_to_string(&paths.metrics).unwrap();
        assert_eq!(metrics.lines().count(), 2);
        assert!(paths.contacts.exists());
    }

    fn first_line(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap().lines().next().unwrap_or("").to_string()
    }

    #[test]
    fn test_empty_exports_keep_header() {
        let dir = tempfile::tempdir().unwrap();
        let v = validated(vec![CostRecord {
            report_id: "a.xlsx".to_string(),
            employee_name: String::new(),
            salary: Cell::Number(1.0),
            healthcare: Cell::Number(0.0),
            retirement: Cell::Number(0.0),
            state_pct: Cell::Number(1.0),
            federal_pct: Cell::Number(0.0),
        }]);
        let paths = export_all(dir.path(), &[v], &[], &[]).unwrap();
        assert_eq!(first_line(&paths.contacts), CONTACT_HEADER.join(","));
        assert_eq!(first_line(&paths.metrics), METRICS_HEADER.join(","));
        assert_eq!(first_line(&paths.findings), FINDINGS_HEADER.join(","));
        assert_eq!(std::fs::read_to_string(&paths.contacts).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_headers_match_serialized_rows() {
        let dir = tempfile::tempdir().unwrap();
        let report = CostReport {
            report_id: "a.xlsx".to_string(),
            district_name: "Alpha".to_string(),
            year_end: "2024-06-30".to_string(),
            contact: Some(Contact {
                name: "Pat Lee".to_string(),
                email: "pat@alpha.org".to_string(),
            }),
            records: vec![CostRecord {
                report_id: "a.xlsx".to_string(),
                employee_name: "Ada".to_string(),
                salary: Cell::Number(50000.0),
                healthcare: Cell::Number(5000.0),
                retirement: Cell::Number(5000.0),
                state_pct: Cell::Number(0.5),
                federal_pct: Cell::Number(0.5),
            }],
        };
        let v = validate_report(report, DEFAULT_PCT_TOLERANCE);
        let review = review_report(&v, &ReviewThresholds::default());
        let paths = export_all(dir.path(), &[v], &review.metrics, &[review.finding]).unwrap();
        assert_eq!(first_line(&paths.cost_reports), COST_HEADER.join(","));
        assert_eq!(first_line(&paths.contacts), CONTACT_HEADER.join(","));
        assert_eq!(first_line(&paths.metrics), METRICS_HEADER.join(","));
        assert_eq!(first_line(&paths.findings), FINDINGS_HEADER.join(","));
    }

    #[test]
    fn test_export_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_all(dir.path(), &[validated(vec![])], &[], &[]).err().unwrap();
        assert!(err.to_string().contains("nothing to export"));
    }
}
