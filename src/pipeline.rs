use std::path::PathBuf;

use crate::db::{get_connection, init_db, persist_run, RunRecord};
use crate::desk_review::{review_report, DeskReview, EmployeeMetrics, ReportFinding, ReviewThresholds};
use crate::error::{DeskReviewError, Result};
use crate::export::{export_all, ExportPaths};
use crate::models::CostReport;
use crate::normalizer::load_input;
use crate::validator::{validate_report, ValidatedReport};

pub struct RunOptions {
    pub input: PathBuf,
    pub contacts: Option<PathBuf>,
    pub db_path: PathBuf,
    pub export_dir: Option<PathBuf>,
    pub tolerance: f64,
    pub thresholds: ReviewThresholds,
}

pub struct ReviewOutput {
    pub validated: Vec<ValidatedReport>,
    pub metrics: Vec<EmployeeMetrics>,
    pub findings: Vec<ReportFinding>,
}

pub struct RunSummary {
    pub run_id: i64,
    pub reports: usize,
    pub records: usize,
    pub excluded: usize,
    /// (report id, report-level errors) for every report that did not pass.
    pub failed_reports: Vec<(String, Vec<String>)>,
    pub findings: Vec<ReportFinding>,
    pub exports: Option<ExportPaths>,
}

/// Validate and review every report. Pure: no I/O, same input, same output.
pub fn review_all(reports: Vec<CostReport>, tolerance: f64, thresholds: &ReviewThresholds) -> ReviewOutput {
    let validated: Vec<ValidatedReport> = reports
        .into_iter()
        .map(|r| validate_report(r, tolerance))
        .collect();

    let mut metrics = Vec::new();
    let mut findings = Vec::new();
    for v in &validated {
        let DeskReview { metrics: m, finding } = review_report(v, thresholds);
        metrics.extend(m);
        findings.push(finding);
    }

    ReviewOutput {
        validated,
        metrics,
        findings,
    }
}

/// Load, validate, review, persist, and optionally export one batch.
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    let started_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let input = load_input(&opts.input, opts.contacts.as_deref())?;
    if input.row_count == 0 {
        return Err(DeskReviewError::Input(format!(
            "no salary rows detected in {}",
            opts.input.display()
        )));
    }

    let output = review_all(input.reports, opts.tolerance, &opts.thresholds);

    let mut failed_reports = Vec::new();
    for v in &output.validated {
        if !v.report_result.passed() {
            tracing::warn!(
                report_id = %v.report.report_id,
                excluded = v.excluded_count(),
                "validation failed"
            );
            failed_reports.push((v.report.report_id.clone(), v.report_result.errors().to_vec()));
        }
    }
    let excluded: usize = output.validated.iter().map(|v| v.excluded_count()).sum();
    tracing::info!(
        reports = output.validated.len(),
        records = input.row_count,
        excluded,
        "desk review computed"
    );

    let mut conn = get_connection(&opts.db_path)?;
    init_db(&conn)?;
    let run = RunRecord {
        started_at,
        input_file: opts.input.display().to_string(),
        input_checksum: input.checksum,
        thresholds: opts.thresholds,
    };
    let run_id = persist_run(&mut conn, &run, &output.validated, &output.findings)?;
    tracing::info!(run_id, db = %opts.db_path.display(), "run persisted");

    let exports = match &opts.export_dir {
        Some(dir) => Some(export_all(dir, &output.validated, &output.metrics, &output.findings)?),
        None => None,
    };

    Ok(RunSummary {
        run_id,
        reports: output.validated.len(),
        records: input.row_count,
        excluded,
        failed_reports,
        findings: output.findings,
        exports,
    })
}
