use serde::{Deserialize, Serialize};

use crate::fmt::{decimal, whole_dollars};
use crate::models::CostRecord;
use crate::validator::ValidatedReport;

/// State-funded portion above which an employee counts toward finding 1.
pub const DEFAULT_SALARY_THRESHOLD: f64 = 60_000.0;

/// Healthcare share of total payroll above which finding 2 is raised.
pub const DEFAULT_HEALTHCARE_THRESHOLD: f64 = 0.07;

/// How the healthcare threshold is applied to a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HealthcarePolicy {
    /// Compare the report-wide ratio: sum(healthcare) / sum(total payroll).
    #[default]
    Aggregate,
    /// Flag the report when any single employee exceeds the threshold.
    PerEmployee,
}

impl HealthcarePolicy {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::PerEmployee => "per_employee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewThresholds {
    pub salary: f64,
    pub healthcare_ratio: f64,
    pub policy: HealthcarePolicy,
}

impl Default for ReviewThresholds {
    fn default() -> Self {
        Self {
            salary: DEFAULT_SALARY_THRESHOLD,
            healthcare_ratio: DEFAULT_HEALTHCARE_THRESHOLD,
            policy: HealthcarePolicy::Aggregate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeMetrics {
    pub report_id: String,
    pub employee_name: String,
    pub total_payroll_cost: f64,
    pub state_portion: f64,
    pub federal_portion: f64,
    pub healthcare_pct_of_total: f64,
    pub retirement_pct_of_total: f64,
}

impl EmployeeMetrics {
    /// `None` when any input is not numeric; only validated records qualify.
    pub fn from_record(record: &CostRecord) -> Option<Self> {
        let salary = record.salary.as_number()?;
        let healthcare = record.healthcare.as_number()?;
        let retirement = record.retirement.as_number()?;
        let state_pct = record.state_pct.as_number()?;
        let federal_pct = record.federal_pct.as_number()?;

        let total = salary + healthcare + retirement;
        let share = |part: f64| if total > 0.0 { part / total } else { 0.0 };

        Some(Self {
            report_id: record.report_id.clone(),
            employee_name: record.employee_name.trim().to_string(),
            total_payroll_cost: total,
            state_portion: total * state_pct,
            federal_portion: total * federal_pct,
            healthcare_pct_of_total: share(healthcare),
            retirement_pct_of_total: share(retirement),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFinding {
    pub report_id: String,
    pub district_name: String,
    pub year_end: String,
    pub finding_1_text: String,
    pub finding_1_count_over_threshold: usize,
    pub finding_1_total_employees: usize,
    pub finding_2_text: Option<String>,
    pub finding_2_flag: bool,
    pub healthcare_ratio: f64,
    pub excluded_records: usize,
    pub salary_threshold: f64,
    pub healthcare_threshold: f64,
    pub healthcare_policy: HealthcarePolicy,
}

/// Metrics and finding for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskReview {
    pub metrics: Vec<EmployeeMetrics>,
    pub finding: ReportFinding,
}

pub fn salary_finding_text(count: usize, total: usize, threshold: f64) -> String {
    format!(
        "For {count} of {total} employees, the district charged over the {} threshold for state-related salary costs.",
        whole_dollars(threshold)
    )
}

pub fn healthcare_finding_text(threshold: f64) -> String {
    format!(
        "District charged healthcare costs over {}% of total salaries.",
        decimal(threshold * 100.0)
    )
}

/// `healthcare` holds the raw healthcare amount of each record behind `metrics`.
fn healthcare_ratio(metrics: &[EmployeeMetrics], healthcare: &[f64], policy: HealthcarePolicy) -> f64 {
    match policy {
        HealthcarePolicy::Aggregate => {
            let total: f64 = metrics.iter().map(|m| m.total_payroll_cost).sum();
            let healthcare: f64 = healthcare.iter().sum();
            if total > 0.0 {
                healthcare / total
            } else {
                0.0
            }
        }
        HealthcarePolicy::PerEmployee => metrics
            .iter()
            .map(|m| m.healthcare_pct_of_total)
            .fold(0.0, f64::max),
    }
}

/// Compute metrics for every passed record and the two findings. Records that
/// failed validation are skipped and counted in `excluded_records`.
pub fn review_report(validated: &ValidatedReport, thresholds: &ReviewThresholds) -> DeskReview {
    let (metrics, healthcare): (Vec<EmployeeMetrics>, Vec<f64>) = validated
        .passed_records()
        .filter_map(|record| {
            let healthcare = record.healthcare.as_number()?;
            EmployeeMetrics::from_record(record).map(|m| (m, healthcare))
        })
        .unzip();

    let total = metrics.len();
    let over = metrics
        .iter()
        .filter(|m| m.state_portion > thresholds.salary)
        .count();

    let ratio = healthcare_ratio(&metrics, &healthcare, thresholds.policy);
    let flag = ratio > thresholds.healthcare_ratio;

    let report = &validated.report;
    let finding = ReportFinding {
        report_id: report.report_id.clone(),
        district_name: report.district_name.clone(),
        year_end: report.year_end.clone(),
        finding_1_text: salary_finding_text(over, total, thresholds.salary),
        finding_1_count_over_threshold: over,
        finding_1_total_employees: total,
        finding_2_text: flag.then(|| healthcare_finding_text(thresholds.healthcare_ratio)),
        finding_2_flag: flag,
        healthcare_ratio: ratio,
        excluded_records: validated.excluded_count(),
        salary_threshold: thresholds.salary,
        healthcare_threshold: thresholds.healthcare_ratio,
        healthcare_policy: thresholds.policy,
    };

    DeskReview { metrics, finding }
}
