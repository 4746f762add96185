use std::fmt;

use serde::Serialize;

use crate::models::{Cell, CostRecord, CostReport};

/// Allowed drift of `state_pct + federal_pct` from 1.0.
pub const DEFAULT_PCT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EmployeeName,
    Salary,
    Healthcare,
    Retirement,
    StatePct,
    FederalPct,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EmployeeName => "employee_name",
            Self::Salary => "salary",
            Self::Healthcare => "healthcare",
            Self::Retirement => "retirement",
            Self::StatePct => "state_pct",
            Self::FederalPct => "federal_pct",
        }
    }

    fn is_fraction(&self) -> bool {
        matches!(self, Self::StatePct | Self::FederalPct)
    }
}

/// A single broken rule on a record. These are data, not errors: a record
/// carrying any of them is excluded from aggregation and the run continues.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingField { field: Field },
    InvalidType { field: Field, raw: String },
    OutOfRange { field: Field, value: f64 },
    InconsistentTotal { sum: f64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field: Field::EmployeeName } => write!(f, "missing employee name"),
            Self::MissingField { field } => write!(f, "{} is missing", field.name()),
            Self::InvalidType { field, raw } => write!(f, "{} is not numeric: {raw:?}", field.name()),
            Self::OutOfRange { field, value } if field.is_fraction() => {
                write!(f, "{} is out of range [0, 1]: {}", field.name(), value)
            }
            Self::OutOfRange { field, value } => {
                write!(f, "{} is negative: {}", field.name(), value)
            }
            Self::InconsistentTotal { sum } => {
                write!(f, "percentages sum to {sum}, expected 1.0")
            }
        }
    }
}

/// Verdict for one record or one report. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    passed: bool,
    errors: Vec<String>,
}

impl ValidationResult {
    pub fn from_issues(issues: &[ValidationIssue]) -> Self {
        Self::from_errors(issues.iter().map(|i| i.to_string()).collect())
    }

    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            passed: errors.is_empty(),
            errors,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Errors joined for single-column storage.
    pub fn joined_errors(&self) -> String {
        self.errors.join("; ")
    }
}

/// A report together with the verdicts computed for it.
#[derive(Debug, Clone)]
pub struct ValidatedReport {
    pub report: CostReport,
    pub record_results: Vec<ValidationResult>,
    pub report_result: ValidationResult,
}

impl ValidatedReport {
    pub fn records(&self) -> impl Iterator<Item = (&CostRecord, &ValidationResult)> {
        self.report.records.iter().zip(self.record_results.iter())
    }

    pub fn passed_records(&self) -> impl Iterator<Item = &CostRecord> {
        self.records().filter(|(_, r)| r.passed()).map(|(rec, _)| rec)
    }

    pub fn excluded_count(&self) -> usize {
        self.record_results.iter().filter(|r| !r.passed()).count()
    }
}

fn check_amount(field: Field, cell: &Cell, issues: &mut Vec<ValidationIssue>) {
    match cell {
        Cell::Empty => issues.push(ValidationIssue::MissingField { field }),
        Cell::Text(raw) => issues.push(ValidationIssue::InvalidType {
            field,
            raw: raw.clone(),
        }),
        Cell::Number(value) if !(*value >= 0.0) => {
            issues.push(ValidationIssue::OutOfRange { field, value: *value })
        }
        Cell::Number(_) => {}
    }
}

/// Returns the numeric value (in range or not) so the caller can check the sum.
fn check_fraction(field: Field, cell: &Cell, issues: &mut Vec<ValidationIssue>) -> Option<f64> {
    match cell {
        Cell::Empty => {
            issues.push(ValidationIssue::MissingField { field });
            None
        }
        Cell::Text(raw) => {
            issues.push(ValidationIssue::InvalidType {
                field,
                raw: raw.clone(),
            });
            None
        }
        Cell::Number(value) => {
            if !(0.0..=1.0).contains(value) {
                issues.push(ValidationIssue::OutOfRange { field, value: *value });
            }
            Some(*value)
        }
    }
}

/// Every rule is checked; all violations are reported together.
pub fn record_issues(record: &CostRecord, tolerance: f64) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if record.employee_name.trim().is_empty() {
        issues.push(ValidationIssue::MissingField {
            field: Field::EmployeeName,
        });
    }

    check_amount(Field::Salary, &record.salary, &mut issues);
    check_amount(Field::Healthcare, &record.healthcare, &mut issues);
    check_amount(Field::Retirement, &record.retirement, &mut issues);

    let state = check_fraction(Field::StatePct, &record.state_pct, &mut issues);
    let federal = check_fraction(Field::FederalPct, &record.federal_pct, &mut issues);
    if let (Some(state), Some(federal)) = (state, federal) {
        let sum = state + federal;
        if !((sum - 1.0).abs() <= tolerance) {
            issues.push(ValidationIssue::InconsistentTotal { sum });
        }
    }

    issues
}

pub fn validate_record(record: &CostRecord, tolerance: f64) -> ValidationResult {
    ValidationResult::from_issues(&record_issues(record, tolerance))
}

/// One result per record plus a report-level result that passes iff every
/// record passed. Report-level errors are prefixed with the row position.
pub fn validate_report(report: CostReport, tolerance: f64) -> ValidatedReport {
    let record_results: Vec<ValidationResult> = report
        .records
        .iter()
        .map(|r| validate_record(r, tolerance))
        .collect();

    let mut report_errors = Vec::new();
    for (i, (record, result)) in report.records.iter().zip(&record_results).enumerate() {
        let name = record.employee_name.trim();
        let label = if name.is_empty() {
            format!("row {}", i + 1)
        } else {
            format!("row {} ({name})", i + 1)
        };
        for err in result.errors() {
            report_errors.push(format!("{label}: {err}"));
        }
    }

    ValidatedReport {
        report,
        record_results,
        report_result: ValidationResult::from_errors(report_errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, state: f64, federal: f64) -> CostRecord {
        CostRecord {
            report_id: "Salary_Report_Test.xlsx".to_string(),
            employee_name: name.to_string(),
            salary: Cell::Number(50000.0),
            healthcare: Cell::Number(4000.0),
            retirement: Cell::Number(3000.0),
            state_pct: Cell::Number(state),
            federal_pct: Cell::Number(federal),
        }
    }

    fn report(records: Vec<CostRecord>) -> CostReport {
        CostReport {
            report_id: "Salary_Report_Test.xlsx".to_string(),
            district_name: "Test District".to_string(),
            year_end: "2024-06-30".to_string(),
            contact: None,
            records,
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let result = validate_record(&record("Ada", 0.6, 0.4), DEFAULT_PCT_TOLERANCE);
        assert!(result.passed());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_percentages_not_summing_to_one_fail() {
        let result = validate_record(&record("Ada", 0.5, 0.6), DEFAULT_PCT_TOLERANCE);
        assert!(!result.passed());
        assert_eq!(result.errors(), &["percentages sum to 1.1, expected 1.0".to_string()]);
    }

    #[test]
    fn test_empty_name_fails() {
        let result = validate_record(&record("   ", 0.5, 0.5), DEFAULT_PCT_TOLERANCE);
        assert!(!result.passed());
        assert_eq!(result.errors(), &["missing employee name".to_string()]);
    }

    #[test]
    fn test_all_violations_reported_together() {
        let rec = CostRecord {
            report_id: "r".to_string(),
            employee_name: String::new(),
            salary: Cell::Empty,
            healthcare: Cell::Text("n/a".to_string()),
            retirement: Cell::Number(-5.0),
            state_pct: Cell::Number(1.5),
            federal_pct: Cell::Number(0.2),
        };
        let issues = record_issues(&rec, DEFAULT_PCT_TOLERANCE);
        assert_eq!(issues.len(), 6);
        let errors = ValidationResult::from_issues(&issues).errors().to_vec();
        assert_eq!(errors[0], "missing employee name");
        assert_eq!(errors[1], "salary is missing");
        assert_eq!(errors[2], "healthcare is not numeric: \"n/a\"");
        assert_eq!(errors[3], "retirement is negative: -5");
        assert_eq!(errors[4], "state_pct is out of range [0, 1]: 1.5");
        assert_eq!(errors[5], "percentages sum to 1.7, expected 1.0");
    }

    #[test]
    fn test_sum_skipped_when_percentage_not_numeric() {
        let mut rec = record("Ada", 0.5, 0.5);
        rec.federal_pct = Cell::Empty;
        let issues = record_issues(&rec, DEFAULT_PCT_TOLERANCE);
        assert_eq!(
            issues,
            vec![ValidationIssue::MissingField {
                field: Field::FederalPct
            }]
        );
    }

    #[test]
    fn test_sum_within_tolerance_passes() {
        let result = validate_record(&record("Ada", 0.7 + 1e-7, 0.3), DEFAULT_PCT_TOLERANCE);
        assert!(result.passed());
        let result = validate_record(&record("Ada", 0.7 + 1e-4, 0.3), DEFAULT_PCT_TOLERANCE);
        assert!(!result.passed());
    }

    #[test]
    fn test_tight_tolerance_reports_exact_sum() {
        let result = validate_record(&record("Ada", 0.6000001, 0.4), 1e-8);
        assert!(!result.passed());
        assert_eq!(result.errors(), &["percentages sum to 1.0000001, expected 1.0".to_string()]);
    }

    #[test]
    fn test_tiny_negative_amount_keeps_sign() {
        let mut rec = record("Ada", 0.5, 0.5);
        rec.retirement = Cell::Number(-1e-9);
        let result = validate_record(&rec, DEFAULT_PCT_TOLERANCE);
        assert_eq!(result.errors(), &["retirement is negative: -0.000000001".to_string()]);
    }

    #[test]
    fn test_zero_amounts_are_valid() {
        let mut rec = record("Ada", 1.0, 0.0);
        rec.healthcare = Cell::Number(0.0);
        rec.retirement = Cell::Number(0.0);
        assert!(validate_record(&rec, DEFAULT_PCT_TOLERANCE).passed());
    }

    #[test]
    fn test_report_passes_only_if_all_records_pass() {
        let validated = validate_report(
            report(vec![record("Ada", 0.6, 0.4), record("Bob", 0.5, 0.6)]),
            DEFAULT_PCT_TOLERANCE,
        );
        assert!(!validated.report_result.passed());
        assert_eq!(validated.excluded_count(), 1);
        assert_eq!(validated.passed_records().count(), 1);
        assert_eq!(
            validated.report_result.errors(),
            &["row 2 (Bob): percentages sum to 1.1, expected 1.0".to_string()]
        );
    }

    #[test]
    fn test_report_level_label_without_name() {
        let validated = validate_report(report(vec![record("", 0.6, 0.4)]), DEFAULT_PCT_TOLERANCE);
        assert_eq!(
            validated.report_result.errors(),
            &["row 1: missing employee name".to_string()]
        );
    }

    #[test]
    fn test_empty_report_passes() {
        let validated = validate_report(report(vec![]), DEFAULT_PCT_TOLERANCE);
        assert!(validated.report_result.passed());
        assert_eq!(validated.excluded_count(), 0);
    }

    #[test]
    fn test_validation_does_not_touch_records() {
        let rec = record("Bob", 0.5, 0.6);
        let validated = validate_report(report(vec![rec.clone()]), DEFAULT_PCT_TOLERANCE);
        assert_eq!(validated.report.records[0], rec);
    }

    #[test]
    fn test_joined_errors() {
        let mut rec = record("", 0.5, 0.5);
        rec.salary = Cell::Empty;
        let result = validate_record(&rec, DEFAULT_PCT_TOLERANCE);
        assert_eq!(result.joined_errors(), "missing employee name; salary is missing");
    }
}
