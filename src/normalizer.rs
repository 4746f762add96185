use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{DeskReviewError, Result};
use crate::models::{Cell, Contact, CostRecord, CostReport};

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// Classify a raw amount: blank is `Empty`, anything that parses after
/// stripping currency formatting is a `Number`, everything else is kept as
/// `Text`. Parenthesized values are negative.
pub fn parse_amount(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    let s = trimmed.replace([',', '"', '$'], "");
    let s = s.trim();
    let parsed = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner.trim().parse::<f64>().map(|v| -v),
        None => s.parse::<f64>(),
    };
    match parsed {
        Ok(v) if v.is_finite() => Cell::Number(v),
        _ => Cell::Text(trimmed.to_string()),
    }
}

/// Like `parse_amount`, but values above 1 (or with a `%` suffix) are read as
/// whole percentages: `45` and `45%` both become 0.45.
pub fn parse_fraction(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if let Some(pct) = trimmed.strip_suffix('%') {
        return match parse_amount(pct) {
            Cell::Number(v) => Cell::Number(v / 100.0),
            Cell::Empty => Cell::Text(trimmed.to_string()),
            text => text,
        };
    }
    match parse_amount(trimmed) {
        Cell::Number(v) if v > 1.0 => Cell::Number(v / 100.0),
        other => other,
    }
}

/// ISO date when the value looks like one, otherwise the trimmed input.
pub fn parse_year_end(raw: &str) -> String {
    let raw = raw.trim();
    let raw_date = raw.split_whitespace().next().unwrap_or("");
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw_date, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    raw.to_string()
}

/// District name derived from a workbook name such as
/// `Salary_Report_North_Valley.xlsx`.
pub fn district_from_report_id(report_id: &str) -> String {
    let stem = Path::new(report_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(report_id);
    stem.replace("Salary_Report_", "").replace('_', " ").trim().to_string()
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    ReportId,
    DistrictName,
    YearEnd,
    EmployeeName,
    Salary,
    Healthcare,
    Retirement,
    FederalPct,
    StatePct,
    ContactName,
    ContactEmail,
}

impl Column {
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::ReportId => &["report_id", "source_file"],
            Self::DistrictName => &["district_name", "district name"],
            Self::YearEnd => &["year_end", "year end"],
            Self::EmployeeName => &["employee_name", "name"],
            Self::Salary => &["salary", "salaries"],
            Self::Healthcare => &["healthcare"],
            Self::Retirement => &["retirement"],
            Self::FederalPct => &["federal_pct", "federal funding %"],
            Self::StatePct => &["state_pct", "state funding %"],
            Self::ContactName => &["contact_name", "contact name"],
            Self::ContactEmail => &["contact_email", "contact email"],
        }
    }
}

const COST_REQUIRED: &[Column] = &[
    Column::ReportId,
    Column::DistrictName,
    Column::EmployeeName,
    Column::Salary,
    Column::Healthcare,
    Column::Retirement,
    Column::FederalPct,
    Column::StatePct,
];

const COST_OPTIONAL: &[Column] = &[Column::YearEnd];

const CONTACT_REQUIRED: &[Column] = &[Column::ReportId];

const CONTACT_OPTIONAL: &[Column] = &[Column::ContactName, Column::ContactEmail];

struct Header {
    index: HashMap<Column, usize>,
}

impl Header {
    fn map(headers: &csv::StringRecord, required: &[Column], optional: &[Column]) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |col: &Column| {
            normalized
                .iter()
                .position(|h| col.aliases().contains(&h.as_str()))
        };

        let mut index = HashMap::new();
        let mut missing = Vec::new();
        for col in required {
            match find(col) {
                Some(i) => {
                    index.insert(*col, i);
                }
                None => missing.push(col.aliases()[0]),
            }
        }
        if !missing.is_empty() {
            return Err(DeskReviewError::Input(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }
        for col in optional {
            if let Some(i) = find(col) {
                index.insert(*col, i);
            }
        }
        Ok(Self { index })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, col: Column) -> &'r str {
        self.index
            .get(&col)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Normalized input for one run.
pub struct LoadedInput {
    pub reports: Vec<CostReport>,
    pub row_count: usize,
    pub checksum: String,
}

fn csv_reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(rdr)
}

/// Group cost rows into reports by report id, in order of first appearance.
pub fn read_cost_reports<R: Read>(rdr: R) -> Result<Vec<CostReport>> {
    let mut rdr = csv_reader(rdr);
    let header = Header::map(rdr.headers()?, COST_REQUIRED, COST_OPTIONAL)?;

    let mut reports: Vec<CostReport> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let report_id = header.get(&record, Column::ReportId).trim().to_string();
        if report_id.is_empty() {
            tracing::warn!(line = ?record.position().map(|p| p.line()), "row without report_id skipped");
            continue;
        }

        let pos = match positions.get(&report_id) {
            Some(&pos) => pos,
            None => {
                let district = header.get(&record, Column::DistrictName).trim();
                let district_name = if district.is_empty() {
                    district_from_report_id(&report_id)
                } else {
                    district.to_string()
                };
                reports.push(CostReport {
                    report_id: report_id.clone(),
                    district_name,
                    year_end: parse_year_end(header.get(&record, Column::YearEnd)),
                    contact: None,
                    records: Vec::new(),
                });
                positions.insert(report_id.clone(), reports.len() - 1);
                reports.len() - 1
            }
        };

        reports[pos].records.push(CostRecord {
            report_id,
            employee_name: header.get(&record, Column::EmployeeName).trim().to_string(),
            salary: parse_amount(header.get(&record, Column::Salary)),
            healthcare: parse_amount(header.get(&record, Column::Healthcare)),
            retirement: parse_amount(header.get(&record, Column::Retirement)),
            state_pct: parse_fraction(header.get(&record, Column::StatePct)),
            federal_pct: parse_fraction(header.get(&record, Column::FederalPct)),
        });
    }

    Ok(reports)
}

/// Attach contact rows to their reports. Returns how many were matched.
pub fn read_contacts<R: Read>(rdr: R, reports: &mut [CostReport]) -> Result<usize> {
    let mut rdr = csv_reader(rdr);
    let header = Header::map(rdr.headers()?, CONTACT_REQUIRED, CONTACT_OPTIONAL)?;

    let mut matched = 0usize;
    for result in rdr.records() {
        let record = result?;
        let report_id = header.get(&record, Column::ReportId).trim();
        if report_id.is_empty() {
            continue;
        }
        let Some(report) = reports.iter_mut().find(|r| r.report_id == report_id) else {
            tracing::warn!(report_id, "contact row for unknown report ignored");
            continue;
        };
        report.contact = Some(Contact {
            name: header.get(&record, Column::ContactName).trim().to_string(),
            email: header.get(&record, Column::ContactEmail).trim().to_string(),
        });
        matched += 1;
    }
    Ok(matched)
}

pub fn load_input(cost_path: &Path, contacts_path: Option<&Path>) -> Result<LoadedInput> {
    let checksum = compute_checksum(cost_path)?;
    let file = std::fs::File::open(cost_path)?;
    let mut reports = read_cost_reports(std::io::BufReader::new(file))?;
    let row_count = reports.iter().map(|r| r.records.len()).sum();
    tracing::info!(
        file = %cost_path.display(),
        reports = reports.len(),
        rows = row_count,
        "loaded cost rows"
    );

    if let Some(path) = contacts_path {
        let file = std::fs::File::open(path)?;
        let matched = read_contacts(std::io::BufReader::new(file), &mut reports)?;
        tracing::info!(file = %path.display(), matched, "loaded contacts");
    }

    Ok(LoadedInput {
        reports,
        row_count,
        checksum,
    })
}
