/// A normalized spreadsheet cell. Non-numeric text is kept verbatim so the
/// validator can report the offending value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One employee line within one cost report.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub report_id: String,
    pub employee_name: String,
    pub salary: Cell,
    pub healthcare: Cell,
    pub retirement: Cell,
    pub state_pct: Cell,
    pub federal_pct: Cell,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// One district's submitted workbook, keyed by its source file name.
#[derive(Debug, Clone, PartialEq)]
pub struct CostReport {
    pub report_id: String,
    pub district_name: String,
    pub year_end: String,
    pub contact: Option<Contact>,
    pub records: Vec<CostRecord>,
}
