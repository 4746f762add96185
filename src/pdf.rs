use std::io::BufWriter;

use printpdf::*;

use crate::error::{DeskReviewError, Result};
use crate::fmt::money;
use crate::reports::DistrictSummary;

// US Letter dimensions (mm)
const PAGE_W: f32 = 215.9;
const PAGE_H: f32 = 279.4;
const MARGIN_TOP: f32 = 25.4;
const MARGIN_BOTTOM: f32 = 25.4;
const MARGIN_LEFT: f32 = 25.4;
const MARGIN_RIGHT: f32 = 25.4;
const ROW_H: f32 = 5.5;
const FONT_SIZE: f32 = 11.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 11.0;
// Helvetica at 11pt fits roughly this many characters across the text block.
const WRAP_COLS: usize = 90;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.len() as f32 * size * 0.18
}

// Right edges (mm from the left margin) of the funding table's amount columns.
const FUNDING_AMOUNT_EDGES: [f32; 3] = [90.0, 125.0, 165.1];

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| DeskReviewError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| DeskReviewError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
        })
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold {
            self.font_bold.clone()
        } else {
            self.font.clone()
        };
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.use_text(s, size, Mm(x), Mm(self.pdf_y()), &font);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn header(&mut self, title: &str, district: &str, fiscal_year: &str) {
        self.text(title, MARGIN_LEFT, TITLE_SIZE, true);
        self.y += 7.0;
        self.text(district, MARGIN_LEFT, SUBTITLE_SIZE, false);
        self.y += 5.0;
        if !fiscal_year.is_empty() {
            self.text(&format!("Fiscal Year {fiscal_year}"), MARGIN_LEFT, SUBTITLE_SIZE, false);
            self.y += 5.0;
        }
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 8.0;
    }

    fn line(&mut self, s: &str, bold: bool) {
        self.ensure_space(ROW_H);
        self.text(s, MARGIN_LEFT, FONT_SIZE, bold);
        self.y += ROW_H;
    }

    fn paragraph(&mut self, s: &str) {
        for wrapped in textwrap::wrap(s, WRAP_COLS) {
            self.line(&wrapped, false);
        }
        self.blank_row();
    }

    /// A wrapped paragraph with a hanging label, e.g. "1." for numbered lists.
    fn labeled_paragraph(&mut self, label: &str, s: &str) {
        let indent = 8.0;
        for (i, wrapped) in textwrap::wrap(s, WRAP_COLS - 4).iter().enumerate() {
            self.ensure_space(ROW_H);
            if i == 0 {
                self.text(label, MARGIN_LEFT, FONT_SIZE, true);
            }
            self.text(wrapped, MARGIN_LEFT + indent, FONT_SIZE, false);
            self.y += ROW_H;
        }
        self.y += 2.0;
    }

    /// One funding-table line: a label followed by right-aligned amounts.
    fn funding_row(&mut self, label: &str, amounts: [&str; 3], bold: bool) {
        self.ensure_space(ROW_H);
        self.text(label, MARGIN_LEFT, FONT_SIZE, bold);
        for (amount, edge) in amounts.iter().zip(FUNDING_AMOUNT_EDGES) {
            let x = MARGIN_LEFT + edge - approx_text_width(amount, FONT_SIZE);
            self.text(amount, x, FONT_SIZE, bold);
        }
        self.y += ROW_H;
    }

    fn funding_table(&mut self, summary: &DistrictSummary) {
        self.ensure_space(ROW_H * 4.0);
        self.funding_row("Funding Source", ["Salary", "Fringe", "Reimbursement"], true);
        self.separator();
        self.funding_row(
            "State",
            [
                money(summary.state_salary_total).as_str(),
                money(summary.state_fringe_total).as_str(),
                money(summary.state_reimbursement_total).as_str(),
            ],
            false,
        );
        self.funding_row(
            "Federal",
            [
                money(summary.federal_salary_total).as_str(),
                money(summary.federal_fringe_total).as_str(),
                money(summary.federal_reimbursement_total).as_str(),
            ],
            false,
        );
    }

    fn blank_row(&mut self) {
        self.y += ROW_H;
    }

    fn separator(&mut self) {
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 2.0;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| DeskReviewError::Pdf(format!("{e:?}")))?;
        buf.into_inner()
            .map_err(|e| DeskReviewError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Render functions
// ---------------------------------------------------------------------------

/// Cover letter summarizing state and federal reimbursement for the district.
pub fn render_letter(summary: &DistrictSummary, date: &str) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Desk Review Letter")?;
    pdf.header("Desk Review Letter", &summary.district_name, &summary.fiscal_year);

    pdf.line(date, false);
    pdf.blank_row();
    pdf.line(&format!("Dear {},", summary.position_title), false);
    pdf.blank_row();

    let year = if summary.fiscal_year.is_empty() {
        String::new()
    } else {
        format!(" for fiscal year {}", summary.fiscal_year)
    };
    pdf.paragraph(&format!(
        "A desk review of the salary cost report submitted by {}{year} has been completed. \
         The reimbursable salary and fringe benefit costs identified in the review are summarized below.",
        summary.district_name
    ));

    pdf.funding_table(summary);
    pdf.blank_row();

    pdf.paragraph(
        "Findings identified during the review are enclosed. Please review them and respond \
         with any corrections or supporting documentation.",
    );
    pdf.line("Sincerely,", false);
    pdf.blank_row();
    pdf.line("Desk Review Team", true);

    pdf.to_bytes()
}

/// Numbered list of findings, or a note that none were identified.
pub fn render_findings(summary: &DistrictSummary, findings: &[String]) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Desk Review Findings")?;
    pdf.header("Desk Review Findings", &summary.district_name, &summary.fiscal_year);

    if findings.is_empty() {
        pdf.paragraph("No findings were identified during the desk review.");
    } else {
        for (i, finding) in findings.iter().enumerate() {
            pdf.labeled_paragraph(&format!("{}.", i + 1), finding);
        }
    }

    pdf.to_bytes()
}
