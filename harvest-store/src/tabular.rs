//! Artifact parsing.
//!
//! Report artifacts arrive as workbooks (OOXML, OpenDocument, or legacy BIFF)
//! or as delimited text. The format is sniffed from the content, never from
//! the file name, and the first worksheet is flattened into a grid of text
//! cells.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use harvest_core::{CoreError, Dataset};
use tracing::{debug, instrument};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ============================================================================
// Format Sniffing
// ============================================================================

/// Artifact container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// A zip-packaged workbook (`.xlsx` or `.ods`).
    ZipWorkbook,
    /// A legacy compound-document workbook (`.xls`).
    LegacyWorkbook,
    /// An HTML page, typically an error or login page served instead of the report.
    Html,
    /// Delimited text.
    Csv,
}

impl ArtifactFormat {
    /// Classifies artifact bytes by their leading content.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) {
            return Self::ZipWorkbook;
        }
        if bytes.starts_with(OLE_MAGIC) {
            return Self::LegacyWorkbook;
        }
        let text = strip_bom(bytes);
        let first = text.iter().find(|b| !b.is_ascii_whitespace());
        if first == Some(&b'<') {
            Self::Html
        } else {
            Self::Csv
        }
    }

    /// Returns true for the binary workbook formats.
    pub fn is_workbook(self) -> bool {
        matches!(self, Self::ZipWorkbook | Self::LegacyWorkbook)
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses artifact bytes into a dataset.
///
/// Every row is kept in order, blank ones included, except trailing rows
/// whose cells are all empty. Fails with
/// [`CoreError::Parse`] when the bytes are not tabular or hold no rows.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn parse_artifact(label: &str, bytes: &[u8]) -> Result<Dataset, CoreError> {
    let format = ArtifactFormat::sniff(bytes);
    let rows = match format {
        ArtifactFormat::ZipWorkbook | ArtifactFormat::LegacyWorkbook => {
            parse_workbook(label, bytes)?
        }
        ArtifactFormat::Csv => parse_delimited(label, bytes)?,
        ArtifactFormat::Html => {
            return Err(CoreError::parse(
                label,
                "content is an HTML page, not a report",
            ));
        }
    };

    let mut rows = rows;
    while rows
        .last()
        .is_some_and(|row| row.iter().all(String::is_empty))
    {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(CoreError::parse(label, "no rows"));
    }

    debug!(?format, rows = rows.len(), "Artifact parsed");
    Ok(Dataset::new(rows))
}

fn parse_workbook(label: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>, CoreError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| CoreError::parse(label, format!("unreadable workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CoreError::parse(label, "workbook has no sheets"))?
        .map_err(|e| CoreError::parse(label, format!("unreadable sheet: {e}")))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn parse_delimited(label: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>, CoreError> {
    let text = strip_bom(bytes);
    let delimiter = detect_delimiter(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CoreError::parse(label, format!("bad text row: {e}")))?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }
    Ok(rows)
}

/// Spreadsheet exports in Spanish locales use `;`; everything else `,`.
fn detect_delimiter(text: &[u8]) -> u8 {
    let first_line = text.split(|&b| b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    let commas = first_line.iter().filter(|&&b| b == b',').count();
    if semicolons > commas { b';' } else { b',' }
}

// ============================================================================
// Cell Coercion
// ============================================================================

/// Flattens one workbook cell to text.
///
/// Integral numbers lose their fractional part, dates render as ISO dates
/// (with the time only when it is not midnight), and strings are trimmed.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => String::from(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Error(e) => e.to_string(),
    }
}

fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
