// Spreadsheet ingestion: turns an uploaded .xls/.xlsx fare sheet into routes.
//
// Only the first worksheet is read and sheet row 1 is always the header, even when blank.
// Columns are located by header name (case-insensitive "from", "to", "distance",
// "fare"); when any of the four names is missing, columns A-D are used in that order.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::{Cursor, Read};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{FareError, Result};
use crate::fare_models::Route;

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 2] = [
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

const ALLOWED_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

const HEADER_ROW: u32 = 0;

/// An uploaded file parked on disk. The temp file is removed when this is dropped.
#[derive(Debug)]
pub struct SpreadsheetUpload {
    pub file: NamedTempFile,
    pub original_name: String,
    pub content_type: Option<String>,
    /// Bytes received. Reading stops at the first chunk past the size limit.
    pub size: u64,
}

impl SpreadsheetUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Size ceiling and type allow-list.
    pub fn check(&self, max_bytes: u64) -> Result<()> {
        if self.size > max_bytes {
            return Err(FareError::UnsupportedFormat(format!(
                "File too large: exceeds the {} byte limit",
                max_bytes
            )));
        }

        if !is_allowed_type(self.content_type.as_deref(), &self.original_name) {
            return Err(FareError::UnsupportedFormat(
                "Only Excel files are allowed!".to_string(),
            ));
        }

        Ok(())
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.size as usize);
        self.file.reopen()?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

fn is_allowed_type(content_type: Option<&str>, file_name: &str) -> bool {
    match content_type.map(|ct| ct.trim().to_ascii_lowercase()) {
        Some(ct) if ct.is_empty() || ct == "application/octet-stream" => {
            has_allowed_extension(file_name)
        }
        Some(ct) => ALLOWED_MIME_TYPES.contains(&ct.as_str()),
        None => has_allowed_extension(file_name),
    }
}

fn has_allowed_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Validates and parses an upload. Fails with `EmptyResult` when no row survives.
pub fn ingest_upload(upload: &SpreadsheetUpload, max_bytes: u64) -> Result<Vec<Route>> {
    upload.check(max_bytes)?;
    info!("📄 Processing file: {}", upload.original_name);
    let bytes = upload.read_bytes()?;
    ingest_workbook(bytes)
}

pub fn ingest_workbook(bytes: Vec<u8>) -> Result<Vec<Route>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        FareError::UnsupportedFormat(format!("Could not open spreadsheet: {}", e))
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(FareError::UnsupportedFormat(format!(
                "Could not read first worksheet: {}",
                e
            )));
        }
        None => return Err(FareError::EmptyResult),
    };

    let (routes, skipped) = routes_from_range(&range);
    info!("✓ Parsed {} routes ({} rows skipped)", routes.len(), skipped);

    if routes.is_empty() {
        return Err(FareError::EmptyResult);
    }
    Ok(routes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    from: u32,
    to: u32,
    distance: u32,
    fare: u32,
}

impl ColumnMap {
    const POSITIONAL: ColumnMap = ColumnMap {
        from: 0,
        to: 1,
        distance: 2,
        fare: 3,
    };

    fn from_header(range: &Range<Data>, first_col: u32, last_col: u32) -> Option<Self> {
        let find = |name: &str| {
            (first_col..=last_col).find(|&col| {
                text_cell(range.get_value((HEADER_ROW, col)))
                    .is_some_and(|h| h.eq_ignore_ascii_case(name))
            })
        };

        Some(ColumnMap {
            from: find("from")?,
            to: find("to")?,
            distance: find("distance")?,
            fare: find("fare")?,
        })
    }
}

/// Returns the valid routes in sheet order and the number of data rows dropped.
pub fn routes_from_range(range: &Range<Data>) -> (Vec<Route>, usize) {
    let (Some((first_row, first_col)), Some((last_row, last_col))) = (range.start(), range.end())
    else {
        return (Vec::new(), 0);
    };

    // Positional columns are absolute A-D, not relative to where the used range begins.
    // A used range starting below row 1 means the header row is blank.
    let columns = if first_row == HEADER_ROW {
        ColumnMap::from_header(range, first_col, last_col).unwrap_or(ColumnMap::POSITIONAL)
    } else {
        ColumnMap::POSITIONAL
    };
    debug!("Column mapping: {:?}", columns);

    let mut routes = Vec::new();
    let mut skipped = 0;

    for row in first_row.max(HEADER_ROW + 1)..=last_row {
        let cell = |col: u32| range.get_value((row, col));

        if (first_col..=last_col).all(|col| matches!(cell(col), None | Some(Data::Empty))) {
            continue;
        }

        match parse_row(range, row, columns) {
            Some(route) => routes.push(route),
            None => {
                skipped += 1;
                debug!("Skipping invalid row {}", row + 1);
            }
        }
    }

    (routes, skipped)
}

fn parse_row(range: &Range<Data>, row: u32, columns: ColumnMap) -> Option<Route> {
    let cell = |col: u32| range.get_value((row, col));
    Some(Route {
        from: text_cell(cell(columns.from))?,
        to: text_cell(cell(columns.to))?,
        distance: numeric_cell(cell(columns.distance))?,
        fare: numeric_cell(cell(columns.fare))?,
    })
}

fn text_cell(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

// A blank numeric cell counts as zero.
fn numeric_cell(cell: Option<&Data>) -> Option<f64> {
    let value = match cell {
        None | Some(Data::Empty) => 0.0,
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        Some(Data::String(s)) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse::<f64>().ok()? }
        }
        Some(_) => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}
