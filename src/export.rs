//! Flat CSV export of one contract's extracted fields.
//!
//! Fixed column order, every value double-quoted. Embedded double quotes
//! are not escaped beyond the wrapping, a known limitation of the export
//! format, kept for compatibility with the consuming sheet templates.

use crate::fields::{ExtractedField, FieldName};

/// Fixed CSV header row.
pub const CSV_HEADER: &str = "Filename,Property Address,Legal Description,Buyer,Seller,Purchase Price,Earnest Money,Execution Date,Closing Date,Notes";

/// Serialize one contract as a CSV data row matching `CSV_HEADER`.
///
/// `fields` may be in any order and may omit entries; missing fields export
/// as empty cells. Newlines in values are flattened to spaces so the row
/// stays a single line.
pub fn to_csv_row(filename: &str, fields: &[ExtractedField], notes: &str) -> String {
    let mut cells = Vec::with_capacity(10);
    cells.push(quote(filename));
    for name in FieldName::all() {
        let value = fields
            .iter()
            .find(|f| f.field == *name)
            .map(|f| f.value.as_str())
            .unwrap_or("");
        cells.push(quote(value));
    }
    cells.push(quote(notes));
    cells.join(",")
}

fn quote(value: &str) -> String {
    let flat = value.replace(['\r', '\n'], " ");
    format!("\"{}\"", flat.trim())
}
