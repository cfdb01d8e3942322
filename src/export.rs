//! The CSV of image links written for every export.

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use fs_err as fs;

use crate::shopify_api::Product;

/// Spreadsheet tools that assume a Windows code page only detect UTF-8 when
/// the file starts with a byte-order mark.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One product as an ordered list of (column, value) cells: `Title`, then
/// `Image 1` through `Image N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    cells: Vec<(String, String)>,
}

impl ExportRow {
    pub fn from_product(product: &Product) -> Self {
        let mut cells = Vec::with_capacity(product.images.len() + 1);
        cells.push(("Title".to_owned(), product.title.clone()));

        for (index, url) in product.images.iter().enumerate() {
            cells.push((format!("Image {}", index + 1), url.clone()));
        }

        ExportRow { cells }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }
}

/// Every column that appears in any row, in the order it was first seen.
pub fn header(rows: &[ExportRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();

    for column in rows.iter().flat_map(ExportRow::columns) {
        if !columns.iter().any(|seen| seen == column) {
            columns.push(column.to_owned());
        }
    }

    columns
}

/// Writes `rows` as CSV. Rows lacking a column get an empty cell.
pub fn write_csv<W: Write>(rows: &[ExportRow], mut output: W) -> Result<()> {
    output.write_all(UTF8_BOM)?;

    let columns = header(rows);
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(&columns)?;

    for row in rows {
        writer.write_record(columns.iter().map(|column| row.get(column).unwrap_or("")))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_csv_file(rows: &[ExportRow], path: &Path) -> Result<()> {
    let file = BufWriter::new(fs::File::create(path)?);
    write_csv(rows, file)
}
