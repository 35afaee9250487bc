//! Measurement file loading using Polars (CSV) and calamine (spreadsheets)

use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use polars::prelude::*;

use crate::error::PipelineError;
use crate::schema::{ColumnMapping, Field, ResolvedColumns};

/// One source row with the mapped fields as raw text.
///
/// Blank cells and unmapped columns are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    pub village: Option<String>,
    pub measured_at: Option<String>,
    pub age: Option<String>,
    pub status: Option<String>,
}

impl RawRecord {
    fn from_cells<S: AsRef<str>>(row_number: usize, cells: &[S], cols: &ResolvedColumns) -> Self {
        let cell = |field: Field| {
            cols.get(field)
                .and_then(|idx| cells.get(idx))
                .map(|v| v.as_ref().trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            row_number,
            village: cell(Field::Village),
            measured_at: cell(Field::MeasuredAt),
            age: cell(Field::Age),
            status: cell(Field::Status),
        }
    }

    fn is_blank(&self) -> bool {
        self.village.is_none() && self.measured_at.is_none() && self.age.is_none() && self.status.is_none()
    }
}

/// Load measurement rows from a CSV or spreadsheet file
///
/// # Arguments
/// * `file_path` - Path to a `.csv`, `.xlsx`, `.xls` or `.ods` file
/// * `mapping` - Header aliases, resolved once against the file's header row
///
/// # Returns
/// * Raw rows in file order; completely blank rows are skipped
pub fn load_records(file_path: &Path, mapping: &ColumnMapping) -> crate::Result<Vec<RawRecord>> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let records = match ext.as_str() {
        "csv" => load_csv(file_path, mapping)?,
        "xlsx" | "xls" | "xlsm" | "ods" => load_spreadsheet(file_path, mapping)?,
        _ => return Err(PipelineError::UnsupportedFormat(ext).into()),
    };

    log::info!(
        "Loaded {} rows from {}",
        records.len(),
        file_path.display()
    );
    Ok(records)
}

/// Read a CSV with every column kept as a string
fn load_csv(file_path: &Path, mapping: &ColumnMapping) -> crate::Result<Vec<RawRecord>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))
        .with_context(|| format!("Failed to open CSV file: {}", file_path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV file: {}", file_path.display()))?;

    let headers: Vec<String> = df
        .get_columns()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    let cols = mapping.resolve(&headers)?;

    // Materialize each mapped column once, then assemble rows
    let column_values = |field: Field| -> crate::Result<Option<Vec<Option<String>>>> {
        let Some(idx) = cols.get(field) else {
            return Ok(None);
        };
        let series = df.get_columns()[idx].cast(&DataType::String)?;
        let values = series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(Some(values))
    };

    let village = column_values(Field::Village)?;
    let measured_at = column_values(Field::MeasuredAt)?;
    let age = column_values(Field::Age)?;
    let status = column_values(Field::Status)?;

    let take = |column: &Option<Vec<Option<String>>>, i: usize| {
        column
            .as_ref()
            .and_then(|values| values[i].as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let records = (0..df.height())
        .map(|i| RawRecord {
            row_number: i + 1,
            village: take(&village, i),
            measured_at: take(&measured_at, i),
            age: take(&age, i),
            status: take(&status, i),
        })
        .filter(|r| !r.is_blank())
        .collect();

    Ok(records)
}

/// Read the first worksheet of a spreadsheet
fn load_spreadsheet(file_path: &Path, mapping: &ColumnMapping) -> crate::Result<Vec<RawRecord>> {
    let mut workbook = open_workbook_auto(file_path)
        .with_context(|| format!("Failed to open spreadsheet: {}", file_path.display()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow::anyhow!("Spreadsheet has no worksheets: {}", file_path.display()))?
        .with_context(|| format!("Failed to read first worksheet of {}", file_path.display()))?;

    records_from_range(&range, mapping)
        .with_context(|| format!("Failed to read rows of {}", file_path.display()))
}

/// Map a worksheet range to raw records; the first row is the header
fn records_from_range(range: &Range<Data>, mapping: &ColumnMapping) -> crate::Result<Vec<RawRecord>> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        anyhow::bail!("worksheet has no header row");
    };
    let headers: Vec<String> = header_row.iter().map(cell_text).collect();
    let cols = mapping.resolve(&headers)?;

    let records = rows
        .enumerate()
        .map(|(i, row)| {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            RawRecord::from_cells(i + 1, &cells, &cols)
        })
        .filter(|r| !r.is_blank())
        .collect();

    Ok(records)
}

/// Render a cell as text; date cells use the same layout the CSV exports carry
fn cell_text(cell: &Data) -> String {
    if matches!(cell, Data::DateTime(_) | Data::DateTimeIso(_)) {
        if let Some(dt) = cell.as_datetime() {
            return dt.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    cell.to_string().trim().to_string()
}

/// Load an optional list of village names, one per line.
///
/// Blank lines and `#` comments are ignored; names are uppercased and
/// de-duplicated in first-seen order.
pub fn load_village_universe(file_path: &Path) -> crate::Result<Vec<String>> {
    let text = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read village list: {}", file_path.display()))?;
    Ok(parse_village_universe(&text))
}

pub fn parse_village_universe(text: &str) -> Vec<String> {
    let mut villages: Vec<String> = Vec::new();
    for line in text.lines() {
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        let name = name.to_uppercase();
        if !villages.contains(&name) {
            villages.push(name);
        }
    }
    villages
}
