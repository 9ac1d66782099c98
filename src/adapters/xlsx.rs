use crate::domain::model::{CellValue, Table};
use crate::domain::ports::WorkbookStore;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::sheet_name_problem;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

type RawSheet = (String, Vec<Vec<CellValue>>);

/// Workbook store on the local filesystem: calamine for reading,
/// rust_xlsxwriter for writing, csv for `.csv` report files.
#[derive(Debug, Clone, Default)]
pub struct XlsxStore;

impl XlsxStore {
    pub fn new() -> Self {
        Self
    }
}

impl WorkbookStore for XlsxStore {
    async fn sheet_names(&self, path: &Path) -> Result<Vec<String>> {
        ensure_exists(path)?;
        let workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
        Ok(workbook.sheet_names().to_vec())
    }

    async fn open_table(&self, path: &Path, sheet: &str) -> Result<Table> {
        ensure_exists(path)?;
        let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
        if !workbook.sheet_names().iter().any(|s| s == sheet) {
            return Err(EtlError::SourceNotFound {
                path: format!("{} [sheet '{}']", path.display(), sheet),
            });
        }

        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| read_error(path, e))?;
        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(data_to_cell_value).collect())
            .collect();

        let table = table_from_rows(sheet, rows);
        tracing::debug!(
            "Read sheet '{}' from {}: {} rows, {} columns",
            sheet,
            path.display(),
            table.rows.len(),
            table.columns.len()
        );
        Ok(table)
    }

    async fn open_all_sheets(&self, path: &Path) -> Result<IndexMap<String, Table>> {
        ensure_exists(path)?;
        Ok(read_raw_sheets(path)?
            .into_iter()
            .map(|(name, rows)| {
                let table = table_from_rows(&name, rows);
                (name, table)
            })
            .collect())
    }

    async fn append_sheets(&self, path: &Path, tables: &[Table]) -> Result<()> {
        if !path.exists() {
            return Err(output_invalid(path, "file does not exist"));
        }
        if !is_workbook(path) {
            return Err(output_invalid(
                path,
                "sheets can only be appended to .xlsx or .xlsm workbooks",
            ));
        }

        let existing = read_raw_sheets(path)?;
        let mut taken: HashSet<String> = existing.iter().map(|(n, _)| n.to_lowercase()).collect();
        for table in tables {
            check_sheet_name(path, &table.name)?;
            if !taken.insert(table.name.to_lowercase()) {
                return Err(output_invalid(
                    path,
                    &format!("worksheet '{}' already exists", table.name),
                ));
            }
        }

        let mut workbook = Workbook::new();
        for (name, rows) in &existing {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(name).map_err(|e| write_error(path, e))?;
            for (row_idx, row) in rows.iter().enumerate() {
                write_row(worksheet, path, row_idx, row.iter())?;
            }
        }
        for table in tables {
            let worksheet = workbook.add_worksheet();
            write_table(worksheet, path, &table.name, table)?;
        }

        save_atomically(path, |tmp| {
            workbook.save(tmp).map_err(|e| write_error(path, e))
        })?;

        tracing::info!(
            "📝 Appended {} worksheet(s) to {}",
            tables.len(),
            path.display()
        );
        Ok(())
    }

    async fn write_new_file(&self, path: &Path, sheet_name: &str, table: &Table) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                return Err(output_invalid(path, "output directory does not exist"));
            }
            _ => {}
        }

        if is_csv(path) {
            save_atomically(path, |tmp| write_csv(tmp, table))?;
        } else {
            check_sheet_name(path, sheet_name)?;
            let mut workbook = Workbook::new();
            let worksheet = workbook.add_worksheet();
            write_table(worksheet, path, sheet_name, table)?;
            save_atomically(path, |tmp| {
                workbook.save(tmp).map_err(|e| write_error(path, e))
            })?;
        }

        tracing::info!("📝 Wrote {} rows to {}", table.rows.len(), path.display());
        Ok(())
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(EtlError::SourceNotFound {
            path: path.display().to_string(),
        })
    }
}

fn read_raw_sheets(path: &Path) -> Result<Vec<RawSheet>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
    let names = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| read_error(path, e))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(data_to_cell_value).collect())
            .collect();
        sheets.push((name, rows));
    }
    Ok(sheets)
}

/// First row becomes the header. Blank headers are named `Unnamed: <index>` and
/// repeated ones get a `.1`, `.2` suffix; fully blank rows are skipped.
fn table_from_rows(name: &str, rows: Vec<Vec<CellValue>>) -> Table {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Table::new(name, Vec::new());
    };

    let mut seen: HashSet<String> = HashSet::new();
    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = if cell.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                cell.to_string()
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, n);
                n += 1;
            }
            candidate
        })
        .collect();

    Table::from_rows(
        name,
        columns,
        rows.filter(|row| row.iter().any(|cell| !cell.is_empty())),
    )
}

fn data_to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(format!("#{:?}", e)),
    }
}

/// Excel serial dates count days from 1899-12-30 (1900 date system).
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

// 與 TIMESTAMP_FORMAT 相同的顯示格式
const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

fn write_table(worksheet: &mut Worksheet, path: &Path, sheet_name: &str, table: &Table) -> Result<()> {
    worksheet
        .set_name(sheet_name)
        .map_err(|e| write_error(path, e))?;

    for (col_idx, column) in table.columns.iter().enumerate() {
        let col = column_index(path, col_idx)?;
        worksheet
            .write_string(0, col, column)
            .map_err(|e| write_error(path, e))?;
    }
    for (row_idx, record) in table.rows.iter().enumerate() {
        write_row(worksheet, path, row_idx + 1, table.row_cells(record))?;
    }
    Ok(())
}

fn write_row<'a>(
    worksheet: &mut Worksheet,
    path: &Path,
    row_idx: usize,
    cells: impl Iterator<Item = &'a CellValue>,
) -> Result<()> {
    let row = u32::try_from(row_idx).map_err(|_| output_invalid(path, "too many rows"))?;
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    for (col_idx, cell) in cells.enumerate() {
        let col = column_index(path, col_idx)?;
        let written = match cell {
            CellValue::Empty => continue,
            CellValue::Bool(b) => worksheet.write_boolean(row, col, *b).map(|_| ()),
            // Excel 以 f64 儲存數字
            CellValue::Int(i) => worksheet.write_number(row, col, *i as f64).map(|_| ()),
            CellValue::Float(f) if !f.is_finite() => continue,
            CellValue::Float(f) => worksheet.write_number(row, col, *f).map(|_| ()),
            CellValue::String(s) => worksheet.write_string(row, col, s).map(|_| ()),
            CellValue::DateTime(dt) => worksheet
                .write_datetime_with_format(row, col, dt, &date_format)
                .map(|_| ()),
        };
        written.map_err(|e| write_error(path, e))?;
    }
    Ok(())
}

fn column_index(path: &Path, col_idx: usize) -> Result<u16> {
    u16::try_from(col_idx).map_err(|_| output_invalid(path, "too many columns"))
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for record in &table.rows {
        writer.write_record(table.row_cells(record).map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write to a sibling temp file, then rename over the target.
fn save_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = temp_path(path);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Workbooks that can be rewritten with an extra sheet.
fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn check_sheet_name(path: &Path, name: &str) -> Result<()> {
    match sheet_name_problem(name) {
        Some(reason) => Err(output_invalid(path, &format!("sheet name '{}' {}", name, reason))),
        None => Ok(()),
    }
}

fn output_invalid(path: &Path, reason: &str) -> EtlError {
    EtlError::OutputTargetInvalid {
        target: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> EtlError {
    EtlError::WorkbookError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn write_error(path: &Path, e: rust_xlsxwriter::XlsxError) -> EtlError {
    EtlError::WriteError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
