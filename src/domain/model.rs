use crate::core::dictionary::TranslationDictionary;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Timestamp layout used by the billing export and by the report.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static EMPTY_CELL: CellValue = CellValue::Empty;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 以顯示字串比對，數字儲存格 `1.0` 與字串 `"1"` 視為相同
    pub fn matches(&self, text: &str) -> bool {
        match self {
            CellValue::String(s) => s == text,
            CellValue::Empty => false,
            other => other.to_string() == text,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{}", *v as i64)
            }
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::String(s) => f.write_str(s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub data: HashMap<String, CellValue>,
}

impl Record {
    /// Missing columns read as an empty cell.
    pub fn value(&self, column: &str) -> &CellValue {
        self.data.get(column).unwrap_or(&EMPTY_CELL)
    }
}

/// One worksheet: ordered column names plus rows keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from positional rows; extra cells beyond the header are dropped.
    pub fn from_rows<I, R>(name: impl Into<String>, columns: Vec<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = CellValue>,
    {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row<R: IntoIterator<Item = CellValue>>(&mut self, row: R) {
        let data = self
            .columns
            .iter()
            .cloned()
            .zip(row)
            .collect::<HashMap<_, _>>();
        self.rows.push(Record { data });
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Cells in column order, empty where a record lacks the column.
    pub fn row_cells<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = &'a CellValue> + 'a {
        self.columns.iter().map(move |c| record.value(c))
    }
}

/// Request for the sink to persist the translated table next to the source sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest {
    pub sheet_name: String,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReportRow {
    pub project_id: CellValue,
    pub resource_id: CellValue,
    pub resource_name: CellValue,
    pub resource_type: CellValue,
    pub region: CellValue,
    pub billing_method: CellValue,
    pub configuration: CellValue,
    pub order_start_time: NaiveDateTime,
    pub order_end_time: NaiveDateTime,
    pub duration_hours: f64,
    /// `None` when the duration rounds to zero.
    pub unit_price: Option<f64>,
    pub usage_total: f64,
}

impl SalesReportRow {
    fn into_cells(self) -> Vec<CellValue> {
        vec![
            self.project_id,
            self.resource_id,
            self.resource_name,
            self.resource_type,
            self.region,
            self.billing_method,
            self.configuration,
            CellValue::DateTime(self.order_start_time),
            CellValue::DateTime(self.order_end_time),
            CellValue::Float(self.duration_hours),
            self.unit_price.map(CellValue::Float).unwrap_or(CellValue::Empty),
            CellValue::Float(self.usage_total),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    /// The twelve report headers, in output order.
    pub columns: Vec<String>,
    pub rows: Vec<SalesReportRow>,
}

impl SalesReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_table(&self, sheet_name: &str) -> Table {
        Table::from_rows(
            sheet_name,
            self.columns.clone(),
            self.rows.iter().cloned().map(SalesReportRow::into_cells),
        )
    }
}

/// Destination for a report written into a brand-new workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileTarget {
    pub path: PathBuf,
    pub sheet_name: String,
}

/// Everything read from disk for one run.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub table: Table,
    pub dictionary: TranslationDictionary,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: Table,
    pub copy_request: Option<CopyRequest>,
    pub report: Option<SalesReport>,
}
