use crate::core::schema::ReportColumns;
use crate::domain::model::{CellValue, Record, SalesReport, SalesReportRow, Table, TIMESTAMP_FORMAT};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;

/// Per-resource sales report for all non-monthly rows of `table`.
pub fn aggregate(table: &Table, columns: &ReportColumns) -> Result<SalesReport> {
    for required in [
        &columns.resource_id,
        &columns.billing_method,
        &columns.order_start_time,
        &columns.order_end_time,
        &columns.usage_total,
    ] {
        if !table.has_column(required) {
            return Err(EtlError::MissingColumn {
                column: required.clone(),
            });
        }
    }

    let mut groups: IndexMap<ResourceKey, Vec<&Record>> = IndexMap::new();
    let mut monthly = 0usize;
    let mut without_id = 0usize;

    for record in &table.rows {
        if record
            .value(&columns.billing_method)
            .matches(&columns.monthly_value)
        {
            monthly += 1;
            continue;
        }
        let resource_id = record.value(&columns.resource_id);
        if resource_id.is_empty() {
            without_id += 1;
            continue;
        }
        groups
            .entry(ResourceKey::of(resource_id))
            .or_default()
            .push(record);
    }

    tracing::debug!(
        "Skipped {} monthly rows and {} rows without a resource ID",
        monthly,
        without_id
    );

    let rows = groups
        .iter()
        .map(|(resource_id, rows)| summarize_group(resource_id.as_str(), rows, columns))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        "📊 Aggregated {} billing rows into {} resources",
        table.rows.len() - monthly - without_id,
        rows.len()
    );

    Ok(SalesReport {
        columns: columns.report_headers(),
        rows,
    })
}

/// Grouping key for a Resource ID cell. Text and numeric cells never merge,
/// while `1` and `1.0` do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ResourceKey {
    Text(String),
    Value(String),
}

impl ResourceKey {
    fn of(cell: &CellValue) -> Self {
        match cell {
            CellValue::String(s) => ResourceKey::Text(s.clone()),
            other => ResourceKey::Value(other.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            ResourceKey::Text(s) | ResourceKey::Value(s) => s,
        }
    }
}

fn summarize_group(
    resource_id: &str,
    rows: &[&Record],
    columns: &ReportColumns,
) -> Result<SalesReportRow> {
    // 每個分組至少有一筆
    let first = rows[0];
    let last = rows[rows.len() - 1];

    // 刪除退費時以該筆的起始時間作為實際結束時間
    let refunded = last
        .value(&columns.order_type)
        .matches(&columns.delete_refund_value);
    let end_cell = if refunded {
        last.value(&columns.order_start_time)
    } else {
        last.value(&columns.order_end_time)
    };

    let order_start_time = parse_timestamp(first.value(&columns.order_start_time), resource_id)?;
    let order_end_time = parse_timestamp(end_cell, resource_id)?;

    let seconds = (order_end_time - order_start_time).num_seconds();
    let duration_hours = round2(seconds as f64 / 3600.0);

    let mut usage_total = 0.0;
    for record in rows {
        usage_total += parse_amount(
            record.value(&columns.usage_total),
            &columns.usage_total,
            resource_id,
        )?;
    }

    let unit_price = if duration_hours == 0.0 {
        tracing::warn!(
            "Resource '{}' has a zero duration; unit price left empty",
            resource_id
        );
        None
    } else {
        Some(round2(usage_total / duration_hours))
    };

    tracing::debug!(
        "Resource '{}': {} rows, {} → {} ({} h){}",
        resource_id,
        rows.len(),
        order_start_time,
        order_end_time,
        duration_hours,
        if refunded { ", ended by refund" } else { "" }
    );

    Ok(SalesReportRow {
        project_id: first.value(&columns.project_id).clone(),
        resource_id: first.value(&columns.resource_id).clone(),
        resource_name: first.value(&columns.resource_name).clone(),
        resource_type: first.value(&columns.resource_type).clone(),
        region: first.value(&columns.region).clone(),
        billing_method: first.value(&columns.billing_method).clone(),
        configuration: first.value(&columns.configuration).clone(),
        order_start_time,
        order_end_time,
        duration_hours,
        unit_price,
        usage_total,
    })
}

/// Accepts native spreadsheet date cells or text in `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(cell: &CellValue, resource_id: &str) -> Result<NaiveDateTime> {
    let parsed = match cell {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::String(s) => NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| EtlError::TimestampParseError {
        value: cell.to_string(),
        resource_id: resource_id.to_string(),
    })
}

fn parse_amount(cell: &CellValue, column: &str, resource_id: &str) -> Result<f64> {
    match cell {
        CellValue::Empty => Ok(0.0),
        CellValue::Int(_) | CellValue::Float(_) => Ok(cell.as_f64().unwrap_or_default()),
        CellValue::String(s) if s.trim().is_empty() => Ok(0.0),
        CellValue::String(s) => s.trim().parse::<f64>().map_err(|_| EtlError::NumericParseError {
            column: column.to_string(),
            value: s.clone(),
            resource_id: resource_id.to_string(),
        }),
        other => Err(EtlError::NumericParseError {
            column: column.to_string(),
            value: other.to_string(),
            resource_id: resource_id.to_string(),
        }),
    }
}

/// Two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
