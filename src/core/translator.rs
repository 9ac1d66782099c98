use crate::core::dictionary::TranslationDictionary;
use crate::domain::model::{CellValue, CopyRequest, Table};
use std::collections::HashMap;

pub const TRANSLATED_SHEET_SUFFIX: &str = "_translated";

#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub table: Table,
    /// Present when a translated copy was requested; writing it is the caller's job.
    pub copy_request: Option<CopyRequest>,
}

/// Rename headers through the `Header` group, then replace cell values of every
/// column that has a value group. Unknown headers and unmapped values pass through.
pub fn translate(table: Table, dictionary: &TranslationDictionary, emit_copy: bool) -> Translated {
    let original_sheet = table.name.clone();
    let mut table = rename_columns(table, dictionary);

    for (column, mapping) in dictionary.groups() {
        if !table.has_column(column) {
            continue;
        }

        let mut replaced = 0usize;
        let mut untouched = 0usize;
        for record in &mut table.rows {
            let Some(cell) = record.data.get_mut(column) else {
                continue;
            };
            if cell.is_empty() {
                continue;
            }
            match mapping.get(&cell.to_string()) {
                Some(target) => {
                    *cell = CellValue::String(target.clone());
                    replaced += 1;
                }
                None => untouched += 1,
            }
        }

        tracing::debug!(
            "Column '{}': {} values translated, {} left as-is",
            column,
            replaced,
            untouched
        );
    }

    let copy_request = emit_copy.then(|| {
        let sheet_name = format!("{}{}", original_sheet, TRANSLATED_SHEET_SUFFIX);
        CopyRequest {
            table: table.clone().with_name(sheet_name.clone()),
            sheet_name,
        }
    });

    tracing::info!(
        "🌐 Translated sheet '{}' ({} rows, {} columns)",
        original_sheet,
        table.rows.len(),
        table.columns.len()
    );

    Translated {
        table,
        copy_request,
    }
}

fn rename_columns(table: Table, dictionary: &TranslationDictionary) -> Table {
    let renames: HashMap<&str, &str> = table
        .columns
        .iter()
        .filter_map(|c| {
            dictionary
                .translate_header(c)
                .map(|target| (c.as_str(), target))
        })
        .collect();

    let mut columns: Vec<String> = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let renamed = renames.get(column.as_str()).copied().unwrap_or(column.as_str());
        if columns.iter().any(|c| c == renamed) {
            // 後出現的欄位值覆蓋前者
            tracing::warn!("Column '{}' maps onto an existing column '{}'", column, renamed);
            continue;
        }
        columns.push(renamed.to_string());
    }

    let rows = table
        .rows
        .into_iter()
        .map(|mut record| {
            let mut data = HashMap::with_capacity(record.data.len());
            for column in &table.columns {
                if let Some(cell) = record.data.remove(column) {
                    let renamed = renames.get(column.as_str()).copied().unwrap_or(column.as_str());
                    data.insert(renamed.to_string(), cell);
                }
            }
            record.data = data;
            record
        })
        .collect();

    Table {
        name: table.name,
        columns,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn dictionary() -> TranslationDictionary {
        let header = IndexMap::from([
            ("资源ID".to_string(), "Resource ID".to_string()),
            ("计费类型".to_string(), "Billing Method".to_string()),
        ]);
        let groups = IndexMap::from([(
            "计费类型".to_string(),
            IndexMap::from([
                ("按月".to_string(), "Monthly".to_string()),
                ("按量".to_string(), "Hourly".to_string()),
            ]),
        )]);
        TranslationDictionary::new(header, groups).unwrap()
    }

    fn raw_table() -> Table {
        Table::from_rows(
            "账单",
            vec![
                "资源ID".to_string(),
                "计费类型".to_string(),
                "备注".to_string(),
            ],
            vec![
                vec!["ins-1".into(), "按月".into(), "按月".into()],
                vec!["ins-2".into(), "竞价".into(), "x".into()],
            ],
        )
    }

    #[test]
    fn test_only_header_keys_are_renamed() {
        let translated = translate(raw_table(), &dictionary(), false);

        assert_eq!(
            translated.table.columns,
            vec!["Resource ID", "Billing Method", "备注"]
        );
        assert_eq!(translated.table.rows[0].value("Resource ID"), &CellValue::from("ins-1"));
        assert!(translated.copy_request.is_none());
    }

    #[test]
    fn test_values_replaced_only_in_grouped_column() {
        let translated = translate(raw_table(), &dictionary(), false);
        let first = &translated.table.rows[0];

        assert_eq!(first.value("Billing Method"), &CellValue::from("Monthly"));
        // 未列入字典的欄位不做值替換
        assert_eq!(first.value("备注"), &CellValue::from("按月"));
    }

    #[test]
    fn test_unmapped_value_is_left_untouched() {
        let translated = translate(raw_table(), &dictionary(), false);
        assert_eq!(
            translated.table.rows[1].value("Billing Method"),
            &CellValue::from("竞价")
        );
    }

    #[test]
    fn test_copy_request_uses_translated_suffix() {
        let translated = translate(raw_table(), &dictionary(), true);
        let copy = translated.copy_request.unwrap();

        assert_eq!(copy.sheet_name, "账单_translated");
        assert_eq!(copy.table.name, "账单_translated");
        assert_eq!(copy.table.columns, translated.table.columns);
        assert_eq!(copy.table.rows, translated.table.rows);
    }

    #[test]
    fn test_rows_with_missing_cells_are_kept() {
        let mut table = raw_table();
        table.push_row(vec![CellValue::from("ins-3")]);

        let translated = translate(table, &dictionary(), false);
        assert_eq!(translated.table.rows.len(), 3);
        assert!(translated.table.rows[2].value("Billing Method").is_empty());
    }

    #[test]
    fn test_header_round_trip() {
        let dictionary = dictionary();
        let original = raw_table().columns;
        let translated = translate(raw_table(), &dictionary, false);

        let recovered: Vec<String> = translated
            .table
            .columns
            .iter()
            .map(|c| dictionary.reverse_header(c).unwrap_or(c.as_str()).to_string())
            .collect();
        assert_eq!(recovered, original);
    }
}
