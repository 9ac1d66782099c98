//! Translation dictionary: one `Header` group renaming columns plus one value
//! group per translated column.
//!
//! A value group may be named after the column's source-language header or its
//! translated header. Both spellings are canonicalized to the translated header
//! when the dictionary is built, so lookups always use post-rename names.

use crate::domain::model::Table;
use crate::domain::ports::WorkbookStore;
use crate::utils::error::{EtlError, Result};
use indexmap::IndexMap;
use std::path::Path;

pub const HEADER_GROUP: &str = "Header";

pub type Mapping = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationDictionary {
    header: Mapping,
    groups: IndexMap<String, Mapping>,
}

impl TranslationDictionary {
    /// Validate group names against `header` and key the groups by translated column name.
    pub fn new(header: Mapping, groups: IndexMap<String, Mapping>) -> Result<Self> {
        let mut canonical: IndexMap<String, Mapping> = IndexMap::new();

        for (name, mapping) in groups {
            let column = if header.values().any(|target| *target == name) {
                name.clone()
            } else if let Some(target) = header.get(&name) {
                target.clone()
            } else {
                return Err(EtlError::MalformedSource {
                    sheet: name,
                    reason: format!(
                        "group name is neither a source nor a translated column of the '{}' sheet",
                        HEADER_GROUP
                    ),
                });
            };

            if canonical.contains_key(&column) {
                return Err(EtlError::MalformedSource {
                    sheet: name,
                    reason: format!("column '{}' already has a value group", column),
                });
            }
            canonical.insert(column, mapping);
        }

        Ok(Self {
            header,
            groups: canonical,
        })
    }

    /// Build from workbook sheets: sheet name is the group, first two columns are key and value.
    pub fn from_tables(tables: IndexMap<String, Table>) -> Result<Self> {
        let mut header = None;
        let mut groups = IndexMap::new();

        for (sheet, table) in tables {
            let mapping = sheet_mapping(&sheet, &table)?;
            if sheet == HEADER_GROUP {
                header = Some(mapping);
            } else {
                groups.insert(sheet, mapping);
            }
        }

        let header = header.ok_or_else(|| EtlError::MalformedSource {
            sheet: HEADER_GROUP.to_string(),
            reason: "sheet is missing".to_string(),
        })?;

        Self::new(header, groups)
    }

    pub fn header(&self) -> &Mapping {
        &self.header
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &Mapping)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Value group for a translated column name.
    pub fn group(&self, column: &str) -> Option<&Mapping> {
        self.groups.get(column)
    }

    pub fn translate_header(&self, source: &str) -> Option<&str> {
        self.header.get(source).map(String::as_str)
    }

    /// Source header for a translated one; first match wins when several map to it.
    pub fn reverse_header(&self, target: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(_, t)| *t == target)
            .map(|(source, _)| source.as_str())
    }

    pub fn insert_header(&mut self, source: &str, target: &str) {
        self.header.insert(source.to_string(), target.to_string());
    }

    /// Add a value translation for a translated column name, creating its group if needed.
    pub fn insert_value(&mut self, column: &str, source: &str, target: &str) {
        self.groups
            .entry(column.to_string())
            .or_default()
            .insert(source.to_string(), target.to_string());
    }

    pub fn translate_value(&self, column: &str, value: &str) -> Option<&str> {
        self.group(column)
            .and_then(|mapping| mapping.get(value))
            .map(String::as_str)
    }
}

fn sheet_mapping(sheet: &str, table: &Table) -> Result<Mapping> {
    let (key_column, value_column) = match table.columns.as_slice() {
        [key, value, ..] => (key, value),
        _ => {
            return Err(EtlError::MalformedSource {
                sheet: sheet.to_string(),
                reason: format!("expected at least 2 columns, found {}", table.columns.len()),
            })
        }
    };

    let mut mapping = Mapping::new();
    for record in &table.rows {
        let key = record.value(key_column);
        let value = record.value(value_column);
        if key.is_empty() || value.is_empty() {
            continue;
        }
        // 重複的 key 以最後一筆為準
        mapping.insert(key.to_string(), value.to_string());
    }
    Ok(mapping)
}

pub async fn load_dictionary<S: WorkbookStore>(store: &S, path: &Path) -> Result<TranslationDictionary> {
    tracing::debug!("Loading translation source: {}", path.display());
    let sheets = store.open_all_sheets(path).await?;
    let dictionary = TranslationDictionary::from_tables(sheets)?;

    tracing::info!(
        "📖 Loaded {} header translations and {} value groups from {}",
        dictionary.header.len(),
        dictionary.groups.len(),
        path.display()
    );
    Ok(dictionary)
}
