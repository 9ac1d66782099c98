use crate::core::schema::SourceSchema;
use crate::domain::model::{Extracted, NewFileTarget, Table, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::Path;

/// Workbook access. Tables are read with their first row as headers.
pub trait WorkbookStore: Send + Sync {
    fn sheet_names(&self, path: &Path)
        -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    fn open_table(
        &self,
        path: &Path,
        sheet: &str,
    ) -> impl std::future::Future<Output = Result<Table>> + Send;

    fn open_all_sheets(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<IndexMap<String, Table>>> + Send;

    /// Append every table as a new sheet named after `Table::name`, in one write.
    fn append_sheets(
        &self,
        path: &Path,
        tables: &[Table],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn write_new_file(
        &self,
        path: &Path,
        sheet_name: &str,
        table: &Table,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn append_sheet(
        &self,
        path: &Path,
        sheet_name: &str,
        table: &Table,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        async move {
            let named = table.clone().with_name(sheet_name);
            self.append_sheets(path, std::slice::from_ref(&named)).await
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn source_file(&self) -> &Path;
    fn sheet_name(&self) -> &str;
    fn translation_source(&self) -> &Path;
    fn already_translated(&self) -> bool;
    fn save_translations(&self) -> bool;
    fn translate_only(&self) -> bool;
    /// Sheet name for appending the report to the source file.
    fn append_target(&self) -> Option<&str>;
    fn new_file_target(&self) -> Option<NewFileTarget>;
    fn schema(&self) -> &SourceSchema;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Extracted>;
    async fn transform(&self, data: Extracted) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
