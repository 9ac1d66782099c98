use crate::core::dictionary::{load_dictionary, TranslationDictionary};
use crate::core::aggregator::aggregate;
use crate::core::resolution::{ResolutionCache, ResolutionStrategy, Resolver, StrictResolution};
use crate::core::schema::ReportColumns;
use crate::core::translator::translate;
use crate::core::{ConfigProvider, Pipeline, WorkbookStore};
use crate::domain::model::{Extracted, NewFileTarget, Table, TransformResult};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::sheet_name_problem;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Translate the billing sheet, summarise it per resource and write the outputs
/// the config asks for.
pub struct SalesReportPipeline<S: WorkbookStore, C: ConfigProvider> {
    store: S,
    config: C,
    strategy: Mutex<Box<dyn ResolutionStrategy + Send>>,
}

impl<S: WorkbookStore, C: ConfigProvider> SalesReportPipeline<S, C> {
    /// Missing translations fail the run.
    pub fn new(store: S, config: C) -> Self {
        Self::with_resolution(store, config, StrictResolution)
    }

    pub fn with_resolution(
        store: S,
        config: C,
        strategy: impl ResolutionStrategy + Send + 'static,
    ) -> Self {
        Self {
            store,
            config,
            strategy: Mutex::new(Box::new(strategy)),
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Resolve the columns and codes the report needs, then fold any answers from the
    /// strategy into `dictionary` so the translation step uses them as well.
    fn resolve_columns(&self, dictionary: &mut TranslationDictionary) -> Result<ReportColumns> {
        let mut strategy = self.strategy.lock().unwrap_or_else(PoisonError::into_inner);
        // 每次執行使用新的快取
        let mut cache = ResolutionCache::default();
        let mut resolver = Resolver::new(dictionary, &mut **strategy, &mut cache);

        let columns = ReportColumns::resolve(self.config.schema(), &mut resolver)?;
        if !cache.is_empty() {
            tracing::info!("🧩 {} translation(s) supplied during this run", cache.len());
            cache.apply_to(dictionary);
        }

        Ok(columns)
    }
}

#[async_trait::async_trait]
impl<S: WorkbookStore, C: ConfigProvider> Pipeline for SalesReportPipeline<S, C> {
    async fn extract(&self) -> Result<Extracted> {
        let dictionary = load_dictionary(&self.store, self.config.translation_source()).await?;
        let table = self
            .store
            .open_table(self.config.source_file(), self.config.sheet_name())
            .await?;

        Ok(Extracted { table, dictionary })
    }

    async fn transform(&self, data: Extracted) -> Result<TransformResult> {
        let Extracted {
            table,
            mut dictionary,
        } = data;
        let translate_only = self.config.translate_only();

        // 必要的翻譯先補齊，再進行翻譯
        let columns = if translate_only {
            None
        } else {
            Some(self.resolve_columns(&mut dictionary)?)
        };

        let (table, copy_request) = if self.config.already_translated() {
            tracing::info!("⏭️ Sheet '{}' is already translated", table.name);
            (table, None)
        } else {
            let emit_copy = self.config.save_translations() || translate_only;
            let translated = translate(table, &dictionary, emit_copy);
            (translated.table, translated.copy_request)
        };

        let report = columns
            .map(|columns| aggregate(&table, &columns))
            .transpose()?;

        Ok(TransformResult {
            table,
            copy_request,
            report,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let source = self.config.source_file();

        // 先收集所有輸出，全部檢查通過後才寫檔
        let mut appended: Vec<Table> = Vec::new();
        if let Some(copy) = result.copy_request {
            appended.push(copy.table.with_name(copy.sheet_name));
        }

        let mut new_file: Option<(NewFileTarget, Table)> = None;
        if let Some(report) = &result.report {
            if let Some(sheet) = self.config.append_target() {
                appended.push(report.to_table(sheet));
            }
            if let Some(target) = self.config.new_file_target() {
                let table = report.to_table(&target.sheet_name);
                new_file = Some((target, table));
            }
        }

        if !appended.is_empty() {
            let existing = self.store.sheet_names(source).await?;
            check_appended_names(source, &existing, &appended)?;
        }
        if let Some((target, _)) = &new_file {
            if target.path == source {
                return Err(EtlError::OutputTargetInvalid {
                    target: target.path.display().to_string(),
                    reason: "new file would overwrite the source workbook".to_string(),
                });
            }
        }

        let mut written = Vec::new();
        if !appended.is_empty() {
            self.store.append_sheets(source, &appended).await?;
            let names: Vec<&str> = appended.iter().map(|t| t.name.as_str()).collect();
            written.push(format!("{} [{}]", source.display(), names.join(", ")));
        }
        if let Some((target, table)) = &new_file {
            self.store
                .write_new_file(&target.path, &target.sheet_name, table)
                .await?;
            written.push(format!("{} [{}]", target.path.display(), target.sheet_name));
        }

        if written.is_empty() {
            tracing::warn!("⚠️ No output was requested, nothing written");
            return Ok("nothing written".to_string());
        }
        Ok(written.join("; "))
    }
}

fn check_appended_names(source: &std::path::Path, existing: &[String], appended: &[Table]) -> Result<()> {
    let invalid = |reason: String| EtlError::OutputTargetInvalid {
        target: source.display().to_string(),
        reason,
    };

    // Excel 工作表名稱不分大小寫
    let mut taken: HashSet<String> = existing.iter().map(|n| n.to_lowercase()).collect();
    for table in appended {
        if let Some(problem) = sheet_name_problem(&table.name) {
            return Err(invalid(format!("sheet name '{}' {}", table.name, problem)));
        }
        if !taken.insert(table.name.to_lowercase()) {
            return Err(invalid(format!("worksheet '{}' already exists", table.name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolution::MissingTranslation;
    use crate::core::schema::SourceSchema;
    use crate::domain::model::CellValue;
    use indexmap::IndexMap;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    type Workbooks = HashMap<PathBuf, IndexMap<String, Table>>;

    #[derive(Clone, Default)]
    struct MockStore {
        files: Arc<AsyncMutex<Workbooks>>,
    }

    impl MockStore {
        async fn put(&self, path: &str, tables: Vec<Table>) {
            let mut files = self.files.lock().await;
            let sheets = tables.into_iter().map(|t| (t.name.clone(), t)).collect();
            files.insert(PathBuf::from(path), sheets);
        }

        async fn sheets(&self, path: &str) -> Vec<String> {
            let files = self.files.lock().await;
            files
                .get(Path::new(path))
                .map(|sheets| sheets.keys().cloned().collect())
                .unwrap_or_default()
        }

        async fn table(&self, path: &str, sheet: &str) -> Option<Table> {
            let files = self.files.lock().await;
            files.get(Path::new(path))?.get(sheet).cloned()
        }
    }

    impl WorkbookStore for MockStore {
        async fn sheet_names(&self, path: &Path) -> Result<Vec<String>> {
            let files = self.files.lock().await;
            files
                .get(path)
                .map(|sheets| sheets.keys().cloned().collect())
                .ok_or_else(|| EtlError::SourceNotFound {
                    path: path.display().to_string(),
                })
        }

        async fn open_table(&self, path: &Path, sheet: &str) -> Result<Table> {
            let files = self.files.lock().await;
            files
                .get(path)
                .and_then(|sheets| sheets.get(sheet))
                .cloned()
                .ok_or_else(|| EtlError::SourceNotFound {
                    path: format!("{} [{}]", path.display(), sheet),
                })
        }

        async fn open_all_sheets(&self, path: &Path) -> Result<IndexMap<String, Table>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| EtlError::SourceNotFound {
                path: path.display().to_string(),
            })
        }

        async fn append_sheets(&self, path: &Path, tables: &[Table]) -> Result<()> {
            let mut files = self.files.lock().await;
            let sheets = files.get_mut(path).ok_or_else(|| EtlError::OutputTargetInvalid {
                target: path.display().to_string(),
                reason: "file does not exist".to_string(),
            })?;
            for table in tables {
                sheets.insert(table.name.clone(), table.clone());
            }
            Ok(())
        }

        async fn write_new_file(&self, path: &Path, sheet_name: &str, table: &Table) -> Result<()> {
            let mut files = self.files.lock().await;
            let sheets = IndexMap::from([(
                sheet_name.to_string(),
                table.clone().with_name(sheet_name),
            )]);
            files.insert(path.to_path_buf(), sheets);
            Ok(())
        }
    }

    struct MockConfig {
        source_file: PathBuf,
        sheet_name: String,
        translation_source: PathBuf,
        already_translated: bool,
        save_translations: bool,
        translate_only: bool,
        append_target: Option<String>,
        new_file_target: Option<NewFileTarget>,
        schema: SourceSchema,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                source_file: PathBuf::from("billing.xlsx"),
                sheet_name: "账单".to_string(),
                translation_source: PathBuf::from("Language Translation.xlsx"),
                already_translated: false,
                save_translations: false,
                translate_only: false,
                append_target: Some("Monthly Sales Calculations".to_string()),
                new_file_target: Some(NewFileTarget {
                    path: PathBuf::from("Result.xlsx"),
                    sheet_name: "Sheet1".to_string(),
                }),
                schema: SourceSchema::default(),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn source_file(&self) -> &Path {
            &self.source_file
        }

        fn sheet_name(&self) -> &str {
            &self.sheet_name
        }

        fn translation_source(&self) -> &Path {
            &self.translation_source
        }

        fn already_translated(&self) -> bool {
            self.already_translated
        }

        fn save_translations(&self) -> bool {
            self.save_translations
        }

        fn translate_only(&self) -> bool {
            self.translate_only
        }

        fn append_target(&self) -> Option<&str> {
            self.append_target.as_deref()
        }

        fn new_file_target(&self) -> Option<NewFileTarget> {
            self.new_file_target.clone()
        }

        fn schema(&self) -> &SourceSchema {
            &self.schema
        }
    }

    const HEADER_PAIRS: [(&str, &str); 13] = [
        ("项目", "Project ID"),
        ("资源ID", "Resource ID"),
        ("标识", "Resource Name"),
        ("资源类型", "Resource Type"),
        ("数据中心", "Region"),
        ("计费类型", "Billing Method"),
        ("配置", "Configuration"),
        ("订单类型", "Order Type"),
        ("订单起始时间", "Order Start Time"),
        ("订单结束时间", "Order End Time"),
        ("订单原价", "Unit Price"),
        ("消费原价", "Usage Total"),
        ("备注", "Remarks"),
    ];

    fn pairs_table(name: &str, pairs: &[(&str, &str)]) -> Table {
        Table::from_rows(
            name,
            vec!["Source".to_string(), "Target".to_string()],
            pairs
                .iter()
                .map(|(k, v)| vec![CellValue::from(*k), CellValue::from(*v)]),
        )
    }

    fn dictionary_sheets(header: &[(&str, &str)]) -> Vec<Table> {
        vec![
            pairs_table("Header", header),
            pairs_table("计费类型", &[("按月", "Monthly"), ("按量", "Hourly")]),
            pairs_table("Order Type", &[("删除退费", "Delete/Refund"), ("新购", "New")]),
        ]
    }

    fn billing_row(id: &str, billing: &str, order: &str, start: &str, end: &str, usage: f64) -> Vec<CellValue> {
        vec![
            "proj-a".into(),
            id.into(),
            format!("{}-name", id).into(),
            "CVM".into(),
            "ap-guangzhou".into(),
            billing.into(),
            "2C4G".into(),
            order.into(),
            start.into(),
            end.into(),
            CellValue::Float(99.0),
            usage.into(),
        ]
    }

    fn billing_table(columns: Vec<String>) -> Table {
        Table::from_rows(
            "账单",
            columns,
            vec![
                billing_row("ins-1", "按量", "新购", "2023-01-01 00:00:00", "2023-01-01 12:00:00", 10.0),
                billing_row("ins-2", "按月", "新购", "2023-01-01 00:00:00", "2023-02-01 00:00:00", 300.0),
                billing_row("ins-1", "按量", "删除退费", "2023-01-02 12:00:00", "2023-01-03 00:00:00", 15.5),
            ],
        )
    }

    fn source_columns() -> Vec<String> {
        HEADER_PAIRS[..12].iter().map(|(k, _)| k.to_string()).collect()
    }

    fn translated_columns() -> Vec<String> {
        HEADER_PAIRS[..12].iter().map(|(_, v)| v.to_string()).collect()
    }

    async fn seeded_store(header: &[(&str, &str)]) -> MockStore {
        let store = MockStore::default();
        store
            .put("billing.xlsx", vec![billing_table(source_columns())])
            .await;
        store
            .put("Language Translation.xlsx", dictionary_sheets(header))
            .await;
        store
    }

    async fn run<S: WorkbookStore, C: ConfigProvider>(pipeline: &SalesReportPipeline<S, C>) -> Result<String> {
        let extracted = pipeline.extract().await?;
        let result = pipeline.transform(extracted).await?;
        pipeline.load(result).await
    }

    #[tokio::test]
    async fn test_report_appended_and_written_to_new_file() {
        let store = seeded_store(&HEADER_PAIRS).await;
        let pipeline = SalesReportPipeline::new(store.clone(), MockConfig::new());

        let summary = run(&pipeline).await.unwrap();
        assert!(summary.contains("Monthly Sales Calculations"));
        assert!(summary.contains("Result.xlsx"));

        assert_eq!(
            store.sheets("billing.xlsx").await,
            vec!["账单", "Monthly Sales Calculations"]
        );
        let report = store
            .table("billing.xlsx", "Monthly Sales Calculations")
            .await
            .unwrap();
        assert_eq!(report.columns.len(), 12);
        assert_eq!(report.columns[9], "Duration (Hours)");
        assert_eq!(report.rows.len(), 1);

        let row = &report.rows[0];
        assert_eq!(row.value("Resource ID"), &CellValue::from("ins-1"));
        assert_eq!(row.value("Duration (Hours)"), &CellValue::Float(36.0));
        assert_eq!(row.value("Usage Total"), &CellValue::Float(25.5));
        assert_eq!(row.value("Unit Price"), &CellValue::Float(0.71));

        let new_file = store.table("Result.xlsx", "Sheet1").await.unwrap();
        assert_eq!(new_file.rows, report.rows);
    }

    #[tokio::test]
    async fn test_translated_copy_saved_next_to_source() {
        let store = seeded_store(&HEADER_PAIRS).await;
        let mut config = MockConfig::new();
        config.save_translations = true;
        config.new_file_target = None;
        let pipeline = SalesReportPipeline::new(store.clone(), config);

        run(&pipeline).await.unwrap();

        assert_eq!(
            store.sheets("billing.xlsx").await,
            vec!["账单", "账单_translated", "Monthly Sales Calculations"]
        );
        let copy = store.table("billing.xlsx", "账单_translated").await.unwrap();
        assert_eq!(copy.columns, translated_columns());
        assert_eq!(copy.rows.len(), 3);
        assert_eq!(copy.rows[1].value("Billing Method"), &CellValue::from("Monthly"));
        assert!(store.sheets("Result.xlsx").await.is_empty());
    }

    #[tokio::test]
    async fn test_translate_only_skips_report() {
        let store = seeded_store(&HEADER_PAIRS).await;
        let mut config = MockConfig::new();
        config.translate_only = true;
        let pipeline = SalesReportPipeline::new(store.clone(), config);

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();
        assert!(result.report.is_none());
        assert!(result.copy_request.is_some());

        pipeline.load(result).await.unwrap();
        assert_eq!(
            store.sheets("billing.xlsx").await,
            vec!["账单", "账单_translated"]
        );
        assert!(store.sheets("Result.xlsx").await.is_empty());
    }

    #[tokio::test]
    async fn test_already_translated_sheet_is_aggregated_directly() {
        let store = seeded_store(&HEADER_PAIRS).await;
        store
            .put("billing.xlsx", vec![billing_table(translated_columns())])
            .await;
        let mut config = MockConfig::new();
        config.already_translated = true;
        config.new_file_target = None;
        let pipeline = SalesReportPipeline::new(store.clone(), config);

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();
        assert!(result.copy_request.is_none());

        // 值沒有翻譯過，按月的列不會被濾掉
        let report = result.report.unwrap();
        assert_eq!(report.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_header_fails_before_any_write() {
        let store = seeded_store(&HEADER_PAIRS[1..]).await;
        let pipeline = SalesReportPipeline::new(store.clone(), MockConfig::new());

        let err = run(&pipeline).await.unwrap_err();
        assert!(matches!(
            err,
            EtlError::UnresolvedTranslation { ref group, ref key } if group == "Header" && key == "项目"
        ));
        assert_eq!(store.sheets("billing.xlsx").await, vec!["账单"]);
        assert!(store.sheets("Result.xlsx").await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_strategy_answers_missing_header() {
        let store = seeded_store(&HEADER_PAIRS[1..]).await;
        let strategy = |missing: &MissingTranslation<'_>| -> Result<String> {
            assert_eq!(missing.group, "Header");
            Ok("Project ID".to_string())
        };
        let pipeline = SalesReportPipeline::with_resolution(store.clone(), MockConfig::new(), strategy);

        run(&pipeline).await.unwrap();
        let report = store.table("Result.xlsx", "Sheet1").await.unwrap();
        assert_eq!(report.columns[0], "Project ID");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].value("Project ID"), &CellValue::from("proj-a"));
        assert_eq!(report.rows[0].value("Region"), &CellValue::from("ap-guangzhou"));
    }

    #[tokio::test]
    async fn test_answered_monthly_code_excludes_monthly_rows() {
        let store = seeded_store(&HEADER_PAIRS).await;
        store
            .put(
                "Language Translation.xlsx",
                vec![
                    pairs_table("Header", &HEADER_PAIRS),
                    pairs_table("计费类型", &[("按量", "Hourly")]),
                    pairs_table("Order Type", &[("删除退费", "Delete/Refund"), ("新购", "New")]),
                ],
            )
            .await;
        let mut config = MockConfig::new();
        config.save_translations = true;
        let strategy = |missing: &MissingTranslation<'_>| -> Result<String> {
            assert_eq!(missing.group, "Billing Method");
            assert_eq!(missing.key, "按月");
            Ok("Monthly".to_string())
        };
        let pipeline = SalesReportPipeline::with_resolution(store.clone(), config, strategy);

        run(&pipeline).await.unwrap();

        let report = store.table("Result.xlsx", "Sheet1").await.unwrap();
        let ids: Vec<&CellValue> = report.rows.iter().map(|r| r.value("Resource ID")).collect();
        assert_eq!(ids, vec![&CellValue::from("ins-1")]);

        // 譯本也套用了補上的翻譯
        let copy = store.table("billing.xlsx", "账单_translated").await.unwrap();
        assert_eq!(copy.rows[1].value("Billing Method"), &CellValue::from("Monthly"));
    }

    #[tokio::test]
    async fn test_existing_sheet_name_rejected_before_writing() {
        let store = seeded_store(&HEADER_PAIRS).await;
        let mut config = MockConfig::new();
        config.append_target = Some("账单".to_string());
        let pipeline = SalesReportPipeline::new(store.clone(), config);

        let err = run(&pipeline).await.unwrap_err();
        assert!(matches!(err, EtlError::OutputTargetInvalid { .. }));
        assert!(store.sheets("Result.xlsx").await.is_empty());
    }

    #[tokio::test]
    async fn test_new_file_cannot_replace_source() {
        let store = seeded_store(&HEADER_PAIRS).await;
        let mut config = MockConfig::new();
        config.append_target = None;
        config.new_file_target = Some(NewFileTarget {
            path: PathBuf::from("billing.xlsx"),
            sheet_name: "Sheet1".to_string(),
        });
        let pipeline = SalesReportPipeline::new(store.clone(), config);

        let err = run(&pipeline).await.unwrap_err();
        assert!(matches!(err, EtlError::OutputTargetInvalid { .. }));
        assert_eq!(store.sheets("billing.xlsx").await, vec!["账单"]);
    }

    #[tokio::test]
    async fn test_missing_translation_source() {
        let store = MockStore::default();
        store
            .put("billing.xlsx", vec![billing_table(source_columns())])
            .await;
        let pipeline = SalesReportPipeline::new(store, MockConfig::new());

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::SourceNotFound { .. }));
    }
}
