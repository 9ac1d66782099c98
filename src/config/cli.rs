use crate::config::{
    normalize_new_filename, output_directory, validate_run_options, DEFAULT_APPEND_SHEET,
    DEFAULT_NEW_FILE, DEFAULT_NEW_SHEET, DEFAULT_TRANSLATION_SOURCE,
};
use crate::core::schema::SourceSchema;
use crate::core::ConfigProvider;
use crate::domain::model::NewFileTarget;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const TRANSLATION_SOURCE_HINT: &str = "language translation";

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "billing-sales-etl")]
#[command(about = "Translate a cloud billing export and build the monthly sales report")]
pub struct CliConfig {
    /// Billing export workbook
    pub source_file: PathBuf,

    /// Worksheet holding the billing rows
    #[arg(long, required_unless_present = "list_sheets")]
    pub sheet: Option<String>,

    /// Translation workbook; searched for under the working directory when omitted
    #[arg(long)]
    pub translation_source: Option<PathBuf>,

    #[arg(long, help = "Sheet already uses translated column names and values")]
    pub already_translated: bool,

    #[arg(long, help = "Save the translated sheet next to the original")]
    pub save_translations: bool,

    #[arg(long, help = "Only translate, do not build the report")]
    pub translate_only: bool,

    /// Append the report to the source workbook under this sheet name
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_APPEND_SHEET)]
    pub append_sheet: Option<String>,

    /// Write the report to a new workbook (.xlsx is added when no extension is given)
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_NEW_FILE)]
    pub new_file: Option<String>,

    /// Directory for the new workbook; defaults to the source file's directory
    #[arg(long, requires = "new_file")]
    pub output_location: Option<PathBuf>,

    /// Worksheet name inside the new workbook (ignored for .csv)
    #[arg(long, default_value = DEFAULT_NEW_SHEET)]
    pub new_sheet: String,

    #[arg(long, help = "Ask on the terminal for missing translations")]
    pub interactive: bool,

    #[arg(long, help = "Print the worksheet names of the source file and exit")]
    pub list_sheets: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    #[arg(skip)]
    pub schema: SourceSchema,
}

impl CliConfig {
    /// Fill in the translation source from the working directory when none was given.
    pub fn discover_translation_source(&mut self, root: &Path) {
        if self.translation_source.is_some() {
            return;
        }
        match find_translation_source(root) {
            Some(found) => {
                tracing::info!("🔎 Using translation source {}", found.display());
                self.translation_source = Some(found);
            }
            None => tracing::debug!(
                "No translation source found under {}, falling back to '{}'",
                root.display(),
                DEFAULT_TRANSLATION_SOURCE
            ),
        }
    }
}

/// First spreadsheet under `root` whose file name contains "language translation".
/// Directories are visited in name order; unreadable ones are skipped.
pub fn find_translation_source(root: &Path) -> Option<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(root).ok()?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        // 略過 Excel 開啟時產生的鎖定檔
        if name.starts_with("~$") {
            continue;
        }
        if name.contains(TRANSLATION_SOURCE_HINT) && is_spreadsheet(&path) {
            return Some(path);
        }
    }

    dirs.iter().find_map(|dir| find_translation_source(dir))
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            crate::config::SOURCE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

impl ConfigProvider for CliConfig {
    fn source_file(&self) -> &Path {
        &self.source_file
    }

    fn sheet_name(&self) -> &str {
        self.sheet.as_deref().unwrap_or_default()
    }

    fn translation_source(&self) -> &Path {
        self.translation_source
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_TRANSLATION_SOURCE))
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
        self.append_sheet.as_deref()
    }

    fn new_file_target(&self) -> Option<NewFileTarget> {
        let name = self.new_file.as_deref()?;
        let directory = output_directory(self.output_location.as_deref(), &self.source_file);
        Some(NewFileTarget {
            path: directory.join(normalize_new_filename(name)),
            sheet_name: self.new_sheet.clone(),
        })
    }

    fn schema(&self) -> &SourceSchema {
        &self.schema
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_run_options(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["billing-sales-etl"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flag_without_value_uses_default_names() {
        let config = parse(&["data/billing.xlsx", "--sheet", "账单", "--append-sheet", "--new-file"]);

        assert_eq!(config.append_target(), Some("Monthly Sales Calculations"));
        let target = config.new_file_target().unwrap();
        assert_eq!(target.path, PathBuf::from("data/Result.xlsx"));
        assert_eq!(target.sheet_name, "Sheet1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_file_name_and_location() {
        let config = parse(&[
            "billing.xlsx",
            "--sheet",
            "账单",
            "--new-file",
            "march",
            "--output-location",
            "/tmp/reports",
            "--new-sheet",
            "Sales",
        ]);

        let target = config.new_file_target().unwrap();
        assert_eq!(target.path, PathBuf::from("/tmp/reports/march.xlsx"));
        assert_eq!(target.sheet_name, "Sales");
    }

    #[test]
    fn test_sheet_required_unless_listing() {
        let argv = ["billing-sales-etl", "billing.xlsx", "--append-sheet"];
        assert!(CliConfig::try_parse_from(argv).is_err());

        let config = parse(&["billing.xlsx", "--list-sheets"]);
        assert!(config.list_sheets);
    }

    #[test]
    fn test_validation_rejects_missing_output() {
        let config = parse(&["billing.xlsx", "--sheet", "账单"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EtlError::MissingConfigError { .. }));
    }

    #[test]
    fn test_validation_rejects_conflicting_modes() {
        let config = parse(&["billing.xlsx", "--sheet", "账单", "--translate-only", "--already-translated"]);
        assert!(config.validate().is_err());

        let config = parse(&["billing.xlsx", "--sheet", "账单", "--translate-only", "--new-file"]);
        assert!(config.validate().is_err());

        let config = parse(&[
            "billing.xlsx",
            "--sheet",
            "账单",
            "--already-translated",
            "--save-translations",
            "--append-sheet",
        ]);
        assert!(config.validate().is_err());

        let config = parse(&["billing.xlsx", "--sheet", "账单", "--translate-only"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_xls_source_only_gets_new_files() {
        for extra in ["--append-sheet", "--translate-only"] {
            let config = parse(&["billing.xls", "--sheet", "账单", extra]);
            let err = config.validate().unwrap_err();
            assert!(matches!(err, EtlError::OutputTargetInvalid { .. }));
        }

        let config = parse(&["billing.xls", "--sheet", "账单", "--new-file", "--save-translations"]);
        assert!(matches!(
            config.validate(),
            Err(EtlError::OutputTargetInvalid { .. })
        ));

        let config = parse(&["billing.xls", "--sheet", "账单", "--new-file"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_sheet_name() {
        let config = parse(&["billing.xlsx", "--sheet", "账单", "--append-sheet", "Q1/Q2"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_find_translation_source_searches_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/nested")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join("a/~$Language Translation.xlsx"), b"").unwrap();
        fs::write(dir.path().join("a/nested/Language Translation (v2).xlsx"), b"").unwrap();

        let found = find_translation_source(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("a/nested/Language Translation (v2).xlsx"));
    }

    #[test]
    fn test_discovery_keeps_explicit_source() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("language translation.xlsx"), b"").unwrap();

        let mut config = parse(&["billing.xlsx", "--sheet", "账单", "--translation-source", "dict.xlsx"]);
        config.discover_translation_source(dir.path());
        assert_eq!(config.translation_source(), Path::new("dict.xlsx"));

        let mut config = parse(&["billing.xlsx", "--sheet", "账单"]);
        config.discover_translation_source(dir.path());
        assert_eq!(
            config.translation_source(),
            dir.path().join("language translation.xlsx")
        );
    }
}
