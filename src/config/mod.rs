#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_sheet_name,
};
use std::path::{Path, PathBuf};

pub const DEFAULT_TRANSLATION_SOURCE: &str = "Language Translation.xlsx";
pub const DEFAULT_APPEND_SHEET: &str = "Monthly Sales Calculations";
pub const DEFAULT_NEW_FILE: &str = "Result.xlsx";
pub const DEFAULT_NEW_SHEET: &str = "Sheet1";

pub const SOURCE_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xls"];
pub const REPORT_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "csv"];
/// Source workbooks that sheets can be appended to.
pub const APPENDABLE_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// 沒有可辨識副檔名時補上 `.xlsx`
pub fn normalize_new_filename(name: &str) -> String {
    let name = name.trim();
    let recognised = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            REPORT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        });
    if recognised {
        name.to_string()
    } else {
        format!("{}.xlsx", name)
    }
}

/// Directory the new report goes to: the given location, else the source file's directory.
pub fn output_directory(location: Option<&Path>, source_file: &Path) -> PathBuf {
    match location {
        Some(dir) => dir.to_path_buf(),
        None => match source_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// Checks shared by every config front end: which outputs may be combined and
/// whether their names are usable.
pub fn validate_run_options<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_path("source_file", config.source_file())?;
    validate_file_extension("source_file", config.source_file(), &SOURCE_EXTENSIONS)?;
    validate_non_empty_string("sheet", config.sheet_name())?;
    validate_path("translation_source", config.translation_source())?;

    let append = config.append_target();
    let new_file = config.new_file_target();

    if config.translate_only() {
        if config.already_translated() {
            return Err(conflict("translate_only", "cannot be combined with already_translated"));
        }
        if append.is_some() || new_file.is_some() {
            return Err(conflict("translate_only", "does not produce a report; drop the report outputs"));
        }
        return check_appendable(config.source_file());
    }

    if config.already_translated() && config.save_translations() {
        return Err(conflict(
            "save_translations",
            "nothing is translated when the sheet is already translated",
        ));
    }

    if append.is_none() && new_file.is_none() {
        return Err(EtlError::MissingConfigError {
            field: "output (append sheet or new file)".to_string(),
        });
    }

    if let Some(sheet) = append {
        validate_sheet_name("append_sheet", sheet)?;
    }
    if append.is_some() || config.save_translations() {
        check_appendable(config.source_file())?;
    }
    if let Some(target) = new_file {
        validate_file_extension("new_file", &target.path, &REPORT_EXTENSIONS)?;
        validate_sheet_name("new_sheet", &target.sheet_name)?;
    }

    Ok(())
}

// .xls 只能讀取，無法寫回
fn check_appendable(source: &Path) -> Result<()> {
    let appendable = source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            APPENDABLE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        });
    if appendable {
        return Ok(());
    }
    Err(EtlError::OutputTargetInvalid {
        target: source.display().to_string(),
        reason: "sheets can only be appended to .xlsx or .xlsm workbooks; use a new file instead"
            .to_string(),
    })
}

fn conflict(field: &str, message: &str) -> EtlError {
    EtlError::ConfigValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_new_filename() {
        assert_eq!(normalize_new_filename("Result"), "Result.xlsx");
        assert_eq!(normalize_new_filename("report.XLSX"), "report.XLSX");
        assert_eq!(normalize_new_filename("report.csv"), "report.csv");
        assert_eq!(normalize_new_filename("march.v2"), "march.v2.xlsx");
    }

    #[test]
    fn test_output_directory_defaults_to_source_dir() {
        assert_eq!(
            output_directory(None, Path::new("/data/billing.xlsx")),
            PathBuf::from("/data")
        );
        assert_eq!(output_directory(None, Path::new("billing.xlsx")), PathBuf::from("."));
        assert_eq!(
            output_directory(Some(Path::new("/out")), Path::new("/data/billing.xlsx")),
            PathBuf::from("/out")
        );
    }
}
