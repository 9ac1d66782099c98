use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Source not found: {path}")]
    SourceNotFound { path: String },

    #[error("Malformed translation source (sheet '{sheet}'): {reason}")]
    MalformedSource { sheet: String, reason: String },

    #[error("No translation for '{key}' in group '{group}'")]
    UnresolvedTranslation { group: String, key: String },

    #[error("Cannot parse timestamp '{value}' for resource '{resource_id}'")]
    TimestampParseError { value: String, resource_id: String },

    #[error("Cannot parse '{value}' in column '{column}' as a number (resource '{resource_id}')")]
    NumericParseError {
        column: String,
        value: String,
        resource_id: String,
    },

    #[error("Required column '{column}' is missing from the table")]
    MissingColumn { column: String },

    #[error("Invalid output target '{target}': {reason}")]
    OutputTargetInvalid { target: String, reason: String },

    #[error("Workbook read failed for '{path}': {message}")]
    WorkbookError { path: String, message: String },

    #[error("Workbook write failed for '{path}': {message}")]
    WriteError { path: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Translation,
    Data,
    Output,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::SourceNotFound { .. } | EtlError::WorkbookError { .. } => {
                ErrorCategory::Input
            }
            EtlError::MalformedSource { .. } | EtlError::UnresolvedTranslation { .. } => {
                ErrorCategory::Translation
            }
            EtlError::TimestampParseError { .. }
            | EtlError::NumericParseError { .. }
            | EtlError::MissingColumn { .. }
            | EtlError::CsvError(_) => ErrorCategory::Data,
            EtlError::OutputTargetInvalid { .. } | EtlError::WriteError { .. } => {
                ErrorCategory::Output
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 使用者修正輸入後即可重跑
            ErrorCategory::Translation | ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Data | ErrorCategory::Output => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::SourceNotFound { path } => {
                format!("Check that '{}' exists and the sheet name is spelled correctly", path)
            }
            EtlError::MalformedSource { sheet, .. } => format!(
                "Give sheet '{}' a header row and two columns (source term, translation)",
                sheet
            ),
            EtlError::UnresolvedTranslation { group, key } => format!(
                "Add '{}' to the '{}' sheet of the translation source, or rerun with --interactive",
                key, group
            ),
            EtlError::TimestampParseError { .. } => {
                "Timestamps must look like 'YYYY-MM-DD HH:MM:SS'".to_string()
            }
            EtlError::NumericParseError { column, .. } => {
                format!("Make sure every '{}' cell holds a number", column)
            }
            EtlError::MissingColumn { .. } => {
                "Check the Header sheet of the translation source, or unset the already-translated flag"
                    .to_string()
            }
            EtlError::OutputTargetInvalid { .. } => {
                "Choose another output file or worksheet name".to_string()
            }
            EtlError::WorkbookError { .. } => {
                "Make sure the file is a valid .xlsx/.xlsm/.xls workbook and is not open elsewhere"
                    .to_string()
            }
            EtlError::WriteError { .. } => {
                "Close the target workbook in other programs and check write permissions".to_string()
            }
            EtlError::CsvError(_) => "Check the CSV output location".to_string(),
            EtlError::IoError(_) => "Check file permissions and free disk space".to_string(),
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Fix the configuration value and try again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Could not read input: {}", self),
            ErrorCategory::Translation => format!("Translation problem: {}", self),
            ErrorCategory::Data => format!("Billing data problem: {}", self),
            ErrorCategory::Output => format!("Could not write output: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// 對應 CLI 結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
