use crate::config::{
    normalize_new_filename, output_directory, validate_run_options, DEFAULT_NEW_SHEET,
    DEFAULT_TRANSLATION_SOURCE,
};
use crate::core::schema::SourceSchema;
use crate::core::ConfigProvider;
use crate::domain::model::NewFileTarget;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub schema: SourceSchema,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub file: PathBuf,
    pub sheet: String,
    #[serde(default = "default_translation_source")]
    pub translation_source: PathBuf,
    #[serde(default)]
    pub already_translated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub save_copy: bool,
    #[serde(default)]
    pub translate_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub append_sheet: Option<String>,
    pub new_file: Option<NewFileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFileConfig {
    pub name: String,
    pub location: Option<PathBuf>,
    #[serde(default = "default_new_sheet")]
    pub sheet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn default_translation_source() -> PathBuf {
    PathBuf::from(DEFAULT_TRANSLATION_SOURCE)
}

fn default_new_sheet() -> String {
    DEFAULT_NEW_SHEET.to_string()
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BILLING_DIR})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().is_some_and(|m| m.enabled)
    }
}

impl ConfigProvider for TomlConfig {
    fn source_file(&self) -> &Path {
        &self.input.file
    }

    fn sheet_name(&self) -> &str {
        &self.input.sheet
    }

    fn translation_source(&self) -> &Path {
        &self.input.translation_source
    }

    fn already_translated(&self) -> bool {
        self.input.already_translated
    }

    fn save_translations(&self) -> bool {
        self.translation.save_copy
    }

    fn translate_only(&self) -> bool {
        self.translation.translate_only
    }

    fn append_target(&self) -> Option<&str> {
        self.output.append_sheet.as_deref()
    }

    fn new_file_target(&self) -> Option<NewFileTarget> {
        let new_file = self.output.new_file.as_ref()?;
        let directory = output_directory(new_file.location.as_deref(), &self.input.file);
        Some(NewFileTarget {
            path: directory.join(normalize_new_filename(&new_file.name)),
            sheet_name: new_file.sheet.clone(),
        })
    }

    fn schema(&self) -> &SourceSchema {
        &self.schema
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_run_options(self)
    }
}
