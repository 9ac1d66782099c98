pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use adapters::prompt::PromptResolution;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::xlsx::XlsxStore;
pub use config::toml_config::TomlConfig;
pub use core::aggregator::aggregate;
pub use core::dictionary::{load_dictionary, TranslationDictionary};
pub use core::resolution::{MissingTranslation, ResolutionStrategy, StrictResolution};
pub use core::translator::translate;
pub use core::{etl::EtlEngine, pipeline::SalesReportPipeline};
pub use utils::error::{EtlError, Result};
