use crate::core::resolution::{MissingTranslation, ResolutionStrategy};
use crate::utils::error::{EtlError, Result};
use dialoguer::Input;

/// Asks on the terminal for each translation the dictionary lacks.
/// A blank answer gives up on the key.
#[derive(Debug, Default)]
pub struct PromptResolution;

impl PromptResolution {
    pub fn new() -> Self {
        Self
    }
}

impl ResolutionStrategy for PromptResolution {
    fn resolve(&mut self, missing: &MissingTranslation<'_>) -> Result<String> {
        eprintln!();
        eprintln!(
            "❓ '{}' has no translation in group '{}'.",
            missing.key, missing.group
        );
        if !missing.candidates.is_empty() {
            eprintln!("   Known translations: {}", missing.candidates.join(", "));
        }

        let unresolved = || EtlError::UnresolvedTranslation {
            group: missing.group.to_string(),
            key: missing.key.to_string(),
        };

        let answer: String = Input::new()
            .with_prompt(format!("Translation for '{}' (leave blank to abort)", missing.key))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| {
                tracing::warn!("Prompt failed: {}", e);
                unresolved()
            })?;

        if answer.trim().is_empty() {
            return Err(unresolved());
        }
        Ok(answer)
    }
}
