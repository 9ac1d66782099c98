use crate::core::dictionary::{TranslationDictionary, HEADER_GROUP};
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;

/// A required lookup the dictionary could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTranslation<'a> {
    /// `Header` for column names, otherwise the translated column name.
    pub group: &'a str,
    pub key: &'a str,
    /// Translated terms already known for the group.
    pub candidates: Vec<&'a str>,
}

/// Supplies the translated term for a missing key.
pub trait ResolutionStrategy {
    fn resolve(&mut self, missing: &MissingTranslation<'_>) -> Result<String>;
}

/// Non-interactive default: every miss is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictResolution;

impl ResolutionStrategy for StrictResolution {
    fn resolve(&mut self, missing: &MissingTranslation<'_>) -> Result<String> {
        Err(EtlError::UnresolvedTranslation {
            group: missing.group.to_string(),
            key: missing.key.to_string(),
        })
    }
}

impl<F> ResolutionStrategy for F
where
    F: FnMut(&MissingTranslation<'_>) -> Result<String>,
{
    fn resolve(&mut self, missing: &MissingTranslation<'_>) -> Result<String> {
        self(missing)
    }
}

/// Answers given by a strategy during one run, keyed by (group, key).
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    answers: HashMap<(String, String), String>,
}

impl ResolutionCache {
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.answers
            .get(&(group.to_string(), key.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Write the answers into `dictionary` so translation applies them to the table too.
    pub fn apply_to(&self, dictionary: &mut TranslationDictionary) {
        for ((group, key), answer) in &self.answers {
            if group == HEADER_GROUP {
                dictionary.insert_header(key, answer);
            } else {
                dictionary.insert_value(group, key, answer);
            }
        }
    }

    fn insert(&mut self, group: &str, key: &str, answer: String) {
        self.answers
            .insert((group.to_string(), key.to_string()), answer);
    }
}

/// Dictionary lookups for required keys with fallback to a strategy.
pub struct Resolver<'a> {
    dictionary: &'a TranslationDictionary,
    strategy: &'a mut dyn ResolutionStrategy,
    cache: &'a mut ResolutionCache,
}

impl<'a> Resolver<'a> {
    pub fn new(
        dictionary: &'a TranslationDictionary,
        strategy: &'a mut dyn ResolutionStrategy,
        cache: &'a mut ResolutionCache,
    ) -> Self {
        Self {
            dictionary,
            strategy,
            cache,
        }
    }

    /// Translated column name for a source header.
    pub fn header(&mut self, source: &str) -> Result<String> {
        let dictionary = self.dictionary;
        if let Some(target) = dictionary.translate_header(source) {
            return Ok(target.to_string());
        }
        let candidates = dictionary
            .header()
            .values()
            .map(String::as_str)
            .collect();
        self.ask(HEADER_GROUP, source, candidates)
    }

    /// Translated cell value `value` of the column whose source header is `column_source`.
    pub fn value(&mut self, column_source: &str, value: &str) -> Result<String> {
        let dictionary = self.dictionary;
        let column = self.header(column_source)?;
        if let Some(target) = dictionary.translate_value(&column, value) {
            return Ok(target.to_string());
        }
        let candidates = dictionary
            .group(&column)
            .map(|mapping| mapping.values().map(String::as_str).collect())
            .unwrap_or_default();
        self.ask(&column, value, candidates)
    }

    fn ask(&mut self, group: &str, key: &str, candidates: Vec<&str>) -> Result<String> {
        if let Some(answer) = self.cache.get(group, key) {
            return Ok(answer.to_string());
        }

        tracing::warn!("⚠️ No translation for '{}' in group '{}'", key, group);
        let missing = MissingTranslation {
            group,
            key,
            candidates,
        };
        let answer = self.strategy.resolve(&missing)?;
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(EtlError::UnresolvedTranslation {
                group: group.to_string(),
                key: key.to_string(),
            });
        }

        tracing::info!("🔧 Resolved '{}' ({}) as '{}'", key, group, answer);
        self.cache.insert(group, key, answer.clone());
        Ok(answer)
    }
}
