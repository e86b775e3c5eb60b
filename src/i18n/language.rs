//! Language type: validated language handle.
//!
//! A `Language` can only be constructed for codes that exist in the registry
//! and are enabled, so everything downstream can rely on `code()` being a
//! real target (or the base language).

use crate::i18n::{LanguageConfig, LanguageRegistry};
use std::fmt;
use thiserror::Error;

/// Errors raised when resolving a language code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("Unknown language code: '{0}'")]
    Unknown(String),

    #[error("Language '{0}' is not enabled")]
    Disabled(String),
}

/// A validated language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "fr", "en")
    code: &'static str,
}

impl Language {
    pub const FRENCH: Language = Language { code: "fr" };
    pub const ENGLISH: Language = Language { code: "en" };

    /// Create a Language from a language code string.
    ///
    /// Surrounding whitespace and case are ignored (`" EN "` resolves to `en`).
    ///
    /// # Example
    /// ```
    /// use page_translator::i18n::Language;
    ///
    /// let english = Language::from_code("en").unwrap();
    /// assert_eq!(english.code(), "en");
    /// ```
    pub fn from_code(code: &str) -> Result<Language, LanguageError> {
        let normalized = code.trim().to_ascii_lowercase();

        match LanguageRegistry::get().get_by_code(&normalized) {
            Some(config) if config.enabled => Ok(Language { code: config.code }),
            Some(_) => Err(LanguageError::Disabled(normalized)),
            None => Err(LanguageError::Unknown(code.to_string())),
        }
    }

    /// The base language: content is authored in it and restoration targets it.
    pub fn base() -> Language {
        let config = LanguageRegistry::get().canonical();
        Language { code: config.code }
    }

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the full language configuration from the registry.
    ///
    /// # Panics
    /// Panics if the language code is not found in the registry. This cannot
    /// happen for a Language built through `from_code`, `base` or a constant.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .expect("Language code should always be valid")
    }

    /// Get the English name of the language.
    pub fn name(&self) -> &'static str {
        self.config().name
    }

    /// Get the native name of the language.
    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    /// Check if this is the base language.
    pub fn is_base(&self) -> bool {
        self.config().is_canonical
    }

    /// The `langpair` parameter for translating from the base language into this one.
    pub fn langpair_from(&self, source: Language) -> String {
        format!("{}|{}", source.code, self.code)
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::base()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}
