//! Language registry: Single source of truth for all supported languages.
//!
//! The registry is initialized once on first access (`OnceLock`) and is
//! immutable afterwards. Exactly one entry is canonical: the language page
//! content is authored in, which is also the target of restoration.

use std::sync::OnceLock;

/// Configuration for a supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "fr", "en")
    pub code: &'static str,

    /// English name of the language (e.g., "French", "English")
    pub name: &'static str,

    /// Native name of the language (e.g., "Français", "English")
    pub native_name: &'static str,

    /// Whether this is the base language content is authored in (only one should be true)
    pub is_canonical: bool,

    /// Whether this language can be selected as a translation target
    pub enabled: bool,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    ///
    /// Matching is exact; callers normalize case before lookup.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get all enabled languages, in registry order.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// Get the canonical (base) language configuration.
    ///
    /// # Panics
    /// Panics if no canonical language is found or if multiple canonical
    /// languages are defined (this indicates a configuration error).
    pub fn canonical(&self) -> &LanguageConfig {
        let canonical_langs: Vec<_> = self
            .languages
            .iter()
            .filter(|lang| lang.is_canonical)
            .collect();

        match canonical_langs.len() {
            0 => panic!("No canonical language found in registry"),
            1 => canonical_langs[0],
            _ => panic!("Multiple canonical languages found in registry"),
        }
    }
}

fn language(
    code: &'static str,
    name: &'static str,
    native_name: &'static str,
    is_canonical: bool,
    enabled: bool,
) -> LanguageConfig {
    LanguageConfig {
        code,
        name,
        native_name,
        is_canonical,
        enabled,
    }
}

/// Default language configurations.
///
/// French is the authored (base) language. Arabic is registered but disabled
/// until right-to-left layout is handled by the host application.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        language("fr", "French", "Français", true, true),
        language("en", "English", "English", false, true),
        language("es", "Spanish", "Español", false, true),
        language("de", "German", "Deutsch", false, true),
        language("it", "Italian", "Italiano", false, true),
        language("pt", "Portuguese", "Português", false, true),
        language("nl", "Dutch", "Nederlands", false, true),
        language("ar", "Arabic", "العربية", false, false),
    ]
}
