//! Session-wide memo of translations, keyed by language and original text.
//!
//! Memoization is by content, not by unit: a string repeated across many
//! units is fetched once and served to all of them. Entries are never
//! invalidated, and the first value stored for a key is kept.

use crate::i18n::Language;
use indexmap::IndexMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

static GLOBAL: OnceLock<Arc<TranslationCache>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: RwLock<IndexMap<(Language, String), String>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every engine that was not given its own.
    pub fn global() -> Arc<TranslationCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TranslationCache::new())))
    }

    pub fn get(&self, language: Language, original: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(language, original.to_string()))
            .cloned()
    }

    /// Store a translation. Returns `false` if the key was already populated,
    /// in which case the existing value is kept.
    pub fn put(&self, language: Language, original: &str, translated: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let key = (language, original.to_string());
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, translated.to_string());
        true
    }

    /// Recover the original text that produced `translated`.
    ///
    /// Entries for `language` are searched first, then every entry, each in
    /// insertion order. When two originals share a translation the earliest
    /// stored one wins.
    pub fn reverse_lookup(&self, language: Language, translated: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        entries
            .iter()
            .find(|((lang, _), value)| *lang == language && value.as_str() == translated)
            .or_else(|| entries.iter().find(|(_, value)| value.as_str() == translated))
            .map(|((_, original), _)| original.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
