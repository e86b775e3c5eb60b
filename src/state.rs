//! The active language of an overlay.

use crate::i18n::Language;
use tokio::sync::watch;

/// Holds the active language and lets reactive callers follow changes.
///
/// Only the overlay's `change_language` writes it.
#[derive(Debug)]
pub struct LanguageState {
    sender: watch::Sender<Language>,
}

impl LanguageState {
    pub fn new(initial: Language) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn current(&self) -> Language {
        *self.sender.borrow()
    }

    /// A receiver that sees every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.sender.subscribe()
    }

    /// Returns `false` (and notifies nobody) if `language` is already active.
    pub(crate) fn set(&self, language: Language) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == language {
                false
            } else {
                *current = language;
                true
            }
        })
    }
}

impl Default for LanguageState {
    fn default() -> Self {
        Self::new(Language::base())
    }
}
