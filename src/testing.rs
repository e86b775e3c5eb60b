//! In-process translation service for unit tests.

use crate::i18n::Language;
use crate::translation::{TranslateError, Translator};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Canned answers keyed by input text; unknown texts get no translation.
#[derive(Default)]
pub(crate) struct FakeTranslator {
    answers: HashMap<String, Result<Option<String>, u16>>,
    calls: Mutex<Vec<(String, Language)>>,
    gate: Option<Arc<Notify>>,
}

impl FakeTranslator {
    pub(crate) fn with(mut self, text: &str, translated: &str) -> Self {
        self.answers
            .insert(text.to_string(), Ok(Some(translated.to_string())));
        self
    }

    /// Answer `text` with an HTTP error status.
    pub(crate) fn failing(mut self, text: &str, status: u16) -> Self {
        self.answers.insert(text.to_string(), Err(status));
        self
    }

    /// Hold every request until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub(crate) fn targets(&self) -> Vec<Language> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, target)| *target)
            .collect()
    }
}

impl Translator for FakeTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source: Language,
        target: Language,
    ) -> BoxFuture<'a, Result<Option<String>, TranslateError>> {
        async move {
            self.calls.lock().unwrap().push((text.to_string(), target));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.answers.get(text) {
                Some(Ok(answer)) => Ok(answer.clone()),
                Some(Err(status)) => Err(TranslateError::Status {
                    status: reqwest::StatusCode::from_u16(*status).unwrap(),
                    body: String::new(),
                }),
                None => Ok(None),
            }
        }
        .boxed()
    }
}
