//! The control surface the host application talks to.
//!
//! An [`Overlay`] is one mounted instance: its own language state, engine and
//! change watcher, sharing the process-wide translation cache by default.
//! [`PageControl`] is the process-wide control object through which code
//! outside the reactive tree (imperative navigation handlers, scripts) drives
//! whichever overlay mounted first.

use crate::cache::TranslationCache;
use crate::config::OverlaySettings;
use crate::document::{ContentEvents, Document, TextSource};
use crate::engine::{PassReport, TranslationEngine};
use crate::i18n::{Language, LanguageError};
use crate::navigation::Navigation;
use crate::rate_limit::{MinInterval, RateLimiter};
use crate::state::LanguageState;
use crate::translation::Translator;
use crate::watcher::{ChangeWatcher, WatcherHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("an overlay must be mounted from within a tokio runtime")]
    NoRuntime,
}

/// A pass scheduled by a language change.
pub type ScheduledPass = JoinHandle<PassReport>;

static NEXT_OVERLAY_ID: AtomicU64 = AtomicU64::new(1);

struct OverlayInner {
    id: u64,
    state: Arc<LanguageState>,
    engine: TranslationEngine,
    settings: OverlaySettings,
    runtime: Handle,
}

impl OverlayInner {
    fn change_language(&self, language: Language) -> Option<ScheduledPass> {
        if !self.state.set(language) {
            debug!("Language already {}, nothing to do", language);
            return None;
        }

        PageControl::global().sync_language(language);
        info!("Language changed to {} ({})", language.name(), language);

        let engine = self.engine.clone();
        let delay = self.settings.language_settle;
        Some(self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            engine.run_pass(language).await
        }))
    }

    fn spawn_translate_page(&self) -> ScheduledPass {
        let engine = self.engine.clone();
        let language = self.state.current();
        self.runtime
            .spawn(async move { engine.run_pass(language).await })
    }
}

/// One mounted translation overlay. Unmounts when dropped.
pub struct Overlay {
    inner: Arc<OverlayInner>,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl Overlay {
    pub fn builder(source: Arc<dyn TextSource>, translator: Arc<dyn Translator>) -> OverlayBuilder {
        OverlayBuilder {
            source,
            translator,
            events: None,
            navigation: None,
            cache: None,
            limiter: None,
            settings: OverlaySettings::default(),
            initial: Language::base(),
        }
    }

    /// Builder for an in-memory document, which is both the text source and
    /// the content-change producer.
    pub fn for_document(document: Arc<Document>, translator: Arc<dyn Translator>) -> OverlayBuilder {
        let events: Arc<dyn ContentEvents> = document.clone();
        Self::builder(document, translator).events(events)
    }

    pub fn language(&self) -> Language {
        self.inner.state.current()
    }

    pub fn state(&self) -> &Arc<LanguageState> {
        &self.inner.state
    }

    pub fn engine(&self) -> &TranslationEngine {
        &self.inner.engine
    }

    /// Whether this overlay is the one bound to [`PageControl::global`].
    pub fn owns_page_control(&self) -> bool {
        PageControl::global().owner() == Some(self.inner.id)
    }

    /// Switch to `code` and schedule a pass after the language settle delay.
    ///
    /// Returns `Ok(None)` when `code` is already the active language.
    pub fn change_language(&self, code: &str) -> Result<Option<ScheduledPass>, LanguageError> {
        let language = Language::from_code(code)?;
        Ok(self.inner.change_language(language))
    }

    /// Run a pass for the current language now, bypassing the watcher.
    pub async fn translate_page(&self) -> PassReport {
        self.inner.engine.run_pass(self.inner.state.current()).await
    }

    /// Passes started by the change watcher, if one is armed.
    pub fn watcher_passes(&self) -> Option<usize> {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(WatcherHandle::triggered_passes)
    }

    pub fn unmount(self) {}
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if PageControl::global().release(self.inner.id) {
            debug!("Overlay {} released the page control", self.inner.id);
        }
    }
}

pub struct OverlayBuilder {
    source: Arc<dyn TextSource>,
    translator: Arc<dyn Translator>,
    events: Option<Arc<dyn ContentEvents>>,
    navigation: Option<Arc<dyn Navigation>>,
    cache: Option<Arc<TranslationCache>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    settings: OverlaySettings,
    initial: Language,
}

impl OverlayBuilder {
    pub fn events(mut self, events: Arc<dyn ContentEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn navigation(mut self, navigation: Arc<dyn Navigation>) -> Self {
        self.navigation = Some(navigation);
        self
    }

    /// Use a private cache instead of the process-wide one.
    pub fn cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn settings(mut self, settings: OverlaySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn initial_language(mut self, language: Language) -> Self {
        self.initial = language;
        self
    }

    /// Mount the overlay: arm the watcher (when both content events and
    /// navigation are provided) and bind the page control if it is free.
    ///
    /// Mounting in a language other than the base schedules a first pass.
    pub fn mount(self) -> Result<Overlay, OverlayError> {
        let runtime = Handle::try_current().map_err(|_| OverlayError::NoRuntime)?;

        let engine = TranslationEngine::new(
            self.source,
            self.translator,
            self.cache.unwrap_or_else(TranslationCache::global),
            self.limiter
                .unwrap_or_else(|| Arc::new(MinInterval::default()) as Arc<dyn RateLimiter>),
        );
        let state = Arc::new(LanguageState::new(self.initial));

        let watcher = match (self.events, self.navigation) {
            (Some(events), Some(navigation)) => Some(ChangeWatcher::arm(
                engine.clone(),
                Arc::clone(&state),
                events.as_ref(),
                navigation,
                self.settings,
                runtime.clone(),
            )),
            _ => None,
        };

        let inner = Arc::new(OverlayInner {
            id: NEXT_OVERLAY_ID.fetch_add(1, Ordering::Relaxed),
            state,
            engine,
            settings: self.settings,
            runtime,
        });

        if PageControl::global().bind_if_free(&inner) {
            debug!("Overlay {} bound the page control", inner.id);
        }

        if !self.initial.is_base() {
            let engine = inner.engine.clone();
            let language = self.initial;
            let delay = self.settings.language_settle;
            inner.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                engine.run_pass(language).await
            });
        }

        Ok(Overlay {
            inner,
            watcher: Mutex::new(watcher),
        })
    }
}

struct Binding {
    owner: u64,
    overlay: Weak<OverlayInner>,
}

/// Process-wide control object.
///
/// The first overlay to mount binds it; code that is not handed an
/// [`Overlay`] reaches the page through `PageControl::global()`.
pub struct PageControl {
    current_language: RwLock<Language>,
    binding: RwLock<Option<Binding>>,
}

static PAGE_CONTROL: OnceLock<PageControl> = OnceLock::new();

impl PageControl {
    pub fn global() -> &'static PageControl {
        PAGE_CONTROL.get_or_init(|| PageControl {
            current_language: RwLock::new(Language::base()),
            binding: RwLock::new(None),
        })
    }

    /// The language most recently selected through any overlay.
    pub fn current_language(&self) -> Language {
        *self
            .current_language
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_bound(&self) -> bool {
        self.bound_overlay().is_some()
    }

    /// Change the language of the bound overlay.
    ///
    /// Returns `false` if nothing is bound or `code` is not a usable language.
    pub fn change_language(&self, code: &str) -> bool {
        let Some(overlay) = self.bound_overlay() else {
            debug!("Page control has no overlay; ignoring language change");
            return false;
        };
        match Language::from_code(code) {
            Ok(language) => {
                overlay.change_language(language);
                true
            }
            Err(e) => {
                debug!("Page control ignored language change: {}", e);
                false
            }
        }
    }

    /// Translate the bound overlay's page in its current language.
    pub fn translate_current_page(&self) -> bool {
        match self.bound_overlay() {
            Some(overlay) => {
                overlay.spawn_translate_page();
                true
            }
            None => false,
        }
    }

    /// Drop the current binding, whoever owns it. The next mount binds again.
    pub fn unbind(&self) {
        self.binding
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn owner(&self) -> Option<u64> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|binding| binding.overlay.strong_count() > 0)
            .map(|binding| binding.owner)
    }

    fn bound_overlay(&self) -> Option<Arc<OverlayInner>> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|binding| binding.overlay.upgrade())
    }

    fn sync_language(&self, language: Language) {
        *self
            .current_language
            .write()
            .unwrap_or_else(PoisonError::into_inner) = language;
    }

    fn bind_if_free(&self, overlay: &Arc<OverlayInner>) -> bool {
        let mut binding = self.binding.write().unwrap_or_else(PoisonError::into_inner);
        let free = binding
            .as_ref()
            .map_or(true, |existing| existing.overlay.strong_count() == 0);
        if !free {
            return false;
        }
        *binding = Some(Binding {
            owner: overlay.id,
            overlay: Arc::downgrade(overlay),
        });
        drop(binding);
        self.sync_language(overlay.state.current());
        true
    }

    fn release(&self, owner: u64) -> bool {
        let mut binding = self.binding.write().unwrap_or_else(PoisonError::into_inner);
        if binding.as_ref().is_some_and(|b| b.owner == owner) {
            *binding = None;
            true
        } else {
            false
        }
    }
}
