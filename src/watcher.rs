//! Re-runs translation passes when the page changes underneath the overlay.
//!
//! Two triggers feed the same path check:
//!
//! - a structural change in the tree: if the effective path (route + query)
//!   differs from the last one seen, a pass is scheduled after the mutation
//!   settle delay
//! - a history navigation: after the navigation settle delay, the path is
//!   checked the same way and a pass runs if it changed
//!
//! Structural changes fire on every re-render; gating on the path keeps the
//! overlay from re-scanning the tree for unrelated updates while still
//! catching client-side route transitions.

use crate::config::OverlaySettings;
use crate::document::{ContentEvents, Subscription};
use crate::engine::TranslationEngine;
use crate::navigation::Navigation;
use crate::state::LanguageState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

struct Watch {
    engine: TranslationEngine,
    state: Arc<LanguageState>,
    navigation: Arc<dyn Navigation>,
    settings: OverlaySettings,
    runtime: Handle,
    last_path: Mutex<String>,
    triggered: AtomicUsize,
}

impl Watch {
    /// Record the current path; `true` if it differs from the last one seen.
    fn path_changed(&self) -> bool {
        let current = self.navigation.current_path();
        let mut last = self.last_path.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == current {
            return false;
        }
        debug!("Path changed: {} -> {}", *last, current);
        *last = current;
        true
    }

    async fn translate_if_needed(&self) {
        let language = self.state.current();
        if language.is_base() {
            return;
        }
        self.triggered.fetch_add(1, Ordering::Relaxed);
        self.engine.run_pass(language).await;
    }

    fn on_content_changed(self: Arc<Self>) {
        if !self.path_changed() {
            return;
        }
        let delay = self.settings.mutation_settle;
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            settle(delay).await;
            self.translate_if_needed().await;
        });
    }

    fn on_navigate(self: Arc<Self>) {
        let delay = self.settings.navigation_settle;
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            settle(delay).await;
            if self.path_changed() {
                self.translate_if_needed().await;
            }
        });
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Arms the content and navigation triggers for one engine.
pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Subscribe to both triggers. Passes are spawned onto `runtime`.
    ///
    /// The watcher stays armed until the returned handle is dropped.
    pub fn arm(
        engine: TranslationEngine,
        state: Arc<LanguageState>,
        events: &dyn ContentEvents,
        navigation: Arc<dyn Navigation>,
        settings: OverlaySettings,
        runtime: Handle,
    ) -> WatcherHandle {
        let watch = Arc::new(Watch {
            last_path: Mutex::new(navigation.current_path()),
            engine,
            state,
            navigation: Arc::clone(&navigation),
            settings,
            runtime,
            triggered: AtomicUsize::new(0),
        });

        // Callbacks hold weak references: the tree owns its listeners, and
        // the engine owns the tree.
        let weak: Weak<Watch> = Arc::downgrade(&watch);
        let content = events.on_content_changed(Arc::new(move || {
            if let Some(watch) = weak.upgrade() {
                watch.on_content_changed();
            }
        }));

        let weak: Weak<Watch> = Arc::downgrade(&watch);
        let history = navigation.on_navigate(Arc::new(move || {
            if let Some(watch) = weak.upgrade() {
                watch.on_navigate();
            }
        }));

        WatcherHandle {
            watch,
            _content: content,
            _navigation: history,
        }
    }
}

/// Keeps a watcher armed; dropping it removes both subscriptions.
pub struct WatcherHandle {
    watch: Arc<Watch>,
    _content: Subscription,
    _navigation: Subscription,
}

impl WatcherHandle {
    /// Passes started by either trigger so far.
    pub fn triggered_passes(&self) -> usize {
        self.watch.triggered.load(Ordering::Relaxed)
    }

    /// The path the watcher last observed.
    pub fn last_path(&self) -> String {
        self.watch
            .last_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn disarm(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TranslationCache;
    use crate::document::Document;
    use crate::i18n::Language;
    use crate::navigation::History;
    use crate::rate_limit::Unlimited;
    use crate::testing::FakeTranslator;

    struct Fixture {
        doc: Arc<Document>,
        history: Arc<History>,
        state: Arc<LanguageState>,
        translator: Arc<FakeTranslator>,
        engine: TranslationEngine,
    }

    fn fixture() -> Fixture {
        let doc = Arc::new(Document::new());
        doc.append_text(doc.body(), "Bonjour").unwrap();
        let translator = Arc::new(
            FakeTranslator::default()
                .with("Bonjour", "Hello")
                .with("Nouveau produit", "New product"),
        );
        let engine = TranslationEngine::new(
            doc.clone(),
            translator.clone(),
            Arc::new(TranslationCache::new()),
            Arc::new(Unlimited),
        );
        Fixture {
            doc,
            history: Arc::new(History::new("/")),
            state: Arc::new(LanguageState::new(Language::ENGLISH)),
            translator,
            engine,
        }
    }

    fn arm(f: &Fixture) -> WatcherHandle {
        ChangeWatcher::arm(
            f.engine.clone(),
            f.state.clone(),
            f.doc.as_ref(),
            f.history.clone(),
            OverlaySettings::default(),
            Handle::current(),
        )
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_without_path_change_does_not_translate() {
        let f = fixture();
        let handle = arm(&f);

        f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();
        wait(1_000).await;

        assert_eq!(handle.triggered_passes(), 0);
        assert!(f.translator.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_with_path_change_translates_after_settle() {
        let f = fixture();
        let handle = arm(&f);

        f.history.push("/produits?page=2");
        f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();

        wait(299).await;
        assert_eq!(handle.triggered_passes(), 0);

        wait(2).await;
        assert_eq!(handle.triggered_passes(), 1);
        assert_eq!(handle.last_path(), "/produits?page=2");
        assert_eq!(f.doc.texts(), vec!["Hello", "New product"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_mutations_on_same_path_trigger_once() {
        let f = fixture();
        let handle = arm(&f);

        f.history.push("/panier");
        for _ in 0..5 {
            f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();
        }
        wait(1_000).await;

        assert_eq!(handle.triggered_passes(), 1);
        assert_eq!(f.translator.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_language_does_not_translate() {
        let f = fixture();
        f.state.set(Language::base());
        let handle = arm(&f);

        f.history.push("/produits");
        f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();
        wait(1_000).await;

        assert_eq!(handle.triggered_passes(), 0);
        assert_eq!(handle.last_path(), "/produits");
        assert!(f.translator.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_to_base_during_settle_cancels_pass() {
        let f = fixture();
        let handle = arm(&f);

        f.history.push("/produits");
        f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();
        wait(150).await;
        f.state.set(Language::base());
        wait(1_000).await;

        assert_eq!(handle.triggered_passes(), 0);
        assert!(f.translator.calls().is_empty());
        assert_eq!(f.doc.texts(), vec!["Bonjour", "Nouveau produit"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_navigation_translates_after_delay() {
        let f = fixture();
        f.history.push("/produits");
        let handle = arm(&f);

        f.history.back();
        wait(100).await;
        assert_eq!(handle.triggered_passes(), 0);

        wait(300).await;
        assert_eq!(handle.triggered_passes(), 1);
        assert_eq!(handle.last_path(), "/");
        assert_eq!(f.doc.texts(), vec!["Hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_already_seen_by_mutation_is_not_repeated() {
        let f = fixture();
        f.history.push("/produits");
        let handle = arm(&f);

        f.history.back();
        f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();
        wait(1_000).await;

        assert_eq!(handle.triggered_passes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_disarms() {
        let f = fixture();
        let handle = arm(&f);
        assert_eq!(f.doc.subscriber_count(), 1);

        handle.disarm();
        assert_eq!(f.doc.subscriber_count(), 0);

        f.history.push("/produits");
        f.doc.append_text(f.doc.body(), "Nouveau produit").unwrap();
        wait(1_000).await;
        assert!(f.translator.calls().is_empty());
    }
}
