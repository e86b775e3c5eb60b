//! Translation passes over the live tree.
//!
//! One pass collects the eligible units, groups them by the text they
//! originally carried, and writes a translation onto every unit of a group.
//! Cache hits are applied immediately; misses go to the translation service
//! one unique text at a time, behind the rate limiter. Switching back to the
//! base language restores units from the cache without touching the network.

use crate::cache::TranslationCache;
use crate::collector::{collect, TextUnit};
use crate::document::TextSource;
use crate::i18n::{Language, TranslationMetrics};
use crate::rate_limit::RateLimiter;
use crate::translation::Translator;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was in flight on this engine; nothing was done.
    Skipped,
    /// The tree had no eligible units.
    Empty,
    /// Base-language pass: units were restored from the cache.
    Restored,
    /// Target-language pass.
    Translated,
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub target: Language,
    /// Eligible units collected.
    pub units: usize,
    /// Distinct original texts among them.
    pub unique_texts: usize,
    /// Unique texts served from the cache.
    pub cache_hits: usize,
    /// Unique texts translated by the service.
    pub fetched: usize,
    /// Unique texts whose request failed.
    pub failed: usize,
    /// Unique texts the service returned no usable translation for.
    pub unchanged: usize,
    /// Unit writes performed in translation mode.
    pub applied: usize,
    /// Units restored to their original text.
    pub restored: usize,
}

impl PassReport {
    fn new(outcome: PassOutcome, target: Language) -> Self {
        Self {
            outcome,
            target,
            units: 0,
            unique_texts: 0,
            cache_hits: 0,
            fetched: 0,
            failed: 0,
            unchanged: 0,
            applied: 0,
            restored: 0,
        }
    }
}

/// Releases the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct EngineInner {
    source: Arc<dyn TextSource>,
    translator: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
    limiter: Arc<dyn RateLimiter>,
    in_flight: AtomicBool,
    /// Language the units were last written in by this engine.
    shown: Mutex<Language>,
    completed_passes: AtomicUsize,
}

/// Cheaply cloneable handle; clones share the in-flight guard.
#[derive(Clone)]
pub struct TranslationEngine {
    inner: Arc<EngineInner>,
}

/// Re-apply the whitespace surrounding `current` around `replacement`.
fn rewrap(current: &str, replacement: &str) -> String {
    let start = current.len() - current.trim_start().len();
    let end = current.trim_end().len();
    if end <= start {
        return replacement.to_string();
    }
    format!("{}{}{}", &current[..start], replacement, &current[end..])
}

impl TranslationEngine {
    pub fn new(
        source: Arc<dyn TextSource>,
        translator: Arc<dyn Translator>,
        cache: Arc<TranslationCache>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                source,
                translator,
                cache,
                limiter,
                in_flight: AtomicBool::new(false),
                shown: Mutex::new(Language::base()),
                completed_passes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.inner.cache
    }

    pub fn is_running(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Passes that ran to completion (skipped passes are not counted).
    pub fn completed_passes(&self) -> usize {
        self.inner.completed_passes.load(Ordering::Relaxed)
    }

    /// Language this engine last left the units in.
    pub fn shown_language(&self) -> Language {
        *self.inner.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one pass towards `target`.
    ///
    /// Returns immediately with [`PassOutcome::Skipped`] if a pass is already
    /// running on this engine. Never fails: per-text errors are logged and
    /// counted in the report.
    pub async fn run_pass(&self, target: Language) -> PassReport {
        let inner = &self.inner;
        let _guard = match inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => InFlight(&inner.in_flight),
            Err(_) => {
                debug!("Pass to {} skipped: another pass is in flight", target);
                return PassReport::new(PassOutcome::Skipped, target);
            }
        };

        let units = collect(inner.source.as_ref());
        let report = if units.is_empty() {
            debug!("Pass to {}: no eligible text units", target);
            PassReport::new(PassOutcome::Empty, target)
        } else if target.is_base() {
            self.restore(target, units)
        } else {
            self.translate(target, units).await
        };

        inner.completed_passes.fetch_add(1, Ordering::Relaxed);
        report
    }

    fn set_shown(&self, language: Language) {
        *self.inner.shown.lock().unwrap_or_else(PoisonError::into_inner) = language;
    }

    fn restore(&self, target: Language, units: Vec<TextUnit>) -> PassReport {
        let inner = &self.inner;
        let shown = self.shown_language();
        let mut report = PassReport::new(PassOutcome::Restored, target);
        report.units = units.len();

        for unit in &units {
            let Some(original) = inner.cache.reverse_lookup(shown, unit.text.trim()) else {
                continue;
            };
            if inner.source.apply_text(&unit.unit, &rewrap(&unit.text, &original)) {
                report.restored += 1;
            }
        }

        self.set_shown(target);
        TranslationMetrics::global().record_restored(report.restored);
        info!(
            "Restored {}/{} text units to {}",
            report.restored, report.units, target
        );
        report
    }

    /// Group units by the text they carried before this engine touched them.
    fn group_by_original(&self, units: Vec<TextUnit>) -> IndexMap<String, Vec<TextUnit>> {
        let shown = self.shown_language();
        let mut groups: IndexMap<String, Vec<TextUnit>> = IndexMap::new();

        for unit in units {
            let current = unit.text.trim();
            let original = if shown.is_base() {
                current.to_string()
            } else {
                self.inner
                    .cache
                    .reverse_lookup(shown, current)
                    .unwrap_or_else(|| current.to_string())
            };
            groups.entry(original).or_default().push(unit);
        }
        groups
    }

    fn apply(&self, units: &[TextUnit], translated: &str) -> usize {
        units
            .iter()
            .filter(|unit| {
                self.inner
                    .source
                    .apply_text(&unit.unit, &rewrap(&unit.text, translated))
            })
            .count()
    }

    async fn translate(&self, target: Language, units: Vec<TextUnit>) -> PassReport {
        let inner = &self.inner;
        let metrics = TranslationMetrics::global();
        let base = Language::base();

        let mut report = PassReport::new(PassOutcome::Translated, target);
        report.units = units.len();

        let groups = self.group_by_original(units);
        report.unique_texts = groups.len();

        for (original, group) in &groups {
            if let Some(cached) = inner.cache.get(target, original) {
                metrics.record_cache_hit();
                report.cache_hits += 1;
                report.applied += self.apply(group, &cached);
                continue;
            }

            metrics.record_cache_miss();
            inner.limiter.acquire().await;
            metrics.record_api_call();

            match inner.translator.translate(original, base, target).await {
                Ok(Some(translated)) => {
                    inner.cache.put(target, original, &translated);
                    report.fetched += 1;
                    report.applied += self.apply(group, &translated);
                }
                Ok(None) => {
                    report.unchanged += 1;
                }
                Err(e) => {
                    metrics.record_api_failure();
                    report.failed += 1;
                    warn!("Translation of {:?} to {} failed: {}", original, target, e);
                }
            }
        }

        self.set_shown(target);
        info!(
            "Translated page to {}: {} units, {} unique texts ({} cached, {} fetched, {} failed)",
            target,
            report.units,
            report.unique_texts,
            report.cache_hits,
            report.fetched,
            report.failed
        );
        report
    }
}
