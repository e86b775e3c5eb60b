//! Languages known to the overlay.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for all supported languages and their metadata
//! - `language`: Validated `Language` handle, including the base language
//! - `metrics`: Translation counters shared by every overlay instance
//!
//! # Example
//!
//! ```rust
//! use page_translator::i18n::{Language, LanguageRegistry};
//!
//! let base = Language::base();
//! assert!(base.is_base());
//!
//! let english = Language::from_code("en").unwrap();
//! assert!(!english.is_base());
//!
//! assert!(!LanguageRegistry::get().list_enabled().is_empty());
//! ```

mod language;
mod metrics;
mod registry;

pub use language::{Language, LanguageError};
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageConfig, LanguageRegistry};
