//! Runtime translation overlay for rendered pages authored in French.
//!
//! The overlay walks a tree of text units, translates the eligible ones into
//! the selected language through a remote service, caches every result for
//! the life of the process and restores the original text when the user
//! switches back to French.
//!
//! ```no_run
//! use page_translator::document::Document;
//! use page_translator::overlay::Overlay;
//! use page_translator::translation::MyMemoryClient;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let document = Arc::new(Document::from_json(r#"{"tag":"body","children":["Bonjour"]}"#)?);
//! let client = MyMemoryClient::new(reqwest::Client::new(), page_translator::config::DEFAULT_API_URL);
//! let overlay = Overlay::for_document(document.clone(), Arc::new(client)).mount()?;
//!
//! if let Some(pass) = overlay.change_language("en")? {
//!     pass.await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod collector;
pub mod config;
pub mod document;
pub mod eligibility;
pub mod engine;
pub mod i18n;
pub mod navigation;
pub mod overlay;
pub mod rate_limit;
pub mod retry;
pub mod state;
pub mod translation;
pub mod watcher;

#[cfg(test)]
mod testing;
