//! Navigation seam: the current route and history-navigation notifications.

use crate::document::{Callback, Listeners, Subscription};
use std::sync::{Mutex, PoisonError};

/// Where the page currently is, and when the user moves through history.
pub trait Navigation: Send + Sync {
    /// The effective path: route plus query string (`/produits?page=2`).
    fn current_path(&self) -> String;

    /// Called on history navigation (back/forward).
    fn on_navigate(&self, callback: Callback) -> Subscription;
}

#[derive(Debug)]
struct Entries {
    stack: Vec<String>,
    index: usize,
}

/// In-memory browser-like history.
///
/// `push` and `replace` change the path without an event, as programmatic
/// navigation does; only `back` and `forward` notify listeners.
pub struct History {
    entries: Mutex<Entries>,
    listeners: Listeners,
}

impl History {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: Mutex::new(Entries {
                stack: vec![initial.to_string()],
                index: 0,
            }),
            listeners: Listeners::default(),
        }
    }

    pub fn push(&self, path: &str) {
        let mut entries = self.entries();
        let next = entries.index + 1;
        entries.stack.truncate(next);
        entries.stack.push(path.to_string());
        entries.index = next;
    }

    pub fn replace(&self, path: &str) {
        let mut entries = self.entries();
        let index = entries.index;
        entries.stack[index] = path.to_string();
    }

    /// Returns `false` (and stays silent) when already at the first entry.
    pub fn back(&self) -> bool {
        let moved = {
            let mut entries = self.entries();
            if entries.index == 0 {
                false
            } else {
                entries.index -= 1;
                true
            }
        };
        if moved {
            self.listeners.notify();
        }
        moved
    }

    /// Returns `false` (and stays silent) when already at the last entry.
    pub fn forward(&self) -> bool {
        let moved = {
            let mut entries = self.entries();
            if entries.index + 1 >= entries.stack.len() {
                false
            } else {
                entries.index += 1;
                true
            }
        };
        if moved {
            self.listeners.notify();
        }
        moved
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigation for History {
    fn current_path(&self) -> String {
        let entries = self.entries();
        entries.stack[entries.index].clone()
    }

    fn on_navigate(&self, callback: Callback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}
