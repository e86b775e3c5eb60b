//! Decides whether a piece of rendered text is translatable content.

use regex::Regex;
use std::sync::OnceLock;

/// Trimmed texts with fewer characters than this are never translated.
pub const MIN_TEXT_LENGTH: usize = 2;

/// Literal strings that are never sent for translation.
///
/// Brand tokens, rating strings and icon-component names that leak into the
/// rendered text.
pub const DENYLIST: &[&str] = &[
    // Brands
    "PayPal",
    "Visa",
    "Mastercard",
    "Stripe",
    "Apple Pay",
    "Google Pay",
    "WhatsApp",
    "Instagram",
    "Facebook",
    "TikTok",
    "YouTube",
    // Greetings left as authored
    "Hi",
    // Ratings
    "★",
    "★★★★★",
    "☆☆☆☆☆",
    "5/5",
    "4.5/5",
    "4/5",
    "5.0",
    "4.5",
    // Icon components
    "ChevronRight",
    "ChevronLeft",
    "ChevronDown",
    "ChevronUp",
    "ShoppingCart",
    "ShoppingBag",
    "ArrowRight",
    "ArrowLeft",
    "StarIcon",
    "HeartIcon",
    "MenuIcon",
    "CloseIcon",
    "SearchIcon",
    "UserIcon",
];

fn numeric_regex() -> &'static Regex {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    NUMERIC.get_or_init(|| Regex::new(r"^\d+$").expect("numeric pattern is valid"))
}

fn letter_regex() -> &'static Regex {
    static LETTER: OnceLock<Regex> = OnceLock::new();
    LETTER.get_or_init(|| Regex::new(r"[a-zA-ZÀ-ÿ]").expect("letter pattern is valid"))
}

/// Returns `true` when `text` should be translated.
///
/// Rejects, in order: empty or too-short text, denylisted literals, pure
/// numbers, anything containing `@`, and anything starting with `http`.
/// Whatever remains must contain at least one ASCII or Latin-1 letter.
pub fn is_eligible(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.chars().count() < MIN_TEXT_LENGTH {
        return false;
    }

    if DENYLIST.contains(&trimmed) {
        return false;
    }

    if numeric_regex().is_match(trimmed) {
        return false;
    }

    if trimmed.contains('@') {
        return false;
    }

    if trimmed.starts_with("http") {
        return false;
    }

    letter_regex().is_match(trimmed)
}
