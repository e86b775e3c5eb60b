//! Collects the translatable text units of the current tree snapshot.

use crate::document::{Container, TextSource, UnitRef};
use crate::eligibility::is_eligible;
use tracing::debug;

/// Containers whose text is code or markup, never content.
pub const SKIPPED_TAGS: &[&str] = &["script", "style", "code", "pre", "noscript", "textarea"];

/// Class that opts a container's text out of translation.
pub const OPT_OUT_CLASS: &str = "notranslate";

/// Attribute that opts a container's text out of translation, whatever its value.
pub const OPT_OUT_ATTRIBUTE: &str = "data-no-translate";

/// One translatable leaf and the text it currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub unit: UnitRef,
    pub text: String,
}

/// Whether the text directly inside `container` must be left alone.
pub fn is_excluded_container(container: &Container) -> bool {
    let tag_skipped = SKIPPED_TAGS
        .iter()
        .any(|tag| container.tag.eq_ignore_ascii_case(tag));

    tag_skipped
        || container.has_class(OPT_OUT_CLASS)
        || container.attribute(OPT_OUT_ATTRIBUTE).is_some()
        || container
            .attribute("translate")
            .is_some_and(|value| value.eq_ignore_ascii_case("no"))
}

/// Eligible text units in document order.
///
/// A source that cannot be traversed yields no units.
pub fn collect(source: &dyn TextSource) -> Vec<TextUnit> {
    let leaves = match source.collect_leaves() {
        Ok(leaves) => leaves,
        Err(e) => {
            debug!("Text collection skipped: {}", e);
            return Vec::new();
        }
    };

    leaves
        .into_iter()
        .filter(|leaf| !is_excluded_container(&leaf.container))
        .filter(|leaf| is_eligible(&leaf.text))
        .map(|leaf| TextUnit {
            unit: leaf.unit,
            text: leaf.text,
        })
        .collect()
}
