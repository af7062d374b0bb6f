//! The page surface the filter runs against.
//!
//! Everything the orchestrator needs from a feed page goes through
//! [`FeedPage`]: element queries scoped to a container, inline style edits,
//! the "filtered" label, hover styles, and the full-viewport overlay.

pub mod document;
pub mod snapshot;

use url::Url;

use crate::domain::ElementId;

pub use document::FeedDocument;

/// Structured element selector. Chains of these are tried in order by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// `tag`
    Tag(&'static str),
    /// `#id`
    Id(&'static str),
    /// `tag#id`
    TagWithId(&'static str, &'static str),
    /// `[id*="fragment"]`
    IdContains(&'static str),
    /// `tag[attr]`
    TagWithAttr(&'static str, &'static str),
    /// `ancestor descendant`, both by tag
    Descendant(&'static str, &'static str),
}

/// A declarative style change, `(property, value)` pairs applied in order.
pub type StyleSet = Vec<(String, String)>;

pub fn style_set(pairs: &[(&str, &str)]) -> StyleSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Styles swapped in on pointer-enter and restored on pointer-leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverStyles {
    pub enter: StyleSet,
    pub leave: StyleSet,
}

/// A non-interactive text badge attached inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub styles: StyleSet,
}

pub trait FeedPage: Send + Sync {
    fn location(&self) -> Url;

    /// All elements in document order matching `selector`.
    fn query_all(&self, selector: &Selector) -> Vec<ElementId>;

    /// First descendant of `scope` matching `selector`, in document order.
    fn query_within(&self, scope: ElementId, selector: &Selector) -> Option<ElementId>;

    /// Concatenated text of the element and its descendants.
    fn text_content(&self, element: ElementId) -> Option<String>;

    fn style(&self, element: ElementId, property: &str) -> Option<String>;

    fn set_style(&self, element: ElementId, property: &str, value: &str);

    fn append_label(&self, element: ElementId, label: Label);

    fn set_hover_styles(&self, element: ElementId, hover: HoverStyles);

    /// Returns `false` when an overlay is already present.
    fn show_overlay(&self, message: &str) -> bool;

    fn set_overlay_message(&self, message: &str);

    /// Returns `false` when there was no overlay to remove.
    fn remove_overlay(&self) -> bool;

    fn set_scroll_locked(&self, locked: bool);
}
