use serde::{Deserialize, Serialize};

/// Handle to an element owned by a [`crate::page::FeedPage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// A feed entry produced by one scan pass. Only `identity` outlives the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub identity: String,
    pub element: ElementId,
}

const IDENTITY_TITLE_CHARS: usize = 30;

impl FeedItem {
    pub fn new(index: usize, title: String, element: ElementId) -> Self {
        let identity = item_identity(index, &title);
        Self {
            title,
            identity,
            element,
        }
    }
}

/// Position in the ad-filtered list plus a title prefix. Drifts if the feed reorders.
pub fn item_identity(index: usize, title: &str) -> String {
    let prefix: String = title.chars().take(IDENTITY_TITLE_CHARS).collect();
    format!("video_{index}_{prefix}")
}
