use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    domain::{ElementId, FeedItem},
    page::{FeedPage, Selector},
};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub const FEED_ITEM: Selector = Selector::Tag("ytd-rich-item-renderer");
pub const AD_SLOT: Selector = Selector::Tag("ytd-ad-slot-renderer");
pub const CONTENT_MARKERS: &[Selector] = &[
    Selector::Tag("ytd-rich-grid-media"),
    Selector::Id("dismissible"),
];

/// Title locations in priority order.
pub const TITLE_CHAIN: &[Selector] = &[
    Selector::TagWithId("a", "video-title"),
    Selector::Id("video-title"),
    Selector::Descendant("h3", "a"),
    Selector::IdContains("video-title"),
    Selector::TagWithAttr("a", "title"),
    Selector::Tag("yt-formatted-string"),
    Selector::Descendant("a", "span"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Only the first `limit` feed items, used while the gate is up.
    Gated { limit: usize },
    Full,
}

#[derive(Debug, Clone)]
pub struct ScanRules {
    pub item: Selector,
    pub ad_slot: Selector,
    pub content_markers: &'static [Selector],
    pub title_chain: &'static [Selector],
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            item: FEED_ITEM,
            ad_slot: AD_SLOT,
            content_markers: CONTENT_MARKERS,
            title_chain: TITLE_CHAIN,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedScanner {
    rules: ScanRules,
}

impl FeedScanner {
    pub fn new(rules: ScanRules) -> Self {
        Self { rules }
    }

    pub fn scan(&self, page: &dyn FeedPage, mode: ScanMode) -> Vec<FeedItem> {
        let containers = self.content_containers(page);
        let considered = match mode {
            ScanMode::Gated { limit } => limit.min(containers.len()),
            ScanMode::Full => containers.len(),
        };
        tracing::debug!(
            target: "scanner",
            containers = containers.len(),
            considered,
            ?mode,
            "scan pass"
        );

        containers
            .into_iter()
            .take(considered)
            .enumerate()
            .filter_map(|(index, container)| match self.extract_title(page, container) {
                Some(title) => Some(FeedItem::new(index, title, container)),
                None => {
                    tracing::debug!(target: "scanner", index, "no title found; skipping item");
                    None
                }
            })
            .collect()
    }

    /// Feed containers that are not ad slots and carry real content.
    fn content_containers(&self, page: &dyn FeedPage) -> Vec<ElementId> {
        page.query_all(&self.rules.item)
            .into_iter()
            .filter(|container| page.query_within(*container, &self.rules.ad_slot).is_none())
            .filter(|container| {
                self.rules
                    .content_markers
                    .iter()
                    .any(|marker| page.query_within(*container, marker).is_some())
            })
            .collect()
    }

    fn extract_title(&self, page: &dyn FeedPage, container: ElementId) -> Option<String> {
        self.rules.title_chain.iter().find_map(|selector| {
            let element = page.query_within(container, selector)?;
            let text = normalize_title(&page.text_content(element)?);
            (!text.is_empty()).then_some(text)
        })
    }
}

fn normalize_title(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::page::{document::NodeSpec, FeedDocument};

    fn video(title_node: NodeSpec) -> NodeSpec {
        NodeSpec::new("ytd-rich-item-renderer")
            .child(NodeSpec::new("ytd-rich-grid-media").child(title_node))
    }

    fn page(body: Vec<NodeSpec>) -> FeedDocument {
        FeedDocument::new(Url::parse("https://www.youtube.com/").unwrap(), &body)
    }

    #[test]
    fn skips_ads_and_placeholders() {
        let doc = page(vec![
            video(NodeSpec::new("a").id("video-title").text("First")),
            NodeSpec::new("ytd-rich-item-renderer")
                .child(NodeSpec::new("ytd-ad-slot-renderer"))
                .child(NodeSpec::new("ytd-rich-grid-media")),
            NodeSpec::new("ytd-rich-item-renderer"),
            NodeSpec::new("ytd-rich-item-renderer").child(
                NodeSpec::new("div")
                    .id("dismissible")
                    .child(NodeSpec::new("h3").child(NodeSpec::new("a").text("Second"))),
            ),
        ]);

        let items = FeedScanner::default().scan(&doc, ScanMode::Full);
        let ids: Vec<_> = items.iter().map(|i| i.identity.as_str()).collect();
        assert_eq!(ids, vec!["video_0_First", "video_1_Second"]);
    }

    #[test]
    fn title_chain_falls_through_empty_matches() {
        let doc = page(vec![video(
            NodeSpec::new("div")
                .child(NodeSpec::new("a").id("video-title").text("   "))
                .child(NodeSpec::new("yt-formatted-string").text("  Deep\n  learning  ")),
        )]);

        let items = FeedScanner::default().scan(&doc, ScanMode::Full);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Deep learning");
    }

    #[test]
    fn untitled_items_keep_their_index_slot() {
        let doc = page(vec![
            video(NodeSpec::new("div")),
            video(NodeSpec::new("a").attr("title", "x").text("Titled")),
        ]);

        let items = FeedScanner::default().scan(&doc, ScanMode::Full);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identity, "video_1_Titled");
    }

    #[test]
    fn gated_mode_limits_to_first_items() {
        let body = (0..15)
            .map(|i| video(NodeSpec::new("a").id("video-title").text(&format!("Video {i}"))))
            .collect();
        let doc = page(body);

        let scanner = FeedScanner::default();
        assert_eq!(scanner.scan(&doc, ScanMode::Gated { limit: 10 }).len(), 10);
        assert_eq!(scanner.scan(&doc, ScanMode::Full).len(), 15);
    }
}
