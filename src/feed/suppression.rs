use crate::{
    domain::FeedItem,
    page::{style_set, FeedPage, HoverStyles, Label},
    tasks::counter::CounterQueue,
};

pub const FILTERED_LABEL: &str = "Filtered by AI";

const DIM_FILTER: &str = "blur(5px)";
const DIM_OPACITY: &str = "0.6";
const HOVER_FILTER: &str = "blur(2px)";
const HOVER_OPACITY: &str = "0.8";

/// Dims a blocked item, labels it, and bumps the persisted counter.
///
/// Not idempotent: a second call on the same item adds a second label.
#[derive(Clone)]
pub struct Suppressor {
    counter: CounterQueue,
}

impl Suppressor {
    pub fn new(counter: CounterQueue) -> Self {
        Self { counter }
    }

    pub fn suppress(&self, page: &dyn FeedPage, item: &FeedItem) {
        tracing::info!(target: "suppress", title = %item.title, identity = %item.identity, "suppressing item");
        self.counter.increment();
        apply_dim(page, item);
    }
}

fn apply_dim(page: &dyn FeedPage, item: &FeedItem) {
    let element = item.element;
    page.set_style(element, "filter", DIM_FILTER);
    page.set_style(element, "opacity", DIM_OPACITY);
    page.set_style(element, "transition", "filter 0.3s ease, opacity 0.3s ease");

    page.set_hover_styles(
        element,
        HoverStyles {
            enter: style_set(&[("filter", HOVER_FILTER), ("opacity", HOVER_OPACITY)]),
            leave: style_set(&[("filter", DIM_FILTER), ("opacity", DIM_OPACITY)]),
        },
    );

    if page.style(element, "position").as_deref() != Some("relative") {
        page.set_style(element, "position", "relative");
    }

    page.append_label(
        element,
        Label {
            text: FILTERED_LABEL.to_string(),
            styles: style_set(&[
                ("position", "absolute"),
                ("top", "10px"),
                ("left", "10px"),
                ("background-color", "rgba(255, 0, 0, 0.9)"),
                ("color", "white"),
                ("padding", "8px 12px"),
                ("font-size", "12px"),
                ("font-weight", "bold"),
                ("border-radius", "4px"),
                ("z-index", "1000"),
                ("pointer-events", "none"),
            ]),
        },
    );
}
