use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use url::Url;

use crate::{
    infrastructure::shutdown::ShutdownListener,
    page::FeedPage,
    tasks::orchestrator::Event,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: Url,
    pub feed_root: bool,
}

/// Detects client-side navigations by comparing successive page locations.
#[derive(Debug, Clone)]
pub struct NavigationWatcher {
    current: Url,
    root_paths: Vec<String>,
}

impl NavigationWatcher {
    pub fn new(initial: Url, root_paths: Vec<String>) -> Self {
        Self {
            current: initial,
            root_paths,
        }
    }

    pub fn is_feed_root(&self, url: &Url) -> bool {
        self.root_paths.iter().any(|root| root == url.path())
    }

    /// Returns a navigation when the full URL differs from the last one observed.
    pub fn observe(&mut self, url: Url) -> Option<Navigation> {
        if url == self.current {
            return None;
        }
        self.current = url.clone();
        let feed_root = self.is_feed_root(&url);
        Some(Navigation { url, feed_root })
    }

    pub fn spawn(
        mut self,
        page: Arc<dyn FeedPage>,
        interval: Duration,
        events: mpsc::UnboundedSender<Event>,
        mut shutdown: ShutdownListener,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown.notified() => break,
                }
                if let Some(navigation) = self.observe(page.location()) {
                    tracing::debug!(
                        target: "navigation",
                        url = %navigation.url,
                        feed_root = navigation.feed_root,
                        "location changed"
                    );
                    if events.send(Event::Navigated(navigation)).is_err() {
                        break;
                    }
                }
            }
        })
    }
}
