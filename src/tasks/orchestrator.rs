use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{sleep_until, Instant},
};

use crate::{
    config::{FeedConfig, TimingConfig},
    domain::{EpochCause, EpochId, StoreChange, StoreKey},
    feed::{
        navigation::Navigation, DedupLedger, FeedScanner, Gate, GateState, GateTransition,
        Suppressor,
    },
    infrastructure::shutdown::ShutdownListener,
    page::FeedPage,
    tasks::{
        counter::CounterQueue,
        dispatcher::{ClassificationRequest, ClassificationResult, Dispatch},
    },
};

/// Everything that can happen to the filter, delivered on one queue.
#[derive(Debug)]
pub enum Event {
    Navigated(Navigation),
    Store(StoreChange),
    Classified(ClassificationResult),
}

/// State that lives exactly as long as one epoch.
struct EpochState {
    id: EpochId,
    ledger: DedupLedger,
    gate: Gate,
}

impl EpochState {
    fn new(id: EpochId, quorum_target: usize) -> Self {
        Self {
            id,
            ledger: DedupLedger::default(),
            gate: Gate::new(quorum_target),
        }
    }
}

pub struct Orchestrator {
    page: Arc<dyn FeedPage>,
    scanner: FeedScanner,
    dispatcher: Arc<dyn Dispatch>,
    suppressor: Suppressor,
    counter: CounterQueue,
    feed: FeedConfig,
    timing: TimingConfig,
    preferences: String,
    enabled: bool,
    epoch: EpochState,
    next_scan: Option<Instant>,
    next_message: Option<Instant>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page: Arc<dyn FeedPage>,
        scanner: FeedScanner,
        dispatcher: Arc<dyn Dispatch>,
        counter: CounterQueue,
        feed: FeedConfig,
        timing: TimingConfig,
        preferences: String,
    ) -> Self {
        let epoch = EpochState::new(EpochId::default(), feed.gate_quorum);
        Self {
            page,
            scanner,
            dispatcher,
            suppressor: Suppressor::new(counter.clone()),
            counter,
            feed,
            timing,
            preferences,
            enabled: false,
            epoch,
            next_scan: None,
            next_message: None,
        }
    }

    pub fn epoch(&self) -> EpochId {
        self.epoch.id
    }

    pub fn gate_state(&self) -> GateState {
        self.epoch.gate.state()
    }

    pub fn ledger_len(&self) -> usize {
        self.epoch.ledger.len()
    }

    pub fn preferences(&self) -> &str {
        &self.preferences
    }

    /// Activates on the configured feed host and opens the first epoch.
    pub fn start(&mut self) {
        let location = self.page.location();
        self.enabled = location.host_str() == Some(self.feed.host.as_str());
        if !self.enabled {
            tracing::info!(
                target: "orchestrator",
                host = location.host_str().unwrap_or("-"),
                expected = %self.feed.host,
                "not a feed host; filter idle"
            );
            return;
        }
        tracing::info!(target: "orchestrator", url = %location, "feed host detected");
        self.begin_epoch(EpochCause::Startup);
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Navigated(navigation) => self.on_navigation(navigation),
            Event::Store(change) => self.on_store_change(change),
            Event::Classified(result) => self.on_classified(result),
        }
    }

    /// One scan pass. Ledger check and mark happen here, before dispatch.
    pub fn scan(&mut self) {
        if !self.enabled || self.preferences.is_empty() {
            return;
        }

        let mode = self.epoch.gate.scan_mode();
        let items = self.scanner.scan(self.page.as_ref(), mode);
        let mut dispatched = 0usize;
        for item in items {
            if !self.epoch.ledger.claim(&item.identity) {
                continue;
            }
            dispatched += 1;
            self.dispatcher.dispatch(ClassificationRequest {
                epoch: self.epoch.id,
                item,
                preferences: self.preferences.clone(),
            });
        }

        if dispatched > 0 {
            tracing::info!(
                target: "orchestrator",
                epoch = %self.epoch.id,
                dispatched,
                seen = self.epoch.ledger.len(),
                "classification requests dispatched"
            );
        }
    }

    pub fn rotate_gate_message(&mut self) {
        self.epoch.gate.rotate_message(self.page.as_ref());
    }

    /// Drives timers and events until shutdown, then removes the overlay.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut shutdown: ShutdownListener,
    ) {
        self.start();

        loop {
            let gate_deadline = if self.epoch.gate.is_gating() {
                self.next_message
            } else {
                None
            };

            tokio::select! {
                _ = shutdown.notified() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = wait_until(self.next_scan) => {
                    self.scan();
                    self.next_scan = Some(Instant::now() + self.timing.scan_interval);
                }
                _ = wait_until(gate_deadline) => {
                    self.rotate_gate_message();
                    self.next_message = Some(Instant::now() + self.timing.gate_message_interval);
                }
            }
        }

        self.epoch.gate.teardown(self.page.as_ref());
        tracing::info!(target: "orchestrator", "orchestrator stopped");
    }

    fn on_navigation(&mut self, navigation: Navigation) {
        if !self.enabled || !navigation.feed_root {
            return;
        }
        tracing::info!(target: "navigation", url = %navigation.url, "feed root navigation");
        self.begin_epoch(EpochCause::Navigation);
    }

    fn on_store_change(&mut self, change: StoreChange) {
        match change.key {
            StoreKey::PreferencesText => {
                let preferences = change.new_value.as_str().unwrap_or_default().to_string();
                tracing::info!(
                    target: "orchestrator",
                    empty = preferences.is_empty(),
                    "preferences updated"
                );
                self.preferences = preferences;
                if self.enabled {
                    self.begin_epoch(EpochCause::PreferencesChanged);
                }
            }
            StoreKey::BlockedCount => {
                tracing::trace!(target: "store", value = %change.new_value, "blocked counter changed");
            }
        }
    }

    fn on_classified(&mut self, result: ClassificationResult) {
        if result.epoch != self.epoch.id {
            tracing::debug!(
                target: "orchestrator",
                stale = %result.epoch,
                current = %self.epoch.id,
                identity = %result.item.identity,
                "discarding result from previous epoch"
            );
            return;
        }

        if let GateTransition::Released = self.epoch.gate.record_resolution(self.page.as_ref()) {
            self.next_message = None;
        }

        if result.outcome.should_suppress() {
            self.suppressor.suppress(self.page.as_ref(), &result.item);
        }
    }

    fn begin_epoch(&mut self, cause: EpochCause) {
        self.epoch.gate.teardown(self.page.as_ref());
        let id = self.epoch.id.next();
        self.epoch = EpochState::new(id, self.feed.gate_quorum);

        let on_root = self.feed.is_root_path(self.page.location().path());
        if cause == EpochCause::Navigation || on_root {
            self.counter.reset();
        }

        if self.preferences.is_empty() {
            self.next_scan = None;
            self.next_message = None;
            tracing::info!(target: "orchestrator", epoch = %id, ?cause, "epoch started without preferences; idle");
            return;
        }

        let now = Instant::now();
        self.next_scan = Some(now + self.timing.initial_scan_delay);
        self.next_message = if self.epoch.gate.open(self.page.as_ref()) {
            Some(now + self.timing.gate_message_interval)
        } else {
            None
        };
        tracing::info!(
            target: "orchestrator",
            epoch = %id,
            ?cause,
            gating = self.epoch.gate.is_gating(),
            "epoch started"
        );
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => futures::future::pending::<()>().await,
    }
}

/// Forwards store notifications onto the event queue.
pub fn spawn_store_forwarder(
    mut changes: broadcast::Receiver<StoreChange>,
    events: mpsc::UnboundedSender<Event>,
    mut shutdown: ShutdownListener,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                received = changes.recv() => received,
                _ = shutdown.notified() => break,
            };
            match received {
                Ok(change) => {
                    if events.send(Event::Store(change)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "store", skipped, "store notifications lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::{
        domain::{ClassificationOutcome, Decision},
        feed::{gate::GATE_MESSAGES, suppression::FILTERED_LABEL, GatePhase, NavigationWatcher},
        infrastructure::shutdown::{Shutdown, StopReason},
        page::{document::NodeSpec, FeedDocument},
        store::{PersistedStore, PreferenceBridge},
    };

    #[derive(Default)]
    struct RecordingDispatcher {
        requests: Mutex<Vec<ClassificationRequest>>,
    }

    impl RecordingDispatcher {
        fn take(&self) -> Vec<ClassificationRequest> {
            std::mem::take(&mut *self.requests.lock())
        }
    }

    impl Dispatch for RecordingDispatcher {
        fn dispatch(&self, request: ClassificationRequest) {
            self.requests.lock().push(request);
        }
    }

    fn video_body(videos: usize) -> Vec<NodeSpec> {
        (0..videos)
            .map(|i| {
                NodeSpec::new("ytd-rich-item-renderer").child(
                    NodeSpec::new("ytd-rich-grid-media").child(
                        NodeSpec::new("a")
                            .id("video-title")
                            .text(&format!("Video number {i}")),
                    ),
                )
            })
            .collect()
    }

    struct Harness {
        orchestrator: Orchestrator,
        page: Arc<FeedDocument>,
        dispatcher: Arc<RecordingDispatcher>,
        store: Arc<PersistedStore>,
        counter: CounterQueue,
    }

    impl Harness {
        async fn new(url: &str, videos: usize, preferences: &str, initial_count: u64) -> Self {
            let page = Arc::new(FeedDocument::new(Url::parse(url).unwrap(), &video_body(videos)));
            let store = Arc::new(PersistedStore::in_memory());
            store.set_blocked_count(initial_count).await.unwrap();
            let (counter, _worker) = CounterQueue::spawn(PreferenceBridge::new(store.clone()));
            let dispatcher = Arc::new(RecordingDispatcher::default());

            let orchestrator = Orchestrator::new(
                page.clone(),
                FeedScanner::default(),
                dispatcher.clone(),
                counter.clone(),
                FeedConfig::default(),
                TimingConfig::default(),
                preferences.to_string(),
            );
            Self {
                orchestrator,
                page,
                dispatcher,
                store,
                counter,
            }
        }

        fn resolve(&mut self, request: &ClassificationRequest, outcome: ClassificationOutcome) {
            self.orchestrator
                .handle_event(Event::Classified(ClassificationResult {
                    epoch: request.epoch,
                    item: request.item.clone(),
                    outcome,
                }));
        }

        async fn blocked_count(&self) -> u64 {
            self.counter.flush().await;
            self.store.snapshot().blocked_count
        }

        fn preferences_changed(&mut self, text: &str) {
            self.orchestrator.handle_event(Event::Store(StoreChange {
                key: StoreKey::PreferencesText,
                old_value: json!(self.orchestrator.preferences()),
                new_value: json!(text),
            }));
        }
    }

    const HOME: &str = "https://www.youtube.com/";

    #[tokio::test]
    async fn filters_three_of_ten_and_releases_gate() {
        let mut h = Harness::new(HOME, 12, "I want AI and tech, avoid gaming", 5).await;
        h.orchestrator.start();
        assert_eq!(h.blocked_count().await, 0);
        assert!(h.gate_is_up());

        h.orchestrator.scan();
        let requests = h.dispatcher.take();
        assert_eq!(requests.len(), 10);

        // A second pass while gating finds nothing new.
        h.orchestrator.scan();
        assert!(h.dispatcher.take().is_empty());

        for (i, request) in requests.iter().enumerate() {
            assert!(h.gate_is_up(), "gate dropped early at {i}");
            let decision = if i % 3 == 0 && i < 9 {
                Decision::Remove
            } else {
                Decision::Keep
            };
            h.resolve(request, ClassificationOutcome::Decided(decision));
        }

        assert!(!h.gate_is_up());
        assert!(!h.page.is_scroll_locked());
        assert_eq!(h.orchestrator.gate_state().quorum_reached, 10);
        assert_eq!(h.blocked_count().await, 3);

        let labelled = requests
            .iter()
            .filter(|r| !h.page.labels(r.item.element).is_empty())
            .count();
        assert_eq!(labelled, 3);
        assert_eq!(
            h.page.labels(requests[0].item.element)[0].text,
            FILTERED_LABEL
        );

        // Once idle, the remaining items are picked up.
        h.orchestrator.scan();
        assert_eq!(h.dispatcher.take().len(), 2);
    }

    #[tokio::test]
    async fn empty_preferences_never_scan() {
        let mut h = Harness::new(HOME, 10, "", 0).await;
        h.orchestrator.start();
        h.orchestrator.scan();
        assert!(h.dispatcher.take().is_empty());
        assert!(!h.orchestrator.gate_state().active);
        assert!(h.page.overlay_message().is_none());
    }

    #[tokio::test]
    async fn failures_still_release_gate() {
        let mut h = Harness::new(HOME, 10, "avoid gaming", 0).await;
        h.orchestrator.start();
        h.orchestrator.scan();
        for request in h.dispatcher.take() {
            h.resolve(&request, ClassificationOutcome::Failed("HTTP 500".to_string()));
        }
        assert!(!h.gate_is_up());
        assert!(h.page.overlay_message().is_none());
        assert_eq!(h.blocked_count().await, 0);
    }

    #[tokio::test]
    async fn late_results_from_previous_epoch_are_ignored() {
        let mut h = Harness::new(HOME, 10, "avoid gaming", 0).await;
        h.orchestrator.start();
        h.orchestrator.scan();
        let first = h.dispatcher.take();
        for request in &first[..6] {
            h.resolve(request, ClassificationOutcome::Decided(Decision::Keep));
        }
        assert_eq!(h.orchestrator.gate_state().quorum_reached, 6);

        let old_epoch = h.orchestrator.epoch();
        h.preferences_changed("avoid cooking");
        assert_ne!(h.orchestrator.epoch(), old_epoch);
        assert_eq!(h.orchestrator.ledger_len(), 0);
        assert!(h.gate_is_up());
        assert_eq!(h.orchestrator.gate_state().quorum_reached, 0);

        for request in &first[6..] {
            h.resolve(request, ClassificationOutcome::Decided(Decision::Remove));
        }
        assert_eq!(h.orchestrator.gate_state().quorum_reached, 0);
        assert_eq!(h.orchestrator.ledger_len(), 0);
        assert_eq!(h.blocked_count().await, 0);
        assert!(h.page.labels(first[6].item.element).is_empty());

        h.orchestrator.scan();
        let second = h.dispatcher.take();
        assert_eq!(second.len(), 10);
        assert!(second.iter().all(|r| r.preferences == "avoid cooking"));
        assert!(second.iter().all(|r| r.epoch == h.orchestrator.epoch()));
    }

    #[tokio::test]
    async fn clearing_preferences_drops_gate() {
        let mut h = Harness::new(HOME, 10, "avoid gaming", 0).await;
        h.orchestrator.start();
        assert!(h.gate_is_up());
        h.preferences_changed("");
        assert!(!h.gate_is_up());
        assert!(!h.page.is_scroll_locked());
        h.orchestrator.scan();
        assert!(h.dispatcher.take().is_empty());
    }

    #[tokio::test]
    async fn feed_root_navigation_resets_counter_and_epoch() {
        let mut h = Harness::new("https://www.youtube.com/watch?v=1", 10, "avoid gaming", 4).await;
        h.orchestrator.start();
        assert_eq!(h.blocked_count().await, 4);

        h.orchestrator.scan();
        let first = h.dispatcher.take();
        assert_eq!(first.len(), 10);
        for request in &first {
            h.resolve(request, ClassificationOutcome::Decided(Decision::Keep));
        }
        assert!(!h.gate_is_up());

        let before = h.orchestrator.epoch();
        h.page.navigate(Url::parse("https://www.youtube.com/watch?v=2").unwrap());
        h.orchestrator.handle_event(Event::Navigated(Navigation {
            url: h.page.location(),
            feed_root: false,
        }));
        assert_eq!(h.orchestrator.epoch(), before);

        h.page.navigate(Url::parse(HOME).unwrap());
        h.orchestrator.handle_event(Event::Navigated(Navigation {
            url: h.page.location(),
            feed_root: true,
        }));
        assert_ne!(h.orchestrator.epoch(), before);
        assert_eq!(h.orchestrator.ledger_len(), 0);
        assert!(h.gate_is_up());
        assert_eq!(h.blocked_count().await, 0);
    }

    #[tokio::test]
    async fn remove_after_gate_release_still_counts() {
        let mut h = Harness::new(HOME, 11, "avoid gaming", 0).await;
        h.orchestrator.start();
        h.orchestrator.scan();
        for request in h.dispatcher.take() {
            h.resolve(&request, ClassificationOutcome::Decided(Decision::Keep));
        }
        h.orchestrator.scan();
        let tail = h.dispatcher.take();
        assert_eq!(tail.len(), 1);
        h.resolve(&tail[0], ClassificationOutcome::Decided(Decision::Remove));
        assert_eq!(h.blocked_count().await, 1);
        assert_eq!(h.orchestrator.gate_state().quorum_reached, 10);
    }

    #[tokio::test]
    async fn other_hosts_stay_idle() {
        let mut h = Harness::new("https://example.com/", 10, "avoid gaming", 2).await;
        h.orchestrator.start();
        h.orchestrator.scan();
        assert!(h.dispatcher.take().is_empty());
        assert!(h.page.overlay_message().is_none());
        assert_eq!(h.blocked_count().await, 2);
    }

    async fn wait_for_overlay(page: &FeedDocument, message: &str) -> bool {
        tokio::time::timeout(Duration::from_secs(2), async {
            while page.overlay_message().as_deref() != Some(message) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn run_loop_scans_after_initial_delay() {
        let mut h = Harness::new(HOME, 3, "avoid gaming", 0).await;
        h.orchestrator.timing = TimingConfig {
            initial_scan_delay: Duration::from_millis(10),
            scan_interval: Duration::from_millis(10),
            gate_message_interval: Duration::from_millis(15),
            ..TimingConfig::default()
        };
        let Harness {
            orchestrator,
            page,
            dispatcher,
            ..
        } = h;

        let shutdown = Shutdown::new();
        let (_tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(orchestrator.run(rx, shutdown.subscribe()));

        // Three items never reach the quorum, so the messages keep alternating.
        assert!(wait_for_overlay(&page, GATE_MESSAGES[1]).await);
        assert!(wait_for_overlay(&page, GATE_MESSAGES[0]).await);
        assert!(wait_for_overlay(&page, GATE_MESSAGES[1]).await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(dispatcher.take().len(), 3);
        assert!(page.is_scroll_locked());

        shutdown.trigger(StopReason::Interrupt);
        task.await.unwrap();
        assert!(page.overlay_message().is_none());
        assert!(!page.is_scroll_locked());
    }

    #[tokio::test]
    async fn preference_change_on_feed_root_resets_counter() {
        let mut h = Harness::new(HOME, 10, "avoid gaming", 5).await;
        h.orchestrator.start();
        assert_eq!(h.blocked_count().await, 0);
        h.store.set_blocked_count(5).await.unwrap();

        let before = h.orchestrator.epoch();
        h.preferences_changed("avoid cooking");
        assert_ne!(h.orchestrator.epoch(), before);
        assert_eq!(h.blocked_count().await, 0);
    }

    #[tokio::test]
    async fn preference_change_off_feed_root_keeps_counter() {
        let mut h = Harness::new("https://www.youtube.com/watch?v=1", 10, "avoid gaming", 5).await;
        h.orchestrator.start();
        assert_eq!(h.blocked_count().await, 5);

        let before = h.orchestrator.epoch();
        h.preferences_changed("avoid cooking");
        assert_ne!(h.orchestrator.epoch(), before);
        assert!(h.gate_is_up());
        assert_eq!(h.blocked_count().await, 5);
    }

    #[tokio::test]
    async fn suppressed_items_survive_snapshot_reload() {
        let mut h = Harness::new(HOME, 10, "avoid gaming", 0).await;
        h.orchestrator.start();
        h.orchestrator.scan();
        let requests = h.dispatcher.take();
        for (i, request) in requests.iter().enumerate() {
            let decision = if i == 0 {
                Decision::Remove
            } else {
                Decision::Keep
            };
            h.resolve(request, ClassificationOutcome::Decided(decision));
        }
        assert_eq!(h.page.labels(requests[0].item.element).len(), 1);

        h.page.replace(Url::parse(HOME).unwrap(), &video_body(11));
        h.orchestrator.scan();
        let after = h.dispatcher.take();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].item.title, "Video number 10");

        let labels = h.page.labels(requests[0].item.element);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, FILTERED_LABEL);
        assert_eq!(h.blocked_count().await, 1);
    }

    #[tokio::test]
    async fn event_sources_feed_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(PersistedStore::open(&path).await.unwrap());
        let page = Arc::new(FeedDocument::new(Url::parse(HOME).unwrap(), &video_body(1)));
        let watched: Arc<dyn FeedPage> = page.clone();

        let shutdown = Shutdown::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poll = Duration::from_millis(5);
        let handles = vec![
            NavigationWatcher::new(page.location(), FeedConfig::default().root_paths).spawn(
                watched,
                poll,
                tx.clone(),
                shutdown.subscribe(),
            ),
            spawn_store_forwarder(store.subscribe(), tx, shutdown.subscribe()),
            store.clone().spawn_watch(poll, shutdown.subscribe()),
        ];

        tokio::fs::write(&path, r#"{"preferencesText": "avoid gaming"}"#)
            .await
            .unwrap();
        page.navigate(Url::parse("https://www.youtube.com/feed/trending").unwrap());

        let (mut change, mut navigation) = (None, None);
        while change.is_none() || navigation.is_none() {
            match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(Event::Store(c))) => change = Some(c),
                Ok(Some(Event::Navigated(n))) => navigation = Some(n),
                other => panic!("unexpected queue state: {other:?}"),
            }
        }

        let change = change.unwrap();
        assert_eq!(change.key, StoreKey::PreferencesText);
        assert_eq!(change.new_value, json!("avoid gaming"));
        let navigation = navigation.unwrap();
        assert!(navigation.feed_root);
        assert_eq!(navigation.url.path(), "/feed/trending");

        shutdown.trigger(StopReason::Interrupt);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    impl Harness {
        fn gate_is_up(&self) -> bool {
            self.orchestrator.epoch.gate.phase() == GatePhase::Gating
                && self.page.overlay_message().is_some()
        }
    }
}
