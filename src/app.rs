use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};

use crate::{
    ai::FilterClient,
    config::AppConfig,
    feed::{FeedScanner, NavigationWatcher},
    infrastructure::{
        directories::ResolvedPaths,
        shutdown::{Shutdown, StopReason},
    },
    page::{snapshot, FeedPage},
    store::{PersistedStore, PreferenceBridge},
    tasks::{
        counter::CounterQueue,
        dispatcher::ClassificationDispatcher,
        orchestrator::{spawn_store_forwarder, Event, Orchestrator},
    },
};

pub struct FeedFilterApp {
    orchestrator: Orchestrator,
    events: mpsc::UnboundedReceiver<Event>,
    background: Vec<(&'static str, JoinHandle<()>)>,
    counter: CounterQueue,
    counter_handle: JoinHandle<()>,
    shutdown: Shutdown,
}

impl FeedFilterApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let store = Arc::new(PersistedStore::open(&paths.store_path).await?);
        let bridge = PreferenceBridge::new(store.clone());
        let initial = bridge.read();

        let snapshot_path = config
            .snapshot_path
            .as_ref()
            .map(PathBuf::from)
            .context("SNAPSHOT_PATH must point at a page snapshot to filter")?;
        let document = Arc::new(snapshot::open_document(&snapshot_path).await?);
        let page: Arc<dyn FeedPage> = document.clone();

        let http_client = Client::builder()
            .user_agent(format!("feedguard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let classifier = Arc::new(FilterClient::new(http_client, config.classifier.clone()));

        let (events_tx, events) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(ClassificationDispatcher::new(
            classifier,
            config.classifier.max_in_flight,
            events_tx.clone(),
        ));
        let (counter, counter_handle) = CounterQueue::spawn(bridge.clone());

        let orchestrator = Orchestrator::new(
            page.clone(),
            FeedScanner::default(),
            dispatcher,
            counter.clone(),
            config.feed.clone(),
            config.timing.clone(),
            initial.preferences,
        );

        let watcher = NavigationWatcher::new(page.location(), config.feed.root_paths.clone());
        let background = vec![
            (
                "navigation",
                watcher.spawn(
                    page,
                    config.timing.navigation_poll,
                    events_tx.clone(),
                    shutdown.subscribe(),
                ),
            ),
            (
                "store-forwarder",
                spawn_store_forwarder(bridge.subscribe(), events_tx, shutdown.subscribe()),
            ),
            (
                "store-watch",
                store
                    .clone()
                    .spawn_watch(config.timing.store_poll, shutdown.subscribe()),
            ),
            (
                "snapshot-reload",
                snapshot::spawn_reload(
                    document,
                    snapshot_path,
                    config.timing.navigation_poll,
                    shutdown.subscribe(),
                ),
            ),
        ];

        Ok(Self {
            orchestrator,
            events,
            background,
            counter,
            counter_handle,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let FeedFilterApp {
            orchestrator,
            events,
            background,
            counter,
            counter_handle,
            shutdown,
        } = self;

        tracing::info!("feed filter started");

        orchestrator.run(events, shutdown.subscribe()).await;
        shutdown.trigger(StopReason::FilterStopped);

        let shutdown_timeout = Duration::from_secs(5);
        for (name, mut handle) in background {
            let wait = tokio::time::sleep(shutdown_timeout);
            tokio::pin!(wait);
            tokio::select! {
                res = &mut handle => {
                    if let Err(err) = res {
                        if err.is_panic() {
                            tracing::error!(task = name, "background task panicked");
                        }
                    }
                }
                _ = &mut wait => {
                    tracing::warn!(task = name, "background task did not stop within {:?}; aborting", shutdown_timeout);
                    handle.abort();
                }
            }
        }

        if timeout(shutdown_timeout, counter.flush()).await.is_err() {
            tracing::warn!(
                target: "store",
                "pending counter updates not written within {:?}",
                shutdown_timeout
            );
        }
        drop(counter);
        if timeout(shutdown_timeout, counter_handle).await.is_err() {
            tracing::warn!(target: "store", "counter queue did not drain");
        }

        tracing::info!(reason = ?shutdown.reason(), "feed filter stopped");
        Ok(())
    }
}
