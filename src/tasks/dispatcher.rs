use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use crate::{
    ai::Classifier,
    domain::{ClassificationOutcome, EpochId, FeedItem},
    tasks::orchestrator::Event,
};

/// One outbound classification, tagged with the epoch it was issued in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub epoch: EpochId,
    pub item: FeedItem,
    pub preferences: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub epoch: EpochId,
    pub item: FeedItem,
    pub outcome: ClassificationOutcome,
}

pub trait Dispatch: Send + Sync {
    /// Must not block; the result comes back later as [`Event::Classified`].
    fn dispatch(&self, request: ClassificationRequest);
}

/// Runs classifications on the tokio runtime with a cap on concurrent calls.
pub struct ClassificationDispatcher {
    classifier: Arc<dyn Classifier>,
    permits: Arc<Semaphore>,
    events: mpsc::UnboundedSender<Event>,
}

impl ClassificationDispatcher {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        max_in_flight: usize,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            classifier,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            events,
        }
    }
}

impl Dispatch for ClassificationDispatcher {
    fn dispatch(&self, request: ClassificationRequest) {
        let classifier = self.classifier.clone();
        let permits = self.permits.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let ClassificationRequest {
                epoch,
                item,
                preferences,
            } = request;

            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => classifier.classify(&item.title, &preferences).await,
                Err(_) => ClassificationOutcome::Failed("dispatcher closed".to_string()),
            };

            if events
                .send(Event::Classified(ClassificationResult {
                    epoch,
                    item,
                    outcome,
                }))
                .is_err()
            {
                tracing::debug!(target: "classifier", %epoch, "orchestrator gone; result dropped");
            }
        });
    }
}
