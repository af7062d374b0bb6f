use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::store::PreferenceBridge;

#[derive(Debug)]
enum CounterCommand {
    Increment,
    Reset,
    Flush(oneshot::Sender<()>),
}

/// Single-consumer queue that serializes blocked-counter writes, so
/// back-to-back increments cannot lose an update.
#[derive(Clone)]
pub struct CounterQueue {
    tx: mpsc::UnboundedSender<CounterCommand>,
}

impl CounterQueue {
    pub fn spawn(bridge: PreferenceBridge) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    CounterCommand::Increment => {
                        bridge.increment_count().await;
                    }
                    CounterCommand::Reset => bridge.reset_count().await,
                    CounterCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!(target: "store", "counter queue stopped");
        });
        (Self { tx }, handle)
    }

    pub fn increment(&self) {
        self.send(CounterCommand::Increment);
    }

    pub fn reset(&self) {
        self.send(CounterCommand::Reset);
    }

    /// Resolves once every command queued before it has been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(CounterCommand::Flush(done));
        let _ = wait.await;
    }

    fn send(&self, command: CounterCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!(target: "store", "counter queue closed; dropping update");
        }
    }
}
