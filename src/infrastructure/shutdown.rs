use tokio::sync::watch;

/// Why the filter is stopping. The first reason recorded wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
    /// The orchestrator returned on its own, e.g. its event queue closed.
    FilterStopped,
}

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<Option<StopReason>>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<Option<StopReason>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self, reason: StopReason) {
        let recorded = self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if recorded {
            tracing::info!(target: "shutdown", ?reason, "stopping feed filter");
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.sender.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        let _ = self.receiver.wait_for(Option::is_some).await;
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.receiver.borrow()
    }
}

pub fn install_signal_handlers(shutdown: &Shutdown) {
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.trigger(StopReason::Interrupt);
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                term.trigger(StopReason::Terminate);
            }
        });
    }
}
