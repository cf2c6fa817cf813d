use async_trait::async_trait;
use tandem_shared::TripEvent;
use tokio::sync::broadcast;

/// Best-effort dispatch of trip lifecycle events to external delivery
/// (push, email, in-app feeds). Implementations must not block the caller
/// for long and must swallow their own failures; a dropped notification
/// never fails a state transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: TripEvent);
}

/// Logs events through tracing. Default for tests and local runs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: TripEvent) {
        tracing::info!(trip_id = %event.trip_id(), event = ?event, "trip event");
    }
}

/// Fans events out on an in-process broadcast channel, where delivery
/// workers (or API event streams) pick them up.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<TripEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, event: TripEvent) {
        // Send only errors when there are no subscribers; that is fine.
        let _ = self.tx.send(event);
    }
}
