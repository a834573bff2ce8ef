use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{trace, warn};

mod events;

pub use events::ChainEvent;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Publishes `event` and returns how many subscribers received it.
    /// Publishing with nobody listening is not an error.
    async fn publish(&self, event: E) -> usize;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory bus backing one session's event sink.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(broadcast::error::SendError(event)) => {
                trace!(target: "wdchain::events", ?event, "event dropped: no subscribers");
                0
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Forwards a bus subscription into a bounded mpsc channel. A consumer that
/// falls behind skips the events it missed instead of ending the stream.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut subscription = bus.subscribe();
    let (forward, receiver) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(event) => {
                    if forward.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "wdchain::events", skipped, "event consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use wdchain_core_types::SessionId;

    #[tokio::test]
    async fn publish_without_subscribers_reports_zero() {
        let bus = InMemoryBus::<ChainEvent>::new(4);
        let delivered = bus
            .publish(ChainEvent::End {
                session: SessionId::new(),
            })
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn subscribers_observe_events_in_order() {
        let bus = InMemoryBus::<ChainEvent>::new(8);
        let session = SessionId("s-1".into());
        let mut rx = bus.subscribe();
        bus.publish(ChainEvent::End {
            session: session.clone(),
        })
        .await;
        bus.publish(ChainEvent::End { session }).await;

        assert_eq!(rx.recv().await.unwrap().kind(), "end");
        assert_eq!(rx.recv().await.unwrap().kind(), "end");
    }

    #[tokio::test]
    async fn mpsc_bridge_forwards_events() {
        let bus = InMemoryBus::<ChainEvent>::new(8);
        let mut rx = to_mpsc(Arc::clone(&bus), 4);
        let delivered = bus
            .publish(ChainEvent::End {
                session: SessionId("s-2".into()),
            })
            .await;
        assert_eq!(delivered, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session().0, "s-2");
    }
}
