//! In-process event broker over a `tokio::sync::broadcast` channel.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::errors::DomainResult;
use crate::domain::ports::event_broker::{
    EventBroker, EventSubscription, SchedulerEvent, SchedulerEventEnvelope, SequenceCounter,
};

const DEFAULT_CAPACITY: usize = 1024;

pub struct LocalEventBroker {
    sender: broadcast::Sender<SchedulerEventEnvelope>,
    sequence: Arc<SequenceCounter>,
}

impl LocalEventBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(SequenceCounter::default()),
        }
    }
}

impl Default for LocalEventBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBroker for LocalEventBroker {
    async fn publish(&self, event: SchedulerEvent) -> DomainResult<()> {
        let envelope = SchedulerEventEnvelope {
            sequence: self.sequence.next(),
            timestamp: chrono::Utc::now(),
            event,
        };
        // No subscribers is not an error: ignore the send failure.
        let _ = self.sender.send(envelope);
        Ok(())
    }

    async fn subscribe(&self, one_shot: bool) -> DomainResult<Box<dyn EventSubscription>> {
        Ok(Box::new(LocalSubscription {
            receiver: self.sender.subscribe(),
            one_shot,
            done: false,
        }))
    }
}

struct LocalSubscription {
    receiver: broadcast::Receiver<SchedulerEventEnvelope>,
    one_shot: bool,
    done: bool,
}

#[async_trait]
impl EventSubscription for LocalSubscription {
    async fn recv(&mut self) -> DomainResult<Option<SchedulerEventEnvelope>> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if self.one_shot {
                        self.done = true;
                    }
                    return Ok(Some(envelope));
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, resynchronizing to current tail");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_assigns_increasing_sequence_numbers() {
        let broker = LocalEventBroker::new();
        let mut sub = broker.subscribe(false).await.unwrap();

        broker.publish(SchedulerEvent::SchedulerStarted).await.unwrap();
        broker.publish(SchedulerEvent::SchedulerStopped { exception: None }).await.unwrap();

        let first = sub.recv().await.unwrap().unwrap();
        let second = sub.recv().await.unwrap().unwrap();
        assert!(second.sequence.0 > first.sequence.0);
    }

    #[tokio::test]
    async fn one_shot_subscription_closes_after_first_event() {
        let broker = LocalEventBroker::new();
        let mut sub = broker.subscribe(true).await.unwrap();

        broker.publish(SchedulerEvent::SchedulerStarted).await.unwrap();
        broker.publish(SchedulerEvent::SchedulerStopped { exception: None }).await.unwrap();

        assert!(sub.recv().await.unwrap().is_some());
        assert!(sub.recv().await.unwrap().is_none());
    }
}
