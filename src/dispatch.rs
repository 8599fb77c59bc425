//! Dispatcher interface for acting on routing decisions.
//!
//! Publishing and enqueueing belong to the surrounding infrastructure. Implementations must act
//! on a decision at least once; a duplicate redrive is harmless because the retry counter
//! travels inside the payload, a lost one silently ends the retry chain.

use crate::enrich::EnrichedRecord;
use crate::error::DispatchError;
use crate::notification::OriginalPayload;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Executes routing decisions against external infrastructure.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Republish `payload` verbatim to `destination`.
    async fn redrive(&self, destination: &str, payload: &OriginalPayload) -> Result<(), DispatchError>;

    /// Enqueue the full record (payload and meta) to the exhausted sink.
    async fn exhaust(&self, record: &EnrichedRecord) -> Result<(), DispatchError>;

    /// Observe a record that matched no rule. The record is dropped afterwards.
    async fn discard(&self, _record: &EnrichedRecord) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[async_trait]
impl<D> Dispatcher for Arc<D>
where
    D: Dispatcher + ?Sized,
{
    async fn redrive(&self, destination: &str, payload: &OriginalPayload) -> Result<(), DispatchError> {
        (**self).redrive(destination, payload).await
    }

    async fn exhaust(&self, record: &EnrichedRecord) -> Result<(), DispatchError> {
        (**self).exhaust(record).await
    }

    async fn discard(&self, record: &EnrichedRecord) -> Result<(), DispatchError> {
        (**self).discard(record).await
    }
}

/// A message handed to an [`InMemoryDispatcher`].
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatched {
    /// Payload republished to a destination.
    Redriven {
        /// Destination.
        destination: String,
        /// Payload as republished.
        payload: OriginalPayload,
    },
    /// Record enqueued to the exhausted sink.
    Exhausted(EnrichedRecord),
    /// Record dropped after matching no rule.
    Discarded(EnrichedRecord),
}

/// In-memory dispatcher (tests / demos).
#[derive(Clone, Default)]
pub struct InMemoryDispatcher {
    sent: Arc<Mutex<Vec<Dispatched>>>,
}

impl InMemoryDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything dispatched so far, in order.
    pub async fn sent(&self) -> Vec<Dispatched> {
        self.sent.lock().await.clone()
    }

    /// Payloads redriven to `destination`, in order.
    pub async fn redriven_to(&self, destination: &str) -> Vec<OriginalPayload> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Dispatched::Redriven { destination: dest, payload } if dest == destination => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Records in the exhausted sink, in order.
    pub async fn exhausted(&self) -> Vec<EnrichedRecord> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Dispatched::Exhausted(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Dispatcher for InMemoryDispatcher {
    async fn redrive(&self, destination: &str, payload: &OriginalPayload) -> Result<(), DispatchError> {
        self.sent.lock().await.push(Dispatched::Redriven {
            destination: destination.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn exhaust(&self, record: &EnrichedRecord) -> Result<(), DispatchError> {
        self.sent.lock().await.push(Dispatched::Exhausted(record.clone()));
        Ok(())
    }

    async fn discard(&self, record: &EnrichedRecord) -> Result<(), DispatchError> {
        self.sent.lock().await.push(Dispatched::Discarded(record.clone()));
        Ok(())
    }
}
