//! Event publishers

use async_trait::async_trait;
use tokio::sync::RwLock;
use crate::domain::events::DomainEvent;
use crate::ports::{EventPublisher, PublishError};

/// Writes events to the tracing log. Used when no broker is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        tracing::info!(subject = event.subject(), ?event, "domain event");
        Ok(())
    }
}

/// Publishes JSON-encoded events to `<prefix>.<subject>`.
#[derive(Debug, Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event).map_err(|e| PublishError(e.to_string()))?;
        let subject = format!("{}.{}", self.prefix, event.subject());
        self.client.publish(subject, payload.into()).await.map_err(|e| PublishError(e.to_string()))
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: RwLock<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self { Self::default() }

    pub async fn published(&self) -> Vec<DomainEvent> { self.published.read().await.clone() }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.published.write().await.push(event.clone());
        Ok(())
    }
}
