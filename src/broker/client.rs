use anyhow::{Context, Result};
use async_nats::Client;
use tracing::info;

use super::messages::AudioChunkMessage;
use crate::capture::Chunk;

/// Ordered, fire-and-forget chunk delivery toward the broker.
///
/// Chunks go out in the order `publish` is invoked; the publisher never
/// reorders or batches across calls. A publish failure is surfaced to the
/// coordinator, not retried here.
#[async_trait::async_trait]
pub trait ChunkPublisher: Send + Sync {
    async fn publish(&mut self, chunk: &Chunk) -> Result<()>;

    /// Release the broker connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Publishes chunks to a NATS subject, one subject per session.
pub struct NatsPublisher {
    client: Client,
    subject: String,
    closed: bool,
}

impl NatsPublisher {
    pub async fn connect(url: &str, subject: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS, publishing to {}", subject);

        Ok(Self {
            client,
            subject,
            closed: false,
        })
    }

    pub fn subject_for(prefix: &str, session_id: &str) -> String {
        format!("{}.{}", prefix, session_id)
    }
}

#[async_trait::async_trait]
impl ChunkPublisher for NatsPublisher {
    async fn publish(&mut self, chunk: &Chunk) -> Result<()> {
        if self.closed {
            anyhow::bail!("Broker connection already released");
        }

        let message = AudioChunkMessage::from_chunk(chunk);
        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .context("Failed to publish audio chunk")?;

        info!(
            "Published chunk {} to {} ({} bytes, last={})",
            chunk.sequence,
            self.subject,
            chunk.payload.len(),
            chunk.is_final
        );

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;

        info!("Broker connection released");
        Ok(())
    }
}
