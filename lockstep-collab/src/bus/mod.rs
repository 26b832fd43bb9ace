use std::sync::Arc;

use async_trait::async_trait;
use lockstep_core::BusMessage;
use thiserror::Error;
use tokio::sync::broadcast::Receiver;

mod local;
mod pg;

pub use local::*;
pub use pg::*;

pub type ArcedBus = Arc<dyn Bus>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to encode bus message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

/// Publish/subscribe channel shared by every process.
///
/// Delivery is best-effort and ordered per subscriber. Messages published while
/// a subscriber is lagging behind are lost, there is no replay.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publishes a message to every subscriber, including the ones in this process
    async fn publish(&self, message: BusMessage) -> Result<(), BusError>;
    /// Subscribes to every channel
    fn subscribe(&self) -> Receiver<BusMessage>;
}
