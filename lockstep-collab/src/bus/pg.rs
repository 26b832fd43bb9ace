use std::time::Duration;

use async_trait::async_trait;
use lockstep_core::BusMessage;
use log::{debug, error, warn};
use sqlx::{postgres::PgListener, query, PgPool};
use tokio::{
    sync::broadcast::{self, Receiver, Sender},
    time::sleep,
};

use super::{Bus, BusError};

/// The postgres notification channel every message travels on
const NOTIFY_CHANNEL: &str = "lockstep";
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A bus spanning every process connected to the same postgres database,
/// built on LISTEN/NOTIFY.
pub struct PgBus {
    pool: PgPool,
    sender: Sender<BusMessage>,
}

impl PgBus {
    /// Starts listening for notifications. Must be called within a tokio runtime.
    pub async fn new(pool: PgPool, capacity: usize) -> Result<Self, BusError> {
        let (sender, _) = broadcast::channel(capacity);

        let mut listener = PgListener::connect_with(&pool)
            .await
            .map_err(|e| BusError::Transport(Box::new(e)))?;

        listener
            .listen(NOTIFY_CHANNEL)
            .await
            .map_err(|e| BusError::Transport(Box::new(e)))?;

        tokio::spawn(forward(listener, sender.clone()));

        Ok(Self { pool, sender })
    }
}

/// Forwards notifications from postgres to the local subscribers
async fn forward(mut listener: PgListener, sender: Sender<BusMessage>) {
    loop {
        // The listener reconnects on its own, so errors here are only logged
        let notification = match listener.recv().await {
            Ok(n) => n,
            Err(e) => {
                error!("Bus listener failed: {}", e);
                sleep(RETRY_DELAY).await;
                continue;
            }
        };

        match serde_json::from_str::<BusMessage>(notification.payload()) {
            Ok(message) => {
                debug!("Received {} for {}", message.channel(), message.station_id());
                let _ = sender.send(message);
            }
            Err(e) => warn!("Ignoring malformed bus message: {}", e),
        }
    }
}

#[async_trait]
impl Bus for PgBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let payload = serde_json::to_string(&message)?;

        query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| BusError::Transport(Box::new(e)))?;

        Ok(())
    }

    fn subscribe(&self) -> Receiver<BusMessage> {
        self.sender.subscribe()
    }
}
