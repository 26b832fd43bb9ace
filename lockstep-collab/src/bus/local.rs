use async_trait::async_trait;
use lockstep_core::BusMessage;
use log::debug;
use tokio::sync::broadcast::{self, Receiver, Sender};

use super::{Bus, BusError};

/// A bus that never leaves the process. Enough when a single process serves every client.
pub struct LocalBus {
    sender: Sender<BusMessage>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self { sender }
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        debug!("Publishing {} for {}", message.channel(), message.station_id());

        // Having nobody subscribed is not an error
        let _ = self.sender.send(message);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod test {
    use lockstep_core::BusMessage;

    use super::LocalBus;
    use crate::Bus;

    #[tokio::test]
    async fn subscribers_receive_messages_in_order() {
        let bus = LocalBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(BusMessage::Pause("a".to_string())).await.unwrap();
        bus.publish(BusMessage::Resume("a".to_string())).await.unwrap();

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.recv().await.unwrap(), BusMessage::Pause("a".to_string()));
            assert_eq!(receiver.recv().await.unwrap(), BusMessage::Resume("a".to_string()));
        }
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let bus = LocalBus::new(16);

        assert!(bus.publish(BusMessage::Create("a".to_string())).await.is_ok());
    }
}
