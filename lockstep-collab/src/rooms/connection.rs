use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use futures_util::Stream;
use lockstep_core::{Actor, Id};
use parking_lot::Mutex;

use crate::ClientEvent;

use super::RoomRegistry;

pub type ConnectionId = Id<Connection>;

/// A live client connection, as seen by the registry
pub struct Connection {
    pub id: ConnectionId,
    pub actor: Actor,
    pending_events: Arc<Mutex<VecDeque<ClientEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

/// The receiving end of a [Connection]. Dropping it disconnects the client from every room.
pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending events
    pending_events: Arc<Mutex<VecDeque<ClientEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove the connection when dropped
    registry: Weak<RoomRegistry>,
}

impl Connection {
    pub fn new(actor: Actor) -> Self {
        Self {
            id: ConnectionId::random(),
            actor,
            pending_events: Default::default(),
            waker: Default::default(),
        }
    }

    pub fn send(&self, event: ClientEvent) {
        self.pending_events.lock().push_back(event);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    pub fn handle(&self, registry: Weak<RoomRegistry>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_events: self.pending_events.clone(),
            waker: self.waker.clone(),
            registry,
        }
    }
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Stream for ConnectionHandle {
    type Item = ClientEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_events = self.pending_events.lock();

        if let Some(event) = pending_events.pop_front() {
            return Poll::Ready(Some(event));
        }

        // Stored while the queue is still locked, so a concurrent send can't slip in between
        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.disconnect(self.id)
        }
    }
}
