mod bus;
mod db;
mod errors;
mod events;
mod handlers;
mod rooms;
mod stations;
mod util;

use std::sync::Arc;

use dashmap::DashMap;
use lockstep_core::{Actor, Config, Scheduler, StationId};
use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver},
    Mutex as AsyncMutex, OwnedMutexGuard,
};

type StationLocks = Arc<DashMap<StationId, Arc<AsyncMutex<()>>>>;

pub use bus::*;
pub use db::*;
pub use errors::*;
pub use events::*;
pub use handlers::*;
pub use rooms::*;
pub use stations::*;

/// The lockstep collab system, keeping stations and their listeners in sync across processes.
pub struct Collab {
    context: CollabContext,
    /// Stations whose listeners went away without leaving, until [Collab::listen] picks them up
    departures: Mutex<Option<UnboundedReceiver<StationId>>>,

    pub stations: StationManager,
}

/// A type passed to various components of the collab system, to access state and publish changes.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<Config>,
    pub database: ArcedDatabase,
    pub bus: ArcedBus,
    pub rooms: Arc<RoomRegistry>,
    pub scheduler: Scheduler,
    /// Serializes changes to a station within this process
    locks: StationLocks,
}

/// Exclusive access to a station on this process, until dropped
pub struct StationLock {
    // Fields drop in order, so the mutex is released before the entry is cleaned up
    _guard: OwnedMutexGuard<()>,
    _entry: LockEntry,
}

/// Keeps a station's mutex in the map while someone holds or waits for it
struct LockEntry {
    station_id: StationId,
    locks: StationLocks,
    mutex: Arc<AsyncMutex<()>>,
}

impl Drop for LockEntry {
    fn drop(&mut self) {
        // Only the map and this entry refer to the mutex, so nobody else needs it
        self.locks
            .remove_if(&self.station_id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

impl Collab {
    pub fn new(config: Config, database: ArcedDatabase, bus: ArcedBus) -> Self {
        let (sender, receiver) = unbounded_channel();

        let context = CollabContext {
            config: Arc::new(config),
            database,
            bus,
            rooms: RoomRegistry::new(sender),
            scheduler: Scheduler::new(),
            locks: Default::default(),
        };

        Self {
            stations: StationManager::new(&context),
            departures: Mutex::new(Some(receiver)),
            context,
        }
    }

    /// Subscribes to the bus and starts reacting to it. Must be called within a tokio runtime.
    pub fn listen(&self) {
        let receiver = self.context.bus.subscribe();
        tokio::spawn(dispatch(self.context.clone(), receiver));

        if let Some(departures) = self.departures.lock().take() {
            tokio::spawn(announce_departures(self.context.clone(), departures));
        }

        info!("Listening for station changes");
    }

    /// Resolves who is behind a session token
    pub async fn actor_for_token(&self, token: &str) -> Result<Actor> {
        let session = self.context.database.session_by_token(token).await?;

        Ok(Actor {
            user_id: Some(session.user_id),
            admin: session.admin,
        })
    }

    /// Opens a connection that receives the events of the rooms it's in
    pub fn connect(&self, actor: Actor) -> ConnectionHandle {
        self.context.rooms.connect(actor)
    }

    pub fn context(&self) -> &CollabContext {
        &self.context
    }
}

impl CollabContext {
    /// Waits for exclusive access to a station on this process
    pub async fn lock(&self, station_id: &str) -> StationLock {
        let mutex = self
            .locks
            .entry(station_id.to_string())
            .or_default()
            .clone();

        let entry = LockEntry {
            station_id: station_id.to_string(),
            locks: self.locks.clone(),
            mutex,
        };

        StationLock {
            _guard: entry.mutex.clone().lock_owned().await,
            _entry: entry,
        }
    }

    /// How many stations are locked or waited on right now
    pub fn locked_stations(&self) -> usize {
        self.locks.len()
    }
}

/// Publishes listener updates for connections that disappeared from a station
async fn announce_departures(context: CollabContext, mut departures: UnboundedReceiver<StationId>) {
    while let Some(station_id) = departures.recv().await {
        for message in StationManager::listener_messages(&station_id) {
            if let Err(e) = context.bus.publish(message).await {
                warn!("Failed to announce departure from {}: {}", station_id, e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use lockstep_core::Actor;
    use tokio::time::timeout;

    use crate::{stations::mock::setup, CollabError};

    #[tokio::test]
    async fn requests_for_missing_stations_leave_no_locks_behind() {
        let setup = setup();
        let owner = Actor::user("owner");

        for i in 0..100 {
            let result = setup.collab.stations.pause(&owner, &format!("missing{}", i)).await;
            assert!(matches!(result, Err(CollabError::Database(_))));
        }

        assert_eq!(setup.collab.context().locked_stations(), 0);
    }

    #[tokio::test]
    async fn station_locks_are_exclusive_until_released() {
        let setup = setup();
        let context = setup.collab.context().clone();

        let held = context.lock("station").await;

        let waiting = timeout(Duration::from_millis(50), context.lock("station")).await;
        assert!(waiting.is_err());
        assert_eq!(context.locked_stations(), 1);

        let other = context.clone();
        let waiter = tokio::spawn(async move {
            let _lock = other.lock("station").await;
        });

        drop(held);
        waiter.await.unwrap();

        assert_eq!(context.locked_stations(), 0);
    }
}
