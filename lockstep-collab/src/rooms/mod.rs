mod connection;

use std::{
    collections::{BTreeSet, HashSet},
    fmt::Display,
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use log::{debug, info};
use lockstep_core::{Actor, MediaSourceId, StationId, UserId};
use tokio::sync::mpsc::UnboundedSender;

pub use connection::*;

use crate::ClientEvent;

/// A process-local broadcast group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomName {
    /// Everyone listening to a station
    Station(StationId),
    /// Everyone listening to a song, across stations
    Song(MediaSourceId),
    /// Everyone looking at the station listing
    Home,
    /// Administrators watching every station
    AdminStations,
    /// Every connection of a single user
    User(UserId),
}

/// Read access to the rooms of this process
pub trait RoomLookup {
    /// The distinct logged in users in a room
    fn users_in(&self, room: &RoomName) -> BTreeSet<UserId>;
    /// The amount of connections in a room, including anonymous ones
    fn connection_count(&self, room: &RoomName) -> usize;
    /// The amount of connections in a room without a logged in user
    fn anonymous_count(&self, room: &RoomName) -> usize;
}

/// Keeps track of the live connections of this process and the rooms they are in.
///
/// Nothing here is shared with other processes; the bus keeps the registries in sync.
pub struct RoomRegistry {
    me: Weak<Self>,
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<RoomName, HashSet<ConnectionId>>,
    /// The song room each station's listeners are in
    song_rooms: DashMap<StationId, MediaSourceId>,
    /// Notified with the station a connection left without asking, such as by disconnecting
    departures: UnboundedSender<StationId>,
}

impl RoomRegistry {
    pub fn new(departures: UnboundedSender<StationId>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
            rooms: Default::default(),
            song_rooms: Default::default(),
            departures,
        })
    }

    /// Registers a new connection and puts it in the rooms every connection of the actor belongs to
    pub fn connect(&self, actor: Actor) -> ConnectionHandle {
        let connection = Connection::new(actor.clone());
        let id = connection.id;
        let handle = connection.handle(self.me.clone());

        connection.send(ClientEvent::Connected { connection_id: id });
        self.connections.insert(id, connection);

        self.join(id, RoomName::Home);

        if let Some(user_id) = &actor.user_id {
            self.join(id, RoomName::User(user_id.clone()));
        }

        if actor.admin {
            self.join(id, RoomName::AdminStations);
        }

        info!(
            "Connection {} opened by {}",
            id,
            actor.user_id.as_deref().unwrap_or("anonymous")
        );

        handle
    }

    /// Removes a connection from every room it is in
    pub fn disconnect(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_none() {
            return;
        }

        let rooms: Vec<_> = self
            .rooms
            .iter()
            .filter(|r| r.value().contains(&id))
            .map(|r| r.key().clone())
            .collect();

        for room in rooms {
            self.leave(id, &room);

            if let RoomName::Station(station_id) = room {
                let _ = self.departures.send(station_id);
            }
        }

        info!("Connection {} closed", id);
    }

    /// Adds a connection to a room. Returns false if the connection doesn't exist.
    pub fn join(&self, id: ConnectionId, room: RoomName) -> bool {
        if !self.connections.contains_key(&id) {
            return false;
        }

        debug!("Connection {} joined {}", id, room);
        self.rooms.entry(room).or_default().insert(id);

        true
    }

    /// Removes a connection from a room, dropping the room once it's empty
    pub fn leave(&self, id: ConnectionId, room: &RoomName) -> bool {
        let left = self
            .rooms
            .get_mut(room)
            .map(|mut members| members.remove(&id))
            .unwrap_or(false);

        self.rooms.remove_if(room, |_, members| members.is_empty());

        if left {
            debug!("Connection {} left {}", id, room);
        }

        left
    }

    /// Puts a connection in a station's room, and the room of the song it's playing
    pub fn join_station(&self, id: ConnectionId, station_id: &StationId) -> bool {
        if !self.join(id, RoomName::Station(station_id.clone())) {
            return false;
        }

        if let Some(song) = self.song_rooms.get(station_id) {
            self.join(id, RoomName::Song(song.clone()));
        }

        true
    }

    pub fn leave_station(&self, id: ConnectionId, station_id: &StationId) -> bool {
        if let Some(song) = self.song_rooms.get(station_id) {
            self.leave(id, &RoomName::Song(song.clone()));
        }

        self.leave(id, &RoomName::Station(station_id.clone()))
    }

    /// Moves the listeners of a station from the previous song's room to the new one
    pub fn switch_song_room(&self, station_id: &StationId, media_source_id: Option<MediaSourceId>) {
        let listeners = self.members(&RoomName::Station(station_id.clone()));

        let previous = match &media_source_id {
            Some(song) => self.song_rooms.insert(station_id.clone(), song.clone()),
            None => self.song_rooms.remove(station_id).map(|(_, song)| song),
        };

        if previous == media_source_id {
            return;
        }

        for id in listeners {
            if let Some(previous) = &previous {
                self.leave(id, &RoomName::Song(previous.clone()));
            }

            if let Some(song) = &media_source_id {
                self.join(id, RoomName::Song(song.clone()));
            }
        }
    }

    /// Removes a room entirely, without touching the connections that were in it
    pub fn remove_room(&self, room: &RoomName) {
        self.rooms.remove(room);

        if let RoomName::Station(station_id) = room {
            if let Some((_, song)) = self.song_rooms.remove(station_id) {
                // Other stations may still be playing the song
                let stations_playing = self.song_rooms.iter().any(|s| *s.value() == song);

                if !stations_playing {
                    self.rooms.remove(&RoomName::Song(song));
                }
            }
        }

        debug!("Room {} removed", room);
    }

    pub fn members(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, id: ConnectionId, room: &RoomName) -> bool {
        self.rooms.get(room).is_some_and(|m| m.contains(&id))
    }

    /// Returns true if any connection of the user is in the room
    pub fn has_user(&self, user_id: &str, room: &RoomName) -> bool {
        self.members(room).into_iter().any(|id| {
            self.connections
                .get(&id)
                .is_some_and(|c| c.actor.user_id.as_deref() == Some(user_id))
        })
    }

    pub fn actor_of(&self, id: ConnectionId) -> Option<Actor> {
        self.connections.get(&id).map(|c| c.actor.clone())
    }

    pub fn send(&self, id: ConnectionId, event: ClientEvent) {
        if let Some(connection) = self.connections.get(&id) {
            connection.send(event)
        }
    }

    pub fn send_to_room(&self, room: &RoomName, event: ClientEvent) {
        for id in self.members(room) {
            self.send(id, event.clone())
        }
    }
}

impl RoomLookup for RoomRegistry {
    fn users_in(&self, room: &RoomName) -> BTreeSet<UserId> {
        self.members(room)
            .into_iter()
            .filter_map(|id| self.connections.get(&id).and_then(|c| c.actor.user_id.clone()))
            .collect()
    }

    fn connection_count(&self, room: &RoomName) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    fn anonymous_count(&self, room: &RoomName) -> usize {
        self.members(room)
            .into_iter()
            .filter(|id| {
                self.connections
                    .get(id)
                    .is_some_and(|c| !c.actor.is_logged_in())
            })
            .count()
    }
}

impl Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomName::Station(id) => write!(f, "station.{}", id),
            RoomName::Song(id) => write!(f, "song.{}", id),
            RoomName::Home => write!(f, "home"),
            RoomName::AdminStations => write!(f, "admin.stations"),
            RoomName::User(id) => write!(f, "user.{}", id),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use futures_util::{FutureExt, StreamExt};
    use lockstep_core::Actor;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use super::{ConnectionHandle, RoomLookup, RoomName, RoomRegistry};
    use crate::ClientEvent;

    fn registry() -> (Arc<RoomRegistry>, UnboundedReceiver<String>) {
        let (sender, receiver) = unbounded_channel();
        (RoomRegistry::new(sender), receiver)
    }

    fn station_room() -> RoomName {
        RoomName::Station("station".to_string())
    }

    /// Takes every event that is ready without waiting
    fn drain(handle: &mut ConnectionHandle) -> Vec<ClientEvent> {
        let mut events = vec![];

        while let Some(Some(event)) = handle.next().now_or_never() {
            events.push(event);
        }

        events
    }

    #[test]
    fn connections_start_in_their_default_rooms() {
        let (registry, _) = registry();

        let admin = registry.connect(Actor::admin("admin"));
        let anonymous = registry.connect(Actor::anonymous());

        assert!(registry.is_member(admin.id(), &RoomName::Home));
        assert!(registry.is_member(admin.id(), &RoomName::AdminStations));
        assert!(registry.is_member(admin.id(), &RoomName::User("admin".to_string())));

        assert!(registry.is_member(anonymous.id(), &RoomName::Home));
        assert!(!registry.is_member(anonymous.id(), &RoomName::AdminStations));
    }

    #[test]
    fn listeners_are_counted_per_user() {
        let (registry, _) = registry();
        let station_id = "station".to_string();

        let handles: Vec<_> = [
            Actor::user("a"),
            Actor::user("a"),
            Actor::user("b"),
            Actor::anonymous(),
        ]
        .into_iter()
        .map(|actor| registry.connect(actor))
        .collect();

        for handle in &handles {
            registry.join_station(handle.id(), &station_id);
        }

        assert_eq!(registry.users_in(&station_room()).len(), 2);
        assert_eq!(registry.connection_count(&station_room()), 4);
        assert_eq!(registry.anonymous_count(&station_room()), 1);
    }

    #[test]
    fn dropping_a_handle_leaves_every_room() {
        let (registry, mut departures) = registry();
        let station_id = "station".to_string();

        let handle = registry.connect(Actor::user("a"));
        let id = handle.id();
        registry.join_station(id, &station_id);

        drop(handle);

        assert_eq!(registry.connection_count(&station_room()), 0);
        assert!(!registry.is_member(id, &RoomName::Home));
        assert!(!registry.join(id, RoomName::Home));
        assert_eq!(departures.try_recv().ok(), Some(station_id));
    }

    #[test]
    fn events_reach_room_members_in_order() {
        let (registry, _) = registry();
        let station_id = "station".to_string();

        let mut member = registry.connect(Actor::user("a"));
        let mut outsider = registry.connect(Actor::user("b"));
        registry.join_station(member.id(), &station_id);

        for locked in [true, false] {
            registry.send_to_room(
                &station_room(),
                ClientEvent::QueueLockToggled {
                    station_id: station_id.clone(),
                    locked,
                },
            );
        }

        let events = drain(&mut member);
        assert!(matches!(events[0], ClientEvent::Connected { .. }));
        assert!(matches!(events[1], ClientEvent::QueueLockToggled { locked: true, .. }));
        assert!(matches!(events[2], ClientEvent::QueueLockToggled { locked: false, .. }));

        assert_eq!(drain(&mut outsider).len(), 1);
    }

    #[test]
    fn listeners_follow_the_current_song() {
        let (registry, _) = registry();
        let station_id = "station".to_string();

        let handle = registry.connect(Actor::user("a"));
        registry.switch_song_room(&station_id, Some("first".to_string()));
        registry.join_station(handle.id(), &station_id);

        assert!(registry.is_member(handle.id(), &RoomName::Song("first".to_string())));

        registry.switch_song_room(&station_id, Some("second".to_string()));

        assert!(!registry.is_member(handle.id(), &RoomName::Song("first".to_string())));
        assert!(registry.is_member(handle.id(), &RoomName::Song("second".to_string())));

        registry.leave_station(handle.id(), &station_id);
        assert!(!registry.is_member(handle.id(), &RoomName::Song("second".to_string())));
    }
}
