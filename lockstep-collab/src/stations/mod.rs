mod playback;
mod playlist;
mod queue;
mod votes;

use chrono::Utc;
use lockstep_core::{
    can_view, list_for_home, Actor, BusMessage, CurrentTime, NewStation, StationData, StationType,
};
use log::info;

pub use votes::VoteOutcome;

use crate::{
    auto_advance_task, util::random_string, CollabContext, CollabError, CollabResult,
    ConnectionId,
};

const STATION_ID_LENGTH: usize = 16;

/// Performs actions on stations. Every change is written to the database first, then published.
#[derive(Clone)]
pub struct StationManager {
    context: CollabContext,
}

/// What a client needs after joining a station
#[derive(Debug, Clone)]
pub struct JoinedStation {
    pub station: StationData,
    pub time: CurrentTime,
}

impl StationManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a station. Official stations are made by administrators, community stations
    /// by any logged in user, who becomes the owner.
    pub async fn create(&self, actor: &Actor, new_station: NewStation) -> CollabResult<StationData> {
        new_station.validate(&self.context.config)?;

        let owner = match new_station.kind {
            StationType::Official if actor.admin => None,
            StationType::Official => return Err(CollabError::InsufficientPermissions),
            StationType::Community => {
                Some(actor.user_id.clone().ok_or(CollabError::NotLoggedIn)?)
            }
        };

        let station = StationData::new(
            random_string(STATION_ID_LENGTH),
            new_station,
            owner,
            &self.context.config,
            Utc::now(),
        );

        let station = self.context.database.create_station(station).await?;
        self.publish(BusMessage::Create(station.id.clone())).await?;

        info!("Station {} created", station.name);
        Ok(station)
    }

    /// Removes a station and cancels its auto-advance
    pub async fn remove(&self, actor: &Actor, station_id: &str) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let station = self.context.database.station_by_id(station_id).await?;

        if !actor.is_owner_or_admin(&station) {
            return Err(CollabError::InsufficientPermissions);
        }

        self.context
            .scheduler
            .unschedule(&auto_advance_task(station_id));

        self.context.database.delete_station(station_id).await?;
        self.publish(BusMessage::Remove {
            station_id: station.id.clone(),
            privacy: station.privacy,
            owner: station.owner.clone(),
        })
        .await?;

        info!("Station {} removed", station.name);
        Ok(())
    }

    /// The stations the actor's home listing shows
    pub async fn list_for_home(
        &self,
        actor: &Actor,
        hide_unlisted: bool,
    ) -> CollabResult<Vec<StationData>> {
        let stations = self.context.database.list_stations().await?;

        Ok(list_for_home(&stations, actor, hide_unlisted)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Returns a station if the actor may see it
    pub async fn station(&self, actor: &Actor, station_id: &str) -> CollabResult<StationData> {
        let station = self.context.database.station_by_id(station_id).await?;

        if !can_view(&station, actor) {
            return Err(CollabError::InsufficientPermissions);
        }

        Ok(station)
    }

    /// How far into the current song the station is
    pub async fn current_time(&self, actor: &Actor, station_id: &str) -> CollabResult<CurrentTime> {
        let station = self.station(actor, station_id).await?;

        Ok(station.current_time(Utc::now()))
    }

    /// Puts a connection in the station's room, so it receives the station's events
    pub async fn join(
        &self,
        actor: &Actor,
        connection_id: ConnectionId,
        station_id: &str,
    ) -> CollabResult<JoinedStation> {
        self.ensure_connection_of(actor, connection_id)?;
        let station = self.station(actor, station_id).await?;

        if !self.context.rooms.join_station(connection_id, &station.id) {
            return Err(CollabError::ConnectionNotFound);
        }

        for message in Self::listener_messages(&station.id) {
            self.publish(message).await?;
        }

        Ok(JoinedStation {
            time: station.current_time(Utc::now()),
            station,
        })
    }

    pub async fn leave(
        &self,
        actor: &Actor,
        connection_id: ConnectionId,
        station_id: &str,
    ) -> CollabResult<()> {
        self.ensure_connection_of(actor, connection_id)?;

        if self
            .context
            .rooms
            .leave_station(connection_id, &station_id.to_string())
        {
            for message in Self::listener_messages(station_id) {
                self.publish(message).await?;
            }
        }

        Ok(())
    }

    /// The messages announcing a change in who is listening to a station
    pub(crate) fn listener_messages(station_id: &str) -> [BusMessage; 2] {
        [
            BusMessage::UpdateUsers(station_id.to_string()),
            BusMessage::UpdateUserCount(station_id.to_string()),
        ]
    }

    /// Connections may only be moved around by whoever opened them
    fn ensure_connection_of(&self, actor: &Actor, connection_id: ConnectionId) -> CollabResult<()> {
        match self.context.rooms.actor_of(connection_id) {
            None => Err(CollabError::ConnectionNotFound),
            Some(owner) if owner.user_id != actor.user_id => {
                Err(CollabError::InsufficientPermissions)
            }
            Some(_) => Ok(()),
        }
    }

    /// Reads a station and checks that the actor may control it
    async fn controlled_station(&self, actor: &Actor, station_id: &str) -> CollabResult<StationData> {
        let station = self.context.database.station_by_id(station_id).await?;

        if !actor.is_owner_or_admin(&station) {
            return Err(CollabError::InsufficientPermissions);
        }

        Ok(station)
    }

    async fn publish(&self, message: BusMessage) -> CollabResult<()> {
        self.context.bus.publish(message).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Arc;

    use lockstep_core::{
        Actor, BusMessage, Config, NewStation, Privacy, Song, StationData, StationType,
    };
    use tokio::sync::broadcast::Receiver;

    use crate::{Bus, Collab, LocalBus, MemoryDatabase};

    pub struct Setup {
        pub collab: Collab,
        pub database: Arc<MemoryDatabase>,
        pub messages: Receiver<BusMessage>,
    }

    pub fn setup() -> Setup {
        let database = Arc::new(MemoryDatabase::new());
        let bus = Arc::new(LocalBus::new(64));
        let messages = bus.subscribe();

        Setup {
            collab: Collab::new(Config::default(), database.clone(), bus),
            database,
            messages,
        }
    }

    pub fn song(id: &str, duration: f64) -> Song {
        Song {
            media_source_id: id.to_string(),
            title: format!("Song {}", id),
            duration,
            skip_duration: 0.,
        }
    }

    pub fn new_station(kind: StationType, privacy: Privacy, name: &str) -> NewStation {
        NewStation {
            kind,
            privacy,
            name: name.to_string(),
            display_name: "Station".to_string(),
            description: String::new(),
        }
    }

    impl Setup {
        pub async fn community(&self, owner: &str) -> StationData {
            self.collab
                .stations
                .create(
                    &Actor::user(owner),
                    new_station(StationType::Community, Privacy::Public, "station"),
                )
                .await
                .unwrap()
        }

        pub fn add_songs(&self, songs: &[(&str, f64)]) {
            for (id, duration) in songs {
                self.database.insert_song(song(id, *duration));
            }
        }

        /// Everything published so far
        pub fn published(&mut self) -> Vec<BusMessage> {
            let mut messages = vec![];

            while let Ok(message) = self.messages.try_recv() {
                messages.push(message);
            }

            messages
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use futures_util::{FutureExt, StreamExt};
    use lockstep_core::{Actor, BusMessage, Config, Privacy, StationType};
    use tokio::time::sleep;

    use super::mock::{new_station, setup, song};
    use crate::{
        auto_advance_task, ClientEvent, Collab, CollabError, Database, DatabaseError, LocalBus,
        MemoryDatabase, RoomName,
    };

    #[tokio::test]
    async fn official_stations_require_an_admin() {
        let setup = setup();
        let new = new_station(StationType::Official, Privacy::Public, "official");

        let result = setup.collab.stations.create(&Actor::user("u"), new.clone()).await;
        assert!(matches!(result, Err(CollabError::InsufficientPermissions)));

        let station = setup.collab.stations.create(&Actor::admin("a"), new).await.unwrap();
        assert_eq!(station.owner, None);
        assert!(!station.party_mode);
    }

    #[tokio::test]
    async fn community_stations_are_owned_by_their_creator() {
        let mut setup = setup();
        let new = new_station(StationType::Community, Privacy::Public, "mine");

        let result = setup.collab.stations.create(&Actor::anonymous(), new.clone()).await;
        assert!(matches!(result, Err(CollabError::NotLoggedIn)));

        let station = setup.collab.stations.create(&Actor::user("u"), new.clone()).await.unwrap();
        assert_eq!(station.owner.as_deref(), Some("u"));
        assert!(station.party_mode);
        assert_eq!(setup.published(), vec![BusMessage::Create(station.id.clone())]);

        let duplicate = setup.collab.stations.create(&Actor::user("v"), new).await;
        assert!(matches!(
            duplicate,
            Err(CollabError::Database(DatabaseError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn reserved_names_are_rejected() {
        let setup = setup();
        let new = new_station(StationType::Community, Privacy::Public, "admin");

        let result = setup.collab.stations.create(&Actor::user("u"), new).await;
        assert_eq!(result.unwrap_err().to_string(), "that name is reserved");
    }

    #[tokio::test]
    async fn only_owners_and_admins_remove_stations() {
        let mut setup = setup();
        let station = setup.community("owner").await;
        setup.published();

        let result = setup.collab.stations.remove(&Actor::user("other"), &station.id).await;
        assert!(matches!(result, Err(CollabError::InsufficientPermissions)));

        setup.collab.stations.remove(&Actor::user("owner"), &station.id).await.unwrap();

        assert_eq!(
            setup.published(),
            vec![BusMessage::Remove {
                station_id: station.id.clone(),
                privacy: Privacy::Public,
                owner: Some("owner".to_string())
            }]
        );
        assert!(setup.database.station_by_id(&station.id).await.is_err());
    }

    #[tokio::test]
    async fn private_stations_are_hidden_from_strangers() {
        let setup = setup();
        let owner = Actor::user("owner");
        let new = new_station(StationType::Community, Privacy::Private, "hidden");
        let station = setup.collab.stations.create(&owner, new).await.unwrap();

        let stranger = Actor::user("stranger");
        let listed = setup.collab.stations.list_for_home(&stranger, false).await.unwrap();
        assert!(listed.is_empty());

        let connection = setup.collab.connect(stranger.clone());
        let joined = setup
            .collab
            .stations
            .join(&stranger, connection.id(), &station.id)
            .await;
        assert!(matches!(joined, Err(CollabError::InsufficientPermissions)));

        let listed = setup.collab.stations.list_for_home(&owner, false).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn joining_announces_the_new_listener() {
        let mut setup = setup();
        let station = setup.community("owner").await;
        setup.published();

        let listener = Actor::user("listener");
        let connection = setup.collab.connect(listener.clone());

        let joined = setup
            .collab
            .stations
            .join(&listener, connection.id(), &station.id)
            .await
            .unwrap();

        assert_eq!(joined.station.id, station.id);
        assert!(setup
            .collab
            .context()
            .rooms
            .is_member(connection.id(), &RoomName::Station(station.id.clone())));
        assert_eq!(
            setup.published(),
            vec![
                BusMessage::UpdateUsers(station.id.clone()),
                BusMessage::UpdateUserCount(station.id.clone())
            ]
        );

        setup
            .collab
            .stations
            .leave(&listener, connection.id(), &station.id)
            .await
            .unwrap();
        assert_eq!(setup.published().len(), 2);
    }

    #[tokio::test]
    async fn connections_cannot_be_joined_by_someone_else() {
        let setup = setup();
        let station = setup.community("owner").await;
        let connection = setup.collab.connect(Actor::user("a"));

        let result = setup
            .collab
            .stations
            .join(&Actor::user("b"), connection.id(), &station.id)
            .await;

        assert!(matches!(result, Err(CollabError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn listeners_receive_station_events_once_dispatched() {
        let setup = setup();
        setup.collab.listen();

        let station = setup.community("owner").await;
        let owner = Actor::user("owner");
        let mut connection = setup.collab.connect(owner.clone());

        setup
            .collab
            .stations
            .join(&owner, connection.id(), &station.id)
            .await
            .unwrap();

        setup
            .collab
            .stations
            .toggle_lock(&owner, &station.id)
            .await
            .unwrap();

        let mut locked = false;

        for _ in 0..20 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;

            while let Some(Some(event)) = connection.next().now_or_never() {
                if let ClientEvent::QueueLockToggled { locked: true, .. } = event {
                    locked = true;
                }
            }
        }

        assert!(locked);
    }

    #[tokio::test]
    async fn processes_converge_through_the_bus() {
        let database = Arc::new(MemoryDatabase::new());
        let bus = Arc::new(LocalBus::new(64));
        let first = Collab::new(Config::default(), database.clone(), bus.clone());
        let second = Collab::new(Config::default(), database.clone(), bus);
        first.listen();
        second.listen();

        database.insert_song(song("a", 0.3));
        database.insert_song(song("b", 100.));

        let owner = Actor::user("owner");
        let station = first
            .stations
            .create(&owner, new_station(StationType::Community, Privacy::Public, "shared"))
            .await
            .unwrap();

        let listener = Actor::user("listener");
        let mut connection = first.connect(listener.clone());
        first
            .stations
            .join(&listener, connection.id(), &station.id)
            .await
            .unwrap();

        for id in ["a", "b"] {
            first.stations.add_to_queue(&owner, &station.id, id).await.unwrap();
        }

        let task = auto_advance_task(&station.id);
        assert!(first.context().scheduler.is_scheduled(&task));

        second.stations.pause(&owner, &station.id).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        let mut saw_pause = false;
        while let Some(Some(event)) = connection.next().now_or_never() {
            if let ClientEvent::StationPaused { .. } = event {
                saw_pause = true;
            }
        }

        assert!(saw_pause);
        assert!(!first.context().scheduler.is_scheduled(&task));

        second.stations.resume(&owner, &station.id).await.unwrap();
        assert!(second.context().scheduler.is_scheduled(&task));

        sleep(Duration::from_millis(600)).await;

        let stored = database.station_by_id(&station.id).await.unwrap();
        assert!(stored.is_current("b"));
    }
}
