use lockstep_core::{CurrentTime, PlaylistId, QueuedSong, StationData, StationId, UserId};

use crate::ConnectionId;

/// Events delivered to the clients of a room
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Sent once to a fresh connection, so the client can refer to it when joining stations
    Connected { connection_id: ConnectionId },
    StationCreated { station: StationData },
    StationRemoved { station_id: StationId },
    StationPaused {
        station_id: StationId,
        time: CurrentTime,
    },
    StationResumed {
        station_id: StationId,
        time: CurrentTime,
    },
    /// The current song changed, or ended with nothing to follow it
    NextSong {
        station_id: StationId,
        time: CurrentTime,
    },
    QueueUpdated {
        station_id: StationId,
        queue: Vec<QueuedSong>,
    },
    QueueLockToggled { station_id: StationId, locked: bool },
    SkipVoted {
        station_id: StationId,
        votes: usize,
        /// Votes needed for the song to be skipped, given the listeners on this process
        needed: usize,
    },
    PartyModeUpdated {
        station_id: StationId,
        party_mode: bool,
    },
    UsersUpdated {
        station_id: StationId,
        users: Vec<UserId>,
        /// Connections without a logged in user
        anonymous: usize,
    },
    UserCountUpdated { station_id: StationId, count: usize },
    PrivatePlaylistSelected {
        station_id: StationId,
        playlist_id: PlaylistId,
    },
}
