use std::convert::Infallible;

use axum::{
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::{Stream, StreamExt};
use lockstep_collab::ClientEvent;
use log::error;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Session,
    context::ServerContext,
    serialized::{CurrentTime, QueuedSong, Station, ToSerialized},
    Router,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The first event of every stream. The id is needed to join stations.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: u64 },
    StationCreated { station: Station },
    #[serde(rename_all = "camelCase")]
    StationRemoved { station_id: String },
    #[serde(rename_all = "camelCase")]
    StationPaused {
        station_id: String,
        time: CurrentTime,
    },
    #[serde(rename_all = "camelCase")]
    StationResumed {
        station_id: String,
        time: CurrentTime,
    },
    /// The current song changed
    #[serde(rename_all = "camelCase")]
    NextSong {
        station_id: String,
        time: CurrentTime,
    },
    #[serde(rename_all = "camelCase")]
    QueueUpdated {
        station_id: String,
        queue: Vec<QueuedSong>,
    },
    #[serde(rename_all = "camelCase")]
    QueueLockToggled { station_id: String, locked: bool },
    #[serde(rename_all = "camelCase")]
    SkipVoted {
        station_id: String,
        votes: usize,
        needed: usize,
    },
    #[serde(rename_all = "camelCase")]
    PartyModeUpdated {
        station_id: String,
        party_mode: bool,
    },
    #[serde(rename_all = "camelCase")]
    UsersUpdated {
        station_id: String,
        users: Vec<String>,
        anonymous: usize,
    },
    #[serde(rename_all = "camelCase")]
    UserCountUpdated { station_id: String, count: usize },
    #[serde(rename_all = "camelCase")]
    PrivatePlaylistSelected {
        station_id: String,
        playlist_id: String,
    },
}

impl From<ClientEvent> for ServerEvent {
    fn from(value: ClientEvent) -> Self {
        match value {
            ClientEvent::Connected { connection_id } => Self::Connected {
                connection_id: connection_id.value(),
            },
            ClientEvent::StationCreated { station } => Self::StationCreated {
                station: station.to_serialized(),
            },
            ClientEvent::StationRemoved { station_id } => Self::StationRemoved { station_id },
            ClientEvent::StationPaused { station_id, time } => Self::StationPaused {
                station_id,
                time: time.to_serialized(),
            },
            ClientEvent::StationResumed { station_id, time } => Self::StationResumed {
                station_id,
                time: time.to_serialized(),
            },
            ClientEvent::NextSong { station_id, time } => Self::NextSong {
                station_id,
                time: time.to_serialized(),
            },
            ClientEvent::QueueUpdated { station_id, queue } => Self::QueueUpdated {
                station_id,
                queue: queue.to_serialized(),
            },
            ClientEvent::QueueLockToggled { station_id, locked } => {
                Self::QueueLockToggled { station_id, locked }
            }
            ClientEvent::SkipVoted {
                station_id,
                votes,
                needed,
            } => Self::SkipVoted {
                station_id,
                votes,
                needed,
            },
            ClientEvent::PartyModeUpdated {
                station_id,
                party_mode,
            } => Self::PartyModeUpdated {
                station_id,
                party_mode,
            },
            ClientEvent::UsersUpdated {
                station_id,
                users,
                anonymous,
            } => Self::UsersUpdated {
                station_id,
                users,
                anonymous,
            },
            ClientEvent::UserCountUpdated { station_id, count } => {
                Self::UserCountUpdated { station_id, count }
            }
            ClientEvent::PrivatePlaylistSelected {
                station_id,
                playlist_id,
            } => Self::PrivatePlaylistSelected {
                station_id,
                playlist_id,
            },
        }
    }
}

fn to_sse_event(event: ClientEvent) -> Result<Event, Infallible> {
    let event = ServerEvent::from(event);

    // Events are plain data, so this only fails on a bug
    let data = serde_json::to_string(&event).unwrap_or_else(|e| {
        error!("Failed to serialize event: {}", e);
        String::from("{}")
    });

    Ok(Event::default().data(data))
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from the rooms this connection is in",
            body = ServerEvent
        )
    )
)]
async fn event_stream(
    Session(actor): Session,
    context: ServerContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = context.collab.connect(actor);

    Sse::new(handle.map(to_sse_event)).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}
