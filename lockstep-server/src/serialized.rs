//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lockstep_collab::{JoinedStation as CollabJoinedStation, VoteOutcome as CollabVoteOutcome};
use lockstep_core::{
    CurrentSong as CoreCurrentSong, CurrentTime as CoreCurrentTime, QueuedSong as CoreQueuedSong,
    StationData,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::schemas::{PrivacySchema, StationTypeSchema};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    id: String,
    #[serde(rename = "type")]
    kind: StationTypeSchema,
    privacy: PrivacySchema,
    name: String,
    display_name: String,
    description: String,
    owner: Option<String>,
    locked: bool,
    party_mode: bool,
    skip_vote_threshold: u8,
    paused: bool,
    current_song: Option<CurrentSong>,
    queue: Vec<QueuedSong>,
    private_playlist: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSong {
    media_source_id: String,
    title: String,
    /// Seconds
    duration: f64,
    skip_duration: f64,
    requested_by: Option<String>,
    skip_votes: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSong {
    media_source_id: String,
    title: String,
    duration: f64,
    requested_by: String,
    requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTime {
    current_song: Option<CurrentSong>,
    /// How far into the current song the station is, in milliseconds
    elapsed_ms: i64,
    paused: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinedStation {
    station: Station,
    time: CurrentTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteOutcome {
    votes: usize,
    needed: usize,
    skipped: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LockState {
    pub locked: bool,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<Station> for StationData {
    fn to_serialized(&self) -> Station {
        Station {
            id: self.id.clone(),
            kind: self.kind.into(),
            privacy: self.privacy.into(),
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            owner: self.owner.clone(),
            locked: self.locked,
            party_mode: self.party_mode,
            skip_vote_threshold: self.skip_vote_threshold,
            paused: self.clock.is_paused(),
            current_song: self.current_song.to_serialized(),
            queue: self.queue.to_serialized(),
            private_playlist: self.private_playlist.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<CurrentSong> for CoreCurrentSong {
    fn to_serialized(&self) -> CurrentSong {
        CurrentSong {
            media_source_id: self.media_source_id.clone(),
            title: self.title.clone(),
            duration: self.duration,
            skip_duration: self.skip_duration,
            requested_by: self.requested_by.clone(),
            skip_votes: self.skip_votes.clone(),
        }
    }
}

impl ToSerialized<QueuedSong> for CoreQueuedSong {
    fn to_serialized(&self) -> QueuedSong {
        QueuedSong {
            media_source_id: self.media_source_id.clone(),
            title: self.title.clone(),
            duration: self.duration,
            requested_by: self.requested_by.clone(),
            requested_at: self.requested_at,
        }
    }
}

impl ToSerialized<CurrentTime> for CoreCurrentTime {
    fn to_serialized(&self) -> CurrentTime {
        CurrentTime {
            current_song: self.current_song.to_serialized(),
            elapsed_ms: self.elapsed_ms,
            paused: self.paused,
        }
    }
}

impl ToSerialized<JoinedStation> for CollabJoinedStation {
    fn to_serialized(&self) -> JoinedStation {
        JoinedStation {
            station: self.station.to_serialized(),
            time: self.time.to_serialized(),
        }
    }
}

impl ToSerialized<VoteOutcome> for CollabVoteOutcome {
    fn to_serialized(&self) -> VoteOutcome {
        VoteOutcome {
            votes: self.votes,
            needed: self.needed,
            skipped: self.skipped,
        }
    }
}
