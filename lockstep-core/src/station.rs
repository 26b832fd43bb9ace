use std::{collections::BTreeSet, fmt::Display, time::Duration};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Config, PlaybackClock};

pub type StationId = String;
pub type UserId = String;
pub type MediaSourceId = String;
pub type PlaylistId = String;

lazy_static! {
    static ref STATION_NAME_REGEX: Regex = Regex::new(r"^[a-z0-9_]{2,16}$").unwrap();
}

const DISPLAY_NAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=32;
const MAX_DESCRIPTION_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationType {
    Official,
    Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

/// Song metadata as resolved by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub media_source_id: MediaSourceId,
    pub title: String,
    /// Length in seconds
    pub duration: f64,
    /// Seconds skipped at the start of the song
    pub skip_duration: f64,
}

/// The song a station is playing right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSong {
    pub media_source_id: MediaSourceId,
    pub title: String,
    pub duration: f64,
    pub skip_duration: f64,
    /// Absent for songs drawn from a playlist
    pub requested_by: Option<UserId>,
    pub skip_votes: BTreeSet<UserId>,
}

/// A pending song request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSong {
    pub media_source_id: MediaSourceId,
    pub title: String,
    pub duration: f64,
    pub skip_duration: f64,
    pub requested_by: UserId,
    pub requested_at: DateTime<Utc>,
}

/// The authoritative, persisted record of a station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationData {
    pub id: StationId,
    #[serde(rename = "type")]
    pub kind: StationType,
    pub privacy: Privacy,
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Always set for community stations, never for official ones
    pub owner: Option<UserId>,
    /// If true, only the owner or an admin may add songs to the queue
    pub locked: bool,
    /// If true, the next song comes from the queue instead of the private playlist
    pub party_mode: bool,
    /// Percentage of listeners that have to vote to skip
    pub skip_vote_threshold: u8,
    pub clock: PlaybackClock,
    pub current_song: Option<CurrentSong>,
    pub queue: Vec<QueuedSong>,
    pub private_playlist: Option<PlaylistId>,
    /// Position of the current song within the private playlist
    pub current_song_index: Option<usize>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStation {
    pub kind: StationType,
    pub privacy: Privacy,
    pub name: String,
    pub display_name: String,
    pub description: String,
}

/// What a joining listener needs to seek to the agreed offset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTime {
    pub current_song: Option<CurrentSong>,
    pub elapsed_ms: i64,
    pub paused: bool,
}

/// Why the current song changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvanceReason {
    NaturalEnd,
    VoteQuorum,
    ForceSkip,
    PlaylistReselect,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid station name")]
    InvalidName,
    #[error("invalid display name")]
    InvalidDisplayName,
    #[error("description is too long")]
    DescriptionTooLong,
    #[error("that name is reserved")]
    ReservedName,
}

impl NewStation {
    /// Checks the user supplied fields of a new station
    pub fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        if !STATION_NAME_REGEX.is_match(&self.name) {
            return Err(ValidationError::InvalidName);
        }

        if config.is_reserved_name(&self.name) {
            return Err(ValidationError::ReservedName);
        }

        if !DISPLAY_NAME_LENGTH.contains(&self.display_name.trim().chars().count()) {
            return Err(ValidationError::InvalidDisplayName);
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::DescriptionTooLong);
        }

        Ok(())
    }
}

impl StationData {
    /// Builds a fresh station record. The clock starts playing with nothing loaded.
    pub fn new(
        id: StationId,
        new_station: NewStation,
        owner: Option<UserId>,
        config: &Config,
        now: DateTime<Utc>,
    ) -> Self {
        let party_mode = new_station.kind == StationType::Community;

        Self {
            id,
            kind: new_station.kind,
            privacy: new_station.privacy,
            name: new_station.name,
            display_name: new_station.display_name.trim().to_string(),
            description: new_station.description,
            owner,
            locked: false,
            party_mode,
            skip_vote_threshold: config.default_skip_vote_threshold,
            clock: PlaybackClock::start(now),
            current_song: None,
            queue: vec![],
            private_playlist: None,
            current_song_index: None,
            created_at: now,
        }
    }

    /// Replaces the current song. Votes are dropped and the clock restarts,
    /// keeping the station paused if it was.
    pub fn set_current_song(&mut self, song: Option<CurrentSong>, now: DateTime<Utc>) {
        self.current_song = song;
        self.clock.restart(now);
    }

    /// Removes and returns the oldest queued song
    pub fn pop_queue_head(&mut self) -> Option<QueuedSong> {
        if self.queue.is_empty() {
            return None;
        }

        Some(self.queue.remove(0))
    }

    /// Total length of the queue in seconds, including the current song
    pub fn total_duration(&self) -> f64 {
        let queued: f64 = self.queue.iter().map(|q| q.duration).sum();
        let current = self.current_song.as_ref().map(|c| c.duration).unwrap_or(0.);

        queued + current
    }

    /// The queued songs requested by the given user
    pub fn requested_by<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a QueuedSong> {
        self.queue.iter().filter(move |q| q.requested_by == user_id)
    }

    pub fn is_queued(&self, media_source_id: &str) -> bool {
        self.queue.iter().any(|q| q.media_source_id == media_source_id)
    }

    pub fn is_current(&self, media_source_id: &str) -> bool {
        self.current_song
            .as_ref()
            .is_some_and(|c| c.media_source_id == media_source_id)
    }

    pub fn current_time(&self, now: DateTime<Utc>) -> CurrentTime {
        let elapsed_ms = match self.current_song {
            Some(_) => self.clock.elapsed_ms(now),
            None => 0,
        };

        CurrentTime {
            current_song: self.current_song.clone(),
            elapsed_ms,
            paused: self.clock.is_paused(),
        }
    }

    /// How long until the current song ends, if one is playing and the station isn't paused
    pub fn time_until_end(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.clock.is_paused() {
            return None;
        }

        self.current_song
            .as_ref()
            .map(|song| self.clock.remaining(now, song))
    }
}

impl CurrentSong {
    pub fn from_song(song: Song, requested_by: Option<UserId>) -> Self {
        Self {
            media_source_id: song.media_source_id,
            title: song.title,
            duration: song.duration,
            skip_duration: song.skip_duration,
            requested_by,
            skip_votes: Default::default(),
        }
    }
}

impl From<QueuedSong> for CurrentSong {
    fn from(queued: QueuedSong) -> Self {
        Self {
            media_source_id: queued.media_source_id,
            title: queued.title,
            duration: queued.duration,
            skip_duration: queued.skip_duration,
            requested_by: Some(queued.requested_by),
            skip_votes: Default::default(),
        }
    }
}

impl Display for AdvanceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            AdvanceReason::NaturalEnd => "natural end",
            AdvanceReason::VoteQuorum => "vote quorum",
            AdvanceReason::ForceSkip => "force skip",
            AdvanceReason::PlaylistReselect => "playlist reselect",
        };

        write!(f, "{}", reason)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use chrono::{DateTime, Utc};

    use super::*;

    pub fn song(id: &str, duration: f64) -> Song {
        Song {
            media_source_id: id.to_string(),
            title: format!("Song {}", id),
            duration,
            skip_duration: 0.,
        }
    }

    pub fn queued(id: &str, duration: f64, user: &str) -> QueuedSong {
        QueuedSong {
            media_source_id: id.to_string(),
            title: format!("Song {}", id),
            duration,
            skip_duration: 0.,
            requested_by: user.to_string(),
            requested_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn station(kind: StationType, privacy: Privacy, owner: Option<&str>) -> StationData {
        StationData::new(
            "station".to_string(),
            NewStation {
                kind,
                privacy,
                name: "station".to_string(),
                display_name: "Station".to_string(),
                description: String::new(),
            },
            owner.map(String::from),
            &Config::default(),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    pub fn community(owner: &str) -> StationData {
        station(StationType::Community, Privacy::Public, Some(owner))
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Duration, Utc};

    use super::{mock, CurrentSong, NewStation, Privacy, StationType, ValidationError};
    use crate::Config;

    fn new_station(name: &str, display_name: &str) -> NewStation {
        NewStation {
            kind: StationType::Community,
            privacy: Privacy::Public,
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn station_names_are_validated() {
        let config = Config::default();

        assert_eq!(new_station("chill_beats", "Chill Beats").validate(&config), Ok(()));
        assert_eq!(
            new_station("Chill Beats", "Chill Beats").validate(&config),
            Err(ValidationError::InvalidName)
        );
        assert_eq!(
            new_station("news", "News").validate(&config),
            Err(ValidationError::ReservedName)
        );
        assert_eq!(
            new_station("chill", "x").validate(&config),
            Err(ValidationError::InvalidDisplayName)
        );
    }

    #[test]
    fn changing_song_resets_votes_and_clock() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let mut station = mock::community("owner");

        let mut song = CurrentSong::from_song(mock::song("a", 200.), None);
        song.skip_votes.insert("listener".to_string());
        station.set_current_song(Some(song), start);

        let later = start + Duration::seconds(30);
        let next = CurrentSong::from_song(mock::song("b", 100.), None);
        station.set_current_song(Some(next), later);

        let time = station.current_time(later + Duration::seconds(5));

        assert_eq!(time.elapsed_ms, 5000);
        assert!(station.current_song.unwrap().skip_votes.is_empty());
    }
}
