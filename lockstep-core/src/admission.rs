use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{can_view, Actor, Config, QueuedSong, Song, StationData, StationType};

/// Why a song request was turned down
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("login required")]
    NotLoggedIn,
    #[error("official stations do not accept song requests")]
    OfficialStation,
    /// The queue is locked and the requester is neither owner nor admin
    #[error("insufficient permissions")]
    Locked,
    /// The requester may not see the station
    #[error("insufficient permissions")]
    NotVisible,
    #[error("that song is currently playing")]
    CurrentlyPlaying,
    #[error("that song is already in the queue")]
    AlreadyQueued,
    #[error("max length of the queue is 3 hours")]
    QueueFull,
    #[error("max length of songs per user is 15 minutes")]
    UserDurationExceeded,
    #[error("max amount of songs per user is 3, and only 2 in a row is allowed")]
    UserCountExceeded,
}

/// Checks whether a song request may enter the station's queue. Nothing is mutated.
pub fn admit(
    station: &StationData,
    requester: &Actor,
    song: &Song,
    config: &Config,
) -> Result<(), AdmissionError> {
    let user_id = requester
        .user_id
        .as_deref()
        .ok_or(AdmissionError::NotLoggedIn)?;

    if station.kind != StationType::Community {
        return Err(AdmissionError::OfficialStation);
    }

    if station.locked && !requester.is_owner_or_admin(station) {
        return Err(AdmissionError::Locked);
    }

    if !can_view(station, requester) {
        return Err(AdmissionError::NotVisible);
    }

    if station.is_current(&song.media_source_id) {
        return Err(AdmissionError::CurrentlyPlaying);
    }

    if station.is_queued(&song.media_source_id) {
        return Err(AdmissionError::AlreadyQueued);
    }

    if station.total_duration() + song.duration >= config.queue_capacity_in_seconds {
        return Err(AdmissionError::QueueFull);
    }

    let user_duration: f64 = station.requested_by(user_id).map(|q| q.duration).sum();

    if user_duration + song.duration >= config.max_duration_per_user_in_seconds {
        return Err(AdmissionError::UserDurationExceeded);
    }

    let user_count = station.requested_by(user_id).count() + 1;

    if user_count > config.max_songs_per_user
        || tail_run(station, user_id) + 1 > config.max_consecutive_songs_per_user
    {
        return Err(AdmissionError::UserCountExceeded);
    }

    Ok(())
}

/// Admits the song and appends it to the queue, returning the new entry
pub fn admit_into<'a>(
    station: &'a mut StationData,
    requester: &Actor,
    song: Song,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<&'a QueuedSong, AdmissionError> {
    admit(station, requester, &song, config)?;

    let requested_by = requester
        .user_id
        .clone()
        .ok_or(AdmissionError::NotLoggedIn)?;

    station.queue.push(QueuedSong {
        media_source_id: song.media_source_id,
        title: song.title,
        duration: song.duration,
        skip_duration: song.skip_duration,
        requested_by,
        requested_at: now,
    });

    Ok(&station.queue[station.queue.len() - 1])
}

/// How many songs at the very end of the queue were requested by the user in a row
fn tail_run(station: &StationData, user_id: &str) -> usize {
    station
        .queue
        .iter()
        .rev()
        .take_while(|q| q.requested_by == user_id)
        .count()
}
