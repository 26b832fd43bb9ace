use thiserror::Error;

use crate::{StationData, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("login required")]
    NotLoggedIn,
    #[error("there is no song currently playing")]
    NoCurrentSong,
    #[error("already voted")]
    AlreadyVoted,
}

/// Records a skip vote for the current song, returning the new vote count.
/// Repeat votes by the same listener are rejected and never counted twice.
pub fn record_vote(station: &mut StationData, listener: &UserId) -> Result<usize, VoteError> {
    let song = station
        .current_song
        .as_mut()
        .ok_or(VoteError::NoCurrentSong)?;

    if !song.skip_votes.insert(listener.clone()) {
        return Err(VoteError::AlreadyVoted);
    }

    Ok(song.skip_votes.len())
}

/// How many votes are needed given the amount of listeners and a percentage threshold.
/// At least one vote is always required.
pub fn quorum(listeners: usize, threshold: u8) -> usize {
    let threshold = threshold.clamp(1, 100) as usize;
    let needed = (listeners * threshold).div_ceil(100);

    needed.max(1)
}

pub fn quorum_reached(votes: usize, listeners: usize, threshold: u8) -> bool {
    votes >= quorum(listeners, threshold)
}
