use lockstep_core::{AdmissionError, ClockError, ValidationError, VoteError};
use thiserror::Error;

use crate::{BusError, DatabaseError};

pub type CollabResult<T> = Result<T, CollabError>;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("login required")]
    NotLoggedIn,
    #[error("insufficient permissions")]
    InsufficientPermissions,
    /// Queue management only exists on community stations
    #[error("this is not a community station")]
    NotCommunity,
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("song is not in the queue")]
    NotInQueue,
    #[error("you are not listening to this station")]
    NotListening,
    #[error("connection does not exist")]
    ConnectionNotFound,
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Bus(#[from] BusError),
}
