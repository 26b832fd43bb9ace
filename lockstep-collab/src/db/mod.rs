use std::sync::Arc;

use async_trait::async_trait;
use lockstep_core::{PlaylistId, Song, StationData, UserId};
use thiserror::Error;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type ArcedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Who a session token belongs to
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user_id: UserId,
    pub admin: bool,
}

/// The shared persistent store every process reads and writes.
///
/// Station updates replace the whole record, so concurrent writers follow last-write-wins.
#[async_trait]
pub trait Database: Send + Sync {
    async fn station_by_id(&self, station_id: &str) -> Result<StationData>;
    async fn station_by_name(&self, name: &str) -> Result<StationData>;
    async fn list_stations(&self) -> Result<Vec<StationData>>;
    async fn create_station(&self, station: StationData) -> Result<StationData>;
    async fn update_station(&self, station: &StationData) -> Result<()>;
    async fn delete_station(&self, station_id: &str) -> Result<()>;

    /// Resolves song metadata from the catalog
    async fn song_by_media_source_id(&self, media_source_id: &str) -> Result<Song>;
    /// Returns the songs of a playlist in order
    async fn playlist_songs(&self, playlist_id: &PlaylistId) -> Result<Vec<Song>>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
}
