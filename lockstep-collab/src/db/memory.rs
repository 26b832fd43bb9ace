use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use lockstep_core::{PlaylistId, Song, StationData, UserId};

use crate::{Database, DatabaseError, DatabaseResult, Result, SessionData};

/// A database living in process memory, used for single process setups and tests.
#[derive(Default)]
pub struct MemoryDatabase {
    stations: DashMap<String, StationData>,
    songs: DashMap<String, Song>,
    playlists: DashMap<PlaylistId, Vec<String>>,
    sessions: DashMap<String, SessionData>,
    /// Set in development mode, where any unknown token is taken as a user id
    development_admins: Option<HashSet<UserId>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database accepting every token as the id of its user, with the given users as administrators
    pub fn development(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            development_admins: Some(admins.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn insert_song(&self, song: Song) {
        self.songs.insert(song.media_source_id.clone(), song);
    }

    pub fn insert_playlist(&self, playlist_id: impl Into<PlaylistId>, media_source_ids: Vec<String>) {
        self.playlists.insert(playlist_id.into(), media_source_ids);
    }

    pub fn insert_session(&self, token: impl Into<String>, session: SessionData) {
        self.sessions.insert(token.into(), session);
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn station_by_id(&self, station_id: &str) -> Result<StationData> {
        self.stations
            .get(station_id)
            .map(|s| s.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "station",
                identifier: "id",
            })
    }

    async fn station_by_name(&self, name: &str) -> Result<StationData> {
        self.stations
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "station",
                identifier: "name",
            })
    }

    async fn list_stations(&self) -> Result<Vec<StationData>> {
        let mut stations: Vec<_> = self.stations.iter().map(|s| s.clone()).collect();
        stations.sort_by_key(|s| s.created_at);

        Ok(stations)
    }

    async fn create_station(&self, station: StationData) -> Result<StationData> {
        self.station_by_name(&station.name)
            .await
            .conflict_or_ok("station", "name", &station.name)?;

        self.stations.insert(station.id.clone(), station.clone());
        Ok(station)
    }

    async fn update_station(&self, station: &StationData) -> Result<()> {
        match self.stations.get_mut(&station.id) {
            Some(mut existing) => {
                *existing = station.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound {
                resource: "station",
                identifier: "id",
            }),
        }
    }

    async fn delete_station(&self, station_id: &str) -> Result<()> {
        self.stations
            .remove(station_id)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound {
                resource: "station",
                identifier: "id",
            })
    }

    async fn song_by_media_source_id(&self, media_source_id: &str) -> Result<Song> {
        self.songs
            .get(media_source_id)
            .map(|s| s.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "media_source_id",
            })
    }

    async fn playlist_songs(&self, playlist_id: &PlaylistId) -> Result<Vec<Song>> {
        let ids = self
            .playlists
            .get(playlist_id)
            .map(|p| p.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            })?;

        // Songs missing from the catalog are skipped
        Ok(ids
            .iter()
            .filter_map(|id| self.songs.get(id).map(|s| s.clone()))
            .collect())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        if let Some(session) = self.sessions.get(token) {
            return Ok(session.clone());
        }

        match &self.development_admins {
            Some(admins) => Ok(SessionData {
                user_id: token.to_string(),
                admin: admins.contains(token),
            }),
            None => Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use lockstep_core::{Config, NewStation, Privacy, StationData, StationType};

    use super::MemoryDatabase;
    use crate::{Database, DatabaseError};

    fn station(id: &str, name: &str) -> StationData {
        StationData::new(
            id.to_string(),
            NewStation {
                kind: StationType::Community,
                privacy: Privacy::Public,
                name: name.to_string(),
                display_name: "Station".to_string(),
                description: String::new(),
            },
            Some("owner".to_string()),
            &Config::default(),
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn station_names_are_unique() {
        let database = MemoryDatabase::new();

        database.create_station(station("a", "chill")).await.unwrap();
        let result = database.create_station(station("b", "chill")).await;

        assert!(matches!(result, Err(DatabaseError::Conflict { field: "name", .. })));
    }

    #[tokio::test]
    async fn development_sessions_trust_the_token() {
        let database = MemoryDatabase::development(["root".to_string()]);

        let root = database.session_by_token("root").await.unwrap();
        let user = database.session_by_token("someone").await.unwrap();

        assert!(root.admin);
        assert_eq!(user.user_id, "someone");
        assert!(!user.admin);

        let strict = MemoryDatabase::new();
        assert!(strict.session_by_token("someone").await.unwrap_err().is_not_found());
    }
}
