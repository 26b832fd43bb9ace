use async_trait::async_trait;
use lockstep_core::{PlaylistId, Song, StationData};
use log::info;
use sqlx::{postgres::PgPoolOptions, query, Error as SqlxError, PgPool, Row};

use crate::{Database, DatabaseError, DatabaseResult, IntoDatabaseError, Result, SessionData};

const MIGRATIONS: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS stations (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        data TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS songs (
        media_source_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        duration DOUBLE PRECISION NOT NULL,
        skip_duration DOUBLE PRECISION NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS playlist_songs (
        playlist_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        media_source_id TEXT NOT NULL REFERENCES songs (media_source_id) ON DELETE CASCADE,
        PRIMARY KEY (playlist_id, position)
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        admin BOOLEAN NOT NULL DEFAULT false
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at TIMESTAMPTZ NOT NULL
    )",
];

/// A postgres database implementation for lockstep.
///
/// Station records are stored as serialized JSON, so an update rewrites the whole record.
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        Ok(Self { pool })
    }

    /// Creates the tables if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        info!("Database tables are up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn parse_station(data: &str) -> Result<StationData> {
        serde_json::from_str(data).map_err(|e| DatabaseError::Internal(Box::new(e)))
    }

    fn serialize_station(station: &StationData) -> Result<String> {
        serde_json::to_string(station).map_err(|e| DatabaseError::Internal(Box::new(e)))
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn station_by_id(&self, station_id: &str) -> Result<StationData> {
        let row = query("SELECT data FROM stations WHERE id = $1")
            .bind(station_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("station", "id"))?;

        Self::parse_station(row.try_get("data").map_err(|e| e.any())?)
    }

    async fn station_by_name(&self, name: &str) -> Result<StationData> {
        let row = query("SELECT data FROM stations WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("station", "name"))?;

        Self::parse_station(row.try_get("data").map_err(|e| e.any())?)
    }

    async fn list_stations(&self) -> Result<Vec<StationData>> {
        let rows = query("SELECT data FROM stations ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter()
            .map(|r| Self::parse_station(r.try_get("data").map_err(|e| e.any())?))
            .collect()
    }

    async fn create_station(&self, station: StationData) -> Result<StationData> {
        self.station_by_name(&station.name)
            .await
            .conflict_or_ok("station", "name", &station.name)?;

        query("INSERT INTO stations (id, name, data, created_at) VALUES ($1, $2, $3, $4)")
            .bind(&station.id)
            .bind(&station.name)
            .bind(Self::serialize_station(&station)?)
            .bind(station.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(station)
    }

    async fn update_station(&self, station: &StationData) -> Result<()> {
        let result = query("UPDATE stations SET data = $1 WHERE id = $2")
            .bind(Self::serialize_station(station)?)
            .bind(&station.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "station",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn delete_station(&self, station_id: &str) -> Result<()> {
        let result = query("DELETE FROM stations WHERE id = $1")
            .bind(station_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "station",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn song_by_media_source_id(&self, media_source_id: &str) -> Result<Song> {
        let row = query(
            "SELECT media_source_id, title, duration, skip_duration FROM songs WHERE media_source_id = $1",
        )
        .bind(media_source_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("song", "media_source_id"))?;

        song_from_row(&row).map_err(|e| e.any())
    }

    async fn playlist_songs(&self, playlist_id: &PlaylistId) -> Result<Vec<Song>> {
        let rows = query(
            "
            SELECT songs.media_source_id, songs.title, songs.duration, songs.skip_duration
            FROM playlist_songs
                INNER JOIN songs ON playlist_songs.media_source_id = songs.media_source_id
            WHERE playlist_id = $1
            ORDER BY position",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter()
            .map(|r| song_from_row(r).map_err(|e| e.any()))
            .collect()
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query(
            "
            SELECT sessions.user_id, users.admin
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            user_id: row.try_get("user_id").map_err(|e| e.any())?,
            admin: row.try_get("admin").map_err(|e| e.any())?,
        })
    }
}

fn song_from_row(row: &sqlx::postgres::PgRow) -> std::result::Result<Song, SqlxError> {
    Ok(Song {
        media_source_id: row.try_get("media_source_id")?,
        title: row.try_get("title")?,
        duration: row.try_get("duration")?,
        skip_duration: row.try_get("skip_duration")?,
    })
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
