use std::{collections::HashMap, fs, io};

use lockstep_collab::MemoryDatabase;
use lockstep_core::{MediaSourceId, PlaylistId, Song};
use serde::Deserialize;
use thiserror::Error;

/// Songs and playlists to seed the in-memory database with
#[derive(Debug, Default, Deserialize)]
struct Catalog {
    #[serde(default)]
    songs: Vec<Song>,
    #[serde(default)]
    playlists: HashMap<PlaylistId, Vec<MediaSourceId>>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// Reads a catalog file into the database, returning how many songs it had
pub fn load(path: &str, database: &MemoryDatabase) -> Result<usize, CatalogError> {
    let contents = fs::read_to_string(path)?;

    seed(&contents, database)
}

fn seed(contents: &str, database: &MemoryDatabase) -> Result<usize, CatalogError> {
    let catalog: Catalog = serde_json::from_str(contents)?;
    let songs = catalog.songs.len();

    for song in catalog.songs {
        database.insert_song(song);
    }

    for (playlist_id, media_source_ids) in catalog.playlists {
        database.insert_playlist(playlist_id, media_source_ids);
    }

    Ok(songs)
}

#[cfg(test)]
mod test {
    use lockstep_collab::{Database, MemoryDatabase};

    use super::seed;

    #[tokio::test]
    async fn catalogs_seed_songs_and_playlists() {
        let database = MemoryDatabase::new();
        let catalog = r#"{
            "songs": [
                { "mediaSourceId": "a", "title": "A", "duration": 120.5, "skipDuration": 2 },
                { "mediaSourceId": "b", "title": "B", "duration": 90, "skipDuration": 0 }
            ],
            "playlists": { "mix": ["b", "a"] }
        }"#;

        assert_eq!(seed(catalog, &database).unwrap(), 2);

        let song = database.song_by_media_source_id("a").await.unwrap();
        assert_eq!(song.skip_duration, 2.);

        let playlist = database.playlist_songs(&"mix".to_string()).await.unwrap();
        let order: Vec<_> = playlist.iter().map(|s| s.media_source_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn malformed_catalogs_are_rejected() {
        let database = MemoryDatabase::new();

        assert!(seed("{ \"songs\": 5 }", &database).is_err());
    }
}
