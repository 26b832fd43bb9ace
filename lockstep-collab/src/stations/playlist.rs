use lockstep_core::{Actor, AdvanceReason, BusMessage, PlaylistId};
use log::info;

use crate::CollabResult;

use super::StationManager;

impl StationManager {
    /// Selects the playlist a community station plays outside of party mode.
    /// Outside of party mode, the station starts over from the top of the new playlist.
    pub async fn select_private_playlist(
        &self,
        actor: &Actor,
        station_id: &str,
        playlist_id: PlaylistId,
    ) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_community_station(actor, station_id).await?;

        // Fails if the playlist doesn't exist
        self.context.database.playlist_songs(&playlist_id).await?;

        station.private_playlist = Some(playlist_id.clone());
        station.current_song_index = None;
        self.context.database.update_station(&station).await?;

        self.publish(BusMessage::PrivatePlaylistSelected {
            station_id: station.id.clone(),
            playlist_id: playlist_id.clone(),
        })
        .await?;

        info!("Station {} selected playlist {}", station.name, playlist_id);

        if !station.party_mode {
            self.advance_locked(&mut station, AdvanceReason::PlaylistReselect)
                .await?;
        }

        Ok(())
    }
}
