use chrono::Utc;
use lockstep_core::{admit_into, Actor, AdvanceReason, BusMessage, QueuedSong, StationData, StationType};
use log::info;

use crate::{CollabError, CollabResult};

use super::StationManager;

impl StationManager {
    /// Requests a song on a community station. If nothing is playing in party mode, it plays right away.
    pub async fn add_to_queue(
        &self,
        actor: &Actor,
        station_id: &str,
        media_source_id: &str,
    ) -> CollabResult<QueuedSong> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.context.database.station_by_id(station_id).await?;
        let song = self
            .context
            .database
            .song_by_media_source_id(media_source_id)
            .await?;

        let queued = admit_into(
            &mut station,
            actor,
            song,
            &self.context.config,
            Utc::now(),
        )?
        .clone();

        self.context.database.update_station(&station).await?;
        self.publish(BusMessage::QueueUpdate(station.id.clone()))
            .await?;

        info!(
            "{} added {} to the queue of {}",
            queued.requested_by, queued.title, station.name
        );

        if station.party_mode && station.current_song.is_none() {
            self.advance_locked(&mut station, AdvanceReason::NaturalEnd)
                .await?;
        }

        Ok(queued)
    }

    /// Removes a song from the queue. Requesters may take back their own songs.
    pub async fn remove_from_queue(
        &self,
        actor: &Actor,
        station_id: &str,
        media_source_id: &str,
    ) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.community_station(station_id).await?;

        let position = station
            .queue
            .iter()
            .position(|q| q.media_source_id == media_source_id)
            .ok_or(CollabError::NotInQueue)?;

        let is_requester = actor.user_id.as_ref() == Some(&station.queue[position].requested_by);

        if !is_requester && !actor.is_owner_or_admin(&station) {
            return Err(CollabError::InsufficientPermissions);
        }

        station.queue.remove(position);
        self.context.database.update_station(&station).await?;
        self.publish(BusMessage::QueueUpdate(station.id.clone()))
            .await
    }

    /// Moves a queued song to another position, clamped to the bounds of the queue
    pub async fn reposition_in_queue(
        &self,
        actor: &Actor,
        station_id: &str,
        media_source_id: &str,
        new_index: usize,
    ) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_community_station(actor, station_id).await?;

        let position = station
            .queue
            .iter()
            .position(|q| q.media_source_id == media_source_id)
            .ok_or(CollabError::NotInQueue)?;

        let song = station.queue.remove(position);
        let new_index = new_index.min(station.queue.len());
        station.queue.insert(new_index, song);

        self.context.database.update_station(&station).await?;
        self.publish(BusMessage::QueueUpdate(station.id.clone()))
            .await
    }

    /// Locks or unlocks the queue, returning whether it's now locked
    pub async fn toggle_lock(&self, actor: &Actor, station_id: &str) -> CollabResult<bool> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_community_station(actor, station_id).await?;

        station.locked = !station.locked;
        self.context.database.update_station(&station).await?;

        self.publish(BusMessage::QueueLockToggled {
            station_id: station.id.clone(),
            locked: station.locked,
        })
        .await?;

        Ok(station.locked)
    }

    /// Switches between playing the queue and playing the private playlist.
    /// An idle station starts playing from its new source right away.
    pub async fn update_party_mode(
        &self,
        actor: &Actor,
        station_id: &str,
        party_mode: bool,
    ) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_community_station(actor, station_id).await?;

        if station.party_mode == party_mode {
            return Ok(());
        }

        station.party_mode = party_mode;
        self.context.database.update_station(&station).await?;

        self.publish(BusMessage::UpdatePartyMode {
            station_id: station.id.clone(),
            party_mode,
        })
        .await?;

        let has_songs = match party_mode {
            true => !station.queue.is_empty(),
            false => station.private_playlist.is_some(),
        };

        if station.current_song.is_none() && has_songs {
            self.advance_locked(&mut station, AdvanceReason::NaturalEnd)
                .await?;
        }

        Ok(())
    }

    async fn community_station(&self, station_id: &str) -> CollabResult<StationData> {
        let station = self.context.database.station_by_id(station_id).await?;

        if station.kind != StationType::Community {
            return Err(CollabError::NotCommunity);
        }

        Ok(station)
    }

    pub(super) async fn controlled_community_station(
        &self,
        actor: &Actor,
        station_id: &str,
    ) -> CollabResult<StationData> {
        let station = self.community_station(station_id).await?;

        if !actor.is_owner_or_admin(&station) {
            return Err(CollabError::InsufficientPermissions);
        }

        Ok(station)
    }
}
