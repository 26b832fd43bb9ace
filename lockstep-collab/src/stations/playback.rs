use std::time::Duration;

use chrono::{DateTime, Utc};
use lockstep_core::{
    Actor, AdvanceReason, BusMessage, CurrentSong, MediaSourceId, StationData, StationId,
};
use log::{debug, error, info};

use crate::{auto_advance_task, CollabResult};

use super::StationManager;

/// Timers firing this close to the end of a song advance right away
const END_TOLERANCE: Duration = Duration::from_millis(100);
/// How long a failed auto-advance waits before trying again
const RETRY_DELAY: Duration = Duration::from_secs(1);

impl StationManager {
    pub async fn pause(&self, actor: &Actor, station_id: &str) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_station(actor, station_id).await?;

        station.clock.pause(Utc::now())?;
        self.context.database.update_station(&station).await?;

        self.context
            .scheduler
            .unschedule(&auto_advance_task(station_id));

        self.publish(BusMessage::Pause(station.id.clone())).await?;

        info!("Station {} paused", station.name);
        Ok(())
    }

    pub async fn resume(&self, actor: &Actor, station_id: &str) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_station(actor, station_id).await?;

        let now = Utc::now();
        station.clock.resume(now)?;
        self.context.database.update_station(&station).await?;

        self.schedule_auto_advance(&station, now);
        self.publish(BusMessage::Resume(station.id.clone())).await?;

        info!("Station {} resumed", station.name);
        Ok(())
    }

    /// Skips the current song, regardless of votes
    pub async fn force_skip(&self, actor: &Actor, station_id: &str) -> CollabResult<()> {
        let _lock = self.context.lock(station_id).await;
        let mut station = self.controlled_station(actor, station_id).await?;

        self.advance_locked(&mut station, AdvanceReason::ForceSkip)
            .await
    }

    /// Moves the station on to its next song.
    ///
    /// The caller must hold the station's lock and pass the latest record.
    pub(crate) async fn advance_locked(
        &self,
        station: &mut StationData,
        reason: AdvanceReason,
    ) -> CollabResult<()> {
        let now = Utc::now();
        let queue_length = station.queue.len();

        let next = self.next_song(station, reason).await?;
        station.set_current_song(next, now);

        self.context.database.update_station(station).await?;

        self.context
            .scheduler
            .unschedule(&auto_advance_task(&station.id));
        self.schedule_auto_advance(station, now);

        self.publish(BusMessage::NextSong(station.id.clone()))
            .await?;

        if station.queue.len() != queue_length {
            self.publish(BusMessage::QueueUpdate(station.id.clone()))
                .await?;
        }

        match &station.current_song {
            Some(song) => info!(
                "Station {} is now playing {} ({})",
                station.name, song.title, reason
            ),
            None => info!("Station {} ran out of songs ({})", station.name, reason),
        }

        Ok(())
    }

    /// Picks the song that follows, taking it off the queue in party mode
    async fn next_song(
        &self,
        station: &mut StationData,
        reason: AdvanceReason,
    ) -> CollabResult<Option<CurrentSong>> {
        if station.party_mode {
            return Ok(station.pop_queue_head().map(CurrentSong::from));
        }

        let Some(playlist_id) = &station.private_playlist else {
            return Ok(None);
        };

        let songs = self.context.database.playlist_songs(playlist_id).await?;

        if songs.is_empty() {
            station.current_song_index = None;
            return Ok(None);
        }

        let index = match (reason, station.current_song_index) {
            (AdvanceReason::PlaylistReselect, _) | (_, None) => 0,
            (_, Some(index)) => (index + 1) % songs.len(),
        };

        station.current_song_index = Some(index);

        Ok(songs
            .into_iter()
            .nth(index)
            .map(|song| CurrentSong::from_song(song, None)))
    }

    /// Schedules the station to advance once its song ends. Paused or idle stations are left alone.
    pub(crate) fn schedule_auto_advance(&self, station: &StationData, now: DateTime<Utc>) {
        let Some(remaining) = station.time_until_end(now) else {
            return;
        };

        let Some(song) = &station.current_song else {
            return;
        };

        self.schedule_song_end(
            station.id.clone(),
            song.media_source_id.clone(),
            station.clock.started_at(),
            remaining,
        );
    }

    /// Checks on the song of a station after `delay`
    fn schedule_song_end(
        &self,
        station_id: StationId,
        media_source_id: MediaSourceId,
        started_at: DateTime<Utc>,
        delay: Duration,
    ) {
        let manager = self.clone();
        let task = auto_advance_task(&station_id);

        self.context.scheduler.schedule(task, delay, async move {
            manager
                .handle_auto_advance(&station_id, media_source_id, started_at)
                .await
        });
    }

    /// Runs when a song should have ended. A failed attempt is tried again later,
    /// since nothing else would move the station along.
    async fn handle_auto_advance(
        &self,
        station_id: &StationId,
        media_source_id: MediaSourceId,
        started_at: DateTime<Utc>,
    ) {
        let _lock = self.context.lock(station_id).await;

        let Err(e) = self
            .advance_if_ended(station_id, &media_source_id, started_at)
            .await
        else {
            return;
        };

        // A timer set by a partially successful advance belongs to the next song
        if self
            .context
            .scheduler
            .is_scheduled(&auto_advance_task(station_id))
        {
            error!("Failed to announce the next song of station {}: {}", station_id, e);
            return;
        }

        error!(
            "Failed to advance station {}, retrying in {:?}: {}",
            station_id, RETRY_DELAY, e
        );

        self.schedule_song_end(station_id.clone(), media_source_id, started_at, RETRY_DELAY);
    }

    /// Advances the station if its song is over. The timer may be stale, since another process
    /// could have changed the song or paused the station since it was scheduled.
    async fn advance_if_ended(
        &self,
        station_id: &StationId,
        media_source_id: &str,
        started_at: DateTime<Utc>,
    ) -> CollabResult<()> {
        let mut station = match self.context.database.station_by_id(station_id).await {
            Ok(station) => station,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let same_song = station.is_current(media_source_id)
            && station.clock.started_at() == started_at;

        if !same_song {
            debug!("Dropping stale timer of station {}", station_id);
            return Ok(());
        }

        match station.time_until_end(Utc::now()) {
            None => Ok(()),
            Some(remaining) if remaining > END_TOLERANCE => {
                // The song was paused and resumed elsewhere, so it ends later
                self.schedule_auto_advance(&station, Utc::now());
                Ok(())
            }
            Some(_) => {
                self.advance_locked(&mut station, AdvanceReason::NaturalEnd)
                    .await
            }
        }
    }

    /// Picks up where every station left off, after the process starts
    pub async fn restore(&self) -> CollabResult<()> {
        let stations = self.context.database.list_stations().await?;
        let now = Utc::now();

        for station in stations {
            let _lock = self.context.lock(&station.id).await;

            // Listeners joining later go straight to the song's room
            let media_source_id = station.current_song.as_ref().map(|s| s.media_source_id.clone());
            self.context
                .rooms
                .switch_song_room(&station.id, media_source_id);

            match station.time_until_end(now) {
                Some(remaining) if remaining.is_zero() => {
                    let mut station = station;
                    self.advance_locked(&mut station, AdvanceReason::NaturalEnd)
                        .await?;
                }
                Some(_) => self.schedule_auto_advance(&station, now),
                None => {}
            }
        }

        info!("Restored stations");
        Ok(())
    }
}
