use lockstep_core::{quorum, record_vote, Actor, AdvanceReason, BusMessage, VoteError};
use log::info;

use crate::{CollabError, CollabResult, RoomLookup, RoomName};

use super::StationManager;

/// The result of a skip vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub votes: usize,
    /// Votes needed given the listeners of this process
    pub needed: usize,
    /// True if the vote reached the quorum and the song was skipped
    pub skipped: bool,
}

impl StationManager {
    /// Votes to skip the current song. Only listeners of the station on this process may vote.
    pub async fn vote_skip(&self, actor: &Actor, station_id: &str) -> CollabResult<VoteOutcome> {
        let user_id = actor.user_id.clone().ok_or(VoteError::NotLoggedIn)?;
        let room = RoomName::Station(station_id.to_string());

        if !self.context.rooms.has_user(&user_id, &room) {
            return Err(CollabError::NotListening);
        }

        let _lock = self.context.lock(station_id).await;
        let mut station = self.station(actor, station_id).await?;

        let votes = record_vote(&mut station, &user_id)?;
        self.context.database.update_station(&station).await?;
        self.publish(BusMessage::VoteSkipSong(station.id.clone()))
            .await?;

        // Listeners elsewhere are unknown here, so the quorum is an estimate
        let listeners = self.context.rooms.users_in(&room).len();
        let needed = quorum(listeners, station.skip_vote_threshold);
        let skipped = votes >= needed;

        if skipped {
            info!(
                "Skip vote passed on {} with {} of {} listeners",
                station.name, votes, listeners
            );

            self.advance_locked(&mut station, AdvanceReason::VoteQuorum)
                .await?;
        }

        Ok(VoteOutcome {
            votes,
            needed,
            skipped,
        })
    }
}

#[cfg(test)]
mod test {
    use lockstep_core::{Actor, VoteError};

    use crate::{stations::mock::setup, CollabError, Database};

    #[tokio::test]
    async fn every_listener_has_to_agree_by_default() {
        let setup = setup();
        let station = setup.community("owner").await;
        setup.add_songs(&[("a", 100.), ("b", 100.)]);

        let first = Actor::user("first");
        let second = Actor::user("second");
        let mut connections = vec![];

        for actor in [&first, &second] {
            let connection = setup.collab.connect(actor.clone());
            setup
                .collab
                .stations
                .join(actor, connection.id(), &station.id)
                .await
                .unwrap();

            connections.push(connection);
        }

        for (actor, id) in [(&first, "a"), (&second, "b")] {
            setup
                .collab
                .stations
                .add_to_queue(actor, &station.id, id)
                .await
                .unwrap();
        }

        let outcome = setup.collab.stations.vote_skip(&first, &station.id).await.unwrap();
        assert_eq!((outcome.votes, outcome.needed, outcome.skipped), (1, 2, false));

        let again = setup.collab.stations.vote_skip(&first, &station.id).await;
        assert!(matches!(again, Err(CollabError::Vote(VoteError::AlreadyVoted))));

        let stored = setup.database.station_by_id(&station.id).await.unwrap();
        assert_eq!(stored.current_song.unwrap().skip_votes.len(), 1);

        let outcome = setup.collab.stations.vote_skip(&second, &station.id).await.unwrap();
        assert!(outcome.skipped);

        let stored = setup.database.station_by_id(&station.id).await.unwrap();
        let current = stored.current_song.unwrap();
        assert_eq!(current.media_source_id, "b");
        assert!(current.skip_votes.is_empty());
    }

    #[tokio::test]
    async fn only_listeners_may_vote() {
        let setup = setup();
        let station = setup.community("owner").await;

        let anonymous = setup.collab.stations.vote_skip(&Actor::anonymous(), &station.id).await;
        assert!(matches!(anonymous, Err(CollabError::Vote(VoteError::NotLoggedIn))));

        let absent = setup.collab.stations.vote_skip(&Actor::user("u"), &station.id).await;
        assert!(matches!(absent, Err(CollabError::NotListening)));
    }
}
