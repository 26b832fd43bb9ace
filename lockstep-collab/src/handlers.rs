use chrono::Utc;
use lockstep_core::{quorum, BusMessage, Privacy, StationData, StationId, UserId};
use log::{debug, error, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::{ClientEvent, CollabContext, RoomLookup, RoomName};

/// An event to send to every connection of a room
#[derive(Debug, Clone)]
pub struct Delivery {
    pub room: RoomName,
    pub event: ClientEvent,
}

/// Changes to this process' local state a message calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Drops the room, after its members were notified
    CloseRoom(RoomName),
    /// Cancels the pending auto-advance of a station on this process
    Unschedule(StationId),
    /// Moves the station's listeners to the room of its current song
    SwitchSongRoom {
        station_id: StationId,
        media_source_id: Option<String>,
    },
}

/// What a process does in response to a bus message
#[derive(Debug, Default)]
pub struct Reaction {
    pub deliveries: Vec<Delivery>,
    pub effects: Vec<Effect>,
}

impl Reaction {
    fn deliver(&mut self, room: RoomName, event: ClientEvent) {
        self.deliveries.push(Delivery { room, event })
    }

    /// Delivers to the rooms allowed to know about the station in listings.
    /// Private and unlisted stations only reach their owner and administrators.
    fn deliver_to_watchers(&mut self, station: &StationData, event: ClientEvent) {
        self.deliver_to_audience(station.privacy, station.owner.as_ref(), event)
    }

    fn deliver_to_audience(&mut self, privacy: Privacy, owner: Option<&UserId>, event: ClientEvent) {
        match (privacy, owner) {
            (Privacy::Public, _) => self.deliver(RoomName::Home, event.clone()),
            (_, Some(owner)) => self.deliver(RoomName::User(owner.clone()), event.clone()),
            _ => {}
        }

        self.deliver(RoomName::AdminStations, event)
    }
}

/// Decides how this process reacts to a bus message.
///
/// `station` is the record as re-read after receiving the message, absent if it no longer exists.
pub fn handle(message: &BusMessage, station: Option<&StationData>, rooms: &impl RoomLookup) -> Reaction {
    let mut reaction = Reaction::default();
    let station_id = message.station_id().clone();
    let station_room = RoomName::Station(station_id.clone());

    if let BusMessage::Remove { privacy, owner, .. } = message {
        let event = ClientEvent::StationRemoved {
            station_id: station_id.clone(),
        };

        reaction.deliver(station_room.clone(), event.clone());
        reaction.deliver_to_audience(*privacy, owner.as_ref(), event);

        reaction.effects.push(Effect::Unschedule(station_id));
        reaction.effects.push(Effect::CloseRoom(station_room));

        return reaction;
    }

    // Anything else about a station that's gone by now is stale
    let Some(station) = station else {
        return reaction;
    };

    let now = Utc::now();

    match message {
        BusMessage::Create(_) => {
            reaction.deliver_to_watchers(
                station,
                ClientEvent::StationCreated {
                    station: station.clone(),
                },
            );
        }
        BusMessage::Pause(_) => {
            reaction.deliver(
                station_room,
                ClientEvent::StationPaused {
                    station_id: station_id.clone(),
                    time: station.current_time(now),
                },
            );

            // A resume may have come in since, in which case the timer is current
            if station.clock.is_paused() {
                reaction.effects.push(Effect::Unschedule(station_id));
            }
        }
        BusMessage::Resume(_) => {
            reaction.deliver(
                station_room,
                ClientEvent::StationResumed {
                    station_id,
                    time: station.current_time(now),
                },
            );
        }
        BusMessage::NextSong(_) => {
            reaction.deliver(
                station_room,
                ClientEvent::NextSong {
                    station_id: station_id.clone(),
                    time: station.current_time(now),
                },
            );

            reaction.effects.push(Effect::SwitchSongRoom {
                station_id,
                media_source_id: station
                    .current_song
                    .as_ref()
                    .map(|s| s.media_source_id.clone()),
            });
        }
        BusMessage::QueueUpdate(_) => {
            reaction.deliver(
                station_room,
                ClientEvent::QueueUpdated {
                    station_id,
                    queue: station.queue.clone(),
                },
            );
        }
        BusMessage::QueueLockToggled { locked, .. } => {
            reaction.deliver(
                station_room,
                ClientEvent::QueueLockToggled {
                    station_id,
                    locked: *locked,
                },
            );
        }
        BusMessage::VoteSkipSong(_) => {
            let votes = station
                .current_song
                .as_ref()
                .map(|s| s.skip_votes.len())
                .unwrap_or(0);

            let listeners = rooms.users_in(&station_room).len();

            reaction.deliver(
                station_room,
                ClientEvent::SkipVoted {
                    station_id,
                    votes,
                    needed: quorum(listeners, station.skip_vote_threshold),
                },
            );
        }
        BusMessage::UpdatePartyMode { party_mode, .. } => {
            reaction.deliver(
                station_room,
                ClientEvent::PartyModeUpdated {
                    station_id,
                    party_mode: *party_mode,
                },
            );
        }
        BusMessage::UpdateUsers(_) => {
            let event = ClientEvent::UsersUpdated {
                station_id,
                users: rooms.users_in(&station_room).into_iter().collect(),
                anonymous: rooms.anonymous_count(&station_room),
            };

            reaction.deliver(station_room, event.clone());
            reaction.deliver(RoomName::AdminStations, event);
        }
        BusMessage::UpdateUserCount(_) => {
            let event = ClientEvent::UserCountUpdated {
                station_id,
                count: rooms.connection_count(&station_room),
            };

            reaction.deliver(station_room, event.clone());
            reaction.deliver_to_watchers(station, event);
        }
        BusMessage::PrivatePlaylistSelected { playlist_id, .. } => {
            let event = ClientEvent::PrivatePlaylistSelected {
                station_id,
                playlist_id: playlist_id.clone(),
            };

            if let Some(owner) = &station.owner {
                reaction.deliver(RoomName::User(owner.clone()), event.clone());
            }

            reaction.deliver(RoomName::AdminStations, event);
        }
        BusMessage::Remove { .. } => {}
    }

    reaction
}

/// Applies a reaction to the rooms and timers of this process
pub fn apply(context: &CollabContext, reaction: Reaction) {
    for delivery in reaction.deliveries {
        context.rooms.send_to_room(&delivery.room, delivery.event);
    }

    for effect in reaction.effects {
        match effect {
            Effect::CloseRoom(room) => context.rooms.remove_room(&room),
            Effect::Unschedule(station_id) => {
                context.scheduler.unschedule(&auto_advance_task(&station_id));
            }
            Effect::SwitchSongRoom {
                station_id,
                media_source_id,
            } => context.rooms.switch_song_room(&station_id, media_source_id),
        }
    }
}

/// The name of the task that advances a station when its song ends
pub(crate) fn auto_advance_task(station_id: &str) -> String {
    format!("stations.nextSong.{}", station_id)
}

/// Reacts to bus messages until the bus closes
pub async fn dispatch(context: CollabContext, mut receiver: Receiver<BusMessage>) {
    loop {
        let message = match receiver.recv().await {
            Ok(m) => m,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Bus subscriber fell behind, {} messages were lost", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        debug!("Handling {} for {}", message.channel(), message.station_id());

        let station = match context.database.station_by_id(message.station_id()).await {
            Ok(station) => Some(station),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                error!("Failed to read station for {}: {}", message.channel(), e);
                continue;
            }
        };

        let reaction = handle(&message, station.as_ref(), context.rooms.as_ref());
        apply(&context, reaction);
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use lockstep_core::{
        BusMessage, Config, CurrentSong, NewStation, Privacy, Song, StationData, StationType,
        UserId,
    };

    use super::{handle, Effect};
    use crate::{ClientEvent, RoomLookup, RoomName};

    /// Pretends a fixed set of users is in every room
    struct Listeners(Vec<&'static str>);

    impl RoomLookup for Listeners {
        fn users_in(&self, _: &RoomName) -> BTreeSet<UserId> {
            self.0.iter().map(|u| u.to_string()).collect()
        }

        fn connection_count(&self, _: &RoomName) -> usize {
            self.0.len() + 1
        }

        fn anonymous_count(&self, _: &RoomName) -> usize {
            1
        }
    }

    fn station(privacy: Privacy) -> StationData {
        StationData::new(
            "s".to_string(),
            NewStation {
                kind: StationType::Community,
                privacy,
                name: "station".to_string(),
                display_name: "Station".to_string(),
                description: String::new(),
            },
            Some("owner".to_string()),
            &Config::default(),
            Utc::now(),
        )
    }

    fn rooms_of(reaction: &super::Reaction) -> Vec<RoomName> {
        reaction.deliveries.iter().map(|d| d.room.clone()).collect()
    }

    #[test]
    fn private_viewer_counts_only_reach_owner_and_admins() {
        let station = station(Privacy::Private);
        let message = BusMessage::UpdateUserCount("s".to_string());

        let reaction = handle(&message, Some(&station), &Listeners(vec!["a"]));

        assert_eq!(
            rooms_of(&reaction),
            vec![
                RoomName::Station("s".to_string()),
                RoomName::User("owner".to_string()),
                RoomName::AdminStations
            ]
        );
        assert!(matches!(
            reaction.deliveries[0].event,
            ClientEvent::UserCountUpdated { count: 2, .. }
        ));
    }

    #[test]
    fn public_stations_are_announced_on_home() {
        let station = station(Privacy::Public);
        let reaction = handle(&BusMessage::Create("s".to_string()), Some(&station), &Listeners(vec![]));

        assert_eq!(rooms_of(&reaction), vec![RoomName::Home, RoomName::AdminStations]);
    }

    #[test]
    fn removal_notifies_listeners_and_closes_the_room() {
        let message = BusMessage::Remove {
            station_id: "s".to_string(),
            privacy: Privacy::Public,
            owner: Some("owner".to_string()),
        };
        let reaction = handle(&message, None, &Listeners(vec![]));

        assert!(rooms_of(&reaction).contains(&RoomName::Station("s".to_string())));
        assert_eq!(
            reaction.effects,
            vec![
                Effect::Unschedule("s".to_string()),
                Effect::CloseRoom(RoomName::Station("s".to_string()))
            ]
        );
    }

    #[test]
    fn removing_a_private_station_stays_off_the_home_room() {
        let message = BusMessage::Remove {
            station_id: "s".to_string(),
            privacy: Privacy::Private,
            owner: Some("owner".to_string()),
        };
        let reaction = handle(&message, None, &Listeners(vec![]));

        assert_eq!(
            rooms_of(&reaction),
            vec![
                RoomName::Station("s".to_string()),
                RoomName::User("owner".to_string()),
                RoomName::AdminStations
            ]
        );
    }

    #[test]
    fn messages_about_missing_stations_are_dropped() {
        let reaction = handle(&BusMessage::Pause("s".to_string()), None, &Listeners(vec![]));

        assert!(reaction.deliveries.is_empty());
        assert!(reaction.effects.is_empty());
    }

    #[test]
    fn pause_unschedules_only_while_still_paused() {
        let mut station = station(Privacy::Public);
        let message = BusMessage::Pause("s".to_string());

        let playing = handle(&message, Some(&station), &Listeners(vec![]));
        assert!(playing.effects.is_empty());

        station.clock.pause(Utc::now()).unwrap();

        let paused = handle(&message, Some(&station), &Listeners(vec![]));
        assert_eq!(paused.effects, vec![Effect::Unschedule("s".to_string())]);
    }

    #[test]
    fn next_song_moves_listeners_to_the_new_song_room() {
        let mut station = station(Privacy::Public);
        let song = Song {
            media_source_id: "m".to_string(),
            title: "M".to_string(),
            duration: 100.,
            skip_duration: 0.,
        };

        station.set_current_song(Some(CurrentSong::from_song(song, None)), Utc::now());

        let reaction = handle(&BusMessage::NextSong("s".to_string()), Some(&station), &Listeners(vec![]));

        assert_eq!(
            reaction.effects,
            vec![Effect::SwitchSongRoom {
                station_id: "s".to_string(),
                media_source_id: Some("m".to_string())
            }]
        );
    }

    #[test]
    fn skip_votes_report_the_local_quorum() {
        let mut station = station(Privacy::Public);
        let song = Song {
            media_source_id: "m".to_string(),
            title: "M".to_string(),
            duration: 100.,
            skip_duration: 0.,
        };

        let mut current = CurrentSong::from_song(song, None);
        current.skip_votes.insert("a".to_string());
        station.set_current_song(Some(current), Utc::now());

        let reaction = handle(
            &BusMessage::VoteSkipSong("s".to_string()),
            Some(&station),
            &Listeners(vec!["a", "b", "c"]),
        );

        assert!(matches!(
            reaction.deliveries[0].event,
            ClientEvent::SkipVoted { votes: 1, needed: 3, .. }
        ));
    }
}
