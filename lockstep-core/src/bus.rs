use serde::{Deserialize, Serialize};

use crate::{PlaylistId, Privacy, StationId, UserId};

/// A change notification published on the bus after the station record was written.
///
/// Payloads are kept minimal; subscribers re-read the station for anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum BusMessage {
    #[serde(rename = "station.create")]
    Create(StationId),
    /// Carries what's needed to route the notice, since the record is gone by the time it arrives
    #[serde(rename = "station.remove", rename_all = "camelCase")]
    Remove {
        station_id: StationId,
        privacy: Privacy,
        owner: Option<UserId>,
    },
    #[serde(rename = "station.pause")]
    Pause(StationId),
    #[serde(rename = "station.resume")]
    Resume(StationId),
    #[serde(rename = "station.nextSong")]
    NextSong(StationId),
    #[serde(rename = "station.queueUpdate")]
    QueueUpdate(StationId),
    #[serde(rename = "station.queueLockToggled", rename_all = "camelCase")]
    QueueLockToggled { station_id: StationId, locked: bool },
    #[serde(rename = "station.voteSkipSong")]
    VoteSkipSong(StationId),
    #[serde(rename = "station.updatePartyMode", rename_all = "camelCase")]
    UpdatePartyMode {
        station_id: StationId,
        party_mode: bool,
    },
    #[serde(rename = "station.updateUsers")]
    UpdateUsers(StationId),
    #[serde(rename = "station.updateUserCount")]
    UpdateUserCount(StationId),
    #[serde(rename = "privatePlaylist.selected", rename_all = "camelCase")]
    PrivatePlaylistSelected {
        station_id: StationId,
        playlist_id: PlaylistId,
    },
}

impl BusMessage {
    /// The name of the channel the message is published on
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Create(_) => "station.create",
            Self::Remove { .. } => "station.remove",
            Self::Pause(_) => "station.pause",
            Self::Resume(_) => "station.resume",
            Self::NextSong(_) => "station.nextSong",
            Self::QueueUpdate(_) => "station.queueUpdate",
            Self::QueueLockToggled { .. } => "station.queueLockToggled",
            Self::VoteSkipSong(_) => "station.voteSkipSong",
            Self::UpdatePartyMode { .. } => "station.updatePartyMode",
            Self::UpdateUsers(_) => "station.updateUsers",
            Self::UpdateUserCount(_) => "station.updateUserCount",
            Self::PrivatePlaylistSelected { .. } => "privatePlaylist.selected",
        }
    }

    /// The station the message is about
    pub fn station_id(&self) -> &StationId {
        match self {
            Self::Create(id)
            | Self::Pause(id)
            | Self::Resume(id)
            | Self::NextSong(id)
            | Self::QueueUpdate(id)
            | Self::VoteSkipSong(id)
            | Self::UpdateUsers(id)
            | Self::UpdateUserCount(id) => id,
            Self::Remove { station_id, .. }
            | Self::QueueLockToggled { station_id, .. }
            | Self::UpdatePartyMode { station_id, .. }
            | Self::PrivatePlaylistSelected { station_id, .. } => station_id,
        }
    }
}

#[cfg(test)]
mod test {
    use super::BusMessage;

    #[test]
    fn messages_are_tagged_with_their_channel() {
        let message = BusMessage::QueueLockToggled {
            station_id: "abc".to_string(),
            locked: true,
        };

        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["channel"], message.channel());
        assert_eq!(json["payload"]["stationId"], "abc");
        assert_eq!(json["payload"]["locked"], true);

        let plain = serde_json::to_value(BusMessage::Pause("abc".to_string())).unwrap();
        assert_eq!(plain["channel"], "station.pause");
        assert_eq!(plain["payload"], "abc");
    }
}
