use crate::{Actor, Privacy, StationData};

/// Returns true if the actor may see and join the station.
///
/// Public and unlisted stations are open to anyone who knows where they are.
/// Private stations are restricted to the owner and administrators.
pub fn can_view(station: &StationData, actor: &Actor) -> bool {
    match station.privacy {
        Privacy::Public | Privacy::Unlisted => true,
        Privacy::Private => actor.is_owner_or_admin(station),
    }
}

/// Returns true if the station should show up in the actor's home listing.
///
/// Unlisted stations are only listed for their owner and administrators,
/// and `hide_unlisted` removes them for administrators too.
pub fn is_listed(station: &StationData, actor: &Actor, hide_unlisted: bool) -> bool {
    if !can_view(station, actor) {
        return false;
    }

    match station.privacy {
        Privacy::Public => true,
        Privacy::Unlisted => {
            actor.is_owner_of(station) || (actor.admin && !hide_unlisted)
        }
        Privacy::Private => true,
    }
}

/// Filters a list of stations down to what the actor's home listing shows
pub fn list_for_home<'a, I>(stations: I, actor: &Actor, hide_unlisted: bool) -> Vec<&'a StationData>
where
    I: IntoIterator<Item = &'a StationData>,
{
    stations
        .into_iter()
        .filter(|s| is_listed(s, actor, hide_unlisted))
        .collect()
}

#[cfg(test)]
mod test {
    use super::{can_view, is_listed, list_for_home};
    use crate::{station::mock, Actor, Privacy, StationType};

    #[test]
    fn private_community_stations_are_hidden_from_strangers() {
        let station = mock::station(StationType::Community, Privacy::Private, Some("owner"));

        let stranger = Actor::user("stranger");
        let owner = Actor::user("owner");
        let admin = Actor::admin("admin");

        assert!(!can_view(&station, &stranger));
        assert!(!can_view(&station, &Actor::anonymous()));
        assert!(can_view(&station, &owner));
        assert!(can_view(&station, &admin));

        assert!(list_for_home([&station], &stranger, false).is_empty());
        assert_eq!(list_for_home([&station], &owner, false).len(), 1);
    }

    #[test]
    fn private_official_stations_are_admin_only() {
        let station = mock::station(StationType::Official, Privacy::Private, None);

        assert!(!can_view(&station, &Actor::user("someone")));
        assert!(can_view(&station, &Actor::admin("admin")));
    }

    #[test]
    fn unlisted_stations_are_joinable_but_not_listed() {
        let station = mock::station(StationType::Community, Privacy::Unlisted, Some("owner"));
        let stranger = Actor::user("stranger");
        let admin = Actor::admin("admin");

        assert!(can_view(&station, &stranger));
        assert!(!is_listed(&station, &stranger, false));
        assert!(is_listed(&station, &Actor::user("owner"), true));
        assert!(is_listed(&station, &admin, false));
        assert!(!is_listed(&station, &admin, true));
    }

    #[test]
    fn public_stations_are_listed_for_everyone() {
        let station = mock::community("owner");

        assert!(is_listed(&station, &Actor::anonymous(), true));
    }
}
