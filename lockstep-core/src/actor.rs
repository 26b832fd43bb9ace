use crate::{StationData, StationType, UserId};

/// Whoever is performing an action, resolved by the permission service beforehand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    /// The user behind the actor, if logged in
    pub user_id: Option<UserId>,
    /// Whether the user has the administrator role
    pub admin: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            admin: false,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            admin: true,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Returns true if the actor owns the station. Official stations have no owner.
    pub fn is_owner_of(&self, station: &StationData) -> bool {
        match (&self.user_id, &station.owner) {
            (Some(user_id), Some(owner)) => {
                station.kind == StationType::Community && user_id == owner
            }
            _ => false,
        }
    }

    /// Owners may control community stations, official stations are admin only.
    pub fn is_owner_or_admin(&self, station: &StationData) -> bool {
        self.admin || self.is_owner_of(station)
    }
}
