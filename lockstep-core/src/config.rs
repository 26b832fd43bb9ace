use std::time::Duration;

/// Limits and tuning for the station synchronization core
#[derive(Debug, Clone)]
pub struct Config {
    /// The maximum total length of a station's queue, including the current song
    pub queue_capacity_in_seconds: f64,
    /// The maximum total length of the songs a single user may have queued
    pub max_duration_per_user_in_seconds: f64,
    /// The maximum amount of songs a single user may have queued
    pub max_songs_per_user: usize,
    /// How many songs by the same user may sit next to each other at the end of the queue
    pub max_consecutive_songs_per_user: usize,
    /// Percentage of listeners that have to vote before a song is skipped
    pub default_skip_vote_threshold: u8,
    /// Station names that cannot be used
    pub reserved_names: Vec<String>,
    /// How many bus messages a slow subscriber may fall behind before it lags
    pub bus_capacity: usize,
}

impl Config {
    pub fn queue_capacity(&self) -> Duration {
        Duration::from_secs_f64(self.queue_capacity_in_seconds)
    }

    pub fn max_duration_per_user(&self) -> Duration {
        Duration::from_secs_f64(self.max_duration_per_user_in_seconds)
    }

    /// Returns true if the name is reserved
    pub fn is_reserved_name(&self, name: &str) -> bool {
        self.reserved_names.iter().any(|r| r.eq_ignore_ascii_case(name))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // 3 hours
            queue_capacity_in_seconds: 60. * 60. * 3.,
            // 15 minutes
            max_duration_per_user_in_seconds: 60. * 15.,
            max_songs_per_user: 3,
            max_consecutive_songs_per_user: 2,
            // Everyone listening has to agree
            default_skip_vote_threshold: 100,
            reserved_names: [
                "musare", "news", "home", "login", "register", "admin", "settings", "profile",
                "station", "stations", "api", "404", "500",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            bus_capacity: 1024,
        }
    }
}
