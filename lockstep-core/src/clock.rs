use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{seconds_to_millis, CurrentSong};

/// Tracks how far into the current song a station is, without drifting across pauses.
///
/// Elapsed time is always derived from wall clock instants, so every process
/// reading the same record computes the same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PlaybackClock {
    #[serde(rename_all = "camelCase")]
    Playing {
        /// When the current song began
        started_at: DateTime<Utc>,
        /// Milliseconds spent paused since `started_at`
        time_paused: i64,
    },
    #[serde(rename_all = "camelCase")]
    Paused {
        started_at: DateTime<Utc>,
        time_paused: i64,
        /// When the pause began
        paused_at: DateTime<Utc>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("already paused")]
    AlreadyPaused,
    #[error("not paused")]
    NotPaused,
}

impl PlaybackClock {
    /// A clock that starts playing now
    pub fn start(now: DateTime<Utc>) -> Self {
        Self::Playing {
            started_at: now,
            time_paused: 0,
        }
    }

    /// Restarts the clock for a new song. A paused clock stays paused at offset zero.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        *self = match self {
            Self::Playing { .. } => Self::start(now),
            Self::Paused { .. } => Self::Paused {
                started_at: now,
                time_paused: 0,
                paused_at: now,
            },
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), ClockError> {
        match *self {
            Self::Paused { .. } => Err(ClockError::AlreadyPaused),
            Self::Playing {
                started_at,
                time_paused,
            } => {
                *self = Self::Paused {
                    started_at,
                    time_paused,
                    paused_at: now,
                };

                Ok(())
            }
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), ClockError> {
        match *self {
            Self::Playing { .. } => Err(ClockError::NotPaused),
            Self::Paused {
                started_at,
                time_paused,
                paused_at,
            } => {
                let paused_for = (now - paused_at).num_milliseconds().max(0);

                *self = Self::Playing {
                    started_at,
                    time_paused: time_paused + paused_for,
                };

                Ok(())
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match *self {
            Self::Playing { started_at, .. } | Self::Paused { started_at, .. } => started_at,
        }
    }

    pub fn time_paused(&self) -> i64 {
        match *self {
            Self::Playing { time_paused, .. } | Self::Paused { time_paused, .. } => time_paused,
        }
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Playing { .. } => None,
            Self::Paused { paused_at, .. } => Some(paused_at),
        }
    }

    /// Milliseconds of the current song that have played. Frozen while paused.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let until = self.paused_at().unwrap_or(now);
        let elapsed = (until - self.started_at()).num_milliseconds() - self.time_paused();

        elapsed.max(0)
    }

    /// Time left before the song should advance on its own
    pub fn remaining(&self, now: DateTime<Utc>, song: &CurrentSong) -> Duration {
        let length = seconds_to_millis(song.duration) - seconds_to_millis(song.skip_duration);
        let remaining = length - self.elapsed_ms(now);

        Duration::from_millis(remaining.max(0) as u64)
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Duration, Utc};

    use super::{ClockError, PlaybackClock};
    use crate::{station::mock, CurrentSong};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(seconds)
    }

    #[test]
    fn pause_then_resume_conserves_elapsed() {
        let mut clock = PlaybackClock::start(at(0));

        clock.pause(at(40)).unwrap();
        assert_eq!(clock.elapsed_ms(at(40)), 40_000);
        // Frozen while paused
        assert_eq!(clock.elapsed_ms(at(100)), 40_000);

        clock.resume(at(100)).unwrap();
        assert_eq!(clock.time_paused(), 60_000);
        assert_eq!(clock.elapsed_ms(at(100)), 40_000);
        assert_eq!(clock.elapsed_ms(at(110)), 50_000);
    }

    #[test]
    fn paused_time_accumulates_over_cycles() {
        let mut clock = PlaybackClock::start(at(0));

        clock.pause(at(10)).unwrap();
        clock.resume(at(15)).unwrap();
        clock.pause(at(20)).unwrap();
        clock.resume(at(30)).unwrap();

        assert_eq!(clock.time_paused(), 15_000);
        assert_eq!(clock.elapsed_ms(at(30)), 15_000);
    }

    #[test]
    fn transitions_are_guarded() {
        let mut clock = PlaybackClock::start(at(0));

        assert_eq!(clock.resume(at(1)), Err(ClockError::NotPaused));
        clock.pause(at(2)).unwrap();
        assert_eq!(clock.pause(at(3)), Err(ClockError::AlreadyPaused));
        assert_eq!(clock.paused_at(), Some(at(2)));
    }

    #[test]
    fn remaining_accounts_for_skip_duration() {
        let mut song = CurrentSong::from_song(mock::song("a", 200.), None);
        song.skip_duration = 20.;

        let mut clock = PlaybackClock::start(at(0));
        clock.pause(at(50)).unwrap();
        clock.resume(at(80)).unwrap();

        // 200 - 20 - 50
        assert_eq!(clock.remaining(at(80), &song).as_secs(), 130);
        assert_eq!(clock.remaining(at(1000), &song).as_secs(), 0);
    }

    #[test]
    fn restarting_a_paused_clock_keeps_it_paused() {
        let mut clock = PlaybackClock::start(at(0));
        clock.pause(at(5)).unwrap();
        clock.restart(at(60));

        assert!(clock.is_paused());
        assert_eq!(clock.elapsed_ms(at(90)), 0);

        clock.resume(at(90)).unwrap();
        assert_eq!(clock.elapsed_ms(at(95)), 5_000);
    }
}
