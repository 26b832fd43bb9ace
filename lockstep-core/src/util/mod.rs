mod id;

pub use id::*;

/// Converts a duration in seconds to whole milliseconds.
pub fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.).round() as i64
}
