mod actor;
mod admission;
mod bus;
mod clock;
mod config;
mod scheduler;
mod station;
mod util;
mod visibility;
mod votes;

pub use actor::*;
pub use admission::*;
pub use bus::*;
pub use clock::*;
pub use config::*;
pub use scheduler::*;
pub use station::*;
pub use util::*;
pub use visibility::*;
pub use votes::*;
