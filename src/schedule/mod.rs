//! Band-structured multi-statement schedules.
//!
//! - [`node`]: per-statement schedule maps and band decompositions
//! - [`handle`]: the reference-counted [`Schedule`] and its copy-on-write storage
//! - [`builder`]: assembling and sealing schedules
//! - [`query`]: depth-wise band queries, validation and sub-schedules
//! - [`mutate`]: merging, splitting, permuting, fusing, distributing and
//!   renumbering bands

pub mod node;
pub mod handle;
pub mod builder;
pub mod query;
pub mod mutate;

pub use node::{Band, BandId, ScheduleNode};
pub use handle::{BandIdAllocator, Schedule};
pub use builder::{BuilderState, ScheduleBuilder};
pub use query::{BandGroup, BandPresence};
