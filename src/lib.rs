//! # PolySched - Band-Structured Affine Schedules
//!
//! A representation layer for multi-statement polyhedral schedules:
//! - Per-statement affine schedule maps into a shared time space
//! - Band decomposition of the schedule coordinates, with cross-statement
//!   band ids
//! - Reference-counted schedules with copy-on-write mutation
//! - Depth-wise band queries for code generators
//! - Invariant-preserving band merging, splitting, fusion, distribution
//!   and renumbering
//!
//! ## Architecture
//!
//! ```text
//! scheduler output → ScheduleBuilder → Schedule (sealed) → queries / copy-on-write mutations
//! ```
//!
//! ## Example
//!
//! ```rust
//! use polysched::prelude::*;
//!
//! let mut builder = ScheduleBuilder::new(ParameterSpace::new(["N"]));
//! builder.append_node(AffineMap::identity(2, 1), &[1, 2], &[BandId(0), BandId(1)])?;
//! builder.append_node(AffineMap::sequenced(1, 1, 0), &[2], &[BandId(0)])?;
//! let schedule = builder.seal()?;
//!
//! assert!(schedule.is_common_band(0)?);
//! assert_eq!(schedule.partition_at_depth(0)?.len(), 1);
//! # Ok::<(), polysched::ScheduleError>(())
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod polyhedral;
pub mod schedule;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::config::{CommonBandPolicy, MergeIdPolicy, ScheduleOptions};
    pub use crate::polyhedral::{
        AffineExpr, AffineMap, Constraint, IntegerSet, ParameterSpace,
    };
    pub use crate::schedule::{
        Band, BandGroup, BandId, BandPresence, BuilderState, Schedule, ScheduleBuilder,
        ScheduleNode,
    };
    pub use crate::utils::errors::{ErrorCategory, ScheduleError, ScheduleResult, Violation};
}

pub use schedule::{Schedule, ScheduleBuilder};
pub use utils::errors::{ScheduleError, ScheduleResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
