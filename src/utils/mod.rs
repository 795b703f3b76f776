//! Utility modules shared by the schedule layers.
//!
//! - Error types
//! - Schedule printing and point enumeration

pub mod errors;
pub mod poly_print;

// Re-exports
pub use errors::*;
pub use poly_print::{enumerate_points, SchedulePrinter};
