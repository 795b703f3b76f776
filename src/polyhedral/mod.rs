//! Polyhedral data structures backing statement schedules.
//!
//! This module provides the affine layer the schedule builds on:
//! - Parameter spaces and map spaces
//! - Affine expressions and constraints
//! - Integer sets (statement domains)
//! - Affine maps (statement schedules)

pub mod space;
pub mod expr;
pub mod constraint;
pub mod set;
pub mod map;

pub use space::{ParameterSpace, Space};
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind};
pub use set::IntegerSet;
pub use map::AffineMap;
