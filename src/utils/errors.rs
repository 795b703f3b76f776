//! Error types for schedule construction, queries and mutation.
//!
//! Errors fall into three categories:
//! - validation errors, caused by malformed caller input;
//! - access errors, caused by programming mistakes (bad indices, released
//!   handles);
//! - invariant violations, which indicate a defect in the crate itself.

use thiserror::Error;
use std::fmt;

/// Top-level error type for schedule operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Band ends are not strictly increasing or do not close the time space
    #[error("invalid band boundary: {reason}")]
    InvalidBandBoundary { reason: String },

    /// Band ends and band ids have different lengths
    #[error("{ends} band ends but {ids} band ids")]
    BandIdArityMismatch { ends: usize, ids: usize },

    /// Schedule map is not a total, single-valued function on its domain
    #[error("schedule map is not functional: {reason}")]
    NonFunctionalMap { reason: String },

    /// Schedule map uses a different parameter count than the schedule
    #[error("schedule map has {found} parameters, schedule has {expected}")]
    ParameterMismatch { expected: usize, found: usize },

    /// Node output dimension disagrees with the schedule's coordinate count
    #[error("node {node} has {found} schedule coordinates, schedule has {expected}")]
    CoordinateMismatch { node: usize, expected: usize, found: usize },

    /// Merge range does not span at least two bands
    #[error("cannot merge bands {first}..={last}: range must span at least two bands")]
    NonContiguousMerge { first: usize, last: usize },

    /// Split coordinate is not strictly inside the band
    #[error("coordinate {coordinate} is not strictly inside band [{start}, {end})")]
    CoordinateNotInBand { coordinate: usize, start: usize, end: usize },

    /// Coordinate range does not start and end on band boundaries
    #[error("coordinate range [{lo}, {hi}) is not aligned to band boundaries")]
    RangeNotBandAligned { lo: usize, hi: usize },

    /// Band permutation is not a permutation of the band's coordinates
    #[error("{perm:?} is not a permutation of a band with {len} coordinates")]
    InvalidPermutation { perm: Vec<usize>, len: usize },

    /// Every band id up to `u32::MAX` has been handed out
    #[error("no fresh band id left: ids up to {} are taken", u32::MAX)]
    BandIdsExhausted,

    /// Builder has already produced its schedule
    #[error("schedule builder is already sealed")]
    BuilderSealed,

    /// Index past the end of a sequence
    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange { what: &'static str, index: usize, len: usize },

    /// Operation on a released schedule handle
    #[error("schedule handle used after release")]
    UseAfterFree,

    /// Internal consistency failure
    #[error("schedule invariants violated: {}", display_violations(.0))]
    InvariantViolation(Vec<Violation>),
}

/// Category of a [`ScheduleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input supplied by the caller
    Validation,
    /// Programming error: bad index or released handle
    Access,
    /// Internal defect
    Invariant,
}

impl ScheduleError {
    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScheduleError::IndexOutOfRange { .. } | ScheduleError::UseAfterFree => {
                ErrorCategory::Access
            }
            ScheduleError::InvariantViolation(_) => ErrorCategory::Invariant,
            _ => ErrorCategory::Validation,
        }
    }

    pub(crate) fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        ScheduleError::IndexOutOfRange { what, index, len }
    }

    pub(crate) fn boundary(reason: impl Into<String>) -> Self {
        ScheduleError::InvalidBandBoundary { reason: reason.into() }
    }
}

/// A broken schedule invariant, as reported by validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Node map output dimension differs from the schedule's coordinate count
    #[error("node {node}: map has {found} outputs, schedule has {expected} coordinates")]
    CoordinateCount { node: usize, expected: usize, found: usize },

    /// Node band ends are not strictly increasing
    #[error("node {node}: band {band} ends at {end}, not after {previous}")]
    NonIncreasingBands { node: usize, band: usize, previous: usize, end: usize },

    /// Node bands do not end at the last coordinate
    #[error("node {node}: bands end at {end}, schedule has {expected} coordinates")]
    UnclosedBands { node: usize, end: usize, expected: usize },

    /// Cached maximum band count is stale
    #[error("max band count is {recorded}, nodes have at most {actual}")]
    MaxBandCount { recorded: usize, actual: usize },

    /// Node map is not functional
    #[error("node {node}: {reason}")]
    NonFunctional { node: usize, reason: String },

    /// Storage is reachable from no live handle
    #[error("reference count is {count}")]
    ReferenceCount { count: usize },
}

fn display_violations(violations: &[Violation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Violations collected by a validation pass, printable one per line.
pub struct ViolationReport<'a>(pub &'a [Violation]);

impl fmt::Display for ViolationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in self.0 {
            writeln!(f, "  - {}", v)?;
        }
        Ok(())
    }
}

/// Result type using ScheduleError.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScheduleError::CoordinateNotInBand { coordinate: 4, start: 2, end: 4 };
        assert_eq!(err.to_string(), "coordinate 4 is not strictly inside band [2, 4)");

        let err = ScheduleError::out_of_range("node", 3, 2);
        assert_eq!(err.to_string(), "node index 3 out of range (length 2)");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ScheduleError::UseAfterFree.category(), ErrorCategory::Access);
        assert_eq!(ScheduleError::boundary("x").category(), ErrorCategory::Validation);
        assert_eq!(
            ScheduleError::InvariantViolation(vec![]).category(),
            ErrorCategory::Invariant
        );
    }

    #[test]
    fn test_violation_display() {
        let violations = vec![
            Violation::MaxBandCount { recorded: 3, actual: 2 },
            Violation::UnclosedBands { node: 1, end: 3, expected: 4 },
        ];
        let err = ScheduleError::InvariantViolation(violations.clone());
        assert!(err.to_string().contains("max band count is 3"));
        assert!(err.to_string().contains("; node 1"));
        let report = ViolationReport(&violations).to_string();
        assert_eq!(report.lines().count(), 2);
    }
}
