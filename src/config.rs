//! Schedule configuration.
//!
//! Policies that the band operations leave open (which id a merged band
//! keeps, how absent statements count when comparing bands) are chosen here
//! once per schedule and inherited by every copy of it.

use serde::{Serialize, Deserialize};

/// Which band id a merged band keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeIdPolicy {
    /// Reuse the id of the first merged band
    #[default]
    First,
    /// Reuse the numerically smallest id among the merged bands
    Lowest,
}

/// How [`is_common_band`](crate::Schedule::is_common_band) treats statements
/// that have no band at the queried depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommonBandPolicy {
    /// Absent statements are ignored; a depth with at most one participant
    /// is common.
    #[default]
    Vacuous,
    /// Every statement must be present and share the band id.
    RequireAllNodes,
}

/// Options carried by a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Id policy for `merge_bands`
    pub merge_id_policy: MergeIdPolicy,

    /// Participation rule for `is_common_band`
    pub common_band_policy: CommonBandPolicy,

    /// Re-check node invariants before committing every mutation
    pub validate_mutations: bool,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            merge_id_policy: MergeIdPolicy::First,
            common_band_policy: CommonBandPolicy::Vacuous,
            validate_mutations: cfg!(debug_assertions),
        }
    }
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutation validated, every statement must join a common band.
    pub fn strict() -> Self {
        Self {
            common_band_policy: CommonBandPolicy::RequireAllNodes,
            validate_mutations: true,
            ..Default::default()
        }
    }

    /// No post-mutation checks.
    pub fn relaxed() -> Self {
        Self {
            validate_mutations: false,
            ..Default::default()
        }
    }

    pub fn merge_id_policy(mut self, policy: MergeIdPolicy) -> Self {
        self.merge_id_policy = policy;
        self
    }

    pub fn common_band_policy(mut self, policy: CommonBandPolicy) -> Self {
        self.common_band_policy = policy;
        self
    }

    pub fn validate_mutations(mut self, enable: bool) -> Self {
        self.validate_mutations = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let opt = ScheduleOptions::default();
        assert_eq!(opt.merge_id_policy, MergeIdPolicy::First);
        assert_eq!(opt.common_band_policy, CommonBandPolicy::Vacuous);

        let opt = ScheduleOptions::strict();
        assert!(opt.validate_mutations);
        assert_eq!(opt.common_band_policy, CommonBandPolicy::RequireAllNodes);

        assert!(!ScheduleOptions::relaxed().validate_mutations);
    }

    #[test]
    fn test_setters() {
        let opt = ScheduleOptions::new()
            .merge_id_policy(MergeIdPolicy::Lowest)
            .validate_mutations(false);
        assert_eq!(opt.merge_id_policy, MergeIdPolicy::Lowest);
        assert!(!opt.validate_mutations);
    }
}
