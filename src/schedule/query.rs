//! Read-only queries over the band structure of a schedule.
//!
//! Nodes may nest to different depths. A node with fewer bands than the
//! queried depth is reported as absent; that is an ordinary outcome, not an
//! error. Every depth query is a single pass over the nodes.

use crate::config::CommonBandPolicy;
use crate::schedule::handle::{Schedule, ScheduleData};
use crate::schedule::node::{Band, BandId, ScheduleNode};
use crate::utils::errors::{ScheduleError, ScheduleResult, Violation};
use log::trace;
use std::sync::Arc;

/// Where a node stands at a given band depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPresence {
    /// The node has a band at this depth
    Present { band_index: usize, band_id: BandId },
    /// The node nests less deeply
    Absent,
}

impl BandPresence {
    pub fn band_id(&self) -> Option<BandId> {
        match self {
            BandPresence::Present { band_id, .. } => Some(*band_id),
            BandPresence::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, BandPresence::Present { .. })
    }
}

/// Nodes sharing one band id at one depth: the statements one loop covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandGroup {
    pub band_id: BandId,
    pub nodes: Vec<usize>,
}

impl Schedule {
    /// For every node, its band at `depth` or [`BandPresence::Absent`].
    pub fn bands_at_depth(&self, depth: usize) -> ScheduleResult<Vec<BandPresence>> {
        Ok(self.data()?.nodes.iter().map(|node| presence(node, depth)).collect())
    }

    /// Whether every node taking part at `depth` uses the same band id, so
    /// that a single loop can be generated for them.
    ///
    /// Under [`CommonBandPolicy::Vacuous`] absent nodes are left out, and a
    /// depth with at most one participant is common. Under
    /// [`CommonBandPolicy::RequireAllNodes`] any absent node makes the depth
    /// not common.
    pub fn is_common_band(&self, depth: usize) -> ScheduleResult<bool> {
        let data = self.data()?;
        let mut ids = data.nodes.iter().map(|node| presence(node, depth).band_id());

        let common = match data.options.common_band_policy {
            CommonBandPolicy::Vacuous => {
                let mut present = ids.flatten();
                match present.next() {
                    Some(first) => present.all(|id| id == first),
                    None => true,
                }
            }
            CommonBandPolicy::RequireAllNodes => match ids.next() {
                Some(Some(first)) => ids.all(|id| id == Some(first)),
                Some(None) => false,
                None => true,
            },
        };
        trace!("depth {} common: {}", depth, common);
        Ok(common)
    }

    /// Present nodes at `depth` grouped by band id, groups in order of first
    /// appearance.
    pub fn partition_at_depth(&self, depth: usize) -> ScheduleResult<Vec<BandGroup>> {
        let mut groups: Vec<BandGroup> = Vec::new();
        for (index, node) in self.data()?.nodes.iter().enumerate() {
            let Some(band_id) = presence(node, depth).band_id() else {
                continue;
            };
            match groups.iter_mut().find(|g| g.band_id == band_id) {
                Some(group) => group.nodes.push(index),
                None => groups.push(BandGroup { band_id, nodes: vec![index] }),
            }
        }
        Ok(groups)
    }

    /// Depths below the maximum band count at which the band is common.
    pub fn common_depths(&self) -> ScheduleResult<Vec<usize>> {
        let mut depths = Vec::new();
        for depth in 0..self.max_band_count()? {
            if self.is_common_band(depth)? {
                depths.push(depth);
            }
        }
        Ok(depths)
    }

    /// Every invariant breach in the schedule.
    pub fn violations(&self) -> ScheduleResult<Vec<Violation>> {
        let count = self.ref_count()?;
        Ok(violations_of(self.data()?, count))
    }

    /// Check all schedule invariants.
    pub fn validate(&self) -> ScheduleResult<()> {
        let violations = self.violations()?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ScheduleError::InvariantViolation(violations))
        }
    }

    /// The schedule restricted to coordinates `[lo, hi)`.
    ///
    /// Both ends must be band boundaries in every node. The sub-schedule
    /// keeps band ids, and shares the parameter space and the band-id
    /// allocator with this schedule.
    pub fn restrict_schedule(&self, lo: usize, hi: usize) -> ScheduleResult<Schedule> {
        let data = self.data()?;
        if hi > data.total_coordinates || lo > hi {
            return Err(ScheduleError::out_of_range("coordinate", hi.max(lo), data.total_coordinates + 1));
        }

        let nodes = data.nodes.iter()
            .map(|node| restrict_node(node, lo, hi))
            .collect::<ScheduleResult<Vec<_>>>()?;

        let mut sub = ScheduleData {
            nodes,
            max_band_count: 0,
            total_coordinates: hi - lo,
            params: Arc::clone(&data.params),
            band_ids: Arc::clone(&data.band_ids),
            options: data.options.clone(),
        };
        sub.refresh_max_band_count();
        Ok(Schedule::from_data(sub))
    }
}

fn presence(node: &ScheduleNode, depth: usize) -> BandPresence {
    match node.bands().get(depth) {
        Some(band) => BandPresence::Present { band_index: depth, band_id: band.id },
        None => BandPresence::Absent,
    }
}

fn restrict_node(node: &ScheduleNode, lo: usize, hi: usize) -> ScheduleResult<ScheduleNode> {
    let map = node.restrict_to_coordinates(lo, hi)?;
    let bands = node.bands().iter().enumerate()
        .filter(|&(i, band)| node.band_start(i) >= lo && band.end <= hi)
        .map(|(_, band)| Band { end: band.end - lo, id: band.id })
        .collect();
    ScheduleNode::new(Arc::new(map), bands)
}

/// Invariant breaches of `data` when held by `ref_count` handles.
pub(crate) fn violations_of(data: &ScheduleData, ref_count: usize) -> Vec<Violation> {
    let mut found: Vec<Violation> = data.nodes.iter()
        .enumerate()
        .flat_map(|(i, node)| node.violations(i, data.total_coordinates))
        .collect();

    let actual = data.nodes.iter().map(ScheduleNode::band_count).max().unwrap_or(0);
    if actual != data.max_band_count {
        found.push(Violation::MaxBandCount { recorded: data.max_band_count, actual });
    }
    if ref_count == 0 {
        found.push(Violation::ReferenceCount { count: ref_count });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleOptions;
    use crate::polyhedral::map::AffineMap;
    use crate::polyhedral::space::ParameterSpace;
    use crate::schedule::builder::ScheduleBuilder;

    fn ids(raw: &[u32]) -> Vec<BandId> {
        raw.iter().copied().map(BandId).collect()
    }

    fn two_statements(options: ScheduleOptions) -> Schedule {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty()).with_options(options);
        builder.append_node(AffineMap::identity(4, 0), &[2, 4], &ids(&[10, 11])).unwrap();
        builder.append_node(AffineMap::identity(4, 0), &[4], &ids(&[10])).unwrap();
        builder.seal().unwrap()
    }

    #[test]
    fn test_bands_at_depth() {
        let s = two_statements(ScheduleOptions::default());
        assert_eq!(s.bands_at_depth(0).unwrap(), vec![
            BandPresence::Present { band_index: 0, band_id: BandId(10) },
            BandPresence::Present { band_index: 0, band_id: BandId(10) },
        ]);
        assert_eq!(s.bands_at_depth(1).unwrap(), vec![
            BandPresence::Present { band_index: 1, band_id: BandId(11) },
            BandPresence::Absent,
        ]);
        assert!(s.bands_at_depth(5).unwrap().iter().all(|p| !p.is_present()));
    }

    #[test]
    fn test_common_band_vacuous() {
        let s = two_statements(ScheduleOptions::default());
        assert!(s.is_common_band(0).unwrap());
        // Only node 0 takes part at depth 1.
        assert!(s.is_common_band(1).unwrap());
        assert!(s.is_common_band(7).unwrap());
        assert_eq!(s.common_depths().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_common_band_require_all() {
        let options = ScheduleOptions::default()
            .common_band_policy(CommonBandPolicy::RequireAllNodes);
        let s = two_statements(options);
        assert!(s.is_common_band(0).unwrap());
        assert!(!s.is_common_band(1).unwrap());
        assert_eq!(s.common_depths().unwrap(), vec![0]);
    }

    #[test]
    fn test_conflicting_ids() {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty());
        builder.append_node(AffineMap::identity(2, 0), &[2], &ids(&[1])).unwrap();
        builder.append_node(AffineMap::identity(2, 0), &[2], &ids(&[2])).unwrap();
        builder.append_node(AffineMap::identity(2, 0), &[2], &ids(&[1])).unwrap();
        let s = builder.seal().unwrap();
        assert!(!s.is_common_band(0).unwrap());
        assert_eq!(s.partition_at_depth(0).unwrap(), vec![
            BandGroup { band_id: BandId(1), nodes: vec![0, 2] },
            BandGroup { band_id: BandId(2), nodes: vec![1] },
        ]);
    }

    #[test]
    fn test_validate_detects_stale_cache() {
        let mut s = two_statements(ScheduleOptions::default());
        assert!(s.validate().is_ok());
        s.data_mut().unwrap().max_band_count = 5;
        assert_eq!(
            s.violations().unwrap(),
            vec![Violation::MaxBandCount { recorded: 5, actual: 2 }]
        );
        assert!(matches!(s.validate(), Err(ScheduleError::InvariantViolation(_))));
    }

    #[test]
    fn test_restrict_schedule() {
        let s = two_statements(ScheduleOptions::default());
        let all = s.restrict_schedule(0, 4).unwrap();
        assert_eq!(all.nodes().unwrap(), s.nodes().unwrap());

        // Node 1 has no boundary at 2.
        assert_eq!(
            s.restrict_schedule(2, 4).unwrap_err(),
            ScheduleError::RangeNotBandAligned { lo: 2, hi: 4 }
        );
        assert!(s.restrict_schedule(0, 5).is_err());
    }

    #[test]
    fn test_restrict_schedule_inner_band() {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty());
        builder.append_node(AffineMap::identity(3, 0), &[1, 3], &ids(&[0, 1])).unwrap();
        builder.append_node(AffineMap::identity(3, 0), &[1, 2, 3], &ids(&[0, 2, 3])).unwrap();
        let s = builder.seal().unwrap();

        let inner = s.restrict_schedule(1, 3).unwrap();
        assert_eq!(inner.total_coordinates().unwrap(), 2);
        assert_eq!(inner.max_band_count().unwrap(), 2);
        assert_eq!(inner.node_at(0).unwrap().band_ends(), vec![2]);
        assert_eq!(inner.node_at(1).unwrap().band_ids(), ids(&[2, 3]));
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_restricted_schedule_splits_never_collide() {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty());
        builder.append_node(AffineMap::identity(3, 0), &[1, 3], &ids(&[0, 1])).unwrap();
        builder.append_node(AffineMap::identity(3, 0), &[1, 2, 3], &ids(&[0, 2, 3])).unwrap();
        let mut source = builder.seal().unwrap();
        let mut inner = source.restrict_schedule(1, 3).unwrap();
        assert_eq!(inner.next_band_id().unwrap(), source.next_band_id().unwrap());

        source.split_band(0, 1, 2).unwrap();
        inner.split_band(0, 0, 1).unwrap();

        let from_source = source.node_at(0).unwrap().band_ids()[2];
        let from_inner = inner.node_at(0).unwrap().band_ids()[1];
        assert_eq!(from_source, BandId(4));
        assert_eq!(from_inner, BandId(5));
        assert!(source.validate().is_ok());
        assert!(inner.validate().is_ok());
    }
}
