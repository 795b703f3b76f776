//! Band restructuring with copy-on-write.
//!
//! Every operation computes the replacement node first and only then takes
//! exclusive access to the storage, so a failing operation leaves this
//! handle and every handle sharing its storage untouched.

use crate::config::MergeIdPolicy;
use crate::polyhedral::map::is_permutation;
use crate::schedule::handle::Schedule;
use crate::schedule::node::{Band, BandId, ScheduleNode};
use crate::utils::errors::{ScheduleError, ScheduleResult, ViolationReport};
use log::{debug, error, warn};
use std::collections::HashMap;

impl Schedule {
    /// Collapse bands `first..=last` of one node into a single band.
    ///
    /// The merged band keeps an id chosen by the schedule's
    /// [`MergeIdPolicy`].
    pub fn merge_bands(&mut self, node_index: usize, first: usize, last: usize) -> ScheduleResult<()> {
        let data = self.data()?;
        let node = data.node(node_index)?;
        if first >= last {
            warn!("merge_bands: node {} range {}..={} is not mergeable", node_index, first, last);
            return Err(ScheduleError::NonContiguousMerge { first, last });
        }
        let bands = node.bands();
        if last >= bands.len() {
            return Err(ScheduleError::out_of_range("band", last, bands.len()));
        }

        let merged = &bands[first..=last];
        let id = match data.options.merge_id_policy {
            MergeIdPolicy::First => merged[0].id,
            MergeIdPolicy::Lowest => merged.iter().map(|b| b.id).min().unwrap_or(merged[0].id),
        };
        let mut new_bands = Vec::with_capacity(bands.len() - (last - first));
        new_bands.extend_from_slice(&bands[..first]);
        new_bands.push(Band { end: bands[last].end, id });
        new_bands.extend_from_slice(&bands[last + 1..]);

        let candidate = node.with_bands(new_bands)?;
        debug!("merge_bands: node {} bands {}..={} -> {}", node_index, first, last, id);
        self.commit_node(node_index, candidate)
    }

    /// Split one band of a node at `at_coordinate`.
    ///
    /// The lower half keeps the band's id; the upper half gets a fresh id
    /// that no schedule sharing this one's history has used.
    pub fn split_band(&mut self, node_index: usize, band_index: usize, at_coordinate: usize) -> ScheduleResult<()> {
        let data = self.data()?;
        let node = data.node(node_index)?;
        let (start, end) = node.band_range(band_index)?;
        if at_coordinate <= start || at_coordinate >= end {
            warn!("split_band: coordinate {} outside band [{}, {})", at_coordinate, start, end);
            return Err(ScheduleError::CoordinateNotInBand { coordinate: at_coordinate, start, end });
        }

        let old = node.bands()[band_index];
        let mut new_bands = node.bands().to_vec();
        new_bands[band_index] = Band { end: at_coordinate, id: old.id };
        new_bands.insert(band_index + 1, Band { end, id: old.id });
        let mut candidate = node.with_bands(new_bands)?;

        let fresh = data.band_ids.fresh().map_err(|err| {
            warn!("split_band: node {} band {}: {}", node_index, band_index, err);
            err
        })?;
        candidate.bands_mut()[band_index + 1].id = fresh;
        debug!("split_band: node {} band {} at {} -> {} + {}", node_index, band_index, at_coordinate, old.id, fresh);
        self.commit_node(node_index, candidate)
    }

    /// Reorder the coordinates inside one band of one node.
    ///
    /// New coordinate `start + k` of the band is old coordinate
    /// `start + permutation[k]`. The band decomposition is unchanged.
    pub fn permute_band(&mut self, node_index: usize, band_index: usize, permutation: &[usize]) -> ScheduleResult<()> {
        let node = self.data()?.node(node_index)?;
        let (start, end) = node.band_range(band_index)?;
        let invalid = || ScheduleError::InvalidPermutation { perm: permutation.to_vec(), len: end - start };
        if permutation.len() != end - start || !is_permutation(permutation) {
            return Err(invalid());
        }

        let map = node.schedule_map().permute_outputs(start, permutation).ok_or_else(invalid)?;
        let candidate = node.with_map(map)?;
        debug!("permute_band: node {} band {} by {:?}", node_index, band_index, permutation);
        self.commit_node(node_index, candidate)
    }

    /// Renumber band ids to `0..k` in order of first appearance (node order,
    /// then depth). Equal ids stay equal and distinct ids stay distinct.
    ///
    /// Returns the number of distinct ids. Storage is only copied when some
    /// id actually changes.
    pub fn renumber_band_ids(&mut self) -> ScheduleResult<usize> {
        let mut mapping: HashMap<BandId, BandId> = HashMap::new();
        for band in self.data()?.nodes.iter().flat_map(|n| n.bands()) {
            let next = BandId(mapping.len() as u32);
            mapping.entry(band.id).or_insert(next);
        }
        if mapping.iter().all(|(old, new)| old == new) {
            return Ok(mapping.len());
        }

        // Renumbered ids are below the allocator's next id, which stays put.
        let data = self.data_mut()?;
        for node in &mut data.nodes {
            for band in node.bands_mut().iter_mut() {
                band.id = mapping[&band.id];
            }
        }
        debug!("renumber_band_ids: {} groups", mapping.len());
        Ok(mapping.len())
    }

    /// Put the bands of `nodes` at `depth` into one group, so that a
    /// single loop covers those statements at that depth.
    ///
    /// The shared id is chosen among the fused bands by the schedule's
    /// [`MergeIdPolicy`]. Every listed node must have a band at `depth`.
    pub fn fuse_bands(&mut self, depth: usize, nodes: &[usize]) -> ScheduleResult<()> {
        let data = self.data()?;
        let current = nodes.iter()
            .map(|&i| Ok((i, data.node(i)?.band(depth)?.id)))
            .collect::<ScheduleResult<Vec<_>>>()?;
        let Some(&(_, first)) = current.first() else {
            return Ok(());
        };
        let id = match data.options.merge_id_policy {
            MergeIdPolicy::First => first,
            MergeIdPolicy::Lowest => current.iter().map(|&(_, id)| id).min().unwrap_or(first),
        };

        let assignments: Vec<(usize, BandId)> = current.into_iter()
            .filter(|&(_, old)| old != id)
            .map(|(i, _)| (i, id))
            .collect();
        debug!("fuse_bands: depth {} nodes {:?} -> {}", depth, nodes, id);
        self.reassign_band_ids(depth, assignments)
    }

    /// Give each of `nodes` its own band group at `depth`, so that each
    /// statement gets a separate loop there.
    ///
    /// Every listed node receives one fresh id; repeated entries are
    /// ignored. Every listed node must have a band at `depth`.
    pub fn distribute_bands(&mut self, depth: usize, nodes: &[usize]) -> ScheduleResult<()> {
        let data = self.data()?;
        let mut targets: Vec<usize> = Vec::with_capacity(nodes.len());
        for &i in nodes {
            data.node(i)?.band(depth)?;
            if !targets.contains(&i) {
                targets.push(i);
            }
        }
        let assignments = targets.into_iter()
            .map(|i| Ok((i, data.band_ids.fresh()?)))
            .collect::<ScheduleResult<Vec<_>>>()?;
        debug!("distribute_bands: depth {} nodes {:?} -> {:?}", depth, nodes, assignments);
        self.reassign_band_ids(depth, assignments)
    }

    /// Set the band id at `depth` of each listed node, all or nothing.
    fn reassign_band_ids(&mut self, depth: usize, assignments: Vec<(usize, BandId)>) -> ScheduleResult<()> {
        if assignments.is_empty() {
            return Ok(());
        }
        let data = self.data()?;
        let mut candidates = Vec::with_capacity(assignments.len());
        for (node_index, id) in assignments {
            let node = data.node(node_index)?;
            let mut bands = node.bands().to_vec();
            bands[depth].id = id;
            candidates.push((node_index, node.with_bands(bands)?));
        }
        self.commit_nodes(candidates)
    }

    /// Install a replacement node and refresh the cached band count.
    fn commit_node(&mut self, node_index: usize, candidate: ScheduleNode) -> ScheduleResult<()> {
        self.commit_nodes(vec![(node_index, candidate)])
    }

    /// Install replacement nodes once every one of them has been checked.
    fn commit_nodes(&mut self, candidates: Vec<(usize, ScheduleNode)>) -> ScheduleResult<()> {
        let data = self.data()?;
        if data.options.validate_mutations {
            for (node_index, candidate) in &candidates {
                let violations = candidate.violations(*node_index, data.total_coordinates);
                if !violations.is_empty() {
                    error!("mutation of node {} rejected:\n{}", node_index, ViolationReport(&violations));
                    return Err(ScheduleError::InvariantViolation(violations));
                }
            }
        }

        let data = self.data_mut()?;
        for (node_index, candidate) in candidates {
            data.nodes[node_index] = candidate;
        }
        data.refresh_max_band_count();
        Ok(())
    }
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

    fn schedule_with(options: ScheduleOptions) -> Schedule {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty()).with_options(options);
        builder.append_node(AffineMap::identity(4, 0), &[1, 2, 4], &ids(&[7, 3, 5])).unwrap();
        builder.append_node(AffineMap::identity(4, 0), &[4], &ids(&[7])).unwrap();
        builder.seal().unwrap()
    }

    fn schedule() -> Schedule {
        schedule_with(ScheduleOptions::default())
    }

    #[test]
    fn test_merge_first_policy() {
        let mut s = schedule();
        s.merge_bands(0, 0, 1).unwrap();
        let node = s.node_at(0).unwrap();
        assert_eq!(node.band_ends(), vec![2, 4]);
        assert_eq!(node.band_ids(), ids(&[7, 5]));
        assert_eq!(s.max_band_count().unwrap(), 2);
    }

    #[test]
    fn test_merge_lowest_policy() {
        let mut s = schedule_with(ScheduleOptions::default().merge_id_policy(MergeIdPolicy::Lowest));
        s.merge_bands(0, 0, 2).unwrap();
        let node = s.node_at(0).unwrap();
        assert_eq!(node.band_ends(), vec![4]);
        assert_eq!(node.band_ids(), ids(&[3]));
        assert_eq!(s.max_band_count().unwrap(), 1);
    }

    #[test]
    fn test_merge_errors() {
        let mut s = schedule();
        assert_eq!(
            s.merge_bands(0, 1, 1).unwrap_err(),
            ScheduleError::NonContiguousMerge { first: 1, last: 1 }
        );
        assert_eq!(
            s.merge_bands(0, 2, 1).unwrap_err(),
            ScheduleError::NonContiguousMerge { first: 2, last: 1 }
        );
        assert!(matches!(
            s.merge_bands(0, 1, 3),
            Err(ScheduleError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
        assert!(matches!(
            s.merge_bands(2, 0, 1),
            Err(ScheduleError::IndexOutOfRange { what: "node", .. })
        ));
        assert_eq!(s.node_at(0).unwrap().band_count(), 3);
    }

    #[test]
    fn test_split_allocates_fresh_id() {
        let mut s = schedule();
        assert_eq!(s.next_band_id().unwrap(), BandId(8));
        s.split_band(1, 0, 1).unwrap();
        let node = s.node_at(1).unwrap();
        assert_eq!(node.band_ends(), vec![1, 4]);
        assert_eq!(node.band_ids(), ids(&[7, 8]));
        assert_eq!(s.next_band_id().unwrap(), BandId(9));
    }

    #[test]
    fn test_split_outside_band() {
        let mut s = schedule();
        assert_eq!(
            s.split_band(0, 2, 2).unwrap_err(),
            ScheduleError::CoordinateNotInBand { coordinate: 2, start: 2, end: 4 }
        );
        assert!(s.split_band(0, 2, 4).is_err());
        // A single-coordinate band cannot be split.
        assert!(s.split_band(0, 0, 0).is_err());
        assert!(s.split_band(0, 0, 1).is_err());
    }

    #[test]
    fn test_split_ids_unique_across_copies() {
        let mut a = schedule();
        let mut b = a.retain().unwrap();
        a.split_band(1, 0, 2).unwrap();
        b.split_band(1, 0, 2).unwrap();
        let id_a = a.node_at(1).unwrap().band_ids()[1];
        let id_b = b.node_at(1).unwrap().band_ids()[1];
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_permute_band() {
        let mut s = schedule();
        s.permute_band(0, 2, &[1, 0]).unwrap();
        let map = s.node_at(0).unwrap().schedule_map();
        assert_eq!(map.apply(&[1, 2, 3, 4], &[]), vec![1, 2, 4, 3]);
        assert_eq!(s.node_at(0).unwrap().band_ends(), vec![1, 2, 4]);

        assert!(matches!(
            s.permute_band(0, 2, &[0]),
            Err(ScheduleError::InvalidPermutation { len: 2, .. })
        ));
        assert!(s.permute_band(0, 2, &[1, 1]).is_err());
    }

    #[test]
    fn test_renumber() {
        let mut s = schedule();
        let before = s.retain().unwrap();
        assert_eq!(s.renumber_band_ids().unwrap(), 3);
        assert_eq!(s.node_at(0).unwrap().band_ids(), ids(&[0, 1, 2]));
        assert_eq!(s.node_at(1).unwrap().band_ids(), ids(&[0]));
        assert!(!s.shares_storage(&before));
        assert_eq!(before.node_at(0).unwrap().band_ids(), ids(&[7, 3, 5]));

        // Already compact: nothing to copy.
        let again = s.retain().unwrap();
        assert_eq!(s.renumber_band_ids().unwrap(), 3);
        assert!(s.shares_storage(&again));
    }

    #[test]
    fn test_split_with_exhausted_ids() {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty());
        builder.append_node(AffineMap::identity(2, 0), &[2], &ids(&[0])).unwrap();
        builder.append_node(AffineMap::identity(2, 0), &[2], &ids(&[u32::MAX - 1])).unwrap();
        let mut s = builder.seal().unwrap();
        let alias = s.retain().unwrap();

        s.split_band(1, 0, 1).unwrap();
        assert_eq!(s.node_at(1).unwrap().band_ids(), ids(&[u32::MAX - 1, u32::MAX]));
        assert_eq!(s.next_band_id().unwrap_err(), ScheduleError::BandIdsExhausted);

        let before = s.retain().unwrap();
        assert_eq!(s.split_band(0, 0, 1).unwrap_err(), ScheduleError::BandIdsExhausted);
        assert!(s.shares_storage(&before));
        assert_eq!(s.node_at(0).unwrap().band_ids(), ids(&[0]));
        assert_eq!(alias.node_at(1).unwrap().band_ids(), ids(&[u32::MAX - 1]));
    }

    #[test]
    fn test_seal_with_largest_id() {
        let mut builder = ScheduleBuilder::new(ParameterSpace::empty());
        builder.append_node(AffineMap::identity(2, 0), &[2], &ids(&[u32::MAX])).unwrap();
        let mut s = builder.seal().unwrap();
        assert!(s.validate().is_ok());
        assert_eq!(s.split_band(0, 0, 1).unwrap_err(), ScheduleError::BandIdsExhausted);
        assert_eq!(s.node_at(0).unwrap().band_count(), 1);
    }

    #[test]
    fn test_fuse_bands() {
        let mut s = schedule();
        let before = s.retain().unwrap();
        s.fuse_bands(0, &[1, 0]).unwrap();
        assert_eq!(s.node_at(0).unwrap().band_ids(), ids(&[7, 3, 5]));

        s.split_band(1, 0, 1).unwrap();
        assert_eq!(s.node_at(1).unwrap().band_ids(), ids(&[7, 8]));
        assert!(!s.is_common_band(1).unwrap());
        s.fuse_bands(1, &[1, 0]).unwrap();
        assert_eq!(s.node_at(0).unwrap().band_ids(), ids(&[7, 8, 5]));
        assert!(s.is_common_band(1).unwrap());
        assert_eq!(before.node_at(0).unwrap().band_ids(), ids(&[7, 3, 5]));
    }

    #[test]
    fn test_fuse_lowest_policy() {
        let mut s = schedule_with(ScheduleOptions::default().merge_id_policy(MergeIdPolicy::Lowest));
        s.split_band(1, 0, 2).unwrap();
        s.fuse_bands(1, &[1, 0]).unwrap();
        assert_eq!(s.node_at(0).unwrap().band_ids(), ids(&[7, 3, 5]));
        assert_eq!(s.node_at(1).unwrap().band_ids(), ids(&[7, 3]));
    }

    #[test]
    fn test_fuse_rejects_absent_node() {
        let mut s = schedule();
        let before = s.retain().unwrap();
        assert!(matches!(
            s.fuse_bands(1, &[0, 1]),
            Err(ScheduleError::IndexOutOfRange { what: "band", index: 1, len: 1 })
        ));
        assert!(matches!(
            s.fuse_bands(0, &[0, 4]),
            Err(ScheduleError::IndexOutOfRange { what: "node", index: 4, .. })
        ));
        assert!(s.shares_storage(&before));

        // Already fused: nothing to copy.
        s.fuse_bands(0, &[0, 1]).unwrap();
        s.fuse_bands(0, &[]).unwrap();
        assert!(s.shares_storage(&before));
    }

    #[test]
    fn test_distribute_bands() {
        let mut s = schedule();
        let before = s.retain().unwrap();
        assert!(s.is_common_band(0).unwrap());

        s.distribute_bands(0, &[0, 1, 0]).unwrap();
        assert_eq!(s.node_at(0).unwrap().band_ids(), ids(&[8, 3, 5]));
        assert_eq!(s.node_at(1).unwrap().band_ids(), ids(&[9]));
        assert!(!s.is_common_band(0).unwrap());
        assert_eq!(s.partition_at_depth(0).unwrap().len(), 2);
        assert_eq!(before.node_at(1).unwrap().band_ids(), ids(&[7]));

        s.fuse_bands(0, &[0, 1]).unwrap();
        assert!(s.is_common_band(0).unwrap());
    }

    #[test]
    fn test_distribute_is_atomic() {
        let mut s = schedule();
        let before = s.retain().unwrap();
        assert!(matches!(
            s.distribute_bands(2, &[0, 1]),
            Err(ScheduleError::IndexOutOfRange { what: "band", .. })
        ));
        assert!(s.shares_storage(&before));
        // Nothing was drawn from the allocator.
        assert_eq!(s.next_band_id().unwrap(), BandId(8));
    }

    #[test]
    fn test_mutation_on_released_handle() {
        let mut s = schedule();
        s.release().unwrap();
        assert_eq!(s.merge_bands(0, 0, 1).unwrap_err(), ScheduleError::UseAfterFree);
        assert_eq!(s.split_band(0, 0, 1).unwrap_err(), ScheduleError::UseAfterFree);
        assert_eq!(s.renumber_band_ids().unwrap_err(), ScheduleError::UseAfterFree);
        assert_eq!(s.fuse_bands(0, &[0]).unwrap_err(), ScheduleError::UseAfterFree);
        assert_eq!(s.distribute_bands(0, &[0]).unwrap_err(), ScheduleError::UseAfterFree);
    }
}
