//! Per-statement schedule nodes.
//!
//! A node pairs one statement's schedule map with the decomposition of the
//! map's output coordinates into bands. Bands are stored as ordered
//! `(end, id)` pairs: band `i` covers `[end(i-1), end(i))`, band 0 starts at
//! coordinate 0, and the last band ends at the map's output dimension.

use crate::polyhedral::map::AffineMap;
use crate::utils::errors::{ScheduleError, ScheduleResult, Violation};
use serde::{Serialize, Deserialize};
use std::fmt;
use std::sync::Arc;

/// Identifies a cross-statement band group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BandId(pub u32);

impl From<u32> for BandId {
    fn from(id: u32) -> Self { Self(id) }
}

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// One band of a node: its exclusive end coordinate and its group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Band {
    pub end: usize,
    pub id: BandId,
}

/// The schedule of a single statement.
///
/// Deserialized nodes go through the same checks as [`ScheduleNode::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScheduleNode")]
pub struct ScheduleNode {
    map: Arc<AffineMap>,
    bands: Vec<Band>,
}

/// Unchecked wire form of a [`ScheduleNode`].
#[derive(Deserialize)]
struct RawScheduleNode {
    map: Arc<AffineMap>,
    bands: Vec<Band>,
}

impl TryFrom<RawScheduleNode> for ScheduleNode {
    type Error = ScheduleError;

    fn try_from(raw: RawScheduleNode) -> ScheduleResult<Self> {
        Self::new(raw.map, raw.bands)
    }
}

impl ScheduleNode {
    /// Create a node, checking the map and the band decomposition.
    pub fn new(map: Arc<AffineMap>, bands: Vec<Band>) -> ScheduleResult<Self> {
        check_bands(&bands, map.n_out())?;
        map.check_functional()?;
        Ok(Self { map, bands })
    }

    /// Create a node from parallel band-end and band-id sequences, as
    /// produced by an external scheduler.
    pub fn from_parts(
        map: impl Into<Arc<AffineMap>>,
        band_ends: &[usize],
        band_ids: &[BandId],
    ) -> ScheduleResult<Self> {
        let map = map.into();
        check_ends(band_ends, map.n_out())?;
        if band_ends.len() != band_ids.len() {
            return Err(ScheduleError::BandIdArityMismatch {
                ends: band_ends.len(),
                ids: band_ids.len(),
            });
        }
        let bands = band_ends.iter().zip(band_ids)
            .map(|(&end, &id)| Band { end, id })
            .collect();
        Self::new(map, bands)
    }

    /// The statement's schedule map.
    pub fn schedule_map(&self) -> &AffineMap {
        &self.map
    }

    /// Shared handle to the schedule map.
    pub fn map_handle(&self) -> &Arc<AffineMap> {
        &self.map
    }

    /// Number of schedule coordinates (the map's output dimension).
    pub fn n_coordinates(&self) -> usize {
        self.map.n_out()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_ends(&self) -> Vec<usize> {
        self.bands.iter().map(|b| b.end).collect()
    }

    pub fn band_ids(&self) -> Vec<BandId> {
        self.bands.iter().map(|b| b.id).collect()
    }

    /// Band at `band_index`.
    pub fn band(&self, band_index: usize) -> ScheduleResult<Band> {
        self.bands.get(band_index)
            .copied()
            .ok_or_else(|| ScheduleError::out_of_range("band", band_index, self.bands.len()))
    }

    /// Half-open coordinate range `[start, end)` of a band.
    pub fn band_range(&self, band_index: usize) -> ScheduleResult<(usize, usize)> {
        let end = self.band(band_index)?.end;
        Ok((self.band_start(band_index), end))
    }

    /// Number of coordinates in a band.
    pub fn band_len(&self, band_index: usize) -> ScheduleResult<usize> {
        let (start, end) = self.band_range(band_index)?;
        Ok(end - start)
    }

    /// Index of the band containing `coordinate`.
    pub fn band_index_of(&self, coordinate: usize) -> Option<usize> {
        // Ends are sorted, so the first end past the coordinate is its band.
        let idx = self.bands.partition_point(|b| b.end <= coordinate);
        (idx < self.bands.len()).then_some(idx)
    }

    /// Whether `coordinate` starts or ends some band (0 always does).
    pub fn is_band_boundary(&self, coordinate: usize) -> bool {
        coordinate == 0 || self.bands.iter().any(|b| b.end == coordinate)
    }

    /// The map restricted to outputs `[lo, hi)`, where both ends must be
    /// band boundaries.
    pub fn restrict_to_coordinates(&self, lo: usize, hi: usize) -> ScheduleResult<AffineMap> {
        self.check_range(lo, hi)?;
        if !self.is_band_boundary(lo) || !self.is_band_boundary(hi) {
            return Err(ScheduleError::RangeNotBandAligned { lo, hi });
        }
        self.coordinate_slice(lo, hi)
    }

    /// The map restricted to outputs `[lo, hi)`, regardless of bands.
    pub fn coordinate_slice(&self, lo: usize, hi: usize) -> ScheduleResult<AffineMap> {
        self.check_range(lo, hi)?;
        self.map.project_outputs(lo, hi)
            .ok_or_else(|| ScheduleError::out_of_range("coordinate", hi, self.n_coordinates()))
    }

    /// Invariant breaches of this node against the schedule's coordinate
    /// count.
    pub fn violations(&self, node: usize, expected: usize) -> Vec<Violation> {
        let mut found = Vec::new();
        if self.n_coordinates() != expected {
            found.push(Violation::CoordinateCount {
                node,
                expected,
                found: self.n_coordinates(),
            });
        }
        let mut previous = 0;
        for (band, b) in self.bands.iter().enumerate() {
            if b.end <= previous {
                found.push(Violation::NonIncreasingBands { node, band, previous, end: b.end });
            }
            previous = previous.max(b.end);
        }
        let last = self.bands.last().map_or(0, |b| b.end);
        if last != expected {
            found.push(Violation::UnclosedBands { node, end: last, expected });
        }
        if let Err(err) = self.map.check_functional() {
            found.push(Violation::NonFunctional { node, reason: err.to_string() });
        }
        found
    }

    pub(crate) fn band_start(&self, band_index: usize) -> usize {
        match band_index {
            0 => 0,
            i => self.bands[i - 1].end,
        }
    }

    pub(crate) fn bands_mut(&mut self) -> &mut Vec<Band> {
        &mut self.bands
    }

    /// Copy of this node with new bands, checked against the map.
    pub(crate) fn with_bands(&self, bands: Vec<Band>) -> ScheduleResult<Self> {
        check_bands(&bands, self.n_coordinates())?;
        Ok(Self { map: Arc::clone(&self.map), bands })
    }

    /// Copy of this node with a new map and the same bands.
    pub(crate) fn with_map(&self, map: AffineMap) -> ScheduleResult<Self> {
        Self::new(Arc::new(map), self.bands.clone())
    }

    fn check_range(&self, lo: usize, hi: usize) -> ScheduleResult<()> {
        if hi > self.n_coordinates() {
            return Err(ScheduleError::out_of_range("coordinate", hi, self.n_coordinates() + 1));
        }
        if lo > hi {
            return Err(ScheduleError::out_of_range("coordinate", lo, hi + 1));
        }
        Ok(())
    }
}

impl fmt::Display for ScheduleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bands", self.map)?;
        for (i, band) in self.bands.iter().enumerate() {
            write!(f, " {}[{}, {})", band.id, self.band_start(i), band.end)?;
        }
        Ok(())
    }
}

fn check_bands(bands: &[Band], n_out: usize) -> ScheduleResult<()> {
    let ends: Vec<usize> = bands.iter().map(|b| b.end).collect();
    check_ends(&ends, n_out)
}

/// Band ends must be strictly increasing from 0 and close at `n_out`.
fn check_ends(ends: &[usize], n_out: usize) -> ScheduleResult<()> {
    let mut previous = 0;
    for (i, &end) in ends.iter().enumerate() {
        if end <= previous {
            return Err(ScheduleError::boundary(format!(
                "band {} ends at {}, which does not follow {}",
                i, end, previous
            )));
        }
        previous = end;
    }
    if previous != n_out {
        return Err(ScheduleError::boundary(format!(
            "bands end at coordinate {} but the schedule map has {} outputs",
            previous, n_out
        )));
    }
    Ok(())
}
