//! The reference-counted schedule handle.
//!
//! A [`Schedule`] is a handle onto shared, logically immutable storage.
//! Handles are cheap to duplicate with [`Schedule::retain`]; the storage is
//! dropped together with its nodes and its parameter-space reference when
//! the last handle is released. Mutations go through copy-on-write: a
//! handle whose storage is shared gets a private structural copy first, so
//! other handles keep seeing the schedule they had.

use crate::config::ScheduleOptions;
use crate::polyhedral::space::ParameterSpace;
use crate::schedule::node::{BandId, ScheduleNode};
use crate::utils::errors::{ScheduleError, ScheduleResult};
use log::{debug, trace};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of fresh band ids, shared by every schedule descending from one
/// builder so that ids minted on divergent copies never collide.
///
/// The counter is wider than a band id, so a schedule already using
/// `u32::MAX` still seals; it just has no fresh ids left.
#[derive(Debug)]
pub struct BandIdAllocator {
    next: AtomicU64,
}

impl BandIdAllocator {
    /// Allocator whose first id is `first`.
    pub fn starting_at(first: BandId) -> Self {
        Self { next: AtomicU64::new(u64::from(first.0)) }
    }

    /// Allocator whose ids are all above every id in `nodes`.
    pub fn above<'a>(nodes: impl IntoIterator<Item = &'a ScheduleNode>) -> Self {
        let first = nodes.into_iter()
            .flat_map(|n| n.bands().iter().map(|b| u64::from(b.id.0) + 1))
            .max()
            .unwrap_or(0);
        Self { next: AtomicU64::new(first) }
    }

    /// Take the next id, or fail once every id has been handed out.
    pub fn fresh(&self) -> ScheduleResult<BandId> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                u32::try_from(next).ok().map(|_| next + 1)
            })
            .map(|taken| BandId(taken as u32))
            .map_err(|_| ScheduleError::BandIdsExhausted)
    }

    /// The id the next call to [`fresh`](Self::fresh) returns.
    pub fn peek(&self) -> ScheduleResult<BandId> {
        u32::try_from(self.next.load(Ordering::Relaxed))
            .map(BandId)
            .map_err(|_| ScheduleError::BandIdsExhausted)
    }
}

/// Storage shared between handles.
#[derive(Debug, Clone)]
pub(crate) struct ScheduleData {
    pub(crate) nodes: Vec<ScheduleNode>,
    pub(crate) max_band_count: usize,
    pub(crate) total_coordinates: usize,
    pub(crate) params: Arc<ParameterSpace>,
    pub(crate) band_ids: Arc<BandIdAllocator>,
    pub(crate) options: ScheduleOptions,
}

impl ScheduleData {
    pub(crate) fn node(&self, index: usize) -> ScheduleResult<&ScheduleNode> {
        self.nodes.get(index)
            .ok_or_else(|| ScheduleError::out_of_range("node", index, self.nodes.len()))
    }

    /// Recompute the cached maximum band count.
    pub(crate) fn refresh_max_band_count(&mut self) {
        self.max_band_count = self.nodes.iter()
            .map(ScheduleNode::band_count)
            .max()
            .unwrap_or(0);
    }
}

/// A multi-statement affine schedule with band structure.
///
/// `Clone` behaves like [`retain`](Self::retain) on a live handle and
/// yields another released handle on a released one.
#[derive(Clone)]
pub struct Schedule {
    inner: Option<Arc<ScheduleData>>,
}

impl Schedule {
    pub(crate) fn from_data(data: ScheduleData) -> Self {
        Self { inner: Some(Arc::new(data)) }
    }

    pub(crate) fn data(&self) -> ScheduleResult<&ScheduleData> {
        self.inner.as_deref().ok_or(ScheduleError::UseAfterFree)
    }

    /// Exclusive access to the storage, copying it first if it is shared.
    pub(crate) fn data_mut(&mut self) -> ScheduleResult<&mut ScheduleData> {
        let inner = self.inner.as_mut().ok_or(ScheduleError::UseAfterFree)?;
        let owners = Arc::strong_count(inner);
        if owners > 1 {
            debug!("copy-on-write: cloning schedule shared by {} handles", owners);
        }
        Ok(Arc::make_mut(inner))
    }

    /// Another handle onto the same storage.
    pub fn retain(&self) -> ScheduleResult<Schedule> {
        let inner = self.inner.as_ref().ok_or(ScheduleError::UseAfterFree)?;
        trace!("retain: {} -> {} handles", Arc::strong_count(inner), Arc::strong_count(inner) + 1);
        Ok(Self { inner: Some(Arc::clone(inner)) })
    }

    /// Give up this handle's share of the storage.
    ///
    /// The storage is freed once no handle refers to it. The handle stays
    /// usable only for [`is_released`](Self::is_released); every other
    /// operation on it fails with [`ScheduleError::UseAfterFree`].
    pub fn release(&mut self) -> ScheduleResult<()> {
        let inner = self.inner.take().ok_or(ScheduleError::UseAfterFree)?;
        match Arc::try_unwrap(inner) {
            Ok(data) => debug!("release: freeing schedule with {} nodes", data.nodes.len()),
            Err(shared) => trace!("release: {} handles remain", Arc::strong_count(&shared) - 1),
        }
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Number of live handles sharing this handle's storage.
    pub fn ref_count(&self) -> ScheduleResult<usize> {
        self.inner.as_ref()
            .map(Arc::strong_count)
            .ok_or(ScheduleError::UseAfterFree)
    }

    /// Whether two handles refer to the same storage.
    pub fn shares_storage(&self, other: &Schedule) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn node_count(&self) -> ScheduleResult<usize> {
        Ok(self.data()?.nodes.len())
    }

    /// Node at `index`, bounds-checked.
    pub fn node_at(&self, index: usize) -> ScheduleResult<&ScheduleNode> {
        self.data()?.node(index)
    }

    /// All nodes, in statement order.
    pub fn nodes(&self) -> ScheduleResult<&[ScheduleNode]> {
        Ok(&self.data()?.nodes)
    }

    /// Number of schedule coordinates shared by every node.
    pub fn total_coordinates(&self) -> ScheduleResult<usize> {
        Ok(self.data()?.total_coordinates)
    }

    /// Largest band count over all nodes.
    pub fn max_band_count(&self) -> ScheduleResult<usize> {
        Ok(self.data()?.max_band_count)
    }

    pub fn parameter_space(&self) -> ScheduleResult<&Arc<ParameterSpace>> {
        Ok(&self.data()?.params)
    }

    pub fn options(&self) -> ScheduleResult<&ScheduleOptions> {
        Ok(&self.data()?.options)
    }

    /// The id the next band split will receive.
    pub fn next_band_id(&self) -> ScheduleResult<BandId> {
        self.data()?.band_ids.peek()
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(data) => f.debug_struct("Schedule")
                .field("ref_count", &Arc::strong_count(data))
                .field("total_coordinates", &data.total_coordinates)
                .field("max_band_count", &data.max_band_count)
                .field("nodes", &data.nodes)
                .finish(),
            None => f.write_str("Schedule(released)"),
        }
    }
}
