//! Assembling schedules from scheduler output.
//!
//! The builder moves through `Empty -> Accumulating -> Sealed`. Nodes are
//! appended one statement at a time; sealing validates the whole schedule
//! and publishes it as a [`Schedule`].

use crate::config::ScheduleOptions;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::space::ParameterSpace;
use crate::schedule::handle::{BandIdAllocator, Schedule, ScheduleData};
use crate::schedule::node::{BandId, ScheduleNode};
use crate::schedule::query::violations_of;
use crate::utils::errors::{ScheduleError, ScheduleResult, ViolationReport};
use log::{debug, error, trace};
use std::sync::Arc;

/// Lifecycle state of a [`ScheduleBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// No node appended yet
    Empty,
    /// At least one node appended
    Accumulating,
    /// Schedule published; no further changes
    Sealed,
}

/// Builds a [`Schedule`] node by node.
#[derive(Debug)]
pub struct ScheduleBuilder {
    state: BuilderState,
    params: Arc<ParameterSpace>,
    options: ScheduleOptions,
    nodes: Vec<ScheduleNode>,
    total_coordinates: Option<usize>,
    max_band_count: usize,
}

impl ScheduleBuilder {
    /// Start a schedule over the given parameters.
    pub fn new(params: impl Into<Arc<ParameterSpace>>) -> Self {
        Self {
            state: BuilderState::Empty,
            params: params.into(),
            options: ScheduleOptions::default(),
            nodes: Vec::new(),
            total_coordinates: None,
            max_band_count: 0,
        }
    }

    /// Options the sealed schedule will carry.
    pub fn with_options(mut self, options: ScheduleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Nodes appended so far.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Append one statement's schedule map and band decomposition.
    ///
    /// The first node fixes the schedule's coordinate count. A failed
    /// append leaves the builder unchanged.
    pub fn append_node(
        &mut self,
        map: impl Into<Arc<AffineMap>>,
        band_ends: &[usize],
        band_ids: &[BandId],
    ) -> ScheduleResult<&mut Self> {
        if self.state == BuilderState::Sealed {
            return Err(ScheduleError::BuilderSealed);
        }
        let node = ScheduleNode::from_parts(map, band_ends, band_ids)?;
        self.append(node)
    }

    /// Append an already constructed node.
    pub fn append(&mut self, node: ScheduleNode) -> ScheduleResult<&mut Self> {
        if self.state == BuilderState::Sealed {
            return Err(ScheduleError::BuilderSealed);
        }
        let n_param = node.schedule_map().n_param();
        if n_param != self.params.len() {
            return Err(ScheduleError::ParameterMismatch {
                expected: self.params.len(),
                found: n_param,
            });
        }
        let coordinates = node.n_coordinates();
        match self.total_coordinates {
            Some(expected) if expected != coordinates => {
                return Err(ScheduleError::CoordinateMismatch {
                    node: self.nodes.len(),
                    expected,
                    found: coordinates,
                });
            }
            Some(_) => {}
            None => self.total_coordinates = Some(coordinates),
        }

        trace!(
            "append node {}: {} coordinates, bands {:?}",
            self.nodes.len(), coordinates, node.band_ends()
        );
        self.max_band_count = self.max_band_count.max(node.band_count());
        self.nodes.push(node);
        self.state = BuilderState::Accumulating;
        Ok(self)
    }

    /// Validate and publish the schedule.
    ///
    /// On an invariant violation the builder keeps its nodes and stays
    /// open.
    pub fn seal(&mut self) -> ScheduleResult<Schedule> {
        if self.state == BuilderState::Sealed {
            return Err(ScheduleError::BuilderSealed);
        }

        let nodes = std::mem::take(&mut self.nodes);
        let mut data = ScheduleData {
            band_ids: Arc::new(BandIdAllocator::above(&nodes)),
            nodes,
            max_band_count: self.max_band_count,
            total_coordinates: self.total_coordinates.unwrap_or(0),
            params: Arc::clone(&self.params),
            options: self.options.clone(),
        };
        data.refresh_max_band_count();

        let violations = violations_of(&data, 1);
        if !violations.is_empty() {
            error!("refusing to seal schedule:\n{}", ViolationReport(&violations));
            self.nodes = data.nodes;
            return Err(ScheduleError::InvariantViolation(violations));
        }

        debug!(
            "sealed schedule: {} nodes, {} coordinates, {} bands max",
            data.nodes.len(), data.total_coordinates, data.max_band_count
        );
        self.state = BuilderState::Sealed;
        Ok(Schedule::from_data(data))
    }
}
