//! Affine schedule maps.
//!
//! A schedule map sends every point of a statement's iteration domain to a
//! timestamp vector: one affine expression per output coordinate. Maps are
//! immutable once handed to a schedule and are shared between schedule
//! copies, so every transformation here returns a fresh map.

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::Space;
use crate::utils::errors::{ScheduleError, ScheduleResult};
use serde::{Serialize, Deserialize};
use std::fmt;

/// An affine map from a statement domain to the schedule time space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineMap {
    pub space: Space,
    /// Domain on which the map is defined
    pub domain: IntegerSet,
    /// Output expressions (one per output dimension)
    pub outputs: Vec<AffineExpr>,
}

impl AffineMap {
    /// Map defined on the whole `n_in`-dimensional space.
    pub fn from_outputs(n_in: usize, n_param: usize, outputs: Vec<AffineExpr>) -> Self {
        Self {
            space: Space::map_with_params(n_in, outputs.len(), n_param),
            domain: IntegerSet::universe(n_in, n_param),
            outputs,
        }
    }

    /// Identity schedule: `[i0, ..., in] -> [i0, ..., in]`.
    pub fn identity(n_dim: usize, n_param: usize) -> Self {
        let outputs = (0..n_dim)
            .map(|i| AffineExpr::var(i, n_dim, n_param))
            .collect();
        Self::from_outputs(n_dim, n_param, outputs)
    }

    /// Identity schedule prefixed by a constant statement position:
    /// `[i0, ..., in] -> [pos, i0, ..., in]`.
    pub fn sequenced(n_dim: usize, n_param: usize, pos: i64) -> Self {
        let outputs = std::iter::once(AffineExpr::constant(pos, n_dim, n_param))
            .chain((0..n_dim).map(|i| AffineExpr::var(i, n_dim, n_param)))
            .collect();
        Self::from_outputs(n_dim, n_param, outputs)
    }

    /// Restrict the map to a domain.
    pub fn with_domain(mut self, domain: IntegerSet) -> Self {
        self.domain = domain;
        self
    }

    /// Get input dimensions.
    pub fn n_in(&self) -> usize { self.space.n_in }

    /// Get output dimensions.
    pub fn n_out(&self) -> usize { self.space.n_dim }

    /// Get number of parameters.
    pub fn n_param(&self) -> usize { self.space.n_param }

    /// Apply the map to a point.
    pub fn apply(&self, input: &[i64], params: &[i64]) -> Vec<i64> {
        self.outputs.iter()
            .map(|expr| expr.evaluate(input, params))
            .collect()
    }

    /// Check that the map is a total, single-valued function on its domain.
    ///
    /// A map given by one affine expression per output is single-valued
    /// exactly when the expressions agree with the declared space: every
    /// output present, every expression over the map's inputs and
    /// parameters. Totality additionally requires the domain to live in the
    /// map's input space.
    pub fn check_functional(&self) -> ScheduleResult<()> {
        let fail = |reason: String| Err(ScheduleError::NonFunctionalMap { reason });

        if self.outputs.len() != self.n_out() {
            return fail(format!(
                "space declares {} outputs but {} expressions are given",
                self.n_out(), self.outputs.len()
            ));
        }
        if let Some((i, expr)) = self.outputs.iter().enumerate()
            .find(|(_, e)| e.n_dim() != self.n_in() || e.n_param() != self.n_param())
        {
            return fail(format!(
                "output {} ranges over {} inputs and {} parameters, expected {} and {}",
                i, expr.n_dim(), expr.n_param(), self.n_in(), self.n_param()
            ));
        }
        if self.domain.dim() != self.n_in() || self.domain.n_param() != self.n_param() {
            return fail(format!(
                "domain of dimension {} does not match map input dimension {}",
                self.domain.dim(), self.n_in()
            ));
        }
        if let Some((i, _)) = self.domain.malformed_constraints().next() {
            return fail(format!("domain constraint {} has the wrong arity", i));
        }
        Ok(())
    }

    /// Project onto the output coordinates `[lo, hi)`.
    ///
    /// Returns `None` if the range is not within the map's outputs.
    pub fn project_outputs(&self, lo: usize, hi: usize) -> Option<AffineMap> {
        if lo > hi || hi > self.n_out() {
            return None;
        }
        Some(Self {
            space: self.space.with_n_out(hi - lo),
            domain: self.domain.clone(),
            outputs: self.outputs[lo..hi].to_vec(),
        })
    }

    /// Reorder the outputs `[offset, offset + perm.len())` so that new
    /// coordinate `offset + k` is old coordinate `offset + perm[k]`.
    ///
    /// Returns `None` if `perm` is not a permutation or runs past the outputs.
    pub fn permute_outputs(&self, offset: usize, perm: &[usize]) -> Option<AffineMap> {
        if offset + perm.len() > self.n_out() || !is_permutation(perm) {
            return None;
        }
        let mut outputs = self.outputs.clone();
        for (k, &p) in perm.iter().enumerate() {
            outputs[offset + k] = self.outputs[offset + p].clone();
        }
        Some(Self {
            space: self.space.clone(),
            domain: self.domain.clone(),
            outputs,
        })
    }
}

/// Whether `perm` contains each of `0..perm.len()` exactly once.
pub fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    perm.iter().all(|&p| p < seen.len() && !std::mem::replace(&mut seen[p], true))
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_in()).map(|i| format!("i{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        let outputs: Vec<String> = self.outputs.iter()
            .map(|expr| expr.to_string_with_names(&dim_names, &param_names))
            .collect();
        write!(f, "{{ [{}] -> [{}] }}", dim_names.join(", "), outputs.join(", "))
    }
}
