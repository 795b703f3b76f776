//! Integer sets (polyhedra) for statement iteration domains.

use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::space::Space;
use serde::{Serialize, Deserialize};
use std::fmt;

/// An integer set defined by a conjunction of affine constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerSet {
    pub space: Space,
    pub constraints: Vec<Constraint>,
}

impl IntegerSet {
    /// The unconstrained set of the given dimensionality.
    pub fn universe(n_dim: usize, n_param: usize) -> Self {
        Self {
            space: Space::set_with_params(n_dim, n_param),
            constraints: Vec::new(),
        }
    }

    /// `0 <= d_i < bounds[i]` for every dimension.
    pub fn rectangular(bounds: &[i64]) -> Self {
        let n_dim = bounds.len();
        bounds.iter().enumerate().fold(Self::universe(n_dim, 0), |set, (i, &bound)| {
            set.with_constraint(Constraint::lower_bound(i, 0, n_dim, 0))
                .with_constraint(Constraint::strict_upper_bound(i, bound, n_dim, 0))
        })
    }

    /// `0 <= d_i < params[i]` for every dimension, the usual shape of a
    /// loop nest bounded by symbolic sizes.
    pub fn parametric_box(params: &[usize], n_param: usize) -> Self {
        let n_dim = params.len();
        params.iter().enumerate().fold(Self::universe(n_dim, n_param), |set, (i, &p)| {
            set.with_constraint(Constraint::lower_bound(i, 0, n_dim, n_param))
                .with_constraint(Constraint::below_param(i, p, n_dim, n_param))
        })
    }

    pub fn dim(&self) -> usize { self.space.n_dim }
    pub fn n_param(&self) -> usize { self.space.n_param }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(point, params))
    }

    /// Constraints whose arity disagrees with the set's space.
    pub fn malformed_constraints(&self) -> impl Iterator<Item = (usize, &Constraint)> {
        self.constraints.iter().enumerate().filter(move |(_, c)| {
            c.expr.n_dim() != self.dim() || c.expr.n_param() != self.n_param()
        })
    }
}

impl fmt::Display for IntegerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names = self.space.all_dim_names("i");
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{{ [{}]", dim_names.join(", "))?;
        if !self.constraints.is_empty() {
            let cs: Vec<String> = self.constraints.iter()
                .map(|c| c.to_string_with_names(&dim_names, &param_names))
                .collect();
            write!(f, " : {}", cs.join(" and "))?;
        }
        write!(f, " }}")
    }
}
