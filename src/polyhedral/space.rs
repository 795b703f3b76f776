//! Polyhedral spaces define the dimensions of domains and schedule maps.
//!
//! A space describes the structure of an iteration domain or map:
//! - Input dimensions (for maps)
//! - Output dimensions
//! - Parameter dimensions (symbolic constants)
//!
//! The parameters themselves are described once per schedule by a
//! [`ParameterSpace`], which every statement's map refers to.

use serde::{Serialize, Deserialize};
use std::fmt;
use std::sync::Arc;

/// Symbolic parameters shared by every statement of a schedule.
///
/// Immutable once built; schedules hold it behind an [`Arc`] so every copy
/// of a schedule refers to the same descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ParameterSpace {
    names: Vec<String>,
}

impl ParameterSpace {
    /// Create a descriptor from parameter names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// A descriptor without parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap the descriptor for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the parameter at `idx`.
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(|s| s.as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a named parameter.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl fmt::Display for ParameterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

/// A polyhedral space describes the dimensionality and structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Number of set/output dimensions
    pub n_dim: usize,
    /// Number of parameter dimensions
    pub n_param: usize,
    /// Number of input dimensions (for maps only)
    pub n_in: usize,
}

impl Space {
    /// Create a new set space with parameters.
    pub fn set_with_params(n_dim: usize, n_param: usize) -> Self {
        Self {
            n_dim,
            n_param,
            n_in: 0,
        }
    }

    /// Create a new map space with parameters.
    pub fn map_with_params(n_in: usize, n_out: usize, n_param: usize) -> Self {
        Self {
            n_dim: n_out,
            n_param,
            n_in,
        }
    }

    /// Get the number of output/set dimensions.
    pub fn dim(&self) -> usize {
        self.n_dim
    }

    /// Dimension names `prefix0, prefix1, ...` for printing.
    pub fn all_dim_names(&self, prefix: &str) -> Vec<String> {
        (0..self.n_dim).map(|i| format!("{}{}", prefix, i)).collect()
    }

    /// The same map space with a different number of outputs.
    pub fn with_n_out(&self, n_out: usize) -> Space {
        Space::map_with_params(self.n_in, n_out, self.n_param)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.n_in > 0 {
            write!(f, "[{}] -> [{}]", self.n_in, self.n_dim)?;
        } else {
            write!(f, "[{}]", self.n_dim)?;
        }
        if self.n_param > 0 {
            write!(f, " : {} params", self.n_param)?;
        }
        Ok(())
    }
}
