//! Affine expressions over iteration dimensions and parameters.
//!
//! An affine expression is a linear combination of variables plus a constant:
//! `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn + p1*P1 + ...`

use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(pcoeff[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self::constant(0, n_dim, n_param)
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single dimension variable.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        if dim < n_dim {
            expr.coeffs[dim] = 1;
        }
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(param_idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        if param_idx < n_param {
            expr.param_coeffs[param_idx] = 1;
        }
        expr
    }

    /// Builder-style constant offset.
    pub fn plus(mut self, offset: i64) -> Self {
        self.constant += offset;
        self
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> i64 {
        let dims = self.coeffs.iter().zip(dim_values).map(|(&c, &v)| c * v);
        let params = self.param_coeffs.iter().zip(param_values).map(|(&c, &v)| c * v);
        self.constant + dims.sum::<i64>() + params.sum::<i64>()
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// Convert to string with given dimension and parameter names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut parts = Vec::new();

        let terms = self.coeffs.iter().enumerate()
            .map(|(i, &c)| (c, dim_names.get(i).cloned().unwrap_or_else(|| format!("d{}", i))))
            .chain(self.param_coeffs.iter().enumerate()
                .map(|(i, &c)| (c, param_names.get(i).cloned().unwrap_or_else(|| format!("p{}", i)))));

        for (c, name) in terms {
            match c {
                0 => {}
                1 => parts.push(name),
                -1 => parts.push(format!("-{}", name)),
                _ => parts.push(format!("{}*{}", c, name)),
            }
        }

        if self.constant != 0 || parts.is_empty() {
            parts.push(self.constant.to_string());
        }

        parts.join(" + ").replace("+ -", "- ")
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a + b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b).collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("i{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let expr = AffineExpr::constant(5, 2, 1);
        assert_eq!(expr.evaluate(&[1, 2], &[3]), 5);
    }

    #[test]
    fn test_var_and_param() {
        let expr = AffineExpr::var(0, 2, 1) + AffineExpr::param(0, 2, 1).scale(2);
        assert_eq!(expr.evaluate(&[7, 3], &[10]), 27);
    }

    #[test]
    fn test_sub() {
        let diff = AffineExpr::var(0, 2, 0) - AffineExpr::var(1, 2, 0);
        assert_eq!(diff.evaluate(&[3, 4], &[]), -1);
    }

    #[test]
    fn test_display() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.constant = 5;
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.param_coeffs[0] = 1;

        let s = expr.to_string_with_names(
            &["i".to_string(), "j".to_string()],
            &["N".to_string()],
        );
        assert_eq!(s, "2*i - j + N + 5");
        assert_eq!(AffineExpr::zero(1, 0).to_string(), "0");
    }
}
