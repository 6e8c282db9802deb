//! The coupled field state `{ψ, σ, λ, ω}` on a square grid.

use ciel_core::{Error, Result};

use crate::numeric::{all_finite_complex, all_finite_real, ComplexField, RealField};

/// Four arrays sharing one `(n, n)` shape. The shape is checked on
/// construction and every operator in this crate preserves it.
///
/// `Clone` is a deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    psi: ComplexField,
    sigma: RealField,
    lambda: ComplexField,
    omega: RealField,
}

impl FieldState {
    /// Assemble a state, rejecting non-square grids and mismatched shapes.
    pub fn from_parts(
        psi: ComplexField,
        sigma: RealField,
        lambda: ComplexField,
        omega: RealField,
    ) -> Result<Self> {
        let shape = psi.dim();
        if shape.0 != shape.1 {
            return Err(Error::shape_mismatch((shape.0, shape.0), shape));
        }
        for found in [sigma.dim(), lambda.dim(), omega.dim()] {
            if found != shape {
                return Err(Error::shape_mismatch(shape, found));
            }
        }
        Ok(Self::from_parts_unchecked(psi, sigma, lambda, omega))
    }

    pub(crate) fn from_parts_unchecked(
        psi: ComplexField,
        sigma: RealField,
        lambda: ComplexField,
        omega: RealField,
    ) -> Self {
        Self { psi, sigma, lambda, omega }
    }

    pub fn psi(&self) -> &ComplexField {
        &self.psi
    }

    pub fn sigma(&self) -> &RealField {
        &self.sigma
    }

    pub fn lambda(&self) -> &ComplexField {
        &self.lambda
    }

    pub fn omega(&self) -> &RealField {
        &self.omega
    }

    /// Replace ψ with a field of the same shape.
    pub fn with_psi(mut self, psi: ComplexField) -> Result<Self> {
        if psi.dim() != self.shape() {
            return Err(Error::shape_mismatch(self.shape(), psi.dim()));
        }
        self.psi = psi;
        Ok(self)
    }

    pub(crate) fn set_psi(&mut self, psi: ComplexField) {
        debug_assert_eq!(psi.dim(), self.psi.dim());
        self.psi = psi;
    }

    pub fn shape(&self) -> (usize, usize) {
        self.psi.dim()
    }

    /// Side length of the grid.
    pub fn grid_n(&self) -> usize {
        self.psi.nrows()
    }

    /// ψ and σ contain no NaN or Inf.
    pub fn is_finite(&self) -> bool {
        all_finite_complex(&self.psi) && all_finite_real(&self.sigma)
    }

    pub fn into_parts(self) -> (ComplexField, RealField, ComplexField, RealField) {
        (self.psi, self.sigma, self.lambda, self.omega)
    }
}
