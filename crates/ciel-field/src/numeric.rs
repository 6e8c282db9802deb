//! Numeric primitives on 2-D grids.
//!
//!   L(a)[i,j] = a[i+1,j] + a[i-1,j] + a[i,j+1] + a[i,j-1] - 4·a[i,j]   (interior)
//!   ‖a‖       = sqrt(mean(|a|²)) + ε
//!   C(ψ)      = 1 / (1 + mean|∂xψ|² + mean|∂yψ|²)
//!
//! All functions are pure. Boundary cells of the Laplacian are zero.

use ciel_core::{Result, SeedConfig};
use ndarray::{s, Array2, ArrayView2, Zip};
use num_complex::Complex64;
use std::ops::{Add, Mul, Sub};

use crate::state::FieldState;

pub type ComplexField = Array2<Complex64>;
pub type RealField = Array2<f64>;

/// Guard added to the RMS norm so it can always be divided by.
pub const NORM_EPS: f64 = 1e-12;

/// Extent of the seed coordinate window, `[-SEED_EXTENT, SEED_EXTENT)`.
const SEED_EXTENT: f64 = 2.0;

/// Scalars the Laplacian stencil works over (`f64` and `Complex64`).
pub trait StencilScalar:
    Copy + Default + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self>
{
}

impl<T> StencilScalar for T where
    T: Copy + Default + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>
{
}

/// Five-point Laplacian with a zero boundary.
pub fn laplacian<T: StencilScalar>(a: &Array2<T>) -> Array2<T> {
    let (rows, cols) = a.dim();
    let mut out = Array2::from_elem((rows, cols), T::default());
    if rows < 3 || cols < 3 {
        return out;
    }
    Zip::from(out.slice_mut(s![1..-1, 1..-1]))
        .and(a.slice(s![2.., 1..-1]))
        .and(a.slice(s![..-2, 1..-1]))
        .and(a.slice(s![1..-1, 2..]))
        .and(a.slice(s![1..-1, ..-2]))
        .and(a.slice(s![1..-1, 1..-1]))
        .for_each(|o, &down, &up, &right, &left, &centre| {
            *o = down + up + right + left - centre * 4.0;
        });
    out
}

/// Mean of |a|² over every cell. Empty arrays have mean zero.
pub fn mean_abs_sq(a: &ComplexField) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().map(|z| z.norm_sqr()).sum::<f64>() / a.len() as f64
}

/// RMS norm with the ε guard.
pub fn rms_norm(a: &ComplexField) -> f64 {
    mean_abs_sq(a).sqrt() + NORM_EPS
}

/// Smoothness of ψ in (0, 1]; 1 for a constant field.
pub fn coherence(psi: &ComplexField) -> f64 {
    let energy = gradient_energy(psi.view());
    1.0 / (1.0 + energy)
}

/// Mean squared forward difference along both axes.
fn gradient_energy(psi: ArrayView2<'_, Complex64>) -> f64 {
    let (rows, cols) = psi.dim();
    let mut energy = 0.0;
    if rows >= 2 {
        let dx = &psi.slice(s![1.., ..]) - &psi.slice(s![..-1, ..]);
        energy += dx.iter().map(|z| z.norm_sqr()).sum::<f64>() / dx.len() as f64;
    }
    if cols >= 2 {
        let dy = &psi.slice(s![.., 1..]) - &psi.slice(s![.., ..-1]);
        energy += dy.iter().map(|z| z.norm_sqr()).sum::<f64>() / dy.len() as f64;
    }
    energy
}

/// Mean of a real field. Empty arrays have mean zero.
pub fn mean(a: &RealField) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.sum() / a.len() as f64
}

/// Population variance of a real field.
pub fn variance(a: &RealField) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let mu = mean(a);
    a.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / a.len() as f64
}

/// True when every component of every cell is finite.
pub fn all_finite_complex(a: &ComplexField) -> bool {
    a.iter().all(|z| z.re.is_finite() && z.im.is_finite())
}

pub fn all_finite_real(a: &RealField) -> bool {
    a.iter().all(|v| v.is_finite())
}

/// Normalized overlap |⟨a, b⟩| / (|a|·|b|) in [0, 1].
pub fn overlap(a: &ComplexField, b: &ComplexField) -> f64 {
    let inner: Complex64 = Zip::from(a)
        .and(b)
        .fold(Complex64::default(), |acc, x, y| acc + x.conj() * y);
    let na = a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    let nb = b.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (inner.norm() / (na * nb)).min(1.0)
}

/// Grid coordinates `-2 + 4·i/n` for `i in 0..n`; index `n/2` lands on zero.
pub fn seed_axis(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| -SEED_EXTENT + 2.0 * SEED_EXTENT * i as f64 / n as f64)
        .collect()
}

/// Gaussian-chirp seed: unit-norm ψ, Gaussian σ, λ = 0.1, ω = 0.
pub fn seed(n: usize) -> FieldState {
    let axis = seed_axis(n);
    let psi = Array2::from_shape_fn((n, n), |(i, j)| {
        let (x, y) = (axis[j], axis[i]);
        Complex64::from_polar((-(x * x + y * y)).exp(), x + 0.2 * y)
    });
    // exact unit RMS; the Gaussian is never zero so no ε is needed
    let norm = mean_abs_sq(&psi).sqrt();
    let psi = psi.mapv(|z| z / norm);
    let sigma = Array2::from_shape_fn((n, n), |(i, j)| {
        let (x, y) = (axis[j], axis[i]);
        (-(x * x + y * y) / 2.0).exp()
    });
    let lambda = Array2::from_elem((n, n), Complex64::new(0.1, 0.0));
    let omega = Array2::zeros((n, n));
    FieldState::from_parts_unchecked(psi, sigma, lambda, omega)
}

/// Seed from a validated `SeedConfig`.
pub fn seed_from_config(config: &SeedConfig) -> Result<FieldState> {
    config.validate()?;
    Ok(seed(config.n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn laplacian_of_linear_ramp_is_zero_inside() {
        let a = Array2::from_shape_fn((5, 5), |(i, j)| (2 * i + j) as f64);
        let l = laplacian(&a);
        for v in l.iter() {
            assert!(v.abs() < 1e-12);
        }
    }

    #[test]
    fn laplacian_of_point_source() {
        let mut a = Array2::<f64>::zeros((5, 5));
        a[[2, 2]] = 1.0;
        let l = laplacian(&a);
        assert_eq!(l[[2, 2]], -4.0);
        assert_eq!(l[[1, 2]], 1.0);
        assert_eq!(l[[3, 2]], 1.0);
        assert_eq!(l[[2, 1]], 1.0);
        assert_eq!(l[[2, 3]], 1.0);
        assert_eq!(l[[1, 1]], 0.0);
    }

    #[test]
    fn laplacian_boundary_is_zero() {
        let a = Array2::from_shape_fn((6, 6), |(i, j)| ((i * j) as f64).sin() + 3.0);
        let l = laplacian(&a);
        for k in 0..6 {
            assert_eq!(l[[0, k]], 0.0);
            assert_eq!(l[[5, k]], 0.0);
            assert_eq!(l[[k, 0]], 0.0);
            assert_eq!(l[[k, 5]], 0.0);
        }
    }

    #[test]
    fn laplacian_of_tiny_grid_is_all_zero() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(laplacian(&a), Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn laplacian_complex_matches_componentwise() {
        let a = Array2::from_shape_fn((4, 4), |(i, j)| Complex64::new(i as f64 * i as f64, j as f64 * j as f64));
        let l = laplacian(&a);
        // ∇²(i²) = 2, ∇²(j²) = 2 on interior
        assert_eq!(l[[1, 1]], Complex64::new(2.0, 2.0));
        assert_eq!(l[[2, 2]], Complex64::new(2.0, 2.0));
    }

    #[test]
    fn rms_norm_of_constant_field() {
        let a = Array2::from_elem((4, 4), Complex64::new(0.0, 2.0));
        assert!((rms_norm(&a) - 2.0).abs() < 1e-11);
        let zero = Array2::<Complex64>::zeros((4, 4));
        assert_eq!(rms_norm(&zero), NORM_EPS);
    }

    #[test]
    fn coherence_of_constant_field_is_one() {
        let a = Array2::from_elem((8, 8), Complex64::new(0.3, -0.4));
        assert_eq!(coherence(&a), 1.0);
    }

    #[test]
    fn coherence_drops_for_checkerboard() {
        let a = Array2::from_shape_fn((8, 8), |(i, j)| {
            Complex64::new(if (i + j) % 2 == 0 { 1.0 } else { -1.0 }, 0.0)
        });
        // every neighbour differs by 2 → |∂|² = 4 on each axis
        assert!((coherence(&a) - 1.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn variance_of_known_values() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        assert!((mean(&a) - 2.5).abs() < 1e-12);
        assert!((variance(&a) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn seed_axis_centres_on_zero() {
        let axis = seed_axis(8);
        assert_eq!(axis[0], -2.0);
        assert_eq!(axis[4], 0.0);
        assert!(axis[7] < 2.0);
    }

    #[test]
    fn overlap_of_field_with_itself_is_one() {
        let s = seed(16);
        assert!((overlap(s.psi(), s.psi()) - 1.0).abs() < 1e-12);
        let rotated = s.psi().mapv(|z| z * Complex64::from_polar(1.0, 0.7));
        assert!((overlap(s.psi(), &rotated) - 1.0).abs() < 1e-12);
    }
}
