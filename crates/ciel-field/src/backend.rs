//! Array backend trait: the numeric capability the operators run on.
//!
//! ```text
//! kernel / drift / reporter
//!   │
//!   └── ArrayBackend          ← trait call, dispatched at runtime
//!         ├── CpuBackend      ← serial ndarray loops (default)
//!         └── ParallelBackend ← ndarray + rayon (feature = "parallel")
//! ```
//!
//! Backends hold no data between calls. Elementwise operations must give
//! identical results on every backend; reductions may differ in the last
//! bits because parallel sums associate differently.

use ndarray::{Array2, Zip};
use num_complex::Complex64;
use std::fmt;
use std::sync::Arc;

use crate::numeric::{self, ComplexField, RealField};

pub type ComplexMap<'a> = &'a (dyn Fn(Complex64) -> Complex64 + Sync);
pub type ComplexZip<'a> = &'a (dyn Fn(Complex64, Complex64) -> Complex64 + Sync);
pub type RealZip<'a> = &'a (dyn Fn(f64, f64) -> f64 + Sync);

pub trait ArrayBackend: Send + Sync + fmt::Debug {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &'static str;

    fn laplacian_complex(&self, a: &ComplexField) -> ComplexField;

    fn laplacian_real(&self, a: &RealField) -> RealField;

    fn mean(&self, a: &RealField) -> f64;

    /// Mean of |a|².
    fn mean_abs_sq(&self, a: &ComplexField) -> f64;

    fn abs(&self, a: &ComplexField) -> RealField;

    fn abs_sq(&self, a: &ComplexField) -> RealField;

    /// `f(a)` cell by cell.
    fn map_complex(&self, a: &ComplexField, f: ComplexMap<'_>) -> ComplexField;

    /// `f(a, b)` cell by cell. Shapes must agree.
    fn zip_complex(&self, a: &ComplexField, b: &ComplexField, f: ComplexZip<'_>) -> ComplexField;

    /// `f(a, b)` cell by cell. Shapes must agree.
    fn zip_real(&self, a: &RealField, b: &RealField, f: RealZip<'_>) -> RealField;

    /// `a · exp(iθ)`.
    fn rotate_phase(&self, a: &ComplexField, theta: f64) -> ComplexField {
        let factor = Complex64::from_polar(1.0, theta);
        self.map_complex(a, &move |z| z * factor)
    }

    /// RMS norm with the ε guard.
    fn rms_norm(&self, a: &ComplexField) -> f64 {
        self.mean_abs_sq(a).sqrt() + numeric::NORM_EPS
    }

    /// `a / ‖a‖`.
    fn normalize(&self, a: &ComplexField) -> ComplexField {
        let norm = self.rms_norm(a);
        self.map_complex(a, &move |z| z / norm)
    }
}

/// Serial CPU backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl ArrayBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn laplacian_complex(&self, a: &ComplexField) -> ComplexField {
        numeric::laplacian(a)
    }

    fn laplacian_real(&self, a: &RealField) -> RealField {
        numeric::laplacian(a)
    }

    fn mean(&self, a: &RealField) -> f64 {
        numeric::mean(a)
    }

    fn mean_abs_sq(&self, a: &ComplexField) -> f64 {
        numeric::mean_abs_sq(a)
    }

    fn abs(&self, a: &ComplexField) -> RealField {
        a.mapv(|z| z.norm())
    }

    fn abs_sq(&self, a: &ComplexField) -> RealField {
        a.mapv(|z| z.norm_sqr())
    }

    fn map_complex(&self, a: &ComplexField, f: ComplexMap<'_>) -> ComplexField {
        a.mapv(f)
    }

    fn zip_complex(&self, a: &ComplexField, b: &ComplexField, f: ComplexZip<'_>) -> ComplexField {
        let mut out = Array2::from_elem(a.dim(), Complex64::default());
        Zip::from(&mut out)
            .and(a)
            .and(b)
            .for_each(|o, &x, &y| *o = f(x, y));
        out
    }

    fn zip_real(&self, a: &RealField, b: &RealField, f: RealZip<'_>) -> RealField {
        let mut out = Array2::zeros(a.dim());
        Zip::from(&mut out)
            .and(a)
            .and(b)
            .for_each(|o, &x, &y| *o = f(x, y));
        out
    }
}

#[cfg(feature = "parallel")]
pub use parallel::ParallelBackend;

#[cfg(feature = "parallel")]
mod parallel {
    use super::*;
    use crate::numeric::StencilScalar;
    use ndarray::parallel::prelude::*;
    use ndarray::s;

    /// Rayon-parallel backend over ndarray's parallel producers.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ParallelBackend;

    fn par_laplacian<T: StencilScalar + Send + Sync>(a: &Array2<T>) -> Array2<T> {
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
            .par_for_each(|o, &down, &up, &right, &left, &centre| {
                *o = down + up + right + left - centre * 4.0;
            });
        out
    }

    impl ArrayBackend for ParallelBackend {
        fn name(&self) -> &'static str {
            "parallel"
        }

        fn laplacian_complex(&self, a: &ComplexField) -> ComplexField {
            par_laplacian(a)
        }

        fn laplacian_real(&self, a: &RealField) -> RealField {
            par_laplacian(a)
        }

        fn mean(&self, a: &RealField) -> f64 {
            if a.is_empty() {
                return 0.0;
            }
            a.par_iter().sum::<f64>() / a.len() as f64
        }

        fn mean_abs_sq(&self, a: &ComplexField) -> f64 {
            if a.is_empty() {
                return 0.0;
            }
            a.par_iter().map(|z| z.norm_sqr()).sum::<f64>() / a.len() as f64
        }

        fn abs(&self, a: &ComplexField) -> RealField {
            let mut out = Array2::zeros(a.dim());
            Zip::from(&mut out).and(a).par_for_each(|o, z| *o = z.norm());
            out
        }

        fn abs_sq(&self, a: &ComplexField) -> RealField {
            let mut out = Array2::zeros(a.dim());
            Zip::from(&mut out).and(a).par_for_each(|o, z| *o = z.norm_sqr());
            out
        }

        fn map_complex(&self, a: &ComplexField, f: ComplexMap<'_>) -> ComplexField {
            let mut out = Array2::from_elem(a.dim(), Complex64::default());
            Zip::from(&mut out).and(a).par_for_each(|o, &z| *o = f(z));
            out
        }

        fn zip_complex(&self, a: &ComplexField, b: &ComplexField, f: ComplexZip<'_>) -> ComplexField {
            let mut out = Array2::from_elem(a.dim(), Complex64::default());
            Zip::from(&mut out)
                .and(a)
                .and(b)
                .par_for_each(|o, &x, &y| *o = f(x, y));
            out
        }

        fn zip_real(&self, a: &RealField, b: &RealField, f: RealZip<'_>) -> RealField {
            let mut out = Array2::zeros(a.dim());
            Zip::from(&mut out)
                .and(a)
                .and(b)
                .par_for_each(|o, &x, &y| *o = f(x, y));
            out
        }
    }
}

/// Pick the backend for a runtime. Acceleration falls back to the CPU
/// backend when the `parallel` feature is not compiled in.
pub fn select_backend(enable_acceleration: bool) -> Arc<dyn ArrayBackend> {
    if enable_acceleration {
        #[cfg(feature = "parallel")]
        {
            return Arc::new(ParallelBackend);
        }
        #[cfg(not(feature = "parallel"))]
        tracing::warn!("acceleration requested but the `parallel` feature is not enabled, using cpu backend");
    }
    Arc::new(CpuBackend)
}
