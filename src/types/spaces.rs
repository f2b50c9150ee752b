//! Vector space markers and typed vectors
//!
//! State vectors, measurements and innovations are kept apart at the type
//! level so a motion model cannot feed a measurement where a state belongs.

use ::core::marker::PhantomData;
use ::core::ops::{Add, Sub};
use nalgebra::{SMatrix, SVector};

// ============================================================================
// Vector Space Markers
// ============================================================================

/// Marker type for filter state vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker type for measurement vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker type for innovation vectors (measurement - predicted measurement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// An `N`-dimensional vector bound to a space.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector<const N: usize, Space> {
    inner: SVector<f64, N>,
    _marker: PhantomData<Space>,
}

impl<const N: usize, Space> Vector<N, Space> {
    #[inline]
    pub fn from_array(data: [f64; N]) -> Self {
        Self::from_svector(SVector::from(data))
    }

    #[inline]
    pub fn from_svector(inner: SVector<f64, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn zeros() -> Self {
        Self::from_svector(SVector::zeros())
    }

    #[inline]
    pub fn as_svector(&self) -> &SVector<f64, N> {
        &self.inner
    }

    /// Mutable access for in-place clamping and normalization.
    #[inline]
    pub fn as_svector_mut(&mut self) -> &mut SVector<f64, N> {
        &mut self.inner
    }

    /// Element at `index`.
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> f64 {
        self.inner[index]
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| v.is_finite())
    }
}

/// A state vector in state space.
pub type StateVector<const N: usize> = Vector<N, StateSpace>;

/// A measurement vector in measurement space.
pub type Measurement<const M: usize> = Vector<M, MeasurementSpace>;

/// An innovation vector (measurement residual).
pub type Innovation<const M: usize> = Vector<M, InnovationSpace>;

impl<const N: usize, Space> Add for Vector<N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::from_svector(self.inner + rhs.inner)
    }
}

impl<const N: usize, Space> Sub for Vector<N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::from_svector(self.inner - rhs.inner)
    }
}

// ============================================================================
// Special Operation: Measurement - Measurement = Innovation
// ============================================================================

impl<const M: usize> Measurement<M> {
    /// Residual between this measurement and a predicted one.
    #[inline]
    pub fn innovation(&self, predicted: &Measurement<M>) -> Innovation<M> {
        Innovation::from_svector(self.inner - predicted.inner)
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// A covariance matrix bound to a vector space.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariance<const N: usize, Space> {
    inner: SMatrix<f64, N, N>,
    _marker: PhantomData<Space>,
}

impl<const N: usize, Space> Covariance<N, Space> {
    /// Wraps a raw matrix. The caller keeps it symmetric positive semi-definite.
    #[inline]
    pub fn from_matrix(inner: SMatrix<f64, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn zeros() -> Self {
        Self::from_matrix(SMatrix::zeros())
    }

    #[inline]
    pub fn from_diagonal(diag: &SVector<f64, N>) -> Self {
        Self::from_matrix(SMatrix::from_diagonal(diag))
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<f64, N, N> {
        &self.inner
    }

    #[inline]
    pub fn as_matrix_mut(&mut self) -> &mut SMatrix<f64, N, N> {
        &mut self.inner
    }

    /// Forces exact symmetry, `(P + P^T) / 2`.
    #[inline]
    pub fn symmetrize(&mut self) {
        self.inner = (self.inner + self.inner.transpose()) * 0.5;
    }
}

impl<const N: usize, Space> Add for Covariance<N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::from_matrix(self.inner + rhs.inner)
    }
}

/// Covariance matrix in state space.
pub type StateCovariance<const N: usize> = Covariance<N, StateSpace>;

/// Covariance matrix in measurement space (also used for `S = CPC' + R`).
pub type MeasurementCovariance<const M: usize> = Covariance<M, MeasurementSpace>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_vector_operations() {
        let v1: StateVector<4> = StateVector::from_array([1.0, 2.0, 3.0, 4.0]);
        let v2: StateVector<4> = StateVector::from_array([0.5, 1.0, 1.5, 2.0]);

        let sum = v1 + v2;
        assert!((sum.index(0) - 1.5).abs() < 1e-10);
        assert!((sum.index(1) - 3.0).abs() < 1e-10);
        assert!(sum.is_finite());
    }

    #[test]
    fn test_measurement_to_innovation() {
        let actual: Measurement<2> = Measurement::from_array([10.0, 20.0]);
        let predicted: Measurement<2> = Measurement::from_array([9.5, 19.0]);

        let innovation = actual.innovation(&predicted);
        assert!((innovation.index(0) - 0.5).abs() < 1e-10);
        assert!((innovation.index(1) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_symmetrize() {
        let mut p: StateCovariance<2> =
            StateCovariance::from_matrix(nalgebra::matrix![1.0, 0.2; 0.4, 1.0]);
        p.symmetrize();
        assert!((p.as_matrix()[(0, 1)] - 0.3).abs() < 1e-12);
        assert!((p.as_matrix()[(1, 0)] - 0.3).abs() < 1e-12);
    }
}
