//! Linear Kalman filter core shared by the motion models
//!
//! The filter owns the state mean and covariance only. Motion models supply
//! the transition (`A`), process noise (`Q`) and, for non-linear dynamics, the
//! already propagated mean; measurement models supply `C` and `R` of any
//! dimension.
//!
//! # Example
//!
//! ```
//! use multi_object_tracker::filters::kalman::KalmanFilter;
//! use multi_object_tracker::types::spaces::{
//!     Measurement, MeasurementCovariance, StateCovariance, StateVector,
//! };
//! use multi_object_tracker::types::transforms::{ObservationMatrix, TransitionMatrix};
//!
//! let mut filter = KalmanFilter::new(
//!     StateVector::from_array([0.0, 1.0]),
//!     StateCovariance::from_diagonal(&nalgebra::vector![1.0, 1.0]),
//! );
//!
//! let a = TransitionMatrix::from_matrix(nalgebra::matrix![1.0, 0.1; 0.0, 1.0]);
//! let q = StateCovariance::from_diagonal(&nalgebra::vector![0.01, 0.01]);
//! assert!(filter.predict_linear(&a, &q));
//!
//! let c = ObservationMatrix::from_matrix(nalgebra::matrix![1.0, 0.0]);
//! let r = MeasurementCovariance::from_diagonal(&nalgebra::vector![0.25]);
//! assert!(filter.update(&Measurement::from_array([0.12]), &c, &r));
//! ```

use crate::types::spaces::{Measurement, MeasurementCovariance, StateCovariance, StateVector};
use crate::types::transforms::{
    compute_innovation_covariance, compute_kalman_gain, joseph_update, ObservationMatrix,
    TransitionMatrix,
};
use crate::TrackerError;

// ============================================================================
// Kalman Filter
// ============================================================================

/// State estimate `(x, P)` with linear predict and update steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanFilter<const N: usize> {
    mean: StateVector<N>,
    covariance: StateCovariance<N>,
}

impl<const N: usize> KalmanFilter<N> {
    #[inline]
    pub fn new(mean: StateVector<N>, covariance: StateCovariance<N>) -> Self {
        Self { mean, covariance }
    }

    #[inline]
    pub fn mean(&self) -> &StateVector<N> {
        &self.mean
    }

    #[inline]
    pub fn covariance(&self) -> &StateCovariance<N> {
        &self.covariance
    }

    /// Mutable state access for clamping and explicit offsets.
    #[inline]
    pub fn mean_mut(&mut self) -> &mut StateVector<N> {
        &mut self.mean
    }

    /// Prediction with an externally propagated mean.
    ///
    /// - x = x_next
    /// - P = A * P * A^T + Q
    ///
    /// `A` is the Jacobian of the dynamics at the prior state. Returns `false`
    /// and leaves the filter untouched if the result is not finite.
    pub fn predict(
        &mut self,
        x_next: StateVector<N>,
        a: &TransitionMatrix<N>,
        q: &StateCovariance<N>,
    ) -> bool {
        let mut covariance = a.propagate_covariance(&self.covariance) + *q;
        covariance.symmetrize();

        if !x_next.is_finite() || !covariance.as_matrix().iter().all(|v| v.is_finite()) {
            return false;
        }

        self.mean = x_next;
        self.covariance = covariance;
        true
    }

    /// Linear prediction, `x = A * x`.
    pub fn predict_linear(&mut self, a: &TransitionMatrix<N>, q: &StateCovariance<N>) -> bool {
        let x_next = StateVector::from_svector(a.as_matrix() * self.mean.as_svector());
        self.predict(x_next, a, q)
    }

    /// Measurement update.
    ///
    /// - S = C * P * C^T + R
    /// - K = P * C^T * S^{-1}
    /// - x = x + K * (y - C * x)
    /// - P = Joseph form
    ///
    /// Returns `false` and leaves the filter untouched when `S` is singular.
    pub fn update<const M: usize>(
        &mut self,
        y: &Measurement<M>,
        c: &ObservationMatrix<M, N>,
        r: &MeasurementCovariance<M>,
    ) -> bool {
        self.try_update(y, c, r).is_ok()
    }

    /// [`update`](Self::update) reporting why it failed.
    ///
    /// # Errors
    /// [`TrackerError::SingularMatrix`] when `S` cannot be inverted or the
    /// corrected mean is not finite.
    pub fn try_update<const M: usize>(
        &mut self,
        y: &Measurement<M>,
        c: &ObservationMatrix<M, N>,
        r: &MeasurementCovariance<M>,
    ) -> Result<(), TrackerError> {
        let innovation = y.innovation(&c.observe(&self.mean));
        let innovation_cov = compute_innovation_covariance(&self.covariance, c, r);

        let gain = compute_kalman_gain(&self.covariance, c, &innovation_cov)
            .ok_or(TrackerError::SingularMatrix)?;

        let correction = gain.as_matrix() * innovation.as_svector();
        let mean = StateVector::from_svector(self.mean.as_svector() + correction);
        if !mean.is_finite() {
            return Err(TrackerError::SingularMatrix);
        }
        let mut covariance = joseph_update(&self.covariance, &gain, c, r);
        covariance.symmetrize();

        self.mean = mean;
        self.covariance = covariance;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{matrix, vector, SMatrix};

    fn cv_transition(dt: f64) -> TransitionMatrix<4> {
        TransitionMatrix::from_matrix(matrix![
            1.0, 0.0, dt, 0.0;
            0.0, 1.0, 0.0, dt;
            0.0, 0.0, 1.0, 0.0;
            0.0, 0.0, 0.0, 1.0
        ])
    }

    fn position_observation() -> ObservationMatrix<2, 4> {
        ObservationMatrix::from_matrix(matrix![
            1.0, 0.0, 0.0, 0.0;
            0.0, 1.0, 0.0, 0.0
        ])
    }

    #[test]
    fn test_kalman_predict() {
        let mut filter = KalmanFilter::new(
            StateVector::from_array([0.0, 0.0, 10.0, 0.0]),
            StateCovariance::from_diagonal(&vector![1.0, 1.0, 1.0, 1.0]),
        );
        let q = StateCovariance::from_diagonal(&vector![0.1, 0.1, 0.1, 0.1]);

        assert!(filter.predict_linear(&cv_transition(1.0), &q));

        // position advances by velocity
        assert!((filter.mean().index(0) - 10.0).abs() < 1e-10);
        assert!((filter.mean().index(1) - 0.0).abs() < 1e-10);
        assert!((filter.mean().index(2) - 10.0).abs() < 1e-10);

        // uncertainty grows
        assert!(filter.covariance().as_matrix()[(0, 0)] > 1.0);
    }

    #[test]
    fn test_kalman_update() {
        let mut filter = KalmanFilter::new(
            StateVector::zeros(),
            StateCovariance::from_matrix(SMatrix::<f64, 4, 4>::identity().scale(100.0)),
        );
        let r = MeasurementCovariance::from_diagonal(&vector![1.0, 1.0]);

        assert!(filter.update(&Measurement::from_array([10.0, 5.0]), &position_observation(), &r));

        assert!(filter.mean().index(0) > 5.0);
        assert!(filter.mean().index(1) > 2.0);
        assert!(filter.covariance().as_matrix()[(0, 0)] < 100.0);
    }

    #[test]
    fn test_update_with_other_dimension() {
        let mut filter = KalmanFilter::new(
            StateVector::from_array([0.0, 0.0, 0.0, 0.0]),
            StateCovariance::from_diagonal(&vector![1.0, 1.0, 1.0, 1.0]),
        );
        let c = ObservationMatrix::<4, 4>::from_matrix(SMatrix::identity());
        let r = MeasurementCovariance::from_diagonal(&vector![1.0, 1.0, 1.0, 1.0]);

        assert!(filter.update(&Measurement::from_array([2.0, 2.0, 4.0, 4.0]), &c, &r));
        assert!((filter.mean().index(2) - 2.0).abs() < 1e-10);
        assert!((filter.covariance().as_matrix()[(3, 3)] - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_singular_update_leaves_state() {
        let mut filter = KalmanFilter::new(
            StateVector::from_array([1.0, 2.0, 3.0, 4.0]),
            StateCovariance::zeros(),
        );
        let before = filter;
        let r = MeasurementCovariance::zeros();

        assert!(!filter.update(&Measurement::from_array([5.0, 5.0]), &position_observation(), &r));
        assert_eq!(filter, before);
    }

    #[test]
    fn test_try_update_reports_singular() {
        let mut filter = KalmanFilter::new(StateVector::<4>::zeros(), StateCovariance::zeros());
        let r = MeasurementCovariance::zeros();

        let result = filter.try_update(
            &Measurement::from_array([1.0, 1.0]),
            &position_observation(),
            &r,
        );
        assert!(matches!(result, Err(TrackerError::SingularMatrix)));
    }

    #[test]
    fn test_non_finite_prediction_rejected() {
        let mut filter = KalmanFilter::new(
            StateVector::from_array([0.0, 0.0, 1.0, 1.0]),
            StateCovariance::from_diagonal(&vector![1.0, 1.0, 1.0, 1.0]),
        );
        let before = filter;
        let q = StateCovariance::zeros();

        let x_next = StateVector::from_array([f64::NAN, 0.0, 1.0, 1.0]);
        assert!(!filter.predict(x_next, &cv_transition(0.1), &q));
        assert_eq!(filter, before);
    }
}
