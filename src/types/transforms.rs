//! Typed transformation matrices
//!
//! Transition (`A`), observation (`C`) and gain (`K`) matrices carry their
//! source and target spaces, and the Kalman update algebra is written in terms
//! of them.

use ::core::marker::PhantomData;
use nalgebra::SMatrix;

use super::spaces::{
    InnovationSpace, Measurement, MeasurementCovariance, MeasurementSpace, StateCovariance,
    StateSpace, StateVector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A `ROWS x COLS` matrix mapping vectors in `From` to vectors in `To`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform<const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<f64, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<const ROWS: usize, const COLS: usize, To, From> Transform<ROWS, COLS, To, From> {
    #[inline]
    pub fn from_matrix(inner: SMatrix<f64, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<f64, ROWS, COLS> {
        &self.inner
    }
}

/// State transition matrix: StateSpace -> StateSpace
pub type TransitionMatrix<const N: usize> = Transform<N, N, StateSpace, StateSpace>;

/// Observation matrix: StateSpace -> MeasurementSpace
pub type ObservationMatrix<const M: usize, const N: usize> =
    Transform<M, N, MeasurementSpace, StateSpace>;

/// Kalman gain: InnovationSpace -> StateSpace
pub type KalmanGain<const N: usize, const M: usize> = Transform<N, M, StateSpace, InnovationSpace>;

impl<const N: usize> TransitionMatrix<N> {
    /// Propagates a covariance: `A * P * A^T`
    #[inline]
    pub fn propagate_covariance(&self, cov: &StateCovariance<N>) -> StateCovariance<N> {
        StateCovariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

impl<const M: usize, const N: usize> ObservationMatrix<M, N> {
    /// Predicted measurement of a state: `C * x`
    #[inline]
    pub fn observe(&self, state: &StateVector<N>) -> Measurement<M> {
        Measurement::from_svector(self.inner * state.as_svector())
    }

    /// Projects state covariance to measurement space: `C * P * C^T`
    #[inline]
    pub fn project_covariance(&self, cov: &StateCovariance<N>) -> MeasurementCovariance<M> {
        MeasurementCovariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

// ============================================================================
// Kalman Update Algebra
// ============================================================================

/// Innovation covariance `S = C * P * C^T + R`.
pub fn compute_innovation_covariance<const N: usize, const M: usize>(
    state_cov: &StateCovariance<N>,
    obs_matrix: &ObservationMatrix<M, N>,
    meas_noise: &MeasurementCovariance<M>,
) -> MeasurementCovariance<M> {
    obs_matrix.project_covariance(state_cov) + *meas_noise
}

/// Kalman gain `K = P * C^T * S^{-1}`, or `None` when `S` is singular.
pub fn compute_kalman_gain<const N: usize, const M: usize>(
    state_cov: &StateCovariance<N>,
    obs_matrix: &ObservationMatrix<M, N>,
    innovation_cov: &MeasurementCovariance<M>,
) -> Option<KalmanGain<N, M>> {
    let s_inv = innovation_cov.as_matrix().try_inverse()?;
    let k = state_cov.as_matrix() * obs_matrix.as_matrix().transpose() * s_inv;
    Some(KalmanGain::from_matrix(k))
}

/// Joseph-form covariance update.
///
/// `P+ = (I - K*C) * P * (I - K*C)^T + K * R * K^T`
pub fn joseph_update<const N: usize, const M: usize>(
    state_cov: &StateCovariance<N>,
    kalman_gain: &KalmanGain<N, M>,
    obs_matrix: &ObservationMatrix<M, N>,
    meas_noise: &MeasurementCovariance<M>,
) -> StateCovariance<N> {
    let k = kalman_gain.as_matrix();
    let i_kc = SMatrix::<f64, N, N>::identity() - k * obs_matrix.as_matrix();

    let term1 = i_kc * state_cov.as_matrix() * i_kc.transpose();
    let term2 = k * meas_noise.as_matrix() * k.transpose();

    StateCovariance::from_matrix(term1 + term2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_matrix() {
        // position of [x, y, vx, vy]
        let c = ObservationMatrix::<2, 4>::from_matrix(nalgebra::matrix![
            1.0, 0.0, 0.0, 0.0;
            0.0, 1.0, 0.0, 0.0
        ]);

        let state = StateVector::from_array([10.0, 20.0, 1.0, 2.0]);
        let measurement = c.observe(&state);

        assert!((measurement.index(0) - 10.0).abs() < 1e-10);
        assert!((measurement.index(1) - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_propagate_covariance() {
        let dt = 0.5;
        let a = TransitionMatrix::<2>::from_matrix(nalgebra::matrix![1.0, dt; 0.0, 1.0]);
        let p = StateCovariance::from_diagonal(&nalgebra::vector![1.0, 1.0]);

        let propagated = a.propagate_covariance(&p);
        assert!((propagated.as_matrix()[(0, 0)] - 1.25).abs() < 1e-12);
        assert!((propagated.as_matrix()[(0, 1)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gain_singular_innovation() {
        let p = StateCovariance::<2>::zeros();
        let c = ObservationMatrix::<1, 2>::from_matrix(nalgebra::matrix![1.0, 0.0]);
        let r = MeasurementCovariance::<1>::zeros();

        let s = compute_innovation_covariance(&p, &c, &r);
        assert!(compute_kalman_gain(&p, &c, &s).is_none());
    }

    #[test]
    fn test_joseph_scalar() {
        // P = 4, R = 4 -> K = 0.5, P+ = 2
        let p = StateCovariance::<1>::from_diagonal(&nalgebra::vector![4.0]);
        let c = ObservationMatrix::<1, 1>::from_matrix(nalgebra::matrix![1.0]);
        let r = MeasurementCovariance::<1>::from_diagonal(&nalgebra::vector![4.0]);

        let s = compute_innovation_covariance(&p, &c, &r);
        let k = compute_kalman_gain(&p, &c, &s).unwrap();
        assert!((k.as_matrix()[(0, 0)] - 0.5).abs() < 1e-12);

        let updated = joseph_update(&p, &k, &c, &r);
        assert!((updated.as_matrix()[(0, 0)] - 2.0).abs() < 1e-12);
    }
}
