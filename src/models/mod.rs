//! Motion models for track state estimation
//!
//! A motion model wraps a [`KalmanFilter`] with the dynamics of one state
//! space and the time of its last prediction. Models start uninitialized and
//! fail closed: every operation on an uninitialized model returns `false` or
//! `None`.

mod ctrv;
mod cv;

pub use ctrv::*;
pub use cv::*;

use log::warn;

use crate::filters::kalman::KalmanFilter;
use crate::types::spaces::{StateCovariance, StateVector};
use crate::types::time::Time;

/// Largest single prediction step in seconds; longer gaps are subdivided.
pub const DEFAULT_DT_MAX: f64 = 0.11;

/// Horizon below which `get_predicted_state` skips prediction.
const MIN_PREDICTION_DT: f64 = 0.001;

/// Converts km/h to m/s.
#[inline]
pub fn kmph_to_mps(kmph: f64) -> f64 {
    kmph * 1000.0 / 3600.0
}

// ============================================================================
// Shared State
// ============================================================================

/// Filter estimate plus the time it is valid at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState<const N: usize> {
    pub filter: KalmanFilter<N>,
    pub last_update_time: Time,
}

// ============================================================================
// Motion Model Trait
// ============================================================================

/// Dynamics of an `N`-dimensional state.
///
/// Implementors provide state storage and a single prediction step; time
/// bookkeeping, step subdivision and copy-on-read prediction are shared.
pub trait MotionModel<const N: usize> {
    /// Live state, `None` until initialized.
    fn motion_state(&self) -> Option<&MotionState<N>>;

    fn motion_state_mut(&mut self) -> Option<&mut MotionState<N>>;

    /// Advances `filter` by one step of `dt` seconds.
    fn predict_step(&self, dt: f64, filter: &mut KalmanFilter<N>) -> bool;

    /// Clamps the live state to the model's physical limits.
    fn limit_states(&mut self) -> bool;

    /// Longest allowed single step.
    fn dt_max(&self) -> f64 {
        DEFAULT_DT_MAX
    }

    #[inline]
    fn is_initialized(&self) -> bool {
        self.motion_state().is_some()
    }

    /// Time the live state refers to.
    fn last_update_time(&self) -> Option<Time> {
        self.motion_state().map(|s| s.last_update_time)
    }

    /// Advances `filter` by `dt`, in equal steps no longer than `dt_max`.
    fn predict_dt(&self, dt: f64, filter: &mut KalmanFilter<N>) -> bool {
        let dt_max = self.dt_max();
        let repeat = if dt_max > 0.0 {
            (dt / dt_max).floor() as usize + 1
        } else {
            1
        };
        let step = dt / repeat as f64;
        (0..repeat).all(|_| self.predict_step(step, filter))
    }

    /// Advances the live filter to `time`.
    ///
    /// Negative horizons are rejected and leave the state untouched.
    fn predict_state(&mut self, time: Time) -> bool {
        let Some(state) = self.motion_state() else {
            return false;
        };

        let dt = time - state.last_update_time;
        if dt < 0.0 {
            warn!("predict_state: dt is negative ({:.6})", dt);
            return false;
        }

        let mut filter = state.filter;
        if !self.predict_dt(dt, &mut filter) {
            return false;
        }

        match self.motion_state_mut() {
            Some(state) => {
                state.filter = filter;
                state.last_update_time = time;
                true
            }
            None => false,
        }
    }

    /// A copy of the filter advanced to `time`; the live filter is untouched.
    ///
    /// Negative horizons are clamped to zero and horizons up to 1 ms are not
    /// predicted.
    fn get_predicted_state(&self, time: Time) -> Option<KalmanFilter<N>> {
        let state = self.motion_state()?;
        let mut filter = state.filter;

        let mut dt = time - state.last_update_time;
        if dt < 0.0 {
            warn!("get_predicted_state: dt is negative ({:.6})", dt);
            dt = 0.0;
        }

        if dt > MIN_PREDICTION_DT && !self.predict_dt(dt, &mut filter) {
            return None;
        }
        Some(filter)
    }

    /// Mean and covariance of the live filter.
    fn get_state(&self) -> Option<(StateVector<N>, StateCovariance<N>)> {
        self.motion_state()
            .map(|s| (*s.filter.mean(), *s.filter.covariance()))
    }
}

/// Rotates a longitudinal/lateral variance pair by `yaw` into x/y.
///
/// Returns `(xx, xy, yy)`.
pub fn rotate_variance(cov_long: f64, cov_lat: f64, yaw: f64) -> (f64, f64, f64) {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let xx = cov_long * cos_yaw * cos_yaw + cov_lat * sin_yaw * sin_yaw;
    let xy = 0.5 * (cov_long - cov_lat) * (2.0 * yaw).sin();
    let yy = cov_long * sin_yaw * sin_yaw + cov_lat * cos_yaw * cos_yaw;
    (xx, xy, yy)
}
