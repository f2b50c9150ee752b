//! Constant velocity model
//!
//! State `[x, y, vx, vy]` in the world frame.

use nalgebra::{matrix, vector, Matrix2, Matrix6, SMatrix};

use super::{kmph_to_mps, MotionModel, MotionState, DEFAULT_DT_MAX};
use crate::filters::kalman::KalmanFilter;
use crate::types::object::{cov_idx, Kinematics, Pose, Twist};
use crate::types::spaces::{Measurement, MeasurementCovariance, StateCovariance, StateVector};
use crate::types::time::Time;
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};

/// State indices of [`CvMotionModel`].
pub mod cv_idx {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const VX: usize = 2;
    pub const VY: usize = 3;
}

/// Variance reported for pose/twist components the model does not estimate.
const UNESTIMATED_COV: f64 = 0.1 * 0.1;

// ============================================================================
// Parameters
// ============================================================================

/// Process noise variances and velocity limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvMotionParams {
    pub q_cov_x: f64,
    pub q_cov_y: f64,
    pub q_cov_vx: f64,
    pub q_cov_vy: f64,
    /// m/s
    pub max_vx: f64,
    /// m/s
    pub max_vy: f64,
    pub dt_max: f64,
}

impl CvMotionParams {
    /// Builds parameters from standard deviations.
    pub fn from_stddev(
        q_stddev_x: f64,
        q_stddev_y: f64,
        q_stddev_vx: f64,
        q_stddev_vy: f64,
    ) -> Self {
        Self {
            q_cov_x: q_stddev_x * q_stddev_x,
            q_cov_y: q_stddev_y * q_stddev_y,
            q_cov_vx: q_stddev_vx * q_stddev_vx,
            q_cov_vy: q_stddev_vy * q_stddev_vy,
            ..Self::default()
        }
    }

    /// Replaces the velocity limits.
    pub fn with_limits(mut self, max_vx: f64, max_vy: f64) -> Self {
        self.max_vx = max_vx;
        self.max_vy = max_vy;
        self
    }
}

impl Default for CvMotionParams {
    fn default() -> Self {
        let q_stddev_xy = 0.5; // m/s
        let q_stddev_v = 9.8 * 0.3; // m/s^2
        Self {
            q_cov_x: q_stddev_xy * q_stddev_xy,
            q_cov_y: q_stddev_xy * q_stddev_xy,
            q_cov_vx: q_stddev_v * q_stddev_v,
            q_cov_vy: q_stddev_v * q_stddev_v,
            max_vx: kmph_to_mps(60.0),
            max_vy: kmph_to_mps(60.0),
            dt_max: DEFAULT_DT_MAX,
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Constant velocity Kalman model.
#[derive(Debug, Clone, Default)]
pub struct CvMotionModel {
    params: CvMotionParams,
    state: Option<MotionState<4>>,
}

impl CvMotionModel {
    pub fn new(params: CvMotionParams) -> Self {
        Self {
            params,
            state: None,
        }
    }

    #[inline]
    pub fn params(&self) -> &CvMotionParams {
        &self.params
    }

    /// Initializes from an explicit mean and covariance.
    pub fn init_state(&mut self, time: Time, x: StateVector<4>, p: StateCovariance<4>) -> bool {
        self.state = Some(MotionState {
            filter: KalmanFilter::new(x, p),
            last_update_time: time,
        });
        true
    }

    /// Initializes from a detection's position and velocity.
    ///
    /// Only the diagonal variances of the message covariances are used.
    pub fn init(
        &mut self,
        time: Time,
        x: f64,
        y: f64,
        pose_cov: &Matrix6<f64>,
        vx: f64,
        vy: f64,
        twist_cov: &Matrix6<f64>,
    ) -> bool {
        let mean = StateVector::from_array([x, y, vx, vy]);
        let p = StateCovariance::from_diagonal(&vector![
            pose_cov[(cov_idx::X, cov_idx::X)],
            pose_cov[(cov_idx::Y, cov_idx::Y)],
            twist_cov[(cov_idx::X, cov_idx::X)],
            twist_cov[(cov_idx::Y, cov_idx::Y)]
        ]);
        self.init_state(time, mean, p)
    }

    /// Position-only update.
    pub fn update_state_pose(&mut self, x: f64, y: f64, pose_cov: &Matrix6<f64>) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };

        let y_meas = Measurement::from_array([x, y]);
        let c = ObservationMatrix::from_matrix(matrix![
            1.0, 0.0, 0.0, 0.0;
            0.0, 1.0, 0.0, 0.0
        ]);
        let r = MeasurementCovariance::from_matrix(position_block(pose_cov));

        state.filter.update(&y_meas, &c, &r)
    }

    /// Position and velocity update. `vx`, `vy` are in the world frame.
    pub fn update_state_pose_vel(
        &mut self,
        x: f64,
        y: f64,
        pose_cov: &Matrix6<f64>,
        vx: f64,
        vy: f64,
        twist_cov: &Matrix6<f64>,
    ) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };

        let y_meas = Measurement::from_array([x, y, vx, vy]);
        let c = ObservationMatrix::from_matrix(SMatrix::<f64, 4, 4>::identity());

        let mut r = SMatrix::<f64, 4, 4>::zeros();
        r.fixed_view_mut::<2, 2>(0, 0).copy_from(&position_block(pose_cov));
        r.fixed_view_mut::<2, 2>(2, 2).copy_from(&position_block(twist_cov));

        state
            .filter
            .update(&y_meas, &c, &MeasurementCovariance::from_matrix(r))
    }

    /// Kinematics predicted at `time`, with velocity expressed in an object
    /// frame rotated by `yaw`.
    pub fn predicted_kinematics(&self, time: Time, yaw: f64) -> Option<Kinematics> {
        let filter = self.get_predicted_state(time)?;
        let x = filter.mean().as_svector();
        let p = filter.covariance().as_matrix();

        let mut kinematics = Kinematics::from_pose(Pose::new(x[cv_idx::X], x[cv_idx::Y], 0.0, yaw));

        // world velocity into the object frame
        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        kinematics.twist = Twist {
            vx: x[cv_idx::VX] * cos_yaw + x[cv_idx::VY] * sin_yaw,
            vy: -x[cv_idx::VX] * sin_yaw + x[cv_idx::VY] * cos_yaw,
            wz: 0.0,
        };
        kinematics.has_twist = true;

        let pose_cov = &mut kinematics.pose_covariance;
        pose_cov
            .fixed_view_mut::<2, 2>(cov_idx::X, cov_idx::X)
            .copy_from(&p.fixed_view::<2, 2>(cv_idx::X, cv_idx::X));
        pose_cov[(cov_idx::Z, cov_idx::Z)] = UNESTIMATED_COV;
        pose_cov[(cov_idx::ROLL, cov_idx::ROLL)] = UNESTIMATED_COV;
        pose_cov[(cov_idx::PITCH, cov_idx::PITCH)] = UNESTIMATED_COV;
        pose_cov[(cov_idx::YAW, cov_idx::YAW)] = UNESTIMATED_COV;
        kinematics.has_position_covariance = true;

        let rot = Matrix2::new(cos_yaw, sin_yaw, -sin_yaw, cos_yaw);
        let twist_xy: Matrix2<f64> =
            rot * p.fixed_view::<2, 2>(cv_idx::VX, cv_idx::VX) * rot.transpose();
        let twist_cov = &mut kinematics.twist_covariance;
        twist_cov.fixed_view_mut::<2, 2>(0, 0).copy_from(&twist_xy);
        twist_cov[(cov_idx::Z, cov_idx::Z)] = UNESTIMATED_COV;
        twist_cov[(cov_idx::ROLL, cov_idx::ROLL)] = UNESTIMATED_COV;
        twist_cov[(cov_idx::PITCH, cov_idx::PITCH)] = UNESTIMATED_COV;
        twist_cov[(cov_idx::YAW, cov_idx::YAW)] = UNESTIMATED_COV;
        kinematics.has_twist_covariance = true;

        Some(kinematics)
    }
}

/// Upper-left x/y block of a 6x6 message covariance.
#[inline]
fn position_block(cov: &Matrix6<f64>) -> Matrix2<f64> {
    cov.fixed_view::<2, 2>(cov_idx::X, cov_idx::X).into_owned()
}

impl MotionModel<4> for CvMotionModel {
    fn motion_state(&self) -> Option<&MotionState<4>> {
        self.state.as_ref()
    }

    fn motion_state_mut(&mut self) -> Option<&mut MotionState<4>> {
        self.state.as_mut()
    }

    fn dt_max(&self) -> f64 {
        self.params.dt_max
    }

    // x' = x + vx*dt, y' = y + vy*dt
    fn predict_step(&self, dt: f64, filter: &mut KalmanFilter<4>) -> bool {
        let a = TransitionMatrix::from_matrix(matrix![
            1.0, 0.0, dt, 0.0;
            0.0, 1.0, 0.0, dt;
            0.0, 0.0, 1.0, 0.0;
            0.0, 0.0, 0.0, 1.0
        ]);

        let dt2 = dt * dt;
        let q = StateCovariance::from_diagonal(&vector![
            self.params.q_cov_x * dt2,
            self.params.q_cov_y * dt2,
            self.params.q_cov_vx * dt2,
            self.params.q_cov_vy * dt2
        ]);

        filter.predict_linear(&a, &q)
    }

    fn limit_states(&mut self) -> bool {
        let (max_vx, max_vy) = (self.params.max_vx, self.params.max_vy);
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let mean = state.filter.mean_mut().as_svector_mut();
        mean[cv_idx::VX] = mean[cv_idx::VX].clamp(-max_vx, max_vx);
        mean[cv_idx::VY] = mean[cv_idx::VY].clamp(-max_vy, max_vy);
        true
    }
}
