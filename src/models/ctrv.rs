//! Constant turn rate and velocity model
//!
//! State `[x, y, yaw, vel, wz]`: position in the world frame, heading, speed
//! along the heading and yaw rate.

use ::core::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{matrix, Matrix6, SMatrix};

use super::{kmph_to_mps, rotate_variance, MotionModel, MotionState, DEFAULT_DT_MAX};
use crate::filters::kalman::KalmanFilter;
use crate::types::object::{cov_idx, Kinematics, OrientationAvailability, Pose, Twist};
use crate::types::spaces::{Measurement, MeasurementCovariance, StateCovariance, StateVector};
use crate::types::time::Time;
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};
use crate::utils::normalize_radian;

/// State indices of [`CtrvMotionModel`].
pub mod ctrv_idx {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const YAW: usize = 2;
    pub const VEL: usize = 3;
    pub const WZ: usize = 4;
}

const UNESTIMATED_COV: f64 = 0.1 * 0.1;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CtrvMotionParams {
    /// Longitudinal position noise variance per second squared
    pub q_cov_x: f64,
    /// Lateral position noise variance per second squared
    pub q_cov_y: f64,
    pub q_cov_yaw: f64,
    pub q_cov_vel: f64,
    pub q_cov_wz: f64,
    /// m/s
    pub max_vel: f64,
    /// rad/s
    pub max_wz: f64,
    pub dt_max: f64,
}

impl CtrvMotionParams {
    pub fn from_stddev(
        q_stddev_x: f64,
        q_stddev_y: f64,
        q_stddev_yaw: f64,
        q_stddev_vel: f64,
        q_stddev_wz: f64,
    ) -> Self {
        Self {
            q_cov_x: q_stddev_x * q_stddev_x,
            q_cov_y: q_stddev_y * q_stddev_y,
            q_cov_yaw: q_stddev_yaw * q_stddev_yaw,
            q_cov_vel: q_stddev_vel * q_stddev_vel,
            q_cov_wz: q_stddev_wz * q_stddev_wz,
            ..Self::default()
        }
    }

    pub fn with_limits(mut self, max_vel: f64, max_wz: f64) -> Self {
        self.max_vel = max_vel;
        self.max_wz = max_wz;
        self
    }
}

impl Default for CtrvMotionParams {
    fn default() -> Self {
        let q_stddev_xy = 0.5; // m/s
        let q_stddev_yaw = 20f64.to_radians();
        let q_stddev_vel = kmph_to_mps(10.0);
        let q_stddev_wz = 30f64.to_radians();
        Self {
            q_cov_x: q_stddev_xy * q_stddev_xy,
            q_cov_y: q_stddev_xy * q_stddev_xy,
            q_cov_yaw: q_stddev_yaw * q_stddev_yaw,
            q_cov_vel: q_stddev_vel * q_stddev_vel,
            q_cov_wz: q_stddev_wz * q_stddev_wz,
            max_vel: kmph_to_mps(10.0),
            max_wz: 30f64.to_radians(),
            dt_max: DEFAULT_DT_MAX,
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// CTRV extended Kalman model.
#[derive(Debug, Clone, Default)]
pub struct CtrvMotionModel {
    params: CtrvMotionParams,
    state: Option<MotionState<5>>,
}

impl CtrvMotionModel {
    pub fn new(params: CtrvMotionParams) -> Self {
        Self {
            params,
            state: None,
        }
    }

    #[inline]
    pub fn params(&self) -> &CtrvMotionParams {
        &self.params
    }

    pub fn init_state(&mut self, time: Time, x: StateVector<5>, p: StateCovariance<5>) -> bool {
        self.state = Some(MotionState {
            filter: KalmanFilter::new(x, p),
            last_update_time: time,
        });
        true
    }

    /// Position and heading update.
    ///
    /// The measured yaw is unwrapped toward the estimate: to within pi/2 when
    /// the detector cannot tell front from back, within pi otherwise.
    pub fn update_state_pose_head(
        &mut self,
        x: f64,
        y: f64,
        yaw: f64,
        pose_cov: &Matrix6<f64>,
        orientation: OrientationAvailability,
    ) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let fixed_yaw = unwrap_yaw(state.filter.mean().index(ctrv_idx::YAW), yaw, orientation);

        let y_meas = Measurement::from_array([x, y, fixed_yaw]);
        let c = ObservationMatrix::from_matrix(matrix![
            1.0, 0.0, 0.0, 0.0, 0.0;
            0.0, 1.0, 0.0, 0.0, 0.0;
            0.0, 0.0, 1.0, 0.0, 0.0
        ]);
        let r = MeasurementCovariance::from_matrix(pose_yaw_block(pose_cov));

        state.filter.update(&y_meas, &c, &r)
    }

    /// Position-only update.
    pub fn update_state_pose(&mut self, x: f64, y: f64, pose_cov: &Matrix6<f64>) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };

        let y_meas = Measurement::from_array([x, y]);
        let c = ObservationMatrix::from_matrix(matrix![
            1.0, 0.0, 0.0, 0.0, 0.0;
            0.0, 1.0, 0.0, 0.0, 0.0
        ]);
        let r = MeasurementCovariance::from_matrix(
            pose_cov.fixed_view::<2, 2>(cov_idx::X, cov_idx::X).into_owned(),
        );

        state.filter.update(&y_meas, &c, &r)
    }

    /// Position, heading and longitudinal speed update.
    #[allow(clippy::too_many_arguments)]
    pub fn update_state_pose_head_vel(
        &mut self,
        x: f64,
        y: f64,
        yaw: f64,
        pose_cov: &Matrix6<f64>,
        vel: f64,
        twist_cov: &Matrix6<f64>,
        orientation: OrientationAvailability,
    ) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let fixed_yaw = unwrap_yaw(state.filter.mean().index(ctrv_idx::YAW), yaw, orientation);

        let y_meas = Measurement::from_array([x, y, fixed_yaw, vel]);
        let c = ObservationMatrix::from_matrix(matrix![
            1.0, 0.0, 0.0, 0.0, 0.0;
            0.0, 1.0, 0.0, 0.0, 0.0;
            0.0, 0.0, 1.0, 0.0, 0.0;
            0.0, 0.0, 0.0, 1.0, 0.0
        ]);

        let mut r = SMatrix::<f64, 4, 4>::zeros();
        r.fixed_view_mut::<3, 3>(0, 0).copy_from(&pose_yaw_block(pose_cov));
        r[(3, 3)] = twist_cov[(cov_idx::X, cov_idx::X)];

        state
            .filter
            .update(&y_meas, &c, &MeasurementCovariance::from_matrix(r))
    }

    /// Shifts the position estimate without touching the covariance.
    pub fn adjust_position(&mut self, dx: f64, dy: f64) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let mean = state.filter.mean_mut().as_svector_mut();
        mean[ctrv_idx::X] += dx;
        mean[ctrv_idx::Y] += dy;
        true
    }

    /// Kinematics predicted at `time`.
    pub fn predicted_kinematics(&self, time: Time) -> Option<Kinematics> {
        let filter = self.get_predicted_state(time)?;
        let x = filter.mean().as_svector();
        let p = filter.covariance().as_matrix();

        let mut kinematics = Kinematics::from_pose(Pose::new(
            x[ctrv_idx::X],
            x[ctrv_idx::Y],
            0.0,
            x[ctrv_idx::YAW],
        ));
        kinematics.orientation_availability = OrientationAvailability::Available;
        kinematics.twist = Twist {
            vx: x[ctrv_idx::VEL],
            vy: 0.0,
            wz: x[ctrv_idx::WZ],
        };
        kinematics.has_twist = true;

        let pose_cov = &mut kinematics.pose_covariance;
        let (px, py, pyaw) = (ctrv_idx::X, ctrv_idx::Y, ctrv_idx::YAW);
        pose_cov[(cov_idx::X, cov_idx::X)] = p[(px, px)];
        pose_cov[(cov_idx::X, cov_idx::Y)] = p[(px, py)];
        pose_cov[(cov_idx::Y, cov_idx::X)] = p[(py, px)];
        pose_cov[(cov_idx::Y, cov_idx::Y)] = p[(py, py)];
        pose_cov[(cov_idx::X, cov_idx::YAW)] = p[(px, pyaw)];
        pose_cov[(cov_idx::YAW, cov_idx::X)] = p[(pyaw, px)];
        pose_cov[(cov_idx::Y, cov_idx::YAW)] = p[(py, pyaw)];
        pose_cov[(cov_idx::YAW, cov_idx::Y)] = p[(pyaw, py)];
        pose_cov[(cov_idx::YAW, cov_idx::YAW)] = p[(pyaw, pyaw)];
        pose_cov[(cov_idx::Z, cov_idx::Z)] = UNESTIMATED_COV;
        pose_cov[(cov_idx::ROLL, cov_idx::ROLL)] = UNESTIMATED_COV;
        pose_cov[(cov_idx::PITCH, cov_idx::PITCH)] = UNESTIMATED_COV;
        kinematics.has_position_covariance = true;

        let twist_cov = &mut kinematics.twist_covariance;
        twist_cov[(cov_idx::X, cov_idx::X)] = p[(ctrv_idx::VEL, ctrv_idx::VEL)];
        twist_cov[(cov_idx::X, cov_idx::YAW)] = p[(ctrv_idx::VEL, ctrv_idx::WZ)];
        twist_cov[(cov_idx::YAW, cov_idx::X)] = p[(ctrv_idx::WZ, ctrv_idx::VEL)];
        twist_cov[(cov_idx::YAW, cov_idx::YAW)] = p[(ctrv_idx::WZ, ctrv_idx::WZ)];
        twist_cov[(cov_idx::Y, cov_idx::Y)] = UNESTIMATED_COV;
        twist_cov[(cov_idx::Z, cov_idx::Z)] = UNESTIMATED_COV;
        twist_cov[(cov_idx::ROLL, cov_idx::ROLL)] = UNESTIMATED_COV;
        twist_cov[(cov_idx::PITCH, cov_idx::PITCH)] = UNESTIMATED_COV;
        kinematics.has_twist_covariance = true;

        Some(kinematics)
    }
}

/// Moves `measured` by whole turns of `2 * limit` until it lies within
/// `limit` of `estimated`.
fn unwrap_yaw(estimated: f64, measured: f64, orientation: OrientationAvailability) -> f64 {
    let limit = match orientation {
        OrientationAvailability::Available => PI,
        _ => FRAC_PI_2,
    };
    let period = 2.0 * limit;
    let turns = ((estimated - measured) / period).round();
    measured + turns * period
}

/// x, y, yaw block of a 6x6 pose covariance.
fn pose_yaw_block(cov: &Matrix6<f64>) -> SMatrix<f64, 3, 3> {
    let idx = [cov_idx::X, cov_idx::Y, cov_idx::YAW];
    SMatrix::<f64, 3, 3>::from_fn(|r, c| cov[(idx[r], idx[c])])
}

impl MotionModel<5> for CtrvMotionModel {
    fn motion_state(&self) -> Option<&MotionState<5>> {
        self.state.as_ref()
    }

    fn motion_state_mut(&mut self) -> Option<&mut MotionState<5>> {
        self.state.as_mut()
    }

    fn dt_max(&self) -> f64 {
        self.params.dt_max
    }

    // x' = x + v cos(yaw) dt
    // y' = y + v sin(yaw) dt
    // yaw' = yaw + wz dt
    fn predict_step(&self, dt: f64, filter: &mut KalmanFilter<5>) -> bool {
        let x = filter.mean().as_svector();
        let yaw = x[ctrv_idx::YAW];
        let vel = x[ctrv_idx::VEL];
        let wz = x[ctrv_idx::WZ];
        let (sin_yaw, cos_yaw) = yaw.sin_cos();

        let x_next = StateVector::from_array([
            x[ctrv_idx::X] + vel * cos_yaw * dt,
            x[ctrv_idx::Y] + vel * sin_yaw * dt,
            yaw + wz * dt,
            vel,
            wz,
        ]);

        let a = TransitionMatrix::from_matrix(matrix![
            1.0, 0.0, -vel * sin_yaw * dt, cos_yaw * dt, 0.0;
            0.0, 1.0, vel * cos_yaw * dt, sin_yaw * dt, 0.0;
            0.0, 0.0, 1.0, 0.0, dt;
            0.0, 0.0, 0.0, 1.0, 0.0;
            0.0, 0.0, 0.0, 0.0, 1.0
        ]);

        let dt2 = dt * dt;
        let (qxx, qxy, qyy) =
            rotate_variance(self.params.q_cov_x * dt2, self.params.q_cov_y * dt2, yaw);
        let mut q = SMatrix::<f64, 5, 5>::zeros();
        q[(ctrv_idx::X, ctrv_idx::X)] = qxx;
        q[(ctrv_idx::X, ctrv_idx::Y)] = qxy;
        q[(ctrv_idx::Y, ctrv_idx::X)] = qxy;
        q[(ctrv_idx::Y, ctrv_idx::Y)] = qyy;
        q[(ctrv_idx::YAW, ctrv_idx::YAW)] = self.params.q_cov_yaw * dt2;
        q[(ctrv_idx::VEL, ctrv_idx::VEL)] = self.params.q_cov_vel * dt2;
        q[(ctrv_idx::WZ, ctrv_idx::WZ)] = self.params.q_cov_wz * dt2;

        filter.predict(x_next, &a, &StateCovariance::from_matrix(q))
    }

    fn limit_states(&mut self) -> bool {
        let (max_vel, max_wz) = (self.params.max_vel, self.params.max_wz);
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let mean = state.filter.mean_mut().as_svector_mut();
        mean[ctrv_idx::VEL] = mean[ctrv_idx::VEL].clamp(-max_vel, max_vel);
        mean[ctrv_idx::WZ] = mean[ctrv_idx::WZ].clamp(-max_wz, max_wz);
        mean[ctrv_idx::YAW] = normalize_radian(mean[ctrv_idx::YAW]);
        true
    }
}
