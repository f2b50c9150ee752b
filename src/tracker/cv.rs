//! Constant velocity tracker

use nalgebra::{Isometry3, Matrix2, Matrix6};

use super::profile::CvProfile;
use super::{TrackModel, POSITION_Z_GAIN};
use crate::models::{cv_idx, rotate_variance, CvMotionModel, MotionModel};
use crate::types::object::{cov_idx, DetectedObject, Kinematics, OrientationAvailability, Shape};
use crate::types::spaces::{StateCovariance, StateVector};
use crate::types::time::Time;

/// World-frame velocity of a detection's object-frame twist.
pub(super) fn world_velocity(kinematics: &Kinematics) -> (f64, f64) {
    let (sin_yaw, cos_yaw) = kinematics.pose.yaw.sin_cos();
    let twist = &kinematics.twist;
    (
        twist.vx * cos_yaw - twist.vy * sin_yaw,
        twist.vx * sin_yaw + twist.vy * cos_yaw,
    )
}

/// Rotates the linear x/y block of an object-frame twist covariance into the
/// world frame.
fn world_velocity_covariance(kinematics: &Kinematics) -> Matrix2<f64> {
    let (sin_yaw, cos_yaw) = kinematics.pose.yaw.sin_cos();
    let rot = Matrix2::new(cos_yaw, -sin_yaw, sin_yaw, cos_yaw);
    let local = kinematics
        .twist_covariance
        .fixed_view::<2, 2>(cov_idx::X, cov_idx::X)
        .into_owned();
    rot * local * rot.transpose()
}

fn rotated_block(cov_long: f64, cov_lat: f64, yaw: f64) -> Matrix2<f64> {
    let (xx, xy, yy) = rotate_variance(cov_long, cov_lat, yaw);
    Matrix2::new(xx, xy, xy, yy)
}

/// Spawns a CV model at a detection, taking the initial velocity from its
/// twist when present.
pub(super) fn spawn_cv_model(
    time: Time,
    object: &DetectedObject,
    profile: &CvProfile,
) -> CvMotionModel {
    let kinematics = &object.kinematics;
    let yaw = kinematics.pose.yaw;

    let (vx, vy) = if kinematics.has_twist {
        world_velocity(kinematics)
    } else {
        (0.0, 0.0)
    };
    let position = &kinematics.pose.position;
    let x = StateVector::from_array([position.x, position.y, vx, vy]);

    let position = if kinematics.has_position_covariance {
        kinematics
            .pose_covariance
            .fixed_view::<2, 2>(cov_idx::X, cov_idx::X)
            .into_owned()
    } else {
        rotated_block(profile.p0_cov_x, profile.p0_cov_y, yaw)
    };
    let velocity = if kinematics.has_twist_covariance {
        world_velocity_covariance(kinematics)
    } else {
        rotated_block(profile.p0_cov_vx, profile.p0_cov_vy, yaw)
    };

    let mut p = StateCovariance::<4>::zeros();
    p.as_matrix_mut()
        .fixed_view_mut::<2, 2>(cv_idx::X, cv_idx::X)
        .copy_from(&position);
    p.as_matrix_mut()
        .fixed_view_mut::<2, 2>(cv_idx::VX, cv_idx::VX)
        .copy_from(&velocity);

    let mut motion = CvMotionModel::new(profile.motion);
    motion.init_state(time, x, p);
    motion
}

/// Pose covariance of a detection, or the profile's rotated noise.
pub(super) fn measurement_pose_covariance(
    object: &DetectedObject,
    profile: &CvProfile,
) -> Matrix6<f64> {
    let kinematics = &object.kinematics;
    if kinematics.has_position_covariance {
        return kinematics.pose_covariance;
    }
    let mut cov = Matrix6::zeros();
    cov.fixed_view_mut::<2, 2>(cov_idx::X, cov_idx::X).copy_from(&rotated_block(
        profile.r_cov_x,
        profile.r_cov_y,
        kinematics.pose.yaw,
    ));
    cov
}

/// World-frame velocity covariance of a detection in the linear block of a
/// 6x6 matrix.
fn measurement_twist_covariance(object: &DetectedObject, profile: &CvProfile) -> Matrix6<f64> {
    let kinematics = &object.kinematics;
    let block = if kinematics.has_twist_covariance {
        world_velocity_covariance(kinematics)
    } else {
        rotated_block(profile.r_cov_vx, profile.r_cov_vy, kinematics.pose.yaw)
    };
    let mut cov = Matrix6::zeros();
    cov.fixed_view_mut::<2, 2>(cov_idx::X, cov_idx::X).copy_from(&block);
    cov
}

/// Position and velocity tracked with a CV filter; shape and heading follow
/// the latest detection.
#[derive(Debug, Clone)]
pub struct CvTracker {
    profile: CvProfile,
    motion: CvMotionModel,
    z: f64,
    yaw: f64,
    shape: Shape,
}

impl CvTracker {
    pub fn new(time: Time, object: &DetectedObject, profile: CvProfile) -> Self {
        let motion = spawn_cv_model(time, object, &profile);
        Self {
            profile,
            motion,
            z: object.kinematics.pose.position.z,
            yaw: object.kinematics.pose.yaw,
            shape: object.shape.clone(),
        }
    }

    #[inline]
    pub fn motion_model(&self) -> &CvMotionModel {
        &self.motion
    }
}

impl TrackModel for CvTracker {
    fn predict(&mut self, time: Time) -> bool {
        self.motion.predict_state(time)
    }

    fn limit_states(&mut self) -> bool {
        self.motion.limit_states()
    }

    fn measure(
        &mut self,
        object: &DetectedObject,
        _time: Time,
        _self_transform: &Isometry3<f64>,
    ) -> bool {
        let kinematics = &object.kinematics;
        let pose_cov = measurement_pose_covariance(object, &self.profile);
        let (x, y) = (kinematics.pose.position.x, kinematics.pose.position.y);

        let updated = if kinematics.has_twist {
            let (vx, vy) = world_velocity(kinematics);
            let twist_cov = measurement_twist_covariance(object, &self.profile);
            self.motion
                .update_state_pose_vel(x, y, &pose_cov, vx, vy, &twist_cov)
        } else {
            self.motion.update_state_pose(x, y, &pose_cov)
        };
        self.motion.limit_states();

        self.z = POSITION_Z_GAIN * self.z + (1.0 - POSITION_Z_GAIN) * kinematics.pose.position.z;
        self.yaw = kinematics.pose.yaw;
        self.shape = object.shape.clone();

        updated
    }

    fn tracked_state(&self, time: Time) -> Option<(Kinematics, Shape)> {
        let mut kinematics = self.motion.predicted_kinematics(time, self.yaw)?;
        kinematics.pose.position.z = self.z;
        kinematics.orientation_availability = object_orientation(&self.shape);
        Some((kinematics, self.shape.clone()))
    }
}

/// Cylinders carry no heading; other shapes keep the detector's axis.
pub(super) fn object_orientation(shape: &Shape) -> OrientationAvailability {
    match shape {
        Shape::Cylinder { .. } => OrientationAvailability::Unavailable,
        _ => OrientationAvailability::SignUnknown,
    }
}
