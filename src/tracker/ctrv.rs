//! Heading-aware tracker for vehicles, bicycles and pedestrians

use log::warn;
use nalgebra::{Isometry3, Matrix6, Point2, Rotation2, Vector2};

use super::profile::CtrvProfile;
use super::{shape_to_bounding_box, BoundingBox, TrackModel, POSITION_Z_GAIN};
use crate::models::{ctrv_idx, rotate_variance, CtrvMotionModel, MotionModel};
use crate::types::object::{
    cov_idx, DetectedObject, Kinematics, OrientationAvailability, Pose, Shape,
};
use crate::types::spaces::{StateCovariance, StateVector};
use crate::types::time::Time;
use crate::utils::{anchor_offset, nearest_corner_or_surface};

/// Yaw variance inflation when the detector reports no heading.
const UNAVAILABLE_YAW_COV_SCALE: f64 = 1e3;

/// Time gap between prediction and measurement worth a warning.
const MEASUREMENT_TIME_GAP_WARN: f64 = 0.01;

/// CTRV filtered track with a smoothed bounding box.
#[derive(Debug, Clone)]
pub struct CtrvTracker {
    profile: CtrvProfile,
    motion: CtrvMotionModel,
    z: f64,
    bounding_box: BoundingBox,
}

impl CtrvTracker {
    pub fn new(time: Time, object: &DetectedObject, profile: CtrvProfile) -> Self {
        let (pose, bounding_box) = shape_to_bounding_box(&object.kinematics.pose, &object.shape);
        let kinematics = &object.kinematics;

        let (vel, wz) = if kinematics.has_twist {
            (kinematics.twist.vx, kinematics.twist.wz)
        } else {
            (0.0, 0.0)
        };
        let x = StateVector::from_array([pose.position.x, pose.position.y, pose.yaw, vel, wz]);

        let mut p = StateCovariance::<5>::zeros();
        {
            let p = p.as_matrix_mut();
            if kinematics.has_position_covariance {
                let cov = &kinematics.pose_covariance;
                p[(ctrv_idx::X, ctrv_idx::X)] = cov[(cov_idx::X, cov_idx::X)];
                p[(ctrv_idx::X, ctrv_idx::Y)] = cov[(cov_idx::X, cov_idx::Y)];
                p[(ctrv_idx::Y, ctrv_idx::X)] = cov[(cov_idx::Y, cov_idx::X)];
                p[(ctrv_idx::Y, ctrv_idx::Y)] = cov[(cov_idx::Y, cov_idx::Y)];
                p[(ctrv_idx::YAW, ctrv_idx::YAW)] = cov[(cov_idx::YAW, cov_idx::YAW)];
            } else {
                let (xx, xy, yy) = rotate_variance(profile.p0_cov_x, profile.p0_cov_y, pose.yaw);
                p[(ctrv_idx::X, ctrv_idx::X)] = xx;
                p[(ctrv_idx::X, ctrv_idx::Y)] = xy;
                p[(ctrv_idx::Y, ctrv_idx::X)] = xy;
                p[(ctrv_idx::Y, ctrv_idx::Y)] = yy;
                p[(ctrv_idx::YAW, ctrv_idx::YAW)] = profile.p0_cov_yaw;
            }
            p[(ctrv_idx::VEL, ctrv_idx::VEL)] = if kinematics.has_twist_covariance {
                kinematics.twist_covariance[(cov_idx::X, cov_idx::X)]
            } else {
                profile.p0_cov_vel
            };
            p[(ctrv_idx::WZ, ctrv_idx::WZ)] = if kinematics.has_twist_covariance {
                kinematics.twist_covariance[(cov_idx::YAW, cov_idx::YAW)]
            } else {
                profile.p0_cov_wz
            };
        }

        let mut motion = CtrvMotionModel::new(profile.motion);
        motion.init_state(time, x, p);

        Self {
            profile,
            motion,
            z: pose.position.z,
            bounding_box,
        }
    }

    #[inline]
    pub fn motion_model(&self) -> &CtrvMotionModel {
        &self.motion
    }

    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Measurement covariances, filled from the profile when the detection
    /// has none.
    fn measurement_covariance(
        &self,
        object: &DetectedObject,
        yaw: f64,
    ) -> (Matrix6<f64>, Matrix6<f64>) {
        let kinematics = &object.kinematics;
        let mut pose_cov = kinematics.pose_covariance;
        let mut twist_cov = kinematics.twist_covariance;

        if !kinematics.has_position_covariance {
            let (xx, xy, yy) = rotate_variance(self.profile.r_cov_x, self.profile.r_cov_y, yaw);
            pose_cov = Matrix6::zeros();
            pose_cov[(cov_idx::X, cov_idx::X)] = xx;
            pose_cov[(cov_idx::X, cov_idx::Y)] = xy;
            pose_cov[(cov_idx::Y, cov_idx::X)] = xy;
            pose_cov[(cov_idx::Y, cov_idx::Y)] = yy;
            pose_cov[(cov_idx::YAW, cov_idx::YAW)] = self.profile.r_cov_yaw;
            if kinematics.orientation_availability == OrientationAvailability::Unavailable {
                pose_cov[(cov_idx::YAW, cov_idx::YAW)] *= UNAVAILABLE_YAW_COV_SCALE;
            }
        }
        if !kinematics.has_twist_covariance {
            twist_cov = Matrix6::zeros();
            twist_cov[(cov_idx::X, cov_idx::X)] = self.profile.r_cov_vel;
        }
        (pose_cov, twist_cov)
    }

    /// Whether `shape` may update the track's box.
    fn accepts_shape(&self, shape: &Shape, measured: &BoundingBox) -> bool {
        match self.profile.size_limits {
            Some(limits) => {
                matches!(shape, Shape::BoundingBox { .. })
                    && limits.accepts(measured.length, measured.width)
            }
            None => true,
        }
    }

    /// Object-frame shift from the measured box centre to where the track's
    /// box centre would be with its side nearest the ego vehicle held fixed.
    fn anchored_offset(
        &self,
        tracked: &Pose,
        measured: &BoundingBox,
        self_transform: &Isometry3<f64>,
    ) -> Vector2<f64> {
        let ego = Point2::new(self_transform.translation.x, self_transform.translation.y);
        let anchor = nearest_corner_or_surface(
            tracked,
            self.bounding_box.length,
            self.bounding_box.width,
            &ego,
        );
        anchor_offset(
            anchor,
            measured.length - self.bounding_box.length,
            measured.width - self.bounding_box.width,
        )
    }
}

impl TrackModel for CtrvTracker {
    fn predict(&mut self, time: Time) -> bool {
        self.motion.predict_state(time)
    }

    fn limit_states(&mut self) -> bool {
        self.motion.limit_states()
    }

    fn measure(
        &mut self,
        object: &DetectedObject,
        time: Time,
        self_transform: &Isometry3<f64>,
    ) -> bool {
        let Some((x_t, _)) = self.motion.get_state() else {
            return false;
        };
        let tracked = Pose::new(
            x_t.index(ctrv_idx::X),
            x_t.index(ctrv_idx::Y),
            0.0,
            x_t.index(ctrv_idx::YAW),
        );

        if let Some(last) = self.motion.last_update_time() {
            let gap = time - last;
            if gap.abs() > MEASUREMENT_TIME_GAP_WARN {
                warn!("large gap between predicted and measurement time ({:.3}s)", gap);
            }
        }

        let (mut pose, measured_box) =
            shape_to_bounding_box(&object.kinematics.pose, &object.shape);
        let shape_accepted = self.accepts_shape(&object.shape, &measured_box);

        // measured centre of a box with the track's dimensions
        let offset = if shape_accepted && self.profile.anchor_tracking {
            self.anchored_offset(&tracked, &measured_box, self_transform)
        } else {
            Vector2::zeros()
        };
        let rotation = Rotation2::new(tracked.yaw);
        let offset_world = rotation * offset;
        pose.position.x += offset_world.x;
        pose.position.y += offset_world.y;

        let (pose_cov, twist_cov) = self.measurement_covariance(object, pose.yaw);
        let kinematics = &object.kinematics;

        let velocity_usable = kinematics.has_twist
            && (x_t.index(ctrv_idx::VEL) - kinematics.twist.vx).abs()
                < self.profile.velocity_deviation_threshold;

        let updated = if velocity_usable {
            self.motion.update_state_pose_head_vel(
                pose.position.x,
                pose.position.y,
                pose.yaw,
                &pose_cov,
                kinematics.twist.vx,
                &twist_cov,
                kinematics.orientation_availability,
            )
        } else {
            self.motion.update_state_pose_head(
                pose.position.x,
                pose.position.y,
                pose.yaw,
                &pose_cov,
                kinematics.orientation_availability,
            )
        };
        self.motion.limit_states();

        self.z = POSITION_Z_GAIN * self.z + (1.0 - POSITION_Z_GAIN) * pose.position.z;

        if shape_accepted {
            let gain = self.profile.shape_gain;
            let mut blended = self.bounding_box.blend(&measured_box, gain);
            if let Some(limits) = self.profile.size_limits {
                blended.length = limits.clamp(blended.length);
                blended.width = limits.clamp(blended.width);
                blended.height = limits.clamp(blended.height);
            }
            self.bounding_box = blended;

            // the centre follows the box as it grows away from the anchor
            if offset != Vector2::zeros() {
                self.motion.adjust_position(-gain * offset_world.x, -gain * offset_world.y);
            }
        }

        updated
    }

    fn tracked_state(&self, time: Time) -> Option<(Kinematics, Shape)> {
        let mut kinematics = self.motion.predicted_kinematics(time)?;
        kinematics.pose.position.z = self.z;
        Some((kinematics, self.bounding_box.to_shape()))
    }
}
