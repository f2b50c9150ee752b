//! Tracker for unclassified objects

use nalgebra::Isometry3;

use super::cv::{measurement_pose_covariance, object_orientation, spawn_cv_model};
use super::profile::CvProfile;
use super::{TrackModel, POSITION_Z_GAIN};
use crate::models::{CvMotionModel, MotionModel};
use crate::types::object::{DetectedObject, Kinematics, Shape};
use crate::types::time::Time;

/// CV track updated from positions only. The latest detected shape is
/// reported as is.
#[derive(Debug, Clone)]
pub struct UnknownTracker {
    profile: CvProfile,
    motion: CvMotionModel,
    z: f64,
    yaw: f64,
    shape: Shape,
}

impl UnknownTracker {
    pub fn new(time: Time, object: &DetectedObject) -> Self {
        Self::with_profile(time, object, CvProfile::unknown())
    }

    pub fn with_profile(time: Time, object: &DetectedObject, profile: CvProfile) -> Self {
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

impl TrackModel for UnknownTracker {
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
        let pose = &object.kinematics.pose;
        let pose_cov = measurement_pose_covariance(object, &self.profile);
        let updated = self
            .motion
            .update_state_pose(pose.position.x, pose.position.y, &pose_cov);
        self.motion.limit_states();

        self.z = POSITION_Z_GAIN * self.z + (1.0 - POSITION_Z_GAIN) * pose.position.z;
        self.yaw = pose.yaw;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::object::{Pose, Twist};

    fn blob(x: f64, vx: f64) -> DetectedObject {
        let mut kinematics = Kinematics::from_pose(Pose::new(x, 0.0, 0.0, 0.0));
        kinematics.twist = Twist { vx, vy: 0.0, wz: 0.0 };
        kinematics.has_twist = true;
        DetectedObject {
            existence_probability: 0.5,
            classification: Vec::new(),
            kinematics,
            shape: Shape::bounding_box(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn test_reported_twist_is_not_a_measurement() {
        let mut tracker = UnknownTracker::new(Time::from_seconds(0.0), &blob(0.0, 0.0));

        // positions stay put while the detector claims 10 m/s
        for i in 1..=5 {
            let t = Time::from_seconds(0.1 * i as f64);
            assert!(tracker.predict(t));
            assert!(tracker.measure(&blob(0.0, 10.0), t, &Isometry3::identity()));
        }

        let (kinematics, _) = tracker.tracked_state(Time::from_seconds(0.5)).unwrap();
        assert!(kinematics.twist.vx.abs() < 1.0);
        assert!(kinematics.pose.position.x.abs() < 0.5);
    }
}
