//! Unfiltered tracker that republishes the latest detection

use log::warn;
use nalgebra::Isometry3;

use super::TrackModel;
use crate::types::object::{cov_idx, DetectedObject, Kinematics, Shape};
use crate::types::time::Time;

/// Jumps between consecutive detections beyond this distance are logged.
const MAX_EXPECTED_JUMP: f64 = 2.0;

/// Variance reported for position and heading when the detection has none.
const NOMINAL_POSE_COV: f64 = 0.1;

/// Reports the last associated detection, moved along its twist.
#[derive(Debug, Clone)]
pub struct PassThroughTracker {
    object: DetectedObject,
    measured_at: Time,
}

impl PassThroughTracker {
    pub fn new(time: Time, object: &DetectedObject) -> Self {
        Self {
            object: object.clone(),
            measured_at: time,
        }
    }

    /// Time of the detection being reported.
    #[inline]
    pub fn measured_at(&self) -> Time {
        self.measured_at
    }
}

impl TrackModel for PassThroughTracker {
    fn predict(&mut self, _time: Time) -> bool {
        true
    }

    fn limit_states(&mut self) -> bool {
        true
    }

    fn measure(
        &mut self,
        object: &DetectedObject,
        time: Time,
        _self_transform: &Isometry3<f64>,
    ) -> bool {
        let jump = self.object.kinematics.pose.distance_2d(&object.kinematics.pose);
        if jump > MAX_EXPECTED_JUMP {
            warn!("pass-through track jumped {:.2} m between detections", jump);
        }
        self.object = object.clone();
        self.measured_at = time;
        true
    }

    fn tracked_state(&self, time: Time) -> Option<(Kinematics, Shape)> {
        let mut kinematics = self.object.kinematics.clone();

        if kinematics.has_twist {
            let dt = (time - self.measured_at).max(0.0);
            let (sin_yaw, cos_yaw) = kinematics.pose.yaw.sin_cos();
            let twist = kinematics.twist;
            kinematics.pose.position.x += (twist.vx * cos_yaw - twist.vy * sin_yaw) * dt;
            kinematics.pose.position.y += (twist.vx * sin_yaw + twist.vy * cos_yaw) * dt;
            kinematics.pose.yaw += twist.wz * dt;
        }

        if !kinematics.has_position_covariance {
            let cov = &mut kinematics.pose_covariance;
            cov[(cov_idx::X, cov_idx::X)] = NOMINAL_POSE_COV;
            cov[(cov_idx::Y, cov_idx::Y)] = NOMINAL_POSE_COV;
            cov[(cov_idx::Z, cov_idx::Z)] = NOMINAL_POSE_COV;
            cov[(cov_idx::YAW, cov_idx::YAW)] = NOMINAL_POSE_COV;
            kinematics.has_position_covariance = true;
        }

        Some((kinematics, self.object.shape.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::object::{Pose, Twist};

    #[test]
    fn test_extrapolates_along_twist() {
        let mut kinematics = Kinematics::from_pose(Pose::new(1.0, 0.0, 0.0, 0.0));
        kinematics.twist = Twist { vx: 2.0, vy: 0.0, wz: 0.0 };
        kinematics.has_twist = true;
        let object = DetectedObject {
            existence_probability: 1.0,
            classification: Vec::new(),
            kinematics,
            shape: Shape::bounding_box(1.0, 1.0, 1.0),
        };

        let tracker = PassThroughTracker::new(Time::from_seconds(0.0), &object);
        let (k, _) = tracker.tracked_state(Time::from_seconds(0.5)).unwrap();
        assert!((k.pose.position.x - 2.0).abs() < 1e-12);
        assert!(k.has_position_covariance);
        assert!((k.pose_covariance[(0, 0)] - NOMINAL_POSE_COV).abs() < 1e-12);

        // stamps before the detection are not extrapolated backwards
        let (k, _) = tracker.tracked_state(Time::from_seconds(-1.0)).unwrap();
        assert!((k.pose.position.x - 1.0).abs() < 1e-12);
    }
}
