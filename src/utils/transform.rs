//! Frame transforms for detection batches
//!
//! The tracker does not own a transform tree. Callers inject a
//! [`SelfTransform`] that answers "where is `source_frame` in `target_frame`
//! at `time`".

use std::collections::HashMap;

use log::warn;
use nalgebra::{Isometry3, Matrix3, Matrix6};

use crate::types::object::DetectedObjects;
use crate::types::time::Time;

/// Transform lookup between named frames.
pub trait SelfTransform {
    /// Pose of `source_frame` expressed in `target_frame` at `time`, i.e. the
    /// isometry mapping source coordinates into target coordinates.
    fn lookup(&self, source_frame: &str, target_frame: &str, time: Time) -> Option<Isometry3<f64>>;
}

impl<F> SelfTransform for F
where
    F: Fn(&str, &str, Time) -> Option<Isometry3<f64>>,
{
    fn lookup(&self, source_frame: &str, target_frame: &str, time: Time) -> Option<Isometry3<f64>> {
        self(source_frame, target_frame, time)
    }
}

// ============================================================================
// Static Transform
// ============================================================================

/// Time-invariant transforms between frame pairs.
///
/// Lookups between identical frames return identity; a pair registered in one
/// direction also answers the inverse direction.
#[derive(Debug, Clone, Default)]
pub struct StaticTransform {
    transforms: HashMap<(String, String), Isometry3<f64>>,
}

impl StaticTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the pose of `source_frame` in `target_frame`.
    pub fn insert(
        &mut self,
        source_frame: impl Into<String>,
        target_frame: impl Into<String>,
        transform: Isometry3<f64>,
    ) {
        self.transforms
            .insert((source_frame.into(), target_frame.into()), transform);
    }

    /// Builder form of [`StaticTransform::insert`].
    pub fn with(
        mut self,
        source_frame: impl Into<String>,
        target_frame: impl Into<String>,
        transform: Isometry3<f64>,
    ) -> Self {
        self.insert(source_frame, target_frame, transform);
        self
    }
}

impl SelfTransform for StaticTransform {
    fn lookup(
        &self,
        source_frame: &str,
        target_frame: &str,
        _time: Time,
    ) -> Option<Isometry3<f64>> {
        if source_frame == target_frame {
            return Some(Isometry3::identity());
        }
        let key = (source_frame.to_owned(), target_frame.to_owned());
        if let Some(t) = self.transforms.get(&key) {
            return Some(*t);
        }
        let inverse_key = (target_frame.to_owned(), source_frame.to_owned());
        self.transforms.get(&inverse_key).map(|t| t.inverse())
    }
}

// ============================================================================
// Batch Transformation
// ============================================================================

/// Re-expresses every object of `batch` in `target_frame`.
///
/// Positions and headings are transformed by the frame change; pose
/// covariances are rotated by it. Twists are in the object frame and stay as
/// they are. Returns `None` when the transform is unavailable.
pub fn transform_objects(
    batch: &DetectedObjects,
    target_frame: &str,
    transform: &dyn SelfTransform,
) -> Option<DetectedObjects> {
    if batch.frame_id == target_frame {
        return Some(batch.clone());
    }

    let Some(frame) = transform.lookup(&batch.frame_id, target_frame, batch.stamp) else {
        warn!(
            "no transform from {} to {} at {}",
            batch.frame_id, target_frame, batch.stamp
        );
        return None;
    };

    let (_, _, frame_yaw) = frame.rotation.euler_angles();
    let rotation: Matrix3<f64> = *frame.rotation.to_rotation_matrix().matrix();
    let mut rotation6 = Matrix6::<f64>::zeros();
    rotation6.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    rotation6.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation);

    let mut output = batch.clone();
    output.frame_id = target_frame.to_owned();
    for object in &mut output.objects {
        let pose = &mut object.kinematics.pose;
        pose.position = frame.transform_point(&pose.position);
        pose.yaw = crate::utils::normalize_radian(pose.yaw + frame_yaw);

        let cov = &mut object.kinematics.pose_covariance;
        *cov = rotation6 * *cov * rotation6.transpose();
    }
    Some(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::labels::{Classification, ObjectLabel};
    use crate::types::object::{DetectedObject, Kinematics, Pose, Shape};
    use nalgebra::{Point3, Translation3, UnitQuaternion, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn ego_batch() -> DetectedObjects {
        let mut kinematics = Kinematics::from_pose(Pose::new(1.0, 0.0, 0.5, 0.0));
        kinematics.pose_covariance[(0, 0)] = 4.0;
        kinematics.pose_covariance[(1, 1)] = 1.0;
        DetectedObjects::new(
            Time::from_seconds(1.0),
            "base_link",
            vec![DetectedObject {
                existence_probability: 0.9,
                classification: vec![Classification::new(ObjectLabel::Car, 1.0)],
                kinematics,
                shape: Shape::bounding_box(4.0, 2.0, 1.5),
            }],
        )
    }

    fn ego_in_map() -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(10.0, 5.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        )
    }

    #[test]
    fn test_static_transform_lookup() {
        let tf = StaticTransform::new().with("base_link", "map", ego_in_map());
        let t = Time::from_seconds(0.0);

        assert!(tf.lookup("base_link", "map", t).is_some());
        assert_eq!(tf.lookup("map", "map", t), Some(Isometry3::identity()));

        let inverse = tf.lookup("map", "base_link", t).unwrap();
        let p = inverse.transform_point(&Point3::new(10.0, 5.0, 0.0));
        assert!(p.coords.norm() < 1e-9);

        assert!(tf.lookup("lidar", "map", t).is_none());
    }

    #[test]
    fn test_transform_objects_to_world() {
        let tf = StaticTransform::new().with("base_link", "map", ego_in_map());
        let world = transform_objects(&ego_batch(), "map", &tf).unwrap();

        assert_eq!(world.frame_id, "map");
        let pose = &world.objects[0].kinematics.pose;
        assert!((pose.position.x - 10.0).abs() < 1e-9);
        assert!((pose.position.y - 6.0).abs() < 1e-9);
        assert!((pose.position.z - 0.5).abs() < 1e-9);
        assert!((pose.yaw - FRAC_PI_2).abs() < 1e-9);

        // variances swap axes under a quarter turn
        let cov = &world.objects[0].kinematics.pose_covariance;
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-9);
        assert!((cov[(1, 1)] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_transform() {
        let tf = StaticTransform::new();
        assert!(transform_objects(&ego_batch(), "map", &tf).is_none());
    }

    #[test]
    fn test_closure_transform() {
        let lookup = |_: &str, _: &str, _: Time| Some(Isometry3::translation(1.0, 0.0, 0.0));
        let world = transform_objects(&ego_batch(), "map", &lookup).unwrap();
        assert!((world.objects[0].kinematics.pose.position.x - 2.0).abs() < 1e-9);
    }
}
