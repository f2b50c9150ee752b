//! Detection and track data model
//!
//! A [`DetectedObject`] is one sensor's single-frame observation; a
//! [`DetectedObjects`] batch is what a source publishes per frame. Trackers
//! export [`TrackedObject`]s, collected into [`TrackedObjects`] for publishing.

use nalgebra::{Matrix6, Point2, Point3};

use super::labels::{highest_prob_label, Classification, ObjectLabel, TrackId};
use super::time::Time;

/// Row/column indices into 6x6 pose and twist covariances.
///
/// Order is x, y, z, roll, pitch, yaw (linear then angular for twists).
pub mod cov_idx {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
    pub const ROLL: usize = 3;
    pub const PITCH: usize = 4;
    pub const YAW: usize = 5;
}

// ============================================================================
// Kinematics
// ============================================================================

/// Planar pose with height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point3<f64>,
    /// Heading around the z axis, radians
    pub yaw: f64,
}

impl Pose {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            yaw,
        }
    }

    /// Horizontal distance to another pose.
    #[inline]
    pub fn distance_2d(&self, other: &Pose) -> f64 {
        (self.position.x - other.position.x).hypot(self.position.y - other.position.y)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Velocity expressed in the object frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist {
    /// Longitudinal velocity, m/s
    pub vx: f64,
    /// Lateral velocity, m/s
    pub vy: f64,
    /// Yaw rate, rad/s
    pub wz: f64,
}

/// Whether the heading of a detection can be trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrientationAvailability {
    Unavailable,
    /// Axis known, front/back ambiguous
    #[default]
    SignUnknown,
    Available,
}

/// Pose, twist and their uncertainties.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    pub pose: Pose,
    pub pose_covariance: Matrix6<f64>,
    pub has_position_covariance: bool,
    pub orientation_availability: OrientationAvailability,
    pub twist: Twist,
    pub twist_covariance: Matrix6<f64>,
    pub has_twist: bool,
    pub has_twist_covariance: bool,
}

impl Kinematics {
    /// Kinematics with only a pose and no uncertainty information.
    pub fn from_pose(pose: Pose) -> Self {
        Self {
            pose,
            pose_covariance: Matrix6::zeros(),
            has_position_covariance: false,
            orientation_availability: OrientationAvailability::SignUnknown,
            twist: Twist::default(),
            twist_covariance: Matrix6::zeros(),
            has_twist: false,
            has_twist_covariance: false,
        }
    }
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::from_pose(Pose::default())
    }
}

// ============================================================================
// Shape
// ============================================================================

/// Object extent.
///
/// Polygon footprints are given in the object frame (relative to the pose).
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    BoundingBox {
        length: f64,
        width: f64,
        height: f64,
    },
    Cylinder {
        diameter: f64,
        height: f64,
    },
    Polygon {
        footprint: Vec<Point2<f64>>,
        height: f64,
    },
}

impl Shape {
    #[inline]
    pub fn bounding_box(length: f64, width: f64, height: f64) -> Self {
        Shape::BoundingBox {
            length,
            width,
            height,
        }
    }

    /// Footprint area in square meters.
    pub fn area(&self) -> f64 {
        match self {
            Shape::BoundingBox { length, width, .. } => length * width,
            Shape::Cylinder { diameter, .. } => {
                let r = diameter * 0.5;
                ::core::f64::consts::PI * r * r
            }
            Shape::Polygon { footprint, .. } => crate::utils::polygon_area(footprint),
        }
    }

    pub fn height(&self) -> f64 {
        match self {
            Shape::BoundingBox { height, .. }
            | Shape::Cylinder { height, .. }
            | Shape::Polygon { height, .. } => *height,
        }
    }
}

// ============================================================================
// Detections
// ============================================================================

/// A single-frame observation of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    pub existence_probability: f64,
    pub classification: Vec<Classification>,
    pub kinematics: Kinematics,
    pub shape: Shape,
}

impl DetectedObject {
    /// Highest-probability class of this detection.
    #[inline]
    pub fn label(&self) -> ObjectLabel {
        highest_prob_label(&self.classification)
    }
}

/// All objects one source reported for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObjects {
    /// Measurement time of the frame
    pub stamp: Time,
    pub frame_id: String,
    /// Index of the input channel that produced the batch
    pub channel: usize,
    pub objects: Vec<DetectedObject>,
}

impl DetectedObjects {
    pub fn new(stamp: Time, frame_id: impl Into<String>, objects: Vec<DetectedObject>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
            channel: 0,
            objects,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// A track exported at a given time.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: TrackId,
    pub existence_probability: f64,
    pub classification: Vec<Classification>,
    pub kinematics: Kinematics,
    pub shape: Shape,
}

impl TrackedObject {
    #[inline]
    pub fn label(&self) -> ObjectLabel {
        highest_prob_label(&self.classification)
    }
}

/// Tracks published for one output stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObjects {
    pub stamp: Time,
    pub frame_id: String,
    pub objects: Vec<TrackedObject>,
}

impl TrackedObjects {
    pub fn new(stamp: Time, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
            objects: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_area() {
        assert!((Shape::bounding_box(4.0, 2.0, 1.5).area() - 8.0).abs() < 1e-12);

        let cylinder = Shape::Cylinder {
            diameter: 2.0,
            height: 1.0,
        };
        assert!((cylinder.area() - ::core::f64::consts::PI).abs() < 1e-12);

        let square = Shape::Polygon {
            footprint: vec![
                Point2::new(-1.0, -1.0),
                Point2::new(1.0, -1.0),
                Point2::new(1.0, 1.0),
                Point2::new(-1.0, 1.0),
            ],
            height: 1.0,
        };
        assert!((square.area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_detection_label() {
        let object = DetectedObject {
            existence_probability: 0.9,
            classification: vec![
                Classification::new(ObjectLabel::Car, 0.2),
                Classification::new(ObjectLabel::Pedestrian, 0.8),
            ],
            kinematics: Kinematics::default(),
            shape: Shape::bounding_box(0.6, 0.6, 1.7),
        };
        assert_eq!(object.label(), ObjectLabel::Pedestrian);
    }

    #[test]
    fn test_pose_distance() {
        let a = Pose::new(0.0, 0.0, 0.0, 0.0);
        let b = Pose::new(3.0, 4.0, 10.0, 1.0);
        assert!((a.distance_2d(&b) - 5.0).abs() < 1e-12);
    }
}
