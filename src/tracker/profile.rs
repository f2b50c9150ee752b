//! Per-class noise profiles for the filtered trackers
//!
//! Measurement noise (`r_*`) is used when a detection carries no covariance of
//! its own; initial covariance (`p0_*`) seeds a new track. Position variances
//! are given in the object frame (longitudinal, lateral) and rotated by the
//! heading when applied.

use crate::models::{kmph_to_mps, CtrvMotionParams, CvMotionParams};

#[inline]
fn sq(v: f64) -> f64 {
    v * v
}

// ============================================================================
// CTRV Profiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CtrvProfile {
    pub r_cov_x: f64,
    pub r_cov_y: f64,
    pub r_cov_yaw: f64,
    pub r_cov_vel: f64,
    pub p0_cov_x: f64,
    pub p0_cov_y: f64,
    pub p0_cov_yaw: f64,
    pub p0_cov_vel: f64,
    pub p0_cov_wz: f64,
    /// Measured speed is used only while it is this close to the prediction.
    pub velocity_deviation_threshold: f64,
    /// Blend factor of new box dimensions into the track's box.
    pub shape_gain: f64,
    /// Hold the box side facing the ego vehicle in place while the box
    /// changes size, instead of the box centre.
    pub anchor_tracking: bool,
    pub size_limits: Option<SizeLimits>,
    pub motion: CtrvMotionParams,
}

/// Bounds on the box of large objects.
///
/// Only bounding-box detections whose length and width lie within
/// `input_min..=input_max` update the shape. The smoothed box is clamped to
/// `min..=max` in every dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeLimits {
    pub input_min: f64,
    pub input_max: f64,
    pub min: f64,
    pub max: f64,
}

impl SizeLimits {
    #[inline]
    pub fn accepts(&self, length: f64, width: f64) -> bool {
        let range = self.input_min..=self.input_max;
        range.contains(&length) && range.contains(&width)
    }

    #[inline]
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

impl CtrvProfile {
    pub fn normal_vehicle() -> Self {
        Self {
            r_cov_x: sq(0.5),
            r_cov_y: sq(0.4),
            r_cov_yaw: sq(20f64.to_radians()),
            r_cov_vel: sq(1.0),
            p0_cov_x: sq(1.0),
            p0_cov_y: sq(0.3),
            p0_cov_yaw: sq(25f64.to_radians()),
            p0_cov_vel: sq(kmph_to_mps(1000.0)),
            p0_cov_wz: sq(30f64.to_radians()),
            velocity_deviation_threshold: kmph_to_mps(10.0),
            shape_gain: 0.2,
            anchor_tracking: true,
            size_limits: None,
            motion: CtrvMotionParams::from_stddev(
                0.5,
                0.5,
                15f64.to_radians(),
                9.8 * 0.35,
                15f64.to_radians(),
            )
            .with_limits(kmph_to_mps(100.0), 30f64.to_radians()),
        }
    }

    pub fn big_vehicle() -> Self {
        Self {
            r_cov_x: sq(1.5),
            r_cov_y: sq(0.5),
            p0_cov_x: sq(1.5),
            p0_cov_y: sq(0.5),
            shape_gain: 0.5,
            size_limits: Some(SizeLimits {
                input_min: 1.0,
                input_max: 40.0,
                min: 1.0,
                max: 30.0,
            }),
            ..Self::normal_vehicle()
        }
    }

    pub fn bicycle() -> Self {
        Self {
            r_cov_x: sq(0.5),
            r_cov_y: sq(0.4),
            r_cov_yaw: sq(30f64.to_radians()),
            r_cov_vel: sq(kmph_to_mps(10.0)),
            p0_cov_x: sq(0.8),
            p0_cov_y: sq(0.5),
            p0_cov_yaw: sq(25f64.to_radians()),
            p0_cov_vel: sq(kmph_to_mps(1000.0)),
            p0_cov_wz: sq(30f64.to_radians()),
            velocity_deviation_threshold: kmph_to_mps(10.0),
            shape_gain: 0.1,
            anchor_tracking: false,
            size_limits: None,
            motion: CtrvMotionParams::from_stddev(
                0.5,
                0.5,
                20f64.to_radians(),
                9.8 * 0.3,
                30f64.to_radians(),
            )
            .with_limits(kmph_to_mps(80.0), 30f64.to_radians()),
        }
    }

    pub fn pedestrian() -> Self {
        Self {
            r_cov_x: sq(0.4),
            r_cov_y: sq(0.4),
            r_cov_yaw: sq(30f64.to_radians()),
            r_cov_vel: sq(kmph_to_mps(5.0)),
            p0_cov_x: sq(2.0),
            p0_cov_y: sq(2.0),
            p0_cov_yaw: sq(1000f64.to_radians()),
            p0_cov_vel: sq(kmph_to_mps(120.0)),
            p0_cov_wz: sq(360f64.to_radians()),
            velocity_deviation_threshold: kmph_to_mps(10.0),
            shape_gain: 0.1,
            anchor_tracking: false,
            size_limits: None,
            motion: CtrvMotionParams::from_stddev(
                0.5,
                0.5,
                20f64.to_radians(),
                kmph_to_mps(5.0),
                30f64.to_radians(),
            )
            .with_limits(kmph_to_mps(100.0), 30f64.to_radians()),
        }
    }
}

// ============================================================================
// CV Profiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvProfile {
    pub r_cov_x: f64,
    pub r_cov_y: f64,
    pub r_cov_vx: f64,
    pub r_cov_vy: f64,
    pub p0_cov_x: f64,
    pub p0_cov_y: f64,
    pub p0_cov_vx: f64,
    pub p0_cov_vy: f64,
    pub motion: CvMotionParams,
}

impl CvProfile {
    /// General-purpose constant velocity tracking.
    pub fn generic() -> Self {
        Self {
            r_cov_x: sq(0.5),
            r_cov_y: sq(0.5),
            r_cov_vx: sq(1.0),
            r_cov_vy: sq(1.0),
            p0_cov_x: sq(1.0),
            p0_cov_y: sq(1.0),
            p0_cov_vx: sq(kmph_to_mps(120.0)),
            p0_cov_vy: sq(kmph_to_mps(120.0)),
            motion: CvMotionParams::default(),
        }
    }

    /// Unclassified objects: looser measurement noise.
    pub fn unknown() -> Self {
        Self {
            r_cov_x: sq(1.0),
            r_cov_y: sq(1.0),
            p0_cov_x: sq(1.0),
            p0_cov_y: sq(1.0),
            motion: CvMotionParams::from_stddev(0.5, 0.5, 9.8 * 0.5, 9.8 * 0.5)
                .with_limits(kmph_to_mps(60.0), kmph_to_mps(60.0)),
            ..Self::generic()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_positive() {
        for p in [
            CtrvProfile::normal_vehicle(),
            CtrvProfile::big_vehicle(),
            CtrvProfile::bicycle(),
            CtrvProfile::pedestrian(),
        ] {
            assert!(p.r_cov_x > 0.0 && p.r_cov_y > 0.0 && p.r_cov_yaw > 0.0);
            assert!(p.p0_cov_vel > 0.0 && p.p0_cov_wz > 0.0);
            assert!(p.motion.max_vel > 0.0);
        }
        for p in [CvProfile::generic(), CvProfile::unknown()] {
            assert!(p.r_cov_x > 0.0 && p.p0_cov_vx > 0.0);
        }
    }

    #[test]
    fn test_big_vehicle_is_looser_longitudinally() {
        assert!(CtrvProfile::big_vehicle().r_cov_x > CtrvProfile::normal_vehicle().r_cov_x);
    }

    #[test]
    fn test_big_vehicle_size_limits() {
        let limits = CtrvProfile::big_vehicle().size_limits.unwrap();
        assert!(limits.accepts(12.0, 2.5));
        assert!(!limits.accepts(45.0, 2.5));
        assert!(!limits.accepts(12.0, 0.5));
        assert_eq!(limits.clamp(35.0), 30.0);
        assert_eq!(limits.clamp(0.2), 1.0);
        assert!(CtrvProfile::normal_vehicle().size_limits.is_none());
    }
}
