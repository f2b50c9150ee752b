//! Track lifecycle and per-class tracker models
//!
//! A [`Tracker`] owns one track: its identity, smoothed classification and
//! measurement counters, plus a [`TrackerModel`] that does the kinematic
//! estimation. The model is picked once at spawn from the detection's class
//! through a [`TrackerMap`] and never changes afterwards.

mod ctrv;
mod cv;
mod pass_through;
pub mod profile;
mod unknown;

pub use ctrv::CtrvTracker;
pub use cv::CvTracker;
pub use pass_through::PassThroughTracker;
pub use profile::{CtrvProfile, CvProfile, SizeLimits};
pub use unknown::UnknownTracker;

use std::collections::BTreeMap;

use log::{debug, warn};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

use crate::types::labels::{highest_prob_label, Classification, ObjectLabel, TrackId};
use crate::types::object::{cov_idx, DetectedObject, Kinematics, Pose, Shape, TrackedObject};
use crate::types::time::Time;
use crate::utils::convex_hull_to_bounding_box;

/// Smoothing factor for the height of filtered tracks.
pub(crate) const POSITION_Z_GAIN: f64 = 0.9;

/// Weight of a new detection's classification in the track's classification.
const CLASSIFICATION_GAIN: f64 = 0.05;

/// Classes whose smoothed probability falls below this are dropped.
const MIN_CLASS_PROBABILITY: f64 = 0.001;

// ============================================================================
// Bounding Box
// ============================================================================

/// Box dimensions in the object frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// `self * (1 - gain) + other * gain`, per dimension.
    pub fn blend(&self, other: &BoundingBox, gain: f64) -> BoundingBox {
        let mix = |a: f64, b: f64| (1.0 - gain) * a + gain * b;
        BoundingBox {
            length: mix(self.length, other.length),
            width: mix(self.width, other.width),
            height: mix(self.height, other.height),
        }
    }

    #[inline]
    pub fn to_shape(&self) -> Shape {
        Shape::bounding_box(self.length, self.width, self.height)
    }
}

/// Box view of any detection shape.
///
/// Polygons are replaced by their enclosing box, which may move the pose to
/// the box center. Cylinders become a square box of their diameter.
pub fn shape_to_bounding_box(pose: &Pose, shape: &Shape) -> (Pose, BoundingBox) {
    match shape {
        Shape::BoundingBox {
            length,
            width,
            height,
        } => (
            *pose,
            BoundingBox {
                length: *length,
                width: *width,
                height: *height,
            },
        ),
        Shape::Cylinder { diameter, height } => (
            *pose,
            BoundingBox {
                length: *diameter,
                width: *diameter,
                height: *height,
            },
        ),
        Shape::Polygon { footprint, height } => {
            match convex_hull_to_bounding_box(pose, footprint, *height) {
                Some((center, Shape::BoundingBox { length, width, height })) => {
                    (center, BoundingBox { length, width, height })
                }
                _ => {
                    debug!("degenerate polygon footprint ({} points)", footprint.len());
                    (
                        *pose,
                        BoundingBox {
                            length: 0.0,
                            width: 0.0,
                            height: *height,
                        },
                    )
                }
            }
        }
    }
}

// ============================================================================
// Track Model
// ============================================================================

/// Kinematic estimation behind a track.
pub trait TrackModel {
    /// Advances the estimate to `time`.
    fn predict(&mut self, time: Time) -> bool;

    /// Clamps the estimate to physical limits.
    fn limit_states(&mut self) -> bool;

    /// Corrects the estimate with an associated detection.
    fn measure(
        &mut self,
        object: &DetectedObject,
        time: Time,
        self_transform: &Isometry3<f64>,
    ) -> bool;

    /// Kinematics and shape at `time`, without changing the estimate.
    fn tracked_state(&self, time: Time) -> Option<(Kinematics, Shape)>;
}

/// The closed set of tracker models.
#[derive(Debug, Clone)]
pub enum TrackerModel {
    Ctrv(CtrvTracker),
    Cv(CvTracker),
    PassThrough(PassThroughTracker),
    Unknown(UnknownTracker),
}

impl TrackModel for TrackerModel {
    fn predict(&mut self, time: Time) -> bool {
        match self {
            TrackerModel::Ctrv(t) => t.predict(time),
            TrackerModel::Cv(t) => t.predict(time),
            TrackerModel::PassThrough(t) => t.predict(time),
            TrackerModel::Unknown(t) => t.predict(time),
        }
    }

    fn limit_states(&mut self) -> bool {
        match self {
            TrackerModel::Ctrv(t) => t.limit_states(),
            TrackerModel::Cv(t) => t.limit_states(),
            TrackerModel::PassThrough(t) => t.limit_states(),
            TrackerModel::Unknown(t) => t.limit_states(),
        }
    }

    fn measure(
        &mut self,
        object: &DetectedObject,
        time: Time,
        self_transform: &Isometry3<f64>,
    ) -> bool {
        match self {
            TrackerModel::Ctrv(t) => t.measure(object, time, self_transform),
            TrackerModel::Cv(t) => t.measure(object, time, self_transform),
            TrackerModel::PassThrough(t) => t.measure(object, time, self_transform),
            TrackerModel::Unknown(t) => t.measure(object, time, self_transform),
        }
    }

    fn tracked_state(&self, time: Time) -> Option<(Kinematics, Shape)> {
        match self {
            TrackerModel::Ctrv(t) => t.tracked_state(time),
            TrackerModel::Cv(t) => t.tracked_state(time),
            TrackerModel::PassThrough(t) => t.tracked_state(time),
            TrackerModel::Unknown(t) => t.tracked_state(time),
        }
    }
}

// ============================================================================
// Tracker Types
// ============================================================================

/// Named tracker configurations selectable from the tracker map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerType {
    NormalVehicle,
    BigVehicle,
    /// Normal or big vehicle profile, chosen by the spawning class
    MultiVehicle,
    Bicycle,
    Pedestrian,
    /// Pedestrian or bicycle profile, chosen by the spawning class
    PedestrianAndBicycle,
    Cv,
    PassThrough,
    Unknown,
}

impl TrackerType {
    pub const ALL: [TrackerType; 9] = [
        TrackerType::NormalVehicle,
        TrackerType::BigVehicle,
        TrackerType::MultiVehicle,
        TrackerType::Bicycle,
        TrackerType::Pedestrian,
        TrackerType::PedestrianAndBicycle,
        TrackerType::Cv,
        TrackerType::PassThrough,
        TrackerType::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrackerType::NormalVehicle => "normal_vehicle_tracker",
            TrackerType::BigVehicle => "big_vehicle_tracker",
            TrackerType::MultiVehicle => "multi_vehicle_tracker",
            TrackerType::Bicycle => "bicycle_tracker",
            TrackerType::Pedestrian => "pedestrian_tracker",
            TrackerType::PedestrianAndBicycle => "pedestrian_and_bicycle_tracker",
            TrackerType::Cv => "cv_tracker",
            TrackerType::PassThrough => "pass_through_tracker",
            TrackerType::Unknown => "unknown_tracker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Builds the model for a detection of class `label`.
    pub fn spawn_model(
        self,
        time: Time,
        object: &DetectedObject,
        label: ObjectLabel,
    ) -> TrackerModel {
        let big = matches!(label, ObjectLabel::Truck | ObjectLabel::Bus | ObjectLabel::Trailer);
        match self {
            TrackerType::NormalVehicle => {
                TrackerModel::Ctrv(CtrvTracker::new(time, object, CtrvProfile::normal_vehicle()))
            }
            TrackerType::BigVehicle => {
                TrackerModel::Ctrv(CtrvTracker::new(time, object, CtrvProfile::big_vehicle()))
            }
            TrackerType::MultiVehicle => {
                let profile = if big {
                    CtrvProfile::big_vehicle()
                } else {
                    CtrvProfile::normal_vehicle()
                };
                TrackerModel::Ctrv(CtrvTracker::new(time, object, profile))
            }
            TrackerType::Bicycle => {
                TrackerModel::Ctrv(CtrvTracker::new(time, object, CtrvProfile::bicycle()))
            }
            TrackerType::Pedestrian => {
                TrackerModel::Ctrv(CtrvTracker::new(time, object, CtrvProfile::pedestrian()))
            }
            TrackerType::PedestrianAndBicycle => {
                let profile = if label == ObjectLabel::Pedestrian {
                    CtrvProfile::pedestrian()
                } else {
                    CtrvProfile::bicycle()
                };
                TrackerModel::Ctrv(CtrvTracker::new(time, object, profile))
            }
            TrackerType::Cv => TrackerModel::Cv(CvTracker::new(time, object, CvProfile::generic())),
            TrackerType::PassThrough => {
                TrackerModel::PassThrough(PassThroughTracker::new(time, object))
            }
            TrackerType::Unknown => TrackerModel::Unknown(UnknownTracker::new(time, object)),
        }
    }
}

impl ::core::fmt::Display for TrackerType {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Class label to tracker name table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerMap(BTreeMap<ObjectLabel, String>);

impl TrackerMap {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, label: ObjectLabel, name: impl Into<String>) -> Self {
        self.0.insert(label, name.into());
        self
    }

    pub fn name(&self, label: ObjectLabel) -> Option<&str> {
        self.0.get(&label).map(String::as_str)
    }

    /// Tracker type for `label`; unmapped labels and unknown names resolve to
    /// [`TrackerType::Unknown`].
    pub fn tracker_type(&self, label: ObjectLabel) -> TrackerType {
        match self.name(label) {
            None => TrackerType::Unknown,
            Some(name) => TrackerType::from_name(name).unwrap_or_else(|| {
                warn!("unknown tracker name '{}' for {}, using unknown tracker", name, label);
                TrackerType::Unknown
            }),
        }
    }

    /// Names that do not resolve to a tracker type.
    pub fn unresolved(&self) -> impl Iterator<Item = (ObjectLabel, &str)> {
        self.0
            .iter()
            .filter(|(_, name)| TrackerType::from_name(name).is_none())
            .map(|(label, name)| (*label, name.as_str()))
    }
}

impl Default for TrackerMap {
    fn default() -> Self {
        Self::empty()
            .with(ObjectLabel::Car, TrackerType::MultiVehicle.name())
            .with(ObjectLabel::Truck, TrackerType::MultiVehicle.name())
            .with(ObjectLabel::Bus, TrackerType::MultiVehicle.name())
            .with(ObjectLabel::Trailer, TrackerType::MultiVehicle.name())
            .with(ObjectLabel::Pedestrian, TrackerType::PedestrianAndBicycle.name())
            .with(ObjectLabel::Bicycle, TrackerType::PedestrianAndBicycle.name())
            .with(ObjectLabel::Motorcycle, TrackerType::PedestrianAndBicycle.name())
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// One track.
#[derive(Debug, Clone)]
pub struct Tracker {
    id: TrackId,
    tracker_type: TrackerType,
    classification: Vec<Classification>,
    existence_probability: f64,
    model: TrackerModel,
    no_measurement_count: u32,
    total_no_measurement_count: u32,
    total_measurement_count: u32,
    last_update_with_measurement_time: Time,
}

impl Tracker {
    /// Spawns a track at a detection. The spawning detection counts as the
    /// first measurement.
    pub fn new(time: Time, object: &DetectedObject, tracker_type: TrackerType) -> Self {
        let label = object.label();
        let model = tracker_type.spawn_model(time, object, label);
        let id = TrackId::new_random();
        debug!("spawned track {} ({}, {})", id, label, tracker_type);

        Self {
            id,
            tracker_type,
            classification: object.classification.clone(),
            existence_probability: object.existence_probability,
            model,
            no_measurement_count: 0,
            total_no_measurement_count: 0,
            total_measurement_count: 1,
            last_update_with_measurement_time: time,
        }
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn tracker_type(&self) -> TrackerType {
        self.tracker_type
    }

    #[inline]
    pub fn model(&self) -> &TrackerModel {
        &self.model
    }

    #[inline]
    pub fn classification(&self) -> &[Classification] {
        &self.classification
    }

    #[inline]
    pub fn existence_probability(&self) -> f64 {
        self.existence_probability
    }

    #[inline]
    pub fn highest_prob_label(&self) -> ObjectLabel {
        highest_prob_label(&self.classification)
    }

    #[inline]
    pub fn no_measurement_count(&self) -> u32 {
        self.no_measurement_count
    }

    #[inline]
    pub fn total_no_measurement_count(&self) -> u32 {
        self.total_no_measurement_count
    }

    #[inline]
    pub fn total_measurement_count(&self) -> u32 {
        self.total_measurement_count
    }

    #[inline]
    pub fn last_update_with_measurement_time(&self) -> Time {
        self.last_update_with_measurement_time
    }

    /// Seconds since the last associated detection.
    #[inline]
    pub fn elapsed_time_since_last_update(&self, time: Time) -> f64 {
        time - self.last_update_with_measurement_time
    }

    /// Whether the track has collected `confidence_threshold` measurements.
    #[inline]
    pub fn is_confirmed(&self, confidence_threshold: u32) -> bool {
        self.total_measurement_count >= confidence_threshold
    }

    /// Predicts to `time`, then clamps to the model limits.
    pub fn predict(&mut self, time: Time) -> bool {
        if !self.model.predict(time) {
            return false;
        }
        self.model.limit_states()
    }

    pub fn limit_states(&mut self) -> bool {
        self.model.limit_states()
    }

    pub fn update_with_measurement(
        &mut self,
        object: &DetectedObject,
        time: Time,
        self_transform: &Isometry3<f64>,
    ) -> bool {
        self.no_measurement_count = 0;
        self.total_measurement_count += 1;
        self.last_update_with_measurement_time = time;
        self.update_classification(&object.classification);
        self.existence_probability = object.existence_probability;

        self.model.measure(object, time, self_transform)
    }

    pub fn update_without_measurement(&mut self) {
        self.no_measurement_count += 1;
        self.total_no_measurement_count += 1;
    }

    /// Blends `measured` into the track's class distribution.
    ///
    /// A detection whose best class is UNKNOWN carries no class information
    /// and leaves the distribution unchanged.
    fn update_classification(&mut self, measured: &[Classification]) {
        if measured.is_empty() || highest_prob_label(measured) == ObjectLabel::Unknown {
            return;
        }

        let mut blended: BTreeMap<ObjectLabel, f64> = BTreeMap::new();
        for c in &self.classification {
            *blended.entry(c.label).or_insert(0.0) += (1.0 - CLASSIFICATION_GAIN) * c.probability;
        }
        for c in measured {
            *blended.entry(c.label).or_insert(0.0) += CLASSIFICATION_GAIN * c.probability;
        }
        blended.retain(|_, p| *p >= MIN_CLASS_PROBABILITY);

        let total: f64 = blended.values().sum();
        if total <= 0.0 {
            return;
        }
        self.classification = blended
            .into_iter()
            .map(|(label, p)| Classification::new(label, p / total))
            .collect();
    }

    /// The track as exported at `time`.
    ///
    /// `None` if the model has no state or its position covariance is
    /// degenerate.
    pub fn get_tracked_object(&self, time: Time) -> Option<TrackedObject> {
        let (kinematics, shape) = self.model.tracked_state(time)?;

        let cov = &kinematics.pose_covariance;
        let usable = [cov_idx::X, cov_idx::Y].iter().all(|&i| {
            let v = cov[(i, i)];
            v.is_finite() && v > 0.0
        });
        if !usable {
            debug!("track {} has a degenerate position covariance", self.id);
            return None;
        }

        Some(TrackedObject {
            id: self.id,
            existence_probability: self.existence_probability,
            classification: self.classification.clone(),
            kinematics,
            shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::object::Kinematics;

    fn detection(label: ObjectLabel, x: f64, y: f64) -> DetectedObject {
        DetectedObject {
            existence_probability: 0.9,
            classification: vec![Classification::new(label, 1.0)],
            kinematics: Kinematics::from_pose(Pose::new(x, y, 0.0, 0.0)),
            shape: Shape::bounding_box(4.0, 2.0, 1.5),
        }
    }

    fn spawn(label: ObjectLabel, tracker_type: TrackerType) -> Tracker {
        Tracker::new(Time::from_seconds(0.0), &detection(label, 1.0, 2.0), tracker_type)
    }

    #[test]
    fn test_tracker_names_round_trip() {
        for t in TrackerType::ALL {
            assert_eq!(TrackerType::from_name(t.name()), Some(t));
        }
        assert_eq!(TrackerType::from_name("no_such_tracker"), None);
    }

    #[test]
    fn test_default_map() {
        let map = TrackerMap::default();
        assert_eq!(map.tracker_type(ObjectLabel::Car), TrackerType::MultiVehicle);
        assert_eq!(map.tracker_type(ObjectLabel::Bicycle), TrackerType::PedestrianAndBicycle);
        assert_eq!(map.tracker_type(ObjectLabel::Unknown), TrackerType::Unknown);
        assert_eq!(map.unresolved().count(), 0);
    }

    #[test]
    fn test_bad_name_falls_back_to_unknown() {
        let map = TrackerMap::empty().with(ObjectLabel::Car, "warp_drive_tracker");
        assert_eq!(map.tracker_type(ObjectLabel::Car), TrackerType::Unknown);
        assert_eq!(map.unresolved().count(), 1);
    }

    #[test]
    fn test_spawn_model_variants() {
        assert!(matches!(
            spawn(ObjectLabel::Car, TrackerType::MultiVehicle).model(),
            TrackerModel::Ctrv(_)
        ));
        assert!(matches!(spawn(ObjectLabel::Car, TrackerType::Cv).model(), TrackerModel::Cv(_)));
        assert!(matches!(
            spawn(ObjectLabel::Car, TrackerType::PassThrough).model(),
            TrackerModel::PassThrough(_)
        ));
        assert!(matches!(
            spawn(ObjectLabel::Unknown, TrackerType::Unknown).model(),
            TrackerModel::Unknown(_)
        ));
    }

    #[test]
    fn test_counters() {
        let mut tracker = spawn(ObjectLabel::Car, TrackerType::MultiVehicle);
        assert_eq!(tracker.total_measurement_count(), 1);
        assert!(!tracker.is_confirmed(3));

        tracker.update_without_measurement();
        tracker.update_without_measurement();
        assert_eq!(tracker.no_measurement_count(), 2);
        assert_eq!(tracker.total_no_measurement_count(), 2);

        let t = Time::from_seconds(0.1);
        assert!(tracker.predict(t));
        tracker.update_with_measurement(
            &detection(ObjectLabel::Car, 1.0, 2.0),
            t,
            &Isometry3::identity(),
        );
        tracker.update_with_measurement(
            &detection(ObjectLabel::Car, 1.0, 2.0),
            t,
            &Isometry3::identity(),
        );
        assert_eq!(tracker.no_measurement_count(), 0);
        assert_eq!(tracker.total_no_measurement_count(), 2);
        assert_eq!(tracker.total_measurement_count(), 3);
        assert!(tracker.is_confirmed(3));
        let elapsed = tracker.elapsed_time_since_last_update(Time::from_seconds(0.6));
        assert!((elapsed - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_classification_smoothing() {
        let mut tracker = spawn(ObjectLabel::Car, TrackerType::MultiVehicle);
        let t = Time::from_seconds(0.1);
        assert!(tracker.predict(t));
        tracker.update_with_measurement(
            &detection(ObjectLabel::Truck, 1.0, 2.0),
            t,
            &Isometry3::identity(),
        );

        let classes = tracker.classification();
        let sum: f64 = classes.iter().map(|c| c.probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        let truck = classes.iter().find(|c| c.label == ObjectLabel::Truck).unwrap();
        assert!((truck.probability - 0.05).abs() < 1e-12);
        assert_eq!(tracker.highest_prob_label(), ObjectLabel::Car);
        // the model is never swapped
        assert_eq!(tracker.tracker_type(), TrackerType::MultiVehicle);
    }

    #[test]
    fn test_unknown_detection_keeps_classification() {
        let mut tracker = spawn(ObjectLabel::Pedestrian, TrackerType::PedestrianAndBicycle);
        let t = Time::from_seconds(0.1);
        assert!(tracker.predict(t));
        tracker.update_with_measurement(
            &detection(ObjectLabel::Unknown, 1.0, 2.0),
            t,
            &Isometry3::identity(),
        );
        assert_eq!(tracker.classification(), &[Classification::new(ObjectLabel::Pedestrian, 1.0)]);
    }

    #[test]
    fn test_tracked_object_is_idempotent() {
        let tracker = spawn(ObjectLabel::Car, TrackerType::MultiVehicle);
        let t = Time::from_seconds(0.3);
        let a = tracker.get_tracked_object(t).unwrap();
        let b = tracker.get_tracked_object(t).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, tracker.id());
    }

    #[test]
    fn test_spawn_reproduces_pose() {
        for t in TrackerType::ALL {
            let tracker = spawn(ObjectLabel::Car, t);
            let object = tracker.get_tracked_object(Time::from_seconds(0.0)).unwrap();
            assert!((object.kinematics.pose.position.x - 1.0).abs() < 1e-9, "{}", t);
            assert!((object.kinematics.pose.position.y - 2.0).abs() < 1e-9, "{}", t);
        }
    }

    #[test]
    fn test_bounding_box_blend() {
        let a = BoundingBox { length: 4.0, width: 2.0, height: 1.0 };
        let b = BoundingBox { length: 6.0, width: 2.0, height: 3.0 };
        let c = a.blend(&b, 0.5);
        assert_eq!(c, BoundingBox { length: 5.0, width: 2.0, height: 2.0 });
    }
}
