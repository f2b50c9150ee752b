//! Common helpers for the tracker integration tests

#![allow(dead_code)]

use nalgebra::Isometry3;

use multi_object_tracker::prelude::*;

pub const EGO_FRAME: &str = "base_link";
pub const WORLD_FRAME: &str = "map";

pub fn detection(label: ObjectLabel, x: f64, y: f64, yaw: f64, shape: Shape) -> DetectedObject {
    DetectedObject {
        existence_probability: 0.9,
        classification: vec![Classification::new(label, 1.0)],
        kinematics: Kinematics::from_pose(Pose::new(x, y, 0.0, yaw)),
        shape,
    }
}

/// A car heading along +x.
pub fn car(x: f64, y: f64) -> DetectedObject {
    detection(ObjectLabel::Car, x, y, 0.0, Shape::bounding_box(4.5, 1.8, 1.5))
}

pub fn pedestrian(x: f64, y: f64) -> DetectedObject {
    detection(
        ObjectLabel::Pedestrian,
        x,
        y,
        0.0,
        Shape::Cylinder {
            diameter: 0.6,
            height: 1.7,
        },
    )
}

/// A batch already expressed in the world frame.
pub fn world_batch(stamp: f64, objects: Vec<DetectedObject>) -> DetectedObjects {
    DetectedObjects::new(Time::from_seconds(stamp), WORLD_FRAME, objects)
}

/// A batch in the ego frame.
pub fn ego_batch(stamp: f64, objects: Vec<DetectedObject>) -> DetectedObjects {
    DetectedObjects::new(Time::from_seconds(stamp), EGO_FRAME, objects)
}

/// Ego sitting at the world origin.
pub fn identity_transforms() -> StaticTransform {
    StaticTransform::new().with(EGO_FRAME, WORLD_FRAME, Isometry3::identity())
}

pub fn channel(name: &str) -> InputChannelConfig {
    InputChannelConfig::new(format!("/perception/{}/objects", name), name, name)
}

/// Node on the default configuration publishing into a recorder.
pub fn make_node(config: TrackerConfig) -> MultiObjectTracker<StaticTransform, RecordingPublisher> {
    MultiObjectTracker::new(
        config,
        identity_transforms(),
        RecordingPublisher::default(),
        Time::from_seconds(0.0),
    )
    .expect("valid configuration")
}

/// Processor and association on the default configuration.
pub fn make_pipeline() -> (TrackerProcessor, DataAssociation) {
    let config = TrackerConfig::default();
    let processor = TrackerProcessor::new(config.processor, config.tracker_map);
    let association = DataAssociation::new(config.association).expect("valid tables");
    (processor, association)
}

/// One tracking cycle the way the node runs it, with an identity ego pose.
pub fn run_cycle(
    processor: &mut TrackerProcessor,
    association: &DataAssociation,
    batch: &DetectedObjects,
) -> AssignmentResult {
    let score = association.calc_score_matrix(batch, processor.trackers());
    let assignment = association.assign(&score).expect("assignment succeeds");

    let ego = Isometry3::identity();
    processor.predict(batch.stamp);
    processor.update(batch, &ego, &assignment.direct);
    processor.spawn(batch, &ego, &assignment.reverse);
    processor.prune(batch.stamp);
    assignment
}

/// True if no two confirmed-or-tentative tracks overlap by more than `min_iou`.
pub fn no_overlaps(objects: &[TrackedObject], min_iou: f64) -> bool {
    for (i, a) in objects.iter().enumerate() {
        for b in &objects[i + 1..] {
            let iou = multi_object_tracker::utils::get_2d_iou(
                &a.kinematics.pose,
                &a.shape,
                &b.kinematics.pose,
                &b.shape,
                1e-2,
            );
            if iou > min_iou {
                return false;
            }
        }
    }
    true
}
