//! Tracker demo
//!
//! Replays a simulated scene through the full node: a car driving along x
//! in front of the ego vehicle and a pedestrian crossing its path, both seen
//! by one lidar stream at 10 Hz. Set `RUST_LOG=debug` for the cycle logs.
//!
//! An optional first argument names a JSON config file.

use std::process::ExitCode;

use log::{error, info};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};

use multi_object_tracker::prelude::*;

/// Logs every published message.
struct LogPublisher;

impl TrackPublisher for LogPublisher {
    fn publish(&mut self, objects: &TrackedObjects) {
        info!("{} tracks at {}", objects.len(), objects.stamp);
        for object in &objects.objects {
            let pose = &object.kinematics.pose;
            info!(
                "  {} {:<10} x {:7.2} y {:6.2} yaw {:5.2} v {:5.2} p {:.2}",
                object.id,
                object.label(),
                pose.position.x,
                pose.position.y,
                pose.yaw,
                object.kinematics.twist.vx,
                object.existence_probability,
            );
        }
    }
}

fn load_config() -> Result<TrackerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| TrackerError::InvalidConfig(format!("{}: {}", path, e)))?;
            TrackerConfig::from_json(&json)
        }
        None => Ok(TrackerConfig::default()),
    }
}

fn detection(label: ObjectLabel, x: f64, y: f64, yaw: f64, shape: Shape) -> DetectedObject {
    DetectedObject {
        existence_probability: 0.8,
        classification: vec![Classification::new(label, 0.9)],
        kinematics: Kinematics::from_pose(Pose::new(x, y, 0.0, yaw)),
        shape,
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // ego parked 10 m along x in the map frame
    let ego = Isometry3::from_parts(Translation3::new(10.0, 0.0, 0.0), UnitQuaternion::identity());
    let transforms = StaticTransform::new().with(
        config.ego_frame_id.clone(),
        config.world_frame_id.clone(),
        ego,
    );
    let ego_frame = config.ego_frame_id.clone();

    let node = MultiObjectTracker::new(config, transforms, LogPublisher, Time::from_seconds(0.0));
    let mut node = match node {
        Ok(node) => node,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let Some(lidar) = node.input_manager().stream(0) else {
        error!("no input stream");
        return ExitCode::FAILURE;
    };

    let dt = 0.1;
    for k in 0..30 {
        let t = k as f64 * dt;
        let car = detection(
            ObjectLabel::Car,
            5.0 + 8.0 * t,
            3.5,
            0.0,
            Shape::bounding_box(4.5, 1.8, 1.5),
        );
        let pedestrian = detection(
            ObjectLabel::Pedestrian,
            15.0,
            -6.0 + 1.2 * t,
            ::core::f64::consts::FRAC_PI_2,
            Shape::Cylinder {
                diameter: 0.6,
                height: 1.7,
            },
        );

        let stamp = Time::from_seconds(t);
        lidar.set_objects(
            DetectedObjects::new(stamp, ego_frame.clone(), vec![car, pedestrian]),
            stamp + 0.05,
        );
        node.on_trigger(stamp + 0.2);
    }

    info!("{} tracks alive at the end", node.processor().len());
    ExitCode::SUCCESS
}
