//! Track list management
//!
//! [`TrackerProcessor`] owns every track and runs the per-batch cycle
//! `predict -> update -> spawn -> prune`. Association happens outside; the
//! processor consumes its track/detection maps.

pub mod input;

pub use input::*;

use std::collections::HashMap;

use log::{debug, trace};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

use crate::tracker::{Tracker, TrackerMap};
use crate::types::labels::ObjectLabel;
use crate::types::object::{DetectedObjects, TrackedObject};
use crate::types::time::Time;
use crate::utils::get_2d_iou;
use crate::{Result, TrackerError};

/// Union area below which IoU is reported as zero.
const MIN_UNION_IOU_AREA: f64 = 1e-2;

/// Lifetime and overlap policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Measurements needed before a track is published
    pub confident_count_threshold: u32,
    /// Seconds without a measurement before a track is removed
    pub max_elapsed_time: f64,
    /// Tracks farther apart than this (meters) are never merged
    pub distance_threshold: f64,
    pub min_iou: f64,
    /// Overlap threshold when either track is UNKNOWN
    pub min_iou_for_unknown_object: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            confident_count_threshold: 3,
            max_elapsed_time: 1.0,
            distance_threshold: 5.0,
            min_iou: 0.1,
            min_iou_for_unknown_object: 0.001,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_elapsed_time.is_finite() && self.max_elapsed_time > 0.0) {
            return Err(TrackerError::InvalidConfig(
                "max_elapsed_time must be positive".into(),
            ));
        }
        if !(self.distance_threshold.is_finite() && self.distance_threshold >= 0.0) {
            return Err(TrackerError::InvalidConfig(
                "distance_threshold must be non-negative".into(),
            ));
        }
        for (name, v) in [
            ("min_iou", self.min_iou),
            ("min_iou_for_unknown_object", self.min_iou_for_unknown_object),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(TrackerError::InvalidConfig(format!("{} must be in [0, 1]", name)));
            }
        }
        Ok(())
    }
}

/// Owner of the track list.
#[derive(Debug, Clone)]
pub struct TrackerProcessor {
    config: ProcessorConfig,
    tracker_map: TrackerMap,
    trackers: Vec<Tracker>,
}

impl TrackerProcessor {
    pub fn new(config: ProcessorConfig, tracker_map: TrackerMap) -> Self {
        Self {
            config,
            tracker_map,
            trackers: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    #[inline]
    pub fn tracker_map(&self) -> &TrackerMap {
        &self.tracker_map
    }

    /// Read-only view of the tracks, in spawn order.
    #[inline]
    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Predicts every track to `time`.
    pub fn predict(&mut self, time: Time) {
        for tracker in &mut self.trackers {
            if !tracker.predict(time) {
                debug!("track {} could not be predicted to {}", tracker.id(), time);
            }
        }
    }

    /// Applies the associated detections; unassigned tracks record a miss.
    pub fn update(
        &mut self,
        detections: &DetectedObjects,
        self_transform: &Isometry3<f64>,
        direct: &HashMap<usize, usize>,
    ) {
        let time = detections.stamp;
        for (i, tracker) in self.trackers.iter_mut().enumerate() {
            match direct.get(&i).and_then(|&j| detections.objects.get(j)) {
                Some(object) => {
                    if !tracker.update_with_measurement(object, time, self_transform) {
                        debug!("track {} rejected its measurement", tracker.id());
                    }
                }
                None => tracker.update_without_measurement(),
            }
        }
    }

    /// Starts a track for every detection not assigned to one.
    pub fn spawn(
        &mut self,
        detections: &DetectedObjects,
        _self_transform: &Isometry3<f64>,
        reverse: &HashMap<usize, usize>,
    ) {
        let time = detections.stamp;
        for (j, object) in detections.objects.iter().enumerate() {
            if reverse.contains_key(&j) {
                continue;
            }
            let tracker_type = self.tracker_map.tracker_type(object.label());
            self.trackers.push(Tracker::new(time, object, tracker_type));
        }
    }

    /// Removes stale tracks, then resolves overlapping ones.
    pub fn prune(&mut self, time: Time) {
        self.remove_old_trackers(time);
        self.remove_overlapped_trackers(time);
    }

    fn remove_old_trackers(&mut self, time: Time) {
        let max_elapsed = self.config.max_elapsed_time;
        self.trackers.retain(|tracker| {
            let keep = tracker.elapsed_time_since_last_update(time) <= max_elapsed;
            if !keep {
                debug!("track {} expired", tracker.id());
            }
            keep
        });
    }

    /// Of two overlapping tracks, the one with fewer measurements goes; an
    /// UNKNOWN track always yields to a classified one.
    fn remove_overlapped_trackers(&mut self, time: Time) {
        let n = self.trackers.len();
        let objects: Vec<Option<TrackedObject>> =
            self.trackers.iter().map(|t| t.get_tracked_object(time)).collect();
        let mut removed = vec![false; n];

        for i in 0..n {
            if removed[i] {
                continue;
            }
            let Some(object1) = objects[i].as_ref() else {
                continue;
            };

            for j in (i + 1)..n {
                if removed[j] {
                    continue;
                }
                let Some(object2) = objects[j].as_ref() else {
                    continue;
                };

                let distance = object1.kinematics.pose.distance_2d(&object2.kinematics.pose);
                if distance > self.config.distance_threshold {
                    continue;
                }

                let iou = get_2d_iou(
                    &object1.kinematics.pose,
                    &object1.shape,
                    &object2.kinematics.pose,
                    &object2.shape,
                    MIN_UNION_IOU_AREA,
                );
                let (t1, t2) = (&self.trackers[i], &self.trackers[j]);
                let unknown1 = t1.highest_prob_label() == ObjectLabel::Unknown;
                let unknown2 = t2.highest_prob_label() == ObjectLabel::Unknown;
                let fewer1 = t1.total_measurement_count() < t2.total_measurement_count();

                let (delete1, delete2) = if unknown1 || unknown2 {
                    if iou <= self.config.min_iou_for_unknown_object {
                        (false, false)
                    } else if unknown1 && unknown2 {
                        (fewer1, !fewer1)
                    } else {
                        (unknown1, unknown2)
                    }
                } else if iou > self.config.min_iou {
                    (fewer1, !fewer1)
                } else {
                    (false, false)
                };

                if delete1 {
                    trace!("track {} overlaps {} (iou {:.3}), removed", t1.id(), t2.id(), iou);
                    removed[i] = true;
                    break;
                }
                if delete2 {
                    trace!("track {} overlaps {} (iou {:.3}), removed", t2.id(), t1.id(), iou);
                    removed[j] = true;
                }
            }
        }

        let mut index = 0;
        self.trackers.retain(|_| {
            let keep = !removed[index];
            index += 1;
            keep
        });
    }

    /// Confirmed tracks at `time`.
    pub fn get_tracked_objects(&self, time: Time) -> Vec<TrackedObject> {
        let threshold = self.config.confident_count_threshold;
        self.trackers
            .iter()
            .filter(|t| t.is_confirmed(threshold))
            .filter_map(|t| t.get_tracked_object(time))
            .collect()
    }

    /// Tracks still below the confidence threshold at `time`.
    pub fn get_tentative_objects(&self, time: Time) -> Vec<TrackedObject> {
        let threshold = self.config.confident_count_threshold;
        self.trackers
            .iter()
            .filter(|t| !t.is_confirmed(threshold))
            .filter_map(|t| t.get_tracked_object(time))
            .collect()
    }
}
