//! Tracking node
//!
//! [`MultiObjectTracker`] wires the input manager, data association and the
//! track processor together and decides when to publish. It is driven by the
//! caller's clock through [`MultiObjectTracker::on_trigger`] and
//! [`MultiObjectTracker::on_timer`]; transport and transform lookup are
//! injected.

use log::{debug, info, warn};

use crate::assignment::DataAssociation;
use crate::config::TrackerConfig;
use crate::processor::{InputManager, TrackerProcessor};
use crate::types::object::{DetectedObjects, TrackedObjects};
use crate::types::time::Time;
use crate::utils::{transform_objects, SelfTransform};
use crate::Result;

/// Share of the publish period after which a data-triggered cycle publishes
/// when delay compensation is on.
const MIN_PUBLISH_INTERVAL_RATIO: f64 = 0.70;

/// Share of the publish period after which the timer forces a publish.
const MAX_PUBLISH_LATENCY_RATIO: f64 = 1.11;

/// Timer calls per publish period.
pub const TIMER_RATE_FACTOR: f64 = 20.0;

/// Sink for published tracks.
pub trait TrackPublisher {
    fn publish(&mut self, objects: &TrackedObjects);

    /// Tracks not yet confirmed; only called when enabled in the config.
    fn publish_tentative(&mut self, _objects: &TrackedObjects) {}
}

/// Collects every published message.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    pub published: Vec<TrackedObjects>,
    pub tentative: Vec<TrackedObjects>,
}

impl TrackPublisher for RecordingPublisher {
    fn publish(&mut self, objects: &TrackedObjects) {
        self.published.push(objects.clone());
    }

    fn publish_tentative(&mut self, objects: &TrackedObjects) {
        self.tentative.push(objects.clone());
    }
}

/// The complete tracker.
pub struct MultiObjectTracker<T: SelfTransform, P: TrackPublisher> {
    config: TrackerConfig,
    input_manager: InputManager,
    association: DataAssociation,
    processor: TrackerProcessor,
    transform_source: T,
    publisher: P,
    last_published_time: Time,
}

impl<T: SelfTransform, P: TrackPublisher> MultiObjectTracker<T, P> {
    /// # Errors
    /// Fails when the configuration does not validate.
    pub fn new(
        config: TrackerConfig,
        transform_source: T,
        publisher: P,
        now: Time,
    ) -> Result<Self> {
        config.validate()?;

        for (label, name) in config.tracker_map.unresolved() {
            warn!("tracker '{}' for {} is not known, unknown tracker will be used", name, label);
        }

        let input_manager =
            InputManager::new(&config.input_channels, now)?.with_window(config.input);
        let association = DataAssociation::new(config.association.clone())?;
        let processor = TrackerProcessor::new(config.processor, config.tracker_map.clone());

        info!(
            "tracking in {} with {} input streams at {} Hz{}",
            config.world_frame_id,
            input_manager.len(),
            config.publish_rate,
            if config.enable_delay_compensation {
                ", delay compensated"
            } else {
                ""
            }
        );

        Ok(Self {
            config,
            input_manager,
            association,
            processor,
            transform_source,
            publisher,
            last_published_time: now,
        })
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Handle for producers; see [`InputManager::stream`].
    #[inline]
    pub fn input_manager(&self) -> &InputManager {
        &self.input_manager
    }

    #[inline]
    pub fn processor(&self) -> &TrackerProcessor {
        &self.processor
    }

    #[inline]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    #[inline]
    pub fn last_published_time(&self) -> Time {
        self.last_published_time
    }

    /// Interval at which [`on_timer`](Self::on_timer) should be called.
    pub fn timer_period(&self) -> f64 {
        self.config.publish_period() / TIMER_RATE_FACTOR
    }

    /// Processes whatever the input window releases at `now`.
    pub fn on_trigger(&mut self, now: Time) {
        let Some(batches) = self.input_manager.get_objects(now) else {
            return;
        };

        let mut latest_measurement = None;
        for batch in &batches {
            if self.run_process(batch) {
                latest_measurement = Some(batch.stamp);
            }
        }

        if !self.config.enable_delay_compensation {
            if let Some(time) = latest_measurement {
                self.publish(time);
            }
        } else {
            let min_interval = self.config.publish_period() * MIN_PUBLISH_INTERVAL_RATIO;
            if now - self.last_published_time > min_interval {
                self.check_and_publish(now);
            }
        }
    }

    /// Publishes extrapolated tracks when a publish is overdue.
    ///
    /// Only acts with delay compensation enabled.
    pub fn on_timer(&mut self, now: Time) {
        if !self.config.enable_delay_compensation {
            return;
        }
        let max_latency = self.config.publish_period() * MAX_PUBLISH_LATENCY_RATIO;
        if now - self.last_published_time < max_latency {
            return;
        }

        if let Some(batches) = self.input_manager.get_objects(now) {
            for batch in &batches {
                self.run_process(batch);
            }
        }
        self.check_and_publish(now);
    }

    /// One tracking cycle for one batch.
    ///
    /// Returns `false` when the batch was skipped; the tracks are then left
    /// untouched.
    pub fn run_process(&mut self, batch: &DetectedObjects) -> bool {
        let time = batch.stamp;

        let Some(self_transform) = self.transform_source.lookup(
            &self.config.ego_frame_id,
            &self.config.world_frame_id,
            time,
        ) else {
            warn!(
                "no {} pose in {} at {}, batch skipped",
                self.config.ego_frame_id, self.config.world_frame_id, time
            );
            return false;
        };

        let Some(detections) =
            transform_objects(batch, &self.config.world_frame_id, &self.transform_source)
        else {
            return false;
        };

        let score = self
            .association
            .calc_score_matrix(&detections, self.processor.trackers());
        let assignment = match self.association.assign(&score) {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!("association failed at {}: {}", time, e);
                return false;
            }
        };

        self.processor.predict(time);
        self.processor
            .update(&detections, &self_transform, &assignment.direct);
        self.processor
            .spawn(&detections, &self_transform, &assignment.reverse);
        self.processor.prune(time);

        debug!(
            "{} detections from channel {} at {}: {} matched, {} tracks",
            detections.len(),
            detections.channel,
            time,
            assignment.direct.len(),
            self.processor.len()
        );
        true
    }

    /// Prunes at `time`, then publishes.
    pub fn check_and_publish(&mut self, time: Time) {
        self.processor.prune(time);
        self.publish(time);
        self.last_published_time = time;
    }

    fn publish(&mut self, time: Time) {
        let mut output = TrackedObjects::new(time, self.config.world_frame_id.clone());
        output.objects = self.processor.get_tracked_objects(time);
        self.publisher.publish(&output);

        if self.config.publish_tentative_objects {
            let mut tentative = TrackedObjects::new(time, self.config.world_frame_id.clone());
            tentative.objects = self.processor.get_tentative_objects(time);
            self.publisher.publish_tentative(&tentative);
        }
    }
}
