//! Detection input streams
//!
//! Each source pushes batches into its own [`InputStream`] from any thread.
//! The [`InputManager`] owns every stream and, on each tracking cycle,
//! releases the batches inside a latency window in stamp order.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::object::DetectedObjects;
use crate::types::time::Time;
use crate::{Result, TrackerError};

/// Smoothing gain of the latency and interval statistics.
const STATISTICS_GAIN: f64 = 0.05;

/// Latency assumed before the first message.
const INITIAL_LATENCY_MEAN: f64 = 0.10;

/// Standard deviations of interval jitter tolerated before a stream counts
/// as delayed.
const DELAY_SIGMA: f64 = 3.0;

// ============================================================================
// Configuration
// ============================================================================

/// One detection source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputChannelConfig {
    pub topic: String,
    pub long_name: String,
    pub short_name: String,
    /// Hz
    pub expected_rate: f64,
    /// Batches kept before the oldest is evicted
    pub queue_size: usize,
}

impl Default for InputChannelConfig {
    fn default() -> Self {
        Self {
            topic: "/perception/object_recognition/detection/objects".into(),
            long_name: "detected_objects".into(),
            short_name: "all".into(),
            expected_rate: 10.0,
            queue_size: 2,
        }
    }
}

impl InputChannelConfig {
    pub fn new(
        topic: impl Into<String>,
        long_name: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            long_name: long_name.into(),
            short_name: short_name.into(),
            ..Self::default()
        }
    }
}

/// Window of measurement age released per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputWindowConfig {
    /// Batches younger than this stay queued, seconds
    pub target_latency: f64,
    /// Batches older than this are dropped, seconds
    pub acceptable_latency: f64,
}

impl Default for InputWindowConfig {
    fn default() -> Self {
        Self {
            target_latency: 0.15,
            acceptable_latency: 0.35,
        }
    }
}

// ============================================================================
// Input Stream
// ============================================================================

/// Smoothed timing of a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStatistics {
    pub latency_mean: f64,
    pub latency_var: f64,
    pub interval_mean: f64,
    pub interval_var: f64,
}

/// Health snapshot of a stream at a given time.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStatistics {
    pub long_name: String,
    pub queued: usize,
    pub timing: TimeStatistics,
    /// Age of the newest measurement, `None` before the first message
    pub measurement_latency: Option<f64>,
    /// Time since the newest message arrived
    pub message_latency: Option<f64>,
    /// Nothing received yet, or silent for longer than the usual interval
    pub is_delayed: bool,
}

#[derive(Debug)]
struct StreamState {
    queue: VecDeque<DetectedObjects>,
    timing: TimeStatistics,
    latest_measurement_time: Option<Time>,
    latest_message_time: Option<Time>,
    /// Delay state last reported by the manager.
    reported_delay: bool,
}

/// Bounded, drop-oldest queue of one source's batches.
#[derive(Debug)]
pub struct InputStream {
    index: usize,
    config: InputChannelConfig,
    state: Mutex<StreamState>,
}

impl InputStream {
    pub fn new(index: usize, config: InputChannelConfig) -> Self {
        let interval_mean = if config.expected_rate > 0.0 {
            1.0 / config.expected_rate
        } else {
            0.0
        };
        Self {
            index,
            state: Mutex::new(StreamState {
                queue: VecDeque::with_capacity(config.queue_size + 1),
                timing: TimeStatistics {
                    latency_mean: INITIAL_LATENCY_MEAN,
                    latency_var: 0.0,
                    interval_mean,
                    interval_var: 0.0,
                },
                latest_measurement_time: None,
                latest_message_time: None,
                reported_delay: false,
            }),
            config,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn config(&self) -> &InputChannelConfig {
        &self.config
    }

    /// `(long_name, short_name)`
    pub fn names(&self) -> (&str, &str) {
        (&self.config.long_name, &self.config.short_name)
    }

    /// Queues a batch received at `now`, evicting the oldest beyond the queue
    /// size. The batch is tagged with this stream's channel index.
    pub fn set_objects(&self, mut batch: DetectedObjects, now: Time) {
        batch.channel = self.index;
        let stamp = batch.stamp;

        let mut state = self.state.lock();
        state.queue.push_back(batch);
        while state.queue.len() > self.config.queue_size.max(1) {
            state.queue.pop_front();
        }

        let g = STATISTICS_GAIN;
        if let Some(previous) = state.latest_message_time {
            let interval = now - previous;
            let t = &mut state.timing;
            t.interval_mean = (1.0 - g) * t.interval_mean + g * interval;
            let delta = interval - t.interval_mean;
            t.interval_var = (1.0 - g) * t.interval_var + g * delta * delta;
        }

        state.latest_message_time = Some(now);
        state.latest_measurement_time = Some(stamp);

        let latency = now - stamp;
        let t = &mut state.timing;
        t.latency_mean = (1.0 - g) * t.latency_mean + g * latency;
        let delta = latency - t.latency_mean;
        t.latency_var = (1.0 - g) * t.latency_var + g * delta * delta;
    }

    /// Removes and returns the batches stamped in `[oldest, latest]`.
    ///
    /// Batches older than `oldest` are discarded; newer ones stay queued.
    pub fn get_objects_older_than(&self, latest: Time, oldest: Time) -> Vec<DetectedObjects> {
        let mut state = self.state.lock();
        let mut released = Vec::new();
        let mut kept = VecDeque::with_capacity(state.queue.len());

        for batch in state.queue.drain(..) {
            if batch.stamp < oldest {
                continue;
            }
            if batch.stamp <= latest {
                released.push(batch);
            } else {
                kept.push_back(batch);
            }
        }
        state.queue = kept;

        debug!("{} gives {} batches", self.config.long_name, released.len());
        released
    }

    pub fn objects_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// `(latest_measurement_time, latest_message_time)`, `None` before the
    /// first message.
    pub fn timestamps(&self) -> Option<(Time, Time)> {
        let state = self.state.lock();
        state.latest_measurement_time.zip(state.latest_message_time)
    }

    pub fn is_time_initialized(&self) -> bool {
        self.state.lock().latest_message_time.is_some()
    }

    pub fn time_statistics(&self) -> TimeStatistics {
        self.state.lock().timing
    }

    pub fn statistics(&self, now: Time) -> StreamStatistics {
        let state = self.state.lock();
        let timing = state.timing;
        let message_latency = state.latest_message_time.map(|t| now - t);
        let is_delayed = match message_latency {
            None => true,
            Some(latency) => {
                latency > timing.interval_mean + DELAY_SIGMA * timing.interval_var.sqrt()
            }
        };

        StreamStatistics {
            long_name: self.config.long_name.clone(),
            queued: state.queue.len(),
            timing,
            measurement_latency: state.latest_measurement_time.map(|t| now - t),
            message_latency,
            is_delayed,
        }
    }

    /// Records the delay state; true when it differs from the last one.
    fn note_delay(&self, is_delayed: bool) -> bool {
        let mut state = self.state.lock();
        let changed = state.reported_delay != is_delayed;
        state.reported_delay = is_delayed;
        changed
    }
}

// ============================================================================
// Input Manager
// ============================================================================

/// All input streams plus the release window.
#[derive(Debug)]
pub struct InputManager {
    streams: Vec<Arc<InputStream>>,
    window: InputWindowConfig,
    latest_object_time: Time,
}

impl InputManager {
    /// # Errors
    /// [`TrackerError::NoInputStreams`] if `channels` is empty.
    pub fn new(channels: &[InputChannelConfig], now: Time) -> Result<Self> {
        if channels.is_empty() {
            return Err(TrackerError::NoInputStreams);
        }

        let streams = channels
            .iter()
            .enumerate()
            .map(|(i, config)| {
                debug!("input stream {} ({}) from {}", i, config.long_name, config.topic);
                Arc::new(InputStream::new(i, config.clone()))
            })
            .collect();

        Ok(Self {
            streams,
            window: InputWindowConfig::default(),
            latest_object_time: now,
        })
    }

    pub fn with_window(mut self, window: InputWindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Producer handle of stream `index`.
    pub fn stream(&self, index: usize) -> Option<Arc<InputStream>> {
        self.streams.get(index).cloned()
    }

    pub fn streams(&self) -> &[Arc<InputStream>] {
        &self.streams
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stamp of the newest batch released so far.
    #[inline]
    pub fn latest_object_time(&self) -> Time {
        self.latest_object_time
    }

    /// True once the major stream (index 0) holds data.
    pub fn is_inputs_ready(&self) -> bool {
        self.streams
            .first()
            .is_some_and(|s| s.objects_count() > 0)
    }

    /// Releases every batch inside the latency window ending at `now`,
    /// sorted by stamp.
    pub fn get_objects(&mut self, now: Time) -> Option<Vec<DetectedObjects>> {
        for stream in &self.streams {
            let stats = stream.statistics(now);
            if !stream.is_time_initialized() {
                continue;
            }
            debug!(
                "{}: latency mean {:.3} std {:.3}, interval mean {:.3} std {:.3}, queued {}",
                stats.long_name,
                stats.timing.latency_mean,
                stats.timing.latency_var.sqrt(),
                stats.timing.interval_mean,
                stats.timing.interval_var.sqrt(),
                stats.queued
            );
            if stream.note_delay(stats.is_delayed) {
                if stats.is_delayed {
                    warn!(
                        "{} is delayed, last message {:.3}s ago",
                        stats.long_name,
                        stats.message_latency.unwrap_or_default()
                    );
                } else {
                    info!("{} is back on time", stats.long_name);
                }
            }
        }

        let latest = now - self.window.target_latency;
        let oldest = (now - self.window.acceptable_latency).max(self.latest_object_time);

        let mut objects: Vec<DetectedObjects> = self
            .streams
            .iter()
            .flat_map(|s| s.get_objects_older_than(latest, oldest))
            .collect();
        objects.sort_by(|a, b| a.stamp.seconds().total_cmp(&b.stamp.seconds()));

        debug!("released {} batches", objects.len());

        let last = objects.last()?;
        self.latest_object_time = last.stamp;
        Some(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(stamp: f64) -> DetectedObjects {
        DetectedObjects::new(Time::from_seconds(stamp), "base_link", Vec::new())
    }

    fn channel(name: &str) -> InputChannelConfig {
        InputChannelConfig::new(format!("/{}", name), name, name)
    }

    #[test]
    fn test_queue_evicts_oldest() {
        let stream = InputStream::new(0, channel("lidar"));
        for i in 0..5 {
            stream.set_objects(batch(i as f64), Time::from_seconds(i as f64 + 0.1));
        }
        assert_eq!(stream.objects_count(), 2);

        let out = stream.get_objects_older_than(Time::from_seconds(10.0), Time::from_seconds(0.0));
        let stamps: Vec<f64> = out.iter().map(|b| b.stamp.seconds()).collect();
        assert_eq!(stamps, vec![3.0, 4.0]);
    }

    #[test]
    fn test_window_release() {
        let mut config = channel("lidar");
        config.queue_size = 10;
        let stream = InputStream::new(3, config);
        for stamp in [1.0, 2.0, 3.0] {
            stream.set_objects(batch(stamp), Time::from_seconds(stamp));
        }

        let out = stream.get_objects_older_than(Time::from_seconds(2.5), Time::from_seconds(1.5));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stamp, Time::from_seconds(2.0));
        assert_eq!(out[0].channel, 3);
        // 1.0 dropped, 3.0 still waiting
        assert_eq!(stream.objects_count(), 1);
    }

    #[test]
    fn test_statistics_update() {
        let stream = InputStream::new(0, channel("lidar"));
        assert!(stream.timestamps().is_none());
        assert!(stream.statistics(Time::from_seconds(0.0)).is_delayed);

        stream.set_objects(batch(0.9), Time::from_seconds(1.0));
        let t = stream.time_statistics();
        // interval untouched by the first message
        assert!((t.interval_mean - 0.1).abs() < 1e-12);
        assert!((t.latency_mean - 0.1).abs() < 1e-12);

        stream.set_objects(batch(1.0), Time::from_seconds(1.3));
        let t = stream.time_statistics();
        assert!((t.interval_mean - (0.95 * 0.1 + 0.05 * 0.3)).abs() < 1e-12);
        assert!((t.latency_mean - (0.95 * 0.1 + 0.05 * 0.3)).abs() < 1e-12);

        let (measurement, message) = stream.timestamps().unwrap();
        assert_eq!(measurement, Time::from_seconds(1.0));
        assert_eq!(message, Time::from_seconds(1.3));

        assert!(!stream.statistics(Time::from_seconds(1.35)).is_delayed);
        assert!(stream.statistics(Time::from_seconds(3.0)).is_delayed);
    }

    #[test]
    fn test_delay_reported_on_change() {
        let mut manager =
            InputManager::new(&[channel("lidar")], Time::from_seconds(0.0)).unwrap();
        let stream = manager.stream(0).unwrap();
        stream.set_objects(batch(0.9), Time::from_seconds(1.0));

        // silent for two seconds
        manager.get_objects(Time::from_seconds(3.0));
        assert!(!stream.note_delay(true));

        stream.set_objects(batch(3.0), Time::from_seconds(3.05));
        manager.get_objects(Time::from_seconds(3.1));
        assert!(!stream.note_delay(false));
        assert!(stream.note_delay(true));
    }

    #[test]
    fn test_manager_requires_streams() {
        assert!(matches!(
            InputManager::new(&[], Time::from_seconds(0.0)),
            Err(TrackerError::NoInputStreams)
        ));
    }

    #[test]
    fn test_manager_sorts_across_streams() {
        let mut manager =
            InputManager::new(&[channel("a"), channel("b")], Time::from_seconds(0.0)).unwrap();
        assert!(!manager.is_inputs_ready());

        let a = manager.stream(0).unwrap();
        let b = manager.stream(1).unwrap();
        b.set_objects(batch(0.95), Time::from_seconds(1.0));
        a.set_objects(batch(1.0), Time::from_seconds(1.05));
        assert!(manager.is_inputs_ready());

        let out = manager.get_objects(Time::from_seconds(1.2)).unwrap();
        let stamps: Vec<f64> = out.iter().map(|b| b.stamp.seconds()).collect();
        assert_eq!(stamps, vec![0.95, 1.0]);
        assert_eq!(out[0].channel, 1);
        assert_eq!(manager.latest_object_time(), Time::from_seconds(1.0));

        // nothing new
        assert!(manager.get_objects(Time::from_seconds(1.3)).is_none());
    }

    #[test]
    fn test_manager_holds_recent_batches() {
        let mut manager = InputManager::new(&[channel("a")], Time::from_seconds(0.0)).unwrap();
        manager
            .stream(0)
            .unwrap()
            .set_objects(batch(1.0), Time::from_seconds(1.0));

        // younger than the target latency
        assert!(manager.get_objects(Time::from_seconds(1.1)).is_none());
        assert!(manager.get_objects(Time::from_seconds(1.2)).is_some());
    }
}
