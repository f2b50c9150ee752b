//! Tracker configuration
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::assignment::AssociationConfig;
use crate::processor::{InputChannelConfig, InputWindowConfig, ProcessorConfig};
use crate::tracker::TrackerMap;
use crate::{Result, TrackerError};

/// Complete configuration of a [`MultiObjectTracker`](crate::node::MultiObjectTracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frame tracks are estimated and published in
    pub world_frame_id: String,
    /// Frame of the vehicle carrying the sensors
    pub ego_frame_id: String,
    /// Hz
    pub publish_rate: f64,
    /// Publish on a timer, extrapolated to the publish time
    pub enable_delay_compensation: bool,
    pub publish_tentative_objects: bool,
    pub input_channels: Vec<InputChannelConfig>,
    pub input: InputWindowConfig,
    pub tracker_map: TrackerMap,
    pub processor: ProcessorConfig,
    pub association: AssociationConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            world_frame_id: "map".into(),
            ego_frame_id: "base_link".into(),
            publish_rate: 10.0,
            enable_delay_compensation: false,
            publish_tentative_objects: false,
            input_channels: vec![InputChannelConfig::default()],
            input: InputWindowConfig::default(),
            tracker_map: TrackerMap::default(),
            processor: ProcessorConfig::default(),
            association: AssociationConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Seconds between publishes.
    #[inline]
    pub fn publish_period(&self) -> f64 {
        1.0 / self.publish_rate
    }

    pub fn validate(&self) -> Result<()> {
        if self.world_frame_id.is_empty() || self.ego_frame_id.is_empty() {
            return Err(TrackerError::InvalidConfig("frame ids must not be empty".into()));
        }
        if !(self.publish_rate.is_finite() && self.publish_rate > 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "publish_rate must be positive, got {}",
                self.publish_rate
            )));
        }
        if self.input_channels.is_empty() {
            return Err(TrackerError::NoInputStreams);
        }
        for channel in &self.input_channels {
            if channel.queue_size == 0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{}: queue_size must be at least 1",
                    channel.long_name
                )));
            }
            if !(channel.expected_rate.is_finite() && channel.expected_rate > 0.0) {
                return Err(TrackerError::InvalidConfig(format!(
                    "{}: expected_rate must be positive",
                    channel.long_name
                )));
            }
        }
        let window = &self.input;
        if !(window.target_latency >= 0.0 && window.acceptable_latency > window.target_latency) {
            return Err(TrackerError::InvalidConfig(
                "acceptable_latency must exceed target_latency".into(),
            ));
        }
        self.processor.validate()?;
        self.association.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentSolver;
    use crate::tracker::TrackerType;
    use crate::types::labels::ObjectLabel;

    #[test]
    fn test_empty_document_is_default() {
        let config = TrackerConfig::from_json("{}").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert!((config.publish_period() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_partial_document() {
        let json = r#"{
            "world_frame_id": "odom",
            "enable_delay_compensation": true,
            "input_channels": [
                { "topic": "/lidar", "long_name": "lidar", "short_name": "Lc" },
                { "topic": "/radar", "long_name": "radar", "short_name": "r", "queue_size": 4 }
            ],
            "tracker_map": { "car": "normal_vehicle_tracker", "unknown": "pass_through_tracker" },
            "processor": { "confident_count_threshold": 5 },
            "association": { "solver": "greedy" }
        }"#;
        let config = TrackerConfig::from_json(json).unwrap();

        assert_eq!(config.world_frame_id, "odom");
        assert!(config.enable_delay_compensation);
        assert_eq!(config.input_channels.len(), 2);
        assert_eq!(config.input_channels[0].queue_size, 2);
        assert_eq!(config.input_channels[1].queue_size, 4);
        assert_eq!(config.tracker_map.tracker_type(ObjectLabel::Car), TrackerType::NormalVehicle);
        assert_eq!(config.tracker_map.tracker_type(ObjectLabel::Unknown), TrackerType::PassThrough);
        assert_eq!(config.tracker_map.tracker_type(ObjectLabel::Truck), TrackerType::Unknown);
        assert_eq!(config.processor.confident_count_threshold, 5);
        assert!((config.processor.max_elapsed_time - 1.0).abs() < 1e-12);
        assert_eq!(config.association.solver, AssignmentSolver::Greedy);
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = TrackerConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(TrackerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            TrackerConfig::from_json(r#"{ "publish_rate": 0.0 }"#),
            Err(TrackerError::InvalidConfig(_))
        ));
        assert!(matches!(
            TrackerConfig::from_json(r#"{ "input_channels": [] }"#),
            Err(TrackerError::NoInputStreams)
        ));
        assert!(matches!(
            TrackerConfig::from_json(r#"{ "association": { "max_rad_matrix": [[1.0]] } }"#),
            Err(TrackerError::InvalidConfig(_))
        ));
        assert!(matches!(
            TrackerConfig::from_json("{ not json"),
            Err(TrackerError::Json(_))
        ));
    }
}
