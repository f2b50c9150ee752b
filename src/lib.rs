//! Multi-object tracker
//!
//! Fuses asynchronous per-sensor detection streams into identity-stable
//! object tracks with velocity estimates.
//!
//! # Overview
//!
//! - **Inputs**: each source pushes [`DetectedObjects`](types::object::DetectedObjects)
//!   batches into an [`InputStream`](processor::InputStream); the
//!   [`InputManager`](processor::InputManager) releases them in stamp order
//!   inside a latency window.
//! - **Association**: [`DataAssociation`](assignment::DataAssociation) scores
//!   every track against every detection with per-class gates and solves the
//!   assignment globally.
//! - **Tracks**: each [`Tracker`](tracker::Tracker) runs one motion model
//!   (CTRV for vehicles, bicycles and pedestrians, CV otherwise) chosen by class
//!   at spawn.
//! - **Node**: [`MultiObjectTracker`](node::MultiObjectTracker) runs the cycle
//!   and publishes confirmed tracks.
//!
//! Vector spaces are encoded in the type system, so a measurement cannot be
//! used where a state vector belongs.

pub mod assignment;
pub mod config;
pub mod filters;
pub mod models;
pub mod node;
pub mod processor;
pub mod tracker;
pub mod types;
pub mod utils;

pub mod prelude {
    pub use crate::assignment::{
        AssignmentResult, AssignmentSolver, AssociationConfig, DataAssociation,
    };
    pub use crate::config::TrackerConfig;
    pub use crate::models::{CtrvMotionModel, CvMotionModel, MotionModel};
    pub use crate::node::{MultiObjectTracker, RecordingPublisher, TrackPublisher};
    pub use crate::processor::{
        InputChannelConfig, InputManager, InputStream, ProcessorConfig, TrackerProcessor,
    };
    pub use crate::tracker::{TrackModel, Tracker, TrackerMap, TrackerModel, TrackerType};
    pub use crate::types::labels::*;
    pub use crate::types::object::*;
    pub use crate::types::time::Time;
    pub use crate::utils::{SelfTransform, StaticTransform};
    pub use crate::{Result, TrackerError};
}

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no input streams configured")]
    NoInputStreams,
    /// Matrix is singular and cannot be inverted
    #[error("matrix is singular")]
    SingularMatrix,
    #[error("assignment failed")]
    AssignmentFailed,
    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = ::core::result::Result<T, TrackerError>;
