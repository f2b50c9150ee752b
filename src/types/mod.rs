//! Core types: timestamps, labels, detections and typed vector spaces

pub mod labels;
pub mod object;
pub mod spaces;
pub mod time;
pub mod transforms;
