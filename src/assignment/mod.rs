//! Track-to-detection association
//!
//! Gated similarity scores between every track and detection, then a global
//! assignment maximizing the total score.

mod data_association;
pub mod greedy;
pub mod hungarian;

pub use data_association::*;
pub use greedy::greedy;
pub use hungarian::{hungarian, Assignment};
