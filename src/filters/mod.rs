//! State estimation filters
//!
//! - [`kalman::KalmanFilter`]: linear Kalman filter with Joseph-form update,
//!   driven by the motion models with their own (possibly linearized)
//!   transition and observation matrices

pub mod kalman;
