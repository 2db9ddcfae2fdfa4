//! Logic Module - Detection pipeline
//!
//! Leaves first:
//! - `capture/` - Frame decoding into packet observations
//! - `flow/` - 5-tuple aggregation into flow records
//! - `features/` - Versioned feature layout and extraction
//! - `model/` - Scaler, autoencoder, training, artifact, detector
//! - `alert/` - Threshold policy and alert store
//! - `pipeline/` - Scoring passes and background jobs

pub mod error;
pub mod config;

pub mod capture;
pub mod flow;
pub mod features;
pub mod model;
pub mod alert;
pub mod pipeline;
