//! Model Module - Scaling, autoencoder and inference
//!
//! - `scaler.rs` - Frozen standardization
//! - `network.rs` - Dense autoencoder
//! - `trainer.rs` - Adam training loop
//! - `artifact.rs` - Persisted model bundle
//! - `inference.rs` - Detector + status

pub mod scaler;
pub mod network;
pub mod trainer;
pub mod artifact;
pub mod inference;

pub use scaler::Scaler;
pub use network::{Autoencoder, HIDDEN_DIMS};
pub use trainer::{train, TrainedModel, TrainingConfig, TrainingReport};
pub use artifact::{load_artifact, save_artifact, ModelArtifact};
pub use inference::{AnomalyDetector, EngineStatus};
