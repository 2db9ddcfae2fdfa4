//! Features Module - Flow → feature vector
//!
//! - `layout.rs` - Versioned column layout and schema descriptor
//! - `vector.rs` - FeatureVector, builder and extractor trait
//! - `extractor.rs` - FlowRecord extraction
//! - `table.rs` - Feature rows as CSV

pub mod layout;
pub mod vector;
pub mod extractor;
pub mod table;


pub use layout::{LayoutInfo, LayoutMismatchError, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::{FeatureExtractor, FeatureVector, FeatureVectorBuilder};
pub use extractor::{extract_all, extract_features};
pub use table::{read_features_csv, write_features_csv};
