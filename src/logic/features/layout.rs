//! Feature Layout - Centralized Flow Feature Definition
//!
//! **This file controls the feature schema shared by the scaler and the model.**
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! The version and the CRC32 of the ordered names are stored in every scaler
//! state and model artifact, and checked again at load time.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    "duration",       // 0: end - start, seconds
    "packet_count",   // 1: packets in the flow
    "total_bytes",    // 2: sum of packet lengths
    "avg_pkt_size",   // 3: total_bytes / packet_count
    "bytes_per_sec",  // 4: total_bytes / duration, or total_bytes when duration == 0
    "pkts_per_sec",   // 5: packet_count / duration, or packet_count when duration == 0
    "proto_num",      // 6: TCP=1, UDP=2, other=0
];

/// Total number of features. Must match FEATURE_LAYOUT.len()
pub const FEATURE_COUNT: usize = 7;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
pub fn compute_layout_hash() -> u32 {
    hash_names(FEATURE_VERSION, FEATURE_LAYOUT.iter().copied())
}

/// Hash an arbitrary (version, names) pair the same way the current layout is hashed
pub fn hash_names<'a>(version: u8, names: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);

    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Schema descriptor persisted next to scaler state and model weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Check a stored descriptor against the running layout.
    ///
    /// The hash is recomputed from the stored names so a hand-edited file
    /// cannot pass by keeping the old hash.
    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        let recomputed = hash_names(self.version, self.feature_names.iter().map(String::as_str));
        let count_ok = self.feature_count == FEATURE_COUNT && self.feature_names.len() == FEATURE_COUNT;

        if !count_ok || recomputed != self.hash {
            return Err(LayoutMismatchError {
                expected_version: FEATURE_VERSION,
                expected_hash: layout_hash(),
                actual_version: self.version,
                actual_hash: recomputed,
            });
        }

        validate_layout(self.version, self.hash)
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when feature layout doesn't match expected
#[derive(Debug, Clone)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

impl std::fmt::Display for LayoutMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Feature layout mismatch: expected v{} (hash: {:08x}), got v{} (hash: {:08x})",
            self.expected_version,
            self.expected_hash,
            self.actual_version,
            self.actual_hash
        )
    }
}

impl std::error::Error for LayoutMismatchError {}

/// Validate that incoming data matches current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

/// Check that a tabular header names exactly the current layout, in order
pub fn header_matches(columns: &[&str]) -> bool {
    columns.len() == FEATURE_COUNT
        && columns.iter().zip(FEATURE_LAYOUT.iter()).all(|(c, n)| c.trim() == *n)
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Get feature name by index
pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(compute_layout_hash(), compute_layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_reordered_layout_hashes_differ() {
        let mut names: Vec<&str> = FEATURE_LAYOUT.to_vec();
        names.swap(0, 1);
        assert_ne!(hash_names(FEATURE_VERSION, names), layout_hash());
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(FEATURE_VERSION, layout_hash()).is_ok());
        assert!(validate_layout(FEATURE_VERSION + 1, layout_hash()).is_err());
        assert!(validate_layout(FEATURE_VERSION, layout_hash().wrapping_add(1)).is_err());
    }

    #[test]
    fn test_layout_info_validation() {
        assert!(LayoutInfo::current().validate().is_ok());

        let mut swapped = LayoutInfo::current();
        swapped.feature_names.swap(4, 5);
        assert!(swapped.validate().is_err());

        let mut truncated = LayoutInfo::current();
        truncated.feature_names.pop();
        truncated.feature_count -= 1;
        assert!(truncated.validate().is_err());
    }

    #[test]
    fn test_header_matches() {
        assert!(header_matches(FEATURE_LAYOUT));
        assert!(!header_matches(&["duration", "packet_count"]));

        let mut reordered = FEATURE_LAYOUT.to_vec();
        reordered.swap(2, 3);
        assert!(!header_matches(&reordered));
    }

    #[test]
    fn test_feature_lookup() {
        assert_eq!(feature_index("duration"), Some(0));
        assert_eq!(feature_index("proto_num"), Some(6));
        assert_eq!(feature_index("nonexistent"), None);
        assert_eq!(feature_name(4), Some("bytes_per_sec"));
        assert_eq!(feature_name(100), None);
    }
}
