//! Codec configuration

use crate::core::DEFAULT_CAPACITY;

/// Batas dan tuning untuk satu encode/decode pass
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Kapasitas awal sink in-memory (bytes), tumbuh dengan doubling
    pub initial_capacity: usize,

    /// Kedalaman nesting maksimum sebelum `DepthLimitExceeded`
    pub max_depth: usize,

    /// Kirim error ke diagnostic sink host
    pub report_errors: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            max_depth: 1000,
            report_errors: true,
        }
    }
}

impl CodecConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
