//! Builder configuration

use serde::{Deserialize, Serialize};

/// Growable builder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Bytes reserved up front
    pub initial_capacity: usize,
    /// Upper bound on the buffer length, `None` for unbounded
    pub max_capacity: Option<usize>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            max_capacity: None,
        }
    }
}
