//! Hook engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hook engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum time a hook may take to signal completion, in milliseconds.
    ///
    /// Unset means hooks are awaited indefinitely.
    #[serde(default)]
    pub hook_timeout_ms: Option<u64>,
    /// Whether new schemas run the `validate` chain before every `save`.
    #[serde(default = "default_true")]
    pub derive_validate_on_save: bool,
}

impl EngineConfig {
    /// Returns the hook timeout as a [`Duration`], if configured.
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hook_timeout_ms: None,
            derive_validate_on_save: true,
        }
    }
}

fn default_true() -> bool {
    true
}
