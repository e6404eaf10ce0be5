//! Build and verification configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::MIN_COHERENCE;

/// Bundle type recorded in every bundle.
pub const BUNDLE_TYPE: &str = "Lantana OS Triple Signature Bundle";

/// Bundle format version.
pub const BUNDLE_VERSION: &str = "1.0";

/// System name recorded in `aggregated_data.system_info`.
pub const SYSTEM_NAME: &str = "Lantana OS";

/// Settings shared by the bundle builder and verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Minimum overall coherence for `synchronization_verified`
    pub min_coherence: f64,
    pub bundle_type: String,
    pub version: String,
    pub system_name: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            min_coherence: MIN_COHERENCE,
            bundle_type: BUNDLE_TYPE.to_string(),
            version: BUNDLE_VERSION.to_string(),
            system_name: SYSTEM_NAME.to_string(),
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the minimum coherence. Must lie in [0, 1].
    pub fn with_min_coherence(mut self, min_coherence: f64) -> Result<Self> {
        self.min_coherence = min_coherence;
        self.validate()?;
        Ok(self)
    }

    /// Check every field is usable.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_coherence) {
            return Err(Error::InvalidConfig(format!(
                "min_coherence must be within [0, 1], got {}",
                self.min_coherence
            )));
        }
        if self.bundle_type.trim().is_empty() {
            return Err(Error::InvalidConfig("bundle_type must not be empty".to_string()));
        }
        Ok(())
    }
}
