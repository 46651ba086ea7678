use crate::config::TesselConfig;
use crate::error::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static BROWSER_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+\d+$").expect("valid browser target pattern"));

impl TesselConfig {
    /// Check the values the server and builds depend on.
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "root".to_string(),
                value: self.root.display().to_string(),
                hint: "The site root must be an existing directory".to_string(),
            }
            .into());
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: "0".to_string(),
                hint: "Use a port between 1 and 65535".to_string(),
            }
            .into());
        }

        validate_browser_target(&self.default_browser)
    }
}

/// Browser targets are a lowercase name followed by a major version,
/// e.g. `chrome80` or `safari13`.
pub fn validate_browser_target(target: &str) -> Result<()> {
    if BROWSER_TARGET.is_match(target) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "default_browser".to_string(),
            value: target.to_string(),
            hint: "Use a browser name followed by its major version, e.g. chrome80".to_string(),
        }
        .into())
    }
}
