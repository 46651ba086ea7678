use crate::config::TesselConfig;
use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory.
pub const CONFIG_FILE: &str = "tessel.config.json";

const ENV_PREFIX: &str = "TESSEL_";

/// Values set on the command line. `None` leaves lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<HeadlessOverrides>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HeadlessOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
}

impl TesselConfig {
    /// Load configuration from every source.
    ///
    /// Priority: CLI flags > environment variables > config file > defaults
    ///
    /// # Errors
    ///
    /// `NotFound` when `config_path` names a missing file; `Invalid` when
    /// the merged values do not deserialize.
    pub fn load(overrides: &ConfigOverrides, config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(overrides, config_path, Env::prefixed(ENV_PREFIX))
    }

    pub(crate) fn load_with_env(
        overrides: &ConfigOverrides,
        config_path: Option<&Path>,
        env: Env,
    ) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(TesselConfig::default()));

        let config_file = match config_path {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::NotFound(path.to_path_buf()).into());
            }
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                default_path.is_file().then(|| default_path.to_path_buf())
            }
        };

        if let Some(path) = config_file {
            tracing::debug!("Loading configuration from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        figment = figment
            .merge(env.split("__"))
            .merge(Serialized::defaults(overrides));

        figment
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()).into())
    }
}
