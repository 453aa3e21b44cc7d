use retina_api::state::DEFAULT_MAX_UPLOAD_BYTES;
use retina_inference::{InferenceConfig, InferenceError};
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Ceiling for a whole `/predict` request body
    pub max_upload_bytes: usize,
    pub inference: InferenceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let inference = InferenceConfig::from_lookup(&lookup).map_err(ConfigError::Inference)?;
        Ok(Config {
            port: lookup("API_PORT")
                .or_else(|| lookup("PORT"))
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("API_PORT".to_string()))?,
            max_upload_bytes: match lookup("MAX_UPLOAD_BYTES") {
                Some(v) => v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("MAX_UPLOAD_BYTES".to_string()))?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
            inference,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
    Inference(InferenceError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(var) => write!(f, "Invalid value for: {}", var),
            ConfigError::Inference(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
