use crate::error::{InferenceError, InferenceResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for model loading and the preprocessing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Path to the *.onnx or *.tflite classifier
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Path to the optional labels file (one label per line)
    #[serde(default = "default_labels_path")]
    pub labels_path: PathBuf,
    /// Height used when the model leaves its input height dynamic
    #[serde(default = "default_input_size")]
    pub default_height: u32,
    /// Width used when the model leaves its input width dynamic
    #[serde(default = "default_input_size")]
    pub default_width: u32,
    /// Channel count used when the model leaves its channel dimension dynamic
    #[serde(default = "default_channels")]
    pub default_channels: u32,
    /// Class count used when the output shape cannot be read
    #[serde(default = "default_fallback_class_count")]
    pub fallback_class_count: usize,
    /// Resampling filters in order of preference
    #[serde(default = "default_resample_filters")]
    pub resample_filters: Vec<String>,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("modelo_cnn_otimizado.onnx")
}
fn default_labels_path() -> PathBuf {
    PathBuf::from("labels.txt")
}
fn default_input_size() -> u32 {
    224
}
fn default_channels() -> u32 {
    3
}
fn default_fallback_class_count() -> usize {
    45
}
fn default_resample_filters() -> Vec<String> {
    vec!["lanczos3".to_string(), "catmullrom".to_string()]
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            labels_path: default_labels_path(),
            default_height: default_input_size(),
            default_width: default_input_size(),
            default_channels: default_channels(),
            fallback_class_count: default_fallback_class_count(),
            resample_filters: default_resample_filters(),
        }
    }
}

impl InferenceConfig {
    pub fn from_env() -> InferenceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to their defaults; set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> InferenceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let resample_filters = match lookup("INFERENCE_RESAMPLE_FILTER") {
            Some(raw) => {
                let filters: Vec<String> = raw
                    .split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
                if filters.is_empty() {
                    defaults.resample_filters
                } else {
                    filters
                }
            }
            None => defaults.resample_filters,
        };

        Ok(Self {
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            labels_path: lookup("LABELS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.labels_path),
            default_height: parse_var(&lookup, "INFERENCE_DEFAULT_HEIGHT", defaults.default_height)?,
            default_width: parse_var(&lookup, "INFERENCE_DEFAULT_WIDTH", defaults.default_width)?,
            default_channels: parse_var(
                &lookup,
                "INFERENCE_DEFAULT_CHANNELS",
                defaults.default_channels,
            )?,
            fallback_class_count: parse_var(
                &lookup,
                "INFERENCE_FALLBACK_CLASSES",
                defaults.fallback_class_count,
            )?,
            resample_filters,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> InferenceResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| InferenceError::Config {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
