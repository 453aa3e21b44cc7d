//! Error types for the classification pipeline

use thiserror::Error;

/// Result type for pipeline operations
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors that can occur while loading a model or serving a prediction
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model input shape could not be turned into a usable descriptor
    #[error("Could not infer model input shape: {0}")]
    ShapeInference(String),

    /// The model file could not be read or parsed
    #[error("Failed to load model from {path}: {message}")]
    ModelLoad { path: String, message: String },

    /// The uploaded bytes are not a decodable image
    #[error("Failed to decode image: {source}")]
    ImageDecode {
        #[source]
        source: image::ImageError,
    },

    /// The decoded image could not be turned into a tensor
    #[error("Failed to preprocess image: {0}")]
    Preprocess(String),

    /// No model is loaded on this server
    #[error("Model is not available on this server")]
    ModelUnavailable,

    /// The model failed while running a forward pass
    #[error("Model inference failed: {0}")]
    Inference(String),

    /// A configuration value could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    Config { key: String, value: String },
}

impl InferenceError {
    /// Errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InferenceError::ImageDecode { .. } | InferenceError::Preprocess(_)
        )
    }

    /// Errors that leave the service without a usable model.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            InferenceError::ShapeInference(_) | InferenceError::ModelLoad { .. }
        )
    }
}

impl From<image::ImageError> for InferenceError {
    fn from(source: image::ImageError) -> Self {
        InferenceError::ImageDecode { source }
    }
}
