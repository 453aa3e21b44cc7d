//! Model shape introspection
//!
//! Turns the shapes reported by a [`ClassifierModel`] into a [`ModelDescriptor`].
//! Shapes are read in a fixed order: the primary input shape first, then the
//! first declared input from `input_specs`. Dynamic dimensions are `None` and are
//! filled from [`InferenceConfig`] defaults.

use crate::config::InferenceConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::model::ClassifierModel;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tensor shape as reported by a model; `None` marks a dynamic dimension
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TensorShape(pub Vec<Option<usize>>);

impl TensorShape {
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self(dims)
    }

    /// Shape with every dimension known.
    pub fn fixed(dims: &[usize]) -> Self {
        Self(dims.iter().map(|&d| Some(d)).collect())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.0
    }

    /// Last dimension, if the shape is non-empty and that dimension is known.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied().flatten()
    }
}

impl From<Vec<Option<usize>>> for TensorShape {
    fn from(dims: Vec<Option<usize>>) -> Self {
        Self(dims)
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match dim {
                Some(d) => write!(f, "{d}")?,
                None => write!(f, "None")?,
            }
        }
        write!(f, ")")
    }
}

/// Output shape of a model: one output, or several outputs of which the first is used
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputShape {
    Single(TensorShape),
    Multi(Vec<TensorShape>),
}

impl OutputShape {
    /// Number of classes encoded in the last dimension of the (first) output.
    ///
    /// Dynamic and zero-sized dimensions count as unreadable.
    pub fn class_count(&self) -> Option<usize> {
        let shape = match self {
            OutputShape::Single(shape) => shape,
            OutputShape::Multi(shapes) => shapes.first()?,
        };
        shape.last().filter(|&n| n > 0)
    }
}

/// Resolved input geometry and class count of the loaded model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDescriptor {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    pub class_count: usize,
}

impl ModelDescriptor {
    pub fn new(height: u32, width: u32, channels: u32, class_count: usize) -> InferenceResult<Self> {
        if height == 0 || width == 0 {
            return Err(InferenceError::ShapeInference(format!(
                "input size must be positive, got {height}x{width}"
            )));
        }
        if channels != 1 && channels != 3 {
            return Err(InferenceError::ShapeInference(format!(
                "unsupported channel count {channels}, expected 1 or 3"
            )));
        }
        if class_count == 0 {
            return Err(InferenceError::ShapeInference(
                "class count must be positive".to_string(),
            ));
        }
        Ok(Self {
            height,
            width,
            channels,
            class_count,
        })
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} ({} classes)",
            self.height, self.width, self.channels, self.class_count
        )
    }
}

/// Read (height, width, channels) from a rank-3 or rank-4 input shape.
pub fn input_dims(shape: &TensorShape, config: &InferenceConfig) -> InferenceResult<(u32, u32, u32)> {
    let (h, w, c) = match shape.dims() {
        [_, h, w, c] => (*h, *w, *c),
        [h, w, c] => (*h, *w, *c),
        _ => {
            return Err(InferenceError::ShapeInference(format!(
                "unexpected input shape {shape}, expected rank 3 or 4"
            )));
        }
    };

    // Zero-sized spatial dims are treated like dynamic ones.
    let height = h.filter(|&d| d > 0).map_or(Ok(config.default_height), to_u32)?;
    let width = w.filter(|&d| d > 0).map_or(Ok(config.default_width), to_u32)?;
    let channels = c.map_or(Ok(config.default_channels), to_u32)?;
    Ok((height, width, channels))
}

fn to_u32(dim: usize) -> InferenceResult<u32> {
    u32::try_from(dim)
        .map_err(|_| InferenceError::ShapeInference(format!("dimension {dim} is too large")))
}

/// Class count from the model's output shape, or the configured fallback.
pub fn class_count(output: Option<&OutputShape>, config: &InferenceConfig) -> usize {
    match output.and_then(OutputShape::class_count) {
        Some(n) => n,
        None => {
            tracing::warn!(
                fallback = config.fallback_class_count,
                "Could not read class count from model output shape, using fallback"
            );
            config.fallback_class_count
        }
    }
}

/// Derive the full descriptor of a model.
pub fn resolve_descriptor(
    model: &dyn ClassifierModel,
    config: &InferenceConfig,
) -> InferenceResult<ModelDescriptor> {
    let shape = model
        .input_shape()
        .or_else(|| model.input_specs().into_iter().next())
        .ok_or_else(|| {
            InferenceError::ShapeInference("model does not report an input shape".to_string())
        })?;

    let (height, width, channels) = input_dims(&shape, config)?;
    let classes = class_count(model.output_shape().as_ref(), config);
    ModelDescriptor::new(height, width, channels, classes)
}
