//! # Tract Model Backend
//! Loads `*.onnx` models with `tract-onnx` and `*.tflite` models with
//! `tract-tflite`. The input fact is pinned to the resolved descriptor once, so
//! every request reuses the same optimized plan.

use crate::error::{InferenceError, InferenceResult};
use crate::model::ClassifierModel;
use crate::preprocess::ImageTensor;
use crate::shape::{ModelDescriptor, OutputShape, TensorShape};
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;
use tract_onnx::tract_core::internal::DimLike;

/// Model file formats understood by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    TfLite,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "onnx" => Some(ModelFormat::Onnx),
            "tflite" => Some(ModelFormat::TfLite),
            _ => None,
        }
    }
}

/// Classifier running on tract
pub struct TractClassifier {
    path: PathBuf,
    format: ModelFormat,
    model: TypedModel,
    plan: Option<TypedRunnableModel<TypedModel>>,
    /// Rank of the pinned input fact, 3 when the model has no batch axis
    input_rank: usize,
}

impl TractClassifier {
    pub fn load(path: impl AsRef<Path>) -> InferenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(load_error(&path, "file not found"));
        }

        let format = ModelFormat::from_path(&path)
            .ok_or_else(|| load_error(&path, "unsupported model format, expected .onnx or .tflite"))?;

        let model = match format {
            ModelFormat::Onnx => tract_onnx::onnx()
                .model_for_path(&path)
                .and_then(|m| m.into_typed()),
            ModelFormat::TfLite => tract_tflite::tflite().model_for_path(&path),
        }
        .map_err(|e| load_error(&path, e))?;

        tracing::debug!(path = %path.display(), ?format, "Parsed model graph");
        Ok(Self {
            path,
            format,
            model,
            plan: None,
            input_rank: 4,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }

    fn outlet_shape(&self, outlet: OutletId) -> Option<TensorShape> {
        let fact = self.model.outlet_fact(outlet).ok()?;
        Some(TensorShape::new(
            fact.shape.iter().map(|d| d.to_usize().ok()).collect(),
        ))
    }
}

fn load_error(path: &Path, message: impl std::fmt::Display) -> InferenceError {
    InferenceError::ModelLoad {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

impl ClassifierModel for TractClassifier {
    fn input_shape(&self) -> Option<TensorShape> {
        let outlet = *self.model.input_outlets().ok()?.first()?;
        self.outlet_shape(outlet)
    }

    fn input_specs(&self) -> Vec<TensorShape> {
        self.model
            .input_outlets()
            .map(|outlets| {
                outlets
                    .iter()
                    .filter_map(|&o| self.outlet_shape(o))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn output_shape(&self) -> Option<OutputShape> {
        let outlets = self.model.output_outlets().ok()?;
        let mut shapes: Vec<TensorShape> = outlets
            .iter()
            .filter_map(|&o| self.outlet_shape(o))
            .collect();
        match shapes.len() {
            0 => None,
            1 => shapes.pop().map(OutputShape::Single),
            _ => Some(OutputShape::Multi(shapes)),
        }
    }

    fn prepare(&mut self, descriptor: &ModelDescriptor) -> InferenceResult<()> {
        let inlet = self
            .model
            .input_outlets()
            .ok()
            .and_then(|outlets| outlets.first().copied())
            .ok_or_else(|| load_error(&self.path, "model has no inputs"))?;
        let fact = self
            .model
            .outlet_fact(inlet)
            .map_err(|e| load_error(&self.path, e))?;
        let (datum_type, rank) = (fact.datum_type, fact.rank());
        if datum_type != DatumType::F32 {
            return Err(load_error(
                &self.path,
                format!("unsupported input dtype {datum_type:?}, only F32 is supported"),
            ));
        }

        let (h, w, c) = (
            descriptor.height as usize,
            descriptor.width as usize,
            descriptor.channels as usize,
        );
        let input_shape = match rank {
            4 => tvec!(1, h, w, c),
            3 => tvec!(h, w, c),
            _ => {
                return Err(load_error(
                    &self.path,
                    format!("unsupported input rank {rank}, expected 3 or 4"),
                ));
            }
        };
        let plan = self
            .model
            .clone()
            .with_input_fact(0, TypedFact::dt_shape(f32::datum_type(), input_shape))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| load_error(&self.path, e))?;

        self.plan = Some(plan);
        self.input_rank = rank;
        Ok(())
    }

    fn predict(&self, input: &ImageTensor) -> InferenceResult<ArrayD<f32>> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| InferenceError::Inference("model has not been prepared".to_string()))?;
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Inference("input tensor is not contiguous".to_string()))?;

        // rank-3 models take the image without its batch axis
        let shape = input.shape();
        let shape = if self.input_rank == 3 { &shape[1..] } else { &shape[..] };
        let tensor = Tensor::from_shape(shape, data)
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let outputs = plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Inference(format!("Failed to run model: {e}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Inference("Model produced no outputs".to_string()))?;
        let output = output
            .cast_to::<f32>()
            .map_err(|e| InferenceError::Inference(format!("Output is not numeric: {e}")))?;
        let values = output
            .as_slice::<f32>()
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        ArrayD::from_shape_vec(IxDyn(output.shape()), values.to_vec())
            .map_err(|e| InferenceError::Inference(e.to_string()))
    }
}
