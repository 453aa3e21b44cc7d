//! Immutable classification context shared by every request.

use crate::config::InferenceConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::labels::LabelSet;
use crate::model::ClassifierModel;
use crate::normalize::normalize;
use crate::preprocess::{ImagePreprocessor, select_filter};
use crate::ranking::{PredictionResponse, assemble};
use crate::shape::{ModelDescriptor, resolve_descriptor};
use ndarray::{ArrayD, Axis};
use std::borrow::Cow;
use std::time::Instant;

/// Loaded model together with everything derived from it at startup
pub struct ClassifierService {
    model: Box<dyn ClassifierModel>,
    descriptor: ModelDescriptor,
    preprocessor: ImagePreprocessor,
    label_source: Option<Vec<String>>,
    labels: LabelSet,
}

impl ClassifierService {
    /// Resolve the descriptor, prepare the model and reconcile the labels.
    pub fn new(
        mut model: Box<dyn ClassifierModel>,
        config: &InferenceConfig,
        label_source: Option<Vec<String>>,
    ) -> InferenceResult<Self> {
        let descriptor = resolve_descriptor(model.as_ref(), config)?;
        model.prepare(&descriptor)?;

        let filter = select_filter(&config.resample_filters);
        let labels = LabelSet::resolve(label_source.as_deref(), descriptor.class_count);

        Ok(Self {
            model,
            descriptor,
            preprocessor: ImagePreprocessor::for_descriptor(&descriptor, filter),
            label_source,
            labels,
        })
    }

    /// Load the configured model file and labels file.
    #[cfg(feature = "execute")]
    pub fn load(config: &InferenceConfig) -> InferenceResult<Self> {
        let model = crate::tract::TractClassifier::load(&config.model_path)?;
        let label_source = crate::labels::load_label_source(&config.labels_path);
        let service = Self::new(Box::new(model), config, label_source)?;

        tracing::info!(
            model = %config.model_path.display(),
            input = %format!(
                "{}x{}x{}",
                service.descriptor.height, service.descriptor.width, service.descriptor.channels
            ),
            classes = service.descriptor.class_count,
            "Model loaded"
        );
        Ok(service)
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Classify one image and rank the `topk` most likely classes.
    #[tracing::instrument(name = "predict", skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn predict(&self, bytes: &[u8], topk: usize) -> InferenceResult<PredictionResponse> {
        let started = Instant::now();
        let tensor = self.preprocessor.process(bytes)?;
        let preprocess_ms = started.elapsed().as_millis();

        let output = self.model.predict(&tensor)?;
        let raw = flatten_output(output)?;
        let probs = normalize(&raw);

        let labels = if probs.len() == self.labels.len() {
            Cow::Borrowed(&self.labels)
        } else {
            tracing::debug!(
                outputs = probs.len(),
                classes = self.labels.len(),
                "Output length differs from class count, resolving labels on demand"
            );
            Cow::Owned(LabelSet::resolve(self.label_source.as_deref(), probs.len()))
        };

        let response = assemble(&probs, &labels, topk);
        tracing::debug!(
            preprocess_ms,
            total_ms = started.elapsed().as_millis(),
            "Prediction complete"
        );
        Ok(response)
    }
}

/// Strip a leading batch dimension and flatten the rest into one vector.
/// NaN and infinite scores are rejected.
fn flatten_output(output: ArrayD<f32>) -> InferenceResult<Vec<f64>> {
    let output = if output.ndim() > 1 {
        if output.len_of(Axis(0)) == 0 {
            return Err(InferenceError::Inference("model returned an empty batch".to_string()));
        }
        output.index_axis_move(Axis(0), 0)
    } else {
        output
    };

    let raw: Vec<f64> = output.iter().map(|&v| f64::from(v)).collect();
    if raw.is_empty() {
        return Err(InferenceError::Inference("model returned no scores".to_string()));
    }
    if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::Inference(format!(
            "model returned a non-finite score at index {index}"
        )));
    }
    Ok(raw)
}
