use crate::error::InferenceResult;
use crate::preprocess::ImageTensor;
use crate::shape::{ModelDescriptor, OutputShape, TensorShape};
use ndarray::ArrayD;

/// A loaded classification model.
///
/// Implementations must be safe to call concurrently: `predict` takes `&self`
/// and is invoked from several request threads at once.
pub trait ClassifierModel: Send + Sync {
    /// Shape of the primary input, if readable.
    fn input_shape(&self) -> Option<TensorShape>;

    /// Shapes of all declared inputs, consulted when `input_shape` is absent.
    fn input_specs(&self) -> Vec<TensorShape> {
        Vec::new()
    }

    /// Output shape used to read the class count.
    fn output_shape(&self) -> Option<OutputShape>;

    /// Pin the model to the resolved input geometry before serving.
    fn prepare(&mut self, _descriptor: &ModelDescriptor) -> InferenceResult<()> {
        Ok(())
    }

    /// Run a forward pass. The output is either a class vector or a batch of one.
    fn predict(&self, input: &ImageTensor) -> InferenceResult<ArrayD<f32>>;
}
