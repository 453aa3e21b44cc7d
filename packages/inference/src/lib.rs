pub mod config;
pub mod error;
pub mod labels;
pub mod model;
pub mod normalize;
pub mod preprocess;
pub mod ranking;
pub mod service;
pub mod shape;

#[cfg(feature = "execute")]
pub mod tract;

pub use config::InferenceConfig;
pub use error::{InferenceError, InferenceResult};
pub use labels::LabelSet;
pub use model::ClassifierModel;
pub use preprocess::{ImagePreprocessor, ImageTensor};
pub use ranking::{PredictionItem, PredictionResponse};
pub use service::ClassifierService;
pub use shape::{ModelDescriptor, OutputShape, TensorShape};

pub use image;
pub use ndarray;
