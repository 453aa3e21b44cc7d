use retina_inference::ClassifierService;
use std::sync::Arc;

pub type AppState = Arc<State>;

/// Default ceiling for a whole `/predict` request body
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub struct State {
    /// `None` when the model failed to load; the server still starts.
    pub classifier: Option<Arc<ClassifierService>>,
    pub max_upload_bytes: usize,
}

impl State {
    pub fn new(classifier: Option<ClassifierService>) -> Self {
        Self {
            classifier: classifier.map(Arc::new),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }
}
