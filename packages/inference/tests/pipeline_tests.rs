//! End-to-end tests for the classification pipeline
//!
//! These tests drive `ClassifierService` with in-memory stub models, so no model
//! file is needed. The test at the bottom runs a real model and is ignored by
//! default.
//!
//! Run: cargo test --package retina-inference --test pipeline_tests
//! Real model: MODEL_PATH=model.onnx cargo test --package retina-inference --test pipeline_tests -- --ignored

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::{ArrayD, IxDyn};
use retina_inference::{
    ClassifierModel, ClassifierService, ImageTensor, InferenceConfig, InferenceError,
    InferenceResult, OutputShape, PredictionResponse, TensorShape,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// Stub model returning fixed scores and recording the shape of each input
struct StubModel {
    input: Option<TensorShape>,
    specs: Vec<TensorShape>,
    output: Option<OutputShape>,
    scores: Vec<f32>,
    batched: bool,
    seen: Arc<Mutex<Vec<[usize; 4]>>>,
}

impl StubModel {
    fn new(input: TensorShape, classes: usize, scores: &[f32]) -> Self {
        Self {
            input: Some(input),
            specs: Vec::new(),
            output: Some(OutputShape::Single(TensorShape::new(vec![None, Some(classes)]))),
            scores: scores.to_vec(),
            batched: true,
            seen: Arc::default(),
        }
    }
}

impl ClassifierModel for StubModel {
    fn input_shape(&self) -> Option<TensorShape> {
        self.input.clone()
    }

    fn input_specs(&self) -> Vec<TensorShape> {
        self.specs.clone()
    }

    fn output_shape(&self) -> Option<OutputShape> {
        self.output.clone()
    }

    fn predict(&self, input: &ImageTensor) -> InferenceResult<ArrayD<f32>> {
        self.seen.lock().unwrap().push(input.shape());
        let shape = if self.batched {
            vec![1, self.scores.len()]
        } else {
            vec![self.scores.len()]
        };
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), self.scores.clone()).unwrap())
    }
}

fn png(image: DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn fundus_like_image() -> Vec<u8> {
    let mut img = RgbImage::new(300, 200);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let r = (x * 255 / 300) as u8;
        let g = (y * 255 / 200) as u8;
        *px = Rgb([r, g, 64]);
    }
    png(DynamicImage::ImageRgb8(img))
}

fn labels(names: &[&str]) -> Option<Vec<String>> {
    Some(names.iter().map(|s| s.to_string()).collect())
}

fn top_labels(response: &PredictionResponse) -> Vec<&str> {
    response.top.iter().map(|p| p.label.as_str()).collect()
}

// ============================================================================
// Descriptor Resolution
// ============================================================================

mod descriptor {
    use super::*;

    #[test]
    fn dynamic_batch_rgb_model() {
        let model = StubModel::new(
            TensorShape::new(vec![None, Some(224), Some(224), Some(3)]),
            3,
            &[0.2, 0.3, 0.5],
        );
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        let d = service.descriptor();
        assert_eq!((d.height, d.width, d.channels, d.class_count), (224, 224, 3, 3));
    }

    #[test]
    fn input_specs_are_consulted_when_primary_shape_is_unreadable() {
        let mut model = StubModel::new(TensorShape::default(), 4, &[0.25; 4]);
        model.input = None;
        model.specs = vec![TensorShape::new(vec![None, Some(96), Some(64), Some(1)])];

        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();
        let d = service.descriptor();
        assert_eq!((d.height, d.width, d.channels), (96, 64, 1));
    }

    #[test]
    fn unreadable_input_shape_is_fatal() {
        let mut model = StubModel::new(TensorShape::default(), 2, &[0.5, 0.5]);
        model.input = None;

        let err = ClassifierService::new(Box::new(model), &InferenceConfig::default(), None)
            .err()
            .unwrap();
        assert!(err.is_fatal_at_startup());
    }

    #[test]
    fn rank_two_input_is_rejected() {
        let model = StubModel::new(TensorShape::fixed(&[1, 784]), 10, &[0.1; 10]);
        let err = ClassifierService::new(Box::new(model), &InferenceConfig::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, InferenceError::ShapeInference(_)));
    }

    #[test]
    fn configured_defaults_fill_dynamic_dims() {
        let config = InferenceConfig {
            default_height: 128,
            default_width: 160,
            ..InferenceConfig::default()
        };
        let model = StubModel::new(TensorShape::new(vec![None, None, None, Some(3)]), 2, &[1.0, 0.0]);
        let service = ClassifierService::new(Box::new(model), &config, None).unwrap();
        let d = service.descriptor();
        assert_eq!((d.height, d.width), (128, 160));
    }
}

// ============================================================================
// Prediction Flow
// ============================================================================

mod prediction {
    use super::*;

    #[test]
    fn logits_are_ranked_after_softmax() {
        let model = StubModel::new(
            TensorShape::new(vec![None, Some(224), Some(224), Some(3)]),
            3,
            &[2.0, 0.5, 0.5],
        );
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        let response = service.predict(&fundus_like_image(), 5).unwrap();
        assert_eq!(response.top.len(), 3);
        assert_eq!(top_labels(&response), vec!["class_0", "class_1", "class_2"]);
        assert!(response.top[0].probability > 0.6);

        let sum: f64 = response.all.iter().map(|p| p.probability).sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn model_sees_resolved_geometry() {
        let model = StubModel::new(TensorShape::fixed(&[1, 32, 48, 1]), 2, &[0.4, 0.6]);
        let seen = model.seen.clone();
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        service.predict(&fundus_like_image(), 1).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[[1, 32, 48, 1]]);
    }

    #[test]
    fn grayscale_upload_to_rgb_model() {
        let model = StubModel::new(TensorShape::fixed(&[1, 16, 16, 3]), 2, &[0.9, 0.1]);
        let seen = model.seen.clone();
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        let gray = png(DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([77]))));
        service.predict(&gray, 1).unwrap();
        assert_eq!(seen.lock().unwrap()[0], [1, 16, 16, 3]);
    }

    #[test]
    fn unbatched_output_is_accepted() {
        let mut model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 3, &[0.1, 0.1, 0.8]);
        model.batched = false;
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        let response = service.predict(&fundus_like_image(), 1).unwrap();
        assert_eq!(top_labels(&response), vec!["class_2"]);
        assert!((response.top[0].probability - 0.8).abs() < 1e-6);
    }

    #[test]
    fn topk_is_clamped_and_all_keeps_order() {
        let model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 4, &[0.1, 0.4, 0.3, 0.2]);
        let service = ClassifierService::new(
            Box::new(model),
            &InferenceConfig::default(),
            labels(&["normal", "dr", "glaucoma", "cataract"]),
        )
        .unwrap();

        let response = service.predict(&fundus_like_image(), 100).unwrap();
        assert_eq!(top_labels(&response), vec!["dr", "glaucoma", "cataract", "normal"]);
        let all: Vec<&str> = response.all.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(all, vec!["normal", "dr", "glaucoma", "cataract"]);
    }

    #[test]
    fn undecodable_upload_is_a_client_error() {
        let model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 2, &[0.5, 0.5]);
        let seen = model.seen.clone();
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        let err = service.predict(b"GIF89a-truncated", 5).unwrap_err();
        assert!(err.is_client_error());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn service_is_shareable_across_threads() {
        let model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 2, &[0.3, 0.7]);
        let service = Arc::new(
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap(),
        );
        let bytes = Arc::new(fundus_like_image());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                let bytes = bytes.clone();
                std::thread::spawn(move || service.predict(&bytes, 1).unwrap())
            })
            .collect();

        for handle in handles {
            let response = handle.join().unwrap();
            assert_eq!(top_labels(&response), vec!["class_1"]);
        }
    }
}

// ============================================================================
// Label Reconciliation
// ============================================================================

mod label_reconciliation {
    use super::*;

    #[test]
    fn short_label_file_is_padded() {
        let model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 5, &[0.2; 5]);
        let service = ClassifierService::new(
            Box::new(model),
            &InferenceConfig::default(),
            labels(&["normal", "dr", "glaucoma"]),
        )
        .unwrap();

        assert_eq!(
            service.labels().as_slice(),
            &["normal", "dr", "glaucoma", "class_3", "class_4"]
        );
    }

    #[test]
    fn long_label_file_is_truncated() {
        let model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 2, &[0.5, 0.5]);
        let service = ClassifierService::new(
            Box::new(model),
            &InferenceConfig::default(),
            labels(&["a", "b", "c", "d"]),
        )
        .unwrap();
        assert_eq!(service.labels().as_slice(), &["a", "b"]);
    }

    #[test]
    fn fallback_class_count_without_output_shape() {
        let mut model = StubModel::new(TensorShape::fixed(&[1, 8, 8, 3]), 0, &[0.5, 0.5]);
        model.output = None;
        let service =
            ClassifierService::new(Box::new(model), &InferenceConfig::default(), None).unwrap();

        assert_eq!(service.descriptor().class_count, 45);
        assert_eq!(service.labels().len(), 45);

        // the actual output length wins at prediction time
        let response = service.predict(&fundus_like_image(), 10).unwrap();
        assert_eq!(response.all.len(), 2);
    }
}

// ============================================================================
// Real Model (requires MODEL_PATH)
// ============================================================================

#[cfg(feature = "execute")]
#[test]
#[ignore]
fn real_model_produces_distribution() {
    let config = InferenceConfig::from_env().unwrap();
    let service = ClassifierService::load(&config).unwrap();
    println!("Loaded model: {}", service.descriptor());

    let response = service.predict(&fundus_like_image(), 5).unwrap();
    assert!(response.top.len() <= 5);
    let sum: f64 = response.all.iter().map(|p| p.probability).sum();
    assert!((sum - 1.0).abs() < 1e-3);
}
