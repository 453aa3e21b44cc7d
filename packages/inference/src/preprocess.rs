//! # Image Preprocessing
//! Decodes uploaded bytes and turns them into a `[1, height, width, channels]`
//! tensor scaled to `[0.0, 1.0]`.

use crate::error::{InferenceError, InferenceResult};
use crate::shape::ModelDescriptor;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ndarray::{Array2, Array3, Array4, ArrayView4, Axis};

/// Preprocessed image ready for a forward pass
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Shape as `[batch, height, width, channels]`.
    pub fn shape(&self) -> [usize; 4] {
        let (b, h, w, c) = self.data.dim();
        [b, h, w, c]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Contiguous row-major data.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

impl From<Array4<f32>> for ImageTensor {
    fn from(data: Array4<f32>) -> Self {
        Self { data }
    }
}

/// Map a filter name onto an `image` resampling filter.
pub fn filter_from_name(name: &str) -> Option<FilterType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "lanczos3" | "lanczos" => Some(FilterType::Lanczos3),
        "catmullrom" | "bicubic" | "cubic" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "triangle" | "bilinear" | "linear" => Some(FilterType::Triangle),
        "nearest" => Some(FilterType::Nearest),
        _ => None,
    }
}

/// First recognized filter of the preference chain, bicubic when none is.
pub fn select_filter(chain: &[String]) -> FilterType {
    chain
        .iter()
        .find_map(|name| {
            let filter = filter_from_name(name);
            if filter.is_none() {
                tracing::warn!(filter = %name, "Unknown resampling filter, trying next");
            }
            filter
        })
        .unwrap_or(FilterType::CatmullRom)
}

/// Decoded pixels before channel expansion
enum Pixels {
    /// A single 2-D plane (grayscale)
    Plane(Array2<f32>),
    /// Interleaved color, `[height, width, depth]`
    Color(Array3<f32>),
}

/// Converts raw bytes into tensors of a fixed geometry
#[derive(Clone, Copy, Debug)]
pub struct ImagePreprocessor {
    height: u32,
    width: u32,
    channels: u32,
    filter: FilterType,
}

impl ImagePreprocessor {
    pub fn new(height: u32, width: u32, channels: u32, filter: FilterType) -> Self {
        Self {
            height,
            width,
            channels,
            filter,
        }
    }

    pub fn for_descriptor(descriptor: &ModelDescriptor, filter: FilterType) -> Self {
        Self::new(
            descriptor.height,
            descriptor.width,
            descriptor.channels,
            filter,
        )
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }

    pub fn process(&self, bytes: &[u8]) -> InferenceResult<ImageTensor> {
        let image = image::load_from_memory(bytes)?;

        let pixels = if self.channels == 1 {
            let gray = imageops::resize(&image.to_luma8(), self.width, self.height, self.filter);
            Pixels::Plane(gray_to_array(gray)?)
        } else {
            let rgb = imageops::resize(&image.to_rgb8(), self.width, self.height, self.filter);
            Pixels::Color(rgb_to_array(rgb)?)
        };

        let array = expand_channels(pixels, self.channels as usize)?;
        let scaled = array.mapv(|v| v / 255.0);
        Ok(ImageTensor {
            data: scaled.insert_axis(Axis(0)),
        })
    }
}

fn gray_to_array(image: GrayImage) -> InferenceResult<Array2<f32>> {
    let (w, h) = image.dimensions();
    let data: Vec<f32> = image.into_raw().into_iter().map(f32::from).collect();
    Array2::from_shape_vec((h as usize, w as usize), data)
        .map_err(|e| InferenceError::Preprocess(format!("grayscale buffer: {e}")))
}

fn rgb_to_array(image: RgbImage) -> InferenceResult<Array3<f32>> {
    let (w, h) = image.dimensions();
    let data: Vec<f32> = image.into_raw().into_iter().map(f32::from).collect();
    Array3::from_shape_vec((h as usize, w as usize, 3), data)
        .map_err(|e| InferenceError::Preprocess(format!("rgb buffer: {e}")))
}

/// Bring decoded pixels to `[height, width, channels]`.
///
/// A lone plane gets a trailing channel axis, or is replicated when more than
/// one channel is required.
fn expand_channels(pixels: Pixels, channels: usize) -> InferenceResult<Array3<f32>> {
    match pixels {
        Pixels::Plane(plane) if channels == 1 => Ok(plane.insert_axis(Axis(2))),
        Pixels::Plane(plane) => {
            let (h, w) = plane.dim();
            Ok(Array3::from_shape_fn((h, w, channels), |(y, x, _)| {
                plane[[y, x]]
            }))
        }
        Pixels::Color(color) if color.dim().2 == channels => Ok(color),
        Pixels::Color(color) => Err(InferenceError::Preprocess(format!(
            "decoded {} channels but the model expects {channels}",
            color.dim().2
        ))),
    }
}
