//! Image preprocessing
//!
//! Turns encoded image bytes into the NHWC `f32` tensor the classifier
//! expects: decode, nearest-neighbour resize to 224x224, convert to float,
//! prepend a batch dimension of one.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};

use crate::utils::{ClassifierError, Result};

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 224;

/// RGB
pub const INPUT_CHANNELS: usize = 3;

/// NHWC input shape for a single image
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

/// ImageNet normalization mean values (RGB)
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How integer pixel values are mapped to floats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelScaling {
    /// Plain type conversion, values stay in 0..=255
    #[default]
    Raw,
    /// Divide by 255
    Unit,
    /// Divide by 255, then subtract the ImageNet mean and divide by its std
    ImageNet,
}

impl PixelScaling {
    fn apply(self, value: u8, channel: usize) -> f32 {
        let value = f32::from(value);
        match self {
            PixelScaling::Raw => value,
            PixelScaling::Unit => value / 255.0,
            PixelScaling::ImageNet => (value / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        }
    }
}

impl std::str::FromStr for PixelScaling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(PixelScaling::Raw),
            "unit" => Ok(PixelScaling::Unit),
            "imagenet" => Ok(PixelScaling::ImageNet),
            other => Err(format!(
                "unknown pixel scaling '{}', expected one of: raw, unit, imagenet",
                other
            )),
        }
    }
}

impl std::fmt::Display for PixelScaling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelScaling::Raw => write!(f, "raw"),
            PixelScaling::Unit => write!(f, "unit"),
            PixelScaling::ImageNet => write!(f, "imagenet"),
        }
    }
}

/// Dense 4-D `f32` tensor in NHWC layout
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    shape: [usize; 4],
}

impl ImageTensor {
    pub fn new(data: Vec<f32>, shape: [usize; 4]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ClassifierError::Inference(format!(
                "tensor of shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Value at (batch, row, column, channel)
    pub fn get(&self, n: usize, y: usize, x: usize, c: usize) -> Option<f32> {
        let [batch, height, width, channels] = self.shape;
        if n >= batch || y >= height || x >= width || c >= channels {
            return None;
        }
        let index = ((n * height + y) * width + x) * channels + c;
        self.data.get(index).copied()
    }
}

/// Converts raw uploads into classifier input tensors
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    /// Target side length
    pub image_size: u32,

    /// Pixel value mapping
    pub scaling: PixelScaling,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            image_size: INPUT_SIZE,
            scaling: PixelScaling::default(),
        }
    }
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure pixel scaling
    pub fn with_scaling(mut self, scaling: PixelScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Configure image size
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// Decode encoded image bytes (format sniffed from content) into a tensor
    pub fn decode(&self, raw: &[u8]) -> Result<ImageTensor> {
        if raw.is_empty() {
            return Err(ClassifierError::Decode("empty upload".to_string()));
        }
        let image = image::load_from_memory(raw)?;
        self.preprocess(&image)
    }

    /// Read an image file and decode it
    pub fn decode_file(&self, path: &Path) -> Result<ImageTensor> {
        let raw = std::fs::read(path)?;
        self.decode(&raw)
    }

    /// Resize and convert an already decoded image
    pub fn preprocess(&self, image: &DynamicImage) -> Result<ImageTensor> {
        let size = self.image_size;
        let resized = image::imageops::resize(&image.to_rgb8(), size, size, FilterType::Nearest);

        let data: Vec<f32> = resized
            .pixels()
            .flat_map(|pixel| {
                let scaling = self.scaling;
                pixel.0.into_iter().enumerate().map(move |(c, v)| scaling.apply(v, c))
            })
            .collect();

        ImageTensor::new(data, [1, size as usize, size as usize, INPUT_CHANNELS])
    }
}
