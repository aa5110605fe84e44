//! CNN Model Architecture for Corn Leaf Disease Classification
//!
//! A small convolutional network built with the Burn framework. The network
//! consumes NCHW tensors; callers holding NHWC image tensors permute first.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the CornClassifier CNN model
#[derive(Config, Debug)]
pub struct CornClassifierConfig {
    /// Number of output classes (Blight, Common, Gray, Healthy)
    #[config(default = "4")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "224")]
    pub input_size: usize,

    /// Dropout rate for regularization
    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "32")]
    pub base_filters: usize,
}

impl CornClassifierConfig {
    /// NHWC shape of a single-image input batch
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.input_size, self.input_size, self.in_channels]
    }
}

/// Conv2d, ReLU and a 2x2 max pool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Corn Leaf Disease Classifier CNN
///
/// Architecture:
/// - 4 convolutional blocks with increasing filter sizes
/// - Global Average Pooling
/// - Fully connected classifier with dropout
#[derive(Module, Debug)]
pub struct CornClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,

    pub global_pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> CornClassifier<B> {
    /// Create a new, randomly initialized CornClassifier
    pub fn new(config: &CornClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        // 224 -> 112 -> 56 -> 28 -> 14
        let conv1 = ConvBlock::new(config.in_channels, base, 3, device);
        let conv2 = ConvBlock::new(base, base * 2, 3, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, 3, device);
        let conv4 = ConvBlock::new(base * 4, base * 8, 3, device);

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(base * 8, 256).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(256, config.num_classes).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            global_pool,
            fc1,
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, channels, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        // [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, InferenceBackend};

    type TestBackend = InferenceBackend;

    fn tiny_config() -> CornClassifierConfig {
        CornClassifierConfig::new().with_base_filters(4)
    }

    #[test]
    fn test_default_config_matches_category_set() {
        let config = CornClassifierConfig::new();
        assert_eq!(config.num_classes, 4);
        assert_eq!(config.input_shape(), [1, 224, 224, 3]);
    }

    #[test]
    fn test_corn_classifier_output_shape() {
        let device = default_device();
        let model = CornClassifier::<TestBackend>::new(&tiny_config(), &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 224, 224], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 4]);
        assert_eq!(model.num_classes(), 4);
    }

    #[test]
    fn test_softmax_output_sums_to_one() {
        let device = default_device();
        let model = CornClassifier::<TestBackend>::new(&tiny_config(), &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 224, 224], &device);
        let probs: Vec<f32> = model.forward_softmax(input).into_data().to_vec().unwrap();

        assert_eq!(probs.len(), 4);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
