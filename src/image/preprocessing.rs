use crate::utils::error::LeafGuardError;
use crate::Result;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array3, ArrayView3};

/// Model input edge length
pub const INPUT_SIZE: u32 = 224;

/// ImageNet channel means (RGB)
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations (RGB)
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalized image in CHW layout, contiguous in standard order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array3<f32>,
}

impl ImageTensor {
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        if !data.is_standard_layout() {
            return Err(LeafGuardError::Preprocess(
                "tensor data must be contiguous".to_string(),
            ));
        }
        Ok(Self { data })
    }

    /// (channels, height, width)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Flat rank-1 view of the values
    pub fn as_slice(&self) -> &[f32] {
        // standard layout is checked on construction
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}

/// Bitmap to tensor transform shared by both classification stages.
#[derive(Debug, Clone)]
pub struct TensorPreprocessor {
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    filter: FilterType,
}

impl Default for TensorPreprocessor {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE,
            mean: CHANNEL_MEAN,
            std: CHANNEL_STD,
            // bilinear, same family as the scaling the models were trained with
            filter: FilterType::Triangle,
        }
    }
}

impl TensorPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to the model input size and normalize each channel.
    pub fn to_tensor(&self, image: &DynamicImage) -> Result<ImageTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(LeafGuardError::Preprocess(format!(
                "image has no pixels: {}x{}",
                width, height
            )));
        }

        let rgb = image.to_rgb8();
        let size = self.input_size;
        let resized = if (width, height) == (size, size) {
            rgb
        } else {
            image::imageops::resize(&rgb, size, size, self.filter)
        };

        let side = size as usize;
        let mut data = Array3::<f32>::zeros((3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                data[[c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - self.mean[c]) / self.std[c];
            }
        }

        tracing::debug!(
            "Preprocessed {}x{} image into {}x{}x{} tensor",
            width,
            height,
            3,
            side,
            side
        );

        ImageTensor::from_array(data)
    }
}
