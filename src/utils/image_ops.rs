use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

use crate::core::errors::{ClassifierError, ClassifierResult};

/// Decode arbitrary uploaded bytes into an image.
///
/// The only failure here is undecodable input, which maps to a client-input
/// error at the boundary rather than a server fault.
pub fn decode_image(bytes: &[u8]) -> ClassifierResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(ClassifierError::DecodeFailed)
}

/// Resample to a fixed square and convert to a unit-interval NHWC tensor.
///
/// Lanczos3 resampling keeps repeated uploads of the same bytes
/// pixel-identical, which the classification determinism contract relies on.
pub fn to_unit_tensor(img: &DynamicImage, size: u32) -> Array4<f32> {
    let resized = img.resize_exact(size, size, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let edge = size as usize;
    let mut array = Array4::<f32>::zeros((1, edge, edge, 3));
    for y in 0..edge {
        for x in 0..edge {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            array[[0, y, x, 0]] = pixel[0] as f32 / 255.0;
            array[[0, y, x, 1]] = pixel[1] as f32 / 255.0;
            array[[0, y, x, 2]] = pixel[2] as f32 / 255.0;
        }
    }
    array
}
