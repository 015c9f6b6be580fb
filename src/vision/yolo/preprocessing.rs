// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for YOLOv8

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Padding color used by the Ultralytics letterbox
pub const PAD_VALUE: u8 = 114;

/// Geometry of a letterboxed image
///
/// Used to map boxes and mask prototypes from network space back to the
/// source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor applied to the source image
    pub scale: f32,
    /// X offset from padding
    pub pad_x: u32,
    /// Y offset from padding
    pub pad_y: u32,
    /// Scaled (unpadded) width
    pub scaled_width: u32,
    /// Scaled (unpadded) height
    pub scaled_height: u32,
    /// Network input width
    pub input_width: u32,
    /// Network input height
    pub input_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    /// Compute the letterbox for an image and a network input size
    pub fn new(original: (u32, u32), input: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (input_w, input_h) = input;

        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                pad_x: 0,
                pad_y: 0,
                scaled_width: 0,
                scaled_height: 0,
                input_width: input_w,
                input_height: input_h,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        // Scale to fit within the input while preserving aspect ratio
        let scale = (input_w as f32 / orig_w as f32).min(input_h as f32 / orig_h as f32);
        let scaled_width = ((orig_w as f32 * scale).round() as u32).clamp(1, input_w);
        let scaled_height = ((orig_h as f32 * scale).round() as u32).clamp(1, input_h);

        Self {
            scale,
            pad_x: (input_w - scaled_width) / 2,
            pad_y: (input_h - scaled_height) / 2,
            scaled_width,
            scaled_height,
            input_width: input_w,
            input_height: input_h,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a point from network space back to source image pixels, clamped
    /// to the image bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.pad_x as f32) / self.scale;
        let orig_y = (y - self.pad_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}

/// Letterbox an image into the network input and build the NCHW tensor
///
/// Steps:
/// 1. Resize with aspect ratio preservation
/// 2. Pad to the input size with gray (114), centered
/// 3. Scale pixels to [0, 1]
/// 4. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess(image: &DynamicImage, input_size: [u32; 2]) -> (Array4<f32>, Letterbox) {
    let [input_w, input_h] = input_size;
    let letterbox = Letterbox::new(image.dimensions(), (input_w, input_h));
    let padded = resize_with_padding(image, &letterbox);

    let mut tensor = Array4::zeros((1, 3, input_h as usize, input_w as usize));
    for (x, y, pixel) in padded.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, letterbox)
}

/// Resize and pad according to a precomputed letterbox
pub fn resize_with_padding(image: &DynamicImage, letterbox: &Letterbox) -> RgbImage {
    let mut output = RgbImage::from_pixel(
        letterbox.input_width,
        letterbox.input_height,
        Rgb([PAD_VALUE, PAD_VALUE, PAD_VALUE]),
    );

    if letterbox.scaled_width == 0 || letterbox.scaled_height == 0 {
        return output;
    }

    let resized = image
        .resize_exact(
            letterbox.scaled_width,
            letterbox.scaled_height,
            image::imageops::FilterType::Triangle,
        )
        .to_rgb8();

    image::imageops::replace(
        &mut output,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    output
}
