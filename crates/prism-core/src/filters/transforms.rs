//! Whole-image color and blur transforms.

use image::DynamicImage;
use std::borrow::Cow;

use super::Transform;

/// Stores the image unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFilter;

impl Transform for NullFilter {
    fn name(&self) -> &'static str {
        "null"
    }

    fn transform<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        Cow::Borrowed(image)
    }
}

/// Converts to 8-bit luma.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrayscaleFilter;

impl Transform for GrayscaleFilter {
    fn name(&self) -> &'static str {
        "grayscale"
    }

    fn transform<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        Cow::Owned(image.grayscale())
    }
}

/// Inverts every color channel, leaving alpha alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvertFilter;

impl Transform for InvertFilter {
    fn name(&self) -> &'static str {
        "invert"
    }

    fn transform<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        let mut inverted = image.clone();
        inverted.invert();
        Cow::Owned(inverted)
    }
}

/// Gaussian blur.
#[derive(Debug, Clone, Copy)]
pub struct BlurFilter {
    sigma: f32,
}

impl BlurFilter {
    /// Blur with standard deviation `sigma` (pixels).
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }
}

impl Transform for BlurFilter {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn transform<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        Cow::Owned(image.blur(self.sigma))
    }
}
