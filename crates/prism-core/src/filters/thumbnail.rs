//! Thumbnail generation.

use image::DynamicImage;
use std::borrow::Cow;

use super::Transform;

/// Resizes so the longest edge equals the configured size, keeping aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailFilter {
    size: u32,
}

impl ThumbnailFilter {
    /// Thumbnails with a longest edge of `size` pixels.
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }
}

impl Transform for ThumbnailFilter {
    fn name(&self) -> &'static str {
        "thumbnail"
    }

    fn transform<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        Cow::Owned(image.thumbnail(self.size, self.size))
    }
}
