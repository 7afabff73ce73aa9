//! Decoded images and the decoder that produces them.

use image::{DynamicImage, GenericImageView, ImageFormat};
use reqwest::Url;
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::store::file_stem;

/// A downloaded and decoded image, shared read-only by every filter.
#[derive(Debug)]
pub struct Image {
    /// Where the image came from
    pub url: Url,
    /// Stable file name stem derived from the URL
    pub file_name: String,
    /// Format detected from the content
    pub format: ImageFormat,
    /// Decoded pixels
    pub pixels: DynamicImage,
    /// Size of the downloaded bytes
    pub byte_len: u64,
}

impl Image {
    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Decodes downloaded bytes with a timeout and a dimension limit.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode `bytes` downloaded from `url`.
    ///
    /// Decoding runs on the blocking thread pool so CPU-heavy formats never
    /// stall an async worker.
    pub async fn decode(&self, url: &Url, bytes: Vec<u8>) -> PipelineResult<Image> {
        let byte_len = bytes.len() as u64;
        let url_string = url.to_string();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decoded = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || decode_sync(bytes, &url_string)),
        )
        .await;

        let (pixels, format) = match decoded {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(PipelineError::Decode {
                    url: url.to_string(),
                    message: format!("Task join error: {e}"),
                })
            }
            Err(_) => {
                return Err(PipelineError::Timeout {
                    url: url.to_string(),
                    stage: "decode".to_string(),
                    filter: None,
                    timeout_ms: self.limits.decode_timeout_ms,
                })
            }
        };

        let (width, height) = pixels.dimensions();
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::TooLarge {
                url: url.to_string(),
                detail: format!("{width}x{height} exceeds {max_dim}px"),
            });
        }

        Ok(Image {
            url: url.clone(),
            file_name: file_stem(url),
            format,
            pixels,
            byte_len,
        })
    }
}

fn decode_sync(bytes: Vec<u8>, url: &str) -> PipelineResult<(DynamicImage, ImageFormat)> {
    let decode_error = |message: String| PipelineError::Decode {
        url: url.to_string(),
        message,
    };

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(format!("Cannot detect image format: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| decode_error("Unrecognized image format".to_string()))?;
    let pixels = reader.decode().map_err(|e| decode_error(e.to_string()))?;
    Ok((pixels, format))
}

/// Short lowercase name for an image format.
pub fn format_name(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("unknown")
}
