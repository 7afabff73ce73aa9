//! On-disk layout for filtered outputs.
//!
//! Every filter writes to its own directory under the output root:
//!
//! ```text
//! <output_dir>/<filter>/<stem>-<hash>.<ext>
//! ```
//!
//! The stem comes from the last URL path segment and the hash is a short
//! BLAKE3 digest of the full URL, so identical file names from different hosts
//! never collide and the cache check can recompute the path from the URL alone.

use image::{DynamicImage, ImageFormat};
use reqwest::Url;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;

/// Hex characters of the URL digest kept in file names.
const URL_HASH_LEN: usize = 12;

/// Longest stem kept from the URL path.
const MAX_STEM_LEN: usize = 64;

/// Resolves output paths and writes encoded images.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
    format: ImageFormat,
}

impl OutputStore {
    /// Create a store rooted at `root` that encodes as `format`.
    pub fn new(root: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Create a store from the `general.output_dir` and `filters.output_format` settings.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let format = parse_image_format(&config.filters.output_format).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "Unsupported output format: {}",
                config.filters.output_format
            ))
        })?;
        Ok(Self::new(config.output_dir(), format))
    }

    /// Root output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Encoding used for stored outputs.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Path where `filter`'s output for `url` lives.
    pub fn path_for(&self, filter: &str, url: &Url) -> PathBuf {
        self.path_for_stem(filter, &file_stem(url))
    }

    /// Path where `filter`'s output for an image with file stem `stem` lives.
    pub fn path_for_stem(&self, filter: &str, stem: &str) -> PathBuf {
        self.root
            .join(filter)
            .join(format!("{stem}.{}", self.extension()))
    }

    /// Encode `image` and write it to `filter`'s directory under `stem`.
    /// Returns the path and the number of bytes written.
    ///
    /// The bytes go to a temporary sibling first and are renamed into place,
    /// so an interrupted write never leaves a file the cache would accept.
    ///
    /// Blocking; call from `spawn_blocking`.
    pub fn persist(
        &self,
        filter: &str,
        stem: &str,
        image: &DynamicImage,
    ) -> std::io::Result<(PathBuf, u64)> {
        let bytes = encode(image, self.format)?;
        let path = self.path_for_stem(filter, stem);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = partial_path(&path);
        std::fs::write(&temp_path, &bytes)?;
        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok((path, bytes.len() as u64))
    }

    fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Temporary name used while `path` is being written.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Parse an output format name.
pub fn parse_image_format(name: &str) -> Option<ImageFormat> {
    match name.to_lowercase().as_str() {
        "png" => Some(ImageFormat::Png),
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Stable, filesystem-safe stem for a URL.
pub fn file_stem(url: &Url) -> String {
    let digest = blake3::hash(url.as_str().as_bytes()).to_hex();
    let hash = &digest.as_str()[..URL_HASH_LEN];

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    if stem.is_empty() {
        hash.to_string()
    } else {
        format!("{stem}-{hash}")
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> std::io::Result<Vec<u8>> {
    // JPEG has no alpha channel and the WebP encoder only takes RGB(A).
    let converted;
    let image = match format {
        ImageFormat::Jpeg if image.color().has_alpha() || !is_rgb8_or_l8(image) => {
            converted = DynamicImage::ImageRgb8(image.to_rgb8());
            &converted
        }
        ImageFormat::WebP if !matches!(image, DynamicImage::ImageRgba8(_)) => {
            converted = DynamicImage::ImageRgba8(image.to_rgba8());
            &converted
        }
        _ => image,
    };

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .map_err(std::io::Error::other)?;
    Ok(buffer.into_inner())
}

fn is_rgb8_or_l8(image: &DynamicImage) -> bool {
    matches!(image, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_file_stem_uses_last_segment() {
        let stem = file_stem(&url("https://example.com/images/cat photo.jpg"));
        assert!(stem.starts_with("cat_20photo-"), "got {stem}");
        assert_eq!(stem.len(), "cat_20photo-".len() + URL_HASH_LEN);
    }

    #[test]
    fn test_file_stem_differs_per_host() {
        let a = file_stem(&url("https://a.example.com/cat.jpg"));
        let b = file_stem(&url("https://b.example.com/cat.jpg"));
        assert_ne!(a, b);
        assert!(a.starts_with("cat-"));
        assert!(b.starts_with("cat-"));
    }

    #[test]
    fn test_file_stem_without_path_is_hash_only() {
        let stem = file_stem(&url("https://example.com/"));
        assert_eq!(stem.len(), URL_HASH_LEN);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_path_for_layout() {
        let store = OutputStore::new("/out", ImageFormat::Png);
        let path = store.path_for("grayscale", &url("https://example.com/dog.jpeg"));
        assert!(path.starts_with("/out/grayscale"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    }

    #[test]
    fn test_parse_image_format() {
        assert_eq!(parse_image_format("PNG"), Some(ImageFormat::Png));
        assert_eq!(parse_image_format("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(parse_image_format("webp"), Some(ImageFormat::WebP));
        assert_eq!(parse_image_format("bmp"), None);
    }

    #[test]
    fn test_persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path(), ImageFormat::Png);
        let image = DynamicImage::new_rgba8(8, 4);
        let target = url("https://example.com/a.png");

        let (path, written) = store.persist("null", &file_stem(&target), &image).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), written);
        assert_eq!(path, store.path_for("null", &target));
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_persist_replaces_leftover_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path(), ImageFormat::Png);
        let target = url("https://example.com/b.png");
        let path = store.path_for("null", &target);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(partial_path(&path), b"truncat").unwrap();

        let (written_path, _) = store
            .persist("null", &file_stem(&target), &DynamicImage::new_rgb8(4, 4))
            .unwrap();
        assert_eq!(written_path, path);
        assert!(!partial_path(&path).exists());
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_partial_path_is_a_sibling() {
        let partial = partial_path(Path::new("/out/null/cat-0123.png"));
        assert_eq!(partial, Path::new("/out/null/cat-0123.png.tmp"));
    }

    #[test]
    fn test_persist_jpeg_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path(), ImageFormat::Jpeg);
        let image = DynamicImage::new_rgba8(8, 8);
        let (path, _) = store
            .persist("null", &file_stem(&url("https://example.com/a.png")), &image)
            .unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
    }
}
