//! Filters: transform a decoded image and persist the result.
//!
//! The pipeline talks to filters only through [`ImageFilter`]. The built-in
//! filters are pixel [`Transform`]s wrapped in a [`PersistingFilter`], which
//! runs the transform on the blocking pool and writes the output through the
//! [`OutputStore`].

mod thumbnail;
mod transforms;

pub use thumbnail::ThumbnailFilter;
pub use transforms::{BlurFilter, GrayscaleFilter, InvertFilter, NullFilter};

use async_trait::async_trait;
use image::DynamicImage;
use std::borrow::Cow;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::pipeline::Image;
use crate::store::OutputStore;
use crate::types::PersistedOutput;

/// Names accepted in `filters.enabled`.
pub const FILTER_NAMES: &[&str] = &["null", "grayscale", "invert", "blur", "thumbnail"];

/// A transform-and-persist step applied to every downloaded image.
///
/// Uses `async_trait` because the pipeline holds `Arc<dyn ImageFilter>`.
#[async_trait]
pub trait ImageFilter: Send + Sync {
    /// Filter name, used for logging and as the output directory.
    fn name(&self) -> &str;

    /// Transform `image` and persist the result.
    async fn apply(&self, image: Arc<Image>) -> PipelineResult<PersistedOutput>;
}

/// A pure pixel transform. Runs on the blocking pool.
pub trait Transform: Send + Sync + 'static {
    /// Filter name.
    fn name(&self) -> &'static str;

    /// Produce the filtered pixels. May borrow the input when unchanged.
    fn transform<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage>;
}

/// Adapts a [`Transform`] into an [`ImageFilter`] that writes to an [`OutputStore`].
pub struct PersistingFilter<T> {
    transform: Arc<T>,
    store: OutputStore,
}

impl<T: Transform> PersistingFilter<T> {
    /// Wrap `transform`, persisting into `store`.
    pub fn new(transform: T, store: OutputStore) -> Self {
        Self {
            transform: Arc::new(transform),
            store,
        }
    }
}

#[async_trait]
impl<T: Transform> ImageFilter for PersistingFilter<T> {
    fn name(&self) -> &str {
        self.transform.name()
    }

    async fn apply(&self, image: Arc<Image>) -> PipelineResult<PersistedOutput> {
        let name = self.transform.name();
        let transform = Arc::clone(&self.transform);
        let store = self.store.clone();
        let url = image.url.to_string();

        let filter_error = |message: String| PipelineError::Filter {
            url: url.clone(),
            filter: name.to_string(),
            message,
        };

        let persisted = tokio::task::spawn_blocking(move || {
            let output = transform.transform(&image.pixels);
            let (path, bytes_written) = store.persist(name, &image.file_name, &output)?;
            Ok::<_, std::io::Error>(PersistedOutput {
                url: image.url.to_string(),
                filter: name.to_string(),
                path,
                width: output.width(),
                height: output.height(),
                bytes_written,
            })
        })
        .await
        .map_err(|e| filter_error(format!("Task join error: {e}")))?
        .map_err(|e| filter_error(e.to_string()))?;

        tracing::trace!(
            "{} wrote {} ({} bytes)",
            name,
            persisted.path.display(),
            persisted.bytes_written
        );
        Ok(persisted)
    }
}

/// Resolve `filters.enabled` into filter instances, in configured order.
pub fn build_filters(config: &Config) -> Result<Vec<Arc<dyn ImageFilter>>, ConfigError> {
    let store = OutputStore::from_config(config)?;
    config
        .filters
        .enabled
        .iter()
        .map(|name| build_filter(name, config, store.clone()))
        .collect()
}

fn build_filter(
    name: &str,
    config: &Config,
    store: OutputStore,
) -> Result<Arc<dyn ImageFilter>, ConfigError> {
    let filter: Arc<dyn ImageFilter> = match name {
        "null" => Arc::new(PersistingFilter::new(NullFilter, store)),
        "grayscale" => Arc::new(PersistingFilter::new(GrayscaleFilter, store)),
        "invert" => Arc::new(PersistingFilter::new(InvertFilter, store)),
        "blur" => Arc::new(PersistingFilter::new(
            BlurFilter::new(config.filters.blur_sigma),
            store,
        )),
        "thumbnail" => Arc::new(PersistingFilter::new(
            ThumbnailFilter::new(config.filters.thumbnail_size),
            store,
        )),
        other => {
            return Err(ConfigError::ValidationError(format!(
                "Unknown filter '{other}' (available: {})",
                FILTER_NAMES.join(", ")
            )))
        }
    };
    Ok(filter)
}
