//! Filter binder: one task per configured filter for a resolved image.

use std::sync::Arc;

use crate::filters::ImageFilter;

use super::decode::Image;

/// A single filter applied to a single image. Consumed by the runner.
pub struct FilterTask {
    /// Filter to apply
    pub filter: Arc<dyn ImageFilter>,
    /// Shared source image
    pub image: Arc<Image>,
}

impl FilterTask {
    /// Name of the bound filter.
    pub fn filter_name(&self) -> &str {
        self.filter.name()
    }
}

impl std::fmt::Debug for FilterTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterTask")
            .field("filter", &self.filter.name())
            .field("url", &self.image.url.as_str())
            .finish()
    }
}

/// Holds the filter set for a pipeline.
#[derive(Clone)]
pub struct FilterBinder {
    filters: Arc<[Arc<dyn ImageFilter>]>,
}

impl FilterBinder {
    /// Bind against `filters`, in order.
    pub fn new(filters: Vec<Arc<dyn ImageFilter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }

    /// One task per filter, all sharing `image`.
    pub fn bind(&self, image: Arc<Image>) -> Vec<FilterTask> {
        self.filters
            .iter()
            .map(|filter| FilterTask {
                filter: Arc::clone(filter),
                image: Arc::clone(&image),
            })
            .collect()
    }

    /// Number of filters each image fans out to.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the filter set is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in binding order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}
