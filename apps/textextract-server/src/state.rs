//! Application state management

use std::sync::Arc;

use crate::blog::BlogStore;
use crate::config::Config;
use crate::ocr::OcrService;
use crate::usage::{UsageError, UsageService};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to initialize usage tracking: {0}")]
    Usage(#[from] UsageError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    ocr: OcrService,
    usage: UsageService,
    blog: BlogStore,
}

impl AppState {
    /// Assemble state from already-built services
    pub fn new(config: Config, ocr: OcrService, usage: UsageService, blog: BlogStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                ocr,
                usage,
                blog,
            }),
        }
    }

    /// Build every service from configuration.
    ///
    /// A blog directory that cannot be read leaves the store empty; it can be
    /// retried through `POST /api/blog/refresh`.
    pub async fn from_config(config: Config) -> Result<Self, StateError> {
        let ocr = OcrService::from_config(&config.ocr);
        let usage = UsageService::from_database_url(config.database.url.as_deref()).await?;

        let blog = BlogStore::new(&config.blog.dir);
        if let Err(e) = blog.refresh().await {
            tracing::warn!("Initial blog load failed: {}. Will retry on /api/blog/refresh", e);
        }

        Ok(Self::new(config, ocr, usage, blog))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the OCR gateway
    pub fn ocr(&self) -> &OcrService {
        &self.inner.ocr
    }

    /// Get the usage gate
    pub fn usage(&self) -> &UsageService {
        &self.inner.usage
    }

    /// Get the blog cache
    pub fn blog(&self) -> &BlogStore {
        &self.inner.blog
    }
}
