//! Configuration types for edition ingestion.
//!
//! Two structs, two concerns:
//!
//! * [`IngestConfig`] controls the pipeline itself (encoder quality, the
//!   finalize delay, archive pre-flight, progress reporting). Built via
//!   [`IngestConfig::builder()`].
//! * [`ApiConfig`] tells [`crate::api::HttpEditionsApi`] where the publishing
//!   API lives and which bearer token to present.

use crate::error::IngestError;
use crate::progress::{IngestProgressCallback, ProgressCallback};
use std::fmt;
use std::sync::Arc;

/// Default API location when `EDITIONS_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:8787";

/// Configuration for an ingestion run.
///
/// # Example
/// ```rust
/// use edition_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .quality(90)
///     .finalize_delay_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.quality, 90);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Lossy encoder quality for every output page, 1–100. Default: 85.
    pub quality: u8,

    /// Pause between reaching 100% and reporting `Done`, in milliseconds.
    /// Default: 1000.
    ///
    /// Gives whoever is watching the status line time to read the completion
    /// message before the session closes and the form resets.
    pub finalize_delay_ms: u64,

    /// Read and validate the archive *before* creating the edition record.
    /// Default: false.
    ///
    /// With the default order an empty or corrupt archive leaves an edition
    /// with zero pages on the server, which operators then delete by hand.
    /// Turning this on avoids the orphan at the cost of reordering the
    /// reported states (`ReadingArchive` comes before `CreatingEdition`).
    pub preflight_archive: bool,

    /// Receives state, status and page events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            finalize_delay_ms: 1000,
            preflight_archive: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("quality", &self.quality)
            .field("finalize_delay_ms", &self.finalize_delay_ms)
            .field("preflight_archive", &self.preflight_archive)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn IngestProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn finalize_delay_ms(mut self, ms: u64) -> Self {
        self.config.finalize_delay_ms = ms;
        self
    }

    pub fn preflight_archive(mut self, v: bool) -> Self {
        self.config.preflight_archive = v;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn IngestProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.quality == 0 || c.quality > 100 {
            return Err(IngestError::InvalidConfig(format!(
                "quality must be 1–100, got {}",
                c.quality
            )));
        }
        Ok(self.config)
    }
}

/// Where the publishing API lives and how to authenticate against it.
#[derive(Clone, Default)]
pub struct ApiConfig {
    /// Base URL without a trailing slash, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Bearer token attached to every request when present.
    pub token: Option<String>,
    /// Per-request timeout. `None` keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into()).filter(|t: &String| !t.trim().is_empty());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
