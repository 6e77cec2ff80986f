//! # edition-ingest
//!
//! Turn a ZIP of scanned magazine spreads into a paginated digital edition
//! on the publishing API.
//!
//! ## Pipeline Overview
//!
//! ```text
//! form + archive.zip
//!  │
//!  ├─ 1. Create   POST the edition record, get its id
//!  ├─ 2. Read     unzip, keep .png/.jpg/.jpeg, sort by name (spawn_blocking)
//!  ├─ 3. Split    spread 0 → cover (left half); spread k → left, right
//!  ├─ 4. Encode   each half re-encoded as JPEG at fixed quality
//!  ├─ 5. Upload   one page at a time, in page order, abort on first error
//!  └─ 6. Finish   100%, short pause, session closes and the list refreshes
//! ```
//!
//! N spreads always yield `2N − 1` pages numbered `1..=2N−1` with page 1 as
//! the only cover.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edition_ingest::{
//!     ApiConfig, ArchiveUpload, EditionForm, HttpEditionsApi, IngestConfig, Ingestor,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = HttpEditionsApi::new(
//!         &ApiConfig::new("https://api.example.com").with_token("…"),
//!     )?;
//!     let ingestor = Ingestor::new(Arc::new(api), IngestConfig::default());
//!
//!     let form = EditionForm {
//!         title: "Spring 2024".into(),
//!         description: String::new(),
//!         date: "2024-03-01".into(),
//!         archive: Some(ArchiveUpload::from_path("spring.zip").await?),
//!     };
//!     let report = ingestor.ingest(&form).await?;
//!     eprintln!("edition {} has {} pages", report.edition_id, report.pages_uploaded);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `edition-ingest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edition-ingest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{EditionsApi, HttpEditionsApi};
pub use config::{ApiConfig, IngestConfig, IngestConfigBuilder, DEFAULT_API_URL};
pub use error::IngestError;
pub use ingest::{
    split_to_dir, ArchiveUpload, EditionForm, IngestReport, IngestSession, IngestState, Ingestor,
    RunStatus, SplitPage,
};
pub use model::{
    AdminUser, Crop, Edition, EncodedImage, LoginSession, NewEdition, OutputPage, PageRecord,
    SourceSpread,
};
pub use pipeline::archive::{ArchiveEntry, ArchiveReader, ZipArchiveReader};
pub use pipeline::encode::{PageCodec, RasterCodec};
pub use progress::{
    IngestProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEstimate,
};
