//! Pipeline stages for edition ingestion.
//!
//! Each submodule implements one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! archive ──▶ split ──▶ encode ──▶ upload
//!  (zip)     (halves)   (jpeg)    (API, serial)
//! ```
//!
//! 1. [`archive`]: decompress the ZIP, keep image entries, sort by name.
//!    Runs in `spawn_blocking`.
//! 2. [`split`]: decode a spread and cut it into cover or left/right crops.
//!    Also runs in `spawn_blocking`.
//! 3. [`encode`]: re-encode each crop at a fixed lossy quality.
//! 4. [`upload`]: multipart upload, one page at a time, abort on first
//!    failure. The only stage with network I/O.

pub mod archive;
pub mod encode;
pub mod split;
pub mod upload;
