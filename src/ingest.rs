//! Ingestion orchestration: form → edition record → archive → pages → API.
//!
//! [`Ingestor::ingest`] drives a single run through the state machine
//!
//! ```text
//! Idle ─▶ CreatingEdition ─▶ ReadingArchive ─▶ Processing(0..N) ─▶ Finalizing ─▶ Done
//!   │            │                  │                  │
//!   └─(invalid)  └──────────────────┴──────────────────┴──────────▶ Error
//! ```
//!
//! and [`IngestSession`] wraps it with the operator-facing behaviour: on
//! success the session closes, the form is cleared and the edition list is
//! re-fetched; on failure the session stays open with the error on the status
//! line and the form untouched, ready to resubmit.
//!
//! Nothing is rolled back on failure. An edition created before a bad archive
//! is detected stays on the server with zero pages unless
//! [`IngestConfig::preflight_archive`] is enabled.

use crate::api::EditionsApi;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::model::{Edition, NewEdition, OutputPage};
use crate::pipeline::archive::{read_archive, ArchiveEntry, ArchiveReader, ZipArchiveReader};
use crate::pipeline::encode::{PageCodec, RasterCodec};
use crate::pipeline::split::render_spread;
use crate::pipeline::upload::upload_pages;
use crate::progress::{ProgressCallback, ProgressEstimate};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

// ── Status text ──────────────────────────────────────────────────────────

pub const STATUS_STARTING: &str = "Starting…";
pub const STATUS_CREATING: &str = "Creating edition…";
pub const STATUS_READING: &str = "Reading ZIP archive…";
pub const STATUS_COMPLETED: &str = "Completed!";

// ── State ────────────────────────────────────────────────────────────────

/// Where an ingestion run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestState {
    #[default]
    Idle,
    CreatingEdition,
    ReadingArchive,
    /// Working on spread `spread` (0-based) of `total`.
    Processing { spread: usize, total: usize },
    Finalizing,
    Done,
    Error,
}

impl IngestState {
    /// `true` while a run is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            IngestState::CreatingEdition
                | IngestState::ReadingArchive
                | IngestState::Processing { .. }
                | IngestState::Finalizing
        )
    }
}

/// The observable status of a run: state, status line and percentage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub state: IngestState,
    pub message: String,
    pub percent: u8,
}

/// Single writer for a [`RunStatus`]; mirrors every change to the callback.
struct Tracker<'a> {
    status: &'a mut RunStatus,
    callback: Option<&'a ProgressCallback>,
}

impl Tracker<'_> {
    fn enter(&mut self, state: IngestState) {
        debug!("Ingest state → {:?}", state);
        self.status.state = state;
        if let Some(cb) = self.callback {
            cb.on_state_change(&state);
        }
    }

    fn message(&mut self, message: impl Into<String>) {
        self.status.message = message.into();
        self.emit();
    }

    /// Percentages never go backwards within a run.
    fn percent(&mut self, percent: u8) {
        self.status.percent = self.status.percent.max(percent.min(100));
        self.emit();
    }

    fn fail(&mut self, error: &IngestError) {
        self.enter(IngestState::Error);
        self.message(format!("Error: {error}"));
    }

    fn emit(&self) {
        if let Some(cb) = self.callback {
            cb.on_status(&self.status.message, self.status.percent);
        }
    }
}

// ── Form ─────────────────────────────────────────────────────────────────

/// The archive chosen by the operator.
#[derive(Debug, Clone)]
pub struct ArchiveUpload {
    pub file_name: String,
    pub data: Arc<[u8]>,
}

impl ArchiveUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Load an archive from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IngestError::ArchiveNotFound {
                path: path.to_path_buf(),
            },
            _ => IngestError::ArchiveReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, data))
    }

    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / 1024.0 / 1024.0
    }
}

/// Operator input for a new edition.
#[derive(Debug, Clone, Default)]
pub struct EditionForm {
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub archive: Option<ArchiveUpload>,
}

impl EditionForm {
    /// Check required fields and build the create payload.
    ///
    /// Title, date and archive are required; the description may be blank.
    pub fn validate(&self) -> Result<(NewEdition, &ArchiveUpload), IngestError> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.date.trim().is_empty() {
            missing.push("date");
        }
        if self.archive.is_none() {
            missing.push("ZIP archive");
        }

        let archive = match (&self.archive, missing.is_empty()) {
            (Some(archive), true) => archive,
            _ => {
                return Err(IngestError::Validation(format!(
                    "Please fill in all required fields (title, date, ZIP archive); missing: {}",
                    missing.join(", ")
                )))
            }
        };

        let date = self.date.trim();
        if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(IngestError::Validation(format!(
                "Invalid date '{date}': expected YYYY-MM-DD"
            )));
        }

        Ok((
            NewEdition {
                title: self.title.trim().to_string(),
                description: self.description.trim().to_string(),
                date: date.to_string(),
            },
            archive,
        ))
    }

    /// Clear every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ── Report ───────────────────────────────────────────────────────────────

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub edition_id: String,
    /// Source images read from the archive.
    pub spreads: usize,
    /// Pages accepted by the API; always `2 × spreads − 1`.
    pub pages_uploaded: usize,
    pub duration_ms: u64,
}

// ── Ingestor ─────────────────────────────────────────────────────────────

/// Runs the ingestion pipeline against an [`EditionsApi`].
#[derive(Clone)]
pub struct Ingestor {
    api: Arc<dyn EditionsApi>,
    archive_reader: Arc<dyn ArchiveReader>,
    codec: Arc<dyn PageCodec>,
    config: IngestConfig,
}

impl Ingestor {
    /// An ingestor using the ZIP reader and JPEG codec.
    pub fn new(api: Arc<dyn EditionsApi>, config: IngestConfig) -> Self {
        Self {
            api,
            archive_reader: Arc::new(ZipArchiveReader),
            codec: Arc::new(RasterCodec),
            config,
        }
    }

    pub fn with_archive_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.archive_reader = reader;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn PageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn api(&self) -> &Arc<dyn EditionsApi> {
        &self.api
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run the full pipeline for `form`.
    pub async fn ingest(&self, form: &EditionForm) -> Result<IngestReport, IngestError> {
        let mut status = RunStatus::default();
        self.ingest_tracked(form, &mut status).await
    }

    /// Like [`Ingestor::ingest`], writing every state, message and
    /// percentage change into `status` as it happens.
    ///
    /// A validation failure leaves `status.state` at `Idle` with the
    /// validation message; any other failure ends in `Error` with
    /// `"Error: <reason>"`.
    pub async fn ingest_tracked(
        &self,
        form: &EditionForm,
        status: &mut RunStatus,
    ) -> Result<IngestReport, IngestError> {
        let mut tracker = Tracker {
            status,
            callback: self.config.progress_callback.as_ref(),
        };

        let (new_edition, archive) = match form.validate() {
            Ok(v) => v,
            Err(e) => {
                tracker.status.state = IngestState::Idle;
                tracker.message(e.to_string());
                return Err(e);
            }
        };

        match self.run(new_edition, archive, &mut tracker).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!("Ingestion failed: {}", e);
                tracker.fail(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        new_edition: NewEdition,
        archive: &ArchiveUpload,
        tracker: &mut Tracker<'_>,
    ) -> Result<IngestReport, IngestError> {
        let start = Instant::now();
        info!(
            "Starting ingestion of '{}' from {} ({:.2} MB)",
            new_edition.title,
            archive.file_name,
            archive.size_mb()
        );
        tracker.status.percent = 0;
        tracker.message(STATUS_STARTING);

        // ── Steps 1–2: edition record + archive (order is configurable) ──
        let (edition_id, entries) = if self.config.preflight_archive {
            let entries = self.read(archive, tracker).await?;
            let edition_id = self.create(&new_edition, tracker).await?;
            (edition_id, entries)
        } else {
            let edition_id = self.create(&new_edition, tracker).await?;
            let entries = self.read(archive, tracker).await?;
            (edition_id, entries)
        };

        // ── Step 3: split → encode → upload, one spread at a time ────────
        let total = entries.len();
        tracker.message(format!("Processing {total} spreads…"));

        let callback = self.config.progress_callback.as_ref();
        let mut estimate = ProgressEstimate::for_spreads(total);
        let mut next_page: u32 = 1;
        let mut uploaded = 0usize;

        for (ordinal, entry) in entries.into_iter().enumerate() {
            tracker.enter(IngestState::Processing {
                spread: ordinal,
                total,
            });

            let (spread, pages) = render_spread(
                Arc::clone(&self.codec),
                entry,
                ordinal,
                next_page,
                self.config.quality,
            )
            .await?;
            next_page += pages.len() as u32;

            let count = pages.len();
            uploaded += upload_pages(self.api.as_ref(), &edition_id, pages, callback).await?;
            debug!(
                "Spread {}/{} '{}' done ({} pages)",
                ordinal + 1,
                total,
                spread.name,
                count
            );

            tracker.percent(estimate.complete_spread());
        }

        // ── Step 4: finalize ─────────────────────────────────────────────
        tracker.enter(IngestState::Finalizing);
        tracker.percent(100);
        tracker.message(STATUS_COMPLETED);

        if self.config.finalize_delay_ms > 0 {
            sleep(Duration::from_millis(self.config.finalize_delay_ms)).await;
        }
        tracker.enter(IngestState::Done);

        let report = IngestReport {
            edition_id,
            spreads: total,
            pages_uploaded: uploaded,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Ingestion complete: edition {} ← {} pages from {} spreads in {}ms",
            report.edition_id, report.pages_uploaded, report.spreads, report.duration_ms
        );
        if let Some(cb) = callback {
            cb.on_ingest_complete(&report);
        }
        Ok(report)
    }

    async fn create(
        &self,
        new_edition: &NewEdition,
        tracker: &mut Tracker<'_>,
    ) -> Result<String, IngestError> {
        tracker.enter(IngestState::CreatingEdition);
        tracker.message(STATUS_CREATING);
        let id = self.api.create_edition(new_edition).await?;
        info!("Created edition {}", id);
        Ok(id)
    }

    async fn read(
        &self,
        archive: &ArchiveUpload,
        tracker: &mut Tracker<'_>,
    ) -> Result<Vec<ArchiveEntry>, IngestError> {
        tracker.enter(IngestState::ReadingArchive);
        tracker.message(STATUS_READING);
        let entries =
            read_archive(Arc::clone(&self.archive_reader), Arc::clone(&archive.data)).await?;
        info!("Archive has {} image entries", entries.len());
        Ok(entries)
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// The "new edition" workflow as an operator experiences it.
///
/// Holds the form, the status of the latest run and the cached edition list.
/// Only one run can be in flight because [`IngestSession::submit`] takes
/// `&mut self`.
pub struct IngestSession {
    ingestor: Ingestor,
    pub form: EditionForm,
    status: RunStatus,
    open: bool,
    editions: Vec<Edition>,
}

impl IngestSession {
    pub fn new(ingestor: Ingestor) -> Self {
        Self {
            ingestor,
            form: EditionForm::default(),
            status: RunStatus::default(),
            open: false,
            editions: Vec::new(),
        }
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close the session.
    ///
    /// A busy status here can only be left over from a `submit` future that
    /// was dropped mid-run, so it is cleared back to idle.
    pub fn close(&mut self) {
        if self.status.state.is_busy() {
            warn!("Closing after an interrupted run ({:?})", self.status.state);
            self.status = RunStatus::default();
        }
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn editions(&self) -> &[Edition] {
        &self.editions
    }

    /// Re-fetch the edition list. A failure is logged and the previous
    /// list kept; it never blocks the session.
    pub async fn refresh(&mut self) -> &[Edition] {
        match self.ingestor.api().list_editions().await {
            Ok(editions) => self.editions = editions,
            Err(e) => warn!("Could not refresh edition list: {}", e),
        }
        &self.editions
    }

    /// Validate the form and run the pipeline.
    ///
    /// On success the session closes, the form and status are cleared and
    /// the edition list is refreshed. On failure everything is left as it
    /// was so the operator can read the error and resubmit.
    pub async fn submit(&mut self) -> Result<IngestReport, IngestError> {
        self.open = true;
        self.status = RunStatus::default();
        let report = self
            .ingestor
            .ingest_tracked(&self.form, &mut self.status)
            .await?;

        self.open = false;
        self.form.reset();
        self.status = RunStatus {
            state: IngestState::Done,
            ..RunStatus::default()
        };
        self.refresh().await;
        Ok(report)
    }
}

// ── Local split ──────────────────────────────────────────────────────────

/// A page written by [`split_to_dir`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPage {
    pub number: u32,
    pub is_cover: bool,
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Split `archive` into page files under `out_dir` without touching the API.
///
/// Uses the same reader, crop rules and encoder as an upload run, so the
/// files are exactly what [`Ingestor::ingest`] would send. Each file is
/// written to a temp file in `out_dir` and renamed into place, on the
/// blocking pool.
pub async fn split_to_dir(
    archive: &ArchiveUpload,
    out_dir: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<Vec<SplitPage>, IngestError> {
    let out_dir = out_dir.as_ref();
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| IngestError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let entries = read_archive(Arc::new(ZipArchiveReader), Arc::clone(&archive.data)).await?;
    let codec: Arc<dyn PageCodec> = Arc::new(RasterCodec);

    let mut written = Vec::new();
    let mut next_page: u32 = 1;
    for (ordinal, entry) in entries.into_iter().enumerate() {
        let (_, pages) =
            render_spread(Arc::clone(&codec), entry, ordinal, next_page, config.quality).await?;
        next_page += pages.len() as u32;

        let dir = out_dir.to_path_buf();
        let batch = tokio::task::spawn_blocking(move || {
            pages
                .iter()
                .map(|page| write_page(&dir, page))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| IngestError::Internal(format!("Page write task panicked: {e}")))??;
        written.extend(batch);
    }

    info!("Split {} pages into {}", written.len(), out_dir.display());
    Ok(written)
}

fn write_page(out_dir: &Path, page: &OutputPage) -> Result<SplitPage, IngestError> {
    let path = out_dir.join(page.file_name());
    let write_err = |e: std::io::Error| IngestError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(out_dir).map_err(write_err)?;
    tmp.write_all(&page.image.data).map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    Ok(SplitPage {
        number: page.number,
        is_cover: page.is_cover,
        source: page.source.clone(),
        width: page.crop.width,
        height: page.crop.height,
        path,
        bytes: page.image.data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EditionForm {
        EditionForm {
            title: "  Spring issue ".into(),
            description: "".into(),
            date: "2024-03-01".into(),
            archive: Some(ArchiveUpload::new("issue.zip", vec![1u8, 2, 3])),
        }
    }

    #[test]
    fn valid_form_builds_payload() {
        let f = form();
        let (edition, archive) = f.validate().unwrap();
        assert_eq!(edition.title, "Spring issue");
        assert_eq!(edition.description, "");
        assert_eq!(edition.date, "2024-03-01");
        assert_eq!(archive.file_name, "issue.zip");
    }

    #[test]
    fn missing_fields_are_listed() {
        let f = EditionForm {
            title: " ".into(),
            ..Default::default()
        };
        let err = f.validate().unwrap_err();
        assert!(err.is_validation());
        let msg = err.to_string();
        assert!(msg.contains("missing: title, date, ZIP archive"), "got: {msg}");
    }

    #[test]
    fn missing_archive_only() {
        let mut f = form();
        f.archive = None;
        let msg = f.validate().unwrap_err().to_string();
        assert!(msg.ends_with("missing: ZIP archive"), "got: {msg}");
    }

    #[test]
    fn bad_date_is_rejected() {
        let mut f = form();
        f.date = "01/03/2024".into();
        let err = f.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut f = form();
        f.reset();
        assert!(f.title.is_empty() && f.date.is_empty() && f.archive.is_none());
    }

    #[test]
    fn busy_states() {
        assert!(!IngestState::Idle.is_busy());
        assert!(IngestState::Processing { spread: 0, total: 1 }.is_busy());
        assert!(IngestState::Finalizing.is_busy());
        assert!(!IngestState::Done.is_busy());
        assert!(!IngestState::Error.is_busy());
    }

    #[test]
    fn tracker_percent_is_monotonic() {
        let mut status = RunStatus::default();
        let mut t = Tracker {
            status: &mut status,
            callback: None,
        };
        t.percent(40);
        t.percent(30);
        assert_eq!(t.status.percent, 40);
        t.percent(250);
        assert_eq!(t.status.percent, 100);
    }

    #[test]
    fn tracker_fail_sets_error_text() {
        let mut status = RunStatus::default();
        let mut t = Tracker {
            status: &mut status,
            callback: None,
        };
        t.fail(&IngestError::EmptyArchive);
        assert_eq!(status.state, IngestState::Error);
        assert!(status.message.starts_with("Error: "));
    }

    #[tokio::test]
    async fn missing_archive_file_is_not_found() {
        let err = ArchiveUpload::from_path("/definitely/not/here.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ArchiveNotFound { .. }));
    }

    #[tokio::test]
    async fn unreadable_archive_path_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveUpload::from_path(dir.path()).await.unwrap_err();
        match err {
            IngestError::ArchiveReadFailed { path, .. } => assert_eq!(path, dir.path()),
            other => panic!("expected ArchiveReadFailed, got {other:?}"),
        }
    }
}
