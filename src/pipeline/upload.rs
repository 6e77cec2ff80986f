//! Upload sequencing: push pages to the API strictly one at a time.
//!
//! Written as a fold over the ordered page list rather than a bounded
//! parallel dispatch. The server associates pages by number, and a serial
//! fold makes "page N is stored before page N+1 is sent" hold by
//! construction. `try_fold` also gives the abort rule for free: the first
//! `Err` ends the fold and later pages are never sent.

use crate::api::EditionsApi;
use crate::error::IngestError;
use crate::model::OutputPage;
use crate::progress::ProgressCallback;
use futures::stream::{self, TryStreamExt};
use tracing::debug;

/// Upload `pages` in order. Returns the number uploaded.
///
/// Stops at the first failure; pages after it are never attempted.
pub async fn upload_pages(
    api: &dyn EditionsApi,
    edition_id: &str,
    pages: Vec<OutputPage>,
    progress: Option<&ProgressCallback>,
) -> Result<usize, IngestError> {
    stream::iter(pages.into_iter().map(Ok::<_, IngestError>))
        .try_fold(0usize, move |uploaded, page| async move {
            api.upload_page(edition_id, &page).await?;
            debug!(
                "Uploaded page {}{} ({} bytes)",
                page.number,
                if page.is_cover { " [cover]" } else { "" },
                page.image.data.len()
            );
            if let Some(cb) = progress {
                cb.on_page_uploaded(page.number, page.is_cover);
            }
            Ok::<_, IngestError>(uploaded + 1)
        })
        .await
}
