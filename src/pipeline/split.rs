//! Spread splitting: one scanned double page → one or two single pages.
//!
//! The rule depends only on the spread's position in archive order:
//!
//! ```text
//! ordinal 0          ordinal ≥ 1
//! ┌──────┬──────┐    ┌──────┬──────┐
//! │ cover│ (drop│    │ left │ right│
//! │  p1  │  ped)│    │  pN  │ pN+1 │
//! └──────┴──────┘    └──────┴──────┘
//! ```
//!
//! `halfWidth = floor(width / 2)`; the right half takes `width - halfWidth`
//! so odd widths never lose or duplicate a column. Crops always keep the full
//! height.

use crate::error::IngestError;
use crate::model::{Crop, OutputPage, SourceSpread};
use crate::pipeline::archive::ArchiveEntry;
use crate::pipeline::encode::{encode_page, PageCodec};
use std::sync::Arc;
use tracing::debug;

/// Crops to cut from a `width × height` spread at position `ordinal`.
pub fn plan_crops(ordinal: usize, width: u32, height: u32) -> Vec<Crop> {
    let half_width = width / 2;
    let left = Crop {
        x: 0,
        width: half_width,
        height,
        is_cover: ordinal == 0,
    };

    if ordinal == 0 {
        return vec![left];
    }

    let right = Crop {
        x: half_width,
        width: width - half_width,
        height,
        is_cover: false,
    };
    vec![left, right]
}

/// Decode, crop and encode one spread.
///
/// Pages are numbered consecutively starting at `first_page`.
pub fn split_spread(
    codec: &dyn PageCodec,
    entry: &ArchiveEntry,
    ordinal: usize,
    first_page: u32,
    quality: u8,
) -> Result<(SourceSpread, Vec<OutputPage>), IngestError> {
    let image = codec.decode(&entry.data).map_err(|e| IngestError::Decode {
        name: entry.name.clone(),
        detail: e.to_string(),
    })?;

    let spread = SourceSpread {
        ordinal,
        name: entry.name.clone(),
        width: image.width(),
        height: image.height(),
    };
    debug!(
        "Spread {} '{}' → {}x{} px",
        ordinal, spread.name, spread.width, spread.height
    );

    let pages = plan_crops(ordinal, spread.width, spread.height)
        .into_iter()
        .zip(first_page..)
        .map(|(crop, number)| {
            let region = image.crop_imm(crop.x, 0, crop.width, crop.height);
            encode_page(codec, &region, crop, number, &entry.name, quality)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((spread, pages))
}

/// [`split_spread`] on the blocking thread pool.
///
/// Decoding a full-resolution scan and encoding two halves is CPU-heavy;
/// keeping it off the async workers keeps the status line responsive.
pub async fn render_spread(
    codec: Arc<dyn PageCodec>,
    entry: ArchiveEntry,
    ordinal: usize,
    first_page: u32,
    quality: u8,
) -> Result<(SourceSpread, Vec<OutputPage>), IngestError> {
    tokio::task::spawn_blocking(move || {
        split_spread(codec.as_ref(), &entry, ordinal, first_page, quality)
    })
    .await
    .map_err(|e| IngestError::Internal(format!("Split task panicked: {}", e)))?
}
