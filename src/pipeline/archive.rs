//! Archive reading: ZIP bytes → ordered list of image entries.
//!
//! The archive's own entry order means nothing; spreads are ordered purely by
//! a lexicographic sort of entry names. Operators name files `01.png`,
//! `02.png`, … so that the sort matches the reading order.
//!
//! Decompression is CPU-bound and the `zip` crate is synchronous, so
//! [`read_archive`] runs the reader on the blocking pool.

use crate::error::IngestError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;

/// A single image file pulled out of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full entry name inside the archive, including any folders.
    pub name: String,
    pub data: Vec<u8>,
}

/// Decompresses an archive into its image entries.
///
/// Implementations must return only qualifying image entries (see
/// [`is_image_name`]), sorted by name, and must fail with
/// [`IngestError::EmptyArchive`] when none qualify.
pub trait ArchiveReader: Send + Sync {
    fn read_images(&self, bytes: &[u8]) -> Result<Vec<ArchiveEntry>, IngestError>;
}

/// [`ArchiveReader`] backed by the `zip` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveReader;

impl ArchiveReader for ZipArchiveReader {
    fn read_images(&self, bytes: &[u8]) -> Result<Vec<ArchiveEntry>, IngestError> {
        let mut zip =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| IngestError::InvalidArchive {
                detail: e.to_string(),
            })?;

        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(|e| IngestError::InvalidArchive {
                detail: format!("entry {i}: {e}"),
            })?;

            if file.is_dir() || !is_image_name(file.name()) {
                continue;
            }

            let name = file.name().to_string();
            let mut data = Vec::with_capacity(prealloc_hint(file.size()));
            file.read_to_end(&mut data).map_err(|e| IngestError::InvalidArchive {
                detail: format!("{name}: {e}"),
            })?;

            debug!("Archive entry {} ({} bytes)", name, data.len());
            entries.push(ArchiveEntry { name, data });
        }

        sort_entries(&mut entries);

        if entries.is_empty() {
            return Err(IngestError::EmptyArchive);
        }
        Ok(entries)
    }
}

static RE_IMAGE_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(png|jpg|jpeg)$").unwrap());

/// `true` when `name` ends in `.png`, `.jpg` or `.jpeg` (any case).
pub fn is_image_name(name: &str) -> bool {
    RE_IMAGE_EXT.is_match(name)
}

/// Largest buffer reserved up front for one entry. The declared size comes
/// from the archive header and is not trusted beyond this.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

fn prealloc_hint(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOC) as usize
}

/// Ascending lexicographic order by full entry name.
pub fn sort_entries(entries: &mut [ArchiveEntry]) {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Run `reader` over `bytes` on the blocking thread pool.
pub async fn read_archive(
    reader: Arc<dyn ArchiveReader>,
    bytes: Arc<[u8]>,
) -> Result<Vec<ArchiveEntry>, IngestError> {
    tokio::task::spawn_blocking(move || reader.read_images(&bytes))
        .await
        .map_err(|e| IngestError::Internal(format!("Archive task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(files: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            let opts = SimpleFileOptions::default();
            for d in dirs {
                zip.add_directory(*d, opts).unwrap();
            }
            for (name, data) in files {
                zip.start_file(*name, opts).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn image_name_matching() {
        assert!(is_image_name("01.png"));
        assert!(is_image_name("scans/02.JPG"));
        assert!(is_image_name("a.Jpeg"));
        assert!(!is_image_name("notes.txt"));
        assert!(!is_image_name("cover.png.bak"));
        assert!(!is_image_name("png"));
        assert!(!is_image_name("spread.webp"));
    }

    #[test]
    fn filters_and_sorts_entries() {
        let bytes = build_zip(
            &[
                ("03.png", b"c"),
                ("readme.txt", b"x"),
                ("01.png", b"a"),
                ("02.JPG", b"b"),
            ],
            &["scans/"],
        );
        let entries = ZipArchiveReader.read_images(&bytes).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["01.png", "02.JPG", "03.png"]);
        assert_eq!(entries[0].data, b"a");
    }

    #[test]
    fn sort_is_lexicographic_not_numeric() {
        let bytes = build_zip(&[("10.png", b"x"), ("2.png", b"y"), ("1.png", b"z")], &[]);
        let entries = ZipArchiveReader.read_images(&bytes).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["1.png", "10.png", "2.png"]);
    }

    #[test]
    fn no_images_is_empty_archive() {
        let bytes = build_zip(&[("readme.txt", b"hello")], &["pages/"]);
        let err = ZipArchiveReader.read_images(&bytes).unwrap_err();
        assert!(matches!(err, IngestError::EmptyArchive), "got: {err:?}");
    }

    #[test]
    fn garbage_is_invalid_archive() {
        let err = ZipArchiveReader
            .read_images(b"definitely not a zip file")
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidArchive { .. }), "got: {err:?}");
    }

    #[test]
    fn declared_size_is_capped_for_preallocation() {
        assert_eq!(prealloc_hint(1024), 1024);
        assert_eq!(prealloc_hint(u64::MAX), MAX_PREALLOC as usize);
    }

    #[tokio::test]
    async fn read_archive_runs_off_thread() {
        let bytes = build_zip(&[("01.png", b"a")], &[]);
        let entries = read_archive(Arc::new(ZipArchiveReader), bytes.into())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }
}
