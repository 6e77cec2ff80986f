//! Domain types: API records, the response envelope, and the transient
//! values that flow through the ingestion pipeline.
//!
//! Wire field names follow the publishing API (`titulo`, `fecha`,
//! `imagen_url`, …); the Rust field names are plain English and mapped with
//! `#[serde(rename)]`.

use serde::{Deserialize, Serialize};

// ── API records ──────────────────────────────────────────────────────────

/// An edition as returned by `GET /api/admin/editions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edition {
    pub id: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(rename = "fecha", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Sent as `0`/`1` by the API.
    #[serde(rename = "publicada", default, with = "int_flag")]
    pub published: bool,
    #[serde(default)]
    pub created_at: String,
}

/// Payload for `POST /api/admin/editions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEdition {
    #[serde(rename = "titulo")]
    pub title: String,
    /// Empty string when the operator left it blank.
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fecha")]
    pub date: String,
}

/// `data` of a successful create call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedEdition {
    pub id: String,
}

/// A stored page as returned by `GET /api/admin/editions/{id}/pages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    #[serde(rename = "imagen_url")]
    pub image_url: String,
    #[serde(rename = "numero")]
    pub number: u32,
}

/// The admin user attached to a verified login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `data` of a verified magic link: the bearer token and who it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    pub token: String,
    pub user: AdminUser,
}

/// The `{success, message?, data?, error?}` wrapper around every response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// The most specific human-readable reason the server gave, if any.
    pub fn reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

fn default_true() -> bool {
    true
}

mod int_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Bool(bool),
    }

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(d)? {
            Raw::Int(n) => n != 0,
            Raw::Bool(b) => b,
        })
    }
}

// ── Pipeline values ──────────────────────────────────────────────────────

/// One decoded image from the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpread {
    /// Position in archive-sort order (0 = cover spread).
    pub ordinal: usize,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// A full-height vertical strip of a source spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Crop {
    pub x: u32,
    pub width: u32,
    pub height: u32,
    pub is_cover: bool,
}

/// An encoded raster payload plus the metadata needed to upload it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// A single page ready for upload.
#[derive(Debug, Clone)]
pub struct OutputPage {
    /// 1-based, sequential across the whole edition.
    pub number: u32,
    pub is_cover: bool,
    /// Archive entry the page was cut from.
    pub source: String,
    pub crop: Crop,
    pub image: EncodedImage,
}

impl OutputPage {
    /// File name used for the multipart `file` field and for local splits.
    pub fn file_name(&self) -> String {
        format!("page_{}.{}", self.number, self.image.extension)
    }
}
