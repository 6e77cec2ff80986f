//! Client for the publishing API's edition and auth endpoints.
//!
//! The pipeline only talks to the API through the [`EditionsApi`] trait, so
//! tests (and anyone embedding the library) can substitute an in-memory
//! implementation. [`HttpEditionsApi`] is the real one, built on reqwest.
//!
//! ## Response handling
//!
//! Every endpoint answers with `{success, message?, data?, error?}`. A call
//! counts as failed when the transport fails, the status is not 2xx, or the
//! envelope says `success: false`. The error text is the envelope's `error`,
//! then its `message`, then the bare HTTP status, so whatever the server
//! says reaches the operator unchanged.
//!
//! A 401 from any endpoint becomes [`IngestError::Unauthorized`] so the CLI
//! can tell the operator to log in again.

use crate::config::ApiConfig;
use crate::error::IngestError;
use crate::model::{
    ApiEnvelope, CreatedEdition, Edition, LoginSession, NewEdition, OutputPage, PageRecord,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// The edition operations the pipeline and CLI rely on.
#[async_trait]
pub trait EditionsApi: Send + Sync {
    /// `POST /api/admin/editions` → the new edition's id.
    async fn create_edition(&self, edition: &NewEdition) -> Result<String, IngestError>;

    /// `POST /api/admin/editions/{id}/pages` as multipart
    /// (`file`, `pageNumber`, `isCover`).
    async fn upload_page(&self, edition_id: &str, page: &OutputPage) -> Result<(), IngestError>;

    /// `GET /api/admin/editions`.
    async fn list_editions(&self) -> Result<Vec<Edition>, IngestError>;

    /// `GET /api/admin/editions/{id}/pages`.
    async fn list_pages(&self, edition_id: &str) -> Result<Vec<PageRecord>, IngestError>;

    /// `DELETE /api/admin/editions/{id}`. The server removes the pages too.
    async fn delete_edition(&self, edition_id: &str) -> Result<(), IngestError>;
}

/// [`EditionsApi`] over HTTP.
#[derive(Clone)]
pub struct HttpEditionsApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl fmt::Debug for HttpEditionsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEditionsApi")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpEditionsApi {
    pub fn new(config: &ApiConfig) -> Result<Self, IngestError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| IngestError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(IngestError::InvalidConfig(format!(
                "API URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the API to email a one-time login link to `email`.
    pub async fn request_magic_link(&self, email: &str) -> Result<String, IngestError> {
        let rb = self
            .request(Method::POST, "/api/auth/magic-link/request")
            .json(&serde_json::json!({ "email": email }));
        let envelope = self.send::<serde_json::Value>(rb).await?;
        Ok(envelope
            .message
            .unwrap_or_else(|| format!("Login link sent to {email}")))
    }

    /// Exchange the token from a login link for a bearer session.
    pub async fn verify_magic_link(&self, token: &str) -> Result<LoginSession, IngestError> {
        let rb = self
            .request(Method::GET, "/api/auth/magic-link/verify")
            .query(&[("token", token)]);
        let session: LoginSession = require_data(self.send(rb).await?)?;
        info!("Verified login for {}", session.user.email);
        Ok(session)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Send `rb` and unwrap the envelope, mapping every failure mode to
    /// [`IngestError`]. An empty 2xx body yields an empty envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, IngestError> {
        let response = rb.send().await.map_err(|e| IngestError::api(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| IngestError::api(format!("Failed to read response: {e}")))?;
        debug!("API responded {} ({} bytes)", status, body.len());

        if status == StatusCode::UNAUTHORIZED {
            return Err(IngestError::Unauthorized {
                detail: envelope_reason(&body).unwrap_or_else(|| "session expired".to_string()),
            });
        }

        if !status.is_success() {
            return Err(IngestError::Api {
                status: Some(status.as_u16()),
                message: envelope_reason(&body).unwrap_or_else(|| format!("HTTP {status}")),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ApiEnvelope {
                success: true,
                message: None,
                data: None,
                error: None,
            });
        }

        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body).map_err(|e| IngestError::Api {
            status: Some(status.as_u16()),
            message: format!("Malformed API response: {e}"),
        })?;

        if !envelope.success {
            return Err(IngestError::Api {
                status: Some(status.as_u16()),
                message: envelope
                    .reason()
                    .unwrap_or("The API rejected the request")
                    .to_string(),
            });
        }

        Ok(envelope)
    }
}

#[async_trait]
impl EditionsApi for HttpEditionsApi {
    async fn create_edition(&self, edition: &NewEdition) -> Result<String, IngestError> {
        info!("Creating edition '{}' ({})", edition.title, edition.date);
        let rb = self.request(Method::POST, "/api/admin/editions").json(edition);
        let created: CreatedEdition = require_data(self.send(rb).await?)?;
        Ok(created.id)
    }

    async fn upload_page(&self, edition_id: &str, page: &OutputPage) -> Result<(), IngestError> {
        let part = Part::bytes(page.image.data.clone())
            .file_name(page.file_name())
            .mime_str(page.image.mime_type)
            .map_err(|e| IngestError::Internal(format!("Invalid MIME type: {e}")))?;

        let form = Form::new()
            .part("file", part)
            .text("pageNumber", page.number.to_string())
            .text("isCover", if page.is_cover { "true" } else { "false" });

        let rb = self
            .request(Method::POST, &format!("/api/admin/editions/{edition_id}/pages"))
            .multipart(form);
        self.send::<serde_json::Value>(rb).await?;
        Ok(())
    }

    async fn list_editions(&self) -> Result<Vec<Edition>, IngestError> {
        let rb = self.request(Method::GET, "/api/admin/editions");
        require_data(self.send(rb).await?)
    }

    async fn list_pages(&self, edition_id: &str) -> Result<Vec<PageRecord>, IngestError> {
        let rb = self.request(Method::GET, &format!("/api/admin/editions/{edition_id}/pages"));
        let envelope = self.send::<Vec<PageRecord>>(rb).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn delete_edition(&self, edition_id: &str) -> Result<(), IngestError> {
        info!("Deleting edition {}", edition_id);
        let rb = self.request(Method::DELETE, &format!("/api/admin/editions/{edition_id}"));
        self.send::<serde_json::Value>(rb).await?;
        Ok(())
    }
}

/// `data` of a successful envelope, or an API error when it is missing.
fn require_data<T>(envelope: ApiEnvelope<T>) -> Result<T, IngestError> {
    let reason = envelope.reason().map(str::to_string);
    envelope.data.ok_or_else(|| {
        IngestError::api(reason.unwrap_or_else(|| "The API response carried no data".to_string()))
    })
}

/// Best-effort reason from an error body that may or may not be an envelope.
fn envelope_reason(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|env| env.reason().map(str::to_string))
}
