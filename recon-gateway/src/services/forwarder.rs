//! Client for the downstream reconciliation service.
//!
//! Every call is a single multipart POST. Nothing is retried and the
//! response is handed back exactly as received.

use crate::config::ReconciliationServiceConfig;
use crate::models::upload::{
    ReconcileUpload, UploadedFile, ETH_FILE_FIELD, RECON_TYPE_FIELD, ZZB_FILE_FIELD,
};
use crate::services::metrics::{record_error, record_forward};
use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use reqwest::multipart::{Form, Part};
use service_core::error::AppError;
use service_core::observability::inject_trace_headers;
use std::time::Instant;
use thiserror::Error;

const DEFAULT_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// Downstream operations the gateway can relay to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileEndpoint {
    Reconcile,
    Download,
}

impl ReconcileEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            ReconcileEndpoint::Reconcile => "/reconcile",
            ReconcileEndpoint::Download => "/reconcile/download",
        }
    }

    /// Metric and log label.
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileEndpoint::Reconcile => "reconcile",
            ReconcileEndpoint::Download => "download",
        }
    }
}

/// Raw downstream answer.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DownstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("could not connect to reconciliation service at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reconciliation service at {url} timed out: {source}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to reconciliation service at {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read reconciliation service response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid content type for part {field}: {source}")]
    InvalidPart {
        field: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ForwardError {
    fn from_send(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_string();
        if source.is_timeout() {
            ForwardError::Timeout { url, source }
        } else if source.is_connect() {
            ForwardError::Connect { url, source }
        } else {
            ForwardError::Transport { url, source }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Connect { .. } => "downstream_connect",
            ForwardError::Timeout { .. } => "downstream_timeout",
            ForwardError::Transport { .. } => "downstream_transport",
            ForwardError::Body { .. } => "downstream_body",
            ForwardError::InvalidPart { .. } => "invalid_part",
        }
    }
}

impl From<ForwardError> for AppError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Timeout { .. } => AppError::GatewayTimeout(err.to_string()),
            ForwardError::InvalidPart { .. } => AppError::BadRequest(anyhow::Error::new(err)),
            ForwardError::Connect { .. }
            | ForwardError::Transport { .. }
            | ForwardError::Body { .. } => AppError::BadGateway(err.to_string()),
        }
    }
}

/// Relays uploads to `<base_url>/reconcile` and `<base_url>/reconcile/download`.
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
}

impl Forwarder {
    pub fn new(config: &ReconciliationServiceConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        tracing::info!(base_url = %config.url, "Reconciliation service client configured");

        Ok(Self {
            client,
            base_url: config.url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: ReconcileEndpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// POST `upload` to `endpoint`. Non-2xx statuses are a successful relay;
    /// only transport failures are errors.
    #[tracing::instrument(
        skip_all,
        fields(
            endpoint = endpoint.as_str(),
            eth_size = upload.eth_file.len(),
            zzb_size = upload.zzb_file.len(),
            recon_type = upload.recon_type.as_ref().map(|t| t.as_str()).unwrap_or("-"),
        )
    )]
    pub async fn forward(
        &self,
        endpoint: ReconcileEndpoint,
        upload: &ReconcileUpload,
        request_id: Option<&str>,
    ) -> Result<DownstreamResponse, ForwardError> {
        let url = self.url_for(endpoint);
        let form = build_form(upload)?;

        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, request_id);

        let start = Instant::now();
        let result = self.send(&url, headers, form).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(response) => {
                record_forward(endpoint.as_str(), response.status.as_u16(), elapsed);
                tracing::info!(
                    url = %url,
                    status = %response.status,
                    size = response.body.len(),
                    elapsed_secs = elapsed,
                    "Reconciliation service responded"
                );
            }
            Err(e) => {
                record_error(e.kind());
                tracing::error!(url = %url, error = %e, "Forwarding to reconciliation service failed");
            }
        }

        result
    }

    async fn send(
        &self,
        url: &str,
        headers: HeaderMap,
        form: Form,
    ) -> Result<DownstreamResponse, ForwardError> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ForwardError::from_send(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|source| ForwardError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(DownstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Multipart body with the fixed field names the reconciliation service
/// expects. `recon_type` is left out when absent.
pub fn build_form(upload: &ReconcileUpload) -> Result<Form, ForwardError> {
    let mut form = Form::new()
        .part(ETH_FILE_FIELD, file_part(ETH_FILE_FIELD, &upload.eth_file)?)
        .part(ZZB_FILE_FIELD, file_part(ZZB_FILE_FIELD, &upload.zzb_file)?);

    if let Some(recon_type) = &upload.recon_type {
        form = form.text(RECON_TYPE_FIELD, recon_type.as_str().to_string());
    }

    Ok(form)
}

fn file_part(field: &'static str, file: &UploadedFile) -> Result<Part, ForwardError> {
    let file_name = file
        .file_name
        .clone()
        .unwrap_or_else(|| field.to_string());
    let content_type = file
        .content_type
        .as_deref()
        .unwrap_or(DEFAULT_PART_CONTENT_TYPE);

    Part::stream_with_length(file.data.clone(), file.data.len() as u64)
        .file_name(file_name)
        .mime_str(content_type)
        .map_err(|source| ForwardError::InvalidPart { field, source })
}
