use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use serde::Deserialize;
use service_core::error::AppError;

pub const ETH_FILE_FIELD: &str = "eth_file";
pub const ZZB_FILE_FIELD: &str = "zzb_file";
pub const RECON_TYPE_FIELD: &str = "recon_type";

/// An uploaded file, relayed byte for byte.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reconciliation type tag (`atm`, `tele`, `mpesa`, ...). Opaque to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconType(String);

impl ReconType {
    /// An empty value means "not selected" and yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    pub recon_type: Option<String>,
}

/// Validated inbound form for both reconcile endpoints.
#[derive(Debug, Clone)]
pub struct ReconcileUpload {
    pub eth_file: UploadedFile,
    pub zzb_file: UploadedFile,
    pub recon_type: Option<ReconType>,
}

impl ReconcileUpload {
    /// Drain the multipart body and check that both files are present and
    /// non-empty. A `recon_type` form field, even an empty one, takes
    /// precedence over the query parameter. Unknown fields are skipped.
    pub async fn from_multipart(
        mut multipart: Multipart,
        query: &ReconcileQuery,
    ) -> Result<Self, AppError> {
        let mut eth_file = None;
        let mut zzb_file = None;
        let mut form_recon_type: Option<Option<ReconType>> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                ETH_FILE_FIELD => read_file(&mut eth_file, ETH_FILE_FIELD, field).await?,
                ZZB_FILE_FIELD => read_file(&mut zzb_file, ZZB_FILE_FIELD, field).await?,
                RECON_TYPE_FIELD => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form_recon_type = Some(ReconType::parse(&value));
                }
                other => {
                    tracing::debug!(field = %other, "Ignoring unexpected multipart field");
                }
            }
        }

        let recon_type = match form_recon_type {
            Some(from_form) => from_form,
            None => query.recon_type.as_deref().and_then(ReconType::parse),
        };

        Ok(Self {
            eth_file: eth_file.ok_or_else(|| missing(ETH_FILE_FIELD))?,
            zzb_file: zzb_file.ok_or_else(|| missing(ZZB_FILE_FIELD))?,
            recon_type,
        })
    }
}

async fn read_file(
    slot: &mut Option<UploadedFile>,
    field_name: &'static str,
    field: Field<'_>,
) -> Result<(), AppError> {
    if slot.is_some() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File part {} was supplied more than once",
            field_name
        )));
    }

    let file_name = field.file_name().map(|s| s.to_string());
    let content_type = field.content_type().map(|s| s.to_string());
    let data = field.bytes().await.map_err(multipart_error)?;

    if data.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File part {} is empty",
            field_name
        )));
    }

    *slot = Some(UploadedFile {
        file_name,
        content_type,
        data,
    });
    Ok(())
}

fn missing(field_name: &str) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Missing required file part: {}", field_name))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(anyhow::anyhow!(
            "Failed to read multipart body: {}",
            err.body_text()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recon_type_is_absent() {
        assert_eq!(ReconType::parse(""), None);
    }

    #[test]
    fn recon_type_is_kept_verbatim() {
        let recon_type = ReconType::parse(" Tele-Incoming ").unwrap();
        assert_eq!(recon_type.as_str(), " Tele-Incoming ");
    }
}
