use crate::models::{ReconcileQuery, ReconcileUpload};
use crate::services::metrics::record_error;
use crate::services::{DownstreamResponse, ReconcileEndpoint};
use crate::AppState;
use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State,
    },
    http::{header, HeaderName, HeaderValue},
    response::Response,
    Extension,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /api/v1/reconcile`
///
/// Relays the upload to `<base>/reconcile` and returns the downstream body
/// and status untouched.
pub async fn reconcile(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<ReconcileQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let downstream = relay(
        &state,
        ReconcileEndpoint::Reconcile,
        request_id,
        query,
        multipart,
    )
    .await?;

    Ok(into_response(downstream, TEXT_CONTENT_TYPE, &[]))
}

/// `POST /api/v1/reconcile/download`
///
/// Same as [`reconcile`] but the payload is a binary report; the downstream
/// `Content-Disposition` is kept so the browser saves it under its filename.
pub async fn reconcile_download(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<ReconcileQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let downstream = relay(
        &state,
        ReconcileEndpoint::Download,
        request_id,
        query,
        multipart,
    )
    .await?;

    Ok(into_response(
        downstream,
        BINARY_CONTENT_TYPE,
        &[header::CONTENT_DISPOSITION],
    ))
}

async fn relay(
    state: &AppState,
    endpoint: ReconcileEndpoint,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<ReconcileQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<DownstreamResponse, AppError> {
    let Query(query) = query.map_err(|rejection| {
        record_error("invalid_query");
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid query string: {}",
            rejection.body_text()
        ))
    })?;

    let multipart = multipart.map_err(|rejection| {
        record_error("invalid_multipart");
        AppError::BadRequest(anyhow::anyhow!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    })?;

    let upload = ReconcileUpload::from_multipart(multipart, &query)
        .await
        .map_err(|e| {
            record_error("invalid_upload");
            tracing::warn!(endpoint = endpoint.as_str(), error = %e, "Rejected reconcile upload");
            e
        })?;

    let request_id = request_id.map(|Extension(id)| id);
    let downstream = state
        .forwarder
        .forward(
            endpoint,
            &upload,
            request_id.as_ref().map(RequestId::as_str),
        )
        .await?;

    if !downstream.status.is_success() {
        tracing::warn!(
            endpoint = endpoint.as_str(),
            status = %downstream.status,
            "Reconciliation service returned an error, relaying as-is"
        );
    }

    Ok(downstream)
}

/// Status and body pass through unchanged. The downstream content type wins
/// over `default_content_type`; `relayed` names extra headers to copy.
fn into_response(
    downstream: DownstreamResponse,
    default_content_type: &'static str,
    relayed: &[HeaderName],
) -> Response {
    let content_type = downstream
        .headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(default_content_type));

    let mut response = Response::new(Body::from(downstream.body));
    *response.status_mut() = downstream.status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    for name in relayed {
        if let Some(value) = downstream.headers.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    response
}
