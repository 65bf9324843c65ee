mod common;

use common::{file_part, text_files_form, TestApp};
use reqwest::multipart::Form;
use reqwest::StatusCode;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Downstream that fails the test on drop if it is ever called.
async fn untouched_downstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    server
}

async fn error_message(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn missing_zzb_file_is_rejected_before_forwarding() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn(&downstream.uri()).await;

    let form = Form::new().part("eth_file", file_part("eth.csv", "text/csv", b"a,b\n"));
    let response = app.post_reconcile(form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("zzb_file"));
}

#[tokio::test]
async fn missing_eth_file_is_rejected_on_download() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn(&downstream.uri()).await;

    let form = Form::new()
        .part("zzb_file", file_part("zzb.csv", "text/csv", b"a,b\n"))
        .text("recon_type", "atm");
    let response = app.post_download(form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("eth_file"));
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn(&downstream.uri()).await;

    let form = Form::new()
        .part("eth_file", file_part("eth.csv", "text/csv", b""))
        .part("zzb_file", file_part("zzb.csv", "text/csv", b"a,b\n"));
    let response = app.post_reconcile(form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("empty"));
}

#[tokio::test]
async fn duplicated_file_part_is_rejected() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn(&downstream.uri()).await;

    let form = text_files_form().part("eth_file", file_part("again.csv", "text/csv", b"x"));
    let response = app.post_reconcile(form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("more than once"));
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn(&downstream.uri()).await;

    let response = app
        .client
        .post(format!("{}/api/v1/reconcile", app.address))
        .header("content-type", "application/json")
        .body(r#"{"eth_file":"x"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn_with(&downstream.uri(), |config| {
        config.max_upload_bytes = 1024;
    })
    .await;

    let form = Form::new()
        .part("eth_file", file_part("eth.csv", "text/csv", &[b'a'; 8 * 1024]))
        .part("zzb_file", file_part("zzb.csv", "text/csv", b"a,b\n"));
    let response = app.post_reconcile(form).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unreachable_downstream_is_bad_gateway() {
    // Nothing listens on the discard port.
    let app = TestApp::spawn("http://127.0.0.1:9").await;

    let response = app.post_reconcile(text_files_form()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(error_message(response).await.starts_with("Bad Gateway"));
}

#[tokio::test]
async fn malformed_query_string_is_rejected_as_json() {
    let downstream = untouched_downstream().await;
    let app = TestApp::spawn(&downstream.uri()).await;

    let response = app
        .client
        .post(format!(
            "{}/api/v1/reconcile?recon_type=atm&recon_type=mpesa",
            app.address
        ))
        .multipart(text_files_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response)
        .await
        .starts_with("Invalid query string"));
}
