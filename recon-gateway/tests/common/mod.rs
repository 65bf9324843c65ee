#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use recon_gateway::config::GatewayConfig;
use recon_gateway::startup::Application;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the gateway on a random port, forwarding to `base_url`.
    pub async fn spawn(base_url: &str) -> Self {
        Self::spawn_with(base_url, |_| {}).await
    }

    pub async fn spawn_with(base_url: &str, customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        let mut config = GatewayConfig::with_base_url(base_url).expect("Invalid base URL");
        config.common.host = "127.0.0.1".to_string();
        config.common.port = 0; // Random port for testing
        customize(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            client: reqwest::Client::new(),
        }
    }

    pub async fn post_reconcile(&self, form: Form) -> reqwest::Response {
        self.client
            .post(format!("{}/api/v1/reconcile", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_download(&self, form: Form) -> reqwest::Response {
        self.client
            .post(format!("{}/api/v1/reconcile/download", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

pub fn file_part(name: &str, content_type: &str, data: &[u8]) -> Part {
    Part::bytes(data.to_vec())
        .file_name(name.to_string())
        .mime_str(content_type)
        .unwrap()
}

/// Form carrying both files as small text uploads.
pub fn text_files_form() -> Form {
    Form::new()
        .part("eth_file", file_part("eth.csv", "text/csv", b"txn,amount\n1,100\n"))
        .part("zzb_file", file_part("zzb.csv", "text/csv", b"txn,amount\n1,100\n"))
}

#[derive(Debug, Clone)]
pub struct CapturedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub request_id: Option<String>,
    pub parts: Vec<CapturedPart>,
}

impl CapturedRequest {
    pub fn part(&self, name: &str) -> Option<&CapturedPart> {
        self.parts.iter().find(|p| p.name == name)
    }
}

type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

/// Stand-in reconciliation service that records every multipart part it
/// receives and answers `200 ok`.
pub struct CaptureServer {
    pub base_url: String,
    requests: Captured,
}

impl CaptureServer {
    pub async fn spawn() -> Self {
        let requests: Captured = Arc::default();

        let app = Router::new()
            .route("/reconcile", post(capture))
            .route("/reconcile/download", post(capture))
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

async fn capture(
    State(requests): State<Captured>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> &'static str {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(CapturedPart {
            name,
            file_name,
            content_type,
            data,
        });
    }

    requests.lock().await.push(CapturedRequest {
        path: uri.path().to_string(),
        request_id: headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        parts,
    });

    "ok"
}
