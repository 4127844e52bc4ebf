#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use parley::config::Config;
use parley::session::Session;
use parley::settings::Settings;
use parley::transport::HttpTransport;

pub const MULTIBYTE_REPLY: &str = "Grüße 🦀 naïve";

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedUpload {
    pub file_name: Option<String>,
    pub bytes: usize,
    pub api_key: Option<String>,
}

/// What the fake backend has seen.
#[derive(Clone, Default)]
pub struct Backend {
    pub chat_bodies: Arc<Mutex<Vec<Value>>>,
    pub uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
    documents: Arc<AtomicUsize>,
}

impl Backend {
    pub fn chat_bodies(&self) -> Vec<Value> {
        self.chat_bodies.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

fn chunked(chunks: Vec<Vec<u8>>, fail_after: bool, tail_delay: Duration) -> Body {
    let count = chunks.len();
    let items = stream::iter(chunks.into_iter().enumerate()).then(move |(i, chunk)| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if i + 1 == count {
            tokio::time::sleep(tail_delay).await;
        }
        Ok::<_, std::io::Error>(Bytes::from(chunk))
    });
    let failure = stream::iter(fail_after.then(|| {
        Err::<Bytes, _>(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "backend went away"))
    }));
    Body::from_stream(items.chain(failure))
}

/// The reply is chosen by the user message:
/// `fail` answers 500, `split` streams a multi-byte text one byte at a time,
/// `drop` sends `Par` and then breaks the connection, `slow` sends `Par` and
/// stalls. Anything else streams `Hi` and ` there`.
async fn chat(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    let message = body["user_message"].as_str().unwrap_or_default().to_string();
    backend.chat_bodies.lock().unwrap().push(body);

    match message.as_str() {
        "fail" => (StatusCode::INTERNAL_SERVER_ERROR, "model exploded").into_response(),
        "split" => {
            let chunks = MULTIBYTE_REPLY.bytes().map(|b| vec![b]).collect();
            chunked(chunks, false, Duration::ZERO).into_response()
        }
        "drop" => chunked(vec![b"Par".to_vec()], true, Duration::from_millis(50)).into_response(),
        "slow" => chunked(vec![b"Par".to_vec(), b"tial".to_vec()], false, Duration::from_secs(30)).into_response(),
        _ => chunked(vec![b"Hi".to_vec(), b" there".to_vec()], false, Duration::ZERO).into_response(),
    }
}

/// Files whose content contains `corrupt` are rejected.
async fn upload_pdf(State(backend): State<Backend>, mut multipart: Multipart) -> Json<Value> {
    let mut received = ReceivedUpload {
        file_name: None,
        bytes: 0,
        api_key: None,
    };
    let mut corrupt = false;
    let mut slow = false;

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                received.file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.unwrap();
                corrupt = bytes.windows(7).any(|w| w == b"corrupt");
                slow = bytes.windows(4).any(|w| w == b"slow");
                received.bytes = bytes.len();
            }
            "api_key" => received.api_key = Some(field.text().await.unwrap()),
            _ => {}
        }
    }
    backend.uploads.lock().unwrap().push(received);
    if slow {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    if corrupt {
        return Json(json!({ "status": "error", "detail": "could not parse PDF" }));
    }
    let n = backend.documents.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "status": "ok", "document_id": format!("doc{}", n) }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Start the fake backend on an ephemeral port. Returns its base URL.
pub async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/upload_pdf", post(upload_pdf))
        .route("/api/health", get(health))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), backend)
}

pub fn config(endpoint: &str) -> Config {
    Config {
        endpoint: endpoint.to_string(),
        request_timeout_secs: 60,
        ..Config::default()
    }
}

/// A session against `endpoint` with credential `k1` entered.
pub fn session(endpoint: &str) -> Session {
    let config = config(endpoint);
    let transport = HttpTransport::new(&config).unwrap();
    let mut settings = Settings::from_config(&config);
    settings.set_credential("k1");
    Session::new(transport, settings)
}

/// Fail the test instead of hanging.
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("timed out waiting for the client")
}
