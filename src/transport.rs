use std::fmt;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::RequestError;

pub const CHAT_PATH: &str = "/api/chat";
pub const UPLOAD_PATH: &str = "/api/upload_pdf";
pub const HEALTH_PATH: &str = "/api/health";

/// Ordered raw body chunks of one chat response.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, RequestError>>;

/// API key supplied by the user. Never logged, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl Serialize for Credential {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Body of a chat request, built fresh for every submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    #[serde(rename = "developer_message")]
    pub developer_prompt: String,
    pub user_message: String,
    pub model: String,
    #[serde(rename = "api_key")]
    pub credential: Credential,
    #[serde(rename = "document_id")]
    pub document_ref: Option<String>,
}

impl ChatRequest {
    fn validate(&self) -> Result<(), RequestError> {
        if self.user_message.trim().is_empty() {
            return Err(RequestError::InvalidRequest("user message is empty"));
        }
        if self.credential.expose().trim().is_empty() {
            return Err(RequestError::InvalidRequest("credential is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// HTTP client for the chat backend.
#[derive(Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send a chat request and hand back its body as a chunk stream.
    ///
    /// A non-success status fails here, before any chunk exists.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChunkStream, RequestError> {
        request.validate()?;

        let response = self
            .client
            .post(self.url(CHAT_PATH))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "chat endpoint responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(RequestError::from));
        Ok(chunks.boxed())
    }

    /// Probe the backend health endpoint.
    pub async fn health(&self) -> bool {
        let response = match self.client.get(self.url(HEALTH_PATH)).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "health probe failed");
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "health probe returned non-success");
            return false;
        }

        match response.json::<HealthResponse>().await {
            Ok(body) => body.status == "ok",
            Err(err) => {
                warn!(error = %err, "health probe returned an unexpected body");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(document_ref: Option<&str>) -> ChatRequest {
        ChatRequest {
            developer_prompt: "You are a helpful AI assistant.".to_string(),
            user_message: "Hello".to_string(),
            model: "gpt-4.1-mini".to_string(),
            credential: Credential::new("k1").unwrap(),
            document_ref: document_ref.map(str::to_string),
        }
    }

    #[test]
    fn request_serializes_to_wire_field_names() {
        let body = serde_json::to_value(request(Some("doc1"))).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "developer_message": "You are a helpful AI assistant.",
                "user_message": "Hello",
                "model": "gpt-4.1-mini",
                "api_key": "k1",
                "document_id": "doc1",
            })
        );
    }

    #[test]
    fn missing_document_serializes_as_null() {
        let body = serde_json::to_value(request(None)).unwrap();
        assert_eq!(body["document_id"], serde_json::Value::Null);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let rendered = format!("{:?}", request(None));
        assert!(!rendered.contains("k1"));
        assert!(rendered.contains("Credential(***)"));
    }

    #[test]
    fn blank_credential_is_rejected() {
        assert!(Credential::new("   ").is_none());
        assert!(Credential::new("").is_none());
    }

    #[test]
    fn empty_message_fails_validation() {
        let mut req = request(None);
        req.user_message = "  ".to_string();
        assert!(matches!(req.validate(), Err(RequestError::InvalidRequest(_))));
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let config = Config {
            endpoint: "http://localhost:8000/".to_string(),
            ..Config::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url(CHAT_PATH), "http://localhost:8000/api/chat");
    }
}
