use crate::error::{AccountingError, Result};
use crate::llm::types::*;
use log::debug;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A service able to answer a classification prompt under a given model.
///
/// [`GeminiClient`] talks to the real API; tests substitute a scripted
/// implementation.
pub trait ModelBackend {
    /// Returns the raw text the model produced. Non-success responses are
    /// errors carrying the service's own message.
    fn generate(
        &self,
        api_key: &str,
        candidate: &ModelCandidate,
        request: &GenerateContentRequest,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Names of models the key can currently reach.
    fn list_models(&self, api_key: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Client whose every request is bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        candidate: &ModelCandidate,
        request: &GenerateContentRequest,
    ) -> Result<String> {
        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, candidate.api_version, candidate.model
        );

        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
            .map_err(http_error)?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(AccountingError::Api {
                model: candidate.to_string(),
                message: api_error_message(status.as_u16(), &err_text),
            });
        }

        let body: GenerateContentResponse = res.json().await.map_err(http_error)?;
        Ok(body.first_text())
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/v1beta/models", self.base_url);
        let res = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(http_error)?;

        if !res.status().is_success() {
            debug!("Model listing returned status {}", res.status());
            return Ok(Vec::new());
        }

        let body: ListModelsResponse = res.json().await.map_err(http_error)?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

/// The service's own `error.message` from a non-success body, or a generic
/// status line when the body carries none.
pub fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("API returned {}", status))
}

// Request URLs never end up in error text.
fn http_error(e: reqwest::Error) -> AccountingError {
    AccountingError::Http(e.without_url())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const KEY: &str = "SECRET-KEY-123";

    /// Serves a single canned HTTP response and hands back the raw request.
    async fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn request() -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::text("Paid rent")],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 500,
            },
        }
    }

    #[test]
    fn test_error_message_taken_from_body() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(api_error_message(429, body), "Quota exceeded");
    }

    #[test]
    fn test_error_message_falls_back_to_status() {
        assert_eq!(api_error_message(502, "<html>Bad Gateway</html>"), "API returned 502");
        assert_eq!(api_error_message(404, r#"{"error":{"code":404}}"#), "API returned 404");
        assert_eq!(api_error_message(500, ""), "API returned 500");
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_reveal_key() {
        let client = GeminiClient::new().with_base_url("http://127.0.0.1:9");
        let candidate = ModelCandidate::new("v1beta", "gemini-2.5-flash");

        let err = client.generate(KEY, &candidate, &request()).await.unwrap_err();
        assert!(!err.to_string().contains(KEY), "{}", err);

        let err = client.list_models(KEY).await.unwrap_err();
        assert!(!err.to_string().contains(KEY), "{}", err);
    }

    #[tokio::test]
    async fn test_key_travels_in_header() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{}"}]}}]}"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let client = GeminiClient::new().with_base_url(base_url);
        let candidate = ModelCandidate::new("v1beta", "gemini-2.5-flash");

        let text = client.generate(KEY, &candidate, &request()).await.unwrap();
        assert_eq!(text, "{}");

        let raw = server.await.unwrap();
        let request_line = raw.lines().next().unwrap();
        assert_eq!(
            request_line,
            "POST /v1beta/models/gemini-2.5-flash:generateContent HTTP/1.1"
        );
        assert!(raw.to_ascii_lowercase().contains(&format!("x-goog-api-key: {}", KEY).to_ascii_lowercase()));
    }

    #[tokio::test]
    async fn test_non_success_generate_carries_service_message() {
        let body = r#"{"error":{"code":404,"message":"models/nope is not found"}}"#;
        let (base_url, _server) = serve_once("404 Not Found", body).await;
        let client = GeminiClient::new().with_base_url(base_url);
        let candidate = ModelCandidate::new("v1beta", "nope");

        let err = client.generate(KEY, &candidate, &request()).await.unwrap_err();
        match err {
            AccountingError::Api { model, message } => {
                assert_eq!(model, "v1beta/models/nope");
                assert_eq!(message, "models/nope is not found");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_listing_is_empty() {
        let body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        let (base_url, _server) = serve_once("403 Forbidden", body).await;
        let client = GeminiClient::new().with_base_url(base_url);

        assert!(client.list_models(KEY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_returns_model_names() {
        let body = r#"{"models":[{"name":"models/gemini-2.5-flash"},{"name":"models/gemini-2.5-pro"}]}"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let client = GeminiClient::new().with_base_url(base_url);

        let models = client.list_models(KEY).await.unwrap();
        assert_eq!(models, vec!["models/gemini-2.5-flash", "models/gemini-2.5-pro"]);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /v1beta/models HTTP/1.1"));
    }
}
