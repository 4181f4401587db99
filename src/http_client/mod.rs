//! HTTP client for the Ollama server API
//!
//! Blocking client for the four endpoints the benchmark needs:
//! - `POST /api/pull`: ensure model weights are present locally
//! - `POST /api/generate`: single non-streaming generation
//! - `POST /api/generate` with `keep_alive: 0`: unload a model
//! - `GET /api/tags`: readiness probe
//!
//! Reference: Ollama API docs,
//! <https://github.com/ollama/ollama/blob/main/docs/api.md>

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};

/// Default local server endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Generation request for `/api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Full model key (`name:tag`)
    pub model: String,
    /// Input prompt; omitted from the body when empty (unload form)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    /// Whether to stream the response
    pub stream: bool,
    /// Seconds to keep the model loaded; `Some(0)` requests an unload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<i64>,
}

impl GenerateRequest {
    /// Build a non-streaming generation request
    #[must_use]
    pub fn new(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            keep_alive: None,
        }
    }

    /// Build the unload form of the request (empty prompt, zero keep-alive)
    #[must_use]
    pub fn unload(model: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: String::new(),
            stream: false,
            keep_alive: Some(0),
        }
    }
}

/// Weight-fetch request for `/api/pull`
#[derive(Debug, Clone, Serialize)]
pub struct PullRequest {
    /// Full model key (`name:tag`)
    pub model: String,
    /// Whether to stream download progress
    pub stream: bool,
}

impl PullRequest {
    /// Build a non-streaming pull request
    #[must_use]
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            stream: false,
        }
    }
}

/// Generation response from `/api/generate`
///
/// Every field except `response` defaults when absent; `response` stays an
/// `Option` so a missing field can be distinguished from empty text.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Model that produced the response
    #[serde(default)]
    pub model: String,
    /// Generated text, absent on some error bodies
    #[serde(default)]
    pub response: Option<String>,
    /// Whether generation is done
    #[serde(default)]
    pub done: bool,
    /// Total request duration in nanoseconds
    #[serde(default)]
    pub total_duration: u64,
    /// Model load duration in nanoseconds
    #[serde(default)]
    pub load_duration: u64,
    /// Prompt evaluation count
    #[serde(default)]
    pub prompt_eval_count: usize,
    /// Prompt evaluation duration in nanoseconds
    #[serde(default)]
    pub prompt_eval_duration: u64,
    /// Tokens generated
    #[serde(default)]
    pub eval_count: usize,
    /// Generation duration in nanoseconds
    #[serde(default)]
    pub eval_duration: u64,
}

impl GenerateResponse {
    /// Wall-clock runtime in seconds, from the nanosecond total
    #[must_use]
    pub fn runtime_seconds(&self) -> f64 {
        self.total_duration as f64 / 1e9
    }

    /// Generation throughput in tokens per second
    ///
    /// A zero `eval_duration` yields `0.0` rather than dividing by zero; the
    /// server omits the field for some failed or instant generations.
    #[must_use]
    pub fn tokens_per_second(&self) -> f64 {
        if self.eval_duration == 0 {
            return 0.0;
        }
        (self.eval_count as f64 / self.eval_duration as f64) * 1e9
    }
}

/// Blocking HTTP client bound to one Ollama server endpoint
///
/// Generation, unload, and readiness calls share the configured request
/// timeout. Weight pulls go through a separate untimed client: a
/// non-streaming pull only returns once the server has finished
/// downloading, which for large models takes far longer than any sensible
/// generation budget.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    // Untimed; a cold pull blocks until the download completes
    pull_client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client for `base_url` with the default 60 s generation timeout
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, 60)
    }

    /// Create a client with a custom generation timeout in seconds
    #[must_use]
    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            pull_client: Client::builder()
                .timeout(None)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }

    /// Base URL this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Configured generation timeout in seconds
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Issue a single non-streaming generation request
    ///
    /// # Errors
    /// `RequestTimeout` when the client timeout elapses, `HttpStatus` on any
    /// status other than 200, `ConnectionError`/`FormatError` on transport or
    /// parse failures.
    pub fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| self.map_send_error(&request.model, &e))?;

        // Status 200 exactly; other 2xx responses carry no generation body
        if response.status().as_u16() != 200 {
            return Err(MedirError::HttpStatus {
                status: response.status().as_u16(),
                endpoint: "/api/generate".to_string(),
            });
        }

        response.json().map_err(|e| MedirError::FormatError {
            reason: format!("Failed to parse generate response: {}", e),
        })
    }

    /// Ensure the named model's weights are present locally
    ///
    /// Blocks until the server finishes downloading (non-streaming pull),
    /// with no request timeout: a cold pull of a large model is expected to
    /// run well past the generation budget.
    ///
    /// # Errors
    /// `HttpStatus` on a non-success status, `ConnectionError` on transport
    /// failures.
    pub fn pull(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let request = PullRequest::new(model);

        let response = self
            .pull_client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| self.map_send_error(model, &e))?;

        if !response.status().is_success() {
            return Err(MedirError::HttpStatus {
                status: response.status().as_u16(),
                endpoint: "/api/pull".to_string(),
            });
        }
        Ok(())
    }

    /// Ask the server to unload the named model
    ///
    /// # Errors
    /// Same taxonomy as [`Self::generate`].
    pub fn unload(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest::unload(model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| self.map_send_error(model, &e))?;

        if !response.status().is_success() {
            return Err(MedirError::HttpStatus {
                status: response.status().as_u16(),
                endpoint: "/api/generate".to_string(),
            });
        }
        Ok(())
    }

    /// Probe whether the server is accepting requests
    ///
    /// # Errors
    /// Returns `ConnectionError` when the server is unreachable.
    pub fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| MedirError::ConnectionError(format!("Health check failed: {}", e)))?;

        Ok(response.status().is_success())
    }

    fn map_send_error(&self, model: &str, e: &reqwest::Error) -> MedirError {
        if e.is_timeout() {
            MedirError::RequestTimeout {
                model: model.to_string(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            MedirError::ConnectionError(format!("HTTP request failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Unit tests (no network required)
    // =========================================================================

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new("http://localhost:11434");
        assert_eq!(client.timeout_secs(), 60);
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_client_custom_timeout() {
        let client = OllamaClient::with_timeout("http://localhost:11434", 120);
        assert_eq!(client.timeout_secs(), 120);
    }

    #[test]
    fn test_generate_request_serialization() {
        let request = GenerateRequest::new("llama3:8b", "Hello");
        let json = serde_json::to_string(&request).expect("serialization failed");
        assert!(json.contains("\"model\":\"llama3:8b\""));
        assert!(json.contains("\"prompt\":\"Hello\""));
        assert!(json.contains("\"stream\":false"));
        assert!(!json.contains("keep_alive"));
    }

    #[test]
    fn test_unload_request_serialization() {
        let request = GenerateRequest::unload("llama3:8b");
        let json = serde_json::to_string(&request).expect("serialization failed");
        assert!(json.contains("\"model\":\"llama3:8b\""));
        assert!(json.contains("\"keep_alive\":0"));
        // Empty prompt is omitted entirely in the unload form
        assert!(!json.contains("prompt"));
    }

    #[test]
    fn test_pull_request_serialization() {
        let request = PullRequest::new("gemma3:27b");
        let json = serde_json::to_string(&request).expect("serialization failed");
        assert!(json.contains("\"model\":\"gemma3:27b\""));
        assert!(json.contains("\"stream\":false"));
    }

    #[test]
    fn test_generate_response_deserialization() {
        let json = r#"{
            "model": "llama3:8b",
            "response": "A, C, G, and T.",
            "done": true,
            "total_duration": 5000000000,
            "load_duration": 1000000000,
            "prompt_eval_count": 12,
            "prompt_eval_duration": 500000000,
            "eval_count": 100,
            "eval_duration": 2000000000
        }"#;

        let response: GenerateResponse = serde_json::from_str(json).expect("deserialization failed");
        assert_eq!(response.model, "llama3:8b");
        assert_eq!(response.response.as_deref(), Some("A, C, G, and T."));
        assert!(response.done);
        assert_eq!(response.eval_count, 100);
    }

    #[test]
    fn test_generate_response_missing_fields_default() {
        let json = r#"{"model": "llama2:7b", "done": true}"#;
        let response: GenerateResponse = serde_json::from_str(json).expect("deserialization failed");

        assert!(response.response.is_none());
        assert_eq!(response.total_duration, 0);
        assert_eq!(response.eval_count, 0);
        assert_eq!(response.eval_duration, 0);
    }

    #[test]
    fn test_runtime_seconds_conversion() {
        let json = r#"{"response": "x", "total_duration": 5000000000,
                       "eval_count": 100, "eval_duration": 2000000000}"#;
        let response: GenerateResponse = serde_json::from_str(json).expect("deserialization failed");

        assert!((response.runtime_seconds() - 5.0).abs() < f64::EPSILON);
        assert!((response.tokens_per_second() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tokens_per_second_zero_eval_duration() {
        let json = r#"{"response": "x", "total_duration": 1000000000,
                       "eval_count": 100, "eval_duration": 0}"#;
        let response: GenerateResponse = serde_json::from_str(json).expect("deserialization failed");

        // Guarded: zero duration is not a fault
        assert_eq!(response.tokens_per_second(), 0.0);
    }

    #[test]
    fn test_tokens_per_second_fractional() {
        let response = GenerateResponse {
            model: String::new(),
            response: None,
            done: true,
            total_duration: 0,
            load_duration: 0,
            prompt_eval_count: 0,
            prompt_eval_duration: 0,
            eval_count: 30,
            eval_duration: 4_000_000_000,
        };
        assert!((response.tokens_per_second() - 7.5).abs() < 1e-9);
    }

    // =========================================================================
    // Connection-error tests (no server listening on these ports)
    // =========================================================================

    #[test]
    fn test_generate_connection_error() {
        let client = OllamaClient::with_timeout("http://localhost:59981", 1);
        let request = GenerateRequest::new("test:1b", "Hello");

        let result = client.generate(&request);
        assert!(result.is_err());
        match result.unwrap_err() {
            MedirError::ConnectionError(msg) => assert!(msg.contains("HTTP request failed")),
            other => panic!("Expected ConnectionError, got: {:?}", other),
        }
    }

    #[test]
    fn test_pull_connection_error() {
        let client = OllamaClient::with_timeout("http://localhost:59982", 1);
        assert!(client.pull("test:1b").is_err());
    }

    #[test]
    fn test_unload_connection_error() {
        let client = OllamaClient::with_timeout("http://localhost:59983", 1);
        assert!(client.unload("test:1b").is_err());
    }

    #[test]
    fn test_health_check_connection_error() {
        let client = OllamaClient::with_timeout("http://localhost:59984", 1);
        let result = client.health_check();
        assert!(result.is_err());
    }

    // =========================================================================
    // Single-shot server tests (std TcpListener, no Ollama required)
    // =========================================================================

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    const PULL_DONE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 20\r\nConnection: close\r\n\r\n{\"status\":\"success\"}";
    const NO_CONTENT: &[u8] = b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n";

    /// Serve exactly one connection on an ephemeral port: wait `delay`,
    /// drain the request, send `response` verbatim, close.
    fn single_shot_server(
        delay: Duration,
        response: &'static [u8],
    ) -> (std::thread::JoinHandle<()>, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test listener");
        let port = listener
            .local_addr()
            .expect("bound listener must have local addr")
            .port();

        let handle = std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                // Sleeping before the drain leaves the full request buffered,
                // so one read empties the socket
                std::thread::sleep(delay);
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(response);
            }
        });
        (handle, port)
    }

    #[test]
    fn test_pull_outlasts_the_generation_timeout() {
        let (server, port) = single_shot_server(Duration::from_secs(2), PULL_DONE);
        let client = OllamaClient::with_timeout(&format!("http://127.0.0.1:{}", port), 1);

        // A cold pull takes as long as the download takes; the 1 s
        // generation budget does not apply to it
        client
            .pull("llama3.3:70b")
            .expect("pull should wait out the slow download");
        server.join().expect("server thread panicked");
    }

    #[test]
    fn test_generate_enforces_the_configured_timeout() {
        let (server, port) = single_shot_server(Duration::from_secs(2), PULL_DONE);
        let client = OllamaClient::with_timeout(&format!("http://127.0.0.1:{}", port), 1);
        let request = GenerateRequest::new("test:1b", "Hello");

        match client.generate(&request) {
            Err(MedirError::RequestTimeout {
                model,
                timeout_secs,
            }) => {
                assert_eq!(model, "test:1b");
                assert_eq!(timeout_secs, 1);
            }
            other => panic!("Expected RequestTimeout, got: {:?}", other),
        }
        server.join().expect("server thread panicked");
    }

    #[test]
    fn test_generate_rejects_non_200_success_status() {
        let (server, port) = single_shot_server(Duration::from_millis(100), NO_CONTENT);
        let client = OllamaClient::with_timeout(&format!("http://127.0.0.1:{}", port), 5);
        let request = GenerateRequest::new("test:1b", "Hello");

        // A bodyless 204 is an error status, not a parse failure
        match client.generate(&request) {
            Err(MedirError::HttpStatus { status, endpoint }) => {
                assert_eq!(status, 204);
                assert_eq!(endpoint, "/api/generate");
            }
            other => panic!("Expected HttpStatus, got: {:?}", other),
        }
        server.join().expect("server thread panicked");
    }

    // =========================================================================
    // Integration tests (require a running Ollama server)
    // =========================================================================

    #[test]
    #[ignore = "Requires Ollama server at localhost:11434"]
    fn test_ollama_real_generate() {
        let client = OllamaClient::new("http://localhost:11434");
        let request = GenerateRequest::new("llama3:8b", "The capital of France is");

        let response = client
            .generate(&request)
            .expect("generation failed - is the server running?");

        assert!(response.response.is_some());
        assert!(response.runtime_seconds() > 0.0);
        println!("Answer: {:?}", response.response);
        println!("Runtime: {:.2}s", response.runtime_seconds());
        println!("Speed: {:.2} tokens/s", response.tokens_per_second());
    }

    #[test]
    #[ignore = "Requires Ollama server at localhost:11434"]
    fn test_ollama_real_health_check() {
        let client = OllamaClient::new("http://localhost:11434");
        let healthy = client.health_check().expect("health check failed");
        assert!(healthy);
    }
}
