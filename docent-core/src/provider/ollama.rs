//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use crate::config::LlmConfig;
use async_trait::async_trait;

use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaProvider {
    /// Creates a new Ollama provider with the specified config.
    ///
    /// The HTTP client carries the configured request timeout so a hung
    /// connection surfaces as [`ProviderError::Timeout`].
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            config: config.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http_client.post(format!("{}{}", self.base_url, path));
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let response = self.post(path).json(body).send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), retry_after, error_text));
        }

        Ok(response)
    }

    /// A streaming single-turn chat request for `prompt`.
    fn chat_body(&self, prompt: &str) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            options: Some(HashMap::from([(
                "temperature".to_string(),
                serde_json::json!(self.config.temperature),
            )])),
            stream: true,
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send("/api/chat", &self.chat_body(prompt)).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        let mut content = String::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(classify_transport)?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                if let Some(piece) = parse_chat_line(&line[..line.len() - 1])? {
                    content.push_str(&piece);
                }
            }
        }

        // The final object is not always newline-terminated
        if let Some(piece) = parse_chat_line(&buffer)? {
            content.push_str(&piece);
        }

        debug!(chars = content.len(), "Generation stream finished");
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embed_request = EmbedRequest {
            model: self.config.embedding_model.clone(),
            input: text.to_string(),
        };

        let response = self.send("/api/embed", &embed_request).await?;
        let embed_response = response.json::<EmbedResponse>().await.map_err(classify_transport)?;

        embed_response
            .embeddings
            .into_iter()
            .next()
            .filter(|embedding| !embedding.is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

/// Folds transport-level reqwest failures into the provider taxonomy.
fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if err.is_connect() {
        ProviderError::Unreachable(err.to_string())
    } else {
        ProviderError::Request(err)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Parses one NDJSON line of a streaming chat response.
///
/// Blank lines yield `None`; an `error` field in the stream is an API error.
fn parse_chat_line(line: &[u8]) -> Result<Option<String>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let response: OllamaChatResponse = serde_json::from_str(line)?;
    if let Some(error) = response.error {
        return Err(ProviderError::Api { status: 200, message: error });
    }
    Ok(response.message.map(|m| m.content))
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_chat_line_content() {
        let line = br#"{"model":"m","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        assert_eq!(parse_chat_line(line).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn test_parse_chat_line_blank() {
        assert_eq!(parse_chat_line(b"   ").unwrap(), None);
    }

    #[test]
    fn test_parse_chat_line_error_field() {
        let line = br#"{"error":"model not found"}"#;
        assert!(matches!(
            parse_chat_line(line),
            Err(ProviderError::Api { message, .. }) if message == "model not found"
        ));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_chat_body_uses_configured_model_and_temperature() {
        let config = LlmConfig {
            model: "mistral:7b".to_string(),
            temperature: 0.3,
            ..LlmConfig::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();

        let body = serde_json::to_value(provider.chat_body("Why is the sky blue?")).unwrap();
        assert_eq!(body["model"], "mistral:7b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Why is the sky blue?");
        let temperature = body["options"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..LlmConfig::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
    }
}
