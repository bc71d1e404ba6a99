//! Ollama chat provider (`POST {base_url}/api/chat`, non-streaming)

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ChatMessage, GenerationOptions, LanguageModelClient, ProviderInfo};
use crate::config::LlmConfig;

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            connect_timeout_secs = config.connect_timeout_secs,
            "Creating OllamaClient"
        );

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "num_predict": options.max_tokens,
                "temperature": options.temperature,
                "num_ctx": options.num_ctx,
            }
        })
    }

    /// Parse a response body as JSON, returning a clear error if the server returned HTML
    /// (e.g. a proxy error page) instead of valid JSON.
    fn parse_json_body(body: &str, endpoint: &str, status: reqwest::StatusCode) -> Result<Value> {
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}). Response: {}",
                endpoint,
                status,
                preview
            ));
        }

        serde_json::from_str::<Value>(body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }

    fn extract_reply(body: &Value) -> Result<String> {
        if let Some(error) = body["error"].as_str() {
            return Err(anyhow!("Ollama error: {}", error));
        }
        body["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Ollama response has no message content"))
    }
}

#[async_trait]
impl LanguageModelClient for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Result<String> {
        let endpoint = self.endpoint();
        tracing::debug!(
            endpoint = %endpoint,
            model = %self.model,
            messages = messages.len(),
            max_tokens = options.max_tokens,
            num_ctx = options.num_ctx,
            "Sending Ollama chat request"
        );

        let response = self
            .client
            .post(&endpoint)
            .json(&self.build_request(messages, options))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Chat request to {} timed out", endpoint)
                } else if e.is_connect() {
                    anyhow!("Failed to connect to {}: {}", endpoint, e)
                } else {
                    anyhow!("Chat request to {} failed: {}", endpoint, e)
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;
        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!("Chat API error ({}): {}", status, preview));
        }

        let parsed = Self::parse_json_body(&body, &endpoint, status)?;
        Self::extract_reply(&parsed)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "Ollama".to_string(),
            model: self.model.clone(),
            is_local: self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OllamaClient {
        OllamaClient::new(&LlmConfig {
            base_url: "http://localhost:11434/".to_string(),
            model: "llama3.1:8b".to_string(),
            connect_timeout_secs: 1,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_request_body() {
        let client = client();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/chat");

        let messages = vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")];
        let options = GenerationOptions { max_tokens: 1200, temperature: 0.5, num_ctx: 8192 };
        let body = client.build_request(&messages, &options);

        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert_eq!(body["options"]["num_predict"], 1200);
        assert_eq!(body["options"]["num_ctx"], 8192);
        assert_eq!(body["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_extract_reply() {
        let body = json!({ "message": { "role": "assistant", "content": "Hello!" }, "done": true });
        assert_eq!(OllamaClient::extract_reply(&body).unwrap(), "Hello!");

        let body = json!({ "error": "model 'x' not found" });
        assert!(OllamaClient::extract_reply(&body).unwrap_err().to_string().contains("not found"));

        assert!(OllamaClient::extract_reply(&json!({ "done": true })).is_err());
    }

    #[test]
    fn test_html_body_rejected() {
        let err = OllamaClient::parse_json_body(
            "<html><body>502 Bad Gateway</body></html>",
            "http://localhost:11434/api/chat",
            reqwest::StatusCode::OK,
        )
        .unwrap_err();
        assert!(err.to_string().contains("HTML"));
    }

    #[test]
    fn test_info() {
        let info = client().info();
        assert_eq!(info.name, "Ollama");
        assert!(info.is_local);
    }
}
