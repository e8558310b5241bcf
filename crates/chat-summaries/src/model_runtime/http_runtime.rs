//! Text generation over an OpenAI-compatible `/v1/chat/completions` endpoint.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::runtime_trait::{GenerationOutput, GenerationRequest, TextGenerator};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    completion_tokens: Option<i64>,
}

pub struct HttpTextGenerator {
    backend_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpTextGenerator {
    pub fn new(backend_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            backend_url,
            model: model.into(),
            api_key: None,
            http_client,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let generator = Self::new(
            config.backend_url.clone(),
            config.model_name.clone(),
            Duration::from_secs(config.generate_timeout_seconds),
        )?;
        Ok(match &config.api_key {
            Some(key) => generator.with_api_key(key.clone()),
            None => generator,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GenerationOutput> {
        debug!(
            "Requesting completion from {} ({} prompt chars, max {} tokens)",
            self.backend_url,
            request.prompt.len(),
            request.max_tokens
        );

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage { role: "system", content: &request.system },
                CompletionMessage { role: "user", content: &request.prompt },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let mut builder = self.http_client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("LLM backend request failed: {}", e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("LLM backend returned {}: {}", status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse LLM response: {}", e))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        Ok(GenerationOutput {
            text,
            completion_tokens: completion.usage.and_then(|usage| usage.completion_tokens),
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "max_tokens": 64,
                "stream": false,
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"a recap"}}],"usage":{"prompt_tokens":9,"completion_tokens":3}}"#)
            .create_async()
            .await;

        let generator = HttpTextGenerator::new(server.url(), "test-model", Duration::from_secs(5))
            .unwrap()
            .with_api_key("sk-test");
        let output = generator
            .generate(GenerationRequest::new("be brief", "hello", 64))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(output.text, "a recap");
        assert_eq!(output.completion_tokens, Some(3));
    }

    #[tokio::test]
    async fn test_missing_usage_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"text only"}}]}"#)
            .create_async()
            .await;

        let generator = HttpTextGenerator::new(server.url(), "m", Duration::from_secs(5)).unwrap();
        let output = generator.generate(GenerationRequest::new("s", "p", 8)).await.unwrap();

        assert_eq!(output.text, "text only");
        assert_eq!(output.completion_tokens, None);
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let generator = HttpTextGenerator::new(server.url(), "m", Duration::from_secs(5)).unwrap();
        let err = generator.generate(GenerationRequest::new("s", "p", 8)).await.unwrap_err();

        assert!(err.to_string().contains("503"));
    }
}
