use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{GenerationParams, LlmProvider, Message};

/// Chat-completions client for OpenAI-compatible services (OpenAI, DeepSeek, Qwen, ...).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_request(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("chat completion API error {status}: {text}");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let resp: ChatCompletionResponse = serde_json::from_str(&text)?;

        if let Some(ref usage) = resp.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                model = %self.model,
                "chat completion usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_owned())
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        self.send_request(messages, params).await
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| ApiMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new("sk-test-key".into(), base_url.into(), "deepseek-chat".into())
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let p = test_provider("https://api.deepseek.com//");
        assert_eq!(p.base_url(), "https://api.deepseek.com");
        assert_eq!(p.model(), "deepseek-chat");
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", test_provider("https://api.deepseek.com"));
        assert!(!debug.contains("sk-test-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("deepseek-chat"));
    }

    #[test]
    fn name_returns_openai() {
        assert_eq!(test_provider("http://localhost").name(), "openai");
    }

    #[test]
    fn request_body_carries_params() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let api_messages = convert_messages(&messages);
        let body = ChatRequest {
            model: "m",
            messages: &api_messages,
            temperature: 0.0,
            max_tokens: 512,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn chat_returns_trimmed_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "deepseek-chat",
                "max_tokens": 64
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  答案  \n")))
            .expect(1)
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let out = p
            .chat(&[Message::user("问题")], &GenerationParams::new(0.0, 64))
            .await
            .unwrap();
        assert_eq!(out, "答案");
    }

    #[tokio::test]
    async fn chat_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p
            .chat(&[Message::user("x")], &GenerationParams::new(0.0, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited), "got {err:?}");
    }

    #[tokio::test]
    async fn chat_server_error_maps_to_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p
            .chat(&[Message::user("x")], &GenerationParams::new(0.0, 8))
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_without_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p
            .chat(&[Message::user("x")], &GenerationParams::new(0.0, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn chat_garbage_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p
            .chat(&[Message::user("x")], &GenerationParams::new(0.0, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Json(_)));
    }

    #[tokio::test]
    async fn chat_unreachable_errors() {
        let p = test_provider("http://127.0.0.1:1");
        let result = p
            .chat(&[Message::user("x")], &GenerationParams::new(0.0, 8))
            .await;
        assert!(matches!(result, Err(LlmError::Http(_))));
    }
}
