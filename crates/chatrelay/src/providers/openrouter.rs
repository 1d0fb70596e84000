use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::base::{DecodeError, Provider, ProviderDescriptor, ProviderEvent, UpstreamRequest};
use super::configs::{OpenRouterProviderConfig, DEFAULT_MAX_TOKENS};
use super::utils::{decode_openai_record, messages_to_openai_spec, post_stream, AttachmentFormat};
use crate::errors::{RelayError, RelayResult};
use crate::models::message::ChatMessage;
use crate::stream::{ByteStream, SseRecord};

pub const OPENROUTER_ID: &str = "openrouter";
pub const OPENROUTER_API_KEY_VAR: &str = "OPENROUTER_API_KEY";
pub const OPENROUTER_MODELS: [&str; 3] = [
    "mistralai/mistral-7b-instruct:free",
    "deepseek/deepseek-r1-0528:free",
    "meta-llama/llama-4-scout:free",
];

/// OpenRouter's OpenAI-compatible endpoint. Accepts multimodal content parts
/// and expects app attribution headers; streams `: OPENROUTER PROCESSING`
/// comments while a model warms up.
pub struct OpenRouterProvider {
    client: Client,
    config: OpenRouterProviderConfig,
    descriptor: ProviderDescriptor,
}

impl OpenRouterProvider {
    pub fn new(config: OpenRouterProviderConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            config,
            descriptor: ProviderDescriptor::new(OPENROUTER_ID, "OpenRouter", OPENROUTER_MODELS),
        })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: Option<u32>,
    ) -> RelayResult<UpstreamRequest> {
        let api_key =
            self.config
                .api_key
                .as_ref()
                .ok_or_else(|| RelayError::MissingCredentials {
                    provider: OPENROUTER_ID.to_string(),
                    env_var: OPENROUTER_API_KEY_VAR.to_string(),
                })?;

        let mut body = json!({
            "model": model,
            "messages": messages_to_openai_spec(messages, AttachmentFormat::ContentParts),
            "stream": true,
            "max_tokens": max_tokens.or(self.config.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }

        Ok(UpstreamRequest {
            url: format!(
                "{}/api/v1/chat/completions",
                self.config.host.trim_end_matches('/')
            ),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", api_key.expose()),
                ),
                ("HTTP-Referer".to_string(), self.config.app_url.clone()),
                ("X-Title".to_string(), self.config.app_title.clone()),
            ],
            body,
        })
    }

    async fn open_stream(
        &self,
        request: UpstreamRequest,
        cancel: &CancellationToken,
    ) -> RelayResult<ByteStream> {
        tracing::info!(
            provider = OPENROUTER_ID,
            model = %request.body["model"],
            message_count = request.body["messages"].as_array().map_or(0, Vec::len),
            "sending request to OpenRouter"
        );
        post_stream(&self.client, OPENROUTER_ID, request, cancel).await
    }

    fn decode_record(&self, record: &SseRecord) -> Result<ProviderEvent, DecodeError> {
        decode_openai_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::NormalizedEvent;
    use crate::models::message::AttachmentRef;
    use crate::providers::configs::ApiKey;
    use crate::stream::normalize;
    use futures::StreamExt;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(host: String) -> OpenRouterProviderConfig {
        OpenRouterProviderConfig {
            host,
            api_key: Some(ApiKey::new("test_api_key")),
            app_url: "https://chat.example.com".to_string(),
            app_title: "Example Chat".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request() {
        let provider = OpenRouterProvider::new(config("https://openrouter.ai/".to_string())).unwrap();
        let messages = vec![ChatMessage::user("look").with_attachment(AttachmentRef::new(
            "cat.png",
            "image/png",
            "https://f/cat.png",
        ))];

        let request = provider
            .build_request(&messages, "meta-llama/llama-4-scout:free", None)
            .unwrap();

        assert_eq!(request.url, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(request.header("Authorization"), Some("Bearer test_api_key"));
        assert_eq!(request.header("HTTP-Referer"), Some("https://chat.example.com"));
        assert_eq!(request.header("X-Title"), Some("Example Chat"));
        assert_eq!(request.body["stream"], json!(true));
        assert_eq!(request.body["max_tokens"], json!(1000));
        assert_eq!(request.body["temperature"], json!(0.7f32));
        assert_eq!(
            request.body["messages"][0]["content"][1]["image_url"]["url"],
            json!("https://f/cat.png")
        );
    }

    #[test]
    fn test_missing_credentials() {
        let provider = OpenRouterProvider::new(OpenRouterProviderConfig::default()).unwrap();
        let err = provider
            .build_request(&[ChatMessage::user("hi")], "deepseek/deepseek-r1-0528:free", None)
            .unwrap_err();
        assert_eq!(
            err,
            RelayError::MissingCredentials {
                provider: "openrouter".to_string(),
                env_var: "OPENROUTER_API_KEY".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_stream_skips_processing_comments() {
        let mock_server = MockServer::start().await;
        let body = concat!(
            ": OPENROUTER PROCESSING\n\n",
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Bonjour\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .and(header("x-title", "Example Chat"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = Arc::new(OpenRouterProvider::new(config(mock_server.uri())).unwrap());
        let request = provider
            .build_request(&[ChatMessage::user("hi")], "mistralai/mistral-7b-instruct:free", None)
            .unwrap();
        let cancel = CancellationToken::new();
        let bytes = provider.open_stream(request, &cancel).await.unwrap();

        let events: Vec<_> = normalize(provider, bytes, cancel).collect().await;
        assert_eq!(
            events,
            vec![NormalizedEvent::delta("Bonjour"), NormalizedEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = OpenRouterProvider::new(config(mock_server.uri())).unwrap();
        let request = provider
            .build_request(&[ChatMessage::user("hi")], "mistralai/mistral-7b-instruct:free", None)
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = provider.open_stream(request, &cancel).await.err().unwrap();
        assert_eq!(err, RelayError::upstream(None, "request cancelled"));
    }
}
