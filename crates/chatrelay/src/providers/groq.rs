use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::base::{DecodeError, Provider, ProviderDescriptor, ProviderEvent, UpstreamRequest};
use super::configs::{GroqProviderConfig, DEFAULT_MAX_TOKENS};
use super::utils::{decode_openai_record, messages_to_openai_spec, post_stream, AttachmentFormat};
use crate::errors::{RelayError, RelayResult};
use crate::models::message::ChatMessage;
use crate::stream::{ByteStream, SseRecord};

pub const GROQ_ID: &str = "groq";
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";
pub const GROQ_MODELS: [&str; 3] = ["llama3-8b-8192", "llama3-70b-8192", "gemma2-9b-it"];

/// Groq's OpenAI-compatible endpoint. Text only: attachments are rendered as
/// reference lines inside the message content.
pub struct GroqProvider {
    client: Client,
    config: GroqProviderConfig,
    descriptor: ProviderDescriptor,
}

impl GroqProvider {
    pub fn new(config: GroqProviderConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            config,
            descriptor: ProviderDescriptor::new(GROQ_ID, "Groq", GROQ_MODELS),
        })
    }
}

#[async_trait]
impl Provider for GroqProvider {
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
                    provider: GROQ_ID.to_string(),
                    env_var: GROQ_API_KEY_VAR.to_string(),
                })?;

        let mut body = json!({
            "model": model,
            "messages": messages_to_openai_spec(messages, AttachmentFormat::TextReference),
            "max_tokens": max_tokens.or(self.config.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
        });
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }

        Ok(UpstreamRequest {
            url: format!(
                "{}/openai/v1/chat/completions",
                self.config.host.trim_end_matches('/')
            ),
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", api_key.expose()),
            )],
            body,
        })
    }

    async fn open_stream(
        &self,
        request: UpstreamRequest,
        cancel: &CancellationToken,
    ) -> RelayResult<ByteStream> {
        tracing::info!(
            provider = GROQ_ID,
            model = %request.body["model"],
            message_count = request.body["messages"].as_array().map_or(0, Vec::len),
            "sending request to Groq"
        );
        post_stream(&self.client, GROQ_ID, request, cancel).await
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

    async fn setup_mock_server(response: ResponseTemplate) -> (MockServer, Arc<GroqProvider>) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        let config = GroqProviderConfig {
            host: mock_server.uri(),
            api_key: Some(ApiKey::new("test_api_key")),
            ..Default::default()
        };

        let provider = Arc::new(GroqProvider::new(config).unwrap());
        (mock_server, provider)
    }

    #[test]
    fn test_build_request() {
        let provider = GroqProvider::new(GroqProviderConfig {
            api_key: Some(ApiKey::new("test_api_key")),
            ..Default::default()
        })
        .unwrap();
        let messages = vec![
            ChatMessage::assistant("earlier answer"),
            ChatMessage::user("and this?").with_attachment(AttachmentRef::new(
                "notes.txt",
                "text/plain",
                "https://f/notes.txt",
            )),
        ];

        let request = provider
            .build_request(&messages, "llama3-8b-8192", Some(256))
            .unwrap();

        assert_eq!(
            request.url,
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("Authorization"), Some("Bearer test_api_key"));
        assert_eq!(request.header("HTTP-Referer"), None);
        assert_eq!(request.body["max_tokens"], json!(256));
        assert_eq!(request.body["stream"], json!(true));
        assert_eq!(
            request.body["messages"],
            json!([
                {"role": "assistant", "content": "earlier answer"},
                {"role": "user", "content": "and this?\n\n[Attachment: notes.txt (text/plain) https://f/notes.txt]"},
            ])
        );
    }

    #[test]
    fn test_missing_credentials() {
        let provider = GroqProvider::new(GroqProviderConfig::default()).unwrap();
        let err = provider
            .build_request(&[ChatMessage::user("hi")], "llama3-8b-8192", None)
            .unwrap_err();
        assert!(matches!(err, RelayError::MissingCredentials { .. }));
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn test_stream_basic() {
        let body = concat!(
            "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"He\"}}]}\n\n",
            "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"llo\"}}]}\n\n",
            "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}],\"x_groq\":{\"usage\":{\"total_tokens\":12}}}\n\n",
            "data: [DONE]\n\n",
        );
        let (_server, provider) =
            setup_mock_server(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
                .await;

        let request = provider
            .build_request(&[ChatMessage::user("hi")], "llama3-8b-8192", None)
            .unwrap();
        let cancel = CancellationToken::new();
        let bytes = provider.open_stream(request, &cancel).await.unwrap();
        let events: Vec<_> = normalize(provider, bytes, cancel).collect().await;

        assert_eq!(
            events,
            vec![
                NormalizedEvent::delta("He"),
                NormalizedEvent::delta("llo"),
                NormalizedEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let (_server, provider) = setup_mock_server(
            ResponseTemplate::new(429).set_body_string(r#"{"error":{"message":"Rate limit reached"}}"#),
        )
        .await;

        let request = provider
            .build_request(&[ChatMessage::user("hi")], "llama3-8b-8192", None)
            .unwrap();
        let err = provider
            .open_stream(request, &CancellationToken::new())
            .await
            .err()
            .unwrap();

        assert_eq!(
            err,
            RelayError::upstream(Some(429), r#"{"error":{"message":"Rate limit reached"}}"#)
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_upstream_error() {
        let (_server, provider) = setup_mock_server(ResponseTemplate::new(200)).await;

        let request = provider
            .build_request(&[ChatMessage::user("hi")], "llama3-8b-8192", None)
            .unwrap();
        let err = provider
            .open_stream(request, &CancellationToken::new())
            .await
            .err()
            .unwrap();

        assert_eq!(err, RelayError::upstream(None, "empty body"));
    }

    #[tokio::test]
    async fn test_request_body_sent_upstream() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "model": "gemma2-9b-it",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = GroqProvider::new(GroqProviderConfig {
            host: mock_server.uri(),
            api_key: Some(ApiKey::new("test_api_key")),
            ..Default::default()
        })
        .unwrap();
        let request = provider
            .build_request(&[ChatMessage::user("hi")], "gemma2-9b-it", None)
            .unwrap();
        assert!(provider
            .open_stream(request, &CancellationToken::new())
            .await
            .is_ok());
    }
}
