//! Helpers shared by providers that speak the OpenAI chat-completions dialect.
use futures::stream::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::base::{DecodeError, ProviderEvent, UpstreamRequest};
use crate::errors::{RelayError, RelayResult};
use crate::models::message::{AttachmentRef, ChatMessage};
use crate::stream::{ByteStream, SseRecord};

/// Literal payload of the record that ends an OpenAI-style stream.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttachmentFormat {
    /// Multimodal content parts; images become `image_url` parts.
    ContentParts,
    /// Plain string content with a reference line per attachment.
    TextReference,
}

/// Convert chat messages to the OpenAI `messages` array.
pub fn messages_to_openai_spec(messages: &[ChatMessage], format: AttachmentFormat) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let content = if message.attachments.is_empty() {
                json!(message.content)
            } else {
                match format {
                    AttachmentFormat::ContentParts => {
                        let mut parts = Vec::new();
                        if !message.content.is_empty() {
                            parts.push(json!({"type": "text", "text": message.content}));
                        }
                        parts.extend(message.attachments.iter().map(convert_attachment));
                        json!(parts)
                    }
                    AttachmentFormat::TextReference => {
                        let mut text = message.content.clone();
                        for attachment in &message.attachments {
                            if !text.is_empty() {
                                text.push_str("\n\n");
                            }
                            text.push_str(&attachment_reference(attachment));
                        }
                        json!(text)
                    }
                }
            };

            json!({
                "role": message.role.as_ref(),
                "content": content,
            })
        })
        .collect()
}

/// Convert an attachment into a content part
pub fn convert_attachment(attachment: &AttachmentRef) -> Value {
    if attachment.is_image() {
        json!({
            "type": "image_url",
            "image_url": { "url": attachment.url }
        })
    } else {
        json!({
            "type": "text",
            "text": attachment_reference(attachment),
        })
    }
}

pub fn attachment_reference(attachment: &AttachmentRef) -> String {
    format!(
        "[Attachment: {} ({}) {}]",
        attachment.name, attachment.mime_type, attachment.url
    )
}

/// Decode one record of an OpenAI-style stream.
pub fn decode_openai_record(record: &SseRecord) -> Result<ProviderEvent, DecodeError> {
    let data = record.data.trim();
    if data == DONE_MARKER {
        return Ok(ProviderEvent::Done);
    }
    if data.is_empty() {
        return Ok(ProviderEvent::Ignored);
    }

    let payload: Value = serde_json::from_str(data)?;
    Ok(event_from_payload(&payload))
}

/// Map a decoded JSON payload onto a provider event.
///
/// Recognized shapes, in order: an `error` object or non-empty string,
/// `choices[0].delta.content`, a top-level string `content`, a bare JSON
/// string. Empty text is ignored.
pub fn event_from_payload(payload: &Value) -> ProviderEvent {
    if let Some(message) = payload.get("error").and_then(error_message) {
        return ProviderEvent::Error(message);
    }

    let text = if let Some(delta) = payload.pointer("/choices/0/delta") {
        delta.get("content").and_then(Value::as_str)
    } else if let Some(text) = payload.as_str() {
        Some(text)
    } else {
        payload.get("content").and_then(Value::as_str)
    };

    match text {
        Some(text) if !text.is_empty() => ProviderEvent::Delta(text.to_string()),
        _ => ProviderEvent::Ignored,
    }
}

fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
        ),
        _ => None,
    }
}

/// POST `request` and return the streamed response body.
///
/// A non-2xx response is read fully and surfaced as `Upstream` with its
/// status and body text.
pub async fn post_stream(
    client: &Client,
    provider: &str,
    request: UpstreamRequest,
    cancel: &CancellationToken,
) -> RelayResult<ByteStream> {
    let mut builder = client.post(&request.url).json(&request.body);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(RelayError::upstream(None, "request cancelled"));
        }
        response = builder.send() => response?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        tracing::error!(provider, status = status.as_u16(), body = %body, "upstream request failed");
        return Err(RelayError::upstream(Some(status.as_u16()), body));
    }

    if response.content_length() == Some(0) {
        tracing::error!(provider, status = status.as_u16(), "upstream returned an empty body");
        return Err(RelayError::upstream(None, "empty body"));
    }

    tracing::info!(provider, status = status.as_u16(), "upstream stream opened");
    Ok(response
        .bytes_stream()
        .map(|chunk| chunk.map_err(RelayError::from))
        .boxed())
}
