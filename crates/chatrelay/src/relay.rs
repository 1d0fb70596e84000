//! The relay lifecycle as a chain of typed stages.
//!
//! `authenticate` → [`Authenticated`] → [`Authenticated::validate`] →
//! [`Validated`] → [`Validated::open`] → [`Streaming`]. Each stage can only be
//! reached through the one before it, so an upstream call can never be made
//! for a caller or payload that failed an earlier check.
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::{RelayError, RelayResult};
use crate::models::message::ChatMessage;
use crate::providers::base::Provider;
use crate::registry::ProviderRegistry;
use crate::stream::{normalize, EventStream};

pub const DEFAULT_GUEST_MAX_PAYLOAD_BYTES: usize = 8192;

fn default_provider() -> String {
    "openrouter".to_string()
}

/// Inbound relay request, as posted by the interface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub is_guest_request: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPolicy {
    /// Upper bound on the summed UTF-8 length of all message contents for guests.
    pub guest_max_payload_bytes: usize,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            guest_max_payload_bytes: DEFAULT_GUEST_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Who the session layer says is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User(String),
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Guest,
}

impl Identity {
    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest)
    }
}

/// An authenticated user always wins over the guest flag; an anonymous caller
/// needs the flag to proceed as a guest.
pub fn authenticate(caller: Caller, guest_requested: bool) -> RelayResult<Authenticated> {
    let identity = match caller {
        Caller::User(id) => Identity::User(id),
        Caller::Anonymous if guest_requested => Identity::Guest,
        Caller::Anonymous => return Err(RelayError::Unauthorized),
    };
    Ok(Authenticated { identity })
}

#[derive(Debug)]
pub struct Authenticated {
    identity: Identity,
}

impl Authenticated {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn validate(
        self,
        registry: &ProviderRegistry,
        request: RelayRequest,
        policy: &RelayPolicy,
    ) -> RelayResult<Validated> {
        if request.messages.is_empty() {
            return Err(RelayError::InvalidInput("Messages are required".to_string()));
        }
        if let Some(index) = request.messages.iter().position(ChatMessage::is_blank) {
            return Err(RelayError::InvalidInput(format!(
                "Message {} has no content",
                index
            )));
        }

        let provider = registry.resolve(&request.provider)?;
        registry.validate_model(&request.provider, &request.model)?;

        if self.identity.is_guest() {
            let size = payload_size(&request.messages);
            if size > policy.guest_max_payload_bytes {
                tracing::warn!(size, limit = policy.guest_max_payload_bytes, "guest payload rejected");
                return Err(RelayError::PayloadTooLarge {
                    size,
                    limit: policy.guest_max_payload_bytes,
                });
            }
        }

        Ok(Validated {
            identity: self.identity,
            provider,
            model: request.model,
            messages: request.messages,
            max_tokens: request.max_tokens,
        })
    }
}

/// Summed byte length of every message's content.
pub fn payload_size(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|message| message.content.len()).sum()
}

pub struct Validated {
    identity: Identity,
    provider: Arc<dyn Provider>,
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
}

impl Validated {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the upstream request and open the stream. This is the only
    /// stage that touches the network, and it makes exactly one attempt.
    pub async fn open(self, cancel: CancellationToken) -> RelayResult<Streaming> {
        let request = self
            .provider
            .build_request(&self.messages, &self.model, self.max_tokens)?;
        let bytes = self.provider.open_stream(request, &cancel).await?;

        Ok(Streaming {
            identity: self.identity,
            provider_id: self.provider.id().to_string(),
            model: self.model,
            events: normalize(self.provider, bytes, cancel),
        })
    }
}

pub struct Streaming {
    identity: Identity,
    provider_id: String,
    model: String,
    events: EventStream,
}

impl Streaming {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn into_events(self) -> EventStream {
        self.events
    }
}
