use super::role::Role;
use serde::{Deserialize, Serialize};

/// A file uploaded alongside a message. Only the reference travels through
/// the relay; the bytes stay wherever the interface stored them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub mime_type: String,
    pub url: String,
}

impl AttachmentRef {
    pub fn new<N, M, U>(name: N, mime_type: M, url: U) -> Self
    where
        N: Into<String>,
        M: Into<String>,
        U: Into<String>,
    {
        Self {
            id: None,
            name: name.into(),
            mime_type: mime_type.into(),
            url: url.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single turn of the conversation, as sent by the interface
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// True when the message carries nothing to send upstream.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_without_attachments() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "USER", "content": "hi"})).unwrap();
        assert_eq!(message, ChatMessage::user("hi"));
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_deserialize_with_attachments() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": "what is this?",
            "attachments": [{
                "id": "att_1",
                "name": "cat.png",
                "mimeType": "image/png",
                "url": "https://files.example.com/cat.png"
            }]
        }))
        .unwrap();

        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].id.as_deref(), Some("att_1"));
        assert!(message.attachments[0].is_image());
    }

    #[test]
    fn test_is_blank() {
        assert!(ChatMessage::user("   ").is_blank());
        assert!(!ChatMessage::user(" ")
            .with_attachment(AttachmentRef::new("a.pdf", "application/pdf", "https://x/a.pdf"))
            .is_blank());
        assert!(!ChatMessage::assistant("ok").is_blank());
    }
}
