use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, EnumString};

/// Author of a chat message.
///
/// Parsing is case-insensitive because the interface stores roles upper-case
/// (`USER`, `ASSISTANT`) while providers expect lower-case strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown role: {}", raw)))
    }
}
