use std::fmt;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const OPENROUTER_HOST: &str = "https://openrouter.ai";
pub const GROQ_HOST: &str = "https://api.groq.com";

/// An upstream API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouterProviderConfig {
    pub host: String,
    pub api_key: Option<ApiKey>,
    /// Sent as `HTTP-Referer` so requests are attributed to the app.
    pub app_url: String,
    /// Sent as `X-Title`.
    pub app_title: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for OpenRouterProviderConfig {
    fn default() -> Self {
        Self {
            host: OPENROUTER_HOST.to_string(),
            api_key: None,
            app_url: "http://localhost:3000".to_string(),
            app_title: "T3 Chat App".to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroqProviderConfig {
    pub host: String,
    pub api_key: Option<ApiKey>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GroqProviderConfig {
    fn default() -> Self {
        Self {
            host: GROQ_HOST.to_string(),
            api_key: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

/// Process-wide provider configuration, built once at startup and handed to
/// the registry.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigs {
    pub openrouter: OpenRouterProviderConfig,
    pub groq: GroqProviderConfig,
}
