use crate::error::{to_env_var, ConfigError};
use chatrelay::providers::configs::{
    ApiKey, GroqProviderConfig, OpenRouterProviderConfig, ProviderConfigs, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE, GROQ_HOST, OPENROUTER_HOST,
};
use chatrelay::providers::groq::GROQ_API_KEY_VAR;
use chatrelay::providers::openrouter::OPENROUTER_API_KEY_VAR;
use chatrelay::relay::{RelayPolicy, DEFAULT_GUEST_MAX_PAYLOAD_BYTES};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds of upstream silence before a keep-alive comment is written.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::InvalidValue {
                env_var: to_env_var("server.host"),
                reason: err.to_string(),
            })
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct GuestSettings {
    #[serde(default = "default_guest_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for GuestSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_guest_max_payload_bytes(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenRouterSettings {
    #[serde(default = "default_openrouter_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default = "default_app_title")]
    pub app_title: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for OpenRouterSettings {
    fn default() -> Self {
        Self {
            host: default_openrouter_host(),
            api_key: None,
            app_url: default_app_url(),
            app_title: default_app_title(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GroqSettings {
    #[serde(default = "default_groq_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for GroqSettings {
    fn default() -> Self {
        Self {
            host: default_groq_host(),
            api_key: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvidersSettings {
    #[serde(default)]
    pub openrouter: OpenRouterSettings,
    #[serde(default)]
    pub groq: GroqSettings,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub guest: GuestSettings,
    #[serde(default)]
    pub providers: ProvidersSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("server.keep_alive_secs", default_keep_alive_secs())?
            .set_default(
                "guest.max_payload_bytes",
                default_guest_max_payload_bytes() as u64,
            )?
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(match err {
                    config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    },
                    other => ConfigError::Other(other),
                });
            }
        };

        // Keys may also come from the conventional provider variables.
        if settings.providers.openrouter.api_key.is_none() {
            settings.providers.openrouter.api_key = non_empty_env(OPENROUTER_API_KEY_VAR);
        }
        if settings.providers.groq.api_key.is_none() {
            settings.providers.groq.api_key = non_empty_env(GROQ_API_KEY_VAR);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("server.keep_alive_secs"),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.guest.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("guest.max_payload_bytes"),
                reason: "must be at least 1".to_string(),
            });
        }

        let temperatures = [
            ("providers.openrouter.temperature", self.providers.openrouter.temperature),
            ("providers.groq.temperature", self.providers.groq.temperature),
        ];
        for (field, temperature) in temperatures {
            if let Some(t) = temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::InvalidValue {
                        env_var: to_env_var(field),
                        reason: format!("{} is outside 0.0..=2.0", t),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn provider_configs(&self) -> ProviderConfigs {
        let openrouter = &self.providers.openrouter;
        let groq = &self.providers.groq;

        ProviderConfigs {
            openrouter: OpenRouterProviderConfig {
                host: openrouter.host.clone(),
                api_key: openrouter.api_key.clone().map(ApiKey::new),
                app_url: openrouter.app_url.clone(),
                app_title: openrouter.app_title.clone(),
                temperature: Some(openrouter.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
                max_tokens: Some(openrouter.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            },
            groq: GroqProviderConfig {
                host: groq.host.clone(),
                api_key: groq.api_key.clone().map(ApiKey::new),
                temperature: Some(groq.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
                max_tokens: Some(groq.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            },
        }
    }

    pub fn relay_policy(&self) -> RelayPolicy {
        RelayPolicy {
            guest_max_payload_bytes: self.guest.max_payload_bytes,
        }
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_guest_max_payload_bytes() -> usize {
    DEFAULT_GUEST_MAX_PAYLOAD_BYTES
}

fn default_openrouter_host() -> String {
    OPENROUTER_HOST.to_string()
}

fn default_groq_host() -> String {
    GROQ_HOST.to_string()
}

fn default_app_url() -> String {
    OpenRouterProviderConfig::default().app_url
}

fn default_app_title() -> String {
    OpenRouterProviderConfig::default().app_title
}
