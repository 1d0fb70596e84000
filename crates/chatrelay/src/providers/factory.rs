use super::{
    base::Provider, configs::ProviderConfigs, groq::GroqProvider, groq::GROQ_ID,
    openrouter::OpenRouterProvider, openrouter::OPENROUTER_ID,
};
use crate::errors::RelayResult;
use std::sync::Arc;
use strum_macros::EnumIter;

/// The fixed table of upstreams the relay can talk to. Adding a provider
/// means adding a variant here.
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenRouter,
    Groq,
}

impl ProviderType {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderType::OpenRouter => OPENROUTER_ID,
            ProviderType::Groq => GROQ_ID,
        }
    }
}

pub fn get_provider(
    provider_type: ProviderType,
    configs: &ProviderConfigs,
) -> RelayResult<Arc<dyn Provider>> {
    match provider_type {
        ProviderType::OpenRouter => Ok(Arc::new(OpenRouterProvider::new(
            configs.openrouter.clone(),
        )?)),
        ProviderType::Groq => Ok(Arc::new(GroqProvider::new(configs.groq.clone())?)),
    }
}
