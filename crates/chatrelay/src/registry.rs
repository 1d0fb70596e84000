use std::collections::BTreeMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

use crate::errors::{RelayError, RelayResult};
use crate::providers::base::{Provider, ProviderDescriptor};
use crate::providers::configs::ProviderConfigs;
use crate::providers::factory::{get_provider, ProviderType};

/// Lookup table from provider id to adapter.
///
/// Built once at startup and read-only afterwards, so it is shared between
/// requests behind an `Arc` without locking.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Build the registry from the fixed provider table.
    pub fn from_config(configs: &ProviderConfigs) -> RelayResult<Self> {
        let mut builder = Self::builder();
        for provider_type in ProviderType::iter() {
            builder = builder.register(get_provider(provider_type, configs)?);
        }
        Ok(builder.build())
    }

    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    pub fn resolve(&self, provider_id: &str) -> RelayResult<Arc<dyn Provider>> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| RelayError::UnknownProvider(provider_id.to_string()))
    }

    pub fn validate_model(&self, provider_id: &str, model: &str) -> RelayResult<()> {
        let provider = self.resolve(provider_id)?;
        if provider.descriptor().supports(model) {
            Ok(())
        } else {
            Err(RelayError::InvalidModel {
                provider: provider_id.to_string(),
                model: model.to_string(),
            })
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.values().map(|provider| provider.descriptor())
    }
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistryBuilder {
    /// Register an adapter under its descriptor id. A later registration with
    /// the same id replaces the earlier one.
    pub fn register(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.id().to_string(), provider);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::groq::GROQ_MODELS;
    use crate::providers::openrouter::OPENROUTER_MODELS;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::from_config(&ProviderConfigs::default()).unwrap()
    }

    #[test]
    fn test_every_listed_model_validates() {
        let registry = registry();
        for model in GROQ_MODELS {
            assert_eq!(registry.validate_model("groq", model), Ok(()));
        }
        for model in OPENROUTER_MODELS {
            assert_eq!(registry.validate_model("openrouter", model), Ok(()));
        }
    }

    #[test]
    fn test_models_do_not_cross_providers() {
        let registry = registry();
        for model in OPENROUTER_MODELS {
            assert_eq!(
                registry.validate_model("groq", model),
                Err(RelayError::InvalidModel {
                    provider: "groq".to_string(),
                    model: model.to_string(),
                })
            );
        }
        assert!(matches!(
            registry.validate_model("openrouter", "llama3-8b-8192"),
            Err(RelayError::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("unknown"),
            Err(RelayError::UnknownProvider(id)) if id == "unknown"
        ));
        assert_eq!(
            registry.validate_model("unknown", "llama3-8b-8192"),
            Err(RelayError::UnknownProvider("unknown".to_string()))
        );
    }

    #[test]
    fn test_descriptors_are_listed_by_id() {
        let registry = registry();
        let ids: Vec<_> = registry.descriptors().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["groq", "openrouter"]);
    }
}
