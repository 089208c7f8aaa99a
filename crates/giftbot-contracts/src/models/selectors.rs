use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Resolve `requested` for `capability`, falling back to the first
    /// registered model that has it.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = match requested {
            Some(name) => {
                if let Some(model) = self.registry.ensure(name, capability) {
                    return Ok(ModelSelection {
                        model: model.clone(),
                        requested: Some(name.to_string()),
                        fallback_reason: None,
                    });
                }
                format!("Model '{name}' does not support '{capability}'; using default.")
            }
            None => "No model specified; using default.".to_string(),
        };

        let Some(model) = self.registry.by_capability(capability).next().cloned() else {
            return Err(format!("No models registered for capability '{capability}'."));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }

    /// Every model for `capability`, in registry order.
    pub fn variants(&self, capability: &str) -> Vec<String> {
        self.registry
            .by_capability(capability)
            .map(|model| model.name.clone())
            .collect()
    }
}
