use indexmap::IndexMap;

pub const TEXT: &str = "text";
pub const IMAGE: &str = "image";
pub const EDIT: &str = "edit";
pub const MULTIMODAL_IMAGE: &str = "multimodal_image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn new(name: &str, capabilities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            capabilities: capabilities.iter().map(|item| (*item).to_string()).collect(),
        }
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Gemini-family models GiftBot can route to, keyed by name. Insertion order
/// is the fallback order within a capability.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_specs([
            ModelSpec::new("gemini-2.0-flash", &[TEXT]),
            ModelSpec::new("gemini-1.5-flash", &[TEXT]),
            ModelSpec::new("imagen-3.0-generate-002", &[IMAGE]),
            ModelSpec::new("imagen-3.0-capability-001", &[EDIT]),
            ModelSpec::new("gemini-2.0-flash-preview-image-generation", &[MULTIMODAL_IMAGE]),
            ModelSpec::new("gemini-2.0-flash-exp", &[TEXT, MULTIMODAL_IMAGE]),
        ])
    }
}

impl ModelRegistry {
    /// Later specs with a repeated name replace earlier ones in place.
    pub fn from_specs(specs: impl IntoIterator<Item = ModelSpec>) -> Self {
        let models = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { models }
    }

    pub fn by_capability(&self, capability: &str) -> impl Iterator<Item = &ModelSpec> + '_ {
        let capability = capability.to_string();
        self.models
            .values()
            .filter(move |model| model.supports(&capability))
    }

    /// The named model, if it is registered and has `capability`.
    pub fn ensure(&self, name: &str, capability: &str) -> Option<&ModelSpec> {
        self.models
            .get(name)
            .filter(|model| model.supports(capability))
    }
}
