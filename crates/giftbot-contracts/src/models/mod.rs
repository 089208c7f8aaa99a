mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, EDIT, IMAGE, MULTIMODAL_IMAGE, TEXT};
pub use selectors::{ModelSelection, ModelSelector};
