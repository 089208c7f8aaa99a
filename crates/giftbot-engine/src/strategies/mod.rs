mod gemini;
mod imagen;
mod keyless;

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use giftbot_contracts::chat::{ChatTurn, ImageSize, SourceImage};
use giftbot_contracts::providers::{NamedProvider, ProviderResult};
use serde::Serialize;

pub use gemini::{GeminiImageStrategy, GeminiTextStrategy};
pub use imagen::{ImagenStrategy, IMAGEN_EDIT_MODEL, IMAGEN_GENERATE_MODEL};
pub use keyless::{keyless_image_url, KeylessUrlStrategy};

/// One model turn: fixed instructions, prior turns, and the new message.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrompt {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
}

/// Work for an image strategy. `source` is set for edits only.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    pub prompt: String,
    pub size: ImageSize,
    pub source: Option<SourceImage>,
}

impl ImageJob {
    pub fn is_edit(&self) -> bool {
        self.source.is_some()
    }
}

/// A deliverable image: inline bytes as a data URI, or a public URL.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ImageRef {
    DataUri(String),
    Url(String),
}

impl ImageRef {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        ImageRef::DataUri(crate::http::data_uri(mime_type, bytes))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::DataUri(value) | ImageRef::Url(value) => value,
        }
    }

    /// Mime type and bytes of a data URI; `None` for URLs or bad payloads.
    pub fn decode_data_uri(&self) -> Option<(String, Vec<u8>)> {
        let ImageRef::DataUri(value) = self else {
            return None;
        };
        let rest = value.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        let bytes = BASE64.decode(data.as_bytes()).ok()?;
        Some((mime_type.to_string(), bytes))
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::DataUri(value) => write!(f, "DataUri({} chars)", value.len()),
            ImageRef::Url(value) => write!(f, "Url({value})"),
        }
    }
}

pub trait TextStrategy: NamedProvider + Send + Sync {
    fn complete(&self, prompt: &TextPrompt) -> ProviderResult<String>;
}

pub trait ImageStrategy: NamedProvider + Send + Sync {
    fn render(&self, job: &ImageJob) -> ProviderResult<ImageRef>;

    /// Strategies that need an API key are skipped without one.
    fn requires_credential(&self) -> bool {
        true
    }

    /// False when an edit job is answered by generating from the
    /// instruction alone.
    fn edits_source(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_decodes_back() {
        let image = ImageRef::from_bytes("image/png", &[1, 2, 3]);
        assert_eq!(
            image.decode_data_uri(),
            Some(("image/png".to_string(), vec![1, 2, 3]))
        );
        assert_eq!(ImageRef::Url("https://x.test/a.png".into()).decode_data_uri(), None);
        assert_eq!(ImageRef::DataUri("data:image/png,abc".into()).decode_data_uri(), None);
    }

    #[test]
    fn debug_hides_payload() {
        let image = ImageRef::from_bytes("image/png", &[0; 64]);
        assert!(format!("{image:?}").starts_with("DataUri("));
    }
}
