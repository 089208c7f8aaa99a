use std::fmt;

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const HISTORY_LIMIT: usize = 20;
pub const MAX_EDIT_IMAGE_BYTES: usize = 4 * 1024 * 1024;
pub const ACCEPTED_IMAGE_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];
pub const DEFAULT_IMAGE_SIZE: ImageSize = ImageSize {
    width: 1024,
    height: 1024,
};

const MIN_IMAGE_SIDE: u32 = 256;
const MAX_IMAGE_SIDE: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Bn,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Language> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Language::En),
            "bn" | "bengali" | "bangla" | "বাংলা" => Some(Language::Bn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Bn => "bn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Chat,
    Voice,
    Recommend,
    GenerateImage,
    EditImage,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Chat => "chat",
            RequestKind::Voice => "voice",
            RequestKind::Recommend => "recommend",
            RequestKind::GenerateImage => "generate_image",
            RequestKind::EditImage => "edit_image",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, RequestKind::GenerateImage | RequestKind::EditImage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn parse(raw: &str) -> Option<ImageSize> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "square" => return Some(DEFAULT_IMAGE_SIZE),
            "portrait" | "tall" => {
                return Some(ImageSize {
                    width: 768,
                    height: 1344,
                })
            }
            "landscape" | "wide" => {
                return Some(ImageSize {
                    width: 1344,
                    height: 768,
                })
            }
            _ => {}
        }
        let (w, h) = normalized.split_once('x')?;
        let width = w.trim().parse::<u32>().ok()?;
        let height = h.trim().parse::<u32>().ok()?;
        let side = MIN_IMAGE_SIDE..=MAX_IMAGE_SIDE;
        if !side.contains(&width) || !side.contains(&height) {
            return None;
        }
        Some(ImageSize { width, height })
    }

    /// Closest supported aspect ratio label.
    pub fn aspect_ratio(&self) -> &'static str {
        let ratio = self.width as f64 / self.height as f64;
        let candidates = [
            ("1:1", 1.0f64),
            ("3:4", 3.0 / 4.0),
            ("4:3", 4.0 / 3.0),
            ("9:16", 9.0 / 16.0),
            ("16:9", 16.0 / 9.0),
        ];
        let mut best = "1:1";
        let mut delta = f64::MAX;
        for (name, value) in candidates {
            let current = (ratio - value).abs();
            if current < delta {
                delta = current;
                best = name;
            }
        }
        best
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum RawInput {
    Chat {
        message: String,
        history: Vec<ChatTurn>,
        language: Language,
    },
    Voice {
        transcript: String,
        history: Vec<ChatTurn>,
        language: Language,
    },
    Search {
        query: String,
        language: Language,
    },
    Generate {
        prompt: String,
        size: Option<String>,
    },
    Edit {
        image: Vec<u8>,
        mime_type: String,
        instruction: String,
    },
}

/// Canonical, validated request. Only [`normalize`] builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    kind: RequestKind,
    text: String,
    image: Option<SourceImage>,
    size: Option<ImageSize>,
    language: Language,
    history: Vec<ChatTurn>,
}

impl NormalizedRequest {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn size(&self) -> ImageSize {
        self.size.unwrap_or(DEFAULT_IMAGE_SIZE)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.history.as_slice()
    }
}

pub fn normalize(input: RawInput) -> Result<NormalizedRequest, ValidationError> {
    match input {
        RawInput::Chat {
            message,
            history,
            language,
        } => Ok(NormalizedRequest {
            kind: RequestKind::Chat,
            text: required_text("message", &message)?,
            image: None,
            size: None,
            language,
            history: trim_history(history),
        }),
        RawInput::Voice {
            transcript,
            history,
            language,
        } => Ok(NormalizedRequest {
            kind: RequestKind::Voice,
            text: required_text("transcript", &transcript)?,
            image: None,
            size: None,
            language,
            history: trim_history(history),
        }),
        RawInput::Search { query, language } => Ok(NormalizedRequest {
            kind: RequestKind::Recommend,
            text: required_text("query", &query)?,
            image: None,
            size: None,
            language,
            history: Vec::new(),
        }),
        RawInput::Generate { prompt, size } => {
            let text = required_text("prompt", &prompt)?;
            let size = match size.as_deref() {
                None => DEFAULT_IMAGE_SIZE,
                Some(raw) => ImageSize::parse(raw).ok_or_else(|| {
                    ValidationError::new(
                        "size",
                        format!(
                            "'{raw}' is not WxH ({MIN_IMAGE_SIDE}..={MAX_IMAGE_SIDE}) or square/portrait/landscape"
                        ),
                    )
                })?,
            };
            Ok(NormalizedRequest {
                kind: RequestKind::GenerateImage,
                text,
                image: None,
                size: Some(size),
                language: Language::En,
                history: Vec::new(),
            })
        }
        RawInput::Edit {
            image,
            mime_type,
            instruction,
        } => {
            let source = validate_source_image(image, &mime_type)?;
            let text = required_text("instruction", &instruction)?;
            Ok(NormalizedRequest {
                kind: RequestKind::EditImage,
                text,
                image: Some(source),
                size: Some(DEFAULT_IMAGE_SIZE),
                language: Language::En,
                history: Vec::new(),
            })
        }
    }
}

/// Keep the most recent turns, dropping blank ones.
pub fn trim_history(history: Vec<ChatTurn>) -> Vec<ChatTurn> {
    let kept: Vec<ChatTurn> = history
        .into_iter()
        .filter(|turn| !turn.text.trim().is_empty())
        .collect();
    let skip = kept.len().saturating_sub(HISTORY_LIMIT);
    kept.into_iter().skip(skip).collect()
}

pub fn normalize_mime_type(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let base = lowered.split(';').next().unwrap_or_default().trim();
    if base == "image/jpg" {
        return "image/jpeg".to_string();
    }
    base.to_string()
}

fn required_text(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_source_image(bytes: Vec<u8>, mime_type: &str) -> Result<SourceImage, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::new("image", "no image data supplied"));
    }
    if bytes.len() > MAX_EDIT_IMAGE_BYTES {
        return Err(ValidationError::new(
            "image",
            format!(
                "{} bytes exceeds the {} byte limit",
                bytes.len(),
                MAX_EDIT_IMAGE_BYTES
            ),
        ));
    }
    let mime_type = normalize_mime_type(mime_type);
    if !ACCEPTED_IMAGE_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::new(
            "mime_type",
            format!(
                "'{mime_type}' is not one of {}",
                ACCEPTED_IMAGE_MIME_TYPES.join(", ")
            ),
        ));
    }
    let sniffed = image::guess_format(&bytes)
        .map_err(|_| ValidationError::new("image", "data is not a recognizable image"))?;
    let sniffed_mime = match sniffed {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        other => {
            return Err(ValidationError::new(
                "image",
                format!("unsupported image format {other:?}"),
            ))
        }
    };
    if sniffed_mime != mime_type {
        return Err(ValidationError::new(
            "image",
            format!("declared {mime_type} but data looks like {sniffed_mime}"),
        ));
    }
    Ok(SourceImage { bytes, mime_type })
}
