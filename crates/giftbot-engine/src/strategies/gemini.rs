use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use giftbot_contracts::chat::Role;
use giftbot_contracts::providers::{FailureKind, NamedProvider, ProviderFailure, ProviderResult};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use super::{ImageJob, ImageRef, ImageStrategy, TextPrompt, TextStrategy};
use crate::http::{endpoint_for_model, post_json};
use crate::prompts::{image_edit_prompt, image_generation_prompt};

pub const GEMINI_TEXT: &str = "gemini-text";
pub const GEMINI_IMAGE: &str = "gemini-image";

pub struct GeminiTextStrategy {
    api_base: String,
    api_key: String,
    model: String,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiTextStrategy {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
            http: HttpClient::new(),
        }
    }

    fn build_payload(prompt: &TextPrompt) -> Value {
        let mut contents: Vec<Value> = prompt
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.text }] })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": prompt.message }] }));
        json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": contents,
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 1024 },
        })
    }

    fn extract_text(payload: &Value) -> Result<String, ProviderFailure> {
        let mut out = String::new();
        for part in candidate_parts(payload) {
            if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        let text = out.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }
        let detail = match block_reason(payload) {
            Some(reason) => format!("no text returned (blocked: {reason})"),
            None => "no text returned".to_string(),
        };
        Err(ProviderFailure::new(GEMINI_TEXT, FailureKind::Empty, detail))
    }
}

impl NamedProvider for GeminiTextStrategy {
    fn name(&self) -> &str {
        GEMINI_TEXT
    }
}

impl TextStrategy for GeminiTextStrategy {
    fn complete(&self, prompt: &TextPrompt) -> ProviderResult<String> {
        let endpoint = endpoint_for_model(&self.api_base, &self.model, "generateContent");
        let payload = Self::build_payload(prompt);
        post_json(
            &self.http,
            GEMINI_TEXT,
            &endpoint,
            &self.api_key,
            &payload,
            self.timeout,
        )
        .and_then(|response| Self::extract_text(&response))
        .into()
    }
}

/// Image output through `generateContent`, walking several model variants.
pub struct GeminiImageStrategy {
    api_base: String,
    api_key: String,
    variants: Vec<String>,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiImageStrategy {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        variants: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            variants,
            timeout,
            http: HttpClient::new(),
        }
    }

    fn build_payload(job: &ImageJob) -> Value {
        let mut parts = Vec::new();
        let text = match job.source.as_ref() {
            Some(source) => {
                parts.push(json!({
                    "inlineData": {
                        "mimeType": source.mime_type,
                        "data": BASE64.encode(&source.bytes),
                    }
                }));
                image_edit_prompt(&job.prompt)
            }
            None => image_generation_prompt(&job.prompt, job.size),
        };
        parts.push(json!({ "text": text }));
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        })
    }

    fn extract_image(payload: &Value) -> Result<ImageRef, ProviderFailure> {
        for part in candidate_parts(payload) {
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object);
            let Some(inline) = inline else {
                continue;
            };
            let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                ProviderFailure::new(
                    GEMINI_IMAGE,
                    FailureKind::Malformed,
                    format!("image base64 decode failed: {err}"),
                )
            })?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    image::guess_format(&bytes)
                        .ok()
                        .map(|format| format.to_mime_type().to_string())
                })
                .unwrap_or_else(|| "image/png".to_string());
            return Ok(ImageRef::from_bytes(&mime_type, &bytes));
        }
        let detail = match block_reason(payload) {
            Some(reason) => format!("no image returned (blocked: {reason})"),
            None => "no image returned".to_string(),
        };
        Err(ProviderFailure::new(GEMINI_IMAGE, FailureKind::Empty, detail))
    }

    fn render_with(&self, model: &str, payload: &Value) -> Result<ImageRef, ProviderFailure> {
        let endpoint = endpoint_for_model(&self.api_base, model, "generateContent");
        post_json(
            &self.http,
            GEMINI_IMAGE,
            &endpoint,
            &self.api_key,
            payload,
            self.timeout,
        )
        .and_then(|response| Self::extract_image(&response))
    }
}

impl NamedProvider for GeminiImageStrategy {
    fn name(&self) -> &str {
        GEMINI_IMAGE
    }
}

impl ImageStrategy for GeminiImageStrategy {
    fn render(&self, job: &ImageJob) -> ProviderResult<ImageRef> {
        if self.variants.is_empty() {
            return ProviderResult::Failure(ProviderFailure::new(
                GEMINI_IMAGE,
                FailureKind::Unsupported,
                "no multimodal image models registered",
            ));
        }
        let payload = Self::build_payload(job);
        let mut failures = Vec::new();
        for model in &self.variants {
            match self.render_with(model, &payload) {
                Ok(image) => return ProviderResult::Success(image),
                Err(failure) => {
                    tracing::debug!(
                        model = model.as_str(),
                        kind = failure.kind.as_str(),
                        "gemini image variant failed"
                    );
                    failures.push((model.as_str(), failure));
                }
            }
        }
        ProviderResult::Failure(combine_variant_failures(&failures))
    }
}

/// One failure for the whole variant walk. The kind is the first
/// non-`Unsupported` kind seen, so a transient error is not reported as a
/// capability gap.
fn combine_variant_failures(failures: &[(&str, ProviderFailure)]) -> ProviderFailure {
    let kind = failures
        .iter()
        .map(|(_, failure)| failure.kind)
        .find(|kind| *kind != FailureKind::Unsupported)
        .unwrap_or(FailureKind::Unsupported);
    let detail = failures
        .iter()
        .map(|(model, failure)| format!("{model}: {}", failure.detail))
        .collect::<Vec<String>>()
        .join("; ");
    ProviderFailure::new(GEMINI_IMAGE, kind, detail)
}

fn candidate_parts(payload: &Value) -> Vec<&Value> {
    payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| {
            candidates
                .iter()
                .filter_map(|candidate| {
                    candidate
                        .get("content")
                        .and_then(|content| content.get("parts"))
                        .and_then(Value::as_array)
                })
                .flatten()
                .collect()
        })
        .unwrap_or_default()
}

fn block_reason(payload: &Value) -> Option<String> {
    payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            payload
                .get("candidates")
                .and_then(Value::as_array)
                .and_then(|candidates| candidates.first())
                .and_then(|candidate| candidate.get("finishReason"))
                .and_then(Value::as_str)
                .filter(|reason| *reason != "STOP")
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use giftbot_contracts::chat::{ChatTurn, ImageSize, SourceImage};

    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn text_payload_maps_roles_and_system() {
        let prompt = TextPrompt {
            system: "be kind".to_string(),
            history: vec![ChatTurn::user("hi"), ChatTurn::assistant("hello!")],
            message: "robot under 1500".to_string(),
        };
        let payload = GeminiTextStrategy::build_payload(&prompt);
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], json!("be kind"));
        let contents = payload["contents"].as_array().cloned().unwrap_or_default();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], json!("model"));
        assert_eq!(contents[2]["parts"][0]["text"], json!("robot under 1500"));
    }

    #[test]
    fn text_extraction_skips_thoughts() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "thinking...", "thought": true },
                { "text": "Try the Rainbow Stacker " },
                { "text": "(₹1199)." }
            ]}}]
        });
        assert_eq!(
            GeminiTextStrategy::extract_text(&payload).ok().as_deref(),
            Some("Try the Rainbow Stacker (₹1199).")
        );
    }

    #[test]
    fn blank_text_is_empty_failure() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] }, "finishReason": "SAFETY" }]
        });
        let failure = GeminiTextStrategy::extract_text(&payload).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Empty);
        assert!(failure.detail.contains("SAFETY"));
    }

    #[test]
    fn image_payload_inlines_edit_source() {
        let job = ImageJob {
            prompt: "add a party hat".to_string(),
            size: ImageSize { width: 1024, height: 1024 },
            source: Some(SourceImage {
                bytes: PNG_HEADER.to_vec(),
                mime_type: "image/png".to_string(),
            }),
        };
        let payload = GeminiImageStrategy::build_payload(&job);
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert!(parts[1]["text"].as_str().unwrap_or("").contains("add a party hat"));
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn image_extraction_sniffs_missing_mime() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "inlineData": { "data": BASE64.encode(PNG_HEADER) } }
            ]}}]
        });
        let image = GeminiImageStrategy::extract_image(&payload).unwrap();
        let (mime_type, bytes) = image.decode_data_uri().unwrap();
        assert_eq!(mime_type, "image/png");
        assert_eq!(bytes, PNG_HEADER);
    }

    #[test]
    fn image_extraction_reports_bad_base64_and_absence() {
        let bad = json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "%%%" } }] } }]
        });
        assert_eq!(
            GeminiImageStrategy::extract_image(&bad).unwrap_err().kind,
            FailureKind::Malformed
        );
        let text_only = json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        });
        assert_eq!(
            GeminiImageStrategy::extract_image(&text_only).unwrap_err().kind,
            FailureKind::Empty
        );
    }

    #[test]
    fn variant_failures_prefer_transient_kind() {
        let failures = vec![
            (
                "a",
                ProviderFailure::new(GEMINI_IMAGE, FailureKind::Unsupported, "no image output"),
            ),
            (
                "b",
                ProviderFailure::new(GEMINI_IMAGE, FailureKind::Timeout, "timed out"),
            ),
        ];
        let combined = combine_variant_failures(&failures);
        assert_eq!(combined.kind, FailureKind::Timeout);
        assert_eq!(combined.detail, "a: no image output; b: timed out");

        let only_unsupported = combine_variant_failures(&failures[..1]);
        assert_eq!(only_unsupported.kind, FailureKind::Unsupported);
    }

    #[test]
    fn missing_key_and_empty_variants_fail_fast() {
        let job = ImageJob {
            prompt: "a kite".to_string(),
            size: ImageSize { width: 1024, height: 1024 },
            source: None,
        };
        let no_variants =
            GeminiImageStrategy::new("http://127.0.0.1:9", "key", Vec::new(), Duration::from_secs(1));
        match no_variants.render(&job) {
            ProviderResult::Failure(failure) => assert_eq!(failure.kind, FailureKind::Unsupported),
            ProviderResult::Success(_) => panic!("expected failure"),
        }

        let no_key = GeminiTextStrategy::new(
            "http://127.0.0.1:9",
            "",
            "gemini-2.0-flash",
            Duration::from_secs(1),
        );
        let prompt = TextPrompt {
            system: String::new(),
            history: Vec::new(),
            message: "hi".to_string(),
        };
        match no_key.complete(&prompt) {
            ProviderResult::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::MissingCredential)
            }
            ProviderResult::Success(_) => panic!("expected failure"),
        }
    }
}
