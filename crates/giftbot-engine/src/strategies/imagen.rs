use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use giftbot_contracts::providers::{FailureKind, NamedProvider, ProviderFailure, ProviderResult};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use super::{ImageJob, ImageRef, ImageStrategy};
use crate::http::{endpoint_for_model, post_json};

pub const IMAGEN_GENERATE_MODEL: &str = "imagen-3.0-generate-002";
pub const IMAGEN_EDIT_MODEL: &str = "imagen-3.0-capability-001";

const IMAGEN: &str = "imagen";

/// Dedicated image model over `:predict`; edits use a capability model with
/// the source as a raw reference image.
pub struct ImagenStrategy {
    api_base: String,
    api_key: String,
    generate_model: String,
    edit_model: String,
    timeout: Duration,
    http: HttpClient,
}

impl ImagenStrategy {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            generate_model: IMAGEN_GENERATE_MODEL.to_string(),
            edit_model: IMAGEN_EDIT_MODEL.to_string(),
            timeout,
            http: HttpClient::new(),
        }
    }

    pub fn with_models(mut self, generate_model: impl Into<String>, edit_model: impl Into<String>) -> Self {
        self.generate_model = generate_model.into();
        self.edit_model = edit_model.into();
        self
    }

    fn build_payload(job: &ImageJob) -> Value {
        match job.source.as_ref() {
            Some(source) => json!({
                "instances": [{
                    "prompt": job.prompt,
                    "referenceImages": [{
                        "referenceType": "REFERENCE_TYPE_RAW",
                        "referenceId": 1,
                        "referenceImage": { "bytesBase64Encoded": BASE64.encode(&source.bytes) },
                    }],
                }],
                "parameters": { "sampleCount": 1, "editMode": "EDIT_MODE_DEFAULT" },
            }),
            None => json!({
                "instances": [{ "prompt": job.prompt }],
                "parameters": { "sampleCount": 1, "aspectRatio": job.size.aspect_ratio() },
            }),
        }
    }

    fn extract_image(payload: &Value) -> Result<ImageRef, ProviderFailure> {
        let predictions = payload
            .get("predictions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut filtered = None;
        for prediction in predictions {
            let Some(data) = prediction
                .get("bytesBase64Encoded")
                .and_then(Value::as_str)
                .filter(|data| !data.is_empty())
            else {
                if filtered.is_none() {
                    filtered = prediction
                        .get("raiFilteredReason")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                continue;
            };
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                ProviderFailure::new(
                    IMAGEN,
                    FailureKind::Malformed,
                    format!("image base64 decode failed: {err}"),
                )
            })?;
            let mime_type = prediction
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            return Ok(ImageRef::from_bytes(mime_type, &bytes));
        }
        let detail = match filtered {
            Some(reason) => format!("no image returned (filtered: {reason})"),
            None => "no image returned".to_string(),
        };
        Err(ProviderFailure::new(IMAGEN, FailureKind::Empty, detail))
    }
}

impl NamedProvider for ImagenStrategy {
    fn name(&self) -> &str {
        IMAGEN
    }
}

impl ImageStrategy for ImagenStrategy {
    fn render(&self, job: &ImageJob) -> ProviderResult<ImageRef> {
        let model = if job.is_edit() {
            &self.edit_model
        } else {
            &self.generate_model
        };
        let endpoint = endpoint_for_model(&self.api_base, model, "predict");
        post_json(
            &self.http,
            IMAGEN,
            &endpoint,
            &self.api_key,
            &Self::build_payload(job),
            self.timeout,
        )
        .and_then(|response| Self::extract_image(&response))
        .into()
    }
}

#[cfg(test)]
mod tests {
    use giftbot_contracts::chat::{ImageSize, SourceImage};

    use super::*;

    fn job(source: Option<SourceImage>) -> ImageJob {
        ImageJob {
            prompt: "a wooden train".to_string(),
            size: ImageSize { width: 1344, height: 768 },
            source,
        }
    }

    #[test]
    fn generate_payload_uses_aspect_ratio() {
        let payload = ImagenStrategy::build_payload(&job(None));
        assert_eq!(payload["instances"][0]["prompt"], json!("a wooden train"));
        assert_eq!(payload["parameters"]["sampleCount"], json!(1));
        assert_eq!(payload["parameters"]["aspectRatio"], json!("16:9"));
    }

    #[test]
    fn edit_payload_carries_raw_reference() {
        let payload = ImagenStrategy::build_payload(&job(Some(SourceImage {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
        })));
        let reference = &payload["instances"][0]["referenceImages"][0];
        assert_eq!(reference["referenceType"], json!("REFERENCE_TYPE_RAW"));
        assert_eq!(
            reference["referenceImage"]["bytesBase64Encoded"],
            json!(BASE64.encode([1u8, 2, 3]))
        );
        assert!(payload["parameters"].get("aspectRatio").is_none());
    }

    #[test]
    fn extraction_takes_first_prediction() {
        let payload = json!({
            "predictions": [
                { "raiFilteredReason": "blocked" },
                { "bytesBase64Encoded": BASE64.encode(b"jpeg"), "mimeType": "image/jpeg" }
            ]
        });
        let image = ImagenStrategy::extract_image(&payload).unwrap();
        assert_eq!(
            image.decode_data_uri(),
            Some(("image/jpeg".to_string(), b"jpeg".to_vec()))
        );
    }

    #[test]
    fn filtered_predictions_are_empty() {
        let payload = json!({ "predictions": [{ "raiFilteredReason": "child safety" }] });
        let failure = ImagenStrategy::extract_image(&payload).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Empty);
        assert_eq!(failure.detail, "no image returned (filtered: child safety)");
        assert_eq!(
            ImagenStrategy::extract_image(&json!({})).unwrap_err().detail,
            "no image returned"
        );
    }
}
