use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use giftbot_contracts::providers::{FailureKind, ProviderFailure};
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

/// POST a JSON payload to a Google generative endpoint.
///
/// The key travels in a header so it never shows up in error text.
pub(crate) fn post_json(
    http: &HttpClient,
    strategy: &str,
    endpoint: &str,
    api_key: &str,
    payload: &Value,
    timeout: Duration,
) -> Result<Value, ProviderFailure> {
    if api_key.trim().is_empty() {
        return Err(ProviderFailure::new(
            strategy,
            FailureKind::MissingCredential,
            "no API key configured",
        ));
    }
    let response = http
        .post(endpoint)
        .header("x-goog-api-key", api_key)
        .timeout(timeout)
        .json(payload)
        .send()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("request to {endpoint} failed"))
        .map_err(|err| failure_from_error(strategy, &err))?;
    response_json_or_failure(strategy, response)
}

pub(crate) fn endpoint_for_model(api_base: &str, model: &str, method: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{}/{}:{method}", api_base.trim_end_matches('/'), model_path)
}

/// Read a provider response as JSON, classifying non-2xx statuses.
pub(crate) fn response_json_or_failure(
    strategy: &str,
    response: HttpResponse,
) -> Result<Value, ProviderFailure> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .context("response body read failed")
        .map_err(|err| failure_from_error(strategy, &err))?;
    if !status.is_success() {
        return Err(ProviderFailure::new(
            strategy,
            classify_status(code, &body),
            format!("request failed ({code}): {}", truncate_text(&body, 512)),
        ));
    }
    serde_json::from_str(&body).map_err(|err| {
        ProviderFailure::new(
            strategy,
            FailureKind::Malformed,
            format!("invalid JSON payload: {err}"),
        )
    })
}

pub(crate) fn classify_status(code: u16, body: &str) -> FailureKind {
    let lowered = body.to_ascii_lowercase();
    match code {
        401 | 403 => FailureKind::Auth,
        404 => FailureKind::Unsupported,
        400 if [
            "not supported",
            "not found",
            "only supports",
            "response modalities",
            "not available",
        ]
        .iter()
        .any(|needle| lowered.contains(needle)) =>
        {
            FailureKind::Unsupported
        }
        408 | 504 => FailureKind::Timeout,
        _ => FailureKind::Transport,
    }
}

/// Convert a transport-level error chain into a strategy failure.
pub(crate) fn failure_from_error(strategy: &str, err: &anyhow::Error) -> ProviderFailure {
    let timed_out = err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(reqwest::Error::is_timeout)
            .unwrap_or(false)
    });
    let kind = if timed_out {
        FailureKind::Timeout
    } else {
        FailureKind::Transport
    };
    ProviderFailure::new(strategy, kind, error_chain_text(err, 512))
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().map(|last| last == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(401, ""), FailureKind::Auth);
        assert_eq!(classify_status(403, "denied"), FailureKind::Auth);
        assert_eq!(classify_status(404, "models/x is not found"), FailureKind::Unsupported);
        assert_eq!(
            classify_status(
                400,
                r#"{"error":{"message":"Model does not support the requested response modalities: image"}}"#
            ),
            FailureKind::Unsupported
        );
        assert_eq!(classify_status(400, "bad prompt"), FailureKind::Transport);
        assert_eq!(classify_status(429, "quota"), FailureKind::Transport);
        assert_eq!(classify_status(504, ""), FailureKind::Timeout);
    }

    #[test]
    fn error_chain_collapses_duplicates() {
        let err = anyhow::anyhow!("connection reset")
            .context("connection reset")
            .context("Gemini request failed");
        assert_eq!(
            error_chain_text(&err, 200),
            "Gemini request failed | caused by: connection reset"
        );
        assert_eq!(failure_from_error("gemini-text", &err).kind, FailureKind::Transport);
    }

    #[test]
    fn endpoint_accepts_prefixed_models() {
        assert_eq!(
            endpoint_for_model("https://api.test/v1beta/", "gemini-2.0-flash", "generateContent"),
            "https://api.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            endpoint_for_model("https://api.test/v1beta", "models/imagen-3.0-generate-002", "predict"),
            "https://api.test/v1beta/models/imagen-3.0-generate-002:predict"
        );
    }

    #[test]
    fn blank_key_fails_before_sending() {
        let failure = post_json(
            &HttpClient::new(),
            "imagen",
            "http://127.0.0.1:9/never",
            " ",
            &Value::Null,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(failure.kind, FailureKind::MissingCredential);
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }

    #[test]
    fn data_uri_prefix() {
        assert_eq!(data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}
