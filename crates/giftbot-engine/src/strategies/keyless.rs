use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use giftbot_contracts::chat::ImageSize;
use giftbot_contracts::providers::{FailureKind, NamedProvider, ProviderFailure, ProviderResult};
use reqwest::blocking::Client as HttpClient;
use reqwest::Url;
use sha2::{Digest, Sha256};

use super::{ImageJob, ImageRef, ImageStrategy};
use crate::http::{classify_status, failure_from_error, truncate_text};

const KEYLESS_URL: &str = "keyless-url";

/// Deterministic image URL for a prompt and size on a public render service.
///
/// The seed is derived from the inputs, so the same request maps to the same
/// URL and the same picture.
pub fn keyless_image_url(base: &str, prompt: &str, size: ImageSize) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid keyless base URL '{base}'"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("keyless base URL '{base}' cannot take a path"))?
        .pop_if_empty()
        .push("prompt")
        .push(prompt);

    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(size.to_string().as_bytes());
    let digest = hasher.finalize();
    let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

    url.query_pairs_mut()
        .append_pair("width", &size.width.to_string())
        .append_pair("height", &size.height.to_string())
        .append_pair("nologo", "true")
        .append_pair("seed", &seed.to_string());
    Ok(url)
}

/// Credential-free last resort. The URL is only handed out after the service
/// has actually rendered an image for it.
pub struct KeylessUrlStrategy {
    base: String,
    timeout: Duration,
    http: HttpClient,
}

impl KeylessUrlStrategy {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base: base.into(),
            timeout,
            http: HttpClient::new(),
        }
    }

    fn confirm(&self, url: &Url) -> Result<(), ProviderFailure> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .context("keyless image request failed")
            .map_err(|err| failure_from_error(KEYLESS_URL, &err))?;
        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().unwrap_or_default();
            return Err(ProviderFailure::new(
                KEYLESS_URL,
                classify_status(code, &body),
                format!("image service returned {code}: {}", truncate_text(&body, 256)),
            ));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(ProviderFailure::new(
                KEYLESS_URL,
                FailureKind::Malformed,
                format!("expected image content, got '{content_type}'"),
            ));
        }
        let bytes = response
            .bytes()
            .context("keyless image body read failed")
            .map_err(|err| failure_from_error(KEYLESS_URL, &err))?;
        if bytes.is_empty() {
            return Err(ProviderFailure::new(
                KEYLESS_URL,
                FailureKind::Empty,
                "image service returned no bytes",
            ));
        }
        image::guess_format(&bytes).map_err(|err| {
            ProviderFailure::new(
                KEYLESS_URL,
                FailureKind::Malformed,
                format!("response is not a recognizable image: {err}"),
            )
        })?;
        Ok(())
    }
}

impl NamedProvider for KeylessUrlStrategy {
    fn name(&self) -> &str {
        KEYLESS_URL
    }
}

impl ImageStrategy for KeylessUrlStrategy {
    fn render(&self, job: &ImageJob) -> ProviderResult<ImageRef> {
        let url = match keyless_image_url(&self.base, &job.prompt, job.size) {
            Ok(url) => url,
            Err(err) => {
                return ProviderResult::Failure(ProviderFailure::new(
                    KEYLESS_URL,
                    FailureKind::Transport,
                    format!("{err:#}"),
                ))
            }
        };
        match self.confirm(&url) {
            Ok(()) => ProviderResult::Success(ImageRef::Url(url.to_string())),
            Err(failure) => ProviderResult::Failure(failure),
        }
    }

    fn requires_credential(&self) -> bool {
        false
    }

    fn edits_source(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";
    const SQUARE: ImageSize = ImageSize {
        width: 1024,
        height: 1024,
    };

    /// Serve one canned HTTP response and hand back the request line.
    fn serve_once(content_type: &'static str, body: &'static [u8]) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
        let base = format!("http://{}", listener.local_addr().expect("stub addr"));
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = stream.read(&mut buf).expect("read request");
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).expect("write head");
            stream.write_all(body).expect("write body");
            let text = String::from_utf8_lossy(&request).to_string();
            text.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    fn job(prompt: &str) -> ImageJob {
        ImageJob {
            prompt: prompt.to_string(),
            size: SQUARE,
            source: None,
        }
    }

    #[test]
    fn url_is_encoded_and_deterministic() -> Result<()> {
        let first = keyless_image_url("https://image.test/", "teddy bear / picnic", SQUARE)?;
        let second = keyless_image_url("https://image.test", "teddy bear / picnic", SQUARE)?;
        assert_eq!(first, second);
        assert!(first
            .as_str()
            .starts_with("https://image.test/prompt/teddy%20bear%20%2F%20picnic?width=1024&height=1024&nologo=true&seed="));

        let other = keyless_image_url("https://image.test", "teddy bear / picnic", ImageSize {
            width: 768,
            height: 1344,
        })?;
        assert_ne!(first, other);
        Ok(())
    }

    #[test]
    fn bad_base_is_an_error() {
        assert!(keyless_image_url("not a url", "kite", SQUARE).is_err());
        assert!(keyless_image_url("mailto:shop@example.com", "kite", SQUARE).is_err());
    }

    #[test]
    fn confirmed_image_yields_url() {
        let (base, handle) = serve_once("image/png", PNG_HEADER);
        let strategy = KeylessUrlStrategy::new(base.clone(), Duration::from_secs(5));
        let result = strategy.render(&job("rainbow kite"));
        let request_line = handle.join().expect("stub thread");
        assert!(request_line.starts_with("GET /prompt/rainbow%20kite?"));
        match result {
            ProviderResult::Success(ImageRef::Url(url)) => assert!(url.starts_with(&base)),
            other => panic!("expected url, got {other:?}"),
        }
    }

    #[test]
    fn html_response_is_rejected() {
        let (base, handle) = serve_once("text/html; charset=utf-8", b"<html>rate limited</html>");
        let strategy = KeylessUrlStrategy::new(base, Duration::from_secs(5));
        let result = strategy.render(&job("rainbow kite"));
        handle.join().expect("stub thread");
        match result {
            ProviderResult::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::Malformed);
                assert!(failure.detail.contains("text/html"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn unsniffable_bytes_are_rejected() {
        let (base, handle) = serve_once("image/png", b"definitely not a png");
        let strategy = KeylessUrlStrategy::new(base, Duration::from_secs(5));
        let result = strategy.render(&job("kite"));
        handle.join().expect("stub thread");
        assert!(matches!(
            result,
            ProviderResult::Failure(ProviderFailure { kind: FailureKind::Malformed, .. })
        ));
    }

    #[test]
    fn stalled_service_times_out_within_the_bound() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
        let base = format!("http://{}", listener.local_addr().expect("stub addr"));
        let (release, released) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            // Hold the connection open without answering.
            let _ = released.recv_timeout(Duration::from_secs(30));
        });

        let strategy = KeylessUrlStrategy::new(base, Duration::from_secs(1));
        let started = Instant::now();
        let result = strategy.render(&job("slow kite"));
        let elapsed = started.elapsed();
        release.send(()).expect("release stub");
        handle.join().expect("stub thread");

        match result {
            ProviderResult::Failure(failure) => assert_eq!(failure.kind, FailureKind::Timeout),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(10), "returned after {elapsed:?}");
    }

    #[test]
    fn keyless_needs_no_credential_and_does_not_edit() {
        let strategy = KeylessUrlStrategy::new("https://image.test", Duration::from_secs(1));
        assert!(!strategy.requires_credential());
        assert!(!strategy.edits_source());
    }
}
