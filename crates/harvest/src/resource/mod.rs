// ABOUTME: Static HTTP fetching for directory pages.
// ABOUTME: Handles URL validation, status checks, content-length limits, and charset decoding.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::error::HarvestError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Options for fetching a resource.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
}

/// A page retrieved with a plain GET.
#[derive(Debug, Clone)]
pub struct StaticPage {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl StaticPage {
    /// Decode the body as UTF-8 text, using charset hints from the content-type header.
    pub fn text_utf8(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Validate that `url` is an absolute http(s) URL.
pub fn validate_url(url: &str, op: &str) -> Result<url::Url, HarvestError> {
    if url.is_empty() {
        return Err(HarvestError::invalid_url(url, op, None));
    }

    let parsed = url::Url::parse(url).map_err(|e| {
        HarvestError::invalid_url(url, op, Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(HarvestError::invalid_url(
            url,
            op,
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    Ok(parsed)
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

/// Fetch a page with a single GET.
///
/// Transport problems map to `ErrorCode::Fetch`; a non-2xx answer maps to
/// `ErrorCode::HttpStatus`.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<StaticPage, HarvestError> {
    validate_url(url, "Fetch")?;

    let mut request = client.get(url);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            "request timed out"
        } else if e.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        HarvestError::fetch(url, "Fetch", Some(anyhow::anyhow!("{}: {}", reason, e)))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::http_status(url, "Fetch", status.as_u16()));
    }

    let content_length = response.content_length().or_else(|| {
        response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    });

    if let Some(len) = content_length {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(HarvestError::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    let body = response.bytes().await.map_err(|e| {
        HarvestError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("failed to read body: {}", e)),
        )
    })?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(HarvestError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    debug!(url, status = status.as_u16(), bytes = body.len(), "static fetch complete");

    Ok(StaticPage {
        status: status.as_u16(),
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn create_test_client() -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent("test-agent")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok_utf8() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/staff");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<table></table>");
        });

        let client = create_test_client();
        let result = fetch(&client, &server.url("/staff"), &FetchOptions::default()).await;
        mock.assert();

        let page = result.expect("fetch should succeed");
        assert_eq!(page.status, 200);
        assert_eq!(page.text_utf8(), "<table></table>");
    }

    #[tokio::test]
    async fn test_fetch_sends_custom_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/staff").header("x-team", "athletics");
            then.status(200).body("ok");
        });

        let client = create_test_client();
        let mut opts = FetchOptions::default();
        opts.headers
            .insert("x-team".to_string(), "athletics".to_string());

        let result = fetch(&client, &server.url("/staff"), &opts).await;
        mock.assert();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_status_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/404");
            then.status(404).body("not found");
        });

        let client = create_test_client();
        let result = fetch(&client, &server.url("/404"), &FetchOptions::default()).await;
        mock.assert();

        let err = result.expect_err("should fail on 404");
        assert!(err.is_http_status());
        assert!(err.message().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = create_test_client();
        let url = format!("http://127.0.0.1:{}/staff", port);

        let err = fetch(&client, &url, &FetchOptions::default())
            .await
            .expect_err("closed port should fail");
        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_urls() {
        let client = create_test_client();
        for url in ["", "not a url", "ftp://example.edu/staff"] {
            let err = fetch(&client, url, &FetchOptions::default())
                .await
                .expect_err("bad URL should fail");
            assert!(err.is_invalid_url(), "{url} should be invalid");
        }
    }

    #[test]
    fn test_max_content_length_constant() {
        assert_eq!(MAX_CONTENT_LENGTH, 10 * 1024 * 1024);
    }

    #[test]
    fn test_decode_iso_8859_1_with_charset() {
        let iso_bytes: &[u8] = &[0x4a, 0x6f, 0x73, 0xe9]; // "José"
        let decoded = decode_body(iso_bytes, Some("text/html; charset=ISO-8859-1"));
        assert_eq!(decoded, "José");
    }

    #[test]
    fn test_extract_charset() {
        assert_eq!(
            extract_charset("text/html; charset=utf-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            extract_charset("text/html; charset=\"utf-8\""),
            Some("utf-8".to_string())
        );
        assert_eq!(extract_charset("text/html"), None);
    }
}
