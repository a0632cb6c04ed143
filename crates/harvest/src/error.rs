// ABOUTME: Error types for the harvester including ErrorCode enum and HarvestError struct.
// ABOUTME: Every error maps to a pipeline Stage so the batch can turn it into an ErrorEntry.

use std::fmt;

use crate::record::Stage;

/// Error codes representing different categories of harvest failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Fetch,
    HttpStatus,
    RenderTimeout,
    Render,
    BrowserUnavailable,
    NoStructure,
}

impl ErrorCode {
    /// The pipeline stage an error of this code belongs to.
    pub fn stage(self) -> Stage {
        match self {
            ErrorCode::NoStructure => Stage::Parse,
            _ => Stage::Fetch,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::HttpStatus => "HTTP error status",
            ErrorCode::RenderTimeout => "render timeout",
            ErrorCode::Render => "render error",
            ErrorCode::BrowserUnavailable => "browser unavailable",
            ErrorCode::NoStructure => "no recognizable staff structure",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for harvest operations.
#[derive(Debug, thiserror::Error)]
pub struct HarvestError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for HarvestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl HarvestError {
    fn with_code(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Fetch (transport) error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Fetch, url, op, source)
    }

    /// Create an HttpStatus error for a non-2xx response.
    pub fn http_status(url: impl Into<String>, op: impl Into<String>, status: u16) -> Self {
        Self::with_code(
            ErrorCode::HttpStatus,
            url,
            op,
            Some(anyhow::anyhow!("HTTP status {}", status)),
        )
    }

    /// Create a RenderTimeout error.
    pub fn render_timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::RenderTimeout, url, op, source)
    }

    /// Create a Render error.
    pub fn render(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Render, url, op, source)
    }

    /// Create a BrowserUnavailable error.
    pub fn browser_unavailable(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::BrowserUnavailable, url, op, source)
    }

    /// Create a NoStructure error.
    pub fn no_structure(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::NoStructure, url, op, source)
    }

    /// Re-address this error to another URL (browser errors are raised before a URL is known).
    pub fn for_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        self.code.stage()
    }

    /// Human-readable description without the URL, suitable for the error log.
    pub fn message(&self) -> String {
        match self.source {
            Some(ref src) => format!("{}: {}", self.code, src),
            None => self.code.to_string(),
        }
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is a transport Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if the server answered with a non-2xx status.
    pub fn is_http_status(&self) -> bool {
        self.code == ErrorCode::HttpStatus
    }

    /// Returns true if this is a RenderTimeout error.
    pub fn is_render_timeout(&self) -> bool {
        self.code == ErrorCode::RenderTimeout
    }

    /// Returns true if the browser could not be launched.
    pub fn is_browser_unavailable(&self) -> bool {
        self.code == ErrorCode::BrowserUnavailable
    }

    /// Returns true if no extraction strategy matched.
    pub fn is_no_structure(&self) -> bool {
        self.code == ErrorCode::NoStructure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_follows_code() {
        assert_eq!(ErrorCode::InvalidUrl.stage(), Stage::Fetch);
        assert_eq!(ErrorCode::HttpStatus.stage(), Stage::Fetch);
        assert_eq!(ErrorCode::RenderTimeout.stage(), Stage::Fetch);
        assert_eq!(ErrorCode::BrowserUnavailable.stage(), Stage::Fetch);
        assert_eq!(ErrorCode::NoStructure.stage(), Stage::Parse);
    }

    #[test]
    fn display_includes_op_url_and_source() {
        let err = HarvestError::http_status("https://dead.edu/404", "Fetch", 404);
        assert_eq!(
            err.to_string(),
            "Fetch https://dead.edu/404: HTTP error status: HTTP status 404"
        );
        assert_eq!(err.message(), "HTTP error status: HTTP status 404");
        assert!(err.is_http_status());
    }

    #[test]
    fn message_without_source_is_code() {
        let err = HarvestError::no_structure("https://a.edu", "Extract", None);
        assert_eq!(err.message(), "no recognizable staff structure");
        assert_eq!(err.stage(), Stage::Parse);
    }

    #[test]
    fn for_url_readdresses() {
        let err = HarvestError::browser_unavailable("", "Launch", None).for_url("https://b.edu");
        assert_eq!(err.url, "https://b.edu");
        assert!(err.is_browser_unavailable());
    }
}
