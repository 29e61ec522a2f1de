//! Document references and the proxy fetch that turns them into bytes

use std::fmt;
use std::io::Read;
use std::time::Duration;

use log::{debug, info};

/// Marker in shareable links that forces a download page instead of content
const DOWNLOAD_MARKER: &str = "dl=1";
/// Marker that makes the same link serve the raw document bytes
const RAW_CONTENT_MARKER: &str = "raw=1";

/// No document reference was supplied when the screen was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no document reference provided")]
pub struct MissingReferenceError;

/// Transport level failure while fetching a document through the proxy
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("proxy answered with status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
}

/// Opaque identifier of the remote document, immutable once created
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentReference(String);

impl DocumentReference {
    /// Wrap a raw reference, rejecting absent or blank input
    pub fn new(raw: impl Into<String>) -> Result<Self, MissingReferenceError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(MissingReferenceError);
        }
        Ok(Self(raw))
    }

    /// Build a reference from an optional navigation value
    pub fn from_optional(raw: Option<String>) -> Result<Self, MissingReferenceError> {
        raw.map_or(Err(MissingReferenceError), Self::new)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL that serves raw document content.
    ///
    /// Only the first download marker is rewritten; references without one
    /// are returned unchanged.
    #[must_use]
    pub fn raw_content_url(&self) -> String {
        self.0.replacen(DOWNLOAD_MARKER, RAW_CONTENT_MARKER, 1)
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves a document reference into its bytes.
///
/// Implementations block; callers run them off the interaction thread.
/// A single attempt is made per call and no partial buffer is returned on
/// failure.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, reference: &DocumentReference) -> Result<Vec<u8>, FetchError>;
}

/// Fetches documents with `GET <proxy>?url=<raw content url>`
pub struct ProxySource {
    agent: ureq::Agent,
    proxy_url: String,
}

impl ProxySource {
    #[must_use]
    pub fn new(proxy_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            proxy_url: proxy_url.into(),
        }
    }
}

impl DocumentSource for ProxySource {
    fn fetch(&self, reference: &DocumentReference) -> Result<Vec<u8>, FetchError> {
        let target = reference.raw_content_url();
        debug!("Fetching {target} via {}", self.proxy_url);

        let response = self
            .agent
            .get(&self.proxy_url)
            .query("url", &target)
            .call()
            .map_err(FetchError::from)?;

        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;

        info!("Fetched {} bytes for {reference}", bytes.len());
        Ok(bytes)
    }
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => Self::Status(code),
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reference_is_missing() {
        assert_eq!(DocumentReference::new(""), Err(MissingReferenceError));
        assert_eq!(DocumentReference::new("   "), Err(MissingReferenceError));
        assert_eq!(
            DocumentReference::from_optional(None),
            Err(MissingReferenceError)
        );
    }

    #[test]
    fn download_marker_is_rewritten_once() {
        let reference =
            DocumentReference::new("https://host/file.pdf?dl=1&x=dl=1").expect("valid reference");
        assert_eq!(
            reference.raw_content_url(),
            "https://host/file.pdf?raw=1&x=dl=1"
        );
    }

    #[test]
    fn reference_without_marker_is_untouched() {
        let reference = DocumentReference::new("doc-1").expect("valid reference");
        assert_eq!(reference.raw_content_url(), "doc-1");
        assert_eq!(reference.to_string(), "doc-1");
    }
}
