//! Stream URL construction
//!
//! Rendition locations handed out by the registry are origin-relative
//! (`/api/videos/42/stream?quality=720p`). Every one of them is resolved
//! against the same delivery origin, so all renditions of a video are
//! fetched from one host regardless of how their paths are shaped.

use crate::{Error, Result, VideoId, ORIGINAL_QUALITY};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Scheme, host and port that serves rendition bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeliveryOrigin(Url);

impl DeliveryOrigin {
    /// Parse an origin such as `http://localhost:8080`.
    ///
    /// Any path, query or fragment is rejected: renditions carry their own
    /// absolute paths.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin.trim_end_matches('/'))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(Error::InvalidConfig(format!(
                "delivery origin must be an http(s) origin: {origin}"
            )));
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "unsupported delivery scheme '{}'",
                url.scheme()
            )));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(Error::InvalidConfig(format!(
                "delivery origin must not carry a path: {origin}"
            )));
        }
        Ok(Self(url))
    }

    /// Derive the origin serving an API base URL (`http://host:8080/api` ->
    /// `http://host:8080`).
    pub fn from_api_base(api_base: &Url) -> Result<Self> {
        let host = api_base
            .host_str()
            .ok_or_else(|| Error::InvalidConfig(format!("API base has no host: {api_base}")))?;
        let mut origin = format!("{}://{}", api_base.scheme(), host);
        if let Some(port) = api_base.port() {
            origin.push_str(&format!(":{port}"));
        }
        Self::parse(&origin)
    }

    /// Resolve a rendition location to an absolute URL.
    ///
    /// Absolute http(s) locations are returned unchanged; anything else is
    /// treated as a path under this origin.
    pub fn resolve(&self, location: &str) -> Result<Url> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::InvalidRenditionRequested(
                "empty stream location".to_string(),
            ));
        }
        if let Ok(absolute) = Url::parse(location) {
            if matches!(absolute.scheme(), "http" | "https") {
                return Ok(absolute);
            }
        }
        // A scheme-relative location names its own host
        if location.starts_with("//") || location.starts_with("\\\\") {
            return Err(Error::InvalidRenditionRequested(format!(
                "stream location leaves the delivery origin: {location}"
            )));
        }

        let (rest, fragment) = match location.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (location, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut url = self.0.clone();
        url.set_path(&format!("/{}", path.trim_start_matches(['/', '\\'])));
        url.set_query(query);
        url.set_fragment(fragment);
        Ok(url)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for DeliveryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

impl TryFrom<String> for DeliveryOrigin {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DeliveryOrigin> for String {
    fn from(origin: DeliveryOrigin) -> Self {
        origin.to_string()
    }
}

/// Registry URL of a rendition's byte stream.
///
/// The original upload is served without a `quality` parameter.
pub fn stream_url(api_base: &Url, video_id: VideoId, quality: Option<&str>) -> Result<Url> {
    let mut url = join_api_path(api_base, &format!("videos/{video_id}/stream"))?;
    if let Some(quality) = quality.filter(|q| *q != ORIGINAL_QUALITY) {
        url.query_pairs_mut().append_pair("quality", quality);
    }
    Ok(url)
}

/// Append a relative path to an API base, keeping the base's own path
/// (`http://host/api` + `videos` -> `http://host/api/videos`).
pub fn join_api_path(api_base: &Url, path: &str) -> Result<Url> {
    let mut base = api_base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> DeliveryOrigin {
        DeliveryOrigin::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_resolve_relative_locations() {
        let origin = origin();
        assert_eq!(
            origin.resolve("/api/videos/42/stream").unwrap().as_str(),
            "http://localhost:8080/api/videos/42/stream"
        );
        assert_eq!(
            origin.resolve("/api/videos/42/stream?quality=720p").unwrap().as_str(),
            "http://localhost:8080/api/videos/42/stream?quality=720p"
        );
        assert_eq!(
            origin.resolve("media/42_1080p.mp4").unwrap().as_str(),
            "http://localhost:8080/media/42_1080p.mp4"
        );
    }

    #[test]
    fn test_resolve_stays_on_origin() {
        let origin = origin();
        assert!(matches!(
            origin.resolve("//evil.example/api/videos/42/stream"),
            Err(Error::InvalidRenditionRequested(_))
        ));

        let url = origin.resolve("/\\evil.example/api/videos/42/stream").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_resolve_absolute_passthrough() {
        let url = origin().resolve("https://cdn.example.com/v/42.mp4").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/v/42.mp4");
    }

    #[test]
    fn test_resolve_empty_rejected() {
        assert!(origin().resolve("  ").is_err());
    }

    #[test]
    fn test_origin_validation() {
        assert!(DeliveryOrigin::parse("http://localhost:8080/").is_ok());
        assert!(DeliveryOrigin::parse("http://localhost:8080/api").is_err());
        assert!(DeliveryOrigin::parse("ftp://localhost").is_err());
        assert!(DeliveryOrigin::parse("not a url").is_err());
    }

    #[test]
    fn test_origin_from_api_base() {
        let base = Url::parse("http://localhost:8080/api").unwrap();
        let origin = DeliveryOrigin::from_api_base(&base).unwrap();
        assert_eq!(origin.to_string(), "http://localhost:8080");

        let base = Url::parse("https://videos.example.com/v2/api/").unwrap();
        let origin = DeliveryOrigin::from_api_base(&base).unwrap();
        assert_eq!(origin.to_string(), "https://videos.example.com");
    }

    #[test]
    fn test_stream_url() {
        let base = Url::parse("http://localhost:8080/api").unwrap();
        assert_eq!(
            stream_url(&base, 7, None).unwrap().as_str(),
            "http://localhost:8080/api/videos/7/stream"
        );
        assert_eq!(
            stream_url(&base, 7, Some("original")).unwrap().as_str(),
            "http://localhost:8080/api/videos/7/stream"
        );
        assert_eq!(
            stream_url(&base, 7, Some("1080p")).unwrap().as_str(),
            "http://localhost:8080/api/videos/7/stream?quality=1080p"
        );
    }

    #[test]
    fn test_origin_serde() {
        let origin: DeliveryOrigin = serde_json::from_str("\"http://media.local:9000\"").unwrap();
        assert_eq!(serde_json::to_string(&origin).unwrap(), "\"http://media.local:9000\"");
        assert!(serde_json::from_str::<DeliveryOrigin>("\"http://media.local/x\"").is_err());
    }
}
