//! HTTP client for the video registry
//!
//! Covers the registry's CRUD surface (list, details, upload, delete) and
//! the stream URL scheme. Also serves as the production
//! [`RenditionResolver`].

use crate::{
    config::ClientConfig,
    delivery::{self, DeliveryOrigin},
    resolver::{into_metadata_error, validate_details, RenditionResolver},
    Error, Result, VideoDetails, VideoId, VideoMetadata,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};
use url::Url;

/// Video registry client
#[derive(Debug, Clone)]
pub struct VideoApiClient {
    http: Client,
    api_base: Url,
    origin: DeliveryOrigin,
}

impl VideoApiClient {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base()?,
            origin: config.delivery_origin()?,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Origin that rendition locations are resolved against
    pub fn delivery_origin(&self) -> &DeliveryOrigin {
        &self.origin
    }

    /// List all videos, newest first as ordered by the registry
    #[instrument(skip(self))]
    pub async fn list_videos(&self) -> Result<Vec<VideoMetadata>> {
        let url = self.endpoint("videos")?;
        let response = Self::check(self.http.get(url).send().await?).await?;
        let videos: Vec<VideoMetadata> = response.json().await?;

        debug!(count = videos.len(), "Fetched video list");
        Ok(videos)
    }

    /// Fetch a video record together with its available renditions
    #[instrument(skip(self))]
    pub async fn get_video(&self, video_id: VideoId) -> Result<VideoDetails> {
        let url = self.endpoint(&format!("videos/{video_id}"))?;
        let response = Self::check(self.http.get(url).send().await?).await?;
        let details: VideoDetails = response.json().await?;

        debug!(
            video_id,
            qualities = details.available_qualities.len(),
            "Fetched video details"
        );
        Ok(details)
    }

    /// Upload a video file from disk.
    ///
    /// The title is trimmed and must not be empty, the file must be
    /// non-empty and have a video extension. The file is streamed rather
    /// than read into memory.
    #[instrument(skip(self))]
    pub async fn upload_video(&self, title: &str, file: &Path) -> Result<VideoMetadata> {
        let content_type = video_content_type(file).ok_or_else(|| {
            Error::InvalidUpload(format!("{} is not a video file", file.display()))
        })?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();

        let handle = File::open(file).await?;
        let size = handle.metadata().await?.len();
        let title = validate_upload(title, content_type, size)?;

        let body = Body::wrap_stream(ReaderStream::new(handle));
        let part = Part::stream_with_length(body, size);
        self.send_upload(title, &file_name, content_type, part, size).await
    }

    /// Upload in-memory video bytes
    pub async fn upload_bytes(
        &self,
        title: &str,
        file_name: &str,
        content_type: &str,
        data: impl Into<Bytes>,
    ) -> Result<VideoMetadata> {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        let title = validate_upload(title, content_type, size)?;

        let part = Part::stream_with_length(data, size);
        self.send_upload(title, file_name, content_type, part, size).await
    }

    async fn send_upload(
        &self,
        title: &str,
        file_name: &str,
        content_type: &str,
        part: Part,
        size: u64,
    ) -> Result<VideoMetadata> {
        let file_part = part.file_name(file_name.to_string()).mime_str(content_type)?;
        let form = Form::new().text("title", title.to_string()).part("file", file_part);

        let url = self.endpoint("videos/upload")?;
        let response = Self::check(self.http.post(url).multipart(form).send().await?).await?;
        let video: VideoMetadata = response.json().await?;

        info!(video_id = video.id, file = %file_name, size, "Video uploaded");
        Ok(video)
    }

    /// Delete a video and all of its renditions
    #[instrument(skip(self))]
    pub async fn delete_video(&self, video_id: VideoId) -> Result<()> {
        let url = self.endpoint(&format!("videos/{video_id}"))?;
        Self::check(self.http.delete(url).send().await?).await?;

        info!(video_id, "Video deleted");
        Ok(())
    }

    /// Registry URL of a rendition's bytes
    pub fn stream_url(&self, video_id: VideoId, quality: Option<&str>) -> Result<Url> {
        delivery::stream_url(&self.api_base, video_id, quality)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        delivery::join_api_path(&self.api_base, path)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Registry {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                message
            },
        })
    }
}

#[async_trait]
impl RenditionResolver for VideoApiClient {
    async fn resolve(&self, video_id: VideoId) -> Result<VideoDetails> {
        let details = self
            .get_video(video_id)
            .await
            .map_err(|e| into_metadata_error(video_id, e))?;
        validate_details(video_id, &details)?;
        Ok(details)
    }
}

/// Check upload inputs, returning the trimmed title
fn validate_upload<'a>(title: &'a str, content_type: &str, size: u64) -> Result<&'a str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidUpload("title must not be empty".into()));
    }
    if !content_type.starts_with("video/") {
        return Err(Error::InvalidUpload(format!(
            "content type {content_type} is not a video"
        )));
    }
    if size == 0 {
        return Err(Error::InvalidUpload("file is empty".into()));
    }
    Ok(title)
}

/// MIME type for a video file, judged by extension
pub fn video_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        "mpeg" | "mpg" => "video/mpeg",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(video_content_type(Path::new("a/b/clip.MP4")), Some("video/mp4"));
        assert_eq!(video_content_type(Path::new("clip.webm")), Some("video/webm"));
        assert_eq!(video_content_type(Path::new("notes.txt")), None);
        assert_eq!(video_content_type(Path::new("noext")), None);
    }

    #[test]
    fn test_client_urls() {
        let client = VideoApiClient::new(&ClientConfig::default()).unwrap();
        assert_eq!(client.api_base().as_str(), "http://localhost:8080/api");
        assert_eq!(client.delivery_origin().to_string(), "http://localhost:8080");
        assert_eq!(
            client.stream_url(3, Some("720p")).unwrap().as_str(),
            "http://localhost:8080/api/videos/3/stream?quality=720p"
        );
        assert_eq!(
            client.endpoint("videos/upload").unwrap().as_str(),
            "http://localhost:8080/api/videos/upload"
        );
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let client = VideoApiClient::new(&ClientConfig::default()).unwrap();

        let err = client
            .upload_bytes("  ", "a.mp4", "video/mp4", vec![1u8, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));

        let err = client
            .upload_bytes("clip", "a.txt", "text/plain", vec![1u8])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));

        let err = client
            .upload_bytes("clip", "a.mp4", "video/mp4", Vec::<u8>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));
    }
}
