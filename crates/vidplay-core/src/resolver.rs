//! Rendition resolution
//!
//! A resolver turns a video id into the renditions it can be played in.
//! It performs no playback logic and has no side effects beyond the read.

use crate::{Error, Result, VideoDetails, VideoId};
use async_trait::async_trait;
use std::sync::Arc;

/// Source of [`VideoDetails`] for playback
#[async_trait]
pub trait RenditionResolver: Send + Sync {
    /// Fetch the video record and its available renditions.
    ///
    /// Implementations must fail with [`Error::MetadataUnavailable`] rather
    /// than succeed with an empty rendition mapping.
    async fn resolve(&self, video_id: VideoId) -> Result<VideoDetails>;
}

#[async_trait]
impl<R: RenditionResolver + ?Sized> RenditionResolver for Arc<R> {
    async fn resolve(&self, video_id: VideoId) -> Result<VideoDetails> {
        (**self).resolve(video_id).await
    }
}

/// Check the invariants a successful resolution must satisfy
pub fn validate_details(video_id: VideoId, details: &VideoDetails) -> Result<()> {
    if details.available_qualities.is_empty() {
        return Err(Error::metadata(video_id, "no renditions available"));
    }
    if details.video.id != video_id {
        return Err(Error::metadata(
            video_id,
            format!("registry answered for video {}", details.video.id),
        ));
    }
    Ok(())
}

/// Map any failure of a resolver call onto the resolution error.
pub(crate) fn into_metadata_error(video_id: VideoId, err: Error) -> Error {
    match err {
        err @ Error::MetadataUnavailable { .. } => err,
        other => Error::metadata(video_id, other.to_string()),
    }
}
