//! Media element abstraction
//!
//! The playback controller is the only owner of a [`MediaElement`]; nothing
//! else reaches into it. Installing a new source resets the element to time
//! zero in a paused, freshly loaded state.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

/// Handle to the single playback resource
#[async_trait]
pub trait MediaElement: Send {
    /// Replace the media source and wait until it is ready to seek.
    async fn load(&mut self, url: &Url) -> Result<()>;

    /// Drop the current source
    fn unload(&mut self);

    /// Currently installed source
    fn source(&self) -> Option<&Url>;

    /// Elapsed playback time in seconds
    fn current_time(&self) -> f64;

    /// Total duration of the loaded source, if known
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    async fn seek(&mut self, position: f64) -> Result<()>;

    /// Start or resume playback. May be rejected by the runtime
    /// (e.g. autoplay policy) with [`Error::PlaybackResumeFailed`].
    async fn play(&mut self) -> Result<()>;

    fn pause(&mut self);
}

/// Clock-driven media element with no decoder behind it.
///
/// Position advances with the tokio clock while playing and stops at the
/// source's duration. Durations are configured per URL.
#[derive(Debug)]
pub struct HeadlessMediaElement {
    source: Option<Url>,
    durations: HashMap<String, f64>,
    default_duration: Option<f64>,
    /// Position at the last seek/pause
    anchor: f64,
    playing_since: Option<Instant>,
    autoplay_blocked: bool,
    load_delay: Duration,
}

impl HeadlessMediaElement {
    pub fn new() -> Self {
        Self {
            source: None,
            durations: HashMap::new(),
            default_duration: None,
            anchor: 0.0,
            playing_since: None,
            autoplay_blocked: false,
            load_delay: Duration::ZERO,
        }
    }

    /// Duration reported for sources without an explicit entry
    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = Some(seconds);
        self
    }

    /// Duration reported for one source URL
    pub fn with_source_duration(mut self, url: &str, seconds: f64) -> Self {
        self.durations.insert(url.to_string(), seconds);
        self
    }

    /// Simulated time to load a source
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Reject every `play()` call, like a browser blocking autoplay
    pub fn with_autoplay_blocked(mut self, blocked: bool) -> Self {
        self.autoplay_blocked = blocked;
        self
    }

    fn clamp(&self, position: f64) -> f64 {
        let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

impl Default for HeadlessMediaElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for HeadlessMediaElement {
    async fn load(&mut self, url: &Url) -> Result<()> {
        self.source = None;
        self.anchor = 0.0;
        self.playing_since = None;

        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        debug!(url = %url, duration = ?self.durations.get(url.as_str()), "Source loaded");
        self.source = Some(url.clone());
        Ok(())
    }

    fn unload(&mut self) {
        self.source = None;
        self.anchor = 0.0;
        self.playing_since = None;
    }

    fn source(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    fn current_time(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.clamp(self.anchor + since.elapsed().as_secs_f64()),
            None => self.anchor,
        }
    }

    fn duration(&self) -> Option<f64> {
        let source = self.source.as_ref()?;
        self.durations
            .get(source.as_str())
            .copied()
            .or(self.default_duration)
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    async fn seek(&mut self, position: f64) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::MediaSeek {
                position,
                reason: "no source loaded".to_string(),
            });
        }
        self.anchor = self.clamp(position);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        trace!(position = self.anchor, "Seeked");
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::PlaybackResumeFailed("no source loaded".to_string()));
        }
        if self.autoplay_blocked {
            return Err(Error::PlaybackResumeFailed(
                "playback requires a user gesture".to_string(),
            ));
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.anchor = self.current_time();
        self.playing_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_while_playing() {
        let mut media = HeadlessMediaElement::new().with_default_duration(60.0);
        media.load(&url("http://h/a")).await.unwrap();
        assert!(media.is_paused());

        media.play().await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((media.current_time() - 5.0).abs() < 1e-6);

        media.pause();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((media.current_time() - 5.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_resets_position() {
        let mut media = HeadlessMediaElement::new();
        media.load(&url("http://h/a")).await.unwrap();
        media.seek(30.0).await.unwrap();
        media.play().await.unwrap();

        media.load(&url("http://h/b")).await.unwrap();
        assert_eq!(media.current_time(), 0.0);
        assert!(media.is_paused());
        assert_eq!(media.source().map(Url::as_str), Some("http://h/b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_clamps_to_duration() {
        let mut media = HeadlessMediaElement::new().with_source_duration("http://h/short", 8.0);
        media.load(&url("http://h/short")).await.unwrap();
        media.seek(20.0).await.unwrap();
        assert_eq!(media.current_time(), 8.0);

        media.play().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(media.current_time(), 8.0);
    }

    #[tokio::test]
    async fn test_blocked_autoplay() {
        let mut media = HeadlessMediaElement::new().with_autoplay_blocked(true);
        media.load(&url("http://h/a")).await.unwrap();
        let err = media.play().await.unwrap_err();
        assert!(matches!(err, Error::PlaybackResumeFailed(_)));
        assert!(media.is_paused());
    }

    #[tokio::test]
    async fn test_seek_without_source() {
        let mut media = HeadlessMediaElement::new();
        tokio_test::assert_err!(media.seek(1.0).await);
        tokio_test::assert_err!(media.play().await);
    }
}
