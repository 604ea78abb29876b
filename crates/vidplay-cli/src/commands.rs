//! CLI command implementations

use crate::output::{self, OutputFormat};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::warn;
use vidplay_core::format::{format_file_size, format_timestamp, format_upload_time};
use vidplay_core::{
    ControllerConfig, ControllerState, HeadlessMediaElement, PlaybackController, PlaybackEvent,
    PlaybackEventRecord, PlaybackPhase, VideoApiClient, VideoId,
};

/// A scheduled quality change, written `QUALITY@SECONDS`
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub quality: String,
    /// Seconds after playback started
    pub at: f64,
}

impl FromStr for Switch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (quality, at) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("expected QUALITY@SECONDS, got '{s}'"))?;
        let quality = quality.trim();
        if quality.is_empty() {
            return Err(format!("missing quality in '{s}'"));
        }
        let at: f64 = at
            .trim()
            .parse()
            .map_err(|_| format!("invalid time in '{s}'"))?;
        if !at.is_finite() || at < 0.0 {
            return Err(format!("time must be a non-negative number of seconds in '{s}'"));
        }
        Ok(Self {
            quality: quality.to_string(),
            at,
        })
    }
}

/// List all videos
pub async fn list(client: &VideoApiClient, format: &str) -> anyhow::Result<()> {
    let videos = client.list_videos().await?;
    println!("{}", output::format_videos(&videos, OutputFormat::from(format))?);
    Ok(())
}

/// Show one video and its renditions
pub async fn show(client: &VideoApiClient, video_id: VideoId, format: &str) -> anyhow::Result<()> {
    let details = client.get_video(video_id).await?;

    if OutputFormat::from(format) == OutputFormat::Json {
        println!("{}", output::to_json(&details)?);
        return Ok(());
    }

    let video = &details.video;
    println!("{}", style(&video.title).bold());
    println!("  ID:        {}", video.id);
    println!("  File:      {} ({})", video.file_name, video.content_type);
    println!("  Size:      {}", format_file_size(video.file_size));
    println!("  Uploaded:  {}", format_upload_time(&video.upload_time));

    println!("\nRenditions:");
    let origin = client.delivery_origin();
    for (quality, location) in details.available_qualities.iter() {
        match origin.resolve(location) {
            Ok(url) => println!("  {:<10} {}", quality, url),
            Err(e) => println!("  {:<10} {} ({})", quality, location, style(e).red()),
        }
    }

    Ok(())
}

/// Upload a video file
pub async fn upload(
    client: &VideoApiClient,
    title: &str,
    file: &Path,
    format: &str,
) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message(format!("Uploading {}", file.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = client.upload_video(title, file).await;
    spinner.finish_and_clear();
    let video = result?;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&video)?),
        _ => {
            println!("{} {}", style("Uploaded").green().bold(), output::format_video_line(&video));
        }
    }
    Ok(())
}

/// Delete a video
pub async fn delete(client: &VideoApiClient, video_id: VideoId) -> anyhow::Result<()> {
    client.delete_video(video_id).await?;
    println!("{} video {}", style("Deleted").green().bold(), video_id);
    Ok(())
}

/// Print the registry stream URL of a rendition
pub fn url(client: &VideoApiClient, video_id: VideoId, quality: Option<&str>) -> anyhow::Result<()> {
    println!("{}", client.stream_url(video_id, quality)?);
    Ok(())
}

/// Options for a headless playback run
pub struct PlayOptions {
    pub switches: Vec<Switch>,
    /// Seconds to keep playing after the last switch
    pub linger: f64,
    /// Duration reported by the headless media element
    pub media_duration: f64,
    pub default_quality: Option<String>,
}

/// Play a video headlessly, applying scheduled quality switches
pub async fn play(
    client: VideoApiClient,
    video_id: VideoId,
    options: PlayOptions,
    format: &str,
) -> anyhow::Result<()> {
    let json = OutputFormat::from(format) == OutputFormat::Json;

    let mut config = ControllerConfig::default();
    if let Some(quality) = options.default_quality {
        config.default_quality = quality;
    }
    let origin = client.delivery_origin().clone();
    let media = HeadlessMediaElement::new().with_default_duration(options.media_duration);
    let (controller, join) = PlaybackController::spawn(config, origin, client, media)?;
    let reporter = tokio::spawn(report_events(controller.events(), json));

    controller.open(video_id).await?;
    let state = controller
        .wait_for(|s| matches!(s.phase(), PlaybackPhase::Ready | PlaybackPhase::Failed))
        .await?;
    let failure = state.error_message().map(str::to_string);

    if failure.is_none() {
        if !json {
            print_state(&state);
        }

        let started = Instant::now();
        let mut switches = options.switches;
        switches.sort_by(|a, b| a.at.total_cmp(&b.at));

        for switch in switches {
            tokio::time::sleep_until(started + Duration::from_secs_f64(switch.at)).await;
            controller.request_quality_change(switch.quality).await?;
            controller.flush().await?;
            if !json {
                print_state(&controller.state());
            }
        }

        if options.linger > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(options.linger)).await;
        }
    }

    controller.close().await?;
    controller.flush().await?;
    drop(controller);
    join.await?;
    reporter.await?;

    match failure {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}

fn print_state(state: &ControllerState) {
    match state {
        ControllerState::Ready(view) => {
            println!(
                "{} {} [{}] {}",
                style("ready").green().bold(),
                view.video.title,
                style(&view.quality).cyan(),
                view.stream_url
            );
            println!("      renditions: {}", view.qualities.join(", "));
        }
        other => println!("{}", style(other.phase()).yellow()),
    }
}

async fn report_events(mut events: broadcast::Receiver<PlaybackEventRecord>, json: bool) {
    loop {
        match events.recv().await {
            Ok(record) if json => match serde_json::to_string(&record) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            },
            Ok(record) => println!("  {} {}", style("»").dim(), describe(&record.event)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event reporter fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe(event: &PlaybackEvent) -> String {
    match event {
        PlaybackEvent::Opened { video_id } => format!("opening video {video_id}"),
        PlaybackEvent::DetailsResolved { quality, qualities, .. } => {
            format!("resolved {} rendition(s), starting with {quality}", qualities.len())
        }
        PlaybackEvent::ResolveFailed { code, message, .. } => {
            format!("{} {message}", style(code).red())
        }
        PlaybackEvent::QualitySwitched { from, to, position, paused } => format!(
            "switched {from} -> {to} at {}{}",
            format_timestamp(*position),
            if *paused { " (paused)" } else { "" }
        ),
        PlaybackEvent::ResumeBlocked { reason } => format!("resume blocked: {reason}"),
        PlaybackEvent::InvalidRendition { requested } => {
            format!("{} is not available for this video", style(requested).yellow())
        }
        PlaybackEvent::SwitchCoalesced { skipped } => format!("skipped superseded switch to {skipped}"),
        PlaybackEvent::Closed { video_id } => format!("closed video {video_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        let switch: Switch = "720p@12.5".parse().unwrap();
        assert_eq!(switch.quality, "720p");
        assert_eq!(switch.at, 12.5);

        assert!("720p".parse::<Switch>().is_err());
        assert!("@3".parse::<Switch>().is_err());
        assert!("720p@-1".parse::<Switch>().is_err());
        assert!("720p@soon".parse::<Switch>().is_err());
    }

    #[test]
    fn test_describe_switch() {
        let text = describe(&PlaybackEvent::QualitySwitched {
            from: "original".into(),
            to: "720p".into(),
            position: 75.0,
            paused: true,
        });
        assert!(text.contains("original -> 720p"));
        assert!(text.contains("1:15"));
        assert!(text.ends_with("(paused)"));
    }
}
