//! Output formatting for CLI

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vidplay_core::format::{format_file_size, format_upload_time};
use vidplay_core::VideoMetadata;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Tabled)]
struct VideoRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Uploaded")]
    uploaded: String,
    #[tabled(rename = "Encoded")]
    encoded: String,
}

impl From<&VideoMetadata> for VideoRow {
    fn from(video: &VideoMetadata) -> Self {
        Self {
            id: video.id,
            title: video.title.clone(),
            size: format_file_size(video.file_size),
            uploaded: format_upload_time(&video.upload_time),
            encoded: encoded_label(video),
        }
    }
}

fn encoded_label(video: &VideoMetadata) -> String {
    let variants = video.encoded_variants();
    if variants.is_empty() {
        "-".to_string()
    } else {
        variants.join(", ")
    }
}

/// Pretty-printed JSON
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Render a video list in the selected format
pub fn format_videos(videos: &[VideoMetadata], format: OutputFormat) -> anyhow::Result<String> {
    if videos.is_empty() && format != OutputFormat::Json {
        return Ok("No videos uploaded yet.".to_string());
    }

    match format {
        OutputFormat::Json => to_json(&videos),
        OutputFormat::Table => {
            let rows: Vec<VideoRow> = videos.iter().map(VideoRow::from).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Text => Ok(videos
            .iter()
            .map(format_video_line)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// One-line summary of a video
pub fn format_video_line(video: &VideoMetadata) -> String {
    format!(
        "{:>5}  {}  ({}, uploaded {}, encoded: {})",
        video.id,
        video.title,
        format_file_size(video.file_size),
        format_upload_time(&video.upload_time),
        encoded_label(video)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoMetadata {
        serde_json::from_value(serde_json::json!({
            "id": 4,
            "title": "Demo",
            "fileName": "demo.mp4",
            "fileSize": 1536,
            "contentType": "video/mp4",
            "uploadTime": "2024-03-15T14:30:00",
            "filePath1080p": "uploads/4_1080p.mp4"
        }))
        .unwrap()
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_video_line() {
        let line = format_video_line(&video());
        assert!(line.contains("Demo"));
        assert!(line.contains("1.5 KB"));
        assert!(line.contains("encoded: 1080p"));
    }

    #[test]
    fn test_table_output() {
        let table = format_videos(&[video()], OutputFormat::Table).unwrap();
        assert!(table.contains("Title"));
        assert!(table.contains("Demo"));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(
            format_videos(&[], OutputFormat::Text).unwrap(),
            "No videos uploaded yet."
        );
        assert_eq!(format_videos(&[], OutputFormat::Json).unwrap(), "[]");
    }
}
