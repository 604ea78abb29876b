//! Human-readable formatting for sizes, upload dates and playback clocks

use chrono::NaiveDateTime;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with 1024-based units, e.g. `1.5 MB`.
///
/// Values keep at most two decimals with trailing zeros dropped. Anything
/// past the gigabyte range is still expressed in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut scale: u64 = 1;
    while exponent + 1 < SIZE_UNITS.len() && bytes / scale >= 1024 {
        scale *= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / scale as f64;

    format!("{} {}", trim_decimals(value), SIZE_UNITS[exponent])
}

fn trim_decimals(value: f64) -> String {
    let fixed = format!("{value:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Format an upload timestamp as `May 1, 2024, 10:20 AM`
pub fn format_upload_time(ts: &NaiveDateTime) -> String {
    ts.format("%b %-d, %Y, %I:%M %p").to_string()
}

/// Format a playback position as `m:ss`, or `h:mm:ss` past the hour.
///
/// Negative and non-finite inputs render as `0:00`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
