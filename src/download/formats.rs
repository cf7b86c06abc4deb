use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::{job::StreamTypes, Result};

const PLACEHOLDER: &str = "N/A";

/// One entry of the `formats` list yt-dlp prints with `-J`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<f64>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub abr: Option<f64>,
    pub vbr: Option<f64>,
}

impl StreamFormat {
    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    /// Renders the stream as a fixed width table row
    pub fn table_row(&self) -> String {
        let size = self
            .filesize
            .or(self.filesize_approx)
            .map(human_readable_size);
        format!(
            "{:<7} | {:<4} | {:<10} | {:<5} | {:<8} | {:<10} | {:<14} | {:<7} | {:<7}",
            self.format_id,
            or_placeholder(self.ext.clone()),
            or_placeholder(self.resolution.clone()),
            or_placeholder(self.fps.map(format_number)),
            or_placeholder(size),
            or_placeholder(self.acodec.clone()),
            or_placeholder(self.vcodec.clone()),
            or_placeholder(self.abr.map(format_number)),
            or_placeholder(self.vbr.map(format_number)),
        )
    }
}

/// Header matching [`StreamFormat::table_row`]
pub fn table_header() -> String {
    format!(
        "{:<7} | {:<4} | {:<10} | {:<5} | {:<8} | {:<10} | {:<14} | {:<7} | {:<7}",
        "ID", "EXT", "RESOLUTION", "FPS", "SIZE", "ACODEC", "VCODEC", "ABR", "VBR"
    )
}

fn or_placeholder(value: Option<String>) -> String {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => PLACEHOLDER.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Converts a byte count into B/KB/MB/GB/TB with two decimals
pub fn human_readable_size(bytes: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = units[0];
    for candidate in units {
        unit = candidate;
        if size < 1024.0 {
            break;
        }
        if candidate != "TB" {
            size /= 1024.0;
        }
    }
    format!("{:.2}{}", size, unit)
}

/// Extracts the formats from yt-dlp's `-J` output
///
/// Playlists nest their videos in `entries`, the first entry is used.
pub fn parse_formats(json: &str) -> Result<Vec<StreamFormat>> {
    let value: Value = serde_json::from_str(json).context("yt-dlp printed invalid json")?;
    let info = match value.get("entries").and_then(Value::as_array) {
        Some(entries) => entries.first().context("The playlist is empty")?,
        None => &value,
    };
    let formats = info
        .get("formats")
        .cloned()
        .context("yt-dlp did not report any formats")?;
    Ok(serde_json::from_value(formats).context("Could not parse formats")?)
}

/// Keeps the streams carrying at least one of the requested stream types
pub fn filter_streams(formats: Vec<StreamFormat>, types: StreamTypes) -> Vec<StreamFormat> {
    formats
        .into_iter()
        .filter(|format| (types.audio && format.has_audio()) || (types.video && format.has_video()))
        .collect()
}
