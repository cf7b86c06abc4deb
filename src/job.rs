pub mod args;

use std::path::PathBuf;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::UnrecognizedUrlError;

/// Name of the archive file, if the user doesn't pick one
pub const DEFAULT_ARCHIVE_NAME: &str = "archive";
/// Extension appended to every archive file name
pub const ARCHIVE_EXTENSION: &str = "txt";
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

// Channel pages that list uploads: /@handle/videos, /channel/<id>/videos, /c/<name>/videos, /user/<name>/videos
static CHANNEL_VIDEOS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?:@[^/]+|(?:channel|c|user)/[^/]+)/videos/?$").expect("valid channel regex")
});
// Same pages without the videos tab, yt-dlp would pick a tab on its own
static CHANNEL_ROOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?:@[^/]+|(?:channel|c|user)/[^/]+)(?:/[^/]*)?/?$").expect("valid channel regex")
});

/// Whether the user came from the download or the archive entry of the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Download,
    Archive,
}

/// What a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Video,
    Playlist,
    VideoInPlaylist,
    Channel,
}

impl ContentKind {
    /// Determines the kind of content by looking at the shape of the url only
    pub fn from_url(url: &Url) -> Result<Self, UnrecognizedUrlError> {
        let has_query = |name: &str| url.query_pairs().any(|(key, _)| key == name);

        if has_query("list") {
            if has_query("v") {
                return Ok(ContentKind::VideoInPlaylist);
            }
            return Ok(ContentKind::Playlist);
        }

        let path = url.path();
        if CHANNEL_VIDEOS.is_match(path) {
            return Ok(ContentKind::Channel);
        }
        if CHANNEL_ROOT.is_match(path) {
            return Err(UnrecognizedUrlError {
                url: url.to_string(),
            });
        }

        Ok(ContentKind::Video)
    }

    /// True for everything that contains more than one video
    pub fn is_collection(&self) -> bool {
        !matches!(self, ContentKind::Video)
    }
}

/// Which part of a playlist or channel gets downloaded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Entire,
    /// 1-based, inclusive
    Indices { start: u32, end: u32 },
    Dates { after: NaiveDate, before: NaiveDate },
    /// Only the video a playlist link was opened on
    SingleVideo,
}

/// Playlist modifiers, yt-dlp treats each of them independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaylistOrder {
    pub random: bool,
    pub reverse: bool,
    pub lazy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTypes {
    pub audio: bool,
    pub video: bool,
}

impl StreamTypes {
    pub const AUDIO: StreamTypes = StreamTypes {
        audio: true,
        video: false,
    };
    pub const BOTH: StreamTypes = StreamTypes {
        audio: true,
        video: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }

    pub fn both(&self) -> bool {
        self.audio && self.video
    }
}

impl Default for StreamTypes {
    fn default() -> Self {
        StreamTypes::BOTH
    }
}

/// How the concrete streams get picked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    Best,
    Worst,
    /// yt-dlp format ids picked from the stream table
    Manual(Vec<String>),
}

/// Sidecar files written next to each video in archive mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveExtras {
    pub subtitles: bool,
    pub description: bool,
    pub thumbnail: bool,
    pub metadata: bool,
}

impl Default for ArchiveExtras {
    fn default() -> Self {
        Self {
            subtitles: true,
            description: true,
            thumbnail: true,
            metadata: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Keep existing files and resume partial downloads
    #[default]
    Continue,
    Overwrite,
}

/// Everything needed for one yt-dlp run, filled in step by step by the session
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub mode: Mode,
    pub url: Option<Url>,
    pub kind: Option<ContentKind>,
    pub destination: Option<PathBuf>,
    /// Base name of the archive file, `None` disables the archive
    pub archive_name: Option<String>,
    pub selection: Selection,
    pub order: PlaylistOrder,
    pub stream_types: Option<StreamTypes>,
    pub selection_mode: Option<SelectionMode>,
    pub merge_streams: bool,
    pub output_template: Option<String>,
    pub extras: Option<ArchiveExtras>,
    pub overwrite: OverwritePolicy,
}

impl JobConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            url: None,
            kind: None,
            destination: None,
            archive_name: Some(DEFAULT_ARCHIVE_NAME.to_string()),
            selection: Selection::default(),
            order: PlaylistOrder::default(),
            stream_types: None,
            selection_mode: None,
            merge_streams: true,
            output_template: None,
            extras: None,
            overwrite: OverwritePolicy::default(),
        }
    }

    /// A job may only be started once every required answer is present
    pub fn is_complete(&self) -> bool {
        let base = self.url.is_some()
            && self.destination.is_some()
            && self.stream_types.is_some_and(|types| !types.is_empty())
            && self.selection_mode.is_some()
            && self.format_selector().is_some()
            && self
                .output_template
                .as_ref()
                .is_some_and(|template| !template.trim().is_empty());

        match self.mode {
            Mode::Download => base,
            Mode::Archive => base && self.extras.is_some(),
        }
    }

    /// Path of the archive file inside the destination
    pub fn archive_path(&self) -> Option<PathBuf> {
        let name = self.archive_name.as_ref()?;
        let destination = self.destination.as_ref()?;
        Some(destination.join(format!("{}.{}", name, ARCHIVE_EXTENSION)))
    }

    /// Audio ends up in files of its own, which makes it eligible for mp3 conversion
    pub fn produces_audio_files(&self) -> bool {
        match self.stream_types {
            Some(types) => types.audio && !(types.video && self.merge_streams),
            None => false,
        }
    }
}
