use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    config::cli::Cli,
    convert::ffmpeg::DEFAULT_BITRATE,
    job::{
        JobConfig, OverwritePolicy, SelectionMode, StreamTypes, DEFAULT_ARCHIVE_NAME,
        DEFAULT_OUTPUT_TEMPLATE,
    },
    Result,
};

/// What happens when the url check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UrlCheckPolicy {
    /// Don't check urls
    Skip,
    /// Show the failure and continue
    #[default]
    Warn,
    /// Ask for another url
    Require,
}

/// Automatic stream selection remembered between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoSelection {
    #[default]
    Best,
    Worst,
}

/// Settings persisted between runs, also used as defaults for the prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub destination: Option<PathBuf>,
    pub use_archive: bool,
    pub archive_name: String,
    pub stream_types: StreamTypes,
    pub selection: AutoSelection,
    pub merge_streams: bool,
    pub output_template: String,
    pub overwrite: OverwritePolicy,
    pub url_check: UrlCheckPolicy,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    /// Passed to yt-dlp on every invocation (e.g. `-N 4`)
    pub extra_args: Vec<String>,
    pub mp3_bitrate: String,
    /// Default for the number of simultaneous conversions
    pub workers: usize,
    pub remember_answers: bool,
    pub log_file: Option<PathBuf>,

    /// Where the settings were read from and get written to
    #[serde(skip)]
    pub path: Option<PathBuf>,
    #[serde(skip)]
    shadowed: Shadowed,
}

/// File values replaced by command line flags, only those get saved
#[derive(Debug, Clone, Default, PartialEq)]
struct Shadowed {
    ytdlp_path: Option<PathBuf>,
    ffmpeg_path: Option<PathBuf>,
    url_check: Option<UrlCheckPolicy>,
    remember_answers: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination: None,
            use_archive: true,
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            stream_types: StreamTypes::default(),
            selection: AutoSelection::default(),
            merge_streams: true,
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            overwrite: OverwritePolicy::default(),
            url_check: UrlCheckPolicy::default(),
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            extra_args: Vec::new(),
            mp3_bitrate: DEFAULT_BITRATE.to_string(),
            workers: 4,
            remember_answers: true,
            log_file: None,
            path: None,
            shadowed: Shadowed::default(),
        }
    }
}

/// Reads the settings file, a missing file yields the defaults
///
/// Unknown keys are ignored and values of the wrong type fall back to their default,
/// both with a warning.
pub fn read_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let mut settings = match fs::read_to_string(path) {
        Ok(contents) => parse_settings(&contents)
            .with_context(|| format!("Could not parse settings file {}", path.display()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No settings file at {}, using defaults", path.display());
            Settings::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read settings file {}", path.display()));
        }
    };
    settings.path = Some(path.to_path_buf());
    debug!("Read settings: {:?}", settings);
    Ok(settings)
}

fn parse_settings(contents: &str) -> Result<Settings> {
    let value: Value = serde_json::from_str(contents)?;
    let Value::Object(map) = value else {
        return Err(anyhow!("Settings must be a json object"));
    };
    Ok(Settings::from_map(map))
}

/// Overwrites `slot` with `value` if it has the right type
fn assign<T: DeserializeOwned>(slot: &mut T, key: &str, value: Value) {
    match serde_json::from_value(value) {
        Ok(parsed) => *slot = parsed,
        Err(e) => warn!("Invalid value for setting \"{}\" ({}), using the default", key, e),
    }
}

impl Settings {
    fn from_map(map: Map<String, Value>) -> Self {
        let mut settings = Settings::default();
        for (key, value) in map {
            match key.as_str() {
                "destination" => assign(&mut settings.destination, &key, value),
                "use_archive" => assign(&mut settings.use_archive, &key, value),
                "archive_name" => assign(&mut settings.archive_name, &key, value),
                "stream_types" => assign(&mut settings.stream_types, &key, value),
                "selection" => assign(&mut settings.selection, &key, value),
                "merge_streams" => assign(&mut settings.merge_streams, &key, value),
                "output_template" => assign(&mut settings.output_template, &key, value),
                "overwrite" => assign(&mut settings.overwrite, &key, value),
                "url_check" => assign(&mut settings.url_check, &key, value),
                "ytdlp_path" => assign(&mut settings.ytdlp_path, &key, value),
                "ffmpeg_path" => assign(&mut settings.ffmpeg_path, &key, value),
                "extra_args" => assign(&mut settings.extra_args, &key, value),
                "mp3_bitrate" => assign(&mut settings.mp3_bitrate, &key, value),
                "workers" => assign(&mut settings.workers, &key, value),
                "remember_answers" => assign(&mut settings.remember_answers, &key, value),
                "log_file" => assign(&mut settings.log_file, &key, value),
                _ => warn!("Ignoring unknown setting \"{}\"", key),
            }
        }
        settings
    }

    /// Command line flags take precedence over the file for this run only
    pub fn apply_cli(&mut self, cli: &Cli) {
        let shadowed = &mut self.shadowed;
        if let Some(ytdlp) = &cli.ytdlp {
            shadowed.ytdlp_path.get_or_insert_with(|| self.ytdlp_path.clone());
            self.ytdlp_path = ytdlp.clone();
        }
        if let Some(ffmpeg) = &cli.ffmpeg {
            shadowed.ffmpeg_path.get_or_insert_with(|| self.ffmpeg_path.clone());
            self.ffmpeg_path = ffmpeg.clone();
        }
        if let Some(url_check) = cli.url_check {
            shadowed.url_check.get_or_insert(self.url_check);
            self.url_check = url_check;
        }
        if cli.no_save {
            shadowed.remember_answers.get_or_insert(self.remember_answers);
            self.remember_answers = false;
        }
    }

    /// The settings as they belong in the file, without this run's flags
    fn for_file(&self) -> Settings {
        let mut file = self.clone();
        let shadowed = std::mem::take(&mut file.shadowed);
        if let Some(ytdlp) = shadowed.ytdlp_path {
            file.ytdlp_path = ytdlp;
        }
        if let Some(ffmpeg) = shadowed.ffmpeg_path {
            file.ffmpeg_path = ffmpeg;
        }
        if let Some(url_check) = shadowed.url_check {
            file.url_check = url_check;
        }
        if let Some(remember) = shadowed.remember_answers {
            file.remember_answers = remember;
        }
        file
    }

    /// Takes over the answers of a finished job
    pub fn remember(&mut self, job: &JobConfig) {
        if let Some(destination) = &job.destination {
            self.destination = Some(destination.clone());
        }
        self.use_archive = job.archive_name.is_some();
        if let Some(name) = &job.archive_name {
            self.archive_name = name.clone();
        }
        if let Some(types) = job.stream_types {
            self.stream_types = types;
        }
        match job.selection_mode {
            Some(SelectionMode::Best) => self.selection = AutoSelection::Best,
            Some(SelectionMode::Worst) => self.selection = AutoSelection::Worst,
            _ => {}
        }
        self.merge_streams = job.merge_streams;
        if let Some(template) = &job.output_template {
            self.output_template = template.clone();
        }
    }

    /// Writes the settings back to where they were read from
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(&self.for_file())?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write settings file {}", path.display()))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }
}
