use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use indicatif::ProgressStyle;
use tracing::{debug, instrument, trace, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use url::Url;

use super::*;

/// How the output of a yt-dlp invocation is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdoutMode {
    /// Parse progress from stdout and show it as a bar
    Progress,
    /// Pass stdout through to the terminal
    Inherit,
    /// Discard stdout
    Quiet,
}

/// The yt-dlp executable together with user supplied extra params
#[derive(Debug, Clone)]
pub struct YtDlp {
    pub path: PathBuf,
    pub params: Vec<String>,
}

impl YtDlp {
    pub fn new(path: PathBuf, params: Vec<String>) -> Self {
        Self { path, params }
    }

    /// Runs yt-dlp with the given arguments until it exits or Ctrl+C is pressed
    #[instrument(skip(self, args, label))]
    async fn run(&self, args: &[String], mode: StdoutMode, label: &str) -> Result<RunOutcome> {
        let mut cmd = Command::new(&self.path);
        if mode == StdoutMode::Progress {
            cmd.args([
                // Force new lines
                "--newline",
                // Get all available variables using: yt-dlp --progress-template '%(progress)#j'
                "--progress-template",
                "%(progress)#j",
                // Disable colors for easier parsing
                "--color",
                "no_color",
            ]);
        }
        cmd.args(&self.params).args(args).kill_on_drop(true);
        cmd.stdout(match mode {
            StdoutMode::Progress => Stdio::piped(),
            StdoutMode::Inherit => Stdio::inherit(),
            StdoutMode::Quiet => Stdio::null(),
        })
        .stderr(Stdio::piped());

        debug!("yt-dlp params: {:?}", cmd);

        let mut child = cmd.spawn().context("Failed to start yt-dlp")?;
        let stderr = child.stderr.take().map(collect_stderr);

        if mode == StdoutMode::Progress {
            let mut template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:.1f}% ({eta})  ".to_string();
            template.push_str(label);
            Span::current().pb_set_style(
                &ProgressStyle::default_bar()
                    .template(&template)?
                    .progress_chars("#>-"),
            );
            Span::current().pb_set_length(1000);
            Span::current().pb_set_position(0);
        }

        let stdout = child.stdout.take();
        let finished = async move {
            // Process yt-dlp's stdout line by line.
            if let Some(stdout) = stdout {
                let mut percent_extractor = PercentStrExtractor::default();
                let mut lines = BufReader::new(stdout).lines();
                while let Some(line) = lines.next_line().await? {
                    percent_extractor.push_new_line(line);
                    Span::current().pb_set_position((percent_extractor.percentage * 10.0) as u64);
                }
            }
            child.wait().await
        };

        let status = tokio::select! {
            status = finished => status.context("yt-dlp process encountered an error")?,
            _ = tokio::signal::ctrl_c() => {
                warn!("yt-dlp was interrupted");
                return Ok(RunOutcome::Interrupted);
            }
        };

        let message = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        if status.success() {
            Ok(RunOutcome::Completed(()))
        } else {
            debug!("yt-dlp exited with status: {}", status);
            Ok(RunOutcome::Failed(failure_message(&message, status)))
        }
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn check_url(&self, url: &Url) -> Result<RunOutcome> {
        let args: Vec<String> = vec![
            "--simulate".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--playlist-items".into(),
            "1".into(),
            "--lazy-playlist".into(),
            "--no-playlist".into(),
            url.to_string(),
        ];
        self.run(&args, StdoutMode::Quiet, url.as_str()).await
    }

    async fn probe_streams(&self, url: &Url) -> Result<RunOutcome<Vec<StreamFormat>>> {
        let mut cmd = Command::new(&self.path);
        cmd.args(&self.params)
            .args(["-J", "--no-playlist", "--playlist-items", "1"])
            .arg(url.as_str())
            .kill_on_drop(true);
        debug!("yt-dlp params: {:?}", cmd);

        let output = tokio::select! {
            output = cmd.output() => output.context("Failed to start yt-dlp")?,
            _ = tokio::signal::ctrl_c() => return Ok(RunOutcome::Interrupted),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(RunOutcome::Failed(failure_message(&stderr, output.status)));
        }

        let json = String::from_utf8_lossy(&output.stdout);
        match formats::parse_formats(&json) {
            Ok(formats) => Ok(RunOutcome::Completed(formats)),
            Err(e) => Ok(RunOutcome::Failed(format!("{:#}", e))),
        }
    }

    async fn test_run(&self, job: &JobConfig) -> Result<RunOutcome> {
        let args = job.test_args()?;
        self.run(&args, StdoutMode::Inherit, "Test").await
    }

    async fn download(&self, job: &JobConfig) -> Result<RunOutcome> {
        let args = job.download_args()?;
        let label = job.url.as_ref().map(Url::as_str).unwrap_or("Unknown url");
        self.run(&args, StdoutMode::Progress, label).await
    }

    async fn update(&self) -> Result<RunOutcome> {
        self.run(&["-U".to_string()], StdoutMode::Inherit, "Update").await
    }
}

/// Reads stderr in the background, so a chatty process never blocks on a full pipe
fn collect_stderr<R>(stderr: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!("yt-dlp: {}", line);
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

/// Message shown to the user, yt-dlp's own error text without color codes
fn failure_message(stderr: &str, status: std::process::ExitStatus) -> String {
    let stripped = strip_ansi_escapes::strip_str(stderr);
    let errors: Vec<&str> = stripped
        .lines()
        .filter(|line| line.starts_with("ERROR"))
        .collect();

    if !errors.is_empty() {
        errors.join("\n")
    } else if !stripped.trim().is_empty() {
        stripped.trim().to_string()
    } else {
        format!("yt-dlp exited with status: {}", status)
    }
}

/// Helper to extract the percentage from the yt-dlp output
#[derive(Debug, Default)]
struct PercentStrExtractor {
    pub percentage: f32,
    current_string: String,
}
impl PercentStrExtractor {
    fn push_new_line(&mut self, line: String) {
        if line == "{" {
            self.current_string = line;
        } else if line == "}" {
            self.current_string.push_str(&line);
            trace!("{}", self.current_string);

            let value: Value = match serde_json::from_str(&self.current_string) {
                Ok(val) => val,
                Err(_) => return,
            };
            let mut percent_string: String = match value.get("_percent_str") {
                Some(val) => val.to_string(),
                None => return,
            }
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '"')
            .collect();
            percent_string.pop();

            trace!("Extracted percentage: {}", percent_string);
            self.percentage = match percent_string.parse() {
                Ok(val) => val,
                Err(_) => return,
            };
        } else {
            self.current_string.push_str(&line);
        }
    }
}
