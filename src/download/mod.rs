pub mod formats;
pub mod install;
pub mod ytdlp;

use async_trait::async_trait;
use url::Url;

use crate::{job::JobConfig, Result};

use formats::StreamFormat;

/// Result of a single invocation of an external tool
///
/// `Err` is reserved for failures to run the tool at all,
/// a tool that ran and reported an error is `Failed` with its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T = ()> {
    Completed(T),
    Failed(String),
    /// Stopped by Ctrl+C
    Interrupted,
}

/// Everything the session needs from the external downloader
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Lightweight check whether the url resolves to anything
    async fn check_url(&self, url: &Url) -> Result<RunOutcome>;

    /// Lists the streams available for the url (first item for playlists)
    async fn probe_streams(&self, url: &Url) -> Result<RunOutcome<Vec<StreamFormat>>>;

    /// Simulates the job on the first few items
    async fn test_run(&self, job: &JobConfig) -> Result<RunOutcome>;

    async fn download(&self, job: &JobConfig) -> Result<RunOutcome>;

    /// Updates the downloader itself
    async fn update(&self) -> Result<RunOutcome>;
}
