use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::*;

pub const DEFAULT_BITRATE: &str = "128k";

/// Converts audio with ffmpeg, its own output is discarded
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub path: PathBuf,
    pub bitrate: String,
}

impl Ffmpeg {
    pub fn new(path: PathBuf, bitrate: impl Into<String>) -> Self {
        Self {
            path,
            bitrate: bitrate.into(),
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.arg("-n")
            .arg("-i")
            .arg(input)
            .arg("-b:a")
            .arg(&self.bitrate)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.command(input, output);
        debug!("ffmpeg params: {:?}", cmd);

        // `-n` refuses to touch an existing target, only our own output gets removed
        let existed = tokio::fs::try_exists(output).await.unwrap_or(true);
        let status = cmd
            .status()
            .await
            .context("Failed to start ffmpeg")?;
        if !status.success() {
            if !existed {
                remove_partial(output).await;
            }
            return Err(anyhow!("ffmpeg exited with status: {}", status));
        }
        Ok(())
    }
}

/// A truncated target would count as converted on the next run
async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!("Removed partial output {}", output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", output.display(), e),
    }
}
