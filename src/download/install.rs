use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, RequestBuilder};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    process::Command,
};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::{errors::MissingToolError, session::prompt::Prompter, Result};

const YTDLP_RELEASE: &str = "https://github.com/yt-dlp/yt-dlp/releases/latest/download/";
const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the yt-dlp release asset for this platform
pub fn ytdlp_asset() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("yt-dlp.exe")
    } else if cfg!(target_os = "macos") {
        Some("yt-dlp_macos")
    } else if cfg!(target_os = "linux") {
        Some("yt-dlp")
    } else {
        None
    }
}

/// Checks whether the executable can be launched
pub async fn is_available(path: &Path, version_flag: &str) -> bool {
    let status = Command::new(path)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("{} is not available: {}", path.display(), e);
            false
        }
    }
}

/// Directory tools get installed into and looked up in, next to our own executable
fn local_tool_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn local_tool_path(name: &str) -> PathBuf {
    let mut file_name = name.to_string();
    if cfg!(target_os = "windows") {
        file_name.push_str(".exe");
    }
    local_tool_dir().join(file_name)
}

/// Finds yt-dlp, offering to download it if it is missing
pub async fn ensure_ytdlp<P: Prompter>(prompter: &mut P, configured: &Path) -> Result<PathBuf> {
    if is_available(configured, "--version").await {
        return Ok(configured.to_path_buf());
    }
    let local = local_tool_path("yt-dlp");
    if is_available(&local, "--version").await {
        return Ok(local);
    }

    prompter.notify("yt-dlp was not found, it is required to download anything.");
    if !prompter.confirm("Would you like to download it now?", true)? {
        return Err(MissingToolError { tool: "yt-dlp" }.into());
    }

    let asset = ytdlp_asset().ok_or_else(|| {
        anyhow::Error::new(MissingToolError { tool: "yt-dlp" })
            .context("Your OS is not supported by the installer, please install yt-dlp yourself")
    })?;
    let url = format!("{}{}", YTDLP_RELEASE, asset);

    let client = Client::builder()
        .connect_timeout(NETWORK_TIMEOUT)
        .read_timeout(NETWORK_TIMEOUT)
        .build()?;
    download_file_using_tmp(client.get(&url), &local)
        .await
        .with_context(|| format!("Failed to download yt-dlp from {}", url))?;
    make_executable(&local).await?;

    info!("Installed yt-dlp to {}", local.display());
    Ok(local)
}

/// Finds ffmpeg, there is no automated install for it
pub async fn ensure_ffmpeg(configured: &Path) -> Result<PathBuf> {
    if is_available(configured, "-version").await {
        return Ok(configured.to_path_buf());
    }
    let local = local_tool_path("ffmpeg");
    if is_available(&local, "-version").await {
        return Ok(local);
    }

    Err(anyhow::Error::new(MissingToolError { tool: "ffmpeg" }).context(
        "Please install ffmpeg, usually installing it through your package manager is sufficient",
    ))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Downloads the response body of the request to `path`, showing a progress bar
async fn chunked_download(request: RequestBuilder, path: &Path) -> Result<()> {
    let response = request.send().await?.error_for_status()?;

    let bar = match response.content_length() {
        Some(length) => ProgressBar::new(length),
        None => ProgressBar::new_spinner(),
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
        bar.inc(chunk.len() as u64);
    }
    file.flush().await?;

    bar.finish_with_message("Download complete!");
    Ok(())
}

/// Same as chunked_download but writes to a temporary file first, to avoid partially downloaded files
///
/// The temporary file is removed when the download fails or gets interrupted.
async fn download_file_using_tmp(request: RequestBuilder, path: &Path) -> Result<()> {
    // New path for temporary file
    let tmp_path = path.with_extension("tmp_yt-archiver");

    // Make sure file doesn't exist
    let _ = fs::remove_file(&tmp_path).await;

    let result = tokio::select! {
        result = chunked_download(request, &tmp_path) => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Download interrupted")),
    };
    if let Err(e) = result {
        warn!("Cleaning up partially downloaded file {}", tmp_path.display());
        if let Err(remove_err) = fs::remove_file(&tmp_path).await {
            warn!("Failed to delete partially downloaded file: {}", remove_err);
        }
        return Err(e);
    }

    // Make sure file doesn't exist
    let _ = fs::remove_file(&path).await;
    // Move file to destination
    fs::rename(tmp_path, path).await?;

    Ok(())
}
