pub mod ffmpeg;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::future::join_all;
use tokio::fs;
use tokio_stream::{wrappers::ReadDirStream, StreamExt};
use tracing::{debug, info, warn};

use crate::{status_bar::StatusBar, Result};

/// Extension of the files that get converted
pub const SOURCE_EXTENSION: &str = "m4a";
pub const TARGET_EXTENSION: &str = "mp3";
/// Appended to the input folder name to form the output folder
pub const OUTPUT_SUFFIX: &str = "MP3";

/// Converts a single file, implemented by [`ffmpeg::Ffmpeg`]
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// A single unit of work
#[derive(Debug)]
struct Conversion {
    input: PathBuf,
    output: PathBuf,
}

/// `<input> MP3`, trailing separators of the input are ignored
pub fn output_dir(folder: &Path) -> PathBuf {
    let normalized: PathBuf = folder.components().collect();
    let mut name = OsString::from(normalized.as_os_str());
    name.push(" ");
    name.push(OUTPUT_SUFFIX);
    PathBuf::from(name)
}

/// All files directly inside `folder` with the source extension, sorted by name
async fn list_sources(folder: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = fs::read_dir(folder)
        .await
        .with_context(|| format!("Could not read folder {}", folder.display()))?;
    let mut entries = ReadDirStream::new(read_dir);

    let mut sources = Vec::new();
    while let Some(entry) = entries.next().await {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if matches && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Converts every source file in `folder` using `workers` concurrent workers
///
/// Files whose target already exists are skipped, so running this twice converts nothing
/// the second time. Returns once every worker has finished. A failing conversion is
/// logged and counted, but never stops the remaining ones.
pub async fn fan_out<T>(transcoder: Arc<T>, folder: &Path, workers: usize) -> Result<StatusBar>
where
    T: Transcoder + 'static,
{
    if workers == 0 {
        bail!("At least one worker is required");
    }
    if let Ok(parallelism) = std::thread::available_parallelism() {
        if workers > parallelism.get() {
            warn!(
                "Using {} workers on a machine with {} cores",
                workers, parallelism
            );
        }
    }

    let sources = list_sources(folder).await?;
    let output_dir = output_dir(folder);
    fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Could not create {}", output_dir.display()))?;

    let mut status = StatusBar::default();
    let (sender, receiver) = async_channel::unbounded();
    for input in sources {
        let Some(stem) = input.file_stem() else {
            continue;
        };
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(TARGET_EXTENSION);
        let output = output_dir.join(file_name);

        if fs::try_exists(&output).await.unwrap_or(false) {
            debug!("Skipping {}, already converted", input.display());
            status.register_skipped();
            continue;
        }
        sender.send(Conversion { input, output }).await?;
    }
    // Workers stop once the queue is drained
    sender.close();

    info!(
        "Converting {} {} file(s) using {} worker(s)",
        receiver.len(),
        SOURCE_EXTENSION,
        workers
    );

    let mut threads = Vec::with_capacity(workers);
    for _ in 0..workers {
        let receiver = receiver.clone();
        let transcoder = transcoder.clone();
        threads.push(tokio::spawn(async move {
            let mut tally = StatusBar::default();
            while let Ok(conversion) = receiver.recv().await {
                let name = conversion.input.display().to_string();
                match transcoder
                    .transcode(&conversion.input, &conversion.output)
                    .await
                {
                    Ok(()) => tally.register_converted(&name),
                    Err(e) => tally.register_err(&format!("{}: {:#}", name, e)),
                }
            }
            tally
        }));
    }

    for tally in join_all(threads).await {
        status.merge(tally.context("Conversion worker panicked")?);
    }
    Ok(status)
}
