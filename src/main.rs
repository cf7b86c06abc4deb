mod config;
mod convert;
mod download;
mod errors;
mod job;
mod menu;
mod session;
mod status_bar;

use std::sync::Arc;

use anyhow::bail;

// Animations and logging
use tracing::info;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::cli::{self, Commands};
use crate::config::settings;
use crate::convert::ffmpeg::Ffmpeg;
use crate::download::{install, ytdlp::YtDlp};
use crate::session::prompt::TerminalPrompter;

pub type Result<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> crate::Result<()> {
    // Start logging
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(indicatif_layer.get_stderr_writer())
                .compact(),
        )
        .with(indicatif_layer)
        .init();

    let cli = <cli::Cli as clap::Parser>::parse();

    let mut settings = settings::read_settings(&cli.settings_path)?;
    settings.apply_cli(&cli);

    let mut prompter = TerminalPrompter;
    match cli.command.unwrap_or(Commands::Menu {}) {
        Commands::Menu {} => {
            let ytdlp = install::ensure_ytdlp(&mut prompter, &settings.ytdlp_path).await?;
            let ffmpeg = install::ensure_ffmpeg(&settings.ffmpeg_path).await?;
            let downloader = YtDlp::new(ytdlp, settings.extra_args.clone());
            let transcoder = Arc::new(Ffmpeg::new(ffmpeg, settings.mp3_bitrate.clone()));
            menu::run_menu(&mut prompter, &downloader, transcoder, &mut settings).await?;
        }
        Commands::Convert { folder, workers } => {
            let ffmpeg = install::ensure_ffmpeg(&settings.ffmpeg_path).await?;
            let transcoder = Arc::new(Ffmpeg::new(ffmpeg, settings.mp3_bitrate.clone()));
            let workers = workers.map_or(settings.workers, |workers| workers as usize);

            let status = convert::fan_out(transcoder, &folder, workers).await?;
            info!("{}", status);
            if let Some(log_file) = &settings.log_file {
                status.write_log_to_file(log_file).await?;
            }
            if status.failed() > 0 {
                bail!("{} file(s) could not be converted", status.failed());
            }
        }
        Commands::Setup {} => {
            let ytdlp = install::ensure_ytdlp(&mut prompter, &settings.ytdlp_path).await?;
            let ffmpeg = install::ensure_ffmpeg(&settings.ffmpeg_path).await?;
            info!("Using yt-dlp at {}", ytdlp.display());
            info!("Using ffmpeg at {}", ffmpeg.display());
        }
    }

    Ok(())
}
