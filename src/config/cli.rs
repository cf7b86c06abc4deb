use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::settings::UrlCheckPolicy;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Download and archive videos with yt-dlp, convert audio with ffmpeg"
)]
pub struct Cli {
    #[clap(long, help = "Path to settings file", default_value = "yt-archiver.json")]
    pub settings_path: PathBuf,

    #[clap(long, help = "Path to the yt-dlp executable")]
    pub ytdlp: Option<PathBuf>,

    #[clap(long, help = "Path to the ffmpeg executable")]
    pub ffmpeg: Option<PathBuf>,

    #[clap(long, value_enum, help = "How urls are checked before downloading")]
    pub url_check: Option<UrlCheckPolicy>,

    #[clap(long, help = "Don't remember answers in the settings file")]
    pub no_save: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    #[clap(about = "Open the interactive menu (default)")]
    Menu {},

    #[clap(about = "Convert every m4a file in a folder to mp3")]
    Convert {
        #[clap(help = "Folder containing the m4a files")]
        folder: PathBuf,

        #[clap(
            long,
            short,
            help = "Number of simultaneous conversions",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        workers: Option<u64>,
    },

    #[clap(about = "Check for yt-dlp and ffmpeg, downloading yt-dlp if missing")]
    Setup {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_menu() {
        let cli = Cli::try_parse_from(["yt-archiver"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.settings_path, PathBuf::from("yt-archiver.json"));
        assert!(!cli.no_save);
    }

    #[test]
    fn parses_convert() {
        let cli = Cli::try_parse_from(["yt-archiver", "--url-check", "skip", "convert", "music", "-w", "3"])
            .unwrap();
        assert_eq!(cli.url_check, Some(UrlCheckPolicy::Skip));
        assert_eq!(
            cli.command,
            Some(Commands::Convert {
                folder: PathBuf::from("music"),
                workers: Some(3)
            })
        );
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(Cli::try_parse_from(["yt-archiver", "convert", "music", "-w", "0"]).is_err());
    }
}
