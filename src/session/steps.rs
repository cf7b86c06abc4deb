use anyhow::Context;
use tracing::{debug, info};
use url::Url;

use super::*;
use crate::{
    config::settings::{AutoSelection, UrlCheckPolicy},
    download::{
        formats::{filter_streams, table_header},
        RunOutcome,
    },
    job::{
        ArchiveExtras, ContentKind, PlaylistOrder, Selection, SelectionMode, StreamTypes,
        DEFAULT_ARCHIVE_NAME,
    },
};

const BACK_TO_START: &str = "Back to start";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeChoice {
    Entire,
    Indices,
    Dates,
    SingleVideo,
}

impl<P, D, T> Session<'_, P, D, T>
where
    P: Prompter,
    D: Downloader,
    T: Transcoder + 'static,
{
    /// Free text answer, `None` when the user typed the back keyword
    fn ask_text(&mut self, prompt: &str, default: Option<&str>) -> Result<Option<String>> {
        let answer = self.prompter.text(prompt, default)?;
        if input::is_back(&answer) {
            return Ok(None);
        }
        Ok(Some(answer))
    }

    pub(super) async fn select_url(&mut self) -> Result<Step> {
        let default = self.job.url.as_ref().map(Url::to_string);
        let prompt = format!("URL (type {} to leave)", input::BACK_KEYWORD);
        let Some(answer) = self.ask_text(&prompt, default.as_deref())? else {
            return Ok(Step::Back);
        };

        let url = match input::parse_url(&answer) {
            Ok(url) => url,
            Err(e) => {
                self.prompter.notify(&format!("{:#}", e));
                return Ok(Step::Stay);
            }
        };
        let kind = match ContentKind::from_url(&url) {
            Ok(kind) => kind,
            Err(e) => {
                self.prompter.notify(&format!(
                    "{}\nFor channels use the videos tab, e.g. https://www.youtube.com/@name/videos",
                    e
                ));
                return Ok(Step::Leave(SessionExit::Menu));
            }
        };

        let policy = self.settings.url_check;
        if policy != UrlCheckPolicy::Skip {
            match self.downloader.check_url(&url).await? {
                RunOutcome::Completed(()) => debug!("{} is reachable", url),
                RunOutcome::Interrupted => {
                    self.prompter.notify("URL check interrupted, continuing anyway")
                }
                RunOutcome::Failed(message) => {
                    self.prompter
                        .notify(&format!("The URL could not be checked:\n{}", message));
                    if policy == UrlCheckPolicy::Require {
                        return Ok(Step::Stay);
                    }
                }
            }
        }

        if self.job.kind != Some(kind) {
            self.job.selection = Selection::Entire;
            self.job.order = PlaylistOrder::default();
        }
        self.job.url = Some(url);
        self.job.kind = Some(kind);
        Ok(Step::Next)
    }

    pub(super) fn select_folder(&mut self) -> Result<Step> {
        let default = self
            .job
            .destination
            .clone()
            .or_else(|| self.settings.destination.clone())
            .map(|path| path.display().to_string());
        let Some(answer) = self.ask_text("Destination folder", default.as_deref())? else {
            return Ok(Step::Back);
        };

        match input::clean_destination(&answer) {
            Some(destination) => {
                self.job.destination = Some(destination);
                Ok(Step::Next)
            }
            None => {
                self.prompter.notify("The destination can't be empty");
                Ok(Step::Stay)
            }
        }
    }

    pub(super) fn select_archive(&mut self) -> Result<Step> {
        let default_label = format!("Use the default archive file ({}.txt)", DEFAULT_ARCHIVE_NAME);
        let items = [
            default_label.as_str(),
            "Use a custom archive file",
            "Don't use an archive file",
            BACK_TO_START,
        ];
        let default = match self.job.archive_name.as_deref() {
            Some(DEFAULT_ARCHIVE_NAME) => 0,
            Some(_) => 1,
            None => 2,
        };

        match self.prompter.select(
            "The archive file records finished downloads so they are skipped next time",
            &items,
            default,
        )? {
            0 => self.job.archive_name = Some(DEFAULT_ARCHIVE_NAME.to_string()),
            1 => {
                let current = self
                    .job
                    .archive_name
                    .clone()
                    .filter(|name| name != DEFAULT_ARCHIVE_NAME);
                let Some(answer) = self.ask_text("Archive file name (without .txt)", current.as_deref())?
                else {
                    return Ok(Step::Back);
                };
                match input::validate_archive_name(&answer) {
                    Ok(name) => self.job.archive_name = Some(name),
                    Err(e) => {
                        self.prompter.notify(&e.to_string());
                        return Ok(Step::Stay);
                    }
                }
            }
            2 => self.job.archive_name = None,
            _ => return Ok(Step::Back),
        }
        Ok(Step::Next)
    }

    pub(super) fn disambiguate_playlist(&mut self) -> Result<Step> {
        let kind = self.job.kind.unwrap_or(ContentKind::Playlist);
        let mut choices = vec![
            (
                RangeChoice::Entire,
                if kind == ContentKind::Channel {
                    "Entire channel"
                } else {
                    "Entire playlist"
                },
            ),
            (RangeChoice::Indices, "Custom range of items"),
            (RangeChoice::Dates, "Custom range of upload dates"),
        ];
        if kind == ContentKind::VideoInPlaylist {
            choices.push((RangeChoice::SingleVideo, "Only this video"));
        }
        let mut items: Vec<&str> = choices.iter().map(|(_, label)| *label).collect();
        items.push(BACK_TO_START);

        let current = match self.job.selection {
            Selection::Entire => RangeChoice::Entire,
            Selection::Indices { .. } => RangeChoice::Indices,
            Selection::Dates { .. } => RangeChoice::Dates,
            Selection::SingleVideo => RangeChoice::SingleVideo,
        };
        let default = choices
            .iter()
            .position(|(choice, _)| *choice == current)
            .unwrap_or(0);

        let index = self
            .prompter
            .select("What should be downloaded?", &items, default)?;
        let Some((choice, _)) = choices.get(index).copied() else {
            return Ok(Step::Back);
        };

        match choice {
            RangeChoice::Entire => self.job.selection = Selection::Entire,
            RangeChoice::SingleVideo => {
                self.job.selection = Selection::SingleVideo;
                self.job.order = PlaylistOrder::default();
                return Ok(Step::Next);
            }
            RangeChoice::Indices => {
                let (start, end) = match self.job.selection {
                    Selection::Indices { start, end } => (Some(start.to_string()), Some(end.to_string())),
                    _ => (None, None),
                };
                let Some(start) = self.ask_text("First item", start.as_deref())? else {
                    return Ok(Step::Back);
                };
                let Some(end) = self.ask_text("Last item", end.as_deref())? else {
                    return Ok(Step::Back);
                };
                match input::parse_range(&start, &end) {
                    Ok((start, end)) => self.job.selection = Selection::Indices { start, end },
                    Err(e) => {
                        self.prompter.notify(&format!("{:#}", e));
                        return Ok(Step::Stay);
                    }
                }
            }
            RangeChoice::Dates => {
                let (after, before) = match self.job.selection {
                    Selection::Dates { after, before } => (
                        Some(after.format("%Y%m%d").to_string()),
                        Some(before.format("%Y%m%d").to_string()),
                    ),
                    _ => (None, None),
                };
                let Some(after) = self.ask_text("Uploaded on or after (YYYYMMDD)", after.as_deref())? else {
                    return Ok(Step::Back);
                };
                let Some(before) = self.ask_text("Uploaded on or before (YYYYMMDD)", before.as_deref())?
                else {
                    return Ok(Step::Back);
                };
                match input::parse_date_range(&after, &before) {
                    Ok((after, before)) => self.job.selection = Selection::Dates { after, before },
                    Err(e) => {
                        self.prompter.notify(&format!("{:#}", e));
                        return Ok(Step::Stay);
                    }
                }
            }
        }

        let order = self.job.order;
        let picked = self.prompter.multi_select(
            "Playlist order (space to toggle, enter to confirm)",
            &["Random", "Reverse", "Lazy (start before the whole list is known)"],
            &[order.random, order.reverse, order.lazy],
        )?;
        self.job.order = PlaylistOrder {
            random: picked.contains(&0),
            reverse: picked.contains(&1),
            lazy: picked.contains(&2),
        };
        Ok(Step::Next)
    }

    pub(super) async fn select_streams(&mut self) -> Result<Step> {
        let current = self.job.stream_types.unwrap_or(self.settings.stream_types);
        let picked = self.prompter.multi_select(
            "Which streams should be downloaded?",
            &["Audio", "Video"],
            &[current.audio, current.video],
        )?;
        let types = StreamTypes {
            audio: picked.contains(&0),
            video: picked.contains(&1),
        };
        if types.is_empty() {
            self.prompter.notify("Pick at least one stream type");
            return Ok(Step::Stay);
        }

        let default = match &self.job.selection_mode {
            Some(SelectionMode::Best) => 0,
            Some(SelectionMode::Worst) => 1,
            Some(SelectionMode::Manual(_)) => 2,
            None => match self.settings.selection {
                AutoSelection::Best => 0,
                AutoSelection::Worst => 1,
            },
        };
        let mode = match self.prompter.select(
            "How should the streams be chosen?",
            &["Best quality", "Worst quality", "Pick manually", BACK_TO_START],
            default,
        )? {
            0 => SelectionMode::Best,
            1 => SelectionMode::Worst,
            2 => SelectionMode::Manual(Vec::new()),
            _ => return Ok(Step::Back),
        };

        if types.both() {
            let default = if self.job.merge_streams { 0 } else { 1 };
            match self.prompter.select(
                "Audio and video",
                &["Merge into one file", "Keep separate files", BACK_TO_START],
                default,
            )? {
                0 => self.job.merge_streams = true,
                1 => self.job.merge_streams = false,
                _ => return Ok(Step::Back),
            }
        }

        let mode = match mode {
            SelectionMode::Manual(_) => match self.pick_streams(types).await? {
                Some(ids) => SelectionMode::Manual(ids),
                None => return Ok(Step::Stay),
            },
            automatic => automatic,
        };

        self.job.stream_types = Some(types);
        self.job.selection_mode = Some(mode);
        Ok(Step::Next)
    }

    /// Shows the stream table and lets the user pick format ids, `None` asks again
    async fn pick_streams(&mut self, types: StreamTypes) -> Result<Option<Vec<String>>> {
        let url = self.job.url.clone().context("No url selected")?;
        let formats = match self.downloader.probe_streams(&url).await? {
            RunOutcome::Completed(formats) => formats,
            RunOutcome::Interrupted => {
                self.prompter.notify("Listing the streams was interrupted");
                return Ok(None);
            }
            RunOutcome::Failed(message) => {
                self.prompter
                    .notify(&format!("The streams could not be listed:\n{}", message));
                return Ok(None);
            }
        };

        let streams = filter_streams(formats, types);
        if streams.is_empty() {
            self.prompter.notify("No matching streams found");
            return Ok(None);
        }

        let rows: Vec<String> = streams.iter().map(|stream| stream.table_row()).collect();
        self.prompter.notify(&table_header());
        let items: Vec<&str> = rows.iter().map(String::as_str).collect();
        let picked = self
            .prompter
            .multi_select("Pick the streams to download", &items, &[])?;
        if picked.is_empty() {
            self.prompter.notify("Pick at least one stream");
            return Ok(None);
        }

        Ok(Some(
            picked
                .into_iter()
                .filter_map(|index| streams.get(index))
                .map(|stream| stream.format_id.clone())
                .collect(),
        ))
    }

    pub(super) fn select_output_template(&mut self) -> Result<Step> {
        let default = self
            .job
            .output_template
            .clone()
            .unwrap_or_else(|| self.settings.output_template.clone());
        let Some(template) = self.ask_text("Output file name template", Some(&default))? else {
            return Ok(Step::Back);
        };
        if template.trim().is_empty() {
            self.prompter.notify("The template can't be empty");
            return Ok(Step::Stay);
        }
        self.job.output_template = Some(template.trim().to_string());

        if self.job.mode == Mode::Archive {
            let current = self.job.extras.unwrap_or_default();
            let picked = self.prompter.multi_select(
                "Save alongside each video",
                &["Subtitles", "Description", "Thumbnail", "Metadata (.info.json)"],
                &[
                    current.subtitles,
                    current.description,
                    current.thumbnail,
                    current.metadata,
                ],
            )?;
            self.job.extras = Some(ArchiveExtras {
                subtitles: picked.contains(&0),
                description: picked.contains(&1),
                thumbnail: picked.contains(&2),
                metadata: picked.contains(&3),
            });
        }
        Ok(Step::Next)
    }

    pub(super) async fn running(&mut self) -> Result<Step> {
        let destination = self.job.destination.clone().context("No destination selected")?;

        if self
            .prompter
            .confirm("Do a test run on the first items first?", false)?
        {
            match self.downloader.test_run(&self.job).await? {
                RunOutcome::Completed(()) => self.prompter.notify("Test run succeeded"),
                RunOutcome::Interrupted => self.prompter.notify("Test run skipped"),
                RunOutcome::Failed(message) => {
                    self.prompter
                        .notify(&format!("The test run failed:\n{}", message));
                    if !self.prompter.confirm("Continue anyway?", false)? {
                        return Ok(Step::Leave(SessionExit::Menu));
                    }
                }
            }
        }

        if let Err(e) = tokio::fs::create_dir_all(&destination).await {
            self.prompter.notify(&format!(
                "Could not create the destination {}: {}",
                destination.display(),
                e
            ));
            self.job.destination = None;
            return Ok(Step::Back);
        }

        info!("Starting download into {}", destination.display());
        match self.downloader.download(&self.job).await? {
            RunOutcome::Completed(()) => {
                self.prompter.notify("Download finished");
                self.remember_answers();
                if self.job.produces_audio_files() {
                    self.offer_conversion(&destination).await?;
                }
            }
            RunOutcome::Failed(message) => self
                .prompter
                .notify(&format!("The download failed:\n{}", message)),
            RunOutcome::Interrupted => self.prompter.notify("Download interrupted"),
        }
        Ok(Step::Next)
    }

    async fn offer_conversion(&mut self, destination: &Path) -> Result<()> {
        if !self
            .prompter
            .confirm("Convert the downloaded audio to mp3?", false)?
        {
            return Ok(());
        }
        let Some(workers) = ask_worker_count(&mut *self.prompter, self.settings.workers)? else {
            return Ok(());
        };
        if let Err(e) = convert_and_report(
            &mut *self.prompter,
            self.transcoder.clone(),
            destination,
            workers,
            self.settings.log_file.as_deref(),
        )
        .await
        {
            self.prompter.notify(&format!("Conversion failed: {:#}", e));
        }
        Ok(())
    }

    pub(super) fn post_run_choice(&mut self) -> Result<Step> {
        let again = match self.job.mode {
            Mode::Download => "Download again with these settings",
            Mode::Archive => "Archive again with these settings",
        };
        match self.prompter.select(
            "What next?",
            &[again, "Back to the main menu", "Exit"],
            0,
        )? {
            0 => Ok(Step::Again),
            1 => Ok(Step::Leave(SessionExit::Menu)),
            _ => Ok(Step::Leave(SessionExit::Quit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        convert::testing::CopyTranscoder,
        download::{formats::StreamFormat, recording::RecordingDownloader},
        session::prompt::scripted::{Answer, ScriptedPrompter},
    };

    use Answer::*;

    const VIDEO_URL: &str = "https://www.youtube.com/watch?v=AAAAAAAAAAA";
    const PLAYLIST_URL: &str = "https://www.youtube.com/watch?v=AAAAAAAAAAA&list=PL123";

    fn leak(text: String) -> &'static str {
        Box::leak(text.into_boxed_str())
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    async fn run_session(
        mode: Mode,
        prompter: &mut ScriptedPrompter,
        downloader: &RecordingDownloader,
        settings: &mut Settings,
    ) -> SessionExit {
        let transcoder = Arc::new(CopyTranscoder::default());
        let exit = Session::new(mode, &mut *prompter, downloader, transcoder, settings)
            .run()
            .await
            .unwrap();
        assert_eq!(prompter.remaining(), 0, "unused answers");
        exit
    }

    #[tokio::test]
    async fn single_audio_download() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out");
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(destination.display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Quit);

        let downloads = downloader.downloads();
        assert_eq!(downloads.len(), 1);
        let args = &downloads[0];
        assert!(has_pair(args, "-f", "bestaudio[ext=m4a]/bestaudio"));
        assert!(!args.iter().any(|arg| arg.contains("video")));
        let archive = destination.join("archive.txt");
        assert!(has_pair(args, "--download-archive", archive.to_str().unwrap()));
        assert!(args[args.iter().position(|arg| arg == "-o").unwrap() + 1]
            .starts_with(destination.to_str().unwrap()));
        assert_eq!(args.last().unwrap(), VIDEO_URL);

        // The destination is created only once the run starts
        assert!(destination.is_dir());
        assert_eq!(settings.destination, Some(destination));
        assert_eq!(settings.stream_types, StreamTypes::AUDIO);
    }

    #[tokio::test]
    async fn playlist_index_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(PLAYLIST_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choice(1),
            Text("1"),
            Text("5"),
            Choices(vec![]),
            Choices(vec![0, 1]),
            Choice(0),
            Choice(0),
            Text(""),
            No,
            Choice(1),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Menu);

        let args = &downloader.downloads()[0];
        assert!(has_pair(args, "--playlist-items", "1:5"));
        assert!(!args.contains(&"--playlist-reverse".to_string()));
        assert!(has_pair(
            args,
            "-f",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        ));
    }

    #[tokio::test]
    async fn invalid_answers_are_asked_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text("   "),
            Text("not a url"),
            Text(VIDEO_URL),
            Text(" \"\" "),
            Text(leak(format!("\"{}\"", dir.path().display()))),
            Choice(1),
            Text("music.txt"),
            Choice(1),
            Text("music"),
            Choices(vec![]),
            Choices(vec![0]),
            Choice(1),
            Text("  "),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;

        assert!(prompter.messages.iter().any(|m| m.contains("can't be empty")));
        assert!(prompter.messages.iter().any(|m| m.contains("Pick at least one")));
        let args = &downloader.downloads()[0];
        let archive = dir.path().join("music.txt");
        assert!(has_pair(args, "--download-archive", archive.to_str().unwrap()));
        assert!(has_pair(args, "-f", "worstaudio[ext=m4a]/worstaudio"));
    }

    #[tokio::test]
    async fn failed_test_run_can_be_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(2),
            Choices(vec![0, 1]),
            Choice(0),
            Choice(1),
            Text(""),
            Yes,
            No,
        ]);
        let downloader = RecordingDownloader {
            test: RunOutcome::Failed("ERROR: Video unavailable".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Menu);
        assert_eq!(downloader.tests.lock().unwrap().len(), 1);
        assert!(downloader.downloads().is_empty());
        assert!(prompter.messages.iter().any(|m| m.contains("Video unavailable")));
    }

    #[tokio::test]
    async fn failed_download_goes_to_the_post_run_choice() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choices(vec![1]),
            Choice(0),
            Text(""),
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader {
            result: RunOutcome::Failed("ERROR: HTTP Error 403".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Quit);
        assert!(prompter.messages.iter().any(|m| m.contains("HTTP Error 403")));
        // Nothing is remembered from a failed run
        assert_eq!(settings.destination, None);
    }

    #[tokio::test]
    async fn again_keeps_folder_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(1),
            Text("music"),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(0),
            // Second round starts at the url and skips folder and archive
            Text("https://www.youtube.com/watch?v=BBBBBBBBBBB"),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;

        let downloads = downloader.downloads();
        assert_eq!(downloads.len(), 2);
        let archive = dir.path().join("music.txt");
        for args in &downloads {
            assert!(has_pair(args, "--download-archive", archive.to_str().unwrap()));
        }
        assert!(downloads[1].last().unwrap().contains("BBBBBBBBBBB"));
    }

    #[tokio::test]
    async fn back_returns_to_the_url_and_then_the_menu() {
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(":back"),
            Text(":back"),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Menu);
        assert!(downloader.downloads().is_empty());
    }

    #[tokio::test]
    async fn channel_without_videos_tab_returns_to_menu() {
        let mut prompter = ScriptedPrompter::new([Text("https://www.youtube.com/@someone")]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Menu);
        assert!(prompter.messages[0].contains("Unrecognized URL"));
    }

    #[tokio::test]
    async fn required_url_check_asks_again() {
        let mut prompter = ScriptedPrompter::new([Text(VIDEO_URL), Text(":back")]);
        let downloader = RecordingDownloader {
            check: RunOutcome::Failed("ERROR: Incomplete YouTube ID".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        settings.url_check = UrlCheckPolicy::Require;

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(downloader.checked.lock().unwrap().len(), 1);
        assert_eq!(prompter.prompts.len(), 2);
    }

    #[tokio::test]
    async fn skipped_url_check_never_calls_the_downloader() {
        let mut prompter = ScriptedPrompter::new([Text(VIDEO_URL), Text(":back"), Text(":back")]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();
        settings.url_check = UrlCheckPolicy::Skip;

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert!(downloader.checked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_stream_selection() {
        let dir = tempfile::tempdir().unwrap();
        let formats: Vec<StreamFormat> = serde_json::from_str(
            r#"[
                {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5},
                {"format_id": "137", "ext": "mp4", "acodec": "none", "vcodec": "avc1", "resolution": "1920x1080"}
            ]"#,
        )
        .unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(2),
            Choices(vec![0]),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader {
            formats: RunOutcome::Completed(formats),
            ..Default::default()
        };
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;

        assert!(prompter.messages.iter().any(|m| m.starts_with("ID")));
        let args = &downloader.downloads()[0];
        assert!(has_pair(args, "-f", "140"));
    }

    #[tokio::test]
    async fn archive_mode_writes_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text("https://www.youtube.com/@someone/videos"),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choice(2),
            Text("20230101"),
            Text("20231231"),
            Choices(vec![2]),
            Choices(vec![0, 1]),
            Choice(0),
            Choice(0),
            Text(""),
            Choices(vec![0, 3]),
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        run_session(Mode::Archive, &mut prompter, &downloader, &mut settings).await;

        let args = &downloader.downloads()[0];
        assert!(has_pair(args, "--dateafter", "20230101"));
        assert!(has_pair(args, "--datebefore", "20231231"));
        assert!(args.contains(&"--lazy-playlist".to_string()));
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(args.contains(&"--write-info-json".to_string()));
        assert!(!args.contains(&"--write-thumbnail".to_string()));
    }

    #[tokio::test]
    async fn downloaded_audio_can_be_converted() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("music");
        std::fs::create_dir(&destination).unwrap();
        std::fs::write(destination.join("song.m4a"), b"audio").unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(destination.display().to_string())),
            Choice(2),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            Yes,
            Text("0"),
            Text("2"),
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;

        let output = crate::convert::output_dir(&destination);
        assert_eq!(output, dir.path().join("music MP3"));
        assert!(output.join("song.mp3").exists());
        assert!(prompter.messages.iter().any(|m| m.contains("At least one worker")));
    }

    #[tokio::test]
    async fn unusable_destination_asks_for_another_folder() {
        let dir = tempfile::tempdir().unwrap();
        let plain_file = dir.path().join("plainfile");
        std::fs::write(&plain_file, b"not a folder").unwrap();
        let unusable = plain_file.join("out");
        let destination = dir.path().join("out");
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(unusable.display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            // The run could not start, the folder is asked again
            Text(leak(destination.display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Quit);
        assert!(prompter.messages.iter().any(|m| m.contains("Could not create the destination")));

        let downloads = downloader.downloads();
        assert_eq!(downloads.len(), 1);
        let args = &downloads[0];
        assert!(args[args.iter().position(|arg| arg == "-o").unwrap() + 1]
            .starts_with(destination.to_str().unwrap()));
        assert!(destination.is_dir());
        assert_eq!(settings.destination, Some(destination));
    }

    #[tokio::test]
    async fn failed_conversion_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("music");
        // Occupies the name of the mp3 folder
        std::fs::write(dir.path().join("music MP3"), b"").unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(destination.display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            Yes,
            Text(""),
            Choice(1),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Menu);
        assert!(prompter.messages.iter().any(|m| m.contains("Conversion failed")));
    }

    #[tokio::test]
    async fn interrupted_url_check_continues() {
        let mut prompter = ScriptedPrompter::new([Text(VIDEO_URL), Text(":back"), Text(":back")]);
        let downloader = RecordingDownloader {
            check: RunOutcome::Interrupted,
            ..Default::default()
        };
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(downloader.checked.lock().unwrap().len(), 1);
        assert!(prompter.messages.iter().any(|m| m.contains("URL check interrupted")));
        assert_eq!(prompter.prompts[1], "Destination folder");
    }

    #[tokio::test]
    async fn interrupted_stream_listing_asks_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(2),
            // Same question again, this time without the table
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader {
            formats: RunOutcome::Interrupted,
            ..Default::default()
        };
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert!(prompter.messages.iter().any(|m| m.contains("interrupted")));
        let stream_prompts = prompter
            .prompts
            .iter()
            .filter(|p| p.starts_with("Which streams"))
            .count();
        assert_eq!(stream_prompts, 2);
        assert!(has_pair(&downloader.downloads()[0], "-f", "bestaudio[ext=m4a]/bestaudio"));
    }

    #[tokio::test]
    async fn interrupted_test_run_still_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choices(vec![1]),
            Choice(0),
            Text(""),
            Yes,
            Choice(2),
        ]);
        let downloader = RecordingDownloader {
            test: RunOutcome::Interrupted,
            ..Default::default()
        };
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert!(prompter.messages.iter().any(|m| m == "Test run skipped"));
        assert_eq!(downloader.tests.lock().unwrap().len(), 1);
        assert_eq!(downloader.downloads().len(), 1);
    }

    #[tokio::test]
    async fn interrupted_download_goes_to_the_post_run_choice() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            // No conversion offer, straight to what next
            Choice(1),
        ]);
        let downloader = RecordingDownloader {
            result: RunOutcome::Interrupted,
            ..Default::default()
        };
        let mut settings = Settings::default();

        let exit = run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        assert_eq!(exit, SessionExit::Menu);
        assert!(prompter.messages.iter().any(|m| m == "Download interrupted"));
        assert_eq!(prompter.prompts.last().unwrap(), "What next?");
        assert_eq!(settings.destination, None);
    }

    #[tokio::test]
    async fn back_after_again_asks_for_the_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = ScriptedPrompter::new([
            Text(VIDEO_URL),
            Text(leak(dir.path().display().to_string())),
            Choice(0),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(0),
            // Again skips the folder, then back to start
            Text(""),
            Choices(vec![0]),
            Choice(3),
            Text(""),
            Text(""),
            Choice(2),
            Choices(vec![0]),
            Choice(0),
            Text(""),
            No,
            No,
            Choice(2),
        ]);
        let downloader = RecordingDownloader::default();
        let mut settings = Settings::default();

        run_session(Mode::Download, &mut prompter, &downloader, &mut settings).await;
        let folder_prompts = prompter
            .prompts
            .iter()
            .filter(|p| *p == "Destination folder")
            .count();
        assert_eq!(folder_prompts, 2);

        let downloads = downloader.downloads();
        assert_eq!(downloads.len(), 2);
        assert!(!downloads[1].contains(&"--download-archive".to_string()));
    }
}
