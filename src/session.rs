pub mod input;
pub mod prompt;
mod steps;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    config::settings::Settings,
    convert::{self, Transcoder},
    download::Downloader,
    job::{JobConfig, Mode},
    Result,
};

use prompt::Prompter;

/// The steps of a download or archive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    SelectUrl,
    SelectFolder,
    SelectArchive,
    DisambiguatePlaylist,
    SelectStreamTypeAndMode,
    SelectOutputTemplate,
    Running,
    PostRunChoice,
    Exit,
}

/// What a state handler decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    /// Ask the same question again
    Stay,
    /// Start over from the url, from `Running` ask for another folder
    Back,
    /// Run again, keeping the destination and archive
    Again,
    Leave(SessionExit),
}

/// Where the program continues after a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// Back to the top menu
    Menu,
    /// End the program
    Quit,
}

/// Maps the current state and the handler's decision to the next state
///
/// `retain` is set once the user chose to run again, the destination and
/// archive answers are kept in that case until the user goes back.
pub fn transition(state: State, step: Step, job: &JobConfig, retain: bool) -> State {
    let is_collection = job.kind.is_some_and(|kind| kind.is_collection());
    let after_archive = if is_collection {
        State::DisambiguatePlaylist
    } else {
        State::SelectStreamTypeAndMode
    };

    match (state, step) {
        (State::Exit, _) | (_, Step::Leave(_)) => State::Exit,
        (_, Step::Stay) => state,
        (_, Step::Again) => State::SelectUrl,

        (State::SelectUrl, Step::Back) => State::Exit,
        // The destination could not be used
        (State::Running, Step::Back) => State::SelectFolder,
        (_, Step::Back) => State::SelectUrl,

        (State::SelectUrl, Step::Next) if retain => after_archive,
        (State::SelectUrl, Step::Next) => State::SelectFolder,
        (State::SelectFolder, Step::Next) => State::SelectArchive,
        (State::SelectArchive, Step::Next) => after_archive,
        (State::DisambiguatePlaylist, Step::Next) => State::SelectStreamTypeAndMode,
        (State::SelectStreamTypeAndMode, Step::Next) => State::SelectOutputTemplate,
        (State::SelectOutputTemplate, Step::Next) if job.is_complete() => State::Running,
        (State::SelectOutputTemplate, Step::Next) => State::SelectUrl,
        (State::Running, Step::Next) => State::PostRunChoice,
        (State::PostRunChoice, Step::Next) => State::Exit,
    }
}

/// One pass through the questions of the download or archive menu entry
pub struct Session<'a, P, D, T> {
    prompter: &'a mut P,
    downloader: &'a D,
    transcoder: Arc<T>,
    settings: &'a mut Settings,
    job: JobConfig,
    retain: bool,
    exit: SessionExit,
}

impl<'a, P, D, T> Session<'a, P, D, T>
where
    P: Prompter,
    D: Downloader,
    T: Transcoder + 'static,
{
    pub fn new(
        mode: Mode,
        prompter: &'a mut P,
        downloader: &'a D,
        transcoder: Arc<T>,
        settings: &'a mut Settings,
    ) -> Self {
        let mut job = JobConfig::new(mode);
        job.archive_name = settings
            .use_archive
            .then(|| settings.archive_name.clone());
        job.merge_streams = settings.merge_streams;
        job.overwrite = settings.overwrite;

        Self {
            prompter,
            downloader,
            transcoder,
            settings,
            job,
            retain: false,
            exit: SessionExit::Menu,
        }
    }

    /// Runs the session until the user leaves it
    pub async fn run(mut self) -> Result<SessionExit> {
        let mut state = State::SelectUrl;
        while state != State::Exit {
            let step = self.handle(state).await?;
            match step {
                Step::Leave(exit) => self.exit = exit,
                Step::Again => self.retain = true,
                Step::Back => self.retain = false,
                _ => {}
            }
            let next = transition(state, step, &self.job, self.retain);
            if state == State::SelectOutputTemplate && next == State::SelectUrl {
                self.prompter
                    .notify("Some answers are missing, starting over from the URL");
            }
            debug!("{:?} --{:?}--> {:?}", state, step, next);
            state = next;
        }
        Ok(self.exit)
    }

    async fn handle(&mut self, state: State) -> Result<Step> {
        match state {
            State::SelectUrl => self.select_url().await,
            State::SelectFolder => self.select_folder(),
            State::SelectArchive => self.select_archive(),
            State::DisambiguatePlaylist => self.disambiguate_playlist(),
            State::SelectStreamTypeAndMode => self.select_streams().await,
            State::SelectOutputTemplate => self.select_output_template(),
            State::Running => self.running().await,
            State::PostRunChoice => self.post_run_choice(),
            State::Exit => Ok(Step::Leave(self.exit)),
        }
    }

    fn remember_answers(&mut self) {
        if !self.settings.remember_answers {
            return;
        }
        self.settings.remember(&self.job);
        if let Err(e) = self.settings.save() {
            warn!("Could not save settings: {:#}", e);
        }
    }
}

/// Asks for a folder until a usable one is given, `None` if the user went back
pub fn ask_folder<P: Prompter>(
    prompter: &mut P,
    prompt: &str,
    default: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let default = default.map(|path| path.display().to_string());
    loop {
        let answer = prompter.text(prompt, default.as_deref())?;
        if input::is_back(&answer) {
            return Ok(None);
        }
        match input::clean_destination(&answer) {
            Some(folder) => return Ok(Some(folder)),
            None => prompter.notify("The folder can't be empty"),
        }
    }
}

/// Asks for the number of simultaneous conversions, `None` if the user went back
pub fn ask_worker_count<P: Prompter>(prompter: &mut P, default: usize) -> Result<Option<usize>> {
    let default = default.to_string();
    loop {
        let answer = prompter.text("How many files should be converted at once?", Some(&default))?;
        if input::is_back(&answer) {
            return Ok(None);
        }
        match input::parse_worker_count(&answer) {
            Ok(workers) => return Ok(Some(workers)),
            Err(e) => prompter.notify(&e.to_string()),
        }
    }
}

/// Converts the audio files in `folder` and shows the result
pub async fn convert_and_report<P, T>(
    prompter: &mut P,
    transcoder: Arc<T>,
    folder: &Path,
    workers: usize,
    log_file: Option<&Path>,
) -> Result<()>
where
    P: Prompter,
    T: Transcoder + 'static,
{
    let status = convert::fan_out(transcoder, folder, workers).await?;
    if status.converted() + status.failed() == 0 {
        prompter.notify(if status.skipped() > 0 {
            "Every file was already converted"
        } else {
            "No m4a files found"
        });
    }
    prompter.notify(&format!(
        "{} -> {}",
        status,
        convert::output_dir(folder).display()
    ));
    if let Some(log_file) = log_file {
        status.write_log_to_file(log_file).await?;
    }
    Ok(())
}
