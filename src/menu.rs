use std::sync::Arc;

use tracing::info;

use crate::{
    config::settings::Settings,
    convert::Transcoder,
    download::{Downloader, RunOutcome},
    job::Mode,
    session::{
        ask_folder, ask_worker_count, convert_and_report, prompt::Prompter, Session, SessionExit,
    },
    Result,
};

const ENTRIES: [&str; 5] = [
    "Download",
    "Archive",
    "Convert audio to MP3",
    "Update yt-dlp",
    "Exit",
];

/// The top menu, returns once the user exits
pub async fn run_menu<P, D, T>(
    prompter: &mut P,
    downloader: &D,
    transcoder: Arc<T>,
    settings: &mut Settings,
) -> Result<()>
where
    P: Prompter,
    D: Downloader,
    T: Transcoder + 'static,
{
    loop {
        let exit = match prompter.select("What do you want to do?", &ENTRIES, 0)? {
            0 => {
                Session::new(Mode::Download, &mut *prompter, downloader, transcoder.clone(), &mut *settings)
                    .run()
                    .await?
            }
            1 => {
                Session::new(Mode::Archive, &mut *prompter, downloader, transcoder.clone(), &mut *settings)
                    .run()
                    .await?
            }
            2 => {
                convert_folder(&mut *prompter, transcoder.clone(), settings).await?;
                SessionExit::Menu
            }
            3 => {
                update(&mut *prompter, downloader).await?;
                SessionExit::Menu
            }
            _ => SessionExit::Quit,
        };
        if exit == SessionExit::Quit {
            info!("Bye");
            return Ok(());
        }
    }
}

async fn convert_folder<P, T>(prompter: &mut P, transcoder: Arc<T>, settings: &Settings) -> Result<()>
where
    P: Prompter,
    T: Transcoder + 'static,
{
    let Some(folder) = ask_folder(
        &mut *prompter,
        "Folder with the m4a files",
        settings.destination.as_deref(),
    )?
    else {
        return Ok(());
    };
    let Some(workers) = ask_worker_count(&mut *prompter, settings.workers)? else {
        return Ok(());
    };

    if let Err(e) = convert_and_report(
        &mut *prompter,
        transcoder,
        &folder,
        workers,
        settings.log_file.as_deref(),
    )
    .await
    {
        prompter.notify(&format!("Conversion failed: {:#}", e));
    }
    Ok(())
}

async fn update<P: Prompter, D: Downloader>(prompter: &mut P, downloader: &D) -> Result<()> {
    match downloader.update().await? {
        RunOutcome::Completed(()) => prompter.notify("yt-dlp is up to date"),
        RunOutcome::Failed(message) => prompter.notify(&format!("Update failed:\n{}", message)),
        RunOutcome::Interrupted => prompter.notify("Update interrupted"),
    }
    Ok(())
}
