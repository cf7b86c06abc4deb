use anyhow::Context;

use super::*;
use crate::Result;

// Number of items the dry run looks at
const TEST_ITEMS: u32 = 5;

impl JobConfig {
    /// Builds the yt-dlp format selector from the chosen stream types and selection mode
    pub fn format_selector(&self) -> Option<String> {
        let types = self.stream_types?;
        if types.is_empty() {
            return None;
        }

        let quality = match self.selection_mode.as_ref()? {
            SelectionMode::Manual(ids) => {
                if ids.is_empty() {
                    return None;
                }
                let separator = if types.both() && self.merge_streams { "+" } else { "," };
                return Some(ids.join(separator));
            }
            SelectionMode::Best => "best",
            SelectionMode::Worst => "worst",
        };

        let selector = match (types.audio, types.video) {
            (true, false) => format!("{q}audio[ext=m4a]/{q}audio", q = quality),
            (false, true) => format!("{q}video[ext=mp4]/{q}video", q = quality),
            _ if self.merge_streams => {
                format!("{q}video[ext=mp4]+{q}audio[ext=m4a]/{q}[ext=mp4]/{q}", q = quality)
            }
            _ => format!("{q}video[ext=mp4],{q}audio[ext=m4a]", q = quality),
        };
        Some(selector)
    }

    /// Arguments restricting which items of a playlist or channel are fetched
    pub fn playlist_args(&self) -> Vec<String> {
        self.selection_args(None)
    }

    /// Like [`Self::playlist_args`], but never more than `limit` items of the selection
    fn selection_args(&self, limit: Option<u32>) -> Vec<String> {
        let mut args = Vec::new();
        if !self.kind.is_some_and(|kind| kind.is_collection()) {
            return args;
        }

        let mut reverse_encoded = false;
        // With dates the cap counts items before the date filter
        if let (Some(limit), Selection::Entire | Selection::Dates { .. }) = (limit, &self.selection) {
            args.push("--playlist-items".to_string());
            args.push(format!("1:{}", limit));
        }

        match &self.selection {
            Selection::Entire => {}
            Selection::Indices { start, end } => {
                let end = match limit {
                    Some(limit) => (*end).min(start.saturating_add(limit.saturating_sub(1))),
                    None => *end,
                };
                args.push("--playlist-items".to_string());
                if self.order.reverse {
                    // Negative indices count from the end of the list
                    args.push(format!("-{}:-{}:-1", start, end));
                    reverse_encoded = true;
                } else {
                    args.push(format!("{}:{}", start, end));
                }
            }
            Selection::Dates { after, before } => {
                args.push("--dateafter".to_string());
                args.push(after.format("%Y%m%d").to_string());
                args.push("--datebefore".to_string());
                args.push(before.format("%Y%m%d").to_string());
            }
            Selection::SingleVideo => {
                args.push("--no-playlist".to_string());
                return args;
            }
        }

        if self.order.random {
            args.push("--playlist-random".to_string());
        }
        if self.order.reverse && !reverse_encoded {
            args.push("--playlist-reverse".to_string());
        }
        if self.order.lazy {
            args.push("--lazy-playlist".to_string());
        }
        args
    }

    /// Full output path template handed to `-o`
    pub fn output_path(&self) -> Result<String> {
        let destination = self.destination.as_ref().context("No destination selected")?;
        let template = self
            .output_template
            .as_ref()
            .context("No output template selected")?;
        Ok(destination
            .join(template)
            .to_str()
            .context("Invalid output path")?
            .to_string())
    }

    /// Arguments for the real run, the url comes last
    pub fn download_args(&self) -> Result<Vec<String>> {
        let url = self.url.as_ref().context("No url selected")?;
        let selector = self.format_selector().context("No streams selected")?;

        let mut args: Vec<String> = vec!["--ignore-errors".into(), "--add-metadata".into()];
        match self.overwrite {
            OverwritePolicy::Continue => {
                args.push("--no-overwrites".into());
                args.push("--continue".into());
            }
            OverwritePolicy::Overwrite => args.push("--force-overwrites".into()),
        }

        if let Some(archive) = self.archive_path() {
            args.push("--download-archive".into());
            args.push(
                archive
                    .to_str()
                    .context("Invalid archive file path")?
                    .to_string(),
            );
        }

        if let (Mode::Archive, Some(extras)) = (self.mode, self.extras) {
            if extras.subtitles {
                args.extend(["--write-subs", "--sub-langs", "all"].map(String::from));
            }
            if extras.description {
                args.push("--write-description".into());
            }
            if extras.thumbnail {
                args.push("--write-thumbnail".into());
            }
            if extras.metadata {
                args.push("--write-info-json".into());
            }
        }

        args.extend(self.playlist_args());
        args.extend([
            "-f".to_string(),
            selector,
            "-o".to_string(),
            self.output_path()?,
        ]);
        args.push(url.to_string());
        Ok(args)
    }

    /// Arguments for a dry run over the first few selected items, nothing gets written
    pub fn test_args(&self) -> Result<Vec<String>> {
        let url = self.url.as_ref().context("No url selected")?;
        let selector = self.format_selector().context("No streams selected")?;

        let mut args: Vec<String> = vec![
            "--simulate".into(),
            "--abort-on-error".into(),
            "--print".into(),
            "%(title)s | %(format_id)s | %(ext)s".into(),
        ];
        if self.kind.is_some_and(|kind| kind.is_collection()) {
            args.extend(self.selection_args(Some(TEST_ITEMS)));
        } else {
            args.push("--no-playlist".into());
        }
        args.extend([
            "-f".to_string(),
            selector,
            "-o".to_string(),
            self.output_path()?,
        ]);
        args.push(url.to_string());
        Ok(args)
    }
}
