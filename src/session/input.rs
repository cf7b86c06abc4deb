use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use url::Url;

use crate::{job::ARCHIVE_EXTENSION, Result};

/// Typed into any text prompt to go back to the url step
pub const BACK_KEYWORD: &str = ":back";

const DATE_FORMATS: [&str; 2] = ["%Y%m%d", "%Y-%m-%d"];

pub fn is_back(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case(BACK_KEYWORD)
}

/// Accepts absolute http(s) urls with a host
pub fn parse_url(input: &str) -> Result<Url> {
    let input = input.trim();
    if input.is_empty() {
        bail!("The URL can't be empty");
    }
    let url = Url::parse(input).with_context(|| format!("\"{}\" is not a valid URL", input))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Only http and https URLs are supported");
    }
    if url.host_str().is_none_or(str::is_empty) {
        bail!("The URL has no host");
    }
    Ok(url)
}

/// Strips surrounding quotes and whitespace, as left behind by drag and drop into a terminal
pub fn clean_destination(input: &str) -> Option<PathBuf> {
    let cleaned = input.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
    if cleaned.is_empty() {
        None
    } else {
        Some(PathBuf::from(cleaned))
    }
}

pub fn validate_archive_name(input: &str) -> Result<String> {
    let name = input.trim();
    if name.is_empty() {
        bail!("The archive name can't be empty");
    }
    if name.contains(['/', '\\']) {
        bail!("The archive name can't contain path separators");
    }
    let suffix = format!(".{}", ARCHIVE_EXTENSION);
    if name.to_ascii_lowercase().ends_with(&suffix) {
        bail!("Leave out the {} extension, it is added automatically", suffix);
    }
    Ok(name.to_string())
}

/// A 1-based playlist index
pub fn parse_index(input: &str) -> Result<u32> {
    let input = input.trim();
    let index: u32 = input
        .parse()
        .with_context(|| format!("\"{}\" is not a whole number", input))?;
    if index == 0 {
        bail!("Playlist items are counted from 1");
    }
    Ok(index)
}

pub fn parse_range(start: &str, end: &str) -> Result<(u32, u32)> {
    let start = parse_index(start)?;
    let end = parse_index(end)?;
    if end <= start {
        bail!("The last item has to come after the first one");
    }
    Ok((start, end))
}

/// `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
        .with_context(|| format!("\"{}\" is not a date, use YYYYMMDD", input))
}

/// Upload date window, both ends inclusive
pub fn parse_date_range(after: &str, before: &str) -> Result<(NaiveDate, NaiveDate)> {
    let after = parse_date(after)?;
    let before = parse_date(before)?;
    if before < after {
        bail!("The end date can't be earlier than the start date");
    }
    Ok((after, before))
}

pub fn parse_worker_count(input: &str) -> Result<usize> {
    let input = input.trim();
    let count: i64 = input
        .parse()
        .with_context(|| format!("\"{}\" is not a whole number", input))?;
    if count <= 0 {
        bail!("At least one worker is required");
    }
    Ok(count as usize)
}
