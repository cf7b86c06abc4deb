use std::error::Error as StdError;
use std::fmt;

/// The URL parsed fine, but its shape is neither a video, a playlist nor a channel tab
#[derive(Debug, Clone)]
pub struct UnrecognizedUrlError {
    pub url: String,
}

impl StdError for UnrecognizedUrlError {}

impl fmt::Display for UnrecognizedUrlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unrecognized URL: {}", self.url)
    }
}

#[derive(Debug, Clone)]
pub struct MissingToolError {
    pub tool: &'static str,
}

impl StdError for MissingToolError {}

impl fmt::Display for MissingToolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} is required but could not be found", self.tool)
    }
}
