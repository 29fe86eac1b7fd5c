use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
Navigation
  j / Down        next row
  k / Up          previous row
  h / Left        previous column
  l / Right       next column
  PgUp / PgDown   page up / down
  g / G           first / last row

Table
  s               cycle sort on the selected column (asc, desc, off)
  /               search (live, Esc restores the previous term)
  Enter           show the selected record
  r               reload the collection

Uploads
  u               upload image files (space separated paths)
  x               remove an uploaded asset (by number)
  y               copy the uploaded assets as JSON

  ?               this help
  Esc             close popup
  q               quit";

#[derive(Debug)]
pub enum TDError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    HttpError(String),
    ApiStatus(u16),
    Unauthorized,
    MissingApiUrl,
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl fmt::Display for TDError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TDError::IoError(e) => write!(f, "I/O error: {e}"),
            TDError::PolarsError(e) => write!(f, "Failed to read data: {e}"),
            TDError::JsonError(e) => write!(f, "Invalid JSON: {e}"),
            TDError::HttpError(msg) => write!(f, "Request failed: {msg}"),
            TDError::ApiStatus(code) => write!(f, "API answered with status {code}"),
            TDError::Unauthorized => write!(f, "Session expired, please provide a fresh token"),
            TDError::MissingApiUrl => write!(f, "No API url configured (use --api-url)"),
            TDError::LoadingFailed(msg) => write!(f, "Loading failed: {msg}"),
            TDError::FileNotFound => write!(f, "File not found"),
            TDError::PermissionDenied => write!(f, "Permission denied"),
            TDError::UnknownFileType => write!(f, "Unknown file type"),
        }
    }
}

impl std::error::Error for TDError {}

impl From<Error> for TDError {
    fn from(err: Error) -> Self {
        TDError::IoError(err)
    }
}

impl From<PolarsError> for TDError {
    fn from(err: PolarsError) -> Self {
        TDError::PolarsError(err)
    }
}

impl From<serde_json::Error> for TDError {
    fn from(err: serde_json::Error) -> Self {
        TDError::JsonError(err)
    }
}

impl From<ureq::Error> for TDError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(401, _) => TDError::Unauthorized,
            ureq::Error::Status(code, _) => TDError::ApiStatus(code),
            ureq::Error::Transport(transport) => TDError::HttpError(transport.to_string()),
        }
    }
}

/// Resolved runtime settings, built from the command line in `main`.
#[derive(Debug, Clone, Setters)]
pub struct TDConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    #[setters(strip_option, into)]
    pub api_base_url: Option<String>,
    #[setters(strip_option, into)]
    pub api_token: Option<String>,
    /// Used by every collection unless `--presign-path` overrides it.
    #[setters(into)]
    pub presign_path: String,
    pub request_timeout_ms: u64,
    pub multiple_uploads: bool,
}

impl Default for TDConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            api_base_url: None,
            api_token: None,
            presign_path: "/api/gallery-images/presign".to_string(),
            request_timeout_ms: 10_000,
            multiple_uploads: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    Upload,
    RemoveAsset,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Search => "/",
            CMDMode::Upload => "upload: ",
            CMDMode::RemoveAsset => "remove asset #: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Sort,
    Search,
    Upload,
    RemoveAsset,
    CopyAssets,
    Refresh,
    Enter,
    Exit,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
