use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal setup problems. Raised before any render session exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("input file {0:?} not found")]
    MissingInput(PathBuf),
    #[error("input file {0:?} has no 'URL' column")]
    MissingUrlColumn(PathBuf),
    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read input {path:?}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// A single render-session operation failed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, &'static str),
    #[error("webdriver error '{error}': {message}")]
    WebDriver { error: String, message: String },
    #[error("unexpected webdriver response: {0}")]
    Protocol(String),
    #[error("driver process failed: {0}")]
    Driver(#[from] io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: RenderError,
    },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document for {0} is empty")]
    EmptyDocument(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("store {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("url index {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("url index {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
