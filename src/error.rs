use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("invalid dataset accession: {0}")]
    InvalidAccession(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request failed after {attempts} attempt(s): {message}")]
    RequestFailed { attempts: usize, message: String },

    /// Client fault (4xx other than 404). Never retried.
    #[error("PRIDE returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("FTP transfer failed: {0}")]
    Ftp(String),

    #[error("unsupported file format: {0}")]
    #[diagnostic(help("supported formats: .mztab, .csv, .tsv, .txt (optionally .gz)"))]
    UnsupportedFormat(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("unexpected response shape: {0}")]
    ResponseShape(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl PipelineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::NotFound(_))
    }

    /// Timeouts, connection failures and 5xx that outlived the retry loop.
    /// `NotFound` and `Status` are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::RequestFailed { .. })
    }
}
