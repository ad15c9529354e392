use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use http::StatusCode;
use thiserror::Error;

/// Boxed error returned by caller supplied callbacks and handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Top level error of a multipart request, one variant per failing stage.
#[derive(Debug, Error)]
pub enum MulterError {
    #[error("parse multipart error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("resolve destination error: {source}")]
    Destination {
        #[from]
        source: DestinationError,
    },

    #[error("write file error: {source}")]
    Write {
        #[from]
        source: WriteError,
    },
}

impl MulterError {
    /// The status a host should answer with when this error ends the request.
    ///
    /// Malformed input is the client's fault, everything on the storage side is ours.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MulterError::Parse { source: ParseError::LimitExceeded { .. } } => StatusCode::PAYLOAD_TOO_LARGE,
            MulterError::Parse { .. } => StatusCode::BAD_REQUEST,
            MulterError::Destination { .. } | MulterError::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid content-type header: {reason}")]
    InvalidContentType { reason: String },

    #[error("multipart boundary is missing from content-type")]
    MissingBoundary,

    #[error("invalid multipart boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("part header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("part header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid part header: {reason}")]
    InvalidPartHeader { reason: String },

    #[error("invalid part body: {reason}")]
    InvalidBody { reason: String },

    #[error("invalid value of field `{name}`: {reason}")]
    InvalidField { name: String, reason: String },

    #[error("multipart stream is incomplete")]
    Incomplete,

    #[error("{limit} limit exceeded, max: {max}")]
    LimitExceeded { limit: &'static str, max: u64 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_content_type<S: ToString>(str: S) -> Self {
        Self::InvalidContentType { reason: str.to_string() }
    }

    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_part_header<S: ToString>(str: S) -> Self {
        Self::InvalidPartHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_field<N: ToString, S: ToString>(name: N, str: S) -> Self {
        Self::InvalidField { name: name.to_string(), reason: str.to_string() }
    }

    pub fn limit_exceeded(limit: &'static str, max: u64) -> Self {
        Self::LimitExceeded { limit, max }
    }
}

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("change destination callback failed: {source}")]
    Callback { source: BoxError },

    #[error("an inode of a different type exists at {path:?}, it is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("invalid file name {name:?}")]
    InvalidFileName { name: String },

    #[error("io error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl DestinationError {
    pub fn callback<E: Into<BoxError>>(e: E) -> Self {
        Self::Callback { source: e.into() }
    }

    pub fn not_a_directory<P: AsRef<Path>>(path: P) -> Self {
        Self::NotADirectory { path: path.as_ref().to_path_buf() }
    }

    pub fn invalid_file_name<S: ToString>(name: S) -> Self {
        Self::InvalidFileName { name: name.to_string() }
    }

    pub fn io<P: AsRef<Path>>(path: P, e: io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source: e }
    }
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("io error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl WriteError {
    pub fn io<P: AsRef<Path>>(path: P, e: io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source: e }
    }
}

/// Errors raised while building a [`crate::Multer`], before any request is served.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("dest must be set")]
    MissingDest,

    #[error("dest must not be empty")]
    EmptyDest,

    #[error("dest {path:?} exists but is not a directory")]
    DestNotDirectory { path: PathBuf },

    #[error("limit `{name}` must be greater than zero")]
    InvalidLimit { name: &'static str },
}
