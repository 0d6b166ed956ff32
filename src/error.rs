//! Uniform error type for every operation outcome.
//!
//! Every failure a caller can observe is normalized into [`DavError`]: bad
//! input before any network activity, a transport-level failure, an HTTP
//! status outside 2xx, a 2xx response whose required metadata cannot be
//! decoded, or a local filesystem problem during a transfer.

use thiserror::Error;

/// Sentinel code for inputs that cannot be turned into a valid URL.
pub const CODE_UNSUPPORTED_URL: i32 = -1002;
/// Sentinel code for a 2xx response with missing or undecodable metadata.
pub const CODE_BAD_SERVER_RESPONSE: i32 = -1011;
/// Sentinel code for a cancelled transfer.
pub const CODE_CANCELLED: i32 = -999;
/// Sentinel code for a request that timed out.
pub const CODE_TIMED_OUT: i32 = -1001;
/// Sentinel code for a connection that could not be established.
pub const CODE_CANNOT_CONNECT: i32 = -1004;
/// Sentinel code for a connection that failed mid-flight.
pub const CODE_CONNECTION_LOST: i32 = -1005;
/// Sentinel code for local file errors during a transfer.
pub const CODE_FILE_ERROR: i32 = -1100;

/// Closed classification of every failure the client surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedUrl,
    Transport,
    HttpStatus,
    BadResponseDecode,
    LocalFilesystem,
}

/// The single error type delivered through every terminal outcome.
#[derive(Debug, Error)]
pub enum DavError {
    /// The input could not be turned into a valid URL. No network call was
    /// attempted.
    #[error("invalid server url: {0}")]
    MalformedUrl(String),

    /// DNS, connection, TLS, timeout or cancellation failure below the HTTP
    /// layer.
    #[error("transport failure ({code}): {message}")]
    Transport { code: i32, message: String },

    /// The server answered with a status outside the 200-299 range.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The transport succeeded but a required header or body could not be
    /// decoded. Reachable on 2xx responses: metadata decoding is part of the
    /// operation's success contract, not just the HTTP layer's.
    #[error("bad server response: {0}")]
    BadResponseDecode(String),

    /// Local source/destination path error during an upload or download.
    #[error("local filesystem error: {0}")]
    LocalFilesystem(#[from] std::io::Error),
}

impl DavError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DavError::MalformedUrl(_) => ErrorKind::MalformedUrl,
            DavError::Transport { .. } => ErrorKind::Transport,
            DavError::HttpStatus { .. } => ErrorKind::HttpStatus,
            DavError::BadResponseDecode(_) => ErrorKind::BadResponseDecode,
            DavError::LocalFilesystem(_) => ErrorKind::LocalFilesystem,
        }
    }

    /// Numeric code view of the error. `0` is reserved for success and never
    /// produced here; HTTP failures report the status itself, everything else
    /// reports its sentinel.
    pub fn code(&self) -> i32 {
        match self {
            DavError::MalformedUrl(_) => CODE_UNSUPPORTED_URL,
            DavError::Transport { code, .. } => *code,
            DavError::HttpStatus { status, .. } => i32::from(*status),
            DavError::BadResponseDecode(_) => CODE_BAD_SERVER_RESPONSE,
            DavError::LocalFilesystem(_) => CODE_FILE_ERROR,
        }
    }

    pub(crate) fn bad_response(message: impl Into<String>) -> Self {
        DavError::BadResponseDecode(message.into())
    }

    pub(crate) fn cancelled() -> Self {
        DavError::Transport {
            code: CODE_CANCELLED,
            message: "transfer cancelled".to_string(),
        }
    }

    /// True when the failure happened before or below the HTTP exchange, so
    /// trying another endpoint or protocol could make sense for the caller.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DavError::Transport {
                code: CODE_TIMED_OUT | CODE_CANNOT_CONNECT | CODE_CONNECTION_LOST,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for DavError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            CODE_TIMED_OUT
        } else if err.is_connect() {
            CODE_CANNOT_CONNECT
        } else {
            CODE_CONNECTION_LOST
        };
        DavError::Transport {
            code,
            message: err.to_string(),
        }
    }
}
