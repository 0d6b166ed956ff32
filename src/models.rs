//! Shared data types returned by and passed into operations.

use chrono::{DateTime, Utc};

/// PROPFIND scope: the resource itself or the resource plus direct children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

/// Per-request knobs accepted by every operation.
///
/// Extra headers override the builder's defaults (Content-Type, User-Agent,
/// OCS-APIRequest) with last-write-wins semantics. Authorization is always
/// derived from the account and can never be overridden.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// File metadata derived strictly from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// Server-assigned stable file identifier (`oc-fileid`, else `fileid`).
    pub file_id: Option<String>,
    /// Entity tag with surrounding quotes stripped (`oc-etag`, else `etag`).
    pub etag: Option<String>,
    /// Value of the `date` response header.
    pub modified: Option<DateTime<Utc>>,
    /// Downloads: `length` header, 0 when absent. Uploads: bytes transmitted.
    pub size_bytes: u64,
}

/// A progress sample for an in-flight transfer. `bytes` is monotonically
/// non-decreasing within one send of the payload (a credential re-issue
/// starts a fresh sequence); `total` is best-effort and may be 0 when
/// unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes: u64,
    pub total: u64,
}

/// One resource row of a multistatus response.
#[derive(Debug, Clone, Default)]
pub struct ResourceEntry {
    /// Raw href as sent by the server, percent-encoded.
    pub href: String,
    /// Decoded last path segment of the href.
    pub name: String,
    pub is_directory: bool,
    pub file_id: Option<String>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub favorite: bool,
}

/// One comment attached to a file.
#[derive(Debug, Clone, Default)]
pub struct Comment {
    pub id: String,
    pub actor_id: String,
    pub actor_display_name: String,
    pub message: String,
    pub created: Option<DateTime<Utc>>,
}
