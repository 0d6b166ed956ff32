//! Header-set construction for outgoing requests and typed metadata
//! extraction from response header maps.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::config::Account;
use crate::error::DavError;
use crate::models::{FileMetadata, RequestOptions};

/// Fallback User-Agent when neither the request nor the account supplies one.
pub fn default_user_agent() -> String {
    format!("nextdav/{} (WebDAV)", env!("CARGO_PKG_VERSION"))
}

/// Basic Authorization header value for the given credentials.
pub(crate) fn basic_authorization(username: &str, password: &str) -> Result<HeaderValue, DavError> {
    let raw = format!("{}:{}", username, password);
    let value = format!("Basic {}", Base64::encode_string(raw.as_bytes()));
    let mut value = HeaderValue::from_str(&value)
        .map_err(|e| DavError::MalformedUrl(format!("invalid credentials: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Builds the authenticated header set for a request.
///
/// Insertion order implements the override policy: defaults first, then
/// caller-supplied extras (last write wins), then Authorization, which is
/// always derived from the account snapshot and can never be overridden.
pub(crate) fn standard_headers(
    account: &Account,
    content_type: Option<&'static str>,
    options: &RequestOptions,
) -> Result<HeaderMap, DavError> {
    let mut headers = HeaderMap::new();

    let agent = options
        .user_agent
        .clone()
        .or_else(|| account.user_agent.clone())
        .unwrap_or_else(default_user_agent);
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&agent)
            .map_err(|e| DavError::MalformedUrl(format!("invalid user agent: {}", e)))?,
    );
    headers.insert(
        HeaderName::from_static("ocs-apirequest"),
        HeaderValue::from_static("true"),
    );
    if let Some(content_type) = content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DavError::MalformedUrl(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| DavError::MalformedUrl(format!("invalid header value: {}", e)))?;
        headers.insert(name, value);
    }

    headers.insert(
        AUTHORIZATION,
        basic_authorization(&account.username, account.password())?,
    );

    Ok(headers)
}

fn find(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Server-assigned file identifier: `oc-fileid` preferred over `fileid`.
pub fn file_id(headers: &HeaderMap) -> Option<String> {
    find(headers, "oc-fileid").or_else(|| find(headers, "fileid"))
}

/// Entity tag: `oc-etag` preferred over `etag`, wrapping quotes stripped.
pub fn etag(headers: &HeaderMap) -> Option<String> {
    find(headers, "oc-etag")
        .or_else(|| find(headers, "etag"))
        .map(|value| strip_quotes(&value))
}

/// Removes exactly the surrounding double quotes, nothing else.
pub(crate) fn strip_quotes(value: &str) -> String {
    let trimmed = value.strip_prefix('"').unwrap_or(value);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.to_string()
}

/// Parses the `date` response header (`EEE, dd MMM yyyy HH:mm:ss zzz`).
///
/// Absent or unparseable dates fail the whole operation: timestamp
/// availability is part of the operation's success contract even when the
/// transport-level request already took effect server-side.
pub fn last_modified(headers: &HeaderMap) -> Result<DateTime<Utc>, DavError> {
    let raw = find(headers, "date")
        .ok_or_else(|| DavError::bad_response("missing date header"))?;
    DateTime::parse_from_rfc2822(&raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| DavError::bad_response(format!("undecodable date header: {}", raw)))
}

/// Download payload size as reported by the `length` header, 0 when absent.
pub fn content_length(headers: &HeaderMap) -> u64 {
    find(headers, "length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Derives the full metadata set from a response header map, enforcing the
/// strict date requirement.
pub fn file_metadata(headers: &HeaderMap, size_bytes: u64) -> Result<FileMetadata, DavError> {
    Ok(FileMetadata {
        file_id: file_id(headers),
        etag: etag(headers),
        modified: Some(last_modified(headers)?),
        size_bytes,
    })
}
