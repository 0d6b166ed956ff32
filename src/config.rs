//! Account configuration and server URL assembly.

use std::fmt;

use crate::error::DavError;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Connection settings for one WebDAV account.
///
/// Every request captures a clone of the account at build time, so a caller
/// mutating its own copy never corrupts an in-flight request. There is no
/// process-wide account state: whoever constructs the client owns the value.
#[derive(Clone)]
pub struct Account {
    /// Server base URL including scheme, e.g. `https://cloud.example.com`.
    pub server_url: String,
    /// Path segment the DAV endpoints are mounted under, e.g. `remote.php/dav`.
    pub dav_root: String,
    /// Server-side user id, used for `/files/{user_id}` scoping.
    pub user_id: String,
    pub username: String,
    password: String,
    /// Default User-Agent for this account; individual requests may override.
    pub user_agent: Option<String>,
    pub timeout_seconds: u64,
}

impl Account {
    pub fn new(
        server_url: impl Into<String>,
        dav_root: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            dav_root: dav_root.into(),
            user_id: user_id.into(),
            username: username.into(),
            password: password.into(),
            user_agent: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Checks the account for values that can never produce a valid request.
    pub fn validate(&self) -> Result<(), DavError> {
        if self.server_url.trim().is_empty() {
            return Err(DavError::MalformedUrl("server URL is empty".to_string()));
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(DavError::MalformedUrl(format!(
                "server URL must start with http:// or https://: {}",
                self.server_url
            )));
        }
        if self.username.is_empty() {
            return Err(DavError::MalformedUrl("username is empty".to_string()));
        }
        if self.user_id.is_empty() {
            return Err(DavError::MalformedUrl("user id is empty".to_string()));
        }
        Ok(())
    }

    /// Base URL of the DAV endpoint: `{server_url}/{dav_root}`.
    pub fn dav_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.dav_root.trim_matches('/')
        )
    }

    /// Joins a resource path onto the DAV endpoint, normalizing slashes.
    pub fn url_for(&self, path: &str) -> String {
        let clean_path = path.trim_start_matches('/');
        if clean_path.is_empty() {
            self.dav_url()
        } else {
            format!("{}/{}", self.dav_url(), clean_path)
        }
    }

    /// Search scope href for this account: `/files/{user_id}`.
    pub fn files_href(&self) -> String {
        format!("/files/{}", self.user_id)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("server_url", &self.server_url)
            .field("dav_root", &self.dav_root)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}
