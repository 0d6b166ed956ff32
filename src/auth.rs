//! Authentication challenge capability.
//!
//! TLS trust evaluation and credential resolution live outside the core. The
//! client forwards one challenge to the injected resolver and applies the
//! returned disposition exactly once: no credential caching, no retry loops.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, WWW_AUTHENTICATE};
use tracing::debug;
use url::Url;

use crate::error::DavError;
use crate::headers;

/// A username/password pair produced by a resolver.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub(crate) fn authorization_value(&self) -> Result<HeaderValue, DavError> {
        headers::basic_authorization(&self.username, &self.password)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authentication challenge raised by the server (HTTP 401 carrying
/// `WWW-Authenticate`).
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub host: String,
    /// Challenge scheme, e.g. `Basic` or `Bearer`.
    pub scheme: Option<String>,
    pub realm: Option<String>,
}

impl AuthChallenge {
    pub(crate) fn parse(host: &str, www_authenticate: &str) -> Self {
        let scheme = www_authenticate
            .split_whitespace()
            .next()
            .map(str::to_string);
        let realm = www_authenticate.split("realm=\"").nth(1).and_then(|rest| {
            rest.split('"').next().map(str::to_string)
        });
        Self {
            host: host.to_string(),
            scheme,
            realm,
        }
    }
}

/// What to do with a forwarded challenge.
#[derive(Debug, Clone)]
pub enum ChallengeDisposition {
    /// Re-issue the request once with this credential.
    UseCredential(Credential),
    /// Surface the original 401 unchanged.
    PerformDefaultHandling,
    /// Abort the operation with a cancellation error.
    Cancel,
}

/// Capability hook injected at client construction.
#[async_trait]
pub trait ChallengeResolver: Send + Sync {
    async fn resolve(&self, challenge: AuthChallenge) -> ChallengeDisposition;
}

/// Forwards a 401's `WWW-Authenticate` challenge to the resolver. `None`
/// when no resolver is installed or the response carries no challenge.
pub(crate) async fn forward_challenge(
    resolver: Option<&Arc<dyn ChallengeResolver>>,
    url: &Url,
    headers: &HeaderMap,
) -> Option<ChallengeDisposition> {
    let resolver = resolver?;
    let raw = headers.get(WWW_AUTHENTICATE)?.to_str().ok()?;
    let host = url.host_str().unwrap_or_default().to_string();
    debug!("🔐 forwarding auth challenge from {}", host);
    Some(resolver.resolve(AuthChallenge::parse(&host, raw)).await)
}
