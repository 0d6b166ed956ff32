//! The client: one configured account, one shared HTTP engine, and every
//! non-transfer operation.
//!
//! Each operation builds an immutable [`RequestSpec`] from an account
//! snapshot, hands it to reqwest, and terminates in exactly one
//! `Result<_, DavError>`. Nothing here retries, caches or deduplicates;
//! every operation is at-most-once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use tracing::debug;

use crate::auth::{self, ChallengeDisposition, ChallengeResolver, Credential};
use crate::config::Account;
use crate::error::DavError;
use crate::headers;
use crate::models::{Comment, Depth, FileMetadata, RequestOptions, ResourceEntry};
use crate::request::{RequestBuilder, RequestSpec};
use crate::transfer::{self, TransferHandle};
use crate::xml::{StandardCodec, XmlCodec};

/// WebDAV client bound to a single account.
///
/// Cheap to clone; clones share the connection pool. Concurrent operations
/// need no synchronization because each request captures its own account
/// snapshot.
#[derive(Clone)]
pub struct DavClient {
    http: reqwest::Client,
    account: Account,
    codec: Arc<dyn XmlCodec>,
    resolver: Option<Arc<dyn ChallengeResolver>>,
}

impl DavClient {
    pub fn new(account: Account) -> Result<Self, DavError> {
        account.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(account.timeout_seconds))
            .build()
            .map_err(DavError::from)?;
        Ok(Self {
            http,
            account,
            codec: Arc::new(StandardCodec),
            resolver: None,
        })
    }

    /// Swaps the XML collaborator, e.g. for a server with a different
    /// property dialect.
    pub fn with_codec(mut self, codec: Arc<dyn XmlCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Injects the authentication challenge capability.
    pub fn with_challenge_resolver(mut self, resolver: Arc<dyn ChallengeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// The underlying HTTP engine, shared with anonymous endpoints like the
    /// login flow.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn builder(&self) -> RequestBuilder {
        RequestBuilder::new(&self.account)
    }

    async fn dispatch(
        &self,
        spec: &RequestSpec,
        credential: Option<&Credential>,
    ) -> Result<reqwest::Response, DavError> {
        let mut headers = spec.headers.clone();
        if let Some(credential) = credential {
            headers.insert(AUTHORIZATION, credential.authorization_value()?);
        }
        let mut request = self
            .http
            .request(spec.method.clone(), spec.url.clone())
            .headers(headers);
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }
        Ok(request.send().await?)
    }

    /// Sends a spec, forwards at most one authentication challenge to the
    /// resolver, and normalizes non-2xx statuses.
    pub(crate) async fn execute(&self, spec: RequestSpec) -> Result<reqwest::Response, DavError> {
        debug!("📤 {} {}", spec.method, spec.url);
        let mut response = self.dispatch(&spec, None).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            match auth::forward_challenge(self.resolver.as_ref(), &spec.url, response.headers())
                .await
            {
                Some(ChallengeDisposition::UseCredential(credential)) => {
                    response = self.dispatch(&spec, Some(&credential)).await?;
                }
                Some(ChallengeDisposition::Cancel) => return Err(DavError::cancelled()),
                Some(ChallengeDisposition::PerformDefaultHandling) | None => {}
            }
        }

        let status = response.status();
        debug!(
            "📥 HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(DavError::HttpStatus {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, DavError> {
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| DavError::bad_response(format!("unreadable response body: {}", e)))
    }

    // ------------------------------------------------------------------
    // WebDAV operations
    // ------------------------------------------------------------------

    /// MKCOL. Succeeds with the created folder's identifier and timestamp.
    pub async fn create_folder(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<FileMetadata, DavError> {
        let spec = self.builder().mkcol(path, options)?;
        let response = self.execute(spec).await?;
        headers::file_metadata(response.headers(), 0)
    }

    /// DELETE on a file or folder.
    pub async fn delete(&self, path: &str, options: &RequestOptions) -> Result<(), DavError> {
        let spec = self.builder().delete(path, options)?;
        self.execute(spec).await?;
        Ok(())
    }

    /// MOVE with an explicit overwrite flag.
    pub async fn move_item(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
        options: &RequestOptions,
    ) -> Result<(), DavError> {
        let spec = self
            .builder()
            .move_item(source, destination, overwrite, options)?;
        self.execute(spec).await?;
        Ok(())
    }

    /// COPY with an explicit overwrite flag.
    pub async fn copy_item(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
        options: &RequestOptions,
    ) -> Result<(), DavError> {
        let spec = self
            .builder()
            .copy_item(source, destination, overwrite, options)?;
        self.execute(spec).await?;
        Ok(())
    }

    /// PROPFIND on a resource. Depth 1 lists direct children, depth 0 only
    /// the resource itself.
    pub async fn read_folder(
        &self,
        path: &str,
        depth: Depth,
        options: &RequestOptions,
    ) -> Result<Vec<ResourceEntry>, DavError> {
        let body = self.codec.propfind_properties();
        let spec = self.builder().propfind(path, Some(depth), body, options)?;
        let response = self.execute(spec).await?;
        let body = Self::read_body(response).await?;
        self.codec.parse_resources(&body)
    }

    /// SEARCH matching display names against a literal. The literal is
    /// percent-escaped and wrapped in `%` wildcards on both sides; the scope
    /// is this account's `/files/{user_id}` subtree.
    pub async fn search_literal(
        &self,
        literal: &str,
        depth: &str,
        options: &RequestOptions,
    ) -> Result<Vec<ResourceEntry>, DavError> {
        let pattern = format!("%{}%", urlencoding::encode(literal));
        let body = self
            .codec
            .search_by_name(&self.account.files_href(), depth, &pattern);
        self.search(body, options).await
    }

    /// SEARCH for media files whose last-modified lies in
    /// `[oldest, newest]`.
    pub async fn search_media(
        &self,
        newest: DateTime<Utc>,
        oldest: DateTime<Utc>,
        options: &RequestOptions,
    ) -> Result<Vec<ResourceEntry>, DavError> {
        let body = self.codec.search_media(
            &self.account.files_href(),
            &iso8601(newest),
            &iso8601(oldest),
        );
        self.search(body, options).await
    }

    async fn search(
        &self,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<Vec<ResourceEntry>, DavError> {
        let spec = self.builder().search(body, options)?;
        let response = self.execute(spec).await?;
        let body = Self::read_body(response).await?;
        self.codec.parse_resources(&body)
    }

    /// PROPPATCH toggling the favorite flag on a file in the account's files
    /// subtree.
    pub async fn set_favorite(
        &self,
        file_name: &str,
        favorite: bool,
        options: &RequestOptions,
    ) -> Result<(), DavError> {
        let path = format!("files/{}/{}", self.account.user_id, file_name);
        let body = self.codec.favorite(favorite);
        let spec = self.builder().proppatch(&path, body, options)?;
        self.execute(spec).await?;
        Ok(())
    }

    /// REPORT listing every favorite-flagged resource of this account.
    pub async fn list_favorites(
        &self,
        options: &RequestOptions,
    ) -> Result<Vec<ResourceEntry>, DavError> {
        let path = format!("files/{}", self.account.user_id);
        let body = self.codec.favorites_report();
        let spec = self.builder().report(&path, body, options)?;
        let response = self.execute(spec).await?;
        let body = Self::read_body(response).await?;
        self.codec.parse_resources(&body)
    }

    /// PROPFIND on the comments endpoint of a file.
    pub async fn list_comments(
        &self,
        file_id: &str,
        options: &RequestOptions,
    ) -> Result<Vec<Comment>, DavError> {
        let path = format!("comments/files/{}", file_id);
        let body = self.codec.comment_properties();
        let spec = self.builder().propfind(&path, None, body, options)?;
        let response = self.execute(spec).await?;
        let body = Self::read_body(response).await?;
        self.codec.parse_comments(&body)
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Streams a remote file to `local_path`, atomically replacing any
    /// existing file and creating intermediate directories. Progress events
    /// arrive on the handle strictly before the terminal result.
    pub fn download(
        &self,
        remote_path: &str,
        local_path: impl Into<PathBuf>,
        options: &RequestOptions,
    ) -> TransferHandle<FileMetadata> {
        transfer::spawn_download(
            self.http.clone(),
            self.account.clone(),
            remote_path.to_string(),
            local_path.into(),
            options.clone(),
            self.resolver.clone(),
        )
    }

    /// Streams a local file to `remote_path`. Creation/modification
    /// timestamps become `X-OC-Ctime`/`X-OC-Mtime` when supplied.
    pub fn upload(
        &self,
        local_path: impl Into<PathBuf>,
        remote_path: &str,
        creation: Option<DateTime<Utc>>,
        modification: Option<DateTime<Utc>>,
        options: &RequestOptions,
    ) -> TransferHandle<FileMetadata> {
        transfer::spawn_upload(
            self.http.clone(),
            self.account.clone(),
            local_path.into(),
            remote_path.to_string(),
            creation,
            modification,
            options.clone(),
            self.resolver.clone(),
        )
    }
}

fn iso8601(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}
