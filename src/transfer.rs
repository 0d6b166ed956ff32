//! Streaming file transfers with progress reporting and cooperative
//! cancellation.
//!
//! Each transfer owns one tokio task. Progress events are delivered on a
//! multi-fire channel and always precede the single terminal result; local
//! filesystem writes are async and isolated to the transfer's own task.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::{self, ChallengeDisposition, ChallengeResolver, Credential};
use crate::config::Account;
use crate::error::{DavError, CODE_CONNECTION_LOST};
use crate::headers;
use crate::models::{FileMetadata, RequestOptions, TransferProgress};
use crate::request::{RequestBuilder, RequestSpec};

/// Handle for one in-flight transfer.
///
/// Exactly one terminal result is produced per transfer, retrieved with
/// [`join`](Self::join). [`cancel`](Self::cancel) is best-effort: if the
/// transfer already completed it is a no-op, otherwise the terminal result
/// is a `Transport` error carrying the cancellation sentinel.
pub struct TransferHandle<T> {
    token: CancellationToken,
    progress: mpsc::UnboundedReceiver<TransferProgress>,
    outcome: oneshot::Receiver<Result<T, DavError>>,
    _task: JoinHandle<()>,
}

impl<T> TransferHandle<T> {
    /// Requests cooperative cancellation. May race an in-flight completion.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Next progress sample; `None` once the transfer has reached its
    /// terminal state.
    pub async fn next_progress(&mut self) -> Option<TransferProgress> {
        self.progress.recv().await
    }

    /// Waits for the terminal result, consuming the handle.
    pub async fn join(self) -> Result<T, DavError> {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(DavError::Transport {
                code: CODE_CONNECTION_LOST,
                message: "transfer task ended unexpectedly".to_string(),
            }),
        }
    }
}

pub(crate) fn spawn_download(
    http: reqwest::Client,
    account: Account,
    remote_path: String,
    local_path: PathBuf,
    options: RequestOptions,
    resolver: Option<Arc<dyn ChallengeResolver>>,
) -> TransferHandle<FileMetadata> {
    let token = CancellationToken::new();
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let task_token = token.clone();
    let task = tokio::spawn(async move {
        let result = run_download(
            &http,
            &account,
            &remote_path,
            &local_path,
            &options,
            resolver.as_ref(),
            &progress_tx,
            &task_token,
        )
        .await;
        if let Err(err) = &result {
            warn!("❌ download of {} failed: {}", remote_path, err);
        }
        // closing the progress channel before the terminal result keeps
        // progress strictly ahead of it
        drop(progress_tx);
        let _ = outcome_tx.send(result);
    });
    TransferHandle {
        token,
        progress: progress_rx,
        outcome: outcome_rx,
        _task: task,
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_upload(
    http: reqwest::Client,
    account: Account,
    local_path: PathBuf,
    remote_path: String,
    creation: Option<DateTime<Utc>>,
    modification: Option<DateTime<Utc>>,
    options: RequestOptions,
    resolver: Option<Arc<dyn ChallengeResolver>>,
) -> TransferHandle<FileMetadata> {
    let token = CancellationToken::new();
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let task_token = token.clone();
    let task = tokio::spawn(async move {
        let result = run_upload(
            &http,
            &account,
            &local_path,
            &remote_path,
            creation,
            modification,
            &options,
            resolver.as_ref(),
            &progress_tx,
            &task_token,
        )
        .await;
        if let Err(err) = &result {
            warn!("❌ upload of {} failed: {}", local_path.display(), err);
        }
        drop(progress_tx);
        let _ = outcome_tx.send(result);
    });
    TransferHandle {
        token,
        progress: progress_rx,
        outcome: outcome_rx,
        _task: task,
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    path.with_file_name(name)
}

/// One GET attempt; the optional credential replaces the account
/// Authorization on a challenge re-issue.
async fn send_download(
    http: &reqwest::Client,
    spec: &RequestSpec,
    credential: Option<&Credential>,
    token: &CancellationToken,
) -> Result<reqwest::Response, DavError> {
    let mut headers = spec.headers.clone();
    if let Some(credential) = credential {
        headers.insert(AUTHORIZATION, credential.authorization_value()?);
    }
    let request = http
        .request(spec.method.clone(), spec.url.clone())
        .headers(headers);
    tokio::select! {
        _ = token.cancelled() => Err(DavError::cancelled()),
        result = request.send() => result.map_err(DavError::from),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_download(
    http: &reqwest::Client,
    account: &Account,
    remote_path: &str,
    local_path: &Path,
    options: &RequestOptions,
    resolver: Option<&Arc<dyn ChallengeResolver>>,
    progress: &mpsc::UnboundedSender<TransferProgress>,
    token: &CancellationToken,
) -> Result<FileMetadata, DavError> {
    let spec = RequestBuilder::new(account).get(remote_path, options)?;
    debug!("⬇️ GET {}", spec.url);

    let mut response = send_download(http, &spec, None, token).await?;
    if response.status() == StatusCode::UNAUTHORIZED {
        match auth::forward_challenge(resolver, &spec.url, response.headers()).await {
            Some(ChallengeDisposition::UseCredential(credential)) => {
                response = send_download(http, &spec, Some(&credential), token).await?;
            }
            Some(ChallengeDisposition::Cancel) => return Err(DavError::cancelled()),
            Some(ChallengeDisposition::PerformDefaultHandling) | None => {}
        }
    }

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(DavError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }
    let response_headers = response.headers().clone();

    if let Some(parent) = local_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    // Stream into a sibling part file; the destination is only ever touched
    // by the final rename, so no partial file can remain there.
    let part = part_path(local_path);
    let streamed = stream_to_part(response, &part, progress, token).await;
    let finished = match streamed {
        Ok(()) => headers::file_metadata(
            &response_headers,
            headers::content_length(&response_headers),
        ),
        Err(err) => Err(err),
    };

    match finished {
        Ok(metadata) => match fs::rename(&part, local_path).await {
            Ok(()) => {
                debug!("✅ downloaded {} -> {}", remote_path, local_path.display());
                Ok(metadata)
            }
            Err(err) => {
                let _ = fs::remove_file(&part).await;
                Err(err.into())
            }
        },
        Err(err) => {
            let _ = fs::remove_file(&part).await;
            Err(err)
        }
    }
}

async fn stream_to_part(
    response: reqwest::Response,
    part: &Path,
    progress: &mpsc::UnboundedSender<TransferProgress>,
    token: &CancellationToken,
) -> Result<(), DavError> {
    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut transferred = 0u64;

    loop {
        tokio::select! {
            _ = token.cancelled() => return Err(DavError::cancelled()),
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    file.write_all(&bytes).await?;
                    transferred += bytes.len() as u64;
                    let _ = progress.send(TransferProgress { bytes: transferred, total });
                }
                Some(Err(err)) => return Err(DavError::from(err)),
                None => break,
            }
        }
    }

    file.flush().await?;
    Ok(())
}

/// One PUT attempt. Opens the source fresh each time so a challenge re-issue
/// streams the file from the start; returns the byte count this attempt
/// transmitted.
async fn send_upload(
    http: &reqwest::Client,
    spec: &RequestSpec,
    local_path: &Path,
    credential: Option<&Credential>,
    progress: &mpsc::UnboundedSender<TransferProgress>,
    token: &CancellationToken,
) -> Result<(reqwest::Response, u64), DavError> {
    let file = fs::File::open(local_path).await?;
    let total = file.metadata().await?.len();
    debug!("⬆️ PUT {} ({} bytes)", spec.url, total);

    let sent = Arc::new(AtomicU64::new(0));
    let counter = sent.clone();
    let progress_tx = progress.clone();
    let stream = ReaderStream::new(file).inspect(move |chunk| {
        if let Ok(bytes) = chunk {
            let bytes_sent =
                counter.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
            let _ = progress_tx.send(TransferProgress {
                bytes: bytes_sent,
                total,
            });
        }
    });

    let mut headers = spec.headers.clone();
    if let Some(credential) = credential {
        headers.insert(AUTHORIZATION, credential.authorization_value()?);
    }
    let request = http
        .request(spec.method.clone(), spec.url.clone())
        .headers(headers)
        .body(reqwest::Body::wrap_stream(stream));
    let response = tokio::select! {
        _ = token.cancelled() => return Err(DavError::cancelled()),
        result = request.send() => result.map_err(DavError::from)?,
    };
    Ok((response, sent.load(Ordering::Relaxed)))
}

#[allow(clippy::too_many_arguments)]
async fn run_upload(
    http: &reqwest::Client,
    account: &Account,
    local_path: &Path,
    remote_path: &str,
    creation: Option<DateTime<Utc>>,
    modification: Option<DateTime<Utc>>,
    options: &RequestOptions,
    resolver: Option<&Arc<dyn ChallengeResolver>>,
    progress: &mpsc::UnboundedSender<TransferProgress>,
    token: &CancellationToken,
) -> Result<FileMetadata, DavError> {
    let spec = RequestBuilder::new(account).put(remote_path, creation, modification, options)?;

    let (mut response, mut sent) =
        send_upload(http, &spec, local_path, None, progress, token).await?;
    if response.status() == StatusCode::UNAUTHORIZED {
        match auth::forward_challenge(resolver, &spec.url, response.headers()).await {
            Some(ChallengeDisposition::UseCredential(credential)) => {
                (response, sent) =
                    send_upload(http, &spec, local_path, Some(&credential), progress, token)
                        .await?;
            }
            Some(ChallengeDisposition::Cancel) => return Err(DavError::cancelled()),
            Some(ChallengeDisposition::PerformDefaultHandling) | None => {}
        }
    }

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(DavError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }

    // upload size is the observed transmitted count, not a response header
    let metadata = headers::file_metadata(response.headers(), sent)?;
    debug!("✅ uploaded {} ({} bytes)", remote_path, metadata.size_bytes);
    Ok(metadata)
}
