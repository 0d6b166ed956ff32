//! Streaming transfer tests: progress ordering, atomic replacement of the
//! download destination, metadata extraction, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use chrono::{TimeZone, Utc};
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nextdav::error::CODE_CANCELLED;
use nextdav::{
    Account, AuthChallenge, ChallengeDisposition, ChallengeResolver, Credential, DavClient,
    ErrorKind, RequestOptions, TransferProgress,
};

const HTTP_DATE: &str = "Wed, 21 Oct 2020 07:28:00 GMT";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn client_for(server: &MockServer) -> DavClient {
    let account = Account::new(server.uri(), "remote.php/dav", "alice", "alice", "secret");
    DavClient::new(account).unwrap()
}

async fn drain_progress(
    handle: &mut nextdav::TransferHandle<nextdav::FileMetadata>,
) -> Vec<TransferProgress> {
    let mut samples = Vec::new();
    while let Some(sample) = handle.next_progress().await {
        samples.push(sample);
    }
    samples
}

#[tokio::test]
async fn download_replaces_an_existing_file_atomically() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"fresh contents".to_vec())
                .insert_header("oc-etag", "\"aa11\"")
                .insert_header("length", "14")
                .insert_header("Date", HTTP_DATE),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("report.txt");
    std::fs::write(&destination, b"stale").unwrap();

    let client = client_for(&server);
    let mut handle = client.download(
        "files/alice/report.txt",
        &destination,
        &RequestOptions::default(),
    );
    let samples = drain_progress(&mut handle).await;
    let metadata = handle.join().await.unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"fresh contents");
    assert!(!dir.path().join("report.txt.part").exists());
    assert_eq!(metadata.etag.as_deref(), Some("aa11"));
    assert_eq!(metadata.size_bytes, 14);
    assert_eq!(
        metadata.modified,
        Some(Utc.with_ymd_and_hms(2020, 10, 21, 7, 28, 0).unwrap())
    );

    // every progress sample precedes the terminal result, and the last one
    // accounts for the whole body
    assert!(!samples.is_empty());
    assert_eq!(samples.last().unwrap().bytes, 14);
    for pair in samples.windows(2) {
        assert!(pair[0].bytes <= pair[1].bytes);
    }
}

#[tokio::test]
async fn download_without_etag_still_succeeds() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("payload")
                .insert_header("Date", HTTP_DATE),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("a.bin");
    let metadata = client_for(&server)
        .download("files/alice/a.bin", &destination, &RequestOptions::default())
        .join()
        .await
        .unwrap();

    assert!(metadata.etag.is_none());
    assert!(metadata.file_id.is_none());
    assert!(metadata.modified.is_some());
    assert!(destination.exists());
}

#[tokio::test]
async fn download_with_garbled_date_leaves_no_file_behind() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("payload")
                .insert_header("Date", "not-a-date"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("a.bin");
    let err = client_for(&server)
        .download("files/alice/a.bin", &destination, &RequestOptions::default())
        .join()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BadResponseDecode);
    assert!(!destination.exists());
    assert!(!dir.path().join("a.bin.part").exists());
}

#[tokio::test]
async fn download_http_error_touches_nothing_locally() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("missing.txt");
    let err = client_for(&server)
        .download(
            "files/alice/missing.txt",
            &destination,
            &RequestOptions::default(),
        )
        .join()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HttpStatus);
    assert_eq!(err.code(), 404);
    assert!(!destination.exists());
}

#[tokio::test]
async fn download_creates_intermediate_directories() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("x")
                .insert_header("Date", HTTP_DATE),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("a").join("b").join("c.txt");
    client_for(&server)
        .download("files/alice/c.txt", &destination, &RequestOptions::default())
        .join()
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"x");
}

#[tokio::test]
async fn download_cancellation_reports_the_sentinel_and_cleans_up() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow body")
                .insert_header("Date", HTTP_DATE)
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("slow.bin");
    let handle = client_for(&server).download(
        "files/alice/slow.bin",
        &destination,
        &RequestOptions::default(),
    );
    handle.cancel();
    let err = handle.join().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.code(), CODE_CANCELLED);
    assert!(!destination.exists());
    assert!(!dir.path().join("slow.bin.part").exists());
}

#[tokio::test]
async fn upload_streams_the_file_and_reports_the_transmitted_size() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("oc-fileid", "314")
                .insert_header("oc-etag", "\"bb22\"")
                .insert_header("Date", HTTP_DATE),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("upload.bin");
    let payload = vec![0x5au8; 2048];
    std::fs::write(&source, &payload).unwrap();

    let modification = Utc.with_ymd_and_hms(2020, 10, 21, 7, 28, 0).unwrap();
    let client = client_for(&server);
    let mut handle = client.upload(
        &source,
        "files/alice/upload.bin",
        None,
        Some(modification),
        &RequestOptions::default(),
    );
    let samples = drain_progress(&mut handle).await;
    let metadata = handle.join().await.unwrap();

    assert_eq!(metadata.file_id.as_deref(), Some("314"));
    assert_eq!(metadata.etag.as_deref(), Some("bb22"));
    assert_eq!(metadata.size_bytes, 2048);
    assert!(!samples.is_empty());
    assert_eq!(samples.last().unwrap().bytes, 2048);
    assert_eq!(samples.last().unwrap().total, 2048);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url.path(),
        "/remote.php/dav/files/alice/upload.bin"
    );
    assert_eq!(
        requests[0].headers.get("x-oc-mtime").unwrap(),
        modification.timestamp().to_string().as_str()
    );
    assert!(requests[0].headers.get("x-oc-ctime").is_none());
    assert_eq!(requests[0].body, payload);
}

fn basic(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        Base64::encode_string(format!("{}:{}", username, password).as_bytes())
    )
}

struct FixedCredential;

#[async_trait]
impl ChallengeResolver for FixedCredential {
    async fn resolve(&self, challenge: AuthChallenge) -> ChallengeDisposition {
        assert_eq!(challenge.scheme.as_deref(), Some("Basic"));
        ChallengeDisposition::UseCredential(Credential::new("alice", "app-password"))
    }
}

#[tokio::test]
async fn download_forwards_one_challenge_and_retries_with_the_credential() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", basic("alice", "secret").as_str()))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("www-authenticate", "Basic realm=\"Nextcloud\""),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header(
            "authorization",
            basic("alice", "app-password").as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("authorized contents")
                .insert_header("Date", HTTP_DATE),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("a.txt");
    let account = Account::new(server.uri(), "remote.php/dav", "alice", "alice", "secret");
    let client = DavClient::new(account)
        .unwrap()
        .with_challenge_resolver(Arc::new(FixedCredential));

    client
        .download("files/alice/a.txt", &destination, &RequestOptions::default())
        .join()
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"authorized contents");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn upload_restreams_the_whole_file_after_a_challenge() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(header("authorization", basic("alice", "secret").as_str()))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("www-authenticate", "Basic realm=\"Nextcloud\""),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(header(
            "authorization",
            basic("alice", "app-password").as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("oc-fileid", "42")
                .insert_header("Date", HTTP_DATE),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("payload.bin");
    let payload = vec![0x17u8; 1024];
    std::fs::write(&source, &payload).unwrap();

    let account = Account::new(server.uri(), "remote.php/dav", "alice", "alice", "secret");
    let client = DavClient::new(account)
        .unwrap()
        .with_challenge_resolver(Arc::new(FixedCredential));

    let metadata = client
        .upload(
            &source,
            "files/alice/payload.bin",
            None,
            None,
            &RequestOptions::default(),
        )
        .join()
        .await
        .unwrap();

    assert_eq!(metadata.file_id.as_deref(), Some("42"));
    assert_eq!(metadata.size_bytes, 1024);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    // the re-issued request carries the full body, not a drained stream
    assert_eq!(requests[1].body, payload);
}

#[tokio::test]
async fn upload_of_a_missing_local_file_is_a_filesystem_error() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201).insert_header("Date", HTTP_DATE))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = client_for(&server)
        .upload(
            dir.path().join("nope.bin"),
            "files/alice/nope.bin",
            None,
            None,
            &RequestOptions::default(),
        )
        .join()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LocalFilesystem);
}
