//! Client communication layer for Nextcloud-flavored WebDAV servers.
//!
//! [`DavClient`] turns high-level file operations (create, delete, move,
//! copy, list, search, favorite, upload, download) into correctly shaped
//! authenticated HTTP requests against one configured [`Account`], and turns
//! every raw transport outcome into a single uniform result: `Ok` with typed
//! metadata derived from response headers, or a [`DavError`] with a closed
//! failure classification.
//!
//! ```no_run
//! use nextdav::{Account, DavClient, Depth, RequestOptions};
//!
//! # async fn demo() -> Result<(), nextdav::DavError> {
//! let account = Account::new(
//!     "https://cloud.example.com",
//!     "remote.php/dav",
//!     "alice",
//!     "alice",
//!     "app-password",
//! );
//! let client = DavClient::new(account)?;
//! let entries = client
//!     .read_folder("files/alice/docs", Depth::One, &RequestOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod login;
pub mod models;
pub mod request;
pub mod transfer;
pub mod xml;

pub use auth::{AuthChallenge, ChallengeDisposition, ChallengeResolver, Credential};
pub use client::DavClient;
pub use config::Account;
pub use error::{DavError, ErrorKind};
pub use login::{login_flow_v2, login_flow_v2_poll, AppPassword, LoginFlow};
pub use models::{
    Comment, Depth, FileMetadata, RequestOptions, ResourceEntry, TransferProgress,
};
pub use request::{RequestBuilder, RequestSpec};
pub use transfer::TransferHandle;
pub use xml::{StandardCodec, XmlCodec};
