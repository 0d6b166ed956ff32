//! Request assembly for every WebDAV verb the operations use.
//!
//! A [`RequestBuilder`] captures an [`Account`] snapshot and turns an
//! operation kind plus resource path(s) into a [`RequestSpec`]: method,
//! percent-encoded target URL, authenticated header set and optional body.
//! Specs are built once and never mutated after submission.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use crate::config::Account;
use crate::error::DavError;
use crate::headers;
use crate::models::{Depth, RequestOptions};

/// A fully assembled request, ready for the HTTP engine.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Builds [`RequestSpec`] values against one account snapshot.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    account: Account,
}

fn dav_method(name: &'static str) -> Result<Method, DavError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| DavError::MalformedUrl(format!("invalid method {}: {}", name, e)))
}

/// Percent-encodes the path portion of a raw URL, segment by segment, and
/// validates the result. Anything that cannot become a URL is rejected here,
/// before any network activity.
pub(crate) fn encode_url(raw: &str) -> Result<Url, DavError> {
    let (scheme, rest) = raw
        .split_once("://")
        .ok_or_else(|| DavError::MalformedUrl(raw.to_string()))?;
    if scheme != "http" && scheme != "https" {
        return Err(DavError::MalformedUrl(raw.to_string()));
    }
    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, Some(path)),
        None => (rest, None),
    };
    if host.is_empty() {
        return Err(DavError::MalformedUrl(raw.to_string()));
    }

    let mut encoded = format!("{}://{}", scheme, host);
    if let Some(path) = path {
        for segment in path.split('/') {
            encoded.push('/');
            encoded.push_str(&urlencoding::encode(segment));
        }
    }

    Url::parse(&encoded).map_err(|e| DavError::MalformedUrl(format!("{}: {}", raw, e)))
}

impl RequestBuilder {
    pub fn new(account: &Account) -> Self {
        Self {
            account: account.clone(),
        }
    }

    fn spec(
        &self,
        method: Method,
        raw_url: &str,
        content_type: Option<&'static str>,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        self.account.validate()?;
        let url = encode_url(raw_url)?;
        let headers = headers::standard_headers(&self.account, content_type, options)?;
        Ok(RequestSpec {
            method,
            url,
            headers,
            body: None,
        })
    }

    /// MKCOL on a resource path relative to the DAV root.
    pub fn mkcol(&self, path: &str, options: &RequestOptions) -> Result<RequestSpec, DavError> {
        self.spec(dav_method("MKCOL")?, &self.account.url_for(path), None, options)
    }

    pub fn delete(&self, path: &str, options: &RequestOptions) -> Result<RequestSpec, DavError> {
        self.spec(Method::DELETE, &self.account.url_for(path), None, options)
    }

    pub fn move_item(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        self.relocate(dav_method("MOVE")?, source, destination, overwrite, options)
    }

    pub fn copy_item(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        self.relocate(dav_method("COPY")?, source, destination, overwrite, options)
    }

    fn relocate(
        &self,
        method: Method,
        source: &str,
        destination: &str,
        overwrite: bool,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        let mut spec = self.spec(method, &self.account.url_for(source), None, options)?;
        // Destination is percent-encoded independently of the target URL.
        let destination = encode_url(&self.account.url_for(destination))?;
        spec.headers.insert(
            HeaderName::from_static("destination"),
            HeaderValue::from_str(destination.as_str())
                .map_err(|e| DavError::MalformedUrl(format!("invalid destination: {}", e)))?,
        );
        // Overwrite is always present, exactly T or F.
        spec.headers.insert(
            HeaderName::from_static("overwrite"),
            HeaderValue::from_static(if overwrite { "T" } else { "F" }),
        );
        Ok(spec)
    }

    /// PROPFIND with the caller-supplied property body. When a depth is given
    /// the path is normalized: depth 1 forces a trailing separator, depth 0
    /// strips exactly one.
    pub fn propfind(
        &self,
        path: &str,
        depth: Option<Depth>,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        let path = match depth {
            Some(Depth::One) if !path.ends_with('/') => format!("{}/", path),
            Some(Depth::Zero) if path.ends_with('/') => path[..path.len() - 1].to_string(),
            _ => path.to_string(),
        };
        let mut spec = self.spec(
            dav_method("PROPFIND")?,
            &self.account.url_for(&path),
            Some("application/xml"),
            options,
        )?;
        if let Some(depth) = depth {
            spec.headers.insert(
                HeaderName::from_static("depth"),
                HeaderValue::from_static(depth.as_str()),
            );
        }
        spec.body = Some(body);
        Ok(spec)
    }

    pub fn proppatch(
        &self,
        path: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        let mut spec = self.spec(
            dav_method("PROPPATCH")?,
            &self.account.url_for(path),
            Some("application/xml"),
            options,
        )?;
        spec.body = Some(body);
        Ok(spec)
    }

    pub fn report(
        &self,
        path: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        let mut spec = self.spec(
            dav_method("REPORT")?,
            &self.account.url_for(path),
            Some("text/xml"),
            options,
        )?;
        spec.body = Some(body);
        Ok(spec)
    }

    /// SEARCH against the account's DAV endpoint.
    pub fn search(&self, body: Vec<u8>, options: &RequestOptions) -> Result<RequestSpec, DavError> {
        let mut spec = self.spec(
            dav_method("SEARCH")?,
            &self.account.dav_url(),
            Some("text/xml"),
            options,
        )?;
        spec.body = Some(body);
        Ok(spec)
    }

    pub fn get(&self, path: &str, options: &RequestOptions) -> Result<RequestSpec, DavError> {
        self.spec(Method::GET, &self.account.url_for(path), None, options)
    }

    /// PUT for an upload. The streamed body is attached by the transfer layer;
    /// creation/modification timestamps become X-OC-Ctime / X-OC-Mtime when
    /// supplied and are omitted otherwise.
    pub fn put(
        &self,
        path: &str,
        creation: Option<DateTime<Utc>>,
        modification: Option<DateTime<Utc>>,
        options: &RequestOptions,
    ) -> Result<RequestSpec, DavError> {
        let mut spec = self.spec(Method::PUT, &self.account.url_for(path), None, options)?;
        if let Some(creation) = creation {
            spec.headers.insert(
                HeaderName::from_static("x-oc-ctime"),
                epoch_header(creation)?,
            );
        }
        if let Some(modification) = modification {
            spec.headers.insert(
                HeaderName::from_static("x-oc-mtime"),
                epoch_header(modification)?,
            );
        }
        Ok(spec)
    }
}

fn epoch_header(date: DateTime<Utc>) -> Result<HeaderValue, DavError> {
    HeaderValue::from_str(&date.timestamp().to_string())
        .map_err(|e| DavError::MalformedUrl(format!("invalid timestamp: {}", e)))
}
