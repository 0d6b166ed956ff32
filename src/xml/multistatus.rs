//! Multistatus response decoding with quick-xml.
//!
//! Namespace prefixes vary between servers, so elements are matched on their
//! local names only. Anything that fails to parse as XML surfaces as
//! `BadResponseDecode`.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::DavError;
use crate::headers::strip_quotes;
use crate::models::{Comment, ResourceEntry};

fn reader_for(body: &[u8]) -> Result<Reader<&[u8]>, DavError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| DavError::bad_response("multistatus body is not valid UTF-8"))?;
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(true);
    config.expand_empty_elements = false;
    Ok(reader)
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn decoded_name(href: &str) -> String {
    let segment = href
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(href);
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Decodes a PROPFIND/REPORT/SEARCH multistatus body into resource entries,
/// one per `<response>` element, in document order.
pub(super) fn parse_resources(body: &[u8]) -> Result<Vec<ResourceEntry>, DavError> {
    let mut reader = reader_for(body)?;
    let mut entries = Vec::new();
    let mut current: Option<ResourceEntry> = None;
    let mut field: Option<Vec<u8>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"response" {
                    current = Some(ResourceEntry::default());
                } else if current.is_some() {
                    field = Some(local);
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_directory = true;
                    }
                }
            }
            Ok(Event::Text(ref t)) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field.as_ref()) {
                    let value = t
                        .unescape()
                        .map_err(|e| DavError::bad_response(format!("bad text node: {}", e)))?;
                    apply_resource_field(entry, field, value.trim());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(mut entry) = current.take() {
                        entry.name = decoded_name(&entry.href);
                        if entry.href.ends_with('/') {
                            entry.is_directory = true;
                        }
                        entries.push(entry);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DavError::bad_response(format!(
                    "undecodable multistatus response: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn apply_resource_field(entry: &mut ResourceEntry, field: &[u8], value: &str) {
    match field {
        b"href" => entry.href = value.to_string(),
        b"getlastmodified" => entry.modified = parse_http_date(value),
        b"getetag" => entry.etag = Some(strip_quotes(value)),
        b"getcontenttype" => {
            if !value.is_empty() {
                entry.content_type = Some(value.to_string());
            }
        }
        b"getcontentlength" => {
            if entry.size == 0 {
                entry.size = value.parse().unwrap_or(0);
            }
        }
        // oc:size covers directories too and wins over getcontentlength
        b"size" => entry.size = value.parse().unwrap_or(entry.size),
        b"fileid" => entry.file_id = Some(value.to_string()),
        b"favorite" => entry.favorite = value == "1",
        _ => {}
    }
}

/// Decodes a comments multistatus body.
pub(super) fn parse_comments(body: &[u8]) -> Result<Vec<Comment>, DavError> {
    let mut reader = reader_for(body)?;
    let mut comments = Vec::new();
    let mut current: Option<Comment> = None;
    let mut field: Option<Vec<u8>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"response" {
                    current = Some(Comment::default());
                } else if current.is_some() {
                    field = Some(local);
                }
            }
            Ok(Event::Text(ref t)) => {
                if let (Some(comment), Some(field)) = (current.as_mut(), field.as_ref()) {
                    let value = t
                        .unescape()
                        .map_err(|e| DavError::bad_response(format!("bad text node: {}", e)))?;
                    apply_comment_field(comment, field, value.trim());
                }
            }
            Ok(Event::CData(ref t)) => {
                if let (Some(comment), Some(field)) = (current.as_mut(), field.as_ref()) {
                    let raw = String::from_utf8_lossy(t).into_owned();
                    apply_comment_field(comment, field, raw.trim());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(comment) = current.take() {
                        // the comments collection itself has no id
                        if !comment.id.is_empty() {
                            comments.push(comment);
                        }
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DavError::bad_response(format!(
                    "undecodable comments response: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(comments)
}

fn apply_comment_field(comment: &mut Comment, field: &[u8], value: &str) {
    match field {
        b"id" => comment.id = value.to_string(),
        b"actorId" => comment.actor_id = value.to_string(),
        b"actorDisplayName" => comment.actor_display_name = value.to_string(),
        b"message" => comment.message = value.to_string(),
        b"creationDateTime" => comment.created = parse_http_date(value),
        _ => {}
    }
}
