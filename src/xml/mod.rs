//! XML collaborator: request-body templating and multistatus parsing.
//!
//! The core never formats protocol payloads itself; it calls through this
//! trait with typed parameters. [`StandardCodec`] is the default Nextcloud
//! flavored implementation, swappable at client construction for servers with
//! different property dialects.

mod multistatus;

use quick_xml::escape::escape;

use crate::error::DavError;
use crate::models::{Comment, ResourceEntry};

/// Request-body generation and multistatus decoding for the WebDAV dialect in
/// use.
pub trait XmlCodec: Send + Sync {
    /// PROPFIND property body for listing operations.
    fn propfind_properties(&self) -> Vec<u8>;

    /// PROPPATCH body toggling the favorite flag (flag value `1` or `0`).
    fn favorite(&self, favorite: bool) -> Vec<u8>;

    /// REPORT body listing all favorite-flagged resources.
    fn favorites_report(&self) -> Vec<u8>;

    /// SEARCH body matching display names against a literal pattern inside
    /// the given scope.
    fn search_by_name(&self, scope_href: &str, depth: &str, pattern: &str) -> Vec<u8>;

    /// SEARCH body for media files whose last-modified falls inside
    /// `[oldest, newest]`, both ISO-8601 with explicit offset.
    fn search_media(&self, scope_href: &str, newest: &str, oldest: &str) -> Vec<u8>;

    /// PROPFIND property body for file comments.
    fn comment_properties(&self) -> Vec<u8>;

    /// Decodes a multistatus response into resource entries.
    fn parse_resources(&self, body: &[u8]) -> Result<Vec<ResourceEntry>, DavError>;

    /// Decodes a comments multistatus response.
    fn parse_comments(&self, body: &[u8]) -> Result<Vec<Comment>, DavError>;
}

/// Default codec speaking the Nextcloud/ownCloud property dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

const FILE_PROPERTIES: &str = r#"<d:getlastmodified/>
<d:getetag/>
<d:getcontenttype/>
<d:getcontentlength/>
<d:resourcetype/>
<oc:fileid/>
<oc:size/>
<oc:favorite/>
<oc:permissions/>"#;

impl XmlCodec for StandardCodec {
    fn propfind_properties(&self) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
<d:prop>
{}
</d:prop>
</d:propfind>"#,
            FILE_PROPERTIES
        )
        .into_bytes()
    }

    fn favorite(&self, favorite: bool) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0"?>
<d:propertyupdate xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<d:set>
<d:prop>
<oc:favorite>{}</oc:favorite>
</d:prop>
</d:set>
</d:propertyupdate>"#,
            if favorite { 1 } else { 0 }
        )
        .into_bytes()
    }

    fn favorites_report(&self) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0"?>
<oc:filter-files xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
<d:prop>
{}
</d:prop>
<oc:filter-rules>
<oc:favorite>1</oc:favorite>
</oc:filter-rules>
</oc:filter-files>"#,
            FILE_PROPERTIES
        )
        .into_bytes()
    }

    fn search_by_name(&self, scope_href: &str, depth: &str, pattern: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<d:searchrequest xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<d:basicsearch>
<d:select>
<d:prop>
{properties}
</d:prop>
</d:select>
<d:from>
<d:scope>
<d:href>{href}</d:href>
<d:depth>{depth}</d:depth>
</d:scope>
</d:from>
<d:where>
<d:like>
<d:prop><d:displayname/></d:prop>
<d:literal>{pattern}</d:literal>
</d:like>
</d:where>
<d:orderby/>
</d:basicsearch>
</d:searchrequest>"#,
            properties = FILE_PROPERTIES,
            href = escape(scope_href),
            depth = escape(depth),
            pattern = escape(pattern),
        )
        .into_bytes()
    }

    fn search_media(&self, scope_href: &str, newest: &str, oldest: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<d:searchrequest xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<d:basicsearch>
<d:select>
<d:prop>
{properties}
</d:prop>
</d:select>
<d:from>
<d:scope>
<d:href>{href}</d:href>
<d:depth>infinity</d:depth>
</d:scope>
</d:from>
<d:where>
<d:and>
<d:or>
<d:like>
<d:prop><d:getcontenttype/></d:prop>
<d:literal>image/%</d:literal>
</d:like>
<d:like>
<d:prop><d:getcontenttype/></d:prop>
<d:literal>video/%</d:literal>
</d:like>
</d:or>
<d:lt>
<d:prop><d:getlastmodified/></d:prop>
<d:literal>{newest}</d:literal>
</d:lt>
<d:gt>
<d:prop><d:getlastmodified/></d:prop>
<d:literal>{oldest}</d:literal>
</d:gt>
</d:and>
</d:where>
<d:orderby/>
</d:basicsearch>
</d:searchrequest>"#,
            properties = FILE_PROPERTIES,
            href = escape(scope_href),
            newest = escape(newest),
            oldest = escape(oldest),
        )
        .into_bytes()
    }

    fn comment_properties(&self) -> Vec<u8> {
        br#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<d:prop>
<oc:id/>
<oc:actorId/>
<oc:actorDisplayName/>
<oc:creationDateTime/>
<oc:message/>
</d:prop>
</d:propfind>"#
            .to_vec()
    }

    fn parse_resources(&self, body: &[u8]) -> Result<Vec<ResourceEntry>, DavError> {
        multistatus::parse_resources(body)
    }

    fn parse_comments(&self, body: &[u8]) -> Result<Vec<Comment>, DavError> {
        multistatus::parse_comments(body)
    }
}
