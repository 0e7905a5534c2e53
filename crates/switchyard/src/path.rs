//! Request path canonicalization and host normalization.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};

/// Bytes kept escaped in the routing form of a segment, on top of every
/// non-ASCII byte.
const SEGMENT_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'/')
    .add(b'{')
    .add(b'}');

/// Returns the canonical form of a request path.
///
/// Repeated slashes are collapsed, `.` elements are dropped and `..` elements
/// remove the preceding element (never climbing above the root). A missing
/// leading slash is added and a trailing slash is kept. Paths that are already
/// canonical are returned borrowed.
pub fn clean_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for element in path.split('/') {
        match element {
            "" | "." => {}
            ".." => {
                if let Some(i) = cleaned.rfind('/') {
                    cleaned.truncate(i);
                }
            }
            element => {
                cleaned.push('/');
                cleaned.push_str(element);
            }
        }
    }

    if cleaned.is_empty() {
        cleaned.push('/');
    } else if path.ends_with('/') {
        cleaned.push('/');
    }

    Cow::Owned(cleaned)
}

/// Cheap check that `clean_path` would leave the path unchanged.
fn is_canonical(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };

    let mut elements = rest.split('/').peekable();
    while let Some(element) = elements.next() {
        let last = elements.peek().is_none();
        match element {
            // An empty last element is the trailing slash.
            "" if last => {}
            "" | "." | ".." => return false,
            _ => {}
        }
    }
    true
}

/// Returns the form of a path that routing compares.
///
/// Each segment is percent-decoded and escaped again with a fixed set, so
/// `%41` and `A` compare equal, as do `%c3%a9` and `é`, while an escaped `/`
/// stays inside its segment.
pub fn routing_path(path: &str) -> Cow<'_, str> {
    if !path.bytes().any(changes_in_routing_form) {
        return Cow::Borrowed(path);
    }

    let mut routed = String::with_capacity(path.len());
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            routed.push('/');
        }
        let decoded: Cow<'_, [u8]> = percent_decode_str(segment).into();
        routed.extend(percent_encode(&decoded, SEGMENT_ESCAPES));
    }
    Cow::Owned(routed)
}

/// Bytes that decoding or escaping may rewrite.
fn changes_in_routing_form(b: u8) -> bool {
    matches!(b, b' ' | b'%' | b'{' | b'}') || !b.is_ascii() || b.is_ascii_control()
}

/// Decodes a value captured from a routing path. Invalid UTF-8 is replaced.
pub fn decode_value(value: &str) -> Cow<'_, str> {
    percent_decode_str(value).decode_utf8_lossy()
}

/// Strips a trailing `:port` from a host.
///
/// Bracketed IPv6 literals keep their brackets. Hosts that cannot be split
/// unambiguously are returned unchanged.
pub fn strip_host_port(host: &str) -> &str {
    if !host.contains(':') {
        return host;
    }

    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(i) if rest[i + 1..].is_empty() || rest[i + 1..].starts_with(':') => {
                &host[..i + 2]
            }
            _ => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, _)) if !name.contains(':') => name,
        _ => host,
    }
}
