//! Core HTTP protocol types and byte utilities

use memchr::memchr;

// BYTE UTILITIES

#[inline(always)]
pub(crate) const fn lower(byte: u8) -> u8 {
    byte | ((byte >= b'A' && byte <= b'Z') as u8 * 0x20)
}

/// Parses a non-negative decimal integer.
///
/// Accepts exactly one or more ASCII digits; anything else, including the
/// empty slice, is rejected.
#[inline]
pub(crate) fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// SAFETY: slices produced here reference either the static per-request
// buffer or an arena chunk, both owned by a RequestState that outlives the
// Request borrowing from it. The memory is never freed or moved while a
// Request is live; it is only reused after RequestState::reset, at which
// point no Request refers to it.
#[inline(always)]
pub(crate) const unsafe fn into_static(src: &[u8]) -> &'static [u8] {
    unsafe { std::mem::transmute(src) }
}

// METHOD

/// HTTP request methods
///
/// # References
///
/// - [RFC 7231, Section 4](https://datatracker.ietf.org/doc/html/rfc7231#section-4)
/// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
///
/// `TRACE` and `CONNECT` are not accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Head,
    Patch,
    Delete,
    Options,
}

// VERSION

/// HTTP protocol version of the request line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 ([RFC 1945](https://tools.ietf.org/html/rfc1945))
    Http10,
    /// HTTP/1.1 ([RFC 7230](https://tools.ietf.org/html/rfc7230) and related)
    Http11,
}

// URL

/// The parsed request target.
///
/// # Components
///
/// - **Raw**: the full target as sent (e.g., `/api/users?sort=name`)
/// - **Path**: the part before the first `?` (e.g., `/api/users`)
/// - **Query**: the part after the first `?`, without the `?` itself
///
/// The server-wide `OPTIONS *` target is represented by the wildcard
/// sentinel: `raw` and `path` are `*`, the query is empty.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Url {
    pub(crate) raw: &'static [u8],
    pub(crate) path: &'static [u8],
    pub(crate) query: &'static [u8],
}

impl Url {
    #[inline]
    pub(crate) fn parse(raw: &'static [u8]) -> Self {
        match memchr(b'?', raw) {
            Some(split) => Url {
                raw,
                path: &raw[..split],
                query: &raw[split + 1..],
            },
            None => Url {
                raw,
                path: raw,
                query: b"",
            },
        }
    }

    #[inline(always)]
    pub(crate) const fn wildcard() -> Self {
        Url {
            raw: b"*",
            path: b"*",
            query: b"",
        }
    }
}

// Public API
impl Url {
    /// Returns the raw request target as sent on the request line.
    #[inline(always)]
    pub const fn raw(&self) -> &[u8] {
        self.raw
    }

    /// Returns the path component, without the query string.
    #[inline(always)]
    pub const fn path(&self) -> &[u8] {
        self.path
    }

    /// Returns the raw (still percent-encoded) query string, without the
    /// leading `?`. Empty when the target has no query.
    #[inline(always)]
    pub const fn query(&self) -> &[u8] {
        self.query
    }

    /// Whether the target is the server-wide `*` form.
    #[inline(always)]
    pub fn is_wildcard(&self) -> bool {
        self.raw == b"*"
    }
}

// KEY/VALUE STORE

/// A fixed-capacity, insertion-ordered store of byte-slice pairs.
///
/// Backs the header, query-parameter, and path-parameter containers of a
/// request. Lookup is a linear scan returning the first pair whose key is
/// byte-equal to the input; insertion past the capacity is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pairs: Vec<(&'static [u8], &'static [u8])>,
    capacity: usize,
}

impl KeyValue {
    #[inline(always)]
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline(always)]
    pub(crate) fn add(&mut self, key: &'static [u8], value: &'static [u8]) {
        if self.pairs.len() < self.capacity {
            self.pairs.push((key, value));
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.pairs.clear();
    }
}

// Public API
impl KeyValue {
    /// Returns the value of the first pair stored under `key`.
    #[inline]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|&&(stored, _)| stored == key)
            .map(|&(_, value)| value)
    }

    /// Number of stored pairs.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates pairs in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.pairs.iter().map(|&(key, value)| (key, value))
    }
}
