use crate::{
    errors::ErrorKind,
    http::{
        query,
        types::{self, KeyValue, Method, Url, Version},
    },
    limits::ReqLimits,
    scan,
};
use memchr::memchr;
use std::{net::SocketAddr, time::Duration};
use tokio::io::AsyncRead;

pub(crate) mod reader {
    use crate::errors::ErrorKind;
    use std::time::Duration;
    use tokio::{
        io::{AsyncRead, AsyncReadExt},
        time::timeout,
    };

    /// One read of head bytes.
    ///
    /// An empty `buf` means the static buffer filled up before the end of
    /// the head was seen. With a deadline set, expiry wins over a stalled
    /// read. A 0-byte read is the remote closing mid-request.
    pub(crate) async fn read_for_header<S: AsyncRead + Unpin>(
        stream: &mut S,
        buf: &mut [u8],
        deadline: Option<Duration>,
    ) -> Result<usize, ErrorKind> {
        if buf.is_empty() {
            return Err(ErrorKind::HeaderTooBig);
        }

        let count = match deadline {
            Some(time) => timeout(time, stream.read(buf))
                .await
                .map_err(|_| ErrorKind::Timeout)??,
            None => stream.read(buf).await?,
        };

        if count == 0 {
            return Err(ErrorKind::ConnectionClosed);
        }

        Ok(count)
    }

    /// One read of body bytes; not subject to the header deadline.
    pub(crate) async fn read_some<S: AsyncRead + Unpin>(
        stream: &mut S,
        buf: &mut [u8],
    ) -> Result<usize, ErrorKind> {
        let count = stream.read(buf).await?;

        if count == 0 {
            return Err(ErrorKind::ConnectionClosed);
        }

        Ok(count)
    }
}

// Per-request overflow allocations, all freed together on reset.
pub(crate) struct Arena {
    chunks: Vec<Box<[u8]>>,
}

impl Arena {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Arena { chunks: Vec::new() }
    }

    /// Allocates a zeroed chunk that stays valid until `reset`.
    #[inline]
    pub(crate) fn alloc(&mut self, size: usize) -> &'static mut [u8] {
        let mut chunk = vec![0; size].into_boxed_slice();

        // SAFETY: the chunk is its own heap allocation; moving the box into
        // the list does not move the bytes, and the list is only cleared by
        // reset, after which no slice handed out here may be used.
        let slice = unsafe { std::mem::transmute::<&mut [u8], &'static mut [u8]>(&mut chunk) };

        self.chunks.push(chunk);
        slice
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.chunks.clear();
    }
}

/// Reusable per-request scratch state.
///
/// Holds the static buffer every request on a connection parses into, the
/// pre-allocated header/query/path-parameter containers, and an overflow
/// arena. One `RequestState` is borrowed per in-flight request, typically
/// drawn from a [`Pool`](crate::Pool), reset, and returned once the request
/// has been drained.
pub struct RequestState {
    buffer: Box<[u8]>,
    headers: KeyValue,
    query: KeyValue,
    params: KeyValue,
    arena: Arena,
    body_size: usize,
    read_header_timeout: Option<Duration>,
}

impl RequestState {
    /// Pre-allocates state sized by `limits`. No further allocation happens
    /// while parsing unless a body outgrows the buffer tail.
    pub fn new(limits: &ReqLimits) -> Self {
        RequestState {
            buffer: vec![0; limits.buffer_size].into_boxed_slice(),
            headers: KeyValue::new(limits.header_count),
            query: KeyValue::new(limits.query_count),
            params: KeyValue::new(limits.param_count),
            arena: Arena::new(),
            body_size: limits.body_size,
            read_header_timeout: limits.read_header_timeout,
        }
    }

    /// Prepares the state for the next request.
    ///
    /// Slices obtained through a [`Request`] that borrowed this state must
    /// not be used afterwards; the buffer and arena they point into are
    /// reused by the next parse.
    pub fn reset(&mut self) {
        self.headers.reset();
        self.query.reset();
        self.params.reset();
        self.arena.reset();
    }
}

/// A parsed HTTP/1.x request.
///
/// Produced by [`Request::parse`]; borrows the [`RequestState`] it parsed
/// into and the socket it arrived on. The head (request line and headers)
/// is fully parsed up front; the body and the decoded query parameters are
/// ingested lazily on first access and memoized.
pub struct Request<'a, S> {
    method: Method,
    version: Version,
    url: Url,
    keepalive: bool,
    address: SocketAddr,

    // Offset just past the head terminator; the buffer below it is referenced
    // by the url and header slices and is never written again.
    pos: usize,
    // Bytes read past the head that belong to the body (or to a pipelined
    // successor).
    header_overread: usize,
    body: Option<Option<&'static [u8]>>,
    query_read: bool,

    state: &'a mut RequestState,
    stream: &'a mut S,
}

impl<'a, S: AsyncRead + Unpin> Request<'a, S> {
    /// Reads and parses a request head from `stream`.
    ///
    /// Reads are interleaved with parsing: the socket is read exactly as
    /// often as the next phase needs more bytes, and whatever arrives past
    /// the head stays in the buffer for [`body`](Self::body) to pick up.
    pub async fn parse(
        state: &'a mut RequestState,
        stream: &'a mut S,
        address: SocketAddr,
    ) -> Result<Request<'a, S>, ErrorKind> {
        let mut parser = Parser {
            state,
            stream,
            pos: 0,
            len: 0,
        };

        let method = parser.parse_method().await?;
        let url = parser.parse_target().await?;
        let version = parser.parse_protocol().await?;
        parser.parse_headers().await?;

        tracing::trace!(?method, ?version, "request head parsed");

        Ok(Request {
            method,
            version,
            url,
            keepalive: true,
            address,
            pos: parser.pos,
            header_overread: parser.len - parser.pos,
            body: None,
            query_read: false,
            state: parser.state,
            stream: parser.stream,
        })
    }
}

// Public API
impl<'a, S> Request<'a, S> {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    #[inline(always)]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Address of the connected peer.
    #[inline(always)]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns the first value stored under `name`.
    ///
    /// Header names were lowercased in place during parsing, so lookups are
    /// case-insensitive as long as `name` itself is lowercase (e.g.
    /// `b"content-type"`).
    #[inline(always)]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.state.headers.get(name)
    }

    /// Returns the path parameter stored under `name`.
    #[inline(always)]
    pub fn param(&self, name: &[u8]) -> Option<&[u8]> {
        self.state.params.get(name)
    }

    /// The path-parameter container, for the routing layer to fill.
    #[inline(always)]
    pub(crate) fn params_mut(&mut self) -> &mut KeyValue {
        &mut self.state.params
    }

    /// Forces the keep-alive decision, typically to close after an error
    /// response.
    #[inline(always)]
    pub fn set_keepalive(&mut self, keepalive: bool) {
        self.keepalive = keepalive;
    }

    /// Whether the connection may carry another request after this one.
    pub fn can_keep_alive(&self) -> bool {
        if !self.keepalive {
            return false;
        }

        match self.version {
            Version::Http11 => !matches!(self.state.headers.get(b"connection"), Some(b"close")),
            // TODO: honor `connection: keep-alive` on HTTP/1.0
            Version::Http10 => false,
        }
    }
}

// Lazy payload access
impl<'a, S: AsyncRead + Unpin> Request<'a, S> {
    /// Returns the request body, reading it from the socket on first call.
    ///
    /// The result is memoized: repeated calls return the same slice without
    /// touching the socket. Requests without a `content-length` header (or
    /// with `content-length: 0`) have no body.
    pub async fn body(&mut self) -> Result<Option<&[u8]>, ErrorKind> {
        if let Some(cached) = self.body {
            return Ok(cached);
        }

        if self.state.headers.get(b"transfer-encoding").is_some() {
            // TODO: implement chunked request bodies
            return Err(ErrorKind::UnsupportedTransferEncoding);
        }

        let Some(value) = self.state.headers.get(b"content-length") else {
            self.body = Some(None);
            return Ok(None);
        };

        let length = types::parse_decimal(value).ok_or(ErrorKind::InvalidContentLength)?;
        if length == 0 {
            self.body = Some(None);
            return Ok(None);
        }
        if length > self.state.body_size {
            return Err(ErrorKind::BodyTooBig);
        }

        let slice = if self.header_overread >= length {
            // Already in the buffer, over-read while parsing the head.
            let slice =
                unsafe { types::into_static(&self.state.buffer[self.pos..self.pos + length]) };
            self.pos += length;
            self.header_overread -= length;
            slice
        } else if self.state.buffer.len() - self.pos >= length {
            // The free tail fits the body; finish reading in place.
            let end = self.pos + length;
            let mut filled = self.pos + self.header_overread;
            while filled < end {
                filled +=
                    reader::read_some(self.stream, &mut self.state.buffer[filled..end]).await?;
            }

            let slice = unsafe { types::into_static(&self.state.buffer[self.pos..end]) };
            self.pos = end;
            self.header_overread = 0;
            slice
        } else {
            // Too big for the tail: move the over-read prefix out and
            // finish the read in a dedicated allocation.
            let dest = self.state.arena.alloc(length);
            dest[..self.header_overread]
                .copy_from_slice(&self.state.buffer[self.pos..self.pos + self.header_overread]);

            let mut filled = self.header_overread;
            while filled < length {
                filled += reader::read_some(self.stream, &mut dest[filled..]).await?;
            }

            self.header_overread = 0;
            let dest: &'static [u8] = dest;
            dest
        };

        tracing::trace!(length, "request body read");
        self.body = Some(Some(slice));
        Ok(Some(slice))
    }

    /// Returns the decoded query parameters, decoding them on first call.
    ///
    /// Duplicate keys keep their insertion order; lookups return the first
    /// match. The result is memoized and independent of whether
    /// [`body`](Self::body) was called before or after.
    pub async fn query(&mut self) -> Result<&KeyValue, ErrorKind> {
        if self.query_read {
            return Ok(&self.state.query);
        }

        let raw = self.url.query;
        if raw.is_empty() {
            self.query_read = true;
            return Ok(&self.state.query);
        }

        // Move any over-read body bytes out of the way before the buffer
        // tail is reused as unescape scratch.
        self.body().await?;

        let mut cursor = self.pos + self.header_overread;
        for (key, value) in query::Pairs::new(raw) {
            let key = query::unescape(
                &mut self.state.arena,
                &mut self.state.buffer[cursor..],
                key,
            );
            cursor += key.written;

            let value = query::unescape(
                &mut self.state.arena,
                &mut self.state.buffer[cursor..],
                value,
            );
            cursor += value.written;

            self.state.query.add(key.value, value.value);
        }

        self.query_read = true;
        Ok(&self.state.query)
    }

    /// Advances the socket to the next request boundary.
    ///
    /// Call once the handler is done with the request and before the state
    /// is reset and released; previously returned header and body slices
    /// must no longer be used. A no-op when the body was already read.
    /// Fails with [`TooMuchData`](ErrorKind::TooMuchData) when more bytes
    /// were over-read than `content-length` declares, since those bytes
    /// belong to a pipelined request this parser cannot hand back.
    pub async fn drain(&mut self) -> Result<(), ErrorKind> {
        if self.body.is_some() {
            return Ok(());
        }

        if self.state.headers.get(b"transfer-encoding").is_some() {
            // TODO: implement chunked request bodies
            return Err(ErrorKind::UnsupportedTransferEncoding);
        }

        let Some(value) = self.state.headers.get(b"content-length") else {
            return Ok(());
        };

        let length = types::parse_decimal(value).ok_or(ErrorKind::InvalidContentLength)?;
        if self.header_overread > length {
            return Err(ErrorKind::TooMuchData);
        }

        let mut remaining = length - self.header_overread;
        self.header_overread = 0;

        while remaining > 0 {
            let limit = remaining.min(self.state.buffer.len());
            remaining -= reader::read_some(self.stream, &mut self.state.buffer[..limit]).await?;
        }

        Ok(())
    }
}

//

struct Parser<'a, S> {
    state: &'a mut RequestState,
    stream: &'a mut S,
    pos: usize,
    len: usize,
}

impl<'a, S: AsyncRead + Unpin> Parser<'a, S> {
    // Reads until `count` bytes are visible past the parse position.
    async fn ensure(&mut self, count: usize) -> Result<(), ErrorKind> {
        while self.len - self.pos < count {
            self.len += reader::read_for_header(
                self.stream,
                &mut self.state.buffer[self.len..],
                self.state.read_header_timeout,
            )
            .await?;
        }

        Ok(())
    }
}

// Parse request line
impl<'a, S: AsyncRead + Unpin> Parser<'a, S> {
    async fn parse_method(&mut self) -> Result<Method, ErrorKind> {
        self.ensure(4).await?;

        let mut key = [0; 4];
        key.copy_from_slice(&self.state.buffer[self.pos..self.pos + 4]);

        let method = match &key {
            b"GET " => {
                self.pos += 4;
                Method::Get
            }
            b"PUT " => {
                self.pos += 4;
                Method::Put
            }
            b"POST" => {
                self.expect_method_tail(b" ").await?;
                Method::Post
            }
            b"HEAD" => {
                self.expect_method_tail(b" ").await?;
                Method::Head
            }
            b"PATC" => {
                self.expect_method_tail(b"H ").await?;
                Method::Patch
            }
            b"DELE" => {
                self.expect_method_tail(b"TE ").await?;
                Method::Delete
            }
            b"OPTI" => {
                self.expect_method_tail(b"ONS ").await?;
                Method::Options
            }
            _ => return Err(ErrorKind::UnknownMethod),
        };

        Ok(method)
    }

    async fn expect_method_tail(&mut self, tail: &[u8]) -> Result<(), ErrorKind> {
        let end = 4 + tail.len();
        self.ensure(end).await?;

        if &self.state.buffer[self.pos + 4..self.pos + end] != tail {
            return Err(ErrorKind::UnknownMethod);
        }

        self.pos += end;
        Ok(())
    }

    async fn parse_target(&mut self) -> Result<Url, ErrorKind> {
        self.ensure(1).await?;

        match self.state.buffer[self.pos] {
            b'/' => {
                let end = loop {
                    if let Some(space) = memchr(b' ', &self.state.buffer[self.pos..self.len]) {
                        break space;
                    }
                    self.ensure(self.len - self.pos + 1).await?;
                };

                let raw =
                    unsafe { types::into_static(&self.state.buffer[self.pos..self.pos + end]) };
                self.pos += end + 1;
                Ok(Url::parse(raw))
            }
            b'*' => {
                self.ensure(2).await?;
                if self.state.buffer[self.pos + 1] != b' ' {
                    return Err(ErrorKind::InvalidRequestTarget);
                }
                self.pos += 2;
                Ok(Url::wildcard())
            }
            _ => Err(ErrorKind::InvalidRequestTarget),
        }
    }

    async fn parse_protocol(&mut self) -> Result<Version, ErrorKind> {
        // "HTTP/1.X\r\n" (10 bytes)
        self.ensure(10).await?;

        let line = &self.state.buffer[self.pos..self.pos + 10];
        if &line[..4] != b"HTTP" {
            return Err(ErrorKind::UnknownProtocol);
        }

        let version = match &line[4..8] {
            b"/1.1" => Version::Http11,
            b"/1.0" => Version::Http10,
            _ => return Err(ErrorKind::UnsupportedProtocol),
        };

        if &line[8..10] != b"\r\n" {
            return Err(ErrorKind::UnknownProtocol);
        }

        self.pos += 10;
        Ok(version)
    }
}

// Parse headers
impl<'a, S: AsyncRead + Unpin> Parser<'a, S> {
    async fn parse_headers(&mut self) -> Result<(), ErrorKind> {
        loop {
            let line_len = loop {
                if let Some(cr) = scan::find_carriage_return(&self.state.buffer[self.pos..self.len])
                {
                    break cr;
                }
                self.ensure(self.len - self.pos + 1).await?;
            };

            self.ensure(line_len + 2).await?;
            if self.state.buffer[self.pos + line_len + 1] != b'\n' {
                return Err(ErrorKind::InvalidHeaderLine);
            }

            // The empty line terminating the head.
            if line_len == 0 {
                self.pos += 2;
                return Ok(());
            }

            self.store_header(line_len)?;
            self.pos += line_len + 2;
        }
    }

    // Lowercases the name in place up to the colon, trims leading spaces
    // off the value, stores the pair.
    fn store_header(&mut self, line_len: usize) -> Result<(), ErrorKind> {
        let line_start = self.pos;
        let mut colon = None;

        for index in 0..line_len {
            let byte = &mut self.state.buffer[line_start + index];
            if *byte == b':' {
                colon = Some(index);
                break;
            }
            *byte = types::lower(*byte);
        }

        let Some(colon) = colon else {
            return Err(ErrorKind::InvalidHeaderLine);
        };

        let name =
            unsafe { types::into_static(&self.state.buffer[line_start..line_start + colon]) };

        let mut value = &self.state.buffer[line_start + colon + 1..line_start + line_len];
        while value.first() == Some(&b' ') {
            value = &value[1..];
        }
        let value = unsafe { types::into_static(value) };

        self.state.headers.add(name, value);
        Ok(())
    }
}
