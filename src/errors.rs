use std::{error, fmt, io};

/// Failures surfaced while parsing a request head or ingesting its body.
///
/// Head-parsing errors are fatal to the current request and the connection
/// should be closed. Body and query errors are returned to the handler,
/// which decides whether to answer before closing.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The request head does not fit in the configured static buffer.
    HeaderTooBig,
    /// The remote closed the socket before the required bytes arrived.
    ConnectionClosed,
    /// The header-read deadline elapsed.
    Timeout,

    /// The method token is not in the accepted set.
    UnknownMethod,
    /// The request target is neither origin-form (`/...`) nor `*`.
    InvalidRequestTarget,
    /// The request-line protocol is malformed.
    UnknownProtocol,
    /// The protocol is well-formed but not HTTP/1.0 or HTTP/1.1.
    UnsupportedProtocol,
    /// A header line is missing its `:` or its CRLF.
    InvalidHeaderLine,

    /// `content-length` is empty or not a decimal integer.
    InvalidContentLength,
    /// The declared `content-length` exceeds the configured body cap.
    BodyTooBig,
    /// `transfer-encoding` bodies are not implemented.
    UnsupportedTransferEncoding,
    /// More bytes were read past the head than `content-length` declares;
    /// a pipelined request has started arriving.
    TooMuchData,

    Io(IoError),
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub struct IoError(pub(crate) io::Error);

// Compared by kind so ErrorKind stays usable in table-driven asserts.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
