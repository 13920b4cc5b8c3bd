//! Request parsing limits and buffer pre-allocation sizes
//!
//! Every limit here translates directly into memory pre-allocated per
//! [`RequestState`](crate::RequestState): one static buffer of
//! `buffer_size` bytes plus three fixed-capacity key/value containers.
//! Nothing grows after construction except explicit overflow allocations
//! for bodies larger than the free buffer tail.
//!
//! # Defaults
//!
//! Defaults are sized for API-style traffic: a 32 KiB head, a 1 MiB body
//! cap, and container capacities that comfortably hold what browsers and
//! HTTP clients actually send.
//!
//! # Examples
//!
//! ```
//! use reqcore::{limits::ReqLimits, RequestState};
//! use std::time::Duration;
//!
//! let state = RequestState::new(&ReqLimits {
//!     body_size: 16 * 1024,
//!     read_header_timeout: Some(Duration::from_secs(2)),
//!     ..ReqLimits::default()
//! });
//! ```

use std::time::Duration;

/// Limits applied while parsing a single request.
///
/// `buffer_size` is the hard cap on the request head: the request line and
/// every header, up to and including the final blank line, must fit in the
/// static buffer or parsing fails with
/// [`HeaderTooBig`](crate::ErrorKind::HeaderTooBig).
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Size in bytes of the per-request static buffer (default: `32 KiB`).
    ///
    /// The buffer holds the request head, any body bytes read while
    /// scanning for the end of the head, in-place body storage when the
    /// tail is large enough, and scratch space for query-string decoding.
    pub buffer_size: usize,

    /// Maximum accepted `content-length` in bytes (default: `1 MiB`).
    ///
    /// Requests declaring more fail with
    /// [`BodyTooBig`](crate::ErrorKind::BodyTooBig) before any body byte
    /// is read.
    pub body_size: usize,

    /// Capacity of the headers container (default: `32`).
    ///
    /// Headers past the capacity are parsed and discarded.
    pub header_count: usize,

    /// Capacity of the query-parameters container (default: `32`).
    pub query_count: usize,

    /// Capacity of the path-parameters container (default: `10`).
    ///
    /// Filled by the routing layer, not the parser.
    pub param_count: usize,

    /// Deadline for each socket read while parsing the head (default: unset).
    ///
    /// Expiry fails the request with
    /// [`Timeout`](crate::ErrorKind::Timeout). Body reads are not subject
    /// to this deadline.
    pub read_header_timeout: Option<Duration>,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            buffer_size: 32 * 1024, // caps the whole request head
            body_size: 1024 * 1024,

            header_count: 32, // browsers send 10-12, proxies add a few
            query_count: 32,
            param_count: 10,

            read_header_timeout: None,

            _priv: (),
        }
    }
}
