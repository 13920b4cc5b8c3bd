//! reqcore - Incremental HTTP/1.x request parsing over pooled per-request state
//!
//! The request-parsing and connection-state core of a minimal HTTP server:
//! everything between "a socket produced bytes" and "a handler got a typed
//! request", with nothing allocated per request on the happy path.
//!
//! # What it does
//!
//! - **Incremental head parsing** - the request line and headers are parsed
//!   as bytes arrive, however the socket fragments them, into one
//!   pre-allocated buffer per request.
//! - **Lazy payloads** - the body is read from the socket on first
//!   [`body()`](Request::body) call and memoized; query parameters are
//!   split and percent-decoded on first [`query()`](Request::query) call.
//! - **Connection reuse** - [`drain()`](Request::drain) advances the socket
//!   past any unread body so the next request on the connection starts
//!   aligned, and [`can_keep_alive()`](Request::can_keep_alive) applies the
//!   HTTP/1.x keep-alive rules.
//! - **State recycling** - [`RequestState`] holds the buffer and containers
//!   a request borrows; a lock-free [`Pool`] recycles states across
//!   connections without a mutex.
//!
//! # What it leaves to the caller
//!
//! Accepting connections, routing, middleware, and writing responses are
//! the caller's business. The crate hands over a parsed [`Request`] and
//! takes it back for draining; everything around that is out of scope.
//!
//! # Usage
//!
//! ```no_run
//! use reqcore::{limits::ReqLimits, Pool, Request, RequestState};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let limits = ReqLimits::default();
//!     let pool = Pool::new(64, move || RequestState::new(&limits));
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     loop {
//!         let (mut stream, address) = listener.accept().await?;
//!         let mut state = pool.acquire();
//!
//!         if let Ok(mut request) = Request::parse(&mut state, &mut stream, address).await {
//!             let _body = request.body().await;
//!             // ... route, handle, write a response ...
//!             let _ = request.drain().await;
//!         }
//!
//!         state.reset();
//!         pool.release(state);
//!     }
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod query;
    pub(crate) mod request;
    pub(crate) mod types;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod pool;
pub(crate) mod scan;

pub use crate::{
    errors::ErrorKind,
    http::{
        request::{Request, RequestState},
        types::{KeyValue, Method, Url, Version},
    },
    pool::Pool,
};
