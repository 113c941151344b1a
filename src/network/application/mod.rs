//! # Application Layer Protocols
//!
//! Protocol engines built on the transport traits of [`crate::network`].
//! They never open sockets or allocate: the application supplies a
//! [`Connect`](crate::network::Connect) implementation for its network stack
//! and every buffer the protocol works in.
//!
//! - **[`http`]**: HTTP/1.1 client with synchronous and callback-driven
//!   asynchronous exchanges, range downloads and URL helpers.

/// HTTP/1.1 client engine.
///
/// Formats requests and parses responses in caller-owned buffers, over
/// plain TCP or TLS sessions provided by the transport.
pub mod http;
