#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The flow-control and readiness core of a reliable UDP transport.
//! 可靠UDP传输的流量控制与就绪核心。
//!
//! - [`congestion`]: pluggable congestion control bound per connection, with a
//!   default rate-based algorithm.
//! - [`epoll`]: a readiness multiplexer over transport sockets and native
//!   descriptors.

pub mod config;
pub mod error;
pub mod packet;

pub mod congestion;
pub mod epoll;

mod testing;
