//! Streaming RPC channel.
//!
//! A persistent, multiplexed, bidirectional connection over which the
//! requester opens many logical request-stream exchanges, each addressed
//! to a named route.
//!
//! # Data Flow
//! ```text
//! RpcConnection::request_stream ──request──► RpcServer ──► RouteHandler
//!        ▲                                       │
//!        └──────── next* (complete | error) ─────┘
//! ```
//!
//! # Design Decisions
//! - JSON frames over WebSocket text messages (see `frame.rs`)
//! - Dropping a `RouteStream` sends `cancel`, which aborts the emitter
//! - Connection loss fails every open stream; there is no reconnect

pub mod client;
pub mod error;
pub mod frame;
pub mod server;

pub use client::{RouteStream, RpcConnection};
pub use error::RpcError;
pub use frame::{Frame, StreamId};
pub use server::{PayloadStream, RouteHandler, RpcServer};
