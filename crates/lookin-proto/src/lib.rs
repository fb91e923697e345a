//! lookin-proto - client for the LookinServer simulator-agent wire protocol.
//!
//! LookinServer is an in-app agent that exposes a running iOS Simulator
//! app's live UI view hierarchy over a proprietary binary TCP protocol
//! (derived from Peertalk). This crate owns the client side of that
//! protocol end to end: port discovery, frame-level wire format, a
//! tag-multiplexed request/response transport, the keyed-archive payload
//! codec, typed request operations, the curated attribute registry, and a
//! `Session` that ties them together with the caches a multi-request
//! workflow (hierarchy fetch, concurrent per-view text enrichment) needs.
//!
//! This crate has no process concerns of its own — no stdio loop, no CLI,
//! no MCP tool schemas. Those live in the `lookin-mcp` binary crate built
//! on top of it.

pub mod archive;
pub mod error;
pub mod frame;
pub mod hierarchy;
pub mod port_prober;
pub mod registry;
pub mod request_manager;
pub mod session;
pub mod transport;
pub mod value_parse;

pub use error::{Error, Result};
pub use session::Session;
