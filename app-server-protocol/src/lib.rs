//! Wire types for the subset of the Codex app-server protocol consumed by the
//! monitor client.
//!
//! Item payloads inside notifications and turns are kept as raw JSON so that a
//! new or malformed item kind never prevents the surrounding notification from
//! decoding. They are parsed into conversation items at a single place on the
//! client side.

mod jsonrpc_lite;
mod protocol;

pub use jsonrpc_lite::*;
pub use protocol::common::*;
pub use protocol::v1::*;
pub use protocol::v2::*;
