//! Shared library for the inbound audio stream workspace.
//!
//! This crate is the **public gateway** for all shared functionality.
//! Downstream crates should import through `inbound_audio_common::*` exports
//! and should not drill into internal module structure.

mod observability;
mod packet;

pub use observability::{init_tracing, MetricsContext, MetricsServerConfig};
pub use packet::{decode_header, PacketType, StreamPacket, HEADER_LEN};
