//! UDP network intake for stream packets.
//!
//! Provides async UDP socket handling for receiving audio datagrams from a
//! sender and handing them, pre-validated, to the inbound stream.

use anyhow::{Context, Result};
use inbound_audio_common::decode_header;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// UDP receiver for stream packet intake.
///
/// Wraps a tokio UDP socket for async reception. Datagrams with malformed
/// headers are rejected here so the stream only sees plausible packets.
pub struct PacketReceiver {
    // ---
    socket: UdpSocket,
    datagrams_received: u64,
    bytes_received: u64,
    datagrams_invalid: u64,
}

impl PacketReceiver {
    // ---
    /// Creates a new receiver bound to the specified port.
    ///
    /// Listens on all interfaces (0.0.0.0) for incoming packets.
    ///
    /// # Errors
    ///
    /// Returns error if socket binding fails.
    pub async fn new(port: u16) -> Result<Self> {
        // ---
        let addr = format!("0.0.0.0:{}", port);

        let socket = UdpSocket::bind(&addr)
            .await
            .with_context(|| format!("failed to bind UDP socket to {}", addr))?;

        info!("UDP socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            datagrams_received: 0,
            bytes_received: 0,
            datagrams_invalid: 0,
        })
    }

    /// Receives the next datagram.
    ///
    /// Blocks until a datagram arrives, then validates its header. Invalid
    /// datagrams are logged and counted, returning `None`.
    ///
    /// # Errors
    ///
    /// Returns error if network reception fails.
    pub async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        // ---
        let mut buf = vec![0u8; 2048]; // Max UDP datagram size for audio

        let (len, src) = self
            .socket
            .recv_from(&mut buf)
            .await
            .context("failed to receive UDP datagram")?;

        self.bytes_received += len as u64;
        buf.truncate(len);

        match decode_header(&buf) {
            Ok((_, sequence)) => {
                self.datagrams_received += 1;

                if self.datagrams_received % 100 == 0 {
                    debug!(
                        "Received {} datagrams ({} bytes, {} invalid) from {} - seq={}",
                        self.datagrams_received,
                        self.bytes_received,
                        self.datagrams_invalid,
                        src,
                        sequence
                    );
                }

                Ok(Some(buf))
            }
            Err(e) => {
                self.datagrams_invalid += 1;
                warn!("Dropped invalid datagram from {}: {}", src, e);
                Ok(None)
            }
        }
    }

    /// Returns statistics about datagrams received.
    ///
    /// # Returns
    ///
    /// Tuple of (datagrams_received, bytes_received, datagrams_invalid)
    pub fn stats(&self) -> (u64, u64, u64) {
        // ---
        (
            self.datagrams_received,
            self.bytes_received,
            self.datagrams_invalid,
        )
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_receiver_creation() {
        // ---
        // Try binding to an ephemeral port
        let receiver = PacketReceiver::new(0).await;
        assert!(receiver.is_ok());
    }

    #[tokio::test]
    async fn test_receiver_stats() {
        // ---
        let receiver = PacketReceiver::new(0).await.expect("receiver creation failed");

        let (datagrams, bytes, invalid) = receiver.stats();
        assert_eq!(datagrams, 0);
        assert_eq!(bytes, 0);
        assert_eq!(invalid, 0);
    }
}
