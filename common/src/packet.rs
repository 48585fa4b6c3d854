//! Stream packet structure and serialization.
//!
//! Implements the datagram framing used between an audio sender and the
//! inbound stream: a fixed 4-byte header carrying the format version, the
//! packet type, and the 16-bit sequence number, followed by the payload.

use anyhow::Result;

/// Wire format version carried in the first header byte.
const STREAM_PACKET_VERSION: u8 = 1;

/// Size of the fixed packet header in bytes.
pub const HEADER_LEN: usize = 4;

/// Kind of payload a stream packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Stream properties followed by little-endian 16-bit PCM samples.
    AudioStream,

    /// A big-endian `u16` count of silent samples; no PCM data follows.
    SilentFrame,
}

impl PacketType {
    // ---
    /// Decodes a packet type from its wire byte.
    ///
    /// # Errors
    ///
    /// Returns error for unknown type bytes.
    pub fn from_wire(byte: u8) -> Result<Self> {
        // ---
        match byte {
            0 => Ok(PacketType::AudioStream),
            1 => Ok(PacketType::SilentFrame),
            other => anyhow::bail!("unknown packet type: {}", other),
        }
    }

    /// Returns the wire byte for this packet type.
    pub fn to_wire(self) -> u8 {
        // ---
        match self {
            PacketType::AudioStream => 0,
            PacketType::SilentFrame => 1,
        }
    }
}

/// Stream packet for audio transmission.
///
/// The header contains the minimum the receiver needs to run its sequence
/// accounting: a version byte for wire-format defense, the packet type, and
/// a sequence number that increments by 1 per packet and wraps at 65535.
///
/// # Wire Format
///
/// ```text
///  0        1        2        3        4
/// +--------+--------+--------+--------+------------------
/// |version | type   |   sequence (BE) |  payload...
/// +--------+--------+--------+--------+------------------
/// ```
#[derive(Debug, Clone)]
pub struct StreamPacket {
    // ---
    /// Kind of payload this packet carries
    pub packet_type: PacketType,

    /// Packet sequence number (wraps at 65535)
    pub sequence: u16,

    /// Payload bytes after the header
    pub payload: Vec<u8>,
}

impl StreamPacket {
    // ---
    /// Creates a new stream packet with the given parameters.
    pub fn new(packet_type: PacketType, sequence: u16, payload: Vec<u8>) -> Self {
        // ---
        Self {
            packet_type,
            sequence,
            payload,
        }
    }

    /// Serializes the packet into wire format.
    ///
    /// Returns a byte vector ready for UDP transmission: the fixed 4-byte
    /// header followed by the payload.
    pub fn serialize(&self) -> Vec<u8> {
        // ---
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());

        buf.push(STREAM_PACKET_VERSION);
        buf.push(self.packet_type.to_wire());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.payload);

        buf
    }

    /// Deserializes a packet from wire format.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Packet is smaller than the header size (4 bytes)
    /// - The version byte does not match
    /// - The packet type is unknown
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        // ---
        let (packet_type, sequence) = decode_header(data)?;

        Ok(Self {
            packet_type,
            sequence,
            payload: data[HEADER_LEN..].to_vec(),
        })
    }
}

/// Decodes only the fixed header, leaving the payload bytes in place.
///
/// This is the zero-copy entry the packet path uses; the payload is the
/// remainder of the datagram after [`HEADER_LEN`] bytes.
///
/// # Errors
///
/// Returns error on short packets, version mismatch, or unknown type.
pub fn decode_header(data: &[u8]) -> Result<(PacketType, u16)> {
    // ---
    if data.len() < HEADER_LEN {
        anyhow::bail!("packet too small: {} bytes", data.len());
    }

    if data[0] != STREAM_PACKET_VERSION {
        anyhow::bail!("invalid stream packet version: {}", data[0]);
    }

    let packet_type = PacketType::from_wire(data[1])?;
    let sequence = u16::from_be_bytes([data[2], data[3]]);

    Ok((packet_type, sequence))
}
