//! Stream format capability: how packet payloads map to audio samples.
//!
//! The inbound stream is generic over a [`StreamFormat`] so different senders
//! can frame their payloads differently without the buffering core caring.
//! The format answers two questions per packet: how many samples does it
//! account for, and how do those samples get into the ring.

use anyhow::Result;
use inbound_audio_common::PacketType;

use crate::ring_buffer::AudioRingBuffer;

/// Properties parsed from the bytes between the sequence number and the
/// audio data.
#[derive(Debug, Clone, Copy)]
pub struct StreamProperties {
    // ---
    /// Number of audio samples the packet accounts for
    pub num_audio_samples: usize,

    /// Bytes the properties occupy before the audio data
    pub properties_len: usize,

    /// Whether the packet carries silence instead of PCM data
    pub silent: bool,
}

/// Capability interface a concrete stream kind supplies.
pub trait StreamFormat {
    // ---
    /// Parses the info between the sequence number and the audio data and
    /// reports how many audio samples this packet contains (also used when
    /// filling in samples for dropped packets).
    ///
    /// # Errors
    ///
    /// Returns error on malformed payloads; the stream discards the packet
    /// tail and leaves its state untouched.
    fn parse_stream_properties(
        &mut self,
        packet_type: PacketType,
        payload: &[u8],
    ) -> Result<StreamProperties>;

    /// Writes the packet's audio samples into the ring buffer, returning
    /// the number of payload bytes consumed.
    ///
    /// The default implementation copies `num_audio_samples` little-endian
    /// 16-bit PCM samples.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is shorter than the announced sample
    /// count.
    fn parse_audio_data(
        &mut self,
        _packet_type: PacketType,
        payload: &[u8],
        num_audio_samples: usize,
        ring: &mut AudioRingBuffer,
    ) -> Result<usize> {
        // ---
        let byte_len = num_audio_samples * 2;
        if payload.len() < byte_len {
            anyhow::bail!(
                "audio payload too short: {} bytes for {} samples",
                payload.len(),
                num_audio_samples
            );
        }

        let mut samples = Vec::with_capacity(num_audio_samples);
        for chunk in payload[..byte_len].chunks_exact(2) {
            samples.push(i16::from_le_bytes([chunk[0], chunk[1]]));
        }
        ring.write_samples(&samples);

        Ok(byte_len)
    }
}

/// Raw PCM stream: the payload after the sequence number is nothing but
/// samples. Silent frames carry a big-endian sample count instead of data.
#[derive(Debug, Default)]
pub struct RawPcmFormat;

impl StreamFormat for RawPcmFormat {
    fn parse_stream_properties(
        &mut self,
        packet_type: PacketType,
        payload: &[u8],
    ) -> Result<StreamProperties> {
        // ---
        match packet_type {
            PacketType::SilentFrame => {
                if payload.len() < 2 {
                    anyhow::bail!("silent frame payload too short: {} bytes", payload.len());
                }
                let num_samples = u16::from_be_bytes([payload[0], payload[1]]) as usize;
                Ok(StreamProperties {
                    num_audio_samples: num_samples,
                    properties_len: 2,
                    silent: true,
                })
            }
            PacketType::AudioStream => Ok(StreamProperties {
                num_audio_samples: payload.len() / 2,
                properties_len: 0,
                silent: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_audio_properties_from_payload_length() {
        // ---
        let mut format = RawPcmFormat;
        let payload = vec![0u8; 480]; // 240 samples

        let props = format
            .parse_stream_properties(PacketType::AudioStream, &payload)
            .expect("properties parse failed");

        assert_eq!(props.num_audio_samples, 240);
        assert_eq!(props.properties_len, 0);
        assert!(!props.silent);
    }

    #[test]
    fn test_silent_frame_properties() {
        // ---
        let mut format = RawPcmFormat;
        let payload = 960u16.to_be_bytes().to_vec();

        let props = format
            .parse_stream_properties(PacketType::SilentFrame, &payload)
            .expect("properties parse failed");

        assert_eq!(props.num_audio_samples, 960);
        assert_eq!(props.properties_len, 2);
        assert!(props.silent);
    }

    #[test]
    fn test_silent_frame_too_short() {
        // ---
        let mut format = RawPcmFormat;

        let result = format.parse_stream_properties(PacketType::SilentFrame, &[7]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_audio_data_copies_le_samples() {
        // ---
        let mut format = RawPcmFormat;
        let mut ring = AudioRingBuffer::new(4, 4).expect("ring creation failed");

        let samples: Vec<i16> = vec![-1, 0, 1, 32767];
        let mut payload = Vec::new();
        for s in &samples {
            payload.extend_from_slice(&s.to_le_bytes());
        }

        let consumed = format
            .parse_audio_data(PacketType::AudioStream, &payload, 4, &mut ring)
            .expect("audio parse failed");

        assert_eq!(consumed, 8);
        let mut out = Vec::new();
        ring.pop_samples(4, &mut out);
        assert_eq!(out, samples);
    }

    #[test]
    fn test_audio_data_shorter_than_announced() {
        // ---
        let mut format = RawPcmFormat;
        let mut ring = AudioRingBuffer::new(4, 4).expect("ring creation failed");

        let result = format.parse_audio_data(PacketType::AudioStream, &[0, 1, 2], 4, &mut ring);

        assert!(result.is_err());
        assert_eq!(ring.samples_available(), 0);
    }
}
