//! Network simulator for testing resilience.
//!
//! Provides in-process network condition simulation including packet loss,
//! jitter, and duplication. Runs on simulated microsecond time so tests can
//! drive it together with the stream's manual clock.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use receiver::StreamPacket;

/// Network simulator configuration.
#[derive(Debug, Clone)]
pub struct NetworkSimulatorConfig {
    // ---
    /// Packet loss rate (0.0 to 1.0)
    pub loss_rate: f64,

    /// Jitter bound in microseconds (random delay in `0..=jitter_usecs`)
    pub jitter_usecs: u64,

    /// Packet duplication rate (0.0 to 1.0)
    pub duplicate_rate: f64,

    /// Random seed for deterministic testing
    pub seed: u64,
}

impl Default for NetworkSimulatorConfig {
    fn default() -> Self {
        // ---
        Self {
            loss_rate: 0.0,
            jitter_usecs: 0,
            duplicate_rate: 0.0,
            seed: 42,
        }
    }
}

/// Simulates network conditions for testing.
///
/// Applies configurable packet loss, jitter, and duplication to packets
/// passing through it. Jitter naturally produces reordering once delays
/// overlap the send cadence.
pub struct NetworkSimulator {
    // ---
    config: NetworkSimulatorConfig,
    rng: StdRng,
    in_flight: Vec<(u64, StreamPacket)>,
    packets_sent: u64,
    packets_lost: u64,
    packets_duplicated: u64,
}

impl NetworkSimulator {
    // ---
    /// Creates a new network simulator with the given configuration.
    pub fn new(config: NetworkSimulatorConfig) -> Self {
        // ---
        let rng = StdRng::seed_from_u64(config.seed);

        Self {
            config,
            rng,
            in_flight: Vec::new(),
            packets_sent: 0,
            packets_lost: 0,
            packets_duplicated: 0,
        }
    }

    /// Sends a packet through the simulator at the given send time.
    ///
    /// The packet may be dropped, delayed, or duplicated based on
    /// configuration.
    pub fn send(&mut self, packet: StreamPacket, now_usecs: u64) {
        // ---
        self.packets_sent += 1;

        if self.rng.gen_bool(self.config.loss_rate) {
            self.packets_lost += 1;
            return;
        }

        let delivery = now_usecs + self.delay();
        if self.rng.gen_bool(self.config.duplicate_rate) {
            self.packets_duplicated += 1;
            let dup_delivery = delivery + self.delay();
            self.in_flight.push((dup_delivery, packet.clone()));
        }
        self.in_flight.push((delivery, packet));
    }

    /// Drains all packets whose delivery time has arrived, in delivery
    /// order.
    pub fn receive_due(&mut self, now_usecs: u64) -> Vec<StreamPacket> {
        // ---
        let mut due: Vec<(u64, StreamPacket)> = Vec::new();
        let mut still_in_flight = Vec::new();

        for (delivery, packet) in self.in_flight.drain(..) {
            if delivery <= now_usecs {
                due.push((delivery, packet));
            } else {
                still_in_flight.push((delivery, packet));
            }
        }
        self.in_flight = still_in_flight;

        due.sort_by_key(|(delivery, _)| *delivery);
        due.into_iter().map(|(_, packet)| packet).collect()
    }

    /// Returns number of packets currently in flight.
    pub fn in_flight(&self) -> usize {
        // ---
        self.in_flight.len()
    }

    /// Returns simulator statistics.
    pub fn stats(&self) -> NetworkSimulatorStats {
        // ---
        NetworkSimulatorStats {
            packets_sent: self.packets_sent,
            packets_lost: self.packets_lost,
            packets_duplicated: self.packets_duplicated,
            loss_rate: if self.packets_sent > 0 {
                self.packets_lost as f64 / self.packets_sent as f64
            } else {
                0.0
            },
        }
    }

    fn delay(&mut self) -> u64 {
        // ---
        if self.config.jitter_usecs == 0 {
            0
        } else {
            self.rng.gen_range(0..=self.config.jitter_usecs)
        }
    }
}

/// Network simulator statistics.
#[derive(Debug, Clone)]
pub struct NetworkSimulatorStats {
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub packets_duplicated: u64,
    pub loss_rate: f64,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use receiver::PacketType;

    fn make_packet(seq: u16) -> StreamPacket {
        StreamPacket::new(PacketType::AudioStream, seq, vec![1, 2, 3, 4])
    }

    #[test]
    fn test_no_loss_no_delay() {
        // ---
        let mut sim = NetworkSimulator::new(NetworkSimulatorConfig::default());

        sim.send(make_packet(0), 0);
        sim.send(make_packet(1), 0);

        let delivered = sim.receive_due(0);
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].sequence, 0);
        assert_eq!(delivered[1].sequence, 1);

        let stats = sim.stats();
        assert_eq!(stats.packets_lost, 0);
        assert_eq!(stats.loss_rate, 0.0);
    }

    #[test]
    fn test_packet_loss() {
        // ---
        let config = NetworkSimulatorConfig {
            loss_rate: 1.0, // 100% loss
            ..Default::default()
        };
        let mut sim = NetworkSimulator::new(config);

        for i in 0..10 {
            sim.send(make_packet(i), 0);
        }

        assert!(sim.receive_due(u64::MAX).is_empty());

        let stats = sim.stats();
        assert_eq!(stats.packets_lost, 10);
        assert_eq!(stats.loss_rate, 1.0);
    }

    #[test]
    fn test_jitter_delays_delivery() {
        // ---
        let config = NetworkSimulatorConfig {
            jitter_usecs: 50_000,
            ..Default::default()
        };
        let mut sim = NetworkSimulator::new(config);

        for i in 0..20 {
            sim.send(make_packet(i), 0);
        }

        // Everything arrives by the jitter bound, not necessarily at zero.
        let immediate = sim.receive_due(0).len();
        let eventual = sim.receive_due(50_000).len();

        assert_eq!(immediate + eventual, 20);
        assert!(eventual > 0);
    }

    #[test]
    fn test_duplication() {
        // ---
        let config = NetworkSimulatorConfig {
            duplicate_rate: 1.0,
            ..Default::default()
        };
        let mut sim = NetworkSimulator::new(config);

        sim.send(make_packet(7), 0);

        let delivered = sim.receive_due(u64::MAX);
        assert_eq!(delivered.len(), 2);
        assert_eq!(sim.stats().packets_duplicated, 1);
    }

    #[test]
    fn test_deterministic_with_seed() {
        // ---
        let config = NetworkSimulatorConfig {
            loss_rate: 0.5,
            ..Default::default()
        };

        let mut sim1 = NetworkSimulator::new(config.clone());
        let mut sim2 = NetworkSimulator::new(config);

        for i in 0..100 {
            sim1.send(make_packet(i), 0);
            sim2.send(make_packet(i), 0);
        }

        // Same seed should give same results
        assert_eq!(sim1.stats().packets_lost, sim2.stats().packets_lost);
    }
}
