//! Transfer statistics

use std::time::Duration;

/// Summary of one completed (or aborted) transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Segments in the transfer
    pub segments: u64,
    /// Source bytes carried by those segments
    pub payload_bytes: u64,
    /// Datagrams handed to the transport, including retransmissions
    pub datagrams_sent: u64,
    /// Transmissions after a segment's first
    pub retransmissions: u64,
    /// Bytes handed to the transport, headers included
    pub bytes_sent: u64,
    /// Transmit attempts the transport rejected
    pub transmit_failures: u64,
    /// Acknowledgment datagrams decoded
    pub acks_received: u64,
    /// Acknowledgments ignored as stale or duplicate
    pub stale_acks: u64,
    /// Whether the termination marker went out
    pub termination_sent: bool,
    /// Wall-clock duration of the transfer
    pub elapsed: Duration,
}

impl TransferStats {
    /// Payload throughput in bits per second
    pub fn goodput_bps(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            ((self.payload_bytes * 8) as f64 / secs) as u64
        } else {
            0
        }
    }

    /// Fraction of transmissions that were retransmissions
    pub fn retransmission_ratio(&self) -> f64 {
        if self.datagrams_sent == 0 {
            0.0
        } else {
            self.retransmissions as f64 / self.datagrams_sent as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goodput() {
        let stats = TransferStats {
            payload_bytes: 1_000,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.goodput_bps(), 4_000);
        assert_eq!(TransferStats::default().goodput_bps(), 0);
    }

    #[test]
    fn test_retransmission_ratio() {
        let stats = TransferStats {
            datagrams_sent: 8,
            retransmissions: 2,
            ..Default::default()
        };
        assert!((stats.retransmission_ratio() - 0.25).abs() < f64::EPSILON);
        assert_eq!(TransferStats::default().retransmission_ratio(), 0.0);
    }
}
