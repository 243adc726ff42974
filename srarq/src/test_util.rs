//! In-memory transport for engine tests

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use srarq_io::{DatagramTransport, SocketError};
use srarq_protocol::{AckPacket, Packet, SeqNumber};
use std::collections::HashSet;
use std::time::Duration;

/// Records every datagram sent and serves acknowledgments from a queue
///
/// With `auto_ack` set it behaves like a receiver: each data datagram queues
/// an acknowledgment (twice, to exercise duplicate handling), except that the
/// first transmission of every segment matching `lose_first` is dropped.
pub struct ScriptedTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    acks_tx: Sender<Vec<u8>>,
    acks_rx: Receiver<Vec<u8>>,
    auto_ack: bool,
    lose_first: fn(u16) -> bool,
    seen: Mutex<HashSet<u16>>,
}

impl ScriptedTransport {
    pub fn manual() -> Self {
        Self::build(false, |_| false)
    }

    pub fn auto_ack(lose_first: fn(u16) -> bool) -> Self {
        Self::build(true, lose_first)
    }

    fn build(auto_ack: bool, lose_first: fn(u16) -> bool) -> Self {
        let (acks_tx, acks_rx) = channel::unbounded();
        ScriptedTransport {
            sent: Mutex::new(Vec::new()),
            acks_tx,
            acks_rx,
            auto_ack,
            lose_first,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Queue an acknowledgment for the listener
    pub fn inject_ack(&self, seq: u16) {
        let _ = self
            .acks_tx
            .send(AckPacket::new(SeqNumber::new(seq)).to_bytes().to_vec());
    }

    /// Queue a raw datagram for the listener
    pub fn inject_raw(&self, datagram: &[u8]) {
        let _ = self.acks_tx.send(datagram.to_vec());
    }

    /// Sequence numbers of every data datagram sent so far, in send order
    pub fn data_seqs(&self) -> Vec<u16> {
        self.sent
            .lock()
            .iter()
            .filter_map(|d| match Packet::from_bytes(d) {
                Ok(Packet::Data(p)) => Some(p.seq.as_raw()),
                _ => None,
            })
            .collect()
    }

    /// Number of termination markers sent
    pub fn markers(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|d| matches!(Packet::from_bytes(d), Ok(Packet::Termination)))
            .count()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Wait until `pred` holds over the sent data sequence numbers
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&[u16]) -> bool) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if pred(&self.data_seqs()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        pred(&self.data_seqs())
    }
}

impl DatagramTransport for ScriptedTransport {
    fn send(&self, datagram: &[u8]) -> Result<usize, SocketError> {
        self.sent.lock().push(datagram.to_vec());

        if self.auto_ack {
            if let Ok(Packet::Data(p)) = Packet::from_bytes(datagram) {
                let seq = p.seq.as_raw();
                let first = self.seen.lock().insert(seq);
                if !(first && (self.lose_first)(seq)) {
                    self.inject_ack(seq);
                    self.inject_ack(seq);
                }
            }
        }

        Ok(datagram.len())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, SocketError> {
        match self.acks_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            Err(_) => Ok(None),
        }
    }
}
