//! Window controller
//!
//! [`WindowController`] is the single owner of the protocol state: the send
//! window, the protocol phase and the ack counters, all behind one mutex.
//! Retransmissions are delegated to one [`RetransmissionScheduler`] whose
//! entries are added and removed while that mutex is held.
//!
//! Invariant: a sequence number is active in the scheduler exactly when it is
//! pending in the window.

use crate::error::EngineError;
use crate::stats::TransferStats;
use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use srarq_io::{DatagramTransport, RetransmissionScheduler, RetransmitPolicy, TransmitCounters};
use srarq_protocol::{AckOutcome, Segment, SendWindow, SeqNumber, TERMINATION_MARKER};
use std::num::NonZeroU16;
use std::sync::Arc;
use std::time::Duration;

/// Overall protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Segments in flight
    Running,
    /// Everything acknowledged, termination marker being sent
    Draining,
    /// Marker sent; the engine is finished
    Complete,
}

/// Point-in-time copy of the controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub send_base: SeqNumber,
    pub next_seq: u32,
    pub window_size: u16,
    pub pending: Vec<SeqNumber>,
    pub active_timers: Vec<SeqNumber>,
    pub state: ProtocolState,
}

struct ControllerState {
    window: SendWindow,
    phase: ProtocolState,
    acks_received: u64,
    stale_acks: u64,
    termination_sent: bool,
}

/// Owns the sliding window and the retransmissions of one transfer
pub struct WindowController<T: DatagramTransport + ?Sized + 'static> {
    state: Mutex<ControllerState>,
    /// Encoded datagrams, indexed by sequence number - 1
    datagrams: Vec<Bytes>,
    payload_bytes: u64,
    transport: Arc<T>,
    scheduler: RetransmissionScheduler<T>,
    counters: Arc<TransmitCounters>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl<T: DatagramTransport + ?Sized + 'static> WindowController<T> {
    /// Create a controller for `segments`, which must be numbered 1..=len in order
    pub fn new(
        segments: Vec<Segment>,
        window_size: NonZeroU16,
        transport: Arc<T>,
        policy: RetransmitPolicy,
    ) -> Result<Self, EngineError> {
        let total = u16::try_from(segments.len())
            .map_err(|_| EngineError::TooManySegments(segments.len()))?;

        for (index, segment) in segments.iter().enumerate() {
            if SeqNumber::from_index(index) != Some(segment.seq) {
                return Err(EngineError::OutOfOrderSegment {
                    index,
                    seq: segment.seq,
                });
            }
        }

        let payload_bytes = segments.iter().map(|s| s.payload.len() as u64).sum();
        let datagrams = segments.iter().map(Segment::to_datagram).collect();
        let counters = Arc::new(TransmitCounters::default());
        let scheduler = RetransmissionScheduler::start(transport.clone(), policy, counters.clone())
            .map_err(EngineError::Spawn)?;
        let (done_tx, done_rx) = channel::bounded(1);

        Ok(WindowController {
            state: Mutex::new(ControllerState {
                window: SendWindow::new(window_size, total),
                phase: ProtocolState::Running,
                acks_received: 0,
                stale_acks: 0,
                termination_sent: false,
            }),
            datagrams,
            payload_bytes,
            transport,
            scheduler,
            counters,
            done_tx,
            done_rx,
        })
    }

    /// Admit the first window of segments
    ///
    /// An empty transfer is already complete: the termination marker goes out
    /// straight away.
    pub fn start(&self) {
        let drained = {
            let mut state = self.state.lock();
            if state.phase != ProtocolState::Running {
                return;
            }
            self.admit_locked(&mut state);
            if state.window.is_drained() {
                state.phase = ProtocolState::Draining;
                true
            } else {
                false
            }
        };

        if drained {
            self.finish();
        }
    }

    /// Admit every segment that fits in the window and schedule it
    ///
    /// Returns how many segments were admitted; zero when the window is full,
    /// nothing is left, or the protocol has stopped running.
    pub fn admit(&self) -> usize {
        let mut state = self.state.lock();
        self.admit_locked(&mut state)
    }

    fn admit_locked(&self, state: &mut ControllerState) -> usize {
        if state.phase != ProtocolState::Running {
            return 0;
        }
        let admitted = state.window.admit();
        self.schedule(&admitted);
        admitted.len()
    }

    fn schedule(&self, seqs: &[SeqNumber]) {
        for &seq in seqs {
            // `new` checked the numbering, so every admitted seq has a datagram.
            if let Some(datagram) = seq.index().and_then(|i| self.datagrams.get(i)) {
                tracing::debug!(%seq, "segment admitted");
                self.scheduler.schedule(seq.as_raw(), datagram.clone());
            }
        }
    }

    /// Process one acknowledgment
    ///
    /// Stale and duplicate acknowledgments are ignored. Once this returns for
    /// an accepted acknowledgment, the segment is never transmitted again.
    pub fn on_ack(&self, seq: SeqNumber) -> AckOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.phase != ProtocolState::Running {
                return AckOutcome::Ignored;
            }
            state.acks_received += 1;

            let outcome = state.window.on_ack(seq);
            match &outcome {
                AckOutcome::Ignored => state.stale_acks += 1,
                AckOutcome::Acknowledged { admitted } => {
                    self.scheduler.cancel(seq.as_raw());
                    self.schedule(admitted);
                }
                AckOutcome::Drained => {
                    self.scheduler.cancel(seq.as_raw());
                    state.phase = ProtocolState::Draining;
                }
            }
            outcome
        };

        match &outcome {
            AckOutcome::Ignored => tracing::debug!(%seq, "ignoring stale acknowledgment"),
            AckOutcome::Acknowledged { admitted } => {
                tracing::debug!(%seq, admitted = admitted.len(), "segment acknowledged")
            }
            AckOutcome::Drained => {
                tracing::debug!(%seq, "last segment acknowledged");
                self.finish();
            }
        }

        outcome
    }

    /// Send the termination marker once and mark the protocol complete
    fn finish(&self) {
        // Nothing should remain, but never retransmit past the end.
        self.scheduler.cancel_all();

        // Fire-and-forget: the receiver never confirms the marker.
        let sent = match self.transport.send(&TERMINATION_MARKER) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to send termination marker");
                false
            }
        };

        {
            let mut state = self.state.lock();
            state.termination_sent = sent;
            state.phase = ProtocolState::Complete;
        }
        let _ = self.done_tx.try_send(());
        tracing::debug!("protocol complete");
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.state.lock().phase
    }

    pub fn is_complete(&self) -> bool {
        self.protocol_state() == ProtocolState::Complete
    }

    /// Block until the protocol completes or `timeout` elapses
    pub fn wait_complete(&self, timeout: Duration) -> bool {
        self.is_complete() || self.done_rx.recv_timeout(timeout).is_ok()
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let state = self.state.lock();
        WindowSnapshot {
            send_base: state.window.send_base(),
            next_seq: state.window.next_seq(),
            window_size: state.window.size(),
            pending: state.window.pending().collect(),
            active_timers: self
                .scheduler
                .active()
                .into_iter()
                .map(SeqNumber::new)
                .collect(),
            state: state.phase,
        }
    }

    /// Statistics so far; `elapsed` is supplied by the caller
    pub fn stats(&self, elapsed: Duration) -> TransferStats {
        let state = self.state.lock();
        TransferStats {
            segments: self.datagrams.len() as u64,
            payload_bytes: self.payload_bytes,
            datagrams_sent: self.counters.datagrams_sent(),
            retransmissions: self.counters.retransmissions(),
            bytes_sent: self.counters.bytes_sent(),
            transmit_failures: self.counters.transmit_failures(),
            acks_received: state.acks_received,
            stale_acks: state.stale_acks,
            termination_sent: state.termination_sent,
            elapsed,
        }
    }
}
