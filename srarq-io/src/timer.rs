//! Retransmission scheduling
//!
//! A single [`RetransmissionScheduler`] thread owns the deadline of every
//! in-flight segment. Scheduling a segment transmits it right away and then
//! once per retransmission interval until the segment is cancelled.
//!
//! Deadlines sit in a min-heap. The thread sleeps on a wake channel with
//! `recv_deadline` until the earliest deadline or until new work arrives.
//! Cancelled entries are dropped lazily when their deadline surfaces.
//!
//! Transmissions happen while the scheduler lock is held, so once
//! [`RetransmissionScheduler::cancel`] returns the segment is never sent again.
//! Transmit failures are logged and retried at the next deadline.

use crate::transport::DatagramTransport;
use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How the interval between transmissions evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetransmitPolicy {
    /// Same interval for the life of the timer
    Fixed(Duration),
    /// Interval doubles after every transmission, capped at `max`
    Backoff { initial: Duration, max: Duration },
}

impl RetransmitPolicy {
    /// Interval before the first retransmission
    pub fn initial(&self) -> Duration {
        match *self {
            RetransmitPolicy::Fixed(interval) => interval,
            RetransmitPolicy::Backoff { initial, .. } => initial,
        }
    }

    /// Sequence of waits one timer goes through
    pub fn schedule(&self) -> IntervalSchedule {
        IntervalSchedule {
            policy: *self,
            current: self.initial(),
        }
    }
}

/// Successive waits produced by a [`RetransmitPolicy`]
#[derive(Debug, Clone)]
pub struct IntervalSchedule {
    policy: RetransmitPolicy,
    current: Duration,
}

impl IntervalSchedule {
    /// Wait before the next transmission
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.current;
        if let RetransmitPolicy::Backoff { max, .. } = self.policy {
            self.current = (self.current * 2).min(max);
        }
        interval
    }
}

/// Transmission counters for one transfer, updated by the scheduler
#[derive(Debug, Default)]
pub struct TransmitCounters {
    datagrams_sent: AtomicU64,
    retransmissions: AtomicU64,
    bytes_sent: AtomicU64,
    transmit_failures: AtomicU64,
}

impl TransmitCounters {
    fn record_sent(&self, bytes: usize, retransmission: bool) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        if retransmission {
            self.retransmissions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_failure(&self) {
        self.transmit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Datagrams handed to the transport successfully
    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent.load(Ordering::Relaxed)
    }

    /// Successful transmissions after a segment's first
    pub fn retransmissions(&self) -> u64 {
        self.retransmissions.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn transmit_failures(&self) -> u64 {
        self.transmit_failures.load(Ordering::Relaxed)
    }
}

struct Entry {
    datagram: Bytes,
    schedule: IntervalSchedule,
    attempts: u64,
    generation: u64,
}

#[derive(Default)]
struct SchedulerState {
    entries: HashMap<u16, Entry>,
    /// (deadline, seq, generation); stale generations are skipped
    deadlines: BinaryHeap<Reverse<(Instant, u16, u64)>>,
    next_generation: u64,
    shutdown: bool,
}

struct Shared<T: ?Sized> {
    state: Mutex<SchedulerState>,
    transport: Arc<T>,
    policy: RetransmitPolicy,
    counters: Arc<TransmitCounters>,
}

impl<T: DatagramTransport + ?Sized> Shared<T> {
    /// Transmit every entry whose deadline has passed and re-arm it
    ///
    /// Returns the earliest remaining deadline.
    fn fire_due(&self, state: &mut SchedulerState, now: Instant) -> Option<Instant> {
        let SchedulerState {
            entries, deadlines, ..
        } = state;

        while let Some(&Reverse((deadline, seq, generation))) = deadlines.peek() {
            if deadline > now {
                return Some(deadline);
            }
            deadlines.pop();

            let entry = match entries.get_mut(&seq) {
                Some(entry) if entry.generation == generation => entry,
                _ => continue,
            };

            match self.transport.send(&entry.datagram) {
                Ok(_) => {
                    self.counters
                        .record_sent(entry.datagram.len(), entry.attempts > 0);
                    if entry.attempts > 0 {
                        tracing::debug!(seq, attempt = entry.attempts, "retransmitted segment");
                    } else {
                        tracing::trace!(seq, "transmitted segment");
                    }
                }
                Err(e) => {
                    self.counters.record_failure();
                    tracing::warn!(seq, error = %e, "transmit failed, retrying next interval");
                }
            }
            entry.attempts += 1;

            let next = now + entry.schedule.next_interval();
            deadlines.push(Reverse((next, seq, generation)));
        }

        None
    }
}

/// One thread retransmitting every in-flight segment of a transfer
pub struct RetransmissionScheduler<T: DatagramTransport + ?Sized + 'static> {
    shared: Arc<Shared<T>>,
    wake_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl<T: DatagramTransport + ?Sized + 'static> RetransmissionScheduler<T> {
    /// Spawn the scheduler thread
    pub fn start(
        transport: Arc<T>,
        policy: RetransmitPolicy,
        counters: Arc<TransmitCounters>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState::default()),
            transport,
            policy,
            counters,
        });
        let (wake_tx, wake_rx) = channel::bounded::<()>(1);

        let worker = shared.clone();
        let thread = thread::Builder::new()
            .name("rexmit-scheduler".to_string())
            .spawn(move || run(&worker, &wake_rx))?;

        Ok(RetransmissionScheduler {
            shared,
            wake_tx,
            thread: Some(thread),
        })
    }

    /// Transmit `datagram` now and every interval until `seq` is cancelled
    ///
    /// Scheduling a sequence number that is already active replaces it.
    pub fn schedule(&self, seq: u16, datagram: Bytes) {
        {
            let mut state = self.shared.state.lock();
            let generation = state.next_generation;
            state.next_generation += 1;
            state.entries.insert(
                seq,
                Entry {
                    datagram,
                    schedule: self.shared.policy.schedule(),
                    attempts: 0,
                    generation,
                },
            );
            state
                .deadlines
                .push(Reverse((Instant::now(), seq, generation)));
        }
        self.wake();
    }

    /// Stop retransmitting `seq`; returns whether it was active
    pub fn cancel(&self, seq: u16) -> bool {
        self.shared.state.lock().entries.remove(&seq).is_some()
    }

    /// Stop retransmitting everything
    pub fn cancel_all(&self) {
        let mut state = self.shared.state.lock();
        state.entries.clear();
        state.deadlines.clear();
    }

    pub fn is_active(&self, seq: u16) -> bool {
        self.shared.state.lock().entries.contains_key(&seq)
    }

    /// Active sequence numbers in ascending order
    pub fn active(&self) -> Vec<u16> {
        let mut seqs: Vec<u16> = self.shared.state.lock().entries.keys().copied().collect();
        seqs.sort_unstable();
        seqs
    }

    fn wake(&self) {
        // A full channel already holds a pending wake-up.
        let _ = self.wake_tx.try_send(());
    }
}

impl<T: DatagramTransport + ?Sized + 'static> Drop for RetransmissionScheduler<T> {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.wake();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("retransmission scheduler panicked");
            }
        }
    }
}

fn run<T: DatagramTransport + ?Sized>(shared: &Shared<T>, wake_rx: &Receiver<()>) {
    loop {
        let next = {
            let mut state = shared.state.lock();
            if state.shutdown {
                break;
            }
            shared.fire_due(&mut state, Instant::now())
        };

        let woke = match next {
            Some(deadline) => wake_rx.recv_deadline(deadline),
            None => wake_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        if let Err(RecvTimeoutError::Disconnected) = woke {
            break;
        }
    }

    tracing::trace!("retransmission scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::SocketError;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn count(&self) -> usize {
            self.sent.lock().len()
        }

        fn count_of(&self, seq: u8) -> usize {
            self.sent.lock().iter().filter(|d| d[1] == seq).count()
        }
    }

    impl DatagramTransport for RecordingTransport {
        fn send(&self, datagram: &[u8]) -> Result<usize, SocketError> {
            self.sent.lock().push(datagram.to_vec());
            if self.fail {
                Err(SocketError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "network unreachable",
                )))
            } else {
                Ok(datagram.len())
            }
        }

        fn recv(&self, _buf: &mut [u8]) -> Result<Option<usize>, SocketError> {
            Ok(None)
        }
    }

    fn scheduler(
        transport: &Arc<RecordingTransport>,
        policy: RetransmitPolicy,
    ) -> (
        RetransmissionScheduler<RecordingTransport>,
        Arc<TransmitCounters>,
    ) {
        let counters = Arc::new(TransmitCounters::default());
        let scheduler =
            RetransmissionScheduler::start(transport.clone(), policy, counters.clone()).unwrap();
        (scheduler, counters)
    }

    fn datagram(seq: u8) -> Bytes {
        Bytes::from(vec![0, seq, 0xAA])
    }

    fn wait_until(timeout: Duration, pred: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        pred()
    }

    #[test]
    fn test_fixed_schedule() {
        let mut schedule = RetransmitPolicy::Fixed(Duration::from_millis(50)).schedule();
        for _ in 0..5 {
            assert_eq!(schedule.next_interval(), Duration::from_millis(50));
        }
    }

    #[test]
    fn test_backoff_schedule_caps() {
        let mut schedule = RetransmitPolicy::Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
        }
        .schedule();

        let waits: Vec<u64> = (0..4)
            .map(|_| schedule.next_interval().as_millis() as u64)
            .collect();
        assert_eq!(waits, vec![100, 200, 350, 350]);
    }

    #[test]
    fn test_transmits_immediately_and_repeats() {
        let transport = Arc::new(RecordingTransport::default());
        let (scheduler, counters) =
            scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_millis(10)));

        scheduler.schedule(1, datagram(1));
        thread::sleep(Duration::from_millis(100));
        assert!(scheduler.cancel(1));

        assert!(transport.count() >= 3);
        assert_eq!(counters.datagrams_sent() as usize, transport.count());
        assert_eq!(counters.retransmissions(), counters.datagrams_sent() - 1);
        assert!(transport.sent.lock().iter().all(|d| d == &[0, 1, 0xAA]));
    }

    #[test]
    fn test_first_transmission_is_prompt() {
        let transport = Arc::new(RecordingTransport::default());
        let (scheduler, _) = scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_secs(30)));

        scheduler.schedule(1, datagram(1));
        scheduler.schedule(2, datagram(2));
        assert!(wait_until(Duration::from_secs(1), || transport.count() == 2));
        assert_eq!(scheduler.active(), vec![1, 2]);
    }

    #[test]
    fn test_no_transmission_after_cancel() {
        let transport = Arc::new(RecordingTransport::default());
        let (scheduler, _) = scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_millis(1)));

        scheduler.schedule(1, datagram(1));
        scheduler.schedule(2, datagram(2));
        thread::sleep(Duration::from_millis(20));

        assert!(scheduler.cancel(1));
        assert!(!scheduler.cancel(1));
        let at_cancel = transport.count_of(1);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(transport.count_of(1), at_cancel);
        assert!(transport.count_of(2) > at_cancel);
        assert!(!scheduler.is_active(1));
        assert!(scheduler.is_active(2));
    }

    #[test]
    fn test_independent_intervals() {
        let transport = Arc::new(RecordingTransport::default());
        let (scheduler, _) =
            scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_millis(15)));

        scheduler.schedule(1, datagram(1));
        thread::sleep(Duration::from_millis(50));
        scheduler.schedule(2, datagram(2));
        thread::sleep(Duration::from_millis(50));
        scheduler.cancel_all();

        assert!(transport.count_of(1) > transport.count_of(2));
        assert!(transport.count_of(2) >= 2);
        assert!(scheduler.active().is_empty());
    }

    #[test]
    fn test_transmit_failures_do_not_stop_retransmission() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let (scheduler, counters) =
            scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_millis(5)));

        scheduler.schedule(1, datagram(1));
        thread::sleep(Duration::from_millis(60));
        scheduler.cancel(1);

        assert!(transport.count() >= 2);
        assert_eq!(counters.datagrams_sent(), 0);
        assert_eq!(counters.transmit_failures() as usize, transport.count());
    }

    #[test]
    fn test_many_segments_share_one_thread() {
        let transport = Arc::new(RecordingTransport::default());
        let (scheduler, counters) =
            scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_secs(60)));

        for seq in 1..=40_000u16 {
            scheduler.schedule(seq, Bytes::from_static(&[0, 0, 0x55]));
        }
        assert!(wait_until(Duration::from_secs(10), || {
            counters.datagrams_sent() == 40_000
        }));
        assert_eq!(scheduler.active().len(), 40_000);

        scheduler.cancel_all();
        assert!(scheduler.active().is_empty());
    }

    #[test]
    fn test_drop_stops_transmission() {
        let transport = Arc::new(RecordingTransport::default());
        let (scheduler, _) = scheduler(&transport, RetransmitPolicy::Fixed(Duration::from_millis(1)));
        scheduler.schedule(1, datagram(1));
        thread::sleep(Duration::from_millis(10));
        drop(scheduler);

        let at_drop = transport.count();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(transport.count(), at_drop);
    }
}
