//! Sender engine
//!
//! [`ArqSender`] wires a [`WindowController`] to an [`AckListener`] and runs
//! one transfer to completion on the calling thread.

use crate::controller::WindowController;
use crate::error::EngineError;
use crate::listener::AckListener;
use crate::stats::TransferStats;
use srarq_io::{DatagramTransport, RetransmitPolicy};
use srarq_protocol::{Segment, Segmenter};
use std::num::NonZeroU16;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Protocol parameters for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderOptions {
    /// Maximum number of segments in flight (N)
    pub window_size: NonZeroU16,
    /// Retransmission interval policy
    pub policy: RetransmitPolicy,
}

/// Selective-Repeat sender bound to one transport
pub struct ArqSender<T: DatagramTransport + ?Sized + 'static> {
    transport: Arc<T>,
    options: SenderOptions,
}

impl<T: DatagramTransport + ?Sized + 'static> ArqSender<T> {
    pub fn new(transport: Arc<T>, options: SenderOptions) -> Self {
        ArqSender { transport, options }
    }

    /// Read and segment `path`, then transfer it
    ///
    /// A read failure aborts before anything is transmitted.
    pub fn send_file<P: AsRef<Path>>(
        &self,
        path: P,
        segmenter: &Segmenter,
    ) -> Result<TransferStats, EngineError> {
        let segments = segmenter.read_file(path)?;
        self.run(segments)
    }

    /// Transfer `segments` and block until the termination marker is sent
    ///
    /// User-facing start and completion notices are left to the caller; the
    /// engine itself logs at `debug` and below unless something goes wrong.
    ///
    /// A receiver that never acknowledges keeps this running forever; there is
    /// no retry limit.
    pub fn run(&self, segments: Vec<Segment>) -> Result<TransferStats, EngineError> {
        let started = Instant::now();
        let count = segments.len();

        let controller = WindowController::new(
            segments,
            self.options.window_size,
            self.transport.clone(),
            self.options.policy,
        )?;

        tracing::debug!(
            segments = count,
            window = self.options.window_size.get(),
            rto_ms = self.options.policy.initial().as_millis() as u64,
            "transfer starting"
        );

        controller.start();
        AckListener::new(&controller, self.transport.clone()).run()?;

        let stats = controller.stats(started.elapsed());
        tracing::debug!(
            datagrams = stats.datagrams_sent,
            retransmissions = stats.retransmissions,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "transfer finished"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ScriptedTransport;
    use bytes::Bytes;
    use std::time::Duration;

    fn options(window: u16, rto_ms: u64) -> SenderOptions {
        SenderOptions {
            window_size: NonZeroU16::new(window).unwrap(),
            policy: RetransmitPolicy::Fixed(Duration::from_millis(rto_ms)),
        }
    }

    #[test]
    fn test_transfer_with_losses() {
        // Lose the first copy of every third segment
        let transport = Arc::new(ScriptedTransport::auto_ack(|seq| seq % 3 == 0));
        let sender = ArqSender::new(transport.clone(), options(4, 5));

        let segments = Segmenter::new(100)
            .unwrap()
            .segment(Bytes::from(vec![1u8; 2_550]))
            .unwrap();
        let stats = sender.run(segments).unwrap();

        assert_eq!(stats.segments, 26);
        assert_eq!(stats.payload_bytes, 2_550);
        assert!(stats.termination_sent);
        assert!(stats.retransmissions >= 8);
        assert_eq!(transport.markers(), 1);

        let mut delivered = transport.data_seqs();
        delivered.sort();
        delivered.dedup();
        assert_eq!(delivered, (1..=26).collect::<Vec<u16>>());
    }

    #[test]
    fn test_empty_transfer() {
        let transport = Arc::new(ScriptedTransport::auto_ack(|_| false));
        let stats = ArqSender::new(transport.clone(), options(2, 5))
            .run(Vec::new())
            .unwrap();

        assert_eq!(stats.segments, 0);
        assert_eq!(stats.datagrams_sent, 0);
        assert!(stats.termination_sent);
        assert_eq!(transport.markers(), 1);
    }

    #[test]
    fn test_send_file_missing_source_transmits_nothing() {
        let transport = Arc::new(ScriptedTransport::auto_ack(|_| false));
        let result = ArqSender::new(transport.clone(), options(2, 5))
            .send_file("/no/such/source.bin", &Segmenter::default());

        assert!(matches!(result, Err(EngineError::Segment(_))));
        assert_eq!(transport.sent_count(), 0);
    }

    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<parking_lot::Mutex<Vec<tracing::Level>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LevelRecorder {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().push(*event.metadata().level());
        }
    }

    #[test]
    fn test_clean_transfer_logs_below_info() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());

        let transport = Arc::new(ScriptedTransport::auto_ack(|_| false));
        let segments = Segmenter::default()
            .segment(Bytes::from(vec![3u8; 5_000]))
            .unwrap();
        let stats = tracing::subscriber::with_default(subscriber, || {
            ArqSender::new(transport.clone(), options(2, 50))
                .run(segments)
                .unwrap()
        });

        assert!(stats.termination_sent);
        let levels = recorder.0.lock();
        assert!(!levels.is_empty());
        assert!(levels
            .iter()
            .all(|l| *l == tracing::Level::DEBUG || *l == tracing::Level::TRACE));
    }
}
