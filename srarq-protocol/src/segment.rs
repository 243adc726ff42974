//! Segmentation of the source byte stream
//!
//! The whole source is read up front and cut into numbered segments. Payloads
//! are zero-copy slices of the source buffer.

use crate::packet::{DataPacket, MAX_PAYLOAD_SIZE};
use crate::sequence::{SeqNumber, MAX_SEGMENTS};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Segmentation errors
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid payload size {size} (must be 1..={max})")]
    InvalidPayloadSize { size: usize, max: usize },

    #[error("Input needs {needed} segments, sequence space holds {max}")]
    SequenceSpaceExhausted { needed: usize, max: usize },
}

/// One numbered chunk of the source stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seq: SeqNumber,
    pub payload: Bytes,
}

impl Segment {
    /// Wire-encoded datagram for this segment
    pub fn to_datagram(&self) -> Bytes {
        DataPacket::new(self.seq, self.payload.clone())
            .to_bytes()
            .freeze()
    }
}

/// Splits byte streams into segments of at most `max_payload` bytes
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    max_payload: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Segmenter {
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

impl Segmenter {
    pub fn new(max_payload: usize) -> Result<Self, SegmentError> {
        if max_payload == 0 || max_payload > MAX_PAYLOAD_SIZE {
            return Err(SegmentError::InvalidPayloadSize {
                size: max_payload,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Segmenter { max_payload })
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Number of segments `len` bytes produce
    pub fn segment_count(&self, len: usize) -> usize {
        (len + self.max_payload - 1) / self.max_payload
    }

    /// Split `data` into segments numbered from 1
    ///
    /// Empty input produces no segments. Every segment but the last carries
    /// exactly `max_payload` bytes; the last one is never empty.
    pub fn segment(&self, data: Bytes) -> Result<Vec<Segment>, SegmentError> {
        let needed = self.segment_count(data.len());
        if needed > MAX_SEGMENTS {
            return Err(SegmentError::SequenceSpaceExhausted {
                needed,
                max: MAX_SEGMENTS,
            });
        }

        let mut segments = Vec::with_capacity(needed);
        for index in 0..needed {
            let start = index * self.max_payload;
            let end = (start + self.max_payload).min(data.len());
            let seq = SeqNumber::from_index(index).ok_or(
                SegmentError::SequenceSpaceExhausted {
                    needed,
                    max: MAX_SEGMENTS,
                },
            )?;
            segments.push(Segment {
                seq,
                payload: data.slice(start..end),
            });
        }

        tracing::debug!(
            bytes = data.len(),
            segments = segments.len(),
            max_payload = self.max_payload,
            "segmented source"
        );

        Ok(segments)
    }

    /// Read a stream to its end, then segment it
    pub fn read_from<R: Read>(&self, mut reader: R) -> Result<Vec<Segment>, SegmentError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.segment(Bytes::from(buf))
    }

    /// Read and segment a file
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Segment>, SegmentError> {
        let file = File::open(path)?;
        self.read_from(file)
    }
}
