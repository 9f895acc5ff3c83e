//! Capture buffer between the audio callback and the application
//!
//! The producer half lives inside the stream callback and only appends raw
//! bytes into a lock-free SPSC ring. The consumer half pops whole samples
//! out of the ring and decodes them; a trailing partial sample stays in the
//! ring until the rest of its bytes arrive.
//!
//! The ring capacity is a multiple of the sample size and the consumer only
//! ever pops whole samples, so the vacant space always ends on a sample
//! boundary. On overrun the producer fills that space and then drops input up
//! to the next boundary: only whole samples are ever lost.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::format::SampleFormat;

/// Creates a connected producer/consumer pair.
///
/// `capacity` is the number of bytes the ring can hold before the producer
/// starts dropping samples. It is rounded up to a whole number of samples.
pub fn capture_buffer(format: SampleFormat, capacity: usize) -> (CaptureProducer, CaptureBuffer) {
    let sample_size = format.sample_size();
    let capacity = capacity.max(1).div_ceil(sample_size) * sample_size;

    let rb = HeapRb::<u8>::new(capacity);
    let (producer, consumer) = rb.split();
    let overruns = Arc::new(AtomicUsize::new(0));

    let producer = CaptureProducer {
        producer,
        sample_size,
        skip: 0,
        overruns: Arc::clone(&overruns),
    };
    let buffer = CaptureBuffer {
        inner: Arc::new(Mutex::new(Inner {
            consumer,
            reported_overruns: 0,
        })),
        overruns,
        format,
    };

    (producer, buffer)
}

/// Producer half, owned by the audio callback.
pub struct CaptureProducer {
    producer: HeapProd<u8>,
    sample_size: usize,
    /// Input bytes still to discard to reach the end of a dropped sample
    skip: usize,
    overruns: Arc<AtomicUsize>,
}

impl CaptureProducer {
    /// Appends raw bytes without blocking or allocating.
    ///
    /// Returns how many bytes were stored. When the ring is full, whole
    /// samples are dropped and counted as overruns.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let mut input = bytes;
        if self.skip > 0 {
            let skipped = self.skip.min(input.len());
            self.skip -= skipped;
            input = &input[skipped..];
        }

        // The consumer only frees space, so `take` always fits.
        let take = input.len().min(self.producer.vacant_len());
        let written = self.producer.push_slice(&input[..take]);

        let dropped = input.len() - written;
        if dropped > 0 {
            // `written` ended on a sample boundary; finish dropping the
            // sample that `input` stops in the middle of.
            let partial = dropped % self.sample_size;
            if partial != 0 {
                self.skip = self.sample_size - partial;
            }
            self.overruns
                .fetch_add(dropped + self.skip, Ordering::Relaxed);
        }
        written
    }
}

struct Inner {
    consumer: HeapCons<u8>,
    reported_overruns: usize,
}

/// Consumer half. Cheap to clone; every clone drains the same stream.
#[derive(Clone)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Inner>>,
    overruns: Arc<AtomicUsize>,
    format: SampleFormat,
}

impl CaptureBuffer {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The guarded state stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decodes and removes every complete sample received so far.
    ///
    /// Frames are returned in arrival order. An incomplete trailing sample is
    /// kept and completed by the bytes of a later append.
    pub fn drain_frames(&self) -> Vec<i32> {
        let sample_size = self.format.sample_size();

        let (bytes, dropped) = {
            let mut inner = self.lock();

            let complete = inner.consumer.occupied_len() / sample_size * sample_size;
            let mut bytes = vec![0u8; complete];
            let read = inner.consumer.pop_slice(&mut bytes);
            debug_assert_eq!(read, complete);

            let total = self.overruns.load(Ordering::Relaxed);
            let dropped = total - inner.reported_overruns;
            inner.reported_overruns = total;

            (bytes, dropped)
        };

        if dropped > 0 {
            tracing::warn!(dropped, "Capture buffer full, audio samples were dropped");
        }

        self.format.decode_all(&bytes)
    }

    /// Number of bytes waiting to be drained, including a partial sample.
    pub fn buffered_bytes(&self) -> usize {
        self.lock().consumer.occupied_len()
    }

    /// Total bytes the producer had to drop because the ring was full.
    ///
    /// Always a whole number of samples once the dropped sample's remaining
    /// bytes have been appended.
    pub fn overrun_bytes(&self) -> usize {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Sample encoding used for decoding
    pub fn format(&self) -> SampleFormat {
        self.format
    }
}
