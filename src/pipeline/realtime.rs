//! Periodic frame pump
//!
//! Drains the capture buffer on a tokio task and broadcasts the decoded
//! frames to subscribers.

use crate::audio::CaptureBuffer;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interval between two drains (ms)
    pub drain_interval_ms: u64,
    /// Batches kept for slow subscribers
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 50,
            channel_capacity: 64,
        }
    }
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline already running")]
    AlreadyRunning,
}

/// Pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Stopped,
    Running,
}

/// Frames decoded by one drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBatch {
    /// Increases by one per batch, starting at 0
    pub sequence: u64,
    pub frames: Vec<i32>,
}

struct Worker {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<u64>,
}

/// Drains a capture buffer in the background
pub struct FramePipeline {
    config: PipelineConfig,
    buffer: CaptureBuffer,
    status: Arc<RwLock<PipelineStatus>>,
    event_tx: broadcast::Sender<FrameBatch>,
    worker: Option<Worker>,
    next_sequence: u64,
}

impl FramePipeline {
    pub fn new(buffer: CaptureBuffer, config: PipelineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            buffer,
            status: Arc::new(RwLock::new(PipelineStatus::Stopped)),
            event_tx,
            worker: None,
            next_sequence: 0,
        }
    }

    /// Spawns the drain task on the current tokio runtime
    pub async fn start(&mut self) -> Result<(), PipelineError> {
        {
            let mut status = self.status.write().await;
            if *status == PipelineStatus::Running {
                return Err(PipelineError::AlreadyRunning);
            }
            *status = PipelineStatus::Running;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let buffer = self.buffer.clone();
        let event_tx = self.event_tx.clone();
        let mut sequence = self.next_sequence;
        let period = Duration::from_millis(self.config.drain_interval_ms.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let frames = buffer.drain_frames();
                        if frames.is_empty() {
                            continue;
                        }
                        tracing::trace!(sequence, frames = frames.len(), "Frames drained");
                        // No subscriber is not an error, the frames are just dropped.
                        let _ = event_tx.send(FrameBatch { sequence, frames });
                        sequence += 1;
                    }
                }
            }

            sequence
        });

        self.worker = Some(Worker { stop_tx, task });
        tracing::info!(interval_ms = self.config.drain_interval_ms, "Pipeline started");
        Ok(())
    }

    /// Stops the drain task and publishes whatever is still buffered
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.stop_tx.send(());
        match worker.task.await {
            Ok(sequence) => self.next_sequence = sequence,
            Err(e) => tracing::error!("Pipeline task failed: {}", e),
        }

        let frames = self.buffer.drain_frames();
        if !frames.is_empty() {
            let _ = self.event_tx.send(FrameBatch {
                sequence: self.next_sequence,
                frames,
            });
            self.next_sequence += 1;
        }

        *self.status.write().await = PipelineStatus::Stopped;
        tracing::info!("Pipeline stopped");
    }

    /// Current pipeline status
    pub async fn status(&self) -> PipelineStatus {
        *self.status.read().await
    }

    /// Subscribes to decoded frame batches
    pub fn subscribe(&self) -> broadcast::Receiver<FrameBatch> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{capture_buffer, SampleFormat};
    use tokio::time::timeout;

    fn encode(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn fast() -> PipelineConfig {
        PipelineConfig {
            drain_interval_ms: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn publishes_drained_frames() {
        let (mut producer, buffer) = capture_buffer(SampleFormat::Int32, 1024);
        let mut pipeline = FramePipeline::new(buffer, fast());
        let mut rx = pipeline.subscribe();

        producer.append(&encode(&[1, 2, 3]));
        pipeline.start().await.unwrap();
        assert_eq!(pipeline.status().await, PipelineStatus::Running);

        let batch = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no batch received")
            .unwrap();
        assert_eq!(batch, FrameBatch { sequence: 0, frames: vec![1, 2, 3] });

        pipeline.stop().await;
        assert_eq!(pipeline.status().await, PipelineStatus::Stopped);
    }

    #[tokio::test]
    async fn stop_flushes_remaining_frames() {
        let (mut producer, buffer) = capture_buffer(SampleFormat::Int32, 1024);
        let mut pipeline = FramePipeline::new(
            buffer,
            PipelineConfig {
                drain_interval_ms: 60_000,
                ..Default::default()
            },
        );
        let mut rx = pipeline.subscribe();

        pipeline.start().await.unwrap();
        // Let the immediate first tick pass on an empty buffer.
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.append(&encode(&[9, 8]));
        producer.append(&[0xFF]);
        pipeline.stop().await;

        let mut frames = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            frames.extend(batch.frames);
        }
        assert_eq!(frames, vec![9, 8]);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let (_producer, buffer) = capture_buffer(SampleFormat::Int32, 64);
        let mut pipeline = FramePipeline::new(buffer, fast());

        pipeline.start().await.unwrap();
        assert!(matches!(pipeline.start().await, Err(PipelineError::AlreadyRunning)));
        pipeline.stop().await;

        pipeline.start().await.unwrap();
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn sequence_continues_across_restarts() {
        let (mut producer, buffer) = capture_buffer(SampleFormat::Int32, 1024);
        let mut pipeline = FramePipeline::new(buffer, fast());
        let mut rx = pipeline.subscribe();

        producer.append(&encode(&[1]));
        pipeline.start().await.unwrap();
        let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        pipeline.stop().await;

        producer.append(&encode(&[2]));
        pipeline.start().await.unwrap();
        let second = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        pipeline.stop().await;

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.frames, vec![2]);
    }
}
