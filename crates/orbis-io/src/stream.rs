//! Realtime rendering between a capture and a playback stream.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use orbis_core::{AudioSignalFlow, CallbackResult};
use parking_lot::Mutex;

use crate::backend::{AudioBackend, StreamGuard, StreamRequest};
use crate::block::BlockAdapter;
use crate::Result;

/// Bounded FIFO of interleaved samples from the capture callback to the
/// playback callback.
///
/// Both sides use `try_lock`; a contended or full queue drops samples
/// instead of blocking the audio thread.
#[derive(Debug, Clone)]
pub struct CaptureQueue {
    samples: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl CaptureQueue {
    /// Creates a queue holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends as many samples as fit; returns the number dropped.
    pub fn push(&self, data: &[f32]) -> usize {
        let Some(mut queue) = self.samples.try_lock() else {
            return data.len();
        };
        let room = self.capacity - queue.len();
        let taken = data.len().min(room);
        queue.extend(&data[..taken]);
        data.len() - taken
    }

    /// Fills `out` from the front of the queue; missing samples are zero.
    /// Returns the number of samples actually read.
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        let Some(mut queue) = self.samples.try_lock() else {
            out.fill(0.0);
            return 0;
        };
        let available = queue.len().min(out.len());
        for (o, s) in out.iter_mut().zip(queue.drain(..available)) {
            *o = s;
        }
        out[available..].fill(0.0);
        available
    }

    /// Samples currently queued.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether no samples are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters updated by the playback callback.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Chunks passed through the block adapter.
    pub callbacks: AtomicU64,
    /// Callbacks in which a component failed and silence was played.
    pub silenced: AtomicU64,
    /// Callbacks rejected because of a buffer shape mismatch.
    pub aborted: AtomicU64,
    /// Capture samples missing when the playback side needed them.
    pub underruns: AtomicU64,
    /// Capture samples dropped because the queue was full or busy.
    pub overruns: AtomicU64,
}

impl StreamStats {
    fn count(&self, result: CallbackResult) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        match result {
            CallbackResult::Continue => {}
            CallbackResult::Silenced => {
                self.silenced.fetch_add(1, Ordering::Relaxed);
            }
            CallbackResult::Abort => {
                self.aborted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Device selection and buffer size of a [`DuplexStream`].
#[derive(Debug, Clone, Default)]
pub struct DuplexConfig {
    /// Capture device name filter; default device if `None`.
    pub input_device: Option<String>,
    /// Playback device name filter; default device if `None`.
    pub output_device: Option<String>,
    /// Hardware buffer size in frames; the flow period if `None`.
    pub buffer_size: Option<u32>,
}

/// Maximum callback frames handled per adapter call.
const CHUNK_PERIODS: usize = 4;

/// A signal flow running on a playback stream, fed by a capture stream.
///
/// Dropping the stream stops both callbacks.
pub struct DuplexStream {
    stats: Arc<StreamStats>,
    _capture: Option<StreamGuard>,
    _playback: StreamGuard,
}

impl DuplexStream {
    /// Starts rendering `flow`.
    ///
    /// A flow without capture channels only opens a playback stream.
    pub fn start(
        backend: &dyn AudioBackend,
        config: &DuplexConfig,
        mut flow: AudioSignalFlow,
    ) -> Result<Self> {
        let period = flow.period();
        let capture_channels = flow.number_of_capture_channels();
        let playback_channels = flow.number_of_playback_channels();
        let sample_rate = flow.sample_rate() as u32;
        let buffer_size = config.buffer_size.unwrap_or(period as u32);
        let stats = Arc::new(StreamStats::default());

        let chunk_frames = CHUNK_PERIODS * period;
        let queue = CaptureQueue::new(2 * chunk_frames * capture_channels.max(1));

        let capture = if capture_channels > 0 {
            let queue = queue.clone();
            let input_stats = Arc::clone(&stats);
            Some(backend.open_capture(
                &StreamRequest::new(sample_rate, buffer_size, capture_channels as u16)
                    .on_device(config.input_device.clone()),
                Box::new(move |data: &[f32]| {
                    let dropped = queue.push(data);
                    if dropped > 0 {
                        input_stats.overruns.fetch_add(dropped as u64, Ordering::Relaxed);
                    }
                }),
                Box::new(|err: &str| tracing::error!("capture stream error: {err}")),
            )?)
        } else {
            None
        };

        let mut adapter = BlockAdapter::for_flow(&flow);
        let mut scratch = vec![0.0; chunk_frames * capture_channels];
        let output_stats = Arc::clone(&stats);
        let playback = backend.open_playback(
            &StreamRequest::new(sample_rate, buffer_size, playback_channels as u16)
                .on_device(config.output_device.clone()),
            Box::new(move |data: &mut [f32]| {
                for out in data.chunks_mut(chunk_frames * playback_channels.max(1)) {
                    let frames = out.len() / playback_channels.max(1);
                    let captured = &mut scratch[..frames * capture_channels];
                    let read = queue.pop_into(captured);
                    if read < captured.len() {
                        output_stats
                            .underruns
                            .fetch_add((captured.len() - read) as u64, Ordering::Relaxed);
                    }
                    let result = adapter.process_flow(&mut flow, captured, out);
                    output_stats.count(result);
                }
            }),
            Box::new(|err: &str| tracing::error!("playback stream error: {err}")),
        )?;

        tracing::info!(
            period,
            capture_channels,
            playback_channels,
            sample_rate,
            buffer_size,
            latency = period,
            "realtime rendering started"
        );
        Ok(Self {
            stats,
            _capture: capture,
            _playback: playback,
        })
    }

    /// Live counters of the playback callback.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drops_what_does_not_fit() {
        let queue = CaptureQueue::new(4);
        assert_eq!(queue.push(&[1.0, 2.0, 3.0]), 0);
        assert_eq!(queue.push(&[4.0, 5.0]), 1);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn pop_zero_fills_missing_samples() {
        let queue = CaptureQueue::new(8);
        queue.push(&[1.0, 2.0]);
        let mut out = [9.0; 4];
        assert_eq!(queue.pop_into(&mut out), 2);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn stats_count_results() {
        let stats = StreamStats::default();
        stats.count(CallbackResult::Continue);
        stats.count(CallbackResult::Silenced);
        stats.count(CallbackResult::Abort);
        assert_eq!(stats.callbacks.load(Ordering::Relaxed), 3);
        assert_eq!(stats.silenced.load(Ordering::Relaxed), 1);
        assert_eq!(stats.aborted.load(Ordering::Relaxed), 1);
    }
}
