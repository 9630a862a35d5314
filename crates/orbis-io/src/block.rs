//! Adapts hardware buffer sizes to the signal flow period.
//!
//! Audio callbacks deliver interleaved buffers whose size is chosen by the
//! driver and may change between calls. [`AudioSignalFlow`] renders fixed
//! blocks of planar channels. The adapter collects captured frames into a
//! channel-major block, renders it once full, and plays the previous
//! rendered block out frame by frame. This adds one period of latency.

use orbis_core::{AudioSignalFlow, CallbackResult};

/// Interleaved-to-planar block adapter with one period of latency.
///
/// All buffers are allocated in [`new`](Self::new); processing does not
/// allocate.
#[derive(Debug, Clone)]
pub struct BlockAdapter {
    period: usize,
    capture_channels: usize,
    playback_channels: usize,
    /// Channel-major capture block being filled.
    capture: Vec<f32>,
    /// Channel-major rendered block being played out.
    playback: Vec<f32>,
    /// Frames written to `capture` (and read from `playback`).
    position: usize,
}

impl BlockAdapter {
    /// Creates an adapter for blocks of `period` frames.
    pub fn new(period: usize, capture_channels: usize, playback_channels: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            capture_channels,
            playback_channels,
            capture: vec![0.0; period * capture_channels],
            playback: vec![0.0; period * playback_channels],
            position: 0,
        }
    }

    /// Creates an adapter matching `flow`'s period and channel counts.
    pub fn for_flow(flow: &AudioSignalFlow) -> Self {
        Self::new(
            flow.period(),
            flow.number_of_capture_channels(),
            flow.number_of_playback_channels(),
        )
    }

    /// Block length in frames.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Delay between a captured frame and its rendered output, in frames.
    pub fn latency(&self) -> usize {
        self.period
    }

    /// Interleaved capture channels.
    pub fn capture_channels(&self) -> usize {
        self.capture_channels
    }

    /// Interleaved playback channels.
    pub fn playback_channels(&self) -> usize {
        self.playback_channels
    }

    /// Clears buffered audio.
    pub fn reset(&mut self) {
        self.capture.fill(0.0);
        self.playback.fill(0.0);
        self.position = 0;
    }

    /// Moves `frames` frames through the adapter.
    ///
    /// `input` holds interleaved capture frames; missing frames read as
    /// silence. `output` receives interleaved playback frames. `render` is
    /// called with the channel-major capture and playback blocks every
    /// time a block is complete.
    pub fn process<F>(&mut self, frames: usize, input: &[f32], output: &mut [f32], mut render: F)
    where
        F: FnMut(&[f32], &mut [f32]),
    {
        let cc = self.capture_channels;
        let pc = self.playback_channels;
        let period = self.period;
        for frame in 0..frames {
            let frame_in = input.get(frame * cc..(frame + 1) * cc);
            for ch in 0..cc {
                self.capture[ch * period + self.position] = frame_in.map_or(0.0, |f| f[ch]);
            }
            if let Some(frame_out) = output.get_mut(frame * pc..(frame + 1) * pc) {
                for (ch, out) in frame_out.iter_mut().enumerate() {
                    *out = self.playback[ch * period + self.position];
                }
            }
            self.position += 1;
            if self.position == period {
                render(&self.capture, &mut self.playback);
                self.position = 0;
            }
        }
    }

    /// [`process`](Self::process) through a signal flow.
    ///
    /// The frame count follows `output` (or `input` for a flow without
    /// playback channels). Returns the most severe block result:
    /// `Abort` over `Silenced` over `Continue`.
    pub fn process_flow(
        &mut self,
        flow: &mut AudioSignalFlow,
        input: &[f32],
        output: &mut [f32],
    ) -> CallbackResult {
        let frames = if self.playback_channels > 0 {
            output.len() / self.playback_channels
        } else {
            input.len() / self.capture_channels.max(1)
        };
        let mut result = CallbackResult::Continue;
        self.process(frames, input, output, |capture, playback| {
            match flow.process_planar(capture, playback) {
                CallbackResult::Continue => {}
                CallbackResult::Silenced => {
                    if result == CallbackResult::Continue {
                        result = CallbackResult::Silenced;
                    }
                }
                CallbackResult::Abort => result = CallbackResult::Abort,
            }
        });
        result
    }
}
