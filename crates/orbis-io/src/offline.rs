//! Rendering WAV files through a signal flow.

use std::path::Path;

use hound::WavWriter;
use orbis_core::{AudioSignalFlow, CallbackResult};

use crate::wav::{WavSpec, read_wav};
use crate::{Error, Result};

/// Summary of an offline render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineReport {
    /// Frames written to the output file.
    pub frames: usize,
    /// Blocks processed.
    pub blocks: usize,
    /// Blocks replaced by silence after a component error.
    pub silenced_blocks: usize,
}

/// Renders `input` (one channel per capture channel of `flow`) into a
/// 32-bit float WAV at `output`.
///
/// The last block is zero-padded; the output has as many frames as the
/// input. A sample rate different from the flow's is rendered anyway and
/// logged as a warning.
pub fn render_offline(
    flow: &mut AudioSignalFlow,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<OfflineReport> {
    let (channels, spec) = read_wav(input.as_ref())?;
    let capture_channels = flow.number_of_capture_channels();
    let playback_channels = flow.number_of_playback_channels();
    if channels.len() != capture_channels {
        return Err(Error::ChannelMismatch {
            what: "input file",
            expected: capture_channels,
            found: channels.len(),
        });
    }
    if (spec.sample_rate as f32 - flow.sample_rate()).abs() > 0.5 {
        tracing::warn!(
            file = spec.sample_rate,
            flow = flow.sample_rate(),
            "sample rate mismatch, rendering without conversion"
        );
    }

    let period = flow.period();
    let frames = channels.first().map_or(0, Vec::len);
    let out_spec = WavSpec {
        channels: playback_channels as u16,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
    };
    let mut writer = WavWriter::create(output.as_ref(), hound::WavSpec::from(out_spec))?;
    let mut capture = vec![0.0; capture_channels * period];
    let mut playback = vec![0.0; playback_channels * period];
    let mut report = OfflineReport {
        frames,
        blocks: 0,
        silenced_blocks: 0,
    };

    let mut start = 0;
    while start < frames {
        let len = period.min(frames - start);
        for (block, channel) in capture.chunks_exact_mut(period).zip(&channels) {
            block[..len].copy_from_slice(&channel[start..start + len]);
            block[len..].fill(0.0);
        }
        match flow.process_planar(&capture, &mut playback) {
            CallbackResult::Continue => {}
            CallbackResult::Silenced => {
                report.silenced_blocks += 1;
                if let Some((component, err)) = flow.take_last_error() {
                    tracing::warn!(block = report.blocks, %component, "block silenced: {err}");
                }
            }
            CallbackResult::Abort => {
                return Err(Error::Render(format!(
                    "block {} rejected by the signal flow",
                    report.blocks
                )));
            }
        }
        for frame in 0..len {
            for ch in 0..playback_channels {
                writer.write_sample(playback[ch * period + frame])?;
            }
        }
        report.blocks += 1;
        start += len;
    }

    writer.finalize()?;
    tracing::info!(
        frames,
        blocks = report.blocks,
        silenced = report.silenced_blocks,
        "offline rendering finished"
    );
    Ok(report)
}
