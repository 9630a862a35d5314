//! Multichannel WAV file reading and writing.

use crate::{Error, Result};
use hound::{SampleFormat, WavReader, WavWriter};
use orbis_core::Matrix;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Header of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    /// Channels of the file.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per channel.
    pub frames: u32,
    /// Whether samples are IEEE floats rather than integers.
    pub float: bool,
}

impl WavInfo {
    /// Playing time of the file.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.frames) / f64::from(self.sample_rate.max(1)))
    }
}

/// Reads the header of a WAV file without decoding samples.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        frames: reader.duration(),
        float: spec.sample_format == SampleFormat::Float,
    })
}

/// WAV file specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Bit depth per sample; 32 writes float samples, 16 and 24 integer.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// One sample vector per channel.
pub type PlanarSamples = Vec<Vec<f32>>;

/// Full scale of an integer sample with `bits` bits.
fn full_scale(bits: u16) -> f32 {
    (1i64 << (bits - 1)) as f32
}

/// Decodes every sample to f32, interleaved; integer samples are scaled to [-1, 1).
fn decode<R: Read>(reader: WavReader<R>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    if spec.sample_format == SampleFormat::Float {
        return Ok(reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?);
    }
    let scale = full_scale(spec.bits_per_sample);
    Ok(reader
        .into_samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, hound::Error>>()?)
}

/// Reads a WAV file into one vector per channel.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(PlanarSamples, WavSpec)> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());
    let width = usize::from(spec.channels).max(1);
    let interleaved = decode(reader)?;
    let planar: PlanarSamples = (0..width)
        .map(|ch| interleaved.iter().skip(ch).step_by(width).copied().collect())
        .collect();
    Ok((planar, spec))
}

/// Write planar channels to a WAV file.
///
/// `spec.channels` is taken from `channels.len()`; shorter channels are
/// padded with silence to the longest one.
pub fn write_wav<P, C>(path: P, channels: &[C], spec: WavSpec) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[f32]>,
{
    let spec = WavSpec {
        channels: channels.len() as u16,
        ..spec
    };
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;
    let frames = channels.iter().map(|c| c.as_ref().len()).max().unwrap_or(0);
    let sample = |ch: &C, frame: usize| ch.as_ref().get(frame).copied().unwrap_or(0.0);

    let scale = (spec.bits_per_sample != 32).then(|| full_scale(spec.bits_per_sample));
    for frame in 0..frames {
        for ch in channels {
            let value = sample(ch, frame);
            match scale {
                None => writer.write_sample(value)?,
                Some(scale) => {
                    writer.write_sample((value * scale).clamp(-scale, scale - 1.0) as i32)?;
                }
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Load a multichannel WAV as a filter matrix: one row per channel, one
/// column per tap. Returns the file's sample rate alongside.
pub fn load_filter_matrix<P: AsRef<Path>>(path: P) -> Result<(Matrix, u32)> {
    let (channels, spec) = read_wav(&path)?;
    let taps = channels.first().map_or(0, Vec::len);
    if taps == 0 {
        return Err(Error::Render(format!(
            "filter file '{}' contains no samples",
            path.as_ref().display()
        )));
    }
    let data: Vec<f32> = channels.into_iter().flatten().collect();
    let rows = data.len() / taps;
    let matrix = Matrix::from_vec(rows, taps, data)
        .ok_or_else(|| Error::Render("inconsistent filter matrix dimensions".to_owned()))?;
    tracing::debug!(
        path = %path.as_ref().display(),
        filters = rows,
        taps,
        "loaded filter matrix"
    );
    Ok((matrix, spec.sample_rate))
}
