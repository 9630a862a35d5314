//! Late reverberation filter synthesis.
//!
//! The late tail of a reverb object is modelled as a sum of octave-band
//! noise sequences, each shaped by an envelope with an onset delay, a linear
//! attack and an exponential decay:
//!
//! ```text
//! e[n] = 0                                   n < D
//! e[n] = g * (n - D) / A                     D <= n < D + A
//! e[n] = g * exp(c / fs * (n - D - A))       n >= D + A
//! ```
//!
//! The noise bank is generated once at construction. Updating a channel only
//! multiplies and accumulates, which keeps the per-request cost at
//! `subbands x length` multiply-adds.

use orbis_core::{
    AtomicProcessor, Biquad, BiquadCoefficients, Component, ComponentBuilder, IndexedValue,
    Parameter, ParameterConfig, ParameterPortId, ParameterType, ProcessContext, ProcessError,
    ProtocolType, SignalFlowContext,
};
use orbis_objects::{LATE_REVERB_SUBBANDS, LateReverb};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, ReverbError};

/// Octave band-pass sections centred on 62.5 Hz, 125 Hz, ..., 16 kHz
/// (designed for 48 kHz).
pub const OCTAVE_BAND_FILTERS: [BiquadCoefficients; LATE_REVERB_SUBBANDS] = [
    BiquadCoefficients::new(0.000_016_684_78, 0.000_033_369_56, 0.000_016_684_78, -1.994_164_9, 0.994_231_7),
    BiquadCoefficients::new(0.005_751_740_2, 0.0, -0.005_751_740_2, -1.988_230_3, 0.988_496_5),
    BiquadCoefficients::new(0.011_437_754, 0.0, -0.011_437_754, -1.976_065_9, 0.977_124_5),
    BiquadCoefficients::new(0.022_617_293, 0.0, -0.022_617_293, -1.950_580_1, 0.954_765_4),
    BiquadCoefficients::new(0.044_237_74, 0.0, -0.044_237_74, -1.895_171_2, 0.911_524_5),
    BiquadCoefficients::new(0.084_754_19, 0.0, -0.084_754_19, -1.768_119_1, 0.830_491_6),
    BiquadCoefficients::new(0.156_456_68, 0.0, -0.156_456_68, -1.461_059_9, 0.687_086_6),
    BiquadCoefficients::new(0.272_011_46, 0.0, -0.272_011_46, -0.727_988_5, 0.455_977_08),
    BiquadCoefficients::new(0.137_825_79, -0.275_651_58, 0.137_825_79, 0.551_303_2, 0.102_606_3),
];

/// Filtered noise samples discarded before the stored sequence starts.
pub const TRANSIENT_SAMPLES: usize = 20;

/// Seed of the noise bank when none is given.
pub const DEFAULT_NOISE_SEED: u64 = 0x6f72_6269_735f_6c72;

/// Filter length in samples for a tail of `length_seconds`; at least one.
pub fn filter_length(length_seconds: f32, sample_rate: f32) -> usize {
    let samples = (length_seconds * sample_rate).ceil();
    if samples.is_finite() && samples > 1.0 {
        samples as usize
    } else {
        1
    }
}

/// Writes the envelope of one subband into `out`.
///
/// Fails if the onset delay and the attack do not end before the last
/// sample; `out` is left untouched in that case.
pub fn create_envelope(
    out: &mut [f32],
    onset_delay: f32,
    gain: f32,
    attack_time: f32,
    decay_coeff: f32,
    sample_rate: f32,
) -> Result<()> {
    let length = out.len();
    let onset = (onset_delay * sample_rate).round().max(0.0) as usize;
    let attack = (attack_time * sample_rate).round().max(0.0) as usize;
    if onset >= length || onset + attack >= length {
        return Err(ReverbError::EnvelopeTooLong {
            needed: onset + attack,
            length,
        });
    }
    let decay_per_sample = decay_coeff / sample_rate;

    let (delay, rest) = out.split_at_mut(onset);
    delay.fill(0.0);
    let (ramp, tail) = rest.split_at_mut(attack);
    for (n, e) in ramp.iter_mut().enumerate() {
        *e = gain * n as f32 / attack as f32;
    }
    for (n, e) in tail.iter_mut().enumerate() {
        *e = gain * (decay_per_sample * n as f32).exp();
    }
    Ok(())
}

/// Synthesizes late reverberation impulse responses for a fixed number of
/// render channels.
#[derive(Debug, Clone)]
pub struct LateReverbFilterCalculator {
    channels: usize,
    subbands: usize,
    length: usize,
    sample_rate: f32,
    max_updates: usize,
    /// `channels x subbands` sequences of `length` samples.
    noise: Vec<f32>,
    envelope: Vec<f32>,
}

impl LateReverbFilterCalculator {
    /// Creates the calculator and its noise bank.
    ///
    /// `max_updates_per_period == 0` allows one update per channel and block.
    pub fn new(
        channels: usize,
        length_seconds: f32,
        sample_rate: f32,
        subbands: usize,
        max_updates_per_period: usize,
        seed: u64,
    ) -> Result<Self> {
        if subbands != OCTAVE_BAND_FILTERS.len() {
            return Err(ReverbError::SubbandCount {
                expected: OCTAVE_BAND_FILTERS.len(),
                found: subbands,
            });
        }
        if !(sample_rate > 0.0) {
            return Err(ReverbError::InvalidConfig(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        let length = filter_length(length_seconds, sample_rate);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut noise = Vec::with_capacity(channels * subbands * length);
        let mut sequence = vec![0.0f32; length + TRANSIENT_SAMPLES];
        for _ in 0..channels {
            for coeffs in &OCTAVE_BAND_FILTERS {
                sequence
                    .iter_mut()
                    .for_each(|s| *s = rng.random_range(-1.0f32..=1.0));
                Biquad::with_coefficients(*coeffs).process_block(&mut sequence);
                noise.extend_from_slice(&sequence[TRANSIENT_SAMPLES..]);
            }
        }
        tracing::debug!(channels, subbands, length, "late reverb noise bank created");
        Ok(Self {
            channels,
            subbands,
            length,
            sample_rate,
            max_updates: if max_updates_per_period == 0 {
                channels
            } else {
                max_updates_per_period
            },
            noise,
            envelope: vec![0.0; length],
        })
    }

    /// Number of render channels.
    pub fn number_of_channels(&self) -> usize {
        self.channels
    }

    /// Impulse response length in samples.
    pub fn filter_length(&self) -> usize {
        self.length
    }

    /// Maximum number of requests handled per block.
    pub fn max_updates_per_period(&self) -> usize {
        self.max_updates
    }

    /// Stored noise sequence of one channel and subband.
    pub fn subband_noise(&self, channel: usize, subband: usize) -> &[f32] {
        let start = (channel * self.subbands + subband) * self.length;
        &self.noise[start..start + self.length]
    }

    /// Computes the impulse response of `channel` into `ir`.
    ///
    /// `ir` must hold at least [`filter_length`](Self::filter_length)
    /// samples; any excess is zeroed. On an envelope error the whole
    /// response is zero.
    pub fn calculate_impulse_response(
        &mut self,
        channel: usize,
        parameters: &LateReverb,
        ir: &mut [f32],
    ) -> Result<()> {
        if channel >= self.channels {
            return Err(ReverbError::ChannelOutOfRange {
                index: channel,
                limit: self.channels,
            });
        }
        if ir.len() < self.length {
            return Err(ReverbError::InvalidConfig(format!(
                "impulse response buffer holds {} samples, need {}",
                ir.len(),
                self.length
            )));
        }
        ir.fill(0.0);
        let mut envelope = std::mem::take(&mut self.envelope);
        let result = (0..self.subbands).try_for_each(|band| {
            create_envelope(
                &mut envelope,
                parameters.onset_delay,
                parameters.levels[band],
                parameters.attack_times[band],
                parameters.decay_coeffs[band],
                self.sample_rate,
            )?;
            let noise = self.subband_noise(channel, band);
            for ((out, &n), &e) in ir.iter_mut().zip(noise).zip(&envelope) {
                *out += n * e;
            }
            Ok(())
        });
        self.envelope = envelope;
        if result.is_err() {
            ir.fill(0.0);
        }
        result
    }

    /// Wraps the calculator into an atomic component.
    ///
    /// Ports: message-queue input `subbandInput` ([`LateReverbRequest`]) and
    /// message-queue output `lateFilterOutput` (`IndexedValue<Vec<f32>>`).
    pub fn component(self, context: SignalFlowContext, name: &str) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        let input = b.parameter_input(
            "subbandInput",
            LateReverbRequest::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )?;
        let output = b.parameter_output(
            "lateFilterOutput",
            IndexedValue::<Vec<f32>>::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )?;
        let responses = vec![vec![0.0; self.length]; self.channels];
        Ok(b.into_atomic(LateFilterProcessor {
            calculator: self,
            responses,
            input,
            output,
        }))
    }
}

/// Late reverberation parameters addressed to one render channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LateReverbRequest {
    /// Render channel.
    pub channel: usize,
    /// Envelope parameters.
    pub parameters: LateReverb,
}

impl LateReverbRequest {
    /// Creates a request.
    pub fn new(channel: usize, parameters: LateReverb) -> Self {
        Self {
            channel,
            parameters,
        }
    }
}

impl Parameter for LateReverbRequest {
    const TYPE: ParameterType = ParameterType::new("LateReverbRequest");
}

struct LateFilterProcessor {
    calculator: LateReverbFilterCalculator,
    /// Impulse response buffer per render channel.
    responses: Vec<Vec<f32>>,
    input: ParameterPortId,
    output: ParameterPortId,
}

impl AtomicProcessor for LateFilterProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        for _ in 0..self.calculator.max_updates {
            let Some(request) = ctx.parameters.receive::<LateReverbRequest>(self.input)? else {
                break;
            };
            let Some(ir) = self.responses.get_mut(request.channel) else {
                tracing::warn!(
                    channel = request.channel,
                    channels = self.calculator.channels,
                    "late reverb request for unknown channel skipped"
                );
                continue;
            };
            if let Err(e) =
                self.calculator
                    .calculate_impulse_response(request.channel, &request.parameters, ir)
            {
                tracing::warn!(channel = request.channel, "late reverb filter: {e}");
            }
            // The message owns its samples; the synthesis itself runs in place.
            ctx.parameters
                .send(self.output, IndexedValue::new(request.channel, ir.clone()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, CallbackResult, ParameterRegistry};

    fn params(onset: f32, level: f32, attack: f32, decay: f32) -> LateReverb {
        LateReverb {
            onset_delay: onset,
            levels: [level; LATE_REVERB_SUBBANDS],
            decay_coeffs: [decay; LATE_REVERB_SUBBANDS],
            attack_times: [attack; LATE_REVERB_SUBBANDS],
        }
    }

    #[test]
    fn length_is_rounded_up_and_positive() {
        assert_eq!(filter_length(0.5, 48000.0), 24000);
        assert_eq!(filter_length(0.000_01, 48000.0), 1);
        assert_eq!(filter_length(0.0, 48000.0), 1);
        assert_eq!(filter_length(-1.0, 48000.0), 1);
    }

    #[test]
    fn envelope_shape() {
        let mut e = vec![9.0; 10];
        // 2 samples onset, 4 samples attack, then decay.
        create_envelope(&mut e, 2.0, 1.0, 4.0, -1.0, 1.0).unwrap();
        assert_eq!(&e[..2], &[0.0, 0.0]);
        assert_eq!(&e[2..6], &[0.0, 0.25, 0.5, 0.75]);
        assert!((e[6] - 1.0).abs() < 1e-6);
        assert!((e[7] - (-1.0f32).exp()).abs() < 1e-6);
        assert!((e[9] - (-3.0f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn envelope_rejects_long_onset() {
        let mut e = vec![9.0; 4];
        let err = create_envelope(&mut e, 2.0, 1.0, 2.0, -1.0, 1.0).unwrap_err();
        assert!(matches!(err, ReverbError::EnvelopeTooLong { needed: 4, length: 4 }));
        assert_eq!(e, vec![9.0; 4]);
        assert!(create_envelope(&mut e, 4.0, 1.0, 0.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn subband_count_must_match_filter_bank() {
        let err = LateReverbFilterCalculator::new(1, 0.1, 48000.0, 8, 0, 1).unwrap_err();
        assert!(err.to_string().contains("needs 9 subbands, found 8"), "got: {err}");
    }

    #[test]
    fn noise_bank_is_deterministic_per_seed() {
        let a = LateReverbFilterCalculator::new(2, 0.01, 48000.0, 9, 0, 7).unwrap();
        let b = LateReverbFilterCalculator::new(2, 0.01, 48000.0, 9, 0, 7).unwrap();
        let c = LateReverbFilterCalculator::new(2, 0.01, 48000.0, 9, 0, 8).unwrap();
        assert_eq!(a.filter_length(), 480);
        assert_eq!(a.subband_noise(1, 4), b.subband_noise(1, 4));
        assert_ne!(a.subband_noise(1, 4), c.subband_noise(1, 4));
        assert_ne!(a.subband_noise(0, 4), a.subband_noise(1, 4));
        assert!(a.subband_noise(0, 8).iter().any(|&x| x != 0.0));
    }

    #[test]
    fn impulse_response_is_weighted_noise_sum() {
        let mut calc = LateReverbFilterCalculator::new(1, 0.01, 48000.0, 9, 0, 3).unwrap();
        let mut p = params(0.0, 0.0, 0.0, 0.0);
        p.levels[5] = 0.5;
        let mut ir = vec![1.0; 500];
        calc.calculate_impulse_response(0, &p, &mut ir).unwrap();
        let noise = calc.subband_noise(0, 5).to_vec();
        for (a, n) in ir.iter().zip(&noise) {
            assert!((a - 0.5 * n).abs() < 1e-6);
        }
        assert!(ir[480..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn envelope_error_yields_silence() {
        let mut calc = LateReverbFilterCalculator::new(1, 0.01, 48000.0, 9, 0, 3).unwrap();
        let mut ir = vec![1.0; 480];
        let err = calc
            .calculate_impulse_response(0, &params(1.0, 1.0, 0.0, -5.0), &mut ir)
            .unwrap_err();
        assert!(matches!(err, ReverbError::EnvelopeTooLong { .. }));
        assert!(ir.iter().all(|&x| x == 0.0));
        assert!(matches!(
            calc.calculate_impulse_response(1, &LateReverb::default(), &mut ir),
            Err(ReverbError::ChannelOutOfRange { index: 1, limit: 1 })
        ));
    }

    fn filter_flow(max_updates: usize) -> AudioSignalFlow {
        let ctx = SignalFlowContext::new(16, 48000.0);
        let calc = LateReverbFilterCalculator::new(2, 0.01, 48000.0, 9, max_updates, 1).unwrap();
        let mut b = ComponentBuilder::new(ctx, "top");
        b.parameter_input(
            "requests",
            LateReverbRequest::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )
        .unwrap();
        b.parameter_output(
            "filters",
            IndexedValue::<Vec<f32>>::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )
        .unwrap();
        let mut top = b.into_composite();
        top.add_child(calc.component(ctx, "late").unwrap()).unwrap();
        top.parameter_connection("this", "requests", "late", "subbandInput")
            .unwrap();
        top.parameter_connection("late", "lateFilterOutput", "this", "filters")
            .unwrap();
        let mut registry = ParameterRegistry::with_core_types();
        crate::register_parameters(&mut registry);
        AudioSignalFlow::new(top, &registry).unwrap()
    }

    #[test]
    fn unknown_channel_request_is_skipped() {
        let mut flow = filter_flow(0);
        let requests = flow.parameter_sender("requests").unwrap();
        let filters = flow.parameter_receiver("filters").unwrap();
        requests
            .send(LateReverbRequest::new(5, params(0.0, 1.0, 0.0, -5.0)))
            .unwrap();
        requests
            .send(LateReverbRequest::new(1, params(0.0, 1.0, 0.0, -5.0)))
            .unwrap();
        assert_eq!(flow.process(&[], &mut []), CallbackResult::Continue);
        assert!(flow.take_last_error().is_none());

        assert_eq!(filters.pending(), 1);
        let ir: IndexedValue<Vec<f32>> = filters.receive().unwrap().unwrap();
        assert_eq!(ir.index, 1);
        assert_eq!(ir.value.len(), 480);
        assert!(ir.value.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn repeated_requests_reuse_the_channel_buffer() {
        let mut flow = filter_flow(0);
        let requests = flow.parameter_sender("requests").unwrap();
        let filters = flow.parameter_receiver("filters").unwrap();
        requests
            .send(LateReverbRequest::new(0, params(0.0, 1.0, 0.0, -5.0)))
            .unwrap();
        flow.process(&[], &mut []);
        let loud: IndexedValue<Vec<f32>> = filters.receive().unwrap().unwrap();

        requests.send(LateReverbRequest::new(0, LateReverb::default())).unwrap();
        flow.process(&[], &mut []);
        let silent: IndexedValue<Vec<f32>> = filters.receive().unwrap().unwrap();
        assert!(loud.value.iter().any(|&x| x != 0.0));
        assert_eq!(silent.value, vec![0.0; 480]);
    }

    #[test]
    fn zero_max_updates_means_one_per_channel() {
        let calc = LateReverbFilterCalculator::new(3, 0.001, 48000.0, 9, 0, 1).unwrap();
        assert_eq!(calc.max_updates_per_period(), 3);
        let calc = LateReverbFilterCalculator::new(3, 0.001, 48000.0, 9, 1, 1).unwrap();
        assert_eq!(calc.max_updates_per_period(), 1);
    }
}
