//! Multichannel delay with per-channel delay and gain.
//!
//! Each channel owns a circular buffer. Delays are given in seconds and read
//! with fractional-sample interpolation; delay and gain changes are ramped
//! linearly so that moving sources do not click.

use orbis_core::{
    AtomicProcessor, AudioPortId, Component, ComponentBuilder, Parameter, ParameterConfig,
    ParameterPortId, ProcessContext, ProcessError, ProtocolType, SignalFlowContext,
    VectorParameter,
};

use crate::error::{ComponentError, Result};
use crate::ramp::LinearRamp;

/// Fractional delay read method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DelayInterpolation {
    /// Truncate to the nearest earlier sample.
    NearestSample,
    /// Two-point linear interpolation.
    #[default]
    Linear,
    /// Four-point cubic interpolation.
    Cubic,
}

/// Circular buffer read after every write, so a delay of zero passes the
/// current sample.
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Four guard samples keep cubic reads at the maximum delay inside the
    /// written history.
    fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples + 4],
            write_pos: 0,
        }
    }

    #[inline]
    fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    #[inline]
    fn read(&self, delay: f32, interpolation: DelayInterpolation) -> f32 {
        let len = self.buffer.len();
        let whole = delay as usize;
        let frac = delay - whole as f32;
        // `whole` samples before the last written one
        let pos = (self.write_pos + len - whole - 1) % len;
        match interpolation {
            DelayInterpolation::NearestSample => self.buffer[pos],
            DelayInterpolation::Linear => {
                let older = self.buffer[(pos + len - 1) % len];
                let a = self.buffer[pos];
                a + (older - a) * frac
            }
            DelayInterpolation::Cubic => {
                let y0 = self.buffer[(pos + 1) % len];
                let y1 = self.buffer[pos];
                let y2 = self.buffer[(pos + len - 1) % len];
                let y3 = self.buffer[(pos + len - 2) % len];
                let a0 = y3 - y2 - y0 + y1;
                let a1 = y0 - y1 - a0;
                let a2 = y2 - y0;
                ((a0 * frac + a1) * frac + a2) * frac + y1
            }
        }
    }
}

/// Setup of a [`DelayVector`].
#[derive(Debug, Clone, PartialEq)]
pub struct DelayVectorConfig {
    /// Number of channels.
    pub channels: usize,
    /// Longest supported delay in seconds.
    pub max_delay: f32,
    /// Fractional delay method.
    pub interpolation: DelayInterpolation,
    /// Samples over which delay and gain changes are ramped.
    pub interpolation_steps: usize,
    /// Initial delays in seconds, one per channel.
    pub initial_delays: Vec<f32>,
    /// Initial linear gains, one per channel.
    pub initial_gains: Vec<f32>,
    /// Adds the `delayInput` and `gainInput` parameter ports.
    pub control_inputs: bool,
}

impl DelayVectorConfig {
    /// Zero delay, unity gain, linear interpolation, no ramping and no
    /// control inputs.
    pub fn new(channels: usize, max_delay: f32) -> Self {
        Self {
            channels,
            max_delay,
            interpolation: DelayInterpolation::default(),
            interpolation_steps: 0,
            initial_delays: vec![0.0; channels],
            initial_gains: vec![1.0; channels],
            control_inputs: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_delay.is_finite() && self.max_delay >= 0.0) {
            return Err(ComponentError::invalid(
                "DelayVector",
                format!("maximum delay {} s is invalid", self.max_delay),
            ));
        }
        if self.initial_delays.len() != self.channels || self.initial_gains.len() != self.channels
        {
            return Err(ComponentError::invalid(
                "DelayVector",
                format!(
                    "{} channels need as many initial delays and gains, found {} and {}",
                    self.channels,
                    self.initial_delays.len(),
                    self.initial_gains.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Delays and scales every channel of a multichannel signal.
pub struct DelayVector {
    input: AudioPortId,
    output: AudioPortId,
    delay_input: Option<ParameterPortId>,
    gain_input: Option<ParameterPortId>,
    lines: Vec<DelayLine>,
    /// In samples.
    delays: Vec<LinearRamp>,
    gains: Vec<LinearRamp>,
    interpolation: DelayInterpolation,
    sample_rate: f32,
    max_delay_samples: f32,
}

impl DelayVector {
    /// Creates the component.
    ///
    /// Ports: audio `in` and `out` of width `config.channels`; with
    /// `control_inputs`, the double-buffered vector inputs `delayInput`
    /// (seconds) and `gainInput`.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        config: &DelayVectorConfig,
    ) -> Result<Component> {
        config.validate()?;
        let sample_rate = context.sample_rate();
        let max_delay_samples = (config.max_delay * sample_rate).ceil() as usize;

        let mut b = ComponentBuilder::new(context, name);
        let input = b.audio_input("in", config.channels)?;
        let output = b.audio_output("out", config.channels)?;
        let vector = ParameterConfig::Vector {
            size: config.channels,
        };
        let (delay_input, gain_input) = if config.control_inputs {
            (
                Some(b.parameter_input(
                    "delayInput",
                    VectorParameter::TYPE,
                    ProtocolType::DoubleBuffering,
                    vector.clone(),
                )?),
                Some(b.parameter_input(
                    "gainInput",
                    VectorParameter::TYPE,
                    ProtocolType::DoubleBuffering,
                    vector,
                )?),
            )
        } else {
            (None, None)
        };

        let max = max_delay_samples as f32;
        let steps = config.interpolation_steps;
        let delays = config
            .initial_delays
            .iter()
            .map(|&d| LinearRamp::new(clamp_delay(d * sample_rate, max), steps))
            .collect();
        let gains = config
            .initial_gains
            .iter()
            .map(|&g| LinearRamp::new(g, steps))
            .collect();

        Ok(b.into_atomic(DelayVector {
            input,
            output,
            delay_input,
            gain_input,
            lines: vec![DelayLine::new(max_delay_samples); config.channels],
            delays,
            gains,
            interpolation: config.interpolation,
            sample_rate,
            max_delay_samples: max,
        }))
    }

    fn check_len(what: &str, found: usize, expected: usize) -> std::result::Result<(), ProcessError> {
        if found == expected {
            Ok(())
        } else {
            Err(ProcessError::Component(format!(
                "{what} vector has {found} entries, expected {expected}"
            )))
        }
    }
}

impl AtomicProcessor for DelayVector {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        if let Some(port) = self.delay_input
            && ctx.parameters.changed(port)
        {
            let delays = ctx.parameters.read::<VectorParameter>(port)?;
            Self::check_len("delay", delays.len(), self.delays.len())?;
            for (ramp, &d) in self.delays.iter_mut().zip(delays.iter()) {
                let samples = d * self.sample_rate;
                if !(0.0..=self.max_delay_samples).contains(&samples) {
                    tracing::warn!(delay = d, "delay out of range, clamped");
                }
                ramp.set_target(clamp_delay(samples, self.max_delay_samples));
            }
            ctx.parameters.reset_changed(port);
        }
        if let Some(port) = self.gain_input
            && ctx.parameters.changed(port)
        {
            let gains = ctx.parameters.read::<VectorParameter>(port)?;
            Self::check_len("gain", gains.len(), self.gains.len())?;
            for (ramp, &g) in self.gains.iter_mut().zip(gains.iter()) {
                ramp.set_target(g);
            }
            ctx.parameters.reset_changed(port);
        }

        let inputs = ctx.audio.inputs();
        for (ch, out) in ctx.audio.output_port(self.output).enumerate() {
            let line = &mut self.lines[ch];
            let delay = &mut self.delays[ch];
            let gain = &mut self.gains[ch];
            for (o, &x) in out.iter_mut().zip(inputs.input(self.input, ch)) {
                line.write(x);
                let d = delay.advance();
                *o = gain.advance() * line.read(d, self.interpolation);
            }
        }
        Ok(())
    }
}

fn clamp_delay(samples: f32, max: f32) -> f32 {
    if samples.is_nan() { 0.0 } else { samples.clamp(0.0, max) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, ParameterRegistry};

    fn flow(config: &DelayVectorConfig) -> AudioSignalFlow {
        let ctx = SignalFlowContext::new(4, 1000.0);
        let c = DelayVector::component(ctx, "delay", config).unwrap();
        AudioSignalFlow::new(c, &ParameterRegistry::with_core_types()).unwrap()
    }

    #[test]
    fn delay_line_reads_back_written_history() {
        let mut line = DelayLine::new(8);
        for i in 1..=5 {
            line.write(i as f32);
        }
        assert_eq!(line.read(0.0, DelayInterpolation::NearestSample), 5.0);
        assert_eq!(line.read(3.0, DelayInterpolation::NearestSample), 2.0);
        assert!((line.read(1.5, DelayInterpolation::Linear) - 3.5).abs() < 1e-6);
        assert!((line.read(2.0, DelayInterpolation::Cubic) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn integer_delay_shifts_signal() {
        let mut config = DelayVectorConfig::new(1, 0.01);
        config.interpolation = DelayInterpolation::NearestSample;
        config.initial_delays = vec![0.003];
        config.initial_gains = vec![0.5];
        let mut flow = flow(&config);

        let impulse = [1.0, 0.0, 0.0, 0.0];
        let silence = [0.0; 4];
        let mut out = [9.0; 4];
        flow.process(&[&impulse], &mut [&mut out]);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.5]);
        flow.process(&[&silence], &mut [&mut out]);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn delay_is_clamped_to_maximum() {
        let mut config = DelayVectorConfig::new(1, 0.0025);
        config.control_inputs = true;
        let mut flow = flow(&config);
        flow.parameter_sender("delayInput")
            .unwrap()
            .send(VectorParameter(vec![1.0]))
            .unwrap();
        flow.parameter_sender("gainInput")
            .unwrap()
            .send(VectorParameter(vec![1.0]))
            .unwrap();

        let impulse = [1.0, 0.0, 0.0, 0.0];
        let mut out = [0.0; 4];
        flow.process(&[&impulse], &mut [&mut out]);
        assert_eq!(out, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn wrong_vector_length_fails_the_block() {
        let mut config = DelayVectorConfig::new(2, 0.01);
        config.control_inputs = true;
        let mut flow = flow(&config);
        flow.parameter_sender("gainInput")
            .unwrap()
            .send(VectorParameter(vec![1.0]))
            .unwrap();
        let x = [0.0; 4];
        let (mut a, mut b) = ([0.0; 4], [0.0; 4]);
        flow.process(&[&x, &x], &mut [&mut a, &mut b]);
        let (component, err) = flow.take_last_error().unwrap();
        assert_eq!(component, "delay");
        assert!(err.to_string().contains("expected 2"), "got: {err}");
    }

    #[test]
    fn mismatched_initial_values_are_rejected() {
        let mut config = DelayVectorConfig::new(2, 0.01);
        config.initial_gains = vec![1.0];
        let err = DelayVector::component(SignalFlowContext::new(4, 1000.0), "d", &config)
            .err()
            .unwrap();
        assert!(err.to_string().contains("2 channels"), "got: {err}");
    }
}
