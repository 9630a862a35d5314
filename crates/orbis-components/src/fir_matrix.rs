//! Multichannel FIR filtering by uniformly partitioned fast convolution.
//!
//! Every routing connects one input to one output through one filter slot
//! with a gain. Filters are split into partitions of one block each; the
//! spectra of the last `P` input blocks are kept in a frequency-domain delay
//! line, so a block costs one forward FFT per input, one inverse FFT per
//! output and `P` complex multiply-adds per routing. The output has no
//! latency beyond the block itself (overlap-save with FFT size `2 * period`).
//!
//! # Example
//!
//! ```rust,ignore
//! let config = FirMatrixConfig::new(2, 1, 4096, 2)
//!     .routing(FirRouting::new(0, 0, 0, 1.0))
//!     .routing(FirRouting::new(1, 0, 1, 0.5))
//!     .control_input(true);
//! let fir = FirFilterMatrix::component(ctx, "convolver", &config)?;
//! ```

use std::sync::Arc;

use orbis_core::{
    AtomicProcessor, AudioPortId, Component, ComponentBuilder, IndexedValue, Matrix, Parameter,
    ParameterConfig, ParameterPortId, ProcessContext, ProcessError, ProtocolType,
    SignalFlowContext,
};
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::error::{ComponentError, Result};

/// One input-to-output path through a filter slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirRouting {
    /// Input channel.
    pub input: usize,
    /// Output channel.
    pub output: usize,
    /// Filter slot.
    pub filter: usize,
    /// Linear gain.
    pub gain: f32,
}

impl FirRouting {
    /// Creates a routing.
    pub fn new(input: usize, output: usize, filter: usize, gain: f32) -> Self {
        Self {
            input,
            output,
            filter,
            gain,
        }
    }
}

/// Setup of a [`FirFilterMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct FirMatrixConfig {
    /// Input channels.
    pub inputs: usize,
    /// Output channels.
    pub outputs: usize,
    /// Longest filter in taps.
    pub max_filter_length: usize,
    /// Number of filter slots.
    pub max_filters: usize,
    /// Filter paths.
    pub routings: Vec<FirRouting>,
    /// Initial filters, one row per slot. Shorter rows are zero-padded.
    pub initial_filters: Option<Matrix>,
    /// Adds the `filterInput` message-queue port.
    pub control_input: bool,
}

impl FirMatrixConfig {
    /// Matrix without routings, initial filters or control input.
    pub fn new(inputs: usize, outputs: usize, max_filter_length: usize, max_filters: usize) -> Self {
        Self {
            inputs,
            outputs,
            max_filter_length,
            max_filters,
            routings: Vec::new(),
            initial_filters: None,
            control_input: false,
        }
    }

    /// Adds a routing.
    #[must_use]
    pub fn routing(mut self, routing: FirRouting) -> Self {
        self.routings.push(routing);
        self
    }

    /// Sets the initial filters.
    #[must_use]
    pub fn filters(mut self, filters: Matrix) -> Self {
        self.initial_filters = Some(filters);
        self
    }

    /// Enables or disables the `filterInput` port.
    #[must_use]
    pub fn control_input(mut self, enabled: bool) -> Self {
        self.control_input = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_filter_length == 0 {
            return Err(ComponentError::invalid(
                "FirFilterMatrix",
                "maximum filter length must be positive",
            ));
        }
        for r in &self.routings {
            if r.input >= self.inputs || r.output >= self.outputs || r.filter >= self.max_filters {
                return Err(ComponentError::invalid(
                    "FirFilterMatrix",
                    format!(
                        "routing {}->{} through filter {} exceeds {} inputs, {} outputs, {} filters",
                        r.input, r.output, r.filter, self.inputs, self.outputs, self.max_filters
                    ),
                ));
            }
        }
        if let Some(filters) = &self.initial_filters {
            if filters.rows() > self.max_filters {
                return Err(ComponentError::invalid(
                    "FirFilterMatrix",
                    format!(
                        "{} initial filters exceed {} slots",
                        filters.rows(),
                        self.max_filters
                    ),
                ));
            }
            if filters.columns() > self.max_filter_length {
                return Err(ComponentError::FilterTooLong {
                    index: 0,
                    length: filters.columns(),
                    max: self.max_filter_length,
                });
            }
        }
        Ok(())
    }
}

/// Partitioned convolution engine, independent of the signal flow.
pub struct PartitionedConvolver {
    block: usize,
    fft_size: usize,
    partitions: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    work: Vec<Complex<f32>>,
    /// Per input: previous and current block.
    input_history: Vec<f32>,
    /// Per input: `partitions` spectra, ring-indexed by `position`.
    spectra: Vec<Complex<f32>>,
    /// Per filter slot: `partitions` spectra.
    filters: Vec<Complex<f32>>,
    /// Per filter slot: partitions holding nonzero taps.
    active_partitions: Vec<usize>,
    /// Per output: accumulated spectrum.
    accumulators: Vec<Complex<f32>>,
    routings: Vec<FirRouting>,
    inputs: usize,
    outputs: usize,
    max_filter_length: usize,
    position: usize,
}

impl PartitionedConvolver {
    /// Allocates all buffers for the given block size.
    pub fn new(block: usize, config: &FirMatrixConfig) -> Result<Self> {
        config.validate()?;
        if block == 0 {
            return Err(ComponentError::invalid(
                "FirFilterMatrix",
                "block size must be positive",
            ));
        }
        let fft_size = 2 * block;
        let partitions = config.max_filter_length.div_ceil(block);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let zero = Complex::new(0.0, 0.0);

        let mut convolver = Self {
            block,
            fft_size,
            partitions,
            fft,
            ifft,
            scratch: vec![zero; scratch_len],
            work: vec![zero; fft_size],
            input_history: vec![0.0; config.inputs * fft_size],
            spectra: vec![zero; config.inputs * partitions * fft_size],
            filters: vec![zero; config.max_filters * partitions * fft_size],
            active_partitions: vec![0; config.max_filters],
            accumulators: vec![zero; config.outputs * fft_size],
            routings: config.routings.clone(),
            inputs: config.inputs,
            outputs: config.outputs,
            max_filter_length: config.max_filter_length,
            position: 0,
        };
        if let Some(filters) = &config.initial_filters {
            for index in 0..filters.rows() {
                convolver.set_filter(index, filters.row(index))?;
            }
        }
        Ok(convolver)
    }

    /// Number of partitions per filter.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Number of filter slots.
    pub fn max_filters(&self) -> usize {
        self.active_partitions.len()
    }

    /// Replaces the filter in slot `index`. Taps beyond the given slice are
    /// zero.
    ///
    /// Does not allocate.
    pub fn set_filter(&mut self, index: usize, taps: &[f32]) -> Result<()> {
        if index >= self.max_filters() {
            return Err(ComponentError::invalid(
                "FirFilterMatrix",
                format!("filter index {index} exceeds {} slots", self.max_filters()),
            ));
        }
        if taps.len() > self.max_filter_length {
            return Err(ComponentError::FilterTooLong {
                index,
                length: taps.len(),
                max: self.max_filter_length,
            });
        }
        let (b, n) = (self.block, self.fft_size);
        let base = index * self.partitions * n;
        let mut active = 0;
        for p in 0..self.partitions {
            let segment = taps.get(p * b..taps.len().min((p + 1) * b)).unwrap_or(&[]);
            let spectrum = &mut self.filters[base + p * n..base + (p + 1) * n];
            if segment.iter().all(|&t| t == 0.0) {
                spectrum.fill(Complex::new(0.0, 0.0));
                continue;
            }
            active = p + 1;
            for (k, w) in self.work.iter_mut().enumerate() {
                *w = Complex::new(segment.get(k).copied().unwrap_or(0.0), 0.0);
            }
            self.fft.process_with_scratch(&mut self.work, &mut self.scratch);
            spectrum.copy_from_slice(&self.work);
        }
        self.active_partitions[index] = active;
        Ok(())
    }

    /// Filters one block. `input(ch)` returns one block of input channel
    /// `ch`; `outputs` yields one block per output channel.
    pub fn process<'i, 'o>(
        &mut self,
        input: impl Fn(usize) -> &'i [f32],
        mut outputs: impl Iterator<Item = &'o mut [f32]>,
    ) {
        let (b, n, parts) = (self.block, self.fft_size, self.partitions);
        let zero = Complex::new(0.0, 0.0);

        for i in 0..self.inputs {
            let history = &mut self.input_history[i * n..(i + 1) * n];
            history.copy_within(b.., 0);
            history[b..].copy_from_slice(input(i));
            for (w, &x) in self.work.iter_mut().zip(history.iter()) {
                *w = Complex::new(x, 0.0);
            }
            self.fft.process_with_scratch(&mut self.work, &mut self.scratch);
            let at = (i * parts + self.position) * n;
            self.spectra[at..at + n].copy_from_slice(&self.work);
        }

        self.accumulators.fill(zero);
        for r in &self.routings {
            let active = self.active_partitions[r.filter];
            if r.gain == 0.0 || active == 0 {
                continue;
            }
            let acc = &mut self.accumulators[r.output * n..(r.output + 1) * n];
            for p in 0..active {
                let slot = (self.position + parts - p) % parts;
                let x = &self.spectra[(r.input * parts + slot) * n..][..n];
                let h = &self.filters[(r.filter * parts + p) * n..][..n];
                for ((a, &xk), &hk) in acc.iter_mut().zip(x).zip(h) {
                    *a += xk * hk * r.gain;
                }
            }
        }

        let scale = 1.0 / n as f32;
        for o in 0..self.outputs {
            let Some(out) = outputs.next() else { break };
            let acc = &mut self.accumulators[o * n..(o + 1) * n];
            self.ifft.process_with_scratch(acc, &mut self.scratch);
            for (y, a) in out.iter_mut().zip(&acc[b..]) {
                *y = a.re * scale;
            }
        }
        self.position = (self.position + 1) % parts;
    }
}

/// Filter matrix component around a [`PartitionedConvolver`].
pub struct FirFilterMatrix {
    input: AudioPortId,
    output: AudioPortId,
    filter_input: Option<ParameterPortId>,
    convolver: PartitionedConvolver,
}

impl FirFilterMatrix {
    /// Creates the component.
    ///
    /// Ports: audio `in` (`config.inputs`), audio `out` (`config.outputs`)
    /// and, with `control_input`, the message-queue input `filterInput`
    /// carrying `IndexedValue<Vec<f32>>` filter updates.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        config: &FirMatrixConfig,
    ) -> Result<Component> {
        let convolver = PartitionedConvolver::new(context.period(), config)?;
        let mut b = ComponentBuilder::new(context, name);
        let input = b.audio_input("in", config.inputs)?;
        let output = b.audio_output("out", config.outputs)?;
        let filter_input = config
            .control_input
            .then(|| {
                b.parameter_input(
                    "filterInput",
                    IndexedValue::<Vec<f32>>::TYPE,
                    ProtocolType::MessageQueue,
                    ParameterConfig::Empty,
                )
            })
            .transpose()?;
        tracing::debug!(
            name,
            partitions = convolver.partitions(),
            filters = convolver.max_filters(),
            "fir filter matrix"
        );
        Ok(b.into_atomic(FirFilterMatrix {
            input,
            output,
            filter_input,
            convolver,
        }))
    }
}

impl AtomicProcessor for FirFilterMatrix {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        if let Some(port) = self.filter_input {
            while let Some(update) = ctx.parameters.receive::<IndexedValue<Vec<f32>>>(port)? {
                if update.index >= self.convolver.max_filters() {
                    tracing::warn!(
                        filter = update.index,
                        filters = self.convolver.max_filters(),
                        "filter update for unknown filter skipped"
                    );
                    continue;
                }
                if let Err(err) = self.convolver.set_filter(update.index, &update.value) {
                    tracing::warn!(filter = update.index, "filter update skipped: {err}");
                }
            }
        }

        let inputs = ctx.audio.inputs();
        let input = self.input;
        self.convolver
            .process(|ch| inputs.input(input, ch), ctx.audio.output_port(self.output));
        Ok(())
    }
}
