//! Sampling context shared by every component of a signal flow.

/// Block size and sample rate of a signal flow.
///
/// Both values are fixed at construction. Every component in one graph must
/// be created with the same context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFlowContext {
    period: usize,
    sample_rate: f32,
}

impl SignalFlowContext {
    /// Creates a context with the given block size (in samples) and sample rate (Hz).
    pub fn new(period: usize, sample_rate: f32) -> Self {
        Self {
            period,
            sample_rate,
        }
    }

    /// Number of samples processed per block.
    #[inline]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Duration of one block in seconds.
    pub fn period_seconds(&self) -> f32 {
        self.period as f32 / self.sample_rate
    }
}
