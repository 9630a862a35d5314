//! Biquad (bi-quadratic) filter sections.
//!
//! [`BiquadCoefficients`] holds one normalized second-order section,
//! [`Biquad`] runs it over samples, and [`BiquadMatrix`] is the parameter type
//! carrying `filters x sections` coefficient sets between components
//! (reflection filters, output equalisation).

use crate::parameter::{Parameter, ParameterConfig, ParameterType};

/// Normalized coefficients of one biquad section (`a0 == 1`).
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    /// Feedforward coefficient for x[n].
    pub b0: f32,
    /// Feedforward coefficient for x[n-1].
    pub b1: f32,
    /// Feedforward coefficient for x[n-2].
    pub b2: f32,
    /// Feedback coefficient for y[n-1].
    pub a1: f32,
    /// Feedback coefficient for y[n-2].
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Creates coefficients that are already normalized by `a0`.
    pub const fn new(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        Self { b0, b1, b2, a1, a2 }
    }

    /// Creates coefficients from an unnormalized set, dividing by `a0`.
    pub fn from_unnormalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }

    /// Passthrough section: `y[n] = x[n]`.
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 0.0)
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::identity()
    }
}

/// One biquad section with Direct Form I state.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a passthrough section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a section with the given coefficients.
    pub fn with_coefficients(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            ..Self::default()
        }
    }

    /// Replaces the coefficients, keeping the filter state.
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    /// Processes a block in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples {
            *s = self.process(*s);
        }
    }

    /// Clears the delay lines.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Coefficients for `filters` channels with `sections` cascaded biquads each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BiquadMatrix {
    filters: usize,
    sections: usize,
    coeffs: Vec<BiquadCoefficients>,
}

impl BiquadMatrix {
    /// Creates a matrix of passthrough sections.
    pub fn new(filters: usize, sections: usize) -> Self {
        Self {
            filters,
            sections,
            coeffs: vec![BiquadCoefficients::identity(); filters * sections],
        }
    }

    /// Number of filter channels.
    pub fn filters(&self) -> usize {
        self.filters
    }

    /// Number of sections per filter channel.
    pub fn sections(&self) -> usize {
        self.sections
    }

    /// Sections of one filter channel.
    pub fn filter(&self, index: usize) -> &[BiquadCoefficients] {
        &self.coeffs[index * self.sections..(index + 1) * self.sections]
    }

    /// Mutable sections of one filter channel.
    pub fn filter_mut(&mut self, index: usize) -> &mut [BiquadCoefficients] {
        &mut self.coeffs[index * self.sections..(index + 1) * self.sections]
    }

    /// Sets every section of every channel to passthrough.
    pub fn reset(&mut self) {
        self.coeffs.fill(BiquadCoefficients::identity());
    }
}

impl Parameter for BiquadMatrix {
    const TYPE: ParameterType = ParameterType::new("BiquadMatrix");
}

pub(crate) fn create_biquad_matrix(config: &ParameterConfig) -> BiquadMatrix {
    match *config {
        ParameterConfig::Biquad { filters, sections } => BiquadMatrix::new(filters, sections),
        _ => BiquadMatrix::default(),
    }
}
