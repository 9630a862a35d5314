//! All-round ambisonic decoding (AllRAD).
//!
//! An ambisonic signal of order `N` is first decoded to a regular virtual
//! layout (for instance a t-design) with a fixed `(N+1)^2 x R` matrix. Each
//! virtual loudspeaker is then panned onto the real array with VBAP, which
//! folds both steps into one `(N+1)^2 x L` decode matrix.

use std::path::Path;

use orbis_core::Matrix;

use crate::array::LoudspeakerArray;
use crate::error::PanningError;
use crate::vbap::Vbap;

/// AllRAD decoder for one regular virtual layout.
#[derive(Debug, Clone)]
pub struct AllRad {
    regular_array: LoudspeakerArray,
    decode_gains: Matrix,
}

impl AllRad {
    /// Pairs a regular virtual layout with its ambisonic decode matrix
    /// (harmonics x virtual loudspeakers).
    pub fn new(regular_array: LoudspeakerArray, decode_gains: Matrix) -> Result<Self, PanningError> {
        let expected = regular_array.number_of_regular_speakers();
        if decode_gains.columns() != expected {
            return Err(PanningError::DimensionMismatch {
                what: "decode gain columns",
                expected,
                found: decode_gains.columns(),
            });
        }
        Ok(Self {
            regular_array,
            decode_gains,
        })
    }

    /// Number of ambisonic channels.
    pub fn number_of_harmonics(&self) -> usize {
        self.decode_gains.rows()
    }

    /// The regular virtual layout.
    pub fn regular_array(&self) -> &LoudspeakerArray {
        &self.regular_array
    }

    /// Parses a whitespace-separated `(order+1)^2 x regular` matrix.
    pub fn parse_regular_decode_gains(
        source: &str,
        order: usize,
        regular: usize,
    ) -> Result<Matrix, PanningError> {
        let harmonics = (order + 1) * (order + 1);
        let values = source
            .split_whitespace()
            .map(|s| s.parse::<f32>().map_err(|_| PanningError::InvalidNumber(s.to_owned())))
            .collect::<Result<Vec<_>, _>>()?;
        let expected = harmonics * regular;
        let found = values.len();
        Matrix::from_vec(harmonics, regular, values).ok_or(PanningError::DimensionMismatch {
            what: "decode gain entries",
            expected,
            found,
        })
    }

    /// Reads the decode matrix of the regular layout from a file.
    pub fn load_regular_decode_gains(
        path: impl AsRef<Path>,
        order: usize,
        regular: usize,
    ) -> Result<Matrix, PanningError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PanningError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_regular_decode_gains(&source, order, regular)
    }

    /// Combined decode matrix (harmonics x regular loudspeakers of the
    /// array `vbap` was built for).
    ///
    /// Every virtual loudspeaker direction is panned as a plane wave.
    pub fn calc_decode_gains(&self, vbap: &mut Vbap) -> Matrix {
        let real = vbap.number_of_regular_speakers();
        let mut result = Matrix::new(self.decode_gains.rows(), real);
        let mut panned = vec![0.0f32; real];
        for (j, speaker) in self.regular_array.speakers()[..self.decode_gains.columns()]
            .iter()
            .enumerate()
        {
            if vbap.calculate_gains(speaker.position(), true, &mut panned).is_none() {
                tracing::warn!(
                    virtual_speaker = j,
                    "regular layout direction not covered by the array"
                );
                continue;
            }
            for h in 0..self.decode_gains.rows() {
                let weight = self.decode_gains.get(h, j);
                for (out, &g) in result.row_mut(h).iter_mut().zip(&panned) {
                    *out += weight * g;
                }
            }
        }
        result
    }
}
