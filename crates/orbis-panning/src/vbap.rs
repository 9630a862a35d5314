//! Vector base amplitude panning.
//!
//! Each triplet (or 2-D pair) of loudspeakers spans a region of the sphere.
//! The gains for a source direction `p` inside a triplet with loudspeaker
//! directions `l1, l2, l3` solve `p = g1*l1 + g2*l2 + g3*l3`, so every
//! triplet stores the inverse of the matrix with columns `l1, l2, l3`. The
//! selected triplet is the first one whose gains are all nonnegative.
//!
//! Gains of virtual loudspeakers are folded into regular loudspeakers
//! through the array's rerouting matrix before the final power
//! normalisation.

use nalgebra::{Matrix3, Vector3};
use orbis_core::Matrix;

use crate::array::{LoudspeakerArray, Triplet};
use crate::error::PanningError;

/// Tolerance for accepting slightly negative gains at triplet borders.
const INSIDE_TOLERANCE: f32 = 1e-5;

/// Triplets with a smaller determinant are rejected as singular.
const SINGULAR_THRESHOLD: f32 = 1e-5;

/// VBAP gain calculator bound to one loudspeaker array.
#[derive(Debug, Clone)]
pub struct Vbap {
    positions: Vec<Vector3<f32>>,
    triplets: Vec<Triplet>,
    inverses: Vec<Matrix3<f32>>,
    rerouting: Matrix,
    regular: usize,
    is_2d: bool,
    is_infinite: bool,
    listener: Vector3<f32>,
    scratch: Vec<f32>,
}

impl Vbap {
    /// Creates a calculator with the listener at the origin.
    pub fn new(array: &LoudspeakerArray) -> Result<Self, PanningError> {
        let mut vbap = Self {
            positions: array.speakers().iter().map(|s| s.position()).collect(),
            triplets: array.triplets().to_vec(),
            inverses: Vec::with_capacity(array.number_of_triplets()),
            rerouting: array.rerouting().clone(),
            regular: array.number_of_regular_speakers(),
            is_2d: array.is_2d(),
            is_infinite: array.is_infinite(),
            listener: Vector3::zeros(),
            scratch: vec![0.0; array.number_of_speakers()],
        };
        vbap.calc_inv_matrices()?;
        Ok(vbap)
    }

    /// Number of gains written by [`calculate_gains`](Self::calculate_gains).
    pub fn number_of_regular_speakers(&self) -> usize {
        self.regular
    }

    /// Current listener position.
    pub fn listener_position(&self) -> Vector3<f32> {
        self.listener
    }

    /// Moves the listener and recomputes the triplet inverses.
    ///
    /// On error the previous listener position and inverses stay in effect.
    pub fn set_listener_position(&mut self, position: Vector3<f32>) -> Result<(), PanningError> {
        let previous = self.listener;
        self.listener = position;
        if let Err(e) = self.calc_inv_matrices() {
            self.listener = previous;
            self.calc_inv_matrices()?;
            return Err(e);
        }
        Ok(())
    }

    /// Direction of loudspeaker `index` as seen from the listener.
    fn speaker_direction(&self, index: usize) -> Vector3<f32> {
        let mut v = if self.is_infinite {
            self.positions[index]
        } else {
            self.positions[index] - self.listener
        };
        if self.is_2d {
            v.z = 0.0;
        }
        v.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
    }

    /// Recomputes the inverse matrix of every triplet.
    pub fn calc_inv_matrices(&mut self) -> Result<(), PanningError> {
        let mut inverses = Vec::with_capacity(self.triplets.len());
        for (index, triplet) in self.triplets.iter().enumerate() {
            let vertices = triplet.vertices();
            let l1 = self.speaker_direction(vertices[0]);
            let l2 = self.speaker_direction(vertices[1]);
            let l3 = if self.is_2d {
                Vector3::z()
            } else {
                self.speaker_direction(vertices[2])
            };
            let basis = Matrix3::from_columns(&[l1, l2, l3]);
            let singular = || PanningError::SingularTriplet {
                index,
                vertices: vertices.to_vec(),
            };
            if basis.determinant().abs() < SINGULAR_THRESHOLD {
                return Err(singular());
            }
            inverses.push(basis.try_inverse().ok_or_else(singular)?);
        }
        self.inverses = inverses;
        Ok(())
    }

    /// Source direction relative to the listener, normalized.
    fn source_direction(&self, position: Vector3<f32>, plane_wave: bool) -> Option<Vector3<f32>> {
        let mut d = if plane_wave || self.is_infinite {
            position
        } else {
            position - self.listener
        };
        if self.is_2d {
            d.z = 0.0;
        }
        d.try_normalize(f32::EPSILON)
    }

    /// Computes the gains of the regular loudspeakers for one source.
    ///
    /// `gains` must hold one entry per regular loudspeaker. Returns the
    /// index of the selected triplet, or `None` (with all gains zero) if the
    /// direction is not covered by any triplet or the source sits on the
    /// listener.
    pub fn calculate_gains(
        &mut self,
        position: Vector3<f32>,
        plane_wave: bool,
        gains: &mut [f32],
    ) -> Option<usize> {
        gains.fill(0.0);
        if gains.len() != self.regular {
            return None;
        }
        let direction = self.source_direction(position, plane_wave)?;

        let dims = if self.is_2d { 2 } else { 3 };
        let (selected, raw) = self.inverses.iter().enumerate().find_map(|(i, inv)| {
            let g = inv * direction;
            g.iter()
                .take(dims)
                .all(|&x| x >= -INSIDE_TOLERANCE)
                .then_some((i, g))
        })?;

        self.scratch.fill(0.0);
        for (&vertex, &g) in self.triplets[selected].vertices().iter().zip(raw.iter()) {
            self.scratch[vertex] = g.max(0.0);
        }

        gains.copy_from_slice(&self.scratch[..self.regular]);
        for (v, &virtual_gain) in self.scratch[self.regular..].iter().enumerate() {
            if virtual_gain == 0.0 {
                continue;
            }
            for (g, &route) in gains.iter_mut().zip(self.rerouting.row(v)) {
                *g += virtual_gain * route;
            }
        }

        let norm = gains.iter().map(|g| g * g).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            gains.fill(0.0);
            return None;
        }
        gains.iter_mut().for_each(|g| *g /= norm);
        Some(selected)
    }

    /// Regular loudspeaker closest to the source direction, if it lies
    /// within `max_angle_deg` degrees. Ties go to the lower index.
    pub fn nearest_speaker(
        &self,
        position: Vector3<f32>,
        plane_wave: bool,
        max_angle_deg: f32,
    ) -> Option<usize> {
        let direction = self.source_direction(position, plane_wave)?;
        let threshold = max_angle_deg.to_radians().cos();
        let mut best: Option<(usize, f32)> = None;
        for index in 0..self.regular {
            let cos = self.speaker_direction(index).dot(&direction);
            if best.is_none_or(|(_, c)| cos > c) {
                best = Some((index, cos));
            }
        }
        best.filter(|&(_, cos)| cos >= threshold).map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn octahedron() -> LoudspeakerArray {
        let v = Vector3::new;
        let mut b = LoudspeakerArray::builder()
            .speaker(1, 1, v(1.0, 0.0, 0.0))
            .speaker(2, 2, v(0.0, 1.0, 0.0))
            .speaker(3, 3, v(-1.0, 0.0, 0.0))
            .speaker(4, 4, v(0.0, -1.0, 0.0))
            .speaker(5, 5, v(0.0, 0.0, 1.0))
            .speaker(6, 6, v(0.0, 0.0, -1.0));
        for (a, c) in [(1, 2), (2, 3), (3, 4), (4, 1)] {
            b = b.triplet(&[a, c, 5]).triplet(&[a, c, 6]);
        }
        b.build().unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn source_on_speaker_is_one_hot() {
        let mut vbap = Vbap::new(&octahedron()).unwrap();
        let mut gains = [0.0; 6];
        assert!(vbap.calculate_gains(Vector3::new(0.0, 0.0, 2.0), false, &mut gains).is_some());
        assert_close(&gains, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn centre_of_face_splits_evenly() {
        let mut vbap = Vbap::new(&octahedron()).unwrap();
        let mut gains = [0.0; 6];
        let selected = vbap.calculate_gains(Vector3::new(1.0, 1.0, 1.0), true, &mut gains);
        assert_eq!(selected, Some(0));
        let g = 1.0 / 3f32.sqrt();
        assert_close(&gains, &[g, g, 0.0, 0.0, g, 0.0]);
    }

    #[test]
    fn two_d_pair_at_45_degrees() {
        let v = Vector3::new;
        let array = LoudspeakerArray::builder()
            .two_d(true)
            .speaker(1, 1, v(1.0, 0.0, 0.0))
            .speaker(2, 2, v(0.0, 1.0, 0.0))
            .speaker(3, 3, v(-1.0, 0.0, 0.0))
            .speaker(4, 4, v(0.0, -1.0, 0.0))
            .triplet(&[1, 2])
            .triplet(&[2, 3])
            .triplet(&[3, 4])
            .triplet(&[4, 1])
            .build()
            .unwrap();
        let mut vbap = Vbap::new(&array).unwrap();
        let mut gains = [0.0; 4];
        vbap.calculate_gains(Vector3::new(1.0, 1.0, 0.7), false, &mut gains);
        let g = std::f32::consts::FRAC_1_SQRT_2;
        assert_close(&gains, &[g, g, 0.0, 0.0]);
    }

    #[test]
    fn virtual_speaker_is_rerouted() {
        let v = Vector3::new;
        let array = LoudspeakerArray::builder()
            .speaker(1, 1, v(1.0, 0.0, 0.0))
            .speaker(2, 2, v(0.0, 1.0, 0.0))
            .speaker(3, 3, v(0.0, 0.0, 1.0))
            .virtual_speaker(4, v(0.0, 0.0, -1.0))
            .route(4, 1, 1.0)
            .triplet(&[1, 2, 3])
            .triplet(&[1, 2, 4])
            .build()
            .unwrap();
        let mut vbap = Vbap::new(&array).unwrap();
        let mut gains = [0.0; 3];
        assert_eq!(vbap.calculate_gains(v(0.0, 0.0, -1.0), false, &mut gains), Some(1));
        assert_close(&gains, &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn singular_triplet_is_rejected() {
        let v = Vector3::new;
        let array = LoudspeakerArray::builder()
            .speaker(1, 1, v(1.0, 0.0, 0.0))
            .speaker(2, 2, v(0.0, 1.0, 0.0))
            .speaker(3, 3, v(1.0, 1.0, 0.0))
            .triplet(&[1, 2, 3])
            .build()
            .unwrap();
        let err = Vbap::new(&array).unwrap_err();
        assert!(matches!(err, PanningError::SingularTriplet { index: 0, .. }));
    }

    #[test]
    fn listener_moves_relative_geometry() {
        let mut vbap = Vbap::new(&octahedron()).unwrap();
        let mut gains = [0.0; 6];
        vbap.set_listener_position(Vector3::new(0.0, 0.0, 0.5)).unwrap();
        vbap.calculate_gains(Vector3::new(1.0, 0.0, 0.0), false, &mut gains);
        assert_close(&gains, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(vbap.listener_position(), Vector3::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn wrong_gain_length_yields_none() {
        let mut vbap = Vbap::new(&octahedron()).unwrap();
        let mut gains = [1.0; 4];
        assert_eq!(vbap.calculate_gains(Vector3::x(), false, &mut gains), None);
        assert_eq!(gains, [0.0; 4]);
    }

    #[test]
    fn nearest_speaker_respects_threshold() {
        let vbap = Vbap::new(&octahedron()).unwrap();
        let near = Vector3::new(1.0, 0.05, 0.0);
        assert_eq!(vbap.nearest_speaker(near, false, 5.0), Some(0));
        let far = Vector3::new(1.0, 0.5, 0.0);
        assert_eq!(vbap.nearest_speaker(far, false, 5.0), None);
    }
}
