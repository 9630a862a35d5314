//! Line-oriented text array format.
//!
//! ```text
//! % comment
//! 2                      switch to 2-D mode
//! i                      switch to infinite (plane wave) mode
//! c <id> <ch> <x> <y> <z>       cartesian loudspeaker
//! p <id> <ch> <az> <el> <r>     polar loudspeaker, degrees
//! t <id> <v1> <v2> [<v3>]       triplet, or pair in 2-D
//! ```
//!
//! Loudspeaker and triplet ids are one-based and must be contiguous.

use std::collections::BTreeMap;
use std::str::FromStr;

use nalgebra::Vector3;

use crate::array::{ArrayBuilder, LoudspeakerArray, spherical_to_cartesian};
use crate::error::{ArrayError, Result};

impl LoudspeakerArray {
    /// Parses the text array format.
    pub fn from_text_str(source: &str) -> Result<Self> {
        parse(source)
    }
}

fn field<T: FromStr>(fields: &[&str], index: usize, line: usize, what: &str) -> Result<T> {
    let raw = fields
        .get(index)
        .ok_or_else(|| ArrayError::syntax(line, format!("missing {what}")))?;
    raw.parse()
        .map_err(|_| ArrayError::syntax(line, format!("invalid {what} \"{raw}\"")))
}

fn parse(source: &str) -> Result<LoudspeakerArray> {
    let mut builder = ArrayBuilder::default();
    let mut triplets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (number, raw) in source.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('%').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let fields: Vec<&str> = content.split_whitespace().collect();
        match fields[0] {
            "2" if fields.len() == 1 => builder.set_2d(true),
            "i" if fields.len() == 1 => builder.set_infinite(true),
            "c" | "p" => {
                if fields.len() != 6 {
                    return Err(ArrayError::syntax(
                        line,
                        format!("expected 5 fields after '{}', found {}", fields[0], fields.len() - 1),
                    ));
                }
                let id: usize = field(&fields, 1, line, "loudspeaker id")?;
                let channel: usize = field(&fields, 2, line, "channel")?;
                let a: f32 = field(&fields, 3, line, "coordinate")?;
                let b: f32 = field(&fields, 4, line, "coordinate")?;
                let c: f32 = field(&fields, 5, line, "coordinate")?;
                let position = if fields[0] == "c" {
                    Vector3::new(a, b, c)
                } else {
                    spherical_to_cartesian(a, b, c)
                };
                builder.push_speaker(id, Some(channel), position);
            }
            "t" => {
                if !(4..=5).contains(&fields.len()) {
                    return Err(ArrayError::syntax(
                        line,
                        format!("expected 3 or 4 fields after 't', found {}", fields.len() - 1),
                    ));
                }
                let id: usize = field(&fields, 1, line, "triplet id")?;
                let vertices = (2..fields.len())
                    .map(|i| field(&fields, i, line, "vertex"))
                    .collect::<Result<Vec<usize>>>()?;
                if id == 0 {
                    return Err(ArrayError::syntax(line, "triplet ids are one-based"));
                }
                if triplets.insert(id, vertices).is_some() {
                    return Err(ArrayError::syntax(line, format!("duplicate triplet id {id}")));
                }
            }
            other => {
                return Err(ArrayError::syntax(line, format!("unknown record \"{other}\"")));
            }
        }
    }

    for (expected, (id, vertices)) in (1..).zip(triplets) {
        if id != expected {
            return Err(ArrayError::InvalidTriplet {
                index: expected - 1,
                message: format!("triplet ids are not contiguous: id {expected} is missing"),
            });
        }
        builder.push_triplet(vertices);
    }
    builder.build()
}
