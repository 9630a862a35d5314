//! Sample arena layout.
//!
//! One contiguous `Vec<f32>` holds a block of samples for every genuine
//! sender channel (top-level inputs and outputs of atomic components):
//!
//! ```text
//! | capture channels | atom 0 outputs | atom 1 outputs | ... |
//!                      ^ out_start(0)   ^ out_start(1)
//! ```
//!
//! Atoms are laid out in execution order, so every signal an atom reads
//! lives below its `out_start`. The runtime splits the arena there and hands
//! the atom an immutable input half and a mutable output half.

use std::collections::BTreeMap;

use super::flatten::{ChannelKey, FlatGraph, PortKey};
use crate::component::PortDirection;
use crate::component::atomic::{AudioBinding, AudioPortSlots};

/// Slot assignment for a flattened graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArenaLayout {
    /// Total number of slots.
    pub slots: usize,
    /// Number of capture slots; they occupy `0..capture`.
    pub capture: usize,
    /// Slot read for every top-level output channel.
    pub playback: Vec<usize>,
    /// Audio binding per scheduled atom, in execution order.
    pub atoms: Vec<AudioBinding>,
}

impl ArenaLayout {
    /// Assigns arena slots to every sender channel of `flat`.
    pub fn new(flat: &FlatGraph) -> Self {
        let mut slot_of: BTreeMap<ChannelKey, usize> = BTreeMap::new();
        let mut next = 0usize;

        let top = flat.top();
        for (port, p) in top.audio_ports.iter().enumerate() {
            if p.direction() == PortDirection::Input {
                for ch in 0..p.width() {
                    slot_of.insert((PortKey { component: 0, port }, ch), next);
                    next += 1;
                }
            }
        }
        let capture = next;

        let mut out_starts = Vec::with_capacity(flat.schedule.len());
        for &component in &flat.schedule {
            out_starts.push(next);
            for (port, p) in flat.components[component].audio_ports.iter().enumerate() {
                if p.direction() == PortDirection::Output {
                    for ch in 0..p.width() {
                        slot_of.insert((PortKey { component, port }, ch), next);
                        next += 1;
                    }
                }
            }
        }

        let source_slot = |key: PortKey, ch: usize| slot_of[&flat.audio_sources[&(key, ch)]];

        let atoms = flat
            .schedule
            .iter()
            .zip(&out_starts)
            .map(|(&component, &out_start)| {
                let ports = flat.components[component]
                    .audio_ports
                    .iter()
                    .enumerate()
                    .map(|(port, p)| {
                        let key = PortKey { component, port };
                        let slots = match p.direction() {
                            PortDirection::Input => {
                                (0..p.width()).map(|ch| source_slot(key, ch)).collect()
                            }
                            PortDirection::Output => {
                                (0..p.width()).map(|ch| slot_of[&(key, ch)]).collect()
                            }
                        };
                        AudioPortSlots { slots }
                    })
                    .collect();
                AudioBinding { ports, out_start }
            })
            .collect();

        let mut playback = Vec::new();
        for (port, p) in top.audio_ports.iter().enumerate() {
            if p.direction() == PortDirection::Output {
                let key = PortKey { component: 0, port };
                playback.extend((0..p.width()).map(|ch| source_slot(key, ch)));
            }
        }

        Self {
            slots: next,
            capture,
            playback,
            atoms,
        }
    }
}
