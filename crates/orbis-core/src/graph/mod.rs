//! Flattening, scheduling and arena layout.
//!
//! A component hierarchy is compiled in three steps before the first block:
//!
//! - [`flatten`] resolves every connection down to genuine ports and
//!   produces a [`FlatGraph`] with a topological execution order.
//! - `ArenaLayout` assigns one arena slot to every sender channel so that
//!   each atom's inputs lie below its outputs.
//! - The runtime binds parameter ports to slots of the parameter bus.
//!
//! None of this runs on the audio thread.

mod arena;
mod flatten;
mod schedule;

pub(crate) use arena::ArenaLayout;
pub(crate) use flatten::PortKey;
pub use flatten::{FlatGraph, ResolvedConnection, flatten};
