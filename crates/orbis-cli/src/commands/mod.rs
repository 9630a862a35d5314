//! CLI command implementations.

pub mod array;
pub mod common;
pub mod devices;
pub mod offline;
pub mod pan;
pub mod realtime;
