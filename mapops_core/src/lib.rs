//! Leaf types shared by the MAP-OPS tile subsystem: coordinates, byte
//! ranges, formats, archive metadata, byte-range IO and compression helpers.

pub mod compression;

pub mod io;

pub mod progress;

pub mod types;

pub use types::*;
