#![warn(missing_docs, missing_debug_implementations)]
#![doc = r" Enums shared across the sanalpos crates."]

pub mod enums;

pub use enums::*;
