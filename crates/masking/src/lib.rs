//! Personal Identifiable Information protection.
//!
//! Wrapper types and traits for secret management which help ensure
//! secrets aren't accidentally copied, logged or otherwise exposed.

#![warn(missing_docs, missing_debug_implementations)]

mod abs;
mod maskable;
mod secret;
mod strategy;

pub mod serde;

pub use abs::{ExposeInterface, ExposeOptionInterface, PeekInterface};
pub use maskable::{Mask, Maskable};
pub use secret::Secret;
pub use strategy::{Strategy, WithType, WithoutType};

pub use crate::serde::SerializableSecret;

/// This module should be included with asterisk.
///
/// `use masking::prelude::*;`
pub mod prelude {
    pub use super::{ExposeInterface, ExposeOptionInterface, PeekInterface, Secret};
}
