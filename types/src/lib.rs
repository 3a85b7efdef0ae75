//! Colorpot domain types.
//!
//! Defines stakes, round phases, outcomes and archived round records shared by the execution
//! layer and the live table service, plus the JSON views the service exposes.

pub mod api;
mod constants;
mod round;
pub(crate) mod serde_hex;

pub use constants::*;
pub use round::*;
