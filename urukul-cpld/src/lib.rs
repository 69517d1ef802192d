//! Register and routing core of the Urukul CPLD.
//!
//! The core is a synchronous state machine driven by host pin states
//! ([`Urukul::step`]). [`sim`] wraps it into a board with synthesizer and
//! attenuator models that the host driver in `urukul-pac` can talk to.

pub mod att;
pub mod cfg;
pub mod dds;
pub mod event;
pub mod readback;
pub mod router;
pub mod signals;
pub mod sim;
pub mod siso;
pub mod sr;
pub mod status;
pub mod urukul;

pub use crate::urukul::{CpldConfig, Urukul};

pub const DDS_COUNT: usize = urukul_pac::register::ChipSelect::DDS_COUNT;
