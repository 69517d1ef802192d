//! Register layouts and host-side access for the Urukul CPLD.

pub mod device;
pub mod register;
