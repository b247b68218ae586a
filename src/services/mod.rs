//! Traits and domain types for the three upstream data providers.
//!
//! Implementations live under `crate::infra`; everything else in the crate
//! only sees these types.

pub mod directions_api;
pub mod transit_api;
pub mod weather_api;
