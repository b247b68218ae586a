//! Concrete provider clients behind the `crate::services` traits.

pub mod datagov;
pub mod datamall;
pub mod google;
