pub mod board;
pub mod config;
pub mod directions;
pub mod error;
pub mod fetch;
pub mod format;
pub mod infra;
pub mod location;
pub mod proximity;
pub mod refresher;
pub mod services;
pub mod weather;
