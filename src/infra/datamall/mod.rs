//! LTA DataMall: bus stops, bus arrivals and taxi availability.

mod client;

pub use client::{BusArrivalResponse, DataMallClient};
