//! Samples a transit vehicle-location feed, averages speeds per route and
//! persists the averages as compact binary partitions alongside a route
//! title lookup.

pub mod aggregate;
pub mod clock;
pub mod codec;
pub mod collector;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod routes;
pub mod speed;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod trigger;
pub mod types;
