//! Scriptable collaborators for exercising the pipeline without a network
//! or a real clock.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::clock::Clock;
use crate::error::{FeedError, FeedResult};
use crate::feed::FeedClient;
use crate::types::{RoutesLookup, VehicleObservation};

/// A [`Clock`] that only moves when told to.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self(AtomicI64::new(now_ms))
    }

    pub fn advance(&self, by_ms: i64) {
        self.0.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A [`FeedClient`] serving canned responses. `None` makes the call fail
/// as if the feed answered 503.
#[derive(Default)]
pub struct StubFeed {
    vehicles: Mutex<Option<Vec<VehicleObservation>>>,
    routes: Mutex<Option<RoutesLookup>>,
    vehicle_fetches: AtomicUsize,
    route_fetches: AtomicUsize,
}

impl StubFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vehicles(&self, vehicles: Option<Vec<VehicleObservation>>) {
        *self.vehicles.lock().unwrap_or_else(|e| e.into_inner()) = vehicles;
    }

    pub fn set_routes(&self, routes: Option<RoutesLookup>) {
        *self.routes.lock().unwrap_or_else(|e| e.into_inner()) = routes;
    }

    pub fn vehicle_fetches(&self) -> usize {
        self.vehicle_fetches.load(Ordering::SeqCst)
    }

    pub fn route_fetches(&self) -> usize {
        self.route_fetches.load(Ordering::SeqCst)
    }
}

fn unavailable() -> FeedError {
    FeedError::Status(503, "stub feed unavailable".to_string())
}

#[async_trait]
impl FeedClient for StubFeed {
    async fn fetch_vehicle_observations(&self) -> FeedResult<Vec<VehicleObservation>> {
        self.vehicle_fetches.fetch_add(1, Ordering::SeqCst);
        self.vehicles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(unavailable)
    }

    async fn fetch_route_titles(&self) -> FeedResult<RoutesLookup> {
        self.route_fetches.fetch_add(1, Ordering::SeqCst);
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(unavailable)
    }
}
