//! Vehicle-location and route-list feed access.

pub mod xml;

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::FeedResult;
use crate::fetch::{HttpClient, fetch_text};
use crate::types::{RoutesLookup, VehicleObservation};

/// Source of live vehicle positions and the route list.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetches every vehicle currently reported by the feed.
    async fn fetch_vehicle_observations(&self) -> FeedResult<Vec<VehicleObservation>>;

    /// Fetches the route tag to title mapping.
    async fn fetch_route_titles(&self) -> FeedResult<RoutesLookup>;
}

/// Parses a `vehicleLocations` body. Vehicles without a route tag are skipped.
pub fn parse_vehicle_locations(body: &str) -> FeedResult<Vec<VehicleObservation>> {
    let observations = xml::elements(body, "vehicle")?
        .into_iter()
        .filter_map(|mut attrs| {
            let route_tag = attrs.remove("routeTag").filter(|t| !t.trim().is_empty())?;
            Some(VehicleObservation {
                route_tag,
                speed: attrs.remove("speedKmHr"),
            })
        })
        .collect();

    Ok(observations)
}

/// Parses a `routeList` body. Routes without a tag are skipped; a route
/// without a title is titled by its tag.
pub fn parse_route_list(body: &str) -> FeedResult<RoutesLookup> {
    let routes = xml::elements(body, "route")?
        .into_iter()
        .filter_map(|mut attrs| {
            let tag = attrs.remove("tag").filter(|t| !t.trim().is_empty())?;
            let title = attrs.remove("title").unwrap_or_else(|| tag.clone());
            Some((tag, title))
        })
        .collect();

    Ok(routes)
}

/// [`FeedClient`] for a NextBus-compatible `publicXMLFeed` service.
pub struct NextBusClient<C> {
    http: C,
    vehicles_url: String,
    routes_url: String,
}

impl<C: HttpClient> NextBusClient<C> {
    pub fn new(http: C, vehicles_url: impl Into<String>, routes_url: impl Into<String>) -> Self {
        Self {
            http,
            vehicles_url: vehicles_url.into(),
            routes_url: routes_url.into(),
        }
    }

    async fn fetch(&self, url: &str) -> FeedResult<String> {
        let fetch_start = Instant::now();
        let body = fetch_text(&self.http, url).await?;

        let elapsed = fetch_start.elapsed();
        if elapsed.as_secs() > 15 {
            warn!(url, elapsed_secs = elapsed.as_secs(), "Feed fetch was slow");
        }
        debug!(url, bytes = body.len(), "Feed body received");

        Ok(body)
    }
}

#[async_trait]
impl<C: HttpClient> FeedClient for NextBusClient<C> {
    #[tracing::instrument(skip(self))]
    async fn fetch_vehicle_observations(&self) -> FeedResult<Vec<VehicleObservation>> {
        let body = self.fetch(&self.vehicles_url).await?;
        parse_vehicle_locations(&body)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_route_titles(&self) -> FeedResult<RoutesLookup> {
        let body = self.fetch(&self.routes_url).await?;
        parse_route_list(&body)
    }
}
