//! HTTP client for reverse geocoding, place search and walking routes.
//!
//! Talks to Nominatim-compatible (`/reverse`, `/search`) and
//! OSRM-compatible (`/route/v1/foot`) endpoints. Reverse geocoding results
//! are cached in an LRU keyed by the coordinate rounded to four decimals
//! (about 11 m). Nothing is retried; the `*_or_placeholder` variants turn
//! any failure into a usable fallback value.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use lru::LruCache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use turfcore::{LocationModel, RunSession, geo_utils};

use crate::config::TurfConfig;
use crate::error::{AppError, AppResult};
use crate::persistence::decode_path;

/// Walking speed used for straight-line route estimates (m/s)
const PLACEHOLDER_WALK_SPEED_MPS: f64 = 1.4;

/// Cache key resolution: 1e-4 degrees
const CACHE_KEY_SCALE: f64 = 10_000.0;

type CacheKey = (i64, i64);

fn cache_key(location: &LocationModel) -> CacheKey {
    (
        (location.latitude * CACHE_KEY_SCALE).round() as i64,
        (location.longitude * CACHE_KEY_SCALE).round() as i64,
    )
}

/// Label used when a location cannot be named.
pub fn placeholder_place_name(location: &LocationModel) -> String {
    format!("{:.5}, {:.5}", location.latitude, location.longitude)
}

/// A place returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A walking route between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub distance_m: f64,
    pub duration_s: f64,
    pub path: Vec<LocationModel>,
}

impl Route {
    /// Straight line at walking speed.
    pub fn straight_line(from: &LocationModel, to: &LocationModel) -> Self {
        let distance_m = geo_utils::haversine_distance(from, to);
        Self {
            distance_m,
            duration_s: distance_m / PLACEHOLDER_WALK_SPEED_MPS,
            path: vec![
                LocationModel::new(from.latitude, from.longitude),
                LocationModel::new(to.latitude, to.longitude),
            ],
        }
    }
}

/// Names for the start and end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPlaces {
    pub start: String,
    pub end: String,
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    display_name: String,
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: String,
}

pub fn parse_reverse(body: &str) -> AppResult<String> {
    let response: ReverseResponse = serde_json::from_str(body)?;
    match (response.display_name, response.error) {
        (Some(name), None) if !name.is_empty() => Ok(name),
        (_, error) => Err(AppError::not_found(
            "Place",
            error.unwrap_or_else(|| "no display name".to_string()),
        )),
    }
}

pub fn parse_search(body: &str) -> AppResult<Vec<Place>> {
    let results: Vec<SearchResult> = serde_json::from_str(body)?;
    Ok(results
        .into_iter()
        .filter_map(|r| {
            let latitude = r.lat.parse().ok()?;
            let longitude = r.lon.parse().ok()?;
            Some(Place {
                display_name: r.display_name,
                latitude,
                longitude,
            })
        })
        .collect())
}

pub fn parse_route(body: &str) -> AppResult<Route> {
    let response: OsrmResponse = serde_json::from_str(body)?;
    if response.code != "Ok" {
        return Err(AppError::not_found("Route", response.code));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("Route", "empty route list"))?;
    Ok(Route {
        distance_m: route.distance,
        duration_s: route.duration,
        path: decode_path(&route.geometry),
    })
}

// ============================================================================
// Client
// ============================================================================

pub struct GeoClient {
    client: Client,
    geocoder_url: String,
    routing_url: String,
    cache: Mutex<LruCache<CacheKey, String>>,
}

impl GeoClient {
    pub fn new(config: &TurfConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(60))
            .build()?;
        let capacity = NonZeroUsize::new(config.geocode_cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            client,
            geocoder_url: config.geocoder_url.trim_end_matches('/').to_string(),
            routing_url: config.routing_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn reverse_url(&self, location: &LocationModel) -> String {
        format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}",
            self.geocoder_url, location.latitude, location.longitude
        )
    }

    pub fn route_url(&self, from: &LocationModel, to: &LocationModel) -> String {
        format!(
            "{}/route/v1/foot/{},{};{},{}?overview=full&geometries=polyline",
            self.routing_url, from.longitude, from.latitude, to.longitude, to.latitude
        )
    }

    fn cached_name(&self, key: &CacheKey) -> Option<String> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> AppResult<String> {
        let start = Instant::now();
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("[GeoClient] HTTP {} from {}", status.as_u16(), url);
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        debug!(
            "[GeoClient] GET {} -> {} bytes ({} ms)",
            url,
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }

    /// Human-readable name for a coordinate.
    pub async fn reverse_geocode(&self, location: &LocationModel) -> AppResult<String> {
        let key = cache_key(location);
        if let Some(name) = self.cached_name(&key) {
            return Ok(name);
        }
        let body = self.get_text(&self.reverse_url(location), &[]).await?;
        let name = parse_reverse(&body)?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(key, name.clone());
        Ok(name)
    }

    pub async fn reverse_geocode_or_placeholder(&self, location: &LocationModel) -> String {
        match self.reverse_geocode(location).await {
            Ok(name) => name,
            Err(e) => {
                warn!("[GeoClient] Reverse geocode failed: {}", e);
                placeholder_place_name(location)
            }
        }
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<Place>> {
        let url = format!("{}/search", self.geocoder_url);
        let body = self
            .get_text(&url, &[("format", "jsonv2"), ("q", query)])
            .await?;
        parse_search(&body)
    }

    /// Search results, or nothing on failure.
    pub async fn search_or_placeholder(&self, query: &str) -> Vec<Place> {
        self.search(query).await.unwrap_or_else(|e| {
            warn!("[GeoClient] Search failed: {}", e);
            Vec::new()
        })
    }

    pub async fn route(&self, from: &LocationModel, to: &LocationModel) -> AppResult<Route> {
        let body = self.get_text(&self.route_url(from, to), &[]).await?;
        parse_route(&body)
    }

    pub async fn route_or_placeholder(&self, from: &LocationModel, to: &LocationModel) -> Route {
        match self.route(from, to).await {
            Ok(route) => route,
            Err(e) => {
                warn!("[GeoClient] Routing failed: {}", e);
                Route::straight_line(from, to)
            }
        }
    }

    /// Name the first and last point of a run concurrently.
    pub async fn describe_run(&self, run: &RunSession) -> AppResult<RunPlaces> {
        let (Some(first), Some(last)) = (run.path.first(), run.path.last()) else {
            return Err(AppError::not_found("Path", run.id.clone()));
        };
        let (start, end) =
            futures::try_join!(self.reverse_geocode(first), self.reverse_geocode(last))?;
        Ok(RunPlaces { start, end })
    }

    pub async fn describe_run_or_placeholder(&self, run: &RunSession) -> Option<RunPlaces> {
        let (first, last) = (run.path.first()?, run.path.last()?);
        let (start, end) = futures::join!(
            self.reverse_geocode_or_placeholder(first),
            self.reverse_geocode_or_placeholder(last)
        );
        Some(RunPlaces { start, end })
    }
}
