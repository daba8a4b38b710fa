//! Road geometry for finished routes, memoized by waypoint set.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::haversine::HaversineEstimator;
use crate::model::GeoPoint;
use crate::polyline::Polyline;
use crate::traits::RoadRoutingService;

/// Drivable path through a route's waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRoute {
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub geometry: Polyline,
    /// Straight lines between waypoints instead of a road path.
    pub is_fallback: bool,
}

/// Deterministic key for a waypoint list.
///
/// The first waypoint (the source) stays in place; the rest are sorted so the
/// key does not depend on stop order.
pub fn route_key(waypoints: &[GeoPoint]) -> u64 {
    let mut normalized: Vec<GeoPoint> = waypoints.to_vec();
    if normalized.len() > 1 {
        normalized[1..].sort_by(|a, b| {
            a.latitude
                .total_cmp(&b.latitude)
                .then(a.longitude.total_cmp(&b.longitude))
        });
    }
    let text = normalized
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.latitude, p.longitude))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Read-if-present, write-after-compute storage. Last write wins.
pub trait RouteCache {
    fn get(&self, waypoints: &[GeoPoint]) -> Option<CachedRoute>;
    fn put(&self, waypoints: &[GeoPoint], route: CachedRoute);
}

impl<T: RouteCache + ?Sized> RouteCache for &T {
    fn get(&self, waypoints: &[GeoPoint]) -> Option<CachedRoute> {
        (**self).get(waypoints)
    }

    fn put(&self, waypoints: &[GeoPoint], route: CachedRoute) {
        (**self).put(waypoints, route)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub road_entries: usize,
    pub fallback_entries: usize,
    pub total_uses: u64,
}

#[derive(Debug)]
struct Slot {
    route: CachedRoute,
    use_count: u64,
}

/// Process-local cache, safe to share between threads.
#[derive(Debug, Default)]
pub struct InMemoryRouteCache {
    slots: Mutex<HashMap<u64, Slot>>,
}

impl InMemoryRouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<u64, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots();
        let road_entries = slots.values().filter(|s| !s.route.is_fallback).count();
        CacheStats {
            entries: slots.len(),
            road_entries,
            fallback_entries: slots.len() - road_entries,
            total_uses: slots.values().map(|s| s.use_count).sum(),
        }
    }

    pub fn clear(&self) {
        self.slots().clear();
    }
}

impl RouteCache for InMemoryRouteCache {
    fn get(&self, waypoints: &[GeoPoint]) -> Option<CachedRoute> {
        let mut slots = self.slots();
        let slot = slots.get_mut(&route_key(waypoints))?;
        slot.use_count += 1;
        Some(slot.route.clone())
    }

    fn put(&self, waypoints: &[GeoPoint], route: CachedRoute) {
        self.slots().insert(route_key(waypoints), Slot { route, use_count: 1 });
    }
}

/// Cache, then road service, then straight lines.
#[derive(Debug, Clone)]
pub struct RouteGeometryResolver<S, C> {
    road: Option<S>,
    cache: C,
    estimator: HaversineEstimator,
}

impl<S: RoadRoutingService, C: RouteCache> RouteGeometryResolver<S, C> {
    pub fn new(road: Option<S>, cache: C, estimator: HaversineEstimator) -> Self {
        Self {
            road,
            cache,
            estimator,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn resolve(&self, waypoints: &[GeoPoint]) -> CachedRoute {
        if let Some(hit) = self.cache.get(waypoints) {
            debug!(waypoints = waypoints.len(), "route geometry cache hit");
            return hit;
        }

        let resolved = match self.road_geometry(waypoints) {
            Some(route) => route,
            None => self.straight_line(waypoints),
        };
        self.cache.put(waypoints, resolved.clone());
        resolved
    }

    fn road_geometry(&self, waypoints: &[GeoPoint]) -> Option<CachedRoute> {
        if waypoints.len() < 2 {
            return None;
        }
        let road = self.road.as_ref()?;
        match road.route(waypoints) {
            Ok(route) => Some(CachedRoute {
                distance_km: route.distance_m / 1000.0,
                duration_minutes: route.duration_s / 60.0,
                geometry: route.geometry,
                is_fallback: false,
            }),
            Err(err) => {
                warn!(error = %err, "road geometry unavailable, drawing straight lines");
                None
            }
        }
    }

    fn straight_line(&self, waypoints: &[GeoPoint]) -> CachedRoute {
        let (distance_km, duration_hours) = self.estimator.path(waypoints);
        CachedRoute {
            distance_km,
            duration_minutes: duration_hours * 60.0,
            geometry: Polyline::new(waypoints.to_vec()),
            is_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::RoadServiceError;
    use crate::traits::{RoadRoute, RoadTable};

    const CASABLANCA: GeoPoint = GeoPoint::new(33.5731, -7.5898);
    const RABAT: GeoPoint = GeoPoint::new(34.0209, -6.8416);
    const FES: GeoPoint = GeoPoint::new(34.0181, -5.0078);

    struct CountingRoad {
        calls: Cell<usize>,
        fail: bool,
    }

    impl RoadRoutingService for CountingRoad {
        fn table(&self, _points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError> {
            Ok(RoadTable::default())
        }

        fn route(&self, waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(RoadServiceError::Malformed("down".to_string()));
            }
            Ok(RoadRoute {
                distance_m: 250_000.0,
                duration_s: 9_000.0,
                geometry: Polyline::new(waypoints.to_vec()),
            })
        }
    }

    #[test]
    fn test_key_ignores_stop_order_but_not_source() {
        assert_eq!(route_key(&[CASABLANCA, RABAT, FES]), route_key(&[CASABLANCA, FES, RABAT]));
        assert_ne!(route_key(&[CASABLANCA, RABAT, FES]), route_key(&[RABAT, CASABLANCA, FES]));
    }

    #[test]
    fn test_resolver_fills_cache_once() {
        let road = CountingRoad {
            calls: Cell::new(0),
            fail: false,
        };
        let cache = InMemoryRouteCache::new();
        let resolver = RouteGeometryResolver::new(Some(&road), &cache, HaversineEstimator::default());

        let first = resolver.resolve(&[CASABLANCA, RABAT, FES]);
        let second = resolver.resolve(&[CASABLANCA, FES, RABAT]);
        assert_eq!(first, second);
        assert_eq!(road.calls.get(), 1);
        assert!(!first.is_fallback);
        assert!((first.distance_km - 250.0).abs() < 1e-9);
        assert!((first.duration_minutes - 150.0).abs() < 1e-9);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.road_entries, 1);
        assert_eq!(stats.total_uses, 2);
    }

    #[test]
    fn test_road_failure_draws_straight_lines() {
        let road = CountingRoad {
            calls: Cell::new(0),
            fail: true,
        };
        let resolver = RouteGeometryResolver::new(Some(road), InMemoryRouteCache::new(), HaversineEstimator::default());
        let route = resolver.resolve(&[CASABLANCA, RABAT]);

        assert!(route.is_fallback);
        assert_eq!(route.geometry.points(), &[CASABLANCA, RABAT]);
        assert!(route.distance_km > 80.0 && route.distance_km < 95.0);
        assert_eq!(resolver.cache().stats().fallback_entries, 1);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = InMemoryRouteCache::new();
        let make = |km| CachedRoute {
            distance_km: km,
            duration_minutes: 1.0,
            geometry: Polyline::default(),
            is_fallback: true,
        };
        cache.put(&[CASABLANCA, RABAT], make(1.0));
        cache.put(&[CASABLANCA, RABAT], make(2.0));
        assert_eq!(cache.get(&[CASABLANCA, RABAT]).map(|r| r.distance_km), Some(2.0));
        cache.clear();
        assert!(cache.get(&[CASABLANCA, RABAT]).is_none());
    }
}
