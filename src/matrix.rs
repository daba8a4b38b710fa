//! Distance matrix construction.
//!
//! Prefers road-network figures and fills every gap with the haversine
//! estimate, so the matrix over usable points is always complete.

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::haversine::HaversineEstimator;
use crate::model::GeoPoint;
use crate::traits::RoadRoutingService;

/// Travel between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixEntry {
    pub distance_km: f64,
    pub duration_hours: f64,
    pub is_road_routed: bool,
}

/// Directed distances keyed by absolute point index.
///
/// No self-entries. Pairs touching a point without coordinates are absent.
#[derive(Debug, Clone, Default)]
pub struct DistanceMatrix {
    entries: FxHashMap<(usize, usize), MatrixEntry>,
    point_count: usize,
    usable_points: usize,
}

impl DistanceMatrix {
    /// Builds a matrix from arbitrary entries; used for custom metrics.
    pub fn from_entries(
        point_count: usize,
        entries: impl IntoIterator<Item = ((usize, usize), MatrixEntry)>,
    ) -> Self {
        let entries: FxHashMap<_, _> = entries
            .into_iter()
            .filter(|((i, j), _)| i != j && *i < point_count && *j < point_count)
            .collect();
        Self {
            entries,
            point_count,
            usable_points: point_count,
        }
    }

    /// Haversine-only matrix over every usable point.
    pub fn haversine(points: &[Option<GeoPoint>], estimator: HaversineEstimator) -> Self {
        let mut entries = FxHashMap::default();
        for (i, from) in points.iter().enumerate() {
            let Some(from) = from else { continue };
            for (j, to) in points.iter().enumerate() {
                let Some(to) = to else { continue };
                if i != j {
                    entries.insert((i, j), fallback_entry(&estimator, *from, *to));
                }
            }
        }
        Self {
            entries,
            point_count: points.len(),
            usable_points: points.iter().flatten().count(),
        }
    }

    pub fn get(&self, from: usize, to: usize) -> Option<&MatrixEntry> {
        self.entries.get(&(from, to))
    }

    /// Finite distance in km, `None` when the pair is unknown.
    pub fn distance(&self, from: usize, to: usize) -> Option<f64> {
        self.get(from, to)
            .map(|entry| entry.distance_km)
            .filter(|d| d.is_finite())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// N×(N−1) for N usable points.
    pub fn expected_len(&self) -> usize {
        self.usable_points * self.usable_points.saturating_sub(1)
    }

    pub fn is_complete(&self) -> bool {
        self.len() == self.expected_len()
    }

    pub fn road_routed_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_road_routed).count()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&(usize, usize), &MatrixEntry)> {
        self.entries.iter()
    }
}

fn fallback_entry(estimator: &HaversineEstimator, from: GeoPoint, to: GeoPoint) -> MatrixEntry {
    let (distance_km, duration_hours) = estimator.estimate(from, to);
    MatrixEntry {
        distance_km,
        duration_hours,
        is_road_routed: false,
    }
}

/// Builds a [`DistanceMatrix`], asking the road service first.
#[derive(Debug, Clone)]
pub struct MatrixBuilder<S> {
    road: Option<S>,
    estimator: HaversineEstimator,
}

impl<S: RoadRoutingService> MatrixBuilder<S> {
    pub fn new(road: Option<S>, estimator: HaversineEstimator) -> Self {
        Self { road, estimator }
    }

    /// `points` is sources first, then destinations; `None` marks a point
    /// without usable coordinates, which is logged and left out.
    pub fn build(&self, points: &[Option<GeoPoint>]) -> DistanceMatrix {
        let valid: Vec<(usize, GeoPoint)> = points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i, p)))
            .collect();

        for (i, point) in points.iter().enumerate() {
            if point.is_none() {
                warn!(point = i, "point has no usable coordinates, excluded from matrix");
            }
        }

        if valid.len() < 2 {
            warn!(valid = valid.len(), "not enough usable points for a distance matrix");
            return DistanceMatrix {
                entries: FxHashMap::default(),
                point_count: points.len(),
                usable_points: valid.len(),
            };
        }

        let Some(road) = &self.road else {
            return DistanceMatrix::haversine(points, self.estimator);
        };

        let coords: Vec<GeoPoint> = valid.iter().map(|(_, p)| *p).collect();
        let table = match road.table(&coords) {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "road table unavailable, using haversine for every pair");
                return DistanceMatrix::haversine(points, self.estimator);
            }
        };

        let mut entries =
            FxHashMap::with_capacity_and_hasher(valid.len() * (valid.len() - 1), Default::default());
        let mut road_entries = 0;
        let mut fallback_entries = 0;

        for (row, (i, from)) in valid.iter().enumerate() {
            for (col, (j, to)) in valid.iter().enumerate() {
                if i == j {
                    continue;
                }
                let entry = match table.distance_m(row, col) {
                    Some(meters) => {
                        road_entries += 1;
                        let distance_km = meters / 1000.0;
                        let duration_hours = table
                            .duration_s(row, col)
                            .map(|secs| secs / 3600.0)
                            .unwrap_or_else(|| self.estimator.km_to_hours(distance_km));
                        MatrixEntry {
                            distance_km,
                            duration_hours,
                            is_road_routed: true,
                        }
                    }
                    None => {
                        fallback_entries += 1;
                        fallback_entry(&self.estimator, *from, *to)
                    }
                };
                entries.insert((*i, *j), entry);
            }
        }

        let matrix = DistanceMatrix {
            entries,
            point_count: points.len(),
            usable_points: valid.len(),
        };
        info!(
            road_entries,
            fallback_entries,
            total = matrix.len(),
            "distance matrix built"
        );
        if !matrix.is_complete() {
            warn!(
                expected = matrix.expected_len(),
                actual = matrix.len(),
                "distance matrix incomplete"
            );
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoadServiceError;
    use crate::traits::{RoadRoute, RoadTable};

    struct FixedTable(RoadTable);

    impl RoadRoutingService for FixedTable {
        fn table(&self, _points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError> {
            Ok(self.0.clone())
        }

        fn route(&self, _waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError> {
            Err(RoadServiceError::Malformed("unused".to_string()))
        }
    }

    struct Down;

    impl RoadRoutingService for Down {
        fn table(&self, _points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError> {
            Err(RoadServiceError::Status {
                code: "503".to_string(),
                message: "unavailable".to_string(),
            })
        }

        fn route(&self, _waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError> {
            Err(RoadServiceError::Malformed("unused".to_string()))
        }
    }

    fn points() -> Vec<Option<GeoPoint>> {
        vec![
            Some(GeoPoint::new(33.5731, -7.5898)),
            None,
            Some(GeoPoint::new(34.0209, -6.8416)),
            Some(GeoPoint::new(33.8935, -5.5473)),
        ]
    }

    #[test]
    fn test_outage_yields_complete_haversine_matrix() {
        let builder = MatrixBuilder::new(Some(Down), HaversineEstimator::default());
        let matrix = builder.build(&points());

        assert_eq!(matrix.len(), 3 * 2);
        assert!(matrix.is_complete());
        assert_eq!(matrix.road_routed_count(), 0);
        assert!(matrix.get(0, 1).is_none(), "invalid point must not appear");
        assert!(matrix.get(0, 0).is_none(), "no self entries");
    }

    #[test]
    fn test_partial_table_is_filled_and_indices_map_back() {
        // Rows/columns follow the three usable points: 0, 2, 3.
        let table = RoadTable {
            distances: vec![
                vec![Some(0.0), Some(92_000.0), None],
                vec![Some(91_000.0), Some(0.0), Some(140_000.0)],
            ],
            durations: vec![vec![Some(0.0), Some(3600.0)], vec![None, Some(0.0), Some(7200.0)]],
        };
        let builder = MatrixBuilder::new(Some(FixedTable(table)), HaversineEstimator::default());
        let matrix = builder.build(&points());

        assert!(matrix.is_complete());
        let road = matrix.get(0, 2).expect("entry 0->2");
        assert!(road.is_road_routed);
        assert!((road.distance_km - 92.0).abs() < 1e-9);
        assert!((road.duration_hours - 1.0).abs() < 1e-9);

        // Distance without duration: duration derived from the road distance.
        let derived = matrix.get(2, 0).expect("entry 2->0");
        assert!(derived.is_road_routed);
        assert!((derived.duration_hours - 91.0 / 50.0).abs() < 1e-9);

        // Null and missing rows fall back to haversine.
        assert!(!matrix.get(0, 3).expect("entry 0->3").is_road_routed);
        assert!(!matrix.get(3, 0).expect("entry 3->0").is_road_routed);
        assert_eq!(matrix.road_routed_count(), 3);
    }

    #[test]
    fn test_fewer_than_two_points_is_empty() {
        let builder: MatrixBuilder<Down> = MatrixBuilder::new(None, HaversineEstimator::default());
        assert!(builder.build(&[]).is_empty());
        let single = builder.build(&[Some(GeoPoint::new(33.5, -7.6)), None]);
        assert!(single.is_empty());
        assert!(single.is_complete());
    }

    #[test]
    fn test_from_entries_drops_self_and_out_of_range() {
        let entry = MatrixEntry {
            distance_km: 1.0,
            duration_hours: 0.1,
            is_road_routed: false,
        };
        let matrix = DistanceMatrix::from_entries(2, [((0, 1), entry), ((1, 1), entry), ((0, 5), entry)]);
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.distance(0, 1), Some(1.0));
    }
}
