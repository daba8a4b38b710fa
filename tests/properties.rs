mod fixtures;

use proptest::prelude::*;

use mission_planner::cost::{CostModel, CostParameters};
use mission_planner::error::RoadServiceError;
use mission_planner::haversine::{HaversineEstimator, haversine_km};
use mission_planner::matrix::DistanceMatrix;
use mission_planner::model::GeoPoint;
use mission_planner::sequencer::{Sequencer, nearest_neighbor, route_distance, two_opt};
use mission_planner::solver::{SolveOptions, solve};
use mission_planner::splitter::{RouteSplitter, RoutingStrategy, SplitThresholds};
use mission_planner::traits::{RoadRoute, RoadRoutingService, RoadTable};

use fixtures::*;

fn moroccan_point() -> impl Strategy<Value = GeoPoint> {
    (29.5f64..35.8, -10.0f64..-1.5).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
}

fn matrix_for(points: &[GeoPoint]) -> DistanceMatrix {
    let points: Vec<Option<GeoPoint>> = points.iter().copied().map(Some).collect();
    DistanceMatrix::haversine(&points, HaversineEstimator::default())
}

proptest! {
    #[test]
    fn haversine_is_symmetric(a in moroccan_point(), b in moroccan_point()) {
        let forward = haversine_km(a, b);
        let backward = haversine_km(b, a);
        prop_assert!((forward - backward).abs() < 1e-9);
        prop_assert!(forward >= 0.0);
    }

    #[test]
    fn two_opt_never_lengthens(points in prop::collection::vec(moroccan_point(), 5..=20)) {
        let matrix = matrix_for(&points);
        let stops: Vec<usize> = (1..points.len()).collect();

        let constructed = nearest_neighbor(0, &stops, &matrix);
        let before = route_distance(0, &constructed, &matrix).expect("complete matrix");
        let improved = two_opt(0, constructed, &matrix, 50);
        let after = route_distance(0, &improved, &matrix).expect("complete matrix");

        prop_assert!(after <= before + 1e-9);
    }

    #[test]
    fn cost_is_additive_and_non_negative(
        distance in 0.0f64..2000.0,
        hours in 0.0f64..40.0,
        fuel_price in 0.0f64..30.0,
        driver_rate in 0.0f64..80.0,
        maintenance in 0.0f64..2.0,
        toll in 0.0f64..2.0,
        base in 0.0f64..500.0,
    ) {
        let model = CostModel::new(CostParameters {
            fuel_price_per_liter: fuel_price,
            driver_cost_per_hour: driver_rate,
            maintenance_cost_per_km: maintenance,
            toll_cost_per_km: toll,
            base_mission_cost: base,
            ..CostParameters::default()
        });
        let cost = model.breakdown(distance, hours, None, None);

        for part in [cost.base, cost.fuel, cost.driver, cost.maintenance, cost.toll] {
            prop_assert!(part >= 0.0);
        }
        let sum = cost.base + cost.fuel + cost.driver + cost.maintenance + cost.toll;
        prop_assert!((cost.total - sum).abs() < 1e-6);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn sequence_is_a_permutation(points in prop::collection::vec(moroccan_point(), 1..=51)) {
        let matrix = matrix_for(&points);
        let stops: Vec<usize> = (1..points.len()).collect();

        let sequence = Sequencer::default().sequence(0, &stops, &matrix);

        let mut order = sequence.order.clone();
        order.sort_unstable();
        prop_assert_eq!(order, stops);
        prop_assert_eq!(sequence.legs.len(), points.len() - 1);
    }

    #[test]
    fn every_strategy_partitions_destinations(
        points in prop::collection::vec(moroccan_point(), 1..=24),
        weights in prop::collection::vec(10.0f64..900.0, 24),
        fleet in prop::collection::vec((300.0f64..3000.0, 5.0f64..40.0), 1..=4),
    ) {
        let stops = points
            .iter()
            .zip(&weights)
            .enumerate()
            .map(|(i, (p, w))| {
                let place = Place::new("Stop", p.latitude, p.longitude);
                destination(i as u64 + 1, place, *w, 1.0)
            })
            .collect();
        let vehicles = fleet
            .iter()
            .enumerate()
            .map(|(i, (payload, volume))| vehicle(i as u64 + 1, *payload, *volume))
            .collect();
        let problem = problem(
            vec![source(1, CASABLANCA_PORT), source(2, TANGER_MED)],
            stops,
            vehicles,
        );
        let mut expected: Vec<u64> = problem.destinations.iter().map(|d| d.id).collect();
        expected.sort_unstable();

        let matrix = DistanceMatrix::haversine(&problem.points(), HaversineEstimator::default());
        let sequencer = Sequencer::default();
        let thresholds = SplitThresholds::default();
        let splitter = RouteSplitter::new(&problem, &problem.vehicles, &matrix, &sequencer, &thresholds);

        for strategy in [
            RoutingStrategy::SingleRoute,
            RoutingStrategy::CapacitySplit,
            RoutingStrategy::GeographicClustering,
            RoutingStrategy::Balanced,
        ] {
            let routes = splitter.split(strategy);
            let mut ids: Vec<u64> = routes
                .iter()
                .flat_map(|r| r.destinations.iter().map(|d| d.id))
                .collect();
            ids.sort_unstable();
            prop_assert_eq!(&ids, &expected);
        }

        let outcome = solve(&problem, None::<NoRoad>, &SolveOptions::default()).expect("outcome");
        prop_assert_eq!(planned_ids(&outcome.plans), expected);
    }
}

struct NoRoad;

impl RoadRoutingService for NoRoad {
    fn table(&self, _points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError> {
        Ok(RoadTable::default())
    }

    fn route(&self, _waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError> {
        Err(RoadServiceError::Malformed("offline".to_string()))
    }
}
