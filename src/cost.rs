//! Deterministic mission cost model.

use serde::Deserialize;

use crate::model::{CostBreakdown, Vehicle};

/// Rates applied by the cost model.
///
/// Every field defaults, so partial configuration documents are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CostParameters {
    /// Currency per liter.
    pub fuel_price_per_liter: f64,
    /// Currency per hour of mission duration.
    pub driver_cost_per_hour: f64,
    /// Currency per km.
    pub maintenance_cost_per_km: f64,
    /// Currency per km.
    pub toll_cost_per_km: f64,
    /// Fixed currency per mission.
    pub base_mission_cost: f64,
    /// Fraction added on top of the subtotal, e.g. `0.15`.
    pub overhead_percentage: f64,
    /// Liters per 100 km when neither the vehicle nor the caller says.
    pub default_fuel_consumption: f64,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            fuel_price_per_liter: 12.0,
            driver_cost_per_hour: 20.0,
            maintenance_cost_per_km: 0.4,
            toll_cost_per_km: 0.3,
            base_mission_cost: 50.0,
            overhead_percentage: 0.0,
            default_fuel_consumption: 25.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CostModel {
    params: CostParameters,
}

impl CostModel {
    pub fn new(params: CostParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CostParameters {
        &self.params
    }

    /// Consumption in L/100km: explicit override, then the vehicle, then the
    /// configured default.
    pub fn fuel_consumption(&self, vehicle: Option<&Vehicle>, override_l_per_100km: Option<f64>) -> f64 {
        override_l_per_100km
            .or_else(|| vehicle.and_then(|v| v.fuel_consumption))
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(self.params.default_fuel_consumption)
    }

    /// Cost of driving `distance_km` over `duration_hours`.
    pub fn breakdown(
        &self,
        distance_km: f64,
        duration_hours: f64,
        vehicle: Option<&Vehicle>,
        override_l_per_100km: Option<f64>,
    ) -> CostBreakdown {
        let p = &self.params;
        let distance_km = non_negative(distance_km);
        let duration_hours = non_negative(duration_hours);
        let consumption = non_negative(self.fuel_consumption(vehicle, override_l_per_100km));

        let fuel_liters = distance_km * (consumption / 100.0);
        let base = non_negative(p.base_mission_cost);
        let fuel = fuel_liters * non_negative(p.fuel_price_per_liter);
        let driver = duration_hours * non_negative(p.driver_cost_per_hour);
        let maintenance = distance_km * non_negative(p.maintenance_cost_per_km);
        let toll = distance_km * non_negative(p.toll_cost_per_km);

        let subtotal = base + fuel + driver + maintenance + toll;
        let overhead = subtotal * non_negative(p.overhead_percentage);

        CostBreakdown {
            base,
            fuel,
            driver,
            maintenance,
            toll,
            overhead,
            total: subtotal + overhead,
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck(consumption: Option<f64>) -> Vehicle {
        Vehicle {
            id: 1,
            name: "Truck".to_string(),
            license_plate: "T-1".to_string(),
            max_payload: 10_000.0,
            cargo_volume: 40.0,
            fuel_consumption: consumption,
            equipment: Vec::new(),
            available: true,
        }
    }

    #[test]
    fn test_default_breakdown() {
        let model = CostModel::default();
        let cost = model.breakdown(100.0, 2.0, None, None);
        // 100 km * 25 L/100km = 25 L * 12 = 300
        assert!((cost.fuel - 300.0).abs() < 1e-9);
        assert!((cost.driver - 40.0).abs() < 1e-9);
        assert!((cost.maintenance - 40.0).abs() < 1e-9);
        assert!((cost.toll - 30.0).abs() < 1e-9);
        assert!((cost.base - 50.0).abs() < 1e-9);
        assert_eq!(cost.overhead, 0.0);
        assert!((cost.total - 460.0).abs() < 1e-9);
    }

    #[test]
    fn test_consumption_priority() {
        let model = CostModel::default();
        let vehicle = truck(Some(30.0));
        assert_eq!(model.fuel_consumption(Some(&vehicle), Some(20.0)), 20.0);
        assert_eq!(model.fuel_consumption(Some(&vehicle), None), 30.0);
        assert_eq!(model.fuel_consumption(Some(&truck(None)), None), 25.0);
        assert_eq!(model.fuel_consumption(Some(&truck(Some(-3.0))), None), 25.0);
    }

    #[test]
    fn test_overhead_variant() {
        let model = CostModel::new(CostParameters {
            overhead_percentage: 0.15,
            ..CostParameters::default()
        });
        let cost = model.breakdown(100.0, 2.0, None, None);
        assert!((cost.overhead - 460.0 * 0.15).abs() < 1e-9);
        let parts = cost.base + cost.fuel + cost.driver + cost.maintenance + cost.toll + cost.overhead;
        assert!((cost.total - parts).abs() < 1e-9);
    }

    #[test]
    fn test_negative_inputs_clamped() {
        let model = CostModel::default();
        let cost = model.breakdown(-10.0, f64::NAN, None, None);
        assert_eq!(cost.fuel, 0.0);
        assert_eq!(cost.driver, 0.0);
        assert_eq!(cost.total, 50.0);
    }

    #[test]
    fn test_deterministic() {
        let model = CostModel::default();
        let vehicle = truck(Some(32.5));
        assert_eq!(
            model.breakdown(123.4, 3.2, Some(&vehicle), None),
            model.breakdown(123.4, 3.2, Some(&vehicle), None)
        );
    }
}
