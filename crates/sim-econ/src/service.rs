//! Capacity and service resolution: cap allocated demand at effective
//! capacity, reconcile against finished production, compute lost sales.

use serde::{Deserialize, Serialize};
use sim_core::{RestaurantId, RestaurantSnapshot, Scenario};
use tracing::error;

use crate::Anomaly;

/// Effective capacity for the turn: base seats scaled by the type's service
/// speed and the staffing level's factor. Closed restaurants resolve to 0.
pub fn effective_capacity(snap: &RestaurantSnapshot, scenario: &Scenario) -> u32 {
    let speed = scenario.type_profile(snap.kind).speed_factor;
    let staffing = scenario.service_factor(snap.staffing);
    (snap.capacity_base as f64 * speed * staffing).floor() as u32
}

/// Outcome of capping one restaurant's allocated demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceOutcome {
    /// Customers actually served.
    pub served: u64,
    /// Allocated demand that went unserved.
    pub lost: u64,
    /// Effective capacity used for the cap.
    pub capacity: u32,
    /// served / capacity, 0 when capacity is 0.
    pub utilization: f64,
    /// Diagnostics recorded while resolving service.
    pub anomalies: Vec<Anomaly>,
}

/// Cap allocated demand at effective capacity, then reconcile against the
/// finished-unit count supplied by the production collaborator.
///
/// A production limit below the capacity-based figure is the named
/// incoherence case: service is reduced to what the kitchen actually
/// produced, and the shortfall is recorded and logged, never fatal.
pub fn resolve_service(
    restaurant: &RestaurantId,
    turn: u32,
    allocated: u64,
    capacity: u32,
    finished_units: Option<u64>,
) -> ServiceOutcome {
    let mut anomalies = Vec::new();
    let capacity_served = allocated.min(capacity as u64);

    let served = match finished_units {
        Some(units) if units < capacity_served => {
            let anomaly = Anomaly::ProductionShortfall {
                restaurant: restaurant.clone(),
                turn,
                expected: capacity_served,
                actual: units,
            };
            error!(
                restaurant = %restaurant,
                turn,
                expected = capacity_served,
                actual = units,
                "production limited service below capacity"
            );
            anomalies.push(anomaly);
            units
        }
        _ => capacity_served,
    };

    let utilization = if capacity == 0 {
        0.0
    } else {
        served as f64 / capacity as f64
    };

    ServiceOutcome {
        served,
        lost: allocated - served,
        capacity,
        utilization,
        anomalies,
    }
}
