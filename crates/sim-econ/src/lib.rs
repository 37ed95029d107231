#![deny(warnings)]

//! Market, service, and financial resolution for Resto Tycoon.
//!
//! The engine is a set of pure functions over validated inputs: demand is
//! split across restaurants by attractiveness ([`market`]), capped by
//! effective capacity and finished production ([`service`]), and turned into
//! money and KPIs ([`finance`]). Nothing here retains state between turns;
//! determinism comes from the scenario seed alone.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{RestaurantId, ValidationError};
use thiserror::Error;

pub mod finance;
pub mod market;
pub mod service;

pub use finance::{resolve_finance, FinanceInputs, FinanceOutcome};
pub use market::{allocate_demand, attraction_score, MarketAllocation};
pub use service::{effective_capacity, resolve_service, ServiceOutcome};

/// Fatal engine errors. Anything else is a recorded [`Anomaly`].
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Malformed inputs; the turn aborts before any mutation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Non-fatal reconciliation anomalies, recorded on results and logged at
/// error severity. Gameplay continues uninterrupted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
pub enum Anomaly {
    /// No restaurant scored above zero for a segment; its demand is lost.
    #[error("segment '{segment}' found no attractive restaurant; {demand} customers lost")]
    SegmentUnserved {
        /// Segment name.
        segment: String,
        /// Customers that went unallocated.
        demand: u64,
    },
    /// Normalized shares drifted from 1.0 beyond tolerance before correction.
    #[error("segment '{segment}' shares drifted by {drift:e} before renormalization")]
    ShareDrift {
        /// Segment name.
        segment: String,
        /// Absolute drift from 1.0.
        drift: f64,
    },
    /// Finished production units limited service below the capacity figure.
    #[error(
        "restaurant '{restaurant}' turn {turn}: expected to serve {expected}, \
         production allowed only {actual}"
    )]
    ProductionShortfall {
        /// Affected restaurant.
        restaurant: RestaurantId,
        /// Turn number.
        turn: u32,
        /// Capacity-based served figure.
        expected: u64,
        /// Production-limited served figure.
        actual: u64,
    },
}

/// Full per-restaurant outcome of a resolved turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Restaurant identifier.
    pub restaurant: RestaurantId,
    /// Customers assigned before capacity constraints.
    pub allocated_demand: u64,
    /// Customers actually served.
    pub served_customers: u64,
    /// Allocated demand that went unserved.
    pub lost_customers: u64,
    /// Effective capacity for the turn.
    pub effective_capacity: u32,
    /// served / effective_capacity, 0 when capacity is 0.
    pub utilization: f64,
    /// Revenue including VAT.
    pub revenue_ttc: Decimal,
    /// Revenue excluding VAT.
    pub revenue_ht: Decimal,
    /// VAT collected on the turn's sales.
    pub vat_due: Decimal,
    /// Cost of goods sold.
    pub cost_of_goods: Decimal,
    /// revenue_ht - cost_of_goods.
    pub gross_margin: Decimal,
    /// Net result after labor, rent, and other charges.
    pub net_result: Decimal,
    /// Cash movement applied to the restaurant by the orchestrator.
    pub cash_delta: Decimal,
    /// cost_of_goods / revenue_ht, 0 when revenue is 0.
    pub food_cost_pct: f64,
    /// Diagnostics recorded while resolving this restaurant.
    pub errors: Vec<Anomaly>,
}

impl AllocationResult {
    /// Assemble a result from the three resolver outcomes.
    pub fn compose(
        restaurant: RestaurantId,
        allocated_demand: u64,
        svc: ServiceOutcome,
        fin: FinanceOutcome,
    ) -> Self {
        let errors = svc.anomalies;
        AllocationResult {
            restaurant,
            allocated_demand,
            served_customers: svc.served,
            lost_customers: svc.lost,
            effective_capacity: svc.capacity,
            utilization: svc.utilization,
            revenue_ttc: fin.revenue_ttc,
            revenue_ht: fin.revenue_ht,
            vat_due: fin.vat_due,
            cost_of_goods: fin.cost_of_goods,
            gross_margin: fin.gross_margin,
            net_result: fin.net_result,
            cash_delta: fin.cash_delta,
            food_cost_pct: fin.food_cost_pct,
            errors,
        }
    }
}

/// Compact per-restaurant view of a sealed turn, the shape reporting and AI
/// policy collaborators consume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    /// Restaurant identifier.
    pub restaurant: RestaurantId,
    /// Customers served.
    pub served: u64,
    /// Customers lost.
    pub lost: u64,
    /// Utilization rate.
    pub utilization: f64,
    /// Net result for the turn.
    pub net_result: Decimal,
    /// Share of all customers served this turn, 0 when nobody served.
    pub market_share: f64,
}

/// Summarize a turn's results in id order, with division guards.
pub fn summarize_turn(results: &[AllocationResult]) -> Vec<TurnSummary> {
    let total_served: u64 = results.iter().map(|r| r.served_customers).sum();
    results
        .iter()
        .map(|r| TurnSummary {
            restaurant: r.restaurant.clone(),
            served: r.served_customers,
            lost: r.lost_customers,
            utilization: r.utilization,
            net_result: r.net_result,
            market_share: if total_served == 0 {
                0.0
            } else {
                r.served_customers as f64 / total_served as f64
            },
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use rust_decimal::Decimal;
    use sim_core::{
        RestaurantId, RestaurantSnapshot, RestaurantType, Scenario, Segment, StaffingLevel,
    };
    use std::collections::BTreeMap;

    pub fn scenario(segments: Vec<Segment>) -> Scenario {
        Scenario {
            name: "Test".into(),
            turns: 12,
            base_demand: 100,
            visit_propensity: 1.0,
            demand_noise: 0.0,
            segments,
            type_profiles: BTreeMap::new(),
            staffing_service_factors: BTreeMap::from([
                (StaffingLevel::Closed, 0.0),
                (StaffingLevel::Light, 0.7),
                (StaffingLevel::Normal, 1.0),
                (StaffingLevel::Reinforced, 1.3),
            ]),
            staffing_attraction_bonus: BTreeMap::from([
                (StaffingLevel::Closed, 0.0),
                (StaffingLevel::Light, 0.8),
                (StaffingLevel::Normal, 1.0),
                (StaffingLevel::Reinforced, 1.2),
            ]),
            vat_rate: Decimal::new(10, 2),
            social_charges_rate: Decimal::new(42, 2),
            budget_stretch: 1.5,
            rng_seed: 42,
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    pub fn segment(name: &str, share: f64, budget: i64, price_sens: f64) -> Segment {
        Segment {
            name: name.into(),
            share,
            budget: Decimal::new(budget, 0),
            price_sensitivity: price_sens,
            quality_sensitivity: 1.0,
            type_affinity: BTreeMap::new(),
        }
    }

    pub fn snapshot(
        id: &str,
        kind: RestaurantType,
        ticket: i64,
        capacity: u32,
    ) -> RestaurantSnapshot {
        RestaurantSnapshot {
            id: RestaurantId(id.into()),
            name: id.to_uppercase(),
            kind,
            average_ticket: Decimal::new(ticket, 0),
            capacity_base: capacity,
            staffing: StaffingLevel::Normal,
            reputation: 5.0,
            cash: Decimal::ZERO,
            marketing_boost: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_share_guards_zero_served() {
        let result = AllocationResult {
            restaurant: RestaurantId("r1".into()),
            allocated_demand: 0,
            served_customers: 0,
            lost_customers: 0,
            effective_capacity: 0,
            utilization: 0.0,
            revenue_ttc: Decimal::ZERO,
            revenue_ht: Decimal::ZERO,
            vat_due: Decimal::ZERO,
            cost_of_goods: Decimal::ZERO,
            gross_margin: Decimal::ZERO,
            net_result: Decimal::ZERO,
            cash_delta: Decimal::ZERO,
            food_cost_pct: 0.0,
            errors: vec![],
        };
        let summary = summarize_turn(&[result]);
        assert_eq!(summary[0].market_share, 0.0);
    }

    #[test]
    fn anomaly_messages_name_the_restaurant() {
        let anomaly = Anomaly::ProductionShortfall {
            restaurant: RestaurantId("r7".into()),
            turn: 3,
            expected: 50,
            actual: 40,
        };
        let msg = anomaly.to_string();
        assert!(msg.contains("r7"));
        assert!(msg.contains("50"));
        assert!(msg.contains("40"));
    }
}
