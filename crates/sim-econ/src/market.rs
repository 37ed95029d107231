//! Demand allocation: split each segment's demand across restaurants in
//! proportion to attractiveness, with seeded noise on total market size.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sim_core::{
    validate_market_inputs, RestaurantId, RestaurantSnapshot, Scenario, Segment, StaffingLevel,
};
use std::collections::BTreeMap;
use tracing::error;

use crate::{Anomaly, EconError};

/// Tolerance on normalized shares before a drift anomaly is recorded.
const SHARE_TOLERANCE: f64 = 1e-9;

/// Attractiveness of one restaurant for one segment. Non-negative; zero means
/// the segment will not visit at all (closed, or priced out of budget).
pub fn attraction_score(
    snap: &RestaurantSnapshot,
    segment: &Segment,
    scenario: &Scenario,
) -> f64 {
    if snap.staffing == StaffingLevel::Closed {
        return 0.0;
    }
    let price = price_factor(snap, segment, scenario);
    if price <= 0.0 {
        return 0.0;
    }
    let quality = quality_factor(snap.reputation, segment.quality_sensitivity);
    let affinity = segment.affinity(snap.kind);
    let staffing = scenario.attraction_bonus(snap.staffing);
    let marketing = 1.0 + snap.marketing_boost;
    (price * quality * affinity * staffing * marketing).max(0.0)
}

/// Banded price attractiveness on the ticket/budget ratio, raised to the
/// segment's price sensitivity so sensitive segments amplify both the reward
/// for cheap tickets and the penalty for dear ones. Zero beyond the
/// scenario's budget stretch: the segment cannot afford the restaurant.
fn price_factor(snap: &RestaurantSnapshot, segment: &Segment, scenario: &Scenario) -> f64 {
    let ratio = (snap.average_ticket / segment.budget)
        .to_f64()
        .unwrap_or(f64::INFINITY);
    if !ratio.is_finite() || ratio > scenario.budget_stretch {
        return 0.0;
    }
    let band: f64 = if ratio <= 0.8 {
        1.5
    } else if ratio <= 1.0 {
        1.2
    } else if ratio <= 1.2 {
        0.8
    } else {
        0.4
    };
    band.powf(segment.price_sensitivity)
}

/// Perceived-quality factor: reputation 5/10 is neutral, weighted by the
/// segment's quality sensitivity and clamped to [0.5, 1.5].
fn quality_factor(reputation: f64, sensitivity: f64) -> f64 {
    (1.0 + (reputation / 10.0 - 0.5) * sensitivity).clamp(0.5, 1.5)
}

/// Multiplicative demand noise in [1 - amplitude, 1 + amplitude], seeded for
/// reproducibility. Amplitude 0 short-circuits to exactly 1.
fn noise_factor(seed: u64, amplitude: f64) -> f64 {
    if amplitude == 0.0 {
        return 1.0;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    1.0 + rng.gen_range(-amplitude..=amplitude)
}

/// Outcome of one turn's demand allocation, before capacity constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketAllocation {
    /// Total market demand for the turn (after propensity and noise).
    pub total_demand: u64,
    /// Allocated demand per restaurant, every snapshot present as a key.
    pub demand: BTreeMap<RestaurantId, u64>,
    /// Normalized attractiveness shares per segment (absent for segments
    /// nobody could serve).
    pub shares_by_segment: BTreeMap<String, BTreeMap<RestaurantId, f64>>,
    /// Market-wide anomalies recorded during allocation.
    pub anomalies: Vec<Anomaly>,
}

/// Distribute the turn's market demand across restaurants.
///
/// Pure over its inputs: identical scenario, snapshots, and turn number give
/// bit-identical output. Aggregation iterates restaurants in id order so the
/// reduction order is fixed regardless of input order.
pub fn allocate_demand(
    scenario: &Scenario,
    snapshots: &[RestaurantSnapshot],
    turn: u32,
) -> Result<MarketAllocation, EconError> {
    validate_market_inputs(scenario, snapshots)?;

    let mut ordered: Vec<&RestaurantSnapshot> = snapshots.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let noise = noise_factor(scenario.turn_seed(turn), scenario.demand_noise);
    let total_demand =
        (scenario.base_demand as f64 * scenario.visit_propensity * noise).floor() as u64;

    let mut demand: BTreeMap<RestaurantId, u64> =
        ordered.iter().map(|s| (s.id.clone(), 0)).collect();
    let mut shares_by_segment = BTreeMap::new();
    let mut anomalies = Vec::new();

    for segment in &scenario.segments {
        let segment_demand = (total_demand as f64 * segment.share).floor() as u64;
        if segment_demand == 0 {
            continue;
        }

        let scores: Vec<(&RestaurantId, f64)> = ordered
            .iter()
            .map(|snap| (&snap.id, attraction_score(snap, segment, scenario)))
            .collect();
        let total_score: f64 = scores.iter().map(|(_, s)| s).sum();

        if total_score <= 0.0 {
            let anomaly = Anomaly::SegmentUnserved {
                segment: segment.name.clone(),
                demand: segment_demand,
            };
            error!(segment = %segment.name, lost = segment_demand, "segment demand entirely lost");
            anomalies.push(anomaly);
            continue;
        }

        let mut shares: BTreeMap<RestaurantId, f64> = scores
            .iter()
            .map(|(id, score)| ((*id).clone(), score / total_score))
            .collect();
        let share_sum: f64 = shares.values().sum();
        let drift = (share_sum - 1.0).abs();
        if drift > SHARE_TOLERANCE {
            for share in shares.values_mut() {
                *share /= share_sum;
            }
            let anomaly = Anomaly::ShareDrift {
                segment: segment.name.clone(),
                drift,
            };
            error!(segment = %segment.name, drift, "share normalization drift corrected");
            anomalies.push(anomaly);
        }

        for (id, share) in &shares {
            let allocated = (segment_demand as f64 * share).floor() as u64;
            if let Some(total) = demand.get_mut(id) {
                *total += allocated;
            }
        }
        shares_by_segment.insert(segment.name.clone(), shares);
    }

    Ok(MarketAllocation {
        total_demand,
        demand,
        shares_by_segment,
        anomalies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{scenario, segment, snapshot};
    use proptest::prelude::*;
    use sim_core::RestaurantType;

    fn students_and_foodies() -> Scenario {
        let mut students = segment("Students", 0.5, 11, 1.8);
        students.type_affinity.insert(RestaurantType::Fast, 1.3);
        let mut foodies = segment("Foodies", 0.5, 25, 0.4);
        foodies
            .type_affinity
            .insert(RestaurantType::Gastronomic, 1.3);
        scenario(vec![students, foodies])
    }

    #[test]
    fn students_go_cheap_foodies_go_fancy() {
        let sc = students_and_foodies();
        let a = snapshot("a", RestaurantType::Fast, 10, 60);
        let b = snapshot("b", RestaurantType::Gastronomic, 24, 40);
        let alloc = allocate_demand(&sc, &[a, b], 1).unwrap();

        let students = &alloc.shares_by_segment["Students"];
        let foodies = &alloc.shares_by_segment["Foodies"];
        assert!(
            students[&RestaurantId("a".into())] > 0.5,
            "fast restaurant should capture most student demand"
        );
        assert!(
            foodies[&RestaurantId("b".into())] > 0.5,
            "gastronomic restaurant should capture most foodie demand"
        );
        let allocated: u64 = alloc.demand.values().sum();
        assert!(allocated <= alloc.total_demand);
    }

    #[test]
    fn shares_sum_to_one_when_any_score_positive() {
        let sc = students_and_foodies();
        let field = [
            snapshot("a", RestaurantType::Fast, 10, 60),
            snapshot("b", RestaurantType::Gastronomic, 24, 40),
            snapshot("c", RestaurantType::Classic, 14, 50),
        ];
        let alloc = allocate_demand(&sc, &field, 1).unwrap();
        for shares in alloc.shares_by_segment.values() {
            let sum: f64 = shares.values().sum();
            assert!((sum - 1.0).abs() < 1e-9, "shares sum {sum}");
        }
    }

    #[test]
    fn allocation_is_deterministic() {
        let mut sc = students_and_foodies();
        sc.demand_noise = 0.2;
        let field = [
            snapshot("a", RestaurantType::Fast, 10, 60),
            snapshot("b", RestaurantType::Gastronomic, 24, 40),
        ];
        let first = allocate_demand(&sc, &field, 7).unwrap();
        let second = allocate_demand(&sc, &field, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn input_order_does_not_change_output() {
        let sc = students_and_foodies();
        let a = snapshot("a", RestaurantType::Fast, 10, 60);
        let b = snapshot("b", RestaurantType::Gastronomic, 24, 40);
        let forward = allocate_demand(&sc, &[a.clone(), b.clone()], 1).unwrap();
        let reversed = allocate_demand(&sc, &[b, a], 1).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn priced_out_segment_is_lost_and_recorded() {
        let sc = scenario(vec![segment("Students", 1.0, 10, 1.5)]);
        // 30 on a budget of 10 is far beyond the 1.5x stretch.
        let alloc =
            allocate_demand(&sc, &[snapshot("a", RestaurantType::Gastronomic, 30, 40)], 1)
                .unwrap();
        assert_eq!(alloc.demand[&RestaurantId("a".into())], 0);
        assert!(matches!(
            alloc.anomalies.as_slice(),
            [Anomaly::SegmentUnserved { demand: 100, .. }]
        ));
    }

    #[test]
    fn closed_restaurant_scores_zero() {
        let sc = students_and_foodies();
        let mut snap = snapshot("a", RestaurantType::Fast, 10, 60);
        snap.staffing = StaffingLevel::Closed;
        assert_eq!(attraction_score(&snap, &sc.segments[0], &sc), 0.0);
    }

    #[test]
    fn raising_price_past_budget_never_gains_demand() {
        let sc = scenario(vec![segment("Students", 1.0, 11, 1.8)]);
        let rival = snapshot("rival", RestaurantType::Classic, 11, 50);
        let mut last = u64::MAX;
        for ticket in [10i64, 12, 14, 17] {
            let subject = snapshot("subject", RestaurantType::Classic, ticket, 50);
            let alloc = allocate_demand(&sc, &[subject, rival.clone()], 1).unwrap();
            let got = alloc.demand[&RestaurantId("subject".into())];
            assert!(got <= last, "demand rose from {last} to {got} at ticket {ticket}");
            last = got;
        }
        assert_eq!(last, 0, "ticket beyond stretch must allocate nothing");
    }

    #[test]
    fn validation_failure_aborts() {
        let mut sc = students_and_foodies();
        sc.segments[0].share = 0.9;
        let err = allocate_demand(&sc, &[snapshot("a", RestaurantType::Fast, 10, 60)], 1)
            .unwrap_err();
        assert!(matches!(err, EconError::Validation(_)));
    }

    proptest! {
        #[test]
        fn conservation_holds(
            budgets in proptest::collection::vec(8i64..40, 1..4),
            tickets in proptest::collection::vec(5i64..45, 1..6),
            seed in 0u64..1000,
        ) {
            let n = budgets.len();
            let share = 1.0 / n as f64;
            let segments: Vec<Segment> = budgets
                .iter()
                .enumerate()
                .map(|(i, b)| segment(&format!("s{i}"), share, *b, 1.0))
                .collect();
            let mut sc = scenario(segments);
            sc.rng_seed = seed;
            sc.demand_noise = 0.15;
            let field: Vec<RestaurantSnapshot> = tickets
                .iter()
                .enumerate()
                .map(|(i, t)| snapshot(&format!("r{i}"), RestaurantType::Classic, *t, 50))
                .collect();
            let alloc = allocate_demand(&sc, &field, 1).unwrap();
            let allocated: u64 = alloc.demand.values().sum();
            prop_assert!(allocated <= alloc.total_demand);
            for shares in alloc.shares_by_segment.values() {
                let sum: f64 = shares.values().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
            }
        }
    }
}
