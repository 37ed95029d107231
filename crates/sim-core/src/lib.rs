#![deny(warnings)]

//! Core domain models and invariants for Resto Tycoon.
//!
//! This crate defines the serializable types shared across the simulation
//! (customer segments, restaurant snapshots, scenario configuration, per-turn
//! decisions) with validation helpers that guarantee basic invariants before
//! the engine runs.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Unique identifier for a restaurant, e.g. "player_1", "ai_2".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RestaurantId(pub String);

impl std::fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of restaurants competing on the market.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RestaurantType {
    /// Counter service, quick turnover.
    Fast,
    /// Traditional sit-down restaurant.
    Classic,
    /// All-day brasserie.
    Brasserie,
    /// High-end gastronomic table.
    Gastronomic,
}

impl RestaurantType {
    /// All variants in canonical order.
    pub const ALL: [RestaurantType; 4] = [
        RestaurantType::Fast,
        RestaurantType::Classic,
        RestaurantType::Brasserie,
        RestaurantType::Gastronomic,
    ];
}

/// Per-type operating characteristics, resolved from the scenario table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TypeProfile {
    /// Service speed multiplier on seating capacity (> 0).
    pub speed_factor: f64,
    /// Reputation a freshly opened restaurant of this type starts with (0..=10).
    pub base_reputation: f64,
    /// Multiplier applied to the labor charge supplied by payroll.
    pub labor_cost_multiplier: f64,
}

impl TypeProfile {
    /// Built-in profile used when the scenario table has no entry.
    pub fn default_for(kind: RestaurantType) -> Self {
        match kind {
            RestaurantType::Fast => TypeProfile {
                speed_factor: 1.4,
                base_reputation: 4.5,
                labor_cost_multiplier: 0.9,
            },
            RestaurantType::Classic => TypeProfile {
                speed_factor: 1.0,
                base_reputation: 5.5,
                labor_cost_multiplier: 1.0,
            },
            RestaurantType::Brasserie => TypeProfile {
                speed_factor: 1.1,
                base_reputation: 6.0,
                labor_cost_multiplier: 1.1,
            },
            RestaurantType::Gastronomic => TypeProfile {
                speed_factor: 0.8,
                base_reputation: 7.0,
                labor_cost_multiplier: 1.3,
            },
        }
    }
}

/// Staffing level chosen each turn. Scales effective capacity and
/// attractiveness through the scenario's factor tables.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum StaffingLevel {
    /// Doors shut: zero capacity, invisible to customers.
    Closed,
    /// Skeleton crew.
    Light,
    /// Nominal staffing.
    Normal,
    /// Reinforced team.
    Reinforced,
}

impl StaffingLevel {
    /// Numeric index 0..=3, matching scenario data files.
    pub fn index(self) -> u8 {
        match self {
            StaffingLevel::Closed => 0,
            StaffingLevel::Light => 1,
            StaffingLevel::Normal => 2,
            StaffingLevel::Reinforced => 3,
        }
    }

    /// Parse the 0..=3 index used by scenario data files.
    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(StaffingLevel::Closed),
            1 => Some(StaffingLevel::Light),
            2 => Some(StaffingLevel::Normal),
            3 => Some(StaffingLevel::Reinforced),
            _ => None,
        }
    }
}

/// A cohort of customers sharing budget, sensitivities, and type tastes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    /// Segment name, e.g. "Students".
    pub name: String,
    /// Share of the total market population in [0, 1]; shares sum to 1.
    pub share: f64,
    /// Average budget per meal.
    pub budget: Decimal,
    /// Price sensitivity weight in [0, 2]. Higher punishes dear tickets harder.
    #[serde(default = "one")]
    pub price_sensitivity: f64,
    /// Quality sensitivity weight in [0, 2].
    #[serde(default = "one")]
    pub quality_sensitivity: f64,
    /// Affinity per restaurant type (>= 0, missing entries read as 1.0).
    #[serde(default)]
    pub type_affinity: BTreeMap<RestaurantType, f64>,
}

fn one() -> f64 {
    1.0
}

impl Segment {
    /// Affinity coefficient for a restaurant type (1.0 when unspecified).
    pub fn affinity(&self, kind: RestaurantType) -> f64 {
        self.type_affinity.get(&kind).copied().unwrap_or(1.0)
    }

    /// The type this segment likes best, if any affinity stands out.
    pub fn preferred_type(&self) -> Option<RestaurantType> {
        RestaurantType::ALL
            .iter()
            .copied()
            .max_by(|a, b| {
                self.affinity(*a)
                    .partial_cmp(&self.affinity(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .filter(|kind| self.affinity(*kind) > 1.0)
    }
}

/// Scenario configuration: market size, segments, and the factor tables the
/// engine consumes. Loaded once at game start and passed by value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario display name.
    pub name: String,
    /// Number of turns in a full game (1 turn = 1 month).
    pub turns: u32,
    /// Total market size: customers shopping for a meal per turn.
    pub base_demand: u64,
    /// Fraction of the population actually visiting each turn (default 1.0).
    #[serde(default = "one")]
    pub visit_propensity: f64,
    /// Multiplicative demand noise amplitude in [0, 1).
    #[serde(default)]
    pub demand_noise: f64,
    /// Customer segments; shares sum to 1 within tolerance.
    pub segments: Vec<Segment>,
    /// Per-type operating profiles; missing entries fall back to built-ins.
    #[serde(default)]
    pub type_profiles: BTreeMap<RestaurantType, TypeProfile>,
    /// Effective-capacity factor per staffing level.
    #[serde(default = "default_service_factors")]
    pub staffing_service_factors: BTreeMap<StaffingLevel, f64>,
    /// Attractiveness bonus per staffing level.
    #[serde(default = "default_attraction_bonus")]
    pub staffing_attraction_bonus: BTreeMap<StaffingLevel, f64>,
    /// VAT rate applied to on-site sales.
    #[serde(default = "default_vat")]
    pub vat_rate: Decimal,
    /// Employer social charges rate, consumed by the payroll collaborator.
    #[serde(default = "default_social_charges")]
    pub social_charges_rate: Decimal,
    /// Price/budget ratio beyond which a restaurant is unaffordable.
    #[serde(default = "default_budget_stretch")]
    pub budget_stretch: f64,
    /// Seed for deterministic demand noise.
    pub rng_seed: u64,
    /// Calendar date of turn 1.
    pub start_date: NaiveDate,
}

fn default_service_factors() -> BTreeMap<StaffingLevel, f64> {
    BTreeMap::from([
        (StaffingLevel::Closed, 0.0),
        (StaffingLevel::Light, 0.7),
        (StaffingLevel::Normal, 1.0),
        (StaffingLevel::Reinforced, 1.3),
    ])
}

fn default_attraction_bonus() -> BTreeMap<StaffingLevel, f64> {
    BTreeMap::from([
        (StaffingLevel::Closed, 0.0),
        (StaffingLevel::Light, 0.8),
        (StaffingLevel::Normal, 1.0),
        (StaffingLevel::Reinforced, 1.2),
    ])
}

fn default_vat() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

fn default_social_charges() -> Decimal {
    Decimal::new(42, 2) // 0.42
}

fn default_budget_stretch() -> f64 {
    1.5
}

impl Scenario {
    /// Capacity factor for a staffing level. `Closed` is always 0.
    pub fn service_factor(&self, level: StaffingLevel) -> f64 {
        if level == StaffingLevel::Closed {
            return 0.0;
        }
        self.staffing_service_factors
            .get(&level)
            .copied()
            .unwrap_or(1.0)
    }

    /// Attractiveness bonus for a staffing level. `Closed` is always 0.
    pub fn attraction_bonus(&self, level: StaffingLevel) -> f64 {
        if level == StaffingLevel::Closed {
            return 0.0;
        }
        self.staffing_attraction_bonus
            .get(&level)
            .copied()
            .unwrap_or(1.0)
    }

    /// Operating profile for a restaurant type.
    pub fn type_profile(&self, kind: RestaurantType) -> TypeProfile {
        self.type_profiles
            .get(&kind)
            .copied()
            .unwrap_or_else(|| TypeProfile::default_for(kind))
    }

    /// Deterministic per-turn seed derived from the scenario seed.
    pub fn turn_seed(&self, turn: u32) -> u64 {
        self.rng_seed ^ (turn as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    /// Calendar date of a 1-based turn.
    pub fn turn_date(&self, turn: u32) -> NaiveDate {
        self.start_date
            .checked_add_months(Months::new(turn.saturating_sub(1)))
            .unwrap_or(self.start_date)
    }
}

/// Read-only per-turn view of a restaurant's competitive attributes.
///
/// Built fresh each turn from the restaurant entity plus that turn's
/// decisions; the engine never mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestaurantSnapshot {
    /// Restaurant identifier.
    pub id: RestaurantId,
    /// Display name.
    pub name: String,
    /// Restaurant type.
    pub kind: RestaurantType,
    /// Average ticket price (TTC) of the active menu.
    pub average_ticket: Decimal,
    /// Seats servable per turn at nominal staffing.
    pub capacity_base: u32,
    /// Staffing level decided for this turn.
    pub staffing: StaffingLevel,
    /// Quality/reputation score in [0, 10].
    pub reputation: f64,
    /// Cash balance at turn start.
    pub cash: Decimal,
    /// Attraction boost bought with this turn's marketing spend (>= 0).
    #[serde(default)]
    pub marketing_boost: f64,
}

/// One restaurant's decision for a turn, from a human player or an AI policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    /// Average ticket price (TTC) to charge this turn.
    pub average_ticket: Decimal,
    /// Staffing level for the turn.
    pub staffing: StaffingLevel,
    /// Marketing spend for the turn (deducted from cash, >= 0).
    #[serde(default)]
    pub marketing_spend: Decimal,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Segment shares must sum to 1 within tolerance.
    #[error("segment shares sum to {0}, expected 1.0")]
    SharesSum(f64),
    /// A scenario must define at least one segment.
    #[error("scenario has no segments")]
    EmptySegments,
    /// At least one restaurant must be present.
    #[error("no restaurants on the market")]
    NoRestaurants,
    /// Two snapshots carry the same id.
    #[error("duplicate restaurant id: {0}")]
    DuplicateRestaurant(String),
    /// Prices, budgets, and tickets must be strictly positive.
    #[error("price or budget must be > 0")]
    NonPositivePrice,
    /// Sensitivities must be within [0, 2].
    #[error("sensitivity out of range [0, 2]: {0}")]
    SensitivityOutOfRange(f64),
    /// Reputation must be within [0, 10].
    #[error("reputation out of range [0, 10]: {0}")]
    ReputationOutOfRange(f64),
    /// Shares, factors, and noise must be finite and in range.
    #[error("non-finite or out-of-range numeric value encountered")]
    NonFinite,
    /// Monetary value must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
}

/// Validate a customer segment.
pub fn validate_segment(s: &Segment) -> Result<(), ValidationError> {
    if s.name.trim().is_empty() {
        return Err(ValidationError::NonFinite);
    }
    if !s.share.is_finite() || !(0.0..=1.0).contains(&s.share) {
        return Err(ValidationError::NonFinite);
    }
    if s.budget <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice);
    }
    for v in [s.price_sensitivity, s.quality_sensitivity] {
        if !v.is_finite() || !(0.0..=2.0).contains(&v) {
            return Err(ValidationError::SensitivityOutOfRange(v));
        }
    }
    for affinity in s.type_affinity.values() {
        if !affinity.is_finite() || *affinity < 0.0 {
            return Err(ValidationError::NonFinite);
        }
    }
    Ok(())
}

/// Validate a scenario, including its segment shares and factor tables.
pub fn validate_scenario(sc: &Scenario) -> Result<(), ValidationError> {
    if sc.segments.is_empty() {
        return Err(ValidationError::EmptySegments);
    }
    if sc.turns == 0 || sc.base_demand == 0 {
        return Err(ValidationError::NonFinite);
    }
    if !sc.visit_propensity.is_finite() || sc.visit_propensity <= 0.0 {
        return Err(ValidationError::NonFinite);
    }
    if !sc.demand_noise.is_finite() || !(0.0..1.0).contains(&sc.demand_noise) {
        return Err(ValidationError::NonFinite);
    }
    if !sc.budget_stretch.is_finite() || sc.budget_stretch < 1.0 {
        return Err(ValidationError::NonFinite);
    }
    if sc.vat_rate < Decimal::ZERO || sc.vat_rate >= Decimal::ONE {
        return Err(ValidationError::NonFinite);
    }
    if sc.social_charges_rate < Decimal::ZERO || sc.social_charges_rate >= Decimal::ONE {
        return Err(ValidationError::NonFinite);
    }
    for s in &sc.segments {
        validate_segment(s)?;
    }
    let total: f64 = sc.segments.iter().map(|s| s.share).sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(ValidationError::SharesSum(total));
    }
    for factor in sc
        .staffing_service_factors
        .values()
        .chain(sc.staffing_attraction_bonus.values())
    {
        if !factor.is_finite() || *factor < 0.0 {
            return Err(ValidationError::NonFinite);
        }
    }
    for profile in sc.type_profiles.values() {
        if !profile.speed_factor.is_finite() || profile.speed_factor <= 0.0 {
            return Err(ValidationError::NonFinite);
        }
        if !(0.0..=10.0).contains(&profile.base_reputation) {
            return Err(ValidationError::ReputationOutOfRange(profile.base_reputation));
        }
        if !profile.labor_cost_multiplier.is_finite() || profile.labor_cost_multiplier < 0.0 {
            return Err(ValidationError::NonFinite);
        }
    }
    Ok(())
}

/// Validate a restaurant snapshot.
pub fn validate_snapshot(snap: &RestaurantSnapshot) -> Result<(), ValidationError> {
    if snap.id.0.trim().is_empty() || snap.name.trim().is_empty() {
        return Err(ValidationError::NonFinite);
    }
    if snap.average_ticket <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice);
    }
    if !snap.reputation.is_finite() || !(0.0..=10.0).contains(&snap.reputation) {
        return Err(ValidationError::ReputationOutOfRange(snap.reputation));
    }
    if !snap.marketing_boost.is_finite() || snap.marketing_boost < 0.0 {
        return Err(ValidationError::NonFinite);
    }
    Ok(())
}

/// Validate a per-turn decision before it is applied to an entity.
pub fn validate_decision(d: &Decision) -> Result<(), ValidationError> {
    if d.average_ticket <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice);
    }
    if d.marketing_spend < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate the full input set of a market allocation run.
///
/// Fails fast before any allocation so a turn aborts with no state committed.
pub fn validate_market_inputs(
    scenario: &Scenario,
    snapshots: &[RestaurantSnapshot],
) -> Result<(), ValidationError> {
    validate_scenario(scenario)?;
    if snapshots.is_empty() {
        return Err(ValidationError::NoRestaurants);
    }
    let mut ids: BTreeSet<&RestaurantId> = BTreeSet::new();
    for snap in snapshots {
        validate_snapshot(snap)?;
        if !ids.insert(&snap.id) {
            return Err(ValidationError::DuplicateRestaurant(snap.id.0.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn demo_segment(name: &str, share: f64, budget: i64) -> Segment {
        Segment {
            name: name.to_string(),
            share,
            budget: Decimal::new(budget, 0),
            price_sensitivity: 1.0,
            quality_sensitivity: 1.0,
            type_affinity: BTreeMap::new(),
        }
    }

    fn demo_scenario() -> Scenario {
        Scenario {
            name: "Demo".to_string(),
            turns: 12,
            base_demand: 100,
            visit_propensity: 1.0,
            demand_noise: 0.0,
            segments: vec![demo_segment("Students", 0.5, 11), demo_segment("Foodies", 0.5, 25)],
            type_profiles: BTreeMap::new(),
            staffing_service_factors: default_service_factors(),
            staffing_attraction_bonus: default_attraction_bonus(),
            vat_rate: default_vat(),
            social_charges_rate: default_social_charges(),
            budget_stretch: 1.5,
            rng_seed: 42,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    #[test]
    fn serde_roundtrip_scenario() {
        let sc = demo_scenario();
        validate_scenario(&sc).unwrap();
        let s = serde_json::to_string_pretty(&sc).unwrap();
        let back: Scenario = serde_json::from_str(&s).unwrap();
        assert_eq!(back.segments.len(), 2);
        assert_eq!(back.base_demand, 100);
        assert_eq!(back.turn_seed(3), sc.turn_seed(3));
    }

    #[test]
    fn shares_must_sum_to_one() {
        let mut sc = demo_scenario();
        sc.segments[0].share = 0.7;
        assert_eq!(
            validate_scenario(&sc),
            Err(ValidationError::SharesSum(1.2))
        );
    }

    #[test]
    fn closed_staffing_always_zero() {
        let sc = demo_scenario();
        assert_eq!(sc.service_factor(StaffingLevel::Closed), 0.0);
        assert_eq!(sc.attraction_bonus(StaffingLevel::Closed), 0.0);
        assert!(sc.service_factor(StaffingLevel::Reinforced) > 1.0);
    }

    #[test]
    fn staffing_index_roundtrip() {
        for idx in 0..=3u8 {
            assert_eq!(StaffingLevel::from_index(idx).unwrap().index(), idx);
        }
        assert_eq!(StaffingLevel::from_index(4), None);
    }

    #[test]
    fn preferred_type_is_argmax_affinity() {
        let mut seg = demo_segment("Students", 1.0, 11);
        assert_eq!(seg.preferred_type(), None);
        seg.type_affinity.insert(RestaurantType::Fast, 1.4);
        seg.type_affinity.insert(RestaurantType::Gastronomic, 0.6);
        assert_eq!(seg.preferred_type(), Some(RestaurantType::Fast));
    }

    #[test]
    fn turn_dates_advance_monthly() {
        let sc = demo_scenario();
        assert_eq!(sc.turn_date(1), sc.start_date);
        assert_eq!(
            sc.turn_date(3),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn snapshot_validation_rejects_bad_values() {
        let snap = RestaurantSnapshot {
            id: RestaurantId("r1".into()),
            name: "Chez Test".into(),
            kind: RestaurantType::Classic,
            average_ticket: Decimal::ZERO,
            capacity_base: 40,
            staffing: StaffingLevel::Normal,
            reputation: 5.0,
            cash: Decimal::ZERO,
            marketing_boost: 0.0,
        };
        assert_eq!(
            validate_snapshot(&snap),
            Err(ValidationError::NonPositivePrice)
        );
        let snap = RestaurantSnapshot {
            average_ticket: Decimal::new(15, 0),
            reputation: 11.0,
            ..snap
        };
        assert!(matches!(
            validate_snapshot(&snap),
            Err(ValidationError::ReputationOutOfRange(_))
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let sc = demo_scenario();
        let snap = RestaurantSnapshot {
            id: RestaurantId("r1".into()),
            name: "A".into(),
            kind: RestaurantType::Fast,
            average_ticket: Decimal::new(10, 0),
            capacity_base: 60,
            staffing: StaffingLevel::Normal,
            reputation: 5.0,
            cash: Decimal::ZERO,
            marketing_boost: 0.0,
        };
        let err = validate_market_inputs(&sc, &[snap.clone(), snap]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateRestaurant("r1".into()));
    }

    proptest! {
        #[test]
        fn valid_sensitivities_accepted(ps in 0.0f64..=2.0, qs in 0.0f64..=2.0) {
            let seg = Segment {
                price_sensitivity: ps,
                quality_sensitivity: qs,
                ..demo_segment("Seg", 1.0, 15)
            };
            prop_assert!(validate_segment(&seg).is_ok());
        }

        #[test]
        fn out_of_range_sensitivities_rejected(ps in 2.0001f64..10.0) {
            let seg = Segment {
                price_sensitivity: ps,
                ..demo_segment("Seg", 1.0, 15)
            };
            prop_assert!(validate_segment(&seg).is_err());
        }
    }
}
