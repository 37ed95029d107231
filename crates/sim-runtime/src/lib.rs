#![deny(warnings)]

//! Turn orchestration for Resto Tycoon.
//!
//! [`GameState`] owns the scenario, the restaurant entities, and the sealed
//! turn history; there is no ambient global state. [`resolve_turn`] walks a
//! turn through `DecisionsOpen → Allocating → Resolving → Resolved`,
//! invoking the engine crates and applying outputs back to the entities as
//! the single writer, once, at the end.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    validate_decision, Decision, RestaurantId, RestaurantSnapshot, RestaurantType, Scenario,
    StaffingLevel, ValidationError,
};
use sim_econ::{
    allocate_demand, effective_capacity, resolve_finance, resolve_service, summarize_turn,
    AllocationResult, Anomaly, EconError, FinanceInputs, TurnSummary,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Reputation gained on a turn with healthy utilization and nobody turned away.
const REPUTATION_GAIN: f64 = 0.2;
/// Reputation lost on a turn where a significant share of demand went unserved.
const REPUTATION_LOSS: f64 = 0.3;
/// Fraction of allocated demand lost that counts as significant.
const LOSS_THRESHOLD: f64 = 0.2;
/// Marketing boost saturates towards this ceiling as spend grows.
const MARKETING_CEILING: f64 = 0.3;
/// Spend at which the marketing boost reaches half its ceiling.
const MARKETING_HALF_SPEND: f64 = 500.0;

/// A restaurant entity: the mutable state that survives across turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    /// Unique identifier.
    pub id: RestaurantId,
    /// Display name.
    pub name: String,
    /// Restaurant type.
    pub kind: RestaurantType,
    /// Current average ticket (TTC), carried over when no decision changes it.
    pub average_ticket: Decimal,
    /// Seats servable per turn at nominal staffing.
    pub capacity_base: u32,
    /// Current staffing level.
    pub staffing: StaffingLevel,
    /// Reputation score in [0, 10].
    pub reputation: f64,
    /// Cash balance.
    pub cash: Decimal,
}

impl Restaurant {
    /// Open a new restaurant, seeding reputation from the type profile.
    pub fn open(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: RestaurantType,
        capacity_base: u32,
        average_ticket: Decimal,
        cash: Decimal,
        scenario: &Scenario,
    ) -> Self {
        Restaurant {
            id: RestaurantId(id.into()),
            name: name.into(),
            kind,
            average_ticket,
            capacity_base,
            staffing: StaffingLevel::Normal,
            reputation: scenario.type_profile(kind).base_reputation,
            cash,
        }
    }

    /// Read-only view of the current state: what a player or an AI policy
    /// sees when making this turn's decision.
    pub fn view(&self) -> RestaurantSnapshot {
        self.snapshot(None)
    }

    /// Build this turn's read-only snapshot, applying the decision if any.
    fn snapshot(&self, decision: Option<&Decision>) -> RestaurantSnapshot {
        let (ticket, staffing, spend) = match decision {
            Some(d) => (d.average_ticket, d.staffing, d.marketing_spend),
            None => (self.average_ticket, self.staffing, Decimal::ZERO),
        };
        RestaurantSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            average_ticket: ticket,
            capacity_base: self.capacity_base,
            staffing,
            reputation: self.reputation,
            cash: self.cash,
            marketing_boost: marketing_boost(spend),
        }
    }
}

/// Saturating attraction boost bought with marketing spend.
fn marketing_boost(spend: Decimal) -> f64 {
    let spend = spend.to_f64().unwrap_or(0.0).max(0.0);
    if spend == 0.0 {
        return 0.0;
    }
    MARKETING_CEILING * spend / (spend + MARKETING_HALF_SPEND)
}

/// Lifecycle of a turn. Advances monotonically; `Resolved` seals the turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Collecting decisions; nothing resolved yet.
    DecisionsOpen,
    /// Demand allocation in progress.
    Allocating,
    /// Capacity and finance resolution in progress.
    Resolving,
    /// Sealed; results are final and the turn is in the history.
    Resolved,
}

/// One resolved turn: the unit appended to the game's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based turn number.
    pub number: u32,
    /// Calendar date of the turn.
    pub date: NaiveDate,
    /// Lifecycle phase; always `Resolved` once in the history.
    pub phase: TurnPhase,
    /// Total market demand for the turn.
    pub total_demand: u64,
    /// Per-restaurant results, in id order.
    pub results: Vec<AllocationResult>,
    /// Market-wide anomalies (unserved segments, share drift).
    pub market_anomalies: Vec<Anomaly>,
}

impl Turn {
    /// Whether the turn is sealed.
    pub fn is_sealed(&self) -> bool {
        self.phase == TurnPhase::Resolved
    }

    /// Compact per-restaurant summaries for reporting and AI policies.
    pub fn summaries(&self) -> Vec<TurnSummary> {
        summarize_turn(&self.results)
    }
}

/// The whole game: scenario, entities, and the append-only turn history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Scenario configuration, fixed for the whole game.
    pub scenario: Scenario,
    restaurants: Vec<Restaurant>,
    turn_history: Vec<Turn>,
}

impl GameState {
    /// Create a game. Fails fast on a malformed scenario or an empty field.
    pub fn new(scenario: Scenario, restaurants: Vec<Restaurant>) -> Result<Self, EconError> {
        sim_core::validate_scenario(&scenario)?;
        if restaurants.is_empty() {
            return Err(ValidationError::NoRestaurants.into());
        }
        let mut restaurants = restaurants;
        restaurants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(GameState {
            scenario,
            restaurants,
            turn_history: Vec::new(),
        })
    }

    /// Restaurants in id order.
    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    /// Sealed turns, oldest first. Read-only; the history is append-only.
    pub fn turn_history(&self) -> &[Turn] {
        &self.turn_history
    }

    /// Number of the turn currently open for decisions.
    pub fn current_turn(&self) -> u32 {
        self.turn_history.len() as u32 + 1
    }

    /// Per-turn summaries of the whole history, the view AI policies consume.
    pub fn summaries_history(&self) -> Vec<Vec<TurnSummary>> {
        self.turn_history.iter().map(Turn::summaries).collect()
    }

    /// Final standings: restaurants ranked by cash, richest first.
    pub fn standings(&self) -> Vec<(RestaurantId, Decimal)> {
        let mut ranked: Vec<(RestaurantId, Decimal)> = self
            .restaurants
            .iter()
            .map(|r| (r.id.clone(), r.cash))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

/// Resolve one full turn.
///
/// All restaurants compete inside the same snapshot set: decisions are
/// collected up front and nobody sees a competitor's decision before
/// allocation. A [`ValidationError`] aborts before any mutation: entities
/// and history are untouched and the turn stays open for corrected
/// decisions. Per-restaurant anomalies never abort; they are recorded on the
/// result and logged.
pub fn resolve_turn<'a>(
    state: &'a mut GameState,
    decisions: &BTreeMap<RestaurantId, Decision>,
    finance: &BTreeMap<RestaurantId, FinanceInputs>,
    production: &BTreeMap<RestaurantId, u64>,
) -> Result<&'a Turn, EconError> {
    let number = state.current_turn();
    let mut phase = TurnPhase::DecisionsOpen;
    debug!(turn = number, ?phase, "collecting decisions");

    // Decisions are applied to snapshots only; entities mutate at the end.
    for decision in decisions.values() {
        validate_decision(decision)?;
    }
    let snapshots: Vec<RestaurantSnapshot> = state
        .restaurants
        .iter()
        .map(|r| r.snapshot(decisions.get(&r.id)))
        .collect();

    phase = TurnPhase::Allocating;
    debug!(turn = number, ?phase, "allocating demand");
    let allocation = allocate_demand(&state.scenario, &snapshots, number)?;

    phase = TurnPhase::Resolving;
    debug!(turn = number, ?phase, "resolving service and finance");
    let default_inputs = FinanceInputs::default();
    let mut results = Vec::with_capacity(snapshots.len());
    for snap in &snapshots {
        let allocated = allocation.demand.get(&snap.id).copied().unwrap_or(0);
        let capacity = effective_capacity(snap, &state.scenario);
        let svc = resolve_service(
            &snap.id,
            number,
            allocated,
            capacity,
            production.get(&snap.id).copied(),
        );
        let inputs = finance.get(&snap.id).unwrap_or(&default_inputs);
        let fin = resolve_finance(snap, svc.served, inputs, &state.scenario)?;
        results.push(AllocationResult::compose(
            snap.id.clone(),
            allocated,
            svc,
            fin,
        ));
    }

    // Single-writer application of outputs back to the entities.
    for (restaurant, result) in state.restaurants.iter_mut().zip(&results) {
        debug_assert_eq!(restaurant.id, result.restaurant);
        let spend = decisions
            .get(&restaurant.id)
            .map(|d| d.marketing_spend)
            .unwrap_or(Decimal::ZERO);
        if let Some(decision) = decisions.get(&restaurant.id) {
            restaurant.average_ticket = decision.average_ticket;
            restaurant.staffing = decision.staffing;
        }
        restaurant.cash += result.cash_delta - spend;
        restaurant.reputation = reputation_feedback(restaurant.reputation, result);
    }

    let anomaly_count =
        allocation.anomalies.len() + results.iter().map(|r| r.errors.len()).sum::<usize>();
    if anomaly_count > 0 {
        error!(turn = number, anomaly_count, "turn resolved with anomalies");
    }

    phase = TurnPhase::Resolved;
    let turn = Turn {
        number,
        date: state.scenario.turn_date(number),
        phase,
        total_demand: allocation.total_demand,
        results,
        market_anomalies: allocation.anomalies,
    };
    info!(
        turn = number,
        total_demand = turn.total_demand,
        served = turn.results.iter().map(|r| r.served_customers).sum::<u64>(),
        "turn sealed"
    );
    state.turn_history.push(turn);
    Ok(state.turn_history.last().expect("just pushed"))
}

/// Satisfaction feedback on reputation, bounded to [0, 10]: full service at
/// healthy utilization earns a small gain, turning away a significant share
/// of demand costs more.
fn reputation_feedback(reputation: f64, result: &AllocationResult) -> f64 {
    if result.allocated_demand == 0 {
        return reputation;
    }
    let lost_share = result.lost_customers as f64 / result.allocated_demand as f64;
    let delta = if lost_share >= LOSS_THRESHOLD {
        -REPUTATION_LOSS
    } else if result.lost_customers == 0 && result.utilization >= 0.7 {
        REPUTATION_GAIN
    } else {
        0.0
    };
    (reputation + delta).clamp(0.0, 10.0)
}
