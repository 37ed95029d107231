#![deny(warnings)]

//! AI decision policies for Resto Tycoon.
//!
//! A policy sees exactly what a human player sees (its own snapshot and the
//! public turn history) and produces a [`Decision`]. Difficulty levels are
//! different policy implementations, swappable without touching the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Decision, RestaurantId, RestaurantSnapshot, StaffingLevel};
use sim_econ::TurnSummary;
use tracing::debug;

/// Utilization above which a policy reinforces staffing.
const UTILIZATION_HIGH: f64 = 0.8;
/// Utilization below which a policy sheds staffing.
const UTILIZATION_LOW: f64 = 0.5;
/// Market-share gap to the leader that triggers a price reaction.
const LEADER_GAP: f64 = 0.15;

/// A per-restaurant decision maker.
///
/// `history` is ordered oldest-first; the last element is the latest sealed
/// turn. Policies may keep internal state but must not peek beyond their
/// inputs.
pub trait DecisionPolicy {
    /// Produce this turn's decision for the restaurant in `snapshot`.
    fn decide(&mut self, snapshot: &RestaurantSnapshot, history: &[Vec<TurnSummary>]) -> Decision;
}

/// Difficulty levels exposed to the host. Each maps to one policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    /// Keeps price and nominal staffing, come what may.
    Easy,
    /// Adjusts staffing to last turn's utilization.
    Medium,
    /// Staffing plus price reactions to the market-share leader.
    Hard,
}

impl Difficulty {
    /// Build the policy implementing this difficulty.
    pub fn policy(self) -> Box<dyn DecisionPolicy> {
        match self {
            Difficulty::Easy => Box::new(SteadyPolicy),
            Difficulty::Medium => Box::new(ReactivePolicy),
            Difficulty::Hard => Box::new(AggressivePolicy),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Easy: hold price, run at nominal staffing.
pub struct SteadyPolicy;

impl DecisionPolicy for SteadyPolicy {
    fn decide(&mut self, snapshot: &RestaurantSnapshot, _history: &[Vec<TurnSummary>]) -> Decision {
        Decision {
            average_ticket: snapshot.average_ticket,
            staffing: StaffingLevel::Normal,
            marketing_spend: Decimal::ZERO,
        }
    }
}

/// Medium: staff up when last turn ran hot, shed staff when it ran cold.
pub struct ReactivePolicy;

impl DecisionPolicy for ReactivePolicy {
    fn decide(&mut self, snapshot: &RestaurantSnapshot, history: &[Vec<TurnSummary>]) -> Decision {
        Decision {
            average_ticket: snapshot.average_ticket,
            staffing: react_staffing(snapshot, history),
            marketing_spend: Decimal::ZERO,
        }
    }
}

/// Hard: reactive staffing plus bounded price moves against the leader.
pub struct AggressivePolicy;

impl DecisionPolicy for AggressivePolicy {
    fn decide(&mut self, snapshot: &RestaurantSnapshot, history: &[Vec<TurnSummary>]) -> Decision {
        let staffing = react_staffing(snapshot, history);
        let mut ticket = snapshot.average_ticket;

        if let Some(last) = history.last() {
            let own = share_of(&snapshot.id, last);
            let leader = last
                .iter()
                .map(|s| s.market_share)
                .fold(0.0f64, f64::max);
            if leader - own >= LEADER_GAP {
                // Trailing badly: undercut by 10%.
                ticket = (ticket * Decimal::new(90, 2)).round_dp(2);
                debug!(restaurant = %snapshot.id, %ticket, "trailing leader, cutting price");
            } else if own >= leader - f64::EPSILON && own - runner_up(&snapshot.id, last) >= LEADER_GAP
            {
                // Comfortably ahead: take a little margin back.
                ticket = (ticket * Decimal::new(105, 2)).round_dp(2);
                debug!(restaurant = %snapshot.id, %ticket, "leading, nudging price up");
            }
        }

        Decision {
            average_ticket: ticket.max(Decimal::ONE),
            staffing,
            marketing_spend: Decimal::ZERO,
        }
    }
}

/// Shared staffing reaction: utilization > 0.8 adds a level, < 0.5 drops one,
/// never below `Light` (the policy reopens a closed restaurant).
fn react_staffing(snapshot: &RestaurantSnapshot, history: &[Vec<TurnSummary>]) -> StaffingLevel {
    let current = match snapshot.staffing {
        StaffingLevel::Closed => return StaffingLevel::Light,
        level => level,
    };
    let Some(last) = history.last() else {
        return current;
    };
    let Some(own) = last.iter().find(|s| s.restaurant == snapshot.id) else {
        return current;
    };
    if own.utilization > UTILIZATION_HIGH {
        match current {
            StaffingLevel::Light => StaffingLevel::Normal,
            _ => StaffingLevel::Reinforced,
        }
    } else if own.utilization < UTILIZATION_LOW {
        match current {
            StaffingLevel::Reinforced => StaffingLevel::Normal,
            _ => StaffingLevel::Light,
        }
    } else {
        current
    }
}

fn share_of(id: &RestaurantId, summaries: &[TurnSummary]) -> f64 {
    summaries
        .iter()
        .find(|s| &s.restaurant == id)
        .map(|s| s.market_share)
        .unwrap_or(0.0)
}

fn runner_up(leader: &RestaurantId, summaries: &[TurnSummary]) -> f64 {
    summaries
        .iter()
        .filter(|s| &s.restaurant != leader)
        .map(|s| s.market_share)
        .fold(0.0f64, f64::max)
}

/// Scalar score a policy evaluation can rank decisions by: weighted blend of
/// market share and margin rate, higher is better.
pub fn utility(market_share: f64, margin_rate: f64) -> f64 {
    (market_share * 0.7) + (margin_rate * 0.3)
}
