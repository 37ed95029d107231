//! Financial resolution: revenue with VAT extraction, cost of goods, labor
//! and fixed charges, margins, and the cash delta applied by the orchestrator.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{RestaurantSnapshot, Scenario, ValidationError};

use crate::EconError;

/// Per-turn charges supplied by the costing, payroll, and ledger
/// collaborators. The engine consumes these figures, it never computes them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinanceInputs {
    /// Average ingredient cost per cover served.
    pub food_cost_per_cover: Decimal,
    /// Gross labor charge for the turn (before the type multiplier).
    pub labor_cost: Decimal,
    /// Rent plus other fixed charges for the turn.
    pub rent_and_fixed: Decimal,
    /// Any other variable charges (marketing fees, interest, ...).
    pub other_charges: Decimal,
    /// VAT rate override; falls back to the scenario rate.
    pub vat_rate: Option<Decimal>,
}

/// Money outcome of one restaurant's turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinanceOutcome {
    /// Revenue including VAT.
    pub revenue_ttc: Decimal,
    /// Revenue excluding VAT.
    pub revenue_ht: Decimal,
    /// VAT collected on sales.
    pub vat_due: Decimal,
    /// Cost of goods sold.
    pub cost_of_goods: Decimal,
    /// revenue_ht - cost_of_goods.
    pub gross_margin: Decimal,
    /// Labor charge after the restaurant type's multiplier.
    pub labor_cost: Decimal,
    /// Result after all charges.
    pub net_result: Decimal,
    /// Cash movement for the turn (equals net result).
    pub cash_delta: Decimal,
    /// cost_of_goods / revenue_ht, 0 when revenue is 0.
    pub food_cost_pct: f64,
    /// net_result / revenue_ht, 0 when revenue is 0.
    pub margin_rate: f64,
}

/// Turn served customers and the ticket price into money and KPIs.
///
/// Every ratio guards a zero denominator: a turn with no revenue reports 0%
/// ratios, it never raises.
pub fn resolve_finance(
    snap: &RestaurantSnapshot,
    served: u64,
    inputs: &FinanceInputs,
    scenario: &Scenario,
) -> Result<FinanceOutcome, EconError> {
    if inputs.food_cost_per_cover < Decimal::ZERO
        || inputs.labor_cost < Decimal::ZERO
        || inputs.rent_and_fixed < Decimal::ZERO
        || inputs.other_charges < Decimal::ZERO
    {
        return Err(ValidationError::NegativeMoney.into());
    }
    let vat_rate = inputs.vat_rate.unwrap_or(scenario.vat_rate);
    if vat_rate < Decimal::ZERO || vat_rate >= Decimal::ONE {
        return Err(ValidationError::NonFinite.into());
    }

    let served_dec = Decimal::from(served);
    let revenue_ttc = snap.average_ticket * served_dec;
    let revenue_ht = revenue_ttc / (Decimal::ONE + vat_rate);
    let vat_due = revenue_ttc - revenue_ht;

    let cost_of_goods = inputs.food_cost_per_cover * served_dec;
    let gross_margin = revenue_ht - cost_of_goods;

    let multiplier = scenario.type_profile(snap.kind).labor_cost_multiplier;
    let labor_cost =
        inputs.labor_cost * Decimal::from_f64(multiplier).unwrap_or(Decimal::ONE);

    let net_result = gross_margin - labor_cost - inputs.rent_and_fixed - inputs.other_charges;

    Ok(FinanceOutcome {
        revenue_ttc,
        revenue_ht,
        vat_due,
        cost_of_goods,
        gross_margin,
        labor_cost,
        net_result,
        cash_delta: net_result,
        food_cost_pct: guarded_ratio(cost_of_goods, revenue_ht),
        margin_rate: guarded_ratio(net_result, revenue_ht),
    })
}

/// num / den as f64, 0 when the denominator is zero or the conversion fails.
fn guarded_ratio(num: Decimal, den: Decimal) -> f64 {
    if den == Decimal::ZERO {
        return 0.0;
    }
    (num / den).to_f64().unwrap_or(0.0)
}
