#![deny(warnings)]

//! Headless CLI: builds a demo market, lets AI policies run every restaurant
//! for N turns, and prints per-turn results plus final standings.

use anyhow::Result;
use rust_decimal::Decimal;
use sim_ai::{DecisionPolicy, Difficulty};
use sim_core::{RestaurantId, RestaurantType, Scenario, Segment, StaffingLevel};
use sim_econ::FinanceInputs;
use sim_runtime::{resolve_turn, GameState, Restaurant, Turn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    turns: Option<u32>,
    seed: Option<u64>,
    difficulty: Difficulty,
    dump_json: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        turns: None,
        seed: None,
        difficulty: Difficulty::Medium,
        dump_json: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--turns" => args.turns = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--ai" => {
                if let Some(s) = it.next() {
                    args.difficulty = s.parse().map_err(anyhow::Error::msg)?;
                }
            }
            "--dump-json" => args.dump_json = it.next().map(PathBuf::from),
            _ => {}
        }
    }
    Ok(args)
}

/// Two-segment demo market: price-sensitive students against deep-pocketed
/// foodies, with a fast joint, a brasserie, and a gastronomic table.
fn demo_scenario(seed: u64) -> Scenario {
    let students = Segment {
        name: "Students".to_string(),
        share: 0.5,
        budget: Decimal::new(11, 0),
        price_sensitivity: 1.8,
        quality_sensitivity: 0.8,
        type_affinity: BTreeMap::from([
            (RestaurantType::Fast, 1.3),
            (RestaurantType::Gastronomic, 0.7),
        ]),
    };
    let foodies = Segment {
        name: "Foodies".to_string(),
        share: 0.5,
        budget: Decimal::new(25, 0),
        price_sensitivity: 0.4,
        quality_sensitivity: 1.4,
        type_affinity: BTreeMap::from([
            (RestaurantType::Fast, 0.7),
            (RestaurantType::Gastronomic, 1.3),
        ]),
    };
    Scenario {
        name: "Demo high street".to_string(),
        turns: 6,
        base_demand: 100,
        visit_propensity: 1.0,
        demand_noise: 0.1,
        segments: vec![students, foodies],
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
        rng_seed: seed,
        start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
    }
}

fn demo_restaurants(scenario: &Scenario) -> Vec<Restaurant> {
    vec![
        Restaurant::open(
            "r1",
            "Quick Bite",
            RestaurantType::Fast,
            60,
            Decimal::new(10, 0),
            Decimal::new(8000, 0),
            scenario,
        ),
        Restaurant::open(
            "r2",
            "Côté Zinc",
            RestaurantType::Brasserie,
            45,
            Decimal::new(16, 0),
            Decimal::new(8000, 0),
            scenario,
        ),
        Restaurant::open(
            "r3",
            "Le Palais",
            RestaurantType::Gastronomic,
            40,
            Decimal::new(24, 0),
            Decimal::new(8000, 0),
            scenario,
        ),
    ]
}

/// Stand-in for the costing/payroll collaborators: food at 30% of the HT
/// ticket, labor scaled by staffing level, flat rent.
fn demo_finance_inputs(game: &GameState) -> BTreeMap<RestaurantId, FinanceInputs> {
    let vat = Decimal::ONE + game.scenario.vat_rate;
    game.restaurants()
        .iter()
        .map(|r| {
            let ticket_ht = r.average_ticket / vat;
            let labor_base = Decimal::new(600, 0);
            let labor = match r.staffing {
                StaffingLevel::Closed => Decimal::new(120, 0),
                StaffingLevel::Light => labor_base * Decimal::new(7, 1),
                StaffingLevel::Normal => labor_base,
                StaffingLevel::Reinforced => labor_base * Decimal::new(13, 1),
            };
            let inputs = FinanceInputs {
                food_cost_per_cover: (ticket_ht * Decimal::new(30, 2)).round_dp(2),
                labor_cost: labor * (Decimal::ONE + game.scenario.social_charges_rate),
                rent_and_fixed: Decimal::new(400, 0),
                other_charges: Decimal::ZERO,
                vat_rate: None,
            };
            (r.id.clone(), inputs)
        })
        .collect()
}

fn print_turn(game: &GameState, turn: &Turn) {
    println!(
        "\nTurn {}/{} | {} | market demand {}",
        turn.number, game.scenario.turns, turn.date, turn.total_demand
    );
    println!(
        "{:<12} {:<10} {:>7} {:>7} {:>5} {:>7} {:>10} {:>10}",
        "Restaurant", "Type", "Alloc", "Served", "Cap", "Util", "Revenue", "Net"
    );
    for result in &turn.results {
        let entity = game
            .restaurants()
            .iter()
            .find(|r| r.id == result.restaurant)
            .expect("result id matches an entity");
        println!(
            "{:<12} {:<10} {:>7} {:>7} {:>5} {:>6.1}% {:>10.2} {:>10.2}",
            entity.name,
            format!("{:?}", entity.kind),
            result.allocated_demand,
            result.served_customers,
            result.effective_capacity,
            result.utilization * 100.0,
            result.revenue_ttc,
            result.net_result,
        );
    }
    for anomaly in turn
        .market_anomalies
        .iter()
        .chain(turn.results.iter().flat_map(|r| r.errors.iter()))
    {
        println!("  ! {anomaly}");
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args()?;
    let scenario = demo_scenario(args.seed.unwrap_or(42));
    let turns = args.turns.unwrap_or(scenario.turns);
    info!(scenario = %scenario.name, turns, ai = ?args.difficulty, "starting game");

    let restaurants = demo_restaurants(&scenario);
    let mut game = GameState::new(scenario, restaurants)?;

    let mut policies: BTreeMap<RestaurantId, Box<dyn DecisionPolicy>> = game
        .restaurants()
        .iter()
        .map(|r| (r.id.clone(), args.difficulty.policy()))
        .collect();

    for _ in 0..turns {
        let history = game.summaries_history();
        let decisions = game
            .restaurants()
            .iter()
            .map(|r| {
                let policy = policies.get_mut(&r.id).expect("policy per restaurant");
                (r.id.clone(), policy.decide(&r.view(), &history))
            })
            .collect();
        let finance = demo_finance_inputs(&game);
        let turn = resolve_turn(&mut game, &decisions, &finance, &BTreeMap::new())?;
        let turn = turn.clone();
        print_turn(&game, &turn);
    }

    println!("\nFinal standings:");
    for (rank, (id, cash)) in game.standings().iter().enumerate() {
        let name = game
            .restaurants()
            .iter()
            .find(|r| &r.id == id)
            .map(|r| r.name.as_str())
            .unwrap_or("?");
        println!("{:>2}. {:<12} {:>10.2}", rank + 1, name, cash);
    }

    if let Some(path) = args.dump_json {
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, game.turn_history())?;
        println!("\nTurn history written to {}", path.display());
    }

    Ok(())
}
