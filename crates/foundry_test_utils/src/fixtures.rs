//! Test fixtures and helpers.
//!
//! Pre-built configurations and sessions for consistent testing.

use fixed::types::I32F32;
use foundry_core::automation::AutomationDef;
use foundry_core::config::{GameConfig, LineConfig};
use foundry_core::kinds::{ResourceKind, SystemKind};
use foundry_core::ledger::ResourceCost;
use foundry_core::production::ProductionLine;
use foundry_core::simulation::SimulationClock;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Default configuration with an energy pool large enough that setup code
/// never overheats.
#[must_use]
pub fn roomy_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.energy.max = fixed(10_000);
    config
}

/// The energy pool used throughout the overheat scenarios: 100 max,
/// 10 per villager, 5/s regen, 3 s cooldown.
#[must_use]
pub fn scenario_config() -> GameConfig {
    GameConfig::default()
}

/// A session with villagers already placed, and no pending events.
///
/// # Panics
///
/// Panics if a line cannot take the requested villagers.
#[must_use]
pub fn staffed_clock(staff: &[(SystemKind, u32)]) -> SimulationClock {
    let mut clock = SimulationClock::new(roomy_config());
    for &(kind, count) in staff {
        for _ in 0..count {
            clock
                .request_generation(kind)
                .unwrap_or_else(|e| panic!("cannot staff {kind}: {e}"));
        }
    }
    clock.drain_events();
    clock
}

/// A session with several villagers on every line.
#[must_use]
pub fn busy_clock() -> SimulationClock {
    staffed_clock(&[
        (SystemKind::Mining, 3),
        (SystemKind::Woodcutting, 4),
        (SystemKind::Farming, 2),
        (SystemKind::Smithing, 5),
        (SystemKind::Market, 1),
    ])
}

/// A standalone line with chosen parameters.
#[must_use]
pub fn line_with(villagers: u32, output: I32F32, cycle: I32F32) -> ProductionLine {
    let mut config = LineConfig::builtin(SystemKind::Mining);
    config.output_per_villager = output;
    config.cycle_duration = cycle;
    config.max_villagers = config.max_villagers.max(villagers);
    let mut line = ProductionLine::from_config(&config);
    line.villager_count = villagers;
    line
}

/// A mining manager costing 100 stone, needing 3 villagers.
#[must_use]
pub fn mine_foreman() -> AutomationDef {
    AutomationDef {
        role_id: "mine_foreman".to_string(),
        display_name: "Mine Foreman".to_string(),
        description: "Keeps the quarry running while you are away.".to_string(),
        target: SystemKind::Mining,
        unlock_costs: vec![ResourceCost::new(ResourceKind::Stone, fixed(100))],
        required_tier: 1,
        required_villagers: 3,
        prerequisites: Vec::new(),
    }
}
