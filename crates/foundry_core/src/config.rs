//! Balance configuration.
//!
//! Every tuning value the simulation reads comes from [`GameConfig`]. The
//! core only parses configuration text; reading files is the host's job.
//!
//! # Example RON
//!
//! ```ron
//! GameConfig(
//!     energy: EnergyConfig(max: 120.0, regen_rate: 6.0, cost_per_action: 10.0, cooldown_duration: 3.0),
//!     lines: [
//!         LineConfig(
//!             kind: Mining,
//!             cycle_duration: 8.0,
//!             output_per_villager: 5.0,
//!             max_villagers: 12,
//!         ),
//!     ],
//!     offline: OfflineConfig(max_horizon_seconds: 43200.0),
//!     tap_value: 2.0,
//! )
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::kinds::{ResourceKind, SystemKind};
use crate::ledger::ResourceCost;
use crate::math::{decimal_serde, Fixed};
use crate::production::MIN_CYCLE_DURATION;

/// Default offline catch-up horizon: 24 hours.
pub const DEFAULT_OFFLINE_HORIZON_SECONDS: i32 = 86_400;

/// Largest accepted offline horizon, about 231 days. A full horizon of
/// [`MIN_CYCLE_DURATION`] cycles still fits the integer part of a `Fixed`.
pub const MAX_OFFLINE_HORIZON_SECONDS: i32 = 20_000_000;

/// Energy pool parameters for a new game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Capacity; a new game starts full.
    #[serde(with = "decimal_serde")]
    pub max: Fixed,
    /// Regeneration per second.
    #[serde(with = "decimal_serde")]
    pub regen_rate: Fixed,
    /// Cost of one villager.
    #[serde(with = "decimal_serde")]
    pub cost_per_action: Fixed,
    /// Overheat cooldown in seconds.
    #[serde(with = "decimal_serde")]
    pub cooldown_duration: Fixed,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            max: Fixed::from_num(100),
            regen_rate: Fixed::from_num(5),
            cost_per_action: Fixed::from_num(10),
            cooldown_duration: Fixed::from_num(3),
        }
    }
}

/// How a line's parameters scale with each tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierUpgrade {
    /// Added to `max_villagers` per tier.
    pub villagers_per_tier: u32,
    /// Multiplies `output_per_villager` per tier. Greater than one.
    #[serde(with = "decimal_serde")]
    pub output_multiplier: Fixed,
    /// Multiplies `cycle_duration` per tier. Between zero and one.
    #[serde(with = "decimal_serde")]
    pub cycle_multiplier: Fixed,
    /// Highest reachable tier.
    pub max_tier: u32,
}

impl Default for TierUpgrade {
    fn default() -> Self {
        Self {
            villagers_per_tier: 5,
            output_multiplier: Fixed::from_num(1.5),
            cycle_multiplier: Fixed::from_num(0.9),
            max_tier: 3,
        }
    }
}

/// Starting parameters for one production line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Which line this configures.
    pub kind: SystemKind,
    /// Output resource. Defaults to [`SystemKind::default_output`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ResourceKind>,
    /// Seconds per production cycle.
    #[serde(with = "decimal_serde")]
    pub cycle_duration: Fixed,
    /// Units produced per villager per cycle.
    #[serde(with = "decimal_serde")]
    pub output_per_villager: Fixed,
    /// Villager capacity at tier 1.
    #[serde(default = "default_max_villagers")]
    pub max_villagers: u32,
    /// Per-tier scaling.
    #[serde(default)]
    pub upgrade: TierUpgrade,
    /// Resources spent on each tier upgrade.
    #[serde(default)]
    pub upgrade_cost: Vec<ResourceCost>,
}

fn default_max_villagers() -> u32 {
    10
}

impl LineConfig {
    /// Built-in parameters used when configuration omits a line.
    #[must_use]
    pub fn builtin(kind: SystemKind) -> Self {
        let (cycle, output) = match kind {
            SystemKind::Mining => (10, 5),
            SystemKind::Woodcutting => (12, 4),
            SystemKind::Farming => (60, 20),
            SystemKind::Smithing => (30, 2),
            SystemKind::Market => (15, 10),
        };
        Self {
            kind,
            output: None,
            cycle_duration: Fixed::from_num(cycle),
            output_per_villager: Fixed::from_num(output),
            max_villagers: default_max_villagers(),
            upgrade: TierUpgrade::default(),
            upgrade_cost: Vec::new(),
        }
    }

    /// The resource this line credits.
    #[must_use]
    pub fn output_resource(&self) -> ResourceKind {
        self.output.unwrap_or_else(|| self.kind.default_output())
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        let kind = self.kind;
        if self.output_per_villager <= Fixed::ZERO {
            errors.push(format!("{kind}: output_per_villager must be positive"));
        }
        if self.cycle_duration < MIN_CYCLE_DURATION {
            errors.push(format!(
                "{kind}: cycle_duration must be at least {MIN_CYCLE_DURATION}"
            ));
        }
        if self.max_villagers == 0 {
            errors.push(format!("{kind}: max_villagers must be at least 1"));
        }
        if self.upgrade.output_multiplier <= Fixed::ONE {
            errors.push(format!("{kind}: output_multiplier must be greater than 1"));
        }
        if self.upgrade.cycle_multiplier <= Fixed::ZERO || self.upgrade.cycle_multiplier >= Fixed::ONE
        {
            errors.push(format!("{kind}: cycle_multiplier must be between 0 and 1"));
        }
        if self.upgrade.max_tier == 0 {
            errors.push(format!("{kind}: max_tier must be at least 1"));
        }
        for cost in &self.upgrade_cost {
            if cost.amount < Fixed::ZERO {
                errors.push(format!("{kind}: upgrade cost for {} is negative", cost.resource));
            }
        }
    }
}

/// Offline catch-up limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Longest closed-app span that is replayed, in seconds. Longer spans
    /// are ignored entirely.
    #[serde(with = "decimal_serde")]
    pub max_horizon_seconds: Fixed,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            max_horizon_seconds: Fixed::from_num(DEFAULT_OFFLINE_HORIZON_SECONDS),
        }
    }
}

/// City layout for a new game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    /// Building slots open from the start.
    pub starting_slots: Vec<String>,
    /// Buildings standing from the start, with their tier.
    pub starting_buildings: BTreeMap<String, u32>,
    /// Highest tier any building can reach.
    pub max_building_tier: u32,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            starting_slots: vec!["mine_slot".to_string(), "lumber_slot".to_string()],
            starting_buildings: BTreeMap::from([
                ("mine".to_string(), 1),
                ("lumber".to_string(), 1),
            ]),
            max_building_tier: 3,
        }
    }
}

/// Complete balance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Energy pool.
    pub energy: EnergyConfig,
    /// Per-line parameters. Lines not listed use [`LineConfig::builtin`].
    pub lines: Vec<LineConfig>,
    /// Offline catch-up.
    pub offline: OfflineConfig,
    /// Bonus banked by one tap.
    #[serde(with = "decimal_serde")]
    pub tap_value: Fixed,
    /// Ledger contents for a new game.
    pub starting_resources: Vec<ResourceCost>,
    /// City layout for a new game.
    pub city: CityConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            energy: EnergyConfig::default(),
            lines: SystemKind::ALL.into_iter().map(LineConfig::builtin).collect(),
            offline: OfflineConfig::default(),
            tap_value: Fixed::from_num(2),
            starting_resources: Vec::new(),
            city: CityConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parse and validate a RON document.
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(text).map_err(|e| GameError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty RON.
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::ConfigParse(e.to_string()))
    }

    /// Parameters for one line, falling back to the built-in table.
    #[must_use]
    pub fn line(&self, kind: SystemKind) -> LineConfig {
        self.lines
            .iter()
            .find(|line| line.kind == kind)
            .cloned()
            .unwrap_or_else(|| LineConfig::builtin(kind))
    }

    /// Check every constraint and report all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let energy = &self.energy;
        if energy.max <= Fixed::ZERO {
            errors.push("energy: max must be positive".to_string());
        }
        if energy.cost_per_action <= Fixed::ZERO {
            errors.push("energy: cost_per_action must be positive".to_string());
        }
        if energy.regen_rate < Fixed::ZERO {
            errors.push("energy: regen_rate must not be negative".to_string());
        }
        if energy.cooldown_duration < Fixed::ZERO {
            errors.push("energy: cooldown_duration must not be negative".to_string());
        }

        let mut seen = HashSet::new();
        for line in &self.lines {
            if !seen.insert(line.kind) {
                errors.push(format!("{}: configured more than once", line.kind));
            }
            line.validate_into(&mut errors);
        }

        let horizon = self.offline.max_horizon_seconds;
        if horizon <= Fixed::ZERO || horizon > Fixed::from_num(MAX_OFFLINE_HORIZON_SECONDS) {
            errors.push(format!(
                "offline: max_horizon_seconds must be in (0, {MAX_OFFLINE_HORIZON_SECONDS}]"
            ));
        }
        if self.tap_value < Fixed::ZERO {
            errors.push("tap_value must not be negative".to_string());
        }
        for cost in &self.starting_resources {
            if cost.amount < Fixed::ZERO {
                errors.push(format!("starting_resources: {} is negative", cost.resource));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GameError::InvalidConfig(errors))
        }
    }
}
