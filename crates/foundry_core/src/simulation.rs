//! Core simulation clock.
//!
//! [`SimulationClock`] owns every piece of session state: the energy pool,
//! one production line per [`SystemKind`], the ledger and the city. It is
//! the only place where the pool and the lines change together, so they
//! always agree on how much time has passed.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No wall-clock reads (the host passes `dt` and timestamps in)
//! - Consistent iteration order (lines and resources in index order)
//!
//! # Example
//!
//! ```
//! use foundry_core::config::GameConfig;
//! use foundry_core::kinds::{ResourceKind, SystemKind};
//! use foundry_core::math::Fixed;
//! use foundry_core::simulation::SimulationClock;
//!
//! let mut clock = SimulationClock::new(GameConfig::default());
//!
//! // Put three villagers on the mine
//! for _ in 0..3 {
//!     clock.request_generation(SystemKind::Mining).unwrap();
//! }
//!
//! // One mining cycle is 10 seconds
//! clock.tick(Fixed::from_num(10));
//! assert_eq!(clock.resource(ResourceKind::Stone), Fixed::from_num(15));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::automation::{check_unlock, AutomationDef, AutomationError};
use crate::city::{CityProgression, Era};
use crate::config::{GameConfig, LineConfig};
use crate::energy::{EnergyPool, EnergyRefusal, EnergyTransition};
use crate::error::{GameError, Result};
use crate::events::{EventQueue, SimEvent, SimObserver};
use crate::kinds::{LineId, ResourceKind, SystemKind};
use crate::ledger::{Ledger, ResourceCost};
use crate::math::Fixed;
use crate::production::{ProductionLine, UpgradeError};
use crate::snapshot::{GameSnapshot, ResourceEntry, SNAPSHOT_VERSION};

/// Why a villager could not be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// The energy pool is cooling down.
    #[error("energy is overheated")]
    Overheated,
    /// Less than one villager's worth of energy is stored.
    #[error("not enough energy")]
    InsufficientEnergy,
    /// No line has this id.
    #[error("no production line {0}")]
    InvalidTarget(LineId),
    /// The line has no room for another villager.
    #[error("{0} is full")]
    LineFull(SystemKind),
}

impl From<EnergyRefusal> for GenerationError {
    fn from(refusal: EnergyRefusal) -> Self {
        match refusal {
            EnergyRefusal::Overheated => Self::Overheated,
            EnergyRefusal::Insufficient => Self::InsufficientEnergy,
        }
    }
}

/// What one offline catch-up pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineReport {
    /// Seconds replayed.
    pub elapsed: Fixed,
    /// Output credited per line, in line order. Idle lines are omitted.
    pub produced: Vec<(SystemKind, ResourceKind, Fixed)>,
    /// Whether the pool was overheated before catch-up cleared it.
    pub cleared_overheat: bool,
    /// Energy stored after regeneration.
    pub energy_after: Fixed,
}

impl OfflineReport {
    /// Total units credited across every line.
    #[must_use]
    pub fn total_produced(&self) -> Fixed {
        self.produced
            .iter()
            .fold(Fixed::ZERO, |sum, (_, _, amount)| sum.saturating_add(*amount))
    }
}

/// The session state and everything that advances it.
///
/// # Tick Order
///
/// Each [`tick`](Self::tick) runs in this order:
/// 1. **Energy** - cooldown or regeneration
/// 2. **Lines** - every line in [`SystemKind::ALL`] order, crediting the
///    ledger as cycles complete
/// 3. **Play time** - bookkeeping
#[derive(Debug, Clone)]
pub struct SimulationClock {
    config: GameConfig,
    line_configs: [LineConfig; SystemKind::COUNT],
    energy: EnergyPool,
    lines: [ProductionLine; SystemKind::COUNT],
    ledger: Ledger,
    selected_line: LineId,
    last_save_timestamp: i64,
    total_play_time: Fixed,
    unlocked_automations: BTreeSet<String>,
    city: CityProgression,
    events: EventQueue,
}

impl SimulationClock {
    /// Start a new game.
    ///
    /// The pool starts full, every line starts empty at tier 1, the ledger
    /// holds the configured starting resources and Mining is selected.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        let line_configs = SystemKind::ALL.map(|kind| config.line(kind));
        let lines = SystemKind::ALL.map(|kind| ProductionLine::from_config(&line_configs[kind.index()]));

        let mut ledger = Ledger::new();
        for start in &config.starting_resources {
            ledger.credit(start.resource, start.amount);
        }

        Self {
            energy: EnergyPool::from_config(&config.energy),
            city: CityProgression::from_config(&config.city),
            line_configs,
            lines,
            ledger,
            selected_line: SystemKind::Mining.id(),
            last_save_timestamp: 0,
            total_play_time: Fixed::ZERO,
            unlocked_automations: BTreeSet::new(),
            events: EventQueue::new(),
            config,
        }
    }

    /// Rebuild a session from a snapshot, repairing anything unusable.
    ///
    /// Missing lines are re-created from configuration, out-of-range line
    /// and energy fields are reset, negative ledger amounts are zeroed and
    /// an unknown selected line falls back to Mining.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the snapshot was
    /// written by a newer layout version.
    pub fn restore(config: GameConfig, snapshot: GameSnapshot) -> Result<Self> {
        config.validate()?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(GameError::InvalidState(format!(
                "snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
                snapshot.version
            )));
        }

        let mut clock = Self::new(config);

        let mut energy = snapshot.energy;
        let repaired = energy.repair(&clock.config.energy);
        if !repaired.is_empty() {
            tracing::warn!(?repaired, "Repaired restored energy pool");
        }
        clock.energy = energy;

        let mut restored = [false; SystemKind::COUNT];
        for mut line in snapshot.lines {
            let index = line.kind.index();
            if restored[index] {
                tracing::warn!(line = %line.kind, "Ignoring duplicate line in snapshot");
                continue;
            }
            let repaired = line.repair(&clock.line_configs[index]);
            if !repaired.is_empty() {
                tracing::warn!(line = %line.kind, ?repaired, "Repaired restored line");
            }
            clock.lines[index] = line;
            restored[index] = true;
        }
        for kind in SystemKind::ALL {
            if !restored[kind.index()] {
                tracing::warn!(line = %kind, "Snapshot has no line, using defaults");
            }
        }

        clock.ledger = Ledger::new();
        for entry in snapshot.resources {
            if clock.ledger.set_clamped(entry.kind, entry.amount) {
                tracing::warn!(resource = %entry.kind, "Clamped negative restored amount");
            }
        }

        clock.selected_line = if SystemKind::from_id(snapshot.selected_line).is_some() {
            snapshot.selected_line
        } else {
            tracing::warn!(id = %snapshot.selected_line, "Unknown selected line, using Mining");
            SystemKind::Mining.id()
        };

        let mut city = snapshot.city;
        let repaired = city.repair(clock.config.city.max_building_tier);
        if !repaired.is_empty() {
            tracing::warn!(?repaired, "Repaired restored building tiers");
        }
        clock.city = city;

        clock.unlocked_automations = snapshot.unlocked_automations;
        clock.last_save_timestamp = snapshot.last_save_timestamp;
        clock.total_play_time = snapshot.total_play_time.max(Fixed::ZERO);

        Ok(clock)
    }

    /// Capture the persisted state.
    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            version: SNAPSHOT_VERSION,
            energy: self.energy.clone(),
            lines: self.lines.to_vec(),
            resources: self
                .ledger
                .iter()
                .map(|(kind, amount)| ResourceEntry { kind, amount })
                .collect(),
            selected_line: self.selected_line,
            last_save_timestamp: self.last_save_timestamp,
            total_play_time: self.total_play_time,
            unlocked_automations: self.unlocked_automations.clone(),
            city: self.city.clone(),
        }
    }

    /// Replace all state with a new game from the held configuration.
    ///
    /// Pending events are dropped.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
        tracing::info!("Game reset to new state");
    }

    /// Advance the session by `dt` seconds of live play.
    ///
    /// A zero or negative `dt` changes nothing.
    pub fn tick(&mut self, dt: Fixed) {
        if dt <= Fixed::ZERO {
            return;
        }

        if let Some(EnergyTransition::Recovered) = self.energy.update(dt) {
            self.events.push(SimEvent::EnergyRecovered);
        }

        for (line, line_config) in self.lines.iter_mut().zip(&self.line_configs) {
            let produced = line.update(dt);
            if produced <= Fixed::ZERO {
                continue;
            }

            let resource = line_config.output_resource();
            let total = self.ledger.credit(resource, produced);
            tracing::debug!(
                line = %line.kind,
                %resource,
                %produced,
                villagers = line.villager_count,
                "Production cycle complete"
            );
            self.events.push(SimEvent::ResourceChanged {
                kind: resource,
                amount: total,
            });
            self.events.push(SimEvent::ProductionCycleComplete {
                line: line.kind,
                amount: produced,
            });
        }

        self.total_play_time = self.total_play_time.saturating_add(dt);
    }

    /// Replay time the session was closed.
    ///
    /// Spans outside `(0, max_horizon_seconds]` are ignored and return
    /// `None`. Lines pay out whole cycles without tap bonus and keep their
    /// phase. The pool regenerates over the whole span and always comes
    /// back out of overheat, even if it went offline mid-cooldown.
    pub fn process_offline_elapsed(&mut self, elapsed: Fixed) -> Option<OfflineReport> {
        let horizon = self.config.offline.max_horizon_seconds;
        if elapsed <= Fixed::ZERO || elapsed > horizon {
            tracing::warn!(%elapsed, %horizon, "Ignoring offline span outside horizon");
            return None;
        }

        let mut produced = Vec::new();
        let mut credited = [false; ResourceKind::COUNT];
        for (line, line_config) in self.lines.iter_mut().zip(&self.line_configs) {
            let amount = line.calculate_offline_production(elapsed);
            if amount <= Fixed::ZERO {
                continue;
            }
            let resource = line_config.output_resource();
            self.ledger.credit(resource, amount);
            credited[resource.index()] = true;
            produced.push((line.kind, resource, amount));
        }

        let cleared_overheat = self.energy.is_overheated;
        self.energy.regenerate_offline(elapsed);

        for kind in ResourceKind::ALL {
            if credited[kind.index()] {
                self.events.push(SimEvent::ResourceChanged {
                    kind,
                    amount: self.ledger.get(kind),
                });
            }
        }
        self.events.push(SimEvent::OfflineProgressApplied { elapsed });

        let report = OfflineReport {
            elapsed,
            produced,
            cleared_overheat,
            energy_after: self.energy.current,
        };
        tracing::info!(
            %elapsed,
            total = %report.total_produced(),
            cleared_overheat,
            "Applied offline progress"
        );
        Some(report)
    }

    /// Generate a villager onto a line.
    ///
    /// Checks run in order: energy (overheat, then amount), target, then
    /// capacity. A refused request changes nothing except queueing a
    /// failure event. A request that overheats the pool still succeeds.
    ///
    /// # Errors
    ///
    /// Returns the reason the villager could not be generated.
    pub fn request_generation(
        &mut self,
        target: impl Into<LineId>,
    ) -> std::result::Result<SystemKind, GenerationError> {
        let target = target.into();
        match self.try_generate(target) {
            Ok(kind) => {
                tracing::debug!(line = %kind, energy = %self.energy.current, "Villager generated");
                Ok(kind)
            }
            Err(reason) => {
                tracing::debug!(%target, %reason, "Villager generation refused");
                self.events.push(SimEvent::VillagerGenerationFailed { reason });
                Err(reason)
            }
        }
    }

    fn try_generate(&mut self, target: LineId) -> std::result::Result<SystemKind, GenerationError> {
        if let Some(refusal) = self.energy.refusal() {
            return Err(refusal.into());
        }
        let kind = SystemKind::from_id(target).ok_or(GenerationError::InvalidTarget(target))?;
        if !self.lines[kind.index()].can_accept_villager() {
            return Err(GenerationError::LineFull(kind));
        }

        let transition = self.energy.try_consume()?;
        self.lines[kind.index()].try_add_villager();

        self.events.push(SimEvent::VillagerGenerated { line: kind });
        if let Some(EnergyTransition::Overheated) = transition {
            tracing::debug!("Energy overheated");
            self.events.push(SimEvent::EnergyOverheated);
        }
        Ok(kind)
    }

    /// Generate a villager onto the selected line.
    ///
    /// # Errors
    ///
    /// See [`request_generation`](Self::request_generation).
    pub fn generate_villager(&mut self) -> std::result::Result<SystemKind, GenerationError> {
        self.request_generation(self.selected_line)
    }

    /// Choose the line that receives the next generated villager.
    pub fn select_line(&mut self, kind: SystemKind) {
        self.selected_line = kind.id();
    }

    /// Bank the configured tap value on a line.
    pub fn tap(&mut self, kind: SystemKind) {
        self.register_tap(kind, self.config.tap_value);
    }

    /// Bank an explicit tap value on a line. Negative values count as zero.
    pub fn register_tap(&mut self, kind: SystemKind, value: Fixed) {
        self.lines[kind.index()].register_tap(value);
    }

    /// Raise a line one tier, paying its configured upgrade cost.
    ///
    /// # Errors
    ///
    /// Returns an error at max tier or if the ledger cannot cover the cost.
    /// Nothing is spent on failure.
    pub fn upgrade_line(&mut self, kind: SystemKind) -> std::result::Result<u32, UpgradeError> {
        let index = kind.index();
        let line_config = &self.line_configs[index];
        let line = &mut self.lines[index];

        if line.tier >= line_config.upgrade.max_tier {
            return Err(UpgradeError::MaxTier {
                line: kind,
                max_tier: line_config.upgrade.max_tier,
            });
        }
        if !self.ledger.try_debit_all(&line_config.upgrade_cost) {
            return Err(UpgradeError::InsufficientResources(kind));
        }
        let tier = line.upgrade(&line_config.upgrade)?;

        announce_costs(&self.ledger, &mut self.events, &line_config.upgrade_cost);
        self.events.push(SimEvent::LineUpgraded { line: kind, tier });
        tracing::info!(line = %kind, tier, "Line upgraded");
        Ok(tier)
    }

    /// Check whether an automation role could be unlocked right now.
    ///
    /// # Errors
    ///
    /// Returns the first unmet condition.
    pub fn can_unlock_automation(
        &self,
        def: &AutomationDef,
    ) -> std::result::Result<(), AutomationError> {
        check_unlock(
            def,
            &self.lines[def.target.index()],
            &self.ledger,
            &self.unlocked_automations,
        )
    }

    /// Unlock an automation role, paying its costs and marking its line.
    ///
    /// # Errors
    ///
    /// Returns the first unmet condition. Nothing is spent on failure.
    pub fn unlock_automation(&mut self, def: &AutomationDef) -> std::result::Result<(), AutomationError> {
        self.can_unlock_automation(def)?;
        if !self.ledger.try_debit_all(&def.unlock_costs) {
            return Err(AutomationError::InsufficientResources(def.role_id.clone()));
        }

        self.unlocked_automations.insert(def.role_id.clone());
        self.lines[def.target.index()].is_automated = true;

        announce_costs(&self.ledger, &mut self.events, &def.unlock_costs);
        self.events.push(SimEvent::AutomationUnlocked {
            role_id: def.role_id.clone(),
            line: def.target,
        });
        tracing::info!(role = %def.role_id, line = %def.target, "Automation unlocked");
        Ok(())
    }

    /// Raise a city building one tier. Returns the new tier, or `None` at
    /// the configured maximum.
    pub fn upgrade_building(&mut self, building_id: &str) -> Option<u32> {
        let tier = self
            .city
            .try_upgrade_building(building_id, self.config.city.max_building_tier)?;
        self.events.push(SimEvent::BuildingUpgraded {
            building_id: building_id.to_string(),
            tier,
        });
        Some(tier)
    }

    /// Unlock a building slot. Returns false if it was already unlocked.
    pub fn unlock_slot(&mut self, slot_id: &str) -> bool {
        self.city.try_unlock_slot(slot_id)
    }

    /// Move the city to the next era.
    pub fn advance_era(&mut self) -> Option<Era> {
        let era = self.city.try_advance_era()?;
        self.events.push(SimEvent::EraAdvanced { era });
        tracing::info!(%era, "Era advanced");
        Some(era)
    }

    /// Record that the session was saved at `now` (unix seconds).
    pub fn mark_saved(&mut self, now: i64) {
        self.last_save_timestamp = now;
    }

    /// Seconds between the last save and `now`, zero if never saved or if
    /// the clock went backwards.
    #[must_use]
    pub fn offline_elapsed_since(&self, now: i64) -> Fixed {
        if self.last_save_timestamp <= 0 {
            return Fixed::ZERO;
        }
        let elapsed = now.saturating_sub(self.last_save_timestamp).max(0);
        Fixed::saturating_from_num(elapsed)
    }

    /// Take every pending event, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    /// Deliver every pending event to an observer.
    pub fn dispatch_events<O: SimObserver + ?Sized>(&mut self, observer: &mut O) -> usize {
        self.events.dispatch(observer)
    }

    /// Pending events.
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Calculate a hash of the persisted state.
    ///
    /// Two clocks with identical state produce identical hashes. Pending
    /// events are not included.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        // Hash energy
        let energy = &self.energy;
        energy.current.to_bits().hash(&mut hasher);
        energy.max.to_bits().hash(&mut hasher);
        energy.regen_rate.to_bits().hash(&mut hasher);
        energy.cost_per_action.to_bits().hash(&mut hasher);
        energy.is_overheated.hash(&mut hasher);
        energy.cooldown_remaining.to_bits().hash(&mut hasher);
        energy.cooldown_duration.to_bits().hash(&mut hasher);

        // Hash lines in index order
        for line in &self.lines {
            line.kind.hash(&mut hasher);
            line.villager_count.hash(&mut hasher);
            line.max_villagers.hash(&mut hasher);
            line.output_per_villager.to_bits().hash(&mut hasher);
            line.cycle_duration.to_bits().hash(&mut hasher);
            line.tier.hash(&mut hasher);
            line.is_automated.hash(&mut hasher);
            line.progress.to_bits().hash(&mut hasher);
            line.tap_bonus.to_bits().hash(&mut hasher);
        }

        // Hash ledger
        for (kind, amount) in self.ledger.iter() {
            kind.hash(&mut hasher);
            amount.to_bits().hash(&mut hasher);
        }

        self.selected_line.hash(&mut hasher);
        self.last_save_timestamp.hash(&mut hasher);
        self.total_play_time.to_bits().hash(&mut hasher);
        self.unlocked_automations.hash(&mut hasher);
        self.city.era.hash(&mut hasher);
        self.city.building_tiers.hash(&mut hasher);
        self.city.unlocked_slots.hash(&mut hasher);

        hasher.finish()
    }

    /// The configuration this session runs on.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The energy pool.
    #[must_use]
    pub fn energy(&self) -> &EnergyPool {
        &self.energy
    }

    /// One production line.
    #[must_use]
    pub fn line(&self, kind: SystemKind) -> &ProductionLine {
        &self.lines[kind.index()]
    }

    /// Every production line, in index order.
    #[must_use]
    pub fn lines(&self) -> &[ProductionLine] {
        &self.lines
    }

    /// The resource a line credits.
    #[must_use]
    pub fn output_of(&self, kind: SystemKind) -> ResourceKind {
        self.line_configs[kind.index()].output_resource()
    }

    /// The resource ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Stored amount of one resource.
    #[must_use]
    pub fn resource(&self, kind: ResourceKind) -> Fixed {
        self.ledger.get(kind)
    }

    /// Raw id of the selected line.
    #[must_use]
    pub const fn selected_line(&self) -> LineId {
        self.selected_line
    }

    /// Seconds of live play.
    #[must_use]
    pub const fn total_play_time(&self) -> Fixed {
        self.total_play_time
    }

    /// Unix time of the last save, zero if never saved.
    #[must_use]
    pub const fn last_save_timestamp(&self) -> i64 {
        self.last_save_timestamp
    }

    /// Check if an automation role is unlocked.
    #[must_use]
    pub fn is_automation_unlocked(&self, role_id: &str) -> bool {
        self.unlocked_automations.contains(role_id)
    }

    /// Every unlocked automation role id.
    #[must_use]
    pub fn unlocked_automations(&self) -> &BTreeSet<String> {
        &self.unlocked_automations
    }

    /// The city layout.
    #[must_use]
    pub fn city(&self) -> &CityProgression {
        &self.city
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

/// Queue one `ResourceChanged` per distinct resource in a cost list.
fn announce_costs(ledger: &Ledger, events: &mut EventQueue, costs: &[ResourceCost]) {
    let mut seen = [false; ResourceKind::COUNT];
    for cost in costs {
        let slot = &mut seen[cost.resource.index()];
        if *slot {
            continue;
        }
        *slot = true;
        events.push(SimEvent::ResourceChanged {
            kind: cost.resource,
            amount: ledger.get(cost.resource),
        });
    }
}
