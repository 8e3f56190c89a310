//! # Foundry Core
//!
//! Deterministic simulation core for Asgard Foundry, an idle production game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No wall-clock reads
//! - No floating-point math (uses fixed-point)
//!
//! The host feeds in frame deltas and save timestamps, drains notifications
//! once per frame and owns encoding of [`snapshot::GameSnapshot`].
//!
//! ## Crate Structure
//!
//! - [`energy`] - EITR pool and its overheat state machine
//! - [`production`] - Production lines and the cycle accumulator
//! - [`ledger`] - Resource stockpile
//! - [`simulation`] - The clock that ties them together, plus offline catch-up
//! - [`automation`], [`city`] - Unlockable progression
//! - [`config`] - RON balance configuration
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod automation;
pub mod city;
pub mod config;
pub mod energy;
pub mod error;
pub mod events;
pub mod kinds;
pub mod ledger;
pub mod math;
pub mod production;
pub mod simulation;
pub mod snapshot;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::automation::{AutomationDef, AutomationError, AutomationRegistry};
    pub use crate::city::{CityProgression, Era};
    pub use crate::config::GameConfig;
    pub use crate::energy::{EnergyPool, EnergyState};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventQueue, SimEvent, SimObserver};
    pub use crate::kinds::{LineId, ResourceKind, SystemKind};
    pub use crate::ledger::{Ledger, ResourceCost};
    pub use crate::math::Fixed;
    pub use crate::production::{ProductionLine, UpgradeError};
    pub use crate::simulation::{GenerationError, OfflineReport, SimulationClock};
    pub use crate::snapshot::GameSnapshot;
}
