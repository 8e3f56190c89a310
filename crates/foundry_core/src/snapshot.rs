//! Logical shape of a saved game.
//!
//! The core produces and consumes [`GameSnapshot`]; encoding it is the
//! host's job. Lines and resources are stored as keyed lists rather than
//! dense arrays so that a save written before a kind existed still loads,
//! with the missing entries default-filled on restore.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::city::CityProgression;
use crate::energy::EnergyPool;
use crate::kinds::{LineId, ResourceKind};
use crate::math::{fixed_serde, Fixed};
use crate::production::ProductionLine;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One ledger slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// The resource.
    pub kind: ResourceKind,
    /// Stored amount.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
}

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Layout version, [`SNAPSHOT_VERSION`] when written by this build.
    pub version: u32,
    /// Energy pool.
    pub energy: EnergyPool,
    /// Production lines, at most one per kind.
    pub lines: Vec<ProductionLine>,
    /// Ledger contents.
    pub resources: Vec<ResourceEntry>,
    /// Line receiving the next generated villager.
    pub selected_line: LineId,
    /// Unix time of the last save, in seconds. Zero if never saved.
    pub last_save_timestamp: i64,
    /// Seconds of live play.
    #[serde(with = "fixed_serde")]
    pub total_play_time: Fixed,
    /// Unlocked automation role ids.
    #[serde(default)]
    pub unlocked_automations: BTreeSet<String>,
    /// City layout.
    #[serde(default)]
    pub city: CityProgression,
}

impl GameSnapshot {
    /// Stored amount of a resource, zero if the save has no entry for it.
    #[must_use]
    pub fn resource(&self, kind: ResourceKind) -> Fixed {
        self.resources
            .iter()
            .find(|entry| entry.kind == kind)
            .map_or(Fixed::ZERO, |entry| entry.amount)
    }

    /// Total villagers across every line.
    #[must_use]
    pub fn total_villagers(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.villager_count))
            .sum()
    }
}
