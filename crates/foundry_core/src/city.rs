//! City progression: era, building tiers and unlocked building slots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CityConfig;

/// Historical era of the city. Advances one step at a time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Era {
    /// Starting era.
    #[default]
    StoneAge,
    /// Second era.
    BronzeAge,
    /// Third era.
    IronAge,
    /// Final era.
    Medieval,
}

impl Era {
    /// The era after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::StoneAge => Some(Self::BronzeAge),
            Self::BronzeAge => Some(Self::IronAge),
            Self::IronAge => Some(Self::Medieval),
            Self::Medieval => None,
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StoneAge => "Stone Age",
            Self::BronzeAge => "Bronze Age",
            Self::IronAge => "Iron Age",
            Self::Medieval => "Medieval",
        };
        f.write_str(name)
    }
}

/// Persistent city layout.
///
/// Sorted collections keep iteration, hashing and encoding stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CityProgression {
    /// Current era.
    pub era: Era,
    /// Tier of every standing building, keyed by building id.
    pub building_tiers: BTreeMap<String, u32>,
    /// Unlocked building slot ids.
    pub unlocked_slots: BTreeSet<String>,
}

impl CityProgression {
    /// Lay out a new city.
    #[must_use]
    pub fn from_config(config: &CityConfig) -> Self {
        Self {
            era: Era::default(),
            building_tiers: config.starting_buildings.clone(),
            unlocked_slots: config.starting_slots.iter().cloned().collect(),
        }
    }

    /// Tier of a building, or 0 if it has not been built.
    #[must_use]
    pub fn building_tier(&self, building_id: &str) -> u32 {
        self.building_tiers.get(building_id).copied().unwrap_or(0)
    }

    /// Raise a building one tier, building it at tier 1 if absent.
    ///
    /// Returns the new tier, or `None` at `max_tier`.
    pub fn try_upgrade_building(&mut self, building_id: &str, max_tier: u32) -> Option<u32> {
        let tier = self.building_tier(building_id);
        if tier >= max_tier {
            return None;
        }
        self.building_tiers.insert(building_id.to_string(), tier + 1);
        Some(tier + 1)
    }

    /// Check if a slot is unlocked.
    #[must_use]
    pub fn is_slot_unlocked(&self, slot_id: &str) -> bool {
        self.unlocked_slots.contains(slot_id)
    }

    /// Unlock a slot. Returns false if it was already unlocked.
    pub fn try_unlock_slot(&mut self, slot_id: &str) -> bool {
        self.unlocked_slots.insert(slot_id.to_string())
    }

    /// Move to the next era. Returns the new era, or `None` in the last one.
    pub fn try_advance_era(&mut self) -> Option<Era> {
        let next = self.era.next()?;
        self.era = next;
        Some(next)
    }

    /// Drop tiers a save could not have produced.
    ///
    /// Returns the ids of the buildings that had to change.
    pub fn repair(&mut self, max_tier: u32) -> Vec<String> {
        let mut repaired = Vec::new();
        self.building_tiers.retain(|id, tier| {
            if *tier == 0 {
                repaired.push(id.clone());
                return false;
            }
            if *tier > max_tier {
                *tier = max_tier;
                repaired.push(id.clone());
            }
            true
        });
        repaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_city_uses_starting_layout() {
        let city = CityProgression::from_config(&CityConfig::default());

        assert_eq!(city.era, Era::StoneAge);
        assert_eq!(city.building_tier("mine"), 1);
        assert_eq!(city.building_tier("lumber"), 1);
        assert_eq!(city.building_tier("forge"), 0);
        assert!(city.is_slot_unlocked("mine_slot"));
        assert!(!city.is_slot_unlocked("farm_slot"));
    }

    #[test]
    fn test_building_upgrades_stop_at_max() {
        let mut city = CityProgression::default();

        assert_eq!(city.try_upgrade_building("forge", 3), Some(1));
        assert_eq!(city.try_upgrade_building("forge", 3), Some(2));
        assert_eq!(city.try_upgrade_building("forge", 3), Some(3));
        assert_eq!(city.try_upgrade_building("forge", 3), None);
        assert_eq!(city.building_tier("forge"), 3);
    }

    #[test]
    fn test_slot_unlocks_once() {
        let mut city = CityProgression::default();
        assert!(city.try_unlock_slot("farm_slot"));
        assert!(!city.try_unlock_slot("farm_slot"));
        assert!(city.is_slot_unlocked("farm_slot"));
    }

    #[test]
    fn test_era_sequence_ends_at_medieval() {
        let mut city = CityProgression::default();

        assert_eq!(city.try_advance_era(), Some(Era::BronzeAge));
        assert_eq!(city.try_advance_era(), Some(Era::IronAge));
        assert_eq!(city.try_advance_era(), Some(Era::Medieval));
        assert_eq!(city.try_advance_era(), None);
        assert_eq!(city.era, Era::Medieval);
    }

    #[test]
    fn test_repair_clamps_tiers() {
        let mut city = CityProgression::default();
        city.building_tiers.insert("mine".to_string(), 9);
        city.building_tiers.insert("ruin".to_string(), 0);
        city.building_tiers.insert("lumber".to_string(), 2);

        let repaired = city.repair(3);

        assert_eq!(repaired, vec!["mine".to_string(), "ruin".to_string()]);
        assert_eq!(city.building_tier("mine"), 3);
        assert_eq!(city.building_tier("lumber"), 2);
        assert!(!city.building_tiers.contains_key("ruin"));
    }
}
