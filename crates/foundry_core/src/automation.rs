//! Automation roles: managers the player unlocks for a production line.
//!
//! Definitions are data, loaded from RON into an [`AutomationRegistry`].
//! Unlocking is performed by the clock, which owns the ledger and lines;
//! this module holds the definitions and the pure eligibility check.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{GameError, Result};
use crate::kinds::SystemKind;
use crate::ledger::{Ledger, ResourceCost};
use crate::production::ProductionLine;

/// One automation role and what it takes to unlock it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationDef {
    /// Unique identifier.
    pub role_id: String,
    /// Name shown in the UI.
    #[serde(default)]
    pub display_name: String,
    /// What the role does.
    #[serde(default)]
    pub description: String,
    /// Line the role automates.
    pub target: SystemKind,
    /// Resources spent on unlock.
    #[serde(default)]
    pub unlock_costs: Vec<ResourceCost>,
    /// Minimum tier of the target line.
    #[serde(default = "default_required_tier")]
    pub required_tier: u32,
    /// Minimum villagers on the target line.
    #[serde(default)]
    pub required_villagers: u32,
    /// Roles that must be unlocked first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

const fn default_required_tier() -> u32 {
    1
}

impl AutomationDef {
    /// Check if this role depends on another.
    #[must_use]
    pub fn requires(&self, role_id: &str) -> bool {
        self.prerequisites.iter().any(|p| p == role_id)
    }
}

/// Why an automation could not be unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    /// The role is already unlocked.
    #[error("automation '{0}' is already unlocked")]
    AlreadyUnlocked(String),
    /// The target line has not reached the required tier.
    #[error("{line} must reach tier {required} (currently {current})")]
    TierTooLow {
        /// Target line.
        line: SystemKind,
        /// Required tier.
        required: u32,
        /// Current tier.
        current: u32,
    },
    /// The target line has too few villagers.
    #[error("{line} needs {required} villagers (currently {current})")]
    NotEnoughVillagers {
        /// Target line.
        line: SystemKind,
        /// Required villagers.
        required: u32,
        /// Current villagers.
        current: u32,
    },
    /// The ledger cannot cover the unlock costs.
    #[error("not enough resources to unlock '{0}'")]
    InsufficientResources(String),
    /// A prerequisite role is still locked.
    #[error("automation '{role_id}' requires '{missing}' first")]
    MissingPrerequisite {
        /// The role being unlocked.
        role_id: String,
        /// The locked prerequisite.
        missing: String,
    },
}

/// Check every unlock condition without changing anything.
///
/// Conditions are checked in a fixed order: already unlocked, tier,
/// villagers, costs, prerequisites. The first failure is reported.
pub fn check_unlock(
    def: &AutomationDef,
    line: &ProductionLine,
    ledger: &Ledger,
    unlocked: &BTreeSet<String>,
) -> std::result::Result<(), AutomationError> {
    if unlocked.contains(&def.role_id) {
        return Err(AutomationError::AlreadyUnlocked(def.role_id.clone()));
    }
    if line.tier < def.required_tier {
        return Err(AutomationError::TierTooLow {
            line: def.target,
            required: def.required_tier,
            current: line.tier,
        });
    }
    if line.villager_count < def.required_villagers {
        return Err(AutomationError::NotEnoughVillagers {
            line: def.target,
            required: def.required_villagers,
            current: line.villager_count,
        });
    }
    if !ledger.can_afford(&def.unlock_costs) {
        return Err(AutomationError::InsufficientResources(def.role_id.clone()));
    }
    if let Some(missing) = def.prerequisites.iter().find(|p| !unlocked.contains(*p)) {
        return Err(AutomationError::MissingPrerequisite {
            role_id: def.role_id.clone(),
            missing: missing.clone(),
        });
    }
    Ok(())
}

/// Every automation role available in a game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutomationRegistry {
    roles: Vec<AutomationDef>,
}

impl AutomationRegistry {
    /// Build a registry from a list of definitions.
    #[must_use]
    pub fn new(roles: Vec<AutomationDef>) -> Self {
        Self { roles }
    }

    /// Parse a RON list of definitions and validate it.
    pub fn from_ron(text: &str) -> Result<Self> {
        let registry: Self =
            ron::from_str(text).map_err(|e| GameError::ConfigParse(e.to_string()))?;
        let errors = registry.validate();
        if !errors.is_empty() {
            return Err(GameError::InvalidConfig(errors));
        }
        Ok(registry)
    }

    /// Look up a role by id.
    #[must_use]
    pub fn get(&self, role_id: &str) -> Option<&AutomationDef> {
        self.roles.iter().find(|def| def.role_id == role_id)
    }

    /// Roles targeting one line.
    pub fn for_line(&self, line: SystemKind) -> impl Iterator<Item = &AutomationDef> {
        self.roles.iter().filter(move |def| def.target == line)
    }

    /// Every role, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &AutomationDef> {
        self.roles.iter()
    }

    /// Number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if no roles are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Validate references between definitions.
    ///
    /// Checks that:
    /// - Role ids are unique and non-empty
    /// - Prerequisites name defined roles other than the role itself
    /// - Costs are not negative
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();

        for def in &self.roles {
            if def.role_id.is_empty() {
                errors.push("Automation with empty role_id".to_string());
            } else if !seen.insert(def.role_id.as_str()) {
                errors.push(format!("Automation '{}' defined more than once", def.role_id));
            }

            for prereq in &def.prerequisites {
                if *prereq == def.role_id {
                    errors.push(format!("Automation '{}' requires itself", def.role_id));
                } else if self.get(prereq).is_none() {
                    errors.push(format!(
                        "Automation '{}' has unknown prerequisite '{}'",
                        def.role_id, prereq
                    ));
                }
            }

            for cost in &def.unlock_costs {
                if cost.amount.is_negative() {
                    errors.push(format!(
                        "Automation '{}' has negative {} cost",
                        def.role_id, cost.resource
                    ));
                }
            }
        }

        errors
    }
}
