//! EITR, the energy pool that gates villager generation.
//!
//! The pool regenerates while [`EnergyState::Ready`]. Spending the last of
//! it trips an overheat: the pool sits at zero for a fixed cooldown with
//! regeneration suspended, then returns to `Ready` and starts refilling.
//!
//! ```text
//!          consume drains to 0
//!   Ready ─────────────────────▶ Overheated
//!     ▲                              │
//!     └──────── cooldown elapses ────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::config::EnergyConfig;
use crate::math::{fixed_serde, Fixed};

/// The two states of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyState {
    /// Regenerating and available for spending.
    Ready,
    /// Drained; waiting out the cooldown.
    Overheated,
}

/// A state change the owner must report to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTransition {
    /// A consume drained the pool.
    Overheated,
    /// The cooldown finished.
    Recovered,
}

/// Why the pool refused to pay for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyRefusal {
    /// The pool is cooling down.
    Overheated,
    /// Less than one action's worth of energy is stored.
    Insufficient,
}

/// The regenerating, overheating energy pool.
///
/// Invariants: `0 <= current <= max`, and `is_overheated` implies
/// `current == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyPool {
    /// Stored energy.
    #[serde(with = "fixed_serde")]
    pub current: Fixed,
    /// Capacity.
    #[serde(with = "fixed_serde")]
    pub max: Fixed,
    /// Units regenerated per second while ready.
    #[serde(with = "fixed_serde")]
    pub regen_rate: Fixed,
    /// Energy spent per generation action.
    #[serde(with = "fixed_serde")]
    pub cost_per_action: Fixed,
    /// Whether the pool is cooling down.
    pub is_overheated: bool,
    /// Seconds of cooldown left.
    #[serde(with = "fixed_serde")]
    pub cooldown_remaining: Fixed,
    /// Length of a full cooldown in seconds.
    #[serde(with = "fixed_serde")]
    pub cooldown_duration: Fixed,
}

impl EnergyPool {
    /// Create a full pool from configuration.
    #[must_use]
    pub fn from_config(config: &EnergyConfig) -> Self {
        Self {
            current: config.max,
            max: config.max,
            regen_rate: config.regen_rate,
            cost_per_action: config.cost_per_action,
            is_overheated: false,
            cooldown_remaining: Fixed::ZERO,
            cooldown_duration: config.cooldown_duration,
        }
    }

    /// Current state of the overheat machine.
    #[must_use]
    pub const fn state(&self) -> EnergyState {
        if self.is_overheated {
            EnergyState::Overheated
        } else {
            EnergyState::Ready
        }
    }

    /// Check if an action can be paid for right now.
    #[must_use]
    pub fn can_generate(&self) -> bool {
        self.refusal().is_none()
    }

    /// The reason an action would be refused, if any.
    ///
    /// Overheat takes precedence: an overheated pool is always empty.
    #[must_use]
    pub fn refusal(&self) -> Option<EnergyRefusal> {
        if self.is_overheated {
            Some(EnergyRefusal::Overheated)
        } else if self.current < self.cost_per_action {
            Some(EnergyRefusal::Insufficient)
        } else {
            None
        }
    }

    /// Pay for one action.
    ///
    /// On refusal nothing changes. On success, returns
    /// `Some(EnergyTransition::Overheated)` if this payment drained the pool.
    pub fn try_consume(&mut self) -> Result<Option<EnergyTransition>, EnergyRefusal> {
        if let Some(refusal) = self.refusal() {
            return Err(refusal);
        }

        self.current -= self.cost_per_action;

        if self.current <= Fixed::ZERO {
            self.current = Fixed::ZERO;
            self.is_overheated = true;
            self.cooldown_remaining = self.cooldown_duration;
            return Ok(Some(EnergyTransition::Overheated));
        }

        Ok(None)
    }

    /// Advance the pool by `dt` seconds.
    ///
    /// While overheated only the cooldown advances; time left over after
    /// the cooldown ends does not regenerate anything this call.
    pub fn update(&mut self, dt: Fixed) -> Option<EnergyTransition> {
        if dt <= Fixed::ZERO {
            return None;
        }

        if self.is_overheated {
            self.cooldown_remaining -= dt;
            if self.cooldown_remaining <= Fixed::ZERO {
                self.is_overheated = false;
                self.cooldown_remaining = Fixed::ZERO;
                return Some(EnergyTransition::Recovered);
            }
        } else if self.current < self.max {
            let regen = self.regen_rate.saturating_mul(dt);
            self.current = self.current.saturating_add(regen).min(self.max);
        }

        None
    }

    /// Regenerate for a span the session was closed.
    ///
    /// Unlike [`update`](Self::update) this never models the cooldown: any
    /// overheat is cleared outright and regeneration covers the whole span.
    pub fn regenerate_offline(&mut self, elapsed: Fixed) {
        let regen = self.regen_rate.saturating_mul(elapsed.max(Fixed::ZERO));
        self.current = self.current.saturating_add(regen).min(self.max);
        self.is_overheated = false;
        self.cooldown_remaining = Fixed::ZERO;
    }

    /// Fraction of capacity currently stored, in `[0, 1]`.
    #[must_use]
    pub fn fill_ratio(&self) -> Fixed {
        if self.max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        (self.current / self.max).clamp(Fixed::ZERO, Fixed::ONE)
    }

    /// Bring restored fields back inside the pool's invariants.
    ///
    /// Returns the names of the fields that had to change.
    pub fn repair(&mut self, defaults: &EnergyConfig) -> Vec<&'static str> {
        let mut repaired = Vec::new();

        if self.max <= Fixed::ZERO {
            self.max = defaults.max;
            repaired.push("max");
        }
        if self.cost_per_action <= Fixed::ZERO {
            self.cost_per_action = defaults.cost_per_action;
            repaired.push("cost_per_action");
        }
        if self.regen_rate < Fixed::ZERO {
            self.regen_rate = Fixed::ZERO;
            repaired.push("regen_rate");
        }
        if self.cooldown_duration < Fixed::ZERO {
            self.cooldown_duration = defaults.cooldown_duration;
            repaired.push("cooldown_duration");
        }
        if self.cooldown_remaining < Fixed::ZERO {
            self.cooldown_remaining = Fixed::ZERO;
            repaired.push("cooldown_remaining");
        }
        let clamped = self.current.clamp(Fixed::ZERO, self.max);
        if clamped != self.current {
            self.current = clamped;
            repaired.push("current");
        }
        if self.is_overheated && self.current != Fixed::ZERO {
            self.current = Fixed::ZERO;
            repaired.push("current");
        }
        if !self.is_overheated && self.cooldown_remaining != Fixed::ZERO {
            self.cooldown_remaining = Fixed::ZERO;
            repaired.push("cooldown_remaining");
        }

        repaired
    }
}

impl Default for EnergyPool {
    fn default() -> Self {
        Self::from_config(&EnergyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: f64) -> Fixed {
        Fixed::from_num(n)
    }

    fn pool() -> EnergyPool {
        EnergyPool::from_config(&EnergyConfig {
            max: fixed(100.0),
            regen_rate: fixed(5.0),
            cost_per_action: fixed(10.0),
            cooldown_duration: fixed(3.0),
        })
    }

    #[test]
    fn test_ten_consumes_overheat_the_pool() {
        let mut pool = pool();

        for _ in 0..9 {
            assert_eq!(pool.try_consume(), Ok(None));
        }
        assert_eq!(
            pool.try_consume(),
            Ok(Some(EnergyTransition::Overheated))
        );
        assert_eq!(pool.current, Fixed::ZERO);
        assert!(pool.is_overheated);
        assert_eq!(pool.cooldown_remaining, fixed(3.0));

        // Eleventh attempt is refused and changes nothing
        let before = pool.clone();
        assert_eq!(pool.try_consume(), Err(EnergyRefusal::Overheated));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_cooldown_suspends_regeneration() {
        let mut pool = pool();
        for _ in 0..10 {
            let _ = pool.try_consume();
        }

        assert_eq!(pool.update(fixed(1.0)), None);
        assert_eq!(pool.current, Fixed::ZERO);
        assert_eq!(pool.cooldown_remaining, fixed(2.0));

        assert_eq!(pool.update(fixed(2.0)), Some(EnergyTransition::Recovered));
        assert!(!pool.is_overheated);
        assert_eq!(pool.current, Fixed::ZERO);
        assert_eq!(pool.cooldown_remaining, Fixed::ZERO);

        // Regeneration resumes on the next update
        pool.update(fixed(1.0));
        assert_eq!(pool.current, fixed(5.0));
    }

    #[test]
    fn test_single_long_update_ends_cooldown_without_regen() {
        let mut pool = pool();
        for _ in 0..10 {
            let _ = pool.try_consume();
        }

        assert_eq!(pool.update(fixed(60.0)), Some(EnergyTransition::Recovered));
        assert_eq!(pool.current, Fixed::ZERO);
    }

    #[test]
    fn test_insufficient_without_overheat() {
        let mut pool = pool();
        pool.current = fixed(9.5);

        assert!(!pool.can_generate());
        assert_eq!(pool.try_consume(), Err(EnergyRefusal::Insufficient));
        assert_eq!(pool.current, fixed(9.5));
        assert_eq!(pool.state(), EnergyState::Ready);
    }

    #[test]
    fn test_partial_drain_that_lands_below_zero_clamps() {
        let mut pool = pool();
        pool.cost_per_action = fixed(30.0);
        pool.current = fixed(30.0);

        assert_eq!(
            pool.try_consume(),
            Ok(Some(EnergyTransition::Overheated))
        );
        assert_eq!(pool.current, Fixed::ZERO);
    }

    #[test]
    fn test_regen_clamps_to_max() {
        let mut pool = pool();
        pool.current = fixed(98.0);
        pool.update(fixed(10.0));
        assert_eq!(pool.current, fixed(100.0));
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut pool = pool();
        pool.current = fixed(40.0);
        let before = pool.clone();
        assert_eq!(pool.update(Fixed::ZERO), None);
        assert_eq!(pool, before);
    }

    #[test]
    fn test_offline_regeneration_clears_overheat() {
        let mut pool = pool();
        for _ in 0..10 {
            let _ = pool.try_consume();
        }

        pool.regenerate_offline(fixed(1.0));
        assert!(!pool.is_overheated);
        assert_eq!(pool.cooldown_remaining, Fixed::ZERO);
        assert_eq!(pool.current, fixed(5.0));

        pool.regenerate_offline(fixed(3600.0));
        assert_eq!(pool.current, fixed(100.0));
    }

    #[test]
    fn test_fill_ratio() {
        let mut pool = pool();
        pool.current = fixed(25.0);
        assert_eq!(pool.fill_ratio(), fixed(0.25));
    }

    #[test]
    fn test_repair_restores_invariants() {
        let mut pool = pool();
        pool.max = fixed(-1.0);
        pool.current = fixed(500.0);
        pool.cost_per_action = Fixed::ZERO;
        pool.is_overheated = true;

        let repaired = pool.repair(&EnergyConfig::default());

        assert!(repaired.contains(&"max"));
        assert!(repaired.contains(&"cost_per_action"));
        assert_eq!(pool.max, EnergyConfig::default().max);
        assert_eq!(pool.current, Fixed::ZERO);
        assert!(pool.cost_per_action > Fixed::ZERO);
    }

    #[test]
    fn test_repair_leaves_valid_pool_alone() {
        let mut pool = pool();
        pool.current = fixed(42.0);
        assert!(pool.repair(&EnergyConfig::default()).is_empty());
        assert_eq!(pool.current, fixed(42.0));
    }
}
