//! Production lines.
//!
//! A line turns elapsed time into output. Time accumulates in `progress`;
//! every full `cycle_duration` pays out `villagers * output_per_villager`
//! plus whatever tap bonus was banked since the last payout. The same
//! accumulator serves live ticks and offline catch-up, so the phase of a
//! line is continuous across an app restart.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{LineConfig, TierUpgrade};
use crate::kinds::SystemKind;
use crate::math::{fixed_serde, from_count, Fixed};

/// Shortest allowed production cycle, in seconds.
///
/// Keeps the payout loop bounded for any span the clock accepts.
pub const MIN_CYCLE_DURATION: Fixed = Fixed::from_bits(42_949_673);

/// Why a tier upgrade was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpgradeError {
    /// The line is already at its highest tier.
    #[error("{line} is already at max tier {max_tier}")]
    MaxTier {
        /// The line.
        line: SystemKind,
        /// Its tier cap.
        max_tier: u32,
    },
    /// The ledger cannot cover the upgrade cost.
    #[error("not enough resources to upgrade {0}")]
    InsufficientResources(SystemKind),
}

/// State of one production system.
///
/// Invariant: `villager_count <= max_villagers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionLine {
    /// Which system this is.
    pub kind: SystemKind,
    /// Villagers working the line.
    pub villager_count: u32,
    /// Villager capacity.
    pub max_villagers: u32,
    /// Units per villager per cycle.
    #[serde(with = "fixed_serde")]
    pub output_per_villager: Fixed,
    /// Seconds per cycle.
    #[serde(with = "fixed_serde")]
    pub cycle_duration: Fixed,
    /// Upgrade tier, starting at 1.
    pub tier: u32,
    /// Whether a manager has been unlocked for this line. Cosmetic.
    pub is_automated: bool,
    /// Seconds accumulated toward the next payout.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Tap bonus banked for the next payout.
    #[serde(default, with = "fixed_serde")]
    pub tap_bonus: Fixed,
}

impl ProductionLine {
    /// Create an empty tier-1 line from configuration.
    #[must_use]
    pub fn from_config(config: &LineConfig) -> Self {
        Self {
            kind: config.kind,
            villager_count: 0,
            max_villagers: config.max_villagers.max(1),
            output_per_villager: config.output_per_villager,
            cycle_duration: config.cycle_duration.max(MIN_CYCLE_DURATION),
            tier: 1,
            is_automated: false,
            progress: Fixed::ZERO,
            tap_bonus: Fixed::ZERO,
        }
    }

    /// Check if there is room for another villager.
    #[must_use]
    pub const fn can_accept_villager(&self) -> bool {
        self.villager_count < self.max_villagers
    }

    /// Add a villager if there is room.
    ///
    /// Returns true if the villager was added.
    pub fn try_add_villager(&mut self) -> bool {
        if !self.can_accept_villager() {
            return false;
        }
        self.villager_count += 1;
        true
    }

    /// Bank a tap bonus for the next payout. Negative values count as zero.
    pub fn register_tap(&mut self, value: Fixed) {
        if value > Fixed::ZERO {
            self.tap_bonus = self.tap_bonus.saturating_add(value);
        }
    }

    /// Output of one full cycle, excluding tap bonus.
    #[must_use]
    pub fn output_per_cycle(&self) -> Fixed {
        from_count(self.villager_count).saturating_mul(self.output_per_villager)
    }

    /// Advance the line by `dt` seconds and return what it produced.
    ///
    /// A `dt` spanning several cycles pays out once per cycle; the banked
    /// tap bonus goes to the first of them.
    pub fn update(&mut self, dt: Fixed) -> Fixed {
        if self.villager_count == 0 || dt <= Fixed::ZERO {
            return Fixed::ZERO;
        }

        self.progress = self.progress.saturating_add(dt);
        let completed = self.take_completed_cycles();
        if completed == 0 {
            return Fixed::ZERO;
        }

        let produced = pay_cycles(completed, self.output_per_cycle()).saturating_add(self.tap_bonus);
        self.tap_bonus = Fixed::ZERO;
        produced
    }

    /// Remove every whole cycle from `progress` and return how many there
    /// were. Works on raw bits so the count cannot overflow.
    fn take_completed_cycles(&mut self) -> u64 {
        let (completed, remainder) = split_cycles(self.progress, self.cycle_duration);
        self.progress = remainder;
        completed
    }

    /// Produce for a span the session was closed.
    ///
    /// Whole cycles pay out without tap bonus. The leftover fraction of a
    /// cycle joins `progress`, so a following [`update`](Self::update)
    /// continues exactly where a single long update would have been.
    pub fn calculate_offline_production(&mut self, elapsed: Fixed) -> Fixed {
        if self.villager_count == 0 || elapsed <= Fixed::ZERO {
            return Fixed::ZERO;
        }

        let (completed, remainder) = split_cycles(elapsed, self.cycle_duration);
        self.progress = self.progress.saturating_add(remainder);

        // The carried phase plus the remainder can close one more cycle
        let carried = self.take_completed_cycles();

        pay_cycles(completed.saturating_add(carried), self.output_per_cycle())
    }

    /// Steady-state output per second, excluding taps.
    #[must_use]
    pub fn production_per_second(&self) -> Fixed {
        self.output_per_cycle().saturating_div(self.cycle_duration)
    }

    /// Progress toward the next payout, in `[0, 1]`.
    #[must_use]
    pub fn cycle_fraction(&self) -> Fixed {
        self.progress
            .saturating_div(self.cycle_duration)
            .clamp(Fixed::ZERO, Fixed::ONE)
    }

    /// Raise the line one tier.
    ///
    /// Returns the new tier.
    pub fn upgrade(&mut self, upgrade: &TierUpgrade) -> Result<u32, UpgradeError> {
        if self.tier >= upgrade.max_tier {
            return Err(UpgradeError::MaxTier {
                line: self.kind,
                max_tier: upgrade.max_tier,
            });
        }

        self.tier += 1;
        self.max_villagers = self.max_villagers.saturating_add(upgrade.villagers_per_tier);
        self.output_per_villager = self
            .output_per_villager
            .saturating_mul(upgrade.output_multiplier);
        self.cycle_duration = (self.cycle_duration * upgrade.cycle_multiplier).max(MIN_CYCLE_DURATION);
        // Keep the fraction of the cycle already done, strictly inside the
        // shorter cycle
        self.progress = self
            .progress
            .saturating_mul(upgrade.cycle_multiplier)
            .min(self.cycle_duration - Fixed::DELTA)
            .max(Fixed::ZERO);

        Ok(self.tier)
    }

    /// Reset restored fields that would stall or break the line.
    ///
    /// Returns the names of the fields that had to change.
    pub fn repair(&mut self, defaults: &LineConfig) -> Vec<&'static str> {
        let mut repaired = Vec::new();

        if self.max_villagers == 0 {
            self.max_villagers = defaults.max_villagers.max(1);
            repaired.push("max_villagers");
        }
        if self.cycle_duration < MIN_CYCLE_DURATION {
            self.cycle_duration = defaults.cycle_duration.max(MIN_CYCLE_DURATION);
            repaired.push("cycle_duration");
        }
        if self.output_per_villager <= Fixed::ZERO {
            self.output_per_villager = defaults.output_per_villager;
            repaired.push("output_per_villager");
        }
        if self.villager_count > self.max_villagers {
            self.villager_count = self.max_villagers;
            repaired.push("villager_count");
        }
        if self.tier == 0 {
            self.tier = 1;
            repaired.push("tier");
        }
        if self.progress < Fixed::ZERO {
            self.progress = Fixed::ZERO;
            repaired.push("progress");
        } else if self.progress >= self.cycle_duration {
            // Keep the phase, drop the unpaid cycles
            self.progress = split_cycles(self.progress, self.cycle_duration).1;
            repaired.push("progress");
        }
        if self.tap_bonus < Fixed::ZERO {
            self.tap_bonus = Fixed::ZERO;
            repaired.push("tap_bonus");
        }

        repaired
    }
}

/// Split a non-negative span into whole cycles and the leftover.
///
/// `cycle` must be positive; lines clamp it to [`MIN_CYCLE_DURATION`].
fn split_cycles(span: Fixed, cycle: Fixed) -> (u64, Fixed) {
    let span = span.max(Fixed::ZERO).to_bits();
    let cycle = cycle.max(MIN_CYCLE_DURATION).to_bits();
    let completed = u64::try_from(span / cycle).unwrap_or(0);
    (completed, Fixed::from_bits(span % cycle))
}

/// Output of `cycles` payouts of `per_cycle`, saturating.
fn pay_cycles(cycles: u64, per_cycle: Fixed) -> Fixed {
    Fixed::saturating_from_num(cycles).saturating_mul(per_cycle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: f64) -> Fixed {
        Fixed::from_num(n)
    }

    fn line(villagers: u32, output: f64, cycle: f64) -> ProductionLine {
        let mut config = LineConfig::builtin(SystemKind::Mining);
        config.output_per_villager = fixed(output);
        config.cycle_duration = fixed(cycle);
        let mut line = ProductionLine::from_config(&config);
        line.villager_count = villagers;
        line
    }

    #[test]
    fn test_update_pays_each_completed_cycle() {
        let mut line = line(3, 5.0, 10.0);

        assert_eq!(line.update(fixed(25.0)), fixed(30.0));
        assert_eq!(line.progress, fixed(5.0));
    }

    #[test]
    fn test_tap_bonus_goes_to_first_cycle_only() {
        let mut line = line(3, 5.0, 10.0);
        line.register_tap(fixed(2.0));

        assert_eq!(line.update(fixed(25.0)), fixed(32.0));
        assert_eq!(line.progress, fixed(5.0));
        assert_eq!(line.tap_bonus, Fixed::ZERO);
    }

    #[test]
    fn test_tap_bonus_waits_for_cycle_boundary() {
        let mut line = line(1, 5.0, 10.0);
        line.register_tap(fixed(2.0));
        line.register_tap(fixed(1.0));

        assert_eq!(line.update(fixed(9.0)), Fixed::ZERO);
        assert_eq!(line.tap_bonus, fixed(3.0));
        assert_eq!(line.update(fixed(1.0)), fixed(8.0));
    }

    #[test]
    fn test_negative_tap_is_ignored() {
        let mut line = line(1, 5.0, 10.0);
        line.register_tap(fixed(-4.0));
        assert_eq!(line.tap_bonus, Fixed::ZERO);
    }

    #[test]
    fn test_empty_line_does_not_accumulate() {
        let mut line = line(0, 5.0, 10.0);
        line.register_tap(fixed(2.0));

        assert_eq!(line.update(fixed(100.0)), Fixed::ZERO);
        assert_eq!(line.progress, Fixed::ZERO);
        assert_eq!(line.calculate_offline_production(fixed(100.0)), Fixed::ZERO);
        assert_eq!(line.progress, Fixed::ZERO);
    }

    #[test]
    fn test_villager_capacity() {
        let mut line = line(0, 5.0, 10.0);
        line.max_villagers = 2;

        assert!(line.try_add_villager());
        assert!(line.try_add_villager());
        assert!(!line.can_accept_villager());
        assert!(!line.try_add_villager());
        assert_eq!(line.villager_count, 2);
    }

    #[test]
    fn test_offline_skips_taps_and_keeps_remainder() {
        let mut line = line(2, 4.0, 12.0);
        line.register_tap(fixed(5.0));

        // 3 whole cycles, 6 seconds left over
        assert_eq!(line.calculate_offline_production(fixed(42.0)), fixed(24.0));
        assert_eq!(line.progress, fixed(6.0));
        assert_eq!(line.tap_bonus, fixed(5.0));
    }

    #[test]
    fn test_offline_then_update_matches_single_update() {
        let mut split = line(2, 4.0, 12.0);
        split.progress = fixed(7.0);
        let mut whole = split.clone();

        let produced = split.calculate_offline_production(fixed(100.0)) + split.update(fixed(9.5));
        let expected = whole.update(fixed(109.5));

        assert_eq!(produced, expected);
        assert_eq!(split.progress, whole.progress);
    }

    #[test]
    fn test_offline_carry_closes_cycle() {
        let mut line = line(1, 5.0, 10.0);
        line.progress = fixed(8.0);

        // One whole cycle plus 4 s, and 8 + 4 closes a second one
        assert_eq!(line.calculate_offline_production(fixed(14.0)), fixed(10.0));
        assert_eq!(line.progress, fixed(2.0));
    }

    #[test]
    fn test_offline_cycle_count_beyond_fixed_range_saturates() {
        let mut line = line(1, 5.0, 0.01);
        assert_eq!(line.cycle_duration, MIN_CYCLE_DURATION);

        // About 5e9 cycles, more than the integer part of a Fixed holds
        assert_eq!(line.calculate_offline_production(fixed(50_000_000.0)), Fixed::MAX);
        assert!(line.progress < line.cycle_duration);
    }

    #[test]
    fn test_huge_update_pays_in_one_step() {
        let mut line = line(2, 3.0, 0.01);
        line.register_tap(fixed(1.0));

        assert_eq!(line.update(Fixed::MAX), Fixed::MAX);
        assert!(line.progress < line.cycle_duration);
        assert_eq!(line.tap_bonus, Fixed::ZERO);
    }

    #[test]
    fn test_upgrade_scales_parameters() {
        let mut line = line(1, 10.0, 20.0);
        let upgrade = TierUpgrade::default();

        assert_eq!(line.upgrade(&upgrade), Ok(2));
        assert_eq!(line.max_villagers, 15);
        assert_eq!(line.output_per_villager, fixed(15.0));
        assert!(line.cycle_duration < fixed(20.0));
        assert!(line.cycle_duration > fixed(17.9));

        assert_eq!(line.upgrade(&upgrade), Ok(3));
        assert_eq!(
            line.upgrade(&upgrade),
            Err(UpgradeError::MaxTier {
                line: SystemKind::Mining,
                max_tier: 3
            })
        );
        assert_eq!(line.tier, 3);
    }

    #[test]
    fn test_rates() {
        let mut line = line(4, 5.0, 10.0);
        assert_eq!(line.production_per_second(), fixed(2.0));

        line.progress = fixed(2.5);
        assert_eq!(line.cycle_fraction(), fixed(0.25));
    }

    #[test]
    fn test_upgrade_keeps_cycle_fraction() {
        let mut line = line(1, 10.0, 20.0);
        line.progress = fixed(19.5);
        let upgrade = TierUpgrade {
            cycle_multiplier: fixed(0.5),
            ..TierUpgrade::default()
        };

        line.upgrade(&upgrade).expect("upgrade");

        assert_eq!(line.cycle_duration, fixed(10.0));
        assert_eq!(line.progress, fixed(9.75));
        assert!(line.cycle_fraction() > fixed(0.97));
    }

    #[test]
    fn test_rates_saturate_on_extreme_lines() {
        let mut line = line(10, 100_000_000.0, 0.01);
        line.progress = line.cycle_duration - Fixed::DELTA;

        assert_eq!(line.production_per_second(), Fixed::MAX);
        assert!(line.cycle_fraction() <= Fixed::ONE);
    }

    #[test]
    fn test_repair_wraps_progress_past_cycle() {
        let defaults = LineConfig::builtin(SystemKind::Mining);
        let mut line = ProductionLine::from_config(&defaults);
        line.progress = fixed(25.0);

        assert_eq!(line.repair(&defaults), vec!["progress"]);
        assert_eq!(line.progress, fixed(5.0));

        line.cycle_duration = MIN_CYCLE_DURATION;
        line.progress = Fixed::MAX;
        assert_eq!(line.repair(&defaults), vec!["progress"]);
        assert!(line.progress < line.cycle_duration);
    }

    #[test]
    fn test_repair_resets_unusable_fields() {
        let defaults = LineConfig::builtin(SystemKind::Woodcutting);
        let mut line = ProductionLine::from_config(&defaults);
        line.max_villagers = 0;
        line.villager_count = 7;
        line.cycle_duration = fixed(-3.0);
        line.output_per_villager = Fixed::ZERO;

        let repaired = line.repair(&defaults);

        assert_eq!(
            repaired,
            vec![
                "max_villagers",
                "cycle_duration",
                "output_per_villager",
            ]
        );
        assert_eq!(line.max_villagers, 10);
        assert_eq!(line.villager_count, 7);
        assert_eq!(line.cycle_duration, fixed(12.0));
        assert_eq!(line.output_per_villager, fixed(4.0));
    }

    #[test]
    fn test_repair_clamps_villagers_to_capacity() {
        let defaults = LineConfig::builtin(SystemKind::Market);
        let mut line = ProductionLine::from_config(&defaults);
        line.max_villagers = 3;
        line.villager_count = 9;

        assert_eq!(line.repair(&defaults), vec!["villager_count"]);
        assert_eq!(line.villager_count, 3);
    }
}
