//! Property-based tests for the simulation invariants.

use foundry_core::energy::EnergyPool;
use foundry_core::math::Fixed;
use foundry_core::simulation::SimulationClock;
use foundry_test_utils::determinism::strategies::{
    arb_action_sequence, arb_cycle_duration, arb_frame_dt, arb_output, arb_span,
};
use foundry_test_utils::fixtures::{busy_clock, fixed, line_with, scenario_config};
use proptest::prelude::*;

fn assert_energy_invariants(pool: &EnergyPool) -> Result<(), TestCaseError> {
    prop_assert!(pool.current >= Fixed::ZERO, "current below zero: {}", pool.current);
    prop_assert!(pool.current <= pool.max, "current above max: {}", pool.current);
    if pool.is_overheated {
        prop_assert_eq!(pool.current, Fixed::ZERO);
    }
    Ok(())
}

fn assert_clock_invariants(clock: &SimulationClock) -> Result<(), TestCaseError> {
    assert_energy_invariants(clock.energy())?;
    for line in clock.lines() {
        prop_assert!(line.villager_count <= line.max_villagers, "{} over capacity", line.kind);
        prop_assert!(line.progress >= Fixed::ZERO);
        prop_assert!(line.progress < line.cycle_duration, "{} progress not drained", line.kind);
        prop_assert!(line.tap_bonus >= Fixed::ZERO);
    }
    for (kind, amount) in clock.ledger().iter() {
        prop_assert!(amount >= Fixed::ZERO, "{} is negative", kind);
    }
    Ok(())
}

proptest! {
    /// Energy and line invariants hold after every step of any session.
    #[test]
    fn prop_invariants_hold_for_any_session(actions in arb_action_sequence(120)) {
        let mut clock = SimulationClock::new(scenario_config());
        for action in &actions {
            action.apply(&mut clock);
            assert_clock_invariants(&clock)?;
        }
    }

    /// `tick(0)` never changes anything.
    #[test]
    fn prop_zero_tick_is_idempotent(actions in arb_action_sequence(40), repeats in 1usize..20) {
        let mut clock = SimulationClock::new(scenario_config());
        for action in &actions {
            action.apply(&mut clock);
        }
        clock.drain_events();
        let before = clock.snapshot();

        for _ in 0..repeats {
            clock.tick(Fixed::ZERO);
        }

        prop_assert_eq!(clock.snapshot(), before);
        prop_assert!(clock.events().is_empty());
    }

    /// Splitting a tick in two produces exactly the same total.
    #[test]
    fn prop_tick_is_additive(a in arb_span(), b in arb_span()) {
        let mut split = busy_clock();
        let mut whole = busy_clock();

        split.tick(a);
        split.tick(b);
        whole.tick(a + b);

        for (kind, amount) in whole.ledger().iter() {
            prop_assert_eq!(split.ledger().get(kind), amount, "{}", kind);
        }
        for (s, w) in split.lines().iter().zip(whole.lines()) {
            prop_assert_eq!(s.progress, w.progress);
        }
    }

    /// Offline production followed by a live update lands exactly where a
    /// single live update would.
    #[test]
    fn prop_offline_online_phase_continuity(
        villagers in 1u32..10,
        output in arb_output(),
        cycle in arb_cycle_duration(),
        start in 0i64..1000,
        offline in arb_span(),
        online in arb_frame_dt(),
    ) {
        let mut split = line_with(villagers, output, cycle);
        split.progress = (Fixed::from_num(start) / 1000) * cycle;
        let mut whole = split.clone();

        let produced = split.calculate_offline_production(offline) + split.update(online);
        let expected = whole.update(offline + online);

        prop_assert_eq!(produced, expected);
        prop_assert_eq!(split.progress, whole.progress);
    }

    /// A refused generation never touches the pool.
    #[test]
    fn prop_refused_generation_is_free(actions in arb_action_sequence(60), id in any::<u8>()) {
        let mut clock = SimulationClock::new(scenario_config());
        for action in &actions {
            action.apply(&mut clock);
        }
        let energy = clock.energy().clone();
        let lines = clock.lines().to_vec();

        if clock.request_generation(foundry_core::kinds::LineId::new(id)).is_err() {
            prop_assert_eq!(clock.energy(), &energy);
            prop_assert_eq!(clock.lines(), &lines[..]);
        }
    }

    /// Energy never leaves `[0, max]` under any mix of spending and time.
    #[test]
    fn prop_energy_pool_bounds(steps in prop::collection::vec((any::<bool>(), arb_frame_dt()), 0..200)) {
        let mut pool = EnergyPool::from_config(&scenario_config().energy);
        for (consume, dt) in steps {
            if consume {
                let _ = pool.try_consume();
            } else {
                pool.update(dt);
            }
            assert_energy_invariants(&pool)?;
        }
    }

    /// Offline spans past the horizon never change state.
    #[test]
    fn prop_offline_beyond_horizon_is_ignored(extra in 1i32..1_000_000) {
        let mut clock = busy_clock();
        let before = clock.snapshot();

        prop_assert!(clock.process_offline_elapsed(fixed(86_400) + fixed(extra)).is_none());
        prop_assert_eq!(clock.snapshot(), before);
    }
}
