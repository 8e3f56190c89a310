//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A session must replay identically from a save: offline catch-up on one
//! device has to credit exactly what the same span of live play would.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: rounding depends on operation order.
//!   We use fixed-point arithmetic via [`foundry_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Lines and resources live in arrays iterated in index order.
//!
//! - **Wall-clock reads**: the core never reads time; the host passes it in.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual component behaviour (energy, lines, ledger)
//! 2. **Property tests**: Random action sequences keep every invariant
//! 3. **Integration tests**: Full sessions are reproducible

use std::thread;

use foundry_core::kinds::{LineId, SystemKind};
use foundry_core::math::Fixed;
use foundry_core::simulation::SimulationClock;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// One thing a player or host can do to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Advance live play.
    Tick(Fixed),
    /// Generate a villager onto a raw line id.
    Generate(LineId),
    /// Change the selected line and generate onto it.
    SelectAndGenerate(SystemKind),
    /// Tap a line.
    Tap(SystemKind),
    /// Try to upgrade a line.
    Upgrade(SystemKind),
    /// Replay a closed-app span.
    Offline(Fixed),
}

impl SessionAction {
    /// Apply this action, discarding refusals.
    pub fn apply(&self, clock: &mut SimulationClock) {
        match *self {
            Self::Tick(dt) => clock.tick(dt),
            Self::Generate(id) => {
                let _ = clock.request_generation(id);
            }
            Self::SelectAndGenerate(kind) => {
                clock.select_line(kind);
                let _ = clock.generate_villager();
            }
            Self::Tap(kind) => clock.tap(kind),
            Self::Upgrade(kind) => {
                let _ = clock.upgrade_line(kind);
            }
            Self::Offline(elapsed) => {
                let _ = clock.process_offline_elapsed(elapsed);
            }
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of steps to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one step
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use foundry_test_utils::determinism::verify_determinism;
/// use foundry_test_utils::fixtures::{busy_clock, fixed};
///
/// let result = verify_determinism(
///     5,  // Run 5 times
///     100, // 100 frames each
///     busy_clock,
///     |clock| clock.tick(fixed(1) / 60),
///     |clock| clock.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Replay an action sequence on several fresh sessions and compare hashes.
pub fn verify_session_determinism<F>(setup_fn: F, actions: &[SessionAction], runs: usize) -> DeterminismResult
where
    F: Fn() -> SimulationClock,
{
    let hashes = (0..runs)
        .map(|_| {
            let mut clock = setup_fn();
            for action in actions {
                action.apply(&mut clock);
            }
            clock.state_hash()
        })
        .collect::<Vec<_>>();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: actions.len() as u64,
    }
}

/// Run N sessions on separate threads, each ticking `num_ticks` frames of
/// `dt`, and collect their final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_sessions<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
    dt: Fixed,
) -> DeterminismResult
where
    F: Fn() -> SimulationClock + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut clock = setup_fn();
                    for _ in 0..num_ticks {
                        clock.tick(dt);
                    }
                    clock.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("session thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two sessions frame by frame, finding the first divergence.
///
/// # Returns
///
/// `None` if the sessions stay identical, `Some(frame)` if they diverge
/// at that frame.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> SimulationClock,
{
    let mut clock1 = setup_fn();
    let mut clock2 = setup_fn();

    // Check initial state
    if clock1.state_hash() != clock2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        clock1.tick(dt);
        clock2.tick(dt);

        if clock1.state_hash() != clock2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot/restore round trip preserves session state
/// exactly.
pub fn verify_snapshot_determinism<F>(setup_fn: F, actions: &[SessionAction]) -> bool
where
    F: Fn() -> SimulationClock,
{
    let mut clock = setup_fn();
    for action in actions {
        action.apply(&mut clock);
    }

    let hash_before = clock.state_hash();

    let Ok(restored) = SimulationClock::restore(clock.config().clone(), clock.snapshot()) else {
        return false;
    };

    hash_before == restored.state_hash()
}

/// Proptest strategies for session testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the simulation.
pub mod strategies {
    use proptest::prelude::*;

    use super::SessionAction;
    use foundry_core::kinds::{LineId, SystemKind};
    use foundry_core::math::Fixed;

    /// Any system kind.
    pub fn arb_system_kind() -> impl Strategy<Value = SystemKind> {
        (0..SystemKind::COUNT).prop_map(|i| SystemKind::ALL[i])
    }

    /// Any raw line id, including ids with no line.
    pub fn arb_line_id() -> impl Strategy<Value = LineId> {
        any::<u8>().prop_map(LineId::new)
    }

    /// A frame delta between 0 and 2 seconds, in 1/1024 s steps.
    pub fn arb_frame_dt() -> impl Strategy<Value = Fixed> {
        (0i64..=2048).prop_map(|n| Fixed::from_num(n) / 1024)
    }

    /// A span of up to 10 minutes, in 1/64 s steps.
    pub fn arb_span() -> impl Strategy<Value = Fixed> {
        (0i64..=38_400).prop_map(|n| Fixed::from_num(n) / 64)
    }

    /// An offline span, sometimes beyond the 24 h horizon.
    pub fn arb_offline_elapsed() -> impl Strategy<Value = Fixed> {
        prop_oneof![
            4 => (1i64..=86_400).prop_map(Fixed::from_num),
            1 => (86_401i64..=200_000).prop_map(Fixed::from_num),
            1 => (-100i64..=0).prop_map(Fixed::from_num),
        ]
    }

    /// A cycle duration between 0.5 and 120 seconds.
    pub fn arb_cycle_duration() -> impl Strategy<Value = Fixed> {
        (32i64..=7680).prop_map(|n| Fixed::from_num(n) / 64)
    }

    /// Output per villager between 0.25 and 50.
    pub fn arb_output() -> impl Strategy<Value = Fixed> {
        (1i64..=200).prop_map(|n| Fixed::from_num(n) / 4)
    }

    /// One session action, weighted toward ticks and generation.
    pub fn arb_action() -> impl Strategy<Value = SessionAction> {
        prop_oneof![
            6 => arb_frame_dt().prop_map(SessionAction::Tick),
            4 => arb_line_id().prop_map(SessionAction::Generate),
            4 => arb_system_kind().prop_map(SessionAction::SelectAndGenerate),
            2 => arb_system_kind().prop_map(SessionAction::Tap),
            1 => arb_system_kind().prop_map(SessionAction::Upgrade),
            1 => arb_offline_elapsed().prop_map(SessionAction::Offline),
        ]
    }

    /// A sequence of session actions.
    pub fn arb_action_sequence(max_len: usize) -> impl Strategy<Value = Vec<SessionAction>> {
        prop::collection::vec(arb_action(), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{busy_clock, fixed, roomy_config};
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_busy_session_is_deterministic() {
        let result = verify_determinism(
            3,
            600,
            busy_clock,
            |clock| clock.tick(fixed(1) / 60),
            SimulationClock::state_hash,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_parallel_sessions_match() {
        let result = run_parallel_sessions(busy_clock, 4, 500, fixed(1) / 30);
        result.assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(busy_clock, 300, fixed(1) / 60), None);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let actions = [
            SessionAction::Tick(fixed(5)),
            SessionAction::Tap(SystemKind::Mining),
            SessionAction::Offline(fixed(3600)),
            SessionAction::Tick(fixed(1) / 3),
        ];
        assert!(verify_snapshot_determinism(busy_clock, &actions));
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        /// Any action sequence replays to the same state.
        #[test]
        fn prop_action_sequences_are_deterministic(actions in arb_action_sequence(60)) {
            let result = verify_session_determinism(
                || SimulationClock::new(roomy_config()),
                &actions,
                2,
            );
            prop_assert!(result.is_deterministic);
        }

        /// Any reachable state survives snapshot and restore unchanged.
        #[test]
        fn prop_snapshot_preserves_state(actions in arb_action_sequence(60)) {
            prop_assert!(verify_snapshot_determinism(SimulationClock::default, &actions));
        }
    }
}
