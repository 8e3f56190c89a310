//! Headless session runner.
//!
//! Plays the host's part: loads or creates a session, applies offline
//! catch-up since the last save, ticks at a fixed frame rate while issuing
//! generation requests and taps, autosaves on simulated time and reports
//! what happened.

use std::path::PathBuf;

use foundry_core::config::GameConfig;
use foundry_core::events::{SimEvent, SimObserver};
use foundry_core::kinds::{ResourceKind, SystemKind};
use foundry_core::math::Fixed;
use foundry_core::simulation::{GenerationError, SimulationClock};
use serde::Serialize;

use crate::error::{Result, ToolError};
use crate::save::SaveFile;

/// Default autosave interval, in simulated seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL: f64 = 30.0;

/// Longest run, in simulated seconds: one week.
pub const MAX_SESSION_SECONDS: f64 = 604_800.0;

/// Highest frame rate a run accepts.
pub const MAX_FPS: u32 = 240;

/// What a session run should do.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Save file to resume from and write to. `None` runs without saving.
    pub save_path: Option<PathBuf>,
    /// Simulated seconds to play.
    pub seconds: f64,
    /// Frames per simulated second.
    pub fps: u32,
    /// Villagers to try to generate.
    pub generate: u32,
    /// Line receiving generated villagers.
    pub target: SystemKind,
    /// Taps to register on the target line.
    pub taps: u32,
    /// Simulated seconds between autosaves.
    pub autosave_interval: f64,
    /// Unix time at which the run starts.
    pub now: i64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            save_path: None,
            seconds: 60.0,
            fps: 30,
            generate: 0,
            target: SystemKind::Mining,
            taps: 0,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            now: 0,
        }
    }
}

/// Counts of drained notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventTally {
    /// Production payouts.
    pub cycles_completed: u64,
    /// Villagers generated.
    pub villagers_generated: u64,
    /// Refused generation requests.
    pub generation_failures: u64,
    /// Times the pool overheated.
    pub overheats: u64,
    /// Times the pool recovered.
    pub recoveries: u64,
    /// Tier, automation, building and era changes.
    pub progression: u64,
}

impl SimObserver for EventTally {
    fn on_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::ProductionCycleComplete { .. } => self.cycles_completed += 1,
            SimEvent::VillagerGenerated { .. } => self.villagers_generated += 1,
            SimEvent::VillagerGenerationFailed { .. } => self.generation_failures += 1,
            SimEvent::EnergyOverheated => self.overheats += 1,
            SimEvent::EnergyRecovered => self.recoveries += 1,
            SimEvent::LineUpgraded { .. }
            | SimEvent::AutomationUnlocked { .. }
            | SimEvent::BuildingUpgraded { .. }
            | SimEvent::EraAdvanced { .. } => self.progression += 1,
            SimEvent::ResourceChanged { .. } | SimEvent::OfflineProgressApplied { .. } => {}
        }
    }
}

/// One line as reported to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSummary {
    /// The line.
    pub kind: SystemKind,
    /// Villagers working it.
    pub villagers: u32,
    /// Villager capacity.
    pub max_villagers: u32,
    /// Upgrade tier.
    pub tier: u32,
    /// Steady output per second.
    pub per_second: f64,
    /// Progress toward the next payout, `[0, 1]`.
    pub cycle_fraction: f64,
}

/// Human-facing view of a session's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Seconds of offline catch-up applied on load, if any.
    pub offline_seconds: Option<f64>,
    /// Seconds of live play in this run.
    pub simulated_seconds: f64,
    /// Seconds of live play across the whole save.
    pub total_play_time: f64,
    /// Stored energy.
    pub energy: f64,
    /// Energy capacity.
    pub energy_max: f64,
    /// Whether the pool is cooling down.
    pub overheated: bool,
    /// Every line.
    pub lines: Vec<LineSummary>,
    /// Every resource total.
    pub resources: Vec<(ResourceKind, f64)>,
    /// Unlocked automation roles.
    pub automations: Vec<String>,
    /// Notifications drained during the run.
    pub events: EventTally,
    /// Saves written during the run.
    pub saves_written: u32,
    /// Final state hash.
    pub state_hash: u64,
}

impl SessionSummary {
    /// Describe a clock's current state.
    #[must_use]
    pub fn of(clock: &SimulationClock) -> Self {
        Self {
            offline_seconds: None,
            simulated_seconds: 0.0,
            total_play_time: clock.total_play_time().to_num(),
            energy: clock.energy().current.to_num(),
            energy_max: clock.energy().max.to_num(),
            overheated: clock.energy().is_overheated,
            lines: clock
                .lines()
                .iter()
                .map(|line| LineSummary {
                    kind: line.kind,
                    villagers: line.villager_count,
                    max_villagers: line.max_villagers,
                    tier: line.tier,
                    per_second: line.production_per_second().to_num(),
                    cycle_fraction: line.cycle_fraction().to_num(),
                })
                .collect(),
            resources: clock
                .ledger()
                .iter()
                .map(|(kind, amount)| (kind, amount.to_num()))
                .collect(),
            automations: clock.unlocked_automations().iter().cloned().collect(),
            events: EventTally::default(),
            saves_written: 0,
            state_hash: clock.state_hash(),
        }
    }

    /// Render as indented plain text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(offline) = self.offline_seconds {
            out.push_str(&format!("Offline catch-up: {offline:.0}s\n"));
        }
        out.push_str(&format!(
            "Played {:.1}s (total {:.1}s)\n",
            self.simulated_seconds, self.total_play_time
        ));
        out.push_str(&format!(
            "EITR: {:.1}/{:.1}{}\n",
            self.energy,
            self.energy_max,
            if self.overheated { " (overheated)" } else { "" }
        ));
        out.push_str("Lines:\n");
        for line in &self.lines {
            out.push_str(&format!(
                "  {:<12} {:>3}/{:<3} tier {}  {:>8.2}/s  {:>3.0}%\n",
                line.kind.name(),
                line.villagers,
                line.max_villagers,
                line.tier,
                line.per_second,
                line.cycle_fraction * 100.0
            ));
        }
        out.push_str("Resources:\n");
        for (kind, amount) in &self.resources {
            out.push_str(&format!("  {:<12} {amount:>12.2}\n", kind.name()));
        }
        if !self.automations.is_empty() {
            out.push_str(&format!("Automations: {}\n", self.automations.join(", ")));
        }
        out.push_str(&format!(
            "Events: {} cycles, {} villagers, {} refused, {} overheats\n",
            self.events.cycles_completed,
            self.events.villagers_generated,
            self.events.generation_failures,
            self.events.overheats
        ));
        out.push_str(&format!("Saves written: {}\n", self.saves_written));
        out.push_str(&format!("State hash: {:016x}\n", self.state_hash));
        out
    }
}

/// Drives one session from the host side.
#[derive(Debug)]
pub struct SessionRunner {
    clock: SimulationClock,
    options: SessionOptions,
    tally: EventTally,
    saves_written: u32,
    offline_seconds: Option<f64>,
}

impl SessionRunner {
    /// Resume the save at `options.save_path`, or start a new game.
    ///
    /// A resumed session gets offline catch-up for the time between its
    /// last save and `options.now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are unusable or an existing save
    /// cannot be loaded.
    pub fn open(config: GameConfig, options: SessionOptions) -> Result<Self> {
        if options.fps == 0 || options.fps > MAX_FPS {
            return Err(ToolError::InvalidArgument(format!(
                "fps must be between 1 and {MAX_FPS}, got {}",
                options.fps
            )));
        }
        if !(0.0..=MAX_SESSION_SECONDS).contains(&options.seconds) {
            return Err(ToolError::InvalidArgument(format!(
                "seconds must be between 0 and {MAX_SESSION_SECONDS}, got {}",
                options.seconds
            )));
        }

        let saved = match &options.save_path {
            Some(path) => SaveFile::load_if_exists(path)?,
            None => None,
        };

        let mut offline_seconds = None;
        let clock = if let Some(save) = saved {
            tracing::info!("Loaded existing save");
            let mut clock = SimulationClock::restore(config, save.snapshot)?;
            let elapsed = clock.offline_elapsed_since(options.now);
            if elapsed > Fixed::ZERO {
                if let Some(report) = clock.process_offline_elapsed(elapsed) {
                    offline_seconds = Some(report.elapsed.to_num());
                }
            }
            clock
        } else {
            tracing::info!("Created new game state");
            SimulationClock::new(config)
        };

        Ok(Self {
            clock,
            options,
            tally: EventTally::default(),
            saves_written: 0,
            offline_seconds,
        })
    }

    /// The session being driven.
    #[must_use]
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Play the configured number of seconds, then save and summarize.
    ///
    /// # Errors
    ///
    /// Returns an error if a save cannot be written.
    pub fn run(mut self) -> Result<SessionSummary> {
        let fps = u64::from(self.options.fps);
        let dt = Fixed::ONE / i64::from(self.options.fps);
        // Partial frames are not played
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frames = (self.options.seconds * f64::from(self.options.fps)).floor() as u64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let autosave_frames = (self.options.autosave_interval * f64::from(self.options.fps))
            .round()
            .max(0.0) as u64;

        // Drain anything queued by offline catch-up
        self.clock.dispatch_events(&mut self.tally);

        let target = self.options.target;
        let mut generated = 0;
        let mut taps = 0;

        for frame in 1..=frames {
            if taps < self.options.taps {
                self.clock.tap(target);
                taps += 1;
            }
            if generated < self.options.generate {
                match self.clock.request_generation(target) {
                    Ok(_) => generated += 1,
                    Err(GenerationError::LineFull(_) | GenerationError::InvalidTarget(_)) => {
                        tracing::warn!(line = %target, "Target cannot take more villagers");
                        generated = self.options.generate;
                    }
                    // Energy refusals are retried on a later frame
                    Err(_) => {}
                }
            }

            self.clock.tick(dt);
            self.clock.dispatch_events(&mut self.tally);

            if autosave_frames > 0 && frame % autosave_frames == 0 {
                self.save_at(self.options.now + whole_seconds(frame, fps))?;
            }
        }

        self.save_at(self.options.now + whole_seconds(frames, fps))?;

        #[allow(clippy::cast_precision_loss)]
        let simulated_seconds = frames as f64 / fps as f64;
        let mut summary = SessionSummary::of(&self.clock);
        summary.offline_seconds = self.offline_seconds;
        summary.simulated_seconds = simulated_seconds;
        summary.events = self.tally;
        summary.saves_written = self.saves_written;
        Ok(summary)
    }

    fn save_at(&mut self, timestamp: i64) -> Result<()> {
        let Some(path) = &self.options.save_path else {
            return Ok(());
        };
        self.clock.mark_saved(timestamp);
        SaveFile::new(self.clock.snapshot()).save(path)?;
        self.saves_written += 1;
        Ok(())
    }
}

fn whole_seconds(frames: u64, fps: u64) -> i64 {
    i64::try_from(frames / fps).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: &tempfile::TempDir) -> SessionOptions {
        SessionOptions {
            save_path: Some(dir.path().join("session.sav")),
            seconds: 60.0,
            fps: 10,
            generate: 3,
            target: SystemKind::Mining,
            taps: 0,
            autosave_interval: 30.0,
            now: 1_700_000_000,
        }
    }

    #[test]
    fn test_new_session_runs_and_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = SessionRunner::open(GameConfig::default(), options(&dir)).expect("open");

        let summary = runner.run().expect("run");

        // 3 villagers on a 10 s mining cycle for 60 s
        assert_eq!(summary.events.villagers_generated, 3);
        assert!(summary.events.cycles_completed >= 5);
        assert_eq!(summary.simulated_seconds, 60.0);
        assert_eq!(summary.offline_seconds, None);
        // Autosaves at 30 s and 60 s, plus the exit save
        assert_eq!(summary.saves_written, 3);

        let save = SaveFile::load(dir.path().join("session.sav")).expect("load");
        assert_eq!(save.snapshot.last_save_timestamp, 1_700_000_060);
    }

    #[test]
    fn test_resumed_session_applies_offline_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        SessionRunner::open(GameConfig::default(), options(&dir))
            .expect("open")
            .run()
            .expect("first run");
        let stone_before = SaveFile::load(dir.path().join("session.sav"))
            .expect("load")
            .snapshot
            .resource(ResourceKind::Stone);

        let mut resume = options(&dir);
        resume.now += 60 + 3_600;
        resume.seconds = 0.0;
        resume.generate = 0;
        let summary = SessionRunner::open(GameConfig::default(), resume)
            .expect("open")
            .run()
            .expect("second run");

        assert_eq!(summary.offline_seconds, Some(3_600.0));
        let stone_after = summary
            .resources
            .iter()
            .find(|(kind, _)| *kind == ResourceKind::Stone)
            .map(|(_, amount)| *amount)
            .expect("stone");
        // At least 360 mining cycles of 3 villagers
        assert!(stone_after - stone_before.to_num::<f64>() >= 5_400.0);
    }

    #[test]
    fn test_offline_beyond_horizon_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        SessionRunner::open(GameConfig::default(), options(&dir))
            .expect("open")
            .run()
            .expect("first run");

        let mut resume = options(&dir);
        resume.now += 200_000;
        let runner = SessionRunner::open(GameConfig::default(), resume).expect("open");
        assert_eq!(runner.offline_seconds, None);
    }

    #[test]
    fn test_run_without_save_path() {
        let runner = SessionRunner::open(
            GameConfig::default(),
            SessionOptions {
                taps: 5,
                generate: 1,
                ..SessionOptions::default()
            },
        )
        .expect("open");

        let summary = runner.run().expect("run");
        assert_eq!(summary.saves_written, 0);
        assert!(summary.to_text().contains("mining"));
    }

    #[test]
    fn test_zero_fps_is_rejected() {
        let result = SessionRunner::open(
            GameConfig::default(),
            SessionOptions {
                fps: 0,
                ..SessionOptions::default()
            },
        );
        assert!(matches!(result, Err(ToolError::InvalidArgument(_))));
    }

    #[test]
    fn test_unbounded_runs_are_rejected() {
        for seconds in [1e300, f64::INFINITY, f64::NAN, -1.0, MAX_SESSION_SECONDS + 1.0] {
            let result = SessionRunner::open(
                GameConfig::default(),
                SessionOptions {
                    seconds,
                    ..SessionOptions::default()
                },
            );
            assert!(
                matches!(result, Err(ToolError::InvalidArgument(_))),
                "seconds = {seconds}"
            );
        }

        let result = SessionRunner::open(
            GameConfig::default(),
            SessionOptions {
                fps: MAX_FPS + 1,
                ..SessionOptions::default()
            },
        );
        assert!(matches!(result, Err(ToolError::InvalidArgument(_))));
    }

    #[test]
    fn test_tally_counts_events() {
        let mut tally = EventTally::default();
        tally.on_event(&SimEvent::EnergyOverheated);
        tally.on_event(&SimEvent::VillagerGenerated {
            line: SystemKind::Farming,
        });
        tally.on_event(&SimEvent::ResourceChanged {
            kind: ResourceKind::Food,
            amount: Fixed::ONE,
        });

        assert_eq!(tally.overheats, 1);
        assert_eq!(tally.villagers_generated, 1);
        assert_eq!(tally.cycles_completed, 0);
    }
}
