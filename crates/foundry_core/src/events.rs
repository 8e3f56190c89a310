//! Notifications raised by the simulation.
//!
//! The clock never calls out while it is mutating state. Events are pushed
//! into an [`EventQueue`] and the host drains them once per frame, either
//! by taking the `Vec` directly or by handing a [`SimObserver`] to
//! [`EventQueue::dispatch`].

use serde::{Deserialize, Serialize};

use crate::city::Era;
use crate::kinds::{ResourceKind, SystemKind};
use crate::math::{fixed_serde, Fixed};
use crate::simulation::GenerationError;

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A ledger total changed.
    ResourceChanged {
        /// The resource.
        kind: ResourceKind,
        /// Its new total.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A line paid out during a tick.
    ProductionCycleComplete {
        /// The line.
        line: SystemKind,
        /// Units credited, summed over every cycle completed this tick.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// The energy pool drained and started cooling down.
    EnergyOverheated,
    /// The energy pool finished cooling down.
    EnergyRecovered,
    /// A villager joined a line.
    VillagerGenerated {
        /// The line.
        line: SystemKind,
    },
    /// A generation request was refused.
    VillagerGenerationFailed {
        /// Why.
        reason: GenerationError,
    },
    /// A line reached a new tier.
    LineUpgraded {
        /// The line.
        line: SystemKind,
        /// Its new tier.
        tier: u32,
    },
    /// An automation role was unlocked.
    AutomationUnlocked {
        /// The role.
        role_id: String,
        /// The line it automates.
        line: SystemKind,
    },
    /// A city building reached a new tier.
    BuildingUpgraded {
        /// The building.
        building_id: String,
        /// Its new tier.
        tier: u32,
    },
    /// The city entered a new era.
    EraAdvanced {
        /// The new era.
        era: Era,
    },
    /// Offline catch-up was applied.
    OfflineProgressApplied {
        /// Seconds replayed.
        #[serde(with = "fixed_serde")]
        elapsed: Fixed,
    },
}

/// Receives drained events one at a time.
pub trait SimObserver {
    /// Handle one event.
    fn on_event(&mut self, event: &SimEvent);
}

impl<F: FnMut(&SimEvent)> SimObserver for F {
    fn on_event(&mut self, event: &SimEvent) {
        self(event);
    }
}

/// FIFO buffer of pending events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueue {
    pending: Vec<SimEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: SimEvent) {
        self.pending.push(event);
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Deliver every pending event to an observer and clear the queue.
    ///
    /// Returns the number of events delivered.
    pub fn dispatch<O: SimObserver + ?Sized>(&mut self, observer: &mut O) -> usize {
        let events = self.drain();
        for event in &events {
            observer.on_event(event);
        }
        events.len()
    }
}
