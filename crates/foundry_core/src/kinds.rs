//! Closed enumerations for production systems and resources.
//!
//! Both sets are small and known at compile time, so runtime state is
//! stored in fixed-size arrays indexed by [`SystemKind::index`] and
//! [`ResourceKind::index`] instead of keyed maps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A production system a villager can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SystemKind {
    /// Quarrying stone.
    Mining,
    /// Felling trees.
    Woodcutting,
    /// Growing food. Long cycles, large yields.
    Farming,
    /// Working metal.
    Smithing,
    /// Trading goods for gold.
    Market,
}

impl SystemKind {
    /// Number of system kinds.
    pub const COUNT: usize = 5;

    /// Every system kind, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Mining,
        Self::Woodcutting,
        Self::Farming,
        Self::Smithing,
        Self::Market,
    ];

    /// Dense array index for this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a kind by array index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Resolve a raw line id. Returns `None` when no line has this id.
    #[must_use]
    pub fn from_id(id: LineId) -> Option<Self> {
        Self::from_index(usize::from(id.0))
    }

    /// The raw id of this kind's line.
    #[must_use]
    pub const fn id(self) -> LineId {
        LineId(self as u8)
    }

    /// The resource this system produces unless configuration overrides it.
    #[must_use]
    pub const fn default_output(self) -> ResourceKind {
        match self {
            Self::Mining => ResourceKind::Stone,
            Self::Woodcutting => ResourceKind::Wood,
            Self::Farming => ResourceKind::Food,
            Self::Smithing => ResourceKind::Metal,
            Self::Market => ResourceKind::Gold,
        }
    }

    /// Lowercase name, as used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mining => "mining",
            Self::Woodcutting => "woodcutting",
            Self::Farming => "farming",
            Self::Smithing => "smithing",
            Self::Market => "market",
        }
    }

    /// Parse a lowercase name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw identifier of a production line.
///
/// This is what the UI and the save file carry. It may name a line that
/// does not exist; [`SystemKind::from_id`] is the only way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(pub u8);

impl LineId {
    /// Create a new line ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }
}

impl From<SystemKind> for LineId {
    fn from(kind: SystemKind) -> Self {
        kind.id()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resource tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Produced by mining.
    Stone,
    /// Produced by woodcutting.
    Wood,
    /// Produced by farming.
    Food,
    /// Produced by smithing.
    Metal,
    /// Produced by the market.
    Gold,
    /// Crafted goods. No line produces tools directly.
    Tools,
}

impl ResourceKind {
    /// Number of resource kinds.
    pub const COUNT: usize = 6;

    /// Every resource kind, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Stone,
        Self::Wood,
        Self::Food,
        Self::Metal,
        Self::Gold,
        Self::Tools,
    ];

    /// Dense array index for this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a kind by array index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stone => "stone",
            Self::Wood => "wood",
            Self::Food => "food",
            Self::Metal => "metal",
            Self::Gold => "gold",
            Self::Tools => "tools",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense() {
        for (i, kind) in SystemKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(SystemKind::from_index(i), Some(*kind));
        }
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(ResourceKind::from_index(i), Some(*kind));
        }
        assert_eq!(SystemKind::from_index(SystemKind::COUNT), None);
    }

    #[test]
    fn test_line_id_resolution() {
        assert_eq!(SystemKind::from_id(LineId(2)), Some(SystemKind::Farming));
        assert_eq!(SystemKind::from_id(LineId(5)), None);
        assert_eq!(SystemKind::from_id(LineId(255)), None);
        assert_eq!(LineId::from(SystemKind::Market), LineId(4));
    }

    #[test]
    fn test_no_line_produces_tools() {
        assert!(SystemKind::ALL
            .iter()
            .all(|kind| kind.default_output() != ResourceKind::Tools));
    }

    #[test]
    fn test_name_round_trip() {
        for kind in SystemKind::ALL {
            assert_eq!(SystemKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SystemKind::from_name("fishing"), None);
    }
}
