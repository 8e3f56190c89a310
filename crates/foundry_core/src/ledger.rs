//! Resource ledger.
//!
//! Amounts are never negative. A debit either succeeds in full or leaves
//! the ledger untouched.

use serde::{Deserialize, Serialize};

use crate::kinds::ResourceKind;
use crate::math::{decimal_serde, Fixed};

/// An amount of one resource, used for costs and starting stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCost {
    /// The resource.
    pub resource: ResourceKind,
    /// How much of it.
    #[serde(with = "decimal_serde")]
    pub amount: Fixed,
}

impl ResourceCost {
    /// Create a new resource amount.
    #[must_use]
    pub const fn new(resource: ResourceKind, amount: Fixed) -> Self {
        Self { resource, amount }
    }
}

/// Resource stockpile, one slot per [`ResourceKind`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ledger {
    amounts: [Fixed; ResourceKind::COUNT],
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current amount of a resource.
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> Fixed {
        self.amounts[kind.index()]
    }

    /// Add to a resource and return the new total.
    ///
    /// Negative amounts are ignored. Totals saturate at the top of the
    /// fixed-point range.
    pub fn credit(&mut self, kind: ResourceKind, amount: Fixed) -> Fixed {
        let slot = &mut self.amounts[kind.index()];
        if amount > Fixed::ZERO {
            *slot = slot.saturating_add(amount);
        }
        *slot
    }

    /// Spend a resource if enough is stored.
    ///
    /// Returns true if the transaction succeeded.
    pub fn try_debit(&mut self, kind: ResourceKind, amount: Fixed) -> bool {
        if amount < Fixed::ZERO || self.get(kind) < amount {
            return false;
        }
        self.amounts[kind.index()] -= amount;
        true
    }

    /// Check if every cost in a list can be paid together.
    ///
    /// Costs naming the same resource more than once are summed.
    #[must_use]
    pub fn can_afford(&self, costs: &[ResourceCost]) -> bool {
        let mut needed = [Fixed::ZERO; ResourceKind::COUNT];
        for cost in costs {
            if cost.amount < Fixed::ZERO {
                return false;
            }
            let slot = &mut needed[cost.resource.index()];
            *slot = slot.saturating_add(cost.amount);
        }
        ResourceKind::ALL
            .iter()
            .all(|kind| self.get(*kind) >= needed[kind.index()])
    }

    /// Pay a list of costs, all or nothing.
    pub fn try_debit_all(&mut self, costs: &[ResourceCost]) -> bool {
        if !self.can_afford(costs) {
            return false;
        }
        for cost in costs {
            self.amounts[cost.resource.index()] -= cost.amount;
        }
        true
    }

    /// Overwrite a slot during restore, clamping negatives to zero.
    pub(crate) fn set_clamped(&mut self, kind: ResourceKind, amount: Fixed) -> bool {
        let clamped = amount.max(Fixed::ZERO);
        self.amounts[kind.index()] = clamped;
        clamped != amount
    }

    /// Iterate over every resource and its amount, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, Fixed)> + '_ {
        ResourceKind::ALL
            .iter()
            .map(move |kind| (*kind, self.amounts[kind.index()]))
    }
}
