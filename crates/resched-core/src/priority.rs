//! Execution ordering for modules.
//!
//! Modules run tier-ascending. Within a tier, supplier-only modules run
//! before normal ones so that producers have filled the pool before anyone
//! draws from it.

use serde::{Deserialize, Serialize};

/// Bit marking a packed priority as supplier-only.
pub const SUPPLIER_ONLY_FLAG: u8 = 0x80;

// ---------------------------------------------------------------------------
// PriorityTier
// ---------------------------------------------------------------------------

/// One of the five execution tiers. `First` runs first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum PriorityTier {
    #[default]
    First = 1,
    Second = 2,
    Third = 3,
    Fourth = 4,
    Fifth = 5,
}

impl PriorityTier {
    /// Numeric tier value, 1..=5.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Build a tier from its numeric value, clamping into 1..=5.
    pub fn from_value(value: u8) -> PriorityTier {
        match value {
            0 | 1 => PriorityTier::First,
            2 => PriorityTier::Second,
            3 => PriorityTier::Third,
            4 => PriorityTier::Fourth,
            _ => PriorityTier::Fifth,
        }
    }
}

// ---------------------------------------------------------------------------
// ResourcePriority
// ---------------------------------------------------------------------------

/// A tier plus the orthogonal supplier-only flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourcePriority {
    pub tier: PriorityTier,
    pub supplier_only: bool,
}

impl ResourcePriority {
    /// A normal module in the given tier.
    pub fn new(tier: PriorityTier) -> Self {
        Self {
            tier,
            supplier_only: false,
        }
    }

    /// A supplier-only module in the given tier.
    pub fn supplier(tier: PriorityTier) -> Self {
        Self {
            tier,
            supplier_only: true,
        }
    }

    /// Decode a packed priority: low bits are the tier, `0x80` marks
    /// supplier-only.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            tier: PriorityTier::from_value(bits & !SUPPLIER_ONLY_FLAG),
            supplier_only: bits & SUPPLIER_ONLY_FLAG == SUPPLIER_ONLY_FLAG,
        }
    }

    /// Encode into the packed form accepted by [`from_bits`](Self::from_bits).
    pub fn to_bits(self) -> u8 {
        let flag = if self.supplier_only {
            SUPPLIER_ONLY_FLAG
        } else {
            0
        };
        self.tier.value() | flag
    }

    /// Ordering key: tier ascending, supplier-only first within a tier.
    pub fn sort_key(self) -> (PriorityTier, bool) {
        (self.tier, !self.supplier_only)
    }
}
