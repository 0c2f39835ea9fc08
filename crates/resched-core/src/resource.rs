//! The closed set of resource kinds the scheduler understands.
//!
//! Every pool, consume, produce, gather and disperse operation validates its
//! resource against [`ResourceName`]. Storage names that do not map to a
//! recognised kind parse to [`ResourceName::Unknown`] and are rejected rather
//! than stored under a free-form key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// A recognised resource kind, plus the `Unknown` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceName {
    ElectricCharge,
    WasteHeat,
    ThermalPower,
    ChargedParticle,
    LiquidFuel,
    Oxidizer,
    MonoPropellant,
    XenonGas,
    IntakeAir,
    LqdHydrogen,
    LqdHelium,
    LqdDeuterium,
    Plutonium238,
    EnrichedUranium,
    DepletedFuel,
    Actinides,
    Unknown,
}

impl ResourceName {
    /// Every recognised kind, in declaration order. Excludes `Unknown`.
    pub const ALL: [ResourceName; 16] = [
        ResourceName::ElectricCharge,
        ResourceName::WasteHeat,
        ResourceName::ThermalPower,
        ResourceName::ChargedParticle,
        ResourceName::LiquidFuel,
        ResourceName::Oxidizer,
        ResourceName::MonoPropellant,
        ResourceName::XenonGas,
        ResourceName::IntakeAir,
        ResourceName::LqdHydrogen,
        ResourceName::LqdHelium,
        ResourceName::LqdDeuterium,
        ResourceName::Plutonium238,
        ResourceName::EnrichedUranium,
        ResourceName::DepletedFuel,
        ResourceName::Actinides,
    ];

    /// The name this resource is stored under by the host.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceName::ElectricCharge => "ElectricCharge",
            ResourceName::WasteHeat => "WasteHeat",
            ResourceName::ThermalPower => "ThermalPower",
            ResourceName::ChargedParticle => "ChargedParticle",
            ResourceName::LiquidFuel => "LiquidFuel",
            ResourceName::Oxidizer => "Oxidizer",
            ResourceName::MonoPropellant => "MonoPropellant",
            ResourceName::XenonGas => "XenonGas",
            ResourceName::IntakeAir => "IntakeAir",
            ResourceName::LqdHydrogen => "LqdHydrogen",
            ResourceName::LqdHelium => "LqdHelium",
            ResourceName::LqdDeuterium => "LqdDeuterium",
            ResourceName::Plutonium238 => "Plutonium-238",
            ResourceName::EnrichedUranium => "EnrichedUranium",
            ResourceName::DepletedFuel => "DepletedFuel",
            ResourceName::Actinides => "Actinides",
            ResourceName::Unknown => "Unknown",
        }
    }

    /// Map a storage name to a kind. Unrecognised names yield `Unknown`.
    pub fn parse(name: &str) -> ResourceName {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == name)
            .unwrap_or(ResourceName::Unknown)
    }

    /// Returns true for every kind except `Unknown`.
    pub fn is_known(self) -> bool {
        self != ResourceName::Unknown
    }

    /// Reject the `Unknown` sentinel.
    pub fn validate(self) -> Result<ResourceName, ResourceError> {
        if self.is_known() {
            Ok(self)
        } else {
            Err(ResourceError::Unknown(self.as_str().to_string()))
        }
    }

    /// Kinds covered by an "infinite propellant" override.
    pub fn is_propellant(self) -> bool {
        matches!(
            self,
            ResourceName::LiquidFuel
                | ResourceName::Oxidizer
                | ResourceName::MonoPropellant
                | ResourceName::XenonGas
                | ResourceName::IntakeAir
                | ResourceName::LqdHydrogen
        )
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ResourceName::parse(&name))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Validation failures for resource names.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("unknown resource: {0}")]
    Unknown(String),
}
