//! Locations: the manufacturing site, hubs, breadrooms, and storage depots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The synthetic node production lands in and trucks load from (§3, §9).
///
/// Decouples "what was produced today" from "what a morning truck can load
/// tomorrow" — see [`crate::network::NetworkGraph`] for how real
/// manufacturing-origin legs get rewritten to originate here.
pub const STORAGE_NODE_ID: &str = "6122_Storage";

/// A location identifier. Locations are referenced by a stable string id
/// (matching how breadrooms, hubs and the manufacturing site are named in
/// the source data), not by a dense integer index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        LocationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The synthetic manufacturing-storage node.
    pub fn storage_node() -> Self {
        LocationId(STORAGE_NODE_ID.to_string())
    }

    pub fn is_storage_node(&self) -> bool {
        self.0 == STORAGE_NODE_ID
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LocationId {
    fn from(s: &str) -> Self {
        LocationId::new(s)
    }
}

impl From<String> for LocationId {
    fn from(s: String) -> Self {
        LocationId::new(s)
    }
}

/// Role a location plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Manufacturing,
    Hub,
    Breadroom,
    Storage,
}

/// What a location is physically able to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    FrozenOnly,
    AmbientOnly,
    Both,
}

impl StorageMode {
    pub fn supports_frozen(self) -> bool {
        matches!(self, StorageMode::FrozenOnly | StorageMode::Both)
    }

    pub fn supports_ambient(self) -> bool {
        matches!(self, StorageMode::AmbientOnly | StorageMode::Both)
    }
}

/// A location in the distribution network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub location_type: LocationType,
    pub storage_mode: StorageMode,
    /// Optional storage/throughput cap in units; `None` means unconstrained.
    pub capacity_units: Option<f64>,
}

impl Location {
    pub fn new(
        id: impl Into<LocationId>,
        name: impl Into<String>,
        location_type: LocationType,
        storage_mode: StorageMode,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location_type,
            storage_mode,
            capacity_units: None,
        }
    }

    pub fn with_capacity(mut self, capacity_units: f64) -> Self {
        self.capacity_units = Some(capacity_units);
        self
    }

    /// The synthetic manufacturing-storage node: ambient-capable, unbounded.
    pub fn storage_node() -> Self {
        Self::new(
            LocationId::storage_node(),
            "Manufacturing Storage",
            LocationType::Storage,
            StorageMode::Both,
        )
    }

    pub fn is_frozen_storage(&self) -> bool {
        self.storage_mode == StorageMode::FrozenOnly && self.location_type == LocationType::Storage
    }

    pub fn is_ambient_only_breadroom(&self) -> bool {
        self.location_type == LocationType::Breadroom && self.storage_mode == StorageMode::AmbientOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_node_id_is_well_known() {
        assert!(LocationId::storage_node().is_storage_node());
        assert_eq!(LocationId::storage_node().as_str(), STORAGE_NODE_ID);
    }

    #[test]
    fn storage_mode_capability_queries() {
        assert!(StorageMode::Both.supports_frozen());
        assert!(StorageMode::Both.supports_ambient());
        assert!(!StorageMode::FrozenOnly.supports_ambient());
        assert!(!StorageMode::AmbientOnly.supports_frozen());
    }

    #[test]
    fn frozen_storage_and_ambient_breadroom_classification() {
        let depot = Location::new(
            "FROZEN_DEPOT",
            "Frozen Depot",
            LocationType::Storage,
            StorageMode::FrozenOnly,
        );
        assert!(depot.is_frozen_storage());
        assert!(!depot.is_ambient_only_breadroom());

        let wa = Location::new("WA_BR", "WA Breadroom", LocationType::Breadroom, StorageMode::AmbientOnly);
        assert!(wa.is_ambient_only_breadroom());
        assert!(!wa.is_frozen_storage());
    }
}
