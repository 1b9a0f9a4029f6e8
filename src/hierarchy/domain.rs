use serde::{Deserialize, Serialize};

/// Identifier wrapper for spatial entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Portfolio,
    Building,
    Floor,
    Room,
    Zone,
}

impl EntityKind {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Portfolio,
            Self::Building,
            Self::Floor,
            Self::Room,
            Self::Zone,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Portfolio => "Portfolio",
            Self::Building => "Building",
            Self::Floor => "Floor",
            Self::Room => "Room",
            Self::Zone => "Zone",
        }
    }
}

/// Context attributes used for rule applicability matching and weighting.
/// Absent attributes never satisfy a filter and weight as 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityContext {
    pub country: Option<String>,
    pub region: Option<String>,
    pub continent: Option<String>,
    pub climate_zone: Option<String>,
    pub building_type: Option<String>,
    pub room_type: Option<String>,
    pub ventilation_type: Option<String>,
    pub season: Option<String>,
    pub area_m2: Option<f64>,
    pub volume_m3: Option<f64>,
    pub design_occupancy: Option<f64>,
}

/// Node of the spatial hierarchy, produced by ingestion and read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub parent_ids: Vec<EntityId>,
    #[serde(default)]
    pub child_ids: Vec<EntityId>,
    #[serde(default)]
    pub context: EntityContext,
}

impl SpatialEntity {
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}
