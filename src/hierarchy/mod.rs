mod arena;
mod domain;

pub use arena::{EntityArena, HierarchyError};
pub use domain::{EntityContext, EntityId, EntityKind, SpatialEntity};
