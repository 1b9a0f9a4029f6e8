use std::collections::{HashMap, VecDeque};

use super::domain::{EntityId, SpatialEntity};

/// Validation errors raised while building the entity arena.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("duplicate entity id {0}")]
    DuplicateEntity(EntityId),
    #[error("entity {entity} references unknown {role} {reference}")]
    UnknownReference {
        entity: EntityId,
        role: &'static str,
        reference: EntityId,
    },
    #[error("entity {child} lists parent {parent} but is not among its children")]
    InconsistentReference { parent: EntityId, child: EntityId },
    #[error("hierarchy contains a cycle involving {0}")]
    Cycle(EntityId),
}

/// Id-indexed arena over the spatial hierarchy.
///
/// Referential integrity and acyclicity are validated once at construction;
/// the bottom-up topological order is computed here and cached so traversals
/// never re-check the structure.
#[derive(Debug)]
pub struct EntityArena {
    entities: HashMap<EntityId, SpatialEntity>,
    bottom_up: Vec<EntityId>,
}

impl EntityArena {
    pub fn new(records: Vec<SpatialEntity>) -> Result<Self, HierarchyError> {
        let mut entities = HashMap::with_capacity(records.len());
        for entity in records {
            if entities.contains_key(&entity.id) {
                return Err(HierarchyError::DuplicateEntity(entity.id));
            }
            entities.insert(entity.id.clone(), entity);
        }

        validate_references(&entities)?;
        let bottom_up = bottom_up_order(&entities)?;

        Ok(Self {
            entities,
            bottom_up,
        })
    }

    pub fn get(&self, id: &EntityId) -> Option<&SpatialEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn children_of(&self, id: &EntityId) -> Vec<&SpatialEntity> {
        self.entities
            .get(id)
            .map(|entity| {
                entity
                    .child_ids
                    .iter()
                    .filter_map(|child| self.entities.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Cached topological order with every child preceding its parents.
    pub fn bottom_up(&self) -> impl Iterator<Item = &SpatialEntity> {
        self.bottom_up
            .iter()
            .filter_map(|id| self.entities.get(id))
    }

    pub fn leaves(&self) -> Vec<&SpatialEntity> {
        self.bottom_up()
            .filter(|entity| entity.is_leaf())
            .collect()
    }

    pub fn roots(&self) -> Vec<&SpatialEntity> {
        self.bottom_up()
            .filter(|entity| entity.parent_ids.is_empty())
            .collect()
    }
}

fn validate_references(
    entities: &HashMap<EntityId, SpatialEntity>,
) -> Result<(), HierarchyError> {
    for entity in entities.values() {
        for child in &entity.child_ids {
            let resolved =
                entities
                    .get(child)
                    .ok_or_else(|| HierarchyError::UnknownReference {
                        entity: entity.id.clone(),
                        role: "child",
                        reference: child.clone(),
                    })?;
            if !resolved.parent_ids.contains(&entity.id) {
                return Err(HierarchyError::InconsistentReference {
                    parent: entity.id.clone(),
                    child: child.clone(),
                });
            }
        }
        for parent in &entity.parent_ids {
            let resolved =
                entities
                    .get(parent)
                    .ok_or_else(|| HierarchyError::UnknownReference {
                        entity: entity.id.clone(),
                        role: "parent",
                        reference: parent.clone(),
                    })?;
            if !resolved.child_ids.contains(&entity.id) {
                return Err(HierarchyError::InconsistentReference {
                    parent: parent.clone(),
                    child: entity.id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over child → parent edges; leaves drain first.
fn bottom_up_order(
    entities: &HashMap<EntityId, SpatialEntity>,
) -> Result<Vec<EntityId>, HierarchyError> {
    let mut pending_children: HashMap<&EntityId, usize> = entities
        .values()
        .map(|entity| (&entity.id, entity.child_ids.len()))
        .collect();

    let mut queue: VecDeque<&EntityId> = pending_children
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(entities.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        let entity = &entities[id];
        for parent in &entity.parent_ids {
            if let Some(count) = pending_children.get_mut(parent) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(parent);
                }
            }
        }
    }

    if order.len() != entities.len() {
        let stuck = pending_children
            .into_iter()
            .find(|(_, count)| *count > 0)
            .map(|(id, _)| id.clone());
        return Err(HierarchyError::Cycle(
            stuck.unwrap_or_else(|| EntityId::new("unknown")),
        ));
    }

    Ok(order)
}
