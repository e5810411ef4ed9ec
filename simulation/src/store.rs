//! Entity Store
//!
//! Owns entity identities and component storage. Components live in a
//! `hecs::World` (archetype tables per component set); an ordered index maps
//! the stable [`AgentId`] onto the world's internal entity handle so every
//! iteration the systems perform is in id order.

use hecs::{Component, ComponentError, Entity, Ref, RefMut, World};
use std::collections::BTreeMap;

use crate::components::AgentId;
use crate::error::{Result, SimError};

pub struct EntityStore {
    world: World,
    index: BTreeMap<AgentId, Entity>,
    /// Next id to try. `None` once the counter has passed `u64::MAX`.
    next_id: Option<u64>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            index: BTreeMap::new(),
            next_id: Some(1),
        }
    }

    /// Create an entity with the next free id.
    pub fn create(&mut self) -> AgentId {
        let id = self.allocate();
        self.spawn(id);
        id
    }

    fn allocate(&mut self) -> AgentId {
        while let Some(next) = self.next_id {
            self.next_id = next.checked_add(1);
            if !self.index.contains_key(&AgentId(next)) {
                return AgentId(next);
            }
        }
        // Counter exhausted: fall back to the lowest free id.
        (1..=u64::MAX)
            .map(AgentId)
            .find(|id| !self.index.contains_key(id))
            .unwrap_or(AgentId(0))
    }

    fn advance_past(&mut self, id: u64) {
        self.next_id = match (self.next_id, id.checked_add(1)) {
            (Some(current), Some(after)) => Some(current.max(after)),
            _ => None,
        };
    }

    /// Create an entity under an explicit id.
    pub fn create_with_id(&mut self, id: AgentId) -> Result<AgentId> {
        if self.index.contains_key(&id) {
            return Err(SimError::DuplicateEntity(id));
        }
        self.advance_past(id.0);
        self.spawn(id);
        Ok(id)
    }

    fn spawn(&mut self, id: AgentId) {
        // The id rides along as a component so queries can report it.
        let entity = self.world.spawn((id,));
        self.index.insert(id, entity);
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.index.keys().copied()
    }

    pub fn next_id(&self) -> Option<u64> {
        self.next_id
    }

    /// Never moves the counter backwards.
    pub(crate) fn set_next_id(&mut self, next_id: Option<u64>) {
        match next_id {
            Some(next) if next > 0 => self.advance_past(next - 1),
            Some(_) => {}
            None => self.next_id = None,
        }
    }

    fn entity(&self, id: AgentId) -> Result<Entity> {
        self.index.get(&id).copied().ok_or(SimError::NotFound(id))
    }

    /// Attach a component, replacing any existing one of the same type.
    pub fn insert<C: Component>(&mut self, id: AgentId, component: C) -> Result<()> {
        let entity = self.entity(id)?;
        self.world
            .insert_one(entity, component)
            .map_err(|_| SimError::NotFound(id))
    }

    /// Detach a component. `Ok(None)` when the entity never had one.
    pub fn remove<C: Component>(&mut self, id: AgentId) -> Result<Option<C>> {
        let entity = self.entity(id)?;
        match self.world.remove_one::<C>(entity) {
            Ok(component) => Ok(Some(component)),
            Err(ComponentError::MissingComponent(_)) => Ok(None),
            Err(_) => Err(SimError::NotFound(id)),
        }
    }

    /// Borrow a component. `Ok(None)` means the entity exists without it.
    pub fn get<C: Component>(&self, id: AgentId) -> Result<Option<Ref<'_, C>>> {
        let entity = self.entity(id)?;
        match self.world.get::<&C>(entity) {
            Ok(component) => Ok(Some(component)),
            Err(ComponentError::MissingComponent(_)) => Ok(None),
            Err(_) => Err(SimError::NotFound(id)),
        }
    }

    pub fn get_mut<C: Component>(&self, id: AgentId) -> Result<Option<RefMut<'_, C>>> {
        let entity = self.entity(id)?;
        match self.world.get::<&mut C>(entity) {
            Ok(component) => Ok(Some(component)),
            Err(ComponentError::MissingComponent(_)) => Ok(None),
            Err(_) => Err(SimError::NotFound(id)),
        }
    }

    /// Clone a component out of the store.
    pub fn cloned<C: Component + Clone>(&self, id: AgentId) -> Result<Option<C>> {
        Ok(self.get::<C>(id)?.map(|c| (*c).clone()))
    }

    /// Ids of entities carrying `C` that satisfy `predicate`, ascending.
    pub fn select<C: Component>(&self, mut predicate: impl FnMut(&C) -> bool) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .world
            .query::<(&AgentId, &C)>()
            .iter()
            .filter_map(|(_, (id, c))| predicate(c).then_some(*id))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of entities carrying both `A` and `B` that satisfy `predicate`, ascending.
    pub fn select_pair<A: Component, B: Component>(
        &self,
        mut predicate: impl FnMut(&A, &B) -> bool,
    ) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .world
            .query::<(&AgentId, &A, &B)>()
            .iter()
            .filter_map(|(_, (id, a, b))| predicate(a, b).then_some(*id))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn raw(&self) -> &World {
        &self.world
    }

    pub(crate) fn raw_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{LifeStage, LifecycleComponent, ReproductionComponent};

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = EntityStore::new();
        store.create_with_id(AgentId(5)).unwrap();
        assert!(matches!(
            store.create_with_id(AgentId(5)),
            Err(SimError::DuplicateEntity(AgentId(5)))
        ));
        // Allocator skips past explicit ids
        assert_eq!(store.create(), AgentId(6));
    }

    #[test]
    fn test_max_id_exhausts_counter_without_overflow() {
        let mut store = EntityStore::new();
        store.create_with_id(AgentId(u64::MAX)).unwrap();
        assert_eq!(store.next_id(), None);
        assert_eq!(store.create(), AgentId(1));
        assert_eq!(store.create(), AgentId(2));
        assert!(matches!(
            store.create_with_id(AgentId(u64::MAX)),
            Err(SimError::DuplicateEntity(_))
        ));

        let mut restored = EntityStore::new();
        restored.set_next_id(store.next_id());
        assert_eq!(restored.next_id(), None);
    }

    #[test]
    fn test_absent_component_is_explicit() {
        let mut store = EntityStore::new();
        let id = store.create();
        assert!(store.get::<LifecycleComponent>(id).unwrap().is_none());
        assert!(matches!(
            store.get::<LifecycleComponent>(AgentId(99)),
            Err(SimError::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_replace_remove() {
        let mut store = EntityStore::new();
        let id = store.create();
        store.insert(id, LifecycleComponent::newborn()).unwrap();
        store
            .insert(id, LifecycleComponent::with_stage(20.0, LifeStage::Adult))
            .unwrap();
        assert_eq!(store.get::<LifecycleComponent>(id).unwrap().unwrap().stage, LifeStage::Adult);

        let removed = store.remove::<LifecycleComponent>(id).unwrap();
        assert!(removed.is_some());
        assert!(store.remove::<LifecycleComponent>(id).unwrap().is_none());
    }

    #[test]
    fn test_select_pair_predicate() {
        let mut store = EntityStore::new();
        for (stage, eligible) in [
            (LifeStage::Adult, true),
            (LifeStage::Adult, false),
            (LifeStage::Infant, true),
            (LifeStage::Adult, true),
        ] {
            let id = store.create();
            store.insert(id, LifecycleComponent::with_stage(0.0, stage)).unwrap();
            store
                .insert(id, ReproductionComponent { eligible, ..Default::default() })
                .unwrap();
        }
        let ids = store.select_pair::<LifecycleComponent, ReproductionComponent>(|l, r| {
            l.stage == LifeStage::Adult && r.eligible
        });
        assert_eq!(ids, vec![AgentId(1), AgentId(4)]);
    }
}
