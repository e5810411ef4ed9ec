//! Parent graph used for kinship checks and lineage traversal.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::components::{AgentId, LineageComponent};
use crate::store::EntityStore;

/// Child -> parents adjacency, built from the lineage components.
#[derive(Debug, Clone, Default)]
pub struct Pedigree {
    parents: HashMap<AgentId, Vec<AgentId>>,
}

impl Pedigree {
    pub fn from_store(store: &EntityStore) -> Self {
        let parents = store
            .raw()
            .query::<(&AgentId, &LineageComponent)>()
            .iter()
            .filter(|(_, (_, lineage))| !lineage.parents.is_empty())
            .map(|(_, (id, lineage))| (*id, lineage.parents.clone()))
            .collect();
        Self { parents }
    }

    pub fn insert(&mut self, child: AgentId, parents: Vec<AgentId>) {
        self.parents.insert(child, parents);
    }

    pub fn parents(&self, id: AgentId) -> &[AgentId] {
        self.parents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestors within `depth` generations with their nearest distance.
    /// The agent itself is included at distance 0.
    pub fn ancestors(&self, id: AgentId, depth: u32) -> BTreeMap<AgentId, u32> {
        let mut seen = BTreeMap::new();
        let mut queue = VecDeque::from([(id, 0u32)]);
        while let Some((current, dist)) = queue.pop_front() {
            if seen.contains_key(&current) {
                continue;
            }
            seen.insert(current, dist);
            if dist < depth {
                for parent in self.parents(current) {
                    queue.push_back((*parent, dist + 1));
                }
            }
        }
        seen
    }

    /// Generation distance to the nearest common ancestor.
    ///
    /// For a shared ancestor C this is `max(dist(a, C), dist(b, C))`, so
    /// siblings and parent/child pairs sit at 1 and first cousins at 2.
    /// `None` when no common ancestor exists within `depth`.
    pub fn kinship_distance(&self, a: AgentId, b: AgentId, depth: u32) -> Option<u32> {
        if a == b {
            return Some(0);
        }
        let from_a = self.ancestors(a, depth);
        let from_b = self.ancestors(b, depth);
        from_a
            .iter()
            .filter_map(|(ancestor, da)| from_b.get(ancestor).map(|db| (*da).max(*db)))
            .min()
    }
}
