use crate::collision::FeatureKey;
use std::collections::HashMap;

/// Collision scope of one source. Unscoped groups collide with everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionGroup {
    pub id: u16,
    scoped: bool,
}

impl CollisionGroup {
    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    /// Whether an already placed feature takes part in collisions with this group.
    pub fn accepts(&self, key: &FeatureKey) -> bool {
        !self.scoped || key.collision_group_id == self.id
    }
}

/// Hands out collision groups per source id. With cross-source collisions every source
/// shares group 0; otherwise each source collides only with itself.
#[derive(Debug, Clone)]
pub struct CollisionGroups {
    cross_source_collisions: bool,
    max_group_id: u16,
    groups: HashMap<String, CollisionGroup>,
}

impl CollisionGroups {
    pub fn new(cross_source_collisions: bool) -> Self {
        Self {
            cross_source_collisions,
            max_group_id: 0,
            groups: HashMap::new(),
        }
    }

    pub fn get(&mut self, source_id: &str) -> CollisionGroup {
        if self.cross_source_collisions {
            return CollisionGroup { id: 0, scoped: false };
        }
        if let Some(group) = self.groups.get(source_id) {
            return *group;
        }
        self.max_group_id += 1;
        let group = CollisionGroup {
            id: self.max_group_id,
            scoped: true,
        };
        self.groups.insert(source_id.to_string(), group);
        group
    }
}
