//! Live entities as last reported by the server

use std::collections::HashMap;

use serde::Serialize;

use crate::util::torus::Point;
use crate::ws::protocol::EntityPatch;

use super::snapshot::Snapshot;

/// Server-reported state of one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entity {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Smoothed, latency-compensated state for rendering. Only ever set on
    /// the local entity.
    pub corrected: Option<Snapshot>,
}

impl Entity {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Merge reported fields, leaving absent ones alone
    pub fn apply(&mut self, patch: &EntityPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(vx) = patch.vx {
            self.vx = vx;
        }
        if let Some(vy) = patch.vy {
            self.vy = vy;
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityTable {
    entities: HashMap<String, Entity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Apply one update entry; `None` removes the entity
    pub fn update(&mut self, id: &str, patch: Option<&EntityPatch>) {
        match patch {
            Some(patch) => self.entities.entry(id.to_string()).or_default().apply(patch),
            None => {
                self.entities.remove(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
