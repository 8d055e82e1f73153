//! Explicit name → slot map shared by every task of one
//! [`ComponentManager`](crate::ComponentManager).

use crate::error::ComponentError;
use crate::slot::ComponentSlot;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct ComponentRegistry {
    slots: Vec<ComponentSlot>,
    index: HashMap<String, usize>,
}

impl ComponentRegistry {
    /// Creates one empty slot per name, keeping the given order.
    pub fn new<I, S>(names: I) -> Result<Self, ComponentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots = Vec::new();
        let mut index = HashMap::new();
        for name in names {
            let name = name.into();
            if index.contains_key(&name) {
                return Err(ComponentError::DuplicateComponent(name));
            }
            index.insert(name.clone(), slots.len());
            slots.push(ComponentSlot::new(name));
        }
        Ok(Self { slots, index })
    }

    pub fn slot(&self, name: &str) -> Option<&ComponentSlot> {
        self.index.get(name).map(|&i| &self.slots[i])
    }

    pub fn slots(&self) -> &[ComponentSlot] {
        &self.slots
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(ComponentSlot::name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Flags every slot as cancelled and fires `on_loading_cancelled` for every
    /// instance already installed.
    pub fn cancel_components_load(&self) {
        for slot in &self.slots {
            slot.notify_loading_cancelled();
        }
    }

    pub fn set_stage_switching_cancelled(&self, cancelled: bool) {
        for slot in &self.slots {
            slot.set_stage_switching_cancelled(cancelled);
        }
    }

    /// Every recorded `"a" -> "b"` edge, one slot per line.
    pub fn dependency_graph(&self) -> String {
        let mut graph = String::new();
        for slot in &self.slots {
            let edges = slot.render_dependencies();
            if !edges.is_empty() {
                graph.push_str(&edges);
                graph.push('\n');
            }
        }
        graph
    }

    /// A chain of "depends on" edges leading from `from` to `to`, both included.
    pub fn find_dependency_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = vec![from.to_string()];
        if self.extend_path(to, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }

    fn extend_path(&self, to: &str, path: &mut Vec<String>, visited: &mut HashSet<String>) -> bool {
        let Some(current) = path.last().cloned() else {
            return false;
        };
        if current == to {
            return true;
        }
        if !visited.insert(current.clone()) {
            return false;
        }
        let Some(slot) = self.slot(&current) else {
            return false;
        };
        for next in slot.dependencies() {
            path.push(next);
            if self.extend_path(to, path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }
}
