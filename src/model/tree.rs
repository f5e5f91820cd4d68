//! The power tree arena
//!
//! Components live in a flat id-indexed arena; sources are roots and
//! switches hold ordered lists of child ids. Insertion is the only way to
//! grow the tree and every insert is checked, so a constructed tree is
//! always acyclic with consistent parent links.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::error::ModelError;
use crate::core::trace::{NoopTrace, TraceSink};
use crate::model::component::{Component, Element};
use crate::model::source::Source;

/// Arena of sources, switches, and loads keyed by component id
#[derive(Clone)]
pub struct PowerTree {
    components: BTreeMap<u32, Component>,
    parents: BTreeMap<u32, u32>,
    sources: Vec<u32>,
    trace: Arc<dyn TraceSink>,
}

impl PowerTree {
    pub fn new() -> Self {
        Self::with_trace(Arc::new(NoopTrace))
    }

    /// Tree that reports structural changes and completed passes to `trace`
    pub fn with_trace(trace: Arc<dyn TraceSink>) -> Self {
        Self {
            components: BTreeMap::new(),
            parents: BTreeMap::new(),
            sources: Vec::new(),
            trace,
        }
    }

    /// Add a root source.
    ///
    /// Source ids must be unique across the whole tree and sources cannot be
    /// replaced once added.
    pub fn add_source(&mut self, source: Source) -> Result<u32, ModelError> {
        let id = source.id();
        if self.components.contains_key(&id) {
            return Err(ModelError::validation(
                format!("source '{}'", source.name()),
                format!("id {} is already present in the tree", id),
            ));
        }
        self.sources.push(id);
        self.components.insert(id, Component::Source(source));
        if let Some(component) = self.components.get(&id) {
            self.trace.source_added(id, component.name());
        }
        Ok(id)
    }

    /// Add a load or switch under an existing source or switch.
    ///
    /// Re-adding an id under its current parent replaces that entry in place
    /// and discards the old entry's descendants. The same id under a
    /// different parent is rejected, and an id that is an ancestor of the
    /// parent fails with [`ModelError::Cycle`] before anything is modified.
    pub fn add_load(
        &mut self,
        parent_id: u32,
        child: impl Into<Component>,
    ) -> Result<u32, ModelError> {
        let child = child.into();
        let child_id = child.id();

        if child.is_source() {
            return Err(ModelError::validation(
                format!("component '{}'", child.name()),
                "a source can only be added as a root",
            ));
        }
        match self.components.get(&parent_id) {
            None => {
                return Err(ModelError::validation(
                    format!("component '{}'", child.name()),
                    format!("parent id {} does not exist", parent_id),
                ));
            }
            Some(Component::Load(_)) => {
                return Err(ModelError::validation(
                    format!("component '{}'", child.name()),
                    format!("parent {} is a load and cannot feed other components", parent_id),
                ));
            }
            Some(_) => {}
        }
        if child_id == parent_id || self.is_ancestor(child_id, parent_id) {
            return Err(ModelError::Cycle { child_id, parent_id });
        }

        if self.components.contains_key(&child_id) {
            if self.parents.get(&child_id) == Some(&parent_id) {
                // Same-parent overwrite keeps the child's slot in the
                // parent's ordering but drops the old subtree.
                self.remove_descendants(child_id);
                self.components.insert(child_id, child);
            } else {
                return Err(ModelError::validation(
                    format!("component id {}", child_id),
                    "already present elsewhere in the tree",
                ));
            }
        } else {
            self.components.insert(child_id, child);
            self.parents.insert(child_id, parent_id);
            if let Some(list) = self.child_list_mut(parent_id) {
                list.push(child_id);
            }
        }
        if let Some(component) = self.components.get(&child_id) {
            self.trace.load_added(parent_id, child_id, component.name());
        }
        Ok(child_id)
    }

    /// Whether `candidate` appears on the parent chain above `node`
    fn is_ancestor(&self, candidate: u32, node: u32) -> bool {
        let mut current = node;
        while let Some(&parent) = self.parents.get(&current) {
            if parent == candidate {
                return true;
            }
            current = parent;
        }
        false
    }

    fn remove_descendants(&mut self, id: u32) {
        let mut stack = match self.components.get(&id) {
            Some(component) => child_ids(component),
            None => return,
        };
        while let Some(next) = stack.pop() {
            if let Some(component) = self.components.remove(&next) {
                stack.extend(child_ids(&component));
            }
            self.parents.remove(&next);
        }
    }

    fn child_list_mut(&mut self, id: u32) -> Option<&mut Vec<u32>> {
        match self.components.get_mut(&id) {
            Some(Component::Switch(switch)) => Some(switch.children_mut()),
            Some(Component::Source(source)) => Some(source.loads_mut()),
            _ => None,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn source(&self, id: u32) -> Option<&Source> {
        self.components.get(&id).and_then(Component::as_source)
    }

    /// Root source ids in insertion order
    pub fn source_ids(&self) -> &[u32] {
        &self.sources
    }

    pub fn parent_of(&self, id: u32) -> Option<u32> {
        self.parents.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn trace(&self) -> &dyn TraceSink {
        self.trace.as_ref()
    }
}

impl Default for PowerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PowerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerTree")
            .field("components", &self.components)
            .field("parents", &self.parents)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

fn child_ids(component: &Component) -> Vec<u32> {
    match component {
        Component::Switch(switch) => switch.children().to_vec(),
        Component::Source(source) => source.loads().to_vec(),
        Component::Load(_) => Vec::new(),
    }
}
