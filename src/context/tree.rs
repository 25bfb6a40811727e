use std::collections::HashMap;

use crate::lock::ResourceName;

pub(crate) type ContextId = usize;

#[derive(Debug)]
pub(crate) struct ContextNode {
    pub name: ResourceName,
    pub parent: Option<ContextId>,
    pub children: HashMap<String, ContextId>,
    pub readonly: bool,
    pub child_locks_disabled: bool,
}

/// Arena holding every context ever created. Nodes are never removed, so a
/// `ContextId` stays valid for the life of the tree.
#[derive(Debug, Default)]
pub(crate) struct ContextTree {
    nodes: Vec<ContextNode>,
    roots: HashMap<String, ContextId>,
}

impl ContextTree {
    pub fn node(&self, id: ContextId) -> &ContextNode {
        &self.nodes[id]
    }

    /// The root called `segment`, inserted if missing. `child_locks_disabled`
    /// only applies when the root is created here.
    pub fn root(&mut self, segment: &str, child_locks_disabled: bool) -> ContextId {
        if let Some(&id) = self.roots.get(segment) {
            return id;
        }
        let id = self.insert(ContextNode {
            name: ResourceName::new(segment),
            parent: None,
            children: HashMap::new(),
            readonly: false,
            child_locks_disabled,
        });
        self.roots.insert(segment.to_string(), id);
        id
    }

    /// The child `segment` of `parent`, inserted if missing. A new child is
    /// readonly when its parent is readonly or has disabled child locks.
    pub fn child(&mut self, parent: ContextId, segment: &str) -> ContextId {
        if let Some(&id) = self.nodes[parent].children.get(segment) {
            return id;
        }
        let parent_node = &self.nodes[parent];
        let node = ContextNode {
            name: parent_node.name.child(segment),
            parent: Some(parent),
            children: HashMap::new(),
            readonly: parent_node.readonly || parent_node.child_locks_disabled,
            child_locks_disabled: false,
        };
        let id = self.insert(node);
        self.nodes[parent].children.insert(segment.to_string(), id);
        id
    }

    pub fn disable_child_locks(&mut self, id: ContextId) {
        self.nodes[id].child_locks_disabled = true;
    }

    /// Look up an existing context by its full name.
    pub fn find(&self, name: &ResourceName) -> Option<ContextId> {
        let mut segments = name.segments().iter();
        let mut id = *self.roots.get(segments.next()?)?;
        for segment in segments {
            id = *self.nodes[id].children.get(segment)?;
        }
        Some(id)
    }

    fn insert(&mut self, node: ContextNode) -> ContextId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}
