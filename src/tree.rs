//! Hierarchical item tree with per-node active child and scroll offset.
//!
//! Nodes live in an arena and are addressed by generational [`NodeId`]s.
//! Each parent owns an ordered list of child ids; the child keeps a plain
//! id back to its parent. Out-of-range indices are clamped everywhere.

use std::fmt;

use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} no longer exists")]
    StaleNode(NodeId),

    #[error("node {0} already has a parent")]
    AlreadyAttached(NodeId),

    #[error("node {0} would become its own ancestor")]
    Cycle(NodeId),

    #[error("node {0} is the root")]
    Root(NodeId),
}

/// A child addressed either by id or by (signed, clamped) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRef {
    Node(NodeId),
    Index(i64),
}

impl From<NodeId> for ChildRef {
    fn from(id: NodeId) -> Self {
        ChildRef::Node(id)
    }
}

impl From<usize> for ChildRef {
    fn from(idx: usize) -> Self {
        ChildRef::Index(i64::try_from(idx).unwrap_or(i64::MAX))
    }
}

#[derive(Debug)]
struct Node<T> {
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    active_idx: usize,
    scroll_pos_y: usize,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

#[derive(Debug)]
pub struct Tree<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    root: NodeId,
}

/// Clamp a signed index into `[0, len - 1]`; 0 for an empty list.
fn clamp_index(idx: i64, len: usize) -> usize {
    usize::try_from(idx.max(0))
        .unwrap_or(usize::MAX)
        .min(len.saturating_sub(1))
}

impl<T> Tree<T> {
    pub fn new(root: T) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.create(root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached node.
    pub fn create(&mut self, data: T) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
            active_idx: 0,
            scroll_pos_y: 0,
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node<T>, TreeError> {
        self.slots
            .get(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
            .ok_or(TreeError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<T>, TreeError> {
        self.slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or(TreeError::StaleNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.node(id).ok().map(|n| &n.data)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id).ok().map(|n| &mut n.data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok()?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.children(id).is_empty()
    }

    /// Child at `idx`, clamped into range.
    pub fn child(&self, id: NodeId, idx: i64) -> Option<NodeId> {
        let children = self.children(id);
        children.get(clamp_index(idx, children.len())).copied()
    }

    /// Children in the inclusive window `(start, end)`, clamped to the list.
    pub fn visible_children(&self, id: NodeId, (start, end): (usize, usize)) -> &[NodeId] {
        let children = self.children(id);
        let end = end.saturating_add(1).min(children.len());
        &children[start.min(end)..end]
    }

    /// Parent chain from the immediate parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    pub fn scroll_pos_y(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, |n| n.scroll_pos_y)
    }

    pub fn set_scroll_pos_y(&mut self, id: NodeId, y: usize) -> Result<(), TreeError> {
        self.node_mut(id)?.scroll_pos_y = y;
        Ok(())
    }

    fn resolve(&self, parent: NodeId, which: ChildRef) -> Result<Option<usize>, TreeError> {
        let node = self.node(parent)?;
        Ok(match which {
            ChildRef::Node(child) => node.children.iter().position(|&c| c == child),
            ChildRef::Index(_) if node.children.is_empty() => None,
            ChildRef::Index(idx) => Some(clamp_index(idx, node.children.len())),
        })
    }

    /// A detached, non-root node that is not `parent` or one of its ancestors.
    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.node(parent)?;
        let node = self.node(child)?;
        if child == self.root {
            return Err(TreeError::Root(child));
        }
        if node.parent.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(TreeError::Cycle(child));
        }
        Ok(())
    }

    /// Insert `child` at `at` (clamped; `None` appends).
    pub fn add_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        at: Option<usize>,
    ) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        self.node_mut(child)?.parent = Some(parent);
        let node = self.node_mut(parent)?;
        let at = at.map_or(node.children.len(), |i| i.min(node.children.len()));
        node.children.insert(at, child);
        Ok(())
    }

    /// Detach a child, keeping it alive. Returns `None` when `which` is not a
    /// child of `parent`.
    pub fn remove_child(
        &mut self,
        parent: NodeId,
        which: impl Into<ChildRef>,
    ) -> Result<Option<NodeId>, TreeError> {
        let Some(idx) = self.resolve(parent, which.into())? else {
            return Ok(None);
        };
        let node = self.node_mut(parent)?;
        let removed = node.children.remove(idx);
        self.update(parent);
        self.node_mut(removed)?.parent = None;
        Ok(Some(removed))
    }

    /// Swap a child for the detached node `new`. Returns the old child.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        which: impl Into<ChildRef>,
        new: NodeId,
    ) -> Result<Option<NodeId>, TreeError> {
        let Some(idx) = self.resolve(parent, which.into())? else {
            return Ok(None);
        };
        self.check_attachable(parent, new)?;
        let node = self.node_mut(parent)?;
        let old = std::mem::replace(&mut node.children[idx], new);
        self.node_mut(old)?.parent = None;
        self.node_mut(new)?.parent = Some(parent);
        Ok(Some(old))
    }

    pub fn active_index(&self, id: NodeId) -> Option<usize> {
        self.node(id).ok().map(|n| n.active_idx)
    }

    pub fn active_child(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id).ok()?;
        node.children.get(node.active_idx).copied()
    }

    /// Point the active index at `which`, clamped. Returns whether it moved.
    pub fn set_active_child(
        &mut self,
        id: NodeId,
        which: impl Into<ChildRef>,
    ) -> Result<bool, TreeError> {
        let Some(idx) = self.resolve(id, which.into())? else {
            return Ok(false);
        };
        let node = self.node_mut(id)?;
        if node.active_idx == idx {
            return Ok(false);
        }
        node.active_idx = idx;
        Ok(true)
    }

    /// Re-clamp the active index after the children changed. Returns whether
    /// the index had to move.
    pub fn update(&mut self, id: NodeId) -> bool {
        let Ok(node) = self.node_mut(id) else {
            return false;
        };
        let clamped = node.active_idx.min(node.children.len().saturating_sub(1));
        let moved = clamped != node.active_idx;
        node.active_idx = clamped;
        moved
    }

    /// Remove `id` from its parent and free its whole subtree. Returns the
    /// number of nodes freed; ids into the subtree become stale.
    pub fn destroy(&mut self, id: NodeId) -> Result<usize, TreeError> {
        if id == self.root {
            return Err(TreeError::Root(id));
        }
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }

        let mut pending = vec![id];
        let mut freed = 0;
        while let Some(next) = pending.pop() {
            let slot = &mut self.slots[next.index];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                pending.extend(node.children);
                freed += 1;
            }
        }
        debug!("tree: destroyed {id} ({freed} nodes)");
        Ok(freed)
    }
}
