//! Data nodes and the per-tree arena
//!
//! A data node carries its schema pointer, the usual parent/child links
//! and the circular sibling ring, plus a secondary ring linking instances
//! of the same list or leaf-list schema node so uniqueness checks locate
//! their peers in O(1).

use crate::schema::SnodeId;
use crate::value::{PendingRef, Value};
use crate::xml::{Attr, Element};
use std::sync::Arc;

/// Index of a data node inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DnodeId(pub(crate) usize);

/// Kind-specific payload of a data node
#[derive(Debug, Clone)]
pub enum DnodeKind {
    /// Container instance
    Container,
    /// List instance
    List,
    /// Leaf instance with its lexical and typed value
    Leaf {
        /// Value as written, dictionary interned
        value_str: Arc<str>,
        /// Decoded typed value
        value: Value,
    },
    /// Leaf-list entry with its lexical and typed value
    LeafList {
        /// Value as written, dictionary interned
        value_str: Arc<str>,
        /// Decoded typed value
        value: Value,
    },
    /// Opaque subtree detached from the input document
    Anyxml {
        /// The captured XML subtree
        xml: Box<Element>,
    },
}

/// One data node
#[derive(Debug, Clone)]
pub struct DataNode {
    /// Schema node this instance belongs to
    pub schema: SnodeId,
    /// Parent instance
    pub parent: Option<DnodeId>,
    /// First child
    pub child: Option<DnodeId>,
    /// Next sibling, `None` on the last one
    pub next: Option<DnodeId>,
    /// Previous sibling, the head points at the tail
    pub prev: DnodeId,
    /// Previous instance of the same schema node
    pub inst_prev: Option<DnodeId>,
    /// Next instance of the same schema node
    pub inst_next: Option<DnodeId>,
    /// Attributes carried over from the input element
    pub attrs: Vec<Attr>,
    /// Kind-specific payload
    pub kind: DnodeKind,
    /// Source line of the element
    pub line: u32,
    /// Set while a leafref or instance-identifier await resolution
    pub pending: Option<PendingRef>,
}

impl DataNode {
    /// Lexical value of a leaf or leaf-list node
    pub fn value_str(&self) -> Option<&Arc<str>> {
        match &self.kind {
            DnodeKind::Leaf { value_str, .. } | DnodeKind::LeafList { value_str, .. } => {
                Some(value_str)
            }
            _ => None,
        }
    }

    /// Typed value of a leaf or leaf-list node
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            DnodeKind::Leaf { value, .. } | DnodeKind::LeafList { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// One parsed instance tree
#[derive(Debug, Default)]
pub struct DataTree {
    nodes: Vec<DataNode>,
    /// Head of the top-level sibling ring
    pub(crate) root: Option<DnodeId>,
}

impl DataTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// First top-level node
    pub fn root(&self) -> Option<DnodeId> {
        self.root
    }

    /// Node by id
    pub fn node(&self, id: DnodeId) -> &DataNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: DnodeId) -> &mut DataNode {
        &mut self.nodes[id.0]
    }

    /// Number of allocated nodes, unlinked ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn alloc(&mut self, mut node: DataNode) -> DnodeId {
        let id = DnodeId(self.nodes.len());
        node.prev = id;
        self.nodes.push(node);
        id
    }

    /// Iterate a sibling list from its head
    pub fn siblings(&self, head: Option<DnodeId>) -> DataSiblingIter<'_> {
        DataSiblingIter { tree: self, next: head }
    }

    /// Iterate the children of a node
    pub fn children(&self, id: DnodeId) -> DataSiblingIter<'_> {
        self.siblings(self.node(id).child)
    }

    /// Iterate the whole tree depth-first
    pub fn descendants(&self) -> Vec<DnodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<DnodeId> = self.siblings(self.root).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let children: Vec<DnodeId> = self.children(id).collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Head of the ring that contains `id`
    fn ring_head(&self, id: DnodeId) -> Option<DnodeId> {
        match self.node(id).parent {
            Some(p) => self.node(p).child,
            None => self.root,
        }
    }

    fn set_ring_head(&mut self, parent: Option<DnodeId>, head: Option<DnodeId>) {
        match parent {
            Some(p) => self.node_mut(p).child = head,
            None => self.root = head,
        }
    }

    /// Append a node at the end of its parent's child ring
    pub(crate) fn link_last(&mut self, parent: Option<DnodeId>, node: DnodeId) {
        self.node_mut(node).parent = parent;
        let head = match parent {
            Some(p) => self.node(p).child,
            None => self.root,
        };
        match head {
            None => {
                self.node_mut(node).prev = node;
                self.node_mut(node).next = None;
                self.set_ring_head(parent, Some(node));
            }
            Some(first) => {
                let last = self.node(first).prev;
                self.node_mut(last).next = Some(node);
                self.node_mut(node).prev = last;
                self.node_mut(node).next = None;
                self.node_mut(first).prev = node;
            }
        }
        self.link_instance(node);
    }

    /// Hook the node into the same-schema instance ring
    fn link_instance(&mut self, node: DnodeId) {
        let schema = self.node(node).schema;
        let mut walk = self.node(node).prev;
        while walk != node {
            if self.node(walk).schema == schema {
                self.node_mut(walk).inst_next = Some(node);
                self.node_mut(node).inst_prev = Some(walk);
                return;
            }
            walk = self.node(walk).prev;
        }
    }

    /// Remove a node from its sibling and instance rings
    pub(crate) fn unlink(&mut self, target: DnodeId) {
        let mut head = self.ring_head(target);
        let (prev, next, parent) = {
            let n = self.node(target);
            (n.prev, n.next, n.parent)
        };
        if head == Some(target) {
            head = next;
            if let Some(new_head) = next {
                self.node_mut(new_head).prev = prev;
            }
        } else {
            self.node_mut(prev).next = next;
            match next {
                Some(next) => self.node_mut(next).prev = prev,
                None => {
                    if let Some(first) = head {
                        self.node_mut(first).prev = prev;
                    }
                }
            }
        }
        self.set_ring_head(parent, head);

        let (inst_prev, inst_next) = {
            let n = self.node(target);
            (n.inst_prev, n.inst_next)
        };
        if let Some(p) = inst_prev {
            self.node_mut(p).inst_next = inst_next;
        }
        if let Some(n) = inst_next {
            self.node_mut(n).inst_prev = inst_prev;
        }

        let n = self.node_mut(target);
        n.parent = None;
        n.next = None;
        n.prev = target;
        n.inst_prev = None;
        n.inst_next = None;
    }

    /// Move `node` to the front of its sibling ring
    pub(crate) fn move_first(&mut self, node: DnodeId) {
        let parent = self.node(node).parent;
        self.unlink(node);
        self.node_mut(node).parent = parent;
        let head = match parent {
            Some(p) => self.node(p).child,
            None => self.root,
        };
        match head {
            None => {
                self.node_mut(node).prev = node;
                self.set_ring_head(parent, Some(node));
            }
            Some(first) => {
                let last = self.node(first).prev;
                self.node_mut(node).next = Some(first);
                self.node_mut(node).prev = last;
                self.node_mut(first).prev = node;
                self.set_ring_head(parent, Some(node));
            }
        }
        self.relink_instances(parent);
    }

    /// Move `node` right before or after `anchor` in the sibling ring
    pub(crate) fn move_relative(&mut self, node: DnodeId, anchor: DnodeId, before: bool) {
        let parent = self.node(anchor).parent;
        self.unlink(node);
        self.node_mut(node).parent = parent;
        let head = match parent {
            Some(p) => self.node(p).child,
            None => self.root,
        };
        let first = head.expect("anchor must be linked");
        if before {
            let prev = self.node(anchor).prev;
            self.node_mut(node).next = Some(anchor);
            self.node_mut(node).prev = prev;
            if first == anchor {
                self.set_ring_head(parent, Some(node));
            } else {
                self.node_mut(prev).next = Some(node);
            }
            self.node_mut(anchor).prev = node;
        } else {
            let next = self.node(anchor).next;
            self.node_mut(node).prev = anchor;
            self.node_mut(node).next = next;
            self.node_mut(anchor).next = Some(node);
            match next {
                Some(next) => self.node_mut(next).prev = node,
                None => {
                    // node became the tail
                    self.node_mut(first).prev = node;
                }
            }
        }
        self.relink_instances(parent);
    }

    /// Rebuild the same-schema instance rings of one sibling list
    fn relink_instances(&mut self, parent: Option<DnodeId>) {
        let siblings: Vec<DnodeId> = {
            let head = match parent {
                Some(p) => self.node(p).child,
                None => self.root,
            };
            self.siblings(head).collect()
        };
        for &id in &siblings {
            self.node_mut(id).inst_prev = None;
            self.node_mut(id).inst_next = None;
        }
        for (i, &id) in siblings.iter().enumerate() {
            let schema = self.node(id).schema;
            for &later in &siblings[i + 1..] {
                if self.node(later).schema == schema {
                    self.node_mut(id).inst_next = Some(later);
                    self.node_mut(later).inst_prev = Some(id);
                    break;
                }
            }
        }
    }
}

/// Iterator over a data sibling list
pub struct DataSiblingIter<'a> {
    tree: &'a DataTree,
    next: Option<DnodeId>,
}

impl<'a> Iterator for DataSiblingIter<'a> {
    type Item = DnodeId;

    fn next(&mut self) -> Option<DnodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut DataTree, schema: usize, value: &str) -> DnodeId {
        tree.alloc(DataNode {
            schema: SnodeId(schema),
            parent: None,
            child: None,
            next: None,
            prev: DnodeId(0),
            inst_prev: None,
            inst_next: None,
            attrs: Vec::new(),
            kind: DnodeKind::LeafList {
                value_str: Arc::from(value),
                value: Value::Str(Arc::from(value)),
            },
            line: 1,
            pending: None,
        })
    }

    #[test]
    fn test_ring_and_instance_links() {
        let mut tree = DataTree::new();
        let a = leaf(&mut tree, 7, "x");
        let other = leaf(&mut tree, 9, "q");
        let b = leaf(&mut tree, 7, "y");
        for id in [a, other, b] {
            tree.link_last(None, id);
        }

        assert_eq!(tree.siblings(tree.root()).collect::<Vec<_>>(), vec![a, other, b]);
        assert_eq!(tree.node(a).prev, b);
        assert_eq!(tree.node(a).inst_next, Some(b));
        assert_eq!(tree.node(b).inst_prev, Some(a));
        assert_eq!(tree.node(other).inst_prev, None);
    }

    #[test]
    fn test_move_relative() {
        let mut tree = DataTree::new();
        let x = leaf(&mut tree, 7, "x");
        let y = leaf(&mut tree, 7, "y");
        let z = leaf(&mut tree, 7, "z");
        let w = leaf(&mut tree, 7, "w");
        for id in [x, y, z, w] {
            tree.link_last(None, id);
        }

        // move w after y: x y w z
        tree.move_relative(w, y, false);
        assert_eq!(tree.siblings(tree.root()).collect::<Vec<_>>(), vec![x, y, w, z]);
        assert_eq!(tree.node(x).prev, z);

        // move z before x: z x y w
        tree.move_relative(z, x, true);
        assert_eq!(tree.siblings(tree.root()).collect::<Vec<_>>(), vec![z, x, y, w]);
        assert_eq!(tree.node(z).prev, w);
    }

    #[test]
    fn test_move_first() {
        let mut tree = DataTree::new();
        let x = leaf(&mut tree, 7, "x");
        let y = leaf(&mut tree, 7, "y");
        for id in [x, y] {
            tree.link_last(None, id);
        }
        tree.move_first(y);
        assert_eq!(tree.siblings(tree.root()).collect::<Vec<_>>(), vec![y, x]);
        assert_eq!(tree.node(y).prev, x);
        assert_eq!(tree.node(y).inst_next, Some(x));
    }

    #[test]
    fn test_unlink_fixes_instance_ring() {
        let mut tree = DataTree::new();
        let a = leaf(&mut tree, 7, "a");
        let b = leaf(&mut tree, 7, "b");
        let c = leaf(&mut tree, 7, "c");
        for id in [a, b, c] {
            tree.link_last(None, id);
        }
        tree.unlink(b);
        assert_eq!(tree.node(a).inst_next, Some(c));
        assert_eq!(tree.node(c).inst_prev, Some(a));
    }
}
