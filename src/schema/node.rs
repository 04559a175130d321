//! Schema nodes and the schema tree arena
//!
//! Every node shares a common header (name, flags, module of origin,
//! parent and sibling links) with a kind-specific payload in
//! [`SnodeKind`]. Sibling lists are circular through `prev`: the first
//! sibling's `prev` points at the last one, giving O(1) append, while
//! `next` of the last sibling is `None`.

use crate::error::{ErrorKind, Result, SchemaError};
use crate::schema::stype::UniqueSet;
use crate::schema::{FeatId, ModId, SnodeId, TypeId};
use std::sync::Arc;

/// Flag word bits of a schema node
pub mod flags {
    /// `config true`
    pub const CONFIG_W: u16 = 0x01;
    /// `config false`
    pub const CONFIG_R: u16 = 0x02;
    /// Mask of the config pair
    pub const CONFIG_MASK: u16 = 0x03;
    /// `status current`
    pub const STATUS_CURR: u16 = 0x04;
    /// `status deprecated`
    pub const STATUS_DEPRC: u16 = 0x08;
    /// `status obsolete`
    pub const STATUS_OBSLT: u16 = 0x10;
    /// Mask of the status group
    pub const STATUS_MASK: u16 = 0x1C;
    /// `mandatory true`
    pub const MAND_TRUE: u16 = 0x20;
    /// `mandatory false`
    pub const MAND_FALSE: u16 = 0x40;
    /// Mask of the mandatory pair
    pub const MAND_MASK: u16 = 0x60;
    /// `ordered-by user`
    pub const USER_ORDERED: u16 = 0x80;
    /// List key leaf
    pub const KEY: u16 = 0x100;
    /// Enabled state of a feature
    pub const FEATURE_ENABLED: u16 = 0x200;
}

/// `when` condition attached to a node
#[derive(Debug, Clone)]
pub struct When {
    /// XPath condition in canonical `module:name` form
    pub cond: Arc<str>,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

/// `refine` of one descendant inside a `uses`
#[derive(Debug, Clone)]
pub struct Refine {
    /// Descendant schema node identifier relative to the grouping
    pub target: Arc<str>,
    /// Overriding description
    pub dsc: Option<Arc<str>>,
    /// Overriding reference
    pub reference: Option<Arc<str>>,
    /// Overriding presence on a container
    pub presence: Option<Arc<str>>,
    /// Overriding default on a leaf or choice
    pub dflt: Option<Arc<str>>,
    /// Overriding config
    pub config: Option<bool>,
    /// Overriding mandatory
    pub mandatory: Option<bool>,
    /// Overriding min-elements
    pub min: Option<u32>,
    /// Overriding max-elements
    pub max: Option<u32>,
    /// Added must restrictions
    pub musts: Vec<crate::schema::stype::Restr>,
    /// Source line of the refine statement
    pub line: u32,
}

/// Kind-specific payload of a schema node
#[derive(Debug, Clone)]
pub enum SnodeKind {
    /// Data container, optionally with presence meaning
    Container {
        /// `presence` argument
        presence: Option<Arc<str>>,
    },
    /// Single typed leaf
    Leaf {
        /// Value type
        type_: TypeId,
        /// `default` argument
        dflt: Option<Arc<str>>,
        /// `units` argument
        units: Option<Arc<str>>,
    },
    /// Multi-instance leaf
    LeafList {
        /// Value type
        type_: TypeId,
        /// `units` argument
        units: Option<Arc<str>>,
        /// `min-elements`
        min: u32,
        /// `max-elements`, zero means unbounded
        max: u32,
    },
    /// Keyed multi-instance node
    List {
        /// Key leaf names as written, whitespace separated
        keys_str: Option<Arc<str>>,
        /// Resolved key leaves in declaration order
        keys: Vec<SnodeId>,
        /// Unique constraints
        unique: Vec<UniqueSet>,
        /// `min-elements`
        min: u32,
        /// `max-elements`, zero means unbounded
        max: u32,
    },
    /// Choice of alternative cases
    Choice {
        /// Name of the default case
        dflt_name: Option<Arc<str>>,
        /// Resolved default case
        dflt: Option<SnodeId>,
    },
    /// Case of a choice
    Case,
    /// Opaque XML subtree
    Anyxml,
    /// Reusable node set definition
    Grouping,
    /// Instantiation point of a grouping
    Uses {
        /// Grouping name in canonical `module:name` form
        grouping_name: Arc<str>,
        /// Located grouping definition
        grouping: Option<SnodeId>,
        /// Refinements to apply on expansion
        refines: Vec<Refine>,
        /// Augments applied to the expanded copy
        augments: Vec<SnodeId>,
        /// True once the grouping content was instantiated
        expanded: bool,
    },
    /// Augment of another node's children
    Augment {
        /// Target schema node identifier as written, canonical form
        target_path: Arc<str>,
        /// Resolved target
        target: Option<SnodeId>,
        /// Children spliced into the target
        spliced: Vec<SnodeId>,
    },
    /// Operation at module root
    Rpc,
    /// Notification definition
    Notification,
    /// Input block of an rpc
    Input,
    /// Output block of an rpc
    Output,
}

impl SnodeKind {
    /// Statement keyword of the kind
    pub fn keyword(&self) -> &'static str {
        match self {
            SnodeKind::Container { .. } => "container",
            SnodeKind::Leaf { .. } => "leaf",
            SnodeKind::LeafList { .. } => "leaf-list",
            SnodeKind::List { .. } => "list",
            SnodeKind::Choice { .. } => "choice",
            SnodeKind::Case => "case",
            SnodeKind::Anyxml => "anyxml",
            SnodeKind::Grouping => "grouping",
            SnodeKind::Uses { .. } => "uses",
            SnodeKind::Augment { .. } => "augment",
            SnodeKind::Rpc => "rpc",
            SnodeKind::Notification => "notification",
            SnodeKind::Input => "input",
            SnodeKind::Output => "output",
        }
    }

    /// True for kinds that may appear in a data tree
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            SnodeKind::Container { .. }
                | SnodeKind::Leaf { .. }
                | SnodeKind::LeafList { .. }
                | SnodeKind::List { .. }
                | SnodeKind::Anyxml
        )
    }
}

/// One schema node in the context arena
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Node name
    pub name: Arc<str>,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
    /// Flag word, see [`flags`]
    pub flags: u16,
    /// Module of origin, relevant for augmented children
    pub module: ModId,
    /// Parent node
    pub parent: Option<SnodeId>,
    /// First child
    pub child: Option<SnodeId>,
    /// Next sibling, `None` on the last one
    pub next: Option<SnodeId>,
    /// Previous sibling, the head points at the tail
    pub prev: SnodeId,
    /// `when` condition
    pub when: Option<When>,
    /// `must` restrictions
    pub musts: Vec<crate::schema::stype::Restr>,
    /// Resolved if-feature references
    pub iffeatures: Vec<FeatId>,
    /// Kind-specific payload
    pub kind: SnodeKind,
    /// Source line of the defining statement
    pub line: u32,
}

impl SchemaNode {
    /// Create a node with empty links; `alloc` fixes the ring
    pub fn new(name: Arc<str>, module: ModId, kind: SnodeKind, line: u32) -> Self {
        Self {
            name,
            dsc: None,
            reference: None,
            flags: 0,
            module,
            parent: None,
            child: None,
            next: None,
            prev: SnodeId(0),
            when: None,
            musts: Vec::new(),
            iffeatures: Vec::new(),
            kind,
            line,
        }
    }

    /// Config state, inheriting is done at insertion
    pub fn is_config(&self) -> bool {
        self.flags & flags::CONFIG_R == 0
    }

    /// True when `mandatory true` is set
    pub fn is_mandatory(&self) -> bool {
        self.flags & flags::MAND_TRUE != 0
    }

    /// True when `ordered-by user` is set
    pub fn is_user_ordered(&self) -> bool {
        self.flags & flags::USER_ORDERED != 0
    }
}

/// Arena of schema nodes
#[derive(Debug, Default)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Node by id
    pub fn node(&self, id: SnodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Mutable node by id
    pub(crate) fn node_mut(&mut self, id: SnodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    /// Number of allocated nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Move a node into the arena, closing its singleton ring
    pub(crate) fn alloc(&mut self, mut node: SchemaNode) -> SnodeId {
        let id = SnodeId(self.nodes.len());
        node.prev = id;
        self.nodes.push(node);
        id
    }

    /// Last sibling of the ring containing `head`
    pub fn last_sibling(&self, head: SnodeId) -> SnodeId {
        self.node(head).prev
    }

    /// Iterate a sibling list from its head
    pub fn siblings(&self, head: Option<SnodeId>) -> SiblingIter<'_> {
        SiblingIter { tree: self, next: head }
    }

    /// Iterate the children of a node
    pub fn children(&self, id: SnodeId) -> SiblingIter<'_> {
        self.siblings(self.node(id).child)
    }

    /// Append `child` to the sibling ring whose head is `*head`
    ///
    /// `parent` is the node owning the ring, `None` for a module root
    /// list. The caller keeps `*head` in the owning structure.
    pub(crate) fn link_last(
        &mut self,
        parent: Option<SnodeId>,
        head: &mut Option<SnodeId>,
        child: SnodeId,
    ) {
        self.node_mut(child).parent = parent;
        match *head {
            None => {
                self.node_mut(child).prev = child;
                self.node_mut(child).next = None;
                *head = Some(child);
            }
            Some(first) => {
                let last = self.node(first).prev;
                self.node_mut(last).next = Some(child);
                self.node_mut(child).prev = last;
                self.node_mut(child).next = None;
                self.node_mut(first).prev = child;
            }
        }
        if let Some(p) = parent {
            if self.node(p).child.is_none() {
                self.node_mut(p).child = *head;
            }
        }
    }

    /// Remove `target` from the sibling ring whose head is `*head`
    pub(crate) fn unlink(&mut self, head: &mut Option<SnodeId>, target: SnodeId) {
        let (prev, next, parent) = {
            let n = self.node(target);
            (n.prev, n.next, n.parent)
        };
        if *head == Some(target) {
            *head = next;
            if let Some(new_head) = next {
                // ring invariant: the new head keeps pointing at the tail
                self.node_mut(new_head).prev = prev;
            }
        } else {
            self.node_mut(prev).next = next;
            match next {
                Some(next) => self.node_mut(next).prev = prev,
                None => {
                    // removed the tail, fix the head's back pointer
                    if let Some(first) = *head {
                        self.node_mut(first).prev = prev;
                    }
                }
            }
        }
        if let Some(p) = parent {
            self.node_mut(p).child = *head;
        }
        let me = target;
        self.node_mut(me).parent = None;
        self.node_mut(me).next = None;
        self.node_mut(me).prev = me;
    }

    /// Insert a node into the schema tree with structural checks
    ///
    /// Verifies the child kind is permitted under the parent kind, that
    /// the name is unique among effective siblings of the same module,
    /// and that rpc/notification definitions stay at the module root or
    /// inside groupings.
    pub fn add_child(
        &mut self,
        parent: Option<SnodeId>,
        head: &mut Option<SnodeId>,
        child: SnodeId,
    ) -> Result<()> {
        let child_kind_keyword = self.node(child).kind.keyword();
        let line = self.node(child).line;

        if let Some(p) = parent {
            if !nesting_allowed(&self.node(p).kind, &self.node(child).kind) {
                return Err(SchemaError::new(
                    ErrorKind::BadNesting,
                    format!(
                        "statement \"{}\" not allowed inside \"{}\"",
                        child_kind_keyword,
                        self.node(p).kind.keyword()
                    ),
                )
                .with_line(line)
                .into());
            }
        } else if !root_allowed(&self.node(child).kind) {
            return Err(SchemaError::new(
                ErrorKind::BadNesting,
                format!("statement \"{}\" not allowed at module root", child_kind_keyword),
            )
            .with_line(line)
            .into());
        }

        if matches!(
            self.node(child).kind,
            SnodeKind::Rpc | SnodeKind::Notification
        ) {
            let ok = match parent {
                None => true,
                Some(p) => matches!(
                    self.node(p).kind,
                    SnodeKind::Grouping | SnodeKind::Uses { .. }
                ),
            };
            if !ok {
                return Err(SchemaError::new(
                    ErrorKind::BadNesting,
                    format!(
                        "\"{}\" is only allowed at module root or inside a grouping",
                        child_kind_keyword
                    ),
                )
                .with_line(line)
                .into());
            }
        }

        let name = Arc::clone(&self.node(child).name);
        let module = self.node(child).module;
        if self.find_duplicate(*head, &name, module, child) {
            return Err(SchemaError::new(
                ErrorKind::DupName,
                format!("duplicated node name \"{}\"", name),
            )
            .with_line(line)
            .into());
        }

        self.link_last(parent, head, child);
        Ok(())
    }

    /// Look for an effective-tree sibling with the same name and module
    ///
    /// Walks transparently into choice and case children, since their
    /// data nodes share the parent's namespace.
    fn find_duplicate(
        &self,
        head: Option<SnodeId>,
        name: &str,
        module: ModId,
        skip: SnodeId,
    ) -> bool {
        for sib in self.siblings(head) {
            if sib == skip {
                continue;
            }
            let n = self.node(sib);
            match n.kind {
                SnodeKind::Choice { .. } | SnodeKind::Case => {
                    if self.find_duplicate(n.child, name, module, skip) {
                        return true;
                    }
                }
                _ => {
                    if n.module == module && &*n.name == name {
                        return true;
                    }
                }
            }
        }
        false
    }
}

fn nesting_allowed(parent: &SnodeKind, child: &SnodeKind) -> bool {
    use SnodeKind::*;
    match parent {
        Leaf { .. } | LeafList { .. } | Anyxml => false,
        Choice { .. } => matches!(
            child,
            Container { .. } | Leaf { .. } | LeafList { .. } | List { .. } | Case | Anyxml
        ),
        Rpc => matches!(child, Input | Output | Grouping),
        Uses { .. } => matches!(
            child,
            Container { .. }
                | Leaf { .. }
                | LeafList { .. }
                | List { .. }
                | Choice { .. }
                | Case
                | Anyxml
                | Uses { .. }
                | Rpc
                | Notification
                | Augment { .. }
        ),
        Grouping => matches!(
            child,
            Container { .. }
                | Leaf { .. }
                | LeafList { .. }
                | List { .. }
                | Choice { .. }
                | Case
                | Anyxml
                | Grouping
                | Uses { .. }
                | Rpc
                | Notification
        ),
        Container { .. } | List { .. } | Case | Augment { .. } | Notification | Input
        | Output => matches!(
            child,
            Container { .. }
                | Leaf { .. }
                | LeafList { .. }
                | List { .. }
                | Choice { .. }
                | Case
                | Anyxml
                | Grouping
                | Uses { .. }
        ),
    }
}

fn root_allowed(child: &SnodeKind) -> bool {
    use SnodeKind::*;
    matches!(
        child,
        Container { .. }
            | Leaf { .. }
            | LeafList { .. }
            | List { .. }
            | Choice { .. }
            | Anyxml
            | Grouping
            | Uses { .. }
            | Rpc
            | Notification
            | Augment { .. }
    )
}

/// Iterator over a sibling list
pub struct SiblingIter<'a> {
    tree: &'a SchemaTree,
    next: Option<SnodeId>,
}

impl<'a> Iterator for SiblingIter<'a> {
    type Item = SnodeId;

    fn next(&mut self) -> Option<SnodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut SchemaTree, name: &str) -> SnodeId {
        tree.alloc(SchemaNode::new(
            Arc::from(name),
            ModId(0),
            SnodeKind::Leaf {
                type_: TypeId(0),
                dflt: None,
                units: None,
            },
            1,
        ))
    }

    fn container(tree: &mut SchemaTree, name: &str) -> SnodeId {
        tree.alloc(SchemaNode::new(
            Arc::from(name),
            ModId(0),
            SnodeKind::Container { presence: None },
            1,
        ))
    }

    #[test]
    fn test_ring_append() {
        let mut tree = SchemaTree::new();
        let parent = container(&mut tree, "c");
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let c = leaf(&mut tree, "z");

        let mut head = None;
        tree.link_last(Some(parent), &mut head, a);
        tree.link_last(Some(parent), &mut head, b);
        tree.link_last(Some(parent), &mut head, c);
        tree.node_mut(parent).child = head;

        assert_eq!(head, Some(a));
        assert_eq!(tree.node(a).prev, c);
        assert_eq!(tree.node(c).prev, b);
        assert_eq!(tree.node(c).next, None);
        let collected: Vec<_> = tree.children(parent).collect();
        assert_eq!(collected, vec![a, b, c]);
    }

    #[test]
    fn test_unlink_keeps_ring_closed() {
        let mut tree = SchemaTree::new();
        let parent = container(&mut tree, "c");
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let c = leaf(&mut tree, "z");
        let mut head = None;
        for id in [a, b, c] {
            tree.link_last(Some(parent), &mut head, id);
        }

        tree.unlink(&mut head, b);
        assert_eq!(tree.siblings(head).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(tree.node(a).prev, c);

        tree.unlink(&mut head, a);
        assert_eq!(head, Some(c));
        assert_eq!(tree.node(c).prev, c);
    }

    #[test]
    fn test_add_child_rejects_duplicates() {
        let mut tree = SchemaTree::new();
        let parent = container(&mut tree, "c");
        let a = leaf(&mut tree, "mtu");
        let b = leaf(&mut tree, "mtu");
        let mut head = None;
        tree.add_child(Some(parent), &mut head, a).unwrap();
        let err = tree.add_child(Some(parent), &mut head, b).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DupName));
    }

    #[test]
    fn test_add_child_rejects_bad_nesting() {
        let mut tree = SchemaTree::new();
        let parent = leaf(&mut tree, "l");
        let child = leaf(&mut tree, "x");
        let mut head = tree.node(parent).child;
        let err = tree.add_child(Some(parent), &mut head, child).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadNesting));
    }

    #[test]
    fn test_rpc_only_at_root() {
        let mut tree = SchemaTree::new();
        let parent = container(&mut tree, "c");
        let rpc = tree.alloc(SchemaNode::new(
            Arc::from("do-it"),
            ModId(0),
            SnodeKind::Rpc,
            1,
        ));
        let mut head = None;
        let err = tree.add_child(Some(parent), &mut head, rpc).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadNesting));

        let mut root = None;
        tree.add_child(None, &mut root, rpc).unwrap();
    }

    #[test]
    fn test_duplicate_detected_through_choice() {
        let mut tree = SchemaTree::new();
        let parent = container(&mut tree, "c");
        let choice = tree.alloc(SchemaNode::new(
            Arc::from("ch"),
            ModId(0),
            SnodeKind::Choice {
                dflt_name: None,
                dflt: None,
            },
            1,
        ));
        let inner = leaf(&mut tree, "shared");
        let mut head = None;
        tree.add_child(Some(parent), &mut head, choice).unwrap();
        let mut choice_head = None;
        tree.add_child(Some(choice), &mut choice_head, inner).unwrap();
        tree.node_mut(choice).child = choice_head;

        let dup = leaf(&mut tree, "shared");
        let err = tree.add_child(Some(parent), &mut head, dup).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DupName));
    }
}
