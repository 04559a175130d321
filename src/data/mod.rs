//! Instance data trees
//!
//! Data nodes are arena-allocated per tree, mirror the schema's sibling
//! ring convention and point back at their schema nodes. Trees are
//! parsed by the XML front-end in [`xml`], structurally checked by
//! [`validate`] and independently owned by the caller.

pub mod node;
pub mod validate;
pub mod xml;

pub use node::{DataNode, DataTree, DnodeId, DnodeKind};

/// Option bits of data parsing and validation
pub mod options {
    /// Reject elements unknown to the loaded schemas
    pub const STRICT: u32 = 0x01;
    /// The parser may consume the input buffer eagerly
    ///
    /// Accepted for call-site compatibility; input ownership already
    /// covers it, so the bit has no further effect.
    pub const DESTRUCT: u32 = 0x02;
    /// edit-config semantics, state data is rejected
    pub const EDIT: u32 = 0x04;
    /// NETCONF filter semantics, duplicates merge and cardinality
    /// checks are skipped
    pub const FILTER: u32 = 0x08;
}

/// NETCONF base namespace of data documents
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// YANG metadata namespace carrying `insert`/`value` attributes
pub const YANG_ATTRS_NS: &str = "urn:ietf:params:xml:ns:yang:1";
