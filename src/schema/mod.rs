//! In-memory YANG schema model
//!
//! Modules, schema nodes and type descriptors live in arenas owned by the
//! [`Context`](crate::context::Context) and reference each other through
//! the index types defined here. Back references (parent links, leafref
//! targets, identity bases) are plain indices, never owning pointers.

pub mod module;
pub mod node;
pub mod stype;

pub use module::{Feature, Identity, Import, Include, Module, Revision, Typedef};
pub use node::{flags, SchemaNode, SchemaTree, SnodeKind};
pub use stype::{
    BitDef, EnumDef, Pattern, Restr, TypeBase, TypeInfo, TypeRef, TypeSpec, UniqueSet,
};

/// Index of a module inside a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModId(pub(crate) usize);

/// Index of a schema node inside a context's node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnodeId(pub(crate) usize);

/// Index of a type descriptor inside a context's type arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) usize);

/// Identity address, module plus position in its identity list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentId {
    /// Declaring module
    pub module: ModId,
    /// Position in the module's identity list
    pub index: usize,
}

/// Feature address, module plus position in its feature list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatId {
    /// Declaring module
    pub module: ModId,
    /// Position in the module's feature list
    pub index: usize,
}

/// Typedef address, module plus position in its typedef list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TpdfId {
    /// Declaring module
    pub module: ModId,
    /// Position in the module's typedef list
    pub index: usize,
}
