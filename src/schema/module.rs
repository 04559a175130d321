//! Modules and their global definitions
//!
//! A module owns its revisions, imports, features, identities and
//! typedefs, plus the head of its top-level data node ring. Submodule
//! content is parsed straight onto the owning module; only the submodule
//! name and revision are recorded.

use crate::schema::node::flags;
use crate::schema::{FeatId, IdentId, ModId, SnodeId, TypeId};
use std::sync::Arc;

/// One `revision` entry
#[derive(Debug, Clone)]
pub struct Revision {
    /// Revision date, `YYYY-MM-DD`
    pub date: Arc<str>,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

/// One `import` entry
#[derive(Debug, Clone)]
pub struct Import {
    /// Imported module
    pub module: ModId,
    /// Prefix bound to the import
    pub prefix: Arc<str>,
    /// Requested revision, when given
    pub revision: Option<Arc<str>>,
}

/// One `include` entry
#[derive(Debug, Clone)]
pub struct Include {
    /// Submodule name
    pub name: Arc<str>,
    /// Submodule revision, when known
    pub revision: Option<Arc<str>>,
}

/// One `feature` definition
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature name
    pub name: Arc<str>,
    /// Flag word, status bits plus [`flags::FEATURE_ENABLED`]
    pub flags: u16,
    /// Conjunction of if-feature dependencies
    pub iffeatures: Vec<FeatId>,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

impl Feature {
    /// Create a disabled feature
    pub fn new(name: Arc<str>) -> Self {
        Self {
            name,
            flags: 0,
            iffeatures: Vec::new(),
            dsc: None,
            reference: None,
        }
    }

    /// Explicit enable state, without dependency evaluation
    pub fn is_set(&self) -> bool {
        self.flags & flags::FEATURE_ENABLED != 0
    }
}

/// One `identity` definition
#[derive(Debug, Clone)]
pub struct Identity {
    /// Identity name
    pub name: Arc<str>,
    /// Declaring module
    pub module: ModId,
    /// Base identity, resolved into the identity DAG
    pub base: Option<IdentId>,
    /// Flag word, status bits
    pub flags: u16,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

/// One module-level `typedef`
#[derive(Debug, Clone)]
pub struct Typedef {
    /// Typedef name
    pub name: Arc<str>,
    /// The defined type descriptor
    pub type_: TypeId,
    /// `units` argument
    pub units: Option<Arc<str>>,
    /// `default` argument
    pub dflt: Option<Arc<str>>,
    /// Flag word, status bits
    pub flags: u16,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

/// One loaded module
#[derive(Debug)]
pub struct Module {
    /// Module name
    pub name: Arc<str>,
    /// Namespace URI
    pub ns: Arc<str>,
    /// Module's own prefix
    pub prefix: Arc<str>,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
    /// organization sub-statement
    pub org: Option<Arc<str>>,
    /// contact sub-statement
    pub contact: Option<Arc<str>>,
    /// Revisions, the newest at index 0
    pub revisions: Vec<Revision>,
    /// Imports
    pub imports: Vec<Import>,
    /// Included submodules
    pub includes: Vec<Include>,
    /// Feature definitions
    pub features: Vec<Feature>,
    /// Identity definitions
    pub identities: Vec<Identity>,
    /// Module-level typedefs
    pub typedefs: Vec<Typedef>,
    /// Head of the top-level data node ring
    pub data: Option<SnodeId>,
    /// Module-level augments
    pub augments: Vec<SnodeId>,
    /// False when the module failed to load and was abandoned
    pub(crate) valid: bool,
}

impl Module {
    /// Create an empty module shell
    pub(crate) fn new(name: Arc<str>, ns: Arc<str>, prefix: Arc<str>) -> Self {
        Self {
            name,
            ns,
            prefix,
            dsc: None,
            reference: None,
            org: None,
            contact: None,
            revisions: Vec::new(),
            imports: Vec::new(),
            includes: Vec::new(),
            features: Vec::new(),
            identities: Vec::new(),
            typedefs: Vec::new(),
            data: None,
            augments: Vec::new(),
            valid: true,
        }
    }

    /// Newest revision date, when any revision was given
    pub fn revision(&self) -> Option<&str> {
        self.revisions.first().map(|r| &*r.date)
    }

    /// Insert a revision, keeping the newest at index 0
    pub fn add_revision(&mut self, mut rev: Revision) -> usize {
        if let Some(first) = self.revisions.first() {
            if *rev.date > *first.date {
                std::mem::swap(&mut self.revisions[0], &mut rev);
                self.revisions.push(rev);
                return 0;
            }
        }
        self.revisions.push(rev);
        self.revisions.len() - 1
    }

    /// Find a feature by name
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| &*f.name == name)
    }

    /// Find an identity by name
    pub fn identity_index(&self, name: &str) -> Option<usize> {
        self.identities.iter().position(|i| &*i.name == name)
    }

    /// Find a typedef by name
    pub fn typedef_index(&self, name: &str) -> Option<usize> {
        self.typedefs.iter().position(|t| &*t.name == name)
    }

    /// Map a prefix to a module name
    ///
    /// The own prefix and import prefixes resolve, and so do plain
    /// module names, which keeps the canonical `module:name` form a
    /// valid reference when printed output is parsed back.
    pub fn prefix_to_name<'a>(
        &'a self,
        prefix: &str,
        modules: &'a [Module],
    ) -> Option<&'a Arc<str>> {
        if &*self.prefix == prefix || &*self.name == prefix {
            return Some(&self.name);
        }
        self.imports
            .iter()
            .find(|imp| {
                &*imp.prefix == prefix || &*modules[imp.module.0].name == prefix
            })
            .map(|imp| &modules[imp.module.0].name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Module {
        Module::new(Arc::from("test"), Arc::from("urn:test"), Arc::from("t"))
    }

    fn rev(date: &str) -> Revision {
        Revision {
            date: Arc::from(date),
            dsc: None,
            reference: None,
        }
    }

    #[test]
    fn test_revisions_keep_newest_first() {
        let mut m = module();
        m.add_revision(rev("2014-05-08"));
        m.add_revision(rev("2015-01-01"));
        m.add_revision(rev("2014-12-24"));
        assert_eq!(m.revision(), Some("2015-01-01"));
        assert_eq!(m.revisions.len(), 3);
    }

    #[test]
    fn test_revision_insert_returns_slot() {
        let mut m = module();
        assert_eq!(m.add_revision(rev("2015-01-01")), 0);
        // an older revision lands at the end
        assert_eq!(m.add_revision(rev("2014-01-01")), 1);
        // a newer one replaces the head
        assert_eq!(m.add_revision(rev("2016-06-06")), 0);
        assert_eq!(m.revision(), Some("2016-06-06"));
    }

    #[test]
    fn test_lookup_helpers() {
        let mut m = module();
        m.features.push(Feature::new(Arc::from("f1")));
        assert_eq!(m.feature_index("f1"), Some(0));
        assert_eq!(m.feature_index("nope"), None);
    }
}
