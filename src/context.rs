//! The context owning loaded modules
//!
//! A context holds the dictionary, the schema node and type arenas, and
//! the registry of loaded modules. Modules load through
//! [`Context::load_module`], which consults the registry, a caller
//! supplied missing-module callback and the configured search paths, in
//! that order. A stack of module names being parsed catches circular
//! imports. Once loading is complete and no feature toggling is pending,
//! the context may be shared read-only.

use crate::dict::Dict;
use crate::error::{ErrorKind, Result, SchemaError};
use crate::schema::node::flags;
use crate::schema::{
    FeatId, ModId, Module, SchemaNode, SchemaTree, SnodeId, SnodeKind, TpdfId, TypeId, TypeSpec,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Schema input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Compact text grammar
    Yang,
    /// XML serialization
    Yin,
}

impl SchemaFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<SchemaFormat> {
        match path.extension()?.to_str()? {
            "yang" => Some(SchemaFormat::Yang),
            "yin" => Some(SchemaFormat::Yin),
            _ => None,
        }
    }
}

/// Callback supplying the source of a module the context cannot find
pub type MissingModuleCallback =
    dyn Fn(&str, Option<&str>) -> Option<(String, SchemaFormat)> + Send + Sync;

/// Process-wide collection of loaded modules
pub struct Context {
    pub(crate) dict: Dict,
    pub(crate) modules: Vec<Module>,
    pub(crate) tree: SchemaTree,
    pub(crate) types: Vec<TypeSpec>,
    pub(crate) parsing: Vec<String>,
    searchpaths: Vec<PathBuf>,
    missing_cb: Option<Box<MissingModuleCallback>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("modules", &self.modules.len())
            .field("nodes", &self.tree.len())
            .field("searchpaths", &self.searchpaths)
            .finish()
    }
}

impl Context {
    /// Create a context with the given search paths
    pub fn new<P: Into<PathBuf>>(searchpaths: impl IntoIterator<Item = P>) -> Self {
        Self {
            dict: Dict::new(),
            modules: Vec::new(),
            tree: SchemaTree::new(),
            types: Vec::new(),
            parsing: Vec::new(),
            searchpaths: searchpaths.into_iter().map(Into::into).collect(),
            missing_cb: None,
        }
    }

    /// Append a schema search path
    pub fn add_searchpath(&mut self, dir: impl Into<PathBuf>) {
        self.searchpaths.push(dir.into());
    }

    /// Install the missing-module callback
    pub fn set_missing_module_callback(&mut self, cb: Box<MissingModuleCallback>) {
        self.missing_cb = Some(cb);
    }

    /// The context dictionary
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    // =========================================================================
    // Arena access
    // =========================================================================

    /// Schema node by id
    pub fn snode(&self, id: SnodeId) -> &SchemaNode {
        self.tree.node(id)
    }

    /// The schema node arena, for read-only traversal
    pub fn schema_tree(&self) -> &SchemaTree {
        &self.tree
    }

    pub(crate) fn snode_mut(&mut self, id: SnodeId) -> &mut SchemaNode {
        self.tree.node_mut(id)
    }

    /// Type descriptor by id
    pub fn stype(&self, id: TypeId) -> &TypeSpec {
        &self.types[id.0]
    }

    pub(crate) fn stype_mut(&mut self, id: TypeId) -> &mut TypeSpec {
        &mut self.types[id.0]
    }

    pub(crate) fn alloc_type(&mut self, spec: TypeSpec) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(spec);
        id
    }

    /// Module by id
    pub fn module(&self, id: ModId) -> &Module {
        &self.modules[id.0]
    }

    pub(crate) fn module_mut(&mut self, id: ModId) -> &mut Module {
        &mut self.modules[id.0]
    }

    /// Ids of all successfully loaded modules
    pub fn module_ids(&self) -> impl Iterator<Item = ModId> + '_ {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, m)| m.valid)
            .map(|(i, _)| ModId(i))
    }

    // =========================================================================
    // Module registry
    // =========================================================================

    /// Find a loaded module by name and optional revision
    pub fn get_module(&self, name: &str, revision: Option<&str>) -> Option<ModId> {
        self.module_ids().find(|&id| {
            let m = self.module(id);
            &*m.name == name
                && match revision {
                    None => true,
                    Some(rev) => m.revision() == Some(rev),
                }
        })
    }

    /// Find a loaded module by namespace URI
    pub fn get_module_by_ns(&self, ns: &str) -> Option<ModId> {
        self.module_ids().find(|&id| &*self.module(id).ns == ns)
    }

    /// Names of all loaded modules
    pub fn module_names(&self) -> Vec<&str> {
        self.module_ids().map(|id| &*self.module(id).name).collect()
    }

    /// Names of the submodules of a module
    pub fn submodule_names(&self, module: ModId) -> Vec<&str> {
        self.module(module)
            .includes
            .iter()
            .map(|inc| &*inc.name)
            .collect()
    }

    /// Parse a module from in-memory source and resolve it
    pub fn parse_module(&mut self, data: &str, format: SchemaFormat) -> Result<ModId> {
        let mid = crate::parser::parse_module(self, data, format)?;
        debug!(
            module = &*self.module(mid).name,
            revision = self.module(mid).revision().unwrap_or("none"),
            "module loaded"
        );
        Ok(mid)
    }

    /// Load a module by name, via registry, callback or search paths
    pub fn load_module(&mut self, name: &str, revision: Option<&str>) -> Result<ModId> {
        if self.parsing.iter().any(|p| p == name) {
            return Err(SchemaError::new(
                ErrorKind::Circular,
                format!("circular import dependency on module \"{}\"", name),
            )
            .into());
        }
        if let Some(mid) = self.get_module(name, revision) {
            return Ok(mid);
        }
        if let Some(cb) = self.missing_cb.take() {
            let supplied = cb(name, revision);
            self.missing_cb = Some(cb);
            if let Some((source, format)) = supplied {
                return self.parse_module(&source, format);
            }
        }
        if let Some((path, format)) = self.locate_file(name, revision) {
            let source = std::fs::read_to_string(&path)?;
            debug!(module = name, path = %path.display(), "loading module from file");
            return self.parse_module(&source, format);
        }
        Err(SchemaError::new(
            ErrorKind::Inmod,
            format!("module \"{}\" not found", name),
        )
        .into())
    }

    /// Search the configured directories for a module file
    pub(crate) fn locate_file(
        &self,
        name: &str,
        revision: Option<&str>,
    ) -> Option<(PathBuf, SchemaFormat)> {
        for dir in &self.searchpaths {
            let candidates: Vec<String> = match revision {
                Some(rev) => vec![
                    format!("{}@{}.yang", name, rev),
                    format!("{}@{}.yin", name, rev),
                ],
                None => vec![format!("{}.yang", name), format!("{}.yin", name)],
            };
            for cand in candidates {
                let path = dir.join(&cand);
                if path.is_file() {
                    let format = SchemaFormat::from_path(&path)?;
                    return Some((path, format));
                }
            }
            if revision.is_none() {
                // fall back to the newest revision-labelled file
                let mut best: Option<PathBuf> = None;
                if let Ok(entries) = std::fs::read_dir(dir) {
                    for entry in entries.flatten() {
                        let fname = entry.file_name();
                        let fname = fname.to_string_lossy();
                        let matches = fname.starts_with(&format!("{}@", name))
                            && (fname.ends_with(".yang") || fname.ends_with(".yin"));
                        if matches
                            && best
                                .as_ref()
                                .map(|b| b.file_name().unwrap().to_string_lossy() < fname)
                                .unwrap_or(true)
                        {
                            best = Some(entry.path());
                        }
                    }
                }
                if let Some(path) = best {
                    let format = SchemaFormat::from_path(&path)?;
                    return Some((path, format));
                }
            }
        }
        None
    }

    /// Drop a half-built module so the context stays consistent
    ///
    /// The module entry is marked invalid and children it spliced into
    /// other modules through augments are unlinked. Arena slots of the
    /// abandoned module become unreachable and are reclaimed when the
    /// context drops.
    pub(crate) fn abandon_module(&mut self, mid: ModId) {
        let augments: Vec<SnodeId> = self.module(mid).augments.clone();
        for aug in augments {
            let (target, spliced) = match &self.snode(aug).kind {
                SnodeKind::Augment {
                    target, spliced, ..
                } => (*target, spliced.clone()),
                _ => continue,
            };
            if let Some(target) = target {
                let mut head = self.snode(target).child;
                for child in spliced {
                    self.tree.unlink(&mut head, child);
                }
                self.snode_mut(target).child = head;
            }
        }
        self.module_mut(mid).valid = false;
        debug!(module = &*self.module(mid).name, "module abandoned");
    }

    /// Check the context-wide uniqueness invariants for a new module
    pub(crate) fn check_module_uniqueness(&self, mid: ModId) -> Result<()> {
        let m = self.module(mid);
        for other in self.module_ids().filter(|&id| id != mid) {
            let o = self.module(other);
            if o.name == m.name && o.revision() == m.revision() {
                return Err(SchemaError::new(
                    ErrorKind::DupName,
                    format!(
                        "module \"{}\" revision {} already loaded",
                        m.name,
                        m.revision().unwrap_or("none")
                    ),
                )
                .into());
            }
            if o.ns == m.ns {
                return Err(SchemaError::new(
                    ErrorKind::DupName,
                    format!("namespace \"{}\" already used by module \"{}\"", m.ns, o.name),
                )
                .into());
            }
        }
        Ok(())
    }

    // =========================================================================
    // Lookups used by the resolver and the data layer
    // =========================================================================

    /// Resolve a module name reference from inside `from`
    ///
    /// `None` means the own module. Named modules must be the own module
    /// or one of its imports.
    pub(crate) fn module_by_name_in_scope(
        &self,
        from: ModId,
        name: Option<&str>,
    ) -> Option<ModId> {
        match name {
            None => Some(from),
            Some(name) => {
                if &*self.module(from).name == name {
                    return Some(from);
                }
                self.module(from)
                    .imports
                    .iter()
                    .find(|imp| &*self.module(imp.module).name == name)
                    .map(|imp| imp.module)
            }
        }
    }

    /// Find a module-level typedef visible from `from`
    pub(crate) fn find_typedef(
        &self,
        from: ModId,
        module_name: Option<&str>,
        name: &str,
    ) -> Option<TpdfId> {
        let target = self.module_by_name_in_scope(from, module_name)?;
        self.module(target)
            .typedef_index(name)
            .map(|index| TpdfId {
                module: target,
                index,
            })
    }

    /// Typedef by address
    pub fn typedef(&self, id: TpdfId) -> &crate::schema::Typedef {
        &self.module(id.module).typedefs[id.index]
    }

    /// Follow a type's derivation chain to its built-in base
    ///
    /// Returns the descriptors from the given one towards the built-in,
    /// the given one first. Stops on an unresolved link.
    pub fn type_chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            match self.stype(current).der {
                Some(crate::schema::TypeRef::Typedef(tpdf)) => {
                    let next = self.typedef(tpdf).type_;
                    chain.push(next);
                    current = next;
                }
                _ => return chain,
            }
        }
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Feature definition by address
    pub fn feature(&self, id: FeatId) -> &crate::schema::Feature {
        &self.module(id.module).features[id.index]
    }

    /// Enable a feature, `"*"` enables all of the module's features
    pub fn feature_enable(&mut self, module: ModId, name: &str) -> Result<()> {
        self.feature_set(module, name, true)
    }

    /// Disable a feature, `"*"` disables all of the module's features
    pub fn feature_disable(&mut self, module: ModId, name: &str) -> Result<()> {
        self.feature_set(module, name, false)
    }

    fn feature_set(&mut self, module: ModId, name: &str, value: bool) -> Result<()> {
        if name == "*" {
            for f in &mut self.module_mut(module).features {
                if value {
                    f.flags |= flags::FEATURE_ENABLED;
                } else {
                    f.flags &= !flags::FEATURE_ENABLED;
                }
            }
            return Ok(());
        }
        match self.module(module).feature_index(name) {
            Some(index) => {
                let f = &mut self.module_mut(module).features[index];
                if value {
                    f.flags |= flags::FEATURE_ENABLED;
                } else {
                    f.flags &= !flags::FEATURE_ENABLED;
                }
                debug!(feature = name, enabled = value, "feature toggled");
                Ok(())
            }
            None => Err(SchemaError::new(
                ErrorKind::Inarg,
                format!(
                    "feature \"{}\" not defined in module \"{}\"",
                    name,
                    self.module(module).name
                ),
            )
            .into()),
        }
    }

    /// Effective state of a feature, dependencies included
    pub fn feature_enabled(&self, id: FeatId) -> bool {
        self.feature_enabled_depth(id, 0)
    }

    fn feature_enabled_depth(&self, id: FeatId, depth: usize) -> bool {
        if depth > 64 {
            return false;
        }
        let f = self.feature(id);
        f.is_set()
            && f.iffeatures
                .iter()
                .all(|&dep| self.feature_enabled_depth(dep, depth + 1))
    }

    /// True when the node or any ancestor has an unsatisfied if-feature
    pub fn is_disabled(&self, node: SnodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.snode(id);
            if n.iffeatures.iter().any(|&f| !self.feature_enabled(f)) {
                return true;
            }
            current = n.parent;
        }
        false
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Path expression locating a schema node, `/module:a/b` form
    pub fn schema_path(&self, node: SnodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.snode(id);
            if !matches!(n.kind, SnodeKind::Uses { .. } | SnodeKind::Augment { .. }) {
                let qualify = match n.parent {
                    None => true,
                    Some(p) => self.snode(p).module != n.module,
                };
                if qualify {
                    parts.push(format!("{}:{}", self.module(n.module).name, n.name));
                } else {
                    parts.push(n.name.to_string());
                }
            }
            current = n.parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Rewrite `prefix:` references of an expression into module names
    ///
    /// This is the canonical form stored for when/must conditions,
    /// leafref paths, identity bases and if-feature references. Unknown
    /// prefixes are an error.
    pub(crate) fn transform_expr(&self, from: ModId, expr: &str, line: u32) -> Result<Arc<str>> {
        let mut out = String::with_capacity(expr.len());
        let bytes = expr.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let rest = &expr[i..];
            let id_len = crate::names::parse_identifier(rest);
            if id_len > 0 {
                let word = &rest[..id_len];
                if bytes.get(i + id_len) == Some(&b':')
                    && crate::names::parse_identifier(&expr[i + id_len + 1..]) > 0
                {
                    match self.module(from).prefix_to_name(word, &self.modules) {
                        Some(name) => out.push_str(name),
                        None => {
                            return Err(SchemaError::new(
                                ErrorKind::Inmod,
                                format!("prefix \"{}\" is not declared", word),
                            )
                            .with_line(line)
                            .into())
                        }
                    }
                } else {
                    out.push_str(word);
                }
                i += id_len;
            } else {
                let c = rest.chars().next().unwrap();
                // skip quoted literals untouched
                if c == '\'' || c == '"' {
                    let quote = c;
                    out.push(c);
                    i += 1;
                    while i < bytes.len() {
                        let c = expr[i..].chars().next().unwrap();
                        out.push(c);
                        i += c.len_utf8();
                        if c == quote {
                            break;
                        }
                    }
                } else {
                    out.push(c);
                    i += c.len_utf8();
                }
            }
        }
        Ok(self.dict.insert_owned(out))
    }

    // =========================================================================
    // Data entry points
    // =========================================================================

    /// Parse an XML data document against the loaded schemas
    pub fn parse_data(&self, data: &str, options: u32) -> Result<crate::data::DataTree> {
        crate::data::xml::parse(self, data, options)
    }

    /// Print a module in YIN format
    pub fn print_module(&self, module: ModId) -> String {
        crate::printer::print_module_yin(self, module)
    }

    /// Print a data tree in XML format
    pub fn print_data(&self, tree: &crate::data::DataTree) -> String {
        crate::printer::print_data_xml(self, tree)
    }

    /// Re-run the structural checks over a parsed tree
    pub fn validate_data(&self, tree: &crate::data::DataTree, options: u32) -> Result<()> {
        crate::data::validate::validate_tree(self, tree, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context() {
        let ctx = Context::new(Vec::<PathBuf>::new());
        assert!(ctx.module_names().is_empty());
        assert!(ctx.get_module("nope", None).is_none());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            SchemaFormat::from_path(Path::new("a/b/mod.yang")),
            Some(SchemaFormat::Yang)
        );
        assert_eq!(
            SchemaFormat::from_path(Path::new("mod.yin")),
            Some(SchemaFormat::Yin)
        );
        assert_eq!(SchemaFormat::from_path(Path::new("mod.xml")), None);
    }
}
