//! Deferred reference resolution
//!
//! The schema parsers enqueue everything they cannot check locally. The
//! queue is processed by fixed-point iteration: every pass walks the
//! pending entries in insertion order, each entry reports resolved,
//! deferred or failed, and passes repeat while progress is made. An empty
//! queue means success; a pass without progress reports the missing
//! dependency of every stuck entry; a failed entry aborts immediately.

use crate::context::Context;
use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::schema::node::flags;
use crate::schema::{
    FeatId, IdentId, ModId, SnodeId, SnodeKind, TpdfId, TypeBase, TypeId, TypeInfo, TypeRef,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// What a queue entry waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnresKind {
    /// Base resolution and restriction check of a type descriptor
    Type,
    /// `base` of an identity
    Identity,
    /// Target of a leafref path
    Leafref,
    /// Grouping expansion of a `uses`
    Uses,
    /// Target splice of an `augment`
    Augment,
    /// `if-feature` reference
    IfFeat,
    /// `key` list of a list
    ListKeys,
    /// One `unique` set of a list, by index
    ListUnique(usize),
    /// `default` of a typedef or leaf
    TypedefDflt,
}

/// Entity owning a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnresOwner {
    /// A schema node
    Snode(SnodeId),
    /// A type descriptor
    Type(TypeId),
    /// A module-level typedef
    Typedef(TpdfId),
    /// An identity
    Ident(IdentId),
    /// A feature
    Feature(FeatId),
}

/// One queue entry
#[derive(Debug, Clone)]
pub(crate) struct UnresItem {
    pub kind: UnresKind,
    pub owner: UnresOwner,
    /// Module the entry was parsed in, used for scope lookups
    pub module: ModId,
    /// The textual reference to resolve, canonical `module:name` form
    pub payload: Arc<str>,
    /// Data node owning the type, for per-leaf leafref records
    pub node: Option<SnodeId>,
    /// Source line of the statement
    pub line: u32,
}

/// Append-only queue processed by [`resolve`]
#[derive(Debug, Default)]
pub(crate) struct UnresQueue {
    items: Vec<UnresItem>,
    done: Vec<bool>,
}

impl UnresQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, item: UnresItem) {
        self.items.push(item);
        self.done.push(false);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.done.iter().all(|&d| d)
    }
}

enum Outcome {
    Resolved,
    Deferred(String),
    Failed(Error),
}

/// Run fixed-point passes until the queue drains or progress stops
pub(crate) fn resolve(ctx: &mut Context, queue: &mut UnresQueue) -> Result<()> {
    let mut pass = 0usize;
    loop {
        pass += 1;
        let mut progress = false;
        let mut pending = 0usize;
        let mut i = 0;
        while i < queue.items.len() {
            if queue.done[i] {
                i += 1;
                continue;
            }
            let item = queue.items[i].clone();
            match resolve_item(ctx, queue, &item) {
                Outcome::Resolved => {
                    queue.done[i] = true;
                    progress = true;
                }
                Outcome::Deferred(why) => {
                    trace!(pass, why = why.as_str(), "entry deferred");
                    pending += 1;
                }
                Outcome::Failed(e) => return Err(e),
            }
            i += 1;
        }
        debug!(pass, pending, "resolution pass finished");
        if pending == 0 {
            return Ok(());
        }
        if !progress {
            let mut first: Option<Error> = None;
            for (i, item) in queue.items.iter().enumerate() {
                if queue.done[i] {
                    continue;
                }
                if let Outcome::Deferred(why) = resolve_item_probe(ctx, item) {
                    let err = SchemaError::new(
                        ErrorKind::Spec,
                        format!("unresolvable reference \"{}\": {}", item.payload, why),
                    )
                    .with_line(item.line);
                    debug!(%err, "resolution stuck");
                    if first.is_none() {
                        first = Some(err.into());
                    }
                }
            }
            return Err(first.unwrap_or_else(|| {
                Error::Internal("resolver made no progress with an empty reason".into())
            }));
        }
    }
}

/// Re-evaluate a stuck entry only to extract its blocking reason
fn resolve_item_probe(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let mut scratch = UnresQueue::new();
    resolve_item(ctx, &mut scratch, item)
}

fn resolve_item(ctx: &mut Context, queue: &mut UnresQueue, item: &UnresItem) -> Outcome {
    match item.kind {
        UnresKind::Type => resolve_type(ctx, queue, item),
        UnresKind::Identity => resolve_identity(ctx, item),
        UnresKind::Leafref => resolve_leafref(ctx, item),
        UnresKind::Uses => resolve_uses(ctx, queue, item),
        UnresKind::Augment => resolve_augment(ctx, item),
        UnresKind::IfFeat => resolve_iffeat(ctx, item),
        UnresKind::ListKeys => resolve_list_keys(ctx, item),
        UnresKind::ListUnique(set) => resolve_list_unique(ctx, item, set),
        UnresKind::TypedefDflt => resolve_default(ctx, item),
    }
}

fn schema_err(kind: ErrorKind, msg: String, line: u32) -> Outcome {
    Outcome::Failed(SchemaError::new(kind, msg).with_line(line).into())
}

// =============================================================================
// TYPE
// =============================================================================

fn resolve_type(ctx: &mut Context, queue: &mut UnresQueue, item: &UnresItem) -> Outcome {
    let tid = match item.owner {
        UnresOwner::Type(tid) => tid,
        _ => return Outcome::Failed(Error::Internal("type entry without type owner".into())),
    };
    if ctx.stype(tid).base != TypeBase::Unknown {
        return Outcome::Resolved;
    }
    let name = Arc::clone(&ctx.stype(tid).name);
    let module_name = ctx.stype(tid).module_name.clone();

    let (der, base) = if module_name.is_none() {
        match TypeBase::from_name(&name) {
            Some(base) => (TypeRef::Builtin(base), base),
            None => match lookup_typedef(ctx, item.module, None, &name, item.line) {
                Ok(Some(tpdf)) => {
                    let target_type = ctx.typedef(tpdf).type_;
                    let base = ctx.stype(target_type).base;
                    if base == TypeBase::Unknown {
                        return Outcome::Deferred(format!("typedef \"{}\" is unresolved", name));
                    }
                    (TypeRef::Typedef(tpdf), base)
                }
                Ok(None) => {
                    return schema_err(
                        ErrorKind::Inval,
                        format!("type \"{}\" not found", name),
                        item.line,
                    )
                }
                Err(e) => return Outcome::Failed(e),
            },
        }
    } else {
        match lookup_typedef(ctx, item.module, module_name.as_deref(), &name, item.line) {
            Ok(Some(tpdf)) => {
                let target_type = ctx.typedef(tpdf).type_;
                let base = ctx.stype(target_type).base;
                if base == TypeBase::Unknown {
                    return Outcome::Deferred(format!("typedef \"{}\" is unresolved", name));
                }
                (TypeRef::Typedef(tpdf), base)
            }
            Ok(None) => {
                return schema_err(
                    ErrorKind::Inval,
                    format!(
                        "type \"{}:{}\" not found",
                        module_name.as_deref().unwrap_or(""),
                        name
                    ),
                    item.line,
                )
            }
            Err(e) => return Outcome::Failed(e),
        }
    };

    // the chain link goes in first, restriction checks walk it
    {
        let spec = ctx.stype_mut(tid);
        spec.der = Some(der);
        spec.base = base;
    }
    if let Err(e) = check_restrictions(ctx, tid, der, base, item) {
        let spec = ctx.stype_mut(tid);
        spec.der = None;
        spec.base = TypeBase::Unknown;
        return Outcome::Failed(e);
    }

    // per-leaf leafref records need the leaf, union members in typedefs
    // have none and resolve through the data tree only
    if base == TypeBase::Leafref {
        if let Some(node) = item.node {
            if let TypeInfo::Leafref {
                path: Some(path), ..
            } = &ctx.stype(tid).info
            {
                let payload = Arc::clone(path);
                queue.add(UnresItem {
                    kind: UnresKind::Leafref,
                    owner: UnresOwner::Type(tid),
                    module: item.module,
                    payload,
                    node: Some(node),
                    line: item.line,
                });
            }
        }
    }
    Outcome::Resolved
}

fn lookup_typedef(
    ctx: &Context,
    from: ModId,
    module_name: Option<&str>,
    name: &str,
    line: u32,
) -> Result<Option<TpdfId>> {
    if let Some(module_name) = module_name {
        if ctx.module_by_name_in_scope(from, Some(module_name)).is_none() {
            return Err(SchemaError::new(
                ErrorKind::Inmod,
                format!("module \"{}\" not imported", module_name),
            )
            .with_line(line)
            .into());
        }
    }
    Ok(ctx.find_typedef(from, module_name, name))
}

/// Check that the restrictions parsed onto `tid` fit the resolved base
/// and normalize their representation.
fn check_restrictions(
    ctx: &mut Context,
    tid: TypeId,
    der: TypeRef,
    base: TypeBase,
    item: &UnresItem,
) -> Result<()> {
    let at_definition = matches!(der, TypeRef::Builtin(_));
    let line = item.line;
    let fail = |kind: ErrorKind, msg: String| -> Result<()> {
        Err(SchemaError::new(kind, msg).with_line(line).into())
    };

    // take the parsed info, normalize, then put it back
    let info = std::mem::take(&mut ctx.stype_mut(tid).info);
    let normalized = match (info, base) {
        (TypeInfo::None, TypeBase::Dec64) if at_definition => {
            return fail(
                ErrorKind::Misselem,
                "decimal64 requires \"fraction-digits\"".into(),
            );
        }
        (TypeInfo::None, TypeBase::Enum) if at_definition => {
            return fail(ErrorKind::Misselem, "enumeration requires \"enum\"".into());
        }
        (TypeInfo::None, TypeBase::Bits) if at_definition => {
            return fail(ErrorKind::Misselem, "bits requires \"bit\"".into());
        }
        (TypeInfo::None, TypeBase::Union) if at_definition => {
            return fail(ErrorKind::Misselem, "union requires \"type\"".into());
        }
        (TypeInfo::None, TypeBase::Leafref) if at_definition => {
            return fail(ErrorKind::Misselem, "leafref requires \"path\"".into());
        }
        (TypeInfo::None, TypeBase::Ident) if at_definition => {
            return fail(ErrorKind::Misselem, "identityref requires \"base\"".into());
        }
        (TypeInfo::None, _) => TypeInfo::None,

        (TypeInfo::Str { length, patterns }, TypeBase::Str) => {
            TypeInfo::Str { length, patterns }
        }
        (TypeInfo::Str { length, patterns }, TypeBase::Binary) => {
            if !patterns.is_empty() {
                return fail(
                    ErrorKind::Spec,
                    "binary type cannot carry a pattern statement".into(),
                );
            }
            TypeInfo::Binary { length }
        }
        (TypeInfo::Num { range }, b) if b.is_signed() || b.is_unsigned() => {
            TypeInfo::Num { range }
        }
        (TypeInfo::Num { range }, TypeBase::Dec64) => TypeInfo::Dec64 { range, dig: 0 },
        (TypeInfo::Dec64 { range, dig }, TypeBase::Dec64) => {
            if dig > 0 && !at_definition {
                return fail(
                    ErrorKind::Spec,
                    "fraction-digits is only allowed where decimal64 is defined".into(),
                );
            }
            if at_definition && dig == 0 {
                return fail(
                    ErrorKind::Misselem,
                    "decimal64 requires \"fraction-digits\"".into(),
                );
            }
            TypeInfo::Dec64 { range, dig }
        }
        (TypeInfo::Enums { enums }, TypeBase::Enum) => {
            let mut enums = enums;
            if !at_definition {
                inherit_enum_values(ctx, tid, &mut enums, line)?;
            }
            TypeInfo::Enums { enums }
        }
        (TypeInfo::Bits { bits }, TypeBase::Bits) => {
            let mut bits = bits;
            if !at_definition {
                inherit_bit_positions(ctx, tid, &mut bits, line)?;
            }
            TypeInfo::Bits { bits }
        }
        (TypeInfo::Leafref { path, target }, TypeBase::Leafref) => {
            if !at_definition && path.is_some() {
                return fail(
                    ErrorKind::Spec,
                    "path is only allowed where leafref is defined".into(),
                );
            }
            let path = match path {
                Some(path) => Some(path),
                // carry the defining path down so each use resolves its
                // own target
                None => nearest_leafref_path(ctx, der),
            };
            TypeInfo::Leafref { path, target }
        }
        (TypeInfo::Ident { base_name, base }, TypeBase::Ident) => {
            let resolved = match (&base_name, base) {
                (_, Some(resolved)) => Some(resolved),
                (Some(name), None) => {
                    match find_identity(ctx, item.module, name) {
                        Some(id) => Some(id),
                        None => {
                            return fail(
                                ErrorKind::Inval,
                                format!("base identity \"{}\" not found", name),
                            )
                        }
                    }
                }
                (None, None) => None,
            };
            TypeInfo::Ident {
                base_name,
                base: resolved,
            }
        }
        (TypeInfo::Union { types }, TypeBase::Union) => {
            if at_definition && types.is_empty() {
                return fail(ErrorKind::Misselem, "union requires \"type\"".into());
            }
            TypeInfo::Union { types }
        }
        (other, base) => {
            let statement = match other {
                TypeInfo::Str { .. } => "length/pattern",
                TypeInfo::Num { .. } => "range",
                TypeInfo::Dec64 { .. } => "fraction-digits",
                TypeInfo::Enums { .. } => "enum",
                TypeInfo::Bits { .. } => "bit",
                TypeInfo::Leafref { .. } => "path",
                TypeInfo::Ident { .. } => "base",
                TypeInfo::Union { .. } => "type",
                _ => "restriction",
            };
            return fail(
                ErrorKind::Spec,
                format!(
                    "restriction \"{}\" not allowed for base type \"{}\"",
                    statement,
                    base.name()
                ),
            );
        }
    };
    ctx.stype_mut(tid).info = normalized;
    Ok(())
}

fn nearest_leafref_path(ctx: &Context, der: TypeRef) -> Option<Arc<str>> {
    let mut current = der;
    loop {
        match current {
            TypeRef::Builtin(_) => return None,
            TypeRef::Typedef(tpdf) => {
                let tid = ctx.typedef(tpdf).type_;
                if let TypeInfo::Leafref {
                    path: Some(path), ..
                } = &ctx.stype(tid).info
                {
                    return Some(Arc::clone(path));
                }
                current = ctx.stype(tid).der?;
            }
        }
    }
}

/// A derived enumeration may only restrict: every member must exist in
/// the ancestor definition and keeps the value assigned there.
fn inherit_enum_values(
    ctx: &Context,
    tid: TypeId,
    enums: &mut [crate::schema::EnumDef],
    line: u32,
) -> Result<()> {
    let chain = ctx.type_chain(tid);
    let ancestor = chain[1..]
        .iter()
        .find_map(|&link| match &ctx.stype(link).info {
            TypeInfo::Enums { enums } => Some(enums),
            _ => None,
        })
        .ok_or_else(|| {
            Error::from(SchemaError::new(
                ErrorKind::Spec,
                "enumeration restriction without an ancestor definition".to_string(),
            ))
        })?;
    for member in enums.iter_mut() {
        match ancestor.iter().find(|a| a.name == member.name) {
            Some(a) => member.value = a.value,
            None => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("enum \"{}\" is not part of the base type", member.name),
                )
                .with_line(line)
                .into())
            }
        }
    }
    Ok(())
}

fn inherit_bit_positions(
    ctx: &Context,
    tid: TypeId,
    bits: &mut [crate::schema::BitDef],
    line: u32,
) -> Result<()> {
    let chain = ctx.type_chain(tid);
    let ancestor = chain[1..]
        .iter()
        .find_map(|&link| match &ctx.stype(link).info {
            TypeInfo::Bits { bits } => Some(bits),
            _ => None,
        })
        .ok_or_else(|| {
            Error::from(SchemaError::new(
                ErrorKind::Spec,
                "bits restriction without an ancestor definition".to_string(),
            ))
        })?;
    for member in bits.iter_mut() {
        match ancestor.iter().find(|a| a.name == member.name) {
            Some(a) => member.pos = a.pos,
            None => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("bit \"{}\" is not part of the base type", member.name),
                )
                .with_line(line)
                .into())
            }
        }
    }
    Ok(())
}

// =============================================================================
// IDENTITY
// =============================================================================

fn find_identity(ctx: &Context, from: ModId, canonical: &str) -> Option<IdentId> {
    let (module_name, local) = crate::names::split_prefixed(canonical);
    let module = ctx.module_by_name_in_scope(from, module_name)?;
    ctx.module(module)
        .identity_index(local)
        .map(|index| IdentId { module, index })
}

fn resolve_identity(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let owner = match item.owner {
        UnresOwner::Ident(id) => id,
        _ => return Outcome::Failed(Error::Internal("identity entry without owner".into())),
    };
    let base = match find_identity(ctx, item.module, &item.payload) {
        Some(base) => base,
        None => {
            return schema_err(
                ErrorKind::Inval,
                format!("base identity \"{}\" not found", item.payload),
                item.line,
            )
        }
    };
    if base == owner {
        return schema_err(
            ErrorKind::Circular,
            format!(
                "identity \"{}\" cannot use itself as a base",
                ctx.module(owner.module).identities[owner.index].name
            ),
            item.line,
        );
    }
    ctx.module_mut(owner.module).identities[owner.index].base = Some(base);

    // cycle check over the resolved part of the DAG
    let mut walk = Some(base);
    let mut depth = 0;
    while let Some(id) = walk {
        if id == owner {
            ctx.module_mut(owner.module).identities[owner.index].base = None;
            return schema_err(
                ErrorKind::Circular,
                format!("identity base cycle through \"{}\"", item.payload),
                item.line,
            );
        }
        depth += 1;
        if depth > 256 {
            return Outcome::Failed(Error::Internal("identity chain too deep".into()));
        }
        walk = ctx.module(id.module).identities[id.index].base;
    }
    Outcome::Resolved
}

// =============================================================================
// Schema tree searching
// =============================================================================

/// Find a data-visible child by module name and local name
///
/// Walks transparently through choice, case and uses nodes and skips
/// groupings, rpcs and notifications. `saw_unexpanded` is raised when an
/// unexpanded uses was encountered, so callers can defer.
pub(crate) fn find_data_child(
    ctx: &Context,
    head: Option<SnodeId>,
    module_name: &str,
    name: &str,
    saw_unexpanded: &mut bool,
) -> Option<SnodeId> {
    for sib in ctx.tree.siblings(head) {
        let n = ctx.snode(sib);
        match &n.kind {
            SnodeKind::Grouping | SnodeKind::Rpc | SnodeKind::Notification | SnodeKind::Input
            | SnodeKind::Output | SnodeKind::Augment { .. } => continue,
            SnodeKind::Choice { .. } | SnodeKind::Case => {
                if let Some(found) =
                    find_data_child(ctx, n.child, module_name, name, saw_unexpanded)
                {
                    return Some(found);
                }
            }
            SnodeKind::Uses { expanded, .. } => {
                if !expanded {
                    *saw_unexpanded = true;
                }
                if let Some(found) =
                    find_data_child(ctx, n.child, module_name, name, saw_unexpanded)
                {
                    return Some(found);
                }
            }
            _ => {
                if &*n.name == name && &*ctx.module(n.module).name == module_name {
                    return Some(sib);
                }
            }
        }
    }
    None
}

// =============================================================================
// LEAFREF
// =============================================================================

fn resolve_leafref(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let tid = match item.owner {
        UnresOwner::Type(tid) => tid,
        _ => return Outcome::Failed(Error::Internal("leafref entry without type owner".into())),
    };
    let leaf = match item.node {
        Some(leaf) => leaf,
        None => return Outcome::Resolved,
    };
    let path = match crate::xpath::parse_leafref_path(&item.payload) {
        Ok(path) => path,
        Err(e) => return Outcome::Failed(e),
    };
    let leaf_module_name = Arc::clone(&ctx.module(ctx.snode(leaf).module).name);

    let mut saw_unexpanded = false;
    let mut context_node: Option<SnodeId> = None;
    if path.absolute {
        // start at the root ring of the module owning the first step
        let first_module = path.steps[0]
            .prefix
            .clone()
            .unwrap_or_else(|| leaf_module_name.to_string());
        let module = match ctx
            .module_ids()
            .find(|&id| &*ctx.module(id).name == first_module)
        {
            Some(m) => m,
            None => {
                return schema_err(
                    ErrorKind::Inmod,
                    format!("module \"{}\" of leafref path not found", first_module),
                    item.line,
                )
            }
        };
        let mut head = ctx.module(module).data;
        for (i, step) in path.steps.iter().enumerate() {
            let module_name = step
                .prefix
                .clone()
                .unwrap_or_else(|| leaf_module_name.to_string());
            match find_data_child(ctx, head, &module_name, &step.name, &mut saw_unexpanded) {
                Some(found) => {
                    if let Err(e) = check_step_predicates(ctx, found, step, item.line) {
                        return Outcome::Failed(e);
                    }
                    context_node = Some(found);
                    if i + 1 < path.steps.len() {
                        head = ctx.snode(found).child;
                    }
                }
                None => {
                    if saw_unexpanded {
                        return Outcome::Deferred(format!(
                            "leafref step \"{}\" hidden behind an unexpanded uses",
                            step.name
                        ));
                    }
                    return schema_err(
                        ErrorKind::LeafrefTarget,
                        format!("leafref path \"{}\" has no target", item.payload),
                        item.line,
                    );
                }
            }
        }
    } else {
        // relative paths are evaluated with the leaf as context node
        let mut context = Some(leaf);
        for _ in 0..path.up {
            context = match context {
                Some(c) => effective_parent(ctx, c),
                None => None,
            };
        }
        let mut head = match context {
            Some(c) => ctx.snode(c).child,
            None => ctx.module(ctx.snode(leaf).module).data,
        };
        for (i, step) in path.steps.iter().enumerate() {
            let module_name = step
                .prefix
                .clone()
                .unwrap_or_else(|| leaf_module_name.to_string());
            match find_data_child(ctx, head, &module_name, &step.name, &mut saw_unexpanded) {
                Some(found) => {
                    if let Err(e) = check_step_predicates(ctx, found, step, item.line) {
                        return Outcome::Failed(e);
                    }
                    context_node = Some(found);
                    if i + 1 < path.steps.len() {
                        head = ctx.snode(found).child;
                    }
                }
                None => {
                    if saw_unexpanded {
                        return Outcome::Deferred(format!(
                            "leafref step \"{}\" hidden behind an unexpanded uses",
                            step.name
                        ));
                    }
                    return schema_err(
                        ErrorKind::LeafrefTarget,
                        format!("leafref path \"{}\" has no target", item.payload),
                        item.line,
                    );
                }
            }
        }
    }

    let target = match context_node {
        Some(t) => t,
        None => {
            return schema_err(
                ErrorKind::LeafrefTarget,
                format!("leafref path \"{}\" has no target", item.payload),
                item.line,
            )
        }
    };
    if !matches!(ctx.snode(target).kind, SnodeKind::Leaf { .. }) {
        return schema_err(
            ErrorKind::LeafrefTarget,
            format!("leafref path \"{}\" does not point at a leaf", item.payload),
            item.line,
        );
    }
    if let TypeInfo::Leafref {
        target: slot, ..
    } = &mut ctx.stype_mut(tid).info
    {
        *slot = Some(target);
    }
    Outcome::Resolved
}

/// Each path predicate key must name a leaf child of the step node
fn check_step_predicates(
    ctx: &Context,
    step_node: SnodeId,
    step: &crate::xpath::PathStep,
    line: u32,
) -> Result<()> {
    for pred in &step.predicates {
        let module_name = pred
            .key_prefix
            .clone()
            .unwrap_or_else(|| ctx.module(ctx.snode(step_node).module).name.to_string());
        let mut saw = false;
        let child =
            find_data_child(ctx, ctx.snode(step_node).child, &module_name, &pred.key, &mut saw);
        match child {
            Some(c) if matches!(ctx.snode(c).kind, SnodeKind::Leaf { .. }) => {}
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::LeafrefTarget,
                    format!("path predicate key \"{}\" is not a leaf", pred.key),
                )
                .with_line(line)
                .into())
            }
        }
    }
    Ok(())
}

/// Parent for path evaluation, stepping over uses and case/choice layers
fn effective_parent(ctx: &Context, node: SnodeId) -> Option<SnodeId> {
    let mut current = ctx.snode(node).parent;
    while let Some(id) = current {
        match ctx.snode(id).kind {
            SnodeKind::Uses { .. } | SnodeKind::Case | SnodeKind::Choice { .. } => {
                current = ctx.snode(id).parent;
            }
            _ => return Some(id),
        }
    }
    None
}

// =============================================================================
// USES
// =============================================================================

fn resolve_uses(ctx: &mut Context, queue: &mut UnresQueue, item: &UnresItem) -> Outcome {
    let uses = match item.owner {
        UnresOwner::Snode(id) => id,
        _ => return Outcome::Failed(Error::Internal("uses entry without node owner".into())),
    };
    if matches!(ctx.snode(uses).kind, SnodeKind::Uses { expanded: true, .. }) {
        return Outcome::Resolved;
    }
    let grouping = match find_grouping(ctx, uses, item.module, &item.payload) {
        Some(g) => g,
        None => {
            return schema_err(
                ErrorKind::Inval,
                format!("grouping \"{}\" not found", item.payload),
                item.line,
            )
        }
    };

    if !grouping_ready(ctx, grouping) {
        return Outcome::Deferred(format!("grouping \"{}\" is not fully resolved", item.payload));
    }

    // instantiate a deep copy of the grouping children under the uses
    let children: Vec<SnodeId> = ctx.tree.children(grouping).collect();
    for child in children {
        if matches!(ctx.snode(child).kind, SnodeKind::Grouping) {
            continue;
        }
        let copy = match copy_subtree(ctx, queue, child, item.module, Some(item.line)) {
            Ok(copy) => copy,
            Err(e) => return Outcome::Failed(e),
        };
        let mut head = ctx.snode(uses).child;
        if let Err(e) = ctx.tree.add_child(Some(uses), &mut head, copy) {
            return Outcome::Failed(e);
        }
        if ctx.snode(uses).child.is_none() {
            ctx.snode_mut(uses).child = head;
        }
    }

    let (refines, augments) = match &ctx.snode(uses).kind {
        SnodeKind::Uses {
            refines, augments, ..
        } => (refines.clone(), augments.clone()),
        _ => return Outcome::Failed(Error::Internal("uses node lost its kind".into())),
    };

    for refine in &refines {
        if let Err(e) = apply_refine(ctx, uses, refine) {
            return Outcome::Failed(e);
        }
    }

    for aug in augments {
        if let Err(e) = splice_augment(ctx, aug, Some(uses)) {
            return Outcome::Failed(e);
        }
    }

    if let SnodeKind::Uses {
        grouping: slot,
        expanded,
        ..
    } = &mut ctx.snode_mut(uses).kind
    {
        *slot = Some(grouping);
        *expanded = true;
    }
    Outcome::Resolved
}

/// Locate a grouping: ancestor levels first, then the module root, then
/// the root of a named module.
fn find_grouping(ctx: &Context, uses: SnodeId, module: ModId, canonical: &str) -> Option<SnodeId> {
    let (module_name, local) = crate::names::split_prefixed(canonical);
    let search_ring = |head: Option<SnodeId>| -> Option<SnodeId> {
        ctx.tree.siblings(head).find(|&sib| {
            matches!(ctx.snode(sib).kind, SnodeKind::Grouping) && &*ctx.snode(sib).name == local
        })
    };

    match module_name {
        Some(name) if name != &*ctx.module(module).name => {
            let target = ctx.module_by_name_in_scope(module, Some(name))?;
            search_ring(ctx.module(target).data)
        }
        _ => {
            let mut scope = ctx.snode(uses).parent;
            while let Some(level) = scope {
                if let Some(found) = search_ring(ctx.snode(level).child) {
                    return Some(found);
                }
                scope = ctx.snode(level).parent;
            }
            search_ring(ctx.module(module).data)
        }
    }
}

/// A grouping is ready when its subtree has no unexpanded uses and every
/// type descriptor in it is resolved.
fn grouping_ready(ctx: &Context, grouping: SnodeId) -> bool {
    let mut stack: Vec<SnodeId> = ctx.tree.children(grouping).collect();
    while let Some(id) = stack.pop() {
        let n = ctx.snode(id);
        if let SnodeKind::Uses { expanded, .. } = n.kind {
            if !expanded {
                return false;
            }
        }
        let type_ = match &n.kind {
            SnodeKind::Leaf { type_, .. } | SnodeKind::LeafList { type_, .. } => Some(*type_),
            _ => None,
        };
        if let Some(tid) = type_ {
            if ctx.stype(tid).base == TypeBase::Unknown {
                return false;
            }
        }
        stack.extend(ctx.tree.children(id));
    }
    true
}

fn copy_type(ctx: &mut Context, tid: TypeId) -> TypeId {
    let mut spec = ctx.stype(tid).clone();
    let members = match &spec.info {
        TypeInfo::Union { types } => Some(types.clone()),
        _ => None,
    };
    if let Some(members) = members {
        let copied: Vec<TypeId> = members.into_iter().map(|t| copy_type(ctx, t)).collect();
        spec.info = TypeInfo::Union { types: copied };
    }
    ctx.alloc_type(spec)
}

/// Deep-copy a schema subtree for a uses expansion
fn copy_subtree(
    ctx: &mut Context,
    queue: &mut UnresQueue,
    node: SnodeId,
    module: ModId,
    line: Option<u32>,
) -> Result<SnodeId> {
    let mut copy = ctx.snode(node).clone();
    copy.parent = None;
    copy.child = None;
    copy.next = None;

    match &mut copy.kind {
        SnodeKind::Leaf { type_, .. } | SnodeKind::LeafList { type_, .. } => {
            *type_ = copy_type(ctx, *type_);
        }
        SnodeKind::Uses { .. } => {}
        _ => {}
    }
    let copy_id = ctx.tree.alloc(copy);

    // leafref targets are positional, each instantiation resolves anew
    match &ctx.snode(copy_id).kind {
        SnodeKind::Leaf { type_, .. } | SnodeKind::LeafList { type_, .. } => {
            let tid = *type_;
            if ctx.stype(tid).base == TypeBase::Leafref {
                if let TypeInfo::Leafref { path, target } = &mut ctx.stype_mut(tid).info {
                    *target = None;
                    if let Some(path) = path.clone() {
                        queue.add(UnresItem {
                            kind: UnresKind::Leafref,
                            owner: UnresOwner::Type(tid),
                            module,
                            payload: path,
                            node: Some(copy_id),
                            line: line.unwrap_or(0),
                        });
                    }
                }
            }
        }
        _ => {}
    }

    let children: Vec<SnodeId> = ctx.tree.children(node).collect();
    for child in children {
        if matches!(ctx.snode(child).kind, SnodeKind::Grouping) {
            continue;
        }
        let child_copy = copy_subtree(ctx, queue, child, module, line)?;
        let mut head = ctx.snode(copy_id).child;
        ctx.tree.add_child(Some(copy_id), &mut head, child_copy)?;
        if ctx.snode(copy_id).child.is_none() {
            ctx.snode_mut(copy_id).child = head;
        }
    }
    Ok(copy_id)
}

/// Locate a refine target below the uses and apply the overrides
fn apply_refine(ctx: &mut Context, uses: SnodeId, refine: &crate::schema::node::Refine) -> Result<()> {
    let own_module_name = Arc::clone(&ctx.module(ctx.snode(uses).module).name);
    let mut current = uses;
    for part in refine.target.split('/') {
        let (prefix, local) = crate::names::split_prefixed(part);
        let step_module = prefix.unwrap_or(&own_module_name);
        let mut saw = false;
        current = find_data_child(ctx, ctx.snode(current).child, step_module, local, &mut saw)
            .ok_or_else(|| {
                Error::from(
                    SchemaError::new(
                        ErrorKind::Inval,
                        format!("refine target \"{}\" not found", refine.target),
                    )
                    .with_line(refine.line),
                )
            })?;
    }

    let node = ctx.snode_mut(current);
    if let Some(dsc) = &refine.dsc {
        node.dsc = Some(Arc::clone(dsc));
    }
    if let Some(reference) = &refine.reference {
        node.reference = Some(Arc::clone(reference));
    }
    if let Some(config) = refine.config {
        node.flags &= !flags::CONFIG_MASK;
        node.flags |= if config { flags::CONFIG_W } else { flags::CONFIG_R };
    }
    if let Some(mandatory) = refine.mandatory {
        node.flags &= !flags::MAND_MASK;
        node.flags |= if mandatory { flags::MAND_TRUE } else { flags::MAND_FALSE };
    }
    node.musts.extend(refine.musts.iter().cloned());
    match &mut node.kind {
        SnodeKind::Container { presence } => {
            if let Some(p) = &refine.presence {
                *presence = Some(Arc::clone(p));
            }
        }
        SnodeKind::Leaf { dflt, .. } => {
            if let Some(d) = &refine.dflt {
                *dflt = Some(Arc::clone(d));
            }
        }
        SnodeKind::Choice { dflt_name, .. } => {
            if let Some(d) = &refine.dflt {
                *dflt_name = Some(Arc::clone(d));
            }
        }
        SnodeKind::LeafList { min, max, .. } | SnodeKind::List { min, max, .. } => {
            if let Some(m) = refine.min {
                *min = m;
            }
            if let Some(m) = refine.max {
                *max = m;
            }
        }
        _ => {}
    }
    Ok(())
}

// =============================================================================
// AUGMENT
// =============================================================================

fn resolve_augment(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let aug = match item.owner {
        UnresOwner::Snode(id) => id,
        _ => return Outcome::Failed(Error::Internal("augment entry without owner".into())),
    };
    match splice_augment(ctx, aug, None) {
        Ok(true) => Outcome::Resolved,
        Ok(false) => Outcome::Deferred("augment target behind an unexpanded uses".into()),
        Err(e) => Outcome::Failed(e),
    }
}

/// Splice an augment's children into its target
///
/// `scope` is the uses node for uses-level augments, `None` for
/// module-level ones (absolute target paths). Returns false when the
/// target is still hidden behind an unexpanded uses.
fn splice_augment(ctx: &mut Context, aug: SnodeId, scope: Option<SnodeId>) -> Result<bool> {
    let (target_path, already) = match &ctx.snode(aug).kind {
        SnodeKind::Augment {
            target_path,
            target,
            ..
        } => (Arc::clone(target_path), target.is_some()),
        _ => return Err(Error::Internal("augment node lost its kind".into())),
    };
    if already {
        return Ok(true);
    }
    let line = ctx.snode(aug).line;
    let module = ctx.snode(aug).module;
    let module_name = Arc::clone(&ctx.module(module).name);

    let mut saw_unexpanded = false;
    let mut current: Option<SnodeId> = scope;
    let mut head = match scope {
        Some(s) => ctx.snode(s).child,
        None => None,
    };
    for (i, part) in target_path.trim_start_matches('/').split('/').enumerate() {
        let (prefix, local) = crate::names::split_prefixed(part);
        let step_module = prefix.unwrap_or(&*module_name);
        if i == 0 && scope.is_none() {
            let target_mod = ctx
                .module_ids()
                .find(|&id| &*ctx.module(id).name == step_module)
                .ok_or_else(|| {
                    Error::from(
                        SchemaError::new(
                            ErrorKind::Inmod,
                            format!("augment target module \"{}\" not found", step_module),
                        )
                        .with_line(line),
                    )
                })?;
            head = ctx.module(target_mod).data;
        }
        match find_data_child(ctx, head, step_module, local, &mut saw_unexpanded) {
            Some(found) => {
                current = Some(found);
                head = ctx.snode(found).child;
            }
            None => {
                if saw_unexpanded {
                    return Ok(false);
                }
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("augment target \"{}\" not found", target_path),
                )
                .with_line(line)
                .into());
            }
        }
    }
    let target = current.ok_or_else(|| {
        Error::from(
            SchemaError::new(
                ErrorKind::Inval,
                format!("augment target \"{}\" not found", target_path),
            )
            .with_line(line),
        )
    })?;

    // move the children over, tagging them with the augmenting module
    let children: Vec<SnodeId> = ctx.tree.children(aug).collect();
    ctx.snode_mut(aug).child = None;
    let target_config = ctx.snode(target).flags & flags::CONFIG_MASK;
    let mut spliced = Vec::with_capacity(children.len());
    for child in children {
        {
            let n = ctx.snode_mut(child);
            n.parent = None;
            n.next = None;
        }
        let me = child;
        ctx.snode_mut(me).prev = me;
        if ctx.snode(child).flags & flags::CONFIG_MASK == 0 {
            ctx.snode_mut(child).flags |= target_config;
        }
        let mut head = ctx.snode(target).child;
        ctx.tree.add_child(Some(target), &mut head, child)?;
        if ctx.snode(target).child.is_none() {
            ctx.snode_mut(target).child = head;
        }
        spliced.push(child);
    }

    if let SnodeKind::Augment {
        target: slot,
        spliced: splice_slot,
        ..
    } = &mut ctx.snode_mut(aug).kind
    {
        *slot = Some(target);
        *splice_slot = spliced;
    }
    Ok(true)
}

// =============================================================================
// IFFEAT
// =============================================================================

fn resolve_iffeat(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let (module_name, local) = crate::names::split_prefixed(&item.payload);
    let module = match ctx.module_by_name_in_scope(item.module, module_name) {
        Some(m) => m,
        None => {
            return schema_err(
                ErrorKind::Inmod,
                format!("module of feature \"{}\" not found", item.payload),
                item.line,
            )
        }
    };
    let index = match ctx.module(module).feature_index(local) {
        Some(i) => i,
        None => {
            return schema_err(
                ErrorKind::Inval,
                format!("feature \"{}\" not found", item.payload),
                item.line,
            )
        }
    };
    let feat = FeatId { module, index };
    match item.owner {
        UnresOwner::Snode(node) => ctx.snode_mut(node).iffeatures.push(feat),
        UnresOwner::Feature(owner) => {
            ctx.module_mut(owner.module).features[owner.index]
                .iffeatures
                .push(feat);
        }
        _ => return Outcome::Failed(Error::Internal("if-feature entry without owner".into())),
    }
    Outcome::Resolved
}

// =============================================================================
// LIST KEYS and UNIQUE
// =============================================================================

fn resolve_list_keys(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let list = match item.owner {
        UnresOwner::Snode(id) => id,
        _ => return Outcome::Failed(Error::Internal("key entry without owner".into())),
    };
    let list_module_name = Arc::clone(&ctx.module(ctx.snode(list).module).name);
    let list_config = ctx.snode(list).flags & flags::CONFIG_MASK;
    let mut keys = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for token in item.payload.split_whitespace() {
        if seen.contains(&token) {
            return schema_err(
                ErrorKind::Inval,
                format!("key \"{}\" listed twice", token),
                item.line,
            );
        }
        seen.push(token);
        let mut saw_unexpanded = false;
        let found = find_direct_leaf(ctx, list, &list_module_name, token, &mut saw_unexpanded);
        let key = match found {
            Some(k) => k,
            None => {
                if saw_unexpanded {
                    return Outcome::Deferred(format!(
                        "key \"{}\" hidden behind an unexpanded uses",
                        token
                    ));
                }
                return schema_err(
                    ErrorKind::Misselem,
                    format!("key \"{}\" is not a child leaf of the list", token),
                    item.line,
                );
            }
        };
        match ctx.snode(key).kind {
            SnodeKind::Leaf { .. } => {}
            SnodeKind::LeafList { .. } => {
                return schema_err(
                    ErrorKind::Inval,
                    format!("leaf-list \"{}\" cannot be a list key", token),
                    item.line,
                )
            }
            _ => {
                return schema_err(
                    ErrorKind::Inval,
                    format!("key \"{}\" is not a leaf", token),
                    item.line,
                )
            }
        }
        let key_flags = ctx.snode(key).flags;
        if key_flags & flags::CONFIG_MASK != 0 && key_flags & flags::CONFIG_MASK != list_config {
            return schema_err(
                ErrorKind::Inval,
                format!("key \"{}\" differs from the list in config", token),
                item.line,
            );
        }
        if key_flags & flags::MAND_FALSE != 0 {
            return schema_err(
                ErrorKind::Inval,
                format!("key \"{}\" cannot be mandatory false", token),
                item.line,
            );
        }
        {
            let n = ctx.snode_mut(key);
            n.flags &= !flags::MAND_MASK;
            n.flags |= flags::KEY | flags::MAND_TRUE;
        }
        keys.push(key);
    }

    if let SnodeKind::List { keys: slot, .. } = &mut ctx.snode_mut(list).kind {
        *slot = keys;
    }
    Outcome::Resolved
}

/// Direct children of a list, looking through uses but not choices
fn find_direct_leaf(
    ctx: &Context,
    list: SnodeId,
    module_name: &str,
    name: &str,
    saw_unexpanded: &mut bool,
) -> Option<SnodeId> {
    fn walk(
        ctx: &Context,
        head: Option<SnodeId>,
        module_name: &str,
        name: &str,
        saw_unexpanded: &mut bool,
    ) -> Option<SnodeId> {
        for sib in ctx.tree.siblings(head) {
            let n = ctx.snode(sib);
            match &n.kind {
                SnodeKind::Uses { expanded, .. } => {
                    if !expanded {
                        *saw_unexpanded = true;
                    }
                    if let Some(found) = walk(ctx, n.child, module_name, name, saw_unexpanded) {
                        return Some(found);
                    }
                }
                _ => {
                    if &*n.name == name && &*ctx.module(n.module).name == module_name {
                        return Some(sib);
                    }
                }
            }
        }
        None
    }
    walk(ctx, ctx.snode(list).child, module_name, name, saw_unexpanded)
}

fn resolve_list_unique(ctx: &mut Context, item: &UnresItem, set: usize) -> Outcome {
    let list = match item.owner {
        UnresOwner::Snode(id) => id,
        _ => return Outcome::Failed(Error::Internal("unique entry without owner".into())),
    };
    let list_module_name = Arc::clone(&ctx.module(ctx.snode(list).module).name);
    let exprs = match &ctx.snode(list).kind {
        SnodeKind::List { unique, .. } => unique[set].exprs.clone(),
        _ => return Outcome::Failed(Error::Internal("unique entry on a non-list".into())),
    };

    let mut nodes = Vec::with_capacity(exprs.len());
    for expr in &exprs {
        let mut current = list;
        let mut saw_unexpanded = false;
        for part in expr.trim_start_matches('/').split('/') {
            let (prefix, local) = crate::names::split_prefixed(part);
            let module_name = prefix.unwrap_or(&*list_module_name);
            match find_data_child(
                ctx,
                ctx.snode(current).child,
                module_name,
                local,
                &mut saw_unexpanded,
            ) {
                Some(found) => current = found,
                None => {
                    if saw_unexpanded {
                        return Outcome::Deferred(format!(
                            "unique member \"{}\" hidden behind an unexpanded uses",
                            expr
                        ));
                    }
                    return schema_err(
                        ErrorKind::Inval,
                        format!("unique member \"{}\" not found", expr),
                        item.line,
                    );
                }
            }
        }
        if !matches!(ctx.snode(current).kind, SnodeKind::Leaf { .. }) {
            return schema_err(
                ErrorKind::Inval,
                format!("unique member \"{}\" is not a leaf", expr),
                item.line,
            );
        }
        nodes.push(current);
    }

    if let SnodeKind::List { unique, .. } = &mut ctx.snode_mut(list).kind {
        unique[set].nodes = nodes;
    }
    Outcome::Resolved
}

// =============================================================================
// Defaults
// =============================================================================

fn resolve_default(ctx: &mut Context, item: &UnresItem) -> Outcome {
    let (tid, what) = match item.owner {
        UnresOwner::Typedef(tpdf) => (ctx.typedef(tpdf).type_, "typedef"),
        UnresOwner::Snode(node) => match &ctx.snode(node).kind {
            SnodeKind::Leaf { type_, .. } => (*type_, "leaf"),
            SnodeKind::Choice { .. } => return Outcome::Resolved,
            _ => return Outcome::Failed(Error::Internal("default entry on a non-leaf".into())),
        },
        _ => return Outcome::Failed(Error::Internal("default entry without owner".into())),
    };
    if ctx.stype(tid).base == TypeBase::Unknown {
        return Outcome::Deferred(format!("type of the {} default is unresolved", what));
    }
    if ctx.stype(tid).base == TypeBase::Leafref {
        // leafref defaults can only be judged against instance data
        return Outcome::Resolved;
    }
    // schema defaults are already in canonical module:name form
    let resolver = |prefix: &str| -> Option<Arc<str>> { Some(Arc::from(prefix)) };
    match crate::value::decode(
        ctx,
        item.module,
        what,
        tid,
        &item.payload,
        crate::data::options::EDIT,
        &resolver,
    ) {
        Ok(_) => Outcome::Resolved,
        Err(e) => {
            let kind = e.kind().unwrap_or(ErrorKind::Inval);
            schema_err(
                kind,
                format!("invalid default \"{}\": {}", item.payload, e),
                item.line,
            )
        }
    }
}

/// Resolve a choice's default case once its children exist
pub(crate) fn resolve_choice_default(ctx: &mut Context, choice: SnodeId) -> Result<()> {
    let dflt_name = match &ctx.snode(choice).kind {
        SnodeKind::Choice {
            dflt_name: Some(name),
            ..
        } => Arc::clone(name),
        _ => return Ok(()),
    };
    let found = ctx
        .tree
        .children(choice)
        .find(|&c| &*ctx.snode(c).name == &*dflt_name);
    match found {
        Some(case) => {
            if let SnodeKind::Choice { dflt, .. } = &mut ctx.snode_mut(choice).kind {
                *dflt = Some(case);
            }
            Ok(())
        }
        None => Err(SchemaError::new(
            ErrorKind::Inarg,
            format!("default case \"{}\" not found in choice", dflt_name),
        )
        .with_line(ctx.snode(choice).line)
        .into()),
    }
}
