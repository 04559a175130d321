//! Schema front-ends
//!
//! The YANG text parser and the YIN XML parser both reduce their input to
//! the same [`Stmt`] tree, which one builder walks to construct the
//! schema model. The builder applies what it can check locally and
//! enqueues everything else for the resolver: type bases, identity
//! bases, leafref targets, grouping expansions, augment targets,
//! if-feature references, list keys, unique sets and typedef defaults.

pub mod common;
pub mod yang;
pub mod yin;

use crate::context::{Context, SchemaFormat};
use crate::error::{ErrorKind, Result, SchemaError};
use crate::names::{check_identifier, is_revision_date, split_prefixed};
use crate::resolve::{UnresItem, UnresKind, UnresOwner, UnresQueue};
use crate::schema::node::{flags, Refine, When};
use crate::schema::{
    BitDef, EnumDef, FeatId, Feature, Identity, IdentId, Import, Include, ModId, Pattern,
    Restr, Revision, SchemaNode, SnodeId, SnodeKind, TpdfId, Typedef, TypeBase, TypeId,
    TypeInfo, TypeSpec, UniqueSet,
};
use common::{
    bad_arg, check_flag, check_string, config_flag, elements_arg, mandatory_flag, missing,
    status_flag, too_many,
};
use std::sync::Arc;

/// One parsed schema statement
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stmt {
    /// Statement keyword
    pub keyword: String,
    /// Statement argument
    pub arg: Option<String>,
    /// Sub-statements in document order
    pub children: Vec<Stmt>,
    /// Source line
    pub line: u32,
}

impl Stmt {
    fn arg(&self) -> Result<&str> {
        self.arg.as_deref().ok_or_else(|| {
            SchemaError::new(
                ErrorKind::Missattr,
                format!("statement \"{}\" requires an argument", self.keyword),
            )
            .with_line(self.line)
            .into()
        })
    }

    fn find(&self, keyword: &str) -> Option<&Stmt> {
        self.children.iter().find(|c| c.keyword == keyword)
    }
}

/// Parse and resolve one module from in-memory source
pub(crate) fn parse_module(ctx: &mut Context, data: &str, format: SchemaFormat) -> Result<ModId> {
    let stmt = match format {
        SchemaFormat::Yang => yang::parse(data)?,
        SchemaFormat::Yin => yin::parse(data)?,
    };
    if stmt.keyword == "submodule" {
        return Err(SchemaError::new(
            ErrorKind::Inval,
            "a submodule is loaded through the include of its module",
        )
        .with_line(stmt.line)
        .into());
    }
    if stmt.keyword != "module" {
        return Err(SchemaError::new(
            ErrorKind::Inval,
            format!("expected a module, found \"{}\"", stmt.keyword),
        )
        .with_line(stmt.line)
        .into());
    }
    build_module(ctx, &stmt)
}

fn build_module(ctx: &mut Context, stmt: &Stmt) -> Result<ModId> {
    let name = stmt.arg()?;
    check_identifier(name, "module", stmt.line)?;

    let ns_stmt = stmt
        .find("namespace")
        .ok_or_else(|| missing("namespace", "module", stmt.line))?;
    if stmt.children.iter().filter(|c| c.keyword == "namespace").count() > 1 {
        return Err(too_many("namespace", "module", stmt.line));
    }
    let prefix_stmt = stmt
        .find("prefix")
        .ok_or_else(|| missing("prefix", "module", stmt.line))?;
    if stmt.children.iter().filter(|c| c.keyword == "prefix").count() > 1 {
        return Err(too_many("prefix", "module", stmt.line));
    }
    let prefix = prefix_stmt.arg()?;
    check_identifier(prefix, "prefix", prefix_stmt.line)?;

    let mid = ModId(ctx.modules.len());
    let shell = crate::schema::Module::new(
        ctx.dict.insert(name),
        ctx.dict.insert(ns_stmt.arg()?),
        ctx.dict.insert(prefix),
    );
    ctx.modules.push(shell);
    ctx.parsing.push(name.to_string());

    let mut unres = UnresQueue::new();
    let result = apply_body(ctx, mid, &mut unres, stmt, false)
        .and_then(|_| ctx.check_module_uniqueness(mid))
        .and_then(|_| crate::resolve::resolve(ctx, &mut unres));
    ctx.parsing.pop();

    match result {
        Ok(()) => Ok(mid),
        Err(e) => {
            ctx.abandon_module(mid);
            Err(e)
        }
    }
}

/// Apply module or submodule body statements in document order
fn apply_body(
    ctx: &mut Context,
    mid: ModId,
    unres: &mut UnresQueue,
    stmt: &Stmt,
    submodule: bool,
) -> Result<()> {
    let mut yang_version_seen = false;
    for child in &stmt.children {
        match child.keyword.as_str() {
            // handled during shell creation
            "namespace" | "prefix" if !submodule => {}
            "belongs-to" if submodule => {}
            "yang-version" => {
                if yang_version_seen {
                    return Err(too_many("yang-version", "module", child.line));
                }
                yang_version_seen = true;
                if child.arg()? != "1" {
                    return Err(bad_arg(child.arg()?, "yang-version", child.line));
                }
            }
            "organization" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut ctx.module_mut(mid).org, "organization", "module", value, child.line)?;
            }
            "contact" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut ctx.module_mut(mid).contact, "contact", "module", value, child.line)?;
            }
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut ctx.module_mut(mid).dsc, "description", "module", value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut ctx.module_mut(mid).reference, "reference", "module", value, child.line)?;
            }
            "import" => build_import(ctx, mid, child)?,
            "include" => build_include(ctx, mid, unres, child)?,
            "revision" => {
                // submodule revisions stay on the include record
                if !submodule {
                    build_revision(ctx, mid, child)?;
                }
            }
            "feature" => build_feature(ctx, mid, unres, child)?,
            "identity" => build_identity(ctx, mid, unres, child)?,
            "typedef" => build_typedef(ctx, mid, unres, child)?,
            "augment" => {
                let aug = build_augment(ctx, mid, unres, child, true)?;
                ctx.module_mut(mid).augments.push(aug);
                unres.add(UnresItem {
                    kind: UnresKind::Augment,
                    owner: UnresOwner::Snode(aug),
                    module: mid,
                    payload: match &ctx.snode(aug).kind {
                        SnodeKind::Augment { target_path, .. } => Arc::clone(target_path),
                        _ => unreachable!(),
                    },
                    node: None,
                    line: child.line,
                });
            }
            "container" | "leaf" | "leaf-list" | "list" | "choice" | "anyxml" | "uses"
            | "grouping" | "rpc" | "notification" => {
                build_node(ctx, mid, unres, None, child)?;
            }
            "extension" | "deviation" => {
                // definitions of extensions and deviations are accepted
                // and otherwise ignored
            }
            other if other.contains(':') => {
                // vendor extension statement, skipped with its subtree
            }
            other => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in module", other),
                )
                .with_line(child.line)
                .into());
            }
        }
    }
    Ok(())
}

// =============================================================================
// Module-level statements
// =============================================================================

fn build_import(ctx: &mut Context, mid: ModId, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    check_identifier(name, "import", stmt.line)?;
    let prefix_stmt = stmt
        .find("prefix")
        .ok_or_else(|| missing("prefix", "import", stmt.line))?;
    let prefix = prefix_stmt.arg()?;
    check_identifier(prefix, "prefix", prefix_stmt.line)?;
    let revision = match stmt.find("revision-date") {
        Some(rev) => {
            let date = rev.arg()?;
            if !is_revision_date(date) {
                return Err(bad_arg(date, "revision-date", rev.line));
            }
            Some(ctx.dict.insert(date))
        }
        None => None,
    };

    {
        let module = ctx.module(mid);
        if &*module.prefix == prefix
            || module.imports.iter().any(|imp| &*imp.prefix == prefix)
        {
            return Err(SchemaError::new(
                ErrorKind::DupName,
                format!("prefix \"{}\" already in use", prefix),
            )
            .with_line(prefix_stmt.line)
            .into());
        }
    }

    let imported = ctx.load_module(name, revision.as_deref())?;

    if ctx.module(mid).imports.iter().any(|imp| imp.module == imported) {
        return Err(SchemaError::new(
            ErrorKind::Spec,
            format!("importing module \"{}\" repeatedly", name),
        )
        .with_line(stmt.line)
        .into());
    }
    let prefix = ctx.dict.insert(prefix);
    ctx.module_mut(mid).imports.push(Import {
        module: imported,
        prefix,
        revision,
    });
    Ok(())
}

fn build_include(ctx: &mut Context, mid: ModId, unres: &mut UnresQueue, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    check_identifier(name, "include", stmt.line)?;
    if ctx.parsing.iter().any(|p| p == name) {
        return Err(SchemaError::new(
            ErrorKind::Circular,
            format!("circular include dependency on submodule \"{}\"", name),
        )
        .with_line(stmt.line)
        .into());
    }
    let revision = match stmt.find("revision-date") {
        Some(rev) => Some(ctx.dict.insert(rev.arg()?)),
        None => None,
    };

    let (source, format) = match ctx.locate_file(name, revision.as_deref()) {
        Some((path, format)) => (std::fs::read_to_string(path)?, format),
        None => {
            return Err(SchemaError::new(
                ErrorKind::Inmod,
                format!("submodule \"{}\" not found", name),
            )
            .with_line(stmt.line)
            .into())
        }
    };
    let sub = match format {
        SchemaFormat::Yang => yang::parse(&source)?,
        SchemaFormat::Yin => yin::parse(&source)?,
    };
    if sub.keyword != "submodule" {
        return Err(SchemaError::new(
            ErrorKind::Inval,
            format!("included \"{}\" is not a submodule", name),
        )
        .with_line(stmt.line)
        .into());
    }
    let belongs = sub
        .find("belongs-to")
        .ok_or_else(|| missing("belongs-to", "submodule", sub.line))?;
    if belongs.arg()? != &*ctx.module(mid).name {
        return Err(SchemaError::new(
            ErrorKind::Inval,
            format!(
                "submodule \"{}\" belongs to \"{}\", not \"{}\"",
                name,
                belongs.arg()?,
                ctx.module(mid).name
            ),
        )
        .with_line(belongs.line)
        .into());
    }

    // the submodule's own prefix aliases the owning module
    let sub_prefix = belongs
        .find("prefix")
        .ok_or_else(|| missing("prefix", "belongs-to", belongs.line))?
        .arg()?
        .to_string();
    let alias_needed = sub_prefix != &*ctx.module(mid).prefix;
    if alias_needed {
        let prefix = ctx.dict.insert(&sub_prefix);
        ctx.module_mut(mid).imports.push(Import {
            module: mid,
            prefix,
            revision: None,
        });
    }

    ctx.parsing.push(name.to_string());
    let result = apply_body(ctx, mid, unres, &sub, true);
    ctx.parsing.pop();
    if alias_needed {
        let pos = ctx
            .module(mid)
            .imports
            .iter()
            .position(|imp| imp.module == mid);
        if let Some(pos) = pos {
            ctx.module_mut(mid).imports.remove(pos);
        }
    }
    result?;

    let name = ctx.dict.insert(name);
    ctx.module_mut(mid).includes.push(Include { name, revision });
    Ok(())
}

fn build_revision(ctx: &mut Context, mid: ModId, stmt: &Stmt) -> Result<()> {
    let date = stmt.arg()?;
    if !is_revision_date(date) {
        return Err(bad_arg(date, "revision", stmt.line));
    }
    let date = ctx.dict.insert(date);
    let slot = ctx.module_mut(mid).add_revision(Revision {
        date,
        dsc: None,
        reference: None,
    });
    for child in &stmt.children {
        match child.keyword.as_str() {
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                let rev = &mut ctx.module_mut(mid).revisions[slot];
                check_string(&mut rev.dsc, "description", "revision", value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                let rev = &mut ctx.module_mut(mid).revisions[slot];
                check_string(&mut rev.reference, "reference", "revision", value, child.line)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn build_feature(ctx: &mut Context, mid: ModId, unres: &mut UnresQueue, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    check_identifier(name, "feature", stmt.line)?;
    if ctx.module(mid).feature_index(name).is_some() {
        return Err(SchemaError::new(
            ErrorKind::DupName,
            format!("duplicated feature \"{}\"", name),
        )
        .with_line(stmt.line)
        .into());
    }
    let name = ctx.dict.insert(name);
    ctx.module_mut(mid).features.push(Feature::new(name));
    let index = ctx.module(mid).features.len() - 1;

    for child in &stmt.children {
        match child.keyword.as_str() {
            "if-feature" => {
                let expr = ctx.transform_expr(mid, child.arg()?, child.line)?;
                unres.add(UnresItem {
                    kind: UnresKind::IfFeat,
                    owner: UnresOwner::Feature(FeatId { module: mid, index }),
                    module: mid,
                    payload: expr,
                    node: None,
                    line: child.line,
                });
            }
            "status" => {
                let value = status_flag(child.arg()?, child.line)?;
                let f = &mut ctx.module_mut(mid).features[index];
                check_flag(&mut f.flags, flags::STATUS_MASK, value, "status", "feature", child.line)?;
            }
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                let f = &mut ctx.module_mut(mid).features[index];
                check_string(&mut f.dsc, "description", "feature", value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                let f = &mut ctx.module_mut(mid).features[index];
                check_string(&mut f.reference, "reference", "feature", value, child.line)?;
            }
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in feature", child.keyword),
                )
                .with_line(child.line)
                .into())
            }
        }
    }
    Ok(())
}

fn build_identity(ctx: &mut Context, mid: ModId, unres: &mut UnresQueue, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    check_identifier(name, "identity", stmt.line)?;
    if ctx.module(mid).identity_index(name).is_some() {
        return Err(SchemaError::new(
            ErrorKind::DupName,
            format!("duplicated identity \"{}\"", name),
        )
        .with_line(stmt.line)
        .into());
    }
    let name = ctx.dict.insert(name);
    ctx.module_mut(mid).identities.push(Identity {
        name,
        module: mid,
        base: None,
        flags: 0,
        dsc: None,
        reference: None,
    });
    let index = ctx.module(mid).identities.len() - 1;

    let mut base_seen = false;
    for child in &stmt.children {
        match child.keyword.as_str() {
            "base" => {
                if base_seen {
                    return Err(too_many("base", "identity", child.line));
                }
                base_seen = true;
                let expr = ctx.transform_expr(mid, child.arg()?, child.line)?;
                unres.add(UnresItem {
                    kind: UnresKind::Identity,
                    owner: UnresOwner::Ident(IdentId { module: mid, index }),
                    module: mid,
                    payload: expr,
                    node: None,
                    line: child.line,
                });
            }
            "status" => {
                let value = status_flag(child.arg()?, child.line)?;
                let i = &mut ctx.module_mut(mid).identities[index];
                check_flag(&mut i.flags, flags::STATUS_MASK, value, "status", "identity", child.line)?;
            }
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                let i = &mut ctx.module_mut(mid).identities[index];
                check_string(&mut i.dsc, "description", "identity", value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                let i = &mut ctx.module_mut(mid).identities[index];
                check_string(&mut i.reference, "reference", "identity", value, child.line)?;
            }
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in identity", child.keyword),
                )
                .with_line(child.line)
                .into())
            }
        }
    }
    Ok(())
}

fn build_typedef(ctx: &mut Context, mid: ModId, unres: &mut UnresQueue, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    check_identifier(name, "typedef", stmt.line)?;
    if TypeBase::from_name(name).is_some() {
        return Err(SchemaError::new(
            ErrorKind::Inarg,
            format!("typedef cannot shadow the built-in type \"{}\"", name),
        )
        .with_line(stmt.line)
        .into());
    }
    if ctx.module(mid).typedef_index(name).is_some() {
        return Err(SchemaError::new(
            ErrorKind::DupName,
            format!("duplicated typedef \"{}\"", name),
        )
        .with_line(stmt.line)
        .into());
    }

    let type_stmt = stmt
        .find("type")
        .ok_or_else(|| missing("type", "typedef", stmt.line))?;
    if stmt.children.iter().filter(|c| c.keyword == "type").count() > 1 {
        return Err(too_many("type", "typedef", stmt.line));
    }
    let type_ = read_type(ctx, mid, unres, type_stmt, None)?;

    let name = ctx.dict.insert(name);
    ctx.module_mut(mid).typedefs.push(Typedef {
        name,
        type_,
        units: None,
        dflt: None,
        flags: 0,
        dsc: None,
        reference: None,
    });
    let index = ctx.module(mid).typedefs.len() - 1;

    for child in &stmt.children {
        match child.keyword.as_str() {
            "type" => {}
            "units" => {
                let value = ctx.dict.insert(child.arg()?);
                let t = &mut ctx.module_mut(mid).typedefs[index];
                check_string(&mut t.units, "units", "typedef", value, child.line)?;
            }
            "default" => {
                let value = ctx.transform_expr(mid, child.arg()?, child.line)?;
                {
                    let t = &mut ctx.module_mut(mid).typedefs[index];
                    check_string(&mut t.dflt, "default", "typedef", Arc::clone(&value), child.line)?;
                }
                unres.add(UnresItem {
                    kind: UnresKind::TypedefDflt,
                    owner: UnresOwner::Typedef(TpdfId { module: mid, index }),
                    module: mid,
                    payload: value,
                    node: None,
                    line: child.line,
                });
            }
            "status" => {
                let value = status_flag(child.arg()?, child.line)?;
                let t = &mut ctx.module_mut(mid).typedefs[index];
                check_flag(&mut t.flags, flags::STATUS_MASK, value, "status", "typedef", child.line)?;
            }
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                let t = &mut ctx.module_mut(mid).typedefs[index];
                check_string(&mut t.dsc, "description", "typedef", value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                let t = &mut ctx.module_mut(mid).typedefs[index];
                check_string(&mut t.reference, "reference", "typedef", value, child.line)?;
            }
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in typedef", child.keyword),
                )
                .with_line(child.line)
                .into())
            }
        }
    }
    Ok(())
}

// =============================================================================
// Types
// =============================================================================

/// Build a type descriptor skeleton and enqueue its resolution
fn read_type(
    ctx: &mut Context,
    mid: ModId,
    unres: &mut UnresQueue,
    stmt: &Stmt,
    owner_node: Option<SnodeId>,
) -> Result<TypeId> {
    let written = stmt.arg()?;
    let (prefix, local) = split_prefixed(written);
    check_identifier(local, "type", stmt.line)?;
    let module_name = match prefix {
        Some(prefix) => match ctx.module(mid).prefix_to_name(prefix, &ctx.modules) {
            Some(name) => Some(Arc::clone(name)),
            None => {
                return Err(SchemaError::new(
                    ErrorKind::Inmod,
                    format!("prefix \"{}\" is not declared", prefix),
                )
                .with_line(stmt.line)
                .into())
            }
        },
        None => None,
    };
    let name = ctx.dict.insert(local);
    let tid = ctx.alloc_type(TypeSpec::named(name, module_name, stmt.line));

    for child in &stmt.children {
        match child.keyword.as_str() {
            "length" => read_length(ctx, tid, child)?,
            "pattern" => read_pattern(ctx, tid, child)?,
            "range" => read_range(ctx, tid, child)?,
            "fraction-digits" => read_fraction_digits(ctx, tid, child)?,
            "enum" => read_enum(ctx, tid, child)?,
            "bit" => read_bit(ctx, tid, child)?,
            "path" => read_path(ctx, mid, tid, child)?,
            "base" => read_identref_base(ctx, mid, tid, child)?,
            "type" => {
                let member = read_type(ctx, mid, unres, child, owner_node)?;
                match &mut ctx.stype_mut(tid).info {
                    info @ TypeInfo::None => {
                        *info = TypeInfo::Union {
                            types: vec![member],
                        }
                    }
                    TypeInfo::Union { types } => types.push(member),
                    _ => {
                        return Err(SchemaError::new(
                            ErrorKind::Spec,
                            "member types mixed with other restrictions",
                        )
                        .with_line(child.line)
                        .into())
                    }
                }
            }
            "require-instance" => {
                // accepted, instance presence is checked at the data layer
            }
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in type", child.keyword),
                )
                .with_line(child.line)
                .into())
            }
        }
    }

    unres.add(UnresItem {
        kind: UnresKind::Type,
        owner: UnresOwner::Type(tid),
        module: mid,
        payload: ctx.dict.insert(written),
        node: owner_node,
        line: stmt.line,
    });
    Ok(tid)
}

fn read_restr(ctx: &Context, stmt: &Stmt) -> Result<Restr> {
    let mut restr = Restr::new(ctx.dict.insert(stmt.arg()?));
    for child in &stmt.children {
        match child.keyword.as_str() {
            "error-message" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut restr.emsg, "error-message", &stmt.keyword, value, child.line)?;
            }
            "error-app-tag" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut restr.eapptag, "error-app-tag", &stmt.keyword, value, child.line)?;
            }
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut restr.dsc, "description", &stmt.keyword, value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut restr.reference, "reference", &stmt.keyword, value, child.line)?;
            }
            _ => {}
        }
    }
    Ok(restr)
}

fn read_length(ctx: &mut Context, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let restr = read_restr(ctx, stmt)?;
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => {
            *info = TypeInfo::Str {
                length: Some(restr),
                patterns: Vec::new(),
            }
        }
        TypeInfo::Str { length, .. } => {
            if length.is_some() {
                return Err(too_many("length", "type", stmt.line));
            }
            *length = Some(restr);
        }
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected length statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

fn read_pattern(ctx: &mut Context, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let mut pattern = Pattern::new(ctx.dict.insert(stmt.arg()?));
    for child in &stmt.children {
        match child.keyword.as_str() {
            "error-message" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut pattern.emsg, "error-message", "pattern", value, child.line)?;
            }
            "error-app-tag" => {
                let value = ctx.dict.insert(child.arg()?);
                check_string(&mut pattern.eapptag, "error-app-tag", "pattern", value, child.line)?;
            }
            _ => {}
        }
    }
    // reject unparsable expressions at parse time
    pattern.regex()?;
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => {
            *info = TypeInfo::Str {
                length: None,
                patterns: vec![pattern],
            }
        }
        TypeInfo::Str { patterns, .. } => patterns.push(pattern),
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected pattern statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

fn read_range(ctx: &mut Context, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let restr = read_restr(ctx, stmt)?;
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => *info = TypeInfo::Num { range: Some(restr) },
        TypeInfo::Num { range } | TypeInfo::Dec64 { range, .. } => {
            if range.is_some() {
                return Err(too_many("range", "type", stmt.line));
            }
            *range = Some(restr);
        }
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected range statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

fn read_fraction_digits(ctx: &mut Context, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let arg = stmt.arg()?;
    let dig: u8 = arg
        .parse()
        .ok()
        .filter(|d| (1..=18).contains(d))
        .ok_or_else(|| bad_arg(arg, "fraction-digits", stmt.line))?;
    let info = std::mem::take(&mut ctx.stype_mut(tid).info);
    let normalized = match info {
        TypeInfo::None => TypeInfo::Dec64 { range: None, dig },
        TypeInfo::Num { range } => TypeInfo::Dec64 { range, dig },
        TypeInfo::Dec64 { dig: existing, .. } if existing != 0 => {
            return Err(too_many("fraction-digits", "type", stmt.line));
        }
        TypeInfo::Dec64 { range, .. } => TypeInfo::Dec64 { range, dig },
        other => {
            ctx.stype_mut(tid).info = other;
            return Err(
                SchemaError::new(ErrorKind::Spec, "unexpected fraction-digits statement")
                    .with_line(stmt.line)
                    .into(),
            );
        }
    };
    ctx.stype_mut(tid).info = normalized;
    Ok(())
}

fn read_enum(ctx: &mut Context, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    if name.is_empty() || name.trim() != name {
        return Err(bad_arg(name, "enum", stmt.line));
    }
    let mut value: Option<i32> = None;
    let mut dsc = None;
    let mut reference = None;
    for child in &stmt.children {
        match child.keyword.as_str() {
            "value" => {
                if value.is_some() {
                    return Err(too_many("value", "enum", child.line));
                }
                value = Some(
                    child
                        .arg()?
                        .parse::<i32>()
                        .map_err(|_| bad_arg(child.arg().unwrap_or(""), "value", child.line))?,
                );
            }
            "description" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut dsc, "description", "enum", v, child.line)?;
            }
            "reference" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut reference, "reference", "enum", v, child.line)?;
            }
            "status" => {}
            _ => {}
        }
    }
    let name = ctx.dict.insert(name);
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => {
            *info = TypeInfo::Enums {
                enums: vec![EnumDef {
                    name,
                    value: value.unwrap_or(0),
                    dsc,
                    reference,
                }],
            }
        }
        TypeInfo::Enums { enums } => {
            if enums.iter().any(|e| e.name == name) {
                return Err(SchemaError::new(
                    ErrorKind::DupName,
                    format!("duplicated enum \"{}\"", name),
                )
                .with_line(stmt.line)
                .into());
            }
            let value = match value {
                Some(v) => {
                    if enums.iter().any(|e| e.value == v) {
                        return Err(bad_arg(&v.to_string(), "value", stmt.line));
                    }
                    v
                }
                None => enums.iter().map(|e| e.value).max().unwrap_or(-1) + 1,
            };
            enums.push(EnumDef {
                name,
                value,
                dsc,
                reference,
            });
        }
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected enum statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

fn read_bit(ctx: &mut Context, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let name = stmt.arg()?;
    check_identifier(name, "bit", stmt.line)?;
    let mut pos: Option<u32> = None;
    let mut dsc = None;
    let mut reference = None;
    for child in &stmt.children {
        match child.keyword.as_str() {
            "position" => {
                if pos.is_some() {
                    return Err(too_many("position", "bit", child.line));
                }
                pos = Some(
                    child
                        .arg()?
                        .parse::<u32>()
                        .map_err(|_| bad_arg(child.arg().unwrap_or(""), "position", child.line))?,
                );
            }
            "description" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut dsc, "description", "bit", v, child.line)?;
            }
            "reference" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut reference, "reference", "bit", v, child.line)?;
            }
            "status" => {}
            _ => {}
        }
    }
    let name = ctx.dict.insert(name);
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => {
            *info = TypeInfo::Bits {
                bits: vec![BitDef {
                    name,
                    pos: pos.unwrap_or(0),
                    dsc,
                    reference,
                }],
            }
        }
        TypeInfo::Bits { bits } => {
            if bits.iter().any(|b| b.name == name) {
                return Err(SchemaError::new(
                    ErrorKind::DupName,
                    format!("duplicated bit \"{}\"", name),
                )
                .with_line(stmt.line)
                .into());
            }
            let pos = match pos {
                Some(p) => {
                    if bits.iter().any(|b| b.pos == p) {
                        return Err(bad_arg(&p.to_string(), "position", stmt.line));
                    }
                    p
                }
                None => bits.iter().map(|b| b.pos).max().map(|p| p + 1).unwrap_or(0),
            };
            bits.push(BitDef {
                name,
                pos,
                dsc,
                reference,
            });
        }
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected bit statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

fn read_path(ctx: &mut Context, mid: ModId, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let canonical = ctx.transform_expr(mid, stmt.arg()?, stmt.line)?;
    // the path must parse even though the target resolves later
    crate::xpath::parse_leafref_path(&canonical)?;
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => {
            *info = TypeInfo::Leafref {
                path: Some(canonical),
                target: None,
            }
        }
        TypeInfo::Leafref { path, .. } => {
            if path.is_some() {
                return Err(too_many("path", "type", stmt.line));
            }
            *path = Some(canonical);
        }
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected path statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

fn read_identref_base(ctx: &mut Context, mid: ModId, tid: TypeId, stmt: &Stmt) -> Result<()> {
    let canonical = ctx.transform_expr(mid, stmt.arg()?, stmt.line)?;
    match &mut ctx.stype_mut(tid).info {
        info @ TypeInfo::None => {
            *info = TypeInfo::Ident {
                base_name: Some(canonical),
                base: None,
            }
        }
        TypeInfo::Ident { base_name, .. } => {
            if base_name.is_some() {
                return Err(too_many("base", "type", stmt.line));
            }
            *base_name = Some(canonical);
        }
        _ => {
            return Err(SchemaError::new(ErrorKind::Spec, "unexpected base statement")
                .with_line(stmt.line)
                .into())
        }
    }
    Ok(())
}

// =============================================================================
// Schema nodes
// =============================================================================

fn node_kind_for(keyword: &str, ctx: &mut Context, line: u32) -> Option<SnodeKind> {
    Some(match keyword {
        "container" => SnodeKind::Container { presence: None },
        "leaf" => SnodeKind::Leaf {
            type_: placeholder_type(ctx, line),
            dflt: None,
            units: None,
        },
        "leaf-list" => SnodeKind::LeafList {
            type_: placeholder_type(ctx, line),
            units: None,
            min: 0,
            max: 0,
        },
        "list" => SnodeKind::List {
            keys_str: None,
            keys: Vec::new(),
            unique: Vec::new(),
            min: 0,
            max: 0,
        },
        "choice" => SnodeKind::Choice {
            dflt_name: None,
            dflt: None,
        },
        "case" => SnodeKind::Case,
        "anyxml" => SnodeKind::Anyxml,
        "grouping" => SnodeKind::Grouping,
        "rpc" => SnodeKind::Rpc,
        "notification" => SnodeKind::Notification,
        "input" => SnodeKind::Input,
        "output" => SnodeKind::Output,
        _ => return None,
    })
}

fn placeholder_type(ctx: &mut Context, line: u32) -> TypeId {
    ctx.alloc_type(TypeSpec::named(ctx.dict.insert(""), None, line))
}

fn is_placeholder(ctx: &Context, tid: TypeId) -> bool {
    ctx.stype(tid).name.is_empty()
}

/// Build one schema node with its subtree
fn build_node(
    ctx: &mut Context,
    mid: ModId,
    unres: &mut UnresQueue,
    parent: Option<SnodeId>,
    stmt: &Stmt,
) -> Result<SnodeId> {
    let keyword = stmt.keyword.as_str();

    let (name, kind) = if keyword == "uses" {
        let grouping_name = ctx.transform_expr(mid, stmt.arg()?, stmt.line)?;
        (
            Arc::clone(&grouping_name),
            SnodeKind::Uses {
                grouping_name,
                grouping: None,
                refines: Vec::new(),
                augments: Vec::new(),
                expanded: false,
            },
        )
    } else if keyword == "input" || keyword == "output" {
        (
            ctx.dict.insert(keyword),
            node_kind_for(keyword, ctx, stmt.line).unwrap(),
        )
    } else {
        let name = stmt.arg()?;
        check_identifier(name, keyword, stmt.line)?;
        (
            ctx.dict.insert(name),
            node_kind_for(keyword, ctx, stmt.line).ok_or_else(|| {
                crate::error::Error::from(
                    SchemaError::new(
                        ErrorKind::Inval,
                        format!("unexpected statement \"{}\"", keyword),
                    )
                    .with_line(stmt.line),
                )
            })?,
        )
    };

    let node = ctx.tree.alloc(SchemaNode::new(name, mid, kind, stmt.line));

    // splice into the tree, module root rings live on the module
    match parent {
        Some(p) => {
            let mut head = ctx.snode(p).child;
            ctx.tree.add_child(Some(p), &mut head, node)?;
        }
        None => {
            let mut head = ctx.module(mid).data;
            ctx.tree.add_child(None, &mut head, node)?;
            ctx.module_mut(mid).data = head;
        }
    }

    apply_node_substatements(ctx, mid, unres, node, stmt)?;

    // config is inherited where not stated
    if ctx.snode(node).flags & flags::CONFIG_MASK == 0 {
        let inherited = match parent {
            Some(p) => ctx.snode(p).flags & flags::CONFIG_MASK,
            None => 0,
        };
        ctx.snode_mut(node).flags |= if inherited != 0 {
            inherited
        } else {
            flags::CONFIG_W
        };
    }

    // node statements in a second pass so flags are settled first
    for child in &stmt.children {
        match child.keyword.as_str() {
            "container" | "leaf" | "leaf-list" | "list" | "choice" | "case" | "anyxml"
            | "grouping" | "uses" | "rpc" | "notification" | "input" | "output" => {
                build_node(ctx, mid, unres, Some(node), child)?;
            }
            "augment" if keyword == "uses" => {
                let aug = build_augment(ctx, mid, unres, child, false)?;
                if let SnodeKind::Uses { augments, .. } = &mut ctx.snode_mut(node).kind {
                    augments.push(aug);
                }
            }
            _ => {}
        }
    }

    match keyword {
        "leaf" | "leaf-list" => {
            let tid = match &ctx.snode(node).kind {
                SnodeKind::Leaf { type_, .. } | SnodeKind::LeafList { type_, .. } => *type_,
                _ => unreachable!(),
            };
            if is_placeholder(ctx, tid) {
                return Err(missing("type", keyword, stmt.line));
            }
        }
        "choice" => crate::resolve::resolve_choice_default(ctx, node)?,
        "uses" => {
            unres.add(UnresItem {
                kind: UnresKind::Uses,
                owner: UnresOwner::Snode(node),
                module: mid,
                payload: match &ctx.snode(node).kind {
                    SnodeKind::Uses { grouping_name, .. } => Arc::clone(grouping_name),
                    _ => unreachable!(),
                },
                node: None,
                line: stmt.line,
            });
        }
        _ => {}
    }
    Ok(node)
}

/// Pass one over a node's sub-statements, everything but child nodes
fn apply_node_substatements(
    ctx: &mut Context,
    mid: ModId,
    unres: &mut UnresQueue,
    node: SnodeId,
    stmt: &Stmt,
) -> Result<()> {
    let keyword = stmt.keyword.clone();
    let mut ordered_by_seen = false;
    let mut key_seen = false;
    let mut type_seen = false;

    for child in &stmt.children {
        match child.keyword.as_str() {
            "config" => {
                let value = config_flag(child.arg()?, child.line)?;
                let n = ctx.snode_mut(node);
                check_flag(&mut n.flags, flags::CONFIG_MASK, value, "config", &keyword, child.line)?;
            }
            "mandatory" => {
                if !matches!(keyword.as_str(), "leaf" | "choice" | "anyxml") {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        format!("statement \"mandatory\" not allowed in \"{}\"", keyword),
                    )
                    .with_line(child.line)
                    .into());
                }
                let value = mandatory_flag(child.arg()?, child.line)?;
                let n = ctx.snode_mut(node);
                check_flag(&mut n.flags, flags::MAND_MASK, value, "mandatory", &keyword, child.line)?;
            }
            "status" => {
                let value = status_flag(child.arg()?, child.line)?;
                let n = ctx.snode_mut(node);
                check_flag(&mut n.flags, flags::STATUS_MASK, value, "status", &keyword, child.line)?;
            }
            "ordered-by" => {
                if !matches!(keyword.as_str(), "leaf-list" | "list") {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        format!("statement \"ordered-by\" not allowed in \"{}\"", keyword),
                    )
                    .with_line(child.line)
                    .into());
                }
                if ordered_by_seen {
                    return Err(too_many("ordered-by", &keyword, child.line));
                }
                ordered_by_seen = true;
                match child.arg()? {
                    "user" => ctx.snode_mut(node).flags |= flags::USER_ORDERED,
                    "system" => {}
                    other => return Err(bad_arg(other, "ordered-by", child.line)),
                }
            }
            "when" => {
                if ctx.snode(node).when.is_some() {
                    return Err(too_many("when", &keyword, child.line));
                }
                crate::xpath::syntax_check(child.arg()?, child.line)?;
                let cond = ctx.transform_expr(mid, child.arg()?, child.line)?;
                let mut when = When {
                    cond,
                    dsc: None,
                    reference: None,
                };
                for sub in &child.children {
                    match sub.keyword.as_str() {
                        "description" => {
                            let v = ctx.dict.insert(sub.arg()?);
                            check_string(&mut when.dsc, "description", "when", v, sub.line)?;
                        }
                        "reference" => {
                            let v = ctx.dict.insert(sub.arg()?);
                            check_string(&mut when.reference, "reference", "when", v, sub.line)?;
                        }
                        _ => {}
                    }
                }
                ctx.snode_mut(node).when = Some(when);
            }
            "must" => {
                crate::xpath::syntax_check(child.arg()?, child.line)?;
                let expr = ctx.transform_expr(mid, child.arg()?, child.line)?;
                let mut restr = read_restr(ctx, child)?;
                restr.expr = expr;
                ctx.snode_mut(node).musts.push(restr);
            }
            "if-feature" => {
                let expr = ctx.transform_expr(mid, child.arg()?, child.line)?;
                unres.add(UnresItem {
                    kind: UnresKind::IfFeat,
                    owner: UnresOwner::Snode(node),
                    module: mid,
                    payload: expr,
                    node: None,
                    line: child.line,
                });
            }
            "description" => {
                let value = ctx.dict.insert(child.arg()?);
                let n = ctx.snode_mut(node);
                check_string(&mut n.dsc, "description", &keyword, value, child.line)?;
            }
            "reference" => {
                let value = ctx.dict.insert(child.arg()?);
                let n = ctx.snode_mut(node);
                check_string(&mut n.reference, "reference", &keyword, value, child.line)?;
            }
            "presence" => {
                let value = ctx.dict.insert(child.arg()?);
                match &mut ctx.snode_mut(node).kind {
                    SnodeKind::Container { presence } => {
                        check_string(presence, "presence", "container", value, child.line)?
                    }
                    _ => {
                        return Err(SchemaError::new(
                            ErrorKind::BadNesting,
                            format!("statement \"presence\" not allowed in \"{}\"", keyword),
                        )
                        .with_line(child.line)
                        .into())
                    }
                }
            }
            "default" => {
                let value = ctx.transform_expr(mid, child.arg()?, child.line)?;
                match &mut ctx.snode_mut(node).kind {
                    SnodeKind::Leaf { dflt, .. } => {
                        check_string(dflt, "default", "leaf", Arc::clone(&value), child.line)?;
                        unres.add(UnresItem {
                            kind: UnresKind::TypedefDflt,
                            owner: UnresOwner::Snode(node),
                            module: mid,
                            payload: value,
                            node: None,
                            line: child.line,
                        });
                    }
                    SnodeKind::Choice { dflt_name, .. } => {
                        check_string(dflt_name, "default", "choice", value, child.line)?;
                    }
                    _ => {
                        return Err(SchemaError::new(
                            ErrorKind::BadNesting,
                            format!("statement \"default\" not allowed in \"{}\"", keyword),
                        )
                        .with_line(child.line)
                        .into())
                    }
                }
            }
            "units" => {
                let value = ctx.dict.insert(child.arg()?);
                match &mut ctx.snode_mut(node).kind {
                    SnodeKind::Leaf { units, .. } | SnodeKind::LeafList { units, .. } => {
                        check_string(units, "units", &keyword, value, child.line)?
                    }
                    _ => {
                        return Err(SchemaError::new(
                            ErrorKind::BadNesting,
                            format!("statement \"units\" not allowed in \"{}\"", keyword),
                        )
                        .with_line(child.line)
                        .into())
                    }
                }
            }
            "type" => {
                if !matches!(keyword.as_str(), "leaf" | "leaf-list") {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        format!("statement \"type\" not allowed in \"{}\"", keyword),
                    )
                    .with_line(child.line)
                    .into());
                }
                if type_seen {
                    return Err(too_many("type", &keyword, child.line));
                }
                type_seen = true;
                let tid = read_type(ctx, mid, unres, child, Some(node))?;
                match &mut ctx.snode_mut(node).kind {
                    SnodeKind::Leaf { type_, .. } | SnodeKind::LeafList { type_, .. } => {
                        *type_ = tid
                    }
                    _ => unreachable!(),
                }
            }
            "min-elements" | "max-elements" => {
                let value = elements_arg(child.arg()?, &child.keyword, child.line)?;
                match &mut ctx.snode_mut(node).kind {
                    SnodeKind::LeafList { min, max, .. } | SnodeKind::List { min, max, .. } => {
                        if child.keyword == "min-elements" {
                            *min = value;
                        } else {
                            *max = value;
                        }
                    }
                    _ => {
                        return Err(SchemaError::new(
                            ErrorKind::BadNesting,
                            format!(
                                "statement \"{}\" not allowed in \"{}\"",
                                child.keyword, keyword
                            ),
                        )
                        .with_line(child.line)
                        .into())
                    }
                }
            }
            "key" => {
                if keyword != "list" {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        format!("statement \"key\" not allowed in \"{}\"", keyword),
                    )
                    .with_line(child.line)
                    .into());
                }
                if key_seen {
                    return Err(too_many("key", "list", child.line));
                }
                key_seen = true;
                let value = ctx.dict.insert(child.arg()?);
                if let SnodeKind::List { keys_str, .. } = &mut ctx.snode_mut(node).kind {
                    *keys_str = Some(Arc::clone(&value));
                }
                unres.add(UnresItem {
                    kind: UnresKind::ListKeys,
                    owner: UnresOwner::Snode(node),
                    module: mid,
                    payload: value,
                    node: None,
                    line: child.line,
                });
            }
            "unique" => {
                if keyword != "list" {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        format!("statement \"unique\" not allowed in \"{}\"", keyword),
                    )
                    .with_line(child.line)
                    .into());
                }
                let arg = ctx.transform_expr(mid, child.arg()?, child.line)?;
                let mut exprs: Vec<Arc<str>> = Vec::new();
                for token in arg.split_whitespace() {
                    if exprs.iter().any(|e| &**e == token) {
                        return Err(SchemaError::new(
                            ErrorKind::Inarg,
                            format!("unique member \"{}\" is not unique", token),
                        )
                        .with_line(child.line)
                        .into());
                    }
                    exprs.push(ctx.dict.insert(token));
                }
                if exprs.is_empty() {
                    return Err(bad_arg("", "unique", child.line));
                }
                let set = match &mut ctx.snode_mut(node).kind {
                    SnodeKind::List { unique, .. } => {
                        unique.push(UniqueSet {
                            exprs,
                            nodes: Vec::new(),
                        });
                        unique.len() - 1
                    }
                    _ => unreachable!(),
                };
                unres.add(UnresItem {
                    kind: UnresKind::ListUnique(set),
                    owner: UnresOwner::Snode(node),
                    module: mid,
                    payload: arg,
                    node: None,
                    line: child.line,
                });
            }
            "refine" => {
                if keyword != "uses" {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        format!("statement \"refine\" not allowed in \"{}\"", keyword),
                    )
                    .with_line(child.line)
                    .into());
                }
                let refine = build_refine(ctx, mid, child)?;
                if let SnodeKind::Uses { refines, .. } = &mut ctx.snode_mut(node).kind {
                    refines.push(refine);
                }
            }
            // child nodes and uses-augments go in the second pass
            "container" | "leaf" | "leaf-list" | "list" | "choice" | "case" | "anyxml"
            | "grouping" | "uses" | "rpc" | "notification" | "input" | "output" | "augment"
            | "typedef" => {
                if child.keyword == "typedef" {
                    return Err(SchemaError::new(
                        ErrorKind::BadNesting,
                        "typedef is only supported at module level",
                    )
                    .with_line(child.line)
                    .into());
                }
            }
            other if other.contains(':') => {}
            other => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in \"{}\"", other, keyword),
                )
                .with_line(child.line)
                .into())
            }
        }
    }
    Ok(())
}

fn build_refine(ctx: &mut Context, mid: ModId, stmt: &Stmt) -> Result<Refine> {
    let target = ctx.transform_expr(mid, stmt.arg()?, stmt.line)?;
    let mut refine = Refine {
        target,
        dsc: None,
        reference: None,
        presence: None,
        dflt: None,
        config: None,
        mandatory: None,
        min: None,
        max: None,
        musts: Vec::new(),
        line: stmt.line,
    };
    for child in &stmt.children {
        match child.keyword.as_str() {
            "description" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut refine.dsc, "description", "refine", v, child.line)?;
            }
            "reference" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut refine.reference, "reference", "refine", v, child.line)?;
            }
            "presence" => {
                let v = ctx.dict.insert(child.arg()?);
                check_string(&mut refine.presence, "presence", "refine", v, child.line)?;
            }
            "default" => {
                let v = ctx.transform_expr(mid, child.arg()?, child.line)?;
                check_string(&mut refine.dflt, "default", "refine", v, child.line)?;
            }
            "config" => {
                if refine.config.is_some() {
                    return Err(too_many("config", "refine", child.line));
                }
                refine.config = Some(config_flag(child.arg()?, child.line)? == flags::CONFIG_W);
            }
            "mandatory" => {
                if refine.mandatory.is_some() {
                    return Err(too_many("mandatory", "refine", child.line));
                }
                refine.mandatory = Some(mandatory_flag(child.arg()?, child.line)? == flags::MAND_TRUE);
            }
            "min-elements" => {
                if refine.min.is_some() {
                    return Err(too_many("min-elements", "refine", child.line));
                }
                refine.min = Some(elements_arg(child.arg()?, "min-elements", child.line)?);
            }
            "max-elements" => {
                if refine.max.is_some() {
                    return Err(too_many("max-elements", "refine", child.line));
                }
                refine.max = Some(elements_arg(child.arg()?, "max-elements", child.line)?);
            }
            "must" => {
                crate::xpath::syntax_check(child.arg()?, child.line)?;
                let expr = ctx.transform_expr(mid, child.arg()?, child.line)?;
                let mut restr = read_restr(ctx, child)?;
                restr.expr = expr;
                refine.musts.push(restr);
            }
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::Inval,
                    format!("unexpected statement \"{}\" in refine", child.keyword),
                )
                .with_line(child.line)
                .into())
            }
        }
    }
    Ok(refine)
}

/// Build an augment node, module-level or uses-level
///
/// Module-level augments take absolute target paths, uses-level ones
/// take paths relative to the grouping content. The node stays outside
/// the data tree; the resolver splices its children into the target.
fn build_augment(
    ctx: &mut Context,
    mid: ModId,
    unres: &mut UnresQueue,
    stmt: &Stmt,
    module_level: bool,
) -> Result<SnodeId> {
    let target = stmt.arg()?;
    if module_level != target.starts_with('/') {
        return Err(SchemaError::new(
            ErrorKind::Inarg,
            format!("augment target \"{}\" has the wrong scope", target),
        )
        .with_line(stmt.line)
        .into());
    }
    let target_path = ctx.transform_expr(mid, target, stmt.line)?;
    let node = ctx.tree.alloc(SchemaNode::new(
        Arc::clone(&target_path),
        mid,
        SnodeKind::Augment {
            target_path,
            target: None,
            spliced: Vec::new(),
        },
        stmt.line,
    ));

    apply_node_substatements(ctx, mid, unres, node, stmt)?;
    for child in &stmt.children {
        match child.keyword.as_str() {
            "container" | "leaf" | "leaf-list" | "list" | "choice" | "case" | "anyxml"
            | "uses" => {
                build_node(ctx, mid, unres, Some(node), child)?;
            }
            _ => {}
        }
    }
    Ok(node)
}
