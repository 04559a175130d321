//! Structural validation of data trees
//!
//! These checks run at per-node checkpoints during parsing and again
//! through [`validate_tree`]: list key presence, cardinality of
//! non-list nodes, leaf-list and list uniqueness, choice exclusivity
//! and mandatory/min/max enforcement. Filter mode replaces errors with
//! merge-or-absorb normalization. After parsing, queued leafrefs and
//! instance-identifiers resolve against the finished tree.

use crate::context::Context;
use crate::data::node::{DataTree, DnodeId, DnodeKind};
use crate::data::{options, xml::list_key_predicates};
use crate::error::{DataError, ErrorKind, Result};
use crate::schema::{SnodeId, SnodeKind};
use crate::value::PendingRef;
use crate::xpath::{InstPredicate, LeafrefPath};

/// Outcome of the per-node checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeDisposition {
    /// The node stays in the tree
    Keep,
    /// Filter normalization merged the node away
    Absorbed,
}

/// Per-node structural checkpoint, in checking order
pub(crate) fn check_node(
    ctx: &Context,
    tree: &mut DataTree,
    node: DnodeId,
    opts: u32,
) -> Result<NodeDisposition> {
    let schema = tree.node(node).schema;
    let filter = opts & options::FILTER != 0;

    // key presence
    if matches!(ctx.snode(schema).kind, SnodeKind::List { .. }) && !filter {
        check_keys_present(ctx, tree, node)?;
    }

    // mandatory children of the finished subtree
    if matches!(
        ctx.snode(schema).kind,
        SnodeKind::Container { .. } | SnodeKind::List { .. }
    ) && opts & (options::FILTER | options::EDIT) == 0
    {
        check_mandatory_children(ctx, tree, DataCtx::Node(node), ctx.snode(schema).child)?;
    }

    // cardinality of non-list nodes
    match &ctx.snode(schema).kind {
        SnodeKind::Container { .. } => {
            if let Some(prev) = tree.node(node).inst_prev {
                if filter {
                    if tree.node(prev).child.is_none() {
                        // previous instance already selects the subtree
                        return Ok(NodeDisposition::Absorbed);
                    }
                    if tree.node(node).child.is_none() {
                        // the new selection widens the previous instance
                        let children: Vec<DnodeId> = tree.children(prev).collect();
                        for child in children {
                            tree.unlink(child);
                        }
                        return Ok(NodeDisposition::Absorbed);
                    }
                    // both are containment nodes and stay side by side
                } else {
                    return Err(too_many(ctx, tree, node));
                }
            }
        }
        SnodeKind::Leaf { .. } => {
            if let Some(prev) = tree.node(node).inst_prev {
                if filter {
                    if tree.node(prev).value_str() == tree.node(node).value_str() {
                        return Ok(NodeDisposition::Absorbed);
                    }
                } else {
                    return Err(too_many(ctx, tree, node));
                }
            }
        }
        SnodeKind::Anyxml => {
            if let Some(_prev) = tree.node(node).inst_prev {
                if filter {
                    // anyxml filters are pure selection nodes
                    return Ok(NodeDisposition::Absorbed);
                }
                return Err(too_many(ctx, tree, node));
            }
        }
        SnodeKind::LeafList { .. } => {
            let mut walk = tree.node(node).inst_prev;
            while let Some(prev) = walk {
                if tree.node(prev).value() == tree.node(node).value() {
                    if filter {
                        return Ok(NodeDisposition::Absorbed);
                    }
                    return Err(DataError::new(
                        ErrorKind::DupLeaflist,
                        format!(
                            "duplicated leaf-list value \"{}\" of \"{}\"",
                            tree.node(node)
                                .value_str()
                                .map(|v| v.to_string())
                                .unwrap_or_default(),
                            ctx.snode(schema).name
                        ),
                    )
                    .with_line(tree.node(node).line)
                    .with_path(ctx.schema_path(schema))
                    .into());
                }
                walk = tree.node(prev).inst_prev;
            }
        }
        SnodeKind::List { .. } => {
            let mut walk = tree.node(node).inst_prev;
            while let Some(prev) = walk {
                if filter {
                    if list_key_predicates(ctx, tree, prev) == list_key_predicates(ctx, tree, node)
                    {
                        // merge the new selections into the previous
                        // instance instead of duplicating it
                        let children: Vec<DnodeId> = tree.children(node).collect();
                        for child in children {
                            tree.unlink(child);
                            tree.link_last(Some(prev), child);
                        }
                        return Ok(NodeDisposition::Absorbed);
                    }
                } else if lists_collide(ctx, tree, prev, node)? {
                    return Err(DataError::new(
                        ErrorKind::DupList,
                        format!("duplicated instance of list \"{}\"", ctx.snode(schema).name),
                    )
                    .with_line(tree.node(node).line)
                    .with_path(ctx.schema_path(schema))
                    .into());
                }
                walk = tree.node(prev).inst_prev;
            }
        }
        _ => {}
    }

    if !filter {
        check_choice_exclusivity(ctx, tree, node)?;
    }

    Ok(NodeDisposition::Keep)
}

fn too_many(ctx: &Context, tree: &DataTree, node: DnodeId) -> crate::error::Error {
    let schema = tree.node(node).schema;
    DataError::new(
        ErrorKind::TooMany,
        format!("multiple instances of \"{}\"", ctx.snode(schema).name),
    )
    .with_line(tree.node(node).line)
    .with_path(ctx.schema_path(schema))
    .into()
}

/// Every declared key must have a child leaf instance
fn check_keys_present(ctx: &Context, tree: &DataTree, list: DnodeId) -> Result<()> {
    let schema = tree.node(list).schema;
    let keys = match &ctx.snode(schema).kind {
        SnodeKind::List { keys, .. } => keys.clone(),
        _ => return Ok(()),
    };
    for key in keys {
        if !tree.children(list).any(|c| tree.node(c).schema == key) {
            return Err(DataError::new(
                ErrorKind::Misselem,
                format!(
                    "key \"{}\" missing in list \"{}\"",
                    ctx.snode(key).name,
                    ctx.snode(schema).name
                ),
            )
            .with_line(tree.node(list).line)
            .with_path(ctx.schema_path(schema))
            .into());
        }
    }
    Ok(())
}

/// Two list instances collide when all keys agree or a unique set does
fn lists_collide(ctx: &Context, tree: &DataTree, a: DnodeId, b: DnodeId) -> Result<bool> {
    let schema = tree.node(a).schema;
    let (keys, unique) = match &ctx.snode(schema).kind {
        SnodeKind::List { keys, unique, .. } => (keys.clone(), unique.clone()),
        _ => return Ok(false),
    };

    if !keys.is_empty() {
        let all_equal = keys.iter().all(|&key| {
            let va = child_value(tree, a, key);
            let vb = child_value(tree, b, key);
            matches!((va, vb), (Some(x), Some(y)) if x == y)
        });
        if all_equal {
            return Ok(true);
        }
    }

    for set in &unique {
        if set.nodes.is_empty() {
            continue;
        }
        let all_equal = set.nodes.iter().all(|&member| {
            let va = descendant_value(tree, a, member);
            let vb = descendant_value(tree, b, member);
            matches!((va, vb), (Some(x), Some(y)) if x == y)
        });
        if all_equal {
            return Ok(true);
        }
    }
    Ok(false)
}

fn child_value(tree: &DataTree, parent: DnodeId, schema: SnodeId) -> Option<String> {
    tree.children(parent)
        .find(|&c| tree.node(c).schema == schema)
        .and_then(|c| tree.node(c).value_str().map(|v| v.to_string()))
}

fn descendant_value(tree: &DataTree, root: DnodeId, schema: SnodeId) -> Option<String> {
    let mut stack: Vec<DnodeId> = tree.children(root).collect();
    while let Some(id) = stack.pop() {
        if tree.node(id).schema == schema {
            return tree.node(id).value_str().map(|v| v.to_string());
        }
        stack.extend(tree.children(id));
    }
    None
}

/// The choice and effective case a schema node belongs to
pub(crate) fn choice_membership(ctx: &Context, node: SnodeId) -> Option<(SnodeId, SnodeId)> {
    let mut child = node;
    let mut parent = ctx.snode(node).parent;
    while let Some(p) = parent {
        match ctx.snode(p).kind {
            SnodeKind::Uses { .. } => {
                child = p;
                parent = ctx.snode(p).parent;
            }
            SnodeKind::Case => {
                let case = p;
                let mut up = ctx.snode(p).parent;
                while let Some(q) = up {
                    match ctx.snode(q).kind {
                        SnodeKind::Uses { .. } => up = ctx.snode(q).parent,
                        SnodeKind::Choice { .. } => return Some((q, case)),
                        _ => return None,
                    }
                }
                return None;
            }
            SnodeKind::Choice { .. } => return Some((p, child)),
            _ => return None,
        }
    }
    None
}

/// Reject siblings populated from two cases of one choice
fn check_choice_exclusivity(ctx: &Context, tree: &DataTree, node: DnodeId) -> Result<()> {
    let (choice, case) = match choice_membership(ctx, tree.node(node).schema) {
        Some(found) => found,
        None => return Ok(()),
    };
    let head = match tree.node(node).parent {
        Some(p) => tree.node(p).child,
        None => tree.root(),
    };
    for sib in tree.siblings(head) {
        if sib == node {
            continue;
        }
        if let Some((other_choice, other_case)) = choice_membership(ctx, tree.node(sib).schema) {
            if other_choice == choice && other_case != case {
                return Err(DataError::new(
                    ErrorKind::McaseData,
                    format!(
                        "data from two cases of choice \"{}\"",
                        ctx.snode(choice).name
                    ),
                )
                .with_line(tree.node(node).line)
                .with_path(ctx.schema_path(choice))
                .into());
            }
        }
    }
    Ok(())
}

// =============================================================================
// Mandatory and min/max enforcement
// =============================================================================

/// Data context mandatory checking counts instances in
#[derive(Debug, Clone, Copy)]
pub(crate) enum DataCtx {
    /// Children of a data node
    Node(DnodeId),
    /// Top-level siblings of the tree
    Top,
    /// An absent non-presence container, nothing instantiated
    Empty,
}

fn count_instances(tree: &DataTree, dctx: DataCtx, schema: SnodeId) -> usize {
    let head = match dctx {
        DataCtx::Node(id) => tree.node(id).child,
        DataCtx::Top => tree.root(),
        DataCtx::Empty => None,
    };
    tree.siblings(head)
        .filter(|&d| tree.node(d).schema == schema)
        .count()
}

fn first_instance(tree: &DataTree, dctx: DataCtx, schema: SnodeId) -> Option<DnodeId> {
    let head = match dctx {
        DataCtx::Node(id) => tree.node(id).child,
        DataCtx::Top => tree.root(),
        DataCtx::Empty => None,
    };
    tree.siblings(head).find(|&d| tree.node(d).schema == schema)
}

/// Walk a schema child set and enforce mandatory/min/max
///
/// Nodes guarded by a `when` condition are not enforced, since the
/// condition is only syntax-checked. Disabled nodes are skipped.
pub(crate) fn check_mandatory_children(
    ctx: &Context,
    tree: &DataTree,
    dctx: DataCtx,
    schema_head: Option<SnodeId>,
) -> Result<()> {
    for schema in ctx.tree.siblings(schema_head) {
        let n = ctx.snode(schema);
        if ctx.is_disabled(schema) || n.when.is_some() {
            continue;
        }
        match &n.kind {
            SnodeKind::Uses { .. } | SnodeKind::Case => {
                check_mandatory_children(ctx, tree, dctx, n.child)?;
            }
            SnodeKind::Choice { .. } => {
                let populated = populated_case(ctx, tree, dctx, schema);
                match populated {
                    Some(case) => {
                        if matches!(ctx.snode(case).kind, SnodeKind::Case) {
                            check_mandatory_children(ctx, tree, dctx, ctx.snode(case).child)?;
                        }
                    }
                    None => {
                        if n.is_mandatory() {
                            return Err(missing_elem(ctx, schema));
                        }
                    }
                }
            }
            SnodeKind::Leaf { .. } | SnodeKind::Anyxml => {
                if n.is_mandatory() && count_instances(tree, dctx, schema) == 0 {
                    return Err(missing_elem(ctx, schema));
                }
            }
            SnodeKind::LeafList { min, max, .. } | SnodeKind::List { min, max, .. } => {
                let n_inst = count_instances(tree, dctx, schema) as u32;
                if n_inst < *min || (*max > 0 && n_inst > *max) {
                    return Err(DataError::new(
                        ErrorKind::Spec,
                        format!(
                            "number of \"{}\" instances does not follow min/max constraints",
                            ctx.snode(schema).name
                        ),
                    )
                    .with_path(ctx.schema_path(schema))
                    .into());
                }
            }
            SnodeKind::Container { presence } => {
                if presence.is_none() && first_instance(tree, dctx, schema).is_none() {
                    // mandatory state propagates through absent
                    // non-presence containers
                    check_mandatory_children(ctx, tree, DataCtx::Empty, n.child)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn missing_elem(ctx: &Context, schema: SnodeId) -> crate::error::Error {
    DataError::new(
        ErrorKind::Misselem,
        format!("mandatory \"{}\" is missing", ctx.snode(schema).name),
    )
    .with_path(ctx.schema_path(schema))
    .into()
}

/// The case populated for a choice within a data context, if any
fn populated_case(
    ctx: &Context,
    tree: &DataTree,
    dctx: DataCtx,
    choice: SnodeId,
) -> Option<SnodeId> {
    let head = match dctx {
        DataCtx::Node(id) => tree.node(id).child,
        DataCtx::Top => tree.root(),
        DataCtx::Empty => None,
    };
    for d in tree.siblings(head) {
        if let Some((ch, case)) = choice_membership(ctx, tree.node(d).schema) {
            if ch == choice {
                return Some(case);
            }
        }
    }
    None
}

// =============================================================================
// Whole-tree validation
// =============================================================================

/// Re-run the structural checks over a parsed tree
///
/// A tree accepted by parsing passes unchanged; the call is idempotent.
pub fn validate_tree(ctx: &Context, tree: &DataTree, opts: u32) -> Result<()> {
    let filter = opts & options::FILTER != 0;
    for node in tree.descendants() {
        let schema = tree.node(node).schema;
        if matches!(ctx.snode(schema).kind, SnodeKind::List { .. }) && !filter {
            check_keys_present(ctx, tree, node)?;
        }
        if matches!(
            ctx.snode(schema).kind,
            SnodeKind::Container { .. } | SnodeKind::List { .. }
        ) && opts & (options::FILTER | options::EDIT) == 0
        {
            check_mandatory_children(ctx, tree, DataCtx::Node(node), ctx.snode(schema).child)?;
        }
        if !filter {
            // duplicate instances of non-list nodes
            match &ctx.snode(schema).kind {
                SnodeKind::Container { .. } | SnodeKind::Leaf { .. } | SnodeKind::Anyxml => {
                    if tree.node(node).inst_prev.is_some() {
                        return Err(too_many(ctx, tree, node));
                    }
                }
                SnodeKind::LeafList { .. } => {
                    let mut walk = tree.node(node).inst_prev;
                    while let Some(prev) = walk {
                        if tree.node(prev).value() == tree.node(node).value() {
                            return Err(DataError::new(
                                ErrorKind::DupLeaflist,
                                format!(
                                    "duplicated leaf-list value of \"{}\"",
                                    ctx.snode(schema).name
                                ),
                            )
                            .with_path(ctx.schema_path(schema))
                            .into());
                        }
                        walk = tree.node(prev).inst_prev;
                    }
                }
                SnodeKind::List { .. } => {
                    let mut walk = tree.node(node).inst_prev;
                    while let Some(prev) = walk {
                        if lists_collide(ctx, tree, prev, node)? {
                            return Err(DataError::new(
                                ErrorKind::DupList,
                                format!(
                                    "duplicated instance of list \"{}\"",
                                    ctx.snode(schema).name
                                ),
                            )
                            .with_path(ctx.schema_path(schema))
                            .into());
                        }
                        walk = tree.node(prev).inst_prev;
                    }
                }
                _ => {}
            }
            check_choice_exclusivity(ctx, tree, node)?;
        }
        // anything left pending must resolve now
        if tree.node(node).pending.is_some() && opts & (options::EDIT | options::FILTER) == 0 {
            check_pending(ctx, tree, node)?;
        }
    }
    Ok(())
}

// =============================================================================
// Post-parse leafref and instance-identifier resolution
// =============================================================================

/// Drain the unresolved-data queue against the finished tree
pub(crate) fn resolve_unres_data(
    ctx: &Context,
    tree: &mut DataTree,
    queue: &[(DnodeId, u32)],
) -> Result<()> {
    for &(node, line) in queue {
        check_pending(ctx, tree, node).map_err(|e| match e {
            crate::error::Error::Data(d) if d.line.is_none() => {
                crate::error::Error::Data(d.with_line(line))
            }
            other => other,
        })?;
        tree.node_mut(node).pending = None;
    }
    Ok(())
}

fn check_pending(ctx: &Context, tree: &DataTree, node: DnodeId) -> Result<()> {
    match tree.node(node).pending {
        None => Ok(()),
        Some(PendingRef::Leafref(tid)) => {
            let path = match &ctx.stype(tid).info {
                crate::schema::TypeInfo::Leafref {
                    path: Some(path), ..
                } => crate::xpath::parse_leafref_path(path)?,
                _ => {
                    return Err(crate::error::Error::Internal(
                        "pending leafref without a path".into(),
                    ))
                }
            };
            if eval_leafref(ctx, tree, node, &path) {
                Ok(())
            } else {
                Err(DataError::new(
                    ErrorKind::LeafrefTarget,
                    format!(
                        "leafref \"{}\" has no matching target instance",
                        tree.node(node)
                            .value_str()
                            .map(|v| v.to_string())
                            .unwrap_or_default()
                    ),
                )
                .with_path(ctx.schema_path(tree.node(node).schema))
                .into())
            }
        }
        Some(PendingRef::InstId) => {
            let path = match tree.node(node).value() {
                Some(crate::value::Value::InstId(path)) => path.to_string(),
                _ => {
                    return Err(crate::error::Error::Internal(
                        "pending instance-identifier without a value".into(),
                    ))
                }
            };
            let steps = crate::xpath::parse_instance_path(&path)?;
            if eval_instid(ctx, tree, &steps) {
                Ok(())
            } else {
                Err(DataError::new(
                    ErrorKind::Inval,
                    format!("instance identifier \"{}\" has no target", path),
                )
                .with_path(ctx.schema_path(tree.node(node).schema))
                .into())
            }
        }
    }
}

fn module_name_of(ctx: &Context, tree: &DataTree, node: DnodeId) -> String {
    ctx.module(ctx.snode(tree.node(node).schema).module)
        .name
        .to_string()
}

/// Evaluate a leafref path from `node`, true when a target instance
/// carries the same value
fn eval_leafref(ctx: &Context, tree: &DataTree, node: DnodeId, path: &LeafrefPath) -> bool {
    let own_value = match tree.node(node).value_str() {
        Some(v) => v.to_string(),
        None => return false,
    };
    let default_module = module_name_of(ctx, tree, node);

    let mut frontier: Vec<Option<DnodeId>> = if path.absolute {
        vec![None]
    } else {
        let mut context = Some(node);
        for _ in 0..path.up {
            context = match context {
                Some(c) => tree.node(c).parent,
                None => return false,
            };
        }
        vec![context]
    };

    for step in &path.steps {
        let module_name = step.prefix.clone().unwrap_or_else(|| default_module.clone());
        let mut next: Vec<Option<DnodeId>> = Vec::new();
        for ctx_node in &frontier {
            let head = match ctx_node {
                Some(id) => tree.node(*id).child,
                None => tree.root(),
            };
            for child in tree.siblings(head) {
                let snode = ctx.snode(tree.node(child).schema);
                if &*snode.name != step.name
                    || &*ctx.module(snode.module).name != module_name
                {
                    continue;
                }
                if step
                    .predicates
                    .iter()
                    .all(|pred| key_predicate_holds(ctx, tree, node, child, pred))
                {
                    next.push(Some(child));
                }
            }
        }
        if next.is_empty() {
            return false;
        }
        frontier = next;
    }

    frontier.iter().any(|target| {
        target
            .and_then(|t| tree.node(t).value_str())
            .map(|v| **v == *own_value)
            .unwrap_or(false)
    })
}

/// Evaluate `[key = current()/../rel]` against one candidate node
fn key_predicate_holds(
    ctx: &Context,
    tree: &DataTree,
    origin: DnodeId,
    candidate: DnodeId,
    pred: &crate::xpath::KeyPredicate,
) -> bool {
    // right side: walk up from the leafref leaf, then down the rel path
    let mut current = Some(origin);
    for _ in 0..pred.up {
        current = current.and_then(|c| tree.node(c).parent);
    }
    let mut rhs_node = current;
    for (prefix, name) in &pred.rel {
        let head = match rhs_node {
            Some(id) => tree.node(id).child,
            None => tree.root(),
        };
        let module_name = prefix
            .clone()
            .unwrap_or_else(|| module_name_of(ctx, tree, origin));
        rhs_node = tree.siblings(head).find(|&c| {
            let snode = ctx.snode(tree.node(c).schema);
            &*snode.name == *name && &*ctx.module(snode.module).name == module_name
        });
        if rhs_node.is_none() {
            return false;
        }
    }
    let rhs = match rhs_node.and_then(|n| tree.node(n).value_str()) {
        Some(v) => v.to_string(),
        None => return false,
    };

    // left side: the candidate's key leaf
    let key_module = pred
        .key_prefix
        .clone()
        .unwrap_or_else(|| module_name_of(ctx, tree, candidate));
    let key = tree.children(candidate).find(|&c| {
        let snode = ctx.snode(tree.node(c).schema);
        &*snode.name == pred.key && &*ctx.module(snode.module).name == key_module
    });
    match key.and_then(|k| tree.node(k).value_str()) {
        Some(v) => **v == rhs,
        None => false,
    }
}

/// Interpret an instance identifier against the tree
fn eval_instid(ctx: &Context, tree: &DataTree, steps: &[crate::xpath::InstStep]) -> bool {
    let mut frontier: Vec<Option<DnodeId>> = vec![None];
    for step in steps {
        let mut next: Vec<Option<DnodeId>> = Vec::new();
        for ctx_node in &frontier {
            let head = match ctx_node {
                Some(id) => tree.node(*id).child,
                None => tree.root(),
            };
            let mut matched: Vec<DnodeId> = Vec::new();
            for child in tree.siblings(head) {
                let snode = ctx.snode(tree.node(child).schema);
                if &*snode.name != step.name {
                    continue;
                }
                if let Some(prefix) = &step.prefix {
                    if &*ctx.module(snode.module).name != prefix {
                        continue;
                    }
                }
                if !step.predicates.iter().all(|p| inst_predicate_holds(ctx, tree, child, p)) {
                    continue;
                }
                matched.push(child);
            }
            // position predicates index into the matched set per parent
            if let Some(InstPredicate::Position(pos)) = step
                .predicates
                .iter()
                .find(|p| matches!(p, InstPredicate::Position(_)))
            {
                let idx = *pos as usize - 1;
                if let Some(&m) = matched.get(idx) {
                    next.push(Some(m));
                }
            } else {
                next.extend(matched.into_iter().map(Some));
            }
        }
        if next.is_empty() {
            return false;
        }
        frontier = next;
    }
    !frontier.is_empty()
}

fn inst_predicate_holds(
    ctx: &Context,
    tree: &DataTree,
    candidate: DnodeId,
    pred: &InstPredicate,
) -> bool {
    match pred {
        InstPredicate::Position(_) => true,
        InstPredicate::Value(expected) => tree
            .node(candidate)
            .value_str()
            .map(|v| **v == **expected)
            .unwrap_or(false),
        InstPredicate::Key {
            prefix,
            name,
            value,
        } => {
            let key = tree.children(candidate).find(|&c| {
                let snode = ctx.snode(tree.node(c).schema);
                if &*snode.name != *name {
                    return false;
                }
                match prefix {
                    Some(p) => &*ctx.module(snode.module).name == *p,
                    None => true,
                }
            });
            key.and_then(|k| tree.node(k).value_str())
                .map(|v| **v == **value)
                .unwrap_or(false)
        }
    }
}
