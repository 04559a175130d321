//! XML data front-end
//!
//! Builds an instance tree from an XML document against the loaded
//! schemas. Elements are matched to schema nodes by namespace and name,
//! walking transparently through choice, case and uses layers. Leaves
//! decode through the value layer; leafrefs and instance-identifiers are
//! queued and resolved once the whole document is parsed.

use crate::context::Context;
use crate::data::node::{DataNode, DataTree, DnodeId, DnodeKind};
use crate::data::{options, validate, YANG_ATTRS_NS};
use crate::error::{DataError, ErrorKind, Result};
use crate::schema::node::flags;
use crate::schema::{SnodeId, SnodeKind};
use crate::value::{self, Value};
use crate::xml::Element;
use std::sync::Arc;
use tracing::debug;

/// Parse an XML document into a validated data tree
pub(crate) fn parse(ctx: &Context, data: &str, opts: u32) -> Result<DataTree> {
    let root = Element::parse(data)?;
    let mut tree = DataTree::new();
    let mut unres: Vec<(DnodeId, u32)> = Vec::new();

    if root_is_data(ctx, &root) {
        parse_elem(ctx, &mut tree, &root, None, opts, &mut unres)?;
    } else {
        // the root element is an envelope such as <config> or <data>
        for child in &root.children {
            parse_elem(ctx, &mut tree, child, None, opts, &mut unres)?;
        }
    }

    validate::resolve_unres_data(ctx, &mut tree, &unres)?;
    debug!(nodes = tree.len(), "data tree accepted");
    Ok(tree)
}

/// True when the root element itself is a top-level data node
fn root_is_data(ctx: &Context, root: &Element) -> bool {
    let ns = match &root.ns {
        Some(ns) => ns,
        None => return false,
    };
    match ctx.get_module_by_ns(ns) {
        Some(module) => {
            find_schema_by_ns(ctx, ctx.module(module).data, ns, &root.name).is_some()
        }
        None => false,
    }
}

/// Find a schema child by namespace and local name
///
/// Walks transparently through choice, case and uses and skips
/// groupings, operations and notifications, like the search the
/// resolver uses, but keyed by namespace URI.
fn find_schema_by_ns(
    ctx: &Context,
    head: Option<SnodeId>,
    ns: &str,
    name: &str,
) -> Option<SnodeId> {
    for sib in ctx.tree.siblings(head) {
        let n = ctx.snode(sib);
        match &n.kind {
            SnodeKind::Grouping
            | SnodeKind::Rpc
            | SnodeKind::Notification
            | SnodeKind::Input
            | SnodeKind::Output
            | SnodeKind::Augment { .. } => continue,
            SnodeKind::Choice { .. } | SnodeKind::Case | SnodeKind::Uses { .. } => {
                if let Some(found) = find_schema_by_ns(ctx, n.child, ns, name) {
                    return Some(found);
                }
            }
            _ => {
                if &*n.name == name && &*ctx.module(n.module).ns == ns {
                    return Some(sib);
                }
            }
        }
    }
    None
}

fn parse_elem(
    ctx: &Context,
    tree: &mut DataTree,
    elem: &Element,
    parent: Option<DnodeId>,
    opts: u32,
    unres: &mut Vec<(DnodeId, u32)>,
) -> Result<Option<DnodeId>> {
    let ns = match &elem.ns {
        Some(ns) => Arc::clone(ns),
        None => {
            return Err(DataError::new(
                ErrorKind::Missattr,
                format!("element \"{}\" has no namespace", elem.name),
            )
            .with_line(elem.line)
            .into())
        }
    };

    // locate the schema node
    let schema = match parent {
        None => ctx.get_module_by_ns(&ns).and_then(|module| {
            find_schema_by_ns(ctx, ctx.module(module).data, &ns, &elem.name)
        }),
        Some(p) => {
            find_schema_by_ns(ctx, ctx.snode(tree.node(p).schema).child, &ns, &elem.name)
        }
    };
    let schema = match schema {
        Some(s) => s,
        None => {
            if opts & options::STRICT != 0 || ctx.get_module_by_ns(&ns).is_some() {
                return Err(DataError::new(
                    ErrorKind::Inelem,
                    format!("unknown element \"{}\"", elem.name),
                )
                .with_line(elem.line)
                .into());
            }
            // unknown foreign element, skipped
            return Ok(None);
        }
    };

    if ctx.is_disabled(schema) {
        return Err(DataError::new(
            ErrorKind::Inelem,
            format!("element \"{}\" is disabled by its if-feature", elem.name),
        )
        .with_line(elem.line)
        .with_path(ctx.schema_path(schema))
        .into());
    }

    if opts & options::EDIT != 0 && ctx.snode(schema).flags & flags::CONFIG_R != 0 {
        return Err(DataError::new(
            ErrorKind::Inelem,
            format!("state data \"{}\" in edit-config input", elem.name),
        )
        .with_line(elem.line)
        .with_path(ctx.schema_path(schema))
        .into());
    }

    let insert = if opts & options::EDIT != 0 {
        check_insert_attrs(ctx, schema, elem)?
    } else {
        None
    };

    // allocate and link
    let schema_node = ctx.snode(schema);
    let kind = match &schema_node.kind {
        SnodeKind::Container { .. } => DnodeKind::Container,
        SnodeKind::List { .. } => DnodeKind::List,
        SnodeKind::Leaf { .. } => DnodeKind::Leaf {
            value_str: ctx.dict.insert(""),
            value: Value::Empty,
        },
        SnodeKind::LeafList { .. } => DnodeKind::LeafList {
            value_str: ctx.dict.insert(""),
            value: Value::Empty,
        },
        SnodeKind::Anyxml => DnodeKind::Anyxml {
            xml: Box::new(Element::default()),
        },
        _ => {
            return Err(crate::error::Error::Internal(format!(
                "schema search returned a non-data node for \"{}\"",
                elem.name
            )))
        }
    };
    let node = tree.alloc(DataNode {
        schema,
        parent: None,
        child: None,
        next: None,
        prev: DnodeId(0),
        inst_prev: None,
        inst_next: None,
        attrs: Vec::new(),
        kind,
        line: elem.line,
        pending: None,
    });
    tree.link_last(parent, node);

    let havechildren = matches!(
        ctx.snode(schema).kind,
        SnodeKind::Container { .. } | SnodeKind::List { .. }
    );

    match &ctx.snode(schema).kind {
        SnodeKind::Leaf { type_, .. } | SnodeKind::LeafList { type_, .. } => {
            let tid = *type_;
            let text = elem.text_or_empty();
            if opts & options::FILTER != 0 && text.is_empty() {
                // selection node of a filter, no value needed
                let value_str = ctx.dict.insert("");
                set_leaf_value(tree, node, value_str, Value::Empty);
            } else {
                let resolver = |prefix: &str| -> Option<Arc<str>> {
                    let ns = elem.resolve_prefix(prefix)?;
                    let module = ctx.get_module_by_ns(ns)?;
                    Some(Arc::clone(&ctx.module(module).name))
                };
                let decoded = value::decode(
                    ctx,
                    ctx.snode(schema).module,
                    &elem.name,
                    tid,
                    text,
                    opts,
                    &resolver,
                )
                .map_err(|e| attach_line(e, elem.line))?;
                let value_str = ctx.dict.insert(text);
                tree.node_mut(node).pending = decoded.pending;
                set_leaf_value(tree, node, value_str, decoded.value);
                if decoded.pending.is_some() {
                    unres.push((node, elem.line));
                }
            }
        }
        SnodeKind::Anyxml => {
            if opts & options::FILTER == 0 {
                // detach the subtree from the input document verbatim
                if let DnodeKind::Anyxml { xml } = &mut tree.node_mut(node).kind {
                    *xml = Box::new(elem.clone());
                }
            }
        }
        _ => {}
    }

    if havechildren {
        for child in &elem.children {
            parse_elem(ctx, tree, child, Some(node), opts, unres)?;
        }
    }

    tree.node_mut(node).attrs = elem.attrs.clone();

    // structural checks for this node
    match validate::check_node(ctx, tree, node, opts) {
        Ok(validate::NodeDisposition::Keep) => {}
        Ok(validate::NodeDisposition::Absorbed) => {
            // filter normalization dropped the node
            tree.unlink(node);
            return Ok(None);
        }
        Err(e) => return Err(e),
    }

    // user-ordered insert handling applies after the node is in place
    if let Some((insert, anchor)) = insert {
        apply_insert(ctx, tree, node, &insert, anchor.as_deref(), elem.line)?;
    }

    Ok(Some(node))
}

fn set_leaf_value(tree: &mut DataTree, node: DnodeId, value_str: Arc<str>, value: Value) {
    match &mut tree.node_mut(node).kind {
        DnodeKind::Leaf {
            value_str: vs,
            value: v,
        }
        | DnodeKind::LeafList {
            value_str: vs,
            value: v,
        } => {
            *vs = value_str;
            *v = value;
        }
        _ => {}
    }
}

fn attach_line(e: crate::error::Error, line: u32) -> crate::error::Error {
    match e {
        crate::error::Error::Data(d) if d.line.is_none() => {
            crate::error::Error::Data(d.with_line(line))
        }
        other => other,
    }
}

/// Check the NETCONF `insert`/`value` attributes of an edit-config node
///
/// Returns the insert mode and the anchor value for before/after.
fn check_insert_attrs(
    ctx: &Context,
    schema: SnodeId,
    elem: &Element,
) -> Result<Option<(String, Option<String>)>> {
    let mut insert: Option<String> = None;
    let mut relative = false;
    for attr in &elem.attrs {
        if attr.name != "insert" || attr.ns.as_deref() != Some(YANG_ATTRS_NS) {
            continue;
        }
        if !ctx.snode(schema).is_user_ordered() {
            return Err(DataError::new(
                ErrorKind::Inattr,
                format!("insert attribute on non-user-ordered \"{}\"", elem.name),
            )
            .with_line(elem.line)
            .into());
        }
        if insert.is_some() {
            return Err(DataError::new(
                ErrorKind::TooMany,
                format!("multiple insert attributes on \"{}\"", elem.name),
            )
            .with_line(elem.line)
            .into());
        }
        match attr.value.as_str() {
            "first" | "last" => {}
            "before" | "after" => relative = true,
            other => {
                return Err(DataError::new(
                    ErrorKind::Inarg,
                    format!("invalid insert value \"{}\"", other),
                )
                .with_line(elem.line)
                .into())
            }
        }
        insert = Some(attr.value.clone());
    }

    let mut anchor: Option<String> = None;
    for attr in &elem.attrs {
        if attr.name != "value" || attr.ns.as_deref() != Some(YANG_ATTRS_NS) {
            continue;
        }
        if !relative {
            return Err(DataError::new(
                ErrorKind::Inattr,
                format!("value attribute without before/after on \"{}\"", elem.name),
            )
            .with_line(elem.line)
            .into());
        }
        if anchor.is_some() {
            return Err(DataError::new(
                ErrorKind::TooMany,
                format!("multiple value attributes on \"{}\"", elem.name),
            )
            .with_line(elem.line)
            .into());
        }
        anchor = Some(attr.value.clone());
    }
    if relative && anchor.is_none() {
        return Err(DataError::new(
            ErrorKind::Missattr,
            format!("insert before/after on \"{}\" requires a value attribute", elem.name),
        )
        .with_line(elem.line)
        .into());
    }
    Ok(insert.map(|i| (i, anchor)))
}

/// Reposition a user-ordered instance according to its insert attribute
fn apply_insert(
    ctx: &Context,
    tree: &mut DataTree,
    node: DnodeId,
    insert: &str,
    anchor: Option<&str>,
    line: u32,
) -> Result<()> {
    match insert {
        "first" => tree.move_first(node),
        "last" => {}
        "before" | "after" => {
            let anchor_value = anchor.unwrap_or("");
            let target = find_instance_by_value(ctx, tree, node, anchor_value);
            match target {
                Some(target) => tree.move_relative(node, target, insert == "before"),
                None => {
                    return Err(DataError::new(
                        ErrorKind::Inval,
                        format!("insert anchor \"{}\" not found", anchor_value),
                    )
                    .with_line(line)
                    .into())
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Locate the peer instance addressed by an insert `value` attribute
///
/// For leaf-lists the attribute carries the peer's value; for lists it
/// carries the key predicates in `[key='value']` form.
fn find_instance_by_value(
    ctx: &Context,
    tree: &DataTree,
    node: DnodeId,
    anchor: &str,
) -> Option<DnodeId> {
    let schema = tree.node(node).schema;
    let head = match tree.node(node).parent {
        Some(p) => tree.node(p).child,
        None => tree.root(),
    };
    for sib in tree.siblings(head) {
        if sib == node || tree.node(sib).schema != schema {
            continue;
        }
        let matches = match &tree.node(sib).kind {
            DnodeKind::LeafList { value_str, .. } => &**value_str == anchor,
            DnodeKind::List => list_key_predicates(ctx, tree, sib) == anchor,
            _ => false,
        };
        if matches {
            return Some(sib);
        }
    }
    None
}

/// Render a list instance's keys as `[key='value']...`
pub(crate) fn list_key_predicates(ctx: &Context, tree: &DataTree, list: DnodeId) -> String {
    let schema = tree.node(list).schema;
    let keys = match &ctx.snode(schema).kind {
        SnodeKind::List { keys, .. } => keys.clone(),
        _ => return String::new(),
    };
    let mut out = String::new();
    for key in keys {
        let value = tree
            .children(list)
            .find(|&c| tree.node(c).schema == key)
            .and_then(|c| tree.node(c).value_str().cloned());
        if let Some(value) = value {
            out.push_str(&format!("[{}='{}']", ctx.snode(key).name, value));
        }
    }
    out
}
