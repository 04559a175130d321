//! Schema and data serialization
//!
//! The schema printer emits YIN, the data printer XML. Both feed the
//! round-trip contract: reparsing printed output reproduces the model
//! up to whitespace and lexical canonicalization.

use crate::context::Context;
use crate::data::node::{DataTree, DnodeId, DnodeKind};
use crate::parser::yin::YIN_NS;
use crate::schema::node::flags;
use crate::schema::{ModId, SnodeId, SnodeKind, TypeId, TypeInfo};
use std::fmt::Write;

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            let _ = write!(self.out, " {}=\"{}\"", name, xml_escape(value));
        }
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.indent();
        let _ = writeln!(self.out, "</{}>", tag);
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            let _ = write!(self.out, " {}=\"{}\"", name, xml_escape(value));
        }
        self.out.push_str("/>\n");
    }

    fn text_elem(&mut self, tag: &str, text: &str) {
        self.indent();
        let _ = writeln!(self.out, "<{0}>{1}</{0}>", tag, xml_escape(text));
    }

    /// `<tag><text>...</text></tag>` used by the text-argument statements
    fn arg_elem(&mut self, tag: &str, arg_name: &str, text: &str) {
        self.open(tag, &[]);
        self.text_elem(arg_name, text);
        self.close(tag);
    }
}

// =============================================================================
// YIN schema printing
// =============================================================================

/// Serialize a module in YIN format
pub fn print_module_yin(ctx: &Context, mid: ModId) -> String {
    let module = ctx.module(mid);
    let mut p = Printer::new();
    p.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let prefix_decl = format!("xmlns:{}", module.prefix);
    p.open(
        "module",
        &[
            ("name", &module.name),
            ("xmlns", YIN_NS),
            (&prefix_decl, &module.ns),
        ],
    );
    p.empty("namespace", &[("uri", &module.ns)]);
    p.empty("prefix", &[("value", &module.prefix)]);

    for imp in &module.imports {
        let imported = ctx.module(imp.module);
        p.open("import", &[("module", &imported.name)]);
        p.empty("prefix", &[("value", &imp.prefix)]);
        if let Some(rev) = &imp.revision {
            p.empty("revision-date", &[("date", rev)]);
        }
        p.close("import");
    }
    for inc in &module.includes {
        p.empty("include", &[("module", &inc.name)]);
    }
    if let Some(org) = &module.org {
        p.arg_elem("organization", "text", org);
    }
    if let Some(contact) = &module.contact {
        p.arg_elem("contact", "text", contact);
    }
    if let Some(dsc) = &module.dsc {
        p.arg_elem("description", "text", dsc);
    }
    if let Some(reference) = &module.reference {
        p.arg_elem("reference", "text", reference);
    }
    for rev in &module.revisions {
        if rev.dsc.is_none() && rev.reference.is_none() {
            p.empty("revision", &[("date", &rev.date)]);
        } else {
            p.open("revision", &[("date", &rev.date)]);
            if let Some(dsc) = &rev.dsc {
                p.arg_elem("description", "text", dsc);
            }
            if let Some(reference) = &rev.reference {
                p.arg_elem("reference", "text", reference);
            }
            p.close("revision");
        }
    }

    for feature in &module.features {
        if feature.iffeatures.is_empty() && feature.dsc.is_none() {
            p.empty("feature", &[("name", &feature.name)]);
        } else {
            p.open("feature", &[("name", &feature.name)]);
            for &dep in &feature.iffeatures {
                let name = feature_ref(ctx, mid, dep);
                p.empty("if-feature", &[("name", &name)]);
            }
            if let Some(dsc) = &feature.dsc {
                p.arg_elem("description", "text", dsc);
            }
            p.close("feature");
        }
    }
    for ident in &module.identities {
        if ident.base.is_none() && ident.dsc.is_none() {
            p.empty("identity", &[("name", &ident.name)]);
        } else {
            p.open("identity", &[("name", &ident.name)]);
            if let Some(base) = ident.base {
                let name = format!(
                    "{}:{}",
                    ctx.module(base.module).prefix,
                    ctx.module(base.module).identities[base.index].name
                );
                p.empty("base", &[("name", &name)]);
            }
            if let Some(dsc) = &ident.dsc {
                p.arg_elem("description", "text", dsc);
            }
            p.close("identity");
        }
    }
    for tpdf in &module.typedefs {
        p.open("typedef", &[("name", &tpdf.name)]);
        print_type(ctx, &mut p, tpdf.type_);
        if let Some(units) = &tpdf.units {
            p.empty("units", &[("value", units)]);
        }
        if let Some(dflt) = &tpdf.dflt {
            p.empty("default", &[("value", dflt)]);
        }
        if let Some(dsc) = &tpdf.dsc {
            p.arg_elem("description", "text", dsc);
        }
        p.close("typedef");
    }

    for node in ctx.tree.siblings(module.data) {
        print_snode(ctx, &mut p, mid, node);
    }

    for &aug in &module.augments {
        if let SnodeKind::Augment {
            target_path,
            spliced,
            ..
        } = &ctx.snode(aug).kind
        {
            p.open("augment", &[("target-node", target_path)]);
            for &child in spliced {
                print_snode(ctx, &mut p, mid, child);
            }
            p.close("augment");
        }
    }

    p.close("module");
    p.out
}

fn feature_ref(ctx: &Context, from: ModId, feat: crate::schema::FeatId) -> String {
    let name = &ctx.module(feat.module).features[feat.index].name;
    if feat.module == from {
        name.to_string()
    } else {
        format!("{}:{}", ctx.module(feat.module).prefix, name)
    }
}

fn print_common(ctx: &Context, p: &mut Printer, node: SnodeId) {
    let n = ctx.snode(node);
    for &feat in &n.iffeatures {
        let name = feature_ref(ctx, n.module, feat);
        p.empty("if-feature", &[("name", &name)]);
    }
    if let Some(when) = &n.when {
        p.empty("when", &[("condition", &when.cond)]);
    }
    for must in &n.musts {
        if must.emsg.is_none() && must.eapptag.is_none() {
            p.empty("must", &[("condition", &must.expr)]);
        } else {
            p.open("must", &[("condition", &must.expr)]);
            if let Some(emsg) = &must.emsg {
                p.arg_elem("error-message", "value", emsg);
            }
            if let Some(tag) = &must.eapptag {
                p.empty("error-app-tag", &[("value", tag)]);
            }
            p.close("must");
        }
    }
    match n.flags & flags::CONFIG_MASK {
        f if f == flags::CONFIG_R => p.empty("config", &[("value", "false")]),
        _ => {}
    }
    if n.flags & flags::MAND_TRUE != 0 && n.flags & flags::KEY == 0 {
        p.empty("mandatory", &[("value", "true")]);
    }
    match n.flags & flags::STATUS_MASK {
        f if f == flags::STATUS_DEPRC => p.empty("status", &[("value", "deprecated")]),
        f if f == flags::STATUS_OBSLT => p.empty("status", &[("value", "obsolete")]),
        _ => {}
    }
    if n.is_user_ordered() {
        p.empty("ordered-by", &[("value", "user")]);
    }
    if let Some(dsc) = &n.dsc {
        p.arg_elem("description", "text", dsc);
    }
    if let Some(reference) = &n.reference {
        p.arg_elem("reference", "text", reference);
    }
}

fn print_children(ctx: &Context, p: &mut Printer, mid: ModId, node: SnodeId) {
    for child in ctx.tree.children(node) {
        // children spliced in by other modules print with their augment
        if ctx.snode(child).module == mid {
            print_snode(ctx, p, mid, child);
        }
    }
}

fn print_snode(ctx: &Context, p: &mut Printer, mid: ModId, node: SnodeId) {
    let n = ctx.snode(node);
    let name: &str = &n.name;
    match &n.kind {
        SnodeKind::Container { presence } => {
            p.open("container", &[("name", name)]);
            if let Some(presence) = presence {
                p.empty("presence", &[("value", presence)]);
            }
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("container");
        }
        SnodeKind::Leaf { type_, dflt, units } => {
            p.open("leaf", &[("name", name)]);
            print_type(ctx, p, *type_);
            if let Some(units) = units {
                p.empty("units", &[("value", units)]);
            }
            if let Some(dflt) = dflt {
                p.empty("default", &[("value", dflt)]);
            }
            print_common(ctx, p, node);
            p.close("leaf");
        }
        SnodeKind::LeafList {
            type_, units, min, max,
        } => {
            p.open("leaf-list", &[("name", name)]);
            print_type(ctx, p, *type_);
            if let Some(units) = units {
                p.empty("units", &[("value", units)]);
            }
            if *min > 0 {
                p.empty("min-elements", &[("value", &min.to_string())]);
            }
            if *max > 0 {
                p.empty("max-elements", &[("value", &max.to_string())]);
            }
            print_common(ctx, p, node);
            p.close("leaf-list");
        }
        SnodeKind::List {
            keys_str,
            unique,
            min,
            max,
            ..
        } => {
            p.open("list", &[("name", name)]);
            if let Some(keys) = keys_str {
                p.empty("key", &[("value", keys)]);
            }
            for set in unique {
                let tag = set
                    .exprs
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                p.empty("unique", &[("tag", &tag)]);
            }
            if *min > 0 {
                p.empty("min-elements", &[("value", &min.to_string())]);
            }
            if *max > 0 {
                p.empty("max-elements", &[("value", &max.to_string())]);
            }
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("list");
        }
        SnodeKind::Choice { dflt_name, .. } => {
            p.open("choice", &[("name", name)]);
            if let Some(dflt) = dflt_name {
                p.empty("default", &[("value", dflt)]);
            }
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("choice");
        }
        SnodeKind::Case => {
            p.open("case", &[("name", name)]);
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("case");
        }
        SnodeKind::Anyxml => {
            p.open("anyxml", &[("name", name)]);
            print_common(ctx, p, node);
            p.close("anyxml");
        }
        SnodeKind::Grouping => {
            p.open("grouping", &[("name", name)]);
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("grouping");
        }
        SnodeKind::Uses { grouping_name, .. } => {
            // the expanded copy is an implementation detail
            p.empty("uses", &[("name", grouping_name)]);
        }
        SnodeKind::Rpc => {
            p.open("rpc", &[("name", name)]);
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("rpc");
        }
        SnodeKind::Notification => {
            p.open("notification", &[("name", name)]);
            print_common(ctx, p, node);
            print_children(ctx, p, mid, node);
            p.close("notification");
        }
        SnodeKind::Input => {
            p.open("input", &[]);
            print_children(ctx, p, mid, node);
            p.close("input");
        }
        SnodeKind::Output => {
            p.open("output", &[]);
            print_children(ctx, p, mid, node);
            p.close("output");
        }
        SnodeKind::Augment { .. } => {}
    }
}

fn print_type(ctx: &Context, p: &mut Printer, tid: TypeId) {
    let spec = ctx.stype(tid);
    let written = match &spec.module_name {
        Some(module) => format!("{}:{}", module, spec.name),
        None => spec.name.to_string(),
    };
    let has_info = !matches!(spec.info, TypeInfo::None);
    if !has_info {
        p.empty("type", &[("name", &written)]);
        return;
    }
    p.open("type", &[("name", &written)]);
    match &spec.info {
        TypeInfo::Str { length, patterns } => {
            if let Some(length) = length {
                p.empty("length", &[("value", &length.expr)]);
            }
            for pattern in patterns {
                p.empty("pattern", &[("value", &pattern.expr)]);
            }
        }
        TypeInfo::Binary { length } => {
            if let Some(length) = length {
                p.empty("length", &[("value", &length.expr)]);
            }
        }
        TypeInfo::Num { range } => {
            if let Some(range) = range {
                p.empty("range", &[("value", &range.expr)]);
            }
        }
        TypeInfo::Dec64 { range, dig } => {
            if *dig > 0 {
                p.empty("fraction-digits", &[("value", &dig.to_string())]);
            }
            if let Some(range) = range {
                p.empty("range", &[("value", &range.expr)]);
            }
        }
        TypeInfo::Enums { enums } => {
            for e in enums {
                p.open("enum", &[("name", &e.name)]);
                p.empty("value", &[("value", &e.value.to_string())]);
                p.close("enum");
            }
        }
        TypeInfo::Bits { bits } => {
            for b in bits {
                p.open("bit", &[("name", &b.name)]);
                p.empty("position", &[("value", &b.pos.to_string())]);
                p.close("bit");
            }
        }
        TypeInfo::Leafref { path, .. } => {
            if let Some(path) = path {
                p.empty("path", &[("value", path)]);
            }
        }
        TypeInfo::Ident { base_name, .. } => {
            if let Some(base) = base_name {
                p.empty("base", &[("name", base)]);
            }
        }
        TypeInfo::Union { types } => {
            for &member in types {
                print_type(ctx, p, member);
            }
        }
        TypeInfo::None => {}
    }
    p.close("type");
}

// =============================================================================
// XML data printing
// =============================================================================

/// Serialize a data tree in XML format
pub fn print_data_xml(ctx: &Context, tree: &DataTree) -> String {
    let mut p = Printer::new();
    for node in tree.siblings(tree.root()) {
        print_dnode(ctx, tree, &mut p, node, None);
    }
    p.out
}

fn print_dnode(
    ctx: &Context,
    tree: &DataTree,
    p: &mut Printer,
    node: DnodeId,
    parent_ns: Option<&str>,
) {
    let schema = ctx.snode(tree.node(node).schema);
    let ns = &*ctx.module(schema.module).ns;
    let name: &str = &schema.name;
    // declare the namespace on entry points and module boundaries
    let ns_attr = if parent_ns != Some(ns) {
        Some(("xmlns", ns))
    } else {
        None
    };
    let attrs: Vec<(&str, &str)> = ns_attr.into_iter().collect();

    match &tree.node(node).kind {
        DnodeKind::Leaf { value, .. } | DnodeKind::LeafList { value, .. } => {
            let text = value.canonical(ctx);
            if text.is_empty() {
                p.empty(name, &attrs);
            } else {
                p.indent();
                let mut tag = String::from(name);
                for (an, av) in &attrs {
                    tag.push_str(&format!(" {}=\"{}\"", an, xml_escape(av)));
                }
                let _ = writeln!(p.out, "<{}>{}</{}>", tag, xml_escape(&text), name);
            }
        }
        DnodeKind::Anyxml { xml } => {
            p.open(name, &attrs);
            print_anyxml(p, xml);
            p.close(name);
        }
        DnodeKind::Container | DnodeKind::List => {
            if tree.node(node).child.is_none() {
                p.empty(name, &attrs);
            } else {
                p.open(name, &attrs);
                let children: Vec<DnodeId> = tree.children(node).collect();
                for child in children {
                    print_dnode(ctx, tree, p, child, Some(ns));
                }
                p.close(name);
            }
        }
    }
}

fn print_anyxml(p: &mut Printer, elem: &crate::xml::Element) {
    for child in &elem.children {
        if child.children.is_empty() && child.text.is_none() {
            p.empty(&child.name, &[]);
        } else if child.children.is_empty() {
            p.text_elem(&child.name, child.text_or_empty());
        } else {
            p.open(&child.name, &[]);
            print_anyxml(p, child);
            p.close(&child.name);
        }
    }
    if let Some(text) = &elem.text {
        p.indent();
        let _ = writeln!(p.out, "{}", xml_escape(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn test_printer_nesting() {
        let mut p = Printer::new();
        p.open("a", &[("name", "x")]);
        p.empty("b", &[]);
        p.close("a");
        assert_eq!(p.out, "<a name=\"x\">\n  <b/>\n</a>\n");
    }
}
