//! Schema loading and resolution tests

use yangtree::schema::{SnodeKind, TypeBase};
use yangtree::{Context, ErrorKind, SchemaFormat};

fn ctx() -> Context {
    Context::new(Vec::<std::path::PathBuf>::new())
}

fn load(ctx: &mut Context, source: &str) -> yangtree::schema::ModId {
    ctx.parse_module(source, SchemaFormat::Yang).unwrap()
}

#[test]
fn test_minimal_module() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module net {
          namespace "urn:example:net";
          prefix net;
          revision 2015-03-01 { description "initial"; }
          revision 2014-06-06;

          container interfaces {
            leaf count { type uint32; }
          }
        }
        "#,
    );
    let module = ctx.module(mid);
    assert_eq!(&*module.name, "net");
    assert_eq!(&*module.ns, "urn:example:net");
    assert_eq!(module.revision(), Some("2015-03-01"));
    assert_eq!(ctx.module_names(), vec!["net"]);
    assert!(ctx.get_module_by_ns("urn:example:net").is_some());

    let top = ctx.schema_tree().siblings(module.data).next().unwrap();
    assert_eq!(&*ctx.snode(top).name, "interfaces");
    let leaf = ctx.schema_tree().children(top).next().unwrap();
    match &ctx.snode(leaf).kind {
        SnodeKind::Leaf { type_, .. } => {
            assert_eq!(ctx.stype(*type_).base, TypeBase::Uint32);
        }
        other => panic!("expected a leaf, got {}", other.keyword()),
    }
}

#[test]
fn test_sibling_ring_is_closed() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module r {
          namespace "urn:r";
          prefix r;
          leaf a { type string; }
          leaf b { type string; }
          leaf c { type string; }
        }
        "#,
    );
    let head = ctx.module(mid).data.unwrap();
    let siblings: Vec<_> = ctx.schema_tree().siblings(Some(head)).collect();
    assert_eq!(siblings.len(), 3);
    // the head's prev points at the tail
    assert_eq!(ctx.snode(head).prev, *siblings.last().unwrap());
    assert_eq!(ctx.snode(*siblings.last().unwrap()).next, None);
    for &sib in &siblings {
        assert_eq!(ctx.snode(sib).parent, None);
    }
}

#[test]
fn test_repeated_statement_rejected() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module bad {
              namespace "urn:bad";
              prefix b;
              description "one";
              description "two";
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TooMany));
    // the failed module is not registered
    assert!(ctx.get_module("bad", None).is_none());
}

#[test]
fn test_duplicate_sibling_name_rejected() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module dup {
              namespace "urn:dup";
              prefix d;
              leaf x { type string; }
              leaf x { type string; }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::DupName));
}

#[test]
fn test_circular_import() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.yang"),
        r#"module a {
          namespace "urn:a"; prefix a;
          import b { prefix b; }
        }"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b.yang"),
        r#"module b {
          namespace "urn:b"; prefix b;
          revision 2015-01-01;
          import a { prefix a; }
        }"#,
    )
    .unwrap();

    let mut ctx = Context::new([dir.path().to_path_buf()]);
    let err = ctx.load_module("a", None).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Circular));
    assert!(ctx.get_module("a", None).is_none());
    assert!(ctx.get_module("b", None).is_none());
}

#[test]
fn test_import_and_qualified_typedef() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base-types.yang"),
        r#"module base-types {
          namespace "urn:base-types"; prefix bt;
          typedef percent { type uint8 { range "0..100"; } }
        }"#,
    )
    .unwrap();

    let mut ctx = Context::new([dir.path().to_path_buf()]);
    let mid = load(
        &mut ctx,
        r#"
        module user {
          namespace "urn:user";
          prefix u;
          import base-types { prefix bt; }
          leaf load { type bt:percent; }
        }
        "#,
    );
    assert!(ctx.get_module("base-types", None).is_some());
    let leaf = ctx.schema_tree().siblings(ctx.module(mid).data).next().unwrap();
    match &ctx.snode(leaf).kind {
        SnodeKind::Leaf { type_, .. } => {
            assert_eq!(ctx.stype(*type_).base, TypeBase::Uint8);
            assert_eq!(ctx.type_chain(*type_).len(), 2);
        }
        _ => panic!("expected a leaf"),
    }
}

#[test]
fn test_unknown_type_fails() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module t {
              namespace "urn:t"; prefix t;
              leaf x { type no-such-type; }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Inval));
}

#[test]
fn test_typedef_default_validated() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module t {
              namespace "urn:t"; prefix t;
              typedef small { type uint8 { range "0..9"; } default "12"; }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Oorval));

    let mut ctx2 = Context::new(Vec::<std::path::PathBuf>::new());
    load(
        &mut ctx2,
        r#"
        module t {
          namespace "urn:t"; prefix t;
          typedef small { type uint8 { range "0..9"; } default "7"; }
        }
        "#,
    );
}

#[test]
fn test_identity_cycle_rejected() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module ids {
              namespace "urn:ids"; prefix i;
              identity alpha { base beta; }
              identity beta { base alpha; }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Circular));
}

#[test]
fn test_identity_hierarchy_resolves() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module crypto {
          namespace "urn:crypto"; prefix c;
          identity algorithm;
          identity aes { base algorithm; }
          identity aes-256 { base aes; }
        }
        "#,
    );
    let module = ctx.module(mid);
    assert_eq!(module.identities.len(), 3);
    let aes256 = &module.identities[2];
    let aes = aes256.base.unwrap();
    assert_eq!(&*ctx.module(aes.module).identities[aes.index].name, "aes");
}

#[test]
fn test_list_keys_resolve() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module l {
          namespace "urn:l"; prefix l;
          list server {
            key "name port";
            leaf name { type string; }
            leaf port { type uint16; }
            leaf owner { type string; }
            unique "owner";
          }
        }
        "#,
    );
    let list = ctx.schema_tree().siblings(ctx.module(mid).data).next().unwrap();
    match &ctx.snode(list).kind {
        SnodeKind::List { keys, unique, .. } => {
            assert_eq!(keys.len(), 2);
            assert_eq!(&*ctx.snode(keys[0]).name, "name");
            assert_eq!(&*ctx.snode(keys[1]).name, "port");
            assert!(ctx.snode(keys[0]).is_mandatory());
            assert_eq!(unique.len(), 1);
            assert_eq!(unique[0].nodes.len(), 1);
            assert_eq!(&*ctx.snode(unique[0].nodes[0]).name, "owner");
        }
        _ => panic!("expected a list"),
    }
}

#[test]
fn test_list_key_must_exist() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module l {
              namespace "urn:l"; prefix l;
              list server {
                key "name";
                leaf port { type uint16; }
              }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Misselem));
}

#[test]
fn test_grouping_uses_expansion() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module g {
          namespace "urn:g"; prefix g;
          grouping endpoint {
            leaf address { type string; }
            leaf port { type uint16; }
          }
          container server {
            uses endpoint {
              refine port { default "8080"; }
            }
          }
        }
        "#,
    );
    let server = ctx
        .schema_tree()
        .siblings(ctx.module(mid).data)
        .find(|&n| &*ctx.snode(n).name == "server")
        .unwrap();
    let uses = ctx.schema_tree().children(server).next().unwrap();
    assert!(matches!(
        ctx.snode(uses).kind,
        SnodeKind::Uses { expanded: true, .. }
    ));
    let copies: Vec<_> = ctx.schema_tree().children(uses).collect();
    assert_eq!(copies.len(), 2);
    match &ctx.snode(copies[1]).kind {
        SnodeKind::Leaf { dflt, .. } => assert_eq!(dflt.as_deref(), Some("8080")),
        _ => panic!("expected the refined leaf"),
    }
}

#[test]
fn test_leafref_target_resolution() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module lr {
          namespace "urn:lr"; prefix lr;
          container state {
            leaf active { type string; }
          }
          leaf pointer {
            type leafref { path "/lr:state/lr:active"; }
          }
        }
        "#,
    );
    let pointer = ctx
        .schema_tree()
        .siblings(ctx.module(mid).data)
        .find(|&n| &*ctx.snode(n).name == "pointer")
        .unwrap();
    match &ctx.snode(pointer).kind {
        SnodeKind::Leaf { type_, .. } => match &ctx.stype(*type_).info {
            yangtree::schema::TypeInfo::Leafref { target, .. } => {
                let target = target.expect("target resolved");
                assert_eq!(&*ctx.snode(target).name, "active");
            }
            _ => panic!("expected leafref info"),
        },
        _ => panic!("expected a leaf"),
    }
}

#[test]
fn test_leafref_to_missing_target_fails() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module lr {
              namespace "urn:lr"; prefix lr;
              leaf pointer { type leafref { path "/lr:nowhere"; } }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::LeafrefTarget));
}

#[test]
fn test_augment_across_modules() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("box.yang"),
        r#"module box {
          namespace "urn:box"; prefix bx;
          container shelf { leaf label { type string; } }
        }"#,
    )
    .unwrap();

    let mut ctx = Context::new([dir.path().to_path_buf()]);
    load(
        &mut ctx,
        r#"
        module extras {
          namespace "urn:extras"; prefix ex;
          import box { prefix bx; }
          augment "/bx:shelf" {
            leaf color { type string; }
          }
        }
        "#,
    );
    let box_mid = ctx.get_module("box", None).unwrap();
    let shelf = ctx.schema_tree().siblings(ctx.module(box_mid).data).next().unwrap();
    let children: Vec<_> = ctx.schema_tree().children(shelf).collect();
    assert_eq!(children.len(), 2);
    let color = children[1];
    assert_eq!(&*ctx.snode(color).name, "color");
    // augmented children keep their own module for namespace matching
    assert_eq!(
        &*ctx.module(ctx.snode(color).module).name,
        "extras"
    );
}

#[test]
fn test_feature_state() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module f {
          namespace "urn:f"; prefix f;
          feature virtualization;
          feature containers { if-feature virtualization; }
          container guests { if-feature containers; }
        }
        "#,
    );
    let guests = ctx.schema_tree().siblings(ctx.module(mid).data).next().unwrap();
    assert!(ctx.is_disabled(guests));

    // the dependent feature alone is not enough
    ctx.feature_enable(mid, "containers").unwrap();
    assert!(ctx.is_disabled(guests));

    ctx.feature_enable(mid, "virtualization").unwrap();
    assert!(!ctx.is_disabled(guests));

    ctx.feature_disable(mid, "*").unwrap();
    assert!(ctx.is_disabled(guests));

    let err = ctx.feature_enable(mid, "no-such").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Inarg));
}

#[test]
fn test_yin_and_yang_agree() {
    let yang = r#"
        module pair {
          namespace "urn:pair";
          prefix p;
          container c {
            leaf name { type string { length "1..8"; } }
            leaf-list tags { type string; ordered-by user; }
          }
        }
    "#;
    let yin = r#"<?xml version="1.0" encoding="UTF-8"?>
        <module name="pair" xmlns="urn:ietf:params:xml:ns:yang:yin:1">
          <namespace uri="urn:pair"/>
          <prefix value="p"/>
          <container name="c">
            <leaf name="name"><type name="string"><length value="1..8"/></type></leaf>
            <leaf-list name="tags"><type name="string"/><ordered-by value="user"/></leaf-list>
          </container>
        </module>
    "#;

    let mut ctx_a = Context::new(Vec::<std::path::PathBuf>::new());
    let a = ctx_a.parse_module(yang, SchemaFormat::Yang).unwrap();
    let mut ctx_b = Context::new(Vec::<std::path::PathBuf>::new());
    let b = ctx_b.parse_module(yin, SchemaFormat::Yin).unwrap();

    assert_eq!(ctx_a.print_module(a), ctx_b.print_module(b));
}

#[test]
fn test_yin_print_round_trip() {
    let mut ctx_a = Context::new(Vec::<std::path::PathBuf>::new());
    let a = load(
        &mut ctx_a,
        r#"
        module rt {
          namespace "urn:rt"; prefix rt;
          feature fast;
          typedef level { type uint8 { range "1..5"; } default "3"; }
          container root {
            presence "exists";
            leaf mode { type enumeration { enum normal; enum turbo; } }
            list entry {
              key "id";
              leaf id { type level; }
              leaf note { type string; }
            }
          }
        }
        "#,
    );
    let printed = ctx_a.print_module(a);

    let mut ctx_b = Context::new(Vec::<std::path::PathBuf>::new());
    let b = ctx_b.parse_module(&printed, SchemaFormat::Yin).unwrap();
    assert_eq!(printed, ctx_b.print_module(b));
}

#[test]
fn test_enum_restriction_must_shrink() {
    let mut ctx = ctx();
    let err = ctx
        .parse_module(
            r#"
            module e {
              namespace "urn:e"; prefix e;
              typedef mode { type enumeration { enum a; enum b; } }
              leaf m { type mode { enum c; } }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Inval));
}

#[test]
fn test_derivation_chain_terminates() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module chain {
          namespace "urn:chain"; prefix c;
          typedef t1 { type string { length "1..100"; } }
          typedef t2 { type t1 { length "1..50"; } }
          leaf l { type t2 { length "5..10"; } }
        }
        "#,
    );
    let leaf = ctx.schema_tree().siblings(ctx.module(mid).data).next().unwrap();
    if let SnodeKind::Leaf { type_, .. } = &ctx.snode(leaf).kind {
        let chain = ctx.type_chain(*type_);
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|&t| ctx.stype(t).base == TypeBase::Str));
    } else {
        panic!("expected a leaf");
    }
}

#[test]
fn test_rpc_and_notification() {
    let mut ctx = ctx();
    let mid = load(
        &mut ctx,
        r#"
        module ops {
          namespace "urn:ops"; prefix o;
          rpc restart {
            input { leaf delay { type uint32; } }
            output { leaf status { type string; } }
          }
          notification link-down { leaf port { type string; } }
        }
        "#,
    );
    let names: Vec<String> = ctx
        .schema_tree()
        .siblings(ctx.module(mid).data)
        .map(|n| ctx.snode(n).name.to_string())
        .collect();
    assert_eq!(names, vec!["restart", "link-down"]);

    // operations do not take part in data matching
    let err = ctx
        .parse_data(r#"<restart xmlns="urn:ops"/>"#, 0)
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Inelem));

    // and they survive the print cycle
    let printed = ctx.print_module(mid);
    let mut ctx2 = Context::new(Vec::<std::path::PathBuf>::new());
    let reparsed = ctx2.parse_module(&printed, SchemaFormat::Yin).unwrap();
    assert_eq!(printed, ctx2.print_module(reparsed));
}

#[test]
fn test_missing_module_callback() {
    let mut ctx = ctx();
    ctx.set_missing_module_callback(Box::new(|name, _rev| {
        if name == "supplied" {
            Some((
                "module supplied { namespace \"urn:supplied\"; prefix s; }".to_string(),
                SchemaFormat::Yang,
            ))
        } else {
            None
        }
    }));
    let mid = ctx.load_module("supplied", None).unwrap();
    assert_eq!(&*ctx.module(mid).name, "supplied");
    assert!(ctx.load_module("absent", None).is_err());
}

#[test]
fn test_submodule_include() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("body.yang"),
        r#"submodule body {
          belongs-to host { prefix h; }
          leaf hostname { type string; }
        }"#,
    )
    .unwrap();

    let mut ctx = Context::new([dir.path().to_path_buf()]);
    let mid = load(
        &mut ctx,
        r#"
        module host {
          namespace "urn:host"; prefix h;
          include body;
          leaf domain { type string; }
        }
        "#,
    );
    assert_eq!(ctx.submodule_names(mid), vec!["body"]);
    let names: Vec<String> = ctx
        .schema_tree()
        .siblings(ctx.module(mid).data)
        .map(|n| ctx.snode(n).name.to_string())
        .collect();
    assert_eq!(names, vec!["hostname", "domain"]);
}
