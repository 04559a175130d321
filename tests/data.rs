//! Data tree parsing and validation tests

use yangtree::{options, Context, ErrorKind, SchemaFormat, Value};

fn ctx_with(source: &str) -> Context {
    let mut ctx = Context::new(Vec::<std::path::PathBuf>::new());
    ctx.parse_module(source, SchemaFormat::Yang).unwrap();
    ctx
}

const RANGES: &str = r#"
    module ranges {
      namespace "urn:ranges"; prefix r;
      container box {
        leaf level { type uint8 { range "0..10|20..30"; } }
      }
    }
"#;

fn level_xml(value: &str) -> String {
    format!(r#"<box xmlns="urn:ranges"><level>{}</level></box>"#, value)
}

#[test]
fn test_range_union_boundaries() {
    let ctx = ctx_with(RANGES);
    assert!(ctx.parse_data(&level_xml("5"), 0).is_ok());
    assert!(ctx.parse_data(&level_xml("25"), 0).is_ok());

    let err = ctx.parse_data(&level_xml("15"), 0).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Oorval));
    let err = ctx.parse_data(&level_xml("31"), 0).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Oorval));
}

#[test]
fn test_integer_bounds() {
    let ctx = ctx_with(
        r#"
        module ints {
          namespace "urn:ints"; prefix i;
          leaf tiny { type int8; }
        }
        "#,
    );
    let xml = |v: &str| format!(r#"<tiny xmlns="urn:ints">{}</tiny>"#, v);
    let tree = ctx.parse_data(&xml("-128"), 0).unwrap();
    let root = tree.root().unwrap();
    assert_eq!(tree.node(root).value(), Some(&Value::Int(-128)));
    assert!(ctx.parse_data(&xml("127"), 0).is_ok());

    assert_eq!(
        ctx.parse_data(&xml("-129"), 0).unwrap_err().kind(),
        Some(ErrorKind::Oorval)
    );
    assert_eq!(
        ctx.parse_data(&xml("12a"), 0).unwrap_err().kind(),
        Some(ErrorKind::Inval)
    );
}

#[test]
fn test_boolean_and_empty() {
    let ctx = ctx_with(
        r#"
        module be {
          namespace "urn:be"; prefix b;
          leaf on { type boolean; }
          leaf mark { type empty; }
        }
        "#,
    );
    assert!(ctx
        .parse_data(r#"<on xmlns="urn:be">true</on>"#, 0)
        .is_ok());
    assert_eq!(
        ctx.parse_data(r#"<on xmlns="urn:be">yes</on>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Inval)
    );
    assert!(ctx.parse_data(r#"<mark xmlns="urn:be"/>"#, 0).is_ok());
    assert_eq!(
        ctx.parse_data(r#"<mark xmlns="urn:be">x</mark>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Inval)
    );
}

#[test]
fn test_pattern_matches_whole_value() {
    let ctx = ctx_with(
        r#"
        module pat {
          namespace "urn:pat"; prefix p;
          leaf code { type string { pattern "[a-z]{3}"; } }
        }
        "#,
    );
    assert!(ctx
        .parse_data(r#"<code xmlns="urn:pat">abc</code>"#, 0)
        .is_ok());
    // a prefix match is not enough
    assert_eq!(
        ctx.parse_data(r#"<code xmlns="urn:pat">abcd</code>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Inval)
    );
}

#[test]
fn test_string_length_boundaries() {
    let ctx = ctx_with(
        r#"
        module sl {
          namespace "urn:sl"; prefix s;
          leaf name { type string { length "0..4"; } }
        }
        "#,
    );
    assert!(ctx.parse_data(r#"<name xmlns="urn:sl"/>"#, 0).is_ok());
    assert!(ctx
        .parse_data(r#"<name xmlns="urn:sl">abcd</name>"#, 0)
        .is_ok());
    assert_eq!(
        ctx.parse_data(r#"<name xmlns="urn:sl">abcde</name>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Oorval)
    );
}

#[test]
fn test_decimal64_scaling() {
    let ctx = ctx_with(
        r#"
        module dec {
          namespace "urn:dec"; prefix d;
          leaf ratio { type decimal64 { fraction-digits 2; range "0.0..99.99"; } }
        }
        "#,
    );
    let tree = ctx
        .parse_data(r#"<ratio xmlns="urn:dec">3.14</ratio>"#, 0)
        .unwrap();
    let root = tree.root().unwrap();
    match tree.node(root).value() {
        Some(Value::Dec64(d)) => assert_eq!(d.to_string(), "3.14"),
        other => panic!("expected a decimal value, got {:?}", other),
    }
    // too many fraction digits
    assert_eq!(
        ctx.parse_data(r#"<ratio xmlns="urn:dec">3.141</ratio>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Oorval)
    );
    assert_eq!(
        ctx.parse_data(r#"<ratio xmlns="urn:dec">100.00</ratio>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Oorval)
    );
}

#[test]
fn test_union_order_is_significant() {
    let ctx = ctx_with(
        r#"
        module u {
          namespace "urn:u"; prefix u;
          leaf either { type union { type int8; type string; } }
        }
        "#,
    );
    let tree = ctx
        .parse_data(r#"<either xmlns="urn:u">42</either>"#, 0)
        .unwrap();
    let root = tree.root().unwrap();
    // both alternatives accept "42", the first listed wins
    assert_eq!(tree.node(root).value(), Some(&Value::Int(42)));

    let tree = ctx
        .parse_data(r#"<either xmlns="urn:u">forty-two</either>"#, 0)
        .unwrap();
    let root = tree.root().unwrap();
    assert!(matches!(tree.node(root).value(), Some(Value::Str(_))));
}

#[test]
fn test_bits_decoding() {
    let ctx = ctx_with(
        r#"
        module bt {
          namespace "urn:bt"; prefix b;
          leaf flags { type bits { bit alpha; bit beta; bit gamma; } }
        }
        "#,
    );
    let tree = ctx
        .parse_data(r#"<flags xmlns="urn:bt">gamma alpha</flags>"#, 0)
        .unwrap();
    let root = tree.root().unwrap();
    match tree.node(root).value() {
        Some(Value::Bits(names)) => {
            let names: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
            // result ordered by bit position
            assert_eq!(names, vec!["alpha", "gamma"]);
        }
        other => panic!("expected bits, got {:?}", other),
    }
    assert_eq!(
        ctx.parse_data(r#"<flags xmlns="urn:bt">alpha alpha</flags>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Inval)
    );
    assert_eq!(
        ctx.parse_data(r#"<flags xmlns="urn:bt">delta</flags>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Inval)
    );
}

#[test]
fn test_identityref_closure() {
    let ctx = ctx_with(
        r#"
        module alg {
          namespace "urn:alg"; prefix a;
          identity algorithm;
          identity aes { base algorithm; }
          identity aes-256 { base aes; }
          identity unrelated;
          leaf used { type identityref { base algorithm; } }
        }
        "#,
    );
    let xml = |v: &str| format!(r#"<used xmlns="urn:alg" xmlns:a="urn:alg">{}</used>"#, v);
    // transitive descendant
    assert!(ctx.parse_data(&xml("a:aes-256"), 0).is_ok());
    // the declared base itself is accepted
    assert!(ctx.parse_data(&xml("a:algorithm"), 0).is_ok());
    // unprefixed values resolve against the leaf's module
    assert!(ctx.parse_data(&xml("aes"), 0).is_ok());
    assert_eq!(
        ctx.parse_data(&xml("a:unrelated"), 0).unwrap_err().kind(),
        Some(ErrorKind::Inval)
    );
}

const LIST_MOD: &str = r#"
    module srv {
      namespace "urn:srv"; prefix s;
      container servers {
        list server {
          key "name port";
          leaf name { type string; }
          leaf port { type uint16; }
          leaf owner { type string; }
          unique "owner";
        }
      }
    }
"#;

#[test]
fn test_duplicate_list_instance() {
    let ctx = ctx_with(LIST_MOD);
    let ok = r#"<servers xmlns="urn:srv">
        <server><name>a</name><port>80</port></server>
        <server><name>a</name><port>443</port></server>
    </servers>"#;
    assert!(ctx.parse_data(ok, 0).is_ok());

    let dup = r#"<servers xmlns="urn:srv">
        <server><name>a</name><port>80</port></server>
        <server><name>a</name><port>80</port></server>
    </servers>"#;
    assert_eq!(
        ctx.parse_data(dup, 0).unwrap_err().kind(),
        Some(ErrorKind::DupList)
    );
}

#[test]
fn test_unique_constraint() {
    let ctx = ctx_with(LIST_MOD);
    let breaches = r#"<servers xmlns="urn:srv">
        <server><name>a</name><port>80</port><owner>ops</owner></server>
        <server><name>b</name><port>81</port><owner>ops</owner></server>
    </servers>"#;
    assert_eq!(
        ctx.parse_data(breaches, 0).unwrap_err().kind(),
        Some(ErrorKind::DupList)
    );
}

#[test]
fn test_missing_key_rejected() {
    let ctx = ctx_with(LIST_MOD);
    let missing = r#"<servers xmlns="urn:srv">
        <server><name>a</name></server>
    </servers>"#;
    assert_eq!(
        ctx.parse_data(missing, 0).unwrap_err().kind(),
        Some(ErrorKind::Misselem)
    );
}

#[test]
fn test_duplicate_leaflist_value() {
    let ctx = ctx_with(
        r#"
        module ll {
          namespace "urn:ll"; prefix l;
          container c { leaf-list tag { type string; } }
        }
        "#,
    );
    let dup = r#"<c xmlns="urn:ll"><tag>x</tag><tag>y</tag><tag>x</tag></c>"#;
    assert_eq!(
        ctx.parse_data(dup, 0).unwrap_err().kind(),
        Some(ErrorKind::DupLeaflist)
    );
}

#[test]
fn test_choice_exclusivity() {
    let ctx = ctx_with(
        r#"
        module ch {
          namespace "urn:ch"; prefix c;
          container top {
            choice transport {
              case tcp { leaf tcp-port { type uint16; } }
              case udp { leaf udp-port { type uint16; } }
            }
          }
        }
        "#,
    );
    let ok = r#"<top xmlns="urn:ch"><tcp-port>80</tcp-port></top>"#;
    assert!(ctx.parse_data(ok, 0).is_ok());

    let mixed = r#"<top xmlns="urn:ch"><tcp-port>80</tcp-port><udp-port>53</udp-port></top>"#;
    assert_eq!(
        ctx.parse_data(mixed, 0).unwrap_err().kind(),
        Some(ErrorKind::McaseData)
    );
}

#[test]
fn test_feature_gated_container() {
    let mut ctx = Context::new(Vec::<std::path::PathBuf>::new());
    let mid = ctx
        .parse_module(
            r#"
            module feat {
              namespace "urn:feat"; prefix f;
              feature extras;
              container extra-box { if-feature extras; presence "configured"; }
            }
            "#,
            SchemaFormat::Yang,
        )
        .unwrap();

    let xml = r#"<extra-box xmlns="urn:feat"/>"#;
    assert_eq!(
        ctx.parse_data(xml, 0).unwrap_err().kind(),
        Some(ErrorKind::Inelem)
    );

    ctx.feature_enable(mid, "extras").unwrap();
    assert!(ctx.parse_data(xml, 0).is_ok());

    // feature monotonicity: disabling makes it invalid again
    ctx.feature_disable(mid, "extras").unwrap();
    assert_eq!(
        ctx.parse_data(xml, 0).unwrap_err().kind(),
        Some(ErrorKind::Inelem)
    );
}

#[test]
fn test_unknown_element_handling() {
    let ctx = ctx_with(
        r#"
        module known {
          namespace "urn:known"; prefix k;
          container c { leaf x { type string; } }
        }
        "#,
    );
    // unknown element in a foreign namespace is ignored by default
    let foreign = r#"<c xmlns="urn:known"><y xmlns="urn:elsewhere">1</y><x>v</x></c>"#;
    assert!(ctx.parse_data(foreign, 0).is_ok());

    // strict mode rejects it
    assert_eq!(
        ctx.parse_data(foreign, options::STRICT).unwrap_err().kind(),
        Some(ErrorKind::Inelem)
    );

    // unknown element in a known namespace always fails
    let known_ns = r#"<c xmlns="urn:known"><nope>1</nope></c>"#;
    assert_eq!(
        ctx.parse_data(known_ns, 0).unwrap_err().kind(),
        Some(ErrorKind::Inelem)
    );
}

#[test]
fn test_edit_config_rejects_state_data() {
    let ctx = ctx_with(
        r#"
        module st {
          namespace "urn:st"; prefix s;
          container c {
            leaf conf { type string; }
            leaf oper { type string; config false; }
          }
        }
        "#,
    );
    let xml = r#"<c xmlns="urn:st"><oper>x</oper></c>"#;
    assert!(ctx.parse_data(xml, 0).is_ok());
    assert_eq!(
        ctx.parse_data(xml, options::EDIT).unwrap_err().kind(),
        Some(ErrorKind::Inelem)
    );
}

const ORDERED: &str = r#"
    module ord {
      namespace "urn:ord"; prefix o;
      container c { leaf-list entry { type string; ordered-by user; } }
    }
"#;

#[test]
fn test_user_ordered_insert() {
    let ctx = ctx_with(ORDERED);
    let xml = r#"<c xmlns="urn:ord" xmlns:yang="urn:ietf:params:xml:ns:yang:1">
        <entry>x</entry>
        <entry>y</entry>
        <entry>z</entry>
        <entry yang:insert="after" yang:value="y">w</entry>
    </c>"#;
    let tree = ctx.parse_data(xml, options::EDIT).unwrap();
    let c = tree.root().unwrap();
    let values: Vec<String> = tree
        .children(c)
        .map(|n| tree.node(n).value_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["x", "y", "w", "z"]);
}

#[test]
fn test_insert_before_requires_value() {
    let ctx = ctx_with(ORDERED);
    let xml = r#"<c xmlns="urn:ord" xmlns:yang="urn:ietf:params:xml:ns:yang:1">
        <entry>x</entry>
        <entry yang:insert="before">w</entry>
    </c>"#;
    assert_eq!(
        ctx.parse_data(xml, options::EDIT).unwrap_err().kind(),
        Some(ErrorKind::Missattr)
    );
}

#[test]
fn test_insert_first_and_bad_argument() {
    let ctx = ctx_with(ORDERED);
    let first = r#"<c xmlns="urn:ord" xmlns:yang="urn:ietf:params:xml:ns:yang:1">
        <entry>x</entry>
        <entry yang:insert="first">w</entry>
    </c>"#;
    let tree = ctx.parse_data(first, options::EDIT).unwrap();
    let c = tree.root().unwrap();
    let values: Vec<String> = tree
        .children(c)
        .map(|n| tree.node(n).value_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["w", "x"]);

    let bad = r#"<c xmlns="urn:ord" xmlns:yang="urn:ietf:params:xml:ns:yang:1">
        <entry yang:insert="middle">w</entry>
    </c>"#;
    assert_eq!(
        ctx.parse_data(bad, options::EDIT).unwrap_err().kind(),
        Some(ErrorKind::Inarg)
    );
}

#[test]
fn test_insert_on_unordered_node_rejected() {
    let ctx = ctx_with(
        r#"
        module uo {
          namespace "urn:uo"; prefix u;
          container c { leaf-list entry { type string; } }
        }
        "#,
    );
    let xml = r#"<c xmlns="urn:uo" xmlns:yang="urn:ietf:params:xml:ns:yang:1">
        <entry yang:insert="first">w</entry>
    </c>"#;
    assert_eq!(
        ctx.parse_data(xml, options::EDIT).unwrap_err().kind(),
        Some(ErrorKind::Inattr)
    );
}

#[test]
fn test_mandatory_enforcement() {
    let ctx = ctx_with(
        r#"
        module md {
          namespace "urn:md"; prefix m;
          container c {
            leaf must-have { type string; mandatory true; }
            leaf optional { type string; }
          }
        }
        "#,
    );
    assert_eq!(
        ctx.parse_data(r#"<c xmlns="urn:md"><optional>v</optional></c>"#, 0)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::Misselem)
    );
    assert!(ctx
        .parse_data(r#"<c xmlns="urn:md"><must-have>v</must-have></c>"#, 0)
        .is_ok());
    // edit-config input may be partial
    assert!(ctx
        .parse_data(
            r#"<c xmlns="urn:md"><optional>v</optional></c>"#,
            options::EDIT
        )
        .is_ok());
}

#[test]
fn test_min_max_elements() {
    let ctx = ctx_with(
        r#"
        module mm {
          namespace "urn:mm"; prefix m;
          container c {
            leaf-list addr { type string; min-elements 2; max-elements 3; }
          }
        }
        "#,
    );
    let xml = |n: usize| {
        let entries: String = (0..n).map(|i| format!("<addr>a{}</addr>", i)).collect();
        format!(r#"<c xmlns="urn:mm">{}</c>"#, entries)
    };
    assert_eq!(
        ctx.parse_data(&xml(1), 0).unwrap_err().kind(),
        Some(ErrorKind::Spec)
    );
    assert!(ctx.parse_data(&xml(2), 0).is_ok());
    assert!(ctx.parse_data(&xml(3), 0).is_ok());
    assert_eq!(
        ctx.parse_data(&xml(4), 0).unwrap_err().kind(),
        Some(ErrorKind::Spec)
    );
}

const LEAFREF_MOD: &str = r#"
    module lref {
      namespace "urn:lref"; prefix l;
      container net {
        list iface {
          key "name";
          leaf name { type string; }
        }
        leaf primary { type leafref { path "../iface/name"; } }
      }
    }
"#;

#[test]
fn test_leafref_data_resolution() {
    let ctx = ctx_with(LEAFREF_MOD);
    let ok = r#"<net xmlns="urn:lref">
        <iface><name>eth0</name></iface>
        <iface><name>eth1</name></iface>
        <primary>eth1</primary>
    </net>"#;
    assert!(ctx.parse_data(ok, 0).is_ok());

    let dangling = r#"<net xmlns="urn:lref">
        <iface><name>eth0</name></iface>
        <primary>eth9</primary>
    </net>"#;
    assert_eq!(
        ctx.parse_data(dangling, 0).unwrap_err().kind(),
        Some(ErrorKind::LeafrefTarget)
    );

    // edit-config input leaves the reference unresolved
    assert!(ctx.parse_data(dangling, options::EDIT).is_ok());
}

#[test]
fn test_instance_identifier_resolution() {
    let ctx = ctx_with(
        r#"
        module inst {
          namespace "urn:inst"; prefix i;
          container all {
            list item { key "id"; leaf id { type string; } }
            leaf chosen { type instance-identifier; }
          }
        }
        "#,
    );
    let ok = r#"<all xmlns="urn:inst" xmlns:i="urn:inst">
        <item><id>a</id></item>
        <chosen>/i:all/i:item[i:id='a']</chosen>
    </all>"#;
    assert!(ctx.parse_data(ok, 0).is_ok());

    let missing = r#"<all xmlns="urn:inst" xmlns:i="urn:inst">
        <item><id>a</id></item>
        <chosen>/i:all/i:item[i:id='zzz']</chosen>
    </all>"#;
    assert_eq!(
        ctx.parse_data(missing, 0).unwrap_err().kind(),
        Some(ErrorKind::Inval)
    );
}

#[test]
fn test_filter_merges_duplicates() {
    let ctx = ctx_with(
        r#"
        module flt {
          namespace "urn:flt"; prefix f;
          container sys {
            leaf host { type string; }
            leaf-list dns { type string; }
          }
        }
        "#,
    );
    // equal leaf-list values dedupe inside one selection
    let dedupe = r#"<root xmlns="urn:flt">
        <sys><dns>a</dns><dns>a</dns></sys>
    </root>"#;
    let tree = ctx.parse_data(dedupe, options::FILTER).unwrap();
    let tops: Vec<_> = tree.siblings(tree.root()).collect();
    assert_eq!(tops.len(), 1);
    assert_eq!(tree.children(tops[0]).count(), 1);

    // a bare selection container absorbs a previous contained one
    let widen = r#"<root xmlns="urn:flt">
        <sys><dns>a</dns></sys>
        <sys/>
    </root>"#;
    let tree = ctx.parse_data(widen, options::FILTER).unwrap();
    let tops: Vec<_> = tree.siblings(tree.root()).collect();
    assert_eq!(tops.len(), 1);
    assert_eq!(tree.children(tops[0]).count(), 0);
}

#[test]
fn test_validate_is_idempotent() {
    let ctx = ctx_with(LIST_MOD);
    let xml = r#"<servers xmlns="urn:srv">
        <server><name>a</name><port>80</port><owner>ops</owner></server>
        <server><name>b</name><port>81</port><owner>dev</owner></server>
    </servers>"#;
    let tree = ctx.parse_data(xml, 0).unwrap();
    ctx.validate_data(&tree, 0).unwrap();
    ctx.validate_data(&tree, 0).unwrap();
}

#[test]
fn test_data_print_round_trip() {
    let ctx = ctx_with(LIST_MOD);
    let xml = r#"<servers xmlns="urn:srv">
        <server><name>a</name><port>80</port><owner>ops</owner></server>
        <server><name>b</name><port>81</port></server>
    </servers>"#;
    let tree = ctx.parse_data(xml, 0).unwrap();
    let printed = ctx.print_data(&tree);

    let tree2 = ctx.parse_data(&printed, 0).unwrap();
    assert_eq!(printed, ctx.print_data(&tree2));
}

#[test]
fn test_anyxml_subtree_capture() {
    let ctx = ctx_with(
        r#"
        module anyx {
          namespace "urn:anyx"; prefix a;
          container c { anyxml blob; }
        }
        "#,
    );
    let xml = r#"<c xmlns="urn:anyx"><blob><foreign><deep>text</deep></foreign></blob></c>"#;
    let tree = ctx.parse_data(xml, 0).unwrap();
    let c = tree.root().unwrap();
    let blob = tree.children(c).next().unwrap();
    match &tree.node(blob).kind {
        yangtree::data::DnodeKind::Anyxml { xml } => {
            assert_eq!(xml.children[0].name, "foreign");
            assert_eq!(xml.children[0].children[0].text.as_deref(), Some("text"));
        }
        _ => panic!("expected anyxml"),
    }
}

#[test]
fn test_augmented_data_parses() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.yang"),
        r#"module base {
          namespace "urn:base"; prefix b;
          container sys { leaf name { type string; } }
        }"#,
    )
    .unwrap();

    let mut ctx = Context::new([dir.path().to_path_buf()]);
    ctx.parse_module(
        r#"
        module add-on {
          namespace "urn:add-on"; prefix ao;
          import base { prefix b; }
          augment "/b:sys" { leaf serial { type string; } }
        }
        "#,
        SchemaFormat::Yang,
    )
    .unwrap();

    let xml = r#"<sys xmlns="urn:base">
        <name>core1</name>
        <serial xmlns="urn:add-on">XJ-42</serial>
    </sys>"#;
    let tree = ctx.parse_data(xml, 0).unwrap();
    let sys = tree.root().unwrap();
    assert_eq!(tree.children(sys).count(), 2);
}

#[test]
fn test_envelope_root_is_transparent() {
    let ctx = ctx_with(
        r#"
        module env {
          namespace "urn:env"; prefix e;
          leaf a { type string; }
          leaf b { type string; }
        }
        "#,
    );
    let xml = r#"<config xmlns="urn:whatever">
        <a xmlns="urn:env">1</a>
        <b xmlns="urn:env">2</b>
    </config>"#;
    let tree = ctx.parse_data(xml, 0).unwrap();
    assert_eq!(tree.siblings(tree.root()).count(), 2);
}
