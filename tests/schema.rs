use facet::Facet;
use facet_env::{FieldRole, FloatWidth, IntWidth, Schema, TypeKind};

#[derive(Facet)]
struct Everything {
    text: String,
    #[facet(env = "SMALL,-1")]
    small: i8,
    big: u128,
    size: usize,
    ratio: f32,
    on: bool,
    list: Vec<u16>,
    pair: [bool; 2],
    maybe: Option<f64>,
    #[facet(skip)]
    hidden: u32,
    nested: Nested,
}

#[derive(Facet)]
struct Nested {
    #[facet(env = "NESTED_NAME")]
    name: String,
}

#[test]
fn scalar_kinds() {
    let schema = Schema::of::<Everything>();
    let composite = schema.composite().unwrap();
    let kinds: Vec<_> = composite.fields().iter().map(|f| f.kind().clone()).collect();

    assert_eq!(kinds[0], TypeKind::Text);
    assert_eq!(
        kinds[1],
        TypeKind::SignedInt {
            width: IntWidth::W8
        }
    );
    assert_eq!(
        kinds[2],
        TypeKind::UnsignedInt {
            width: IntWidth::W128
        }
    );
    assert_eq!(
        kinds[3],
        TypeKind::UnsignedInt {
            width: IntWidth::Size
        }
    );
    assert_eq!(
        kinds[4],
        TypeKind::Float {
            width: FloatWidth::W32
        }
    );
    assert_eq!(kinds[5], TypeKind::Bool);
}

#[test]
fn container_kinds_display_like_rust_types() {
    let schema = Schema::of::<Everything>();
    let composite = schema.composite().unwrap();
    let names: Vec<_> = composite
        .fields()
        .iter()
        .filter(|f| f.role() == FieldRole::Leaf)
        .map(|f| (f.name(), f.kind().type_name()))
        .collect();

    assert!(names.contains(&("list", "Vec<u16>".to_string())));
    assert!(names.contains(&("pair", "[bool; 2]".to_string())));
    assert!(names.contains(&("maybe", "Option<f64>".to_string())));
}

#[test]
fn roles_and_annotations() {
    let schema = Schema::of::<Everything>();
    let composite = schema.composite().unwrap();
    let fields = composite.fields();

    let small = &fields[1];
    assert_eq!(small.index(), 1);
    assert_eq!(small.source_name(), "SMALL");
    assert_eq!(small.annotation().default_literal(), "-1");

    let big = &fields[2];
    assert_eq!(big.source_name(), "BIG");
    assert_eq!(big.annotation().default_literal(), "");

    let hidden = fields.iter().find(|f| f.name() == "hidden").unwrap();
    assert_eq!(hidden.role(), FieldRole::Skipped);

    let nested = fields.iter().find(|f| f.name() == "nested").unwrap();
    assert_eq!(nested.role(), FieldRole::Leaf);
    assert!(nested.kind().is_composite_like());
    match nested.kind() {
        TypeKind::Composite(inner) => {
            assert_eq!(inner.fields().len(), 1);
            assert_eq!(inner.fields()[0].source_name(), "NESTED_NAME");
        }
        other => panic!("expected Composite, got {other:?}"),
    }
}

#[test]
fn skipped_fields_are_not_leaves() {
    let schema = Schema::of::<Everything>();
    let leaves = schema.composite().unwrap().leaves();
    assert!(leaves.iter().all(|f| f.name() != "hidden"));
    assert_eq!(leaves.len(), 10);
}

#[test]
fn scalar_root_has_no_composite() {
    let schema = Schema::of::<u32>();
    assert!(schema.composite().is_none());
    assert_eq!(
        *schema.root(),
        TypeKind::UnsignedInt {
            width: IntWidth::W32
        }
    );
}

#[test]
fn schema_can_be_reused() {
    #[derive(Facet, Debug, PartialEq)]
    struct Config {
        #[facet(env = "N,1")]
        n: u8,
    }

    let schema = Schema::of::<Config>();
    let first: Config = facet_env::Mapper::new(facet_env::MockEnv::new())
        .materialize_with(&schema)
        .unwrap();
    let env = facet_env::MockEnv::from_pairs([("N", "2")]);
    let second: Config = facet_env::Mapper::new(&env)
        .materialize_with(&schema)
        .unwrap();

    assert_eq!(first.n, 1);
    assert_eq!(second.n, 2);
}
