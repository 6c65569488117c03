// End-to-end evaluation against the in-memory provider: live variables,
// pointers, vectors with swizzle views, dynamic classes, macros.

use dialekt_core::expr::{parse_expression, EvalError, EvalMode, Evaluator};
use dialekt_core::provider::{Provider, Symbol, SymbolKind};
use dialekt_core::types::Field;
use dialekt_core::{DialectKind, StaticProvider, Type, Value};

const BASE: u64 = 0x1000;

/// A provider with a small live image:
///   x     int        @ 0x1000 = 42
///   arr   int[4]     @ 0x1010 = {10, 20, 30, 40}
///   pt    Point      @ 0x1030 = {x: 3, y: 4}
///   pp    Point *    @ 0x1050 -> pt
///   v     int4       @ 0x1060 = {0, 1, 2, 3}
///   w     int3       @ 0x1080 = {0, 1, 2}
fn provider() -> StaticProvider {
    let mut p = StaticProvider::new(BASE, 0x200);

    p.define_variable("x", Type::int(), 0x1000);
    p.poke(0x1000, &42i32.to_le_bytes());

    let arr_ty = Type::array(Type::int(), Some(4));
    p.define_variable("arr", arr_ty, 0x1010);
    for (i, n) in [10i32, 20, 30, 40].iter().enumerate() {
        p.poke(0x1010 + 4 * i as u64, &n.to_le_bytes());
    }

    let point = Type::Struct {
        name: "Point".into(),
        fields: vec![
            Field {
                name: "x".into(),
                ty: Type::int(),
                offset: 0,
            },
            Field {
                name: "y".into(),
                ty: Type::int(),
                offset: 4,
            },
        ],
        superclass: None,
        size: 8,
    };
    p.define_type("Point", point.clone());
    p.define_variable("pt", point.clone(), 0x1030);
    p.poke(0x1030, &3i32.to_le_bytes());
    p.poke(0x1034, &4i32.to_le_bytes());

    p.define_variable("pp", Type::pointer(point), 0x1050);
    p.poke(0x1050, &0x1030u64.to_le_bytes());

    let int4 = Type::vector(Type::int(), 4);
    p.define_type("int4", int4.clone());
    p.define_variable("v", int4, 0x1060);
    for (i, n) in [0i32, 1, 2, 3].iter().enumerate() {
        p.poke(0x1060 + 4 * i as u64, &n.to_le_bytes());
    }

    let int3 = Type::vector(Type::int(), 3);
    p.define_type("int3", int3.clone());
    p.define_variable("w", int3, 0x1080);
    for (i, n) in [0i32, 1, 2].iter().enumerate() {
        p.poke(0x1080 + 4 * i as u64, &n.to_le_bytes());
    }

    p
}

fn eval(p: &StaticProvider, dialect: DialectKind, src: &str) -> Result<Value, EvalError> {
    parse_expression(src, dialect, p, None)
        .unwrap_or_else(|e| panic!("parse of {:?} failed: {}", src, e))
        .evaluate(p)
}

fn eval_c(p: &StaticProvider, src: &str) -> Value {
    eval(p, DialectKind::C, src).unwrap_or_else(|e| panic!("eval of {:?} failed: {}", src, e))
}

fn eval_cl(p: &StaticProvider, src: &str) -> Value {
    eval(p, DialectKind::OpenCl, src)
        .unwrap_or_else(|e| panic!("eval of {:?} failed: {}", src, e))
}

fn lane_ints(v: &Value) -> Vec<i128> {
    v.lanes()
        .expect("expected a vector value")
        .iter()
        .map(|s| s.as_int().unwrap())
        .collect()
}

#[test]
fn variables_fields_and_pointers() {
    let p = provider();
    assert_eq!(eval_c(&p, "x").as_int(), Some(42));
    assert_eq!(eval_c(&p, "x + 1").as_int(), Some(43));
    assert_eq!(eval_c(&p, "arr[2]").as_int(), Some(30));
    assert_eq!(eval_c(&p, "*arr").as_int(), Some(10));
    assert_eq!(eval_c(&p, "pt.y").as_int(), Some(4));
    assert_eq!(eval_c(&p, "pp->x").as_int(), Some(3));
    assert_eq!(eval_c(&p, "(*pp).y").as_int(), Some(4));
    assert_eq!(eval_c(&p, "&x").as_int(), Some(0x1000));
    assert_eq!(eval_c(&p, "*&x").as_int(), Some(42));
    assert_eq!(eval_c(&p, "arr[1] + pp->y").as_int(), Some(24));
}

#[test]
fn pointer_arithmetic_scales() {
    let p = provider();
    assert_eq!(eval_c(&p, "*(arr + 3)").as_int(), Some(40));
    assert_eq!(eval_c(&p, "&arr[3] - &arr[1]").as_int(), Some(2));
}

#[test]
fn memval_reinterprets_memory() {
    let p = provider();
    assert_eq!(eval_c(&p, "{int} 0x1000").as_int(), Some(42));
    assert_eq!(eval_c(&p, "{int} (0x1010 + 4)").as_int(), Some(20));
}

#[test]
fn assignment_writes_through() {
    let p = provider();
    assert_eq!(eval_c(&p, "x = 5").as_int(), Some(5));
    assert_eq!(eval_c(&p, "x").as_int(), Some(5));
    assert_eq!(eval_c(&p, "x += 10").as_int(), Some(15));
    assert_eq!(eval_c(&p, "x").as_int(), Some(15));
    assert_eq!(eval_c(&p, "arr[0] = arr[1]").as_int(), Some(20));
    assert_eq!(eval_c(&p, "arr[0]").as_int(), Some(20));
    assert_eq!(eval_c(&p, "++x").as_int(), Some(16));
    assert_eq!(eval_c(&p, "x++").as_int(), Some(16));
    assert_eq!(eval_c(&p, "x").as_int(), Some(17));
}

#[test]
fn side_effect_free_mode_types_without_writing() {
    let p = provider();
    let tree = parse_expression("x = 99", DialectKind::C, &p, None).unwrap();
    let v = tree.evaluate_type(&p).unwrap();
    assert_eq!(v.ty().display_name(), "int");
    // the store never happened
    assert_eq!(eval_c(&p, "x").as_int(), Some(42));
}

#[test]
fn short_circuit_does_not_touch_the_skipped_side() {
    let p = provider();
    // the right side would fault if evaluated
    assert_eq!(eval_c(&p, "x == 0 && *(int *) 0").as_int(), Some(0));
    assert_eq!(eval_c(&p, "x != 0 || *(int *) 0").as_int(), Some(1));
    // and it is evaluated when selected
    assert!(matches!(
        eval(&p, DialectKind::C, "x != 0 && *(int *) 0"),
        Err(EvalError::MemoryAccess { .. })
    ));
    // side effects in the skipped ternary arm do not fire
    assert_eq!(eval_c(&p, "0 ? x = 7 : x").as_int(), Some(42));
    assert_eq!(eval_c(&p, "x").as_int(), Some(42));
}

#[test]
fn sizeof_of_expressions_and_types() {
    let p = provider();
    assert_eq!(eval_c(&p, "sizeof(int)").as_int(), Some(4));
    assert_eq!(eval_c(&p, "sizeof(Point)").as_int(), Some(8));
    assert_eq!(eval_c(&p, "sizeof(pt)").as_int(), Some(8));
    assert_eq!(eval_c(&p, "sizeof(arr)").as_int(), Some(16));
    assert_eq!(eval_c(&p, "sizeof x").as_int(), Some(4));
    assert_eq!(eval_c(&p, "alignof(Point)").as_int(), Some(4));
    // vec3 occupies the storage of vec4
    assert_eq!(eval_c(&p, "sizeof(int3)").as_int(), Some(16));
}

#[test]
fn scope_access_resolves_through_the_provider() {
    let mut p = provider();
    p.define_variable("Point::origin_distance", Type::int(), 0x10f0);
    p.poke(0x10f0, &99i32.to_le_bytes());
    assert_eq!(eval_c(&p, "Point::origin_distance").as_int(), Some(99));
    assert!(matches!(
        eval(&p, DialectKind::C, "Point::missing"),
        Err(EvalError::UnknownSymbol { .. })
    ));
}

#[test]
fn macros_splice_into_the_token_stream() {
    let mut p = provider();
    p.define_macro("ANSWER", "x");
    p.define_macro("DOUBLE", "(x + x)");
    assert_eq!(eval_c(&p, "ANSWER").as_int(), Some(42));
    assert_eq!(eval_c(&p, "DOUBLE * 2").as_int(), Some(168));
}

#[test]
fn input_radix_controls_unprefixed_literals() {
    let p = provider();
    p.set_radix(16);
    assert_eq!(eval_c(&p, "10").as_int(), Some(16));
    assert_eq!(eval_c(&p, "0t10").as_int(), Some(10));
    p.set_radix(10);
    assert_eq!(eval_c(&p, "10").as_int(), Some(10));
}

// ---- vector dialect ------------------------------------------------

#[test]
fn vector_swizzle_laws() {
    let p = provider();
    // v.xyzw == v
    assert_eq!(lane_ints(&eval_cl(&p, "v.xyzw")), vec![0, 1, 2, 3]);
    // lo ++ hi == v
    let lo = lane_ints(&eval_cl(&p, "v.lo"));
    let hi = lane_ints(&eval_cl(&p, "v.hi"));
    let glued: Vec<i128> = lo.into_iter().chain(hi).collect();
    assert_eq!(glued, vec![0, 1, 2, 3]);
    assert_eq!(lane_ints(&eval_cl(&p, "v.even")), vec![0, 2]);
    assert_eq!(lane_ints(&eval_cl(&p, "v.odd")), vec![1, 3]);
    assert_eq!(eval_cl(&p, "v.w").as_int(), Some(3));
    assert_eq!(lane_ints(&eval_cl(&p, "v.s31")), vec![3, 1]);
}

#[test]
fn width3_odd_selects_only_real_lanes() {
    let p = provider();
    // w = {0, 1, 2}: "odd" is lane 1 only
    assert_eq!(eval_cl(&p, "w.odd").as_int(), Some(1));
    assert_eq!(lane_ints(&eval_cl(&p, "w.lo")), vec![0, 1]);
    assert_eq!(eval_cl(&p, "w.hi").as_int(), Some(2));
}

#[test]
fn swizzle_views_write_through_and_reread() {
    let p = provider();
    // write through a two-lane view
    assert_eq!(lane_ints(&eval_cl(&p, "v.xy = v.zw")), vec![2, 3]);
    assert_eq!(lane_ints(&eval_cl(&p, "v")), vec![2, 3, 2, 3]);
    // single-lane view
    assert_eq!(eval_cl(&p, "v.x = 9").as_int(), Some(9));
    assert_eq!(lane_ints(&eval_cl(&p, "v")), vec![9, 3, 2, 3]);
    // the untouched lanes really were untouched
    assert_eq!(lane_ints(&eval_cl(&p, "v.zw")), vec![2, 3]);
    // duplicate-lane swizzles are not assignable
    assert!(matches!(
        eval(&p, DialectKind::OpenCl, "v.xx = v.yy"),
        Err(EvalError::NotAnLvalue)
    ));
}

#[test]
fn vector_operators_are_elementwise() {
    let p = provider();
    assert_eq!(lane_ints(&eval_cl(&p, "v + v")), vec![0, 2, 4, 6]);
    // scalar operands widen by replication
    assert_eq!(lane_ints(&eval_cl(&p, "v + 10")), vec![10, 11, 12, 13]);
    assert_eq!(lane_ints(&eval_cl(&p, "10 * v")), vec![0, 10, 20, 30]);
    // comparisons produce -1/0 lanes
    assert_eq!(lane_ints(&eval_cl(&p, "v == v")), vec![-1, -1, -1, -1]);
    assert_eq!(lane_ints(&eval_cl(&p, "v > 1")), vec![0, 0, -1, -1]);
    // logical not is elementwise with vector polarity
    assert_eq!(lane_ints(&eval_cl(&p, "!v")), vec![-1, 0, 0, 0]);
    // both operands of && are evaluated; no short-circuit in this dialect
    assert_eq!(lane_ints(&eval_cl(&p, "v && v")), vec![0, -1, -1, -1]);
}

#[test]
fn vector_casts_replicate_scalars_but_never_structs() {
    let p = provider();
    assert_eq!(lane_ints(&eval_cl(&p, "(int4) 7")), vec![7, 7, 7, 7]);
    assert!(matches!(
        eval(&p, DialectKind::OpenCl, "(int4) pt"),
        Err(EvalError::InvalidCast { .. })
    ));
}

#[test]
fn scalar_code_still_works_in_the_vector_dialect() {
    let p = provider();
    assert_eq!(eval_cl(&p, "x / 2").as_int(), Some(21));
    assert_eq!(eval_cl(&p, "pt.x").as_int(), Some(3));
}

// ---- Go dialect ----------------------------------------------------

#[test]
fn go_comparisons_are_boolean_and_conditions_are_strict() {
    let p = provider();
    let v = eval(&p, DialectKind::Go, "1 < 2").unwrap();
    assert_eq!(v.ty().display_name(), "bool");
    // non-bool condition is a type error, not a truthiness test
    assert!(matches!(
        eval(&p, DialectKind::Go, "1 && 2"),
        Err(EvalError::TypeMismatch { .. })
    ));
    assert_eq!(
        eval(&p, DialectKind::Go, "true && 1 < 2").unwrap().as_int(),
        Some(1)
    );
}

#[test]
fn go_package_qualified_names_resolve() {
    let mut p = provider();
    p.define_symbol(Symbol {
        name: "metrics".into(),
        kind: SymbolKind::Scope,
    });
    p.define_variable("metrics.hits", Type::Int {
        name: "int".into(),
        bits: 64,
        signed: true,
    }, 0x10c0);
    p.poke(0x10c0, &1234i64.to_le_bytes());
    assert_eq!(
        eval(&p, DialectKind::Go, "metrics.hits + 1").unwrap().as_int(),
        Some(1235)
    );
}

#[test]
fn go_conversions_and_strings() {
    let mut p = provider();
    p.define_type("int64", Type::Int {
        name: "int64".into(),
        bits: 64,
        signed: true,
    });
    let v = eval(&p, DialectKind::Go, "int64(3)").unwrap();
    assert_eq!(v.as_int(), Some(3));
    assert_eq!(v.ty().size_of(), 8);
    let v = eval(&p, DialectKind::Go, "\"ab\" + \"cd\"").unwrap();
    assert_eq!(format!("{}", v), "\"abcd\"");
}

// ---- object-message dialect ----------------------------------------

/// Sprite extends Shape; a live Sprite object sits at 0x3000 with its
/// class descriptor chain in the image.
fn object_provider() -> StaticProvider {
    let mut p = StaticProvider::new(0x2000, 0x2000);

    let shape = Type::Struct {
        name: "Shape".into(),
        fields: vec![Field {
            name: "id".into(),
            ty: Type::int(),
            offset: 8,
        }],
        superclass: None,
        size: 16,
    };
    let sprite = Type::Struct {
        name: "Sprite".into(),
        fields: vec![
            Field {
                name: "frame".into(),
                ty: Type::int(),
                offset: 12,
            },
            Field {
                name: "describe".into(),
                ty: Type::Function {
                    ret: Box::new(Type::double()),
                    params: vec![],
                    varargs: false,
                },
                offset: 0,
            },
        ],
        superclass: Some("Shape".into()),
        size: 16,
    };
    p.define_type("Shape", shape.clone());
    p.define_type("Sprite", sprite);

    // class descriptors: Sprite @ 0x2100 -> name 0x2140, super 0x2180
    //                    Shape  @ 0x2180 -> name 0x21c0, super 0
    p.poke(0x2100, &0x2140u64.to_le_bytes());
    p.poke(0x2108, &0x2180u64.to_le_bytes());
    p.poke(0x2140, b"Sprite\0");
    p.poke(0x2180, &0x21c0u64.to_le_bytes());
    p.poke(0x2188, &0u64.to_le_bytes());
    p.poke(0x21c0, b"Shape\0");

    // the live object: descriptor word, id, frame
    p.poke(0x3000, &0x2100u64.to_le_bytes());
    p.poke(0x3008, &17i32.to_le_bytes());
    p.poke(0x300c, &5i32.to_le_bytes());

    // a base-typed and a derived-typed reference to the same object
    p.define_variable("obj", Type::pointer(shape), 0x2300);
    p.poke(0x2300, &0x3000u64.to_le_bytes());
    let sprite_ty = p.lookup_type("Sprite", None).unwrap();
    p.define_variable("spr", Type::pointer(sprite_ty), 0x2308);
    p.poke(0x2308, &0x3000u64.to_le_bytes());
    p
}

#[test]
fn dynamic_class_resolution_sees_the_derived_type() {
    let p = object_provider();
    // `frame` exists only on the dynamic type Sprite
    assert_eq!(
        eval(&p, DialectKind::Java, "obj.frame").unwrap().as_int(),
        Some(5)
    );
    // fields of the superclass chain still resolve
    assert_eq!(
        eval(&p, DialectKind::Java, "obj.id").unwrap().as_int(),
        Some(17)
    );
}

#[test]
fn message_sends_type_but_do_not_call() {
    let p = object_provider();
    let tree = parse_expression("[spr describe]", DialectKind::Java, &p, None).unwrap();
    // typing pass: result has the method's return type
    let v = tree.evaluate_type(&p).unwrap();
    assert_eq!(v.ty().display_name(), "double");
    // a normal evaluation refuses to call into the target
    assert!(matches!(
        tree.evaluate(&p),
        Err(EvalError::NotSupported { .. })
    ));
    // unknown selectors are reported against the receiver
    let tree = parse_expression("[obj vanish]", DialectKind::Java, &p, None).unwrap();
    assert!(matches!(
        tree.evaluate_type(&p),
        Err(EvalError::NoSuchField { .. })
    ));
}

#[test]
fn field_of_this_goes_through_the_receiver() {
    let mut p = provider();
    let point = p.lookup_type("Point", None).unwrap();
    p.define_variable("this", Type::pointer(point), 0x10d0);
    p.poke(0x10d0, &0x1030u64.to_le_bytes());
    p.define_field_of_this("y");
    // a bare `y` resolves as this->y
    assert_eq!(eval_c(&p, "y").as_int(), Some(4));
}

#[test]
fn evaluation_modes_share_one_tree() {
    let p = provider();
    let tree = parse_expression("x + arr[1]", DialectKind::C, &p, None).unwrap();
    let normal = Evaluator::new(&p, DialectKind::C).evaluate(&tree.root).unwrap();
    let typed = Evaluator::new(&p, DialectKind::C)
        .with_mode(EvalMode::SideEffectFree)
        .evaluate(&tree.root)
        .unwrap();
    assert_eq!(normal.as_int(), Some(62));
    assert_eq!(typed.ty().display_name(), normal.ty().display_name());
}
