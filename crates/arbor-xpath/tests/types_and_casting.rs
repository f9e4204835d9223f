mod common;

use arbor_xpath::engine::casting::cast;
use arbor_xpath::xdm::types::concrete_atomic_types;
use arbor_xpath::xdm::{is_known_type, is_subtype_of};
use arbor_xpath::{AtomicValue, ErrorCode, ErrorKind};
use common::*;
use proptest::prelude::*;
use rstest::rstest;

const TYPES: &[&str] = &[
    "item()",
    "node()",
    "element()",
    "attribute()",
    "document()",
    "text()",
    "function(*)",
    "map(*)",
    "array(*)",
    "xs:anyAtomicType",
    "xs:untypedAtomic",
    "xs:string",
    "xs:normalizedString",
    "xs:token",
    "xs:NCName",
    "xs:ID",
    "xs:numeric",
    "xs:decimal",
    "xs:integer",
    "xs:long",
    "xs:int",
    "xs:short",
    "xs:byte",
    "xs:nonNegativeInteger",
    "xs:positiveInteger",
    "xs:unsignedByte",
    "xs:double",
    "xs:float",
    "xs:boolean",
    "xs:duration",
    "xs:dayTimeDuration",
    "xs:yearMonthDuration",
    "xs:dateTime",
    "xs:dateTimeStamp",
    "xs:date",
    "xs:QName",
    "xs:hexBinary",
];

proptest! {
    #[test]
    fn subtype_is_reflexive(i in 0..TYPES.len()) {
        prop_assert!(is_subtype_of(TYPES[i], TYPES[i]));
    }

    #[test]
    fn subtype_is_transitive(a in 0..TYPES.len(), b in 0..TYPES.len(), c in 0..TYPES.len()) {
        let (a, b, c) = (TYPES[a], TYPES[b], TYPES[c]);
        if is_subtype_of(a, b) && is_subtype_of(b, c) {
            prop_assert!(is_subtype_of(a, c), "{a} <: {b} <: {c}");
        }
    }

    #[test]
    fn integer_cast_is_idempotent(i in any::<i64>()) {
        let v = AtomicValue::integer(i);
        for target in ["xs:string", "xs:double", "xs:decimal", "xs:integer"] {
            let once = cast(&v, target).unwrap();
            let twice = cast(&once, target).unwrap();
            prop_assert_eq!(once.string_value(), twice.string_value());
            prop_assert_eq!(twice.type_name().as_str(), target);
        }
    }
}

#[test]
fn every_type_reaches_item() {
    for t in TYPES {
        assert!(is_known_type(t), "{t}");
        assert!(is_subtype_of(t, "item()"), "{t}");
    }
    assert!(!is_subtype_of("xs:integer", "xs:string"));
    assert!(!is_subtype_of("map(*)", "node()"));
    assert!(is_subtype_of("array(*)", "function(*)"));
}

#[test]
fn concrete_types_are_castable_from_their_own_type() {
    for t in concrete_atomic_types() {
        assert!(is_subtype_of(t, "xs:anyAtomicType"), "{t}");
    }
}

#[rstest]
#[case("12", "xs:integer", "12")]
#[case(" 12 ", "xs:integer", "12")]
#[case("1.50", "xs:decimal", "1.5")]
#[case("NaN", "xs:double", "NaN")]
#[case("-INF", "xs:float", "-INF")]
#[case("true", "xs:boolean", "true")]
#[case("1", "xs:boolean", "true")]
#[case("P1Y2M", "xs:yearMonthDuration", "P1Y2M")]
#[case("2024-02-29", "xs:date", "2024-02-29")]
#[case("0aFF", "xs:hexBinary", "0AFF")]
fn cast_from_untyped(#[case] lexical: &str, #[case] target: &str, #[case] expected: &str) {
    let cast = cast(&AtomicValue::untyped(lexical), target).unwrap();
    assert_eq!(cast.type_name().as_str(), target);
    assert_eq!(cast.string_value(), expected);
}

#[rstest]
#[case("INF", "xs:decimal", ErrorCode::FORG0001)]
#[case("NaN", "xs:integer", ErrorCode::FORG0001)]
#[case("abc", "xs:double", ErrorCode::FORG0001)]
#[case("256", "xs:unsignedByte", ErrorCode::FORG0001)]
#[case("2023-02-29", "xs:date", ErrorCode::FORG0001)]
fn cast_rejects_malformed_lexical_forms(#[case] lexical: &str, #[case] target: &str, #[case] code: ErrorCode) {
    let err = cast(&AtomicValue::string(lexical), target).unwrap_err();
    assert_eq!(err.code, code);
    assert_eq!(err.kind(), ErrorKind::CastError);
}

#[test]
fn non_finite_double_to_decimal_fails() {
    let err = cast(&AtomicValue::double(f64::INFINITY), "xs:decimal").unwrap_err();
    assert_eq!(err.code, ErrorCode::FOCA0002);
}

#[test]
fn boolean_to_date_is_not_castable() {
    let err = cast(&AtomicValue::boolean(true), "xs:date").unwrap_err();
    assert_eq!(err.code, ErrorCode::XPTY0004);
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[rstest]
#[case(string("fn:foo"), Ok("fn:foo"))]
#[case(string("  local "), Ok("local"))]
#[case(string("1nope"), Err(ErrorCode::FORG0001))]
#[case(string("nope:thing"), Err(ErrorCode::FONS0004))]
#[case(int(12), Err(ErrorCode::XPTY0004))]
fn qname_constructor(#[case] arg: Expr, #[case] expected: Result<&str, ErrorCode>) {
    let result = run(&xs("QName", arg), &no_focus());
    match expected {
        Ok(lexical) => assert_eq!(strings(&result.unwrap()), vec![lexical.to_string()]),
        Err(code) => assert_eq!(result.unwrap_err().code, code),
    }
}

#[test]
fn constructor_of_empty_is_empty() {
    let result = run(&xs("integer", seq(vec![])), &no_focus()).unwrap();
    assert!(result.is_empty());
}

#[test]
fn constructor_casts_through_the_lexical_form() {
    let result = run(&xs("integer", string("42")), &no_focus()).unwrap();
    assert_eq!(ints(&result), vec![42]);
    let result = run(&xs("dayTimeDuration", string("PT90M")), &no_focus()).unwrap();
    assert_eq!(strings(&result), vec!["PT1H30M".to_string()]);
}
