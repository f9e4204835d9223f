mod common;

use arbor_xpath::consts::{ARRAY_NS, FNS};
use arbor_xpath::engine::expr::{
    And, ArithmeticOp, Axis, BinaryNumeric, Bucket, ComparisonOp, FunctionCall, GeneralComparison, Literal,
    NamedFunctionRef, NodeTest, Or, Specificity, SpecificityKind, Unary, UnaryOp, VarRef,
};
use arbor_xpath::model::simple::{doc, elem, text, SimpleNode};
use arbor_xpath::{
    prepare, AtomicValue, DynamicContext, ErrorCode, ErrorKind, ExpandedName, Expression, NodeKind, StaticContext,
    Value,
};
use common::*;
use rstest::rstest;
use std::rc::Rc;

fn or(operands: Vec<Expr>) -> Expr {
    Rc::new(Or::new(operands))
}

fn and(operands: Vec<Expr>) -> Expr {
    Rc::new(And::new(operands))
}

fn numeric(op: ArithmeticOp, left: Expr, right: Expr) -> Expr {
    Rc::new(BinaryNumeric::new(op, left, right))
}

fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
    Rc::new(GeneralComparison::new(op, left, right))
}

fn untyped(s: &str) -> Expr {
    Rc::new(Literal::new(AtomicValue::untyped(s)))
}

fn unbound() -> Expr {
    Rc::new(VarRef::new(ExpandedName::local("unbound")))
}

fn function_ref(ns: &str, local: &str, arity: usize) -> Expr {
    Rc::new(NamedFunctionRef::new(ExpandedName::ns(ns, local), arity))
}

fn dynamic_call(function: Expr, arguments: Vec<Option<Expr>>) -> Expr {
    Rc::new(FunctionCall::new(function, arguments))
}

fn one_to_five() -> Expr {
    seq((1..=5).map(int).collect())
}

#[rstest]
#[case(vec![boolean(false), boolean(false), boolean(true), unbound()], true)]
#[case(vec![boolean(false), seq(vec![]), string("")], false)]
#[case(vec![string("x"), unbound()], true)]
fn or_stops_at_the_first_true_operand(#[case] operands: Vec<Expr>, #[case] expected: bool) {
    assert_eq!(single_bool(&run(&or(operands), &no_focus()).unwrap()), expected);
}

#[rstest]
#[case(vec![boolean(true), int(1), boolean(false), unbound()], false)]
#[case(vec![boolean(true), string("y")], true)]
fn and_stops_at_the_first_false_operand(#[case] operands: Vec<Expr>, #[case] expected: bool) {
    assert_eq!(single_bool(&run(&and(operands), &no_focus()).unwrap()), expected);
}

#[test]
fn logical_operands_that_are_reached_still_fail() {
    let err = run(&or(vec![boolean(false), unbound()]), &no_focus()).unwrap_err();
    assert_eq!(err.code, ErrorCode::XPST0008);
    let err = run(&and(vec![boolean(true), seq(vec![int(1), int(2)])]), &no_focus()).unwrap_err();
    assert_eq!(err.code, ErrorCode::FORG0006);
}

#[test]
fn logical_operators_wait_on_suspending_operands() {
    let root = doc().child(elem("a")).build();
    let expr = or(vec![child("missing"), child("a")]);
    let (result, suspensions) = run_both(&expr, &focus(&root));
    assert!(single_bool(&result.unwrap()));
    assert!(suspensions > 0);
}

#[rstest]
#[case(boolean(true), vec![1, 2, 3, 4, 5])]
#[case(boolean(false), vec![])]
#[case(int(2), vec![2])]
#[case(int(9), vec![])]
#[case(dbl(3.0), vec![3])]
#[case(dbl(2.5), vec![])]
fn filters_with_constant_predicates(#[case] predicate: Expr, #[case] expected: Vec<i64>) {
    let expr = filter(one_to_five(), predicate);
    assert_eq!(ints(&run(&expr, &no_focus()).unwrap()), expected);
}

#[test]
fn filters_with_focus_dependent_predicates() {
    let above_two = filter(one_to_five(), compare(ComparisonOp::Gt, context(), int(2)));
    assert_eq!(ints(&run(&above_two, &no_focus()).unwrap()), vec![3, 4, 5]);

    let last = filter(one_to_five(), compare(ComparisonOp::Eq, call("position", vec![]), call("last", vec![])));
    assert_eq!(ints(&run(&last, &no_focus()).unwrap()), vec![5]);

    let even = filter(
        one_to_five(),
        compare(ComparisonOp::Eq, numeric(ArithmeticOp::Modulo, context(), int(2)), int(0)),
    );
    assert_eq!(ints(&run(&even, &no_focus()).unwrap()), vec![2, 4]);
}

#[test]
fn nested_filters_see_their_own_focus() {
    let inner = filter(one_to_five(), compare(ComparisonOp::Lt, context(), int(4)));
    let outer = filter(inner, compare(ComparisonOp::Eq, call("position", vec![]), int(2)));
    assert_eq!(ints(&run(&outer, &no_focus()).unwrap()), vec![2]);
}

#[test]
fn constant_subexpressions_are_cached_at_preparation() {
    let constant = numeric(ArithmeticOp::Add, int(1), int(2));
    prepare(&constant, &Rc::new(StaticContext::default()));
    let cached = constant.base().static_value().map(<[Value<SimpleNode>]>::to_vec);
    assert_eq!(ints(&cached.unwrap()), vec![3]);

    let varying = numeric(ArithmeticOp::Add, context(), int(2));
    prepare(&varying, &Rc::new(StaticContext::default()));
    assert!(varying.base().static_value().is_none());
}

#[test]
fn constant_errors_surface_at_run_time() {
    let broken = numeric(ArithmeticOp::IntegerDivide, int(1), int(0));
    prepare(&broken, &Rc::new(StaticContext::default()));
    assert!(broken.base().static_value().is_none());
    assert_eq!(run(&broken, &no_focus()).unwrap_err().code, ErrorCode::FOAR0001);
}

#[rstest]
#[case(numeric(ArithmeticOp::Add, int(2), int(3)), "5", "xs:integer")]
#[case(numeric(ArithmeticOp::Add, untyped("3"), int(4)), "7", "xs:double")]
#[case(numeric(ArithmeticOp::Divide, int(3), int(4)), "0.75", "xs:decimal")]
#[case(numeric(ArithmeticOp::Multiply, dbl(0.5), int(4)), "2", "xs:double")]
#[case(Rc::new(Unary::new(UnaryOp::Minus, untyped("2"))), "-2", "xs:double")]
#[case(Rc::new(Unary::new(UnaryOp::Plus, string("two"))), "NaN", "xs:double")]
fn arithmetic(#[case] expr: Expr, #[case] expected: &str, #[case] type_name: &str) {
    let items = run(&expr, &no_focus()).unwrap();
    let value = items[0].as_atomic().unwrap();
    assert_eq!(value.string_value(), expected);
    assert_eq!(value.type_name().as_str(), type_name);
}

#[test]
fn arithmetic_on_empty_is_empty() {
    let expr = numeric(ArithmeticOp::Add, seq(vec![]), unbound());
    assert!(run(&expr, &no_focus()).unwrap().is_empty());
    let expr = numeric(ArithmeticOp::Subtract, int(1), seq(vec![]));
    assert!(run(&expr, &no_focus()).unwrap().is_empty());
}

#[rstest]
#[case(numeric(ArithmeticOp::Add, string("1"), int(1)), ErrorCode::XPTY0004)]
#[case(numeric(ArithmeticOp::Add, seq(vec![int(1), int(2)]), int(1)), ErrorCode::XPTY0004)]
#[case(numeric(ArithmeticOp::Add, untyped("x"), int(1)), ErrorCode::FORG0001)]
#[case(numeric(ArithmeticOp::Modulo, int(1), int(0)), ErrorCode::FOAR0001)]
fn arithmetic_errors(#[case] expr: Expr, #[case] code: ErrorCode) {
    assert_eq!(run(&expr, &no_focus()).unwrap_err().code, code);
}

#[rstest]
#[case(ComparisonOp::Eq, seq(vec![int(1), int(2)]), seq(vec![int(2), int(3)]), true)]
#[case(ComparisonOp::Ne, int(1), seq(vec![int(1), int(1)]), false)]
#[case(ComparisonOp::Lt, untyped("10"), int(9), false)]
#[case(ComparisonOp::Lt, untyped("10"), string("9"), true)]
#[case(ComparisonOp::Ge, string("b"), string("a"), true)]
#[case(ComparisonOp::Eq, seq(vec![]), seq(vec![]), false)]
#[case(ComparisonOp::Eq, boolean(true), boolean(true), true)]
fn general_comparisons(#[case] op: ComparisonOp, #[case] left: Expr, #[case] right: Expr, #[case] expected: bool) {
    assert_eq!(single_bool(&run(&compare(op, left, right), &no_focus()).unwrap()), expected);
}

#[test]
fn comparing_incompatible_types_is_a_type_error() {
    let err = run(&compare(ComparisonOp::Eq, string("a"), int(1)), &no_focus()).unwrap_err();
    assert_eq!(err.code, ErrorCode::XPTY0004);
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn comparisons_atomize_nodes() {
    let root = doc().child(elem("a").child(text("42"))).build();
    let expr = compare(ComparisonOp::Eq, child("a"), int(42));
    let (result, _) = run_both(&expr, &focus(&root));
    assert!(single_bool(&result.unwrap()));
}

#[test]
fn array_constructors() {
    let square_array = square(vec![int(1), seq(vec![int(2), int(3)]), seq(vec![])]);
    let size = array_fn("size", vec![square_array.clone()]);
    assert_eq!(ints(&run(&size, &no_focus()).unwrap()), vec![3]);
    let second = array_fn("get", vec![square_array, int(2)]);
    assert_eq!(ints(&run(&second, &no_focus()).unwrap()), vec![2, 3]);

    let curly_array = curly(seq(vec![int(1), seq(vec![int(2), int(3)]), seq(vec![])]));
    let size = array_fn("size", vec![curly_array]);
    assert_eq!(ints(&run(&size, &no_focus()).unwrap()), vec![3]);
}

#[test]
fn map_constructors() {
    let m = map(vec![(string("a"), int(1)), (int(1), seq(vec![int(2), int(3)]))]);
    let size = map_fn("size", vec![m.clone()]);
    assert_eq!(ints(&run(&size, &no_focus()).unwrap()), vec![2]);
    let numeric_key = map_fn("get", vec![m, dbl(1.0)]);
    assert_eq!(ints(&run(&numeric_key, &no_focus()).unwrap()), vec![2, 3]);
}

#[test]
fn duplicate_map_keys_are_rejected() {
    let m = map(vec![(string("a"), int(1)), (untyped("a"), int(2))]);
    assert_eq!(run(&m, &no_focus()).unwrap_err().code, ErrorCode::XQDY0137);
    let m = map(vec![(seq(vec![int(1), int(2)]), int(1))]);
    assert_eq!(run(&m, &no_focus()).unwrap_err().code, ErrorCode::XPTY0004);
}

#[test]
fn unknown_functions_and_wrong_arity() {
    let unknown = call("no-such-function", vec![]);
    assert_eq!(run(&unknown, &no_focus()).unwrap_err().code, ErrorCode::XPST0017);

    let count = dynamic_call(function_ref(FNS, "count", 1), vec![Some(int(1)), Some(int(2))]);
    assert_eq!(run(&count, &no_focus()).unwrap_err().code, ErrorCode::XPTY0004);
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    let expr = dynamic_call(int(1), vec![]);
    assert_eq!(run(&expr, &no_focus()).unwrap_err().code, ErrorCode::XPTY0004);
    let expr = dynamic_call(seq(vec![]), vec![]);
    assert_eq!(run(&expr, &no_focus()).unwrap_err().code, ErrorCode::XPTY0004);
}

#[test]
fn partial_application_binds_the_supplied_arguments() {
    let second_of = dynamic_call(function_ref(ARRAY_NS, "get", 2), vec![None, Some(int(2))]);
    let applied = dynamic_call(second_of, vec![Some(square(vec![int(10), int(20), int(30)]))]);
    assert_eq!(ints(&run(&applied, &no_focus()).unwrap()), vec![20]);
}

#[test]
fn partially_applied_functions_report_their_arity() {
    let partial = dynamic_call(function_ref(ARRAY_NS, "get", 2), vec![Some(square(vec![int(1)])), None]);
    let wrong = dynamic_call(partial, vec![Some(int(1)), Some(int(1))]);
    assert_eq!(run(&wrong, &no_focus()).unwrap_err().code, ErrorCode::XPTY0004);
}

#[test]
fn maps_and_arrays_are_callable() {
    let by_key = dynamic_call(map(vec![(string("k"), int(7))]), vec![Some(string("k"))]);
    assert_eq!(ints(&run(&by_key, &no_focus()).unwrap()), vec![7]);
    let missing = dynamic_call(map(vec![(string("k"), int(7))]), vec![Some(string("x"))]);
    assert!(run(&missing, &no_focus()).unwrap().is_empty());

    let by_index = dynamic_call(square(vec![int(5), int(6)]), vec![Some(int(2))]);
    assert_eq!(ints(&run(&by_index, &no_focus()).unwrap()), vec![6]);
    let out_of_bounds = dynamic_call(square(vec![int(5)]), vec![Some(int(3))]);
    let err = run(&out_of_bounds, &no_focus()).unwrap_err();
    assert_eq!(err.code, ErrorCode::FOAY0001);
    assert_eq!(err.kind(), ErrorKind::Bounds);
}

#[test]
fn named_function_references_are_callable() {
    let count = dynamic_call(function_ref(FNS, "count", 1), vec![Some(one_to_five())]);
    assert_eq!(ints(&run(&count, &no_focus()).unwrap()), vec![5]);
}

#[test]
fn variables_are_looked_up_through_scopes() {
    let name = ExpandedName::local("x");
    let ctx = DynamicContext::<SimpleNode>::builder()
        .with_variable(name.clone(), vec![Value::Atomic(AtomicValue::integer(3))])
        .build();
    let expr = numeric(ArithmeticOp::Multiply, Rc::new(VarRef::new(name)), int(2));
    assert_eq!(ints(&run(&expr, &ctx).unwrap()), vec![6]);
}

#[test]
fn specificity_ranks_attribute_tests_above_name_tests() {
    let by_name = child("item").specificity();
    let by_attribute = step(Axis::Attribute, NodeTest::name("id")).specificity();
    let by_kind = step(Axis::Child, NodeTest::Kind(Some(NodeKind::Element))).specificity();
    let anything = step(Axis::Child, NodeTest::Kind(None)).specificity();
    assert_eq!(by_name.count(SpecificityKind::NodeName), 1);
    assert_eq!(by_attribute.count(SpecificityKind::Attribute), 1);
    assert!(by_attribute > by_name);
    assert!(by_name > by_kind);
    assert!(by_kind > anything);
    assert!(anything > Specificity::default());
}

#[test]
fn specificity_combines_through_paths_and_alternatives() {
    let two_names = path(vec![child("a"), child("b")]).specificity();
    assert_eq!(two_names.count(SpecificityKind::NodeName), 2);
    let either = or(vec![child("a"), path(vec![child("a"), child("b")])]).specificity();
    assert_eq!(either, two_names);
    let call_site = call("true", vec![]).specificity();
    assert_eq!(call_site.count(SpecificityKind::External), 1);
    assert!(call_site > two_names);
}

#[test]
fn buckets_narrow_self_steps_only() {
    let self_item = step(Axis::SelfAxis, NodeTest::name("item"));
    let bucket = self_item.bucket().unwrap();
    assert!(bucket.admits(NodeKind::Element, Some("item")));
    assert!(!bucket.admits(NodeKind::Element, Some("other")));
    assert!(!bucket.admits(NodeKind::Attribute, Some("item")));
    assert_eq!(bucket.to_string(), "name-item");

    assert_eq!(child("item").bucket(), None);
    let text_only = step(Axis::SelfAxis, NodeTest::Kind(Some(NodeKind::Text)));
    assert_eq!(text_only.bucket(), Some(Bucket::NodeKind(NodeKind::Text)));
}

#[test]
fn buckets_propagate_through_composite_expressions() {
    let self_item = || step(Axis::SelfAxis, NodeTest::name("item"));
    let self_text = || step(Axis::SelfAxis, NodeTest::Kind(Some(NodeKind::Text)));

    assert_eq!(path(vec![self_item(), child("b")]).bucket(), self_item().bucket());
    assert_eq!(path(vec![child("b"), self_item()]).bucket(), None);
    assert_eq!(filter(self_item(), int(1)).bucket(), self_item().bucket());
    assert_eq!(or(vec![self_item(), self_item()]).bucket(), self_item().bucket());
    assert_eq!(or(vec![self_item(), self_text()]).bucket(), None);
    assert_eq!(and(vec![child("b"), self_text()]).bucket(), self_text().bucket());
}
