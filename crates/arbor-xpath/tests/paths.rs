mod common;

use arbor_xpath::engine::expr::{Axis, NodeTest};
use arbor_xpath::model::simple::{attr, doc, elem, text, SimpleNode};
use arbor_xpath::{AtomicValue, DynamicContext, ErrorCode, ErrorKind, NodeKind, XdmNode};
use common::*;
use rstest::{fixture, rstest};

/// ```text
/// list id=l
///   item id=i1 "one"
///   item id=i2 "two"
///     item id=n "nested"
///   item id=i3
///   item id=i4
/// ```
#[fixture]
fn list() -> SimpleNode {
    doc()
        .child(
            elem("list")
                .attr(attr("id", "l"))
                .child(elem("item").attr(attr("id", "i1")).child(text("one")))
                .child(
                    elem("item")
                        .attr(attr("id", "i2"))
                        .child(text("two"))
                        .child(elem("item").attr(attr("id", "n")).child(text("nested"))),
                )
                .child(elem("item").attr(attr("id", "i3")))
                .child(elem("item").attr(attr("id", "i4"))),
        )
        .build()
}

fn ids(items: &[Item]) -> Vec<String> {
    nodes(items)
        .iter()
        .map(|n| {
            n.attributes()
                .iter()
                .find_map(|a| a.value().map(str::to_string))
                .unwrap_or_default()
        })
        .collect()
}

fn any_node() -> NodeTest {
    NodeTest::Kind(None)
}

#[rstest]
fn positional_predicate_selects_the_second_child(list: SimpleNode) {
    let expr = path(vec![child("list"), filter(step(Axis::Child, NodeTest::any_name()), int(2))]);
    let (result, suspensions) = run_both(&expr, &focus(&list));
    let items = result.unwrap();
    assert_eq!(ids(&items), vec!["i2"]);
    assert_eq!(nodes(&items)[0], list.children()[0].children()[1]);
    assert!(suspensions > 0);
}

#[rstest]
fn reverse_axis_positions_count_backwards(list: SimpleNode) {
    let last = filter(child("item"), int(4));
    let expr = path(vec![child("list"), last, filter(step(Axis::PrecedingSibling, any_node()), int(1))]);
    let (result, _) = run_both(&expr, &focus(&list));
    assert_eq!(ids(&result.unwrap()), vec!["i3"]);
}

#[rstest]
fn reverse_axis_results_come_back_in_document_order(list: SimpleNode) {
    let expr = path(vec![
        child("list"),
        filter(child("item"), int(2)),
        child("item"),
        step(Axis::AncestorOrSelf, any_node()),
    ]);
    let (result, _) = run_both(&expr, &focus(&list));
    let items = result.unwrap();
    assert_eq!(names(&items), vec!["", "list", "item", "item"]);
    assert_eq!(nodes(&items)[0].kind(), NodeKind::Document);
}

#[rstest]
fn overlapping_step_results_are_sorted_and_deduplicated(list: SimpleNode) {
    let expr = path(vec![step(Axis::DescendantOrSelf, any_node()), child("item")]);
    let (result, _) = run_both(&expr, &focus(&list));
    assert_eq!(ids(&result.unwrap()), vec!["i1", "i2", "n", "i3", "i4"]);

    let parents = path(vec![child("list"), child("item"), step(Axis::Parent, any_node())]);
    let (result, _) = run_both(&parents, &focus(&list));
    assert_eq!(names(&result.unwrap()), vec!["list"]);
}

#[rstest]
fn descendant_axis_walks_in_document_order(list: SimpleNode) {
    let expr = path(vec![child("list"), step(Axis::Descendant, NodeTest::Kind(Some(NodeKind::Text)))]);
    let (result, _) = run_both(&expr, &focus(&list));
    let texts: Vec<String> = nodes(&result.unwrap()).iter().filter_map(|n| n.value().map(str::to_string)).collect();
    assert_eq!(texts, vec!["one", "two", "nested"]);
}

#[rstest]
fn following_siblings(list: SimpleNode) {
    let expr = path(vec![child("list"), filter(child("item"), int(2)), step(Axis::FollowingSibling, any_node())]);
    let (result, _) = run_both(&expr, &focus(&list));
    assert_eq!(ids(&result.unwrap()), vec!["i3", "i4"]);
}

#[rstest]
fn attribute_axis_and_atomic_last_step(list: SimpleNode) {
    let id = step(Axis::Attribute, NodeTest::name("id"));
    let expr = path(vec![child("list"), child("item"), call("string", vec![id])]);
    let (result, _) = run_both(&expr, &focus(&list));
    assert_eq!(strings(&result.unwrap()), vec!["i1", "i2", "i3", "i4"]);
}

#[rstest]
fn self_axis_with_kind_test(list: SimpleNode) {
    let elements = path(vec![child("list"), step(Axis::SelfAxis, NodeTest::Kind(Some(NodeKind::Element)))]);
    assert_eq!(names(&run(&elements, &focus(&list)).unwrap()), vec!["list"]);
    let texts = path(vec![child("list"), step(Axis::SelfAxis, NodeTest::Kind(Some(NodeKind::Text)))]);
    assert!(run(&texts, &focus(&list)).unwrap().is_empty());
}

#[rstest]
fn intermediate_results_must_be_nodes(list: SimpleNode) {
    let expr = path(vec![int(1), child("item")]);
    let err = run(&expr, &focus(&list)).unwrap_err();
    assert_eq!(err.code, ErrorCode::XPTY0019);
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[rstest]
fn mixed_node_and_atomic_results_are_rejected(list: SimpleNode) {
    let expr = path(vec![child("list"), seq(vec![context(), int(1)])]);
    let err = run(&expr, &focus(&list)).unwrap_err();
    assert_eq!(err.code, ErrorCode::XPTY0018);
}

#[test]
fn axis_steps_need_a_context_item() {
    let err = run(&child("list"), &no_focus()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingContext);
}

#[test]
fn axis_steps_reject_atomic_context() {
    let ctx = DynamicContext::builder().with_context_item(AtomicValue::integer(1)).build();
    let err = run(&child("list"), &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::XPTY0004);
}
