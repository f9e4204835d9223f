#![allow(dead_code)]

use arbor_xpath::consts::{ARRAY_NS, FNS, MAP_NS, XS};
use arbor_xpath::engine::expr::{
    ArrayConstructor, ArrayConstructorKind, Axis, AxisStep, ContextItem, Filter, FunctionCall, Literal,
    MapConstructor, NodeTest, PathExpression, SequenceConstructor,
};
use arbor_xpath::model::simple::{SimpleFacade, SimpleNode};
use arbor_xpath::{
    evaluate_blocking, prepare, AtomicValue, DynamicContext, Error, ExecutionParameters, ExprRef, ExpandedName,
    Scalar, StaticContext, Value,
};
use std::rc::Rc;

pub type Expr = ExprRef<SimpleNode>;
pub type Item = Value<SimpleNode>;

pub fn int(i: i64) -> Expr {
    Rc::new(Literal::new(AtomicValue::integer(i)))
}

pub fn dbl(d: f64) -> Expr {
    Rc::new(Literal::new(AtomicValue::double(d)))
}

pub fn string(s: &str) -> Expr {
    Rc::new(Literal::new(AtomicValue::string(s)))
}

pub fn boolean(b: bool) -> Expr {
    Rc::new(Literal::new(AtomicValue::boolean(b)))
}

pub fn seq(items: Vec<Expr>) -> Expr {
    Rc::new(SequenceConstructor::new(items))
}

pub fn context() -> Expr {
    Rc::new(ContextItem::new())
}

pub fn call_ns(ns: &str, local: &str, args: Vec<Expr>) -> Expr {
    Rc::new(FunctionCall::named(ExpandedName::ns(ns, local), args))
}

pub fn call(local: &str, args: Vec<Expr>) -> Expr {
    call_ns(FNS, local, args)
}

pub fn array_fn(local: &str, args: Vec<Expr>) -> Expr {
    call_ns(ARRAY_NS, local, args)
}

pub fn map_fn(local: &str, args: Vec<Expr>) -> Expr {
    call_ns(MAP_NS, local, args)
}

pub fn xs(local: &str, arg: Expr) -> Expr {
    call_ns(XS, local, vec![arg])
}

pub fn square(members: Vec<Expr>) -> Expr {
    Rc::new(ArrayConstructor::new(ArrayConstructorKind::Square, members))
}

pub fn curly(members: Expr) -> Expr {
    Rc::new(ArrayConstructor::new(ArrayConstructorKind::Curly, vec![members]))
}

pub fn map(entries: Vec<(Expr, Expr)>) -> Expr {
    Rc::new(MapConstructor::new(entries))
}

pub fn step(axis: Axis, test: NodeTest) -> Expr {
    Rc::new(AxisStep::new(axis, test))
}

pub fn child(name: &str) -> Expr {
    step(Axis::Child, NodeTest::name(name))
}

pub fn path(steps: Vec<Expr>) -> Expr {
    Rc::new(PathExpression::new(steps))
}

pub fn filter(selector: Expr, predicate: Expr) -> Expr {
    Rc::new(Filter::new(selector, predicate))
}

pub fn no_focus() -> DynamicContext<SimpleNode> {
    DynamicContext::new()
}

pub fn focus(node: &SimpleNode) -> DynamicContext<SimpleNode> {
    DynamicContext::builder().with_context_item(Value::Node(node.clone())).build()
}

pub fn run_with(expr: &Expr, ctx: &DynamicContext<SimpleNode>, facade: SimpleFacade) -> Result<Vec<Item>, Error> {
    prepare(expr, &Rc::new(StaticContext::default()));
    evaluate_blocking(expr, ctx, &ExecutionParameters::new(Rc::new(facade)))
}

pub fn run(expr: &Expr, ctx: &DynamicContext<SimpleNode>) -> Result<Vec<Item>, Error> {
    run_with(expr, ctx, SimpleFacade::new())
}

/// Runs `expr` once synchronously and once against a suspending facade; both
/// must agree. Returns the result and the number of suspensions observed.
pub fn run_both(expr: &Expr, ctx: &DynamicContext<SimpleNode>) -> (Result<Vec<Item>, Error>, usize) {
    let direct = run(expr, ctx);
    let deferred = SimpleFacade::deferred();
    let resumed = run_with(expr, ctx, deferred.clone());
    assert_eq!(describe(&direct), describe(&resumed), "suspending facade changed the result");
    (resumed, deferred.suspensions())
}

pub fn describe(result: &Result<Vec<Item>, Error>) -> Result<Vec<String>, String> {
    match result {
        Ok(items) => Ok(items.iter().map(|i| format!("{i:?}")).collect()),
        Err(e) => Err(e.code.as_str().to_string()),
    }
}

pub fn ints(items: &[Item]) -> Vec<i64> {
    items
        .iter()
        .map(|i| match i.as_atomic().map(AtomicValue::value) {
            Some(Scalar::Integer(n)) => *n,
            other => panic!("expected an integer, got {other:?}"),
        })
        .collect()
}

pub fn strings(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .map(|i| match i.as_atomic() {
            Some(a) => a.string_value(),
            None => panic!("expected an atomic value, got {i:?}"),
        })
        .collect()
}

pub fn single_bool(items: &[Item]) -> bool {
    match items {
        [Value::Atomic(a)] => match a.value() {
            Scalar::Boolean(b) => *b,
            other => panic!("expected a boolean, got {other:?}"),
        },
        other => panic!("expected one item, got {other:?}"),
    }
}

pub fn nodes(items: &[Item]) -> Vec<SimpleNode> {
    items
        .iter()
        .map(|i| match i {
            Value::Node(n) => n.clone(),
            other => panic!("expected a node, got {other:?}"),
        })
        .collect()
}

pub fn names(items: &[Item]) -> Vec<String> {
    nodes(items)
        .iter()
        .map(|n| {
            use arbor_xpath::XdmNode;
            n.name().map(|q| q.local).unwrap_or_default()
        })
        .collect()
}
