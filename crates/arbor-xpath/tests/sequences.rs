mod common;

use arbor_xpath::engine::sequence::Cardinality;
use arbor_xpath::model::simple::{doc, elem, text, SimpleNode};
use arbor_xpath::{AtomicValue, Awaitable, Error, ErrorCode, ErrorKind, Fetch, Sequence, SharedSequence, Step, Value};
use common::*;
use futures::executor::block_on;
use rstest::rstest;
use std::cell::Cell;
use std::rc::Rc;

fn atomic(a: AtomicValue) -> Item {
    Value::Atomic(a)
}

fn ebv(items: Vec<Item>) -> Result<bool, Error> {
    match Sequence::<SimpleNode>::from_vec(items).try_get_effective_boolean_value()? {
        Fetch::Ready(b) => Ok(b),
        Fetch::Pending(_) => panic!("a materialized sequence never suspends"),
    }
}

/// Yields `items`, suspending once before each of them.
fn stuttering(items: Vec<Item>) -> (Sequence<SimpleNode>, Rc<Cell<usize>>) {
    let pulls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&pulls);
    let mut items = items.into_iter();
    let mut suspended = false;
    let seq = Sequence::from_fn(move || {
        counter.set(counter.get() + 1);
        if !suspended {
            suspended = true;
            return Ok(Step::Pending(Awaitable::ready()));
        }
        suspended = false;
        Ok(items.next().map_or(Step::Done, Step::Item))
    });
    (seq, pulls)
}

#[rstest]
#[case(vec![], false)]
#[case(vec![atomic(AtomicValue::boolean(true))], true)]
#[case(vec![atomic(AtomicValue::boolean(false))], false)]
#[case(vec![atomic(AtomicValue::integer(0))], false)]
#[case(vec![atomic(AtomicValue::integer(-3))], true)]
#[case(vec![atomic(AtomicValue::double(f64::NAN))], false)]
#[case(vec![atomic(AtomicValue::string(""))], false)]
#[case(vec![atomic(AtomicValue::string("0"))], true)]
#[case(vec![atomic(AtomicValue::untyped("x"))], true)]
fn effective_boolean_value(#[case] items: Vec<Item>, #[case] expected: bool) {
    assert_eq!(ebv(items).unwrap(), expected);
}

#[test]
fn ebv_of_nodes_is_true() {
    let root = doc().child(elem("a")).child(elem("b")).build();
    let children: Vec<Item> = root.children().iter().cloned().map(Value::Node).collect();
    assert!(ebv(children[..1].to_vec()).unwrap());
    assert!(ebv(children).unwrap());
}

#[test]
fn ebv_of_two_atomics_is_a_type_error() {
    let err = ebv(vec![atomic(AtomicValue::integer(1)), atomic(AtomicValue::integer(2))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn ebv_of_a_map_is_a_type_error() {
    let result = run(&call("boolean", vec![map(vec![])]), &no_focus());
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TypeMismatch);
}

#[test]
fn suspension_skips_nothing() {
    let (mut seq, _) = stuttering(vec![atomic(AtomicValue::integer(1)), atomic(AtomicValue::integer(2))]);
    let mut seen = Vec::new();
    loop {
        match seq.next().unwrap() {
            Step::Item(v) => seen.push(v),
            Step::Pending(a) => block_on(a),
            Step::Done => break,
        }
    }
    assert_eq!(ints(&seen), vec![1, 2]);
    assert!(matches!(seq.next().unwrap(), Step::Done));
}

#[test]
fn ebv_resumes_without_repulling() {
    let (mut seq, pulls) = stuttering(vec![atomic(AtomicValue::integer(7))]);
    let mut suspensions = 0;
    let value = loop {
        match seq.try_get_effective_boolean_value().unwrap() {
            Fetch::Ready(b) => break b,
            Fetch::Pending(a) => {
                suspensions += 1;
                block_on(a);
            }
        }
    };
    assert!(value);
    assert_eq!(suspensions, 2);
    // first item, then the look-ahead that proves there is no second one
    assert_eq!(pulls.get(), 4);
}

#[test]
fn drain_keeps_items_resolved_before_a_suspension() {
    let (mut seq, _) = stuttering((1..=3).map(|i| atomic(AtomicValue::integer(i))).collect());
    let items = loop {
        match seq.try_drain().unwrap() {
            Fetch::Ready(items) => break items,
            Fetch::Pending(a) => block_on(a),
        }
    };
    assert_eq!(ints(&items), vec![1, 2, 3]);
}

#[test]
fn materialize_awaits_suspensions() {
    let (seq, _) = stuttering(vec![atomic(AtomicValue::string("a"))]);
    assert_eq!(strings(&block_on(seq.materialize()).unwrap()), vec!["a".to_string()]);
}

#[test]
fn errors_are_terminal() {
    let mut calls = 0;
    let mut seq: Sequence<SimpleNode> = Sequence::from_fn(move || {
        calls += 1;
        if calls == 1 {
            Ok(Step::Item(Value::Atomic(AtomicValue::integer(1))))
        } else {
            Err(Error::from_code(ErrorCode::FOER0000, "boom"))
        }
    });
    assert!(matches!(seq.next(), Ok(Step::Item(_))));
    assert!(seq.next().is_err());
    assert!(matches!(seq.next(), Ok(Step::Done)));
}

#[rstest]
#[case(0, Cardinality::Empty)]
#[case(1, Cardinality::One)]
#[case(5, Cardinality::Many)]
fn cardinality_peeks_without_consuming(#[case] n: i64, #[case] expected: Cardinality) {
    let mut seq: Sequence<SimpleNode> = Sequence::from_vec((1..=n).map(|i| atomic(AtomicValue::integer(i))).collect());
    let Fetch::Ready(cardinality) = seq.try_cardinality().unwrap() else { panic!("suspended") };
    assert_eq!(cardinality, expected);
    let Fetch::Ready(rest) = seq.try_drain().unwrap() else { panic!("suspended") };
    assert_eq!(rest.len(), usize::try_from(n).unwrap());
}

#[test]
fn map_all_sees_every_item() {
    let (seq, _) = stuttering((1..=4).map(|i| atomic(AtomicValue::integer(i))).collect());
    let summed = seq.map_all(|items| {
        let total: i64 = ints(&items).iter().sum();
        Ok(Sequence::singleton(Value::Atomic(AtomicValue::integer(total))))
    });
    assert_eq!(ints(&block_on(summed.materialize()).unwrap()), vec![10]);
}

#[test]
fn shared_sequence_serves_independent_readers() {
    let (seq, pulls) = stuttering((1..=3).map(|i| atomic(AtomicValue::integer(i))).collect());
    let shared = SharedSequence::new(seq);
    let first = block_on(shared.reader().materialize()).unwrap();
    let pulls_after_first = pulls.get();
    let second = block_on(shared.reader().materialize()).unwrap();
    assert_eq!(ints(&first), ints(&second));
    assert_eq!(pulls.get(), pulls_after_first);
    assert_eq!(shared.known_len(), Some(3));
}

#[test]
fn atomize_flattens_arrays_and_reads_node_data() {
    let root = doc().child(elem("p").child(text("one")).child(elem("b").child(text("two")))).build();
    let expr = call("data", vec![seq(vec![square(vec![int(1), seq(vec![int(2), int(3)])]), child("p")])]);
    let (result, suspensions) = run_both(&expr, &focus(&root));
    let items = result.unwrap();
    assert_eq!(strings(&items), vec!["1", "2", "3", "onetwo"]);
    assert_eq!(items[3].as_atomic().map(|a| a.type_name().as_str().to_string()).as_deref(), Some("xs:untypedAtomic"));
    assert!(suspensions > 0);
}

#[test]
fn atomizing_a_function_fails() {
    let result = run(&call("data", vec![map(vec![(string("k"), int(1))])]), &no_focus());
    let err = result.unwrap_err();
    assert_eq!(err.code, ErrorCode::FOTY0013);
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
}
