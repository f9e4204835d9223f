//! Lazy sequences with a pull protocol that can suspend.
//!
//! [`Sequence::next`] yields one [`Step`] per call. `Step::Pending` means the
//! producer is waiting for the host; nothing was consumed and the next call
//! picks up exactly where this one stopped. Items pulled ahead of time by
//! [`Sequence::try_get_first`] and friends stay buffered, so peeking never
//! changes what a later `next` returns.

use crate::engine::atomize::{atomize_item, ItemAtomizer};
use crate::engine::runtime::{Error, ErrorCode, ExecutionParameters};
use crate::engine::suspend::{try_ready, Awaitable, Fetch, Resumable};
use crate::model::XdmNode;
use crate::xdm::{Scalar, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Outcome of one pull.
#[derive(Debug)]
pub enum Step<N> {
    Item(Value<N>),
    Pending(Awaitable),
    Done,
}

impl<N> From<Awaitable> for Step<N> {
    fn from(a: Awaitable) -> Self {
        Step::Pending(a)
    }
}

/// Producer behind a [`Sequence`].
pub trait SequenceCursor<N> {
    fn next_step(&mut self) -> Result<Step<N>, Error>;
}

struct FnCursor<F>(F);

impl<N, F: FnMut() -> Result<Step<N>, Error>> SequenceCursor<N> for FnCursor<F> {
    fn next_step(&mut self) -> Result<Step<N>, Error> {
        (self.0)()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Empty,
    One,
    Many,
}

pub struct Sequence<N> {
    cursor: Option<Box<dyn SequenceCursor<N>>>,
    buffer: VecDeque<Value<N>>,
    done: bool,
}

impl<N: XdmNode> Sequence<N> {
    pub fn empty() -> Self {
        Self { cursor: None, buffer: VecDeque::new(), done: true }
    }

    pub fn singleton(value: Value<N>) -> Self {
        Self::from_vec(vec![value])
    }

    pub fn from_vec(values: Vec<Value<N>>) -> Self {
        Self { cursor: None, buffer: values.into(), done: true }
    }

    pub fn from_cursor(cursor: impl SequenceCursor<N> + 'static) -> Self {
        Self { cursor: Some(Box::new(cursor)), buffer: VecDeque::new(), done: false }
    }

    pub fn from_fn(f: impl FnMut() -> Result<Step<N>, Error> + 'static) -> Self {
        Self::from_cursor(FnCursor(f))
    }

    /// A sequence whose first pull raises `err`.
    pub fn failed(err: Error) -> Self {
        let mut err = Some(err);
        Self::from_fn(move || match err.take() {
            Some(e) => Err(e),
            None => Ok(Step::Done),
        })
    }

    /// Defers building a sequence until it is first pulled.
    pub fn deferred(make: impl FnOnce() -> Result<Sequence<N>, Error> + 'static) -> Self {
        let mut make = Some(make);
        let mut inner: Option<Sequence<N>> = None;
        Self::from_fn(move || {
            if let Some(seq) = inner.as_mut() {
                return seq.next();
            }
            let make = make.take().ok_or_else(|| Error::internal("deferred sequence rebuilt"))?;
            inner.insert(make()?).next()
        })
    }

    /// Items in order, one sequence after another.
    pub fn concat(parts: Vec<Sequence<N>>) -> Self {
        let mut parts: VecDeque<Sequence<N>> = parts.into();
        Self::from_fn(move || {
            while let Some(front) = parts.front_mut() {
                match front.next()? {
                    Step::Done => {
                        parts.pop_front();
                    }
                    step => return Ok(step),
                }
            }
            Ok(Step::Done)
        })
    }

    /// Pull the next item. `Done` is terminal; an error ends the sequence.
    pub fn next(&mut self) -> Result<Step<N>, Error> {
        if let Some(v) = self.buffer.pop_front() {
            return Ok(Step::Item(v));
        }
        self.pull()
    }

    fn pull(&mut self) -> Result<Step<N>, Error> {
        if self.done {
            return Ok(Step::Done);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            self.done = true;
            return Ok(Step::Done);
        };
        match cursor.next_step() {
            Ok(Step::Done) => {
                self.finish();
                Ok(Step::Done)
            }
            Err(e) => {
                self.finish();
                Err(e)
            }
            other => other,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.cursor = None;
    }

    /// Buffer up to `n` items without consuming them.
    fn fill(&mut self, n: usize) -> Result<Fetch<()>, Error> {
        while self.buffer.len() < n {
            match self.pull()? {
                Step::Item(v) => self.buffer.push_back(v),
                Step::Pending(a) => return Ok(Fetch::Pending(a)),
                Step::Done => break,
            }
        }
        Ok(Fetch::Ready(()))
    }

    pub fn try_get_first(&mut self) -> Result<Fetch<Option<Value<N>>>, Error> {
        try_ready!(self.fill(1));
        Ok(Fetch::Ready(self.buffer.front().cloned()))
    }

    /// Empty, one or many, pulling at most two items.
    pub fn try_cardinality(&mut self) -> Result<Fetch<Cardinality>, Error> {
        try_ready!(self.fill(2));
        Ok(Fetch::Ready(match self.buffer.len() {
            0 => Cardinality::Empty,
            1 => Cardinality::One,
            _ => Cardinality::Many,
        }))
    }

    pub fn try_get_effective_boolean_value(&mut self) -> Result<Fetch<bool>, Error> {
        try_ready!(self.fill(1));
        match self.buffer.front() {
            None => return Ok(Fetch::Ready(false)),
            Some(Value::Node(_)) => return Ok(Fetch::Ready(true)),
            Some(_) => {}
        }
        try_ready!(self.fill(2));
        if self.buffer.len() > 1 {
            return Err(Error::from_code(
                ErrorCode::FORG0006,
                "effective boolean value is not defined for a sequence of two or more items starting with a non-node",
            ));
        }
        match self.buffer.front() {
            Some(item) => effective_boolean_value(item).map(Fetch::Ready),
            None => Ok(Fetch::Ready(false)),
        }
    }

    /// Materialize every remaining item. Items resolved before a suspension stay buffered.
    pub fn try_drain(&mut self) -> Result<Fetch<Vec<Value<N>>>, Error> {
        try_ready!(self.fill(usize::MAX));
        Ok(Fetch::Ready(self.buffer.drain(..).collect()))
    }

    pub async fn materialize(mut self) -> Result<Vec<Value<N>>, Error> {
        loop {
            match self.try_drain()? {
                Fetch::Ready(v) => return Ok(v),
                Fetch::Pending(a) => a.await,
            }
        }
    }

    /// Drain fully, then continue with the sequence `f` builds from the items.
    pub fn map_all(self, f: impl FnOnce(Vec<Value<N>>) -> Result<Sequence<N>, Error> + 'static) -> Sequence<N> {
        let mut source = self;
        let mut f = Some(f);
        let mut output: Option<Sequence<N>> = None;
        Sequence::from_fn(move || {
            if let Some(out) = output.as_mut() {
                return out.next();
            }
            let items = try_ready!(source.try_drain());
            let f = f.take().ok_or_else(|| Error::internal("map_all continuation called twice"))?;
            output.insert(f(items)?).next()
        })
    }

    /// Transform every item.
    pub fn map(self, mut f: impl FnMut(Value<N>) -> Result<Value<N>, Error> + 'static) -> Sequence<N> {
        let mut source = self;
        Sequence::from_fn(move || match source.next()? {
            Step::Item(v) => f(v).map(Step::Item),
            other => Ok(other),
        })
    }

    /// Atomize every item. Array members are atomized one by one.
    pub fn atomize(self, params: &ExecutionParameters<N>) -> Sequence<N> {
        let params = params.clone();
        let mut sources: Vec<Sequence<N>> = vec![self];
        let mut current: Option<ItemAtomizer<N>> = None;
        Sequence::from_fn(move || {
            loop {
                if let Some(atomizer) = current.as_mut() {
                    let value = try_ready!(atomizer.resume());
                    current = None;
                    return Ok(Step::Item(Value::Atomic(value)));
                }
                let Some(top) = sources.last_mut() else {
                    return Ok(Step::Done);
                };
                match top.next()? {
                    Step::Done => {
                        sources.pop();
                    }
                    Step::Pending(a) => return Ok(Step::Pending(a)),
                    Step::Item(Value::Array(array)) => {
                        sources.push(Sequence::concat(array.members().iter().map(SharedSequence::reader).collect()));
                    }
                    Step::Item(item) => current = Some(atomize_item(&item, &params)?),
                }
            }
        })
    }
}

impl<N> fmt::Debug for Sequence<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence").field("buffered", &self.buffer).field("done", &self.done).finish()
    }
}

/// Effective boolean value of a single item.
pub fn effective_boolean_value<N: XdmNode>(item: &Value<N>) -> Result<bool, Error> {
    match item {
        Value::Node(_) => Ok(true),
        Value::Atomic(a) => match a.value() {
            Scalar::Boolean(b) => Ok(*b),
            Scalar::String(s)
                if a.is_instance_of("xs:string")
                    || a.is_instance_of("xs:untypedAtomic")
                    || a.is_instance_of("xs:anyURI") =>
            {
                Ok(!s.is_empty())
            }
            Scalar::Integer(i) => Ok(*i != 0),
            Scalar::Decimal(d) => Ok(!d.is_zero()),
            Scalar::Double(d) => Ok(*d != 0.0 && !d.is_nan()),
            Scalar::Float(f) => Ok(*f != 0.0 && !f.is_nan()),
            _ => Err(ebv_undefined(a.type_name().as_str())),
        },
        other => Err(ebv_undefined(other.type_name().as_str())),
    }
}

/// Effective boolean value of a fully materialized sequence.
pub fn effective_boolean_value_of<N: XdmNode>(items: &[Value<N>]) -> Result<bool, Error> {
    match items {
        [] => Ok(false),
        [Value::Node(_), ..] => Ok(true),
        [single] => effective_boolean_value(single),
        _ => Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a sequence of two or more items starting with a non-node",
        )),
    }
}

fn ebv_undefined(type_name: &str) -> Error {
    Error::from_code(ErrorCode::FORG0006, format!("effective boolean value is not defined for {type_name}"))
}

// ===== Shared, memoizing sequences =====

struct SharedState<N> {
    source: Option<Sequence<N>>,
    items: Vec<Value<N>>,
    error: Option<Error>,
}

/// A sequence that can be read any number of times. Items are pulled from the
/// underlying sequence once and remembered.
pub struct SharedSequence<N> {
    state: Rc<RefCell<SharedState<N>>>,
}

impl<N> Clone for SharedSequence<N> {
    fn clone(&self) -> Self {
        Self { state: Rc::clone(&self.state) }
    }
}

impl<N: XdmNode> SharedSequence<N> {
    pub fn new(source: Sequence<N>) -> Self {
        Self { state: Rc::new(RefCell::new(SharedState { source: Some(source), items: Vec::new(), error: None })) }
    }

    pub fn from_vec(items: Vec<Value<N>>) -> Self {
        Self { state: Rc::new(RefCell::new(SharedState { source: None, items, error: None })) }
    }

    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    /// A fresh reader starting at the first item.
    pub fn reader(&self) -> Sequence<N> {
        let shared = self.clone();
        let mut index = 0;
        Sequence::from_fn(move || match shared.fetch(index)? {
            Fetch::Ready(Some(v)) => {
                index += 1;
                Ok(Step::Item(v))
            }
            Fetch::Ready(None) => Ok(Step::Done),
            Fetch::Pending(a) => Ok(Step::Pending(a)),
        })
    }

    /// Item at `index`, pulling from the source when not yet resolved.
    pub fn fetch(&self, index: usize) -> Result<Fetch<Option<Value<N>>>, Error> {
        loop {
            let mut source = {
                let mut st = self.state.borrow_mut();
                if let Some(v) = st.items.get(index) {
                    return Ok(Fetch::Ready(Some(v.clone())));
                }
                if let Some(e) = &st.error {
                    return Err(e.clone());
                }
                match st.source.take() {
                    Some(s) => s,
                    None => return Ok(Fetch::Ready(None)),
                }
            };
            let step = source.next();
            let mut st = self.state.borrow_mut();
            match step {
                Ok(Step::Item(v)) => {
                    st.items.push(v);
                    st.source = Some(source);
                }
                Ok(Step::Pending(a)) => {
                    st.source = Some(source);
                    return Ok(Fetch::Pending(a));
                }
                Ok(Step::Done) => return Ok(Fetch::Ready(None)),
                Err(e) => {
                    st.error = Some(e.clone());
                    return Err(e);
                }
            }
        }
    }

    /// All items, resolving the rest of the source if needed.
    pub fn try_items(&self) -> Result<Fetch<Vec<Value<N>>>, Error> {
        let mut index = self.state.borrow().items.len();
        loop {
            match self.fetch(index)? {
                Fetch::Ready(Some(_)) => index += 1,
                Fetch::Ready(None) => return Ok(Fetch::Ready(self.state.borrow().items.clone())),
                Fetch::Pending(a) => return Ok(Fetch::Pending(a)),
            }
        }
    }

    /// Length, if the source has been fully resolved.
    pub fn known_len(&self) -> Option<usize> {
        let st = self.state.borrow();
        st.source.is_none().then_some(st.items.len())
    }
}

impl<N> fmt::Debug for SharedSequence<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(st) => f
                .debug_struct("SharedSequence")
                .field("items", &st.items)
                .field("complete", &st.source.is_none())
                .finish(),
            Err(_) => f.write_str("SharedSequence(<busy>)"),
        }
    }
}
