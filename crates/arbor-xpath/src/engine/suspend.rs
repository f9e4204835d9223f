//! Cooperative suspension primitives.
//!
//! A computation that needs an answer the host cannot give right away returns
//! [`Fetch::Pending`] with an [`Awaitable`]. The caller waits on it and calls
//! the computation again; state kept inside the computation guarantees that
//! no work is repeated and nothing is skipped.

use crate::engine::runtime::Error;
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A single-threaded future the caller must complete before retrying.
pub struct Awaitable {
    inner: LocalBoxFuture<'static, ()>,
}

impl Awaitable {
    pub fn new(fut: impl Future<Output = ()> + 'static) -> Self {
        Self { inner: fut.boxed_local() }
    }

    /// Already completed.
    pub fn ready() -> Self {
        Self::new(future::ready(()))
    }

    /// Completes once every awaitable has completed.
    pub fn all(items: impl IntoIterator<Item = Awaitable>) -> Self {
        let items: Vec<Awaitable> = items.into_iter().collect();
        Self::new(future::join_all(items).map(|_| ()))
    }
}

impl Future for Awaitable {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Awaitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Awaitable")
    }
}

/// Result of one attempt at a resumable computation.
#[derive(Debug)]
pub enum Fetch<T> {
    Ready(T),
    Pending(Awaitable),
}

impl<T> Fetch<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Fetch::Ready(v) => Fetch::Ready(f(v)),
            Fetch::Pending(a) => Fetch::Pending(a),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Fetch::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Fetch::Ready(v) => Some(v),
            Fetch::Pending(_) => None,
        }
    }
}

impl<T> From<Awaitable> for Fetch<T> {
    fn from(a: Awaitable) -> Self {
        Fetch::Pending(a)
    }
}

/// Unwraps `Fetch::Ready` or returns the pending awaitable from the enclosing
/// function, converted into its return type.
macro_rules! try_ready {
    ($e:expr) => {
        match $e? {
            $crate::engine::suspend::Fetch::Ready(v) => v,
            $crate::engine::suspend::Fetch::Pending(a) => return Ok(a.into()),
        }
    };
}
pub(crate) use try_ready;

/// A state machine that can be resumed after a suspension.
pub trait Resumable {
    type Output;

    fn resume(&mut self) -> Result<Fetch<Self::Output>, Error>;
}

pub type BoxResumable<T> = Box<dyn Resumable<Output = T>>;

impl<T> Resumable for BoxResumable<T> {
    type Output = T;

    fn resume(&mut self) -> Result<Fetch<T>, Error> {
        (**self).resume()
    }
}

/// A resumable that is already finished.
pub struct Resolved<T>(Option<T>);

impl<T> Resolved<T> {
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }
}

impl<T> Resumable for Resolved<T> {
    type Output = T;

    fn resume(&mut self) -> Result<Fetch<T>, Error> {
        self.0
            .take()
            .map(Fetch::Ready)
            .ok_or_else(|| Error::internal("resolved value taken twice"))
    }
}

/// Adapts a closure into a [`Resumable`]. The closure owns its state.
pub struct ResumeFn<F>(pub F);

impl<T, F: FnMut() -> Result<Fetch<T>, Error>> Resumable for ResumeFn<F> {
    type Output = T;

    fn resume(&mut self) -> Result<Fetch<T>, Error> {
        (self.0)()
    }
}

/// All sub-computations must yield `true`.
///
/// Sub-computations are created lazily, left to right; the first `false`
/// short-circuits and a pending sub-computation is kept for the next resume.
pub struct Every<F> {
    len: usize,
    index: usize,
    current: Option<BoxResumable<bool>>,
    make: F,
}

impl<F> Every<F>
where
    F: FnMut(usize) -> Result<BoxResumable<bool>, Error>,
{
    pub fn new(len: usize, make: F) -> Self {
        Self { len, index: 0, current: None, make }
    }
}

impl<F> Resumable for Every<F>
where
    F: FnMut(usize) -> Result<BoxResumable<bool>, Error>,
{
    type Output = bool;

    fn resume(&mut self) -> Result<Fetch<bool>, Error> {
        while self.index < self.len {
            let current = match &mut self.current {
                Some(c) => c,
                slot @ None => slot.insert((self.make)(self.index)?),
            };
            let verdict = try_ready!(current.resume());
            self.current = None;
            if !verdict {
                self.index = self.len;
                return Ok(Fetch::Ready(false));
            }
            self.index += 1;
        }
        Ok(Fetch::Ready(true))
    }
}

/// Drive a resumable to completion, awaiting every suspension.
pub async fn drive<R: Resumable>(mut r: R) -> Result<R::Output, Error> {
    loop {
        match r.resume()? {
            Fetch::Ready(v) => return Ok(v),
            Fetch::Pending(a) => a.await,
        }
    }
}
