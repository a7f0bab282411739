//! The iteration protocol shared by every sequence and composition cursor.
//!
//! A producer advances with [`Cursor::advance`] and answers with one of three
//! states: a value is ready, the producer is finished, or the producer must
//! suspend until an external computation completes. Suspension is cooperative
//! and single-threaded: the caller runs the attached [`PendingHandle`] to
//! completion and retries the advance, which then yields the value the
//! suspended attempt was working on — never a skipped or duplicated one.

use std::cell::Cell;
use std::rc::Rc;

use crate::engine::runtime::Error;

/// Advisory directive passed into an advance. Producers that ignore hints
/// stay correct, only less efficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationHint {
    #[default]
    None,
    /// The caller is not interested in descendants of the value just
    /// produced; a subtree-walking producer may skip straight to the next
    /// non-descendant candidate.
    SkipDescendants,
}

/// An external computation a producer is waiting on. Running it to completion
/// makes the next retry of the suspended advance succeed.
pub trait PendingComputation {
    fn run_to_completion(&self) -> Result<(), Error>;
}

pub type PendingHandle = Rc<dyn PendingComputation>;

/// Stock [`PendingComputation`]: a completion flag. Node-construction
/// adapters hand the signal to the engine and flip it when their work is done.
#[derive(Debug, Default)]
pub struct Signal {
    complete: Cell<bool>,
}

impl Signal {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn is_complete(&self) -> bool {
        self.complete.get()
    }

    pub fn complete(&self) {
        self.complete.set(true);
    }
}

impl PendingComputation for Signal {
    fn run_to_completion(&self) -> Result<(), Error> {
        self.complete.set(true);
        Ok(())
    }
}

/// Tri-state outcome of advancing a cursor.
pub enum IterationResult<T> {
    /// No more values; every later advance must return `Done` again.
    Done,
    Ready(T),
    /// The producer suspended. Run the handle to completion, then retry.
    Pending(PendingHandle),
}

impl<T> IterationResult<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, IterationResult::Done)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IterationResult<U> {
        match self {
            IterationResult::Done => IterationResult::Done,
            IterationResult::Ready(v) => IterationResult::Ready(f(v)),
            IterationResult::Pending(p) => IterationResult::Pending(p),
        }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for IterationResult<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IterationResult::Done => write!(f, "Done"),
            IterationResult::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            IterationResult::Pending(_) => write!(f, "Pending(..)"),
        }
    }
}

/// Outcome of a non-destructive query (a peek) that may need to suspend.
/// Unlike [`IterationResult`] there is no terminal state: a query always has
/// an answer once its producer stops suspending.
pub enum Poll<T> {
    Ready(T),
    Pending(PendingHandle),
}

impl<T> Poll<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Poll<U> {
        match self {
            Poll::Ready(v) => Poll::Ready(f(v)),
            Poll::Pending(p) => Poll::Pending(p),
        }
    }

    /// Unwraps a ready value; panics on `Pending`. Intended for callers that
    /// know their producers never suspend (tests, fully materialized input).
    #[track_caller]
    pub fn expect_ready(self, msg: &str) -> T {
        match self {
            Poll::Ready(v) => v,
            Poll::Pending(_) => panic!("{msg}"),
        }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Poll<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Poll::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            Poll::Pending(_) => write!(f, "Pending(..)"),
        }
    }
}

/// A single-pass producer of values under the suspension contract.
pub trait Cursor<T> {
    /// Produce the next value. Once `Done` has been returned, all subsequent
    /// advances return `Done`. A `Pending` result must be retried after the
    /// handle completes; the retry yields exactly the value the suspended
    /// attempt would have produced. The hint applies to this advance only —
    /// a composition layer forwards it to at most one underlying advance.
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<T>, Error>;

    fn next(&mut self) -> Result<IterationResult<T>, Error> {
        self.advance(IterationHint::None)
    }
}

impl<T> Cursor<T> for Box<dyn Cursor<T>> {
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<T>, Error> {
        (**self).advance(hint)
    }
}

/// Cursor over an owned vector of values.
pub struct VecCursor<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> VecCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T> Cursor<T> for VecCursor<T> {
    fn advance(&mut self, _hint: IterationHint) -> Result<IterationResult<T>, Error> {
        Ok(match self.items.next() {
            Some(v) => IterationResult::Ready(v),
            None => IterationResult::Done,
        })
    }
}

/// Cursor backed by a closure. The closure sees the hint of each advance and
/// owns whatever resumption state it needs.
pub struct FnCursor<T, F> {
    f: F,
    done: bool,
    _marker: core::marker::PhantomData<fn() -> T>,
}

impl<T, F> FnCursor<T, F>
where
    F: FnMut(IterationHint) -> Result<IterationResult<T>, Error>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            done: false,
            _marker: core::marker::PhantomData,
        }
    }
}

impl<T, F> Cursor<T> for FnCursor<T, F>
where
    F: FnMut(IterationHint) -> Result<IterationResult<T>, Error>,
{
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<T>, Error> {
        if self.done {
            return Ok(IterationResult::Done);
        }
        let result = (self.f)(hint)?;
        if result.is_done() {
            self.done = true;
        }
        Ok(result)
    }
}

/// Shorthand for boxing a closure-backed cursor.
pub fn cursor_from_fn<T, F>(f: F) -> Box<dyn Cursor<T>>
where
    T: 'static,
    F: FnMut(IterationHint) -> Result<IterationResult<T>, Error> + 'static,
{
    Box::new(FnCursor::new(f))
}
