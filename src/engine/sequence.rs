//! The four lazy sequence variants behind one factory.
//!
//! A sequence is a single-pass, ordered collection of items. The empty,
//! singleton and array-backed variants hold their values outright; the
//! iterator-backed variant wraps a [`Cursor`] and shares its state (cursor
//! position, lookahead buffer, materialization cache) between clones through
//! an `Rc<RefCell<..>>`, mirroring how the evaluator VM shares streams.
//!
//! Peeking (`first`, `is_empty`, `is_singleton`, the effective boolean value)
//! never consumes: the iterator-backed variant caches at most two produced
//! values in a fixed lookahead buffer and serves them to the eventual
//! consumer in order. Suspension from the underlying producer propagates
//! unchanged through every query and transformation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::engine::runtime::{Error, ErrorCode};
use crate::iteration::{Cursor, IterationHint, IterationResult, Poll};
use crate::xdm::{XdmAtomicValue, XdmItem};

/// What a producer guarantees about document order of its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrder {
    Sorted,
    ReverseSorted,
    Unsorted,
}

/// Cardinality class of a sequence, determined lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Empty,
    Singleton,
    Multiple,
}

struct IterState<N> {
    cursor: Box<dyn Cursor<XdmItem<N>>>,
    /// Values pulled ahead by peeks, not yet handed to the consumer.
    lookahead: SmallVec<[XdmItem<N>; 2]>,
    /// Partial drain buffer while `materialize` is suspended.
    drain: Vec<XdmItem<N>>,
    exhausted: bool,
    consumed: usize,
    materialized: Option<Rc<[XdmItem<N>]>>,
    predicted_len: Option<usize>,
}

impl<N: Clone> IterState<N> {
    /// Pull values into the lookahead buffer without consuming them. Returns
    /// how many are available (may be less than requested at end of input).
    fn ensure_lookahead(&mut self, wanted: usize) -> Result<Poll<usize>, Error> {
        debug_assert!(wanted <= 2, "lookahead buffer holds at most two values");
        if let Some(m) = &self.materialized {
            return Ok(Poll::Ready(m.len().saturating_sub(self.consumed).min(wanted)));
        }
        while self.lookahead.len() < wanted && !self.exhausted {
            match self.cursor.next()? {
                IterationResult::Done => self.exhausted = true,
                IterationResult::Ready(v) => self.lookahead.push(v),
                IterationResult::Pending(p) => return Ok(Poll::Pending(p)),
            }
        }
        Ok(Poll::Ready(self.lookahead.len()))
    }

    fn peek(&self, index: usize) -> Option<XdmItem<N>> {
        if let Some(m) = &self.materialized {
            return m.get(self.consumed + index).cloned();
        }
        self.lookahead.get(index).cloned()
    }
}

enum SequenceKind<N> {
    Empty,
    Singleton {
        item: XdmItem<N>,
        ebv: Cell<Option<bool>>,
    },
    Array {
        items: Rc<[XdmItem<N>]>,
        order: ResultOrder,
    },
    Iter {
        state: Rc<RefCell<IterState<N>>>,
        order: ResultOrder,
    },
}

/// A lazy, single-pass, replayable-once-materialized sequence of items.
pub struct Sequence<N> {
    kind: SequenceKind<N>,
}

impl<N: std::fmt::Debug> std::fmt::Debug for Sequence<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SequenceKind::Empty => f.write_str("Sequence::Empty"),
            SequenceKind::Singleton { item, .. } => {
                f.debug_tuple("Sequence::Singleton").field(item).finish()
            }
            SequenceKind::Array { items, order } => f
                .debug_struct("Sequence::Array")
                .field("items", items)
                .field("order", order)
                .finish(),
            SequenceKind::Iter { order, .. } => f
                .debug_struct("Sequence::Iter")
                .field("order", order)
                .finish_non_exhaustive(),
        }
    }
}

impl<N> Clone for Sequence<N>
where
    N: Clone,
{
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            SequenceKind::Empty => SequenceKind::Empty,
            SequenceKind::Singleton { item, ebv } => SequenceKind::Singleton {
                item: item.clone(),
                ebv: ebv.clone(),
            },
            SequenceKind::Array { items, order } => SequenceKind::Array {
                items: items.clone(),
                order: *order,
            },
            SequenceKind::Iter { state, order } => SequenceKind::Iter {
                state: state.clone(),
                order: *order,
            },
        };
        Self { kind }
    }
}

impl<N: Clone + 'static> Sequence<N> {
    pub fn empty() -> Self {
        Self {
            kind: SequenceKind::Empty,
        }
    }

    pub fn singleton(item: impl Into<XdmItem<N>>) -> Self {
        Self {
            kind: SequenceKind::Singleton {
                item: item.into(),
                ebv: Cell::new(None),
            },
        }
    }

    /// Factory over a fully materialized list; collapses to the cheaper
    /// variants for zero or one value. Producers handing over arrays in this
    /// core always hold them in document order, hence the `Sorted` default.
    pub fn from_vec(items: Vec<XdmItem<N>>) -> Self {
        Self::from_vec_with_order(items, ResultOrder::Sorted)
    }

    pub fn from_vec_with_order(mut items: Vec<XdmItem<N>>, order: ResultOrder) -> Self {
        match items.len() {
            0 => Self::empty(),
            1 => Self::singleton(items.remove(0)),
            _ => Self {
                kind: SequenceKind::Array {
                    items: Rc::from(items),
                    order,
                },
            },
        }
    }

    /// Factory over a lazy producer. `predicted_len`, when known ahead of
    /// time, lets cardinality queries answer without driving the cursor.
    pub fn from_cursor(
        cursor: Box<dyn Cursor<XdmItem<N>>>,
        order: ResultOrder,
        predicted_len: Option<usize>,
    ) -> Self {
        Self {
            kind: SequenceKind::Iter {
                state: Rc::new(RefCell::new(IterState {
                    cursor,
                    lookahead: SmallVec::new(),
                    drain: Vec::new(),
                    exhausted: false,
                    consumed: 0,
                    materialized: None,
                    predicted_len,
                })),
                order,
            },
        }
    }

    /// Replace the producer-order claim without touching the values. The
    /// caller vouches that the claim holds.
    pub fn with_result_order(self, order: ResultOrder) -> Sequence<N> {
        let kind = match self.kind {
            SequenceKind::Array { items, .. } => SequenceKind::Array { items, order },
            SequenceKind::Iter { state, .. } => SequenceKind::Iter { state, order },
            other => other,
        };
        Self { kind }
    }

    pub fn result_order(&self) -> ResultOrder {
        match &self.kind {
            SequenceKind::Empty | SequenceKind::Singleton { .. } => ResultOrder::Sorted,
            SequenceKind::Array { order, .. } | SequenceKind::Iter { order, .. } => *order,
        }
    }

    /// Length when it is known without driving a producer.
    pub fn len_hint(&self) -> Option<usize> {
        match &self.kind {
            SequenceKind::Empty => Some(0),
            SequenceKind::Singleton { .. } => Some(1),
            SequenceKind::Array { items, .. } => Some(items.len()),
            SequenceKind::Iter { state, .. } => {
                let s = state.borrow();
                if let Some(m) = &s.materialized {
                    return Some(m.len());
                }
                s.predicted_len
            }
        }
    }

    /// The first remaining item, without consuming it.
    pub fn first(&self) -> Result<Poll<Option<XdmItem<N>>>, Error> {
        match &self.kind {
            SequenceKind::Empty => Ok(Poll::Ready(None)),
            SequenceKind::Singleton { item, .. } => Ok(Poll::Ready(Some(item.clone()))),
            SequenceKind::Array { items, .. } => Ok(Poll::Ready(items.first().cloned())),
            SequenceKind::Iter { state, .. } => {
                let mut s = state.borrow_mut();
                Ok(match s.ensure_lookahead(1)? {
                    Poll::Pending(p) => Poll::Pending(p),
                    Poll::Ready(avail) => Poll::Ready(if avail >= 1 { s.peek(0) } else { None }),
                })
            }
        }
    }

    pub fn is_empty(&self) -> Result<Poll<bool>, Error> {
        if let Some(len) = self.len_hint() {
            return Ok(Poll::Ready(len == 0));
        }
        Ok(self.first()?.map(|first| first.is_none()))
    }

    pub fn is_singleton(&self) -> Result<Poll<bool>, Error> {
        if let Some(len) = self.len_hint() {
            return Ok(Poll::Ready(len == 1));
        }
        Ok(self.cardinality()?.map(|c| c == Cardinality::Singleton))
    }

    pub fn cardinality(&self) -> Result<Poll<Cardinality>, Error> {
        if let Some(len) = self.len_hint() {
            return Ok(Poll::Ready(match len {
                0 => Cardinality::Empty,
                1 => Cardinality::Singleton,
                _ => Cardinality::Multiple,
            }));
        }
        let SequenceKind::Iter { state, .. } = &self.kind else {
            unreachable!("non-iterator sequences always know their length");
        };
        let mut s = state.borrow_mut();
        Ok(match s.ensure_lookahead(2)? {
            Poll::Pending(p) => Poll::Pending(p),
            Poll::Ready(0) => Poll::Ready(Cardinality::Empty),
            Poll::Ready(1) => Poll::Ready(Cardinality::Singleton),
            Poll::Ready(_) => Poll::Ready(Cardinality::Multiple),
        })
    }

    /// Number of remaining items; drains an iterator-backed sequence unless
    /// the length was predicted up front.
    pub fn len(&self) -> Result<Poll<usize>, Error> {
        if let Some(len) = self.len_hint() {
            return Ok(Poll::Ready(len));
        }
        Ok(self.materialize()?.map(|items| items.len()))
    }

    /// The XPath effective-boolean-value coercion.
    ///
    /// Empty is false; a leading node makes the whole sequence true without
    /// inspecting anything further; a singleton atomic contributes its own
    /// truthiness; two or more items with a non-node first is a FORG0006
    /// cardinality error. The iterator-backed variant answers by peeking at
    /// most two items.
    pub fn effective_boolean_value(&self) -> Result<Poll<bool>, Error> {
        match &self.kind {
            SequenceKind::Empty => Ok(Poll::Ready(false)),
            SequenceKind::Singleton { item, ebv } => {
                if let Some(cached) = ebv.get() {
                    return Ok(Poll::Ready(cached));
                }
                let value = item_truthiness(item)?;
                ebv.set(Some(value));
                Ok(Poll::Ready(value))
            }
            SequenceKind::Array { items, .. } => {
                Ok(Poll::Ready(ebv_of_slice(items.first(), items.len())?))
            }
            SequenceKind::Iter { state, .. } => {
                let mut s = state.borrow_mut();
                // A leading node answers true on its own; only reach for a
                // second value when the first is atomic.
                match s.ensure_lookahead(1)? {
                    Poll::Pending(p) => return Ok(Poll::Pending(p)),
                    Poll::Ready(0) => return Ok(Poll::Ready(false)),
                    Poll::Ready(_) => {}
                }
                if matches!(s.peek(0), Some(XdmItem::Node(_))) {
                    return Ok(Poll::Ready(true));
                }
                match s.ensure_lookahead(2)? {
                    Poll::Pending(p) => Ok(Poll::Pending(p)),
                    Poll::Ready(avail) => {
                        let first = s.peek(0);
                        Ok(Poll::Ready(ebv_of_slice(first.as_ref(), avail)?))
                    }
                }
            }
        }
    }

    /// Drains the producer exactly once and returns the shared, cached value
    /// list; idempotent thereafter, and cursors created afterwards replay
    /// from the cache. Refused once the sequence has been partially consumed,
    /// since the values already handed out cannot be recovered.
    pub fn materialize(&self) -> Result<Poll<Rc<[XdmItem<N>]>>, Error> {
        match &self.kind {
            SequenceKind::Empty => Ok(Poll::Ready(Rc::from(Vec::new()))),
            SequenceKind::Singleton { item, .. } => Ok(Poll::Ready(Rc::from(vec![item.clone()]))),
            SequenceKind::Array { items, .. } => Ok(Poll::Ready(items.clone())),
            SequenceKind::Iter { state, .. } => {
                let mut s = state.borrow_mut();
                if let Some(m) = &s.materialized {
                    return Ok(Poll::Ready(m.clone()));
                }
                if s.consumed > 0 {
                    return Err(Error::from_code(
                        ErrorCode::FOER0000,
                        "cannot materialize a partially consumed sequence",
                    ));
                }
                // The lookahead values are the head of the stream.
                let head: SmallVec<[XdmItem<N>; 2]> = std::mem::take(&mut s.lookahead);
                s.drain.extend(head);
                loop {
                    match s.cursor.next()? {
                        IterationResult::Done => {
                            s.exhausted = true;
                            let items: Rc<[XdmItem<N>]> = Rc::from(std::mem::take(&mut s.drain));
                            s.materialized = Some(items.clone());
                            return Ok(Poll::Ready(items));
                        }
                        IterationResult::Ready(v) => s.drain.push(v),
                        IterationResult::Pending(p) => return Ok(Poll::Pending(p)),
                    }
                }
            }
        }
    }

    /// The single-pass iterator view. For the iterator-backed variant all
    /// cursors share one consumption position until the sequence is
    /// materialized, after which each cursor replays the cache independently.
    pub fn cursor(&self) -> SequenceCursor<N> {
        let source = match &self.kind {
            SequenceKind::Empty => CursorSource::Done,
            SequenceKind::Singleton { item, .. } => CursorSource::Singleton(Some(item.clone())),
            SequenceKind::Array { items, .. } => CursorSource::Array {
                items: items.clone(),
                pos: 0,
            },
            SequenceKind::Iter { state, .. } => CursorSource::Iter {
                state: state.clone(),
                replay_pos: 0,
            },
        };
        SequenceCursor { source }
    }

    /// Lazy per-item transformation; length and order tags carry over.
    pub fn map<F>(&self, mut f: F) -> Sequence<N>
    where
        F: FnMut(XdmItem<N>) -> Result<XdmItem<N>, Error> + 'static,
    {
        if matches!(self.kind, SequenceKind::Empty) {
            return Sequence::empty();
        }
        let predicted = self.len_hint();
        let order = self.result_order();
        let mut input = self.cursor();
        Sequence::from_cursor(
            crate::iteration::cursor_from_fn(move |hint| {
                Ok(match input.advance(hint)? {
                    IterationResult::Done => IterationResult::Done,
                    IterationResult::Ready(v) => IterationResult::Ready(f(v)?),
                    IterationResult::Pending(p) => IterationResult::Pending(p),
                })
            }),
            order,
            predicted,
        )
    }

    /// Lazy filtering; the predicate sees the zero-based input position.
    pub fn filter<F>(&self, mut f: F) -> Sequence<N>
    where
        F: FnMut(usize, &XdmItem<N>) -> Result<bool, Error> + 'static,
    {
        match &self.kind {
            SequenceKind::Empty => Sequence::empty(),
            SequenceKind::Singleton { item, .. } => {
                // Degenerates to self or empty with a single predicate call,
                // taken lazily so predicate errors surface on iteration.
                let item = item.clone();
                let mut decided = false;
                Sequence::from_cursor(
                    crate::iteration::cursor_from_fn(move |_hint| {
                        if decided {
                            return Ok(IterationResult::Done);
                        }
                        decided = true;
                        Ok(if f(0, &item)? {
                            IterationResult::Ready(item.clone())
                        } else {
                            IterationResult::Done
                        })
                    }),
                    ResultOrder::Sorted,
                    None,
                )
            }
            _ => {
                let order = self.result_order();
                let mut input = self.cursor();
                let mut pos = 0usize;
                Sequence::from_cursor(
                    crate::iteration::cursor_from_fn(move |hint| {
                        // The hint belongs to the first underlying advance of
                        // this call only.
                        let mut hint = hint;
                        loop {
                            match input.advance(std::mem::take(&mut hint))? {
                                IterationResult::Done => return Ok(IterationResult::Done),
                                IterationResult::Pending(p) => {
                                    return Ok(IterationResult::Pending(p));
                                }
                                IterationResult::Ready(v) => {
                                    let i = pos;
                                    pos += 1;
                                    if f(i, &v)? {
                                        return Ok(IterationResult::Ready(v));
                                    }
                                }
                            }
                        }
                    }),
                    order,
                    None,
                )
            }
        }
    }

    /// The designated laziness breaker: materializes the input, hands the
    /// full value list to `f` and streams whatever sequence `f` builds.
    pub fn map_all<F>(&self, f: F) -> Sequence<N>
    where
        F: FnOnce(Vec<XdmItem<N>>) -> Result<Sequence<N>, Error> + 'static,
    {
        let input = self.clone();
        let mut f = Some(f);
        let mut output: Option<SequenceCursor<N>> = None;
        Sequence::from_cursor(
            crate::iteration::cursor_from_fn(move |hint| {
                if output.is_none() {
                    let items = match input.materialize()? {
                        Poll::Pending(p) => return Ok(IterationResult::Pending(p)),
                        Poll::Ready(items) => items,
                    };
                    let f = f.take().ok_or_else(|| {
                        Error::from_code(ErrorCode::FOER0000, "map_all callback consumed twice")
                    })?;
                    output = Some(f(items.to_vec())?.cursor());
                }
                output
                    .as_mut()
                    .map(|c| c.advance(hint))
                    .unwrap_or(Ok(IterationResult::Done))
            }),
            ResultOrder::Unsorted,
            None,
        )
    }

    /// Cardinality-based dispatch. The decision is deferred to the first
    /// advance for iterator-backed input so that probing two items can
    /// propagate suspension instead of blocking.
    pub fn switch_cases(&self, cases: SequenceCases<N>) -> Sequence<N> {
        match self.cardinality() {
            Ok(Poll::Ready(card)) => cases.dispatch(card, self.clone()),
            // Suspended or failing probe: defer both to iteration time.
            _ => {
                let input = self.clone();
                let mut cases = Some(cases);
                let mut chosen: Option<SequenceCursor<N>> = None;
                Sequence::from_cursor(
                    crate::iteration::cursor_from_fn(move |hint| {
                        if chosen.is_none() {
                            let card = match input.cardinality()? {
                                Poll::Pending(p) => return Ok(IterationResult::Pending(p)),
                                Poll::Ready(card) => card,
                            };
                            let cases = cases.take().ok_or_else(|| {
                                Error::from_code(ErrorCode::FOER0000, "switch_cases dispatched twice")
                            })?;
                            chosen = Some(cases.dispatch(card, input.clone()).cursor());
                        }
                        chosen
                            .as_mut()
                            .map(|c| c.advance(hint))
                            .unwrap_or(Ok(IterationResult::Done))
                    }),
                    ResultOrder::Unsorted,
                    None,
                )
            }
        }
    }
}

/// Case table for [`Sequence::switch_cases`]. Unset arms fall back to
/// `default`.
pub struct SequenceCases<N> {
    pub empty: Option<CaseFn<N>>,
    pub singleton: Option<CaseFn<N>>,
    pub multiple: Option<CaseFn<N>>,
    pub default: CaseFn<N>,
}

pub type CaseFn<N> = Box<dyn FnOnce(Sequence<N>) -> Sequence<N>>;

impl<N: Clone + 'static> SequenceCases<N> {
    pub fn with_default(default: impl FnOnce(Sequence<N>) -> Sequence<N> + 'static) -> Self {
        Self {
            empty: None,
            singleton: None,
            multiple: None,
            default: Box::new(default),
        }
    }

    pub fn on_empty(mut self, f: impl FnOnce(Sequence<N>) -> Sequence<N> + 'static) -> Self {
        self.empty = Some(Box::new(f));
        self
    }

    pub fn on_singleton(mut self, f: impl FnOnce(Sequence<N>) -> Sequence<N> + 'static) -> Self {
        self.singleton = Some(Box::new(f));
        self
    }

    pub fn on_multiple(mut self, f: impl FnOnce(Sequence<N>) -> Sequence<N> + 'static) -> Self {
        self.multiple = Some(Box::new(f));
        self
    }

    fn dispatch(self, card: Cardinality, seq: Sequence<N>) -> Sequence<N> {
        let arm = match card {
            Cardinality::Empty => self.empty,
            Cardinality::Singleton => self.singleton,
            Cardinality::Multiple => self.multiple,
        };
        match arm {
            Some(f) => f(seq),
            None => (self.default)(seq),
        }
    }
}

enum CursorSource<N> {
    Done,
    Singleton(Option<XdmItem<N>>),
    Array {
        items: Rc<[XdmItem<N>]>,
        pos: usize,
    },
    Iter {
        state: Rc<RefCell<IterState<N>>>,
        replay_pos: usize,
    },
}

/// Iterator view over a [`Sequence`].
pub struct SequenceCursor<N> {
    source: CursorSource<N>,
}

impl<N: Clone + 'static> Cursor<XdmItem<N>> for SequenceCursor<N> {
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<XdmItem<N>>, Error> {
        match &mut self.source {
            CursorSource::Done => Ok(IterationResult::Done),
            CursorSource::Singleton(item) => Ok(match item.take() {
                Some(v) => IterationResult::Ready(v),
                None => IterationResult::Done,
            }),
            CursorSource::Array { items, pos } => Ok(match items.get(*pos) {
                Some(v) => {
                    *pos += 1;
                    IterationResult::Ready(v.clone())
                }
                None => IterationResult::Done,
            }),
            CursorSource::Iter { state, replay_pos } => {
                let mut s = state.borrow_mut();
                if let Some(m) = &s.materialized {
                    return Ok(match m.get(*replay_pos) {
                        Some(v) => {
                            *replay_pos += 1;
                            IterationResult::Ready(v.clone())
                        }
                        None => IterationResult::Done,
                    });
                }
                if !s.lookahead.is_empty() {
                    let v = s.lookahead.remove(0);
                    s.consumed += 1;
                    return Ok(IterationResult::Ready(v));
                }
                if s.exhausted {
                    return Ok(IterationResult::Done);
                }
                match s.cursor.advance(hint)? {
                    IterationResult::Done => {
                        s.exhausted = true;
                        Ok(IterationResult::Done)
                    }
                    IterationResult::Ready(v) => {
                        s.consumed += 1;
                        Ok(IterationResult::Ready(v))
                    }
                    IterationResult::Pending(p) => Ok(IterationResult::Pending(p)),
                }
            }
        }
    }
}

fn ebv_of_slice<N>(first: Option<&XdmItem<N>>, available: usize) -> Result<bool, Error> {
    match first {
        None => Ok(false),
        Some(XdmItem::Node(_)) => Ok(true),
        Some(item) if available == 1 => item_truthiness(item),
        Some(_) => Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value of a multi-item sequence not led by a node",
        )),
    }
}

fn item_truthiness<N>(item: &XdmItem<N>) -> Result<bool, Error> {
    use XdmAtomicValue::*;
    let atomic = match item {
        XdmItem::Node(_) => return Ok(true),
        XdmItem::Atomic(a) => a,
    };
    match atomic {
        Boolean(b) => Ok(*b),
        String(s) | AnyUri(s) | UntypedAtomic(s) => Ok(!s.is_empty()),
        Integer(i) => Ok(*i != 0),
        Decimal(d) | Double(d) => Ok(*d != 0.0 && !d.is_nan()),
        Float(f) => Ok(*f != 0.0 && !f.is_nan()),
        DateTime(_) | Date { .. } | Time { .. } => Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value undefined for date/time values",
        )),
    }
}
