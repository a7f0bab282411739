//! Path composition: combining per-context-item step results into one
//! document-ordered, duplicate-free sequence.
//!
//! Three strategies, picked per step from static step properties, the order
//! tag of the incoming context sequence, and whether every earlier step had
//! the peer property:
//!
//! - concatenation with adjacent duplicate removal, when the sub-sequences
//!   are already globally sorted end to end,
//! - a k-way merge over locally sorted sub-sequences, with global
//!   deduplication by the injected comparator,
//! - materialize-and-sort as a last resort for unsorted step output.

use std::cmp::Ordering;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::engine::runtime::{Error, ErrorCode};
use crate::engine::sequence::{ResultOrder, Sequence, SequenceCursor};
use crate::iteration::{Cursor, IterationHint, IterationResult};
use crate::model::{DocumentOrder, XdmNode};
use crate::xdm::XdmItem;

/// One step of a path expression: an evaluation function per context node
/// plus the static properties the composition strategy selection reads.
pub struct PathStep<N> {
    pub evaluate: Box<dyn Fn(&N) -> Result<Sequence<N>, Error>>,
    /// Results for one context node are never ancestors/descendants of
    /// results for a sibling context node.
    pub peer: bool,
    /// Every result lies within the subtree of its context node.
    pub subtree: bool,
    /// Order of each per-context-node sub-sequence.
    pub result_order: ResultOrder,
}

pub struct PathExpr<N> {
    steps: Vec<PathStep<N>>,
}

impl<N: XdmNode> PathExpr<N> {
    pub fn new(steps: Vec<PathStep<N>>) -> Self {
        Self { steps }
    }

    /// Apply the steps left to right over `input`. `require_sorted` controls
    /// whether the final step's output must come back in document order;
    /// intermediate steps are always re-ordered before the next step runs.
    pub fn evaluate(
        self,
        input: Sequence<N>,
        order: Rc<dyn DocumentOrder<N>>,
        require_sorted: bool,
    ) -> Result<Sequence<N>, Error> {
        let count = self.steps.len();
        let mut current = input;
        // Holds while every step so far had the peer property; a single
        // non-peer step can hand ancestor/descendant context pairs to all
        // later steps, whose sub-sequences then interleave.
        let mut peer_context = true;
        for (index, step) in self.steps.into_iter().enumerate() {
            let sorted_needed = require_sorted || index + 1 < count;
            let step_peer = step.peer;
            current = apply_step(current, step, order.clone(), sorted_needed, peer_context)?;
            peer_context = peer_context && step_peer;
        }
        Ok(current)
    }
}

fn apply_step<N: XdmNode>(
    input: Sequence<N>,
    step: PathStep<N>,
    order: Rc<dyn DocumentOrder<N>>,
    sorted_needed: bool,
    peer_context: bool,
) -> Result<Sequence<N>, Error> {
    let input_sorted = input.result_order() == ResultOrder::Sorted;
    let peer = step.peer;
    let subtree = step.subtree;
    let step_order = step.result_order;
    let subs = StepResultsCursor {
        context: input.cursor(),
        evaluate: step.evaluate,
    };

    if step_order == ResultOrder::Unsorted {
        if !sorted_needed {
            trace!("path step: unsorted output accepted, concatenating");
            return Ok(concat_step_output(Box::new(subs), ResultOrder::Unsorted));
        }
        debug!("path step: unsorted output, falling back to materialize-and-sort");
        let raw = concat_step_output(Box::new(subs), ResultOrder::Unsorted);
        let sort_order = order.clone();
        return Ok(raw
            .map_all(move |values| {
                let sorted = sort_node_values(sort_order.as_ref(), values)?;
                Ok(Sequence::from_vec_with_order(sorted, ResultOrder::Sorted))
            })
            .with_result_order(ResultOrder::Sorted));
    }

    if !sorted_needed {
        trace!("path step: sortedness not required, concatenating");
        return Ok(concat_step_output(Box::new(subs), ResultOrder::Unsorted));
    }

    if input_sorted && peer_context && peer && subtree && step_order == ResultOrder::Sorted {
        trace!("path step: concatenation strategy");
        return Ok(concat_sorted_sequences(Box::new(subs)));
    }

    trace!("path step: k-way merge strategy");
    Ok(merge_sorted_sequences(order, Box::new(subs)))
}

/// Maps context items to per-item step results. Non-node context items are
/// a type error before any combination work starts.
struct StepResultsCursor<N> {
    context: SequenceCursor<N>,
    evaluate: Box<dyn Fn(&N) -> Result<Sequence<N>, Error>>,
}

impl<N: XdmNode> Cursor<Sequence<N>> for StepResultsCursor<N> {
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<Sequence<N>>, Error> {
        match self.context.advance(hint)? {
            IterationResult::Done => Ok(IterationResult::Done),
            IterationResult::Pending(p) => Ok(IterationResult::Pending(p)),
            IterationResult::Ready(item) => {
                let XdmItem::Node(node) = &item else {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0019,
                        format!("path step applied to non-node item {item}"),
                    ));
                };
                let mut seq = (self.evaluate)(node)?;
                if seq.result_order() == ResultOrder::ReverseSorted {
                    seq = seq
                        .map_all(|mut items| {
                            items.reverse();
                            Ok(Sequence::from_vec_with_order(items, ResultOrder::Sorted))
                        })
                        .with_result_order(ResultOrder::Sorted);
                }
                Ok(IterationResult::Ready(seq))
            }
        }
    }
}

/// Concatenate sub-sequences with adjacent node-duplicate removal.
///
/// Input contract: the sub-sequences, in input order, are globally sorted,
/// so the only duplicates are shared boundary nodes between neighbours.
/// Callers that cannot guarantee this need [`merge_sorted_sequences`].
pub fn concat_sorted_sequences<N: XdmNode>(seqs: Box<dyn Cursor<Sequence<N>>>) -> Sequence<N> {
    concat_step_output(seqs, ResultOrder::Sorted)
}

fn concat_step_output<N: XdmNode>(
    seqs: Box<dyn Cursor<Sequence<N>>>,
    order: ResultOrder,
) -> Sequence<N> {
    let cursor = ConcatCursor {
        seqs: Some(seqs),
        current: None,
        last_node: None,
    };
    Sequence::from_cursor(Box::new(cursor), order, None)
}

struct ConcatCursor<N> {
    seqs: Option<Box<dyn Cursor<Sequence<N>>>>,
    current: Option<SequenceCursor<N>>,
    last_node: Option<N>,
}

impl<N: XdmNode> Cursor<XdmItem<N>> for ConcatCursor<N> {
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<XdmItem<N>>, Error> {
        let mut hint = hint;
        loop {
            if let Some(cur) = &mut self.current {
                match cur.advance(std::mem::take(&mut hint))? {
                    IterationResult::Pending(p) => return Ok(IterationResult::Pending(p)),
                    IterationResult::Done => {
                        self.current = None;
                        continue;
                    }
                    IterationResult::Ready(item) => {
                        if let XdmItem::Node(node) = &item {
                            if self.last_node.as_ref() == Some(node) {
                                continue;
                            }
                            self.last_node = Some(node.clone());
                        }
                        return Ok(IterationResult::Ready(item));
                    }
                }
            }
            let Some(seqs) = &mut self.seqs else {
                return Ok(IterationResult::Done);
            };
            match seqs.advance(IterationHint::None)? {
                IterationResult::Pending(p) => return Ok(IterationResult::Pending(p)),
                IterationResult::Done => {
                    self.seqs = None;
                    return Ok(IterationResult::Done);
                }
                IterationResult::Ready(seq) => {
                    self.current = Some(seq.cursor());
                }
            }
        }
    }
}

/// K-way merge of locally sorted sub-sequences into one document-ordered,
/// globally deduplicated node sequence.
///
/// A sub-sequence whose first item is atomic has no order requirement and is
/// passed through verbatim where it was encountered. A sub-sequence that
/// starts with a node must stay nodes-only.
pub fn merge_sorted_sequences<N: XdmNode>(
    order: Rc<dyn DocumentOrder<N>>,
    seqs: Box<dyn Cursor<Sequence<N>>>,
) -> Sequence<N> {
    let cursor = MergeCursor {
        order,
        seqs: Some(seqs),
        heads: SmallVec::new(),
        passthrough: None,
        pending: None,
        last_emitted: None,
    };
    Sequence::from_cursor(Box::new(cursor), ResultOrder::Sorted, None)
}

struct HeadEntry<N> {
    head: N,
    rest: SequenceCursor<N>,
}

struct MergeCursor<N> {
    order: Rc<dyn DocumentOrder<N>>,
    /// Remaining sub-sequences to collect; `None` once collection finished.
    seqs: Option<Box<dyn Cursor<Sequence<N>>>>,
    /// Active heads, sorted descending by document order (minimum last).
    heads: SmallVec<[HeadEntry<N>; 4]>,
    /// Atomic-first sub-sequence currently being drained verbatim.
    passthrough: Option<SequenceCursor<N>>,
    /// Cursor owing its next head; the bool marks a freshly collected
    /// sub-sequence whose first item has not been seen yet.
    pending: Option<(SequenceCursor<N>, bool)>,
    last_emitted: Option<N>,
}

impl<N: XdmNode> MergeCursor<N> {
    fn insert_head(&mut self, head: N, rest: SequenceCursor<N>) {
        let order = self.order.clone();
        let pos = self
            .heads
            .partition_point(|e| order.compare(&e.head, &head) == Ordering::Greater);
        self.heads.insert(pos, HeadEntry { head, rest });
    }
}

impl<N: XdmNode> Cursor<XdmItem<N>> for MergeCursor<N> {
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<XdmItem<N>>, Error> {
        // The hint refers to the value the previous advance produced, which
        // came from the cursor parked in `pending`.
        let mut hint = hint;
        loop {
            if let Some(through) = &mut self.passthrough {
                match through.advance(std::mem::take(&mut hint))? {
                    IterationResult::Pending(p) => return Ok(IterationResult::Pending(p)),
                    IterationResult::Done => {
                        self.passthrough = None;
                        continue;
                    }
                    IterationResult::Ready(item) => {
                        if item.is_node() {
                            return Err(Error::from_code(
                                ErrorCode::XPTY0018,
                                "step result mixes nodes and atomic values",
                            ));
                        }
                        return Ok(IterationResult::Ready(item));
                    }
                }
            }
            if let Some((mut cursor, first)) = self.pending.take() {
                match cursor.advance(std::mem::take(&mut hint))? {
                    IterationResult::Pending(p) => {
                        self.pending = Some((cursor, first));
                        return Ok(IterationResult::Pending(p));
                    }
                    IterationResult::Done => continue,
                    IterationResult::Ready(XdmItem::Node(node)) => {
                        self.insert_head(node, cursor);
                        continue;
                    }
                    IterationResult::Ready(item) => {
                        if !first {
                            return Err(Error::from_code(
                                ErrorCode::XPTY0018,
                                "step result mixes nodes and atomic values",
                            ));
                        }
                        // Atomic-first sub-sequence: no order requirement,
                        // drain it verbatim right here.
                        self.passthrough = Some(cursor);
                        return Ok(IterationResult::Ready(item));
                    }
                }
            }
            if let Some(seqs) = &mut self.seqs {
                match seqs.advance(IterationHint::None)? {
                    IterationResult::Pending(p) => return Ok(IterationResult::Pending(p)),
                    IterationResult::Done => {
                        self.seqs = None;
                        continue;
                    }
                    IterationResult::Ready(seq) => {
                        self.pending = Some((seq.cursor(), true));
                        continue;
                    }
                }
            }
            let Some(entry) = self.heads.pop() else {
                return Ok(IterationResult::Done);
            };
            self.pending = Some((entry.rest, false));
            let duplicate = self
                .last_emitted
                .as_ref()
                .is_some_and(|prev| self.order.compare(prev, &entry.head) == Ordering::Equal);
            if duplicate {
                continue;
            }
            self.last_emitted = Some(entry.head.clone());
            return Ok(IterationResult::Ready(XdmItem::Node(entry.head)));
        }
    }
}

/// Full-sort fallback for unsorted step output: values must be all nodes
/// (sorted and deduplicated by the comparator) or all atomic (returned
/// verbatim). A mix of the two is a type error.
pub fn sort_node_values<N: XdmNode>(
    order: &dyn DocumentOrder<N>,
    values: Vec<XdmItem<N>>,
) -> Result<Vec<XdmItem<N>>, Error> {
    let node_count = values.iter().filter(|v| v.is_node()).count();
    if node_count == 0 {
        return Ok(values);
    }
    if node_count != values.len() {
        return Err(Error::from_code(
            ErrorCode::XPTY0018,
            "step result mixes nodes and atomic values",
        ));
    }
    let mut nodes: Vec<N> = values
        .into_iter()
        .filter_map(|v| match v {
            XdmItem::Node(n) => Some(n),
            XdmItem::Atomic(_) => None,
        })
        .collect();
    nodes.sort_by(|a, b| order.compare(a, b));
    nodes.dedup_by(|a, b| order.compare(a, b) == Ordering::Equal);
    Ok(nodes.into_iter().map(XdmItem::Node).collect())
}
