//! Streaming axis cursors over the navigation facade.
//!
//! One cursor evaluates a single axis/test pair against one context node,
//! pulling candidates from the facade and filtering them through the test.
//! The node test's bucket is forwarded to the facade on the traversal calls
//! where pruning is safe (direct children, attributes, sibling scans); the
//! descendant walk must visit every element and only prunes at the test.

use crate::engine::bucket::Bucket;
use crate::engine::node_test::NodeTest;
use crate::engine::path::PathStep;
use crate::engine::runtime::Error;
use crate::engine::sequence::{ResultOrder, Sequence};
use crate::iteration::{Cursor, IterationHint, IterationResult};
use crate::model::XdmNode;
use crate::xdm::XdmItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    SelfAxis,
    Child,
    Attribute,
    Parent,
    Descendant,
    DescendantOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    /// Whether results of this axis for sibling context nodes can never be
    /// ancestors/descendants of each other.
    pub fn peer(self) -> bool {
        !matches!(self, Axis::Descendant | Axis::DescendantOrSelf)
    }

    /// Whether every result is within the subtree of its context node.
    pub fn subtree(self) -> bool {
        matches!(
            self,
            Axis::SelfAxis | Axis::Child | Axis::Attribute | Axis::Descendant | Axis::DescendantOrSelf
        )
    }

    /// Order of this axis' own output relative to document order.
    pub fn result_order(self) -> ResultOrder {
        match self {
            Axis::PrecedingSibling => ResultOrder::ReverseSorted,
            _ => ResultOrder::Sorted,
        }
    }

    /// Evaluate this axis with `test` against one context node.
    pub fn evaluate<N: XdmNode>(self, node: &N, test: &NodeTest) -> Sequence<N> {
        if matches!(test.bucket(), Some(Bucket::Empty)) {
            // The test can never match anything; skip traversal entirely.
            return Sequence::empty();
        }
        if self == Axis::Attribute {
            // Attribute scans are eager in the facade; hand the values over
            // as an array-backed sequence with positional access.
            let bucket = test.bucket();
            let items: Vec<XdmItem<N>> = node
                .attributes(bucket.as_ref())
                .into_iter()
                .filter(|a| test.matches(a))
                .map(XdmItem::Node)
                .collect();
            return Sequence::from_vec(items);
        }
        let cursor = AxisCursor {
            axis: self,
            test: test.clone(),
            node: node.clone(),
            bucket: test.bucket(),
            state: AxisState::Init,
        };
        Sequence::from_cursor(Box::new(cursor), self.result_order(), None)
    }

    /// A composition-ready path step for this axis/test pair.
    pub fn step<N: XdmNode>(self, test: NodeTest) -> PathStep<N> {
        PathStep {
            evaluate: Box::new(move |node: &N| Ok(self.evaluate(node, &test))),
            peer: self.peer(),
            subtree: self.subtree(),
            result_order: self.result_order(),
        }
    }
}

struct AxisCursor<N> {
    axis: Axis,
    test: NodeTest,
    node: N,
    bucket: Option<Bucket>,
    state: AxisState<N>,
}

enum AxisState<N> {
    Init,
    Once { emitted: bool },
    SiblingScan { current: Option<N>, initialized: bool },
    // Preorder walk bounded by the context node; `last` is the previously
    // visited candidate, the next one is its in-subtree successor.
    Descend { last: Option<N>, started: bool },
    Done,
}

impl<N: XdmNode> AxisCursor<N> {
    fn init_state(&mut self) {
        self.state = match self.axis {
            Axis::SelfAxis | Axis::Parent => AxisState::Once { emitted: false },
            Axis::Child | Axis::FollowingSibling | Axis::PrecedingSibling => AxisState::SiblingScan {
                current: None,
                initialized: false,
            },
            Axis::Descendant | Axis::DescendantOrSelf => AxisState::Descend {
                last: None,
                started: false,
            },
            Axis::Attribute => AxisState::Done,
        };
    }

    /// In-subtree document-order successor of `from`, optionally skipping the
    /// subtree rooted at `from` itself.
    fn descend_successor(&self, from: &N, skip_descendants: bool) -> Option<N> {
        if !skip_descendants {
            if let Some(child) = from.first_child(None) {
                return Some(child);
            }
        }
        let mut cur = from.clone();
        loop {
            if cur == self.node {
                return None;
            }
            if let Some(sib) = cur.next_sibling(None) {
                return Some(sib);
            }
            cur = cur.parent()?;
        }
    }

    fn next_candidate(&mut self, hint: IterationHint) -> Option<N> {
        if matches!(self.state, AxisState::Init) {
            self.init_state();
        }
        if let AxisState::Descend { last, started } = &self.state {
            let (prev, started) = (last.clone(), *started);
            if !started {
                let first = if self.axis == Axis::DescendantOrSelf {
                    Some(self.node.clone())
                } else {
                    self.node.first_child(None)
                };
                self.state = AxisState::Descend {
                    last: first.clone(),
                    started: true,
                };
                return first;
            }
            let prev = prev?;
            let skip = hint == IterationHint::SkipDescendants;
            let next = self.descend_successor(&prev, skip);
            self.state = AxisState::Descend {
                last: next.clone(),
                started: true,
            };
            return next;
        }
        match &mut self.state {
            AxisState::Once { emitted } => {
                if *emitted {
                    return None;
                }
                *emitted = true;
                match self.axis {
                    Axis::SelfAxis => Some(self.node.clone()),
                    Axis::Parent => self.node.parent(),
                    _ => None,
                }
            }
            AxisState::SiblingScan { current, initialized } => {
                let bucket = self.bucket.as_ref();
                if !*initialized {
                    *initialized = true;
                    *current = match self.axis {
                        Axis::Child => self.node.first_child(bucket),
                        Axis::FollowingSibling => self.node.next_sibling(bucket),
                        Axis::PrecedingSibling => self.node.previous_sibling(bucket),
                        _ => None,
                    };
                } else if let Some(cur) = current.take() {
                    *current = match self.axis {
                        Axis::PrecedingSibling => cur.previous_sibling(bucket),
                        _ => cur.next_sibling(bucket),
                    };
                }
                current.clone()
            }
            AxisState::Init | AxisState::Descend { .. } | AxisState::Done => None,
        }
    }
}

impl<N: XdmNode> Cursor<XdmItem<N>> for AxisCursor<N> {
    fn advance(&mut self, hint: IterationHint) -> Result<IterationResult<XdmItem<N>>, Error> {
        // The hint refers to the value produced by the previous advance, so
        // it applies to the first candidate fetch only.
        let mut hint = hint;
        loop {
            let Some(candidate) = self.next_candidate(std::mem::take(&mut hint)) else {
                self.state = AxisState::Done;
                return Ok(IterationResult::Done);
            };
            if self.test.matches(&candidate) {
                return Ok(IterationResult::Ready(XdmItem::Node(candidate)));
            }
        }
    }
}
