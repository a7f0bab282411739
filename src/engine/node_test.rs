//! Node tests and their bucket derivation.
//!
//! A node test decides whether an axis candidate survives a step; its bucket
//! is the pruning hint handed to the navigation facade. Union tests fold the
//! buckets of their alternatives so a compound test (`a | b`,
//! `self::(a|b|c)`) still yields a single hint without evaluating any
//! alternative eagerly.

use crate::engine::bucket::{Bucket, union_buckets};
use crate::model::{NodeKind, XdmNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `node()` — any node.
    AnyNode,
    /// A kind test: `element()`, `text()`, `comment()`, ...
    Kind(NodeKind),
    /// A name test on elements and attributes (local name only; namespace
    /// resolution is the compiler's concern).
    Name(String),
    /// Alternatives; matches when any branch matches.
    Union(Vec<NodeTest>),
}

impl NodeTest {
    /// The traversal-pruning bucket for this test; `None` means the test
    /// constrains nothing the facade could prune on.
    pub fn bucket(&self) -> Option<Bucket> {
        match self {
            NodeTest::AnyNode => None,
            NodeTest::Kind(kind) => Some(Bucket::Type(crate::engine::bucket::node_type_code(*kind))),
            NodeTest::Name(local) => Some(Bucket::name(local)),
            NodeTest::Union(alternatives) => {
                let mut acc: Option<Bucket> = match alternatives.first() {
                    Some(first) => first.bucket(),
                    None => return Some(Bucket::Empty),
                };
                for alt in &alternatives[1..] {
                    acc = union_buckets(acc.as_ref(), alt.bucket().as_ref());
                    if acc.is_none() {
                        return None;
                    }
                }
                acc
            }
        }
    }

    pub fn matches<N: XdmNode>(&self, node: &N) -> bool {
        match self {
            NodeTest::AnyNode => true,
            NodeTest::Kind(kind) => {
                // text() also accepts CDATA sections.
                node.kind() == *kind
                    || (*kind == NodeKind::Text && node.kind() == NodeKind::CData)
            }
            NodeTest::Name(local) => {
                matches!(node.kind(), NodeKind::Element | NodeKind::Attribute)
                    && node
                        .name()
                        .map(|q| q.local.as_str() == local.as_str())
                        .unwrap_or(false)
            }
            NodeTest::Union(alternatives) => alternatives.iter().any(|t| t.matches(node)),
        }
    }
}
