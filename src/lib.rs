pub mod engine;
pub mod iteration;
pub mod model;
pub mod xdm;

pub use engine::axis::Axis;
pub use engine::bucket::{Bucket, intersect_buckets, union_buckets};
pub use engine::node_test::NodeTest;
pub use engine::path::{PathExpr, PathStep, concat_sorted_sequences, merge_sorted_sequences, sort_node_values};
pub use engine::runtime::{Error, ErrorCode};
pub use engine::sequence::{Cardinality, ResultOrder, Sequence, SequenceCases, SequenceCursor};
pub use iteration::{Cursor, IterationHint, IterationResult, PendingComputation, PendingHandle, Poll, Signal};
pub use model::simple::{NoPrune, SimpleNode, SimpleNodeBuilder, SimpleOrder, attr, comment, doc, elem, text};
pub use model::{DocumentOrder, NodeKind, QName, XdmNode};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem};
