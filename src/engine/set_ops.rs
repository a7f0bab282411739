//! Node-set operators: union, intersect, except.
//!
//! All three materialize both operands, reject non-node items, and hand
//! back a sequence sorted and deduplicated by the injected comparator.

use std::cmp::Ordering;

use crate::engine::runtime::{Error, ErrorCode};
use crate::engine::sequence::{ResultOrder, Sequence};
use crate::iteration::Poll;
use crate::model::{DocumentOrder, XdmNode};
use crate::xdm::XdmItem;

pub fn union<N: XdmNode>(
    order: &dyn DocumentOrder<N>,
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let mut nodes = operand_nodes(left, "union")?;
    nodes.extend(operand_nodes(right, "union")?);
    Ok(from_nodes(sorted_distinct(order, nodes)))
}

pub fn intersect<N: XdmNode>(
    order: &dyn DocumentOrder<N>,
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let left_nodes = sorted_distinct(order, operand_nodes(left, "intersect")?);
    let right_nodes = sorted_distinct(order, operand_nodes(right, "intersect")?);
    let kept = left_nodes
        .into_iter()
        .filter(|n| contains(order, &right_nodes, n))
        .collect();
    Ok(from_nodes(kept))
}

pub fn except<N: XdmNode>(
    order: &dyn DocumentOrder<N>,
    left: &Sequence<N>,
    right: &Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let left_nodes = sorted_distinct(order, operand_nodes(left, "except")?);
    let right_nodes = sorted_distinct(order, operand_nodes(right, "except")?);
    let kept = left_nodes
        .into_iter()
        .filter(|n| !contains(order, &right_nodes, n))
        .collect();
    Ok(from_nodes(kept))
}

fn operand_nodes<N: XdmNode>(seq: &Sequence<N>, op: &str) -> Result<Vec<N>, Error> {
    let items = loop {
        match seq.materialize()? {
            Poll::Ready(items) => break items,
            Poll::Pending(handle) => handle.run_to_completion()?,
        }
    };
    let mut nodes = Vec::with_capacity(items.len());
    for item in items.iter() {
        match item {
            XdmItem::Node(n) => nodes.push(n.clone()),
            XdmItem::Atomic(_) => {
                return Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("{op} operand contains a non-node item"),
                ));
            }
        }
    }
    Ok(nodes)
}

fn sorted_distinct<N: XdmNode>(order: &dyn DocumentOrder<N>, mut nodes: Vec<N>) -> Vec<N> {
    nodes.sort_by(|a, b| order.compare(a, b));
    nodes.dedup_by(|a, b| order.compare(a, b) == Ordering::Equal);
    nodes
}

// `sorted` must already be ordered by the same comparator.
fn contains<N: XdmNode>(order: &dyn DocumentOrder<N>, sorted: &[N], probe: &N) -> bool {
    sorted.binary_search_by(|n| order.compare(n, probe)).is_ok()
}

fn from_nodes<N: XdmNode>(nodes: Vec<N>) -> Sequence<N> {
    let items = nodes.into_iter().map(XdmItem::Node).collect();
    Sequence::from_vec_with_order(items, ResultOrder::Sorted)
}
