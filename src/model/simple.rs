//! Simple in-memory tree adapter used in tests and quick prototypes.
//!
//! Nodes are Arc-backed handles compared by pointer identity. Building a
//! tree bottom-up with the builder helpers and calling `build()` on the
//! outermost node seals the document: every node in the subtree receives a
//! preorder key (attributes right after their owner element, before its
//! children) from which [`SimpleOrder`] derives total document order.
//!
//! ```
//! use xpath_stream::model::simple::{doc, elem, attr, text};
//! use xpath_stream::model::XdmNode;
//!
//! // <root id="r"><child>Hello</child></root>
//! let document = doc()
//!     .child(elem("root").attr(attr("id", "r")).child(elem("child").child(text("Hello"))))
//!     .build();
//! let root = document.first_child(None).unwrap();
//! assert_eq!(root.name().unwrap().local, "root");
//! assert_eq!(root.string_value(), "Hello");
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, Weak};

use crate::engine::bucket::Bucket;
use crate::model::{DocumentOrder, NodeKind, QName, XdmNode};

#[derive(Debug)]
struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: RwLock<Option<Weak<Inner>>>,
    attributes: RwLock<Vec<SimpleNode>>,
    children: RwLock<Vec<SimpleNode>>,
    // Preorder position in the sealed document; 0 until sealed.
    order_key: AtomicU64,
}

/// An Arc-backed node handle with pointer-identity equality.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state)
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

impl SimpleNode {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            parent: RwLock::new(None),
            attributes: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            order_key: AtomicU64::new(0),
        }))
    }

    /// Preorder key assigned when the document was sealed; `None` before.
    pub fn order_key(&self) -> Option<u64> {
        match self.0.order_key.load(AtomicOrdering::Relaxed) {
            0 => None,
            k => Some(k),
        }
    }

    pub fn children(&self) -> Vec<SimpleNode> {
        self.0.children.read().map(|v| v.clone()).unwrap_or_default()
    }

    fn assign_keys(&self, next: &mut u64) {
        self.0.order_key.store(*next, AtomicOrdering::Relaxed);
        *next += 1;
        for a in self.0.attributes.read().unwrap().iter() {
            a.0.order_key.store(*next, AtomicOrdering::Relaxed);
            *next += 1;
        }
        for c in self.0.children.read().unwrap().iter() {
            c.assign_keys(next);
        }
    }
}

pub struct SimpleNodeBuilder {
    node: SimpleNode,
    pending_children: Vec<SimpleNode>,
    pending_attrs: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        Self {
            node: SimpleNode::new(kind, name, value),
            pending_children: Vec::new(),
            pending_attrs: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        let node = match child.into() {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.link(),
        };
        self.pending_children.push(node);
        self
    }

    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.pending_attrs.push(attr);
        self
    }

    fn link(self) -> SimpleNode {
        {
            let mut attrs = self.node.0.attributes.write().unwrap();
            for a in &self.pending_attrs {
                *a.0.parent.write().unwrap() = Some(Arc::downgrade(&self.node.0));
            }
            attrs.extend(self.pending_attrs);
        }
        {
            let mut ch = self.node.0.children.write().unwrap();
            for c in &self.pending_children {
                *c.0.parent.write().unwrap() = Some(Arc::downgrade(&self.node.0));
            }
            ch.extend(self.pending_children);
        }
        self.node
    }

    /// Finalize relationships and seal the subtree: every node below this one
    /// gets its preorder key. Call on the outermost builder.
    pub fn build(self) -> SimpleNode {
        let node = self.link();
        let mut next = 1u64;
        node.assign_keys(&mut next);
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}

impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

// Convenience helpers for concise test code.
pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Document, None, None)
}
pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(QName::local(name)), None)
}
pub fn attr(name: &str, value: &str) -> SimpleNode {
    SimpleNode::new(
        NodeKind::Attribute,
        Some(QName::local(name)),
        Some(value.to_string()),
    )
}
pub fn text(value: &str) -> SimpleNode {
    SimpleNode::new(NodeKind::Text, None, Some(value.to_string()))
}
pub fn comment(value: &str) -> SimpleNode {
    SimpleNode::new(NodeKind::Comment, None, Some(value.to_string()))
}

fn bucket_admits(node: &SimpleNode, bucket: Option<&Bucket>) -> bool {
    match bucket {
        None => true,
        Some(b) => b.matches(node.kind(), node.name().as_ref()),
    }
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                let mut out = String::new();
                fn dfs(n: &SimpleNode, out: &mut String) {
                    if matches!(n.0.kind, NodeKind::Text | NodeKind::CData) {
                        if let Some(v) = &n.0.value {
                            out.push_str(v);
                        }
                    }
                    for c in n.0.children.read().unwrap().iter() {
                        dfs(c, out);
                    }
                }
                dfs(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0
            .parent
            .read()
            .ok()?
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(SimpleNode)
    }

    fn first_child(&self, bucket: Option<&Bucket>) -> Option<Self> {
        self.0
            .children
            .read()
            .ok()?
            .iter()
            .find(|c| bucket_admits(c, bucket))
            .cloned()
    }

    fn next_sibling(&self, bucket: Option<&Bucket>) -> Option<Self> {
        let parent = self.parent()?;
        let siblings = parent.0.children.read().ok()?;
        let pos = siblings.iter().position(|s| s == self)?;
        siblings[pos + 1..]
            .iter()
            .find(|s| bucket_admits(s, bucket))
            .cloned()
    }

    fn previous_sibling(&self, bucket: Option<&Bucket>) -> Option<Self> {
        let parent = self.parent()?;
        let siblings = parent.0.children.read().ok()?;
        let pos = siblings.iter().position(|s| s == self)?;
        siblings[..pos]
            .iter()
            .rev()
            .find(|s| bucket_admits(s, bucket))
            .cloned()
    }

    fn attributes(&self, bucket: Option<&Bucket>) -> Vec<Self> {
        self.0
            .attributes
            .read()
            .map(|attrs| {
                attrs
                    .iter()
                    .filter(|a| bucket_admits(a, bucket))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Document order over sealed [`SimpleNode`] trees via preorder keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleOrder;

impl DocumentOrder<SimpleNode> for SimpleOrder {
    fn compare(&self, a: &SimpleNode, b: &SimpleNode) -> core::cmp::Ordering {
        if a == b {
            return core::cmp::Ordering::Equal;
        }
        match (a.order_key(), b.order_key()) {
            (Some(ka), Some(kb)) => ka.cmp(&kb),
            // Unsealed nodes: fall back to a stable (if arbitrary) order.
            _ => (Arc::as_ptr(&a.0) as usize).cmp(&(Arc::as_ptr(&b.0) as usize)),
        }
    }
}

/// Adapter wrapper that ignores every bucket hint. Used to verify that
/// pruning is an optimization only: results must match the pruning adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoPrune(pub SimpleNode);

impl XdmNode for NoPrune {
    fn kind(&self) -> NodeKind {
        self.0.kind()
    }
    fn name(&self) -> Option<QName> {
        self.0.name()
    }
    fn string_value(&self) -> String {
        self.0.string_value()
    }
    fn parent(&self) -> Option<Self> {
        self.0.parent().map(NoPrune)
    }
    fn first_child(&self, _bucket: Option<&Bucket>) -> Option<Self> {
        self.0.first_child(None).map(NoPrune)
    }
    fn next_sibling(&self, _bucket: Option<&Bucket>) -> Option<Self> {
        self.0.next_sibling(None).map(NoPrune)
    }
    fn previous_sibling(&self, _bucket: Option<&Bucket>) -> Option<Self> {
        self.0.previous_sibling(None).map(NoPrune)
    }
    fn attributes(&self, _bucket: Option<&Bucket>) -> Vec<Self> {
        self.0.attributes(None).into_iter().map(NoPrune).collect()
    }
}
