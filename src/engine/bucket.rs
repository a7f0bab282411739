//! Traversal-pruning buckets.
//!
//! A bucket is a compile-time label summarizing which nodes a test can ever
//! match. Buckets never flow through sequence values; they travel sideways as
//! hints into the navigation facade, which may use them to skip children the
//! upcoming test would reject anyway. `None` in a bucket position always
//! means "no constraint".

use compact_str::CompactString;

use crate::model::{NodeKind, QName};

/// Numeric node-type code used by the `Type` buckets (the classic DOM
/// numbering). CDATA sections share the text code: a test for text matches
/// both.
pub fn node_type_code(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Element => 1,
        NodeKind::Attribute => 2,
        NodeKind::Text | NodeKind::CData => 3,
        NodeKind::ProcessingInstruction => 7,
        NodeKind::Comment => 8,
        NodeKind::Document => 9,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// All nodes of one type code (1..=11).
    Type(u8),
    /// Elements or attributes with the given local name.
    Name(CompactString),
    /// Elements or attributes of any name (`type-1-or-type-2`).
    ElementOrAttribute,
    /// Matches nothing; the combination that produced it is unsatisfiable.
    Empty,
}

impl Bucket {
    pub fn name(local: impl AsRef<str>) -> Self {
        Bucket::Name(CompactString::new(local.as_ref()))
    }

    /// The most specific bucket a node falls into.
    pub fn for_node(kind: NodeKind, name: Option<&QName>) -> Self {
        match (kind, name) {
            (NodeKind::Element | NodeKind::Attribute, Some(q)) => Bucket::name(&q.local),
            _ => Bucket::Type(node_type_code(kind)),
        }
    }

    /// Whether a node of this kind and name can be a member of the bucket.
    pub fn matches(&self, kind: NodeKind, name: Option<&QName>) -> bool {
        match self {
            Bucket::Type(code) => node_type_code(kind) == *code,
            Bucket::Name(local) => {
                matches!(kind, NodeKind::Element | NodeKind::Attribute)
                    && name.map(|q| q.local.as_str() == local.as_str()).unwrap_or(false)
            }
            Bucket::ElementOrAttribute => {
                matches!(kind, NodeKind::Element | NodeKind::Attribute)
            }
            Bucket::Empty => false,
        }
    }

    fn is_element_or_attribute_family(&self) -> bool {
        matches!(
            self,
            Bucket::Name(_) | Bucket::Type(1) | Bucket::Type(2) | Bucket::ElementOrAttribute
        )
    }
}

/// The more specific of two compatible buckets, or [`Bucket::Empty`] when the
/// two labels are mutually exclusive. `None` ("no constraint") is the
/// identity: intersecting with it yields the other operand.
pub fn intersect_buckets(a: Option<&Bucket>, b: Option<&Bucket>) -> Option<Bucket> {
    let (a, b) = match (a, b) {
        (None, other) | (other, None) => return other.cloned(),
        (Some(a), Some(b)) => (a, b),
    };
    if a == b {
        return Some(a.clone());
    }
    if matches!(a, Bucket::Empty) || matches!(b, Bucket::Empty) {
        return Some(Bucket::Empty);
    }
    match (a, b) {
        // Equal names were returned above; distinct names exclude each other.
        (Bucket::Name(_), Bucket::Name(_)) => Some(Bucket::Empty),
        // A name constrains the rest of the element/attribute family further.
        (Bucket::Name(_), other) if other.is_element_or_attribute_family() => Some(a.clone()),
        (other, Bucket::Name(_)) if other.is_element_or_attribute_family() => Some(b.clone()),
        (Bucket::Type(code), Bucket::ElementOrAttribute)
        | (Bucket::ElementOrAttribute, Bucket::Type(code)) => {
            if *code == 1 || *code == 2 {
                Some(Bucket::Type(*code))
            } else {
                Some(Bucket::Empty)
            }
        }
        // Two different names, two different types, or a name against a
        // non-element/attribute type: nothing can satisfy both.
        _ => Some(Bucket::Empty),
    }
}

/// The most specific bucket guaranteed to include both operands, or `None`
/// when only "no constraint" covers them. `None` absorbs; [`Bucket::Empty`]
/// is the identity.
pub fn union_buckets(a: Option<&Bucket>, b: Option<&Bucket>) -> Option<Bucket> {
    let (a, b) = match (a, b) {
        (None, _) | (_, None) => return None,
        (Some(a), Some(b)) => (a, b),
    };
    if a == b {
        return Some(a.clone());
    }
    if matches!(a, Bucket::Empty) {
        return Some(b.clone());
    }
    if matches!(b, Bucket::Empty) {
        return Some(a.clone());
    }
    if a.is_element_or_attribute_family() && b.is_element_or_attribute_family() {
        return Some(Bucket::ElementOrAttribute);
    }
    None
}
