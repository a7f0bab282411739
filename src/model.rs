use core::cmp::Ordering;

use crate::engine::bucket::Bucket;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: name.into(),
            ns_uri: None,
        }
    }
}

/// Navigation facade over the external tree.
///
/// Node values are opaque, cheaply clonable handles compared by identity.
/// Every navigation call optionally carries a [`Bucket`] hint: an adapter may
/// use it to skip children that cannot match the upcoming node test, but
/// correctness never depends on it doing so — the engine re-tests every
/// candidate it receives.
pub trait XdmNode: Clone + Eq + core::fmt::Debug + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;

    fn parent(&self) -> Option<Self>;
    fn first_child(&self, bucket: Option<&Bucket>) -> Option<Self>;
    fn next_sibling(&self, bucket: Option<&Bucket>) -> Option<Self>;
    fn previous_sibling(&self, bucket: Option<&Bucket>) -> Option<Self>;
    fn attributes(&self, bucket: Option<&Bucket>) -> Vec<Self>;
}

/// Total document order over node handles.
///
/// Injected wherever ordering is needed (the k-way merge, the unsorted-result
/// fallback and the set operations); the engine never derives order itself.
/// `Equal` means "same node" and is what duplicate elimination keys on.
pub trait DocumentOrder<N> {
    fn compare(&self, a: &N, b: &N) -> Ordering;
}

impl<N, F> DocumentOrder<N> for F
where
    F: Fn(&N, &N) -> Ordering,
{
    fn compare(&self, a: &N, b: &N) -> Ordering {
        self(a, b)
    }
}
