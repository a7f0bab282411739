//! Algebra of the traversal-pruning bucket lattice and the bucket
//! derivation of node tests.

use rstest::rstest;
use xpath_stream::engine::bucket::node_type_code;
use xpath_stream::model::simple::{attr, doc, elem, text};
use xpath_stream::{Bucket, NodeKind, NodeTest, XdmNode, intersect_buckets, union_buckets};

#[rstest]
#[case(NodeKind::Element, 1)]
#[case(NodeKind::Attribute, 2)]
#[case(NodeKind::Text, 3)]
#[case(NodeKind::CData, 3)]
#[case(NodeKind::ProcessingInstruction, 7)]
#[case(NodeKind::Comment, 8)]
#[case(NodeKind::Document, 9)]
fn type_codes_follow_dom_numbering(#[case] kind: NodeKind, #[case] code: u8) {
    assert_eq!(node_type_code(kind), code);
}

#[rstest]
fn intersect_none_is_identity() {
    let name = Bucket::name("a");
    assert_eq!(intersect_buckets(None, Some(&name)), Some(name.clone()));
    assert_eq!(intersect_buckets(Some(&name), None), Some(name));
    assert_eq!(intersect_buckets(None, None), None);
}

#[rstest]
fn intersect_empty_absorbs() {
    assert_eq!(
        intersect_buckets(Some(&Bucket::Empty), Some(&Bucket::name("a"))),
        Some(Bucket::Empty)
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::Type(1)), Some(&Bucket::Empty)),
        Some(Bucket::Empty)
    );
}

#[rstest]
fn intersect_name_refines_the_element_family() {
    let name = Bucket::name("a");
    assert_eq!(
        intersect_buckets(Some(&name), Some(&Bucket::Type(1))),
        Some(name.clone())
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::ElementOrAttribute), Some(&name)),
        Some(name)
    );
}

#[rstest]
fn intersect_incompatible_labels_is_empty() {
    assert_eq!(
        intersect_buckets(Some(&Bucket::name("a")), Some(&Bucket::name("b"))),
        Some(Bucket::Empty)
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::name("b")), Some(&Bucket::name("a"))),
        Some(Bucket::Empty)
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::Type(3)), Some(&Bucket::name("a"))),
        Some(Bucket::Empty)
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::Type(1)), Some(&Bucket::Type(8))),
        Some(Bucket::Empty)
    );
}

#[rstest]
fn intersect_type_with_element_or_attribute() {
    assert_eq!(
        intersect_buckets(Some(&Bucket::Type(1)), Some(&Bucket::ElementOrAttribute)),
        Some(Bucket::Type(1))
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::ElementOrAttribute), Some(&Bucket::Type(2))),
        Some(Bucket::Type(2))
    );
    assert_eq!(
        intersect_buckets(Some(&Bucket::Type(8)), Some(&Bucket::ElementOrAttribute)),
        Some(Bucket::Empty)
    );
}

#[rstest]
fn union_none_absorbs() {
    assert_eq!(union_buckets(None, Some(&Bucket::name("a"))), None);
    assert_eq!(union_buckets(Some(&Bucket::Type(1)), None), None);
}

#[rstest]
fn union_empty_is_identity() {
    let name = Bucket::name("a");
    assert_eq!(
        union_buckets(Some(&Bucket::Empty), Some(&name)),
        Some(name.clone())
    );
    assert_eq!(union_buckets(Some(&name), Some(&Bucket::Empty)), Some(name));
}

#[rstest]
fn union_widens_within_the_element_family() {
    assert_eq!(
        union_buckets(Some(&Bucket::name("a")), Some(&Bucket::name("b"))),
        Some(Bucket::ElementOrAttribute)
    );
    assert_eq!(
        union_buckets(Some(&Bucket::Type(1)), Some(&Bucket::Type(2))),
        Some(Bucket::ElementOrAttribute)
    );
    assert_eq!(
        union_buckets(Some(&Bucket::name("a")), Some(&Bucket::name("a"))),
        Some(Bucket::name("a"))
    );
}

#[rstest]
fn union_across_families_is_unconstrained() {
    assert_eq!(
        union_buckets(Some(&Bucket::name("a")), Some(&Bucket::Type(8))),
        None
    );
    assert_eq!(
        union_buckets(Some(&Bucket::Type(3)), Some(&Bucket::Type(9))),
        None
    );
}

#[rstest]
fn bucket_membership_of_nodes() {
    let document = doc()
        .child(elem("a").attr(attr("id", "1")).child(text("hi")))
        .build();
    let a = document.first_child(None).unwrap();
    let id = a.attributes(None).remove(0);
    let hi = a.first_child(None).unwrap();

    assert!(Bucket::name("a").matches(a.kind(), a.name().as_ref()));
    assert!(!Bucket::name("b").matches(a.kind(), a.name().as_ref()));
    assert!(Bucket::ElementOrAttribute.matches(id.kind(), id.name().as_ref()));
    assert!(Bucket::Type(3).matches(hi.kind(), hi.name().as_ref()));
    assert!(!Bucket::Empty.matches(a.kind(), a.name().as_ref()));
}

#[rstest]
fn node_test_buckets() {
    assert_eq!(NodeTest::AnyNode.bucket(), None);
    assert_eq!(
        NodeTest::Kind(NodeKind::Comment).bucket(),
        Some(Bucket::Type(8))
    );
    assert_eq!(
        NodeTest::Name("a".into()).bucket(),
        Some(Bucket::name("a"))
    );
}

#[rstest]
fn union_test_folds_its_alternatives() {
    let ab = NodeTest::Union(vec![
        NodeTest::Name("a".into()),
        NodeTest::Name("b".into()),
    ]);
    assert_eq!(ab.bucket(), Some(Bucket::ElementOrAttribute));

    let mixed = NodeTest::Union(vec![
        NodeTest::Name("a".into()),
        NodeTest::Kind(NodeKind::Comment),
    ]);
    assert_eq!(mixed.bucket(), None);

    assert_eq!(NodeTest::Union(vec![]).bucket(), Some(Bucket::Empty));
}
