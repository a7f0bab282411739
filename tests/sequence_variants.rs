//! Behavior of the four sequence variants: variant collapse, peeking without
//! consuming, shared cursor positions and materialization replay.

use std::cell::Cell;
use std::rc::Rc;

use rstest::rstest;
use xpath_stream::iteration::cursor_from_fn;
use xpath_stream::{
    Cardinality, Cursor, ErrorCode, IterationHint, IterationResult, ResultOrder, Sequence,
    SequenceCases, XdmAtomicValue, XdmItem,
};

type N = xpath_stream::SimpleNode;

fn int(v: i64) -> XdmItem<N> {
    XdmItem::Atomic(XdmAtomicValue::Integer(v))
}

fn ints(values: &[i64]) -> Sequence<N> {
    Sequence::from_vec(values.iter().copied().map(int).collect())
}

fn drain(seq: &Sequence<N>) -> Vec<XdmItem<N>> {
    let mut cursor = seq.cursor();
    let mut out = Vec::new();
    loop {
        match cursor.next().unwrap() {
            IterationResult::Done => return out,
            IterationResult::Ready(v) => out.push(v),
            IterationResult::Pending(p) => p.run_to_completion().unwrap(),
        }
    }
}

#[rstest]
fn factory_collapses_small_vectors() {
    assert_eq!(ints(&[]).len_hint(), Some(0));
    assert_eq!(ints(&[1]).len_hint(), Some(1));
    assert_eq!(ints(&[1, 2]).len_hint(), Some(2));

    let card = |seq: &Sequence<N>| seq.cardinality().unwrap().expect_ready("materialized");
    assert_eq!(card(&ints(&[])), Cardinality::Empty);
    assert_eq!(card(&ints(&[7])), Cardinality::Singleton);
    assert_eq!(card(&ints(&[7, 8, 9])), Cardinality::Multiple);
}

#[rstest]
fn empty_and_singleton_report_sorted() {
    assert_eq!(ints(&[]).result_order(), ResultOrder::Sorted);
    assert_eq!(ints(&[5]).result_order(), ResultOrder::Sorted);
}

#[rstest]
fn peeking_does_not_consume() {
    let mut produced = vec![int(1), int(2), int(3)];
    produced.reverse();
    let seq = Sequence::from_cursor(
        cursor_from_fn(move |_| {
            Ok(match produced.pop() {
                Some(v) => IterationResult::Ready(v),
                None => IterationResult::Done,
            })
        }),
        ResultOrder::Sorted,
        None,
    );

    let first = seq.first().unwrap().expect_ready("no suspension");
    assert_eq!(first, Some(int(1)));
    assert!(!seq.is_empty().unwrap().expect_ready("no suspension"));
    assert_eq!(
        seq.cardinality().unwrap().expect_ready("no suspension"),
        Cardinality::Multiple
    );

    // The consumer still sees every value, in order.
    assert_eq!(drain(&seq), vec![int(1), int(2), int(3)]);
}

#[rstest]
fn cursors_share_consumption_until_materialized() {
    let seq = Sequence::from_cursor(
        cursor_from_fn({
            let mut next = 0i64;
            move |_| {
                next += 1;
                Ok(if next <= 4 {
                    IterationResult::Ready(int(next))
                } else {
                    IterationResult::Done
                })
            }
        }),
        ResultOrder::Sorted,
        None,
    );

    let mut a = seq.cursor();
    let mut b = seq.cursor();
    let IterationResult::Ready(first) = a.next().unwrap() else {
        panic!("expected a value");
    };
    let IterationResult::Ready(second) = b.next().unwrap() else {
        panic!("expected a value");
    };
    // Single pass: the second cursor continues where the first left off.
    assert_eq!(first, int(1));
    assert_eq!(second, int(2));
}

#[rstest]
fn materialize_is_idempotent_and_replayable() {
    let calls = Rc::new(Cell::new(0usize));
    let counter = calls.clone();
    let seq = Sequence::from_cursor(
        cursor_from_fn({
            let mut next = 0i64;
            move |_| {
                counter.set(counter.get() + 1);
                next += 1;
                Ok(if next <= 3 {
                    IterationResult::Ready(int(next))
                } else {
                    IterationResult::Done
                })
            }
        }),
        ResultOrder::Sorted,
        None,
    );

    let once = seq.materialize().unwrap().expect_ready("no suspension");
    let twice = seq.materialize().unwrap().expect_ready("no suspension");
    assert_eq!(once, twice);
    // 3 values + the terminal advance, not driven a second time.
    assert_eq!(calls.get(), 4);

    // Cursors created after materialization replay independently.
    assert_eq!(drain(&seq), vec![int(1), int(2), int(3)]);
    assert_eq!(drain(&seq), vec![int(1), int(2), int(3)]);
}

#[rstest]
fn materialize_after_partial_consumption_is_refused() {
    let seq = Sequence::from_cursor(
        cursor_from_fn({
            let mut next = 0i64;
            move |_| {
                next += 1;
                Ok(if next <= 3 {
                    IterationResult::Ready(int(next))
                } else {
                    IterationResult::Done
                })
            }
        }),
        ResultOrder::Sorted,
        None,
    );

    let mut cursor = seq.cursor();
    assert!(matches!(cursor.next().unwrap(), IterationResult::Ready(_)));

    let err = seq.materialize().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOER0000);
}

#[rstest]
fn predicted_length_answers_without_driving() {
    let seq: Sequence<N> = Sequence::from_cursor(
        cursor_from_fn(|_| panic!("cardinality must not drive the producer")),
        ResultOrder::Sorted,
        Some(3),
    );
    assert_eq!(seq.len_hint(), Some(3));
    assert_eq!(
        seq.cardinality().unwrap().expect_ready("predicted"),
        Cardinality::Multiple
    );
    assert_eq!(seq.len().unwrap().expect_ready("predicted"), 3);
}

#[rstest]
fn map_preserves_order_tag_and_length() {
    let seq = ints(&[1, 2, 3]);
    let doubled = seq.map(|item| {
        let XdmItem::Atomic(XdmAtomicValue::Integer(v)) = item else {
            panic!("integer input only");
        };
        Ok(int(v * 2))
    });
    assert_eq!(doubled.len_hint(), Some(3));
    assert_eq!(doubled.result_order(), ResultOrder::Sorted);
    assert_eq!(drain(&doubled), vec![int(2), int(4), int(6)]);
}

#[rstest]
fn map_error_surfaces_on_iteration() {
    let seq = ints(&[1, 2, 3]);
    let mapped = seq.map(|_| Err(xpath_stream::Error::from_code(ErrorCode::FOER0000, "boom")));
    let mut cursor = mapped.cursor();
    assert!(cursor.next().is_err());
}

#[rstest]
fn filter_sees_input_positions() {
    let seq = ints(&[10, 20, 30, 40]);
    let kept = seq.filter(|pos, _| Ok(pos % 2 == 0));
    assert_eq!(drain(&kept), vec![int(10), int(30)]);
}

#[rstest]
fn filter_on_singleton_defers_the_predicate() {
    let seq = ints(&[42]);
    let kept = seq.filter(|_, _| {
        Err(xpath_stream::Error::from_code(
            ErrorCode::FOER0000,
            "predicate failure",
        ))
    });
    // Building the filtered sequence must not run the predicate.
    let mut cursor = kept.cursor();
    assert!(cursor.next().is_err());
}

#[rstest]
fn map_all_hands_over_the_full_list() {
    let seq = ints(&[3, 1, 2]);
    let sorted = seq.map_all(|mut items| {
        items.sort_by_key(|item| match item {
            XdmItem::Atomic(XdmAtomicValue::Integer(v)) => *v,
            _ => 0,
        });
        Ok(Sequence::from_vec(items))
    });
    assert_eq!(drain(&sorted), vec![int(1), int(2), int(3)]);
}

#[rstest]
fn switch_cases_picks_the_matching_arm() {
    let tag = |seq: &Sequence<N>| {
        let out = seq.switch_cases(
            SequenceCases::with_default(|_| Sequence::singleton(int(0)))
                .on_empty(|_| Sequence::singleton(int(1)))
                .on_singleton(|_| Sequence::singleton(int(2)))
                .on_multiple(|_| Sequence::singleton(int(3))),
        );
        drain(&out)
    };
    assert_eq!(tag(&ints(&[])), vec![int(1)]);
    assert_eq!(tag(&ints(&[9])), vec![int(2)]);
    assert_eq!(tag(&ints(&[9, 9])), vec![int(3)]);
}

#[rstest]
fn switch_cases_falls_back_to_default() {
    let seq = ints(&[]);
    let out = seq.switch_cases(SequenceCases::with_default(|s| s.map(|v| Ok(v))));
    assert_eq!(drain(&out), vec![]);
}

#[rstest]
fn hint_is_forwarded_to_one_underlying_advance() {
    let hints = Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = hints.clone();
    let seq = Sequence::from_cursor(
        cursor_from_fn({
            let mut next = 0i64;
            move |hint| {
                seen.borrow_mut().push(hint);
                next += 1;
                Ok(if next <= 3 {
                    IterationResult::Ready(int(next))
                } else {
                    IterationResult::Done
                })
            }
        }),
        ResultOrder::Sorted,
        None,
    );

    // Filter drops the first value, forcing two underlying advances within
    // one outer advance; only the first may carry the hint.
    let kept = seq.filter(|pos, _| Ok(pos > 0));
    let mut cursor = kept.cursor();
    let IterationResult::Ready(v) = cursor.advance(IterationHint::SkipDescendants).unwrap() else {
        panic!("expected a value");
    };
    assert_eq!(v, int(2));
    assert_eq!(
        *hints.borrow(),
        vec![IterationHint::SkipDescendants, IterationHint::None]
    );
}
