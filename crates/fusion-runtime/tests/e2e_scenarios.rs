//! End-to-end scenarios S1-S6 from spec.md §8, with literal inputs and
//! expected outputs.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use fusion_core::FusionErrorKind;
use fusion_runtime::{Coordinator, Hook};
use support::{Recorder, Selection};

/// S1 — basic join propagation.
#[test]
fn s1_basic_join_propagation() {
    let coordinator = Coordinator::new();
    let a: Hook<i64> = Hook::new(&coordinator, 10);
    let b: Hook<i64> = Hook::new(&coordinator, 20);

    let recorder = Recorder::new();
    let b_for_listener = b.clone();
    let recorder_clone = recorder.clone();
    let _sub = b.add_listener(Arc::new(move || recorder_clone.record(b_for_listener.value())));

    a.join(&b).expect("join succeeds");
    assert_eq!(a.value(), 10);
    assert_eq!(b.value(), 10);
    assert_eq!(recorder.values(), vec![10]);

    a.submit(100).expect("submit succeeds");
    assert_eq!(a.value(), 100);
    assert_eq!(b.value(), 100);
    assert_eq!(recorder.count(), 2);
    assert_eq!(recorder.values(), vec![10, 100]);
}

/// S2 — transitive fusion.
#[test]
fn s2_transitive_fusion() {
    let coordinator = Coordinator::new();
    let a: Hook<i64> = Hook::new(&coordinator, 1);
    let b: Hook<i64> = Hook::new(&coordinator, 2);
    let c: Hook<i64> = Hook::new(&coordinator, 3);
    let d: Hook<i64> = Hook::new(&coordinator, 4);

    let total_fires = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let _subs: Vec<_> = [&a, &b, &c, &d]
        .into_iter()
        .map(|hook| {
            let counter = Arc::clone(&total_fires);
            hook.add_listener(Arc::new(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }))
        })
        .collect();

    a.join(&b).expect("a joins b");
    c.join(&d).expect("c joins d");
    b.join(&c).expect("b joins c");

    for hook in [&a, &b, &c, &d] {
        assert_eq!(hook.value(), 1);
    }
    assert!(a.is_joined_with(&d));

    // a<-1; b<-1 (silent, already 2->1 is a change so fires); c<-4->3 wait:
    // a.join(b): b adopts a's value 1 (changed from 2), both hooks fire -> 2
    // c.join(d): d adopts c's value 3 (changed from 4), both fire -> 2
    // b.join(c): c's domain {b,c,d... } adopts b's value 1 (changed from 3 on
    // the c/d side) -> all four members fire -> 4
    assert_eq!(total_fires.load(std::sync::atomic::Ordering::SeqCst), 2 + 2 + 4);
}

/// S3 — selection-composite atomic update.
#[test]
fn s3_selection_composite_atomic_update() {
    let coordinator = Coordinator::new();
    let dict: BTreeMap<String, i64> = [("low".to_string(), 1), ("high".to_string(), 10)].into();
    let selection = Selection::new(&coordinator, dict.clone(), "low");
    assert_eq!(selection.value(), 1);

    selection.key_hook().submit("high".to_string()).expect("key submit succeeds");
    assert_eq!(selection.dict(), dict);
    assert_eq!(selection.key(), "high");
    assert_eq!(selection.value(), 10);

    let err = selection.key_hook().submit("missing".to_string()).unwrap_err();
    assert_eq!(err.kind(), FusionErrorKind::ValidationRejected);
    assert_eq!(selection.dict(), dict);
    assert_eq!(selection.key(), "high");
    assert_eq!(selection.value(), 10);
}

/// S4 — join rejected by cross-composite validation.
#[test]
fn s4_join_rejected_by_cross_composite_validation() {
    let coordinator = Coordinator::new();
    let dict_a: BTreeMap<String, i64> = [("a".to_string(), 1), ("b".to_string(), 2)].into();
    let dict_x: BTreeMap<String, i64> = [("x".to_string(), 10), ("y".to_string(), 20)].into();
    let s1 = Selection::new(&coordinator, dict_a.clone(), "a");
    let s2 = Selection::new(&coordinator, dict_x.clone(), "x");

    let err = s1.dict_hook().join(s2.dict_hook()).unwrap_err();
    assert_eq!(err.kind(), FusionErrorKind::FusionRejected);
    assert!(err.find(FusionErrorKind::ValidationRejected).is_some());

    assert_eq!(s1.dict(), dict_a);
    assert_eq!(s1.key(), "a");
    assert_eq!(s2.dict(), dict_x);
    assert_eq!(s2.key(), "x");
}

/// S5 — reentrancy guard.
#[test]
fn s5_reentrancy_guard() {
    let coordinator = Coordinator::new();
    let h: Hook<i64> = Hook::new(&coordinator, 0);
    let h_for_listener = h.clone();
    let observed = Arc::new(std::sync::Mutex::new(None));
    let observed_clone = Arc::clone(&observed);
    let _sub = h.add_listener(Arc::new(move || {
        let result = h_for_listener.submit(h_for_listener.value() + 1);
        *observed_clone.lock().expect("lock") = Some(result.map_err(|e| e.kind()));
    }));

    h.submit(5).expect("outer submit succeeds");
    assert_eq!(h.value(), 5);
    let reentrant_result = observed.lock().expect("lock").take().expect("listener ran");
    assert_eq!(reentrant_result, Err(FusionErrorKind::Reentrant));
    assert_eq!(h.value(), 5);
}

/// S6 — forced submission with tolerant float equality.
#[test]
fn s6_forced_submission() {
    let coordinator = Coordinator::builder().tolerance(1e-9).build();
    coordinator
        .equality()
        .register::<f64, f64, _>(|a, b, tolerance| (a - b).abs() <= tolerance);
    let h: Hook<f64> = Hook::new(&coordinator, 1.0);

    let count = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let count_clone = Arc::clone(&count);
    let _sub = h.add_listener(Arc::new(move || {
        count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }));

    h.submit(1.0).expect("normal submit of equal value succeeds");
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);

    h.submit_forced(1.0).expect("forced submit succeeds");
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(h.value(), 1.0);
}
