//! Coverage for the `spec.md` §8 invariants not already exercised by
//! the named end-to-end scenarios in `scenarios.rs`/`serde_roundtrip.rs`:
//! standalone `Block::call` purity (invariant 8), the validation/block
//! error split and its effect on the cancellation flag (invariant 9),
//! and `disconnect`'s weak-connectedness check.

mod common;

use std::collections::BTreeMap;

use common::{BoomBlock, CopyBlock, IncrementBlock, SourceBlock, ValidatingBlock};
use flowgraph::block::Block;
use flowgraph::dag::Connection;
use flowgraph::error::FlowError;
use flowgraph::value::Value;
use flowgraph::Dag;

fn conn(src: &str, dst: &str) -> Connection {
    Connection::new(src, dst).unwrap()
}

/// Invariant 8: `block(inputs) == block(inputs)` for a pure block.
#[test]
fn call_is_pure_for_a_pure_block() {
    let mut a = IncrementBlock::new("a", 5);
    let mut b = IncrementBlock::new("b", 5);

    let mut inputs = BTreeMap::new();
    inputs.insert("in_q".to_string(), Value::Int(10));

    let out_a = a.call(inputs.clone()).unwrap();
    let out_b = b.call(inputs).unwrap();

    assert_eq!(out_a, out_b);
    assert_eq!(out_a.get("out_q"), Some(&Value::Int(15)));
}

/// `call()` rejects a call that doesn't supply exactly the declared
/// `in_` fields (`spec.md` §4.2, SPEC_FULL §2).
#[test]
fn call_rejects_missing_or_extra_inputs() {
    let mut block = IncrementBlock::new("a", 1);

    let err = block.call(BTreeMap::new()).unwrap_err();
    assert!(matches!(err, FlowError::Structural(_)));

    let mut too_many = BTreeMap::new();
    too_many.insert("in_q".to_string(), Value::Int(1));
    too_many.insert("in_extra".to_string(), Value::Int(1));
    let err = block.call(too_many).unwrap_err();
    assert!(matches!(err, FlowError::Structural(_)));
}

/// Invariant 9 (validation half): a validation fault raised from
/// inside `execute()` aborts the run but leaves the dag usable.
#[test]
fn validation_fault_does_not_poison_the_dag() {
    let mut dag = Dag::new("test", "validation", "doc");
    dag.connect(
        Box::new(SourceBlock::new("p")),
        Box::new(ValidatingBlock::new("v")),
        vec![conn("out_p", "in_p")],
    )
    .unwrap();

    dag.block_by_name_mut("p")
        .unwrap()
        .params_mut()
        .set("out_p", Value::Int(1))
        .unwrap();

    let err = dag.execute().unwrap_err();
    assert!(matches!(err, FlowError::Validation { .. }));
    assert!(!dag.is_stopped(), "a validation fault must not set the cancellation flag");

    // The dag is still usable: `execute()` doesn't refuse to run
    // again just because the previous run ended in a validation fault
    // (here, rerunning doesn't fix anything since
    // `ValidatingBlock::execute` always fails, so it fails the same
    // way rather than succeeding).
    dag.block_by_name_mut("p")
        .unwrap()
        .params_mut()
        .set("out_p", Value::Int(2))
        .unwrap();
    let err2 = dag.execute().unwrap_err();
    assert!(matches!(err2, FlowError::Validation { .. }));
}

/// Invariant 9 (block half): any other fault sets the cancellation
/// flag and is wrapped with the offending block's name.
#[test]
fn other_faults_wrap_as_block_error_and_set_cancellation() {
    let mut dag = Dag::new("test", "block error", "doc");
    dag.connect(
        Box::new(SourceBlock::new("p")),
        Box::new(BoomBlock::new("boom")),
        vec![conn("out_p", "in_p")],
    )
    .unwrap();

    dag.block_by_name_mut("p")
        .unwrap()
        .params_mut()
        .set("out_p", Value::Int(1))
        .unwrap();

    let err = dag.execute().unwrap_err();
    match &err {
        FlowError::Block { block, .. } => assert_eq!(block, "boom"),
        other => panic!("expected FlowError::Block, got {other:?}"),
    }
    assert!(dag.is_stopped(), "a non-validation fault must set the cancellation flag");
}

/// `disconnect` refuses to split the dag, and leaves it completely
/// unchanged when it does.
#[test]
fn disconnect_rejects_a_split_and_leaves_the_dag_unchanged() {
    let mut dag = Dag::new("test", "disconnect", "doc");
    dag.connect(
        Box::new(CopyBlock::new("p1", false)),
        Box::new(CopyBlock::new("p2", false)),
        vec![conn("out_p", "in_p")],
    )
    .unwrap();
    dag.connect("p2", Box::new(CopyBlock::new("p3", false)), vec![conn("out_p", "in_p")])
        .unwrap();

    let before = dag.get_sorted().unwrap();

    // Removing "p2" would split "p1" and "p3" apart.
    let err = dag.disconnect("p2").unwrap_err();
    assert!(matches!(err, FlowError::Structural(_)));
    assert_eq!(dag.get_sorted().unwrap(), before);
    assert_eq!(dag.len(), 3);

    // Removing a tail, by contrast, is fine and doesn't split anything.
    dag.disconnect("p3").unwrap();
    assert_eq!(dag.len(), 2);
    assert!(dag.block_by_name("p3").is_none());
}
