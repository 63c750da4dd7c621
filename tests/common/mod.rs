//! Shared block fixtures for the integration tests in this directory,
//! grounded in `spec.md` §8's scenarios (S1-S6): small, deliberately
//! generic blocks (`CopyBlock`, `IncrementBlock`, ...) stand in for
//! the spec's abstractly-named `P`, `Q`, `R`, ...

use std::collections::BTreeMap;
use std::time::Duration;

use flowgraph::block::{Block, BlockBase};
use flowgraph::error::FlowResult;
use flowgraph::param::{ParamSpec, ParamTable};
use flowgraph::value::{ParamType, Value};

/// A head block: carries only `out_p`, set directly by test code
/// rather than computed by `execute()`.
pub struct SourceBlock {
    base: BlockBase,
}

impl SourceBlock {
    pub fn new(name: &str) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("out_p", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.SourceBlock", params),
        }
    }
}

impl Block for SourceBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }
}

/// Copies `in_p` to `out_p` on every `execute()`. Used for the plain
/// pass-through blocks in S3 (and doubles as an input block when
/// constructed with `wait_for_input=true`).
pub struct CopyBlock {
    base: BlockBase,
}

impl CopyBlock {
    pub fn new(name: &str, wait_for_input: bool) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("in_p", ParamType::Integer, Value::Int(0)));
        params.register(ParamSpec::new("out_p", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::with_input_flag(name, "flowgraph_tests.CopyBlock", wait_for_input, params),
        }
    }
}

impl Block for CopyBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn execute(&mut self) -> FlowResult<()> {
        let v = self.params().get("in_p")?.clone();
        self.params_mut().set("out_p", v)
    }
}

/// `out_q = in_q + 1` (the `Q` of S1).
pub struct IncrementBlock {
    base: BlockBase,
    step: i64,
}

impl IncrementBlock {
    pub fn new(name: &str, step: i64) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("in_q", ParamType::Integer, Value::Int(0)));
        params.register(ParamSpec::new("out_q", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.IncrementBlock", params),
            step,
        }
    }
}

impl Block for IncrementBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn execute(&mut self) -> FlowResult<()> {
        let v = self.params().get("in_q")?.as_int().unwrap_or(0);
        self.params_mut().set("out_q", Value::Int(v + self.step))
    }

    fn describe_args(&self) -> BTreeMap<String, Value> {
        let mut args = BTreeMap::new();
        args.insert("step".to_string(), Value::Int(self.step));
        args
    }
}

/// A tail block that just stores whatever `in_r` it's given (the `R`
/// of S1).
pub struct SinkBlock {
    base: BlockBase,
}

impl SinkBlock {
    pub fn new(name: &str) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("in_r", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.SinkBlock", params),
        }
    }
}

impl Block for SinkBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }
}

/// Two independent inputs merged into one block (the `C` of S2). Counts
/// its own `execute()` calls in `runs`, so a test can tell a single
/// merged run apart from two separate ones.
pub struct MergeSinkBlock {
    base: BlockBase,
}

impl MergeSinkBlock {
    pub fn new(name: &str) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("in_x", ParamType::Integer, Value::Int(0)));
        params.register(ParamSpec::new("in_y", ParamType::Integer, Value::Int(0)));
        params.register(ParamSpec::new("runs", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.MergeSinkBlock", params),
        }
    }
}

impl Block for MergeSinkBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn execute(&mut self) -> FlowResult<()> {
        let runs = self.params().get("runs")?.as_int().unwrap_or(0);
        self.params_mut().set("runs", Value::Int(runs + 1))
    }
}

/// `execute()` always raises a *validation* fault (e.g. "the upstream
/// value doesn't make sense in this block's domain", as opposed to a
/// failed `ParamSpec` type/constraint check). Used to check that a
/// validation fault raised from inside `execute()` leaves the dag's
/// cancellation flag clear (`spec.md` §7, invariant 9).
pub struct ValidatingBlock {
    base: BlockBase,
}

impl ValidatingBlock {
    pub fn new(name: &str) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("in_p", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.ValidatingBlock", params),
        }
    }
}

impl Block for ValidatingBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn execute(&mut self) -> FlowResult<()> {
        Err(flowgraph::error::FlowError::validation(
            self.name(),
            "in_p is not acceptable to this block",
        ))
    }
}

/// `execute()` always raises a non-validation, non-cancellation fault,
/// to check that the executor wraps it as `FlowError::Block` and sets
/// the dag's cancellation flag (`spec.md` §7, invariant 9).
pub struct BoomBlock {
    base: BlockBase,
}

impl BoomBlock {
    pub fn new(name: &str) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("in_p", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.BoomBlock", params),
        }
    }
}

impl Block for BoomBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn execute(&mut self) -> FlowResult<()> {
        Err(flowgraph::error::FlowError::structural("boom"))
    }
}

/// Copies `in_p` to `out_p` after sleeping, so a test can observe that
/// cancellation doesn't preempt a block already running (S6).
pub struct SleepBlock {
    base: BlockBase,
    sleep: Duration,
}

impl SleepBlock {
    pub fn new(name: &str, sleep: Duration) -> Self {
        let mut params = ParamTable::new();
        params.register(ParamSpec::new("out_p", ParamType::Integer, Value::Int(0)));
        Self {
            base: BlockBase::new(name, "flowgraph_tests.SleepBlock", params),
            sleep,
        }
    }
}

impl Block for SleepBlock {
    fn base(&self) -> &BlockBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn execute(&mut self) -> FlowResult<()> {
        std::thread::sleep(self.sleep);
        let v = self.params().get("out_p")?.clone();
        self.params_mut().set("out_p", v)
    }
}
