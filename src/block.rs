//! Blocks (`spec.md` §3, §4.2).
//!
//! A block is a named, stateful unit with typed input/output fields
//! (held in a [`ParamTable`]) and two hooks, `prepare()`/`execute()`,
//! that the [`crate::dag::Dag`] executor calls as it drains the
//! pending-update FIFO. `wait_for_input` is a plain boolean rather
//! than a subclass — per the design notes (`spec.md` §9), "is-input-
//! block" is a property of an instance, not its type.

use std::collections::BTreeMap;

use crate::error::{FlowError, FlowResult};
use crate::param::ParamTable;
use crate::value::Value;

/// The six-member state machine of §4.2. States are not sticky:
/// a later run can move a block from `Successful`/`Error` back
/// through `Executing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    Ready,
    Executing,
    Successful,
    Waiting,
    Error,
    Interrupted,
}

impl std::fmt::Display for BlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockState::Ready => "READY",
            BlockState::Executing => "EXECUTING",
            BlockState::Successful => "SUCCESSFUL",
            BlockState::Waiting => "WAITING",
            BlockState::Error => "ERROR",
            BlockState::Interrupted => "INTERRUPTED",
        };
        f.write_str(s)
    }
}

/// The fields every block carries regardless of its concrete type.
///
/// Block authors embed this as a field named `base` and derive
/// [`flowgraph_derive::Block`] to wire up the trait, or implement
/// [`Block::base`]/[`Block::base_mut`] by hand.
pub struct BlockBase {
    name: String,
    block_key: String,
    wait_for_input: bool,
    state: BlockState,
    pub(crate) params: ParamTable,
}

impl BlockBase {
    pub fn new(name: impl Into<String>, block_key: impl Into<String>, params: ParamTable) -> Self {
        Self::with_input_flag(name, block_key, false, params)
    }

    pub fn with_input_flag(
        name: impl Into<String>,
        block_key: impl Into<String>,
        wait_for_input: bool,
        params: ParamTable,
    ) -> Self {
        Self {
            name: name.into(),
            block_key: block_key.into(),
            wait_for_input,
            state: BlockState::Ready,
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_key(&self) -> &str {
        &self.block_key
    }

    pub fn wait_for_input(&self) -> bool {
        self.wait_for_input
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn set_state(&mut self, state: BlockState) {
        self.state = state;
    }
}

/// The part of a block that varies per block type.
///
/// Implement this instead of [`Block`] directly when using
/// `#[derive(Block)]`: the derive wires up `base()`/`base_mut()` over
/// a `base: BlockBase` field and forwards `prepare`/`execute`/
/// `describe_args` to this trait, so a block author only has to
/// supply the hooks that actually differ from the no-op defaults.
pub trait BlockLogic {
    fn prepare(&mut self) -> FlowResult<()> {
        Ok(())
    }

    fn execute(&mut self) -> FlowResult<()> {
        Ok(())
    }

    fn describe_args(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }
}

/// The contract every node in a dag implements.
pub trait Block: Send {
    fn base(&self) -> &BlockBase;
    fn base_mut(&mut self) -> &mut BlockBase;

    /// Called when this block is a paused input block and the dag is
    /// resumed via `execute()` (not `execute_after_input()`). Default
    /// is a no-op success.
    fn prepare(&mut self) -> FlowResult<()> {
        Ok(())
    }

    /// The block's work. Default is a no-op success.
    fn execute(&mut self) -> FlowResult<()> {
        Ok(())
    }

    /// The plain (non-parameter) constructor arguments this instance
    /// was built with, keyed by constructor parameter name, in the
    /// order `dump()` should emit them. `name` need not be repeated
    /// here — the dumper always adds it.
    ///
    /// Reflecting on a Rust constructor's argument names at runtime
    /// isn't possible, so (per the design notes in `spec.md` §9) this
    /// method is the explicit substitute: block authors declare it
    /// instead of relying on introspection.
    fn describe_args(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn block_key(&self) -> &str {
        self.base().block_key()
    }

    fn wait_for_input(&self) -> bool {
        self.base().wait_for_input()
    }

    fn state(&self) -> BlockState {
        self.base().state()
    }

    fn params(&self) -> &ParamTable {
        &self.base().params
    }

    fn params_mut(&mut self) -> &mut ParamTable {
        &mut self.base_mut().params
    }

    /// Standalone invocation (`spec.md` §4.2): set exactly the
    /// declared `in_` fields, run `prepare()` then `execute()`, and
    /// return every declared `out_` field.
    fn call(&mut self, inputs: BTreeMap<String, Value>) -> FlowResult<BTreeMap<String, Value>> {
        let declared_inputs: Vec<String> = self
            .params()
            .specs()
            .filter(|s| s.is_input())
            .map(|s| s.name.clone())
            .collect();

        if inputs.len() != declared_inputs.len()
            || declared_inputs.iter().any(|name| !inputs.contains_key(name))
        {
            let names = declared_inputs.join(", ");
            return Err(FlowError::structural(format!(
                "all input params must be specified: {names}"
            )));
        }

        self.params_mut().update(inputs)?;
        self.params_mut().drain_events();

        self.prepare()?;
        self.execute()?;

        let out_names: Vec<String> = self
            .params()
            .specs()
            .filter(|s| s.is_output())
            .map(|s| s.name.clone())
            .collect();

        let mut result = BTreeMap::new();
        for name in out_names {
            result.insert(name.clone(), self.params().get(&name)?.clone());
        }

        Ok(result)
    }
}
