//! The FIFO-driven executor (`spec.md` §4.3.2–§4.3.5).
//!
//! `Dag` owns a single pending-update queue. Every entry names a
//! destination block and the `in_` values it should receive before
//! running; entries destined for the same block that are still
//! queued get merged into one (merge-by-destination), which is how a
//! block with two upstream sources only runs once per round even when
//! both sources fire.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use crate::block::Block;
use crate::error::{FlowError, FlowResult};
use crate::value::Value;

use super::Dag;

#[derive(Debug)]
pub struct PendingUpdate {
    pub dst: String,
    pub values: BTreeMap<String, Value>,
    /// Set for the record that resumes a paused input block via
    /// `execute_after_input()`. A restart entry always runs
    /// `execute()` even if its `values` are empty; a normal entry with
    /// no values runs `prepare()` then `execute()` (a head block with
    /// no inputs at all).
    pub restart: bool,
}

impl Dag {
    /// Number of records currently queued on the pending-update FIFO.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Run the dag from its head blocks (`spec.md` §4.3.2: the FIFO is
    /// auto-seeded from every block with no incoming edge).
    ///
    /// Returns the name of the `wait_for_input` block the run paused
    /// on, or `None` if the FIFO drained to completion.
    pub fn execute(&mut self) -> FlowResult<Option<String>> {
        if self.blocks.is_empty() {
            return Err(FlowError::Empty);
        }

        self.pending.clear();

        let (mut heads, _) = self.heads_and_tails();
        if heads.is_empty() {
            return Err(FlowError::structural("dag has no head blocks to seed from"));
        }

        // `spec.md` §4.3.3 step 2: wait_for_input=false heads run
        // before wait_for_input=true heads, so available non-input work
        // isn't stalled behind a head that's just going to pause.
        // `sort_by_key` is stable, so ties keep `heads_and_tails`'s
        // order.
        heads.sort_by_key(|name| self.blocks.get(name.as_str()).is_some_and(|b| b.wait_for_input()));

        for head in heads {
            self.pending.push_back(PendingUpdate {
                dst: head,
                values: BTreeMap::new(),
                restart: false,
            });
        }

        self.run_loop()
    }

    /// Resume a dag paused on a `wait_for_input` block, supplying the
    /// values an external caller (UI, CLI, test) collected for it.
    pub fn execute_after_input(
        &mut self,
        block_name: &str,
        values: BTreeMap<String, Value>,
    ) -> FlowResult<Option<String>> {
        let block = self
            .blocks
            .get(block_name)
            .ok_or_else(|| FlowError::structural(format!("no such block '{block_name}'")))?;

        if !block.wait_for_input() {
            return Err(FlowError::structural(format!(
                "block '{block_name}' is not waiting for input"
            )));
        }

        self.pending.push_front(PendingUpdate {
            dst: block_name.to_string(),
            values,
            restart: true,
        });

        self.run_loop()
    }

    fn run_loop(&mut self) -> FlowResult<Option<String>> {
        loop {
            let Some(update) = self.pending.pop_front() else {
                return Ok(None);
            };

            // `spec.md` §4.3.3 step 4a: once cancellation is observed,
            // the loop keeps popping and applying records (so parameter
            // state stays coherent with whatever was already queued)
            // but stops calling into blocks. This is not surfaced as an
            // error: cancellation is surfaced via the returned
            // pause/none sentinel and `is_stopped()` (`spec.md` §7).
            let can_execute = !self.cancelled.load(Ordering::Acquire);

            if let Some(paused_at) = self.run_one(update, can_execute)? {
                return Ok(Some(paused_at));
            }
        }
    }

    /// Runs one FIFO record. Returns `Some(dst)` if this record paused
    /// the dag on an input block (`spec.md` §4.3.3 step 4e).
    fn run_one(&mut self, update: PendingUpdate, can_execute: bool) -> FlowResult<Option<String>> {
        let PendingUpdate {
            dst,
            values,
            restart,
        } = update;

        let has_values = !values.is_empty();

        let block = self
            .blocks
            .get_mut(dst.as_str())
            .ok_or_else(|| FlowError::structural(format!("no such block '{dst}'")))?;

        if has_values {
            if let Err(e) = block.params_mut().update(values) {
                // A FIFO value fails its own field's validation: unlike
                // a validation fault raised from inside prepare/execute,
                // this does poison the dag (§4.3.3 step 4b).
                self.cancelled.store(true, Ordering::Release);
                return Err(e);
            }
            // These events describe `in_` fields changing and are not
            // routed anywhere; only `out_` events drive the FIFO.
            block.params_mut().drain_events();
        }

        let is_input = block.wait_for_input();

        if !can_execute {
            // Drain only: the record's values are already applied above,
            // but nothing actually runs, so there is nothing to pause on
            // (a pause means `prepare()` asked to wait, which never
            // happened here).
            return Ok(None);
        }

        let mut context = (self.context_factory)();
        context.enter(block);

        let outcome = if is_input && !restart {
            block.prepare()
        } else if restart {
            block.execute()
        } else {
            block.prepare().and_then(|()| block.execute())
        };

        let result = context.exit(block, &self.cancelled, outcome);

        if result.is_ok() {
            let produced = block.params_mut().drain_events();
            self.route(&dst, produced);
        }

        result?;

        if is_input && !restart {
            Ok(Some(dst))
        } else {
            Ok(None)
        }
    }

    /// Translate a block's freshly-produced `out_` change events into
    /// merged pending updates for every connected destination.
    fn route(&mut self, src: &str, events: Vec<crate::param::ChangeEvent>) {
        if events.is_empty() {
            return;
        }

        let changed_fields: std::collections::HashSet<&str> =
            events.iter().map(|e| e.field.as_str()).collect();

        // (dst, dst_field, value) for every connection whose source
        // field just changed.
        let mut deliveries: Vec<(String, String, Value)> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.src == src) {
            for conn in &edge.conns {
                if changed_fields.contains(conn.src_field.as_str()) {
                    let value = events
                        .iter()
                        .rev()
                        .find(|e| e.field == conn.src_field)
                        .map(|e| e.new.clone())
                        .unwrap_or(Value::Null);
                    deliveries.push((edge.dst.clone(), conn.dst_field.clone(), value));
                }
            }
        }

        for (dst, dst_field, value) in deliveries {
            if let Some(existing) = self.pending.iter_mut().find(|u| u.dst == dst) {
                existing.values.insert(dst_field, value);
            } else {
                let mut values = BTreeMap::new();
                values.insert(dst_field, value);
                self.pending.push_back(PendingUpdate {
                    dst,
                    values,
                    restart: false,
                });
            }
        }
    }
}
