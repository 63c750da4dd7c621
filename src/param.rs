//! The parameter model (`spec.md` §4.1).
//!
//! A [`ParamTable`] is the dynamic field store embedded in every
//! block (see [`crate::block::BlockBase`]). Parameter names are
//! partitioned by prefix — `in_…`, `out_…`, everything else is
//! block-internal — and every assignment is validated against the
//! field's declared [`ParamSpec`] before it takes effect.
//!
//! Unlike the Python original, a block's own `execute()` can't
//! register a watcher closure that reaches back into the owning
//! `Dag` without `Rc<RefCell<_>>` aliasing — ownership alone already
//! prevents the reentrant-assignment hazard the spec warns about.
//! Instead the `Dag` drains each block's [`ChangeEvent`] log right
//! after every field mutation (see `crate::dag::executor`) and
//! routes the events to connected destinations itself. The `watch`/
//! `trigger` API below remains for any other subscriber (e.g. a GUI
//! layer) that wants synchronous, batched notification of field
//! changes.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use crate::error::{FlowError, FlowResult};
use crate::value::{ParamType, Value};

#[derive(Clone, Debug)]
pub enum Constraint {
    /// The value, rendered as a string, must match this regex.
    Regex(String),
    /// The value, as a real number, must fall within `[min, max]`.
    Range(f64, f64),
}

impl Constraint {
    fn check(&self, name: &str, value: &Value) -> FlowResult<()> {
        match self {
            Constraint::Regex(pattern) => {
                let re = Regex::new(pattern).map_err(|e| {
                    FlowError::validation(name, format!("invalid constraint regex: {e}"))
                })?;
                let text = match value {
                    Value::Str(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                if re.is_match(&text) {
                    Ok(())
                } else {
                    Err(FlowError::validation(
                        name,
                        format!("value {text:?} does not match pattern /{pattern}/"),
                    ))
                }
            }
            Constraint::Range(min, max) => {
                let n = value.as_real().ok_or_else(|| {
                    FlowError::validation(name, "range constraint requires a numeric value")
                })?;
                if n >= *min && n <= *max {
                    Ok(())
                } else {
                    Err(FlowError::validation(
                        name,
                        format!("value {n} is outside range [{min}, {max}]"),
                    ))
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub default: Value,
    pub constraint: Option<Constraint>,
    pub doc: String,
    /// A source field with `allow_refs == true` cannot be wired as the
    /// source end of a connection (`spec.md` §3).
    pub allow_refs: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            default,
            constraint: None,
            doc: String::new(),
            allow_refs: false,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_allow_refs(mut self, allow_refs: bool) -> Self {
        self.allow_refs = allow_refs;
        self
    }

    pub fn is_input(&self) -> bool {
        self.name.starts_with("in_")
    }

    pub fn is_output(&self) -> bool {
        self.name.starts_with("out_")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

pub type ChangeBatch = Vec<ChangeEvent>;

struct Watcher {
    fields: HashSet<String>,
    callback: Box<dyn FnMut(&ChangeBatch) + Send>,
}

/// The dynamic field store backing a block.
pub struct ParamTable {
    specs: BTreeMap<String, ParamSpec>,
    values: BTreeMap<String, Value>,
    /// Change events accumulated since the last `drain_events()`. The
    /// owning `Dag` drains this after every field mutation to route
    /// updates to downstream blocks.
    pending_events: Vec<ChangeEvent>,
    watchers: Vec<Watcher>,
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamTable {
    pub fn new() -> Self {
        Self {
            specs: BTreeMap::new(),
            values: BTreeMap::new(),
            pending_events: Vec::new(),
            watchers: Vec::new(),
        }
    }

    /// Declare a parameter. Calling this twice for the same name
    /// replaces the spec and resets the stored value to the new
    /// default — block constructors are expected to call this once
    /// per declared field before the block is used.
    pub fn register(&mut self, spec: ParamSpec) {
        self.values.insert(spec.name.clone(), spec.default.clone());
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn specs(&self) -> impl Iterator<Item = &ParamSpec> {
        self.specs.values()
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.get(name)
    }

    pub fn get(&self, name: &str) -> FlowResult<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| FlowError::structural(format!("no such parameter '{name}'")))
    }

    /// Assign one field. Equivalent to a single-entry `update()`.
    pub fn set(&mut self, name: &str, value: Value) -> FlowResult<()> {
        let mut values = BTreeMap::new();
        values.insert(name.to_string(), value);
        self.update(values)
    }

    /// Assign several fields atomically: every field is validated
    /// before any value is stored, and all resulting change events
    /// are delivered to watchers as a single batch (`spec.md` §4.1).
    pub fn update(&mut self, values: BTreeMap<String, Value>) -> FlowResult<()> {
        for (name, value) in &values {
            self.validate(name, value)?;
        }

        let mut batch = Vec::with_capacity(values.len());
        for (name, value) in values {
            let old = self.values.get(&name).cloned().unwrap_or(Value::Null);
            self.values.insert(name.clone(), value.clone());
            batch.push(ChangeEvent {
                field: name,
                old,
                new: value,
            });
        }

        self.pending_events.extend(batch.iter().cloned());
        self.notify(&batch);

        Ok(())
    }

    /// Emit a change event for `name` without changing its value,
    /// e.g. to force a downstream block to re-run with the current
    /// value.
    pub fn trigger(&mut self, name: &str) -> FlowResult<()> {
        let current = self.get(name)?.clone();
        let batch = vec![ChangeEvent {
            field: name.to_string(),
            old: current.clone(),
            new: current,
        }];
        self.pending_events.extend(batch.iter().cloned());
        self.notify(&batch);

        Ok(())
    }

    fn validate(&self, name: &str, value: &Value) -> FlowResult<()> {
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| FlowError::validation(name, format!("no such parameter '{name}'")))?;

        if !value.matches(&spec.ty) {
            return Err(FlowError::validation(
                name,
                format!(
                    "expected a {} value for '{name}', got {:?}",
                    spec.ty, value
                ),
            ));
        }

        if let Some(constraint) = &spec.constraint {
            constraint.check(name, value)?;
        }

        Ok(())
    }

    /// Register a subscriber for one or more fields. The callback is
    /// invoked synchronously, once per batch, whenever any watched
    /// field changes.
    pub fn watch(&mut self, fields: &[&str], callback: impl FnMut(&ChangeBatch) + Send + 'static) {
        self.watchers.push(Watcher {
            fields: fields.iter().map(|s| s.to_string()).collect(),
            callback: Box::new(callback),
        });
    }

    fn notify(&mut self, batch: &ChangeBatch) {
        let changed: HashSet<&str> = batch.iter().map(|e| e.field.as_str()).collect();
        for watcher in self.watchers.iter_mut() {
            if watcher.fields.iter().any(|f| changed.contains(f.as_str())) {
                (watcher.callback)(batch);
            }
        }
    }

    /// Take and clear the events accumulated since the last drain.
    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
