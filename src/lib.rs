//! `flowgraph`: a dataflow graph engine.
//!
//! Compose typed, parameterized units ("blocks") into a directed
//! acyclic graph, then run the graph with a single-threaded
//! cooperative executor that understands event batching, input
//! pauses, cancellation, and error containment. See `SPEC_FULL.md` in
//! the repository root for the full design.
//!
//! The pieces, leaves first:
//! - [`value`] / [`param`] — the typed value and parameter model.
//! - [`block`] — the unit of work: named fields + `prepare`/`execute`.
//! - [`dag`] — the graph of blocks, its structural invariants, and the
//!   FIFO-driven executor.
//! - [`library`] — a key-to-factory registry used by `dump`/`load` and
//!   the CLI.
//! - [`serde_dag`] — the plain-tree serialization format.
//! - [`yaml`] (behind the `yaml` feature) — load a dag description
//!   from a YAML file.

pub mod block;
pub mod dag;
pub mod error;
pub mod library;
pub mod log;
pub mod param;
pub mod serde_dag;
pub mod value;

#[cfg(feature = "yaml")]
pub mod yaml;

pub use block::{Block, BlockBase, BlockState};
pub use dag::{Connection, Dag, DefaultContext, ExecutionContext};
pub use error::{FlowError, FlowResult};
pub use library::{Info, Library, LibraryProvider};
pub use param::{ChangeEvent, Constraint, ParamSpec, ParamTable};
pub use value::{ParamType, Row, Value};

pub use flowgraph_derive::Block;
