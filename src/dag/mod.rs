//! The Dag (`spec.md` §3, §4.3.1): a set of blocks and a sequence of
//! edges, plus the FIFO-driven executor (§4.3.2–§4.3.5).
//!
//! Ownership note: the Python original lets two pieces of calling
//! code share a mutable reference to the same block object, and the
//! dag "subscribes" to it from the outside. Rust ownership makes that
//! awkward without `Rc<RefCell<_>>`, so blocks are moved into the dag
//! the first time they appear in a `connect()` call (see
//! [`BlockRef`]); later edges referring to the same block pass its
//! name instead. This is a calling-convention change only — every
//! invariant and the FIFO/merge semantics are unchanged from §3/§4.3.

pub mod connection;
pub mod context;
mod executor;

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

pub use connection::Connection;
pub use context::{DefaultContext, ExecutionContext};
pub use executor::PendingUpdate;

use crate::block::Block;
use crate::error::{FlowError, FlowResult};

/// Either a brand-new block (moved into the dag by this call) or the
/// name of a block the dag already owns.
pub enum BlockRef {
    New(Box<dyn Block>),
    Existing(String),
}

impl From<Box<dyn Block>> for BlockRef {
    fn from(b: Box<dyn Block>) -> Self {
        BlockRef::New(b)
    }
}

impl From<&str> for BlockRef {
    fn from(name: &str) -> Self {
        BlockRef::Existing(name.to_string())
    }
}

impl From<String> for BlockRef {
    fn from(name: String) -> Self {
        BlockRef::Existing(name)
    }
}

pub(crate) struct Edge {
    pub src: String,
    pub dst: String,
    pub conns: Vec<Connection>,
}

pub struct Dag {
    pub site: String,
    pub title: String,
    pub doc: String,
    pub author: Option<String>,
    pub show_doc: bool,

    pub(crate) blocks: IndexMap<String, Box<dyn Block>>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) pending: VecDeque<PendingUpdate>,
    pub(crate) cancelled: Arc<AtomicBool>,
    pub(crate) context_factory: Arc<dyn Fn() -> Box<dyn ExecutionContext> + Send + Sync>,
}

impl Dag {
    pub fn new(site: impl Into<String>, title: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            title: title.into(),
            doc: doc.into(),
            author: None,
            show_doc: true,
            blocks: IndexMap::new(),
            edges: Vec::new(),
            pending: VecDeque::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            context_factory: context::default_context_factory(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_show_doc(mut self, show_doc: bool) -> Self {
        self.show_doc = show_doc;
        self
    }

    pub fn with_context_factory(
        mut self,
        factory: impl Fn() -> Box<dyn ExecutionContext> + Send + Sync + 'static,
    ) -> Self {
        self.context_factory = Arc::new(factory);
        self
    }

    pub fn block_by_name(&self, name: &str) -> Option<&dyn Block> {
        self.blocks.get(name).map(|b| b.as_ref())
    }

    pub fn block_by_name_mut(&mut self, name: &str) -> Option<&mut (dyn Block + 'static)> {
        self.blocks.get_mut(name).map(|b| b.as_mut())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// `stop()` (§4.3.5): request cancellation. Safe to call from
    /// another thread while `execute()` is running.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn unstop(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// A cheaply cloneable handle onto this dag's cancellation flag
    /// (`spec.md` §5: "External threads may call `stop`/`unstop`"),
    /// for a caller that needs to request cancellation from a thread
    /// other than the one running `execute()` (which owns the `Dag`
    /// for the duration of the call). Mirrors the original's
    /// `_Stopper` helper.
    pub fn stopper(&self) -> Stopper {
        Stopper(self.cancelled.clone())
    }

    /// Add an edge between `src` and `dst`, enforcing every structural
    /// invariant in `spec.md` §3 before mutating anything.
    pub fn connect(
        &mut self,
        src: impl Into<BlockRef>,
        dst: impl Into<BlockRef>,
        conns: Vec<Connection>,
    ) -> FlowResult<()> {
        let src = src.into();
        let dst = dst.into();

        let src_name = match &src {
            BlockRef::New(b) => b.name().to_string(),
            BlockRef::Existing(n) => n.clone(),
        };
        let dst_name = match &dst {
            BlockRef::New(b) => b.name().to_string(),
            BlockRef::Existing(n) => n.clone(),
        };

        if src_name == dst_name {
            return Err(FlowError::structural(format!(
                "a block cannot connect to itself: '{src_name}'"
            )));
        }

        // Resolve the two blocks' param tables for field validation,
        // without yet inserting a brand-new block into `self.blocks`.
        {
            let src_block: &dyn Block = match &src {
                BlockRef::New(b) => b.as_ref(),
                BlockRef::Existing(n) => self.blocks.get(n.as_str()).map(|b| b.as_ref()).ok_or_else(
                    || FlowError::structural(format!("no such block '{n}' in this dag")),
                )?,
            };
            let dst_block: &dyn Block = match &dst {
                BlockRef::New(b) => b.as_ref(),
                BlockRef::Existing(n) => self.blocks.get(n.as_str()).map(|b| b.as_ref()).ok_or_else(
                    || FlowError::structural(format!("no such block '{n}' in this dag")),
                )?,
            };

            if conns.is_empty() {
                return Err(FlowError::structural(
                    "connect() requires at least one Connection",
                ));
            }

            for conn in &conns {
                let src_spec = src_block.params().spec(&conn.src_field).ok_or_else(|| {
                    FlowError::structural(format!(
                        "block '{src_name}' has no output field '{}'",
                        conn.src_field
                    ))
                })?;
                if src_spec.allow_refs {
                    return Err(FlowError::structural(format!(
                        "source field '{src_name}.{}' must not allow refs",
                        conn.src_field
                    )));
                }
                dst_block.params().spec(&conn.dst_field).ok_or_else(|| {
                    FlowError::structural(format!(
                        "block '{dst_name}' has no input field '{}'",
                        conn.dst_field
                    ))
                })?;
            }
        }

        // Uniqueness of brand-new block names.
        if let BlockRef::New(b) = &src {
            if self.blocks.contains_key(b.name()) {
                return Err(FlowError::structural(format!(
                    "a block named '{}' already exists in this dag",
                    b.name()
                )));
            }
        }
        if let BlockRef::New(b) = &dst {
            if self.blocks.contains_key(b.name()) {
                return Err(FlowError::structural(format!(
                    "a block named '{}' already exists in this dag",
                    b.name()
                )));
            }
        }

        // No duplicate edge.
        if self
            .edges
            .iter()
            .any(|e| e.src == src_name && e.dst == dst_name)
        {
            return Err(FlowError::structural(format!(
                "'{src_name}' and '{dst_name}' are already connected"
            )));
        }

        // A new edge into a non-empty dag must touch an existing block.
        if !self.blocks.is_empty()
            && !self.blocks.contains_key(src_name.as_str())
            && !self.blocks.contains_key(dst_name.as_str())
        {
            return Err(FlowError::structural(
                "a new connection must touch a block already in the dag",
            ));
        }

        // No cycle: simulate the trial edge set over block names.
        let mut trial_edges: Vec<(String, String)> =
            self.edges.iter().map(|e| (e.src.clone(), e.dst.clone())).collect();
        trial_edges.push((src_name.clone(), dst_name.clone()));
        if has_cycle(&trial_edges) {
            return Err(FlowError::structural(
                "this connection would create a cycle",
            ));
        }

        // Everything checked out: commit.
        if let BlockRef::New(b) = src {
            self.blocks.insert(src_name.clone(), b);
        }
        if let BlockRef::New(b) = dst {
            self.blocks.insert(dst_name.clone(), b);
        }
        self.edges.push(Edge {
            src: src_name,
            dst: dst_name,
            conns,
        });

        Ok(())
    }

    /// Remove a block and every edge touching it. Fails (without
    /// changing anything) if doing so would split the dag into more
    /// than one weakly-connected piece.
    pub fn disconnect(&mut self, name: &str) -> FlowResult<()> {
        if !self.blocks.contains_key(name) {
            return Err(FlowError::structural(format!("no such block '{name}'")));
        }

        let residual: Vec<(String, String)> = self
            .edges
            .iter()
            .filter(|e| e.src != name && e.dst != name)
            .map(|e| (e.src.clone(), e.dst.clone()))
            .collect();

        let remaining_names: Vec<&str> = self
            .blocks
            .keys()
            .map(|s| s.as_str())
            .filter(|&n| n != name)
            .collect();

        if connected_components(&remaining_names, &residual) > 1 {
            return Err(FlowError::structural(format!(
                "removing '{name}' would split the dag"
            )));
        }

        self.edges.retain(|e| e.src != name && e.dst != name);
        self.blocks.shift_remove(name);

        Ok(())
    }

    /// The blocks with no incoming edge, and the blocks with no
    /// outgoing edge.
    pub fn heads_and_tails(&self) -> (Vec<String>, Vec<String>) {
        let has_incoming: HashSet<&str> = self.edges.iter().map(|e| e.dst.as_str()).collect();
        let has_outgoing: HashSet<&str> = self.edges.iter().map(|e| e.src.as_str()).collect();

        let heads = self
            .blocks
            .keys()
            .filter(|n| !has_incoming.contains(n.as_str()))
            .cloned()
            .collect();
        let tails = self
            .blocks
            .keys()
            .filter(|n| !has_outgoing.contains(n.as_str()))
            .cloned()
            .collect();

        (heads, tails)
    }

    pub fn has_cycle(&self) -> bool {
        let edges: Vec<(String, String)> =
            self.edges.iter().map(|e| (e.src.clone(), e.dst.clone())).collect();
        has_cycle(&edges)
    }

    /// Topological order of every block, ties broken by name
    /// (`spec.md` §4.3.1: "a deterministic order").
    pub fn get_sorted(&self) -> FlowResult<Vec<&str>> {
        let edges: Vec<(String, String)> =
            self.edges.iter().map(|e| (e.src.clone(), e.dst.clone())).collect();
        let all_names: Vec<&str> = self.blocks.keys().map(|s| s.as_str()).collect();

        topological_sort(&all_names, &edges)
            .ok_or_else(|| FlowError::structural("dag contains a cycle"))
    }

    /// Render a block's and its dag's documentation as plain text
    /// (ambient feature carried from `original_source/_util.py`; the
    /// rendering itself, not a GUI, so it stays in the engine).
    pub fn doc_text(&self) -> String {
        let mut text = format!("# {} - {}\n\n{}", self.site, self.title, self.doc.trim());
        if let Some(author) = &self.author {
            text.push_str(&format!("\n\nAuthor: {author}"));
        }
        text
    }
}

/// A cloneable cancellation switch detached from the rest of a
/// [`Dag`], for crossing a thread boundary (`spec.md` §5).
#[derive(Clone)]
pub struct Stopper(Arc<AtomicBool>);

impl Stopper {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn unstop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub fn block_doc_text(block: &dyn Block) -> String {
    let mut params: Vec<(&str, &str)> = block
        .params()
        .specs()
        .filter(|s| s.is_input() || s.is_output())
        .map(|s| (s.name.as_str(), s.doc.as_str()))
        .collect();
    params.sort();

    let mut text = format!("## {}\n\n### Params\n", block.name());
    for (name, doc) in params {
        text.push_str(&format!("- {name}: {doc}\n"));
    }

    text
}

fn has_cycle(edges: &[(String, String)]) -> bool {
    let names: HashSet<&str> = edges
        .iter()
        .flat_map(|(s, d)| [s.as_str(), d.as_str()])
        .collect();
    let names: Vec<&str> = names.into_iter().collect();
    topological_sort(&names, edges).is_none()
}

/// Kahn's algorithm, ties broken lexicographically by node name.
fn topological_sort<'a>(
    nodes: &[&'a str],
    edges: &[(String, String)],
) -> Option<Vec<&'a str>> {
    let mut indegree: BTreeMap<&str, usize> = nodes.iter().map(|&n| (n, 0)).collect();
    for (_, d) in edges {
        if let Some(c) = indegree.get_mut(d.as_str()) {
            *c += 1;
        }
    }

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, &c)| c == 0)
        .map(|(&n, _)| n)
        .collect();
    ready.sort_unstable();

    let mut remaining_edges: Vec<(&str, &str)> =
        edges.iter().map(|(s, d)| (s.as_str(), d.as_str())).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(pos) = ready.iter().position(|_| true).filter(|_| !ready.is_empty()) {
        // Always take the lexicographically smallest ready node.
        ready[pos..].sort_unstable();
        let n = ready.remove(0);
        let original = nodes.iter().find(|&&x| x == n).copied().unwrap_or(n);
        order.push(original);

        let mut newly_ready = Vec::new();
        remaining_edges.retain(|&(s, d)| {
            if s == n {
                if let Some(c) = indegree.get_mut(d) {
                    *c -= 1;
                    if *c == 0 {
                        newly_ready.push(d);
                    }
                }
                false
            } else {
                true
            }
        });
        newly_ready.sort_unstable();
        ready.extend(newly_ready);
    }

    if remaining_edges.is_empty() {
        Some(order)
    } else {
        None
    }
}

/// Number of weakly-connected components among `nodes`, considering
/// only `edges` as undirected.
fn connected_components(nodes: &[&str], edges: &[(String, String)]) -> usize {
    if nodes.is_empty() {
        return 0;
    }

    let mut adjacency: BTreeMap<&str, Vec<&str>> = nodes.iter().map(|&n| (n, Vec::new())).collect();
    for (s, d) in edges {
        if let (Some(_), Some(_)) = (adjacency.get(s.as_str()), adjacency.get(d.as_str())) {
            adjacency.get_mut(s.as_str()).unwrap().push(d.as_str());
            adjacency.get_mut(d.as_str()).unwrap().push(s.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components = 0;

    for &node in nodes {
        if visited.contains(node) {
            continue;
        }
        components += 1;
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if !visited.insert(n) {
                continue;
            }
            if let Some(neighbors) = adjacency.get(n) {
                for &next in neighbors {
                    if !visited.contains(next) {
                        stack.push(next);
                    }
                }
            }
        }
    }

    components
}
