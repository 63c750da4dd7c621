//! The library registry (`spec.md` §4.4, §6): a plugin-style lookup
//! from string keys to block/dag factories, used by [`serde_dag`]'s
//! `load_dag` and by the CLI binary's `list-blocks`/`list-dags`/`run`.
//!
//! The Python original discovers plugins via `importlib.metadata
//! .entry_points()` and imports a block's module lazily, the first
//! time `get_block()` is asked for it, to avoid importing every
//! installed block module up front. Rust has no runtime module
//! loading, so the "not imported yet" state has no direct analogue;
//! what survives is the two-phase shape — `collect_*()` walks
//! registered [`LibraryProvider`]s and records factory closures
//! without calling any of them, and `get_block`/`get_dag` is the only
//! place a factory is actually invoked (by `load_dag`, not by lookup
//! itself). A host crate registers its block/dag modules as providers
//! with [`Library::register_provider`] (typically once, at startup),
//! in place of the original's `entry_points(group='sier2.library')`
//! scan.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use indexmap::IndexMap;

use crate::block::Block;
use crate::dag::Dag;
use crate::error::{FlowError, FlowResult};
use crate::log;
use crate::value::Value;

/// One entry as a plugin advertises it: a dotted key plus a one-line
/// doc string (`spec.md` §6: "`Info{key, doc}`").
#[derive(Clone, Debug)]
pub struct Info {
    pub key: String,
    pub doc: String,
}

impl Info {
    pub fn new(key: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            doc: doc.into(),
        }
    }
}

/// Builds a block instance from its dumped constructor arguments
/// (`spec.md` §4.5's `args`, always including `name`).
pub type BlockFactory = Arc<dyn Fn(BTreeMap<String, Value>) -> FlowResult<Box<dyn Block>> + Send + Sync>;

/// Builds a fresh, empty dag of a known shape (`spec.md` §4.4: "dag
/// key → dag factory").
pub type DagFactory = Arc<dyn Fn() -> Dag + Send + Sync>;

/// A source of block/dag keys, standing in for one installed plugin
/// module (`spec.md` §6: "Each provider exposes two zero-arg
/// functions `blocks()` and/or `dags()`").
pub trait LibraryProvider: Send + Sync {
    fn blocks(&self) -> Vec<(Info, BlockFactory)> {
        Vec::new()
    }

    fn dags(&self) -> Vec<(Info, DagFactory)> {
        Vec::new()
    }
}

#[derive(Default)]
struct Registry {
    providers: Vec<Box<dyn LibraryProvider>>,
    blocks: IndexMap<String, (String, Option<BlockFactory>)>,
    dags: IndexMap<String, (String, Option<DagFactory>)>,
    blocks_collected: bool,
    dags_collected: bool,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::default()))
}

/// The registry itself: every method is a static function, mirroring
/// the original's module-level `_block_library`/`_dag_library` dicts
/// accessed through a `Library` class of static methods.
pub struct Library;

impl Library {
    /// Register a plugin source. Call this once per block/dag module a
    /// host application ships, before the first `execute`/`dump`/CLI
    /// invocation that needs the registry populated.
    pub fn register_provider(provider: impl LibraryProvider + 'static) {
        registry().lock().unwrap().providers.push(Box::new(provider));
    }

    /// Walk every registered provider's `blocks()` and record a (not
    /// yet invoked) factory per key. Duplicate keys are reported and
    /// dropped (`spec.md` §6).
    pub fn collect_blocks() {
        let mut reg = registry().lock().unwrap();
        if reg.blocks_collected {
            return;
        }
        reg.blocks_collected = true;

        let providers = std::mem::take(&mut reg.providers);
        for provider in &providers {
            for (info, factory) in provider.blocks() {
                if reg.blocks.contains_key(&info.key) {
                    log::warn(format!("block plugin: key '{}' already in library", info.key));
                } else {
                    reg.blocks.insert(info.key.clone(), (info.doc, Some(factory)));
                }
            }
        }
        reg.providers = providers;
    }

    pub fn collect_dags() {
        let mut reg = registry().lock().unwrap();
        if reg.dags_collected {
            return;
        }
        reg.dags_collected = true;

        let providers = std::mem::take(&mut reg.providers);
        for provider in &providers {
            for (info, factory) in provider.dags() {
                if reg.dags.contains_key(&info.key) {
                    log::warn(format!("dag plugin: key '{}' already in library", info.key));
                } else {
                    reg.dags.insert(info.key.clone(), (info.doc, Some(factory)));
                }
            }
        }
        reg.providers = providers;
    }

    /// Add a local block factory directly, bypassing provider
    /// discovery (`spec.md` §4.4: "useful for testing, for example").
    pub fn add_block(key: impl Into<String>, doc: impl Into<String>, factory: BlockFactory) -> FlowResult<()> {
        let key = key.into();
        let mut reg = registry().lock().unwrap();
        if reg.blocks.contains_key(&key) {
            return Err(FlowError::registry(format!("block '{key}' is already in the library")));
        }
        reg.blocks.insert(key, (doc.into(), Some(factory)));
        Ok(())
    }

    pub fn add_dag(key: impl Into<String>, doc: impl Into<String>, factory: DagFactory) -> FlowResult<()> {
        let key = key.into();
        let mut reg = registry().lock().unwrap();
        if reg.dags.contains_key(&key) {
            return Err(FlowError::registry(format!("dag '{key}' is already in the library")));
        }
        reg.dags.insert(key, (doc.into(), Some(factory)));
        Ok(())
    }

    /// Resolve `key` to a factory, collecting from providers on first
    /// use if nothing has been collected yet (`spec.md` §4.4).
    pub fn get_block(key: &str) -> FlowResult<BlockFactory> {
        Self::collect_blocks();
        let reg = registry().lock().unwrap();
        let (_, factory) = reg
            .blocks
            .get(key)
            .ok_or_else(|| FlowError::registry(format!("block '{key}' is not in the library")))?;
        factory
            .clone()
            .ok_or_else(|| FlowError::registry(format!("block '{key}' has no factory")))
    }

    pub fn get_dag(key: &str) -> FlowResult<DagFactory> {
        Self::collect_dags();
        let reg = registry().lock().unwrap();
        let (_, factory) = reg
            .dags
            .get(key)
            .ok_or_else(|| FlowError::registry(format!("dag '{key}' is not in the library")))?;
        factory
            .clone()
            .ok_or_else(|| FlowError::registry(format!("dag '{key}' has no factory")))
    }

    /// Resolve a dag key by exact match, or (if `name` has no `.`) by
    /// matching the last dotted segment, erroring on ambiguity
    /// (`original_source/src/sier2/_library.py::run_dag`, minus its
    /// GUI `.show()` step).
    pub fn run_dag(name: &str) -> FlowResult<Dag> {
        Self::collect_dags();
        let reg = registry().lock().unwrap();

        let key = if reg.dags.contains_key(name) {
            name.to_string()
        } else {
            let mut matches: Vec<&str> = reg
                .dags
                .keys()
                .filter(|k| k.rsplit('.').next() == Some(name))
                .map(|k| k.as_str())
                .collect();
            match matches.len() {
                0 => return Err(FlowError::registry(format!("no such dag '{name}'"))),
                1 => matches.remove(0).to_string(),
                _ => return Err(FlowError::registry(format!("ambiguous dag name '{name}': {matches:?}"))),
            }
        };

        let (_, factory) = reg.dags.get(&key).unwrap();
        let factory = factory
            .clone()
            .ok_or_else(|| FlowError::registry(format!("dag '{key}' has no factory")))?;
        drop(reg);
        Ok(factory())
    }

    /// List every collected block's key and doc, sorted by key.
    pub fn list_blocks(suffix: Option<&str>) -> Vec<Info> {
        Self::collect_blocks();
        let reg = registry().lock().unwrap();
        let mut out: Vec<Info> = reg
            .blocks
            .iter()
            .filter(|(k, _)| suffix.map(|s| k.ends_with(s)).unwrap_or(true))
            .map(|(k, (doc, _))| Info::new(k.clone(), doc.clone()))
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn list_dags(suffix: Option<&str>) -> Vec<Info> {
        Self::collect_dags();
        let reg = registry().lock().unwrap();
        let mut out: Vec<Info> = reg
            .dags
            .iter()
            .filter(|(k, _)| suffix.map(|s| k.ends_with(s)).unwrap_or(true))
            .map(|(k, (doc, _))| Info::new(k.clone(), doc.clone()))
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }
}
