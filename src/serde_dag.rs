//! Serialization (`spec.md` §4.5, §6): dump a dag to a plain tree and
//! reconstruct one through the [`crate::library::Library`] registry.
//!
//! The dumped tree never carries user code — just the block keys,
//! their plain constructor arguments, and the connection list — so
//! `load_dag` depends on every referenced block key already being
//! resolvable in the library (`spec.md` §4.5: "provided the block
//! classes have not changed their `execute` semantics").

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dag::{BlockRef, Connection, Dag};
use crate::error::{FlowError, FlowResult};
use crate::library::Library;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DagMeta {
    #[serde(rename = "type")]
    pub dag_type: String,
    pub site: String,
    pub title: String,
    pub doc: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author: Option<String>,
    #[serde(default = "default_true")]
    pub show_doc: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDump {
    pub block: String,
    pub instance: u32,
    pub args: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnArg {
    pub src_param_name: String,
    pub dst_param_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDump {
    pub src: u32,
    pub dst: u32,
    pub conn_args: Vec<ConnArg>,
}

/// The plain tree `spec.md` §4.5/§6 describes. Round-trips through
/// JSON (`to_json`/`from_json`) or hands straight to `Library::load_dag`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DagDump {
    pub dag: DagMeta,
    pub blocks: Vec<BlockDump>,
    pub connections: Vec<ConnectionDump>,
}

impl DagDump {
    pub fn to_json(&self) -> FlowResult<String> {
        serde_json::to_string_pretty(self).map_err(FlowError::from)
    }

    pub fn from_json(text: &str) -> FlowResult<Self> {
        serde_json::from_str(text).map_err(FlowError::from)
    }
}

impl Dag {
    /// Reduce this dag to a plain tree (`spec.md` §4.5). Block
    /// instance numbers are assigned in edge-traversal order, matching
    /// the original's `block_instances` walk, so that two dumps of an
    /// unchanged dag always agree.
    pub fn dump(&self) -> DagDump {
        let mut instance_of: IndexMap<String, u32> = IndexMap::new();
        let mut next = 0u32;
        for edge in &self.edges {
            for name in [&edge.src, &edge.dst] {
                if !instance_of.contains_key(name.as_str()) {
                    instance_of.insert(name.clone(), next);
                    next += 1;
                }
            }
        }

        let mut blocks: Vec<BlockDump> = instance_of
            .iter()
            .map(|(name, &instance)| {
                let block = self.blocks.get(name.as_str()).expect("dumped name is a known block");
                let mut args = block.describe_args();
                args.insert("name".to_string(), Value::Str(name.clone()));
                BlockDump {
                    block: block.block_key().to_string(),
                    instance,
                    args,
                }
            })
            .collect();
        blocks.sort_by_key(|b| b.instance);

        let connections = self
            .edges
            .iter()
            .map(|edge| ConnectionDump {
                src: instance_of[edge.src.as_str()],
                dst: instance_of[edge.dst.as_str()],
                conn_args: edge
                    .conns
                    .iter()
                    .map(|c| ConnArg {
                        src_param_name: c.src_field.clone(),
                        dst_param_name: c.dst_field.clone(),
                    })
                    .collect(),
            })
            .collect();

        DagDump {
            dag: DagMeta {
                dag_type: "Dag".to_string(),
                site: self.site.clone(),
                title: self.title.clone(),
                doc: self.doc.clone(),
                author: self.author.clone(),
                show_doc: self.show_doc,
            },
            blocks,
            connections,
        }
    }
}

impl Library {
    /// Reconstruct a dag from a dump produced by [`Dag::dump`],
    /// instantiating every block through the registry by its saved
    /// `block` key and `args` (`spec.md` §4.5).
    pub fn load_dag(dump: &DagDump) -> FlowResult<Dag> {
        let mut dag = Dag::new(dump.dag.site.clone(), dump.dag.title.clone(), dump.dag.doc.clone())
            .with_show_doc(dump.dag.show_doc);
        if let Some(author) = &dump.dag.author {
            dag = dag.with_author(author.clone());
        }

        let mut instances: BTreeMap<u32, Option<Box<dyn crate::block::Block>>> = BTreeMap::new();
        let mut names: BTreeMap<u32, String> = BTreeMap::new();
        for b in &dump.blocks {
            if instances.contains_key(&b.instance) {
                return Err(FlowError::structural(format!(
                    "instance {} ({}) already exists",
                    b.instance, b.block
                )));
            }
            let factory = Library::get_block(&b.block)?;
            let block = factory(b.args.clone())?;
            names.insert(b.instance, block.name().to_string());
            instances.insert(b.instance, Some(block));
        }

        for conn in &dump.connections {
            let conns: FlowResult<Vec<Connection>> = conn
                .conn_args
                .iter()
                .map(|c| Connection::new(c.src_param_name.clone(), c.dst_param_name.clone()))
                .collect();
            let conns = conns?;

            let src_ref = take_block_ref(&mut instances, &names, conn.src)?;
            let dst_ref = take_block_ref(&mut instances, &names, conn.dst)?;
            dag.connect(src_ref, dst_ref, conns)?;
        }

        Ok(dag)
    }
}

fn take_block_ref(
    instances: &mut BTreeMap<u32, Option<Box<dyn crate::block::Block>>>,
    names: &BTreeMap<u32, String>,
    instance: u32,
) -> FlowResult<BlockRef> {
    let slot = instances
        .get_mut(&instance)
        .ok_or_else(|| FlowError::structural(format!("connection refers to unknown instance {instance}")))?;

    if let Some(block) = slot.take() {
        Ok(BlockRef::New(block))
    } else {
        Ok(BlockRef::Existing(names[&instance].clone()))
    }
}
