//! YAML dag loading (ambient, `SPEC_FULL.md` §1.3), feature-gated
//! behind `yaml` the way the teacher gates its own YAML-backed config
//! loading behind `[features] yaml = ["dep:yaml-rust"]`.
//!
//! This is a convenience on top of the programmatic API, not a
//! replacement for it: a YAML file describes the same tree
//! [`crate::serde_dag::DagDump`] does, and loading one is just parsing
//! YAML into that tree and handing it to
//! [`crate::library::Library::load_dag`].

use std::collections::BTreeMap;
use std::fs;

use yaml_rust::{Yaml, YamlLoader};

use crate::error::{FlowError, FlowResult};
use crate::library::Library;
use crate::serde_dag::{BlockDump, ConnArg, ConnectionDump, DagDump, DagMeta};
use crate::value::Value;

pub fn load_dag_from_yaml_file(path: &str) -> FlowResult<crate::dag::Dag> {
    let text = fs::read_to_string(path).map_err(|e| FlowError::Parse(format!("reading '{path}': {e}")))?;
    load_dag_from_yaml_str(&text)
}

pub fn load_dag_from_yaml_str(text: &str) -> FlowResult<crate::dag::Dag> {
    let dump = parse_dag_dump(text)?;
    Library::load_dag(&dump)
}

pub fn parse_dag_dump(text: &str) -> FlowResult<DagDump> {
    let docs = YamlLoader::load_from_str(text).map_err(|e| FlowError::Parse(e.to_string()))?;
    let doc = docs
        .first()
        .ok_or_else(|| FlowError::Parse("empty YAML document".to_string()))?;

    let dag_node = field(doc, "dag")?;
    let dag = DagMeta {
        dag_type: string_field(dag_node, "type").unwrap_or_else(|_| "Dag".to_string()),
        site: string_field(dag_node, "site")?,
        title: string_field(dag_node, "title")?,
        doc: string_field(dag_node, "doc")?,
        author: string_field(dag_node, "author").ok(),
        show_doc: bool_field(dag_node, "show_doc").unwrap_or(true),
    };

    let blocks = field(doc, "blocks")?
        .as_vec()
        .ok_or_else(|| FlowError::Parse("'blocks' must be a list".to_string()))?
        .iter()
        .map(parse_block)
        .collect::<FlowResult<Vec<_>>>()?;

    let connections = field(doc, "connections")?
        .as_vec()
        .ok_or_else(|| FlowError::Parse("'connections' must be a list".to_string()))?
        .iter()
        .map(parse_connection)
        .collect::<FlowResult<Vec<_>>>()?;

    Ok(DagDump {
        dag,
        blocks,
        connections,
    })
}

fn parse_block(node: &Yaml) -> FlowResult<BlockDump> {
    let instance = int_field(node, "instance")? as u32;
    let block = string_field(node, "block")?;
    let args_node = field(node, "args")?;
    let args_hash = args_node
        .as_hash()
        .ok_or_else(|| FlowError::Parse(format!("block '{block}' args must be a mapping")))?;

    let mut args = BTreeMap::new();
    for (k, v) in args_hash {
        let key = k
            .as_str()
            .ok_or_else(|| FlowError::Parse("block arg keys must be strings".to_string()))?
            .to_string();
        args.insert(key, yaml_to_value(v));
    }

    Ok(BlockDump { block, instance, args })
}

fn parse_connection(node: &Yaml) -> FlowResult<ConnectionDump> {
    let src = int_field(node, "src")? as u32;
    let dst = int_field(node, "dst")? as u32;
    let conn_args = field(node, "conn_args")?
        .as_vec()
        .ok_or_else(|| FlowError::Parse("'conn_args' must be a list".to_string()))?
        .iter()
        .map(|c| {
            Ok(ConnArg {
                src_param_name: string_field(c, "src_param_name")?,
                dst_param_name: string_field(c, "dst_param_name")?,
            })
        })
        .collect::<FlowResult<Vec<_>>>()?;

    Ok(ConnectionDump { src, dst, conn_args })
}

fn field<'a>(node: &'a Yaml, name: &str) -> FlowResult<&'a Yaml> {
    let value = &node[name];
    if value.is_badvalue() {
        Err(FlowError::Parse(format!("missing field '{name}'")))
    } else {
        Ok(value)
    }
}

fn string_field(node: &Yaml, name: &str) -> FlowResult<String> {
    field(node, name)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| FlowError::Parse(format!("field '{name}' must be a string")))
}

fn int_field(node: &Yaml, name: &str) -> FlowResult<i64> {
    field(node, name)?
        .as_i64()
        .ok_or_else(|| FlowError::Parse(format!("field '{name}' must be an integer")))
}

fn bool_field(node: &Yaml, name: &str) -> FlowResult<bool> {
    field(node, name)?
        .as_bool()
        .ok_or_else(|| FlowError::Parse(format!("field '{name}' must be a boolean")))
}

fn yaml_to_value(node: &Yaml) -> Value {
    match node {
        Yaml::Integer(i) => Value::Int(*i),
        Yaml::Real(s) => s.parse::<f64>().map(Value::Real).unwrap_or(Value::Null),
        Yaml::Boolean(b) => Value::Bool(*b),
        Yaml::String(s) => Value::Str(s.clone()),
        Yaml::Array(items) => {
            let rows = items
                .iter()
                .map(|item| match item {
                    Yaml::Hash(_) => yaml_hash_to_row(item),
                    other => {
                        let mut row = BTreeMap::new();
                        row.insert("value".to_string(), yaml_to_value(other));
                        row
                    }
                })
                .collect();
            Value::Table(rows)
        }
        Yaml::Hash(_) => Value::Table(vec![yaml_hash_to_row(node)]),
        Yaml::Null | Yaml::BadValue => Value::Null,
        Yaml::Alias(_) => Value::Null,
    }
}

fn yaml_hash_to_row(node: &Yaml) -> BTreeMap<String, Value> {
    let mut row = BTreeMap::new();
    if let Some(hash) = node.as_hash() {
        for (k, v) in hash {
            if let Some(key) = k.as_str() {
                row.insert(key.to_string(), yaml_to_value(v));
            }
        }
    }
    row
}
