//! Execution input resolution
//!
//! Computes the `inputData` map a node execution needs by reading the
//! already-resolved state of its upstream neighbours. Nothing is executed
//! here: upstream nodes are expected to be completed (their value lives in
//! `cachedOutput`) or to be leaf input nodes (their value lives in
//! `parameters`).
//!
//! For each incoming edge the precedence is:
//!
//! 1. `cachedOutput[sourcePortId]`, then the fallback key tables
//! 2. the same search over `parameters`
//!
//! The first meaningful value (see [`is_valid_value`]) wins. Arrays feeding
//! single-value ports are collapsed to their first element, and the value is
//! written under the target port id plus the alias keys of the port's family.
//! Edges whose source has nothing meaningful contribute nothing.

pub mod families;
pub mod value;

use serde_json::Value;

use crate::constants::keys;
use crate::error::{EngineError, Result};
use crate::types::{Board, Edge, Node, ValueMap};

pub use families::{is_single_value_port, KeyFamily, PortFamily};
pub use value::{is_valid_value, story_text, take_single};

/// Resolve the runtime inputs of a node from the board snapshot
pub fn resolve_inputs(board: &Board, node_id: &str) -> Result<ValueMap> {
    let target = board
        .find_node(node_id)
        .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))?;

    let mut input_data = ValueMap::new();
    for edge in board.incoming_edges(node_id) {
        let Some((family, value)) = resolve_edge(board, target, edge) else {
            log::debug!(
                "Edge '{}' into '{}' carries no meaningful value",
                edge.id,
                node_id
            );
            continue;
        };
        write_with_aliases(&mut input_data, edge.target_key(), family, value);
    }
    Ok(input_data)
}

/// Value an edge delivers, already shaped for its target port
pub fn upstream_value(board: &Board, edge: &Edge) -> Option<Value> {
    let target = board.find_node(&edge.target_node_id)?;
    resolve_edge(board, target, edge).map(|(_, value)| value)
}

fn resolve_edge(board: &Board, target: &Node, edge: &Edge) -> Option<(PortFamily, Value)> {
    let source = board.find_node(&edge.source_node_id)?;
    let target_key = edge.target_key();
    let family = PortFamily::classify(target_key, target.input(target_key).map(|p| &p.port_type));

    let value = source_value(source, edge.source_port_id.as_deref(), family.preferred_keys())?;
    let value = if is_single_value_port(target_key) {
        take_single(value)
    } else {
        value
    };
    Some((family, value))
}

/// Meaningful value published by a source node, cached output first
fn source_value(source: &Node, port_id: Option<&str>, preferred: Option<KeyFamily>) -> Option<Value> {
    source
        .non_empty_output()
        .and_then(|output| lookup(output, port_id, preferred))
        .or_else(|| lookup(&source.parameters, port_id, preferred))
}

/// Exact key first, then the fallback key tables
fn lookup(map: &ValueMap, port_id: Option<&str>, preferred: Option<KeyFamily>) -> Option<Value> {
    let exact = port_id
        .and_then(|key| map.get(key))
        .filter(|v| is_valid_value(v));
    if let Some(value) = exact {
        return Some(value.clone());
    }
    families::fallback_keys(preferred)
        .find_map(|key| map.get(key).filter(|v| is_valid_value(v)))
        .cloned()
}

/// Write the value under its port key and fill the family's alias keys
///
/// The port key always takes the latest value; aliases never overwrite a
/// key that is already present, so a directly wired port wins over an alias.
fn write_with_aliases(input_data: &mut ValueMap, target_key: &str, family: PortFamily, value: Value) {
    for alias in family.aliases().iter().filter(|alias| **alias != target_key) {
        let aliased = if PortFamily::is_list_alias(alias) {
            value::as_list(&value)
        } else if is_single_value_port(alias) {
            take_single(value.clone())
        } else {
            value.clone()
        };
        input_data.entry(alias.to_string()).or_insert(aliased);
    }

    if family == PortFamily::Story {
        if value.is_object() {
            input_data
                .entry(keys::STORY_OBJECT.to_string())
                .or_insert_with(|| value.clone());
        }
        let text = story_text(&value);
        if !text.is_empty() {
            input_data
                .entry(keys::STORY_CONTEXT.to_string())
                .or_insert(Value::String(text));
        }
    }

    input_data.insert(target_key.to_string(), value);
}
