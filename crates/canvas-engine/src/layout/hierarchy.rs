//! Hierarchical (rank-based) auto-layout
//!
//! Pipeline: break cycles with a DFS, assign longest-path ranks, order each
//! rank by barycenters of its neighbours, then place ranks along the flow
//! direction. The result is snapped to the grid and anchored at the top-left
//! corner the laid-out nodes occupied before.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::geometry::{snap_position, Rect};
use crate::config::LayoutConfig;
use crate::constants;
use crate::types::{Board, NodeId, Position};

/// Flow direction of the laid-out graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
    #[serde(rename = "TB")]
    TopBottom,
    #[serde(rename = "BT")]
    BottomTop,
}

impl Direction {
    fn is_horizontal(&self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }

    fn is_reversed(&self) -> bool {
        matches!(self, Self::RightLeft | Self::BottomTop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoLayoutOptions {
    pub direction: Direction,
    /// Gap between siblings within a rank
    pub node_spacing: f64,
    /// Gap between consecutive ranks
    pub rank_spacing: f64,
    pub grid_size: f64,
    pub ordering_passes: usize,
}

impl Default for AutoLayoutOptions {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for AutoLayoutOptions {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            direction: config.direction,
            node_spacing: config.node_spacing,
            rank_spacing: config.rank_spacing,
            grid_size: config.grid_size,
            ordering_passes: constants::layout::ORDERING_PASSES,
        }
    }
}

struct WorkNode {
    id: NodeId,
    width: f64,
    height: f64,
    /// Cross-axis coordinate before layout, used for the initial ordering
    cross: f64,
    rank: usize,
    order: usize,
    x: f64,
    y: f64,
}

struct WorkEdge {
    from: usize,
    to: usize,
    reversed: bool,
}

/// Compute new positions for `subset` (or every node when `None`)
///
/// Only edges between laid-out nodes influence the result; nodes outside
/// the subset are neither moved nor considered. Returns positions in board
/// order.
pub fn auto_layout(
    board: &Board,
    subset: Option<&[NodeId]>,
    options: &AutoLayoutOptions,
) -> Vec<(NodeId, Position)> {
    let selected: Vec<_> = board
        .nodes
        .iter()
        .filter(|n| subset.map_or(true, |ids| ids.contains(&n.id)))
        .collect();
    if selected.is_empty() {
        return Vec::new();
    }

    let anchor = selected.iter().fold(
        Position::new(f64::INFINITY, f64::INFINITY),
        |acc, n| Position::new(acc.x.min(n.position.x), acc.y.min(n.position.y)),
    );

    let index: HashMap<&str, usize> = selected
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut nodes: Vec<WorkNode> = selected
        .iter()
        .map(|n| {
            let rect = Rect::of(n);
            WorkNode {
                id: n.id.clone(),
                width: rect.width,
                height: rect.height,
                cross: if options.direction.is_horizontal() {
                    n.position.y
                } else {
                    n.position.x
                },
                rank: 0,
                order: 0,
                x: 0.0,
                y: 0.0,
            }
        })
        .collect();

    let mut edges: Vec<WorkEdge> = board
        .edges
        .iter()
        .filter_map(|e| {
            let from = *index.get(e.source_node_id.as_str())?;
            let to = *index.get(e.target_node_id.as_str())?;
            (from != to).then_some(WorkEdge {
                from,
                to,
                reversed: false,
            })
        })
        .collect();

    make_acyclic(&mut edges, nodes.len());
    assign_ranks(&mut nodes, &edges);
    let mut ranks = build_ranks(&mut nodes);
    reduce_crossings(&mut nodes, &mut ranks, &edges, options.ordering_passes);
    if options.direction.is_reversed() {
        ranks.reverse();
    }
    assign_coordinates(&mut nodes, &ranks, options);

    log::debug!(
        "Auto-layout placed {} node(s) in {} rank(s)",
        nodes.len(),
        ranks.len()
    );

    nodes
        .into_iter()
        .map(|n| {
            let position = Position::new(anchor.x + n.x, anchor.y + n.y);
            (n.id, snap_position(position, options.grid_size))
        })
        .collect()
}

fn make_acyclic(edges: &mut [WorkEdge], node_count: usize) {
    let mut adjacency = vec![Vec::new(); node_count];
    for (idx, edge) in edges.iter().enumerate() {
        adjacency[edge.from].push(idx);
    }

    let mut state = vec![0u8; node_count];
    for node in 0..node_count {
        if state[node] == 0 {
            break_cycles_from(node, &adjacency, edges, &mut state);
        }
    }

    for edge in edges.iter_mut() {
        if edge.reversed {
            std::mem::swap(&mut edge.from, &mut edge.to);
        }
    }
}

/// Depth-first walk marking back edges as reversed
///
/// Uses an explicit stack of `(node, next edge)` frames so long chains do not
/// grow the call stack.
fn break_cycles_from(
    root: usize,
    adjacency: &[Vec<usize>],
    edges: &mut [WorkEdge],
    state: &mut [u8],
) {
    state[root] = 1;
    let mut stack = vec![(root, 0usize)];
    while let Some(frame) = stack.last_mut() {
        let (node, cursor) = *frame;
        let Some(&edge_idx) = adjacency[node].get(cursor) else {
            state[node] = 2;
            stack.pop();
            continue;
        };
        frame.1 += 1;

        let to = edges[edge_idx].to;
        match state[to] {
            0 => {
                state[to] = 1;
                stack.push((to, 0));
            }
            1 => edges[edge_idx].reversed = true,
            _ => {}
        }
    }
}

/// Longest-path ranking over the (now acyclic) edges
fn assign_ranks(nodes: &mut [WorkNode], edges: &[WorkEdge]) {
    let node_count = nodes.len();
    let mut indegree = vec![0usize; node_count];
    let mut outgoing = vec![Vec::new(); node_count];
    for edge in edges {
        outgoing[edge.from].push(edge.to);
        indegree[edge.to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..node_count).filter(|&i| indegree[i] == 0).collect();
    while let Some(node) = queue.pop_front() {
        let current = nodes[node].rank;
        for &next in &outgoing[node] {
            nodes[next].rank = nodes[next].rank.max(current + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
}

/// Group nodes by rank, initially ordered by their previous cross position
fn build_ranks(nodes: &mut [WorkNode]) -> Vec<Vec<usize>> {
    let max_rank = nodes.iter().map(|n| n.rank).max().unwrap_or(0);
    let mut ranks = vec![Vec::new(); max_rank + 1];
    for (idx, node) in nodes.iter().enumerate() {
        ranks[node.rank].push(idx);
    }
    for rank in &mut ranks {
        rank.sort_by(|&a, &b| {
            nodes[a]
                .cross
                .partial_cmp(&nodes[b].cross)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        for (order, &idx) in rank.iter().enumerate() {
            nodes[idx].order = order;
        }
    }
    ranks
}

/// Alternating barycentric sweeps over the ranks
fn reduce_crossings(nodes: &mut [WorkNode], ranks: &mut [Vec<usize>], edges: &[WorkEdge], passes: usize) {
    let mut down_neighbors = vec![Vec::new(); nodes.len()];
    let mut up_neighbors = vec![Vec::new(); nodes.len()];
    for edge in edges {
        down_neighbors[edge.from].push(edge.to);
        up_neighbors[edge.to].push(edge.from);
    }

    for pass in 0..passes {
        if pass % 2 == 0 {
            for rank in 1..ranks.len() {
                reorder_rank(nodes, ranks, rank, &up_neighbors);
            }
        } else {
            for rank in (0..ranks.len().saturating_sub(1)).rev() {
                reorder_rank(nodes, ranks, rank, &down_neighbors);
            }
        }
    }
}

fn reorder_rank(nodes: &mut [WorkNode], ranks: &mut [Vec<usize>], rank_index: usize, neighbor_lists: &[Vec<usize>]) {
    let mut scored: Vec<(usize, f64)> = ranks[rank_index]
        .iter()
        .map(|&idx| {
            let neighbors = &neighbor_lists[idx];
            if neighbors.is_empty() {
                return (idx, nodes[idx].order as f64);
            }
            let sum: usize = neighbors.iter().map(|&n| nodes[n].order).sum();
            (idx, sum as f64 / neighbors.len() as f64)
        })
        .collect();

    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| nodes[a.0].order.cmp(&nodes[b.0].order))
    });

    ranks[rank_index] = scored.iter().map(|(idx, _)| *idx).collect();
    for (order, &idx) in ranks[rank_index].iter().enumerate() {
        nodes[idx].order = order;
    }
}

/// Place ranks along the flow axis and centre each rank on the cross axis
fn assign_coordinates(nodes: &mut [WorkNode], ranks: &[Vec<usize>], options: &AutoLayoutOptions) {
    let horizontal = options.direction.is_horizontal();
    let along = |n: &WorkNode| if horizontal { n.width } else { n.height };
    let across = |n: &WorkNode| if horizontal { n.height } else { n.width };

    let extents: Vec<f64> = ranks
        .iter()
        .map(|rank| {
            let total: f64 = rank.iter().map(|&i| across(&nodes[i])).sum();
            total + options.node_spacing * rank.len().saturating_sub(1) as f64
        })
        .collect();
    let widest = extents.iter().copied().fold(0.0, f64::max);

    let mut flow = 0.0;
    for (rank, extent) in ranks.iter().zip(&extents) {
        let depth = rank.iter().map(|&i| along(&nodes[i])).fold(0.0, f64::max);
        let mut cross = (widest - extent) / 2.0;
        for &idx in rank {
            let node = &mut nodes[idx];
            if horizontal {
                node.x = flow;
                node.y = cross;
            } else {
                node.x = cross;
                node.y = flow;
            }
            cross += across(node) + options.node_spacing;
        }
        flow += depth + options.rank_spacing;
    }
}
