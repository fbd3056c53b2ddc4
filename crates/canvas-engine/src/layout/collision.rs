//! Collision detection and free-position search
//!
//! Footprints are axis-aligned boxes (see [`Rect`]). Detection uses plain
//! overlap; placement keeps `padding` between boxes so a resolved node does
//! not end up flush against its neighbour.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use crate::config::LayoutConfig;
use crate::types::{Node, NodeId, Position};

/// Tunables for collision handling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionOptions {
    /// Gap kept between footprints when choosing a position
    pub padding: f64,
    /// Distance between probe rings
    pub step: f64,
    /// Rings probed before falling back to the free column on the right
    pub max_rings: usize,
}

impl Default for CollisionOptions {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for CollisionOptions {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            padding: config.collision_padding,
            step: config.grid_size.max(1.0),
            max_rings: config.max_search_rings,
        }
    }
}

/// Position chosen for a dropped node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapResult {
    pub position: Position,
    /// Whether the position differs from the requested one
    pub adjusted: bool,
}

/// Outcome of resolving every collision on a board
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionResolution {
    /// New positions of the nodes that moved, in board order
    pub moved: Vec<(NodeId, Position)>,
}

impl CollisionResolution {
    pub fn adjusted_count(&self) -> usize {
        self.moved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
    }
}

/// Ids of the nodes currently overlapping `moving_id`
pub fn detect_collisions(nodes: &[Node], moving_id: &str) -> Vec<NodeId> {
    let Some(moving) = nodes.iter().find(|n| n.id == moving_id) else {
        return Vec::new();
    };
    let footprint = Rect::of(moving);
    nodes
        .iter()
        .filter(|other| other.id != moving_id)
        .filter(|other| footprint.overlaps(&Rect::of(other), 0.0))
        .map(|other| other.id.clone())
        .collect()
}

/// Nearest position to `desired` where `moving_id` overlaps no other node
///
/// Probes square rings of increasing radius around the drop point, closest
/// candidates first. If every ring is occupied, the node goes to the right of
/// the rightmost footprint.
pub fn find_free_position(
    nodes: &[Node],
    moving_id: &str,
    desired: Position,
    options: &CollisionOptions,
) -> SnapResult {
    let Some(moving) = nodes.iter().find(|n| n.id == moving_id) else {
        return SnapResult {
            position: desired,
            adjusted: false,
        };
    };
    let obstacles: Vec<Rect> = nodes
        .iter()
        .filter(|n| n.id != moving_id)
        .map(Rect::of)
        .collect();
    place_near(moving, desired, &obstacles, options)
}

fn place_near(
    moving: &Node,
    desired: Position,
    obstacles: &[Rect],
    options: &CollisionOptions,
) -> SnapResult {
    let fits = |candidate: Position| {
        let footprint = Rect::at(moving, candidate);
        obstacles.iter().all(|o| !footprint.overlaps(o, options.padding))
    };

    // The drop point only needs to be clear of real overlap
    let at_desired = Rect::at(moving, desired);
    if obstacles.iter().all(|o| !at_desired.overlaps(o, 0.0)) {
        return SnapResult {
            position: desired,
            adjusted: false,
        };
    }

    for ring in 1..=options.max_rings as i64 {
        let mut candidates = ring_offsets(ring);
        candidates.sort_by(|a, b| {
            let da = (a.0 * a.0 + a.1 * a.1) as f64;
            let db = (b.0 * b.0 + b.1 * b.1) as f64;
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        let found = candidates
            .into_iter()
            .map(|(dx, dy)| {
                Position::new(
                    desired.x + dx as f64 * options.step,
                    desired.y + dy as f64 * options.step,
                )
            })
            .find(|candidate| fits(*candidate));
        if let Some(position) = found {
            return SnapResult {
                position,
                adjusted: true,
            };
        }
    }

    let right_edge = obstacles
        .iter()
        .map(Rect::right)
        .fold(desired.x, f64::max);
    log::debug!(
        "No free slot within {} rings of ({}, {}), placing '{}' at the right edge",
        options.max_rings,
        desired.x,
        desired.y,
        moving.id
    );
    SnapResult {
        position: Position::new(right_edge + options.padding, desired.y),
        adjusted: true,
    }
}

/// Offsets on the square ring at Chebyshev distance `ring`
fn ring_offsets(ring: i64) -> Vec<(i64, i64)> {
    let mut offsets = Vec::with_capacity((8 * ring) as usize);
    for dx in -ring..=ring {
        for dy in -ring..=ring {
            if dx.abs() == ring || dy.abs() == ring {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Separate every overlapping node on the board
///
/// Nodes that overlap nothing are fixed in place. Colliding nodes are then
/// placed one by one in board order: a node keeps its position if it is clear
/// of everything already placed, otherwise it moves to the nearest free spot.
/// Afterwards no two footprints overlap.
pub fn resolve_all_collisions(nodes: &[Node], options: &CollisionOptions) -> CollisionResolution {
    let rects: Vec<Rect> = nodes.iter().map(Rect::of).collect();
    let colliding: Vec<bool> = rects
        .iter()
        .enumerate()
        .map(|(i, a)| {
            rects
                .iter()
                .enumerate()
                .any(|(j, b)| i != j && a.overlaps(b, 0.0))
        })
        .collect();

    let mut placed: Vec<Rect> = rects
        .iter()
        .zip(&colliding)
        .filter(|(_, hit)| !**hit)
        .map(|(rect, _)| *rect)
        .collect();

    let mut resolution = CollisionResolution::default();
    for (node, _) in nodes.iter().zip(&colliding).filter(|(_, hit)| **hit) {
        let snap = place_near(node, node.position, &placed, options);
        placed.push(Rect::at(node, snap.position));
        if snap.adjusted {
            resolution.moved.push((node.id.clone(), snap.position));
        }
    }

    if !resolution.is_empty() {
        log::info!("Resolved collisions by moving {} node(s)", resolution.adjusted_count());
    }
    resolution
}
