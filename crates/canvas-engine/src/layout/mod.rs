//! Spatial layout: collision handling and hierarchical auto-layout
//!
//! Everything here is a pure function over node snapshots that returns new
//! positions; callers decide what to apply and persist.

pub mod collision;
pub mod geometry;
pub mod hierarchy;

pub use collision::{
    detect_collisions, find_free_position, resolve_all_collisions, CollisionOptions,
    CollisionResolution, SnapResult,
};
pub use geometry::{snap_position, Rect};
pub use hierarchy::{auto_layout, AutoLayoutOptions, Direction};
