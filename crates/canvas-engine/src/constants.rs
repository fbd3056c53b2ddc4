//! Engine-wide constants
//!
//! Single source of truth for timing, layout and history defaults.

/// Execution polling configuration (milliseconds)
pub mod polling {
    /// Delay between status polls for an asynchronous job
    pub const INTERVAL_MS: u64 = 2_000;
    /// Delay before retrying after a failed status poll
    pub const RETRY_INTERVAL_MS: u64 = 3_000;
}

/// Persistence write configuration
pub mod persistence {
    /// Quiet period after the last parameter edit before the write is flushed
    pub const DEBOUNCE_MS: u64 = 500;
    /// Delay before a write that failed is attempted again
    pub const RETRY_MS: u64 = 3_000;
}

/// Spatial layout defaults (canvas units)
pub mod layout {
    /// Grid that auto-layout and snapping align to
    pub const GRID_SIZE: f64 = 20.0;
    /// Footprint used when a node has no recorded dimensions
    pub const DEFAULT_NODE_WIDTH: f64 = 280.0;
    pub const DEFAULT_NODE_HEIGHT: f64 = 200.0;
    /// Gap between siblings within a rank
    pub const NODE_SPACING: f64 = 60.0;
    /// Gap between consecutive ranks
    pub const RANK_SPACING: f64 = 120.0;
    /// Padding kept between footprints when resolving collisions
    pub const COLLISION_PADDING: f64 = 20.0;
    /// Number of spiral rings probed when looking for a free position
    pub const MAX_SEARCH_RINGS: usize = 60;
    /// Barycentric ordering passes during auto-layout
    pub const ORDERING_PASSES: usize = 6;
}

/// Undo history defaults
pub mod history {
    /// Maximum number of board snapshots kept
    pub const MAX_SNAPSHOTS: usize = 100;
    /// zstd level for snapshots
    pub const COMPRESSION_LEVEL: i32 = 3;
}

/// Literal parameter/output keys shared with providers
pub mod keys {
    /// Fallback target key for edges without a target port
    pub const DEFAULT_INPUT: &str = "input";
    /// Full-fidelity copy of a structured story object
    pub const STORY_OBJECT: &str = "storyObject";
    /// Flattened text projection of a story object
    pub const STORY_CONTEXT: &str = "Story Context";
}
