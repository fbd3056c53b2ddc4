//! Axis-aligned footprints on the canvas

use crate::types::{Dimensions, Node, Position};

/// Bounding box of a node, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(position: Position, dimensions: Dimensions) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: dimensions.width,
            height: dimensions.height,
        }
    }

    /// Footprint of a node at its current position
    ///
    /// Non-positive recorded dimensions fall back to the default footprint.
    pub fn of(node: &Node) -> Self {
        Self::at(node, node.position)
    }

    /// Footprint of a node if it were placed at `position`
    pub fn at(node: &Node, position: Position) -> Self {
        let defaults = Dimensions::default();
        let width = if node.dimensions.width > 0.0 {
            node.dimensions.width
        } else {
            defaults.width
        };
        let height = if node.dimensions.height > 0.0 {
            node.dimensions.height
        } else {
            defaults.height
        };
        Self::new(position, Dimensions::new(width, height))
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the boxes intersect once `gap` is kept between them
    ///
    /// Touching edges do not count as overlap when `gap` is zero.
    pub fn overlaps(&self, other: &Rect, gap: f64) -> bool {
        self.x < other.right() + gap
            && other.x < self.right() + gap
            && self.y < other.bottom() + gap
            && other.y < self.bottom() + gap
    }
}

/// Round a coordinate to the nearest grid line
pub fn snap(value: f64, grid: f64) -> f64 {
    if grid > 0.0 {
        (value / grid).round() * grid
    } else {
        value
    }
}

pub fn snap_position(position: Position, grid: f64) -> Position {
    Position::new(snap(position.x, grid), snap(position.y, grid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect::new(Position::new(x, y), Dimensions::new(w, h))
    }

    #[test]
    fn test_overlap() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        assert!(a.overlaps(&rect(50.0, 50.0, 100.0, 100.0), 0.0));
        assert!(!a.overlaps(&rect(100.0, 0.0, 100.0, 100.0), 0.0));
        assert!(a.overlaps(&rect(110.0, 0.0, 100.0, 100.0), 20.0));
        assert!(!a.overlaps(&rect(0.0, 200.0, 100.0, 100.0), 20.0));
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap(29.0, 20.0), 20.0);
        assert_eq!(snap(31.0, 20.0), 40.0);
        assert_eq!(snap(-11.0, 20.0), -20.0);
        assert_eq!(snap(13.0, 0.0), 13.0);
        assert_eq!(
            snap_position(Position::new(9.0, 51.0), 20.0),
            Position::new(0.0, 60.0)
        );
    }
}
