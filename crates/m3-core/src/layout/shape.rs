//! Board shapes
//!
//! Each shape paints a boolean occupancy grid. Shapes are not guaranteed to
//! produce a valid board for every size; the generator validates and retries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::Grid;

/// Board outline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    FullRectangle,
    HollowCenter,
    Cross,
    Diagonal,
    RoundedCorners,
    Diamond,
    Notched,
    LShape,
}

impl Shape {
    /// Paint the occupancy for a `width` x `height` board
    pub fn occupancy(&self, width: usize, height: usize) -> Grid {
        let (w, h) = (width, height);
        match self {
            Shape::FullRectangle => Grid::from_fn(w, h, |_, _| true),
            Shape::HollowCenter => {
                // 2x2 hole for even sides, 1 cell wide for odd sides
                let hx = (w.saturating_sub(1) / 2)..(w / 2 + 1);
                let hy = (h.saturating_sub(1) / 2)..(h / 2 + 1);
                Grid::from_fn(w, h, |x, y| !(hx.contains(&x) && hy.contains(&y)))
            }
            Shape::Cross => {
                let bx = (w / 3)..(w - w / 3);
                let by = (h / 3)..(h - h / 3);
                Grid::from_fn(w, h, |x, y| bx.contains(&x) || by.contains(&y))
            }
            Shape::Diagonal => {
                let span = h.saturating_sub(1).max(1);
                Grid::from_fn(w, h, |x, y| {
                    let main = y * w.saturating_sub(1) / span;
                    let anti = w.saturating_sub(1) - main;
                    x.abs_diff(main) <= 2 || x.abs_diff(anti) <= 2
                })
            }
            Shape::RoundedCorners => {
                let cut = if w.min(h) >= 6 { 2 } else { 1 };
                Grid::from_fn(w, h, |x, y| {
                    let dx = x.min(w - 1 - x);
                    let dy = y.min(h - 1 - y);
                    dx + dy >= cut
                })
            }
            Shape::Diamond => {
                // Doubled coordinates keep the centre integral
                let limit = (w + h).saturating_sub(6);
                Grid::from_fn(w, h, |x, y| {
                    let dx = (2 * x).abs_diff(w - 1);
                    let dy = (2 * y).abs_diff(h - 1);
                    dx + dy <= limit
                })
            }
            Shape::Notched => {
                let nx = (w.saturating_sub(1) / 2)..(w / 2 + 1);
                Grid::from_fn(w, h, |x, y| !((y == 0 || y == h - 1) && nx.contains(&x)))
            }
            Shape::LShape => {
                let arm_w = (w * 2 / 5).max(3).min(w);
                let arm_h = (h * 2 / 5).max(3).min(h);
                Grid::from_fn(w, h, |x, y| x < arm_w || y >= h - arm_h)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{validate, Cell};
    use strum::IntoEnumIterator;

    #[test]
    fn test_full_rectangle() {
        let grid = Shape::FullRectangle.occupancy(8, 8);
        assert_eq!(grid.playable_count(), 64);
    }

    #[test]
    fn test_hollow_center_hole() {
        let grid = Shape::HollowCenter.occupancy(8, 8);
        assert_eq!(grid.playable_count(), 60);
        assert_eq!(grid.get(3, 3), Some(Cell::Blocked));
        assert_eq!(grid.get(4, 4), Some(Cell::Blocked));
        assert_eq!(grid.get(2, 3), Some(Cell::Playable));

        let odd = Shape::HollowCenter.occupancy(9, 9);
        assert_eq!(odd.playable_count(), 80);
    }

    #[test]
    fn test_notched_edges() {
        let grid = Shape::Notched.occupancy(8, 8);
        assert_eq!(grid.get(3, 0), Some(Cell::Blocked));
        assert_eq!(grid.get(4, 7), Some(Cell::Blocked));
        assert_eq!(grid.get(3, 1), Some(Cell::Playable));
    }

    #[test]
    fn test_default_board_shapes_are_valid() {
        // Every shape should give a playable 8x8 board
        for shape in Shape::iter() {
            let grid = shape.occupancy(8, 8);
            assert!(validate(&grid).is_ok(), "{shape} failed: {:?}", validate(&grid));
        }
    }

    #[test]
    fn test_shape_names() {
        assert_eq!(Shape::LShape.to_string(), "l_shape");
        assert_eq!("hollow_center".parse::<Shape>().unwrap(), Shape::HollowCenter);
    }
}
