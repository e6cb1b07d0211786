//! Overlay markers placed on top of a playable board

use serde::{Deserialize, Serialize};

use crate::rng::GameRng;

use super::{Cell, Grid, LayoutError};

/// Overlay placement knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Share of board cells that get a collectible (0 = score level)
    pub collectible_density: f64,
    /// Share of board cells that get a soft or hard obstacle
    pub obstacle_density: f64,
    /// Number of spreader cells
    pub spreaders: usize,
    /// Minimum Manhattan distance between two collectibles
    pub min_collectible_spacing: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            collectible_density: 0.06,
            obstacle_density: 0.03,
            spreaders: 0,
            min_collectible_spacing: 2,
        }
    }
}

impl OverlayConfig {
    pub(crate) fn check(&self) -> Result<(), LayoutError> {
        for (name, value) in [
            ("collectible density", self.collectible_density),
            ("obstacle density", self.obstacle_density),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be within 0..=1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// What was actually placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayCounts {
    pub collectibles: usize,
    pub soft_obstacles: usize,
    pub hard_obstacles: usize,
    pub spreaders: usize,
}

/// Place collectibles, obstacles and spreaders on plain playable cells.
///
/// Collectibles stay off the bottom row and off the lowest board cell of
/// their column, and keep `min_collectible_spacing` from each other.
/// Every obstacle and spreader keeps at least one plain playable neighbour
/// in the finished grid.
/// Fails when a collectible was asked for but none fits.
pub fn place_overlays(
    grid: &mut Grid,
    config: &OverlayConfig,
    rng: &mut GameRng,
) -> Result<OverlayCounts, LayoutError> {
    let playable = grid.playable_count();
    let mut counts = OverlayCounts::default();

    let wanted = if config.collectible_density > 0.0 {
        ((playable as f64 * config.collectible_density) as usize).max(1)
    } else {
        0
    };
    if wanted > 0 {
        let mut candidates: Vec<_> = grid
            .positions(|c| c == Cell::Playable)
            .into_iter()
            .filter(|&(x, y)| !is_column_bottom(grid, x, y))
            .collect();
        rng.shuffle(&mut candidates);

        let mut placed: Vec<(usize, usize)> = Vec::new();
        for (x, y) in candidates {
            if placed.len() >= wanted {
                break;
            }
            let spaced = placed
                .iter()
                .all(|&(px, py)| px.abs_diff(x) + py.abs_diff(y) >= config.min_collectible_spacing);
            if spaced {
                grid.set(x, y, Cell::Collectible);
                placed.push((x, y));
            }
        }
        if placed.is_empty() {
            return Err(LayoutError::NoCollectibleRoom);
        }
        counts.collectibles = placed.len();
    }

    let obstacles = (playable as f64 * config.obstacle_density) as usize;
    let mut candidates = grid.positions(|c| c == Cell::Playable);
    rng.shuffle(&mut candidates);
    for (x, y) in candidates {
        if counts.soft_obstacles + counts.hard_obstacles >= obstacles {
            break;
        }
        if !can_anchor(grid, x, y) {
            continue;
        }
        if rng.chance(0.5) {
            grid.set(x, y, Cell::SoftObstacle);
            counts.soft_obstacles += 1;
        } else {
            grid.set(x, y, Cell::HardObstacle);
            counts.hard_obstacles += 1;
        }
    }

    let bottom = grid.height().saturating_sub(1);
    let mut candidates: Vec<_> = grid
        .positions(|c| c == Cell::Playable)
        .into_iter()
        .filter(|&(_, y)| y != bottom)
        .collect();
    rng.shuffle(&mut candidates);
    for (x, y) in candidates {
        if counts.spreaders >= config.spreaders {
            break;
        }
        if can_anchor(grid, x, y) {
            grid.set(x, y, Cell::Spreader);
            counts.spreaders += 1;
        }
    }

    Ok(counts)
}

fn has_plain_neighbor(grid: &Grid, x: usize, y: usize) -> bool {
    grid.neighbors4(x, y)
        .any(|(nx, ny)| grid.get(nx, ny) == Some(Cell::Playable))
}

fn is_anchored_marker(cell: Option<Cell>) -> bool {
    matches!(cell, Some(Cell::SoftObstacle | Cell::HardObstacle | Cell::Spreader))
}

/// An obstacle or spreader may go on `(x, y)` when it touches a plain cell
/// and no neighbouring obstacle or spreader loses its last plain neighbour.
fn can_anchor(grid: &Grid, x: usize, y: usize) -> bool {
    if !has_plain_neighbor(grid, x, y) {
        return false;
    }
    grid.neighbors4(x, y)
        .filter(|&(nx, ny)| is_anchored_marker(grid.get(nx, ny)))
        .all(|(nx, ny)| {
            grid.neighbors4(nx, ny)
                .any(|(ox, oy)| (ox, oy) != (x, y) && grid.get(ox, oy) == Some(Cell::Playable))
        })
}

/// Bottom grid row, or no board cell below in this column
fn is_column_bottom(grid: &Grid, x: usize, y: usize) -> bool {
    ((y + 1)..grid.height()).all(|below| !grid.is_occupied(x, below))
}
