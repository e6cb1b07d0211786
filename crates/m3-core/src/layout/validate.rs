//! Playability checks for an occupancy grid

use std::collections::VecDeque;
use std::fmt;

use super::Grid;

/// Minimum share of board cells, in percent
pub const MIN_DENSITY_PERCENT: usize = 50;

/// Shortest run a row or column needs for a match to be possible
pub const MIN_RUN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

/// Reason a grid is not playable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutIssue {
    LowDensity { playable: usize, total: usize },
    IsolatedCell { x: usize, y: usize },
    Disconnected { components: usize },
    ShortRun { axis: Axis, index: usize },
}

impl fmt::Display for LayoutIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutIssue::LowDensity { playable, total } => {
                write!(f, "only {playable}/{total} cells playable")
            }
            LayoutIssue::IsolatedCell { x, y } => write!(f, "isolated cell at ({x}, {y})"),
            LayoutIssue::Disconnected { components } => {
                write!(f, "board split into {components} regions")
            }
            LayoutIssue::ShortRun { axis, index } => {
                let axis = match axis {
                    Axis::Row => "row",
                    Axis::Column => "column",
                };
                write!(f, "{axis} {index} has no run of {MIN_RUN} playable cells")
            }
        }
    }
}

/// Check density, isolation, connectivity and run length.
///
/// Returns every issue found, not just the first.
pub fn validate(grid: &Grid) -> Result<(), Vec<LayoutIssue>> {
    let mut issues = Vec::new();
    let total = grid.width() * grid.height();
    let playable = grid.playable_count();

    if playable * 100 < total * MIN_DENSITY_PERCENT {
        issues.push(LayoutIssue::LowDensity { playable, total });
    }

    for (x, y) in grid.positions(|c| c.is_occupied()) {
        if !grid.neighbors4(x, y).any(|(nx, ny)| grid.is_occupied(nx, ny)) {
            issues.push(LayoutIssue::IsolatedCell { x, y });
        }
    }

    let components = count_components(grid);
    if components > 1 {
        issues.push(LayoutIssue::Disconnected { components });
    }

    for y in 0..grid.height() {
        let line = (0..grid.width()).map(|x| grid.is_occupied(x, y));
        if !line_ok(line) {
            issues.push(LayoutIssue::ShortRun { axis: Axis::Row, index: y });
        }
    }
    for x in 0..grid.width() {
        let line = (0..grid.height()).map(|y| grid.is_occupied(x, y));
        if !line_ok(line) {
            issues.push(LayoutIssue::ShortRun { axis: Axis::Column, index: x });
        }
    }

    if issues.is_empty() { Ok(()) } else { Err(issues) }
}

/// A line with no playable cells is fine; otherwise it needs a run of `MIN_RUN`.
fn line_ok(line: impl Iterator<Item = bool>) -> bool {
    let mut any = false;
    let mut run = 0;
    let mut best = 0;
    for occupied in line {
        if occupied {
            any = true;
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    !any || best >= MIN_RUN
}

/// Number of 4-connected regions of board cells
pub fn count_components(grid: &Grid) -> usize {
    let w = grid.width();
    let mut seen = vec![false; w * grid.height()];
    let mut components = 0;

    for (sx, sy) in grid.positions(|c| c.is_occupied()) {
        if seen[sy * w + sx] {
            continue;
        }
        components += 1;
        seen[sy * w + sx] = true;
        let mut queue = VecDeque::from([(sx, sy)]);
        while let Some((x, y)) = queue.pop_front() {
            for (nx, ny) in grid.neighbors4(x, y) {
                if grid.is_occupied(nx, ny) && !seen[ny * w + nx] {
                    seen[ny * w + nx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }
    components
}
