//! Layout cells and the occupancy grid

use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::LayoutError;

/// Layout cell marker
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter,
)]
pub enum Cell {
    #[default]
    Blocked,
    Playable,
    Collectible,
    SoftObstacle,
    HardObstacle,
    Spreader,
}

impl Cell {
    /// Character used in the serialized `layout` string
    pub const fn symbol(&self) -> char {
        match self {
            Cell::Blocked => 'X',
            Cell::Playable => '0',
            Cell::Collectible => 'C',
            Cell::SoftObstacle => 'U',
            Cell::HardObstacle => 'H',
            Cell::Spreader => 'S',
        }
    }

    pub const fn from_symbol(c: char) -> Option<Cell> {
        match c {
            'X' => Some(Cell::Blocked),
            '0' => Some(Cell::Playable),
            'C' => Some(Cell::Collectible),
            'U' => Some(Cell::SoftObstacle),
            'H' => Some(Cell::HardObstacle),
            'S' => Some(Cell::Spreader),
            _ => None,
        }
    }

    /// Part of the board (anything but blocked)
    pub const fn is_occupied(&self) -> bool {
        !matches!(self, Cell::Blocked)
    }

    /// Carries an overlay marker
    pub const fn is_overlay(&self) -> bool {
        matches!(
            self,
            Cell::Collectible | Cell::SoftObstacle | Cell::HardObstacle | Cell::Spreader
        )
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Row-major grid of cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Grid with every cell set to `fill`
    pub fn filled(width: usize, height: usize, fill: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width * height],
        }
    }

    /// Paint a grid from an occupancy predicate
    pub fn from_fn(width: usize, height: usize, mut occupied: impl FnMut(usize, usize) -> bool) -> Self {
        let mut grid = Self::filled(width, height, Cell::Blocked);
        for y in 0..height {
            for x in 0..width {
                if occupied(x, y) {
                    grid.set(x, y, Cell::Playable);
                }
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_some_and(|c| c.is_occupied())
    }

    /// In-bounds orthogonal neighbours (N, S, W, E)
    pub fn neighbors4(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let candidates = [
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1)),
            (x.checked_sub(1), Some(y)),
            (Some(x + 1), Some(y)),
        ];
        candidates.into_iter().filter_map(move |(nx, ny)| match (nx, ny) {
            (Some(nx), Some(ny)) if nx < self.width && ny < self.height => Some((nx, ny)),
            _ => None,
        })
    }

    /// Coordinates of every cell matching `pred`, row-major
    pub fn positions(&self, pred: impl Fn(Cell) -> bool) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if pred(self.cells[y * self.width + x]) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    /// Number of cells that are part of the board
    pub fn playable_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    /// Row-major layout string: cells separated by a space, rows by `\n`
    pub fn serialize(&self) -> String {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| {
                row.iter()
                    .map(|c| c.symbol().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a layout string.
    ///
    /// Whitespace is ignored, so both the spaced multi-line form and the
    /// older concatenated form are accepted.
    pub fn parse(layout: &str, width: usize, height: usize) -> Result<Self, LayoutError> {
        let mut cells = Vec::with_capacity(width * height);
        for c in layout.chars().filter(|c| !c.is_whitespace()) {
            let cell = Cell::from_symbol(c).ok_or(LayoutError::UnknownSymbol(c))?;
            cells.push(cell);
        }
        if cells.len() != width * height {
            return Err(LayoutError::SizeMismatch {
                expected: width * height,
                found: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_symbols_roundtrip() {
        for cell in Cell::iter() {
            assert_eq!(Cell::from_symbol(cell.symbol()), Some(cell));
        }
        assert_eq!(Cell::from_symbol('?'), None);
    }

    #[test]
    fn test_serialize_format() {
        let mut grid = Grid::filled(3, 2, Cell::Playable);
        grid.set(0, 0, Cell::Blocked);
        grid.set(2, 1, Cell::Collectible);
        assert_eq!(grid.serialize(), "X 0 0\n0 0 C");
    }

    #[test]
    fn test_parse_accepts_compact_form() {
        let grid = Grid::parse("X00\n00C", 3, 2).unwrap();
        assert_eq!(grid.get(0, 0), Some(Cell::Blocked));
        assert_eq!(grid.get(2, 1), Some(Cell::Collectible));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Grid::parse("0 0 0", 2, 2),
            Err(LayoutError::SizeMismatch { expected: 4, found: 3 })
        ));
        assert!(matches!(
            Grid::parse("0 0 0 Q", 2, 2),
            Err(LayoutError::UnknownSymbol('Q'))
        ));
    }

    #[test]
    fn test_neighbors_at_corner() {
        let grid = Grid::filled(3, 3, Cell::Playable);
        let mut n: Vec<_> = grid.neighbors4(0, 0).collect();
        n.sort_unstable();
        assert_eq!(n, vec![(0, 1), (1, 0)]);
        assert_eq!(grid.neighbors4(1, 1).count(), 4);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut grid = Grid::filled(2, 2, Cell::Playable);
        assert_eq!(grid.get(2, 0), None);
        grid.set(5, 5, Cell::Blocked);
        assert_eq!(grid.playable_count(), 4);
    }
}
