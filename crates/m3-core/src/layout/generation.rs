//! Layout generation with validation and retry
//!
//! Each attempt picks a shape, validates the bare board and places overlays.
//! When every attempt fails the generator falls back to a full rectangle,
//! which always validates.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::rng::GameRng;

use super::{place_overlays, validate, Grid, LayoutError, LayoutIssue, OverlayConfig, OverlayCounts, Shape};

/// Smallest side length that can hold a run of three
pub const MIN_SIDE: usize = 3;

/// Default number of attempts before falling back
pub const DEFAULT_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub width: usize,
    pub height: usize,
    pub attempts: usize,
    pub overlays: OverlayConfig,
    /// Shapes to draw from; empty means all
    pub shapes: Vec<Shape>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            attempts: DEFAULT_ATTEMPTS,
            overlays: OverlayConfig::default(),
            shapes: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn check(&self) -> Result<(), LayoutError> {
        if self.width < MIN_SIDE || self.height < MIN_SIDE {
            return Err(LayoutError::InvalidConfig(format!(
                "board must be at least {MIN_SIDE}x{MIN_SIDE}, got {}x{}",
                self.width, self.height
            )));
        }
        if self.attempts == 0 {
            return Err(LayoutError::InvalidConfig("attempts must be at least 1".into()));
        }
        self.overlays.check()
    }

    fn shape_pool(&self) -> Vec<Shape> {
        if self.shapes.is_empty() {
            Shape::iter().collect()
        } else {
            self.shapes.clone()
        }
    }
}

/// Why an attempt was thrown away
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Invalid(Vec<LayoutIssue>),
    Overlay(LayoutError),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Invalid(issues) => {
                let text: Vec<_> = issues.iter().map(ToString::to_string).collect();
                write!(f, "{}", text.join("; "))
            }
            Rejection::Overlay(err) => write!(f, "{err}"),
        }
    }
}

/// Finished layout
#[derive(Debug, Clone)]
pub struct Layout {
    pub grid: Grid,
    pub shape: Shape,
    pub counts: OverlayCounts,
    /// Attempts consumed, including the successful one
    pub attempts_used: usize,
    pub fell_back: bool,
    pub rejected: Vec<(Shape, Rejection)>,
}

impl Layout {
    /// Serialized `layout` string
    pub fn layout_string(&self) -> String {
        self.grid.serialize()
    }
}

/// Generate a layout; output depends only on `config` and the RNG state.
pub fn generate(config: &GeneratorConfig, rng: &mut GameRng) -> Result<Layout, LayoutError> {
    config.check()?;
    let pool = config.shape_pool();
    let mut rejected = Vec::new();

    for attempt in 1..=config.attempts {
        let shape = *rng.choose(&pool).unwrap_or(&Shape::FullRectangle);
        let mut grid = shape.occupancy(config.width, config.height);

        if let Err(issues) = validate(&grid) {
            rejected.push((shape, Rejection::Invalid(issues)));
            continue;
        }

        match place_overlays(&mut grid, &config.overlays, rng) {
            Ok(counts) => {
                return Ok(Layout {
                    grid,
                    shape,
                    counts,
                    attempts_used: attempt,
                    fell_back: false,
                    rejected,
                });
            }
            Err(err) => rejected.push((shape, Rejection::Overlay(err))),
        }
    }

    Ok(fallback(config, rng, rejected))
}

/// Full rectangle with best-effort overlays
fn fallback(config: &GeneratorConfig, rng: &mut GameRng, rejected: Vec<(Shape, Rejection)>) -> Layout {
    let bare = Shape::FullRectangle.occupancy(config.width, config.height);
    let mut grid = bare.clone();
    let (grid, counts) = match place_overlays(&mut grid, &config.overlays, rng) {
        Ok(counts) => (grid, counts),
        Err(_) => (bare, OverlayCounts::default()),
    };
    Layout {
        grid,
        shape: Shape::FullRectangle,
        counts,
        attempts_used: config.attempts,
        fell_back: true,
        rejected,
    }
}
