//! Procedural board layouts
//!
//! Paints a board from a shape, checks it is playable, drops overlay markers
//! on it and serializes it to the `layout` string used by level files.

mod cell;
mod generation;
mod overlay;
mod shape;
mod validate;

use thiserror::Error;

pub use cell::{Cell, Grid};
pub use generation::{generate, GeneratorConfig, Layout, Rejection, DEFAULT_ATTEMPTS, MIN_SIDE};
pub use overlay::{place_overlays, OverlayConfig, OverlayCounts};
pub use shape::Shape;
pub use validate::{count_components, validate, Axis, LayoutIssue, MIN_DENSITY_PERCENT, MIN_RUN};

/// Layout errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),

    #[error("unknown layout symbol {0:?}")]
    UnknownSymbol(char),

    #[error("layout has {found} cells, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("no cell can hold a collectible")]
    NoCollectibleRoom,
}
