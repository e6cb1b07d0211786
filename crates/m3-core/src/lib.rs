//! m3-core: content logic for a match-3 game
//!
//! Level layout generation, level documents, star rating and the in-memory
//! transforms behind the flow and narrative stage migrations.
//! This crate does no I/O; `m3-content` reads and writes the files.

pub mod flow;
pub mod layout;
pub mod level;
pub mod rating;
pub mod stage;

mod rng;

pub use flow::{FlowDocument, FlowError};
pub use layout::{generate, GeneratorConfig, Layout, LayoutError};
pub use level::LevelDefinition;
pub use rating::calculate_stars;
pub use rng::GameRng;
