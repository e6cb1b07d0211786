//! Level definition files (`levels/level_NN.json`)

use serde::{Deserialize, Serialize};

use crate::layout::{Cell, Grid, Layout, LayoutError};

pub const DEFAULT_TILE_TYPES: u32 = 6;
pub const DEFAULT_THEME: &str = "legacy";
pub const DEFAULT_COLLECTIBLE: &str = "coin";

/// One level file. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub level_number: u32,
    pub title: String,
    pub description: String,
    pub grid_width: usize,
    pub grid_height: usize,
    pub target_score: u64,
    pub max_moves: u32,
    #[serde(default = "default_tile_types")]
    pub num_tile_types: u32,
    #[serde(default = "default_theme")]
    pub theme: String,
    pub layout: String,
    /// Collectibles to gather; 0 means a score level
    #[serde(default)]
    pub collectible_target: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collectible_type: Option<String>,
}

fn default_tile_types() -> u32 {
    DEFAULT_TILE_TYPES
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

/// Score target and move budget for a level.
///
/// Scales with the level index and with board area relative to 8x8.
pub fn estimate_target_and_moves(level_index: u32, width: usize, height: usize) -> (u64, u32) {
    let base = 5000.0 + f64::from(level_index) * 250.0;
    let size_factor = (width * height) as f64 / 64.0;
    let target = (base * size_factor) as u64;
    let moves = ((25.0 + f64::from(level_index) * 0.5) as u32).max(20);
    (target, moves)
}

impl LevelDefinition {
    /// Build the level document for a generated layout
    pub fn from_layout(level_number: u32, layout: &Layout) -> Self {
        let (width, height) = (layout.grid.width(), layout.grid.height());
        let (target_score, max_moves) = estimate_target_and_moves(level_number, width, height);
        let collectibles = layout.grid.count(Cell::Collectible);

        let (description, collectible_type) = if collectibles > 0 {
            let plural = if collectibles > 1 { "s" } else { "" };
            (
                format!("Collect {collectibles} {DEFAULT_COLLECTIBLE}{plural}!"),
                Some(DEFAULT_COLLECTIBLE.to_string()),
            )
        } else {
            (
                format!("Reach {target_score} points in {max_moves} moves!"),
                None,
            )
        };

        Self {
            level_number,
            title: format!("Level {level_number}"),
            description,
            grid_width: width,
            grid_height: height,
            target_score,
            max_moves,
            num_tile_types: DEFAULT_TILE_TYPES,
            theme: DEFAULT_THEME.to_string(),
            layout: layout.layout_string(),
            collectible_target: collectibles,
            collectible_type,
        }
    }

    /// File name for a level number, e.g. `level_07.json`
    pub fn file_name(level_number: u32) -> String {
        format!("level_{level_number:02}.json")
    }

    /// Parse the stored layout back into a grid
    pub fn grid(&self) -> Result<Grid, LayoutError> {
        Grid::parse(&self.layout, self.grid_width, self.grid_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{generate, GeneratorConfig, OverlayConfig};
    use crate::rng::GameRng;

    #[test]
    fn test_estimate_target_and_moves() {
        assert_eq!(estimate_target_and_moves(0, 8, 8), (5000, 25));
        assert_eq!(estimate_target_and_moves(11, 8, 8), (7750, 30));
        // Half-size board halves the target
        assert_eq!(estimate_target_and_moves(11, 8, 4), (3875, 30));
        assert_eq!(estimate_target_and_moves(50, 8, 8), (17500, 50));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(LevelDefinition::file_name(7), "level_07.json");
        assert_eq!(LevelDefinition::file_name(123), "level_123.json");
    }

    #[test]
    fn test_collectible_level_document() {
        let layout = generate(&GeneratorConfig::default(), &mut GameRng::new(11)).unwrap();
        let level = LevelDefinition::from_layout(11, &layout);
        assert_eq!(level.title, "Level 11");
        assert!(level.collectible_target >= 1);
        assert_eq!(level.collectible_type.as_deref(), Some("coin"));
        assert!(level.description.starts_with("Collect "));
        assert_eq!(level.grid().unwrap(), layout.grid);
    }

    #[test]
    fn test_score_level_document() {
        let config = GeneratorConfig {
            overlays: OverlayConfig {
                collectible_density: 0.0,
                ..OverlayConfig::default()
            },
            ..GeneratorConfig::default()
        };
        let layout = generate(&config, &mut GameRng::new(3)).unwrap();
        let level = LevelDefinition::from_layout(12, &layout);
        assert_eq!(level.collectible_target, 0);
        assert_eq!(level.description, "Reach 8000 points in 31 moves!");

        let json = serde_json::to_value(&level).unwrap();
        assert!(json.get("collectible_type").is_none());
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.first().map(String::as_str), Some("level_number"));
        assert_eq!(keys.last().map(String::as_str), Some("collectible_target"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{
            "level_number": 3,
            "title": "Level 3",
            "description": "hand made",
            "grid_width": 3,
            "grid_height": 3,
            "target_score": 1000,
            "max_moves": 20,
            "layout": "0 0 0\n0 C 0\n0 0 0"
        }"#;
        let level: LevelDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(level.num_tile_types, 6);
        assert_eq!(level.theme, "legacy");
        assert_eq!(level.grid().unwrap().count(Cell::Collectible), 1);
    }
}
