//! Level file generation and inspection

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use m3_core::layout::{validate, Cell, LayoutIssue, Shape};
use m3_core::{generate, GameRng, GeneratorConfig, LevelDefinition};

use crate::store::{read_json_as, Indent};
use crate::{ContentError, ContentWriter, Result};

/// A range of levels to generate
#[derive(Debug, Clone)]
pub struct LevelBatch {
    pub levels: RangeInclusive<u32>,
    pub seed: u64,
    pub config: GeneratorConfig,
}

/// Summary of one written level
#[derive(Debug, Clone)]
pub struct GeneratedLevel {
    pub path: PathBuf,
    pub level: LevelDefinition,
    pub shape: Shape,
    pub attempts_used: usize,
    pub fell_back: bool,
}

/// Generate and write `level_NN.json` for every level in the batch.
///
/// Each level draws from its own RNG derived from the batch seed and the
/// level number, so any sub-range regenerates identical files.
pub fn generate_levels(out_dir: &Path, batch: &LevelBatch, writer: &ContentWriter) -> Result<Vec<GeneratedLevel>> {
    batch.config.check()?;
    writer.create_dir_all(out_dir)?;

    let root_rng = GameRng::new(batch.seed);
    let mut written = Vec::new();

    for number in batch.levels.clone() {
        let mut rng = root_rng.derive(u64::from(number));
        let layout = generate(&batch.config, &mut rng)?;

        for (shape, reason) in &layout.rejected {
            debug!(level = number, %shape, %reason, "rejected layout attempt");
        }
        if layout.fell_back {
            warn!(
                level = number,
                attempts = layout.attempts_used,
                "no shape passed validation, using full rectangle"
            );
        }

        let level = LevelDefinition::from_layout(number, &layout);
        let path = out_dir.join(LevelDefinition::file_name(number));
        writer.write_json(&path, &level, Indent::Two)?;
        info!(
            path = %path.display(),
            w = level.grid_width,
            h = level.grid_height,
            moves = level.max_moves,
            target = level.target_score,
            collectibles = level.collectible_target,
            shape = %layout.shape,
            "wrote level"
        );

        written.push(GeneratedLevel {
            path,
            level,
            shape: layout.shape,
            attempts_used: layout.attempts_used,
            fell_back: layout.fell_back,
        });
    }

    Ok(written)
}

/// Result of checking an existing level file
#[derive(Debug, Clone)]
pub struct LevelInspection {
    pub level: LevelDefinition,
    pub issues: Vec<LayoutIssue>,
    pub collectibles: usize,
    pub soft_obstacles: usize,
    pub hard_obstacles: usize,
    pub spreaders: usize,
}

impl LevelInspection {
    pub fn is_playable(&self) -> bool {
        self.issues.is_empty()
    }

    /// `collectible_target` disagrees with the markers in the layout
    pub fn collectible_mismatch(&self) -> bool {
        self.level.collectible_target != self.collectibles
    }
}

/// Load a level file and run the layout checks on it
pub fn inspect_level(path: &Path) -> Result<LevelInspection> {
    let level: LevelDefinition = read_json_as(path)?;
    let grid = level.grid().map_err(|source| ContentError::Level {
        path: path.to_path_buf(),
        source,
    })?;
    let issues = validate(&grid).err().unwrap_or_default();

    Ok(LevelInspection {
        collectibles: grid.count(Cell::Collectible),
        soft_obstacles: grid.count(Cell::SoftObstacle),
        hard_obstacles: grid.count(Cell::HardObstacle),
        spreaders: grid.count(Cell::Spreader),
        level,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(levels: RangeInclusive<u32>) -> LevelBatch {
        LevelBatch {
            levels,
            seed: 2024,
            config: GeneratorConfig::default(),
        }
    }

    #[test]
    fn test_generate_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("levels");
        let written = generate_levels(&out, &batch(11..=13), &ContentWriter::default()).unwrap();
        assert_eq!(written.len(), 3);
        for (number, entry) in (11..=13).zip(&written) {
            let expected = out.join(format!("level_{number}.json"));
            assert_eq!(entry.path, expected);
            let inspection = inspect_level(&expected).unwrap();
            assert!(inspection.is_playable());
            assert!(!inspection.collectible_mismatch());
            assert_eq!(inspection.level, entry.level);
        }
    }

    #[test]
    fn test_sub_range_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ContentWriter::default();
        let full = generate_levels(&dir.path().join("a"), &batch(1..=5), &writer).unwrap();
        let single = generate_levels(&dir.path().join("b"), &batch(4..=4), &writer).unwrap();
        assert_eq!(full[3].level, single[0].level);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("levels");
        let written = generate_levels(&out, &batch(1..=2), &ContentWriter::dry_run()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(!out.exists());
    }

    #[test]
    fn test_inspect_reports_issues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level_99.json");
        let level = serde_json::json!({
            "level_number": 99,
            "title": "Level 99",
            "description": "broken",
            "grid_width": 4,
            "grid_height": 4,
            "target_score": 100,
            "max_moves": 20,
            "layout": "0 0 X X\n0 0 X X\nX X X X\nX X X C",
            "collectible_target": 2
        });
        std::fs::write(&path, level.to_string()).unwrap();

        let inspection = inspect_level(&path).unwrap();
        assert!(!inspection.is_playable());
        assert!(inspection.collectible_mismatch());
        assert_eq!(inspection.collectibles, 1);
    }

    #[test]
    fn test_inspect_bad_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level_01.json");
        let level = serde_json::json!({
            "level_number": 1, "title": "", "description": "",
            "grid_width": 2, "grid_height": 2,
            "target_score": 1, "max_moves": 1,
            "layout": "0 0 0"
        });
        std::fs::write(&path, level.to_string()).unwrap();
        assert!(matches!(inspect_level(&path), Err(ContentError::Level { .. })));
    }
}
