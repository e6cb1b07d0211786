//! Narrative stage file migrations

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use m3_core::stage::{build_stage, migrate_anchors as migrate_stage_anchors, AnchorNote, StageTemplate};

use crate::store::{file_name, json_files, json_files_matching, read_json_as, read_text, Indent};
use crate::{BackupPolicy, ContentError, ContentRoot, ContentWriter, Result};

#[derive(Debug, Clone, Default)]
pub struct AnchorReport {
    /// (file, new anchor)
    pub updated: Vec<(String, Value)>,
    /// Files without an `anchors` key
    pub unchanged: Vec<String>,
    /// (file, parse error)
    pub unparsable: Vec<(String, String)>,
}

/// Convert `anchors` lists to a single `anchor` in every stage file.
///
/// Each migrated file is backed up to `.json.bak` first. Files that do not
/// parse as a JSON object are skipped with a warning.
pub fn migrate_anchors(root: &ContentRoot, writer: &ContentWriter) -> Result<AnchorReport> {
    let dir = root.stages_dir();
    if !dir.is_dir() {
        return Err(ContentError::MissingDir(dir));
    }

    let mut report = AnchorReport::default();
    for path in json_files(&dir)? {
        let name = file_name(&path);
        let text = read_text(&path)?;
        let mut stage = match serde_json::from_str::<Map<String, Value>>(&text) {
            Ok(stage) => stage,
            Err(e) => {
                warn!(file = %name, error = %e, "skipping: failed to parse JSON");
                report.unparsable.push((name, e.to_string()));
                continue;
            }
        };

        let Some(migration) = migrate_stage_anchors(&mut stage) else {
            info!(file = %name, "no anchors; skipping");
            report.unchanged.push(name);
            continue;
        };

        match &migration.note {
            Some(AnchorNote::Multiple(all)) => {
                warn!(file = %name, anchors = %serde_json::Value::Array(all.clone()), "multiple anchors; using first");
            }
            Some(AnchorNote::EmptyOrInvalid) => {
                warn!(file = %name, "non-list or empty anchors; setting anchor to empty string");
            }
            None => {}
        }

        let bak = writer.backup(&path, BackupPolicy::Overwrite)?;
        writer.write_json(&path, &stage, Indent::Two)?;
        info!(
            file = %name,
            anchor = %migration.anchor,
            backup = %bak.as_deref().map(file_name).unwrap_or_default(),
            "migrated anchors"
        );
        report.updated.push((name, migration.anchor));
    }

    Ok(report)
}

/// Move `level_*.json` stages into `data/narrative_stages/levels`.
///
/// A `.json.bak` copy stays behind in the original directory.
/// Returns the moved file names.
pub fn relocate_level_stages(root: &ContentRoot, writer: &ContentWriter) -> Result<Vec<String>> {
    let dir = root.stages_dir();
    if !dir.is_dir() {
        return Err(ContentError::MissingDir(dir));
    }
    let target = root.level_stages_dir();
    writer.create_dir_all(&target)?;

    let mut moved = Vec::new();
    for path in json_files_matching(&dir, |stem| stem.starts_with("level_"))? {
        let name = file_name(&path);
        let dest = target.join(&name);
        writer.backup(&path, BackupPolicy::Overwrite)?;
        writer.move_file(&path, &dest)?;
        info!(from = %path.display(), to = %dest.display(), "moved stage");
        moved.push(name);
    }

    info!(count = moved.len(), dir = %target.display(), "relocated level stages");
    Ok(moved)
}

#[derive(Debug, Clone, Default)]
pub struct CreateReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Write a stage file for every catalogue entry that has none yet.
///
/// The catalogue is a JSON object mapping stage ids to
/// `{name, text, bg_color, text_color}`.
pub fn create_stages(root: &ContentRoot, catalogue: &Path, writer: &ContentWriter) -> Result<CreateReport> {
    let entries: Map<String, Value> = read_json_as(catalogue)?;
    let dir = root.stages_dir();
    writer.create_dir_all(&dir)?;

    let mut report = CreateReport::default();
    for (stage_id, entry) in entries {
        let path = dir.join(format!("{stage_id}.json"));
        if path.exists() {
            info!(stage = %stage_id, "already exists; skipped");
            report.skipped.push(stage_id);
            continue;
        }
        let template: StageTemplate =
            serde_json::from_value(entry).map_err(|e| ContentError::json(catalogue, e))?;
        writer.write_json(&path, &build_stage(&stage_id, &template), Indent::Two)?;
        info!(stage = %stage_id, "created stage");
        report.created.push(stage_id);
    }

    Ok(report)
}
