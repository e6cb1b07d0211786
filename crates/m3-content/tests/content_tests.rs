//! End-to-end runs over a small content tree

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use m3_content::flows::{
    add_show_rewards, check_definition_refs, migrate_flow_definitions, report_definition_usage,
    validate_flow,
};
use m3_content::levels::{generate_levels, inspect_level, LevelBatch};
use m3_content::stages::{migrate_anchors, relocate_level_stages};
use m3_content::{ContentRoot, ContentWriter};
use m3_core::flow::ExtractOptions;
use m3_core::GeneratorConfig;

fn write(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn read(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn interlude(id: &str) -> Value {
    json!({"id": id, "type": "narrative_stage", "stage_id": "interlude", "skippable": true})
}

fn seed_tree(root: &ContentRoot) {
    write(
        &root.main_story(),
        &json!({
            "experience_id": "main_story",
            "flow": [
                interlude("i1"),
                {"id": "level_01", "type": "level"},
                interlude("i2"),
                {"id": "level_02", "type": "level"},
                interlude("i3"),
            ]
        }),
    );
    write(
        &root.effects_registry(),
        &json!({"effects": [{"id": "fade", "params": {"duration": {"type": "number"}}}]}),
    );
    write(&root.stages_dir().join("interlude.json"), &json!({"id": "interlude", "anchors": ["center"]}));
    write(&root.stages_dir().join("level_01.json"), &json!({"id": "level_01"}));
}

#[test]
fn full_content_pass() {
    let dir = tempfile::tempdir().unwrap();
    let root = ContentRoot::new(dir.path());
    seed_tree(&root);
    let writer = ContentWriter::default();

    let migration = migrate_flow_definitions(&root, &ExtractOptions::default(), &writer).unwrap();
    assert_eq!(migration.created.len(), 1);
    let def_id = migration.created[0].0.clone();
    assert_eq!(def_id, "narrative_stage_skip_true");

    let shown = add_show_rewards(&root.main_story(), &writer).unwrap();
    assert_eq!(shown.added, vec![1, 2]);
    assert_eq!(shown.new_steps, 7);

    assert!(check_definition_refs(&root).unwrap().is_empty());
    let usage = report_definition_usage(&root).unwrap();
    assert_eq!(usage.usage[&def_id].len(), 3);
    assert!(usage.unused.is_empty());

    let validation = validate_flow(&root, &root.main_story()).unwrap();
    assert!(validation.is_ok());

    let anchors = migrate_anchors(&root, &writer).unwrap();
    assert_eq!(anchors.updated.len(), 1);
    assert_eq!(read(&root.stages_dir().join("interlude.json"))["anchor"], "center");

    let moved = relocate_level_stages(&root, &writer).unwrap();
    assert_eq!(moved, vec!["level_01.json".to_string()]);
    assert!(root.level_stages_dir().join("level_01.json").is_file());
}

#[test]
fn dry_run_leaves_tree_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let root = ContentRoot::new(dir.path());
    seed_tree(&root);
    let before = read(&root.main_story());
    let writer = ContentWriter::dry_run();

    migrate_flow_definitions(&root, &ExtractOptions::default(), &writer).unwrap();
    add_show_rewards(&root.main_story(), &writer).unwrap();
    migrate_anchors(&root, &writer).unwrap();
    relocate_level_stages(&root, &writer).unwrap();

    assert_eq!(read(&root.main_story()), before);
    assert!(!root.definitions_dir().exists());
    assert!(!root.level_stages_dir().exists());
    assert!(root.stages_dir().join("level_01.json").is_file());
    assert!(read(&root.stages_dir().join("interlude.json")).get("anchors").is_some());
}

#[test]
fn generated_levels_pass_inspection() {
    let dir = tempfile::tempdir().unwrap();
    let root = ContentRoot::new(dir.path());
    let batch = LevelBatch {
        levels: 11..=20,
        seed: 7,
        config: GeneratorConfig::default(),
    };
    let written = generate_levels(&root.levels_dir(), &batch, &ContentWriter::default()).unwrap();
    assert_eq!(written.len(), 10);

    for entry in &written {
        let inspection = inspect_level(&entry.path).unwrap();
        assert!(inspection.is_playable(), "{:?}", inspection.issues);
        assert!(!inspection.collectible_mismatch());
        let raw = read(&entry.path);
        assert_eq!(raw["grid_width"], 8);
        assert!(raw["target_score"].as_u64().unwrap() > 0);
    }
}
