//! Narrative stage documents

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Seconds the single `main` state stays on screen
pub const DEFAULT_STATE_DURATION: f64 = 3.0;

/// Outcome of converting `anchors` to `anchor`
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorMigration {
    pub anchor: Value,
    pub note: Option<AnchorNote>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnchorNote {
    /// More than one anchor; only the first was kept
    Multiple(Vec<Value>),
    /// `anchors` was empty or not a list
    EmptyOrInvalid,
}

/// Replace the plural `anchors` list with a single `anchor`.
///
/// Returns `None` and leaves the stage alone when it has no `anchors` key.
pub fn migrate_anchors(stage: &mut Map<String, Value>) -> Option<AnchorMigration> {
    let anchors = stage.get("anchors")?.clone();

    let (anchor, note) = match anchors {
        Value::Array(list) if !list.is_empty() => {
            let first = list[0].clone();
            let note = (list.len() > 1).then(|| AnchorNote::Multiple(list));
            (first, note)
        }
        _ => (Value::String(String::new()), Some(AnchorNote::EmptyOrInvalid)),
    };

    // Rebuild instead of removing so the remaining keys keep their order
    let kept: Map<String, Value> = std::mem::take(stage)
        .into_iter()
        .filter(|(k, _)| k != "anchors")
        .collect();
    *stage = kept;
    stage.insert("anchor".into(), anchor.clone());

    Some(AnchorMigration { anchor, note })
}

/// Catalogue entry used to build a simple full-screen text stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub name: String,
    pub text: String,
    pub bg_color: String,
    pub text_color: String,
}

/// Full-screen text stage with one `main` state entered on load
pub fn build_stage(stage_id: &str, template: &StageTemplate) -> Value {
    json!({
        "id": stage_id,
        "name": template.name,
        "description": template.name,
        "anchor": "fullscreen",
        "background_color": template.bg_color,
        "text_color": template.text_color,
        "states": [
            {
                "name": "main",
                "text": template.text,
                "duration": DEFAULT_STATE_DURATION
            }
        ],
        "transitions": [
            {
                "from": "",
                "to": "main",
                "event": "stage_loaded"
            }
        ]
    })
}
