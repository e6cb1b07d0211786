//! Experience flows and flow step definitions
//!
//! A flow document is a JSON object whose `flow` array lists the steps a
//! player goes through (levels, narrative stages, rewards...). Repeated step
//! bodies can live in shared definition files and be referenced from the
//! flow by `definition_id`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Step types considered for definition extraction by default
pub const DEFAULT_TARGET_TYPES: &[&str] = &["narrative_stage", "reward", "ad_reward", "premium_gate"];

/// Occurrences needed before a repeated step becomes a definition
pub const DEFAULT_THRESHOLD: usize = 3;

pub type Node = Map<String, Value>;

/// Flow errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow document is not a JSON object")]
    NotAnObject,

    #[error("`flow` is not an array")]
    FlowNotArray,

    #[error("flow node {0} is not an object")]
    NodeNotObject(usize),

    #[error("cannot read a level number from id {0:?}")]
    InvalidLevelId(String),
}

/// A parsed flow file. Keys other than `flow` are kept untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDocument {
    root: Map<String, Value>,
}

impl FlowDocument {
    pub fn from_value(value: Value) -> Result<Self, FlowError> {
        let Value::Object(root) = value else {
            return Err(FlowError::NotAnObject);
        };
        match root.get("flow") {
            None => {}
            Some(Value::Array(nodes)) => {
                if let Some(i) = nodes.iter().position(|n| !n.is_object()) {
                    return Err(FlowError::NodeNotObject(i));
                }
            }
            Some(_) => return Err(FlowError::FlowNotArray),
        }
        Ok(Self { root })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn experience_id(&self) -> Option<&str> {
        self.root.get("experience_id").and_then(Value::as_str)
    }

    /// Flow steps; empty when the document has no `flow`
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.root
            .get("flow")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn nodes_mut(&mut self) -> &mut Vec<Value> {
        let flow = self
            .root
            .entry("flow")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !flow.is_array() {
            *flow = Value::Array(Vec::new());
        }
        match flow {
            Value::Array(nodes) => nodes,
            _ => unreachable!("flow was just made an array"),
        }
    }

    /// `(index, definition_id)` for every step that references a definition
    pub fn definition_refs(&self) -> Vec<(usize, &str)> {
        self.nodes()
            .enumerate()
            .filter_map(|(i, node)| {
                node.get("definition_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(|id| (i, id))
            })
            .collect()
    }
}

fn node_type(node: &Node) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

/// Recursively sort object keys
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Step properties other than `id` and `type`, with keys sorted
pub fn step_props(node: &Node) -> Node {
    let props: Node = node
        .iter()
        .filter(|(k, _)| k.as_str() != "id" && k.as_str() != "type")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    match canonicalize(&Value::Object(props)) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Grouping key: the canonical JSON text of [`step_props`]
pub fn canonical_props(node: &Node) -> String {
    Value::Object(step_props(node)).to_string()
}

/// Value as it reads in an identifier (strings unquoted)
fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Base identifier for a definition built from notable properties
pub fn definition_base_id(step_type: &str, props: &Node) -> String {
    let mut parts = vec![step_type.to_string()];
    if let Some(delay) = props.get("auto_advance_delay") {
        parts.push(format!("auto_{}", id_text(delay).replace('.', "_")));
    }
    if let Some(skippable) = props.get("skippable") {
        parts.push(format!("skip_{}", id_text(skippable).to_lowercase()));
    }
    if let Some(Value::Object(first)) = props
        .get("rewards")
        .and_then(Value::as_array)
        .and_then(|rewards| rewards.first())
    {
        parts.push(first.get("type").map(id_text).unwrap_or_else(|| "reward".into()));
    }
    parts.join("_")
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub target_types: Vec<String>,
    pub threshold: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            target_types: DEFAULT_TARGET_TYPES.iter().map(|t| t.to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// A definition created by [`extract_definitions`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDefinition {
    pub id: String,
    pub step_type: String,
    /// File body: the shared props plus `id` and `type`
    pub body: Value,
    pub occurrences: usize,
}

/// A flow step swapped for a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Index into the `flows` slice
    pub flow: usize,
    pub index: usize,
    pub definition_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub definitions: Vec<ExtractedDefinition>,
    pub replacements: Vec<Replacement>,
}

/// Pull repeated steps out of `flows` into shared definitions.
///
/// Steps of a target type with identical props (ignoring `id`/`type`) that
/// occur at least `threshold` times across all flows become one definition.
/// Steps that already carry a `definition_id` are left alone.
/// Each occurrence is replaced in place by `{definition_id, id, type}`.
/// `existing` holds definition ids already on disk; new ids never collide
/// with them or with each other.
pub fn extract_definitions(
    flows: &mut [FlowDocument],
    options: &ExtractOptions,
    existing: &HashSet<String>,
) -> Extraction {
    let targets: HashSet<&str> = options.target_types.iter().map(String::as_str).collect();

    // (type, canonical props) -> occurrences, in first-seen order
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Vec<(usize, usize)>> = HashMap::new();
    for (f, flow) in flows.iter().enumerate() {
        for (i, node) in flow.nodes().enumerate() {
            let Some(t) = node_type(node).filter(|t| targets.contains(t)) else {
                continue;
            };
            // Already a reference
            if node.contains_key("definition_id") {
                continue;
            }
            let key = (t.to_string(), canonical_props(node));
            let slot = groups.entry(key.clone()).or_default();
            if slot.is_empty() {
                order.push(key);
            }
            slot.push((f, i));
        }
    }

    let mut taken: HashSet<String> = existing.clone();
    let mut extraction = Extraction::default();
    let threshold = options.threshold.max(1);

    for key in order {
        let occurrences = &groups[&key];
        if occurrences.len() < threshold {
            continue;
        }
        let (step_type, props_text) = &key;
        let props: Node = serde_json::from_str(props_text).unwrap_or_default();

        let base = definition_base_id(step_type, &props);
        let mut id = base.clone();
        let mut n = 1;
        while taken.contains(&id) {
            id = format!("{base}_{n}");
            n += 1;
        }
        taken.insert(id.clone());

        let mut body = props;
        body.insert("id".into(), Value::String(id.clone()));
        body.insert("type".into(), Value::String(step_type.clone()));

        for &(f, i) in occurrences {
            let nodes = flows[f].nodes_mut();
            let original_id = nodes[i].get("id").cloned();
            let mut compact = Node::new();
            compact.insert("definition_id".into(), Value::String(id.clone()));
            if let Some(original_id) = original_id {
                compact.insert("id".into(), original_id);
            }
            compact.insert("type".into(), Value::String(step_type.clone()));
            nodes[i] = Value::Object(compact);
            extraction.replacements.push(Replacement {
                flow: f,
                index: i,
                definition_id: id.clone(),
            });
        }

        extraction.definitions.push(ExtractedDefinition {
            id,
            step_type: step_type.clone(),
            body: Value::Object(body),
            occurrences: occurrences.len(),
        });
    }

    extraction
}

/// Definition fields overlaid by every inline field of the step
pub fn merge_definition(definition: &Node, node: &Node) -> Node {
    let mut merged = definition.clone();
    for (k, v) in node {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Level number from a step id such as `level_07` or `level7`
pub fn level_number_from_id(id: &str) -> Result<u32, FlowError> {
    id.replace("level_", "")
        .replace("level", "")
        .trim()
        .parse()
        .map_err(|_| FlowError::InvalidLevelId(id.to_string()))
}

fn is_show_rewards_for(node: Option<&Value>, level: u32) -> bool {
    node.and_then(Value::as_object).is_some_and(|n| {
        node_type(n) == Some("show_rewards")
            && n.get("level_number").and_then(Value::as_u64) == Some(u64::from(level))
    })
}

/// Add a `show_rewards` step after every `level` step.
///
/// Levels already followed by their `show_rewards` step are left alone, so
/// running twice does not duplicate steps. Returns the level numbers that got
/// a new step.
pub fn insert_show_rewards(doc: &mut FlowDocument) -> Result<Vec<u32>, FlowError> {
    let nodes = doc.nodes_mut();
    let mut out = Vec::with_capacity(nodes.len() * 2);
    let mut added = Vec::new();

    let mut iter = nodes.iter().peekable();
    while let Some(node) = iter.next() {
        let level = match node.as_object() {
            Some(n) if node_type(n) == Some("level") => {
                let id = n.get("id").and_then(Value::as_str).unwrap_or_default();
                Some(level_number_from_id(id)?)
            }
            _ => None,
        };
        out.push(node.clone());
        if let Some(level) = level {
            if is_show_rewards_for(iter.peek().copied(), level) {
                continue;
            }
            out.push(json!({
                "type": "show_rewards",
                "level_number": level,
                "completed": true
            }));
            added.push(level);
        }
    }

    *nodes = out;
    Ok(added)
}

/// Param declaration in the effects registry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectSpec {
    pub id: String,
    /// In the order the registry declares them
    #[serde(default, deserialize_with = "ordered_params")]
    pub params: Vec<(String, ParamSpec)>,
}

fn ordered_params<'de, D>(deserializer: D) -> Result<Vec<(String, ParamSpec)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Map::<String, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(name, decl)| {
            serde_json::from_value(decl)
                .map(|spec| (name, spec))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

/// `data/effects/effects_registry.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EffectsRegistry {
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
}

impl EffectsRegistry {
    pub fn get(&self, id: &str) -> Option<&EffectSpec> {
        self.effects.iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectProblem {
    Malformed,
    UnknownType(String),
    ParamType { param: String, expected: String },
}

impl fmt::Display for EffectProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectProblem::Malformed => write!(f, "malformed"),
            EffectProblem::UnknownType(t) => write!(f, "unknown_type {t}"),
            EffectProblem::ParamType { param, expected } => {
                write!(f, "param {param} expected {expected}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectIssue {
    pub node: usize,
    pub effect: Value,
    pub problem: EffectProblem,
}

/// Effects attached to a step: `metadata.effects[]` then `effect`
fn step_effects(node: &Node) -> Vec<&Value> {
    let mut effects: Vec<&Value> = node
        .get("metadata")
        .and_then(|m| m.get("effects"))
        .and_then(Value::as_array)
        .map(|list| list.iter().collect())
        .unwrap_or_default();
    if let Some(effect) = node.get("effect") {
        effects.push(effect);
    }
    effects
}

/// Check every step effect against the registry.
///
/// Params declared as `number` must be numeric and `integer` params must be
/// whole numbers; undeclared params are not checked.
pub fn check_effects(doc: &FlowDocument, registry: &EffectsRegistry) -> Vec<EffectIssue> {
    let mut issues = Vec::new();
    for (i, node) in doc.nodes().enumerate() {
        for effect in step_effects(node) {
            let issue = |problem| EffectIssue {
                node: i,
                effect: effect.clone(),
                problem,
            };
            let Some(kind) = effect.get("type").filter(|_| effect.is_object()) else {
                issues.push(issue(EffectProblem::Malformed));
                continue;
            };
            let kind = id_text(kind);
            let Some(spec) = registry.get(&kind) else {
                issues.push(issue(EffectProblem::UnknownType(kind)));
                continue;
            };
            let Some(params) = effect.get("params").and_then(Value::as_object) else {
                continue;
            };
            for (name, decl) in &spec.params {
                let Some(value) = params.get(name) else {
                    continue;
                };
                let ok = match decl.kind.as_str() {
                    "number" => value.is_number(),
                    "integer" => value.is_i64() || value.is_u64(),
                    _ => true,
                };
                if !ok {
                    issues.push(issue(EffectProblem::ParamType {
                        param: name.clone(),
                        expected: decl.kind.clone(),
                    }));
                }
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> FlowDocument {
        FlowDocument::from_value(value).unwrap()
    }

    fn narrative(id: &str) -> Value {
        json!({"id": id, "type": "narrative_stage", "skippable": true, "auto_advance_delay": 2.5})
    }

    #[test]
    fn test_from_value_rejects_bad_shapes() {
        assert!(matches!(FlowDocument::from_value(json!([])), Err(FlowError::NotAnObject)));
        assert!(matches!(
            FlowDocument::from_value(json!({"flow": {}})),
            Err(FlowError::FlowNotArray)
        ));
        assert!(matches!(
            FlowDocument::from_value(json!({"flow": [{}, 3]})),
            Err(FlowError::NodeNotObject(1))
        ));
        assert!(doc(json!({"experience_id": "x"})).is_empty());
    }

    #[test]
    fn test_canonical_props_ignores_order_and_ids() {
        let a = json!({"id": "a", "type": "reward", "rewards": [{"b": 1, "a": 2}], "x": 1});
        let b = json!({"x": 1, "rewards": [{"a": 2, "b": 1}], "type": "reward", "id": "b"});
        assert_eq!(
            canonical_props(a.as_object().unwrap()),
            canonical_props(b.as_object().unwrap())
        );
        assert_eq!(canonical_props(a.as_object().unwrap()), r#"{"rewards":[{"a":2,"b":1}],"x":1}"#);
    }

    #[test]
    fn test_definition_base_id() {
        let props = json!({"auto_advance_delay": 2.5, "skippable": false});
        assert_eq!(
            definition_base_id("narrative_stage", props.as_object().unwrap()),
            "narrative_stage_auto_2_5_skip_false"
        );
        let props = json!({"rewards": [{"type": "coins", "amount": 50}]});
        assert_eq!(definition_base_id("reward", props.as_object().unwrap()), "reward_coins");
        let props = json!({"rewards": [{"amount": 50}]});
        assert_eq!(definition_base_id("reward", props.as_object().unwrap()), "reward_reward");
        let props = json!({"rewards": []});
        assert_eq!(definition_base_id("reward", props.as_object().unwrap()), "reward");
    }

    #[test]
    fn test_extract_definitions_threshold() {
        let mut flows = vec![
            doc(json!({"flow": [narrative("n1"), narrative("n2"), {"id": "level_01", "type": "level"}]})),
            doc(json!({"flow": [narrative("n3")]})),
            doc(json!({"flow": [narrative("n4"), {"id": "r", "type": "reward", "rewards": []}]})),
        ];
        let existing = HashSet::from(["narrative_stage_auto_2_5_skip_true".to_string()]);
        let extraction = extract_definitions(&mut flows, &ExtractOptions::default(), &existing);

        assert_eq!(extraction.definitions.len(), 1);
        let def = &extraction.definitions[0];
        assert_eq!(def.id, "narrative_stage_auto_2_5_skip_true_1");
        assert_eq!(def.occurrences, 4);
        assert_eq!(def.body["type"], "narrative_stage");
        assert_eq!(def.body["skippable"], true);
        assert_eq!(extraction.replacements.len(), 4);

        let first = flows[0].nodes().next().unwrap();
        assert_eq!(
            Value::Object(first.clone()),
            json!({"definition_id": def.id, "id": "n1", "type": "narrative_stage"})
        );
        // Non-target and below-threshold steps are untouched
        assert_eq!(flows[2].nodes().nth(1).unwrap()["type"], "reward");
        assert!(flows[2].nodes().nth(1).unwrap().get("definition_id").is_none());
    }

    #[test]
    fn test_extract_respects_type_filter() {
        let mut flows = vec![doc(json!({"flow": [narrative("a"), narrative("b"), narrative("c")]}))];
        let options = ExtractOptions {
            target_types: vec!["reward".into()],
            threshold: 3,
        };
        let extraction = extract_definitions(&mut flows, &options, &HashSet::new());
        assert!(extraction.definitions.is_empty());
    }

    #[test]
    fn test_same_base_id_gets_suffix() {
        let mut flows = vec![doc(json!({"flow": [
            {"id": "a", "type": "reward", "rewards": [{"type": "gems"}], "amount": 1},
            {"id": "b", "type": "reward", "rewards": [{"type": "gems"}], "amount": 1},
            {"id": "c", "type": "reward", "rewards": [{"type": "gems"}], "amount": 2},
            {"id": "d", "type": "reward", "rewards": [{"type": "gems"}], "amount": 2},
        ]}))];
        let options = ExtractOptions {
            threshold: 2,
            ..ExtractOptions::default()
        };
        let extraction = extract_definitions(&mut flows, &options, &HashSet::new());
        let ids: Vec<_> = extraction.definitions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["reward_gems", "reward_gems_1"]);
    }

    #[test]
    fn test_merge_definition_inline_wins() {
        let def = json!({"id": "d", "type": "narrative_stage", "skippable": true, "delay": 1});
        let node = json!({"definition_id": "d", "id": "n1", "type": "narrative_stage", "delay": 3});
        let merged = merge_definition(def.as_object().unwrap(), node.as_object().unwrap());
        assert_eq!(merged["id"], "n1");
        assert_eq!(merged["delay"], 3);
        assert_eq!(merged["skippable"], true);
        assert_eq!(merged["definition_id"], "d");
    }

    #[test]
    fn test_level_number_from_id() {
        assert_eq!(level_number_from_id("level_01").unwrap(), 1);
        assert_eq!(level_number_from_id("level12").unwrap(), 12);
        assert!(matches!(
            level_number_from_id("boss"),
            Err(FlowError::InvalidLevelId(_))
        ));
    }

    #[test]
    fn test_insert_show_rewards() {
        let mut flow = doc(json!({"experience_id": "main", "flow": [
            {"id": "intro", "type": "narrative_stage"},
            {"id": "level_01", "type": "level"},
            {"id": "level_02", "type": "level"},
        ]}));
        let added = insert_show_rewards(&mut flow).unwrap();
        assert_eq!(added, vec![1, 2]);
        assert_eq!(flow.len(), 5);
        let steps: Vec<_> = flow.nodes().map(|n| n["type"].as_str().unwrap().to_string()).collect();
        assert_eq!(
            steps,
            vec!["narrative_stage", "level", "show_rewards", "level", "show_rewards"]
        );
        assert_eq!(
            Value::Object(flow.nodes().nth(2).unwrap().clone()),
            json!({"type": "show_rewards", "level_number": 1, "completed": true})
        );

        // Second run changes nothing
        assert!(insert_show_rewards(&mut flow).unwrap().is_empty());
        assert_eq!(flow.len(), 5);
        assert_eq!(flow.experience_id(), Some("main"));
    }

    #[test]
    fn test_insert_show_rewards_bad_id() {
        let mut flow = doc(json!({"flow": [{"id": "finale", "type": "level"}]}));
        assert!(matches!(
            insert_show_rewards(&mut flow),
            Err(FlowError::InvalidLevelId(id)) if id == "finale"
        ));
    }

    #[test]
    fn test_check_effects() {
        let registry: EffectsRegistry = serde_json::from_value(json!({"effects": [
            {"id": "shake", "params": {"strength": {"type": "number"}, "count": {"type": "integer"}}},
            {"id": "fade"}
        ]}))
        .unwrap();
        let flow = doc(json!({"flow": [
            {"type": "level", "metadata": {"effects": [
                {"type": "shake", "params": {"strength": 0.5, "count": 2}},
                {"type": "shake", "params": {"strength": "big", "count": 1.5}}
            ]}},
            {"type": "narrative_stage", "effect": {"type": "sparkle"}},
            {"type": "narrative_stage", "effect": "fade"},
            {"type": "narrative_stage", "effect": {"type": "fade", "params": {"any": 1}}}
        ]}));

        let issues = check_effects(&flow, &registry);
        let problems: Vec<_> = issues.iter().map(|i| (i.node, i.problem.to_string())).collect();
        assert_eq!(
            problems,
            vec![
                (0, "param strength expected number".to_string()),
                (0, "param count expected integer".to_string()),
                (1, "unknown_type sparkle".to_string()),
                (2, "malformed".to_string()),
            ]
        );
    }

    #[test]
    fn test_definition_refs() {
        let flow = doc(json!({"flow": [
            {"definition_id": "a", "id": "x"},
            {"id": "y"},
            {"definition_id": "", "id": "z"},
            {"definition_id": "b"}
        ]}));
        assert_eq!(flow.definition_refs(), vec![(0, "a"), (3, "b")]);
    }
}
