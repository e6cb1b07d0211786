//! Experience flow migrations, checks and reports

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use m3_core::flow::{
    check_effects, extract_definitions, insert_show_rewards, merge_definition, EffectIssue,
    EffectsRegistry, ExtractOptions, Node,
};
use m3_core::FlowDocument;

use crate::store::{file_name, json_files, read_json, read_json_as, Indent};
use crate::{BackupPolicy, ContentError, ContentRoot, ContentWriter, Result};

/// Read and parse one flow file
pub fn load_flow(path: &Path) -> Result<FlowDocument> {
    let value = read_json(path)?;
    FlowDocument::from_value(value).map_err(|source| ContentError::Flow {
        path: path.to_path_buf(),
        source,
    })
}

/// Every flow under `data/experience_flows`, sorted by file name
pub fn load_flows(root: &ContentRoot) -> Result<Vec<(PathBuf, FlowDocument)>> {
    json_files(&root.flows_dir())?
        .into_iter()
        .map(|path| load_flow(&path).map(|doc| (path, doc)))
        .collect()
}

/// Ids of the definition files on disk (file stems)
pub fn definition_ids(root: &ContentRoot) -> Result<Vec<String>> {
    Ok(json_files(&root.definitions_dir())?
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect())
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionMigration {
    /// (definition id, file written)
    pub created: Vec<(String, PathBuf)>,
    /// (flow file, step index, definition id)
    pub updated: Vec<(String, usize, String)>,
    pub patched: Vec<PathBuf>,
}

/// Extract repeated flow steps into `data/flow_step_definitions`.
///
/// Patched flow files get a `.json.bak` backup unless one already exists.
pub fn migrate_flow_definitions(
    root: &ContentRoot,
    options: &ExtractOptions,
    writer: &ContentWriter,
) -> Result<DefinitionMigration> {
    let defs_dir = root.definitions_dir();
    writer.create_dir_all(&defs_dir)?;

    let (paths, mut docs): (Vec<PathBuf>, Vec<FlowDocument>) = load_flows(root)?.into_iter().unzip();
    let existing: HashSet<String> = definition_ids(root)?.into_iter().collect();

    let extraction = extract_definitions(&mut docs, options, &existing);
    let mut report = DefinitionMigration::default();

    for def in &extraction.definitions {
        let path = root.definition_path(&def.id);
        writer.write_json(&path, &def.body, Indent::Two)?;
        info!(path = %path.display(), uses = def.occurrences, "created definition");
        report.created.push((def.id.clone(), path));
    }

    let mut touched = vec![false; docs.len()];
    for rep in &extraction.replacements {
        let name = file_name(&paths[rep.flow]);
        info!(file = %name, index = rep.index, definition = %rep.definition_id, "updated step");
        report.updated.push((name, rep.index, rep.definition_id.clone()));
        touched[rep.flow] = true;
    }

    for (i, (path, doc)) in paths.into_iter().zip(docs).enumerate() {
        if !touched[i] {
            continue;
        }
        writer.backup(&path, BackupPolicy::KeepExisting)?;
        writer.write_json(&path, &doc.into_value(), Indent::Two)?;
        info!(path = %path.display(), "patched flow file");
        report.patched.push(path);
    }

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct ShowRewardsReport {
    pub path: PathBuf,
    pub original_steps: usize,
    pub new_steps: usize,
    pub added: Vec<u32>,
}

/// Insert `show_rewards` steps after level steps in one flow file.
///
/// The file is rewritten with four-space indentation; nothing is written
/// when every level already has its step.
pub fn add_show_rewards(path: &Path, writer: &ContentWriter) -> Result<ShowRewardsReport> {
    let mut doc = load_flow(path)?;
    let original_steps = doc.len();
    let added = insert_show_rewards(&mut doc).map_err(|source| ContentError::Flow {
        path: path.to_path_buf(),
        source,
    })?;
    let new_steps = doc.len();

    for level in &added {
        info!(level = *level, "added show_rewards step");
    }
    if added.is_empty() {
        info!(path = %path.display(), "flow already has show_rewards steps");
    } else {
        writer.write_json(path, &doc.into_value(), Indent::Four)?;
    }

    Ok(ShowRewardsReport {
        path: path.to_path_buf(),
        original_steps,
        new_steps,
        added,
    })
}

/// Where a definition is referenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub file: String,
    pub index: usize,
    pub step_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    pub definitions: usize,
    pub flows_scanned: usize,
    pub usage: BTreeMap<String, Vec<Usage>>,
    pub unused: Vec<String>,
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flow Step Definitions Usage Report")?;
        writeln!(f, "Definitions found: {}", self.definitions)?;
        writeln!(f, "Flows scanned: {}", self.flows_scanned)?;
        writeln!(f)?;
        for (id, uses) in &self.usage {
            writeln!(f, "Definition: {id} - used {} times", uses.len())?;
            for u in uses {
                let step = u.step_id.as_deref().unwrap_or("-");
                writeln!(f, "  - {} @ index {} (node id: {step})", u.file, u.index)?;
            }
            writeln!(f)?;
        }
        if self.unused.is_empty() {
            writeln!(f, "No unused definitions found")?;
        } else {
            writeln!(f, "Unused definitions:")?;
            for id in &self.unused {
                writeln!(f, "  - {id}")?;
            }
            writeln!(f)?;
            writeln!(
                f,
                "Suggestion: remove or consolidate unused definitions in data/flow_step_definitions/"
            )?;
        }
        Ok(())
    }
}

/// Which definitions are used where, and which are not used at all
pub fn report_definition_usage(root: &ContentRoot) -> Result<UsageReport> {
    let defs = definition_ids(root)?;
    let flows = load_flows(root)?;

    let mut usage: BTreeMap<String, Vec<Usage>> = BTreeMap::new();
    for (path, doc) in &flows {
        let nodes: Vec<&Node> = doc.nodes().collect();
        for (index, id) in doc.definition_refs() {
            usage.entry(id.to_string()).or_default().push(Usage {
                file: file_name(path),
                index,
                step_id: nodes[index].get("id").and_then(Value::as_str).map(str::to_string),
            });
        }
    }

    let mut unused: Vec<String> = defs.iter().filter(|d| !usage.contains_key(*d)).cloned().collect();
    unused.sort();

    Ok(UsageReport {
        definitions: defs.len(),
        flows_scanned: flows.len(),
        usage,
        unused,
    })
}

/// A `definition_id` with no file behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRef {
    pub file: String,
    pub index: usize,
    pub definition_id: String,
}

impl fmt::Display for MissingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Missing definition {} referenced in {} at index {}",
            self.definition_id, self.file, self.index
        )
    }
}

fn missing_refs(root: &ContentRoot, file: &str, doc: &FlowDocument) -> Vec<MissingRef> {
    doc.definition_refs()
        .into_iter()
        .filter(|(_, id)| !root.definition_path(id).is_file())
        .map(|(index, id)| MissingRef {
            file: file.to_string(),
            index,
            definition_id: id.to_string(),
        })
        .collect()
}

/// Every unresolved `definition_id` across all flows
pub fn check_definition_refs(root: &ContentRoot) -> Result<Vec<MissingRef>> {
    let mut missing = Vec::new();
    for (path, doc) in load_flows(root)? {
        let found = missing_refs(root, &file_name(&path), &doc);
        for m in &found {
            warn!("{m}");
        }
        missing.extend(found);
    }
    Ok(missing)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepResolution {
    /// Merged with the named definition file
    Merged { definition: PathBuf, step: Node },
    MissingDefinition(PathBuf),
    /// No `definition_id`; the step is used as written
    Inline,
}

#[derive(Debug, Clone)]
pub struct ResolvedStep {
    pub index: usize,
    pub raw: Node,
    pub resolution: StepResolution,
}

/// Resolve each step of one flow against its definition file
pub fn verify_flow(root: &ContentRoot, flow_path: &Path) -> Result<(Option<String>, Vec<ResolvedStep>)> {
    let doc = load_flow(flow_path)?;
    let mut steps = Vec::new();

    for (index, node) in doc.nodes().enumerate() {
        let def_id = node.get("definition_id").and_then(Value::as_str).filter(|s| !s.is_empty());
        let resolution = match def_id {
            None => StepResolution::Inline,
            Some(id) => {
                let path = root.definition_path(id);
                if path.is_file() {
                    let definition = match read_json(&path)? {
                        Value::Object(map) => map,
                        _ => Node::new(),
                    };
                    StepResolution::Merged {
                        step: merge_definition(&definition, node),
                        definition: path,
                    }
                } else {
                    StepResolution::MissingDefinition(path)
                }
            }
        };
        steps.push(ResolvedStep {
            index,
            raw: node.clone(),
            resolution,
        });
    }

    Ok((doc.experience_id().map(str::to_string), steps))
}

#[derive(Debug, Clone, Default)]
pub struct FlowValidation {
    pub missing_definitions: Vec<MissingRef>,
    pub registry_found: bool,
    pub effect_issues: Vec<EffectIssue>,
}

impl FlowValidation {
    pub fn is_ok(&self) -> bool {
        self.missing_definitions.is_empty() && self.effect_issues.is_empty()
    }
}

/// Definition presence and effects registry checks for one flow.
///
/// Without a registry file every effect type counts as unknown.
pub fn validate_flow(root: &ContentRoot, flow_path: &Path) -> Result<FlowValidation> {
    let doc = load_flow(flow_path)?;
    let missing_definitions = missing_refs(root, &file_name(flow_path), &doc);

    let registry_path = root.effects_registry();
    let registry_found = registry_path.is_file();
    let registry: EffectsRegistry = if registry_found {
        read_json_as(&registry_path)?
    } else {
        warn!(path = %registry_path.display(), "effects registry not found");
        EffectsRegistry::default()
    };

    Ok(FlowValidation {
        missing_definitions,
        registry_found,
        effect_issues: check_effects(&doc, &registry),
    })
}
