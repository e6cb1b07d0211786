//! Conventional layout of a content tree

use std::path::{Path, PathBuf};

/// Root of a game project's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRoot {
    root: PathBuf,
}

impl ContentRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `data/experience_flows`
    pub fn flows_dir(&self) -> PathBuf {
        self.root.join("data").join("experience_flows")
    }

    /// `data/flow_step_definitions`
    pub fn definitions_dir(&self) -> PathBuf {
        self.root.join("data").join("flow_step_definitions")
    }

    pub fn definition_path(&self, definition_id: &str) -> PathBuf {
        self.definitions_dir().join(format!("{definition_id}.json"))
    }

    /// `data/narrative_stages`
    pub fn stages_dir(&self) -> PathBuf {
        self.root.join("data").join("narrative_stages")
    }

    /// `data/narrative_stages/levels`
    pub fn level_stages_dir(&self) -> PathBuf {
        self.stages_dir().join("levels")
    }

    /// `data/effects/effects_registry.json`
    pub fn effects_registry(&self) -> PathBuf {
        self.root.join("data").join("effects").join("effects_registry.json")
    }

    /// `data/experience_flows/main_story.json`
    pub fn main_story(&self) -> PathBuf {
        self.flows_dir().join("main_story.json")
    }

    /// `levels`
    pub fn levels_dir(&self) -> PathBuf {
        self.root.join("levels")
    }
}

impl Default for ContentRoot {
    fn default() -> Self {
        Self::new(".")
    }
}
