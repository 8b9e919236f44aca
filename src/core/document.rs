//! Human-authored timelines in RON.
//!
//! A document lists the cast, scenes, variables and nodes with their
//! forward edges only. Parent lists are rebuilt when the document becomes
//! a [`Timeline`].

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::timeline::{Timeline, TimelineError};
use crate::schema::cast::{Character, Scene, TimelineVariable};
use crate::schema::ids::{CharacterId, NodeId, SceneId};
use crate::schema::node::{NodeKind, TimelineNode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Timeline")]
pub struct TimelineDocument {
    pub name: String,
    /// Next id to allocate. Raised to one past the largest id in use.
    #[serde(default)]
    pub id_count: Option<i32>,
    pub origin: Option<NodeId>,
    #[serde(default)]
    pub narrator: Option<CharacterId>,
    #[serde(default)]
    pub default_scene: Option<SceneId>,
    #[serde(default)]
    pub variables: Vec<TimelineVariable>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub nodes: Vec<DocumentNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Node")]
pub struct DocumentNode {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl TimelineDocument {
    pub fn load_from_ron(path: &Path) -> Result<TimelineDocument, TimelineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<TimelineDocument, TimelineError> {
        Ok(ron::from_str(input)?)
    }

    pub fn to_ron(&self) -> Result<String, TimelineError> {
        let config = ron::ser::PrettyConfig::new().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    pub fn save_ron(&self, path: &Path) -> Result<(), TimelineError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Snapshot a timeline, dropping parent lists.
    pub fn from_timeline(timeline: &Timeline) -> Self {
        Self {
            name: timeline.name().to_string(),
            id_count: Some(timeline.id_count()),
            origin: timeline.origin(),
            narrator: timeline.narrator(),
            default_scene: timeline.default_scene(),
            variables: timeline.variables().into_iter().cloned().collect(),
            scenes: timeline.scenes().into_iter().cloned().collect(),
            characters: timeline.characters().into_iter().cloned().collect(),
            nodes: timeline
                .nodes()
                .into_iter()
                .map(|node| DocumentNode {
                    id: node.id,
                    kind: node.kind.clone(),
                })
                .collect(),
        }
    }

    /// Build the timeline. Ids must be unique across every kind of record.
    pub fn into_timeline(self) -> Result<Timeline, TimelineError> {
        let mut seen = FxHashSet::default();
        let ids = self
            .variables
            .iter()
            .map(|v| v.id.0)
            .chain(self.scenes.iter().map(|s| s.id.0))
            .chain(self.characters.iter().map(|c| c.id.0))
            .chain(self.nodes.iter().map(|n| n.id.0));
        let mut max_id = -1;
        for id in ids {
            if !seen.insert(id) {
                return Err(TimelineError::DuplicateId(id));
            }
            max_id = max_id.max(id);
        }
        let id_count = self.id_count.unwrap_or(0).max(max_id + 1);

        let mut nodes: FxHashMap<NodeId, TimelineNode> = self
            .nodes
            .into_iter()
            .map(|node| (node.id, TimelineNode::new(node.id, node.kind)))
            .collect();
        let mut order: Vec<NodeId> = nodes.keys().copied().collect();
        order.sort();
        for parent in order {
            let children = nodes.get(&parent).map(TimelineNode::children).unwrap_or_default();
            for child in children {
                if let Some(node) = nodes.get_mut(&child) {
                    node.add_parent(parent);
                }
            }
        }

        Ok(Timeline::from_parts(
            id_count,
            self.name,
            self.origin,
            self.narrator,
            self.default_scene,
            self.variables.into_iter().map(|v| (v.id, v)).collect(),
            self.scenes.into_iter().map(|s| (s.id, s)).collect(),
            self.characters.into_iter().map(|c| (c.id, c)).collect(),
            nodes,
        ))
    }
}

/// Load a timeline from `.ron` source or a binary file, by extension.
pub fn load_timeline(path: &Path) -> Result<Timeline, TimelineError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ron") => {
            let timeline = TimelineDocument::load_from_ron(path)?.into_timeline()?;
            tracing::info!("Loaded timeline '{}' from {}", timeline.name(), path.display());
            Ok(timeline)
        }
        _ => Timeline::load(path),
    }
}
