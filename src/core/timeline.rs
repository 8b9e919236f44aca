//! The timeline graph store and structural editor.
//!
//! A [`Timeline`] owns every node, scene, character and variable
//! declaration, keyed by id. Ids come from a single monotonic counter and
//! are never reused. Graph edits go through [`Timeline::link_nodes`],
//! [`Timeline::delete_node`] and [`Timeline::delete_tree`], which keep the
//! parent lists in step with forward edges and run the integrity check
//! after every change.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::integrity::{check_integrity, IntegrityReport};
use crate::core::packer::{BinaryPacker, BinaryUnpacker, PackError, Packable};
use crate::schema::cast::{Character, Scene, TimelineVariable};
use crate::schema::ids::{CharacterId, NodeId, SceneId, VariableId};
use crate::schema::node::{
    BranchNode, ConsequenceNode, Decision, DecisionNode, DialogNode, NodeKind, NodeType,
    Operation, Predicate, TimelineNode,
};
use crate::schema::value::{ValueError, VariableValue};

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("unknown {0}")]
    UnknownNode(NodeId),
    #[error("unknown {0}")]
    UnknownScene(SceneId),
    #[error("unknown {0}")]
    UnknownCharacter(CharacterId),
    #[error("unknown {0}")]
    UnknownVariable(VariableId),
    #[error("predicate has no variable")]
    UnsetVariable,
    #[error("id {0} is used more than once")]
    DuplicateId(i32),
    #[error("{0} cannot be linked to itself")]
    SelfLink(NodeId),
    #[error("{child} has no free edge to take over {former} from {parent}")]
    CannotSplice {
        parent: NodeId,
        child: NodeId,
        former: NodeId,
    },
    #[error("{node} is a {actual} node")]
    WrongNodeType {
        node: NodeId,
        actual: NodeType,
    },
    #[error("structural integrity violation: {0}")]
    StructuralIntegrityViolation(IntegrityReport),
    #[error("value error: {0}")]
    Value(#[from] ValueError),
    #[error("binary format error: {0}")]
    Pack(#[from] PackError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),
}

/// What a graph edit does when it leaves new integrity violations behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityPolicy {
    /// Log the violations and keep the edit.
    Log,
    /// Roll the edit back and return
    /// [`TimelineError::StructuralIntegrityViolation`].
    #[default]
    Reject,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    id_count: i32,
    name: String,
    origin: Option<NodeId>,
    narrator: Option<CharacterId>,
    default_scene: Option<SceneId>,
    variables: FxHashMap<VariableId, TimelineVariable>,
    scenes: FxHashMap<SceneId, Scene>,
    characters: FxHashMap<CharacterId, Character>,
    nodes: FxHashMap<NodeId, TimelineNode>,
    node_linkage_dirty: bool,
    policy: IntegrityPolicy,
}

/// Content equality. Editor state (the dirty flag and the policy) is ignored.
impl PartialEq for Timeline {
    fn eq(&self, other: &Self) -> bool {
        self.id_count == other.id_count
            && self.name == other.name
            && self.origin == other.origin
            && self.narrator == other.narrator
            && self.default_scene == other.default_scene
            && self.variables == other.variables
            && self.scenes == other.scenes
            && self.characters == other.characters
            && self.nodes == other.nodes
    }
}

fn sorted_values<K: Ord + Copy + std::hash::Hash, V>(map: &FxHashMap<K, V>) -> Vec<&V> {
    let mut keys: Vec<K> = map.keys().copied().collect();
    keys.sort();
    keys.iter().filter_map(|k| map.get(k)).collect()
}

impl Timeline {
    /// An empty timeline with no cast, scenes or nodes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id_count: 0,
            name: name.into(),
            origin: None,
            narrator: None,
            default_scene: None,
            variables: FxHashMap::default(),
            scenes: FxHashMap::default(),
            characters: FxHashMap::default(),
            nodes: FxHashMap::default(),
            node_linkage_dirty: false,
            policy: IntegrityPolicy::default(),
        }
    }

    /// A timeline ready for authoring: a narrator, a default scene and an
    /// origin dialog node spoken by the narrator.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        let mut timeline = Self::new(name);
        let narrator = timeline.add_character("Narrator");
        let scene = timeline.add_scene("Default Scene");
        let origin =
            timeline.add_dialog_node(scene, narrator, "Default Intro Narration", Vec::new());
        timeline.narrator = Some(narrator);
        timeline.default_scene = Some(scene);
        timeline.origin = Some(origin);
        timeline
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id_count: i32,
        name: String,
        origin: Option<NodeId>,
        narrator: Option<CharacterId>,
        default_scene: Option<SceneId>,
        variables: FxHashMap<VariableId, TimelineVariable>,
        scenes: FxHashMap<SceneId, Scene>,
        characters: FxHashMap<CharacterId, Character>,
        nodes: FxHashMap<NodeId, TimelineNode>,
    ) -> Self {
        Self {
            id_count,
            name,
            origin,
            narrator,
            default_scene,
            variables,
            scenes,
            characters,
            nodes,
            node_linkage_dirty: true,
            policy: IntegrityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: IntegrityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: IntegrityPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The next id to be allocated.
    pub fn id_count(&self) -> i32 {
        self.id_count
    }

    pub fn origin(&self) -> Option<NodeId> {
        self.origin
    }

    pub fn narrator(&self) -> Option<CharacterId> {
        self.narrator
    }

    pub fn default_scene(&self) -> Option<SceneId> {
        self.default_scene
    }

    /// Set after any change to node linkage, for editors caching layout.
    pub fn is_linkage_dirty(&self) -> bool {
        self.node_linkage_dirty
    }

    pub fn clear_linkage_dirty(&mut self) {
        self.node_linkage_dirty = false;
    }

    pub fn node(&self, id: NodeId) -> Option<&TimelineNode> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node's content. Edge fields changed through
    /// this bypass parent bookkeeping; use [`Timeline::link_nodes`] instead.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TimelineNode> {
        self.nodes.get_mut(&id)
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn variable(&self, id: VariableId) -> Option<&TimelineVariable> {
        self.variables.get(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> Vec<&TimelineNode> {
        sorted_values(&self.nodes)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Scenes in ascending id order.
    pub fn scenes(&self) -> Vec<&Scene> {
        sorted_values(&self.scenes)
    }

    /// Characters in ascending id order.
    pub fn characters(&self) -> Vec<&Character> {
        sorted_values(&self.characters)
    }

    /// Variable declarations in ascending id order.
    pub fn variables(&self) -> Vec<&TimelineVariable> {
        sorted_values(&self.variables)
    }

    pub(crate) fn node_map(&self) -> &FxHashMap<NodeId, TimelineNode> {
        &self.nodes
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.id_count;
        self.id_count += 1;
        id
    }

    pub fn add_scene(&mut self, name: impl Into<String>) -> SceneId {
        let id = SceneId(self.allocate_id());
        self.scenes.insert(id, Scene { id, name: name.into() });
        id
    }

    pub fn add_character(&mut self, name: impl Into<String>) -> CharacterId {
        let id = CharacterId(self.allocate_id());
        self.characters.insert(id, Character { id, name: name.into() });
        id
    }

    /// Declare a variable. `value` is its type and its starting value in
    /// every playthrough.
    pub fn add_variable(&mut self, name: impl Into<String>, value: VariableValue) -> VariableId {
        let id = VariableId(self.allocate_id());
        self.variables.insert(
            id,
            TimelineVariable {
                id,
                name: name.into(),
                value,
            },
        );
        id
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.allocate_id());
        self.nodes.insert(id, TimelineNode::new(id, kind));
        self.node_linkage_dirty = true;
        tracing::debug!("Added {}", self.nodes[&id].describe());
        id
    }

    pub fn add_dialog_node(
        &mut self,
        scene: SceneId,
        speaker: CharacterId,
        text: impl Into<String>,
        characters: Vec<CharacterId>,
    ) -> NodeId {
        self.add_node(NodeKind::Dialog(DialogNode {
            scene,
            speaker,
            characters,
            text: text.into(),
            next: None,
        }))
    }

    pub fn add_branch_node(&mut self) -> NodeId {
        self.add_node(NodeKind::Branch(BranchNode::default()))
    }

    pub fn add_decision_node(&mut self) -> NodeId {
        self.add_node(NodeKind::Decision(DecisionNode::default()))
    }

    pub fn add_consequence_node(&mut self) -> NodeId {
        self.add_node(NodeKind::Consequence(ConsequenceNode::default()))
    }

    /// Append an unlinked arm to a branch node and return its slot.
    pub fn add_branch_arm(
        &mut self,
        node: NodeId,
        predicate: Predicate,
    ) -> Result<usize, TimelineError> {
        let target = self.nodes.get_mut(&node).ok_or(TimelineError::UnknownNode(node))?;
        let actual = target.node_type();
        match &mut target.kind {
            NodeKind::Branch(branch) => Ok(branch.add_arm(predicate)),
            _ => Err(TimelineError::WrongNodeType { node, actual }),
        }
    }

    /// Append a choice to a decision node and return its slot. The choice
    /// starts unlinked whatever `decision.next` says.
    pub fn add_decision(
        &mut self,
        node: NodeId,
        decision: Decision,
    ) -> Result<usize, TimelineError> {
        let target = self.nodes.get_mut(&node).ok_or(TimelineError::UnknownNode(node))?;
        let actual = target.node_type();
        match &mut target.kind {
            NodeKind::Decision(decisions) => {
                Ok(decisions.add_decision(Decision { next: None, ..decision }))
            }
            _ => Err(TimelineError::WrongNodeType { node, actual }),
        }
    }

    pub fn add_operation(
        &mut self,
        node: NodeId,
        mut operation: Operation,
    ) -> Result<(), TimelineError> {
        operation.normalize();
        let target = self.nodes.get_mut(&node).ok_or(TimelineError::UnknownNode(node))?;
        let actual = target.node_type();
        match &mut target.kind {
            NodeKind::Consequence(consequence) => {
                consequence.operations.push(operation);
                Ok(())
            }
            _ => Err(TimelineError::WrongNodeType { node, actual }),
        }
    }

    /// Make `id` the node playback starts from.
    pub fn set_origin(&mut self, id: NodeId) -> Result<(), TimelineError> {
        self.require_node(id)?;
        self.edit("set origin", |timeline| {
            timeline.origin = Some(id);
            Ok(())
        })
    }

    /// Run the structural consistency check.
    pub fn check_integrity(&self) -> IntegrityReport {
        check_integrity(&self.nodes, self.origin)
    }

    /// Apply a graph edit, then check integrity and apply the policy to any
    /// violations the edit introduced.
    fn edit<T>(
        &mut self,
        action: &str,
        mutate: impl FnOnce(&mut Self) -> Result<T, TimelineError>,
    ) -> Result<T, TimelineError> {
        let before = self.check_integrity();
        let snapshot =
            (self.policy == IntegrityPolicy::Reject).then(|| (self.nodes.clone(), self.origin));

        let value = mutate(self)?;
        self.node_linkage_dirty = true;

        let introduced = self.check_integrity().introduced_since(&before);
        if introduced.is_clean() {
            return Ok(value);
        }
        match snapshot {
            Some((nodes, origin)) => {
                self.nodes = nodes;
                self.origin = origin;
                tracing::warn!("Rejected {}: {}", action, introduced);
                Err(TimelineError::StructuralIntegrityViolation(introduced))
            }
            None => {
                for violation in &introduced.violations {
                    tracing::error!("{} left a structural defect: {}", action, violation);
                }
                Ok(value)
            }
        }
    }

    fn require_node(&self, id: NodeId) -> Result<&TimelineNode, TimelineError> {
        self.nodes.get(&id).ok_or(TimelineError::UnknownNode(id))
    }

    /// Point `parent`'s edge at `slot` to `child`.
    ///
    /// A node the edge pointed to before is spliced in under `child` at
    /// `child`'s first free slot, so it stays reachable. Fails with
    /// [`TimelineError::CannotSplice`] before changing anything when `child`
    /// has no free slot to take it.
    pub fn link_nodes(
        &mut self,
        parent: NodeId,
        child: NodeId,
        slot: usize,
    ) -> Result<(), TimelineError> {
        if parent == child {
            return Err(TimelineError::SelfLink(parent));
        }
        let former = self.require_node(parent)?.edge(slot);
        let splice = match former {
            Some(former) if former != child => {
                let free = self
                    .require_node(child)?
                    .free_slot()
                    .ok_or(TimelineError::CannotSplice { parent, child, former })?;
                Some((former, free))
            }
            _ => {
                self.require_node(child)?;
                None
            }
        };

        self.edit("link", |timeline| {
            if let Some((former, free)) = splice {
                timeline.with_node(child, |node| node.set_edge(free, Some(former)));
                timeline.with_node(former, |node| node.add_parent(child));
            }
            timeline.with_node(parent, |node| node.set_edge(slot, Some(child)));
            timeline.with_node(child, |node| node.add_parent(parent));

            if let Some((former, _)) = splice {
                let still_linked = timeline
                    .nodes
                    .get(&parent)
                    .is_some_and(|node| node.slot_of(former).is_some());
                if !still_linked {
                    timeline.with_node(former, |node| node.remove_parent(parent));
                }
            }
            tracing::debug!("Linked {} -> {} at slot {}", parent, child, slot);
            Ok(())
        })
    }

    /// False when linking would have to splice a former child under `child`
    /// and `child` has no free slot for it.
    pub fn can_link_cleanly(&self, parent: NodeId, child: NodeId, slot: usize) -> bool {
        if parent == child {
            return false;
        }
        let (Some(p), Some(c)) = (self.nodes.get(&parent), self.nodes.get(&child)) else {
            return false;
        };
        match p.edge(slot) {
            Some(former) if former != child => c.free_slot().is_some(),
            _ => true,
        }
    }

    fn with_node(&mut self, id: NodeId, f: impl FnOnce(&mut TimelineNode)) {
        if let Some(node) = self.nodes.get_mut(&id) {
            f(node);
        }
    }

    /// The one child parented only by `node`, if there is exactly one.
    fn dependant_of(&self, node: &TimelineNode) -> Option<NodeId> {
        let mut unique = node
            .children()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(TimelineNode::is_uniquely_parented));
        match (unique.next(), unique.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Remove one node, rewiring its parents to its dependant.
    ///
    /// If the node was the origin, the dependant becomes the origin, else
    /// its first child. Check [`Timeline::can_remove_cleanly`] first:
    /// an unclean delete may strand nodes.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), TimelineError> {
        let node = self.require_node(id)?.clone();
        let dependant = self.dependant_of(&node);
        let children = node.children();

        self.edit("delete node", |timeline| {
            for child in &children {
                timeline.with_node(*child, |c| c.remove_parent(id));
            }
            for parent in node.previous.iter().filter(|p| **p != id) {
                let replacement = dependant.filter(|d| d != parent);
                timeline.with_node(*parent, |p| {
                    p.replace_edges(id, replacement);
                });
                if let Some(dependant) = replacement {
                    timeline.with_node(dependant, |d| d.add_parent(*parent));
                }
            }
            if timeline.origin == Some(id) {
                timeline.origin = dependant.or_else(|| children.first().copied());
            }
            timeline.nodes.remove(&id);
            tracing::debug!("Deleted {} (dependant {:?})", node.describe(), dependant);
            Ok(())
        })
    }

    /// True unless the node has two or more uniquely parented children, or
    /// is a childless origin.
    pub fn can_remove_cleanly(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let children = node.children();
        if children.is_empty() && self.origin == Some(id) {
            return false;
        }
        let dependants = children
            .iter()
            .filter(|c| self.nodes.get(*c).is_some_and(TimelineNode::is_uniquely_parented))
            .count();
        dependants < 2
    }

    /// Remove a node and every descendant left without a surviving parent.
    /// Returns the removed ids in removal order.
    ///
    /// Deleting the origin this way is never clean; see
    /// [`Timeline::can_delete_tree`].
    pub fn delete_tree(&mut self, id: NodeId) -> Result<Vec<NodeId>, TimelineError> {
        self.require_node(id)?;
        self.edit("delete tree", |timeline| {
            let mut removed = Vec::new();
            let mut queue = VecDeque::new();
            if let Some(root) = timeline.nodes.remove(&id) {
                queue.push_back(root);
            }

            while let Some(deleted) = queue.pop_front() {
                removed.push(deleted.id);
                for parent in &deleted.previous {
                    timeline.with_node(*parent, |p| {
                        p.replace_edges(deleted.id, None);
                    });
                }
                for child in deleted.children() {
                    let Some(previous) = timeline.nodes.get(&child).map(|c| c.previous.clone())
                    else {
                        continue;
                    };
                    let surviving = previous
                        .iter()
                        .filter(|p| **p != deleted.id && timeline.nodes.contains_key(*p))
                        .count();
                    timeline.with_node(child, |c| c.remove_parent(deleted.id));
                    if surviving == 0 {
                        if let Some(orphan) = timeline.nodes.remove(&child) {
                            queue.push_back(orphan);
                        }
                    }
                }
            }
            tracing::debug!("Deleted tree at {}: {} nodes", id, removed.len());
            Ok(removed)
        })
    }

    pub fn can_delete_tree(&self, id: NodeId) -> bool {
        self.origin != Some(id)
    }

    /// Nearest dialog node at or above `id`, searching parents depth first.
    pub fn get_last_dialog_node(
        &self,
        id: NodeId,
    ) -> Result<Option<(NodeId, &DialogNode)>, TimelineError> {
        self.require_node(id)?;
        let mut visited = rustc_hash::FxHashSet::default();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if let Some(dialog) = node.as_dialog() {
                return Ok(Some((current, dialog)));
            }
            stack.extend(node.previous.iter().rev());
        }
        Ok(None)
    }

    /// Compare `instance_value` against the predicate's value, checking it
    /// has the declared type of the predicate's variable.
    pub fn evaluate_predicate(
        &self,
        predicate: &Predicate,
        instance_value: &VariableValue,
    ) -> Result<bool, TimelineError> {
        let id = predicate.variable.ok_or(TimelineError::UnsetVariable)?;
        let declared = self.variables.get(&id).ok_or(TimelineError::UnknownVariable(id))?;
        if declared.variable_type() != instance_value.variable_type() {
            return Err(ValueError::TypeMismatch {
                expected: declared.variable_type(),
                found: instance_value.variable_type(),
            }
            .into());
        }
        Ok(instance_value.compare(predicate.comparison, &predicate.value)?)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packer = BinaryPacker::new();
        self.pack(&mut packer);
        packer.into_bytes()
    }

    /// Decode a complete timeline file. Trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TimelineError> {
        let mut unpacker = BinaryUnpacker::new(bytes);
        let timeline = Self::unpack(&mut unpacker)?;
        unpacker.finish()?;
        Ok(timeline)
    }

    pub fn save(&self, path: &Path) -> Result<(), TimelineError> {
        let bytes = self.to_bytes();
        fs::write(path, &bytes)?;
        tracing::info!(
            "Saved timeline '{}' to {} ({} bytes)",
            self.name,
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        let bytes = fs::read(path)?;
        let timeline = Self::from_bytes(&bytes)?;
        tracing::info!(
            "Loaded timeline '{}' from {} ({} nodes)",
            timeline.name,
            path.display(),
            timeline.nodes.len()
        );
        Ok(timeline)
    }
}

fn keyed<K: std::hash::Hash + Eq, V>(items: Vec<V>, key: impl Fn(&V) -> K) -> FxHashMap<K, V> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

impl Packable for Timeline {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_i32(self.id_count);
        packer.pack_str(&self.name);
        packer.pack_i32(NodeId::to_raw(self.origin));
        packer.pack_i32(CharacterId::to_raw(self.narrator));
        packer.pack_i32(SceneId::to_raw(self.default_scene));
        packer.pack_all(self.variables().into_iter());
        packer.pack_all(self.scenes().into_iter());
        packer.pack_all(self.characters().into_iter());
        packer.pack_all(self.nodes().into_iter());
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let id_count = unpacker.unpack_i32()?;
        let name = unpacker.unpack_string()?;
        let origin = NodeId::from_raw(unpacker.unpack_i32()?);
        let narrator = CharacterId::from_raw(unpacker.unpack_i32()?);
        let default_scene = SceneId::from_raw(unpacker.unpack_i32()?);
        let variables = keyed(unpacker.unpack_all::<TimelineVariable>()?, |v| v.id);
        let scenes = keyed(unpacker.unpack_all::<Scene>()?, |s| s.id);
        let characters = keyed(unpacker.unpack_all::<Character>()?, |c| c.id);
        let nodes = keyed(unpacker.unpack_all::<TimelineNode>()?, |n| n.id);
        Ok(Self::from_parts(
            id_count,
            name,
            origin,
            narrator,
            default_scene,
            variables,
            scenes,
            characters,
            nodes,
        ))
    }
}
