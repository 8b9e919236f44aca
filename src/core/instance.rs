//! Playback of a timeline.
//!
//! A [`TimelineInstance`] is one playthrough: variable values, the current
//! node, who is on stage, and the trail of visited nodes. Each call to
//! [`TimelineInstance::advance`] walks forward to the next dialog or
//! decision node, passing silently through branch and consequence nodes,
//! and reports what happened to a [`TimelineListener`].
//!
//! An advance either succeeds completely or changes nothing: it runs on a
//! staged copy of the state, and events reach the listener only after the
//! staged state is committed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::document::load_timeline;
use crate::core::packer::{BinaryPacker, BinaryUnpacker, PackError, Packable};
use crate::core::timeline::{Timeline, TimelineError};
use crate::schema::event::{DecisionPreview, TimelineEvent, TimelineListener};
use crate::schema::ids::{CharacterId, NodeId, SceneId, VariableId};
use crate::schema::node::{EvaluationError, NodeKind};
use crate::schema::value::{ValueError, VariableState, VariableValue};

/// Default limit on branch and consequence nodes passed in one advance.
pub const DEFAULT_MAX_TRANSIT_STEPS: usize = 10_000;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("{node} is waiting for a choice")]
    MissingChoice { node: NodeId },
    #[error("choice {choice} does not exist at {node}, which has {available}")]
    InvalidChoice {
        node: NodeId,
        choice: usize,
        available: usize,
    },
    #[error("choice {choice} was not offered at {node}")]
    ChoiceNotOffered { node: NodeId, choice: usize },
    #[error("predicate or operation has no variable")]
    UnsetVariable,
    #[error("unknown {0}")]
    UnknownVariable(VariableId),
    #[error("unknown {0}")]
    UnknownNode(NodeId),
    #[error("unknown {0}")]
    UnknownScene(SceneId),
    #[error("unknown {0}")]
    UnknownCharacter(CharacterId),
    #[error("passed {steps} branch and consequence nodes without reaching content")]
    CyclicTraversal { steps: usize },
    #[error("no timeline given")]
    MissingTimeline,
    #[error("value error: {0}")]
    Value(#[from] ValueError),
    #[error("timeline error: {0}")]
    Timeline(#[from] TimelineError),
    #[error("binary format error: {0}")]
    Pack(#[from] PackError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EvaluationError> for PlaybackError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::UnsetVariable => Self::UnsetVariable,
            EvaluationError::UnknownVariable(id) => Self::UnknownVariable(id),
            EvaluationError::Value(err) => Self::Value(err),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PlaybackState {
    variables: VariableState,
    current_node: Option<NodeId>,
    current_scene: Option<SceneId>,
    characters_in_scene: Vec<CharacterId>,
    history: Vec<NodeId>,
}

/// One playthrough of a shared, read-only [`Timeline`].
#[derive(Debug, Clone)]
pub struct TimelineInstance {
    timeline: Arc<Timeline>,
    state: PlaybackState,
    max_transit_steps: usize,
}

/// Builder for [`TimelineInstance`].
#[derive(Debug, Default)]
pub struct TimelineInstanceBuilder {
    timeline: Option<Arc<Timeline>>,
    timeline_path: Option<PathBuf>,
    max_transit_steps: Option<usize>,
}

impl TimelineInstanceBuilder {
    pub fn timeline(mut self, timeline: Arc<Timeline>) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Load the timeline from a binary or `.ron` file at build time.
    pub fn timeline_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.timeline_path = Some(path.into());
        self
    }

    pub fn max_transit_steps(mut self, steps: usize) -> Self {
        self.max_transit_steps = Some(steps);
        self
    }

    pub fn build(self) -> Result<TimelineInstance, PlaybackError> {
        let timeline = match (self.timeline, self.timeline_path) {
            (Some(timeline), _) => timeline,
            (None, Some(path)) => Arc::new(load_timeline(&path)?),
            (None, None) => return Err(PlaybackError::MissingTimeline),
        };
        let mut instance = TimelineInstance::new(timeline);
        if let Some(steps) = self.max_transit_steps {
            instance.max_transit_steps = steps;
        }
        Ok(instance)
    }
}

impl TimelineInstance {
    pub fn builder() -> TimelineInstanceBuilder {
        TimelineInstanceBuilder::default()
    }

    /// Start a playthrough with every variable at its declared value.
    pub fn new(timeline: Arc<Timeline>) -> Self {
        let mut variables = VariableState::new();
        for declared in timeline.variables() {
            variables.insert(declared.id, declared.value);
        }
        Self {
            timeline,
            state: PlaybackState {
                variables,
                ..PlaybackState::default()
            },
            max_transit_steps: DEFAULT_MAX_TRANSIT_STEPS,
        }
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.state.current_node
    }

    pub fn current_scene(&self) -> Option<SceneId> {
        self.state.current_scene
    }

    pub fn characters_in_scene(&self) -> &[CharacterId] {
        &self.state.characters_in_scene
    }

    /// Every node processed so far, in order.
    pub fn history(&self) -> &[NodeId] {
        &self.state.history
    }

    pub fn variable(&self, id: VariableId) -> Option<&VariableValue> {
        self.state.variables.get(id)
    }

    pub fn variables(&self) -> &VariableState {
        &self.state.variables
    }

    /// True once playback has run off the end of the graph.
    pub fn is_finished(&self) -> bool {
        self.state.current_node.is_none() && !self.state.history.is_empty()
    }

    pub fn max_transit_steps(&self) -> usize {
        self.max_transit_steps
    }

    pub fn set_max_transit_steps(&mut self, steps: usize) {
        self.max_transit_steps = steps;
    }

    /// Move to the next dialog or decision node.
    ///
    /// `choice` is the index of an offered choice and is only read when the
    /// current node is a decision. On error the instance is unchanged and
    /// the listener hears nothing.
    pub fn advance<L>(
        &mut self,
        choice: Option<usize>,
        listener: &mut L,
    ) -> Result<(), PlaybackError>
    where
        L: TimelineListener + ?Sized,
    {
        let mut staged = self.state.clone();
        let mut events = Vec::new();
        let mut choice = choice;
        let mut steps = 0;

        loop {
            self.determine_next_node(&mut staged, &mut choice)?;
            if self.process_current_node(&mut staged, &mut events)? {
                break;
            }
            steps += 1;
            if steps > self.max_transit_steps {
                return Err(PlaybackError::CyclicTraversal { steps });
            }
        }

        self.state = staged;
        for event in &events {
            listener.on_event(event);
        }
        Ok(())
    }

    /// [`TimelineInstance::advance`], returning the events instead.
    pub fn advance_collect(
        &mut self,
        choice: Option<usize>,
    ) -> Result<Vec<TimelineEvent>, PlaybackError> {
        let mut log = crate::schema::event::EventLog::new();
        self.advance(choice, &mut log)?;
        Ok(log.take())
    }

    fn determine_next_node(
        &self,
        staged: &mut PlaybackState,
        choice: &mut Option<usize>,
    ) -> Result<(), PlaybackError> {
        let Some(id) = staged.current_node else {
            if staged.history.is_empty() {
                staged.current_node = self.timeline.origin();
            }
            return Ok(());
        };
        let node = self.timeline.node(id).ok_or(PlaybackError::UnknownNode(id))?;

        let next = match &node.kind {
            NodeKind::Dialog(dialog) => dialog.next,
            NodeKind::Decision(decision) => {
                let index = choice.take().ok_or(PlaybackError::MissingChoice { node: id })?;
                let picked = decision.decisions.get(index).ok_or(PlaybackError::InvalidChoice {
                    node: id,
                    choice: index,
                    available: decision.decisions.len(),
                })?;
                if !picked.is_available(&staged.variables)? {
                    return Err(PlaybackError::ChoiceNotOffered {
                        node: id,
                        choice: index,
                    });
                }
                picked.next
            }
            NodeKind::Branch(branch) => {
                let mut taken = branch.default_next;
                for arm in &branch.arms {
                    if arm.predicate.evaluate(&staged.variables)? {
                        taken = arm.next;
                        break;
                    }
                }
                taken
            }
            NodeKind::Consequence(consequence) => {
                for operation in &consequence.operations {
                    operation.execute(&mut staged.variables)?;
                }
                consequence.next
            }
        };

        tracing::debug!("Leaving {} for {:?}", node.describe(), next);
        staged.current_node = next;
        Ok(())
    }

    /// Returns true when playback should stop and wait for the caller.
    fn process_current_node(
        &self,
        staged: &mut PlaybackState,
        events: &mut Vec<TimelineEvent>,
    ) -> Result<bool, PlaybackError> {
        let Some(id) = staged.current_node else {
            events.push(TimelineEvent::TimelineEnds);
            return Ok(true);
        };
        let node = self.timeline.node(id).ok_or(PlaybackError::UnknownNode(id))?;
        staged.history.push(id);

        match &node.kind {
            NodeKind::Dialog(dialog) => {
                if staged.current_scene != Some(dialog.scene) {
                    let scene = self
                        .timeline
                        .scene(dialog.scene)
                        .ok_or(PlaybackError::UnknownScene(dialog.scene))?;
                    events.push(TimelineEvent::SceneChanges { scene: scene.clone() });
                    staged.current_scene = Some(dialog.scene);
                }

                for present in &staged.characters_in_scene {
                    if !dialog.characters.contains(present) {
                        events.push(TimelineEvent::CharacterLeaves {
                            character: self.character(*present)?,
                        });
                    }
                }
                for arriving in &dialog.characters {
                    if !staged.characters_in_scene.contains(arriving) {
                        events.push(TimelineEvent::CharacterEnters {
                            character: self.character(*arriving)?,
                        });
                    }
                }

                events.push(TimelineEvent::Dialog {
                    speaker: self.character(dialog.speaker)?,
                    text: dialog.text.clone(),
                });
                staged.characters_in_scene = dialog.characters.clone();
                Ok(true)
            }
            NodeKind::Decision(decision) => {
                let mut choices = BTreeMap::new();
                for (index, offered) in decision.decisions.iter().enumerate() {
                    if offered.is_available(&staged.variables)? {
                        choices.insert(index, DecisionPreview::from(offered));
                    }
                }
                events.push(TimelineEvent::Choice { choices });
                Ok(true)
            }
            NodeKind::Branch(_) | NodeKind::Consequence(_) => Ok(false),
        }
    }

    fn character(&self, id: CharacterId) -> Result<crate::schema::cast::Character, PlaybackError> {
        self.timeline
            .character(id)
            .cloned()
            .ok_or(PlaybackError::UnknownCharacter(id))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packer = BinaryPacker::new();
        self.pack(&mut packer);
        packer.into_bytes()
    }

    /// Decode a saved playthrough. The transit cap is not part of the save,
    /// so the result starts at [`DEFAULT_MAX_TRANSIT_STEPS`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PlaybackError> {
        let mut unpacker = BinaryUnpacker::new(bytes);
        let instance = Self::unpack(&mut unpacker)?;
        unpacker.finish()?;
        Ok(instance)
    }

    /// Write the playthrough, including its timeline, to `path`.
    pub fn save(&self, path: &Path) -> Result<(), PlaybackError> {
        fs::write(path, self.to_bytes())?;
        tracing::info!("Saved playthrough of '{}' to {}", self.timeline.name(), path.display());
        Ok(())
    }

    /// Read a playthrough written by [`TimelineInstance::save`]. As with
    /// [`TimelineInstance::from_bytes`], the transit cap is reset to the
    /// default; use [`TimelineInstance::set_max_transit_steps`] to change it.
    pub fn restore(path: &Path) -> Result<Self, PlaybackError> {
        let instance = Self::from_bytes(&fs::read(path)?)?;
        tracing::info!(
            "Restored playthrough of '{}' at {:?}",
            instance.timeline.name(),
            instance.state.current_node
        );
        Ok(instance)
    }
}

impl Packable for TimelineInstance {
    fn pack(&self, packer: &mut BinaryPacker) {
        self.timeline.pack(packer);

        let variables = self.state.variables.sorted();
        packer.pack_len(variables.len());
        for (id, value) in &variables {
            packer.pack_i32(id.0);
            value.pack(packer);
        }

        packer.pack_i32(NodeId::to_raw(self.state.current_node));
        packer.pack_i32(SceneId::to_raw(self.state.current_scene));

        packer.pack_len(self.state.characters_in_scene.len());
        for character in &self.state.characters_in_scene {
            packer.pack_i32(character.0);
        }
        packer.pack_len(self.state.history.len());
        for node in &self.state.history {
            packer.pack_i32(node.0);
        }
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let timeline = Timeline::unpack(unpacker)?;

        let mut variables = VariableState::new();
        for _ in 0..unpacker.unpack_len()? {
            let id = VariableId(unpacker.unpack_i32()?);
            variables.insert(id, VariableValue::unpack(unpacker)?);
        }

        let current_node = NodeId::from_raw(unpacker.unpack_i32()?);
        let current_scene = SceneId::from_raw(unpacker.unpack_i32()?);

        let count = unpacker.unpack_len()?;
        let mut characters_in_scene = Vec::with_capacity(count.min(unpacker.remaining()));
        for _ in 0..count {
            characters_in_scene.push(CharacterId(unpacker.unpack_i32()?));
        }
        let count = unpacker.unpack_len()?;
        let mut history = Vec::with_capacity(count.min(unpacker.remaining()));
        for _ in 0..count {
            history.push(NodeId(unpacker.unpack_i32()?));
        }

        Ok(Self {
            timeline: Arc::new(timeline),
            state: PlaybackState {
                variables,
                current_node,
                current_scene,
                characters_in_scene,
                history,
            },
            max_transit_steps: DEFAULT_MAX_TRANSIT_STEPS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timeline::IntegrityPolicy;
    use crate::schema::cast::Character;
    use crate::schema::event::EventLog;
    use crate::schema::node::{Decision, Operation, Predicate};
    use crate::schema::value::Comparison;

    struct Story {
        timeline: Timeline,
        narrator: CharacterId,
        scene: SceneId,
    }

    impl Story {
        fn new() -> Self {
            let mut timeline = Timeline::new("Story");
            let narrator = timeline.add_character("Narrator");
            let scene = timeline.add_scene("Road");
            Self {
                timeline,
                narrator,
                scene,
            }
        }

        fn say(&mut self, text: &str) -> NodeId {
            self.timeline
                .add_dialog_node(self.scene, self.narrator, text, Vec::new())
        }

        fn play(self) -> TimelineInstance {
            TimelineInstance::new(Arc::new(self.timeline))
        }
    }

    fn dialog_text(events: &[TimelineEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                TimelineEvent::Dialog { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn two_paths() -> (TimelineInstance, SceneId) {
        let mut story = Story::new();
        let intro = story.say("Intro");
        let fork = story.timeline.add_decision_node();
        let left = story.say("Left path");
        let right = story.say("Right path");
        story.timeline.add_decision(fork, Decision::new("Go left", false)).unwrap();
        story.timeline.add_decision(fork, Decision::new("Go right", false)).unwrap();
        story.timeline.link_nodes(intro, fork, 0).unwrap();
        story.timeline.link_nodes(fork, left, 0).unwrap();
        story.timeline.link_nodes(fork, right, 1).unwrap();
        story.timeline.set_origin(intro).unwrap();
        let scene = story.scene;
        (story.play(), scene)
    }

    #[test]
    fn decision_flow() {
        let (mut instance, scene) = two_paths();

        let events = instance.advance_collect(None).unwrap();
        assert_eq!(
            events[0],
            TimelineEvent::SceneChanges {
                scene: instance.timeline().scene(scene).unwrap().clone()
            }
        );
        assert_eq!(dialog_text(&events), vec!["Intro"]);

        let events = instance.advance_collect(Some(1)).unwrap();
        let TimelineEvent::Choice { choices } = &events[0] else {
            panic!("expected a choice, got {events:?}");
        };
        let texts: Vec<(usize, &str)> =
            choices.iter().map(|(i, d)| (*i, d.text.as_str())).collect();
        assert_eq!(texts, vec![(0, "Go left"), (1, "Go right")]);

        let events = instance.advance_collect(Some(0)).unwrap();
        assert_eq!(events.len(), 1, "scene is unchanged");
        assert_eq!(dialog_text(&events), vec!["Left path"]);

        assert_eq!(instance.advance_collect(None).unwrap(), vec![TimelineEvent::TimelineEnds]);
        assert!(instance.is_finished());
        assert_eq!(instance.history().len(), 3);
    }

    #[test]
    fn missing_and_invalid_choices_change_nothing() {
        let (mut instance, _) = two_paths();
        instance.advance_collect(None).unwrap();
        instance.advance_collect(None).unwrap();
        let at_decision = instance.current_node();
        let history = instance.history().to_vec();

        let mut heard = EventLog::new();
        assert!(matches!(
            instance.advance(None, &mut heard),
            Err(PlaybackError::MissingChoice { .. })
        ));
        assert!(matches!(
            instance.advance(Some(2), &mut heard),
            Err(PlaybackError::InvalidChoice { choice: 2, available: 2, .. })
        ));
        assert!(heard.events.is_empty());
        assert_eq!(instance.current_node(), at_decision);
        assert_eq!(instance.history(), history.as_slice());
    }

    #[test]
    fn branch_takes_first_true_arm() {
        let mut story = Story::new();
        let x = story.timeline.add_variable("x", VariableValue::Integer(0));
        let start = story.say("start");
        let branch = story.timeline.add_branch_node();
        let five = story.say("x is five");
        let zero = story.say("x is zero");
        let fallback = story.say("fallback");
        for wanted in [5, 0, 0] {
            story
                .timeline
                .add_branch_arm(
                    branch,
                    Predicate::new(x, Comparison::Equal, VariableValue::Integer(wanted)),
                )
                .unwrap();
        }
        story.timeline.link_nodes(start, branch, 0).unwrap();
        story.timeline.link_nodes(branch, five, 0).unwrap();
        story.timeline.link_nodes(branch, zero, 1).unwrap();
        story.timeline.link_nodes(branch, fallback, 3).unwrap();
        story.timeline.set_origin(start).unwrap();

        for _ in 0..3 {
            let mut instance = TimelineInstance::new(Arc::new(story.timeline.clone()));
            instance.advance_collect(None).unwrap();
            let events = instance.advance_collect(None).unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(dialog_text(&events), vec!["x is zero"]);
            assert_eq!(instance.history(), &[start, branch, zero]);
        }
    }

    #[test]
    fn gated_choice_is_omitted() {
        let mut story = Story::new();
        let rich = story.timeline.add_variable("rich", VariableValue::Boolean(false));
        let fork = story.timeline.add_decision_node();
        story.timeline.add_decision(fork, Decision::new("Walk", false)).unwrap();
        story
            .timeline
            .add_decision(
                fork,
                Decision::new("Ride", false).with_predicate(Predicate::new(
                    rich,
                    Comparison::Equal,
                    VariableValue::Boolean(true),
                )),
            )
            .unwrap();
        story.timeline.add_decision(fork, Decision::new("Wait", false)).unwrap();
        story.timeline.set_origin(fork).unwrap();

        let mut instance = story.play();
        let events = instance.advance_collect(None).unwrap();
        let TimelineEvent::Choice { choices } = &events[0] else {
            panic!("expected a choice");
        };
        assert_eq!(choices.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert!(matches!(
            instance.advance_collect(Some(1)),
            Err(PlaybackError::ChoiceNotOffered { choice: 1, .. })
        ));
    }

    #[test]
    fn consequence_applies_operations_silently() {
        let mut story = Story::new();
        let y = story.timeline.add_variable("y", VariableValue::Integer(0));
        let start = story.say("start");
        let consequence = story.timeline.add_consequence_node();
        let after = story.say("after");
        story
            .timeline
            .add_operation(consequence, Operation::set(y, VariableValue::Integer(10)))
            .unwrap();
        story
            .timeline
            .add_operation(consequence, Operation::modify(y, VariableValue::Integer(5)))
            .unwrap();
        story.timeline.link_nodes(start, consequence, 0).unwrap();
        story.timeline.link_nodes(consequence, after, 0).unwrap();
        story.timeline.set_origin(start).unwrap();

        let mut instance = story.play();
        instance.advance_collect(None).unwrap();
        let events = instance.advance_collect(None).unwrap();
        assert_eq!(dialog_text(&events), vec!["after"]);
        assert_eq!(events.len(), 1);
        assert_eq!(instance.variable(y), Some(&VariableValue::Integer(15)));
        assert_eq!(instance.current_node(), Some(after));
    }

    #[test]
    fn failed_operation_rolls_back_variables() {
        let mut story = Story::new();
        let y = story.timeline.add_variable("y", VariableValue::Integer(i32::MAX - 1));
        let consequence = story.timeline.add_consequence_node();
        story
            .timeline
            .add_operation(consequence, Operation::modify(y, VariableValue::Integer(1)))
            .unwrap();
        story
            .timeline
            .add_operation(consequence, Operation::modify(y, VariableValue::Integer(1)))
            .unwrap();
        story.timeline.set_origin(consequence).unwrap();

        let mut instance = story.play();
        assert!(matches!(
            instance.advance_collect(None),
            Err(PlaybackError::Value(ValueError::Overflow { .. }))
        ));
        assert_eq!(instance.variable(y), Some(&VariableValue::Integer(i32::MAX - 1)));
        assert!(instance.history().is_empty());
    }

    #[test]
    fn cast_changes_are_announced_in_order() {
        let mut story = Story::new();
        let ann = story.timeline.add_character("Ann");
        let bo = story.timeline.add_character("Bo");
        let cy = story.timeline.add_character("Cy");
        let hall = story.timeline.add_scene("Hall");
        let first = story
            .timeline
            .add_dialog_node(story.scene, ann, "one", vec![ann, bo]);
        let second = story.timeline.add_dialog_node(hall, bo, "two", vec![bo, cy]);
        story.timeline.link_nodes(first, second, 0).unwrap();
        story.timeline.set_origin(first).unwrap();

        let mut instance = story.play();
        instance.advance_collect(None).unwrap();
        let events = instance.advance_collect(None).unwrap();
        let names: Vec<&str> = events.iter().map(TimelineEvent::name).collect();
        assert_eq!(
            names,
            vec!["scene_changes", "character_leaves", "character_enters", "dialog"]
        );
        assert_eq!(
            events[1],
            TimelineEvent::CharacterLeaves {
                character: Character {
                    id: ann,
                    name: "Ann".to_string()
                }
            }
        );
        assert_eq!(instance.characters_in_scene(), &[bo, cy]);
        assert_eq!(instance.current_scene(), Some(hall));
    }

    #[test]
    fn pass_through_loop_hits_the_cap() {
        let mut story = Story::new();
        let branch = story.timeline.add_branch_node();
        let consequence = story.timeline.add_consequence_node();
        story.timeline.set_policy(IntegrityPolicy::Log);
        story.timeline.link_nodes(branch, consequence, 0).unwrap();
        story.timeline.link_nodes(consequence, branch, 0).unwrap();
        story.timeline.set_origin(branch).unwrap();

        let mut instance = TimelineInstance::builder()
            .timeline(Arc::new(story.timeline))
            .max_transit_steps(50)
            .build()
            .unwrap();
        assert!(matches!(
            instance.advance_collect(None),
            Err(PlaybackError::CyclicTraversal { steps: 51 })
        ));
        assert!(instance.history().is_empty());
    }

    #[test]
    fn empty_timeline_ends_immediately() {
        let mut instance = TimelineInstance::new(Arc::new(Timeline::new("Empty")));
        assert_eq!(instance.advance_collect(None).unwrap(), vec![TimelineEvent::TimelineEnds]);
        assert!(!instance.is_finished());
    }

    #[test]
    fn builder_requires_a_timeline() {
        assert!(matches!(
            TimelineInstance::builder().build(),
            Err(PlaybackError::MissingTimeline)
        ));
    }

    #[test]
    fn playthrough_round_trips() {
        let (mut instance, _) = two_paths();
        instance.advance_collect(None).unwrap();
        instance.advance_collect(None).unwrap();

        let restored = TimelineInstance::from_bytes(&instance.to_bytes()).unwrap();
        assert_eq!(restored.current_node(), instance.current_node());
        assert_eq!(restored.current_scene(), instance.current_scene());
        assert_eq!(restored.history(), instance.history());
        assert_eq!(restored.variables(), instance.variables());
        assert_eq!(**restored.timeline(), **instance.timeline());

        let mut restored = restored;
        let events = restored.advance_collect(Some(1)).unwrap();
        assert_eq!(dialog_text(&events), vec!["Right path"]);
    }
}
