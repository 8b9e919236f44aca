//! Timeline nodes: the four node variants and their outgoing edges.
//!
//! Every variant stores its forward edges as numbered slots:
//!
//! - Dialog, Consequence: slot 0 is the single `next` edge.
//! - Branch: slots `0..arms.len()` are the predicate arms, slot
//!   `arms.len()` is the default edge, and any higher slot appends a new arm.
//! - Decision: slot `i` is decision `i`; slots past the end append a
//!   new decision.
//!
//! Parent links (`previous`) are maintained by the timeline, never by the
//! node itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::{CharacterId, NodeId, SceneId, VariableId};
use super::value::{Comparison, Operator, ValueError, VariableState, VariableValue};

/// Why a predicate or operation could not run.
///
/// `UnsetVariable` is an authoring gap: the item never had a variable
/// chosen. `UnknownVariable` names a chosen id that has no value in the
/// playthrough, usually a dangling reference to an undeclared variable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("no variable has been chosen")]
    UnsetVariable,
    #[error("no value for {0}")]
    UnknownVariable(VariableId),
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Wire tag of each node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Dialog = 0,
    Branch = 1,
    Decision = 2,
    Consequence = 3,
}

impl NodeType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Dialog),
            1 => Some(Self::Branch),
            2 => Some(Self::Decision),
            3 => Some(Self::Consequence),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dialog => "Dialog",
            Self::Branch => "Branch",
            Self::Decision => "Decision",
            Self::Consequence => "Consequence",
        };
        f.write_str(name)
    }
}

/// `variable <comparison> value`, evaluated against a playthrough's state.
///
/// An unset predicate (no variable) carries a placeholder value and never
/// evaluates successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub variable: Option<VariableId>,
    pub comparison: Comparison,
    pub value: VariableValue,
}

impl Default for Predicate {
    fn default() -> Self {
        Self {
            variable: None,
            comparison: Comparison::Equal,
            value: VariableValue::Boolean(false),
        }
    }
}

impl Predicate {
    pub fn new(variable: VariableId, comparison: Comparison, value: VariableValue) -> Self {
        Self {
            variable: Some(variable),
            comparison,
            value,
        }
    }

    pub fn evaluate(&self, state: &VariableState) -> Result<bool, EvaluationError> {
        let id = self.variable.ok_or(EvaluationError::UnsetVariable)?;
        let current = state.get(id).ok_or(EvaluationError::UnknownVariable(id))?;
        Ok(current.compare(self.comparison, &self.value)?)
    }

    /// Reset the value of an unset predicate to the placeholder, the only
    /// value the binary format can hold for it.
    pub fn normalize(&mut self) {
        if self.variable.is_none() {
            self.value = Self::default().value;
        }
    }

    /// Label such as `gold >= 5`, given the variable's display name.
    pub fn label(&self, variable_name: &str) -> String {
        match self.variable {
            None => "No Comparison".to_string(),
            Some(_) => format!("{} {} {}", variable_name, self.comparison.symbol(), self.value),
        }
    }
}

/// A side effect on one variable, applied when a consequence node is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub variable: Option<VariableId>,
    pub operator: Operator,
    pub operand: VariableValue,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            variable: None,
            operator: Operator::Set,
            operand: VariableValue::Boolean(false),
        }
    }
}

impl Operation {
    pub fn set(variable: VariableId, operand: VariableValue) -> Self {
        Self {
            variable: Some(variable),
            operator: Operator::Set,
            operand,
        }
    }

    pub fn modify(variable: VariableId, operand: VariableValue) -> Self {
        Self {
            variable: Some(variable),
            operator: Operator::Modify,
            operand,
        }
    }

    /// Reset the operand of an unset operation to the placeholder.
    pub fn normalize(&mut self) {
        if self.variable.is_none() {
            self.operand = Self::default().operand;
        }
    }

    /// Apply this operation to one value.
    pub fn apply_to(&self, value: &mut VariableValue) -> Result<(), ValueError> {
        value.apply(self.operator, &self.operand)
    }

    /// Apply this operation to the targeted variable in `state`.
    pub fn execute(&self, state: &mut VariableState) -> Result<(), EvaluationError> {
        let id = self.variable.ok_or(EvaluationError::UnsetVariable)?;
        let value = state.get_mut(id).ok_or(EvaluationError::UnknownVariable(id))?;
        Ok(self.apply_to(value)?)
    }

    pub fn label(&self, variable_name: &str) -> String {
        match self.variable {
            None => "No Operation".to_string(),
            Some(_) => format!("{:?} {} {}", self.operator, variable_name, self.operand),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogNode {
    pub scene: SceneId,
    pub speaker: CharacterId,
    /// Characters present on stage while this line is shown.
    #[serde(default)]
    pub characters: Vec<CharacterId>,
    pub text: String,
    #[serde(default)]
    pub next: Option<NodeId>,
}

/// One conditional arm of a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchArm {
    pub predicate: Predicate,
    #[serde(default)]
    pub next: Option<NodeId>,
}

/// Takes the first arm whose predicate holds, else the default edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchNode {
    #[serde(default)]
    pub arms: Vec<BranchArm>,
    #[serde(default)]
    pub default_next: Option<NodeId>,
}

impl BranchNode {
    /// Append an arm and return its slot.
    pub fn add_arm(&mut self, mut predicate: Predicate) -> usize {
        predicate.normalize();
        self.arms.push(BranchArm {
            predicate,
            next: None,
        });
        self.arms.len() - 1
    }
}

/// A choice offered to the player. Gating predicates are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub text: String,
    /// Whether the choice text is spoken aloud by the player character.
    #[serde(default)]
    pub is_quoted_dialog: bool,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub next: Option<NodeId>,
}

impl Decision {
    pub fn new(text: impl Into<String>, is_quoted_dialog: bool) -> Self {
        Self {
            text: text.into(),
            is_quoted_dialog,
            predicates: Vec::new(),
            next: None,
        }
    }

    pub fn with_predicate(mut self, mut predicate: Predicate) -> Self {
        predicate.normalize();
        self.predicates.push(predicate);
        self
    }

    /// True when every gating predicate holds.
    pub fn is_available(&self, state: &VariableState) -> Result<bool, EvaluationError> {
        for predicate in &self.predicates {
            if !predicate.evaluate(state)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNode {
    #[serde(default)]
    pub decisions: Vec<Decision>,
}

impl DecisionNode {
    /// Append a decision and return its slot.
    pub fn add_decision(&mut self, mut decision: Decision) -> usize {
        decision.predicates.iter_mut().for_each(Predicate::normalize);
        self.decisions.push(decision);
        self.decisions.len() - 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsequenceNode {
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub next: Option<NodeId>,
}

/// Variant payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Dialog(DialogNode),
    Branch(BranchNode),
    Decision(DecisionNode),
    Consequence(ConsequenceNode),
}

/// A vertex of the timeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineNode {
    pub id: NodeId,
    /// Ids of nodes with an edge into this one. No duplicates.
    pub previous: Vec<NodeId>,
    pub kind: NodeKind,
}

impl TimelineNode {
    /// A node with no parents. Unset predicates and operations in `kind`
    /// are normalized.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        let mut node = Self {
            id,
            previous: Vec::new(),
            kind,
        };
        node.normalize();
        node
    }

    /// Normalize every predicate and operation held by this node.
    pub fn normalize(&mut self) {
        match &mut self.kind {
            NodeKind::Dialog(_) => {}
            NodeKind::Branch(branch) => {
                for arm in &mut branch.arms {
                    arm.predicate.normalize();
                }
            }
            NodeKind::Decision(decision) => {
                for choice in &mut decision.decisions {
                    choice.predicates.iter_mut().for_each(Predicate::normalize);
                }
            }
            NodeKind::Consequence(consequence) => {
                consequence.operations.iter_mut().for_each(Operation::normalize);
            }
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Dialog(_) => NodeType::Dialog,
            NodeKind::Branch(_) => NodeType::Branch,
            NodeKind::Decision(_) => NodeType::Decision,
            NodeKind::Consequence(_) => NodeType::Consequence,
        }
    }

    /// Dialog and decision nodes stop playback; the others are passed through.
    pub fn is_content(&self) -> bool {
        matches!(self.kind, NodeKind::Dialog(_) | NodeKind::Decision(_))
    }

    pub fn as_dialog(&self) -> Option<&DialogNode> {
        match &self.kind {
            NodeKind::Dialog(dialog) => Some(dialog),
            _ => None,
        }
    }

    /// Fewer than two parents.
    pub fn is_uniquely_parented(&self) -> bool {
        self.previous.len() < 2
    }

    pub fn add_parent(&mut self, parent: NodeId) {
        if !self.previous.contains(&parent) {
            self.previous.push(parent);
        }
    }

    pub fn remove_parent(&mut self, parent: NodeId) {
        self.previous.retain(|id| *id != parent);
    }

    /// Number of addressable edge slots.
    pub fn slot_count(&self) -> usize {
        match &self.kind {
            NodeKind::Dialog(_) | NodeKind::Consequence(_) => 1,
            NodeKind::Branch(branch) => branch.arms.len() + 1,
            NodeKind::Decision(decision) => decision.decisions.len(),
        }
    }

    /// Target of the edge at `slot`, if any.
    pub fn edge(&self, slot: usize) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Dialog(dialog) => dialog.next,
            NodeKind::Consequence(consequence) => consequence.next,
            NodeKind::Branch(branch) => {
                if slot == branch.arms.len() {
                    branch.default_next
                } else {
                    branch.arms.get(slot).and_then(|arm| arm.next)
                }
            }
            NodeKind::Decision(decision) => decision.decisions.get(slot).and_then(|d| d.next),
        }
    }

    /// Point the edge at `slot` to `target`, growing branch arms or
    /// decisions when `slot` is past the end.
    pub fn set_edge(&mut self, slot: usize, target: Option<NodeId>) {
        match &mut self.kind {
            NodeKind::Dialog(dialog) => dialog.next = target,
            NodeKind::Consequence(consequence) => consequence.next = target,
            NodeKind::Branch(branch) => {
                let arms = branch.arms.len();
                if slot == arms {
                    branch.default_next = target;
                } else if slot > arms {
                    branch.arms.push(BranchArm {
                        predicate: Predicate::default(),
                        next: target,
                    });
                } else {
                    branch.arms[slot].next = target;
                }
            }
            NodeKind::Decision(decision) => match decision.decisions.get_mut(slot) {
                Some(existing) => existing.next = target,
                None => decision.decisions.push(Decision {
                    next: target,
                    ..Decision::default()
                }),
            },
        }
    }

    /// A slot that can take a new edge without displacing one, or `None`
    /// for a single-edge node whose edge is already in use.
    pub fn free_slot(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Dialog(DialogNode { next, .. })
            | NodeKind::Consequence(ConsequenceNode { next, .. }) => next.is_none().then_some(0),
            NodeKind::Branch(branch) => {
                if branch.default_next.is_none() {
                    return Some(branch.arms.len());
                }
                Some(
                    branch
                        .arms
                        .iter()
                        .position(|arm| arm.next.is_none())
                        .unwrap_or(branch.arms.len() + 1),
                )
            }
            NodeKind::Decision(decision) => Some(
                decision
                    .decisions
                    .iter()
                    .position(|d| d.next.is_none())
                    .unwrap_or(decision.decisions.len()),
            ),
        }
    }

    /// First slot pointing at `child`.
    pub fn slot_of(&self, child: NodeId) -> Option<usize> {
        (0..self.slot_count()).find(|slot| self.edge(*slot) == Some(child))
    }

    /// Distinct child ids in slot order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for slot in 0..self.slot_count() {
            if let Some(id) = self.edge(slot) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Repoint every slot targeting `old` to `new`. Returns how many changed.
    pub fn replace_edges(&mut self, old: NodeId, new: Option<NodeId>) -> usize {
        let slots: Vec<usize> = (0..self.slot_count())
            .filter(|slot| self.edge(*slot) == Some(old))
            .collect();
        for slot in &slots {
            self.set_edge(*slot, new);
        }
        slots.len()
    }

    /// One-line summary used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Dialog(dialog) => format!("Dialog {} : {}", self.id.0, dialog.text),
            NodeKind::Branch(branch) => {
                format!("Branch {} : {} branches", self.id.0, branch.arms.len())
            }
            NodeKind::Decision(decision) => {
                format!("Decision {} : {} choices", self.id.0, decision.decisions.len())
            }
            NodeKind::Consequence(consequence) => format!(
                "Consequence {} : {} operations",
                self.id.0,
                consequence.operations.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog(id: i32) -> TimelineNode {
        TimelineNode::new(
            NodeId(id),
            NodeKind::Dialog(DialogNode {
                scene: SceneId(0),
                speaker: CharacterId(0),
                characters: Vec::new(),
                text: "line".to_string(),
                next: None,
            }),
        )
    }

    #[test]
    fn dialog_has_one_slot() {
        let mut node = dialog(1);
        assert_eq!(node.free_slot(), Some(0));
        node.set_edge(3, Some(NodeId(2)));
        assert_eq!(node.edge(0), Some(NodeId(2)));
        assert_eq!(node.free_slot(), None);
        assert_eq!(node.children(), vec![NodeId(2)]);
    }

    #[test]
    fn branch_slots_fill_default_then_arms_then_grow() {
        let mut branch = BranchNode::default();
        branch.add_arm(Predicate::default());
        let mut node = TimelineNode::new(NodeId(1), NodeKind::Branch(branch));

        assert_eq!(node.free_slot(), Some(1));
        node.set_edge(1, Some(NodeId(5)));
        assert_eq!(node.free_slot(), Some(0));
        node.set_edge(0, Some(NodeId(6)));
        assert_eq!(node.free_slot(), Some(2));
        node.set_edge(2, Some(NodeId(7)));

        let NodeKind::Branch(branch) = &node.kind else {
            panic!("expected branch");
        };
        assert_eq!(branch.arms.len(), 2);
        assert_eq!(branch.arms[1].next, Some(NodeId(7)));
        assert_eq!(node.edge(2), Some(NodeId(5)));
        assert_eq!(node.children(), vec![NodeId(6), NodeId(7), NodeId(5)]);
    }

    #[test]
    fn decision_slots_grow_with_choices() {
        let mut node = TimelineNode::new(NodeId(1), NodeKind::Decision(DecisionNode::default()));
        assert_eq!(node.free_slot(), Some(0));
        node.set_edge(0, Some(NodeId(2)));
        node.set_edge(9, Some(NodeId(3)));
        assert_eq!(node.slot_count(), 2);
        assert_eq!(node.slot_of(NodeId(3)), Some(1));
    }

    #[test]
    fn replace_edges_hits_every_matching_slot() {
        let mut decisions = DecisionNode::default();
        decisions.add_decision(Decision::new("a", false));
        decisions.add_decision(Decision::new("b", false));
        let mut node = TimelineNode::new(NodeId(1), NodeKind::Decision(decisions));
        node.set_edge(0, Some(NodeId(4)));
        node.set_edge(1, Some(NodeId(4)));
        assert_eq!(node.children(), vec![NodeId(4)]);

        assert_eq!(node.replace_edges(NodeId(4), None), 2);
        assert!(node.children().is_empty());
    }

    #[test]
    fn parents_stay_unique() {
        let mut node = dialog(1);
        node.add_parent(NodeId(0));
        node.add_parent(NodeId(0));
        assert_eq!(node.previous, vec![NodeId(0)]);
        assert!(node.is_uniquely_parented());
        node.add_parent(NodeId(2));
        assert!(!node.is_uniquely_parented());
    }

    #[test]
    fn predicate_requires_a_variable() {
        let state = VariableState::new();
        assert_eq!(Predicate::default().evaluate(&state), Err(EvaluationError::UnsetVariable));
        let p = Predicate::new(VariableId(3), Comparison::Equal, VariableValue::Integer(1));
        assert_eq!(p.evaluate(&state), Err(EvaluationError::UnknownVariable(VariableId(3))));
    }

    #[test]
    fn decision_gates_on_all_predicates() {
        let mut state = VariableState::new();
        state.insert(VariableId(1), VariableValue::Integer(4));
        state.insert(VariableId(2), VariableValue::Boolean(true));
        let enough = Predicate::new(
            VariableId(1),
            Comparison::GreaterThanEqual,
            VariableValue::Integer(3),
        );
        let unlocked =
            Predicate::new(VariableId(2), Comparison::Equal, VariableValue::Boolean(false));
        let decision = Decision::new("Pay", false)
            .with_predicate(enough)
            .with_predicate(unlocked);
        assert_eq!(decision.is_available(&state), Ok(false));
    }

    #[test]
    fn operation_executes_against_state() {
        let mut state = VariableState::new();
        state.insert(VariableId(1), VariableValue::Integer(0));
        Operation::set(VariableId(1), VariableValue::Integer(10)).execute(&mut state).unwrap();
        Operation::modify(VariableId(1), VariableValue::Integer(5)).execute(&mut state).unwrap();
        assert_eq!(state.get(VariableId(1)), Some(&VariableValue::Integer(15)));

        let unset = Operation::default();
        assert_eq!(unset.execute(&mut state), Err(EvaluationError::UnsetVariable));
        let dangling = Operation::set(VariableId(9), VariableValue::Integer(1));
        assert_eq!(
            dangling.execute(&mut state),
            Err(EvaluationError::UnknownVariable(VariableId(9)))
        );
        assert_eq!(state.get(VariableId(1)), Some(&VariableValue::Integer(15)));
    }

    #[test]
    fn unset_payloads_are_normalized() {
        let raw = Predicate {
            variable: None,
            comparison: Comparison::LessThan,
            value: VariableValue::Integer(3),
        };
        let mut predicate = raw.clone();
        predicate.normalize();
        assert_eq!(predicate.value, Predicate::default().value);
        assert_eq!(predicate.comparison, Comparison::LessThan);

        let mut set = Predicate::new(VariableId(1), Comparison::Equal, VariableValue::Integer(3));
        set.normalize();
        assert_eq!(set.value, VariableValue::Integer(3));

        let branch = BranchNode {
            arms: vec![BranchArm {
                predicate: raw,
                next: None,
            }],
            default_next: None,
        };
        let node = TimelineNode::new(NodeId(1), NodeKind::Branch(branch));
        let NodeKind::Branch(branch) = &node.kind else {
            panic!("not a branch node");
        };
        assert_eq!(branch.arms[0].predicate, predicate);
    }
}
