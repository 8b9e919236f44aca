//! Binary encoding of schema types.
//!
//! # Layout
//! ```text
//! value       typeTag:byte, bool | int
//! variable    id:int, value, name:string
//! scene       id:int, name:string
//! character   id:int, name:string
//! predicate   variableID:int, comparison:byte, [value if variableID != -1], nextNodeID:int
//! operation   variableID:int, operator:byte, [value if variableID != -1]
//! node        typeTag:byte, id:int, previousCount:int, [previousID:int]*, payload
//!   Dialog       sceneID:int, charCount:int, [charID:int]*, speakerID:int,
//!                text:string, nextNodeID:int
//!   Branch       defaultNextID:int, predicateCount:int, [predicate]*
//!   Decision     decisionCount:int, [text:string, isDialog:bool,
//!                predicateCount:int, [predicate]*, nextNodeID:int]*
//!   Consequence  nextNodeID:int, operationCount:int, [operation]*
//! ```

use crate::core::packer::{BinaryPacker, BinaryUnpacker, PackError, Packable};
use crate::schema::cast::{Character, Scene, TimelineVariable};
use crate::schema::ids::{CharacterId, NodeId, SceneId, VariableId};
use crate::schema::node::{
    BranchArm, BranchNode, ConsequenceNode, Decision, DecisionNode, DialogNode, NodeKind,
    NodeType, Operation, Predicate, TimelineNode,
};
use crate::schema::value::{Comparison, Operator, VariableType, VariableValue};

fn pack_node_id(packer: &mut BinaryPacker, id: Option<NodeId>) {
    packer.pack_i32(NodeId::to_raw(id));
}

fn unpack_node_id(unpacker: &mut BinaryUnpacker<'_>) -> Result<Option<NodeId>, PackError> {
    Ok(NodeId::from_raw(unpacker.unpack_i32()?))
}

impl Packable for VariableValue {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_u8(self.variable_type() as u8);
        match self {
            VariableValue::Boolean(b) => packer.pack_bool(*b),
            VariableValue::Integer(i) => packer.pack_i32(*i),
        }
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let tag = unpacker.unpack_u8()?;
        match VariableType::from_tag(tag) {
            Some(VariableType::Boolean) => Ok(VariableValue::Boolean(unpacker.unpack_bool()?)),
            Some(VariableType::Integer) => Ok(VariableValue::Integer(unpacker.unpack_i32()?)),
            None => Err(PackError::UnknownValueType(tag)),
        }
    }
}

impl Packable for TimelineVariable {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_i32(self.id.0);
        self.value.pack(packer);
        packer.pack_str(&self.name);
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let id = VariableId(unpacker.unpack_i32()?);
        let value = VariableValue::unpack(unpacker)?;
        let name = unpacker.unpack_string()?;
        Ok(Self { id, name, value })
    }
}

impl Packable for Scene {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_i32(self.id.0);
        packer.pack_str(&self.name);
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        Ok(Self {
            id: SceneId(unpacker.unpack_i32()?),
            name: unpacker.unpack_string()?,
        })
    }
}

impl Packable for Character {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_i32(self.id.0);
        packer.pack_str(&self.name);
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        Ok(Self {
            id: CharacterId(unpacker.unpack_i32()?),
            name: unpacker.unpack_string()?,
        })
    }
}

fn pack_predicate(packer: &mut BinaryPacker, predicate: &Predicate, next: Option<NodeId>) {
    packer.pack_i32(VariableId::to_raw(predicate.variable));
    packer.pack_u8(predicate.comparison as u8);
    if predicate.variable.is_some() {
        predicate.value.pack(packer);
    }
    pack_node_id(packer, next);
}

fn unpack_predicate(
    unpacker: &mut BinaryUnpacker<'_>,
) -> Result<(Predicate, Option<NodeId>), PackError> {
    let variable = VariableId::from_raw(unpacker.unpack_i32()?);
    let tag = unpacker.unpack_u8()?;
    let comparison = Comparison::from_tag(tag).ok_or(PackError::UnknownComparison(tag))?;
    let value = match variable {
        Some(_) => VariableValue::unpack(unpacker)?,
        None => Predicate::default().value,
    };
    let next = unpack_node_id(unpacker)?;
    Ok((
        Predicate {
            variable,
            comparison,
            value,
        },
        next,
    ))
}

impl Packable for BranchArm {
    fn pack(&self, packer: &mut BinaryPacker) {
        pack_predicate(packer, &self.predicate, self.next);
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let (predicate, next) = unpack_predicate(unpacker)?;
        Ok(Self { predicate, next })
    }
}

/// Gating predicates have no edge of their own; their edge field is always -1.
impl Packable for Predicate {
    fn pack(&self, packer: &mut BinaryPacker) {
        pack_predicate(packer, self, None);
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        Ok(unpack_predicate(unpacker)?.0)
    }
}

impl Packable for Operation {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_i32(VariableId::to_raw(self.variable));
        packer.pack_u8(self.operator as u8);
        if self.variable.is_some() {
            self.operand.pack(packer);
        }
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let variable = VariableId::from_raw(unpacker.unpack_i32()?);
        let tag = unpacker.unpack_u8()?;
        let operator = Operator::from_tag(tag).ok_or(PackError::UnknownOperator(tag))?;
        let operand = match variable {
            Some(_) => VariableValue::unpack(unpacker)?,
            None => Operation::default().operand,
        };
        Ok(Self {
            variable,
            operator,
            operand,
        })
    }
}

impl Packable for Decision {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_str(&self.text);
        packer.pack_bool(self.is_quoted_dialog);
        packer.pack_all(self.predicates.iter());
        pack_node_id(packer, self.next);
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        Ok(Self {
            text: unpacker.unpack_string()?,
            is_quoted_dialog: unpacker.unpack_bool()?,
            predicates: unpacker.unpack_all()?,
            next: unpack_node_id(unpacker)?,
        })
    }
}

fn pack_dialog(packer: &mut BinaryPacker, dialog: &DialogNode) {
    packer.pack_i32(dialog.scene.0);
    packer.pack_len(dialog.characters.len());
    for character in &dialog.characters {
        packer.pack_i32(character.0);
    }
    packer.pack_i32(dialog.speaker.0);
    packer.pack_str(&dialog.text);
    pack_node_id(packer, dialog.next);
}

fn unpack_dialog(unpacker: &mut BinaryUnpacker<'_>) -> Result<DialogNode, PackError> {
    let scene = SceneId(unpacker.unpack_i32()?);
    let count = unpacker.unpack_len()?;
    let mut characters = Vec::with_capacity(count.min(unpacker.remaining()));
    for _ in 0..count {
        characters.push(CharacterId(unpacker.unpack_i32()?));
    }
    Ok(DialogNode {
        scene,
        speaker: CharacterId(unpacker.unpack_i32()?),
        characters,
        text: unpacker.unpack_string()?,
        next: unpack_node_id(unpacker)?,
    })
}

impl Packable for TimelineNode {
    fn pack(&self, packer: &mut BinaryPacker) {
        packer.pack_u8(self.node_type() as u8);
        packer.pack_i32(self.id.0);
        packer.pack_len(self.previous.len());
        for parent in &self.previous {
            packer.pack_i32(parent.0);
        }

        match &self.kind {
            NodeKind::Dialog(dialog) => pack_dialog(packer, dialog),
            NodeKind::Branch(branch) => {
                pack_node_id(packer, branch.default_next);
                packer.pack_all(branch.arms.iter());
            }
            NodeKind::Decision(decision) => packer.pack_all(decision.decisions.iter()),
            NodeKind::Consequence(consequence) => {
                pack_node_id(packer, consequence.next);
                packer.pack_all(consequence.operations.iter());
            }
        }
    }

    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError> {
        let tag = unpacker.unpack_u8()?;
        let node_type = NodeType::from_tag(tag).ok_or(PackError::UnknownNodeType(tag))?;
        let id = NodeId(unpacker.unpack_i32()?);

        let count = unpacker.unpack_len()?;
        let mut previous = Vec::with_capacity(count.min(unpacker.remaining()));
        for _ in 0..count {
            previous.push(NodeId(unpacker.unpack_i32()?));
        }

        let kind = match node_type {
            NodeType::Dialog => NodeKind::Dialog(unpack_dialog(unpacker)?),
            NodeType::Branch => {
                let default_next = unpack_node_id(unpacker)?;
                NodeKind::Branch(BranchNode {
                    arms: unpacker.unpack_all()?,
                    default_next,
                })
            }
            NodeType::Decision => NodeKind::Decision(DecisionNode {
                decisions: unpacker.unpack_all()?,
            }),
            NodeType::Consequence => {
                let next = unpack_node_id(unpacker)?;
                NodeKind::Consequence(ConsequenceNode {
                    operations: unpacker.unpack_all()?,
                    next,
                })
            }
        };

        Ok(Self { id, previous, kind })
    }
}
