//! Variable values: typed payloads, comparisons and operators.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::VariableId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: VariableType,
        found: VariableType,
    },
    #[error("comparison {comparison:?} is not supported for {ty} values")]
    UnsupportedComparison {
        comparison: Comparison,
        ty: VariableType,
    },
    #[error("operator {operator:?} is not supported for {ty} values")]
    UnsupportedOperation { operator: Operator, ty: VariableType },
    #[error("integer overflow applying {operand} to {value}")]
    Overflow { value: i32, operand: i32 },
}

/// The declared type of a variable. The discriminant is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Boolean = 0,
    Integer = 1,
}

impl VariableType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Boolean),
            1 => Some(Self::Integer),
            _ => None,
        }
    }

    /// The zero value of this type.
    pub fn default_value(self) -> VariableValue {
        match self {
            Self::Boolean => VariableValue::Boolean(false),
            Self::Integer => VariableValue::Integer(0),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
        }
    }
}

/// Comparators usable in predicates. The discriminant is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Equal = 0,
    NotEqual = 1,
    LessThan = 2,
    GreaterThan = 3,
    LessThanEqual = 4,
    GreaterThanEqual = 5,
}

impl Comparison {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Equal),
            1 => Some(Self::NotEqual),
            2 => Some(Self::LessThan),
            3 => Some(Self::GreaterThan),
            4 => Some(Self::LessThanEqual),
            5 => Some(Self::GreaterThanEqual),
            _ => None,
        }
    }

    /// Short operator symbol for labels: `==`, `<=`, ...
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanEqual => "<=",
            Self::GreaterThanEqual => ">=",
        }
    }
}

/// Operators usable in consequence operations. The discriminant is the wire tag.
///
/// `Modify` adds the operand to an integer, and toggles a boolean when the
/// operand is `true` (exclusive or).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Set = 0,
    Modify = 1,
}

impl Operator {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Set),
            1 => Some(Self::Modify),
            _ => None,
        }
    }
}

/// A boolean or integer payload. The variant is the value's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableValue {
    Boolean(bool),
    Integer(i32),
}

/// Rust types that can be read from or written into a [`VariableValue`].
pub trait ValueKind: Sized {
    const TYPE: VariableType;

    fn extract(value: &VariableValue) -> Option<Self>;
    fn wrap(self) -> VariableValue;
}

impl ValueKind for bool {
    const TYPE: VariableType = VariableType::Boolean;

    fn extract(value: &VariableValue) -> Option<Self> {
        match value {
            VariableValue::Boolean(b) => Some(*b),
            VariableValue::Integer(_) => None,
        }
    }

    fn wrap(self) -> VariableValue {
        VariableValue::Boolean(self)
    }
}

impl ValueKind for i32 {
    const TYPE: VariableType = VariableType::Integer;

    fn extract(value: &VariableValue) -> Option<Self> {
        match value {
            VariableValue::Integer(i) => Some(*i),
            VariableValue::Boolean(_) => None,
        }
    }

    fn wrap(self) -> VariableValue {
        VariableValue::Integer(self)
    }
}

impl VariableValue {
    pub fn variable_type(&self) -> VariableType {
        match self {
            Self::Boolean(_) => VariableType::Boolean,
            Self::Integer(_) => VariableType::Integer,
        }
    }

    /// Read the payload as `T`, failing if `T` is not the declared type.
    pub fn get<T: ValueKind>(&self) -> Result<T, ValueError> {
        T::extract(self).ok_or(ValueError::TypeMismatch {
            expected: T::TYPE,
            found: self.variable_type(),
        })
    }

    /// Overwrite the payload. The type of a value never changes.
    pub fn set<T: ValueKind>(&mut self, value: T) -> Result<(), ValueError> {
        self.ensure_type(T::TYPE)?;
        *self = value.wrap();
        Ok(())
    }

    fn ensure_type(&self, expected: VariableType) -> Result<(), ValueError> {
        let found = self.variable_type();
        if found == expected {
            Ok(())
        } else {
            Err(ValueError::TypeMismatch { expected, found })
        }
    }

    /// Evaluate `self <comparison> other`.
    pub fn compare(
        &self,
        comparison: Comparison,
        other: &VariableValue,
    ) -> Result<bool, ValueError> {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => match comparison {
                Comparison::Equal => Ok(a == b),
                Comparison::NotEqual => Ok(a != b),
                _ => Err(ValueError::UnsupportedComparison {
                    comparison,
                    ty: VariableType::Boolean,
                }),
            },
            (Self::Integer(a), Self::Integer(b)) => Ok(match comparison {
                Comparison::Equal => a == b,
                Comparison::NotEqual => a != b,
                Comparison::LessThan => a < b,
                Comparison::GreaterThan => a > b,
                Comparison::LessThanEqual => a <= b,
                Comparison::GreaterThanEqual => a >= b,
            }),
            _ => Err(ValueError::TypeMismatch {
                expected: self.variable_type(),
                found: other.variable_type(),
            }),
        }
    }

    /// Apply `operator` with `operand` to this value in place.
    ///
    /// On error the value is left untouched.
    pub fn apply(&mut self, operator: Operator, operand: &VariableValue) -> Result<(), ValueError> {
        self.ensure_type(operand.variable_type())?;
        let next = match (operator, *self, *operand) {
            (Operator::Set, _, operand) => operand,
            (Operator::Modify, Self::Integer(value), Self::Integer(delta)) => Self::Integer(
                value
                    .checked_add(delta)
                    .ok_or(ValueError::Overflow { value, operand: delta })?,
            ),
            (Operator::Modify, Self::Boolean(value), Self::Boolean(toggle)) => {
                Self::Boolean(value ^ toggle)
            }
            (operator, value, _) => {
                return Err(ValueError::UnsupportedOperation {
                    operator,
                    ty: value.variable_type(),
                })
            }
        };
        *self = next;
        Ok(())
    }

    /// Human-readable payload, e.g. `true` or `42`.
    pub fn label(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Per-playthrough variable values, keyed by declaration id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableState {
    values: FxHashMap<VariableId, VariableValue>,
}

impl VariableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: VariableId) -> Option<&VariableValue> {
        self.values.get(&id)
    }

    pub fn get_mut(&mut self, id: VariableId) -> Option<&mut VariableValue> {
        self.values.get_mut(&id)
    }

    pub fn insert(&mut self, id: VariableId, value: VariableValue) {
        self.values.insert(id, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in ascending id order.
    pub fn sorted(&self) -> Vec<(VariableId, VariableValue)> {
        let mut entries: Vec<_> = self.values.iter().map(|(id, v)| (*id, *v)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}
