use serde::{Deserialize, Serialize};

use super::ids::{CharacterId, SceneId, VariableId};
use super::value::{VariableType, VariableValue};

/// A backdrop that dialog takes place in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
}

/// A speaking or present character. The narrator is an ordinary character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
}

/// A declared variable. Its value is the default copied into every
/// playthrough when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineVariable {
    pub id: VariableId,
    pub name: String,
    pub value: VariableValue,
}

impl TimelineVariable {
    pub fn variable_type(&self) -> VariableType {
        self.value.variable_type()
    }
}
