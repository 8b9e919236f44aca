use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire sentinel for "no id". Never allocated by a timeline.
pub const INVALID_ID: i32 = -1;

macro_rules! timeline_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl $name {
            /// Decode a wire id, mapping the invalid sentinel to `None`.
            pub fn from_raw(raw: i32) -> Option<Self> {
                (raw != INVALID_ID).then_some(Self(raw))
            }

            /// Encode an optional id for the wire.
            pub fn to_raw(id: Option<Self>) -> i32 {
                id.map_or(INVALID_ID, |id| id.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " {}"), self.0)
            }
        }
    };
}

timeline_id!(
    /// Id of a node in the timeline graph.
    NodeId,
    "node"
);
timeline_id!(
    /// Id of a scene (backdrop).
    SceneId,
    "scene"
);
timeline_id!(
    /// Id of a character, including the narrator.
    CharacterId,
    "character"
);
timeline_id!(
    /// Id of a declared timeline variable.
    VariableId,
    "variable"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel_maps_to_none() {
        assert_eq!(NodeId::from_raw(INVALID_ID), None);
        assert_eq!(NodeId::from_raw(7), Some(NodeId(7)));
        assert_eq!(NodeId::to_raw(None), -1);
        assert_eq!(SceneId::to_raw(Some(SceneId(3))), 3);
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(NodeId(4).to_string(), "node 4");
        assert_eq!(VariableId(2).to_string(), "variable 2");
    }
}
