use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cast::{Character, Scene};
use super::node::Decision;

/// What the presentation layer needs to render one offered choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPreview {
    pub text: String,
    pub is_quoted_dialog: bool,
}

impl From<&Decision> for DecisionPreview {
    fn from(decision: &Decision) -> Self {
        Self {
            text: decision.text.clone(),
            is_quoted_dialog: decision.is_quoted_dialog,
        }
    }
}

/// A presentation event produced while a timeline is played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEvent {
    SceneChanges { scene: Scene },
    CharacterEnters { character: Character },
    CharacterLeaves { character: Character },
    Dialog { speaker: Character, text: String },
    /// Offered choices keyed by their index in the decision node. Choices
    /// whose gating predicates fail are absent.
    Choice { choices: BTreeMap<usize, DecisionPreview> },
    TimelineEnds,
}

impl TimelineEvent {
    /// Short name of the variant, for logs and tooling.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SceneChanges { .. } => "scene_changes",
            Self::CharacterEnters { .. } => "character_enters",
            Self::CharacterLeaves { .. } => "character_leaves",
            Self::Dialog { .. } => "dialog",
            Self::Choice { .. } => "choice",
            Self::TimelineEnds => "timeline_ends",
        }
    }
}

/// Receives events synchronously while a timeline instance advances.
pub trait TimelineListener {
    fn on_event(&mut self, event: &TimelineEvent);
}

impl<F> TimelineListener for F
where
    F: FnMut(&TimelineEvent),
{
    fn on_event(&mut self, event: &TimelineEvent) {
        (*self)(event)
    }
}

/// Collects every event, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    pub events: Vec<TimelineEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the collected events.
    pub fn take(&mut self) -> Vec<TimelineEvent> {
        std::mem::take(&mut self.events)
    }
}

impl TimelineListener for EventLog {
    fn on_event(&mut self, event: &TimelineEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids::CharacterId;

    #[test]
    fn closures_and_logs_listen() {
        let event = TimelineEvent::Dialog {
            speaker: Character {
                id: CharacterId(0),
                name: "Narrator".to_string(),
            },
            text: "Hello".to_string(),
        };

        let mut log = EventLog::new();
        let mut names = Vec::new();
        {
            let mut closure = |e: &TimelineEvent| names.push(e.name());
            closure.on_event(&event);
        }
        log.on_event(&event);

        assert_eq!(names, vec!["dialog"]);
        assert_eq!(log.take(), vec![event]);
        assert!(log.events.is_empty());
    }
}
