//! Tree layout of a timeline graph for editors.
//!
//! The graph is flattened to a tree by breadth-first search from the
//! origin: each node hangs under the first node that discovers it. Leaves
//! are one unit wide, a parent is as wide as its children together, and
//! children are laid out left to right under their parent's span.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::core::timeline::Timeline;
use crate::schema::ids::NodeId;

/// Position of one node: `offset` is horizontal, in leaf widths, centred on
/// the origin; `depth` is the row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub offset: f32,
    pub depth: u32,
}

#[derive(Debug)]
struct Slot {
    id: NodeId,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: u32,
    width: u32,
    offset: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct NodePlacer {
    attempt_reparenting: bool,
}

impl Default for NodePlacer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NodePlacer {
    /// With `attempt_reparenting`, a node reached again along a longer path
    /// is pushed down to sit below the deepest parent found so far.
    pub fn new(attempt_reparenting: bool) -> Self {
        Self { attempt_reparenting }
    }

    /// Place every node reachable from the origin. Unreachable nodes are
    /// absent from the result.
    pub fn place(&self, timeline: &Timeline) -> FxHashMap<NodeId, Placement> {
        let mut places = FxHashMap::default();
        let Some(origin) = timeline.origin().filter(|id| timeline.node(*id).is_some()) else {
            return places;
        };

        let mut slots = vec![Slot {
            id: origin,
            parent: None,
            children: Vec::new(),
            depth: 0,
            width: 0,
            offset: 0.0,
        }];
        let mut index: FxHashMap<NodeId, usize> = FxHashMap::default();
        index.insert(origin, 0);

        let mut queue = VecDeque::from([0usize]);
        let mut order = Vec::new();
        while let Some(current) = queue.pop_front() {
            order.push(current);
            let children = timeline
                .node(slots[current].id)
                .map(|node| node.children())
                .unwrap_or_default();

            let mut discovered = false;
            for child in children {
                if timeline.node(child).is_none() {
                    continue;
                }
                match index.get(&child).copied() {
                    None => {
                        let slot = slots.len();
                        slots.push(Slot {
                            id: child,
                            parent: Some(current),
                            children: Vec::new(),
                            depth: slots[current].depth + 1,
                            width: 0,
                            offset: 0.0,
                        });
                        slots[current].children.push(slot);
                        index.insert(child, slot);
                        queue.push_back(slot);
                        discovered = true;
                    }
                    Some(existing) if self.attempt_reparenting => {
                        reparent(&mut slots, existing, current);
                    }
                    Some(_) => {}
                }
            }
            if !discovered {
                slots[current].width = 1;
            }
        }

        for &current in order.iter().rev() {
            if let Some(parent) = slots[current].parent {
                slots[parent].width += slots[current].width;
            }
        }

        let mut queue = VecDeque::from([0usize]);
        while let Some(current) = queue.pop_front() {
            let left = slots[current].offset - slots[current].width as f32 / 2.0;
            let mut cumulative = 0.0;
            for child in slots[current].children.clone() {
                let width = slots[child].width as f32;
                slots[child].offset = width / 2.0 + cumulative + left;
                cumulative += width;
                queue.push_back(child);
            }
            places.insert(
                slots[current].id,
                Placement {
                    offset: slots[current].offset,
                    depth: slots[current].depth,
                },
            );
        }
        places
    }
}

fn is_ancestor(slots: &[Slot], ancestor: usize, mut of: usize) -> bool {
    loop {
        if of == ancestor {
            return true;
        }
        match slots[of].parent {
            Some(parent) => of = parent,
            None => return false,
        }
    }
}

/// Sink `slot` below `parent` if that is deeper, then refresh its subtree.
/// Back edges to an ancestor are ignored.
fn reparent(slots: &mut [Slot], slot: usize, parent: usize) {
    if is_ancestor(slots, slot, parent) {
        return;
    }
    let depth = slots[parent].depth + 1;
    if slots[slot].depth >= depth {
        return;
    }
    slots[slot].depth = depth;

    let mut queue: VecDeque<usize> = slots[slot].children.iter().copied().collect();
    while let Some(current) = queue.pop_front() {
        if let Some(p) = slots[current].parent {
            slots[current].depth = slots[p].depth + 1;
        }
        queue.extend(slots[current].children.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::Decision;

    fn line(timeline: &mut Timeline, text: &str) -> NodeId {
        let scene = timeline.default_scene().unwrap();
        let narrator = timeline.narrator().unwrap();
        timeline.add_dialog_node(scene, narrator, text, Vec::new())
    }

    #[test]
    fn chain_is_a_centred_column() {
        let mut timeline = Timeline::with_defaults("Chain");
        let origin = timeline.origin().unwrap();
        let next = line(&mut timeline, "next");
        timeline.link_nodes(origin, next, 0).unwrap();

        let places = NodePlacer::default().place(&timeline);
        assert_eq!(places[&origin], Placement { offset: 0.0, depth: 0 });
        assert_eq!(places[&next], Placement { offset: 0.0, depth: 1 });
    }

    #[test]
    fn fork_spreads_children_under_parent() {
        let mut timeline = Timeline::with_defaults("Fork");
        let origin = timeline.origin().unwrap();
        let fork = timeline.add_decision_node();
        let left = line(&mut timeline, "left");
        let right = line(&mut timeline, "right");
        timeline.add_decision(fork, Decision::new("l", false)).unwrap();
        timeline.add_decision(fork, Decision::new("r", false)).unwrap();
        timeline.link_nodes(origin, fork, 0).unwrap();
        timeline.link_nodes(fork, left, 0).unwrap();
        timeline.link_nodes(fork, right, 1).unwrap();

        let places = NodePlacer::default().place(&timeline);
        assert_eq!(places[&fork].offset, 0.0);
        assert_eq!(places[&left], Placement { offset: -0.5, depth: 2 });
        assert_eq!(places[&right], Placement { offset: 0.5, depth: 2 });
    }

    #[test]
    fn reparenting_pushes_rejoining_nodes_down() {
        let mut timeline = Timeline::with_defaults("Rejoin");
        let origin = timeline.origin().unwrap();
        let fork = timeline.add_decision_node();
        let detour = line(&mut timeline, "detour");
        let join = line(&mut timeline, "join");
        let tail = line(&mut timeline, "tail");
        timeline.link_nodes(origin, fork, 0).unwrap();
        timeline.link_nodes(fork, detour, 0).unwrap();
        timeline.link_nodes(fork, join, 1).unwrap();
        timeline.link_nodes(detour, join, 0).unwrap();
        timeline.link_nodes(join, tail, 0).unwrap();

        let flat = NodePlacer::new(false).place(&timeline);
        assert_eq!(flat[&join].depth, 2);
        assert_eq!(flat[&tail].depth, 3);

        let sunk = NodePlacer::new(true).place(&timeline);
        assert_eq!(sunk[&join].depth, 3);
        assert_eq!(sunk[&tail].depth, 4);
    }

    #[test]
    fn loops_back_to_ancestors_keep_depths() {
        let mut timeline = Timeline::with_defaults("Loop");
        let origin = timeline.origin().unwrap();
        let again = line(&mut timeline, "again");
        timeline.link_nodes(origin, again, 0).unwrap();
        let fork = timeline.add_decision_node();
        timeline.link_nodes(again, fork, 0).unwrap();
        timeline.link_nodes(fork, origin, 0).unwrap();

        let places = NodePlacer::default().place(&timeline);
        assert_eq!(places[&origin].depth, 0);
        assert_eq!(places[&fork].depth, 2);
    }

    #[test]
    fn unreachable_nodes_are_not_placed() {
        let mut timeline = Timeline::with_defaults("Island");
        let island = line(&mut timeline, "island");
        let places = NodePlacer::default().place(&timeline);
        assert_eq!(places.len(), 1);
        assert!(!places.contains_key(&island));
    }
}
