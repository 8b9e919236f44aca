//! Structural consistency checks over a timeline's node graph.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use crate::schema::ids::NodeId;
use crate::schema::node::{NodeKind, TimelineNode};

/// One structural defect found in a node graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum Violation {
    #[error("{0} lists itself as a parent")]
    SelfParent(NodeId),
    #[error("{0} lists itself as a child")]
    SelfChild(NodeId),
    #[error("{node} lists {parent} as a parent more than once")]
    DuplicateParent { node: NodeId, parent: NodeId },
    #[error("{node} lists missing {parent} as a parent")]
    MissingParent { node: NodeId, parent: NodeId },
    #[error("{node} has an edge to missing {child}")]
    MissingChild { node: NodeId, child: NodeId },
    #[error("{node} lists {parent} as a parent, but {parent} has no edge to it")]
    ParentWithoutEdge { node: NodeId, parent: NodeId },
    #[error("{parent} has an edge to {child}, which does not list it as a parent")]
    EdgeWithoutParent { parent: NodeId, child: NodeId },
    #[error("origin {0:?} does not exist")]
    MissingOrigin(Option<NodeId>),
    #[error("{0} is unreachable from the origin")]
    Island(NodeId),
    /// Branch and consequence nodes forming a loop with no content node,
    /// which playback could never leave.
    #[error("control-flow cycle through {0:?}")]
    ControlCycle(Vec<NodeId>),
}

/// Every violation found by one check, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations present here but absent from `before`.
    pub fn introduced_since(&self, before: &IntegrityReport) -> IntegrityReport {
        let known: FxHashSet<&Violation> = before.violations.iter().collect();
        IntegrityReport {
            violations: self
                .violations
                .iter()
                .filter(|v| !known.contains(v))
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.violations.as_slice() {
            [] => write!(f, "no violations"),
            [only] => write!(f, "{only}"),
            many => {
                write!(f, "{} violations", many.len())?;
                for violation in many {
                    write!(f, "; {violation}")?;
                }
                Ok(())
            }
        }
    }
}

/// Check parent/child bookkeeping, reachability from `origin`, and loops
/// made only of pass-through nodes.
pub fn check_integrity(
    nodes: &FxHashMap<NodeId, TimelineNode>,
    origin: Option<NodeId>,
) -> IntegrityReport {
    let mut violations = Vec::new();
    let mut ids: Vec<NodeId> = nodes.keys().copied().collect();
    ids.sort();

    for id in &ids {
        let node = &nodes[id];
        check_parents(nodes, node, &mut violations);
        check_children(nodes, node, &mut violations);
    }

    match origin.filter(|o| nodes.contains_key(o)) {
        Some(origin) => {
            let reached = reachable_from(nodes, origin);
            violations.extend(
                ids.iter()
                    .filter(|id| !reached.contains(id))
                    .map(|id| Violation::Island(*id)),
            );
        }
        None if origin.is_some() || !nodes.is_empty() => {
            violations.push(Violation::MissingOrigin(origin));
        }
        None => {}
    }

    violations.extend(control_cycles(nodes, &ids).into_iter().map(Violation::ControlCycle));
    IntegrityReport { violations }
}

fn check_parents(
    nodes: &FxHashMap<NodeId, TimelineNode>,
    node: &TimelineNode,
    violations: &mut Vec<Violation>,
) {
    let mut seen = FxHashSet::default();
    for parent in &node.previous {
        if *parent == node.id {
            violations.push(Violation::SelfParent(node.id));
            continue;
        }
        if !seen.insert(*parent) {
            violations.push(Violation::DuplicateParent {
                node: node.id,
                parent: *parent,
            });
            continue;
        }
        match nodes.get(parent) {
            None => violations.push(Violation::MissingParent {
                node: node.id,
                parent: *parent,
            }),
            Some(p) if p.slot_of(node.id).is_none() => {
                violations.push(Violation::ParentWithoutEdge {
                    node: node.id,
                    parent: *parent,
                })
            }
            Some(_) => {}
        }
    }
}

fn check_children(
    nodes: &FxHashMap<NodeId, TimelineNode>,
    node: &TimelineNode,
    violations: &mut Vec<Violation>,
) {
    for child in node.children() {
        if child == node.id {
            violations.push(Violation::SelfChild(node.id));
            continue;
        }
        match nodes.get(&child) {
            None => violations.push(Violation::MissingChild {
                node: node.id,
                child,
            }),
            Some(c) if !c.previous.contains(&node.id) => {
                violations.push(Violation::EdgeWithoutParent {
                    parent: node.id,
                    child,
                })
            }
            Some(_) => {}
        }
    }
}

/// Ids reachable from `origin` over forward edges.
pub fn reachable_from(
    nodes: &FxHashMap<NodeId, TimelineNode>,
    origin: NodeId,
) -> FxHashSet<NodeId> {
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([origin]);
    while let Some(id) = queue.pop_front() {
        let Some(node) = nodes.get(&id) else {
            continue;
        };
        if !visited.insert(id) {
            continue;
        }
        queue.extend(node.children());
    }
    visited
}

fn is_pass_through(node: &TimelineNode) -> bool {
    matches!(node.kind, NodeKind::Branch(_) | NodeKind::Consequence(_))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Cycles in the subgraph of branch and consequence nodes. Each cycle is
/// rotated to start at its smallest id.
fn control_cycles(nodes: &FxHashMap<NodeId, TimelineNode>, ids: &[NodeId]) -> Vec<Vec<NodeId>> {
    let mut marks: FxHashMap<NodeId, Mark> = ids
        .iter()
        .filter(|id| is_pass_through(&nodes[*id]))
        .map(|id| (*id, Mark::Unvisited))
        .collect();
    let mut cycles = Vec::new();

    for start in ids {
        if marks.get(start) != Some(&Mark::Unvisited) {
            continue;
        }
        // Explicit DFS: (node, its pass-through children, next child index).
        let mut path: Vec<NodeId> = Vec::new();
        let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> = Vec::new();
        marks.insert(*start, Mark::OnPath);
        path.push(*start);
        stack.push((*start, pass_through_children(nodes, *start, &marks), 0));

        while let Some((id, children, next)) = stack.last_mut() {
            let Some(child) = children.get(*next).copied() else {
                marks.insert(*id, Mark::Done);
                path.pop();
                stack.pop();
                continue;
            };
            *next += 1;
            match marks.get(&child).copied() {
                Some(Mark::Unvisited) => {
                    marks.insert(child, Mark::OnPath);
                    path.push(child);
                    let grandchildren = pass_through_children(nodes, child, &marks);
                    stack.push((child, grandchildren, 0));
                }
                Some(Mark::OnPath) => {
                    if let Some(pos) = path.iter().position(|p| *p == child) {
                        let mut cycle = path[pos..].to_vec();
                        if let Some(min) = cycle.iter().enumerate().min_by_key(|(_, id)| **id) {
                            let offset = min.0;
                            cycle.rotate_left(offset);
                        }
                        cycles.push(cycle);
                    }
                }
                _ => {}
            }
        }
    }
    cycles
}

fn pass_through_children(
    nodes: &FxHashMap<NodeId, TimelineNode>,
    id: NodeId,
    marks: &FxHashMap<NodeId, Mark>,
) -> Vec<NodeId> {
    nodes
        .get(&id)
        .map(|node| {
            node.children()
                .into_iter()
                .filter(|child| marks.contains_key(child))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids::{CharacterId, SceneId};
    use crate::schema::node::{BranchNode, ConsequenceNode, DialogNode};

    fn dialog(id: i32, next: Option<i32>) -> TimelineNode {
        TimelineNode::new(
            NodeId(id),
            NodeKind::Dialog(DialogNode {
                scene: SceneId(0),
                speaker: CharacterId(0),
                characters: Vec::new(),
                text: format!("line {id}"),
                next: next.map(NodeId),
            }),
        )
    }

    fn consequence(id: i32, next: Option<i32>) -> TimelineNode {
        TimelineNode::new(
            NodeId(id),
            NodeKind::Consequence(ConsequenceNode {
                operations: Vec::new(),
                next: next.map(NodeId),
            }),
        )
    }

    fn graph(nodes: Vec<TimelineNode>) -> FxHashMap<NodeId, TimelineNode> {
        let mut map: FxHashMap<NodeId, TimelineNode> =
            nodes.into_iter().map(|n| (n.id, n)).collect();
        let edges: Vec<(NodeId, NodeId)> = map
            .values()
            .flat_map(|n| n.children().into_iter().map(move |c| (n.id, c)))
            .collect();
        for (parent, child) in edges {
            if let Some(c) = map.get_mut(&child) {
                c.add_parent(parent);
            }
        }
        map
    }

    #[test]
    fn linked_chain_is_clean() {
        let nodes = graph(vec![dialog(0, Some(1)), dialog(1, Some(2)), dialog(2, None)]);
        assert!(check_integrity(&nodes, Some(NodeId(0))).is_clean());
    }

    #[test]
    fn islands_and_missing_origin() {
        let nodes = graph(vec![dialog(0, None), dialog(1, None)]);
        let report = check_integrity(&nodes, Some(NodeId(0)));
        assert_eq!(report.violations, vec![Violation::Island(NodeId(1))]);

        let report = check_integrity(&nodes, Some(NodeId(9)));
        assert_eq!(report.violations, vec![Violation::MissingOrigin(Some(NodeId(9)))]);
        assert!(check_integrity(&FxHashMap::default(), None).is_clean());
    }

    #[test]
    fn bookkeeping_mismatches() {
        let mut nodes = graph(vec![dialog(0, Some(1)), dialog(1, None)]);
        nodes.get_mut(&NodeId(1)).unwrap().previous = vec![NodeId(1), NodeId(7)];
        let report = check_integrity(&nodes, Some(NodeId(0)));
        assert!(report.violations.contains(&Violation::SelfParent(NodeId(1))));
        assert!(report.violations.contains(&Violation::MissingParent {
            node: NodeId(1),
            parent: NodeId(7)
        }));
        assert!(report.violations.contains(&Violation::EdgeWithoutParent {
            parent: NodeId(0),
            child: NodeId(1)
        }));
    }

    #[test]
    fn duplicate_parent_is_reported_once() {
        let mut nodes = graph(vec![dialog(0, Some(1)), dialog(1, None)]);
        nodes.get_mut(&NodeId(1)).unwrap().previous = vec![NodeId(0), NodeId(0)];
        let report = check_integrity(&nodes, Some(NodeId(0)));
        assert_eq!(
            report.violations,
            vec![Violation::DuplicateParent {
                node: NodeId(1),
                parent: NodeId(0)
            }]
        );
    }

    #[test]
    fn pass_through_loops_are_cycles_but_dialog_loops_are_not() {
        let mut branch = BranchNode::default();
        branch.default_next = Some(NodeId(2));
        let nodes = graph(vec![
            dialog(0, Some(1)),
            TimelineNode::new(NodeId(1), NodeKind::Branch(branch)),
            consequence(2, Some(1)),
        ]);
        let report = check_integrity(&nodes, Some(NodeId(0)));
        assert_eq!(
            report.violations,
            vec![Violation::ControlCycle(vec![NodeId(1), NodeId(2)])]
        );

        let looping_dialog = graph(vec![dialog(0, Some(1)), consequence(1, Some(0))]);
        assert!(check_integrity(&looping_dialog, Some(NodeId(0))).is_clean());
    }

    #[test]
    fn introduced_violations_ignore_existing_ones() {
        let before = IntegrityReport {
            violations: vec![Violation::Island(NodeId(3))],
        };
        let after = IntegrityReport {
            violations: vec![Violation::Island(NodeId(3)), Violation::Island(NodeId(4))],
        };
        assert_eq!(
            after.introduced_since(&before).violations,
            vec![Violation::Island(NodeId(4))]
        );
        assert_eq!(
            after.to_string(),
            "2 violations; node 3 is unreachable from the origin; \
             node 4 is unreachable from the origin"
        );
    }
}
