//! Path regeneration over a project's flat node set.
//!
//! The [`Forest`] is an arena: nodes live in a flat `Vec` and every
//! parent/child relation is an index resolved through an id map. Nothing here
//! touches the store.

use std::{
    collections::{HashMap, HashSet},
    num::NonZeroUsize,
};

use tracing::warn;

use crate::domain::{HierarchicalPath, Requirement, RequirementId, SectionPrefix};

/// Arena view over one project's nodes.
struct Forest<'a> {
    nodes: &'a [Requirement],
    index: HashMap<&'a RequirementId, usize>,
}

impl<'a> Forest<'a> {
    fn new(nodes: &'a [Requirement]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(&node.id, i).is_some() {
                warn!(id = %node.id, "duplicate requirement id, later copy shadows earlier");
            }
        }
        Self { nodes, index }
    }

    fn parent_of(&self, i: usize) -> Option<usize> {
        self.nodes[i]
            .parent_id
            .as_ref()
            .and_then(|parent| self.index.get(parent).copied())
    }

    /// Root and child adjacency, each list stably sorted by stored `order`.
    fn adjacency(&self) -> (Vec<usize>, Vec<Vec<usize>>) {
        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate() {
            match (&node.parent_id, self.parent_of(i)) {
                (None, _) => roots.push(i),
                (Some(_), Some(parent)) => children[parent].push(i),
                (Some(parent), None) => {
                    warn!(
                        id = %node.id,
                        parent = %parent,
                        "parent does not exist, placing requirement at the root"
                    );
                    roots.push(i);
                }
            }
        }

        let by_order = |&i: &usize| self.nodes[i].order;
        roots.sort_by_key(by_order);
        for siblings in &mut children {
            siblings.sort_by_key(by_order);
        }

        (roots, children)
    }
}

/// Recomputes `order`, `level` and `hierarchical_path` for every node of one
/// project.
///
/// Sibling groups are sorted stably by their stored `order` (so `0`, meaning
/// "not yet positioned", sorts first) and renumbered from 1. Roots take their
/// own `section_prefix` if they have one, otherwise `default_prefix`;
/// descendants inherit the prefix of their root.
///
/// The function is total. A node whose parent is missing is placed at the
/// root. Nodes that cannot be reached from any root, because their parent
/// chain loops, are promoted to roots after the genuine roots, in input
/// order. Both anomalies are logged as warnings.
///
/// The output contains the same nodes in the same order as the input; only
/// the derived fields differ. Running it again on its own output yields the
/// same output.
#[must_use]
pub fn generate_paths(mut nodes: Vec<Requirement>, default_prefix: &SectionPrefix) -> Vec<Requirement> {
    let assignments = {
        let forest = Forest::new(&nodes);
        let (roots, children) = forest.adjacency();
        let mut visited = vec![false; nodes.len()];
        let mut assignments: Vec<Option<HierarchicalPath>> = vec![None; nodes.len()];

        let mut assign_tree = |root: usize, position: NonZeroUsize, visited: &mut Vec<bool>| {
            let prefix = nodes[root]
                .section_prefix
                .clone()
                .unwrap_or_else(|| default_prefix.clone());
            let mut stack = vec![(root, HierarchicalPath::root(prefix, position))];
            visited[root] = true;

            while let Some((i, path)) = stack.pop() {
                let unvisited: Vec<usize> = children[i]
                    .iter()
                    .copied()
                    .filter(|&child| !visited[child])
                    .collect();
                for (k, &child) in unvisited.iter().enumerate() {
                    visited[child] = true;
                    stack.push((child, path.child(NonZeroUsize::MIN.saturating_add(k))));
                }
                assignments[i] = Some(path);
            }
        };

        for (k, &root) in roots.iter().enumerate() {
            assign_tree(root, NonZeroUsize::MIN.saturating_add(k), &mut visited);
        }

        let mut next_root = roots.len();
        for i in 0..nodes.len() {
            if visited[i] {
                continue;
            }
            warn!(
                id = %nodes[i].id,
                "requirement is part of a parent cycle, promoting it to a root"
            );
            assign_tree(i, NonZeroUsize::MIN.saturating_add(next_root), &mut visited);
            next_root += 1;
        }

        assignments
    };

    for (node, path) in nodes.iter_mut().zip(assignments) {
        if let Some(path) = path {
            node.order = to_u32(path.position().get());
            node.level = to_u32(path.depth());
            node.hierarchical_path = Some(path);
        }
    }

    nodes
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Places `id` at the 1-based `position` within its sibling group and
/// renumbers the group from 1.
///
/// The sibling group is every node sharing the mover's `project_id` and
/// `parent_id`. The other siblings keep their relative order and shift to
/// make room. A position past the end appends. Returns `false` if `id` is not
/// in `nodes`.
pub fn place(nodes: &mut [Requirement], id: &RequirementId, position: u32) -> bool {
    let Some(mover) = nodes.iter().position(|node| node.id == *id) else {
        return false;
    };
    let project = nodes[mover].project_id.clone();
    let parent = nodes[mover].parent_id.clone();

    let mut group: Vec<usize> = (0..nodes.len())
        .filter(|&i| i != mover)
        .filter(|&i| nodes[i].project_id == project && nodes[i].parent_id == parent)
        .collect();
    group.sort_by_key(|&i| nodes[i].order);

    let slot = usize::try_from(position.saturating_sub(1))
        .unwrap_or(usize::MAX)
        .min(group.len());
    group.insert(slot, mover);

    for (k, i) in group.into_iter().enumerate() {
        nodes[i].order = to_u32(k + 1);
    }
    true
}

/// A parent chain that loops or runs longer than the node set allows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parent chain of {0} is corrupted")]
pub struct CorruptAncestry(pub RequirementId);

/// Whether `target` is `source` or lies underneath it.
///
/// Walks `target`'s parent chain upwards. The walk ends at a root or at a
/// parent that is not in `nodes`. It is bounded by the number of nodes, and a
/// revisited node or an overlong chain is reported as [`CorruptAncestry`].
///
/// # Errors
///
/// Returns [`CorruptAncestry`] if the chain above `target` loops.
pub fn is_descendant(
    nodes: &[Requirement],
    source: &RequirementId,
    target: &RequirementId,
) -> Result<bool, CorruptAncestry> {
    let forest = Forest::new(nodes);
    let mut visited = HashSet::new();
    let mut current = target;

    for _ in 0..=nodes.len() {
        if current == source {
            return Ok(true);
        }
        if !visited.insert(current) {
            return Err(CorruptAncestry(target.clone()));
        }
        let Some(&i) = forest.index.get(current) else {
            return Ok(false);
        };
        match &forest.nodes[i].parent_id {
            Some(parent) => current = parent,
            None => return Ok(false),
        }
    }

    Err(CorruptAncestry(target.clone()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::DEFAULT_STATUS;

    fn node(id: &str, parent: Option<&str>, order: u32) -> Requirement {
        Requirement {
            id: id.into(),
            title: id.to_uppercase(),
            description: String::new(),
            project_id: "p1".into(),
            parent_id: parent.map(Into::into),
            level: 0,
            order,
            hierarchical_path: None,
            status: DEFAULT_STATUS.to_string(),
            tags: vec![],
            section_prefix: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: "alice".into(),
            change_log: vec![],
        }
    }

    fn paths(nodes: &[Requirement]) -> Vec<(String, String)> {
        nodes
            .iter()
            .map(|n| (n.id.to_string(), n.label()))
            .collect()
    }

    fn find<'a>(nodes: &'a [Requirement], id: &str) -> &'a Requirement {
        nodes.iter().find(|n| n.id.as_str() == id).unwrap()
    }

    fn sample() -> Vec<Requirement> {
        vec![
            node("c", Some("b"), 1),
            node("a", None, 2),
            node("b", None, 1),
            node("d", Some("b"), 1),
            node("e", Some("d"), 7),
        ]
    }

    #[test]
    fn assigns_paths_depth_first_from_sorted_roots() {
        let out = generate_paths(sample(), &SectionPrefix::default());

        assert_eq!(
            paths(&out),
            vec![
                ("c".into(), "REQ_1.1".into()),
                ("a".into(), "REQ_2".into()),
                ("b".into(), "REQ_1".into()),
                ("d".into(), "REQ_1.2".into()),
                ("e".into(), "REQ_1.2.1".into()),
            ]
        );
        assert_eq!(find(&out, "e").level, 2);
        assert_eq!(find(&out, "e").order, 1);
        assert_eq!(find(&out, "d").order, 2);
    }

    #[test]
    fn regeneration_is_idempotent() {
        let prefix = SectionPrefix::default();
        let once = generate_paths(sample(), &prefix);
        let twice = generate_paths(once.clone(), &prefix);
        assert_eq!(once, twice);
    }

    #[test]
    fn sibling_orders_are_contiguous() {
        let nodes = vec![
            node("a", None, 5),
            node("b", None, 5),
            node("c", None, 0),
            node("d", Some("a"), 9),
            node("e", Some("a"), 3),
        ];
        let out = generate_paths(nodes, &SectionPrefix::default());

        let mut roots: Vec<u32> = out.iter().filter(|n| n.is_root()).map(|n| n.order).collect();
        roots.sort_unstable();
        assert_eq!(roots, vec![1, 2, 3]);

        // unpositioned sorts first, ties keep input order
        assert_eq!(find(&out, "c").order, 1);
        assert_eq!(find(&out, "a").order, 2);
        assert_eq!(find(&out, "b").order, 3);
        assert_eq!(find(&out, "e").label(), "REQ_2.1");
        assert_eq!(find(&out, "d").label(), "REQ_2.2");
    }

    #[test]
    fn path_matches_ancestor_orders() {
        let out = generate_paths(sample(), &SectionPrefix::default());
        for n in &out {
            let mut orders = vec![n.order];
            let mut current = n;
            while let Some(parent) = &current.parent_id {
                current = find(&out, parent.as_str());
                orders.push(current.order);
            }
            orders.reverse();
            let dotted = orders
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            assert_eq!(n.label(), format!("REQ_{dotted}"));
            assert_eq!(n.level as usize, orders.len() - 1);
        }
    }

    #[test]
    fn root_prefix_override_is_inherited() {
        let mut nodes = vec![node("a", None, 1), node("b", None, 2), node("c", Some("b"), 1)];
        nodes[1].section_prefix = Some("SYS".parse().unwrap());

        let out = generate_paths(nodes, &"USR".parse().unwrap());

        assert_eq!(find(&out, "a").label(), "USR_1");
        assert_eq!(find(&out, "b").label(), "SYS_2");
        assert_eq!(find(&out, "c").label(), "SYS_2.1");
    }

    #[test]
    fn dangling_parent_becomes_root() {
        let nodes = vec![node("a", None, 1), node("orphan", Some("gone"), 2)];
        let out = generate_paths(nodes, &SectionPrefix::default());
        assert_eq!(find(&out, "orphan").label(), "REQ_2");
        assert_eq!(find(&out, "orphan").level, 0);
        assert_eq!(find(&out, "orphan").parent_id, Some("gone".into()));
    }

    #[test]
    fn parent_cycles_are_promoted_after_roots() {
        let nodes = vec![
            node("x", Some("y"), 1),
            node("a", None, 1),
            node("y", Some("x"), 1),
            node("self", Some("self"), 1),
        ];
        let prefix = SectionPrefix::default();
        let out = generate_paths(nodes, &prefix);

        assert_eq!(find(&out, "a").label(), "REQ_1");
        assert_eq!(find(&out, "x").label(), "REQ_2");
        assert_eq!(find(&out, "y").label(), "REQ_2.1");
        assert_eq!(find(&out, "self").label(), "REQ_3");
        assert_eq!(generate_paths(out.clone(), &prefix), out);
    }

    #[test]
    fn empty_input() {
        assert!(generate_paths(Vec::new(), &SectionPrefix::default()).is_empty());
    }

    #[test]
    fn place_claims_requested_position() {
        let mut nodes = vec![
            node("r1", None, 1),
            node("r2", None, 2),
            node("c1", None, 1),
        ];
        assert!(place(&mut nodes, &"c1".into(), 1));
        let out = generate_paths(nodes, &SectionPrefix::default());

        assert_eq!(find(&out, "c1").label(), "REQ_1");
        assert_eq!(find(&out, "r1").label(), "REQ_2");
        assert_eq!(find(&out, "r2").label(), "REQ_3");
    }

    #[test]
    fn place_past_end_appends() {
        let mut nodes = vec![node("a", None, 1), node("b", None, 2), node("c", None, 1)];
        assert!(place(&mut nodes, &"c".into(), 99));
        assert_eq!(
            nodes.iter().map(|n| n.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(!place(&mut nodes, &"missing".into(), 1));
    }

    #[test]
    fn descendant_walk() {
        let nodes = sample();
        assert_eq!(is_descendant(&nodes, &"b".into(), &"e".into()), Ok(true));
        assert_eq!(is_descendant(&nodes, &"b".into(), &"b".into()), Ok(true));
        assert_eq!(is_descendant(&nodes, &"a".into(), &"e".into()), Ok(false));
        assert_eq!(is_descendant(&nodes, &"e".into(), &"b".into()), Ok(false));
    }

    #[test]
    fn descendant_walk_terminates_on_cycles() {
        let nodes = vec![node("x", Some("y"), 1), node("y", Some("x"), 1)];
        assert_eq!(
            is_descendant(&nodes, &"a".into(), &"x".into()),
            Err(CorruptAncestry("x".into()))
        );
    }
}
