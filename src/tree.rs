//! Org tree building and filtering.
//!
//! The backend returns organizations as a flat list. Companies and divisions
//! nest via `parent_id`; groups are a display-only aggregation layer, so a
//! record parented to a group stays at the root of the forest and just gets
//! the group's name as an annotation.
//!
//! Both passes are pure: the forest is rebuilt wholesale on every fetch and
//! filtering returns new nodes. UI state like expand/collapse lives in the
//! view layer, keyed by record id, so it survives rebuilds.

use crate::api::models::OrgRecord;
use std::collections::HashMap;

/// One node of the rendered org forest.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgNode {
    pub record: OrgRecord,
    /// Name of the group this record is parented to, if any. Resolved at
    /// build time; display annotation only.
    pub group_name: Option<String>,
    pub children: Vec<OrgNode>,
}

impl OrgNode {
    fn leaf(record: OrgRecord, group_name: Option<String>) -> Self {
        Self {
            record,
            group_name,
            children: Vec::new(),
        }
    }
}

/// Build the org forest from a flat record list.
///
/// - Sibling order follows input order at every level.
/// - Group records are never emitted as nodes.
/// - A record whose parent is missing, a group, or null becomes a root.
/// - Cyclic parent chains terminate: the construction is a single pass over
///   lookup maps, so cycle members simply end up unreachable from any root
///   and are absent from the materialized forest.
pub fn build_forest(records: &[OrgRecord]) -> Vec<OrgNode> {
    // Partition: groups annotate, everything else nests.
    let mut group_names: HashMap<&str, &str> = HashMap::new();
    for rec in records {
        if rec.kind.is_aggregator() {
            group_names.insert(rec.id.as_str(), rec.name.as_str());
        }
    }

    let hierarchy: Vec<&OrgRecord> = records
        .iter()
        .filter(|r| !r.kind.is_aggregator())
        .collect();

    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (i, rec) in hierarchy.iter().enumerate() {
        index_of.insert(rec.id.as_str(), i);
    }

    // Single pass: decide for every record whether it nests or roots.
    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); hierarchy.len()];
    let mut annotation: Vec<Option<String>> = vec![None; hierarchy.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (i, rec) in hierarchy.iter().enumerate() {
        match rec.parent_id.as_deref() {
            Some(pid) => {
                if let Some(&parent_idx) = index_of.get(pid) {
                    children_of[parent_idx].push(i);
                } else {
                    // Group parent annotates; a dangling parent is treated
                    // as no parent at all.
                    if let Some(name) = group_names.get(pid) {
                        annotation[i] = Some((*name).to_string());
                    }
                    roots.push(i);
                }
            }
            None => roots.push(i),
        }
    }

    roots
        .into_iter()
        .map(|i| materialize(i, &hierarchy, &children_of, &annotation))
        .collect()
}

/// Clone a record and its attached subtree into owned nodes. Only called on
/// root-reachable indices, so cycles (whose members are never roots) are
/// never visited.
fn materialize(
    idx: usize,
    hierarchy: &[&OrgRecord],
    children_of: &[Vec<usize>],
    annotation: &[Option<String>],
) -> OrgNode {
    let mut node = OrgNode::leaf(hierarchy[idx].clone(), annotation[idx].clone());
    node.children = children_of[idx]
        .iter()
        .map(|&child| materialize(child, hierarchy, children_of, annotation))
        .collect();
    node
}

/// Prune the forest to subtrees containing a match for `term`.
///
/// A node survives if its name or short name contains the term
/// (case-insensitive) or any child survives; ancestors of matches are kept
/// so the path to a match stays visible. Empty term returns the forest
/// unchanged. Input is never mutated.
pub fn filter_forest(forest: &[OrgNode], term: &str) -> Vec<OrgNode> {
    if term.is_empty() {
        return forest.to_vec();
    }
    let needle = term.to_lowercase();
    forest
        .iter()
        .filter_map(|node| filter_node(node, &needle))
        .collect()
}

fn filter_node(node: &OrgNode, needle: &str) -> Option<OrgNode> {
    let children: Vec<OrgNode> = node
        .children
        .iter()
        .filter_map(|child| filter_node(child, needle))
        .collect();

    let self_matches = node
        .record
        .searchable_fields()
        .any(|f| f.to_lowercase().contains(needle));

    if self_matches || !children.is_empty() {
        Some(OrgNode {
            record: node.record.clone(),
            group_name: node.group_name.clone(),
            children,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::OrgKind;

    fn rec(id: &str, name: &str, kind: OrgKind, parent: Option<&str>) -> OrgRecord {
        OrgRecord {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            parent_id: parent.map(|p| p.to_string()),
            short_name: None,
            industry: None,
            city: None,
        }
    }

    fn names(forest: &[OrgNode]) -> Vec<&str> {
        forest.iter().map(|n| n.record.name.as_str()).collect()
    }

    #[test]
    fn test_build_nests_divisions_under_companies() {
        let records = vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Acme Sales", OrgKind::Division, Some("1")),
            rec("3", "Acme Support", OrgKind::Division, Some("1")),
        ];
        let forest = build_forest(&records);
        assert_eq!(names(&forest), vec!["Acme"]);
        assert_eq!(names(&forest[0].children), vec!["Acme Sales", "Acme Support"]);
    }

    #[test]
    fn test_sibling_order_follows_input_order() {
        let records = vec![
            rec("p", "Parent", OrgKind::Company, None),
            rec("c", "Charlie", OrgKind::Division, Some("p")),
            rec("a", "Alpha", OrgKind::Division, Some("p")),
            rec("b", "Bravo", OrgKind::Division, Some("p")),
            rec("z", "Zulu", OrgKind::Company, None),
        ];
        let forest = build_forest(&records);
        assert_eq!(names(&forest), vec!["Parent", "Zulu"]);
        assert_eq!(names(&forest[0].children), vec!["Charlie", "Alpha", "Bravo"]);
    }

    #[test]
    fn test_groups_annotate_but_never_appear() {
        let records = vec![
            rec("g1", "Northern Holdings", OrgKind::Group, None),
            rec("1", "Acme", OrgKind::Company, Some("g1")),
            rec("2", "Beta Corp", OrgKind::Company, None),
        ];
        let forest = build_forest(&records);
        // Both companies are roots; the group is not a node.
        assert_eq!(names(&forest), vec!["Acme", "Beta Corp"]);
        assert_eq!(forest[0].group_name.as_deref(), Some("Northern Holdings"));
        assert_eq!(forest[1].group_name, None);
        fn assert_no_groups(nodes: &[OrgNode]) {
            for n in nodes {
                assert_ne!(n.record.kind, OrgKind::Group);
                assert_no_groups(&n.children);
            }
        }
        assert_no_groups(&forest);
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let records = vec![rec("1", "Orphan", OrgKind::Division, Some("missing"))];
        let forest = build_forest(&records);
        assert_eq!(names(&forest), vec!["Orphan"]);
        assert_eq!(forest[0].group_name, None);
    }

    #[test]
    fn test_cycle_terminates_and_drops_cycle_members() {
        let records = vec![
            rec("a", "A", OrgKind::Company, Some("b")),
            rec("b", "B", OrgKind::Company, Some("a")),
            rec("c", "C", OrgKind::Company, None),
        ];
        let forest = build_forest(&records);
        // Neither cycle member is a root, so neither is reachable.
        assert_eq!(names(&forest), vec!["C"]);
    }

    #[test]
    fn test_self_parent_terminates() {
        let records = vec![
            rec("a", "Selfie", OrgKind::Company, Some("a")),
            rec("b", "Normal", OrgKind::Company, None),
        ];
        let forest = build_forest(&records);
        assert_eq!(names(&forest), vec!["Normal"]);
    }

    #[test]
    fn test_filter_keeps_ancestor_chain_of_match() {
        let records = vec![
            rec("r", "Root Corp", OrgKind::Company, None),
            rec("m", "Middle", OrgKind::Division, Some("r")),
            rec("l", "Leaf Target", OrgKind::Division, Some("m")),
            rec("x", "Unrelated", OrgKind::Company, None),
        ];
        let forest = build_forest(&records);
        let filtered = filter_forest(&forest, "target");
        assert_eq!(names(&filtered), vec!["Root Corp"]);
        assert_eq!(names(&filtered[0].children), vec!["Middle"]);
        assert_eq!(names(&filtered[0].children[0].children), vec!["Leaf Target"]);
    }

    #[test]
    fn test_filter_empty_term_is_identity() {
        let records = vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Acme Sales", OrgKind::Division, Some("1")),
        ];
        let forest = build_forest(&records);
        assert_eq!(filter_forest(&forest, ""), forest);
    }

    #[test]
    fn test_filter_is_case_insensitive_and_checks_short_name() {
        let mut acme = rec("1", "Acme Robotics", OrgKind::Company, None);
        acme.short_name = Some("ACME".to_string());
        let records = vec![acme, rec("2", "Beta", OrgKind::Company, None)];
        let forest = build_forest(&records);
        assert_eq!(names(&filter_forest(&forest, "acme")), vec!["Acme Robotics"]);
        assert_eq!(names(&filter_forest(&forest, "aCmE")), vec!["Acme Robotics"]);
    }

    #[test]
    fn test_filter_drops_non_matching_subtrees_entirely() {
        let records = vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Sales", OrgKind::Division, Some("1")),
            rec("3", "Beta", OrgKind::Company, None),
            rec("4", "Beta Sales", OrgKind::Division, Some("3")),
        ];
        let forest = build_forest(&records);
        let filtered = filter_forest(&forest, "beta");
        assert_eq!(names(&filtered), vec!["Beta"]);
        // "Sales" under Acme must not leave an empty Acme shell behind.
        assert!(filter_forest(&forest, "zzz").is_empty());
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let records = vec![
            rec("1", "Acme", OrgKind::Company, None),
            rec("2", "Sales", OrgKind::Division, Some("1")),
        ];
        let forest = build_forest(&records);
        let before = forest.clone();
        let _ = filter_forest(&forest, "sales");
        assert_eq!(forest, before);
    }
}
