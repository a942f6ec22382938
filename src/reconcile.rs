//! Association-set reconciliation.
//!
//! When an operator edits the links of a contact method (which companies,
//! persons, and departments it belongs to), the edit screen works on an
//! in-memory copy. On save we diff that copy against the persisted snapshot
//! and emit the minimal create/update/delete plan; each plan entry becomes
//! one HTTP request (see `api::client::ApiClient::apply_plan`).
//!
//! Link identity is the `(company_id, person_id)` pair. The department set
//! is payload, compared order-insensitively.

use crate::api::models::AssociationLink;
use std::collections::HashMap;

/// Minimal operation set turning a persisted association collection into
/// the edited one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// New links (no `association_id` yet).
    pub to_create: Vec<AssociationLink>,
    /// Existing links whose department set changed. Each carries the
    /// persisted `association_id` and the NEW department set.
    pub to_update: Vec<AssociationLink>,
    /// Persisted links removed by the edit.
    pub to_delete: Vec<AssociationLink>,
    /// Deletes dropped because the before-snapshot link had no persisted
    /// id. Indicates an incomplete snapshot; callers should alert on it.
    pub skipped_deletes: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

type LinkKey = (Option<i64>, Option<i64>);

fn key(link: &AssociationLink) -> LinkKey {
    (link.company_id, link.person_id)
}

/// Sorted, deduplicated department list for membership comparison.
fn normalized_departments(link: &AssociationLink) -> Vec<String> {
    let mut deps = link.departments.clone().unwrap_or_default();
    deps.sort();
    deps.dedup();
    deps
}

/// Diff the persisted association set against the edited one.
///
/// - a key only in `after` yields exactly one create
/// - a key only in `before` yields exactly one delete (skipped with a
///   warning if the persisted link somehow lacks an id)
/// - a key in both yields one update iff the department sets differ as
///   sets, nothing otherwise
pub fn diff_associations(
    before: &[AssociationLink],
    after: &[AssociationLink],
) -> ReconcilePlan {
    let before_by_key: HashMap<LinkKey, &AssociationLink> =
        before.iter().map(|l| (key(l), l)).collect();
    let after_by_key: HashMap<LinkKey, &AssociationLink> =
        after.iter().map(|l| (key(l), l)).collect();

    let mut plan = ReconcilePlan::default();

    // Iterate the input slices, not the maps, to keep operation order
    // deterministic.
    for link in after {
        match before_by_key.get(&key(link)) {
            None => plan.to_create.push(link.clone()),
            Some(existing) => {
                if normalized_departments(existing) != normalized_departments(link) {
                    plan.to_update.push(AssociationLink {
                        association_id: existing.association_id,
                        departments: link.departments.clone(),
                        ..link.clone()
                    });
                }
            }
        }
    }

    for link in before {
        if after_by_key.contains_key(&key(link)) {
            continue;
        }
        if link.association_id.is_none() {
            // Snapshot link was never persisted; nothing to delete on the
            // backend. Warn instead of failing the whole save.
            eprintln!(
                "[Reconcile] Skipping delete for link {} with no persisted id",
                link.key_display()
            );
            plan.skipped_deletes += 1;
            continue;
        }
        plan.to_delete.push(link.clone());
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(
        association_id: Option<i64>,
        company_id: Option<i64>,
        person_id: Option<i64>,
        departments: Option<&[&str]>,
    ) -> AssociationLink {
        AssociationLink {
            association_id,
            company_id,
            person_id,
            departments: departments.map(|d| d.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_unchanged_set_produces_no_operations() {
        let before = vec![link(Some(1), Some(5), None, Some(&["HR"]))];
        let after = vec![link(None, Some(5), None, Some(&["HR"]))];
        let plan = diff_associations(&before, &after);
        assert!(plan.is_empty());
        assert_eq!(plan.skipped_deletes, 0);
    }

    #[test]
    fn test_department_change_and_new_key() {
        let before = vec![link(Some(1), Some(5), None, Some(&["HR"]))];
        let after = vec![
            link(None, Some(5), None, Some(&["HR", "IT"])),
            link(None, Some(9), None, None),
        ];
        let plan = diff_associations(&before, &after);

        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].association_id, Some(1));
        assert_eq!(
            plan.to_update[0].departments,
            Some(vec!["HR".to_string(), "IT".to_string()])
        );

        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].company_id, Some(9));
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_removed_key_yields_delete_with_persisted_id() {
        let before = vec![link(Some(7), None, Some(3), None)];
        let plan = diff_associations(&before, &[]);
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].association_id, Some(7));
        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn test_department_order_is_irrelevant() {
        let before = vec![link(Some(1), Some(5), Some(3), Some(&["A", "B"]))];
        let after = vec![link(None, Some(5), Some(3), Some(&["B", "A"]))];
        assert!(diff_associations(&before, &after).is_empty());
    }

    #[test]
    fn test_duplicate_departments_are_not_meaningful() {
        let before = vec![link(Some(1), Some(5), None, Some(&["A", "A", "B"]))];
        let after = vec![link(None, Some(5), None, Some(&["B", "A"]))];
        assert!(diff_associations(&before, &after).is_empty());
    }

    #[test]
    fn test_subset_is_not_equality() {
        let before = vec![link(Some(1), Some(5), None, Some(&["A", "B"]))];
        let after = vec![link(None, Some(5), None, Some(&["A"]))];
        let plan = diff_associations(&before, &after);
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].departments, Some(vec!["A".to_string()]));
    }

    #[test]
    fn test_delete_without_persisted_id_is_skipped_and_counted() {
        let before = vec![
            link(None, Some(5), None, None),
            link(Some(2), Some(6), None, None),
        ];
        let plan = diff_associations(&before, &[]);
        assert_eq!(plan.skipped_deletes, 1);
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].association_id, Some(2));
    }

    #[test]
    fn test_identity_is_company_person_pair() {
        // Same company, different person: distinct links.
        let before = vec![link(Some(1), Some(5), Some(1), None)];
        let after = vec![link(None, Some(5), Some(2), None)];
        let plan = diff_associations(&before, &after);
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_delete.len(), 1);
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn test_missing_departments_equals_empty_set() {
        let before = vec![link(Some(1), Some(5), None, None)];
        let after = vec![link(None, Some(5), None, Some(&[]))];
        assert!(diff_associations(&before, &after).is_empty());
    }
}
