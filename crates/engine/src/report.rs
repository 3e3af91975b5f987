//! Pass-level status and fact reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stratus_core::{Changeset, ExistenceTransition, Outcome, ResourceId};

/// What an apply did to the remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedChange {
    /// The remote object was created.
    Created,
    /// The remote object was deleted.
    Deleted,
    /// Attributes were edited in place.
    Updated { fields: Vec<String> },
}

impl AppliedChange {
    /// Classify an applied changeset.
    pub fn from_changeset(changes: &Changeset) -> Self {
        match changes.existence_transition() {
            Some(ExistenceTransition::Create) => Self::Created,
            Some(ExistenceTransition::Delete) => Self::Deleted,
            None => Self::Updated {
                fields: changes.fields().map(str::to_string).collect(),
            },
        }
    }
}

/// Terminal status, applied change and facts for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReport {
    /// The resource this report describes.
    pub id: ResourceId,
    /// Terminal status for the pass.
    pub outcome: Outcome,
    /// What apply did, when it ran and changed something.
    pub applied: Option<AppliedChange>,
    /// Changes that were computed but not applied (dry run).
    pub pending: Option<Changeset>,
    /// Derived facts; empty when gathering failed or never ran.
    pub facts: BTreeMap<String, String>,
}

/// The outcome of one reconciliation pass, resources in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    /// Per-resource reports.
    pub resources: Vec<ResourceReport>,
    /// Resources that converged.
    pub converged: usize,
    /// Resources skipped for this pass.
    pub skipped: usize,
    /// Resources that failed.
    pub failed: usize,
}

impl PassReport {
    /// Build a report, counting outcomes.
    pub fn new(resources: Vec<ResourceReport>) -> Self {
        let converged = resources
            .iter()
            .filter(|r| r.outcome.is_converged())
            .count();
        let failed = resources.iter().filter(|r| r.outcome.is_failed()).count();
        let skipped = resources
            .len()
            .saturating_sub(converged)
            .saturating_sub(failed);
        Self {
            resources,
            converged,
            skipped,
            failed,
        }
    }

    /// Whether every resource converged.
    pub fn all_converged(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// The report for one resource.
    pub fn report(&self, id: &ResourceId) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| &r.id == id)
    }

    /// The terminal outcome of one resource.
    pub fn outcome(&self, id: &ResourceId) -> Option<&Outcome> {
        self.report(id).map(|r| &r.outcome)
    }

    /// The fact mapping of one resource.
    pub fn facts(&self, id: &ResourceId) -> Option<&BTreeMap<String, String>> {
        self.report(id).map(|r| &r.facts)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_applied_change_classification() {
        let mut create = Changeset::new();
        create.insert("purged", json!(true), json!(false));
        assert_eq!(AppliedChange::from_changeset(&create), AppliedChange::Created);

        let mut update = Changeset::new();
        update.insert("dhcp", json!(false), json!(true));
        update.insert("description", json!(""), json!("internal"));
        assert_eq!(
            AppliedChange::from_changeset(&update),
            AppliedChange::Updated {
                fields: vec!["dhcp".to_string(), "description".to_string()]
            }
        );
    }

    #[test]
    fn test_pass_report_counts() {
        let report = PassReport::new(vec![
            ResourceReport {
                id: ResourceId::new("project", "p1"),
                outcome: Outcome::Converged,
                applied: None,
                pending: None,
                facts: BTreeMap::new(),
            },
            ResourceReport {
                id: ResourceId::new("network", "n1"),
                outcome: Outcome::failed("remote conflict"),
                applied: None,
                pending: None,
                facts: BTreeMap::new(),
            },
            ResourceReport {
                id: ResourceId::new("subnet", "s1"),
                outcome: Outcome::skipped("requirement network[n1] did not converge"),
                applied: None,
                pending: None,
                facts: BTreeMap::new(),
            },
        ]);

        assert_eq!(report.converged, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!report.all_converged());
        assert!(report
            .outcome(&ResourceId::new("subnet", "s1"))
            .map(|o| !o.is_converged())
            .unwrap_or(false));
    }
}
