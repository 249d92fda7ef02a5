//! Problem storage and the uniqueness guarantee behind it.
//!
//! The ledger is a passive store; the correlation engine is its only
//! mutator. The invariant it enforces is that at most one *open*
//! problem exists per [`ProblemIdentity`]: an index keyed by identity
//! covers the open rows, so a concurrent duplicate create surfaces as
//! [`Error::Conflict`] instead of a second row. Fixed rows are history
//! and may repeat an identity (a package can be re-installed and
//! removed again).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{
    AdvisoryId, FixReason, HostId, Problem, ProblemId, ProblemIdentity,
};

#[derive(Default)]
struct Inner {
    next_problem: u64,
    problems: HashMap<ProblemId, Problem>,
    /// Uniqueness index over open problems only.
    open_index: HashMap<ProblemIdentity, ProblemId>,
}

#[derive(Default)]
pub struct ProblemLedger {
    inner: RwLock<Inner>,
}

impl ProblemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an open problem with the given identity.
    ///
    /// Fails with [`Error::Conflict`] if an open problem with that
    /// identity already exists; callers treat that as "already
    /// satisfied".
    pub fn create_open(&self, identity: ProblemIdentity, now: DateTime<Utc>) -> Result<ProblemId> {
        let mut inner = self.inner.write().unwrap();
        if inner.open_index.contains_key(&identity) {
            return Err(Error::Conflict);
        }

        inner.next_problem += 1;
        let id = ProblemId(inner.next_problem);
        inner.open_index.insert(identity.clone(), id);
        inner.problems.insert(
            id,
            Problem {
                id,
                identity,
                created: now,
                fixed: None,
                fixed_by: None,
            },
        );
        Ok(id)
    }

    /// Transitions the open problem with this identity to fixed.
    ///
    /// Fails with [`Error::NotFound`] if no open problem matches; the
    /// row is retained as history, never deleted by this path.
    pub fn mark_fixed(
        &self,
        identity: &ProblemIdentity,
        reason: FixReason,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.open_index.remove(identity).ok_or(Error::NotFound)?;
        let problem = inner
            .problems
            .get_mut(&id)
            .expect("open index entry without a problem row");
        problem.fixed = Some(now);
        problem.fixed_by = Some(reason);
        debug!(problem = id.0, reason = reason.as_str(), "problem fixed");
        Ok(())
    }

    /// Deletes every problem with this exact identity, open or fixed.
    /// Returns the number of rows removed (0 is a valid no-op).
    pub fn delete(&self, identity: &ProblemIdentity) -> usize {
        let mut inner = self.inner.write().unwrap();
        let ids: Vec<ProblemId> = inner
            .problems
            .values()
            .filter(|p| p.identity == *identity)
            .map(|p| p.id)
            .collect();
        for id in &ids {
            inner.problems.remove(id);
        }
        inner.open_index.remove(identity);
        if !ids.is_empty() {
            debug!(count = ids.len(), "deleted problems after re-evaluation");
        }
        ids.len()
    }

    /// Identities of the open problems caused by one installed package.
    pub fn open_matching_package(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Vec<ProblemIdentity> {
        let inner = self.inner.read().unwrap();
        inner
            .open_index
            .keys()
            .filter(|identity| {
                identity.host == host
                    && identity.package_name == name
                    && identity.package_version == version
                    && identity.package_architecture == architecture
            })
            .cloned()
            .collect()
    }

    pub fn open_problems_for_host(&self, host: HostId) -> Vec<Problem> {
        let inner = self.inner.read().unwrap();
        let mut problems: Vec<Problem> = inner
            .problems
            .values()
            .filter(|p| p.identity.host == host && p.is_open())
            .cloned()
            .collect();
        problems.sort_by_key(|p| p.id);
        problems
    }

    /// All problems recorded under an advisory, open and fixed.
    pub fn problems_for_advisory(&self, advisory: AdvisoryId) -> Vec<Problem> {
        let inner = self.inner.read().unwrap();
        let mut problems: Vec<Problem> = inner
            .problems
            .values()
            .filter(|p| p.identity.advisory == advisory)
            .cloned()
            .collect();
        problems.sort_by_key(|p| p.id);
        problems
    }

    pub fn open_count(&self) -> usize {
        self.inner.read().unwrap().open_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BinaryPackageId;

    fn identity(version: &str) -> ProblemIdentity {
        ProblemIdentity {
            advisory: AdvisoryId(1),
            host: HostId(1),
            package_name: "libfoo".to_string(),
            package_version: version.to_string(),
            package_architecture: "amd64".to_string(),
            safe_package: BinaryPackageId(1),
        }
    }

    #[test]
    fn test_duplicate_open_create_conflicts() {
        let ledger = ProblemLedger::new();
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();
        assert!(matches!(
            ledger.create_open(identity("1.2-1"), Utc::now()),
            Err(Error::Conflict)
        ));
        assert_eq!(ledger.open_count(), 1);
    }

    #[test]
    fn test_mark_fixed_retains_history() {
        let ledger = ProblemLedger::new();
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();

        ledger
            .mark_fixed(&identity("1.2-1"), FixReason::Removed, Utc::now())
            .unwrap();
        assert_eq!(ledger.open_count(), 0);

        let history = ledger.problems_for_advisory(AdvisoryId(1));
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_open());
        assert_eq!(history[0].fixed_by, Some(FixReason::Removed));
    }

    #[test]
    fn test_mark_fixed_without_open_row_is_not_found() {
        let ledger = ProblemLedger::new();
        assert!(matches!(
            ledger.mark_fixed(&identity("1.2-1"), FixReason::Removed, Utc::now()),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_identity_can_reopen_after_fix() {
        let ledger = ProblemLedger::new();
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();
        ledger
            .mark_fixed(&identity("1.2-1"), FixReason::Removed, Utc::now())
            .unwrap();

        // Re-installing the same unsafe version opens a fresh problem.
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();
        assert_eq!(ledger.open_count(), 1);
        assert_eq!(ledger.problems_for_advisory(AdvisoryId(1)).len(), 2);
    }

    #[test]
    fn test_delete_removes_open_and_fixed_rows() {
        let ledger = ProblemLedger::new();
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();
        ledger
            .mark_fixed(&identity("1.2-1"), FixReason::Removed, Utc::now())
            .unwrap();
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();

        assert_eq!(ledger.delete(&identity("1.2-1")), 2);
        assert_eq!(ledger.open_count(), 0);
        assert!(ledger.problems_for_advisory(AdvisoryId(1)).is_empty());

        // Deleting again is a no-op.
        assert_eq!(ledger.delete(&identity("1.2-1")), 0);
    }

    #[test]
    fn test_open_matching_package() {
        let ledger = ProblemLedger::new();
        ledger.create_open(identity("1.2-1"), Utc::now()).unwrap();
        ledger.create_open(identity("1.2-0"), Utc::now()).unwrap();

        let matches = ledger.open_matching_package(HostId(1), "libfoo", "1.2-1", "amd64");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].package_version, "1.2-1");

        assert!(ledger
            .open_matching_package(HostId(2), "libfoo", "1.2-1", "amd64")
            .is_empty());
    }
}
