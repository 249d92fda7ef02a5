use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AdvisoryId, BinaryPackageId, HostId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(pub u64);

/// Way in which a problem was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixReason {
    /// The offending package was removed from the host.
    Removed,
}

impl FixReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixReason::Removed => "removed",
        }
    }
}

/// The full composite identity of a problem, used for deduplication.
///
/// Open/fixed status is deliberately not part of the identity; it is an
/// explicit field on [`Problem`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemIdentity {
    /// Advisory that caused this problem.
    pub advisory: AdvisoryId,
    /// Host which has the problem.
    pub host: HostId,
    pub package_name: String,
    pub package_version: String,
    pub package_architecture: String,
    /// The binary package record whose safe version the installed
    /// package fell below.
    pub safe_package: BinaryPackageId,
}

/// Records why a host is affected by an advisory.
///
/// A problem is open while `fixed` is `None`. Removal of the offending
/// package marks it fixed (retained as history); advisory-driven
/// re-evaluation that finds the pair safe deletes the record outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    #[serde(flatten)]
    pub identity: ProblemIdentity,
    /// When the problem was discovered.
    pub created: DateTime<Utc>,
    pub fixed: Option<DateTime<Utc>>,
    pub fixed_by: Option<FixReason>,
}

impl Problem {
    pub fn is_open(&self) -> bool {
        self.fixed.is_none()
    }

    pub fn is_fixed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.fixed, Some(at) if now >= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> Problem {
        Problem {
            id: ProblemId(1),
            identity: ProblemIdentity {
                advisory: AdvisoryId(1),
                host: HostId(1),
                package_name: "libfoo".to_string(),
                package_version: "1.2-1".to_string(),
                package_architecture: "amd64".to_string(),
                safe_package: BinaryPackageId(1),
            },
            created: Utc::now(),
            fixed: None,
            fixed_by: None,
        }
    }

    #[test]
    fn test_open_iff_fixed_is_null() {
        let mut p = problem();
        assert!(p.is_open());
        assert!(!p.is_fixed(Utc::now()));

        p.fixed = Some(Utc::now());
        p.fixed_by = Some(FixReason::Removed);
        assert!(!p.is_open());
        assert!(p.is_fixed(Utc::now()));
    }

    #[test]
    fn test_fix_reason_as_str() {
        assert_eq!(FixReason::Removed.as_str(), "removed");
    }
}
