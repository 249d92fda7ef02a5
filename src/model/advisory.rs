use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdvisoryId(pub u64);

impl std::fmt::Display for AdvisoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "advisory/{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePackageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryPackageId(pub u64);

/// Vendor source of an advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorySource {
    Debian,
    Ubuntu,
}

impl AdvisorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisorySource::Debian => "debian",
            AdvisorySource::Ubuntu => "ubuntu",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AdvisorySource::Debian => "Debian",
            AdvisorySource::Ubuntu => "Ubuntu",
        }
    }
}

impl std::fmt::Display for AdvisorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Lowest common denominator across all vendor advisories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub id: AdvisoryId,
    /// The ID used by the vendor to refer to this advisory (e.g. "DSA-4999-1").
    pub upstream_id: String,
    pub source: AdvisorySource,
    /// One-line description of the advisory.
    pub short_description: Option<String>,
    pub description: Option<String>,
    /// What, if any, actions need to be taken to address the advisory.
    pub action: Option<String>,
    /// Date and time at which the advisory was issued.
    pub issued: DateTime<Utc>,
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.upstream_id)
    }
}

/// Input for publishing a new advisory to the catalog.
#[derive(Debug, Clone)]
pub struct NewAdvisory {
    pub upstream_id: String,
    pub source: AdvisorySource,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub action: Option<String>,
    pub issued: DateTime<Utc>,
}

impl NewAdvisory {
    pub fn new(upstream_id: impl Into<String>, source: AdvisorySource) -> Self {
        Self {
            upstream_id: upstream_id.into(),
            source,
            short_description: None,
            description: None,
            action: None,
            issued: Utc::now(),
        }
    }

    pub fn with_short_description(mut self, text: impl Into<String>) -> Self {
        self.short_description = Some(text.into());
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn with_action(mut self, text: impl Into<String>) -> Self {
        self.action = Some(text.into());
        self
    }

    pub fn with_issued(mut self, issued: DateTime<Utc>) -> Self {
        self.issued = issued;
        self
    }
}

/// Source package to which an advisory refers.
///
/// Source packages are never installed on hosts, so the engine does not
/// consume them directly; for Debian advisories they determine what
/// binary packages (and safe versions) are derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePackage {
    pub id: SourcePackageId,
    pub advisory: AdvisoryId,
    pub package: String,
    pub release: String,
    pub safe_version: String,
}

impl std::fmt::Display for SourcePackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Safe version "0" means every version is unsafe; elide it.
        if self.safe_version == "0" {
            write!(f, "{} ({})", self.package, self.release)
        } else {
            write!(f, "{} {} ({})", self.package, self.safe_version, self.release)
        }
    }
}

/// Binary package to which an advisory refers: versions of `package`
/// below `safe_version`, on this release and architecture, are unsafe.
///
/// Ubuntu advisories carry these directly; Debian advisories derive
/// them from their source packages, in which case `source_package`
/// points back at the record they were generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryPackage {
    pub id: BinaryPackageId,
    pub advisory: AdvisoryId,
    pub source_package: Option<SourcePackageId>,
    pub package: String,
    pub release: String,
    pub architecture: String,
    pub safe_version: String,
}

impl std::fmt::Display for BinaryPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}, {})",
            self.package, self.safe_version, self.release, self.architecture
        )
    }
}

/// CVE from the MITRE database, cross-referencing advisories from
/// multiple vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    /// MITRE name of the CVE.
    pub upstream_id: String,
    pub first_seen: DateTime<Utc>,
    pub advisories: Vec<AdvisoryId>,
}

impl Vulnerability {
    pub fn mitre_url(&self) -> String {
        format!(
            "https://cve.mitre.org/cgi-bin/cvename.cgi?name={}",
            self.upstream_id
        )
    }
}
