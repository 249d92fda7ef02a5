//! Advisories and their per-package safety records.
//!
//! The catalog is append-only from the engine's point of view: binary
//! packages are published, never updated or withdrawn. Publishing
//! returns the [`Event::BinaryPackagePublished`] that triggers
//! re-evaluation of the installed base.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::model::{
    Advisory, AdvisoryId, BinaryPackage, BinaryPackageId, NewAdvisory, SourcePackage,
    SourcePackageId, Vulnerability,
};

#[derive(Default)]
struct Inner {
    next_advisory: u64,
    next_source: u64,
    next_binary: u64,
    advisories: HashMap<AdvisoryId, Advisory>,
    source_packages: HashMap<SourcePackageId, SourcePackage>,
    binary_packages: HashMap<BinaryPackageId, BinaryPackage>,
    /// Index from binary package name to its safety records.
    by_package: HashMap<String, Vec<BinaryPackageId>>,
    /// CVE cross-references, keyed by MITRE id.
    vulnerabilities: HashMap<String, Vulnerability>,
}

#[derive(Default)]
pub struct AdvisoryCatalog {
    inner: RwLock<Inner>,
}

impl AdvisoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_advisory(&self, advisory: NewAdvisory) -> AdvisoryId {
        let mut inner = self.inner.write().unwrap();
        inner.next_advisory += 1;
        let id = AdvisoryId(inner.next_advisory);
        debug!(%id, upstream_id = %advisory.upstream_id, source = %advisory.source, "published advisory");
        inner.advisories.insert(
            id,
            Advisory {
                id,
                upstream_id: advisory.upstream_id,
                source: advisory.source,
                short_description: advisory.short_description,
                description: advisory.description,
                action: advisory.action,
                issued: advisory.issued,
            },
        );
        id
    }

    /// Publishes one binary package safety record under an advisory and
    /// returns the event that triggers re-evaluation.
    pub fn publish_binary_package(
        &self,
        advisory: AdvisoryId,
        package: &str,
        release: &str,
        architecture: &str,
        safe_version: &str,
        source_package: Option<SourcePackageId>,
    ) -> Result<Event> {
        let mut inner = self.inner.write().unwrap();
        inner.publish_binary(
            advisory,
            package,
            release,
            architecture,
            safe_version,
            source_package,
        )
    }

    /// Records an advisory source package and derives one binary
    /// package per listed (name, architecture), all at the source
    /// package's safe version. This is the Debian path, where vendor
    /// data names source packages and the binary records are generated
    /// locally.
    pub fn publish_source_package(
        &self,
        advisory: AdvisoryId,
        package: &str,
        release: &str,
        safe_version: &str,
        binaries: &[(&str, &str)],
    ) -> Result<(SourcePackageId, Vec<Event>)> {
        let mut inner = self.inner.write().unwrap();
        if !inner.advisories.contains_key(&advisory) {
            return Err(Error::UnknownAdvisory(advisory));
        }

        inner.next_source += 1;
        let id = SourcePackageId(inner.next_source);
        inner.source_packages.insert(
            id,
            SourcePackage {
                id,
                advisory,
                package: package.to_string(),
                release: release.to_string(),
                safe_version: safe_version.to_string(),
            },
        );
        debug!(%advisory, package, release, "recorded source package");

        let mut events = Vec::with_capacity(binaries.len());
        for (name, architecture) in binaries {
            events.push(inner.publish_binary(
                advisory,
                name,
                release,
                architecture,
                safe_version,
                Some(id),
            )?);
        }
        Ok((id, events))
    }

    /// Cross-references a CVE with an advisory. Idempotent per
    /// (CVE, advisory) pair; the vulnerability record is created on
    /// first sight.
    pub fn link_vulnerability(&self, cve: &str, advisory: AdvisoryId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.advisories.contains_key(&advisory) {
            return Err(Error::UnknownAdvisory(advisory));
        }
        let vuln = inner
            .vulnerabilities
            .entry(cve.to_string())
            .or_insert_with(|| Vulnerability {
                upstream_id: cve.to_string(),
                first_seen: Utc::now(),
                advisories: Vec::new(),
            });
        if !vuln.advisories.contains(&advisory) {
            vuln.advisories.push(advisory);
        }
        Ok(())
    }

    pub fn advisory(&self, id: AdvisoryId) -> Option<Advisory> {
        self.inner.read().unwrap().advisories.get(&id).cloned()
    }

    pub fn binary_package(&self, id: BinaryPackageId) -> Option<BinaryPackage> {
        self.inner.read().unwrap().binary_packages.get(&id).cloned()
    }

    /// Safety records matching an installed package: same name and
    /// architecture, for the release the host runs.
    pub fn binary_packages_matching(
        &self,
        name: &str,
        architecture: &str,
        release: &str,
    ) -> Vec<BinaryPackage> {
        let inner = self.inner.read().unwrap();
        inner
            .by_package
            .get(name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.binary_packages.get(id))
                    .filter(|bp| bp.architecture == architecture && bp.release == release)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn vulnerabilities_for(&self, advisory: AdvisoryId) -> Vec<Vulnerability> {
        let inner = self.inner.read().unwrap();
        let mut vulns: Vec<Vulnerability> = inner
            .vulnerabilities
            .values()
            .filter(|v| v.advisories.contains(&advisory))
            .cloned()
            .collect();
        vulns.sort_by(|a, b| a.upstream_id.cmp(&b.upstream_id));
        vulns
    }

    /// Comma-separated names of the advisory's source packages, for
    /// listing surfaces.
    pub fn source_package_names(&self, advisory: AdvisoryId) -> String {
        let inner = self.inner.read().unwrap();
        let mut names: Vec<String> = inner
            .source_packages
            .values()
            .filter(|sp| sp.advisory == advisory)
            .map(|sp| sp.to_string())
            .collect();
        names.sort();
        names.join(", ")
    }
}

impl Inner {
    fn publish_binary(
        &mut self,
        advisory: AdvisoryId,
        package: &str,
        release: &str,
        architecture: &str,
        safe_version: &str,
        source_package: Option<SourcePackageId>,
    ) -> Result<Event> {
        if !self.advisories.contains_key(&advisory) {
            return Err(Error::UnknownAdvisory(advisory));
        }

        self.next_binary += 1;
        let id = BinaryPackageId(self.next_binary);
        self.binary_packages.insert(
            id,
            BinaryPackage {
                id,
                advisory,
                source_package,
                package: package.to_string(),
                release: release.to_string(),
                architecture: architecture.to_string(),
                safe_version: safe_version.to_string(),
            },
        );
        self.by_package
            .entry(package.to_string())
            .or_default()
            .push(id);
        debug!(%advisory, package, release, architecture, safe_version, "published binary package");

        Ok(Event::BinaryPackagePublished {
            advisory,
            binary_package: id,
            name: package.to_string(),
            release: release.to_string(),
            architecture: architecture.to_string(),
            safe_version: safe_version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdvisorySource;

    fn advisory(catalog: &AdvisoryCatalog, upstream_id: &str) -> AdvisoryId {
        catalog.publish_advisory(NewAdvisory::new(upstream_id, AdvisorySource::Ubuntu))
    }

    #[test]
    fn test_publish_binary_package_emits_event() {
        let catalog = AdvisoryCatalog::new();
        let id = advisory(&catalog, "USN-1000-1");

        let event = catalog
            .publish_binary_package(id, "libfoo", "stable", "amd64", "1.2-2", None)
            .unwrap();
        match event {
            Event::BinaryPackagePublished {
                advisory,
                name,
                safe_version,
                ..
            } => {
                assert_eq!(advisory, id);
                assert_eq!(name, "libfoo");
                assert_eq!(safe_version, "1.2-2");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_advisory_is_rejected() {
        let catalog = AdvisoryCatalog::new();
        assert!(matches!(
            catalog.publish_binary_package(AdvisoryId(9), "libfoo", "stable", "amd64", "1.0", None),
            Err(Error::UnknownAdvisory(_))
        ));
        assert!(matches!(
            catalog.link_vulnerability("CVE-2024-0001", AdvisoryId(9)),
            Err(Error::UnknownAdvisory(_))
        ));
    }

    #[test]
    fn test_source_package_derives_binaries() {
        let catalog = AdvisoryCatalog::new();
        let id = advisory(&catalog, "DSA-5000-1");

        let (source, events) = catalog
            .publish_source_package(
                id,
                "openssl",
                "stable",
                "1.1.1n-0+deb11u3",
                &[("libssl1.1", "amd64"), ("libssl1.1", "i386")],
            )
            .unwrap();
        assert_eq!(events.len(), 2);

        let matches = catalog.binary_packages_matching("libssl1.1", "amd64", "stable");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].safe_version, "1.1.1n-0+deb11u3");
        assert_eq!(matches[0].source_package, Some(source));

        assert_eq!(
            catalog.source_package_names(id),
            "openssl 1.1.1n-0+deb11u3 (stable)"
        );
    }

    #[test]
    fn test_matching_filters_release_and_architecture() {
        let catalog = AdvisoryCatalog::new();
        let id = advisory(&catalog, "USN-1000-1");
        catalog
            .publish_binary_package(id, "libfoo", "stable", "amd64", "1.2-2", None)
            .unwrap();
        catalog
            .publish_binary_package(id, "libfoo", "testing", "amd64", "1.3-1", None)
            .unwrap();

        assert_eq!(
            catalog
                .binary_packages_matching("libfoo", "amd64", "stable")
                .len(),
            1
        );
        assert!(catalog
            .binary_packages_matching("libfoo", "arm64", "stable")
            .is_empty());
        assert!(catalog
            .binary_packages_matching("libbar", "amd64", "stable")
            .is_empty());
    }

    #[test]
    fn test_link_vulnerability_is_idempotent() {
        let catalog = AdvisoryCatalog::new();
        let usn = advisory(&catalog, "USN-1000-1");
        let dsa = advisory(&catalog, "DSA-5000-1");

        catalog.link_vulnerability("CVE-2024-0001", usn).unwrap();
        catalog.link_vulnerability("CVE-2024-0001", usn).unwrap();
        catalog.link_vulnerability("CVE-2024-0001", dsa).unwrap();

        let vulns = catalog.vulnerabilities_for(usn);
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].advisories, vec![usn, dsa]);
    }
}
