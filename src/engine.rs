//! The correlation engine.
//!
//! Consumes events from the inventory store and advisory catalog,
//! compares installed versions against advisory safe versions, and
//! drives the problem ledger to a consistent state. Every reaction is
//! idempotent under redelivery of the same event.
//!
//! Two resolution paths exist on purpose and are observably different:
//! removing a package marks its problems *fixed* (retained as
//! history), while advisory-driven re-evaluation that finds a pair
//! safe *deletes* the matching problems outright. Reporting consumers
//! rely on fixed history existing only for removals.
//!
//! # Example
//!
//! ```
//! use patchwatch::{AdvisorySource, CorrelationEngine};
//! use patchwatch::model::NewAdvisory;
//!
//! let engine = CorrelationEngine::new();
//! let host = engine.inventory().register_host("web01", "stable", "amd64");
//! engine.report_package_added(host, "libfoo", "1.2-1", "amd64").unwrap();
//!
//! let advisory = engine
//!     .catalog()
//!     .publish_advisory(NewAdvisory::new("USN-1000-1", AdvisorySource::Ubuntu));
//! engine
//!     .publish_binary_package(advisory, "libfoo", "stable", "amd64", "1.2-2", None)
//!     .unwrap();
//!
//! assert_eq!(engine.ledger().open_problems_for_host(host).len(), 1);
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::catalog::AdvisoryCatalog;
use crate::config::{Config, InvalidVersionPolicy};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::inventory::InventoryStore;
use crate::ledger::ProblemLedger;
use crate::model::{
    AdvisoryId, BinaryPackageId, FixReason, HostId, ProblemIdentity, SourcePackageId,
};
use crate::version;

pub struct CorrelationEngine {
    inventory: Arc<InventoryStore>,
    catalog: Arc<AdvisoryCatalog>,
    ledger: Arc<ProblemLedger>,
    config: Config,
}

impl CorrelationEngine {
    /// Creates an engine with fresh, empty stores and default config.
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(InventoryStore::new()),
            Arc::new(AdvisoryCatalog::new()),
            Arc::new(ProblemLedger::new()),
            Config::default(),
        )
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_parts(
            Arc::new(InventoryStore::new()),
            Arc::new(AdvisoryCatalog::new()),
            Arc::new(ProblemLedger::new()),
            config,
        )
    }

    pub fn with_parts(
        inventory: Arc<InventoryStore>,
        catalog: Arc<AdvisoryCatalog>,
        ledger: Arc<ProblemLedger>,
        config: Config,
    ) -> Self {
        Self {
            inventory,
            catalog,
            ledger,
            config,
        }
    }

    pub fn inventory(&self) -> &InventoryStore {
        &self.inventory
    }

    pub fn catalog(&self) -> &AdvisoryCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &ProblemLedger {
        &self.ledger
    }

    /// Reacts to one inbound event. Safe to call again with the same
    /// event; the resulting ledger state is identical.
    pub fn handle(&self, event: &Event) -> Result<()> {
        match event {
            Event::PackageAdded {
                host,
                name,
                version,
                architecture,
            } => self.on_package_added(*host, name, version, architecture),
            Event::PackageRemoved {
                host,
                name,
                version,
                architecture,
            } => self.on_package_removed(*host, name, version, architecture),
            Event::BinaryPackagePublished {
                advisory,
                binary_package,
                name,
                release,
                architecture,
                safe_version,
            } => self.on_binary_package_published(
                *advisory,
                *binary_package,
                name,
                release,
                architecture,
                safe_version,
            ),
        }
    }

    /// Records a package fact and correlates it against the catalog.
    /// Returns false when the fact was a duplicate and nothing ran.
    pub fn report_package_added(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<bool> {
        match self.inventory.add_package(host, name, version, architecture)? {
            Some(event) => {
                self.handle(&event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes a package fact and resolves the problems it caused.
    pub fn report_package_removed(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<()> {
        let event = self
            .inventory
            .remove_package(host, name, version, architecture)?;
        self.handle(&event)
    }

    /// Publishes a binary package under an advisory and re-evaluates
    /// the installed base against it.
    pub fn publish_binary_package(
        &self,
        advisory: AdvisoryId,
        package: &str,
        release: &str,
        architecture: &str,
        safe_version: &str,
        source_package: Option<SourcePackageId>,
    ) -> Result<BinaryPackageId> {
        let event = self.catalog.publish_binary_package(
            advisory,
            package,
            release,
            architecture,
            safe_version,
            source_package,
        )?;
        let id = match &event {
            Event::BinaryPackagePublished { binary_package, .. } => *binary_package,
            _ => unreachable!("catalog publish emits BinaryPackagePublished"),
        };
        self.handle(&event)?;
        Ok(id)
    }

    /// Records a source package, derives its binary packages, and
    /// re-evaluates the installed base against each.
    pub fn publish_source_package(
        &self,
        advisory: AdvisoryId,
        package: &str,
        release: &str,
        safe_version: &str,
        binaries: &[(&str, &str)],
    ) -> Result<SourcePackageId> {
        let (id, events) =
            self.catalog
                .publish_source_package(advisory, package, release, safe_version, binaries)?;
        for event in &events {
            self.handle(event)?;
        }
        Ok(id)
    }

    /// A package appeared on a host: open a problem for every advisory
    /// binary package it falls below.
    fn on_package_added(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<()> {
        let host = self.inventory.host(host).ok_or(Error::UnknownHost(host))?;
        let matches = self
            .catalog
            .binary_packages_matching(name, architecture, &host.release);

        for safe_package in matches {
            let unsafe_ = match self.check_unsafe(version, &safe_package.safe_version)? {
                Some(unsafe_) => unsafe_,
                None => continue,
            };
            debug!(
                host = %host, name, version,
                safe_version = %safe_package.safe_version, unsafe_,
                "correlated added package against advisory package"
            );
            if unsafe_ {
                self.ensure_open(ProblemIdentity {
                    advisory: safe_package.advisory,
                    host: host.id,
                    package_name: name.to_string(),
                    package_version: version.to_string(),
                    package_architecture: architecture.to_string(),
                    safe_package: safe_package.id,
                });
            }
        }
        Ok(())
    }

    /// A package left a host: mark every open problem it caused as
    /// fixed. Rows are retained as history, never deleted here.
    fn on_package_removed(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<()> {
        if self.inventory.host(host).is_none() {
            return Err(Error::UnknownHost(host));
        }

        let now = Utc::now();
        for identity in self
            .ledger
            .open_matching_package(host, name, version, architecture)
        {
            match self.ledger.mark_fixed(&identity, FixReason::Removed, now) {
                Ok(()) => debug!(%host, name, version, "problem fixed by package removal"),
                // A concurrent removal already resolved it.
                Err(Error::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// New advisory data arrived: re-evaluate every installed package
    /// it covers. Unsafe pairs gain an open problem; pairs the new
    /// safe version clears lose their problem rows entirely.
    fn on_binary_package_published(
        &self,
        advisory: AdvisoryId,
        binary_package: BinaryPackageId,
        name: &str,
        release: &str,
        architecture: &str,
        safe_version: &str,
    ) -> Result<()> {
        if self.catalog.advisory(advisory).is_none() {
            return Err(Error::UnknownAdvisory(advisory));
        }

        let installed = self.inventory.installed_matching(name, architecture, release);
        let batch_size = self.config.reeval_batch_size.max(1);
        for batch in installed.chunks(batch_size) {
            debug!(
                %advisory, name, batch = batch.len(),
                "re-evaluating installed packages against new advisory data"
            );
            for package in batch {
                let identity = ProblemIdentity {
                    advisory,
                    host: package.host,
                    package_name: package.name.clone(),
                    package_version: package.version.clone(),
                    package_architecture: package.architecture.clone(),
                    safe_package: binary_package,
                };
                match self.check_unsafe(&package.version, safe_version)? {
                    Some(true) => self.ensure_open(identity),
                    Some(false) => {
                        // Safe under the new data: drop the rows, do
                        // not mark them fixed.
                        self.ledger.delete(&identity);
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Compares an installed version against a safe version, applying
    /// the configured policy for malformed input: `Skip` logs a
    /// warning and reports "cannot determine unsafe" (`None`), `Error`
    /// propagates.
    fn check_unsafe(&self, installed: &str, safe_version: &str) -> Result<Option<bool>> {
        match version::is_unsafe(installed, safe_version) {
            Ok(unsafe_) => Ok(Some(unsafe_)),
            Err(err) => match self.config.invalid_version_policy {
                InvalidVersionPolicy::Skip => {
                    warn!(installed, safe_version, %err, "skipping uncomparable versions");
                    Ok(None)
                }
                InvalidVersionPolicy::Error => Err(err),
            },
        }
    }

    /// Ensures exactly one open problem exists for this identity. A
    /// conflict means another delivery of the same event (or a
    /// concurrent writer) got there first, which is success.
    fn ensure_open(&self, identity: ProblemIdentity) {
        match self.ledger.create_open(identity, Utc::now()) {
            Ok(id) => debug!(problem = id.0, "opened problem"),
            Err(Error::Conflict) => debug!("problem already open, nothing to do"),
            // create_open only fails with Conflict.
            Err(err) => warn!(%err, "unexpected ledger error on create"),
        }
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}
