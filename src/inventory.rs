//! Current installed-package facts per host.
//!
//! The store is the source of [`Event::PackageAdded`] and
//! [`Event::PackageRemoved`]: mutations return the events they raise
//! instead of firing hidden hooks. Hosts reporting concurrently are
//! safe; all state sits behind one `RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::model::{Host, HostId, Package};

/// Uniqueness key for a package fact: at most one row per
/// (name, host, architecture).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PackageKey {
    host: HostId,
    name: String,
    architecture: String,
}

#[derive(Default)]
struct Inner {
    next_host: u64,
    hosts: HashMap<HostId, Host>,
    packages: HashMap<PackageKey, Package>,
}

#[derive(Default)]
pub struct InventoryStore {
    inner: RwLock<Inner>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_host(
        &self,
        identifier: impl Into<String>,
        release: impl Into<String>,
        architecture: impl Into<String>,
    ) -> HostId {
        let mut inner = self.inner.write().unwrap();
        inner.next_host += 1;
        let id = HostId(inner.next_host);
        let host = Host {
            id,
            identifier: identifier.into(),
            release: release.into(),
            architecture: architecture.into(),
            cpu: String::new(),
            ram_kib: 0,
            last_seen: Utc::now(),
        };
        debug!(host = %host, "registered host");
        inner.hosts.insert(id, host);
        id
    }

    /// Records hardware facts from a system-info snapshot.
    pub fn set_host_facts(&self, host: HostId, cpu: &str, ram_kib: u64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let host = inner.hosts.get_mut(&host).ok_or(Error::UnknownHost(host))?;
        host.cpu = cpu.to_string();
        host.ram_kib = ram_kib;
        Ok(())
    }

    /// Updates the host's last check-in time.
    pub fn touch(&self, host: HostId, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let host = inner.hosts.get_mut(&host).ok_or(Error::UnknownHost(host))?;
        host.last_seen = now;
        Ok(())
    }

    pub fn host(&self, id: HostId) -> Option<Host> {
        self.inner.read().unwrap().hosts.get(&id).cloned()
    }

    /// Records that `host` has `name` installed at `version`.
    ///
    /// Idempotent upsert keyed by (name, host, architecture): if a row
    /// with that key already exists the call is a duplicate-ignore
    /// no-op, even when the existing row carries a different version.
    /// Version changes must arrive as an explicit removal followed by
    /// an addition, which is how differential reports deliver them.
    ///
    /// Returns the [`Event::PackageAdded`] only when a row was
    /// actually created.
    pub fn add_package(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<Option<Event>> {
        let mut inner = self.inner.write().unwrap();
        if !inner.hosts.contains_key(&host) {
            return Err(Error::UnknownHost(host));
        }

        let key = PackageKey {
            host,
            name: name.to_string(),
            architecture: architecture.to_string(),
        };
        if inner.packages.contains_key(&key) {
            debug!(%host, name, version, "duplicate package fact ignored");
            return Ok(None);
        }

        inner.packages.insert(
            key,
            Package {
                name: name.to_string(),
                host,
                version: version.to_string(),
                architecture: architecture.to_string(),
                created: Utc::now(),
            },
        );
        debug!(%host, name, version, architecture, "installed package");

        Ok(Some(Event::PackageAdded {
            host,
            name: name.to_string(),
            version: version.to_string(),
            architecture: architecture.to_string(),
        }))
    }

    /// Deletes the matching package fact if present.
    ///
    /// The row is only deleted when the version matches too, but the
    /// [`Event::PackageRemoved`] is returned unconditionally so the
    /// engine can resolve stale problems deterministically.
    pub fn remove_package(
        &self,
        host: HostId,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<Event> {
        let mut inner = self.inner.write().unwrap();
        if !inner.hosts.contains_key(&host) {
            return Err(Error::UnknownHost(host));
        }

        let key = PackageKey {
            host,
            name: name.to_string(),
            architecture: architecture.to_string(),
        };
        let removed = match inner.packages.get(&key) {
            Some(row) if row.version == version => {
                inner.packages.remove(&key);
                true
            }
            _ => false,
        };
        debug!(%host, name, version, removed, "removed package");

        Ok(Event::PackageRemoved {
            host,
            name: name.to_string(),
            version: version.to_string(),
            architecture: architecture.to_string(),
        })
    }

    pub fn packages_on(&self, host: HostId) -> Vec<Package> {
        let inner = self.inner.read().unwrap();
        let mut packages: Vec<Package> = inner
            .packages
            .values()
            .filter(|p| p.host == host)
            .cloned()
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        packages
    }

    /// Installed packages matching an advisory binary package: same
    /// name and architecture, on a host running `release`.
    pub fn installed_matching(&self, name: &str, architecture: &str, release: &str) -> Vec<Package> {
        let inner = self.inner.read().unwrap();
        inner
            .packages
            .values()
            .filter(|p| {
                p.name == name
                    && p.architecture == architecture
                    && inner
                        .hosts
                        .get(&p.host)
                        .is_some_and(|h| h.release == release)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_package_emits_event_once() {
        let store = InventoryStore::new();
        let host = store.register_host("web01", "stable", "amd64");

        let event = store.add_package(host, "libfoo", "1.2-1", "amd64").unwrap();
        assert!(matches!(event, Some(Event::PackageAdded { .. })));

        // Same key again is a duplicate-ignore no-op.
        let event = store.add_package(host, "libfoo", "1.2-1", "amd64").unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_add_existing_key_with_new_version_is_ignored() {
        let store = InventoryStore::new();
        let host = store.register_host("web01", "stable", "amd64");

        store.add_package(host, "libfoo", "1.2-1", "amd64").unwrap();
        let event = store.add_package(host, "libfoo", "1.2-2", "amd64").unwrap();
        assert!(event.is_none());

        // The original version is still the recorded fact.
        let packages = store.packages_on(host);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "1.2-1");
    }

    #[test]
    fn test_same_name_different_architecture_coexists() {
        let store = InventoryStore::new();
        let host = store.register_host("web01", "stable", "amd64");

        assert!(store
            .add_package(host, "libfoo", "1.2-1", "amd64")
            .unwrap()
            .is_some());
        assert!(store
            .add_package(host, "libfoo", "1.2-1", "i386")
            .unwrap()
            .is_some());
        assert_eq!(store.packages_on(host).len(), 2);
    }

    #[test]
    fn test_remove_package_event_is_unconditional() {
        let store = InventoryStore::new();
        let host = store.register_host("web01", "stable", "amd64");

        // Nothing installed, event still emitted.
        let event = store
            .remove_package(host, "libfoo", "1.2-1", "amd64")
            .unwrap();
        assert!(matches!(event, Event::PackageRemoved { .. }));
    }

    #[test]
    fn test_remove_requires_matching_version() {
        let store = InventoryStore::new();
        let host = store.register_host("web01", "stable", "amd64");
        store.add_package(host, "libfoo", "1.2-1", "amd64").unwrap();

        store
            .remove_package(host, "libfoo", "9.9-9", "amd64")
            .unwrap();
        assert_eq!(store.packages_on(host).len(), 1);

        store
            .remove_package(host, "libfoo", "1.2-1", "amd64")
            .unwrap();
        assert!(store.packages_on(host).is_empty());
    }

    #[test]
    fn test_unknown_host_is_rejected() {
        let store = InventoryStore::new();
        let missing = HostId(42);
        assert!(matches!(
            store.add_package(missing, "libfoo", "1.2-1", "amd64"),
            Err(Error::UnknownHost(_))
        ));
        assert!(matches!(
            store.remove_package(missing, "libfoo", "1.2-1", "amd64"),
            Err(Error::UnknownHost(_))
        ));
    }

    #[test]
    fn test_installed_matching_filters_on_host_release() {
        let store = InventoryStore::new();
        let stable = store.register_host("web01", "stable", "amd64");
        let testing = store.register_host("web02", "testing", "amd64");
        store
            .add_package(stable, "libfoo", "1.2-1", "amd64")
            .unwrap();
        store
            .add_package(testing, "libfoo", "1.2-1", "amd64")
            .unwrap();

        let matches = store.installed_matching("libfoo", "amd64", "stable");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].host, stable);
    }

    #[test]
    fn test_touch_and_host_facts() {
        let store = InventoryStore::new();
        let host = store.register_host("web01", "stable", "amd64");

        store.set_host_facts(host, "Xeon", 8 * 1024 * 1024).unwrap();
        let now = Utc::now();
        store.touch(host, now).unwrap();

        let host = store.host(host).unwrap();
        assert_eq!(host.cpu, "Xeon");
        assert_eq!(host.ram_gib(), 8);
        assert_eq!(host.last_seen, now);
    }
}
