use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minutes without a check-in before a host is considered offline.
const ALIVE_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub u64);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host/{}", self.0)
    }
}

/// One managed machine reporting its package inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    /// Unique identifier for this system (usually the hostname).
    pub identifier: String,
    /// Operating system release, matched against advisory releases.
    pub release: String,
    /// Machine architecture.
    pub architecture: String,
    /// Model of CPU installed, if reported.
    pub cpu: String,
    /// Amount of RAM installed (KiB), if reported.
    pub ram_kib: u64,
    /// Last time this host checked in.
    pub last_seen: DateTime<Utc>,
}

impl Host {
    pub fn ram_gib(&self) -> u64 {
        self.ram_kib.div_ceil(1024 * 1024)
    }

    /// Whether the host has checked in recently enough to be trusted
    /// as a live inventory source.
    pub fn alive(&self, now: DateTime<Utc>) -> bool {
        self.last_seen > now - Duration::minutes(ALIVE_WINDOW_MINUTES)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.identifier.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

/// The inventory fact that a host has a package installed at a version.
///
/// At most one row exists per (name, host, architecture); a version
/// change is reported as a removal followed by an addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub host: HostId,
    pub version: String,
    /// Package architecture, which may differ from the host architecture.
    pub architecture: String,
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(last_seen: DateTime<Utc>) -> Host {
        Host {
            id: HostId(1),
            identifier: "web01".to_string(),
            release: "stable".to_string(),
            architecture: "amd64".to_string(),
            cpu: String::new(),
            ram_kib: 16 * 1024 * 1024,
            last_seen,
        }
    }

    #[test]
    fn test_ram_gib_rounds_up() {
        let mut h = host(Utc::now());
        assert_eq!(h.ram_gib(), 16);
        h.ram_kib += 1;
        assert_eq!(h.ram_gib(), 17);
    }

    #[test]
    fn test_alive_window() {
        let now = Utc::now();
        assert!(host(now - Duration::minutes(5)).alive(now));
        assert!(!host(now - Duration::minutes(31)).alive(now));
    }

    #[test]
    fn test_display_prefers_identifier() {
        let mut h = host(Utc::now());
        assert_eq!(h.to_string(), "web01");
        h.identifier.clear();
        assert_eq!(h.to_string(), "host/1");
    }
}
