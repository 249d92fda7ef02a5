//! Events emitted by the inventory store and advisory catalog.
//!
//! Mutations do not trigger correlation through hidden storage hooks;
//! they return the events they raise, and the caller hands those to
//! [`CorrelationEngine::handle`](crate::engine::CorrelationEngine::handle).
//! This keeps ordering and idempotence visible and testable.

use crate::model::{AdvisoryId, BinaryPackageId, HostId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A new package fact was recorded for a host.
    PackageAdded {
        host: HostId,
        name: String,
        version: String,
        architecture: String,
    },
    /// A package fact was removed from a host. Emitted even when no
    /// row matched, so stale problems resolve deterministically.
    PackageRemoved {
        host: HostId,
        name: String,
        version: String,
        architecture: String,
    },
    /// An advisory published a new binary package safety record.
    BinaryPackagePublished {
        advisory: AdvisoryId,
        binary_package: BinaryPackageId,
        name: String,
        release: String,
        architecture: String,
        safe_version: String,
    },
}
