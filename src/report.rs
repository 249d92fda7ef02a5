//! Differential package-report ingestion.
//!
//! Reporting agents deliver their package list as a stream of
//! `added`/`removed` entries rather than full snapshots. This module
//! decodes such a report and replays it through the engine's add and
//! remove paths. Transport and agent authentication live outside this
//! crate; the payload arrives here already extracted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::CorrelationEngine;
use crate::error::{Error, Result};
use crate::model::HostId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Added,
    Removed,
}

/// One differential entry: a package appeared on or left the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub action: ReportAction,
    pub name: String,
    pub version: String,
    /// Agents report the package architecture under "arch".
    #[serde(rename = "arch")]
    pub architecture: String,
}

/// A differential package report from one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReport {
    pub entries: Vec<ReportEntry>,
}

impl PackageReport {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| Error::Report(err.to_string()))
    }
}

/// What applying a report did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Entries that changed inventory state and ran correlation.
    pub applied: usize,
    /// Added entries ignored as duplicates of existing facts.
    pub ignored: usize,
}

impl CorrelationEngine {
    /// Applies one differential package report for a host, updating
    /// its check-in time and correlating every entry.
    pub fn apply_report(&self, host: HostId, report: &PackageReport) -> Result<ReportOutcome> {
        self.inventory().touch(host, Utc::now())?;

        let mut outcome = ReportOutcome::default();
        for entry in &report.entries {
            match entry.action {
                ReportAction::Added => {
                    if self.report_package_added(
                        host,
                        &entry.name,
                        &entry.version,
                        &entry.architecture,
                    )? {
                        outcome.applied += 1;
                    } else {
                        outcome.ignored += 1;
                    }
                }
                ReportAction::Removed => {
                    self.report_package_removed(
                        host,
                        &entry.name,
                        &entry.version,
                        &entry.architecture,
                    )?;
                    outcome.applied += 1;
                }
            }
        }
        debug!(
            %host,
            applied = outcome.applied,
            ignored = outcome.ignored,
            "applied package report"
        );
        Ok(outcome)
    }
}
