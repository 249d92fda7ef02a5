pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod inventory;
pub mod ledger;
pub mod model;
pub mod report;
pub mod version;

pub use catalog::AdvisoryCatalog;
pub use config::{Config, InvalidVersionPolicy};
pub use engine::CorrelationEngine;
pub use error::Error;
pub use event::Event;
pub use inventory::InventoryStore;
pub use ledger::ProblemLedger;
pub use model::{
    Advisory, AdvisorySource, BinaryPackage, FixReason, Host, Package, Problem, ProblemIdentity,
    SourcePackage, Vulnerability,
};
pub use report::{PackageReport, ReportEntry, ReportOutcome};
