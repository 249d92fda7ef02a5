//! Core data types for hosts, advisories, and problems.
//!
//! This module contains the entities the correlation engine operates on:
//!
//! - [`Host`] and [`Package`] - the inventory side
//! - [`Advisory`], [`BinaryPackage`], [`Vulnerability`] - the advisory side
//! - [`Problem`] - a detected instance of a host running an unsafe
//!   package version under a specific advisory

mod advisory;
mod host;
mod problem;

pub use advisory::*;
pub use host::*;
pub use problem::*;
