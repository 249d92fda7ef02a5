//! Vendor package-version comparison.
//!
//! Implements the Debian/Ubuntu package ordering rules used by `dpkg`:
//! an optional numeric epoch (`2:1.0`), an upstream version, and an
//! optional revision split at the last `-`. Within the upstream and
//! revision parts, digit runs compare numerically and non-digit runs
//! compare character-wise with letters sorting before punctuation and
//! `~` sorting before everything, including the end of the string
//! (`1.0~rc1` < `1.0`).
//!
//! The comparator is a pure function with no global state.
//!
//! # Example
//!
//! ```
//! use std::cmp::Ordering;
//! use patchwatch::version::compare;
//!
//! assert_eq!(compare("1.0-1", "1.0-2").unwrap(), Ordering::Less);
//! assert_eq!(compare("2:1.0", "1:9.0").unwrap(), Ordering::Greater);
//! ```

use crate::error::{Error, Result};
use std::cmp::Ordering;

/// Compares two version strings under vendor package-ordering rules.
///
/// Returns [`Error::InvalidVersion`] if either string is malformed:
/// empty, carrying a non-numeric epoch, or containing characters
/// outside the version alphabet (alphanumerics and `.+-:~`).
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let a = Version::parse(a)?;
    let b = Version::parse(b)?;

    Ok(a.epoch
        .cmp(&b.epoch)
        .then_with(|| part_cmp(a.upstream, b.upstream))
        .then_with(|| part_cmp(a.revision, b.revision)))
}

/// Returns true iff `installed` sorts strictly below `safe_version`,
/// i.e. the installed package is vulnerable under the advisory that
/// declared `safe_version`.
pub fn is_unsafe(installed: &str, safe_version: &str) -> Result<bool> {
    Ok(compare(installed, safe_version)? == Ordering::Less)
}

struct Version<'a> {
    epoch: u64,
    upstream: &'a str,
    revision: &'a str,
}

impl<'a> Version<'a> {
    fn parse(raw: &'a str) -> Result<Self> {
        let invalid = || Error::InvalidVersion {
            version: raw.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid());
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | ':' | '~'))
        {
            return Err(invalid());
        }

        let (epoch, rest) = match raw.split_once(':') {
            Some((epoch, rest)) => {
                if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                (epoch.parse::<u64>().map_err(|_| invalid())?, rest)
            }
            None => (0, raw),
        };

        if rest.is_empty() {
            return Err(invalid());
        }

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, revision),
            None => (rest, ""),
        };

        Ok(Self {
            epoch,
            upstream,
            revision,
        })
    }
}

/// Sort weight of a byte within a non-digit run. `~` sorts below the
/// end of the string, letters below punctuation.
fn weight(b: Option<u8>) -> i32 {
    match b {
        None => 0,
        Some(b'~') => -1,
        Some(b) if b.is_ascii_digit() => 0,
        Some(b) if b.is_ascii_alphabetic() => i32::from(b),
        Some(b) => i32::from(b) + 256,
    }
}

/// Compares one upstream or revision part, alternating non-digit and
/// digit runs the way `dpkg` does.
fn part_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit run.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let wa = weight(a.get(i).copied());
            let wb = weight(b.get(j).copied());
            if wa != wb {
                return wa.cmp(&wb);
            }
            i += 1;
            j += 1;
        }

        // Digit run: strip leading zeros, then longer run wins, then lexical.
        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }
        let da = {
            let start = i;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            &a[start..i]
        };
        let db = {
            let start = j;
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            &b[start..j]
        };
        let ord = da.len().cmp(&db.len()).then_with(|| da.cmp(db));
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}
