use crate::model::{AdvisoryId, HostId};
use thiserror::Error;

/// Errors surfaced by the correlation engine and its stores.
#[derive(Debug, Error)]
pub enum Error {
    /// A version string that cannot be parsed under vendor ordering rules.
    #[error("invalid version string {version:?}")]
    InvalidVersion { version: String },

    /// An open problem with the same identity already exists.
    #[error("open problem already recorded for this identity")]
    Conflict,

    /// No open problem matches the given identity.
    #[error("no matching open problem")]
    NotFound,

    /// The event referenced a host that was never registered.
    #[error("unknown host {0}")]
    UnknownHost(HostId),

    /// The event referenced an advisory that was never published.
    #[error("unknown advisory {0}")]
    UnknownAdvisory(AdvisoryId),

    /// A differential package report that could not be decoded.
    #[error("malformed package report: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidVersion {
            version: "1 .0".to_string(),
        };
        assert_eq!(err.to_string(), "invalid version string \"1 .0\"");
        assert_eq!(
            Error::UnknownHost(HostId(7)).to_string(),
            "unknown host host/7"
        );
        assert_eq!(
            Error::UnknownAdvisory(AdvisoryId(3)).to_string(),
            "unknown advisory advisory/3"
        );
    }
}
