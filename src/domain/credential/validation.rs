//! Issue-parameter checks and validation outcomes

use thiserror::Error;

use super::entity::CredentialRecord;

/// Errors for malformed issue parameters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueParamsError {
    #[error("validity must cover at least one day, got {0}")]
    NonPositiveValidity(i64),

    #[error("start delay cannot be negative, got {0}")]
    NegativeStartDelay(i64),

    #[error("rate limit must be positive")]
    ZeroRateLimit,

    #[error("owner id cannot be empty")]
    EmptyOwnerId,
}

/// Validate the caller-supplied parts of an issue request.
///
/// These are caller mistakes, never retried automatically.
pub fn validate_issue_params(
    owner_id: &str,
    validity_days: i64,
    start_delay_days: i64,
    rate_limit: u32,
) -> Result<(), IssueParamsError> {
    if owner_id.trim().is_empty() {
        return Err(IssueParamsError::EmptyOwnerId);
    }

    if validity_days <= 0 {
        return Err(IssueParamsError::NonPositiveValidity(validity_days));
    }

    if start_delay_days < 0 {
        return Err(IssueParamsError::NegativeStartDelay(start_delay_days));
    }

    if rate_limit == 0 {
        return Err(IssueParamsError::ZeroRateLimit);
    }

    Ok(())
}

/// Why a presented credential was turned away.
///
/// Rejections are expected, frequent results the caller branches on, not
/// errors. The variants mirror the order the validator applies its checks:
/// status dominates the temporal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// No record carries the presented credential's digest
    NotFound,
    /// The credential was deactivated
    Revoked,
    /// The validity window has not opened yet
    NotYetActive,
    /// The validity window has closed
    Expired,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotFound => "not found",
            Self::Revoked => "revoked",
            Self::NotYetActive => "not yet active",
            Self::Expired => "expired",
        };
        write!(f, "{}", text)
    }
}

/// Result of presenting a raw credential to the validator
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    /// The credential resolved to a live record
    Accepted(CredentialRecord),
    /// The credential was turned away
    Rejected(RejectionReason),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The record, if the credential was accepted
    pub fn record(&self) -> Option<&CredentialRecord> {
        match self {
            Self::Accepted(record) => Some(record),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection reason, if the credential was turned away
    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}
