//! Error kinds (spec §7): fatal configuration errors, recoverable record
//! errors, and invariant violations (bugs, not exposed as a normal
//! `Result` — they assert instead, matching the published algorithm's
//! pseudocode).

/// Raised once, at [`crate::engine::Castle::new`] time. Fatal: there is no
/// sensible way to run the algorithm with a bad configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("quasi-identifier header `{0}` is invalid (it is also the sensitive attribute)")]
    UnknownHeader(String),
    #[error("l-diversity requirement {l} exceeds k-anonymity requirement {k}")]
    LGreaterThanK { l: usize, k: usize },
    #[error("headers list must not be empty")]
    EmptyHeaders,
}

/// Raised per-record by [`crate::engine::Castle::insert`]. Recoverable: the
/// caller is expected to skip the offending record and keep streaming the
/// rest. There is no retry path.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record is missing required field `{0}`")]
    MissingField(String),
    #[error("field `{0}` expected a numeric quasi-identifier, got a non-numeric value")]
    NonNumericQuasi(String),
}

/// Umbrella error for callers that want a single type to match on across a
/// whole run: a wrapped [`RecordError`], or an invariant violation (§7c).
/// The engine itself never constructs the `Invariant` variant as a
/// `Result` — those failures are bugs and `assert!`/`debug_assert!` at the
/// point of violation instead, matching the published algorithm's
/// pseudocode. `CastleError` exists for driver code that wants to collapse
/// both failure modes into one `Result` without losing the distinction.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CastleError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("invariant violated during release: {0}")]
    Invariant(&'static str),
}
