//! Error types for the evolution-tracking engine.
//!
//! Every fallible operation in this crate returns [`Result`], built around a
//! single [`EvoError`] enum whose variants carry structured fields rather than
//! opaque strings, so callers can match on `revision_id`, `record_locator`,
//! and similar context instead of parsing messages.

use std::fmt;
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, EvoError>;

/// Where, within a revision's input records, a malformed value was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocator {
    /// A code block record, identified by its block_id.
    CodeBlock {
        /// block_id of the offending record
        block_id: String,
    },
    /// A clone-pair record, identified by its two endpoints.
    ClonePair {
        /// first endpoint
        block_id_1: String,
        /// second endpoint
        block_id_2: String,
    },
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeBlock { block_id } => write!(f, "code block {block_id}"),
            Self::ClonePair {
                block_id_1,
                block_id_2,
            } => write!(f, "clone pair ({block_id_1}, {block_id_2})"),
        }
    }
}

/// Comprehensive error type for all engine operations.
#[derive(Error, Debug)]
pub enum EvoError {
    /// A configuration value was rejected before any work started.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable description of the violation
        message: String,
        /// Name of the offending field, if a single field is at fault
        field: Option<String>,
    },

    /// A code-block or clone-pair record was structurally invalid, or a
    /// token sequence failed to parse. Fatal for the revision pair in which
    /// it occurred.
    #[error("malformed input in revision {revision_id}, {locator}: {reason}")]
    InputFormat {
        /// Revision the record belongs to
        revision_id: String,
        /// Which record was malformed
        locator: RecordLocator,
        /// Why it was rejected
        reason: String,
    },

    /// A block_id referenced by a match or clone pair is absent from its
    /// revision's code-block set.
    #[error("missing data in revision {revision_id}: block {block_id} not found")]
    MissingData {
        /// Revision the reference was resolved against
        revision_id: String,
        /// The block_id that could not be found
        block_id: String,
    },

    /// The revision source could not produce a requested revision.
    #[error("revision not found: {revision_id}")]
    RevisionNotFound {
        /// The revision identifier that was requested
        revision_id: String,
    },

    /// An error surfaced by the revision source while loading data
    /// (I/O, network, etc). The engine never retries these.
    #[error("revision source error while loading {revision_id}: {message}")]
    Transient {
        /// Revision being loaded when the error occurred
        revision_id: String,
        /// Description of the underlying failure
        message: String,
    },

    /// An internal invariant was violated (e.g. disjoint-set corruption).
    /// Aborts the whole run.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
        /// Additional diagnostic context
        context: Option<String>,
    },
}

impl EvoError {
    /// Build an [`EvoError::InvalidConfig`] with no specific field.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            field: None,
        }
    }

    /// Build an [`EvoError::InvalidConfig`] naming the offending field.
    pub fn invalid_config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Build an [`EvoError::InputFormat`] for a malformed code block.
    pub fn bad_code_block(
        revision_id: impl Into<String>,
        block_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InputFormat {
            revision_id: revision_id.into(),
            locator: RecordLocator::CodeBlock {
                block_id: block_id.into(),
            },
            reason: reason.into(),
        }
    }

    /// Build an [`EvoError::InputFormat`] for a malformed clone pair.
    pub fn bad_clone_pair(
        revision_id: impl Into<String>,
        block_id_1: impl Into<String>,
        block_id_2: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InputFormat {
            revision_id: revision_id.into(),
            locator: RecordLocator::ClonePair {
                block_id_1: block_id_1.into(),
                block_id_2: block_id_2.into(),
            },
            reason: reason.into(),
        }
    }

    /// Build an [`EvoError::MissingData`].
    pub fn missing_block(revision_id: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self::MissingData {
            revision_id: revision_id.into(),
            block_id: block_id.into(),
        }
    }

    /// Build an [`EvoError::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Attach additional context to an internal error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }
}

impl From<ParseIntError> for EvoError {
    fn from(err: ParseIntError) -> Self {
        Self::invalid_config(format!("invalid integer: {err}"))
    }
}

impl From<ParseFloatError> for EvoError {
    fn from(err: ParseFloatError) -> Self {
        Self::invalid_config(format!("invalid float: {err}"))
    }
}

/// Result extension trait for adding context to internal errors in place.
pub trait ResultExt<T> {
    /// Attach context produced lazily (only when the result is an error).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// A non-fatal condition surfaced alongside a successful result.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineWarning {
    /// The fraction of matched blocks in a revision pair fell below the
    /// configured floor.
    LowMatchRate {
        /// Revision the match rate was computed for
        revision_id: String,
        /// Observed matching rate, in [0, 1]
        rate: f64,
        /// Configured floor that was violated
        floor: f64,
    },
    /// A clone group has more than one member but no recorded pair
    /// similarities (producer gave no clone pairs for it).
    GroupMissingSimilarities {
        /// Revision the group belongs to
        revision_id: String,
        /// The affected group's id
        group_id: String,
    },
    /// A lineage observation (other than its first) had `lifetime_days == 0`,
    /// suggesting a date anomaly in the revision source.
    ZeroDayLifetime {
        /// Revision at which the anomaly was observed
        revision_id: String,
        /// The lineage id affected
        lineage_id: String,
    },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowMatchRate {
                revision_id,
                rate,
                floor,
            } => write!(
                f,
                "revision {revision_id}: matching rate {rate:.3} below floor {floor:.3}"
            ),
            Self::GroupMissingSimilarities {
                revision_id,
                group_id,
            } => write!(
                f,
                "revision {revision_id}: group {group_id} has no recorded pair similarities"
            ),
            Self::ZeroDayLifetime {
                revision_id,
                lineage_id,
            } => write!(
                f,
                "revision {revision_id}: lineage {lineage_id} observed with zero-day lifetime"
            ),
        }
    }
}
