use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidInputKind,
    InvalidDocumentKind,
    InvalidVectorKind,
    AmbiguousColumnSelection,
    InvalidFusionConstant,
    InvalidLimit,
    UpstreamSearchFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInputKind => "E1001",
            Self::InvalidDocumentKind => "E1002",
            Self::InvalidVectorKind => "E1003",
            Self::AmbiguousColumnSelection => "E1004",
            Self::InvalidFusionConstant => "E1005",
            Self::InvalidLimit => "E1006",
            Self::UpstreamSearchFailure => "E2001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidInputKind => "Result list is not a list",
            Self::InvalidDocumentKind => "Result list entry is not a document",
            Self::InvalidVectorKind => "Vector query is not numeric",
            Self::AmbiguousColumnSelection => "Ambiguous text column selection",
            Self::InvalidFusionConstant => "Invalid fusion constant",
            Self::InvalidLimit => "Invalid result limit",
            Self::UpstreamSearchFailure => "Search backend failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidInputKind => Some("Pass an array of arrays, one array per ranked list."),
            Self::InvalidDocumentKind => {
                Some("Every ranked list entry must be an object of field values.")
            }
            Self::InvalidVectorKind => {
                Some("Pass a non-empty array of finite numbers as the vector query.")
            }
            Self::AmbiguousColumnSelection => {
                Some("Give either a single text column or a non-empty list of columns, not both.")
            }
            Self::InvalidFusionConstant => Some("Use a positive, finite k (60 is typical)."),
            Self::InvalidLimit => Some("Request at least one result."),
            Self::UpstreamSearchFailure => {
                Some("Check that the searched columns exist and carry the matching index.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors reported by fusion and hybrid search.
///
/// Validation variants are raised before any backend call is made.
/// [`FusionError::UpstreamSearchFailure`] carries the backend's own error
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("result list {list_index} is not a list (found {found})")]
    InvalidInputKind {
        list_index: usize,
        found: &'static str,
    },

    #[error(
        "entry {position} of result list {list_index} is not a field mapping (found {found})"
    )]
    InvalidDocumentKind {
        list_index: usize,
        position: usize,
        found: &'static str,
    },

    #[error("vector query is not a numeric sequence: {reason}")]
    InvalidVectorKind { reason: String },

    #[error("ambiguous text column selection: {reason}")]
    AmbiguousColumnSelection { reason: &'static str },

    #[error("fusion constant k must be positive and finite, got {0}")]
    InvalidFusionConstant(f64),

    #[error("result limit must be at least 1")]
    InvalidLimit,

    #[error(transparent)]
    UpstreamSearchFailure(anyhow::Error),
}

impl FusionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInputKind { .. } => ErrorCode::InvalidInputKind,
            Self::InvalidDocumentKind { .. } => ErrorCode::InvalidDocumentKind,
            Self::InvalidVectorKind { .. } => ErrorCode::InvalidVectorKind,
            Self::AmbiguousColumnSelection { .. } => ErrorCode::AmbiguousColumnSelection,
            Self::InvalidFusionConstant(_) => ErrorCode::InvalidFusionConstant,
            Self::InvalidLimit => ErrorCode::InvalidLimit,
            Self::UpstreamSearchFailure(_) => ErrorCode::UpstreamSearchFailure,
        }
    }

    /// `true` for errors raised by argument checks rather than by a backend.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::UpstreamSearchFailure(_))
    }
}

/// Fails unless `k` is strictly positive and finite.
///
/// # Errors
///
/// Returns [`FusionError::InvalidFusionConstant`] for zero, negative, NaN, or
/// infinite values.
pub fn validate_fusion_k(k: f64) -> Result<(), FusionError> {
    if k.is_finite() && k > 0.0 {
        Ok(())
    } else {
        Err(FusionError::InvalidFusionConstant(k))
    }
}
